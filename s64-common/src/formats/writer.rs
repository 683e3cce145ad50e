//! S64 writer

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use glam::{Vec2, Vec3};

use crate::model::{Animation, Mesh, NONE_NAME, Rotation, S64Model};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{kind} name {name:?} cannot be read back (empty, whitespace, comment marker or keyword)")]
    InvalidName { kind: &'static str, name: String },

    #[error(
        "animation '{animation}' has frame {frame} after frame {previous}; frame numbers must be strictly ascending"
    )]
    UnorderedFrames {
        animation: String,
        previous: i64,
        frame: i64,
    },

    #[error("mesh '{mesh}' face {face} references vertex {index} but only {count} exist")]
    BadIndex {
        mesh: String,
        face: usize,
        index: u32,
        count: usize,
    },
}

const HEADER: &str = concat!(
    "/**********************************\n",
    "      Sausage64 Character Mesh\n",
    "           Version ",
    env!("CARGO_PKG_VERSION"),
    "\n",
    "**********************************/\n\n",
);

/// Write a complete model
///
/// Meshes without faces are skipped. Meshes and animations are written in the
/// order they appear in `model`; callers sort them for deterministic output.
pub fn write_s64<W: Write>(w: &mut W, model: &S64Model) -> Result<(), WriteError> {
    w.write_all(HEADER.as_bytes())?;

    for mesh in model.meshes.iter().filter(|m| !m.is_empty()) {
        write_mesh(w, mesh)?;
    }
    for animation in &model.animations {
        write_animation(w, animation)?;
    }
    Ok(())
}

/// Write a model to a fresh file at `path`
pub fn write_s64_file(path: &Path, model: &S64Model) -> Result<(), WriteError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_s64(&mut writer, model)?;
    writer.flush()?;
    Ok(())
}

fn write_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> Result<(), WriteError> {
    check_name("mesh", &mesh.name)?;
    if let Err((face, index)) = mesh.validate() {
        return Err(WriteError::BadIndex {
            mesh: mesh.name.clone(),
            face,
            index,
            count: mesh.vertices.len(),
        });
    }

    writeln!(w, "BEGIN MESH {}", mesh.name)?;
    writeln!(w, "ROOT {}", vec3(mesh.root))?;
    if !mesh.properties.is_empty() {
        for property in &mesh.properties {
            check_name("property", property)?;
        }
        writeln!(w, "PROPERTIES {}", mesh.properties.join(" "))?;
    }

    writeln!(w, "BEGIN VERTICES")?;
    for v in &mesh.vertices {
        writeln!(
            w,
            "{} {} {} {}",
            vec3(v.position),
            vec3(v.normal),
            vec3(v.color),
            vec2(v.uv)
        )?;
    }
    writeln!(w, "END VERTICES")?;

    writeln!(w, "BEGIN FACES")?;
    for face in &mesh.faces {
        write!(w, "{}", face.indices.len())?;
        for index in &face.indices {
            write!(w, " {}", index)?;
        }
        let material = if face.material.is_empty() {
            NONE_NAME
        } else {
            check_name("material", &face.material)?;
            face.material.as_str()
        };
        writeln!(w, " {}", material)?;
    }
    writeln!(w, "END FACES")?;

    writeln!(w, "END MESH {}\n", mesh.name)?;
    Ok(())
}

fn write_animation<W: Write>(w: &mut W, animation: &Animation) -> Result<(), WriteError> {
    check_name("animation", &animation.name)?;

    // Validate ordering before emitting anything for this block
    let mut previous: Option<i64> = None;
    for frame in &animation.frames {
        let number = frame_number(frame.time);
        if let Some(prev) = previous {
            if number <= prev {
                return Err(WriteError::UnorderedFrames {
                    animation: animation.name.clone(),
                    previous: prev,
                    frame: number,
                });
            }
        }
        previous = Some(number);
    }

    writeln!(w, "BEGIN ANIMATION {}", animation.name)?;
    for frame in &animation.frames {
        let number = frame_number(frame.time);
        writeln!(w, "BEGIN KEYFRAME {}", number)?;
        for key in &frame.keyframes {
            check_name("bone", &key.bone)?;
            let rotation = match key.rotation {
                Rotation::Euler(e) => vec3(e),
                Rotation::Quaternion(q) => {
                    format!("{} {} {} {}", num(q.w), num(q.x), num(q.y), num(q.z))
                }
            };
            writeln!(
                w,
                "{} {} {} {}",
                key.bone,
                vec3(key.position),
                rotation,
                vec3(key.scale)
            )?;
        }
        writeln!(w, "END KEYFRAME {}", number)?;
    }
    writeln!(w, "END ANIMATION {}\n", animation.name)?;
    Ok(())
}

/// Keyframe times are stored as truncated integers
pub(crate) fn frame_number(time: f32) -> i64 {
    time.trunc() as i64
}

/// Format with 4 fractional digits; values that round to zero print unsigned
fn num(value: f32) -> String {
    let text = format!("{:.4}", value);
    if text == "-0.0000" {
        "0.0000".to_string()
    } else {
        text
    }
}

fn vec3(v: Vec3) -> String {
    format!("{} {} {}", num(v.x), num(v.y), num(v.z))
}

fn vec2(v: Vec2) -> String {
    format!("{} {}", num(v.x), num(v.y))
}

fn check_name(kind: &'static str, name: &str) -> Result<(), WriteError> {
    let readable = !name.is_empty()
        && !name.chars().any(char::is_whitespace)
        && !name.contains("//")
        && !name.contains("/*")
        && name != "BEGIN"
        && name != "END";
    if !readable {
        return Err(WriteError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
