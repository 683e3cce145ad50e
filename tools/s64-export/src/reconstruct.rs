//! Import reconstruction
//!
//! Rebuilds a rigidly skinned, animated rig from a parsed [`S64Model`]. The
//! whole [`Rig`] is built as a value before anything reaches a host, so a
//! failure never leaves half-created objects behind.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Quat, Vec2, Vec3, Vec4};
use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use smallvec::SmallVec;

use s64_common::{read_s64_file, Animation, Mesh, S64Model, MAX_FACE_VERTICES, NONE_NAME};

use crate::export::geometry::flip_v;
use crate::settings::ImportSettings;

/// Offset from a bone head to its synthetic tail
pub const TAIL_OFFSET: Vec3 = Vec3::new(0.0, 5.0, 0.0);

#[derive(Debug, thiserror::Error)]
pub enum ReconstructError {
    #[error("mesh '{0}' is defined more than once")]
    DuplicateMesh(String),

    #[error("mesh '{mesh}' face {face} references vertex {index} but only {count} exist")]
    BadIndex {
        mesh: String,
        face: usize,
        index: u32,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigBone {
    pub name: String,
    pub head: Vec3,
    pub tail: Vec3,
    /// Flags from the mesh's `PROPERTIES` line
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigPolygon {
    pub vertices: SmallVec<[u32; MAX_FACE_VERTICES]>,
    /// Index into `RigSurface::material_slots`
    pub material_slot: usize,
}

/// One mesh, parented and rigidly bound to the bone of the same name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigSurface {
    pub name: String,
    pub bone: String,
    pub positions: Vec<Vec3>,
    pub polygons: Vec<RigPolygon>,
    /// Per-corner layers, in polygon order
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub material_slots: Vec<String>,
    /// The single vertex group every vertex belongs to
    pub skin_group: String,
    pub skin_weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RigKey {
    pub frame: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl RigKey {
    pub fn identity(frame: f32) -> Self {
        Self {
            frame,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigTrack {
    pub bone: String,
    pub keys: Vec<RigKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigClip {
    pub name: String,
    /// Where the clip's playback strip starts
    pub start_frame: f32,
    /// Kept alive even when nothing uses it
    pub retained: bool,
    pub tracks: Vec<RigTrack>,
}

/// Everything a host needs to materialise an imported model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rig {
    pub name: String,
    /// Collection every created object goes into, when grouping
    pub collection: Option<String>,
    pub materials: Vec<String>,
    pub bones: Vec<RigBone>,
    pub surfaces: Vec<RigSurface>,
    /// Rest clip first, then one per animation in file order
    pub clips: Vec<RigClip>,
    /// Keyframes naming a bone no mesh defines
    pub skipped_keys: usize,
}

impl Rig {
    pub fn clip(&self, name: &str) -> Option<&RigClip> {
        self.clips.iter().find(|c| c.name == name)
    }
}

/// Read a `.S64` file and build its rig, named after the file
pub fn import_s64(path: &Path, settings: &ImportSettings) -> Result<Rig> {
    let model =
        read_s64_file(path).with_context(|| format!("Failed to parse S64 file: {:?}", path))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string();

    let rig = build_rig(&name, &model, settings)
        .with_context(|| format!("Failed to rebuild rig from {:?}", path))?;
    tracing::info!(
        "Imported '{}': {} bones, {} materials, {} clips",
        rig.name,
        rig.bones.len(),
        rig.materials.len(),
        rig.clips.len() - 1
    );
    Ok(rig)
}

pub fn build_rig(
    name: &str,
    model: &S64Model,
    settings: &ImportSettings,
) -> Result<Rig, ReconstructError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for mesh in &model.meshes {
        if !seen.insert(mesh.name.as_str()) {
            return Err(ReconstructError::DuplicateMesh(mesh.name.clone()));
        }
        mesh.validate()
            .map_err(|(face, index)| ReconstructError::BadIndex {
                mesh: mesh.name.clone(),
                face,
                index,
                count: mesh.vertices.len(),
            })?;
    }

    let bones: Vec<RigBone> = model
        .meshes
        .iter()
        .map(|mesh| RigBone {
            name: mesh.name.clone(),
            head: mesh.root,
            tail: mesh.root + TAIL_OFFSET,
            properties: mesh.properties.clone(),
        })
        .collect();

    let surfaces = model
        .meshes
        .iter()
        .map(|mesh| build_surface(mesh, settings.fix_root))
        .collect();

    let rest = RigClip {
        name: NONE_NAME.to_string(),
        start_frame: 0.0,
        retained: true,
        tracks: bones
            .iter()
            .map(|bone| RigTrack {
                bone: bone.name.clone(),
                keys: vec![RigKey::identity(0.0)],
            })
            .collect(),
    };

    // Bone name -> (mesh order, root)
    let bone_index: HashMap<&str, (usize, Vec3)> = model
        .meshes
        .iter()
        .enumerate()
        .map(|(i, mesh)| (mesh.name.as_str(), (i, mesh.root)))
        .collect();

    let mut skipped_keys = 0;
    let mut clips = vec![rest];
    for animation in &model.animations {
        clips.push(build_clip(
            animation,
            &bone_index,
            settings.fix_root,
            &mut skipped_keys,
        ));
    }

    Ok(Rig {
        name: name.to_string(),
        collection: settings.group.then(|| name.to_string()),
        materials: model.materials(),
        bones,
        surfaces,
        clips,
        skipped_keys,
    })
}

fn build_surface(mesh: &Mesh, fix_root: bool) -> RigSurface {
    let offset = if fix_root { mesh.root } else { Vec3::ZERO };

    let mut material_slots: Vec<String> = Vec::new();
    let mut polygons = Vec::with_capacity(mesh.faces.len());
    let mut normals = Vec::new();
    let mut colors = Vec::new();
    let mut uvs = Vec::new();

    for face in &mesh.faces {
        let material_slot = match material_slots.iter().position(|m| *m == face.material) {
            Some(slot) => slot,
            None => {
                material_slots.push(face.material.clone());
                material_slots.len() - 1
            }
        };
        for &index in &face.indices {
            let vertex = &mesh.vertices[index as usize];
            normals.push(vertex.normal);
            colors.push(vertex.color.extend(1.0));
            uvs.push(flip_v(vertex.uv));
        }
        polygons.push(RigPolygon {
            vertices: face.indices.clone(),
            material_slot,
        });
    }

    RigSurface {
        name: mesh.name.clone(),
        bone: mesh.name.clone(),
        positions: mesh.vertices.iter().map(|v| v.position - offset).collect(),
        polygons,
        normals,
        colors,
        uvs,
        material_slots,
        skin_group: mesh.name.clone(),
        skin_weight: 1.0,
    }
}

fn build_clip(
    animation: &Animation,
    bone_index: &HashMap<&str, (usize, Vec3)>,
    fix_root: bool,
    skipped_keys: &mut usize,
) -> RigClip {
    let mut tracks: Vec<Option<RigTrack>> = vec![None; bone_index.len()];
    let mut missing: HashSet<&str> = HashSet::new();

    for frame in &animation.frames {
        for key in &frame.keyframes {
            let Some(&(index, root)) = bone_index.get(key.bone.as_str()) else {
                *skipped_keys += 1;
                if missing.insert(key.bone.as_str()) {
                    tracing::warn!(
                        "Animation '{}' keys bone '{}' which no mesh defines, skipping its keys",
                        animation.name,
                        key.bone
                    );
                }
                continue;
            };
            let offset = if fix_root { root } else { Vec3::ZERO };
            let track = tracks[index].get_or_insert_with(|| RigTrack {
                bone: key.bone.clone(),
                keys: Vec::new(),
            });
            track.keys.push(RigKey {
                frame: frame.time,
                position: key.position + offset,
                rotation: key.rotation.to_quat(),
                scale: key.scale,
            });
        }
    }

    let start_frame = animation
        .frames
        .iter()
        .map(|f| f.time)
        .reduce(f32::min)
        .unwrap_or(0.0);

    RigClip {
        name: animation.name.clone(),
        start_frame,
        retained: false,
        tracks: tracks.into_iter().flatten().collect(),
    }
}
