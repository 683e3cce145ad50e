//! S64 reader
//!
//! Single pass over the text, line by line and token by token, driven by an
//! explicit stack of [`LexState`]s rather than recursion. A record only ever
//! takes tokens from its own line; running out of tokens ends the statement.

use std::io;
use std::path::Path;
use std::str::SplitWhitespace;

use glam::{Quat, Vec2, Vec3};

use crate::model::{Animation, Face, Keyframe, Mesh, Rotation, S64Model, Vertex};

/// Lexer state, one entry per open block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    None,
    CommentBlock,
    Mesh,
    Vertices,
    Faces,
    Animation,
    Keyframe,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: unknown block kind {kind:?}")]
    UnknownBlock { line: usize, kind: String },

    #[error("line {line}: BEGIN {kind} is not allowed inside {inside:?}")]
    UnexpectedBlock {
        line: usize,
        kind: String,
        inside: LexState,
    },

    #[error("line {line}: {what} is missing its argument")]
    MissingArgument { line: usize, what: String },

    #[error("line {line}: END without a matching BEGIN")]
    UnmatchedEnd { line: usize },

    #[error("end of input with {open} block(s) still open, innermost {innermost:?}")]
    UnclosedBlocks { open: usize, innermost: LexState },

    #[error("line {line}: unexpected token {token:?} in {state:?}")]
    UnexpectedToken {
        line: usize,
        token: String,
        state: LexState,
    },

    #[error("line {line}: face has {count} vertices, expected 3 or 4")]
    FaceArity { line: usize, count: i64 },

    #[error("mesh '{mesh}' face {face} references vertex {index} but only {count} exist")]
    BadIndex {
        mesh: String,
        face: usize,
        index: u32,
        count: usize,
    },
}

/// Read and parse a `.S64` file
pub fn read_s64_file(path: &Path) -> Result<S64Model, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_s64(&text)
}

/// Parse S64 text
///
/// `END` pops the innermost block without comparing its name argument, so
/// `BEGIN FACES` closed by `END MESH` is accepted.
pub fn parse_s64(text: &str) -> Result<S64Model, ParseError> {
    let mut parser = Parser::new();
    for (index, raw) in text.lines().enumerate() {
        parser.line = index + 1;
        parser.parse_line(raw)?;
    }
    parser.finish()
}

struct Parser {
    stack: Vec<LexState>,
    model: S64Model,
    /// Index of the open keyframe within the current animation
    frame: usize,
    line: usize,
}

impl Parser {
    fn new() -> Self {
        Self {
            stack: vec![LexState::None],
            model: S64Model::default(),
            frame: 0,
            line: 0,
        }
    }

    fn state(&self) -> LexState {
        self.stack.last().copied().unwrap_or(LexState::None)
    }

    fn parse_line(&mut self, raw: &str) -> Result<(), ParseError> {
        let line = match raw.find("//") {
            Some(cut) => &raw[..cut],
            None => raw,
        };

        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if self.state() == LexState::CommentBlock {
                if token.contains("*/") {
                    self.stack.pop();
                }
                continue;
            }

            if let Some(start) = token.find("/*") {
                // A token like `/*note*/` opens and closes on the spot
                if !token[start + 2..].contains("*/") {
                    self.stack.push(LexState::CommentBlock);
                }
                continue;
            }

            match token {
                "BEGIN" => self.begin(&mut tokens)?,
                "END" => {
                    self.end()?;
                    // The block name after END is not checked
                    break;
                }
                _ => self.record(token, &mut tokens)?,
            }
        }
        Ok(())
    }

    fn begin(&mut self, tokens: &mut SplitWhitespace<'_>) -> Result<(), ParseError> {
        let kind = tokens.next().ok_or_else(|| self.missing("BEGIN"))?;
        let state = self.state();

        match (state, kind) {
            (LexState::None, "MESH") => {
                let name = tokens.next().ok_or_else(|| self.missing("BEGIN MESH"))?;
                self.model.meshes.push(Mesh::new(name));
                self.stack.push(LexState::Mesh);
            }
            (LexState::None, "ANIMATION") => {
                let name = tokens
                    .next()
                    .ok_or_else(|| self.missing("BEGIN ANIMATION"))?;
                self.model.animations.push(Animation::new(name));
                self.stack.push(LexState::Animation);
            }
            (LexState::Mesh, "VERTICES") => self.stack.push(LexState::Vertices),
            (LexState::Mesh, "FACES") => self.stack.push(LexState::Faces),
            (LexState::Animation, "KEYFRAME") => {
                let token = tokens
                    .next()
                    .ok_or_else(|| self.missing("BEGIN KEYFRAME"))?;
                let number: i64 = token.parse().map_err(|_| self.invalid(token))?;
                self.open_keyframe(number as f32)?;
                self.stack.push(LexState::Keyframe);
            }
            (_, "MESH" | "ANIMATION" | "VERTICES" | "FACES" | "KEYFRAME") => {
                return Err(ParseError::UnexpectedBlock {
                    line: self.line,
                    kind: kind.to_string(),
                    inside: state,
                });
            }
            (_, other) => {
                return Err(ParseError::UnknownBlock {
                    line: self.line,
                    kind: other.to_string(),
                });
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), ParseError> {
        if self.stack.len() <= 1 {
            return Err(ParseError::UnmatchedEnd { line: self.line });
        }
        self.stack.pop();
        Ok(())
    }

    fn open_keyframe(&mut self, time: f32) -> Result<(), ParseError> {
        let line = self.line;
        let animation = self.animation_mut()?;
        if let Some(existing) = animation.frames.iter().position(|f| f.time == time) {
            tracing::warn!(
                line,
                "animation '{}' repeats keyframe {}, replacing the earlier one",
                animation.name,
                time
            );
            animation.frames[existing].keyframes.clear();
        }
        animation.frame_mut(time);
        let position = animation
            .frames
            .iter()
            .position(|f| f.time == time)
            .unwrap_or(0);
        self.frame = position;
        Ok(())
    }

    fn record(&mut self, token: &str, tokens: &mut SplitWhitespace<'_>) -> Result<(), ParseError> {
        match self.state() {
            LexState::Mesh => match token {
                "ROOT" => {
                    if let Some([x, y, z]) = self.floats::<3>(tokens)? {
                        self.mesh_mut(token)?.root = Vec3::new(x, y, z);
                    } else {
                        self.truncated("ROOT");
                    }
                }
                "PROPERTIES" => {
                    let properties: Vec<String> =
                        take_fields(tokens).into_iter().map(str::to_string).collect();
                    self.mesh_mut(token)?.properties.extend(properties);
                }
                _ => return Err(self.unexpected(token)),
            },
            LexState::Vertices => {
                let first = self.float(token)?;
                let Some(rest) = self.floats::<10>(tokens)? else {
                    self.truncated("vertex");
                    return Ok(());
                };
                let vertex = Vertex {
                    position: Vec3::new(first, rest[0], rest[1]),
                    normal: Vec3::new(rest[2], rest[3], rest[4]),
                    color: Vec3::new(rest[5], rest[6], rest[7]),
                    uv: Vec2::new(rest[8], rest[9]),
                };
                self.mesh_mut(token)?.push_vertex(vertex);
            }
            LexState::Faces => {
                let count: i64 = token.parse().map_err(|_| self.invalid(token))?;
                if !(3..=4).contains(&count) {
                    return Err(ParseError::FaceArity {
                        line: self.line,
                        count,
                    });
                }
                let mut indices = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let Some(index) = tokens.next() else {
                        self.truncated("face");
                        return Ok(());
                    };
                    indices.push(index.parse::<u32>().map_err(|_| self.invalid(index))?);
                }
                let Some(material) = tokens.next() else {
                    self.truncated("face");
                    return Ok(());
                };
                let face = Face::new(indices, material).map_err(|e| ParseError::FaceArity {
                    line: self.line,
                    count: e.0 as i64,
                })?;
                self.mesh_mut(token)?.add_face(face);
            }
            LexState::Keyframe => {
                let fields = take_fields(tokens);
                let rotation_len = match fields.len() {
                    9 => 3,
                    10 => 4,
                    n if n < 9 => {
                        self.truncated("keyframe");
                        return Ok(());
                    }
                    _ => return Err(self.unexpected(fields[10])),
                };
                let mut values = Vec::with_capacity(fields.len());
                for field in &fields {
                    values.push(self.float(field)?);
                }
                let position = Vec3::new(values[0], values[1], values[2]);
                let rotation = if rotation_len == 4 {
                    Rotation::Quaternion(Quat::from_xyzw(values[4], values[5], values[6], values[3]))
                } else {
                    Rotation::Euler(Vec3::new(values[3], values[4], values[5]))
                };
                let s = 3 + rotation_len;
                let key = Keyframe {
                    bone: token.to_string(),
                    position,
                    rotation,
                    scale: Vec3::new(values[s], values[s + 1], values[s + 2]),
                };
                let frame = self.frame;
                let err = self.unexpected(token);
                let animation = self.animation_mut()?;
                let open = animation.frames.get_mut(frame).ok_or(err)?;
                open.keyframes.push(key);
            }
            LexState::None | LexState::Animation | LexState::CommentBlock => {
                return Err(self.unexpected(token));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<S64Model, ParseError> {
        if self.stack.len() > 1 {
            return Err(ParseError::UnclosedBlocks {
                open: self.stack.len() - 1,
                innermost: self.state(),
            });
        }
        let mut model = self.model;
        for animation in &mut model.animations {
            animation.sort_frames();
        }
        for mesh in &model.meshes {
            if let Err((face, index)) = mesh.validate() {
                return Err(ParseError::BadIndex {
                    mesh: mesh.name.clone(),
                    face,
                    index,
                    count: mesh.vertices.len(),
                });
            }
        }
        Ok(model)
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    fn float(&self, token: &str) -> Result<f32, ParseError> {
        token.parse::<f32>().map_err(|_| self.invalid(token))
    }

    /// Pull `N` floats from the current line, `None` if the line runs out
    fn floats<const N: usize>(
        &self,
        tokens: &mut SplitWhitespace<'_>,
    ) -> Result<Option<[f32; N]>, ParseError> {
        let mut out = [0.0f32; N];
        for slot in out.iter_mut() {
            match tokens.next() {
                Some(token) => *slot = self.float(token)?,
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    fn mesh_mut(&mut self, token: &str) -> Result<&mut Mesh, ParseError> {
        let err = self.unexpected(token);
        self.model.meshes.last_mut().ok_or(err)
    }

    fn animation_mut(&mut self) -> Result<&mut Animation, ParseError> {
        let err = self.unexpected("KEYFRAME");
        self.model.animations.last_mut().ok_or(err)
    }

    fn truncated(&self, what: &str) {
        tracing::warn!(
            line = self.line,
            "{} record ends before all of its fields, ignoring it",
            what
        );
    }

    fn invalid(&self, token: &str) -> ParseError {
        ParseError::InvalidNumber {
            line: self.line,
            token: token.to_string(),
        }
    }

    fn missing(&self, what: &str) -> ParseError {
        ParseError::MissingArgument {
            line: self.line,
            what: what.to_string(),
        }
    }

    fn unexpected(&self, token: &str) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.line,
            token: token.to_string(),
            state: self.state(),
        }
    }
}

/// Take the rest of the line up to the first comment marker
///
/// The marker and everything after it stay in `tokens` for the main loop.
fn take_fields<'a>(tokens: &mut SplitWhitespace<'a>) -> Vec<&'a str> {
    let mut fields = Vec::new();
    while let Some(token) = tokens
        .clone()
        .next()
        .filter(|t| !t.contains("/*") && !t.contains("*/"))
    {
        tokens.next();
        fields.push(token);
    }
    fields
}
