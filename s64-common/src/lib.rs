//! Shared types for the Sausage64 character format
//!
//! This crate is used by:
//! - `s64-export` (export consolidation and import reconstruction)
//! - any tool that only needs to read or write `.S64` files
//!
//! # Modules
//!
//! - [`model`] - Mesh buckets, vertices, faces, animations and keyframes
//! - [`formats`] - The S64 text codec (writer and stack-based reader)

pub mod formats;
pub mod model;

// Re-export commonly used model items
pub use model::{
    Animation, Face, FaceArityError, Frame, Keyframe, MAX_FACE_VERTICES, MIN_FACE_VERTICES, Mesh,
    ModelSummary, NONE_NAME, Rotation, S64Model, Vertex,
};

// Re-export commonly used format items
pub use formats::{
    FLOAT_PRECISION, LexState, ParseError, S64_EXT, WriteError, parse_s64, read_s64_file,
    write_s64, write_s64_file,
};
