//! s64-export library
//!
//! Moves skinned, animated characters into and out of the Sausage64 `.S64`
//! format.
//!
//! # Modules
//!
//! - [`scene`] - Scene collaborator interfaces and the scoped pose guard
//! - [`export`] - Bone partitioning, face extraction and consolidation
//! - [`animation`] - Keyed-time sampling of clips into bind-relative keyframes
//! - [`reconstruct`] - Rebuilding a rigid rig from a parsed model
//! - [`gltf_scene`] - A [`scene::SceneSource`] backed by a glTF/GLB file
//! - [`settings`] - Export/import options and the `s64.toml` loader

pub mod animation;
pub mod error;
pub mod export;
pub mod gltf_scene;
pub mod reconstruct;
pub mod scene;
pub mod settings;

#[cfg(test)]
mod test_scene;

pub use error::ExportError;
pub use export::{build_model, export_scene};
pub use gltf_scene::GltfScene;
pub use reconstruct::{build_rig, import_s64, ReconstructError, Rig};
pub use scene::{SceneSource, ScopedPose};
pub use settings::{ExportSettings, ImportSettings, RotationFormat, SettingsFile};

// Re-export the codec so callers need only this crate
pub use s64_common::{parse_s64, read_s64_file, write_s64_file, S64Model};
