//! Export and import options
//!
//! Options come from an optional `s64.toml` with `[export]` and `[import]`
//! tables; command line flags override whatever the file sets.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::gltf_scene::DEFAULT_FRAME_RATE;

/// How keyframe rotations are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RotationFormat {
    /// `w x y z`
    #[default]
    Quaternion,
    /// `x y z` radians, XYZ order
    Euler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    /// Fan-triangulate polygons before extraction
    pub triangulate: bool,
    /// Only export selected objects
    pub selected_only: bool,
    /// Only export visible objects
    pub visible_only: bool,
    /// Frame rate the scene is authored at
    pub source_fps: f32,
    /// Rescale keyframe times to this rate
    pub target_fps: Option<f32>,
    pub rotation: RotationFormat,
    /// Abort when a vertex group has no matching bone
    pub strict_weight_groups: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            triangulate: false,
            selected_only: false,
            visible_only: true,
            source_fps: DEFAULT_FRAME_RATE,
            target_fps: None,
            rotation: RotationFormat::Quaternion,
            strict_weight_groups: false,
        }
    }
}

impl ExportSettings {
    /// Factor applied to every sampled key time
    pub fn time_scale(&self) -> Result<f32, ExportError> {
        for fps in std::iter::once(self.source_fps).chain(self.target_fps) {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ExportError::InvalidFrameRate { fps });
            }
        }
        Ok(match self.target_fps {
            Some(target) => self.source_fps / target,
            None => 1.0,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSettings {
    /// Put everything the import creates into one collection named after the file
    pub group: bool,
    /// Store vertices relative to their mesh root and offset key positions by it
    pub fix_root: bool,
}

/// Contents of an `s64.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub export: ExportSettings,
    pub import: ImportSettings,
}

pub fn load_settings(path: &Path) -> Result<SettingsFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let settings: SettingsFile =
        toml::from_str(&text).with_context(|| format!("Failed to parse config: {:?}", path))?;
    tracing::debug!("Loaded settings from {:?}: {:?}", path, settings);
    Ok(settings)
}
