//! Export errors

use s64_common::WriteError;

/// Reasons an export is cancelled
///
/// Everything except an I/O failure while writing is a problem with the scene
/// and is reported as a cancellation rather than a crash.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("skeleton '{skeleton}' has a bone named \"None\", which is reserved for unweighted geometry")]
    ReservedBoneName { skeleton: String },

    #[error("surface '{surface}' uses a material named \"None\", which is reserved for faces without a material")]
    ReservedMaterialName { surface: String },

    #[error("bone '{bone}' exists in both skeleton '{first}' and skeleton '{second}'")]
    DuplicateBone {
        bone: String,
        first: String,
        second: String,
    },

    #[error("surface '{surface}' face {face} has {count} vertices, at most 4 are supported (enable triangulation)")]
    FaceTooLarge {
        surface: String,
        face: usize,
        count: usize,
    },

    #[error("surface '{surface}' face {face} has only {count} vertices")]
    DegenerateFace {
        surface: String,
        face: usize,
        count: usize,
    },

    #[error("surface '{surface}' has vertex group '{group}' with no matching bone")]
    UnknownWeightGroup { surface: String, group: String },

    #[error("surface '{surface}' is malformed: {reason}")]
    InvalidSurface { surface: String, reason: String },

    #[error("invalid frame rate {fps}, must be positive")]
    InvalidFrameRate { fps: f32 },

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl ExportError {
    /// True when the scene itself is unsuitable for export
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Write(WriteError::Io(_)))
    }
}
