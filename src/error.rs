//! Error types for sprite analysis, extraction and reassembly

use thiserror::Error;

use crate::models::BoundingBox;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpriteError>;

/// Batch-level errors.
///
/// Geometric and validation problems are raised before any frame work starts.
/// Per-frame transform failures never surface here directly: they are kept
/// inside [`crate::models::ProcessingResult::Fallback`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpriteError {
    /// The caller supplied something unusable (bad grid string, grid that
    /// does not fit the canvas, empty payload, oversized batch).
    #[error("Input rejected: {0}")]
    InputRejected(String),

    /// The mask builder found no foreground pixels at all.
    #[error("No foreground detected in {width}x{height} image")]
    NoForegroundDetected { width: u32, height: u32 },

    /// Foreground exists but no component survived the area/size filters.
    #[error(
        "No sprites detected ({foreground_pixels} foreground pixels inside crop {x},{y} {w}x{h})",
        x = crop.x, y = crop.y, w = crop.w, h = crop.h
    )]
    NoSpritesDetected { crop: BoundingBox, foreground_pixels: usize },

    /// A single frame's transform failed. Recovered locally by the runner.
    #[error("Transform failed for frame {index}: {source}")]
    FrameTransformFailed {
        index: usize,
        #[source]
        source: TransformError,
    },

    /// Nothing reached the reassembler.
    #[error("Cannot reassemble spritesheet: no processed frames")]
    ReassemblyImpossible,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl SpriteError {
    /// Shorthand for [`SpriteError::InputRejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        SpriteError::InputRejected(message.into())
    }

    /// Whether this error is the caller's fault (maps to exit code 2).
    pub fn is_input_rejected(&self) -> bool {
        matches!(self, SpriteError::InputRejected(_))
    }
}

/// Failure of the external per-frame transform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformError {
    /// The transform reported an error.
    #[error("{0}")]
    Failed(String),

    /// The transform panicked; the payload message is kept when it is a string.
    #[error("transform panicked: {0}")]
    Panicked(String),

    /// The transform returned an image of a different size than its input.
    #[error(
        "transform returned {}x{} for a {}x{} frame",
        actual.0, actual.1, expected.0, expected.1
    )]
    DimensionMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// External command exited unsuccessfully.
    #[error("command exited with {status}: {stderr}")]
    Command { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sprites_message_includes_crop() {
        let err = SpriteError::NoSpritesDetected {
            crop: BoundingBox::new(4, 5, 10, 12),
            foreground_pixels: 37,
        };
        let msg = err.to_string();
        assert!(msg.contains("37 foreground pixels"));
        assert!(msg.contains("4,5 10x12"));
    }

    #[test]
    fn test_input_rejected_classification() {
        assert!(SpriteError::rejected("bad grid").is_input_rejected());
        assert!(!SpriteError::ReassemblyImpossible.is_input_rejected());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = TransformError::DimensionMismatch { expected: (32, 32), actual: (16, 8) };
        assert_eq!(err.to_string(), "transform returned 16x8 for a 32x32 frame");
    }
}
