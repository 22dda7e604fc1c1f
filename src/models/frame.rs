//! Frames and per-frame processing outcomes.

use image::RgbaImage;

use crate::error::{SpriteError, TransformError};

/// One extracted frame. `index` is row-major for sheet tiles and temporal
/// for animation frames; frames never reference their siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub image: RgbaImage,
}

impl Frame {
    pub fn new(index: usize, image: RgbaImage) -> Self {
        Self { index, image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Outcome of running the transform on one frame.
///
/// Both variants carry a usable image, so the reassembler never sees a hole.
#[derive(Debug)]
pub enum ProcessingResult {
    /// The transform succeeded.
    Transformed { index: usize, image: RgbaImage },
    /// The transform failed; `image` is the untransformed original and
    /// `error` is always [`SpriteError::FrameTransformFailed`].
    Fallback { index: usize, image: RgbaImage, error: SpriteError },
}

impl ProcessingResult {
    /// Keep `frame` unchanged after its transform failed with `source`.
    pub fn fallback(frame: &Frame, source: TransformError) -> Self {
        ProcessingResult::Fallback {
            index: frame.index,
            image: frame.image.clone(),
            error: SpriteError::FrameTransformFailed { index: frame.index, source },
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Transformed { index, .. } | Self::Fallback { index, .. } => *index,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        match self {
            Self::Transformed { image, .. } | Self::Fallback { image, .. } => image,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        match self {
            Self::Transformed { image, .. } | Self::Fallback { image, .. } => image,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessingResult::Transformed { .. })
    }

    pub fn error(&self) -> Option<&SpriteError> {
        match self {
            ProcessingResult::Transformed { .. } => None,
            ProcessingResult::Fallback { error, .. } => Some(error),
        }
    }

    /// The transform failure behind a fallback.
    pub fn transform_error(&self) -> Option<&TransformError> {
        match self.error()? {
            SpriteError::FrameTransformFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Aggregate counts over a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<usize>,
}

impl BatchSummary {
    pub fn from_results(results: &[ProcessingResult]) -> Self {
        let failed: Vec<usize> =
            results.iter().filter(|r| !r.succeeded()).map(ProcessingResult::index).collect();
        Self { total: results.len(), succeeded: results.len() - failed.len(), failed }
    }

    /// Partial success: at least one frame transformed.
    pub fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }
}
