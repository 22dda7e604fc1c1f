//! Per-frame transform runner.
//!
//! Every frame goes through the transform independently. A failing frame
//! (error, panic, or an output of the wrong size) keeps its original pixels
//! and is reported as a [`ProcessingResult::Fallback`]; it never aborts the
//! batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{Result, SpriteError, TransformError};
use crate::models::{BatchSummary, Frame, ProcessingResult};

/// A per-frame image operation, typically background removal.
///
/// Implementations must return an image with the same dimensions as the
/// input frame. They are shared across worker threads.
pub trait FrameTransform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError>;
}

/// Run the transform on a single frame, falling back to the original on failure.
pub fn process_one(frame: &Frame, transform: &dyn FrameTransform) -> ProcessingResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| transform.apply(&frame.image)))
        .unwrap_or_else(|payload| Err(TransformError::Panicked(panic_message(payload.as_ref()))))
        .and_then(|image| {
            if image.dimensions() == frame.dimensions() {
                Ok(image)
            } else {
                Err(TransformError::DimensionMismatch {
                    expected: frame.dimensions(),
                    actual: image.dimensions(),
                })
            }
        });

    match outcome {
        Ok(image) => ProcessingResult::Transformed { index: frame.index, image },
        Err(error) => {
            tracing::warn!(
                index = frame.index,
                transform = transform.name(),
                %error,
                "frame transform failed, keeping original"
            );
            ProcessingResult::fallback(frame, error)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "transform panicked".to_string()
    }
}

/// Run the transform over a batch on a dedicated pool of `jobs` threads.
///
/// Batches larger than `cap` are rejected before any work starts. Results are
/// ordered by frame index whatever order the workers finish in.
pub fn process_batch(
    frames: &[Frame],
    transform: &dyn FrameTransform,
    jobs: usize,
    cap: usize,
) -> Result<Vec<ProcessingResult>> {
    if frames.len() > cap {
        return Err(SpriteError::rejected(format!(
            "batch of {} frames exceeds the limit of {}",
            frames.len(),
            cap
        )));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("spritegrid-worker-{}", i))
        .build()?;

    let mut results: Vec<ProcessingResult> =
        pool.install(|| frames.par_iter().map(|frame| process_one(frame, transform)).collect());
    results.sort_by_key(ProcessingResult::index);

    let summary = BatchSummary::from_results(&results);
    tracing::info!(
        transform = transform.name(),
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "processed batch"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct Invert;

    impl FrameTransform for Invert {
        fn name(&self) -> &str {
            "invert"
        }

        fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
            let mut out = frame.clone();
            for px in out.pixels_mut() {
                px[0] = 255 - px[0];
            }
            Ok(out)
        }
    }

    /// Fails on frames whose red channel matches `bad`.
    struct FailOn {
        bad: u8,
        panic: bool,
    }

    impl FrameTransform for FailOn {
        fn name(&self) -> &str {
            "fail-on"
        }

        fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
            if frame.get_pixel(0, 0)[0] == self.bad {
                if self.panic {
                    panic!("boom on {}", self.bad);
                }
                return Err(TransformError::Failed("refused".into()));
            }
            Ok(frame.clone())
        }
    }

    struct Shrink;

    impl FrameTransform for Shrink {
        fn name(&self) -> &str {
            "shrink"
        }

        fn apply(&self, _frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, RgbaImage::from_pixel(4, 4, Rgba([i as u8, 0, 0, 255]))))
            .collect()
    }

    #[test]
    fn test_batch_preserves_order() {
        let results = process_batch(&frames(20), &Invert, 4, 512).unwrap();
        assert_eq!(results.len(), 20);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.index(), i);
            assert!(r.succeeded());
            assert_eq!(r.image().get_pixel(0, 0)[0], 255 - i as u8);
        }
    }

    #[test]
    fn test_failure_falls_back_to_original() {
        let input = frames(5);
        let results = process_batch(&input, &FailOn { bad: 2, panic: false }, 2, 512).unwrap();
        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, vec![2]);
        assert_eq!(results[2].image(), &input[2].image);
        assert!(matches!(results[2].transform_error(), Some(TransformError::Failed(_))));
    }

    #[test]
    fn test_panic_is_isolated() {
        let results = process_batch(&frames(5), &FailOn { bad: 3, panic: true }, 2, 512).unwrap();
        assert_eq!(results.len(), 5);
        match results[3].transform_error() {
            Some(TransformError::Panicked(msg)) => assert!(msg.contains("boom on 3")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(results.iter().enumerate().all(|(i, r)| i == 3 || r.succeeded()));
    }

    #[test]
    fn test_dimension_mismatch_is_a_fallback() {
        let frame = Frame::new(0, RgbaImage::new(4, 3));
        let result = process_one(&frame, &Shrink);
        assert!(!result.succeeded());
        assert!(matches!(
            result.transform_error(),
            Some(TransformError::DimensionMismatch { expected: (4, 3), actual: (1, 1) })
        ));
        assert_eq!(result.image().dimensions(), (4, 3));
    }

    #[test]
    fn test_batch_over_cap_is_rejected() {
        let err = process_batch(&frames(6), &Invert, 1, 5).unwrap_err();
        assert!(err.is_input_rejected());
    }

    #[test]
    fn test_empty_batch() {
        assert!(process_batch(&[], &Invert, 1, 5).unwrap().is_empty());
    }
}
