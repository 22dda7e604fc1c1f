//! End-to-end processing: resolve a grid, extract frames, transform them and
//! reassemble a spritesheet.
//!
//! All geometric and validation errors are raised before the first transform
//! runs; once frames are in flight only per-frame fallbacks can happen.

use image::RgbaImage;
use serde::Serialize;

use crate::config::SpritegridConfig;
use crate::error::{Result, SpriteError};
use crate::extract::{extract_animated, extract_static, ExtractOptions};
use crate::gif::decode_animation;
use crate::grid::{analyze, Analysis};
use crate::models::{
    auto_grid, row_grid, BatchSummary, Frame, GridLayout, GridSpec, ProcessingResult, SourceImage,
};
use crate::runner::{process_batch, FrameTransform};
use crate::spritesheet::{reassemble, Reassembled};

/// Kind of input a sheet was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Spritesheet,
    Animation,
}

/// Description of a reassembled sheet, written next to it as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetMetadata {
    pub input_type: InputKind,
    /// Grid of the output sheet, `"COLSxROWS"`
    pub grid: String,
    pub frames: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Inference confidence; absent when the grid was declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub transform: String,
    pub failed_frames: Vec<usize>,
    pub spritesheet_width: u32,
    pub spritesheet_height: u32,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub image: RgbaImage,
    /// Processed frames in index order, for animation re-encoding
    pub frames: Vec<RgbaImage>,
    pub metadata: SheetMetadata,
    pub summary: BatchSummary,
}

/// Frames cut from a static sheet together with the layout used.
#[derive(Debug, Clone)]
pub struct SheetExtraction {
    pub layout: GridLayout,
    pub confidence: Option<f64>,
    pub frames: Vec<Frame>,
}

/// Processing pipeline bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: SpritegridConfig,
}

impl Pipeline {
    pub fn new(config: SpritegridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpritegridConfig {
        &self.config
    }

    pub fn analyze(&self, image: &SourceImage) -> Result<Analysis> {
        analyze(image, &self.config)
    }

    /// Turn a grid request into a concrete layout for `image`.
    ///
    /// Inferred grids are re-derived from the canvas (`tile = canvas / count`)
    /// and keep the inference confidence.
    pub fn resolve_layout(
        &self,
        image: &SourceImage,
        grid: &GridSpec,
    ) -> Result<(GridLayout, Option<f64>)> {
        let (width, height) = image.dimensions();
        match *grid {
            GridSpec::Auto => {
                let analysis = self.analyze(image)?;
                let inferred = analysis.grid;
                let layout = GridLayout::for_canvas(inferred.cols, inferred.rows, width, height)?
                    .with_confidence(inferred.confidence);
                Ok((layout, Some(inferred.confidence)))
            }
            GridSpec::Explicit { cols, rows } => {
                Ok((GridLayout::for_canvas(cols, rows, width, height)?, None))
            }
            GridSpec::FrameSize { width: fw, height: fh } => {
                Ok((GridLayout::from_frame_size(fw, fh, width, height)?, None))
            }
            GridSpec::Fixed { cols, rows, width: fw, height: fh } => {
                Ok((GridLayout::new(cols, rows, fw, fh)?, None))
            }
        }
    }

    /// Resolve the layout and cut the frames out of a static sheet.
    pub fn extract_sheet(
        &self,
        image: &SourceImage,
        grid: &GridSpec,
        opts: ExtractOptions,
    ) -> Result<SheetExtraction> {
        let (layout, confidence) = self.resolve_layout(image, grid)?;
        let frames = extract_static(image, &layout, opts, self.config.limits.max_frames)?;
        Ok(SheetExtraction { layout, confidence, frames })
    }

    /// Process a static spritesheet and rebuild it on the same grid.
    pub fn process_sheet(
        &self,
        image: &SourceImage,
        grid: &GridSpec,
        opts: ExtractOptions,
        transform: &dyn FrameTransform,
    ) -> Result<ProcessOutput> {
        let extraction = self.extract_sheet(image, grid, opts)?;
        let layout = extraction.layout;
        tracing::info!(
            grid = %layout.grid_label(),
            tile_w = layout.tile_w,
            tile_h = layout.tile_h,
            frames = extraction.frames.len(),
            "extracted spritesheet frames"
        );
        self.finish(
            InputKind::Spritesheet,
            &extraction.frames,
            (layout.cols, layout.rows),
            (layout.tile_w, layout.tile_h),
            extraction.confidence,
            transform,
        )
    }

    /// Process an animation (GIF, APNG, WebP, or a still image) into a sheet.
    ///
    /// An explicit grid is honoured when it can hold every frame and expanded
    /// otherwise; any other grid request lays frames out near-square. A declared
    /// grid with more slots than `limits.max_frames` is rejected up front.
    pub fn process_animation(
        &self,
        bytes: &[u8],
        opts: ExtractOptions,
        grid: &GridSpec,
        transform: &dyn FrameTransform,
    ) -> Result<ProcessOutput> {
        let cap = self.config.limits.max_frames;
        let declared = self.declared_grid(grid)?;

        let sequence = decode_animation(bytes)?;
        let frames = extract_animated(&sequence, opts, cap)?;
        let tile = frames.first().map(Frame::dimensions).unwrap_or((1, 1));
        let grid = self.output_grid(frames.len(), declared);
        tracing::info!(
            frames = frames.len(),
            source_frames = sequence.len(),
            width = tile.0,
            height = tile.1,
            "extracted animation frames"
        );
        self.finish(InputKind::Animation, &frames, grid, tile, None, transform)
    }

    /// Build a sheet from loose frame images, in the order given.
    ///
    /// Tiles are as large as the largest frame; smaller frames sit in the
    /// top-left corner of their tile. Grids follow the same rules as
    /// [`Pipeline::process_animation`].
    pub fn join_frames(&self, frames: Vec<RgbaImage>, grid: &GridSpec) -> Result<Reassembled> {
        if frames.is_empty() {
            return Err(SpriteError::ReassemblyImpossible);
        }
        let cap = self.config.limits.max_frames;
        if frames.len() > cap {
            return Err(SpriteError::rejected(format!(
                "{} frames exceed the limit of {}",
                frames.len(),
                cap
            )));
        }
        let declared = self.declared_grid(grid)?;
        let tile_w = frames.iter().map(RgbaImage::width).max().unwrap_or(1);
        let tile_h = frames.iter().map(RgbaImage::height).max().unwrap_or(1);
        let (cols, rows) = self.output_grid(frames.len(), declared);

        let results: Vec<ProcessingResult> = frames
            .into_iter()
            .enumerate()
            .map(|(index, image)| ProcessingResult::Transformed { index, image })
            .collect();
        reassemble(&results, cols, rows, tile_w, tile_h)
    }

    /// Explicit `cols × rows` of a grid request, rejected when it has more
    /// slots than `limits.max_frames`.
    fn declared_grid(&self, grid: &GridSpec) -> Result<Option<(u32, u32)>> {
        let cap = self.config.limits.max_frames;
        let declared = match *grid {
            GridSpec::Explicit { cols, rows } | GridSpec::Fixed { cols, rows, .. } => {
                Some((cols, rows))
            }
            GridSpec::Auto | GridSpec::FrameSize { .. } => None,
        };
        if let Some((cols, rows)) = declared {
            let slots = cols as usize * rows as usize;
            if slots > cap {
                return Err(SpriteError::rejected(format!(
                    "a {}x{} grid has {} slots, more than the limit of {}",
                    cols, rows, slots, cap
                )));
            }
        }
        Ok(declared)
    }

    /// Grid for `n` frames without a source layout: the declared one, rows of
    /// `output.frames_per_row`, or near-square.
    fn output_grid(&self, n: usize, declared: Option<(u32, u32)>) -> (u32, u32) {
        match (declared, self.config.output.frames_per_row) {
            (Some(grid), _) => grid,
            (None, Some(per_row)) => row_grid(n, per_row),
            (None, None) => auto_grid(n),
        }
    }

    fn finish(
        &self,
        input_type: InputKind,
        frames: &[Frame],
        (cols, rows): (u32, u32),
        (tile_w, tile_h): (u32, u32),
        confidence: Option<f64>,
        transform: &dyn FrameTransform,
    ) -> Result<ProcessOutput> {
        let results = process_batch(
            frames,
            transform,
            self.config.runner.worker_count(),
            self.config.limits.max_frames,
        )?;
        let summary = BatchSummary::from_results(&results);
        if !summary.any_succeeded() {
            tracing::warn!(frames = results.len(), "transform failed on every frame");
        }
        let (cols, rows) = match self.config.output.frames_per_row {
            Some(per_row) => row_grid(results.len(), per_row),
            None => (cols, rows),
        };
        let sheet = reassemble(&results, cols, rows, tile_w, tile_h)?;

        let metadata = SheetMetadata {
            input_type,
            grid: format!("{}x{}", sheet.cols, sheet.rows),
            frames: results.len(),
            frame_width: tile_w,
            frame_height: tile_h,
            confidence,
            transform: transform.name().to_string(),
            failed_frames: summary.failed.clone(),
            spritesheet_width: sheet.image.width(),
            spritesheet_height: sheet.image.height(),
        };
        let frames = results.into_iter().map(|r| r.into_image()).collect();

        Ok(ProcessOutput { image: sheet.image, frames, metadata, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Identity;
    use image::Rgba;

    fn checker(cols: u32, rows: u32, tile: u32) -> SourceImage {
        SourceImage::from_rgba(RgbaImage::from_fn(cols * tile, rows * tile, |x, y| {
            let i = (y / tile) * cols + x / tile;
            Rgba([i as u8 * 20, 40, 60, 255])
        }))
    }

    #[test]
    fn test_explicit_grid_roundtrip() {
        let sheet = checker(4, 2, 8);
        let grid = GridSpec::Explicit { cols: 4, rows: 2 };
        let out = Pipeline::default()
            .process_sheet(&sheet, &grid, ExtractOptions::default(), &Identity)
            .unwrap();
        assert_eq!(&out.image, sheet.pixels());
        assert_eq!(out.metadata.grid, "4x2");
        assert_eq!(out.metadata.frames, 8);
        assert_eq!(out.metadata.confidence, None);
        assert_eq!(out.metadata.input_type, InputKind::Spritesheet);
        assert!(out.summary.failed.is_empty());
    }

    #[test]
    fn test_frame_size_grid() {
        let sheet = checker(3, 3, 10);
        let pipeline = Pipeline::default();
        let grid = GridSpec::FrameSize { width: 10, height: 15 };
        let (layout, _) = pipeline.resolve_layout(&sheet, &grid).unwrap();
        assert_eq!((layout.cols, layout.rows, layout.tile_w, layout.tile_h), (3, 2, 10, 15));
    }

    #[test]
    fn test_fixed_grid_that_does_not_fit_is_rejected() {
        let sheet = SourceImage::from_rgba(RgbaImage::new(100, 50));
        let grid = GridSpec::Fixed { cols: 10, rows: 10, width: 10, height: 10 };
        let err = Pipeline::default()
            .process_sheet(&sheet, &grid, ExtractOptions::default(), &Identity)
            .unwrap_err();
        assert!(err.is_input_rejected());
    }

    #[test]
    fn test_explicit_grid_larger_than_canvas_is_rejected() {
        let sheet = SourceImage::from_rgba(RgbaImage::new(4, 4));
        let err = Pipeline::default()
            .resolve_layout(&sheet, &GridSpec::Explicit { cols: 8, rows: 1 })
            .unwrap_err();
        assert!(err.is_input_rejected());
    }

    #[test]
    fn test_animation_grid_over_frame_limit_is_rejected() {
        let frames: Vec<RgbaImage> = (0..2).map(|_| RgbaImage::new(8, 8)).collect();
        let bytes = crate::gif::encode_animation(&frames, 10, true).unwrap();
        let huge: GridSpec = "1073741824x1".parse().unwrap();
        let err = Pipeline::default()
            .process_animation(&bytes, ExtractOptions::default(), &huge, &Identity)
            .unwrap_err();
        assert!(err.is_input_rejected());

        let fixed = GridSpec::Fixed { cols: 600, rows: 1, width: 8, height: 8 };
        let err = Pipeline::default()
            .process_animation(&bytes, ExtractOptions::default(), &fixed, &Identity)
            .unwrap_err();
        assert!(err.is_input_rejected());
    }

    #[test]
    fn test_frames_per_row_relays_sheet() {
        let mut config = SpritegridConfig::default();
        config.output.frames_per_row = Some(3);
        let sheet = checker(4, 2, 8);
        let grid = GridSpec::Explicit { cols: 4, rows: 2 };
        let out = Pipeline::new(config)
            .process_sheet(&sheet, &grid, ExtractOptions::default(), &Identity)
            .unwrap();
        assert_eq!(out.metadata.grid, "3x3");
        assert_eq!(out.image.dimensions(), (24, 24));
        // frame 3 starts the second row
        assert_eq!(out.image.get_pixel(0, 8), sheet.pixels().get_pixel(24, 0));
    }

    #[test]
    fn test_join_frames_uses_largest_tile() {
        let frames = vec![
            RgbaImage::from_pixel(4, 6, Rgba([255, 0, 0, 255])),
            RgbaImage::from_pixel(8, 2, Rgba([0, 255, 0, 255])),
            RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])),
        ];
        let sheet = Pipeline::default().join_frames(frames, &GridSpec::Auto).unwrap();
        assert_eq!((sheet.cols, sheet.rows), (2, 2));
        assert_eq!(sheet.image.dimensions(), (16, 12));
        assert_eq!(sheet.image.get_pixel(8, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(sheet.image.get_pixel(8, 3)[3], 0);
        assert_eq!(sheet.image.get_pixel(1, 7), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_join_frames_rejects_empty_and_oversized_grids() {
        let pipeline = Pipeline::default();
        assert!(matches!(
            pipeline.join_frames(Vec::new(), &GridSpec::Auto),
            Err(SpriteError::ReassemblyImpossible)
        ));
        let err = pipeline
            .join_frames(vec![RgbaImage::new(2, 2)], &GridSpec::Explicit { cols: 4096, rows: 4096 })
            .unwrap_err();
        assert!(err.is_input_rejected());
    }

    #[test]
    fn test_metadata_json_shape() {
        let sheet = checker(2, 1, 4);
        let grid = GridSpec::Explicit { cols: 2, rows: 1 };
        let out = Pipeline::default()
            .process_sheet(&sheet, &grid, ExtractOptions::default(), &Identity)
            .unwrap();
        let json = serde_json::to_value(&out.metadata).unwrap();
        assert_eq!(json["input_type"], "spritesheet");
        assert_eq!(json["spritesheet_width"], 8);
        assert!(json.get("confidence").is_none());
    }
}
