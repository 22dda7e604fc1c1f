//! Frame extraction from static sheets and animation sequences.

use image::{imageops, RgbaImage};

use crate::error::{Result, SpriteError};
use crate::models::{Frame, GridLayout, SourceImage};

/// Frame selection applied after extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep at most this many frames
    pub max_frames: Option<usize>,
    /// Spread the kept frames evenly over the sequence instead of taking the head
    pub even_sample: bool,
}

impl ExtractOptions {
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_even_sample(mut self, even_sample: bool) -> Self {
        self.even_sample = even_sample;
        self
    }
}

/// Crop the declared tiles of `layout` out of a static sheet, row-major.
///
/// The whole grid must fit the canvas; a layout that would read past the
/// right or bottom edge is rejected before anything is cropped.
pub fn extract_static(
    image: &SourceImage,
    layout: &GridLayout,
    opts: ExtractOptions,
    cap: usize,
) -> Result<Vec<Frame>> {
    let (width, height) = image.dimensions();
    let frames_per_row = width / layout.tile_w;
    let frames_per_col = height / layout.tile_h;
    if frames_per_row < layout.cols || frames_per_col < layout.rows {
        return Err(SpriteError::rejected(format!(
            "a {} grid of {}x{} tiles does not fit a {}x{} image ({} per row, {} per column)",
            layout.grid_label(),
            layout.tile_w,
            layout.tile_h,
            width,
            height,
            frames_per_row,
            frames_per_col
        )));
    }

    let pixels = image.pixels();
    let mut tiles = Vec::with_capacity(layout.capacity());
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let view = imageops::crop_imm(
                pixels,
                col * layout.tile_w,
                row * layout.tile_h,
                layout.tile_w,
                layout.tile_h,
            );
            tiles.push(view.to_image());
        }
    }
    tracing::debug!(grid = %layout.grid_label(), tiles = tiles.len(), "cropped sheet tiles");

    finish(tiles, opts, cap)
}

/// Normalize every frame of an animation onto a shared transparent canvas.
///
/// The canvas is as large as the largest frame on each axis; smaller frames
/// are anchored at the top-left corner.
pub fn extract_animated(
    sequence: &[SourceImage],
    opts: ExtractOptions,
    cap: usize,
) -> Result<Vec<Frame>> {
    if sequence.is_empty() {
        return Err(SpriteError::rejected("animation contains no frames"));
    }
    let max_w = sequence.iter().map(SourceImage::width).max().unwrap_or(1);
    let max_h = sequence.iter().map(SourceImage::height).max().unwrap_or(1);

    let frames = sequence
        .iter()
        .map(|src| {
            if src.dimensions() == (max_w, max_h) {
                src.pixels().clone()
            } else {
                let mut canvas = RgbaImage::new(max_w, max_h);
                imageops::replace(&mut canvas, src.pixels(), 0, 0);
                canvas
            }
        })
        .collect();

    finish(frames, opts, cap)
}

/// Apply selection, renumber, and enforce the batch cap.
fn finish(images: Vec<RgbaImage>, opts: ExtractOptions, cap: usize) -> Result<Vec<Frame>> {
    let total = images.len();
    let selected: Vec<RgbaImage> = match opts.max_frames {
        Some(m) if m < total && opts.even_sample => {
            let keep = even_sample_indices(total, m);
            let mut images: Vec<Option<RgbaImage>> = images.into_iter().map(Some).collect();
            keep.into_iter().filter_map(|i| images[i].take()).collect()
        }
        Some(m) => images.into_iter().take(m).collect(),
        None => images,
    };

    if selected.is_empty() {
        return Err(SpriteError::rejected("no frames extracted"));
    }
    if selected.len() > cap {
        return Err(SpriteError::rejected(format!(
            "{} frames exceed the limit of {}",
            selected.len(),
            cap
        )));
    }
    if selected.len() < total {
        tracing::debug!(from = total, to = selected.len(), "selected frames");
    }

    Ok(selected.into_iter().enumerate().map(|(i, image)| Frame::new(i, image)).collect())
}

/// `m` indices spread evenly over `0..n`, first and last included.
///
/// Returns every index when `m >= n`. Duplicates produced by rounding are
/// removed, so the result may be shorter than `m`.
pub fn even_sample_indices(n: usize, m: usize) -> Vec<usize> {
    if m >= n {
        return (0..n).collect();
    }
    match m {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let step = (n - 1) as f64 / (m - 1) as f64;
            let mut indices: Vec<usize> =
                (0..m).map(|k| (k as f64 * step).round() as usize).collect();
            indices.dedup();
            indices
        }
    }
}
