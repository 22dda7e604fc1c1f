//! Spritesheet reassembly - places processed frames back into a grid

use image::{imageops, RgbaImage};

use crate::error::{Result, SpriteError};
use crate::models::{auto_grid, ProcessingResult};

/// A reassembled sheet and the grid actually used.
#[derive(Debug, Clone, PartialEq)]
pub struct Reassembled {
    pub image: RgbaImage,
    pub cols: u32,
    pub rows: u32,
}

/// Place processed frames into a `cols × rows` grid of `tile_w × tile_h` tiles.
///
/// Frame `i` lands at `((i mod cols) * tile_w, (i div cols) * tile_h)`. Pixels
/// are copied, not blended, and clipped to the tile. Unused slots stay fully
/// transparent.
///
/// When the requested grid cannot hold every frame it is replaced by a
/// near-square one (see [`auto_grid`]). A grid whose pixel size overflows
/// is rejected rather than truncated.
///
/// # Examples
///
/// ```
/// use image::{Rgba, RgbaImage};
/// use spritegrid::models::ProcessingResult;
/// use spritegrid::spritesheet::reassemble;
///
/// let results: Vec<ProcessingResult> = (0..4)
///     .map(|index| ProcessingResult::Transformed {
///         index,
///         image: RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])),
///     })
///     .collect();
///
/// let sheet = reassemble(&results, 2, 2, 2, 2).unwrap();
/// assert_eq!(sheet.image.dimensions(), (4, 4));
/// ```
pub fn reassemble(
    results: &[ProcessingResult],
    cols: u32,
    rows: u32,
    tile_w: u32,
    tile_h: u32,
) -> Result<Reassembled> {
    if results.is_empty() {
        return Err(SpriteError::ReassemblyImpossible);
    }
    if tile_w == 0 || tile_h == 0 {
        return Err(SpriteError::rejected(format!(
            "tile size must be positive, got {}x{}",
            tile_w, tile_h
        )));
    }

    let n = results.len();
    let (cols, rows) = if cols == 0 || rows == 0 || (cols as usize * rows as usize) < n {
        let expanded = auto_grid(n);
        tracing::info!(
            requested = %format!("{}x{}", cols, rows),
            expanded = %format!("{}x{}", expanded.0, expanded.1),
            frames = n,
            "grid too small for frames, expanding"
        );
        expanded
    } else {
        (cols, rows)
    };

    let (width, height) = match (cols.checked_mul(tile_w), rows.checked_mul(tile_h)) {
        (Some(w), Some(h)) if buffer_fits(w, h) => (w, h),
        _ => {
            return Err(SpriteError::rejected(format!(
                "a {}x{} grid of {}x{} tiles is too large for one image",
                cols, rows, tile_w, tile_h
            )))
        }
    };

    let mut sheet = RgbaImage::new(width, height);
    for (slot, result) in results.iter().enumerate() {
        let col = slot as u32 % cols;
        let row = slot as u32 / cols;
        let frame = result.image();
        let tile =
            imageops::crop_imm(frame, 0, 0, tile_w.min(frame.width()), tile_h.min(frame.height()));
        let (x, y) = (col as i64 * tile_w as i64, row as i64 * tile_h as i64);
        imageops::replace(&mut sheet, &*tile, x, y);
    }

    Ok(Reassembled { image: sheet, cols, rows })
}

/// Whether an RGBA8 buffer of `width × height` is addressable.
fn buffer_fits(width: u32, height: u32) -> bool {
    (width as u64 * height as u64).checked_mul(4).is_some_and(|bytes| bytes <= isize::MAX as u64)
}
