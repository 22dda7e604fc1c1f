//! Grid inference from detected sprite boxes.
//!
//! Given blob bounding boxes from a spritesheet of unknown structure, estimate
//! how the sprites are laid out:
//!
//! 1. Greedily cluster vertical centers into rows (join distance scales with
//!    the median box height) and assign every box to its nearest row.
//! 2. Columns are the median per-row count, re-derived from horizontal
//!    clustering when rows x cols explains too few of the boxes.
//! 3. Tile size is the median box size; pitch (center spacing, gutters
//!    included) is reported separately.
//! 4. A confidence score blends size regularity, pitch regularity and fill.
//!
//! Confidence is advisory. Callers show it to the user instead of accepting
//! or rejecting a layout on it.

use serde::Serialize;

use crate::components::extract_components;
use crate::config::{InferenceConfig, SpritegridConfig};
use crate::error::{Result, SpriteError};
use crate::mask::build_foreground_mask;
use crate::models::{BoundingBox, GridLayout, SourceImage};

const SIZE_WEIGHT: f64 = 0.45;
const PITCH_WEIGHT: f64 = 0.25;
const FILL_WEIGHT: f64 = 0.15;
const CONFIDENCE_FLOOR: f64 = 0.15;
/// Spread assumed for a pitch series that has no gaps to measure.
const MISSING_PITCH_SPREAD: f64 = 0.5;
/// Pitch fallback when a row or column has a single box.
const PITCH_FALLBACK_FACTOR: f64 = 1.2;

/// Width/height pair used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent<T> {
    pub w: T,
    pub h: T,
}

/// Everything the inference learned besides the layout itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub canvas: Extent<u32>,
    /// Foreground envelope the component scan ran on
    pub content_crop: BoundingBox,
    pub foreground_pixels: usize,
    pub detected_sprites: usize,
    pub median_bbox: Extent<u32>,
    /// Center-to-center spacing, gutters included
    pub median_pitch: Extent<u32>,
    /// Rows and columns before the frame cap was applied
    pub rows_detected: u32,
    pub cols_detected: u32,
    /// Columns were re-derived by horizontal clustering
    pub column_correction: bool,
    /// The grid was scaled down to respect the frame cap
    pub capped: bool,
    pub suggestions: Vec<LayoutSuggestion>,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub grid: GridLayout,
    /// Detected boxes in row-major order, truncated to the frame cap
    pub boxes: Vec<BoundingBox>,
    pub diagnostics: Diagnostics,
}

/// Intermediate result of [`infer_grid`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridEstimate {
    pub grid: GridLayout,
    /// Boxes grouped by row, each row sorted left to right
    pub rows: Vec<Vec<BoundingBox>>,
    pub median_w: f64,
    pub median_h: f64,
    pub pitch_x: f64,
    pub pitch_y: f64,
    pub rows_detected: u32,
    pub cols_detected: u32,
    pub column_correction: bool,
    pub capped: bool,
}

impl GridEstimate {
    /// All boxes that survived filtering, row-major.
    pub fn row_major(&self) -> Vec<BoundingBox> {
        self.rows.iter().flatten().copied().collect()
    }

    pub fn box_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Run mask building, component extraction and grid inference on one image.
pub fn analyze(image: &SourceImage, config: &SpritegridConfig) -> Result<Analysis> {
    let mask = build_foreground_mask(image, &config.mask)?;
    let scan = extract_components(&mask, &config.components)?;
    let cap = config.limits.max_frames;

    let estimate = infer_grid(&scan.boxes, &config.inference, cap).ok_or(
        SpriteError::NoSpritesDetected {
            crop: scan.crop,
            foreground_pixels: scan.foreground_pixels,
        },
    )?;

    let mut boxes = estimate.row_major();
    boxes.truncate(cap);

    let (width, height) = image.dimensions();
    let grid = estimate.grid;
    tracing::info!(
        grid = %grid.grid_label(),
        tile_w = grid.tile_w,
        tile_h = grid.tile_h,
        confidence = grid.confidence,
        sprites = estimate.box_count(),
        "inferred grid"
    );

    Ok(Analysis {
        grid,
        boxes,
        diagnostics: Diagnostics {
            canvas: Extent { w: width, h: height },
            content_crop: scan.crop,
            foreground_pixels: scan.foreground_pixels,
            detected_sprites: estimate.box_count(),
            median_bbox: Extent {
                w: estimate.median_w.round() as u32,
                h: estimate.median_h.round() as u32,
            },
            median_pitch: Extent {
                w: estimate.pitch_x.round() as u32,
                h: estimate.pitch_y.round() as u32,
            },
            rows_detected: estimate.rows_detected,
            cols_detected: estimate.cols_detected,
            column_correction: estimate.column_correction,
            capped: estimate.capped,
            suggestions: suggest_layouts(width, height),
        },
    })
}

/// Infer a grid layout from component boxes.
///
/// Returns `None` when no usable box remains, never a degenerate 1x1 guess.
pub fn infer_grid(
    boxes: &[BoundingBox],
    config: &InferenceConfig,
    max_frames: usize,
) -> Option<GridEstimate> {
    if boxes.is_empty() {
        return None;
    }
    let min_tile = config.min_tile;
    let mut boxes = boxes.to_vec();

    let (med_w, med_h) = median_size(&boxes);
    if med_w < min_tile as f64 || med_h < min_tile as f64 {
        boxes.retain(|b| b.w >= min_tile && b.h >= min_tile);
        tracing::debug!(remaining = boxes.len(), min_tile, "dropped undersized boxes");
        if boxes.is_empty() {
            return None;
        }
    }
    let (med_w, med_h) = median_size(&boxes);
    let centers: Vec<(f64, f64)> = boxes.iter().map(BoundingBox::center).collect();

    // Rows: cluster vertical centers, then snap every box to the nearest row.
    let row_thresh = config.min_join_distance.max(config.row_join_factor * med_h);
    let mut ys: Vec<f64> = centers.iter().map(|c| c.1).collect();
    ys.sort_by(f64::total_cmp);
    let row_centers: Vec<f64> =
        group_sorted(&ys, row_thresh).iter().map(|g| mean(g)).collect();

    let mut per_row: Vec<Vec<(f64, BoundingBox)>> = vec![Vec::new(); row_centers.len()];
    for (center, b) in centers.iter().zip(&boxes) {
        let row = nearest(&row_centers, center.1);
        per_row[row].push((center.0, *b));
    }

    let mut rows: Vec<Vec<BoundingBox>> = Vec::new();
    let mut used_centers: Vec<f64> = Vec::new();
    let mut col_counts: Vec<f64> = Vec::new();
    let mut col_steps: Vec<f64> = Vec::new();
    for (row, center) in per_row.into_iter().zip(&row_centers) {
        if row.is_empty() {
            continue;
        }
        let mut row = row;
        row.sort_by(|a, b| a.0.total_cmp(&b.0));
        col_steps.extend(row.windows(2).map(|w| w[1].0 - w[0].0));
        col_counts.push(row.len() as f64);
        used_centers.push(*center);
        rows.push(row.into_iter().map(|(_, b)| b).collect());
    }

    let mut row_count = rows.len() as u32;
    let mut col_count = (median(&col_counts).unwrap_or(1.0).floor() as u32).max(1);

    let mut column_correction = false;
    if ((row_count * col_count) as f64) < boxes.len() as f64 * config.coverage_ratio {
        let col_thresh = config.min_join_distance.max(config.col_join_factor * med_w);
        let mut xs: Vec<f64> = centers.iter().map(|c| c.0).collect();
        xs.sort_by(f64::total_cmp);
        let clusters = group_sorted(&xs, col_thresh).len() as u32;
        if clusters > col_count {
            col_count = clusters;
            column_correction = true;
        }
    }

    used_centers.sort_by(f64::total_cmp);
    let row_gaps: Vec<f64> = used_centers.windows(2).map(|w| w[1] - w[0]).collect();
    let pitch_x = median(&col_steps).unwrap_or(med_w * PITCH_FALLBACK_FACTOR);
    let pitch_y = median(&row_gaps).unwrap_or(med_h * PITCH_FALLBACK_FACTOR);

    let tile_w = (med_w.round() as u32).max(min_tile);
    let tile_h = (med_h.round() as u32).max(min_tile);

    let rows_detected = row_count;
    let cols_detected = col_count;
    let total = row_count as usize * col_count as usize;
    let capped = total > max_frames;
    if capped {
        let scale = (total as f64 / max_frames as f64).sqrt();
        row_count = ((row_count as f64 / scale).round() as u32).max(1);
        col_count = ((col_count as f64 / scale).round() as u32).max(1);
        // Rounding can land just above the cap; trim the longer axis.
        while row_count as usize * col_count as usize > max_frames {
            if col_count >= row_count && col_count > 1 {
                col_count -= 1;
            } else if row_count > 1 {
                row_count -= 1;
            } else {
                break;
            }
        }
        tracing::warn!(
            from = %format!("{}x{}", cols_detected, rows_detected),
            to = %format!("{}x{}", col_count, row_count),
            max_frames,
            "inferred grid exceeds frame cap, scaling down"
        );
    }

    let widths: Vec<f64> = boxes.iter().map(|b| b.w as f64).collect();
    let heights: Vec<f64> = boxes.iter().map(|b| b.h as f64).collect();
    let confidence = confidence_score(
        &widths,
        &heights,
        &col_steps,
        &row_gaps,
        boxes.len(),
        row_count as usize * col_count as usize,
    );

    let grid = GridLayout { cols: col_count, rows: row_count, tile_w, tile_h, confidence };

    Some(GridEstimate {
        grid,
        rows,
        median_w: med_w,
        median_h: med_h,
        pitch_x,
        pitch_y,
        rows_detected,
        cols_detected,
        column_correction,
        capped,
    })
}

/// Blend of size regularity, pitch regularity and fill ratio, in [0, 1].
///
/// With fewer than two boxes size regularity is undefined and contributes
/// nothing; a pitch series with no gaps counts as moderately irregular.
pub fn confidence_score(
    widths: &[f64],
    heights: &[f64],
    col_steps: &[f64],
    row_gaps: &[f64],
    detected: usize,
    slots: usize,
) -> f64 {
    let size_term = if widths.len() < 2 {
        0.0
    } else {
        let spread = (coefficient_of_variation(widths) + coefficient_of_variation(heights)) * 0.5;
        1.0 - spread.min(1.0)
    };

    let series_spread = |s: &[f64]| {
        if s.is_empty() {
            MISSING_PITCH_SPREAD
        } else {
            coefficient_of_variation(s)
        }
    };
    let pitch_spread = series_spread(col_steps) + series_spread(row_gaps);
    let pitch_term = (1.0 - pitch_spread.min(1.0)).max(0.0);

    let fill_term = (detected as f64 / slots.max(1) as f64).min(1.0);

    let raw = CONFIDENCE_FLOOR
        + SIZE_WEIGHT * size_term
        + PITCH_WEIGHT * pitch_term
        + FILL_WEIGHT * fill_term;
    (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

/// A grid layout that evenly divides the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutSuggestion {
    pub grid: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub total_frames: u32,
}

/// Divisor-based layout candidates for a canvas, smallest frame count first.
pub fn suggest_layouts(width: u32, height: u32) -> Vec<LayoutSuggestion> {
    const MAX_DIVISOR: u32 = 20;
    const PER_AXIS: usize = 5;
    const MAX_TOTAL: u32 = 50;
    const MAX_SUGGESTIONS: usize = 10;

    let w_divs = divisors(width, MAX_DIVISOR);
    let h_divs = divisors(height, MAX_DIVISOR);

    let mut suggestions: Vec<LayoutSuggestion> = w_divs
        .iter()
        .take(PER_AXIS)
        .flat_map(|&cols| h_divs.iter().take(PER_AXIS).map(move |&rows| (cols, rows)))
        .filter(|(cols, rows)| cols * rows <= MAX_TOTAL)
        .map(|(cols, rows)| LayoutSuggestion {
            grid: format!("{}x{}", cols, rows),
            frame_width: width / cols,
            frame_height: height / rows,
            total_frames: cols * rows,
        })
        .collect();
    suggestions.sort_by_key(|s| s.total_frames);
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

fn divisors(n: u32, max_divisor: u32) -> Vec<u32> {
    (1..=n.min(max_divisor)).filter(|i| n % i == 0).collect()
}

/// Greedy 1D clustering of sorted values: a new group starts when the gap
/// to the previous value exceeds `thresh`.
fn group_sorted(values: &[f64], thresh: f64) -> Vec<Vec<f64>> {
    let mut groups: Vec<Vec<f64>> = Vec::new();
    for &v in values {
        match groups.last_mut() {
            Some(group) if group.last().is_some_and(|last| (v - last).abs() <= thresh) => {
                group.push(v)
            }
            _ => groups.push(vec![v]),
        }
    }
    groups
}

fn nearest(centers: &[f64], value: f64) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - value).abs().total_cmp(&(b.1 - value).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn median_size(boxes: &[BoundingBox]) -> (f64, f64) {
    let widths: Vec<f64> = boxes.iter().map(|b| b.w as f64).collect();
    let heights: Vec<f64> = boxes.iter().map(|b| b.h as f64).collect();
    (median(&widths).unwrap_or(0.0), median(&heights).unwrap_or(0.0))
}

/// Median with midpoint interpolation for even lengths.
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation over mean.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt() / (m + 1e-6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_boxes(cols: u32, rows: u32, size: u32, pitch: u32) -> Vec<BoundingBox> {
        let mut boxes = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                boxes.push(BoundingBox::new(2 + c * pitch, 2 + r * pitch, size, size));
            }
        }
        boxes
    }

    #[test]
    fn test_regular_grid() {
        let est = infer_grid(&grid_boxes(5, 2, 34, 36), &InferenceConfig::default(), 512).unwrap();
        assert_eq!((est.grid.cols, est.grid.rows), (5, 2));
        assert_eq!((est.grid.tile_w, est.grid.tile_h), (34, 34));
        assert_eq!(est.pitch_x, 36.0);
        assert_eq!(est.pitch_y, 36.0);
        assert!(est.grid.confidence > 0.95, "confidence {}", est.grid.confidence);
        assert!(!est.column_correction);
        assert!(!est.capped);
    }

    #[test]
    fn test_row_major_order_from_shuffled_input() {
        let mut boxes = grid_boxes(3, 2, 20, 30);
        boxes.reverse();
        let est = infer_grid(&boxes, &InferenceConfig::default(), 512).unwrap();
        assert_eq!(est.row_major(), grid_boxes(3, 2, 20, 30));
    }

    #[test]
    fn test_ragged_rows_use_median_count() {
        // Rows of 4, 4 and 2 sprites: median is 4 columns.
        let mut boxes = grid_boxes(4, 2, 20, 30);
        boxes.push(BoundingBox::new(2, 62, 20, 20));
        boxes.push(BoundingBox::new(32, 62, 20, 20));
        let est = infer_grid(&boxes, &InferenceConfig::default(), 512).unwrap();
        assert_eq!((est.grid.cols, est.grid.rows), (4, 3));
        // 10 sprites in 12 slots
        assert!(est.grid.confidence < 1.0);
    }

    #[test]
    fn test_column_correction_for_uneven_rows() {
        // One full row of six above three rows holding a single sprite each:
        // the median count (1) explains too few boxes, so columns are re-clustered.
        let mut boxes: Vec<BoundingBox> =
            (0..6).map(|i| BoundingBox::new(i * 40, 0, 20, 20)).collect();
        for r in 1..4 {
            boxes.push(BoundingBox::new(0, r * 40, 20, 20));
        }
        let est = infer_grid(&boxes, &InferenceConfig::default(), 512).unwrap();
        assert_eq!(est.grid.rows, 4);
        assert!(est.column_correction);
        assert_eq!(est.grid.cols, 6);
    }

    #[test]
    fn test_small_boxes_are_filtered() {
        let mut boxes = grid_boxes(2, 1, 40, 50);
        for i in 0..5 {
            boxes.push(BoundingBox::new(200 + i * 10, 0, 4, 4));
        }
        let est = infer_grid(&boxes, &InferenceConfig::default(), 512).unwrap();
        assert_eq!(est.box_count(), 2);
        assert_eq!((est.grid.cols, est.grid.rows), (2, 1));
    }

    #[test]
    fn test_only_small_boxes_fails() {
        let boxes: Vec<BoundingBox> = (0..4).map(|i| BoundingBox::new(i * 10, 0, 5, 5)).collect();
        assert!(infer_grid(&boxes, &InferenceConfig::default(), 512).is_none());
        assert!(infer_grid(&[], &InferenceConfig::default(), 512).is_none());
    }

    #[test]
    fn test_frame_cap_scales_both_axes() {
        let est = infer_grid(&grid_boxes(20, 10, 16, 18), &InferenceConfig::default(), 50).unwrap();
        assert!(est.capped);
        assert_eq!((est.rows_detected, est.cols_detected), (10, 20));
        // scale = sqrt(200 / 50) = 2
        assert_eq!((est.grid.cols, est.grid.rows), (10, 5));
    }

    #[test]
    fn test_frame_cap_never_exceeded_after_rounding() {
        // sqrt(600 / 512) scaling rounds a single row of 600 to 554 columns.
        let boxes: Vec<BoundingBox> =
            (0..600).map(|i| BoundingBox::new(i * 20, 0, 16, 16)).collect();
        let est = infer_grid(&boxes, &InferenceConfig::default(), 512).unwrap();
        assert!(est.capped);
        assert_eq!((est.cols_detected, est.rows_detected), (600, 1));
        assert_eq!((est.grid.cols, est.grid.rows), (512, 1));

        for cap in [7, 13, 50, 99] {
            let est = infer_grid(&grid_boxes(17, 9, 16, 18), &InferenceConfig::default(), cap)
                .unwrap();
            assert!(est.grid.capacity() <= cap, "{} over cap {}", est.grid.grid_label(), cap);
        }
    }

    #[test]
    fn test_single_box_confidence_is_low() {
        let est = infer_grid(&[BoundingBox::new(0, 0, 64, 64)], &InferenceConfig::default(), 512)
            .unwrap();
        assert_eq!((est.grid.cols, est.grid.rows), (1, 1));
        assert_eq!(est.grid.confidence, 0.3);
    }

    #[test]
    fn test_confidence_bounds() {
        let c = confidence_score(&[10.0, 50.0], &[10.0, 90.0], &[5.0, 80.0], &[], 1, 100);
        assert!((0.0..=1.0).contains(&c));
        let perfect = confidence_score(&[8.0, 8.0], &[8.0, 8.0], &[10.0], &[10.0], 4, 4);
        assert_eq!(perfect, 1.0);
    }

    #[test]
    fn test_group_sorted() {
        let groups = group_sorted(&[1.0, 2.0, 3.0, 10.0, 11.0, 30.0], 2.0);
        assert_eq!(groups, vec![vec![1.0, 2.0, 3.0], vec![10.0, 11.0], vec![30.0]]);
        assert!(group_sorted(&[], 1.0).is_empty());
    }

    #[test]
    fn test_median_and_cv() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert!(coefficient_of_variation(&[5.0, 5.0, 5.0]).abs() < 1e-9);
    }

    #[test]
    fn test_suggest_layouts() {
        let suggestions = suggest_layouts(160, 64);
        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= 10);
        assert_eq!(suggestions[0].grid, "1x1");
        assert_eq!(suggestions[0].frame_width, 160);
        assert!(suggestions.windows(2).all(|w| w[0].total_frames <= w[1].total_frames));
        assert!(suggestions.iter().all(|s| s.total_frames <= 50));
        assert!(suggestions
            .iter()
            .any(|s| s.grid == "2x2" && s.frame_width == 80 && s.frame_height == 32));
    }

    #[test]
    fn test_divisors_capped() {
        assert_eq!(divisors(12, 20), vec![1, 2, 3, 4, 6, 12]);
        assert_eq!(divisors(100, 20), vec![1, 2, 4, 5, 10, 20]);
    }
}
