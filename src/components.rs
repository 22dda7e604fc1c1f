//! Connected-component extraction over a foreground mask.
//!
//! Two routines produce the same kind of output, a list of bounding boxes in
//! scan order:
//! - the accelerated path (feature `accel`): 3x3 morphological opening to drop
//!   1-2px specks, 8-connected labelling, one box per outermost blob;
//! - the fallback path: 4-connected flood fill driven by an explicit work
//!   list, so very large blobs cannot overflow the call stack.

use crate::config::{ComponentConfig, ComponentStrategy};
use crate::error::{Result, SpriteError};
use crate::mask::Mask;
use crate::models::BoundingBox;

/// Routine actually used for a run, after resolving [`ComponentStrategy::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Labeller {
    Accelerated,
    FloodFill,
}

impl Labeller {
    pub fn resolve(strategy: ComponentStrategy) -> Self {
        match strategy {
            ComponentStrategy::FloodFill => Labeller::FloodFill,
            ComponentStrategy::Auto | ComponentStrategy::Accelerated if cfg!(feature = "accel") => {
                Labeller::Accelerated
            }
            ComponentStrategy::Accelerated => {
                tracing::warn!("accelerated labelling not compiled in, using flood fill");
                Labeller::FloodFill
            }
            ComponentStrategy::Auto => Labeller::FloodFill,
        }
    }
}

/// Bounding boxes of all components in `mask` whose area reaches `min_blob_area`.
pub fn find_components(mask: &Mask, config: &ComponentConfig) -> Vec<BoundingBox> {
    let labeller = Labeller::resolve(config.strategy);
    let sized = |b: &BoundingBox| b.area() >= config.min_blob_area;
    let kept: Vec<BoundingBox> = match labeller {
        // Noise goes before the containment pass, which scales with the box count.
        Labeller::Accelerated => {
            drop_nested(label_accelerated(mask).into_iter().filter(sized).collect())
        }
        Labeller::FloodFill => flood_fill_boxes(mask).into_iter().filter(sized).collect(),
    };
    tracing::debug!(?labeller, components = kept.len(), "extracted components");
    kept
}

/// Crop the mask to its foreground envelope, label it, and shift the boxes
/// back to full-image coordinates.
///
/// Fails with [`SpriteError::NoForegroundDetected`] on an empty mask and
/// [`SpriteError::NoSpritesDetected`] when every component is below the area
/// threshold.
pub fn extract_components(mask: &Mask, config: &ComponentConfig) -> Result<ComponentScan> {
    let crop = mask.bounds().ok_or(SpriteError::NoForegroundDetected {
        width: mask.width(),
        height: mask.height(),
    })?;
    let core = mask.crop(&crop);
    let foreground_pixels = core.foreground_count();
    let boxes: Vec<BoundingBox> =
        find_components(&core, config).into_iter().map(|b| b.offset(crop.x, crop.y)).collect();
    if boxes.is_empty() {
        return Err(SpriteError::NoSpritesDetected { crop, foreground_pixels });
    }
    Ok(ComponentScan { boxes, crop, foreground_pixels })
}

/// Output of [`extract_components`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScan {
    pub boxes: Vec<BoundingBox>,
    /// Foreground envelope the labelling ran on
    pub crop: BoundingBox,
    pub foreground_pixels: usize,
}

#[cfg(feature = "accel")]
fn label_accelerated(mask: &Mask) -> Vec<BoundingBox> {
    use image::Luma;
    use imageproc::distance_transform::Norm;
    use imageproc::morphology::open;
    use imageproc::region_labelling::{connected_components, Connectivity};

    let opened = open(&mask.to_gray(), Norm::LInf, 1);
    let labels = connected_components(&opened, Connectivity::Eight, Luma([0u8]));

    let mut extents: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px[0] as usize;
        if label == 0 {
            continue;
        }
        if extents.len() < label {
            extents.resize(label, None);
        }
        let slot = &mut extents[label - 1];
        *slot = Some(match *slot {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    extents
        .into_iter()
        .flatten()
        .map(|(x0, y0, x1, y1)| BoundingBox::from_extents(x0, y0, x1, y1))
        .collect()
}

#[cfg(not(feature = "accel"))]
fn label_accelerated(mask: &Mask) -> Vec<BoundingBox> {
    flood_fill_boxes(mask)
}

/// Keep only outermost boxes: a blob sitting in another blob's hole is part of it.
///
/// Boxes are visited largest first and only compared with the outermost boxes
/// kept so far; containment is transitive, so that is enough. Scan order is
/// preserved in the result.
fn drop_nested(boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(boxes[i].area()));

    let mut outer: Vec<usize> = Vec::new();
    for i in order {
        let b = &boxes[i];
        if !outer.iter().any(|&j| boxes[j] != *b && boxes[j].contains(b)) {
            outer.push(i);
        }
    }
    outer.sort_unstable();
    outer.into_iter().map(|i| boxes[i]).collect()
}

/// 4-connected flood fill with an explicit stack.
pub fn flood_fill_boxes(mask: &Mask) -> Vec<BoundingBox> {
    let (w, h) = (mask.width(), mask.height());
    let mut visited = vec![false; w as usize * h as usize];
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;
    let mut boxes = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            if !mask.get(sx, sy) || visited[idx(sx, sy)] {
                continue;
            }
            visited[idx(sx, sy)] = true;
            stack.push((sx, sy));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);

            while let Some((x, y)) = stack.pop() {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                let mut visit = |nx: u32, ny: u32, stack: &mut Vec<(u32, u32)>| {
                    let i = idx(nx, ny);
                    if mask.get(nx, ny) && !visited[i] {
                        visited[i] = true;
                        stack.push((nx, ny));
                    }
                };
                if x > 0 {
                    visit(x - 1, y, &mut stack);
                }
                if x + 1 < w {
                    visit(x + 1, y, &mut stack);
                }
                if y > 0 {
                    visit(x, y - 1, &mut stack);
                }
                if y + 1 < h {
                    visit(x, y + 1, &mut stack);
                }
            }

            boxes.push(BoundingBox::from_extents(min_x, min_y, max_x, max_y));
        }
    }

    boxes
}
