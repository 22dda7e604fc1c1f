//! Foreground mask construction.
//!
//! A pixel is foreground when any of three signals fires:
//! - alpha above `alpha_threshold` (pre-cut sprites with real transparency),
//! - luminance below `white_threshold` (opaque sprites on a white canvas),
//! - a central-difference gradient above `edge_threshold` (pale sprites that
//!   pass neither test).
//!
//! The OR-combination over-reports a little; tiny false positives are removed
//! later by the component area filter.
//!
//! Luminance is measured on the pixel composited over white, so a transparent
//! pixel reads as background whatever RGB it stores. The alpha signal is only
//! consulted when the image actually contains transparent pixels; an RGBA file
//! that is fully opaque is treated like an RGB one.

use image::{GrayImage, Luma};

use crate::config::MaskConfig;
use crate::error::{Result, SpriteError};
use crate::models::{BoundingBox, SourceImage};

/// Binary foreground mask, row-major, same dimensions as its source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![false; width as usize * height as usize] }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.idx(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.idx(x, y);
        self.data[i] = value;
    }

    /// Number of foreground pixels.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Tight bounding envelope of all foreground pixels.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    any = true;
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }
        any.then(|| BoundingBox::from_extents(min_x, min_y, max_x, max_y))
    }

    /// Copy out the region `rect`, which must lie inside the mask.
    pub fn crop(&self, rect: &BoundingBox) -> Mask {
        Mask::from_fn(rect.w, rect.h, |x, y| self.get(rect.x + x, rect.y + y))
    }

    /// 0/255 grayscale view for image-processing routines.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    /// Any non-zero pixel is foreground.
    pub fn from_gray(gray: &GrayImage) -> Self {
        Mask::from_fn(gray.width(), gray.height(), |x, y| gray.get_pixel(x, y)[0] != 0)
    }
}

/// Rec. 709 luminance of a pixel composited over white, 0-255 scale.
fn luminance_over_white(px: &image::Rgba<u8>) -> f32 {
    let a = px[3] as f32 / 255.0;
    let over = |c: u8| c as f32 * a + 255.0 * (1.0 - a);
    0.2126 * over(px[0]) + 0.7152 * over(px[1]) + 0.0722 * over(px[2])
}

/// Build the foreground mask of an image.
///
/// Never fails; an empty result is reported by [`build_foreground_mask`].
pub fn build_mask(image: &SourceImage, config: &MaskConfig) -> Mask {
    let pixels = image.pixels();
    let (w, h) = pixels.dimensions();
    let alpha_informative = image.mode().has_alpha()
        && pixels.pixels().any(|p| p[3] <= config.alpha_threshold);

    let lum: Vec<f32> = pixels.pixels().map(luminance_over_white).collect();
    let at = |x: u32, y: u32| lum[y as usize * w as usize + x as usize];

    Mask::from_fn(w, h, |x, y| {
        if alpha_informative && pixels.get_pixel(x, y)[3] > config.alpha_threshold {
            return true;
        }
        let l = at(x, y);
        if l < config.white_threshold {
            return true;
        }
        let dx = if x > 0 && x + 1 < w { (at(x + 1, y) - at(x - 1, y)).abs() * 0.5 } else { 0.0 };
        let dy = if y > 0 && y + 1 < h { (at(x, y + 1) - at(x, y - 1)).abs() * 0.5 } else { 0.0 };
        dx + dy > config.edge_threshold
    })
}

/// Build the mask and fail with [`SpriteError::NoForegroundDetected`] when it is empty.
pub fn build_foreground_mask(image: &SourceImage, config: &MaskConfig) -> Result<Mask> {
    let mask = build_mask(image, config);
    let count = mask.foreground_count();
    tracing::debug!(
        width = mask.width(),
        height = mask.height(),
        foreground = count,
        "built foreground mask"
    );
    if count == 0 {
        let (width, height) = (mask.width(), mask.height());
        return Err(SpriteError::NoForegroundDetected { width, height });
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    fn white_canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn opaque(img: RgbImage) -> SourceImage {
        SourceImage::from_dynamic(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_dark_square_on_white() {
        let mut img = white_canvas(10, 10);
        for y in 3..6 {
            for x in 3..6 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let mask = build_mask(&opaque(img), &MaskConfig::default());
        assert!(mask.get(4, 4));
        assert!(!mask.get(0, 0));
        // The gradient picks up the white pixel right next to the square.
        assert!(mask.get(2, 4));
        assert!(!mask.get(1, 4));
    }

    #[test]
    fn test_transparent_background_reads_as_white() {
        // Transparent black must not count as dark foreground.
        let mut img = RgbaImage::from_pixel(12, 12, Rgba([0, 0, 0, 0]));
        for y in 4..8 {
            for x in 4..8 {
                img.put_pixel(x, y, Rgba([200, 30, 30, 255]));
            }
        }
        let mask = build_mask(&SourceImage::from_rgba(img), &MaskConfig::default());
        assert!(mask.get(5, 5));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(11, 11));
        assert_eq!(mask.bounds(), Some(BoundingBox::new(3, 3, 6, 6)));
    }

    #[test]
    fn test_alpha_signal_catches_white_sprite() {
        // A pure white but opaque sprite on transparency is only visible through alpha.
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 0]));
        for y in 5..15 {
            for x in 5..15 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let mask = build_mask(&SourceImage::from_rgba(img), &MaskConfig::default());
        assert!(mask.get(10, 10));
        assert!(!mask.get(1, 1));
    }

    #[test]
    fn test_opaque_rgba_ignores_alpha_signal() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        let mask = build_mask(&SourceImage::from_rgba(img), &MaskConfig::default());
        assert!(mask.is_empty());
    }

    #[test]
    fn test_edge_signal_recovers_pale_sprite() {
        // Heuristic-sensitive: luminance 250 is above the white threshold, the
        // 255->250 step alone is below the edge threshold, 255->225 is above it.
        let mut img = white_canvas(9, 9);
        for y in 3..6 {
            for x in 3..6 {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        assert!(build_mask(&opaque(img.clone()), &MaskConfig::default()).is_empty());

        for y in 3..6 {
            for x in 3..6 {
                img.put_pixel(x, y, Rgb([246, 246, 246]));
            }
        }
        img.put_pixel(4, 4, Rgb([220, 220, 220]));
        let config = MaskConfig { white_threshold: 200.0, ..MaskConfig::default() };
        let mask = build_mask(&opaque(img), &config);
        assert!(!mask.is_empty());
        assert!(mask.get(3, 4) || mask.get(5, 4));
    }

    #[test]
    fn test_all_white_is_no_foreground() {
        let err = build_foreground_mask(&opaque(white_canvas(16, 8)), &MaskConfig::default())
            .unwrap_err();
        assert!(matches!(err, SpriteError::NoForegroundDetected { width: 16, height: 8 }));
    }

    #[test]
    fn test_mask_crop_and_gray_roundtrip() {
        let mask = Mask::from_fn(6, 4, |x, y| x >= 2 && y >= 1 && x < 4 && y < 3);
        assert_eq!(mask.foreground_count(), 4);
        let bounds = mask.bounds().unwrap();
        assert_eq!(bounds, BoundingBox::new(2, 1, 2, 2));
        let cropped = mask.crop(&bounds);
        assert_eq!(cropped.foreground_count(), 4);
        assert_eq!(Mask::from_gray(&mask.to_gray()), mask);
    }
}
