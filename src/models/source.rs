//! Source image abstraction with explicit channel-mode tagging.

use image::{DynamicImage, RgbaImage};

/// Whether the ingested image carried an alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// No alpha channel in the source; every pixel was opaque.
    Rgb,
    /// The source had an alpha channel (including palette transparency).
    Rgba,
}

impl ChannelMode {
    pub fn has_alpha(self) -> bool {
        matches!(self, ChannelMode::Rgba)
    }
}

/// An immutable RGBA8 pixel buffer plus the channel mode it was loaded with.
///
/// Every format-specific conversion (palette, grayscale, 16-bit, RGB) happens
/// once in [`SourceImage::from_dynamic`]; downstream code only sees RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pixels: RgbaImage,
    mode: ChannelMode,
}

impl SourceImage {
    /// Normalize a decoded image. Sources without alpha become fully opaque RGBA.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let mode = if image.color().has_alpha() { ChannelMode::Rgba } else { ChannelMode::Rgb };
        let pixels = match image {
            DynamicImage::ImageRgba8(buf) => buf,
            other => other.to_rgba8(),
        };
        Self { pixels, mode }
    }

    /// Wrap an RGBA buffer that is known to carry meaningful alpha.
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels, mode: ChannelMode::Rgba }
    }

    /// Decode an encoded still image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.is_empty() {
            return Err(crate::SpriteError::rejected("uploaded payload is empty"));
        }
        Ok(Self::from_dynamic(image::load_from_memory(bytes)?))
    }

    /// Load and normalize an image file.
    pub fn open(path: &std::path::Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}
