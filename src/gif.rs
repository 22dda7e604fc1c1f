//! Animation decoding and GIF encoding

use std::io::Cursor;
use std::path::Path;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Delay, Frame, ImageFormat, RgbaImage};

use crate::error::{Result, SpriteError};
use crate::models::SourceImage;

/// Shortest frame delay most GIF viewers honour.
const MIN_DELAY_MS: u32 = 10;

/// Decode every frame of an animated image.
///
/// GIF, APNG and animated WebP yield all their frames; a plain PNG, a still
/// WebP or any other still format yields one frame.
pub fn decode_animation(bytes: &[u8]) -> Result<Vec<SourceImage>> {
    if bytes.is_empty() {
        return Err(SpriteError::rejected("empty image payload"));
    }
    let format = image::guess_format(bytes)
        .map_err(|e| SpriteError::rejected(format!("unrecognized image data: {}", e)))?;

    let frames = match format {
        ImageFormat::Gif => collect(GifDecoder::new(Cursor::new(bytes))?)?,
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes))?;
            if decoder.is_apng()? {
                collect(decoder.apng()?)?
            } else {
                vec![SourceImage::decode(bytes)?]
            }
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))?;
            if decoder.has_animation() {
                collect(decoder)?
            } else {
                vec![SourceImage::decode(bytes)?]
            }
        }
        _ => vec![SourceImage::decode(bytes)?],
    };

    if frames.is_empty() {
        return Err(SpriteError::rejected("animation contains no frames"));
    }
    tracing::debug!(?format, frames = frames.len(), "decoded animation");
    Ok(frames)
}

fn collect<'a>(decoder: impl AnimationDecoder<'a>) -> Result<Vec<SourceImage>> {
    Ok(decoder
        .into_frames()
        .collect_frames()?
        .into_iter()
        .map(|frame| SourceImage::from_rgba(frame.into_buffer()))
        .collect())
}

/// Encode frames as a GIF animation.
///
/// # Arguments
///
/// * `frames` - The frames, in playback order
/// * `fps` - Playback rate; the per-frame delay is `1000 / fps` ms, at least 10 ms
/// * `loop_anim` - Whether the animation should loop infinitely
pub fn encode_animation(frames: &[RgbaImage], fps: u32, loop_anim: bool) -> Result<Vec<u8>> {
    if frames.is_empty() {
        return Err(SpriteError::rejected("cannot encode an animation without frames"));
    }
    let delay_ms = (1000 / fps.max(1)).max(MIN_DELAY_MS);

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        let repeat = if loop_anim { Repeat::Infinite } else { Repeat::Finite(0) };
        encoder.set_repeat(repeat)?;

        for rgba_image in frames {
            let delay = Delay::from_numer_denom_ms(delay_ms, 1);
            encoder.encode_frame(Frame::from_parts(rgba_image.clone(), 0, 0, delay))?;
        }
    }
    Ok(buf)
}

/// Encode frames as a GIF and write it to `path`, creating parent directories.
pub fn save_gif(path: &Path, frames: &[RgbaImage], fps: u32, loop_anim: bool) -> Result<()> {
    let bytes = encode_animation(frames, fps, loop_anim)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
