//! Built-in frame transforms.
//!
//! - [`Identity`] passes frames through unchanged.
//! - [`WhiteKey`] makes near-white pixels transparent.
//! - [`CommandTransform`] hands each frame to an external program through
//!   temporary PNG files.

use std::process::Command;

use image::RgbaImage;

use crate::config::MaskConfig;
use crate::error::{Result, SpriteError, TransformError};
use crate::runner::FrameTransform;

/// Pass-through transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FrameTransform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
        Ok(frame.clone())
    }
}

/// Clears pixels whose red, green and blue channels are all at least `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct WhiteKey {
    pub threshold: u8,
}

impl WhiteKey {
    /// Key at the mask's `white_threshold`, so frames lose the same
    /// background the grid detector ignored.
    pub fn from_mask(mask: &MaskConfig) -> Self {
        Self { threshold: mask.white_threshold.round().clamp(0.0, 255.0) as u8 }
    }
}

impl Default for WhiteKey {
    fn default() -> Self {
        Self::from_mask(&MaskConfig::default())
    }
}

impl FrameTransform for WhiteKey {
    fn name(&self) -> &str {
        "white-key"
    }

    fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
        let mut out = frame.clone();
        for px in out.pixels_mut() {
            if px[0] >= self.threshold && px[1] >= self.threshold && px[2] >= self.threshold {
                px[3] = 0;
            }
        }
        Ok(out)
    }
}

/// Runs a shell command per frame.
///
/// The template must contain `{input}` and `{output}`; they are replaced by
/// the paths of a PNG holding the frame and of the PNG the command must write.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    template: String,
}

impl CommandTransform {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{input}") || !template.contains("{output}") {
            return Err(SpriteError::rejected(
                "command must contain both {input} and {output} placeholders",
            ));
        }
        Ok(Self { template })
    }

    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

impl FrameTransform for CommandTransform {
    fn name(&self) -> &str {
        "command"
    }

    fn apply(&self, frame: &RgbaImage) -> std::result::Result<RgbaImage, TransformError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.png");
        let output = dir.path().join("output.png");
        frame.save_with_format(&input, image::ImageFormat::Png)?;

        let command = self
            .template
            .replace("{input}", &input.display().to_string())
            .replace("{output}", &output.display().to_string());
        let result = Self::shell(&command).output()?;
        if !result.status.success() {
            return Err(TransformError::Command {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            let missing = format!("command did not write {}", output.display());
            return Err(TransformError::Failed(missing));
        }
        Ok(image::open(&output)?.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_white_key_clears_background_only() {
        let mut img = RgbaImage::from_pixel(3, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([200, 10, 10, 255]));
        img.put_pixel(2, 0, Rgba([250, 250, 240, 255]));
        let out = WhiteKey::default().apply(&img).unwrap();
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(*out.get_pixel(1, 0), Rgba([200, 10, 10, 255]));
        assert_eq!(out.get_pixel(2, 0)[3], 255);
    }

    #[test]
    fn test_white_key_follows_mask_threshold() {
        let mask = MaskConfig { white_threshold: 200.4, ..MaskConfig::default() };
        let key = WhiteKey::from_mask(&mask);
        assert_eq!(key.threshold, 200);
        let img = RgbaImage::from_pixel(1, 1, Rgba([210, 210, 210, 255]));
        assert_eq!(key.apply(&img).unwrap().get_pixel(0, 0)[3], 0);
        assert_eq!(WhiteKey::default().apply(&img).unwrap().get_pixel(0, 0)[3], 255);
        assert_eq!(WhiteKey::default().threshold, 245);
    }

    #[test]
    fn test_identity() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        assert_eq!(Identity.apply(&img).unwrap(), img);
    }

    #[test]
    fn test_command_requires_placeholders() {
        assert!(CommandTransform::new("cp {input} out.png").unwrap_err().is_input_rejected());
        assert!(CommandTransform::new("cp {input} {output}").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_copy_roundtrip() {
        let transform = CommandTransform::new("cp {input} {output}").unwrap();
        let img = RgbaImage::from_pixel(3, 3, Rgba([7, 8, 9, 255]));
        assert_eq!(transform.apply(&img).unwrap(), img);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_reports_stderr() {
        let transform = CommandTransform::new("echo nope >&2; exit 3 # {input} {output}").unwrap();
        let err = transform.apply(&RgbaImage::new(2, 2)).unwrap_err();
        match err {
            TransformError::Command { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
