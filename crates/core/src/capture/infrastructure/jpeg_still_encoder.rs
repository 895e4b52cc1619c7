use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::capture::domain::capture::StillImage;
use crate::capture::domain::still_encoder::StillEncoder;
use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::frame::Frame;

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Encodes RGB frames as JPEG using the `image` crate.
pub struct JpegStillEncoder {
    quality: u8,
}

impl JpegStillEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegStillEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl StillEncoder for JpegStillEncoder {
    fn encode(&self, frame: &Frame) -> Result<StillImage, Box<dyn std::error::Error>> {
        if !frame.has_valid_dimensions() {
            return Err("Cannot encode a frame with no dimensions".into());
        }
        if frame.channels() != 3 {
            return Err(format!("Unsupported channel count: {}", frame.channels()).into());
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Frame data does not match its dimensions")?;

        let mut bytes = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
            encoder.encode(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)?;
        }

        Ok(StillImage::new(bytes, frame.width(), frame.height(), JPEG_MIME_TYPE))
    }
}
