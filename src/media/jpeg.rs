//! JPEG transcoder
//!
//! Resizes RGB24 frames to the target resolution and compresses them to a
//! baseline JPEG, one self-contained image per frame.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::capture::RawFrame;
use crate::error::EncodeError;

use super::{Resolution, Transcoder};

/// JPEG transcoder backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct JpegTranscoder {
    filter: FilterType,
}

impl JpegTranscoder {
    /// Create a transcoder using bilinear resizing
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resize filter
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for JpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for JpegTranscoder {
    fn encode(
        &self,
        frame: &RawFrame,
        target: Resolution,
        quality: u8,
    ) -> Result<Bytes, EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::InvalidFrame("zero-sized frame".into()));
        }
        if frame.data.len() != frame.expected_len() {
            return Err(EncodeError::InvalidFrame(format!(
                "{}x{} RGB frame needs {} bytes, got {}",
                frame.width,
                frame.height,
                frame.expected_len(),
                frame.data.len()
            )));
        }

        let image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(|| EncodeError::InvalidFrame("pixel buffer too small".into()))?;

        let image = if image.dimensions() == (target.width, target.height) {
            image
        } else {
            imageops::resize(&image, target.width, target.height, self.filter)
        };

        let mut out = Vec::with_capacity(target.width as usize * target.height as usize / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode_image(&image)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Bytes::from(out))
    }
}
