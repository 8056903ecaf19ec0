//! Frame transcoding
//!
//! This module provides:
//! - The [`Transcoder`] contract the capture loop uses to turn raw frames
//!   into delivery payloads
//! - A JPEG implementation backed by the `image` crate (feature `jpeg`)

#[cfg(feature = "jpeg")]
pub mod jpeg;

#[cfg(feature = "jpeg")]
pub use jpeg::JpegTranscoder;

use bytes::Bytes;

use crate::capture::RawFrame;
use crate::error::EncodeError;

/// Output frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 360)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Turns a raw frame into a delivery-ready payload
///
/// Must be pure from the engine's point of view: the same input always
/// yields the same bytes, which is what makes duplicate suppression work.
pub trait Transcoder: Send + Sync + 'static {
    fn encode(
        &self,
        frame: &RawFrame,
        target: Resolution,
        quality: u8,
    ) -> Result<Bytes, EncodeError>;
}
