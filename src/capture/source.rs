//! Upstream frame source contract
//!
//! The relay engine does not pull or decode video itself. A [`FrameSource`]
//! opens one connection per capture session, and the connection hands out
//! decoded raw frames.

use std::future::Future;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{AcquireError, ConnectError};
use crate::registry::SourceDescriptor;

/// A decoded, uncompressed frame as produced by the upstream
///
/// Pixel data is packed RGB24, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub captured_at: Instant,
}

impl RawFrame {
    /// Create an RGB24 frame captured now
    pub fn rgb(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            captured_at: Instant::now(),
        }
    }

    /// Bytes required for the declared dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Factory for upstream connections
///
/// Implementations own whatever capture library is in use (RTSP client,
/// V4L2, a test pattern generator...). One instance is shared by every
/// camera in a registry.
pub trait FrameSource: Send + Sync + 'static {
    type Connection: SourceConnection;

    /// Open a connection to the given upstream
    fn open(
        &self,
        descriptor: &SourceDescriptor,
    ) -> impl Future<Output = Result<Self::Connection, ConnectError>> + Send;
}

/// One open upstream connection, exclusively owned by a capture session
pub trait SourceConnection: Send + 'static {
    /// Wait for the most recent frame
    ///
    /// Any backlog the connection has buffered must be discarded: callers
    /// always want the newest picture, never history. `Ok(None)` signals the
    /// end of the stream.
    ///
    /// The returned future may be dropped at any await point (stop or
    /// staleness timeout); [`close`](Self::close) is called afterwards and
    /// must not hang because of it.
    fn next_latest_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<RawFrame>, AcquireError>> + Send;

    /// Release the upstream connection
    fn close(self) -> impl Future<Output = ()> + Send;
}
