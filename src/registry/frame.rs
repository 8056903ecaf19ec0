//! Camera, consumer and frame identity types
//!
//! This module defines the keys the registry routes by and the frames that
//! are fanned out to consumers.

use std::time::Instant;

use bytes::Bytes;

/// Identifier naming one logical camera
///
/// Identity is by key, not by upstream URL: two keys pointing at the same
/// source are independent relay sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraKey(String);

impl CameraKey {
    /// Create a new camera key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CameraKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CameraKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Opaque locator of an upstream source (e.g. `rtsp://10.0.0.5/stream1`)
///
/// The relay engine never interprets it; it is handed to the
/// [`FrameSource`](crate::capture::FrameSource) as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDescriptor(String);

impl SourceDescriptor {
    /// Create a new source descriptor
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceDescriptor {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

impl From<String> for SourceDescriptor {
    fn from(locator: String) -> Self {
        Self(locator)
    }
}

/// Identifier of one attached consumer, unique per registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) u64);

impl ConsumerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A delivery-ready frame
///
/// Frames are immutable once built and cheap to clone: the payload is a
/// reference-counted `Bytes`, so every consumer mailbox holding the same
/// frame shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    captured_at: Instant,
    data: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(sequence: u64, data: Bytes, captured_at: Instant) -> Self {
        Self {
            sequence,
            captured_at,
            data,
        }
    }

    /// Sequence number, strictly increasing within one relay session
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the raw frame was captured upstream
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Encoded payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
