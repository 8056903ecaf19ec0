//! Error types
//!
//! Each collaborator boundary has its own error type so the relay engine can
//! apply a different policy to each: upstream errors drive the capture
//! session into backoff, encode errors drop a single frame, and transport
//! errors detach a single consumer. [`Error`] unifies them for callers that
//! only need one type.

use std::time::Duration;

/// Upstream could not be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The source refused the connection or could not be reached
    Unreachable(String),
    /// The source did not open (or produce a first frame) in time
    Timeout(Duration),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Unreachable(reason) => write!(f, "Upstream unreachable: {}", reason),
            ConnectError::Timeout(after) => {
                write!(f, "Upstream did not connect within {:?}", after)
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// Reading or decoding a frame from an open upstream failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// Read from the upstream connection failed
    Read(String),
    /// A packet was read but could not be decoded into a frame
    Decode(String),
    /// The upstream ended the stream
    EndOfStream,
}

impl std::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireError::Read(reason) => write!(f, "Upstream read failed: {}", reason),
            AcquireError::Decode(reason) => write!(f, "Frame decode failed: {}", reason),
            AcquireError::EndOfStream => write!(f, "Upstream ended the stream"),
        }
    }
}

impl std::error::Error for AcquireError {}

/// Transcoding a raw frame into a delivery payload failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Raw frame dimensions and pixel data disagree
    InvalidFrame(String),
    /// The codec rejected the frame
    Codec(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::InvalidFrame(reason) => write!(f, "Invalid raw frame: {}", reason),
            EncodeError::Codec(reason) => write!(f, "Encode failed: {}", reason),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Writing to a consumer failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The consumer went away
    Closed,
    /// A single write did not complete in time
    Timeout(Duration),
    /// Any other transport-level failure
    Io(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Closed => write!(f, "Consumer disconnected"),
            TransportError::Timeout(after) => write!(f, "Write timed out after {:?}", after),
            TransportError::Io(reason) => write!(f, "Transport error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// An acquisition took longer than the configured latency budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleCaptureError {
    /// Latency budget that was exceeded
    pub budget: Duration,
}

impl std::fmt::Display for StaleCaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No frame from upstream within {:?}", self.budget)
    }
}

impl std::error::Error for StaleCaptureError {}

/// Unified error type
#[derive(Debug)]
pub enum Error {
    Connect(ConnectError),
    Acquire(AcquireError),
    Encode(EncodeError),
    Transport(TransportError),
    Stale(StaleCaptureError),
    /// The registry has been shut down and accepts no new consumers
    RegistryClosed,
    /// I/O error from the listener
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connect(e) => e.fmt(f),
            Error::Acquire(e) => e.fmt(f),
            Error::Encode(e) => e.fmt(f),
            Error::Transport(e) => e.fmt(f),
            Error::Stale(e) => e.fmt(f),
            Error::RegistryClosed => write!(f, "Session registry is shut down"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connect(e) => Some(e),
            Error::Acquire(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Stale(e) => Some(e),
            Error::RegistryClosed => None,
            Error::Io(e) => Some(e),
        }
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::Connect(e)
    }
}

impl From<AcquireError> for Error {
    fn from(e: AcquireError) -> Self {
        Error::Acquire(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<StaleCaptureError> for Error {
    fn from(e: StaleCaptureError) -> Self {
        Error::Stale(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
