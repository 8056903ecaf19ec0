//! Camera frame relay engine
//!
//! Pulls frames from network cameras on demand and fans the most recent
//! encoded frame out to every attached viewer. A camera is only read while
//! at least one viewer is attached; slow viewers skip frames instead of
//! building up a backlog.
//!
//! # Architecture
//!
//! ```text
//!  FrameSource ──► CaptureSession ──► Transcoder ──► FrameBroadcaster
//!   (upstream)     connect/stream/                  last frame + one
//!                  backoff loop                     mailbox per consumer
//!                                                          │
//!                                   ┌──────────────────────┼──────────┐
//!                                   ▼                      ▼          ▼
//!                             ClientDelivery         ClientDelivery   ...
//!                                   │                      │
//!                               Transport              Transport
//! ```
//!
//! [`SessionRegistry`] owns one relay session per camera key and starts or
//! stops the capture as consumers attach and detach.
//!
//! # Features
//!
//! - `jpeg` (default): [`media::jpeg::JpegTranscoder`]
//! - `server` (default): WebSocket viewer endpoint in [`server`]

pub mod broadcast;
pub mod capture;
pub mod delivery;
pub mod error;
pub mod media;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod stats;

#[cfg(test)]
mod testing;

pub use broadcast::FrameBroadcaster;
pub use capture::{
    CaptureConfig, CaptureSession, CaptureState, FrameSource, RawFrame, SourceConnection,
};
pub use delivery::{ClientDelivery, Transport};
pub use error::{Error, Result};
pub use media::{Resolution, Transcoder};
pub use registry::{
    CameraKey, ConsumerId, Frame, RegistryConfig, SessionRegistry, SourceDescriptor,
};
#[cfg(feature = "server")]
pub use server::{RelayServer, ServerConfig};
