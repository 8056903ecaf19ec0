//! Upstream capture
//!
//! This module provides:
//! - The [`FrameSource`] / [`SourceConnection`] contract for upstream
//!   collaborators
//! - [`CaptureSession`], the per-camera connect / stream / backoff loop
//! - [`CaptureConfig`], the reconnect and pacing policy
//!
//! # State machine
//!
//! ```text
//!   Idle ──► Connecting ──first frame──► Streaming
//!                ▲   │                    │   │
//!                │   └──error/timeout──┐  │   └─ max age ─► Connecting
//!                │                     ▼  ▼
//!                └──── retry delay ─── Backoff
//!
//!   any state ──stop()──► Stopping ──► Stopped
//! ```

pub mod config;
pub mod session;
pub mod source;
pub mod state;

pub use config::CaptureConfig;
pub use session::CaptureSession;
pub use source::{FrameSource, RawFrame, SourceConnection};
pub use state::CaptureState;
