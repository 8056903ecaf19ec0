//! Session registry for per-camera relay routing
//!
//! The registry maps camera keys to relay sessions and is the only place
//! where consumer demand starts or stops an upstream capture.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry>
//!                   ┌─────────────────────────────┐
//!                   │ sessions: HashMap<Key,      │
//!                   │   RelaySession {            │
//!                   │     capture,                │
//!                   │     broadcaster,            │
//!                   │     consumers,              │
//!                   │   }                         │
//!                   │ >                           │
//!                   └──────────────┬──────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        │                         │                         │
//!        ▼                         ▼                         ▼
//!  [CaptureSession]         [ClientDelivery]          [ClientDelivery]
//!  upstream ──► encode      mailbox.recv()            mailbox.recv()
//!        │                         │                         │
//!        └──► broadcaster.publish()──► transport.send_frame() ──► viewer
//! ```
//!
//! # Lifecycle
//!
//! The first [`SessionRegistry::attach_consumer`] for a camera starts its
//! capture; the last [`SessionRegistry::detach_consumer`] stops it and
//! waits for the upstream connection to close.
//!
//! # Zero-Copy Design
//!
//! Encoded frames are `bytes::Bytes`, so every mailbox shares one
//! allocation per frame; only the reference count is touched on fan-out.

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{ConsumerHandle, RelaySession, SessionStats};
pub use frame::{CameraKey, ConsumerId, Frame, SourceDescriptor};
pub use store::SessionRegistry;
