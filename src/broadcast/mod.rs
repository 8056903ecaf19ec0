//! Latest-wins frame fan-out
//!
//! ```text
//!                    FrameBroadcaster
//!               ┌──────────────────────┐
//!  publish() ──►│ last: Option<Frame>  │
//!               │ consumers: {         │
//!               │   id ─► MailboxSender│──► [slot] ──► ClientDelivery ──► transport
//!               │   id ─► MailboxSender│──► [slot] ──► ClientDelivery ──► transport
//!               │ }                    │
//!               └──────────────────────┘
//! ```
//!
//! Every slot holds at most one frame. A publish overwrites it, so a
//! consumer that falls behind skips straight to the newest frame.

pub mod broadcaster;
pub mod mailbox;

pub use broadcaster::FrameBroadcaster;
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
