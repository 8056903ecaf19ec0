//! Consumer delivery
//!
//! One [`ClientDelivery`] task runs per attached consumer, moving frames
//! from its mailbox to its [`Transport`].

pub mod client;
pub mod transport;

pub use client::{ClientDelivery, DeliveryEnd};
pub use transport::Transport;
