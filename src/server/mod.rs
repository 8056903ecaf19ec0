//! WebSocket relay server
//!
//! Serves viewers over HTTP with `axum`. Each `/ws` connection attaches
//! one consumer to the [`SessionRegistry`](crate::registry::SessionRegistry)
//! and detaches it when the socket closes or its session times out.

pub mod config;
pub mod listener;
pub mod websocket;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use websocket::{ViewerParams, WsTransport};
