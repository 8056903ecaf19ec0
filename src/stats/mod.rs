//! Relay statistics

pub mod metrics;

pub use metrics::{RegistryMetrics, RegistryStats, SessionCounters, SessionMetrics};
