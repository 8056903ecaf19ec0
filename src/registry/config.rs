//! Registry configuration

use std::time::Duration;

use crate::capture::CaptureConfig;

/// Configuration for the session registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capture policy applied to every relay session
    pub capture: CaptureConfig,

    /// A single consumer write slower than this detaches the consumer
    /// (None = wait indefinitely)
    pub write_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl RegistryConfig {
    /// Set the capture policy
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Set the per-write timeout
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}
