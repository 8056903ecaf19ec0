//! Capture session state machine
//!
//! Tracks an upstream connection from first connect to teardown.

/// Capture lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// No upstream connection, loop not started
    Idle,
    /// Opening the upstream and waiting for its first frame
    Connecting,
    /// Frames are flowing
    Streaming,
    /// Last connection failed, waiting before retrying
    Backoff,
    /// Teardown requested
    Stopping,
    /// Loop finished and upstream released
    Stopped,
}

impl CaptureState {
    /// Whether frames are currently being acquired
    pub fn is_streaming(&self) -> bool {
        *self == CaptureState::Streaming
    }

    /// Whether the session has been asked to stop (or has stopped)
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, CaptureState::Stopping | CaptureState::Stopped)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: CaptureState) -> bool {
        use CaptureState::*;

        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Stopping, _) => false,
            (_, Stopping) => true,
            (Idle, Connecting) => true,
            (Connecting, Streaming) | (Connecting, Backoff) => true,
            // Streaming back to Connecting is the forced reconnect
            (Streaming, Backoff) | (Streaming, Connecting) => true,
            (Backoff, Connecting) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Connecting => "connecting",
            CaptureState::Streaming => "streaming",
            CaptureState::Backoff => "backoff",
            CaptureState::Stopping => "stopping",
            CaptureState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
