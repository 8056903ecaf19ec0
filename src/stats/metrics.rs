//! Statistics and metrics for relay sessions

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one relay session
///
/// Shared between the capture task, the broadcaster and every delivery
/// task of the session, so all fields are atomics.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    frames_published: AtomicU64,
    duplicates_suppressed: AtomicU64,
    encode_failures: AtomicU64,
    connect_attempts: AtomicU64,
    connection_failures: AtomicU64,
    frames_delivered: AtomicU64,
    frames_skipped: AtomicU64,
    bytes_delivered: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame was written to one consumer's transport
    pub fn record_delivered(&self, bytes: usize) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A frame was overwritten in a consumer mailbox before delivery
    pub fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> SessionCounters {
        SessionCounters {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Frames published to the broadcaster
    pub frames_published: u64,
    /// Publishes skipped because the payload repeated the previous one
    pub duplicates_suppressed: u64,
    /// Raw frames dropped because transcoding failed
    pub encode_failures: u64,
    /// Upstream open attempts, including forced reconnects
    pub connect_attempts: u64,
    /// Connections that ended in backoff
    pub connection_failures: u64,
    /// Frames written to consumer transports (summed over consumers)
    pub frames_delivered: u64,
    /// Frames overwritten in a mailbox before their consumer drained them
    pub frames_skipped: u64,
    /// Payload bytes written to consumer transports
    pub bytes_delivered: u64,
}

/// Registry-wide counters
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    consumers_attached: AtomicU64,
    consumers_detached: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumer_attached(&self) {
        self.consumers_attached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumer_detached(&self) {
        self.consumers_detached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RegistryStats {
        let sessions_started = self.sessions_started.load(Ordering::Relaxed);
        let sessions_stopped = self.sessions_stopped.load(Ordering::Relaxed);
        let consumers_attached = self.consumers_attached.load(Ordering::Relaxed);
        let consumers_detached = self.consumers_detached.load(Ordering::Relaxed);

        RegistryStats {
            sessions_started,
            sessions_stopped,
            active_sessions: sessions_started.saturating_sub(sessions_stopped),
            consumers_attached,
            active_consumers: consumers_attached.saturating_sub(consumers_detached),
        }
    }
}

/// Point-in-time copy of [`RegistryMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Relay sessions created since startup
    pub sessions_started: u64,
    /// Relay sessions torn down since startup
    pub sessions_stopped: u64,
    /// Relay sessions currently alive
    pub active_sessions: u64,
    /// Consumers attached since startup
    pub consumers_attached: u64,
    /// Consumers currently attached
    pub active_consumers: u64,
}
