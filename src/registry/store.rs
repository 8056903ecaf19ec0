//! Session registry implementation
//!
//! The central registry that owns every active relay session and is the
//! only place consumer count turns into capture lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{mailbox, FrameBroadcaster};
use crate::capture::{CaptureSession, CaptureState, FrameSource};
use crate::delivery::{ClientDelivery, DeliveryEnd, Transport};
use crate::error::{Error, Result};
use crate::media::Transcoder;
use crate::stats::{RegistryMetrics, RegistryStats, SessionMetrics};

use super::config::RegistryConfig;
use super::entry::{ConsumerHandle, RelaySession, SessionStats};
use super::frame::{CameraKey, ConsumerId, Frame, SourceDescriptor};

type CameraLocks = StdMutex<HashMap<CameraKey, Arc<Mutex<()>>>>;

/// Held while a camera's session is created or torn down
///
/// An attach for a camera whose capture is still stopping waits on this
/// instead of opening a second upstream. Other cameras are unaffected.
struct CameraLock<'a> {
    locks: &'a CameraLocks,
    key: CameraKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> CameraLock<'a> {
    async fn acquire(locks: &'a CameraLocks, key: &CameraKey) -> CameraLock<'a> {
        let lock = {
            let mut locks = locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        CameraLock {
            locks,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

impl Drop for CameraLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters hold their own clone, so a count of one means nobody
        // else is using or waiting for this camera's lock
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Registry of relay sessions, one per camera with at least one consumer
///
/// The session map lock only guards structural changes and is never held
/// while a capture stops. Creating and tearing down one camera's session
/// is serialized per camera.
pub struct SessionRegistry<S: FrameSource, T: Transcoder> {
    /// Map of camera key to relay session
    sessions: Mutex<HashMap<CameraKey, RelaySession>>,

    /// Lifecycle lock per camera
    camera_locks: CameraLocks,

    /// Set by shutdown, under the session map lock
    closed: AtomicBool,

    source: Arc<S>,
    transcoder: Arc<T>,
    next_consumer_id: AtomicU64,
    metrics: RegistryMetrics,

    /// Configuration
    config: RegistryConfig,
}

impl<S: FrameSource, T: Transcoder> SessionRegistry<S, T> {
    /// Create a registry with default configuration
    pub fn new(source: S, transcoder: T) -> Self {
        Self::with_config(source, transcoder, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(source: S, transcoder: T, config: RegistryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            camera_locks: StdMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            source: Arc::new(source),
            transcoder: Arc::new(transcoder),
            next_consumer_id: AtomicU64::new(1),
            metrics: RegistryMetrics::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Attach a consumer to a camera
    ///
    /// Starts a relay session for the camera if none exists; concurrent
    /// attaches for the same unseen camera start exactly one. If the
    /// camera's previous session is still stopping, this waits until its
    /// upstream is released. The consumer immediately receives the last
    /// published frame, if any, and a delivery task is spawned to feed
    /// `transport`. When the transport fails, the consumer detaches itself.
    ///
    /// `descriptor` is only used when the session is created. An existing
    /// session keeps the upstream it was started with.
    ///
    /// After [`shutdown`](Self::shutdown) the transport is closed and
    /// [`Error::RegistryClosed`] is returned.
    pub async fn attach_consumer<W: Transport>(
        self: &Arc<Self>,
        key: CameraKey,
        descriptor: SourceDescriptor,
        mut transport: W,
    ) -> Result<ConsumerId> {
        let camera = CameraLock::acquire(&self.camera_locks, &key).await;

        let id = ConsumerId(self.next_consumer_id.fetch_add(1, Ordering::Relaxed));
        let (mailbox_tx, mailbox_rx) = mailbox();
        let cancel = CancellationToken::new();

        let metrics = {
            let mut sessions = self.sessions.lock().await;

            if self.is_closed() {
                drop(sessions);
                drop(camera);
                tracing::debug!(camera = %key, "Attach refused, registry is shut down");
                transport.close().await;
                return Err(Error::RegistryClosed);
            }

            let session = sessions
                .entry(key.clone())
                .or_insert_with(|| self.start_session(key.clone(), descriptor.clone()));

            if session.descriptor != descriptor {
                tracing::debug!(
                    camera = %key,
                    active = %session.descriptor,
                    requested = %descriptor,
                    "Camera already relaying from another source, keeping it"
                );
            }

            session.attach(ConsumerHandle::new(id, cancel.clone()), mailbox_tx);
            self.metrics.record_consumer_attached();

            tracing::info!(
                camera = %key,
                consumer = %id,
                consumers = session.consumer_count(),
                "Consumer attached"
            );

            Arc::clone(session.metrics())
        };
        drop(camera);

        let delivery = ClientDelivery::new(key.clone(), id, mailbox_rx, transport, cancel, metrics)
            .write_timeout(self.config.write_timeout);
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            if let DeliveryEnd::TransportFailed(_) = delivery.run().await {
                registry.detach_consumer(&key, id).await;
            }
        });

        Ok(id)
    }

    /// Detach a consumer from a camera
    ///
    /// Stops the camera's capture session when this was its last consumer;
    /// the upstream connection is closed before this returns. Unknown
    /// cameras and consumers that are already detached are ignored.
    /// Returns whether anything was detached.
    pub async fn detach_consumer(&self, key: &CameraKey, id: ConsumerId) -> bool {
        let _camera = CameraLock::acquire(&self.camera_locks, key).await;

        let emptied = {
            let mut sessions = self.sessions.lock().await;

            let Some(session) = sessions.get_mut(key) else {
                return false;
            };

            if !session.detach(id) {
                return false;
            }
            self.metrics.record_consumer_detached();

            tracing::info!(
                camera = %key,
                consumer = %id,
                consumers = session.consumer_count(),
                "Consumer detached"
            );

            if session.is_empty() {
                sessions.remove(key)
            } else {
                None
            }
        };

        // Map lock released; only this camera waits for the stop
        if let Some(session) = emptied {
            session.close().await;
            self.metrics.record_session_stopped();
            tracing::info!(camera = %key, "Relay session closed");
        }

        true
    }

    fn start_session(&self, key: CameraKey, descriptor: SourceDescriptor) -> RelaySession {
        let metrics = Arc::new(SessionMetrics::new());
        let broadcaster = Arc::new(FrameBroadcaster::new(key.clone(), Arc::clone(&metrics)));

        let capture = CaptureSession::start(
            descriptor.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.transcoder),
            Arc::clone(&broadcaster),
            self.config.capture.clone(),
        );

        self.metrics.record_session_started();
        tracing::info!(camera = %key, source = %descriptor, "Relay session created");

        RelaySession::new(key, descriptor, broadcaster, capture, metrics)
    }

    /// Stop every session and detach every consumer
    ///
    /// Sessions are stopped concurrently. Later attaches are refused.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock().await;
            self.closed.store(true, Ordering::Release);
            sessions.drain().collect()
        };
        let count = drained.len();

        let mut closing = JoinSet::new();
        for (key, session) in drained {
            for _ in 0..session.consumer_count() {
                self.metrics.record_consumer_detached();
            }
            closing.spawn(async move {
                session.close().await;
                tracing::debug!(camera = %key, "Relay session closed on shutdown");
            });
        }

        while let Some(closed) = closing.join_next().await {
            if let Err(e) = closed {
                tracing::error!(error = %e, "Relay session close failed");
            }
            self.metrics.record_session_stopped();
        }

        tracing::info!(sessions = count, "Session registry shut down");
    }

    /// Whether a camera has an active session
    pub async fn has_session(&self, key: &CameraKey) -> bool {
        self.sessions.lock().await.contains_key(key)
    }

    /// Get total number of sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Number of consumers attached to a camera (0 if it has no session)
    pub async fn consumer_count(&self, key: &CameraKey) -> usize {
        self.sessions
            .lock()
            .await
            .get(key)
            .map_or(0, RelaySession::consumer_count)
    }

    /// Whether a consumer is attached to a camera
    pub async fn is_attached(&self, key: &CameraKey, id: ConsumerId) -> bool {
        self.sessions
            .lock()
            .await
            .get(key)
            .is_some_and(|session| session.has_consumer(id))
    }

    /// Capture state of a camera's session
    pub async fn session_state(&self, key: &CameraKey) -> Option<CaptureState> {
        self.sessions.lock().await.get(key).map(RelaySession::state)
    }

    /// Get session statistics
    pub async fn session_stats(&self, key: &CameraKey) -> Option<SessionStats> {
        self.sessions.lock().await.get(key).map(RelaySession::stats)
    }

    /// Last frame published for a camera
    pub async fn last_frame(&self, key: &CameraKey) -> Option<Frame> {
        self.sessions
            .lock()
            .await
            .get(key)
            .and_then(|session| session.broadcaster.last_frame())
    }

    /// Broadcaster of a camera's session
    pub async fn broadcaster(&self, key: &CameraKey) -> Option<Arc<FrameBroadcaster>> {
        self.sessions
            .lock()
            .await
            .get(key)
            .map(|session| Arc::clone(&session.broadcaster))
    }

    /// Registry-wide counters
    pub fn stats(&self) -> RegistryStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::testing::{
        eventually, fast_capture_config, MockSource, MockTransport, PassthroughTranscoder,
    };

    use super::*;

    type TestRegistry = SessionRegistry<MockSource, PassthroughTranscoder>;

    fn registry(source: &MockSource) -> Arc<TestRegistry> {
        registry_with(source, Duration::from_secs(1))
    }

    fn registry_with(source: &MockSource, stop_timeout: Duration) -> Arc<TestRegistry> {
        let config = RegistryConfig::default()
            .capture(fast_capture_config().stop_timeout(stop_timeout));
        Arc::new(SessionRegistry::with_config(
            source.clone(),
            PassthroughTranscoder,
            config,
        ))
    }

    fn cam(name: &str) -> CameraKey {
        CameraKey::new(name)
    }

    fn rtsp() -> SourceDescriptor {
        SourceDescriptor::new("rtsp://10.0.0.5/stream1")
    }

    #[tokio::test]
    async fn test_first_attach_creates_session() {
        let source = MockSource::new();
        let registry = registry(&source);

        assert!(!registry.has_session(&cam("cam-1")).await);

        let transport = MockTransport::new();
        registry
            .attach_consumer(cam("cam-1"), rtsp(), transport.clone())
            .await.unwrap();

        assert!(registry.has_session(&cam("cam-1")).await);
        assert_eq!(registry.consumer_count(&cam("cam-1")).await, 1);
        eventually!(transport.sent_count() > 0);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_last_detach_destroys_session() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();
        let c2 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();
        eventually!(source.opens() == 1);

        assert!(registry.detach_consumer(&key, c1).await);
        assert!(registry.has_session(&key).await);

        assert!(registry.detach_consumer(&key, c2).await);
        assert!(!registry.has_session(&key).await);
        assert_eq!(source.open_connections(), 0);
        assert_eq!(registry.stats().sessions_stopped, 1);
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();
        let c2 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();

        assert!(registry.detach_consumer(&key, c1).await);
        assert!(!registry.detach_consumer(&key, c1).await);
        assert_eq!(registry.consumer_count(&key).await, 1);

        // Unknown camera is a no-op too
        assert!(!registry.detach_consumer(&cam("nope"), c2).await);

        assert!(registry.detach_consumer(&key, c2).await);
        assert!(!registry.detach_consumer(&key, c2).await);
        assert_eq!(registry.stats().sessions_stopped, 1);
    }

    #[tokio::test]
    async fn test_concurrent_attach_starts_one_session() {
        let source = MockSource::new();
        let registry = registry(&source);

        let attaches: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .attach_consumer(cam("cam-1"), rtsp(), MockTransport::new())
                        .await.unwrap()
                })
            })
            .collect();

        for attach in attaches {
            attach.await.unwrap();
        }

        assert_eq!(registry.stats().sessions_started, 1);
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.consumer_count(&cam("cam-1")).await, 16);
        eventually!(source.opens() == 1);

        registry.shutdown().await;
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent_sessions() {
        let source = MockSource::new();
        let registry = registry(&source);

        // Same URL, two keys
        let a = registry
            .attach_consumer(cam("lobby"), rtsp(), MockTransport::new())
            .await.unwrap();
        registry
            .attach_consumer(cam("lobby-copy"), rtsp(), MockTransport::new())
            .await.unwrap();

        assert_eq!(registry.session_count().await, 2);
        eventually!(source.opens() == 2);

        registry.detach_consumer(&cam("lobby"), a).await;
        assert!(!registry.has_session(&cam("lobby")).await);
        assert!(registry.has_session(&cam("lobby-copy")).await);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_exists_iff_consumers_attached() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");
        let mut rng = StdRng::seed_from_u64(7);
        let mut attached: Vec<ConsumerId> = Vec::new();

        for _ in 0..60 {
            if attached.is_empty() || rng.random_bool(0.5) {
                let id = registry
                    .attach_consumer(key.clone(), rtsp(), MockTransport::new())
                    .await.unwrap();
                attached.push(id);
            } else {
                let index = rng.random_range(0..attached.len());
                let id = attached.swap_remove(index);
                assert!(registry.detach_consumer(&key, id).await);
            }

            assert_eq!(registry.has_session(&key).await, !attached.is_empty());
            assert_eq!(registry.consumer_count(&key).await, attached.len());
        }

        for id in attached.drain(..) {
            registry.detach_consumer(&key, id).await;
        }
        assert!(!registry.has_session(&key).await);
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_failing_upstream_keeps_session_until_detach() {
        let source = MockSource::new().failing();
        let registry = registry(&source);
        let key = cam("cam-1");

        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();

        // Attach still succeeds; the session just keeps retrying
        eventually!(registry.session_state(&key).await == Some(CaptureState::Backoff));
        eventually!(source.open_attempts() >= 3);
        assert!(registry.has_session(&key).await);

        registry.detach_consumer(&key, c1).await;

        assert!(!registry.has_session(&key).await);
        assert_eq!(source.opens(), 0);
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_late_joiner_gets_last_frame_only() {
        // Upstream never delivers, frames are published by hand
        let source = MockSource::new().silent();
        let registry = registry(&source);
        let key = cam("cam-1");

        let t1 = MockTransport::new();
        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), t1.clone())
            .await.unwrap();
        let broadcaster = registry.broadcaster(&key).await.unwrap();

        for n in 1..=5u8 {
            let frame = broadcaster
                .publish_payload(Bytes::from(vec![n]), Instant::now())
                .unwrap();
            assert_eq!(frame.sequence(), n as u64);
        }

        let t2 = MockTransport::new();
        let c2 = registry
            .attach_consumer(key.clone(), rtsp(), t2.clone())
            .await.unwrap();

        eventually!(t2.sent_count() == 1);
        eventually!(t1.sent().last() == Some(&Bytes::from(vec![5u8])));
        assert_eq!(t2.sent(), vec![Bytes::from(vec![5u8])]);

        // C1 may have skipped frames, but never went backwards
        let seen: Vec<u8> = t1.sent().iter().map(|b| b[0]).collect();
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");

        registry.detach_consumer(&key, c1).await;
        registry.detach_consumer(&key, c2).await;

        assert!(!registry.has_session(&key).await);
        assert_eq!(registry.stats().sessions_stopped, 1);
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_detaches_only_that_consumer() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        let healthy = MockTransport::new();
        let broken = MockTransport::new();
        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), healthy.clone())
            .await.unwrap();
        let c2 = registry
            .attach_consumer(key.clone(), rtsp(), broken.clone())
            .await.unwrap();

        eventually!(healthy.sent_count() > 0);
        broken.fail();

        eventually!(!registry.is_attached(&key, c2).await);
        assert!(broken.is_closed());
        assert!(registry.is_attached(&key, c1).await);

        // Capture and the other consumer are unaffected
        let before = healthy.sent_count();
        eventually!(healthy.sent_count() > before);
        assert_eq!(
            registry.session_state(&key).await,
            Some(CaptureState::Streaming)
        );

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_last_consumer_transport_failure_closes_session() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        let transport = MockTransport::new();
        registry
            .attach_consumer(key.clone(), rtsp(), transport.clone())
            .await.unwrap();
        eventually!(transport.sent_count() > 0);

        transport.fail();

        eventually!(!registry.has_session(&key).await);
        eventually!(source.open_connections() == 0);
        assert_eq!(registry.stats().active_consumers, 0);
    }

    #[tokio::test]
    async fn test_session_stats() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        assert!(registry.session_stats(&key).await.is_none());

        let transport = MockTransport::new();
        registry
            .attach_consumer(key.clone(), rtsp(), transport.clone())
            .await.unwrap();
        eventually!(transport.sent_count() >= 3);

        let stats = registry.session_stats(&key).await.unwrap();
        assert_eq!(stats.state, CaptureState::Streaming);
        assert_eq!(stats.consumer_count, 1);
        assert!(stats.last_sequence.unwrap() >= 3);
        assert!(stats.counters.frames_delivered >= 3);
        assert!(stats.counters.connect_attempts >= 1);

        registry.shutdown().await;
        let totals = registry.stats();
        assert_eq!(totals.active_sessions, 0);
        assert_eq!(totals.active_consumers, 0);
    }

    #[tokio::test]
    async fn test_reattach_after_close_starts_fresh_session() {
        let source = MockSource::new();
        let registry = registry(&source);
        let key = cam("cam-1");

        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await.unwrap();
        eventually!(registry.last_frame(&key).await.is_some());
        registry.detach_consumer(&key, c1).await;
        assert_eq!(source.open_connections(), 0);

        let transport = MockTransport::new();
        registry
            .attach_consumer(key.clone(), rtsp(), transport.clone())
            .await.unwrap();

        // Sequence numbering restarts with the new session
        eventually!(transport.sent_count() > 0);
        assert_eq!(registry.stats().sessions_started, 2);
        eventually!(source.opens() == 2);

        registry.shutdown().await;
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_slow_close_does_not_delay_other_cameras() {
        let source = MockSource::new().slow_close(Duration::from_millis(500));
        let registry = registry_with(&source, Duration::from_secs(2));

        let a = registry
            .attach_consumer(cam("cam-a"), rtsp(), MockTransport::new())
            .await
            .unwrap();
        eventually!(source.opens() == 1);

        let detach = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.detach_consumer(&cam("cam-a"), a).await })
        };
        eventually!(!registry.has_session(&cam("cam-a")).await);

        // cam-a is still closing its upstream
        let started = Instant::now();
        let b = registry
            .attach_consumer(cam("cam-b"), rtsp(), MockTransport::new())
            .await
            .unwrap();
        assert!(registry.is_attached(&cam("cam-b"), b).await);
        assert_eq!(registry.session_count().await, 1);
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
        assert_eq!(source.closes(), 0);

        assert!(detach.await.unwrap());
        assert_eq!(source.closes(), 1);
        assert_eq!(registry.stats().sessions_stopped, 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_reattach_waits_for_previous_upstream_to_close() {
        let source = MockSource::new().slow_close(Duration::from_millis(300));
        let registry = registry_with(&source, Duration::from_secs(2));
        let key = cam("cam-1");

        let c1 = registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await
            .unwrap();
        eventually!(source.opens() == 1);

        let detach = {
            let registry = Arc::clone(&registry);
            let key = key.clone();
            tokio::spawn(async move { registry.detach_consumer(&key, c1).await })
        };
        eventually!(!registry.has_session(&key).await);

        registry
            .attach_consumer(key.clone(), rtsp(), MockTransport::new())
            .await
            .unwrap();

        // The old connection was released before the new session existed
        assert_eq!(source.closes(), 1);
        assert!(source.open_connections() <= 1);
        assert!(detach.await.unwrap());

        eventually!(source.opens() == 2);
        assert_eq!(source.open_connections(), 1);

        registry.shutdown().await;
        assert_eq!(source.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_attach_after_shutdown_is_refused() {
        let source = MockSource::new();
        let registry = registry(&source);

        registry
            .attach_consumer(cam("cam-1"), rtsp(), MockTransport::new())
            .await
            .unwrap();
        registry.shutdown().await;
        assert!(registry.is_closed());
        let started = registry.stats().sessions_started;

        let transport = MockTransport::new();
        let result = registry
            .attach_consumer(cam("cam-2"), rtsp(), transport.clone())
            .await;

        assert!(matches!(result, Err(Error::RegistryClosed)));
        assert!(transport.is_closed());
        assert!(!registry.has_session(&cam("cam-2")).await);
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.stats().sessions_started, started);
        assert_eq!(source.open_connections(), 0);
    }
}
