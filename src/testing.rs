//! Test doubles for the collaborator traits

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;

use crate::capture::{CaptureConfig, FrameSource, RawFrame, SourceConnection};
use crate::delivery::Transport;
use crate::error::{AcquireError, ConnectError, EncodeError, TransportError};
use crate::media::{Resolution, Transcoder};
use crate::registry::SourceDescriptor;

/// Poll an (async) condition until it holds, panicking after two seconds
macro_rules! eventually {
    ($cond:expr) => {{
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if $cond {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "condition never held: {}",
                stringify!($cond)
            );
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }};
}

pub(crate) use eventually;

/// Capture policy with short timings for tests
pub(crate) fn fast_capture_config() -> CaptureConfig {
    CaptureConfig::default()
        .max_frame_rate(None)
        .connect_timeout(Duration::from_millis(500))
        .stale_frame_timeout(Duration::from_millis(200))
        .retry_delay(Duration::from_millis(10), Duration::ZERO)
        .forced_reconnect_interval(None)
}

#[derive(Debug, Default)]
struct SourceShared {
    fail_open: AtomicBool,
    repeating: AtomicBool,
    silent: AtomicBool,
    /// Frames each connection yields before going silent (0 = unlimited)
    stall_after: AtomicU64,
    /// Every Nth frame fails to encode with [`PassthroughTranscoder`]
    /// (0 = never)
    poison_every: AtomicU64,
    frame_delay_ms: AtomicU64,
    close_delay_ms: AtomicU64,
    open_attempts: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    frames: AtomicU64,
}

/// Scriptable frame source that counts connections
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSource {
    shared: Arc<SourceShared>,
}

impl MockSource {
    /// Source yielding a distinct frame every millisecond
    pub(crate) fn new() -> Self {
        let source = Self::default();
        source.shared.frame_delay_ms.store(1, Ordering::Relaxed);
        source
    }

    /// Every open fails
    pub(crate) fn failing(self) -> Self {
        self.shared.fail_open.store(true, Ordering::Relaxed);
        self
    }

    /// Every frame carries the same pixels
    pub(crate) fn repeating(self) -> Self {
        self.shared.repeating.store(true, Ordering::Relaxed);
        self
    }

    /// Each connection goes silent after `frames` frames
    pub(crate) fn stall_after(self, frames: u64) -> Self {
        self.shared.stall_after.store(frames, Ordering::Relaxed);
        self
    }

    /// Every `n`th frame carries pixels the passthrough transcoder rejects
    pub(crate) fn poison_every(self, n: u64) -> Self {
        self.shared.poison_every.store(n, Ordering::Relaxed);
        self
    }

    /// Connections open but never produce a frame
    pub(crate) fn silent(self) -> Self {
        self.shared.silent.store(true, Ordering::Relaxed);
        self
    }

    /// Closing a connection takes `delay`
    pub(crate) fn slow_close(self, delay: Duration) -> Self {
        self.shared
            .close_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
        self
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::Relaxed);
    }

    pub(crate) fn open_attempts(&self) -> usize {
        self.shared.open_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::Relaxed)
    }

    pub(crate) fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::Relaxed)
    }

    /// Connections opened and not yet closed
    pub(crate) fn open_connections(&self) -> usize {
        self.opens() - self.closes()
    }
}

impl FrameSource for MockSource {
    type Connection = MockConnection;

    async fn open(&self, _descriptor: &SourceDescriptor) -> Result<MockConnection, ConnectError> {
        self.shared.open_attempts.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(1)).await;

        if self.shared.fail_open.load(Ordering::Relaxed) {
            return Err(ConnectError::Unreachable("connection refused".into()));
        }

        self.shared.opens.fetch_add(1, Ordering::Relaxed);
        Ok(MockConnection {
            shared: Arc::clone(&self.shared),
            produced: 0,
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    shared: Arc<SourceShared>,
    produced: u64,
}

impl SourceConnection for MockConnection {
    async fn next_latest_frame(&mut self) -> Result<Option<RawFrame>, AcquireError> {
        let stall_after = self.shared.stall_after.load(Ordering::Relaxed);
        let silent = self.shared.silent.load(Ordering::Relaxed);
        if silent || (stall_after > 0 && self.produced >= stall_after) {
            std::future::pending::<()>().await;
        }

        let delay = self.shared.frame_delay_ms.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.produced += 1;
        let n = self.shared.frames.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pixels = if self.shared.repeating.load(Ordering::Relaxed) {
            vec![7u8; 6]
        } else {
            n.to_be_bytes()[2..].to_vec()
        };

        let poison_every = self.shared.poison_every.load(Ordering::Relaxed);
        if poison_every > 0 && n % poison_every == 0 {
            pixels[0] = POISON;
        }

        Ok(Some(RawFrame::rgb(2, 1, pixels)))
    }

    async fn close(self) {
        let delay = self.shared.close_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.shared.closes.fetch_add(1, Ordering::Relaxed);
    }
}

/// First pixel byte that makes [`PassthroughTranscoder`] fail
pub(crate) const POISON: u8 = 0xEE;

/// Transcoder that forwards raw pixels untouched
///
/// Frames whose first byte is [`POISON`] fail to encode.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PassthroughTranscoder;

impl Transcoder for PassthroughTranscoder {
    fn encode(
        &self,
        frame: &RawFrame,
        _target: Resolution,
        _quality: u8,
    ) -> Result<Bytes, EncodeError> {
        match frame.data.first() {
            None => Err(EncodeError::InvalidFrame("empty frame".into())),
            Some(&POISON) => Err(EncodeError::Codec("poisoned frame".into())),
            Some(_) => Ok(frame.data.clone()),
        }
    }
}

#[derive(Debug)]
struct TransportShared {
    sent: Mutex<Vec<Bytes>>,
    failing: AtomicBool,
    closed: AtomicBool,
    /// Writes wait while this is false
    open_gate: watch::Sender<bool>,
}

/// Transport recording every payload it is asked to send
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    shared: Arc<TransportShared>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        let (open_gate, _) = watch::channel(true);
        Self {
            shared: Arc::new(TransportShared {
                sent: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                open_gate,
            }),
        }
    }

    /// Make every following write fail
    pub(crate) fn fail(&self) {
        self.shared.failing.store(true, Ordering::Relaxed);
    }

    /// Hold writes until [`unblock`](Self::unblock)
    pub(crate) fn block(&self) {
        self.shared.open_gate.send_replace(false);
    }

    pub(crate) fn unblock(&self) {
        self.shared.open_gate.send_replace(true);
    }

    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.shared.sent.lock().unwrap().len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed)
    }
}

impl Transport for MockTransport {
    async fn send_frame(&mut self, payload: Bytes) -> Result<(), TransportError> {
        let mut gate = self.shared.open_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(TransportError::Closed);
        }

        if self.shared.failing.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }

        self.shared.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.closed.store(true, Ordering::Relaxed);
    }
}
