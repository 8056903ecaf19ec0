//! Capture session
//!
//! Owns one upstream connection per relay session and keeps it healthy:
//! connects, pulls the newest frame at a capped rate, transcodes and
//! publishes it, and reconnects on any failure or stall. Nothing that goes
//! wrong upstream escapes this module; failures only move the state machine
//! into backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::FrameBroadcaster;
use crate::error::{AcquireError, ConnectError, Error, StaleCaptureError};
use crate::media::Transcoder;
use crate::registry::{CameraKey, SourceDescriptor};
use crate::stats::SessionMetrics;

use super::config::CaptureConfig;
use super::source::{FrameSource, RawFrame, SourceConnection};
use super::state::CaptureState;

/// How one upstream connection ended
#[derive(Debug)]
enum ConnectionEnd {
    /// Stop requested
    Cancelled,
    /// Connection reached its maximum age and is recycled right away
    Recycle,
    /// Connection is unhealthy, back off before retrying
    Failed(Error),
}

/// Handle to a running capture loop
///
/// Dropping the handle cancels the loop without waiting for it; use
/// [`stop`](Self::stop) to wait until the upstream has been released.
pub struct CaptureSession {
    key: CameraKey,
    state: Arc<watch::Sender<CaptureState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl CaptureSession {
    /// Spawn the capture loop for the broadcaster's camera
    ///
    /// Frames are published through `broadcaster`, and its session metrics
    /// receive the capture counters.
    pub fn start<S, T>(
        descriptor: SourceDescriptor,
        source: Arc<S>,
        transcoder: Arc<T>,
        broadcaster: Arc<FrameBroadcaster>,
        config: CaptureConfig,
    ) -> Self
    where
        S: FrameSource,
        T: Transcoder,
    {
        let (state, _) = watch::channel(CaptureState::Idle);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();
        let key = broadcaster.key().clone();
        let stop_timeout = config.stop_timeout;

        let worker = CaptureWorker {
            key: key.clone(),
            descriptor,
            source,
            transcoder,
            metrics: Arc::clone(broadcaster.metrics()),
            broadcaster,
            config,
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            key,
            state,
            cancel,
            task: Some(task),
            stop_timeout,
        }
    }

    /// Camera this session captures
    pub fn key(&self) -> &CameraKey {
        &self.key
    }

    /// Current lifecycle state
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    /// Stop the loop and release the upstream
    ///
    /// Returns once the loop has exited and its connection is closed. A loop
    /// that does not exit within the stop timeout (a source whose close
    /// hangs) is aborted.
    pub async fn stop(mut self) {
        self.state.send_if_modified(|state| {
            if state.is_shutting_down() {
                return false;
            }
            *state = CaptureState::Stopping;
            true
        });
        self.cancel.cancel();

        let Some(mut task) = self.task.take() else {
            return;
        };

        match time::timeout(self.stop_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(camera = %self.key, error = %e, "Capture task failed");
            }
            Err(_) => {
                tracing::warn!(
                    camera = %self.key,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Capture task did not stop in time, aborting"
                );
                task.abort();
            }
        }

        self.state.send_replace(CaptureState::Stopped);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

/// State owned by the spawned capture loop
struct CaptureWorker<S: FrameSource, T: Transcoder> {
    key: CameraKey,
    descriptor: SourceDescriptor,
    source: Arc<S>,
    transcoder: Arc<T>,
    broadcaster: Arc<FrameBroadcaster>,
    metrics: Arc<SessionMetrics>,
    config: CaptureConfig,
    state: Arc<watch::Sender<CaptureState>>,
    cancel: CancellationToken,
}

impl<S: FrameSource, T: Transcoder> CaptureWorker<S, T> {
    async fn run(self) {
        tracing::info!(camera = %self.key, source = %self.descriptor, "Capture started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(CaptureState::Connecting);
            self.metrics.record_connect_attempt();

            let end = match self.connect().await {
                Ok(Some(mut connection)) => {
                    let end = self.stream(&mut connection).await;
                    connection.close().await;
                    end
                }
                Ok(None) => ConnectionEnd::Cancelled,
                Err(e) => ConnectionEnd::Failed(e),
            };

            match end {
                ConnectionEnd::Cancelled => break,
                ConnectionEnd::Recycle => {
                    tracing::info!(camera = %self.key, "Recycling upstream connection");
                }
                ConnectionEnd::Failed(e) => {
                    self.metrics.record_connection_failure();
                    self.set_state(CaptureState::Backoff);

                    let delay = self.config.backoff_delay();
                    tracing::warn!(
                        camera = %self.key,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Upstream unhealthy, backing off"
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }

        self.state.send_replace(CaptureState::Stopped);
        tracing::info!(camera = %self.key, "Capture stopped");
    }

    /// Move to `next` unless a stop has already been requested
    fn set_state(&self, next: CaptureState) {
        self.state.send_if_modified(|state| {
            if *state == next || !state.can_transition_to(next) {
                return false;
            }
            tracing::debug!(camera = %self.key, from = %state, to = %next, "Capture state");
            *state = next;
            true
        });
    }

    /// Open the upstream; `Ok(None)` means a stop arrived first
    async fn connect(&self) -> Result<Option<S::Connection>, Error> {
        let timeout = self.config.connect_timeout;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            opened = time::timeout(timeout, self.source.open(&self.descriptor)) => match opened {
                Ok(Ok(connection)) => Ok(Some(connection)),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ConnectError::Timeout(timeout).into()),
            },
        }
    }

    /// Pump frames from an open connection until it ends
    async fn stream(&self, connection: &mut S::Connection) -> ConnectionEnd {
        let opened_at = Instant::now();
        let mut streaming = false;

        let mut pacer = self.config.frame_interval().map(|period| {
            let mut pacer = time::interval(period);
            pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            pacer
        });

        loop {
            if let Some(pacer) = pacer.as_mut() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
                    _ = pacer.tick() => {}
                }
            }

            if let Some(max_age) = self.config.forced_reconnect_interval {
                if streaming && opened_at.elapsed() >= max_age {
                    return ConnectionEnd::Recycle;
                }
            }

            // The first frame may take as long as connecting; after that every
            // acquisition has to fit the staleness budget
            let budget = if streaming {
                self.config.stale_frame_timeout
            } else {
                self.config.connect_timeout
            };

            let acquired = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
                acquired = time::timeout(budget, connection.next_latest_frame()) => acquired,
            };

            let raw = match acquired {
                Ok(Ok(Some(raw))) => raw,
                Ok(Ok(None)) => return ConnectionEnd::Failed(AcquireError::EndOfStream.into()),
                Ok(Err(e)) => return ConnectionEnd::Failed(e.into()),
                Err(_) if streaming => {
                    return ConnectionEnd::Failed(StaleCaptureError { budget }.into());
                }
                Err(_) => return ConnectionEnd::Failed(ConnectError::Timeout(budget).into()),
            };

            if !streaming {
                streaming = true;
                self.set_state(CaptureState::Streaming);
                tracing::info!(
                    camera = %self.key,
                    width = raw.width,
                    height = raw.height,
                    "Upstream streaming"
                );
            }

            self.forward(raw);
        }
    }

    /// Transcode and publish one raw frame
    fn forward(&self, raw: RawFrame) {
        let encoded =
            self.transcoder
                .encode(&raw, self.config.target_resolution, self.config.quality);

        match encoded {
            Ok(payload) => {
                self.broadcaster.publish_payload(payload, raw.captured_at);
            }
            Err(e) => {
                self.metrics.record_encode_failure();
                tracing::debug!(camera = %self.key, error = %e, "Skipping frame that failed to encode");
            }
        }
    }
}
