//! Capture configuration

use std::time::Duration;

use rand::Rng;

use crate::media::Resolution;

/// Slowest accepted publish rate ceiling (one frame per hour)
pub const MIN_FRAME_RATE: f64 = 1.0 / 3600.0;

/// Fastest accepted publish rate ceiling
pub const MAX_FRAME_RATE: f64 = 1000.0;

/// Capture and reconnect policy for each relay session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Size frames are transcoded to
    pub target_resolution: Resolution,

    /// Encoder quality (1-100)
    pub quality: u8,

    /// Upper bound on publish rate in frames per second (None = unlimited)
    ///
    /// Applied clamped to [`MIN_FRAME_RATE`]..=[`MAX_FRAME_RATE`];
    /// non-finite or non-positive values mean unlimited.
    pub max_frame_rate: Option<f64>,

    /// Open plus first frame must complete within this time
    pub connect_timeout: Duration,

    /// While streaming, a single acquisition slower than this marks the
    /// connection stale
    pub stale_frame_timeout: Duration,

    /// Delay before reconnecting after a failure
    pub retry_delay: Duration,

    /// Random extra delay added to `retry_delay`, drawn uniformly from
    /// `[0, retry_jitter]`
    pub retry_jitter: Duration,

    /// Recycle a healthy connection after it has been up this long
    /// (None = keep it for as long as it works)
    pub forced_reconnect_interval: Option<Duration>,

    /// How long stopping may take before the capture task is aborted
    pub stop_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_resolution: Resolution::new(640, 360),
            quality: 50,
            max_frame_rate: Some(30.0),
            connect_timeout: Duration::from_secs(10),
            stale_frame_timeout: Duration::from_millis(750),
            retry_delay: Duration::from_secs(2),
            retry_jitter: Duration::ZERO,
            forced_reconnect_interval: Some(Duration::from_secs(60)),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl CaptureConfig {
    /// Set the output resolution
    pub fn target_resolution(mut self, width: u32, height: u32) -> Self {
        self.target_resolution = Resolution::new(width, height);
        self
    }

    /// Set encoder quality, clamped to 1-100
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the publish rate ceiling
    ///
    /// None or a non-positive rate disables it; other rates are clamped to
    /// [`MIN_FRAME_RATE`]..=[`MAX_FRAME_RATE`].
    pub fn max_frame_rate(mut self, fps: Option<f64>) -> Self {
        self.max_frame_rate = fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| fps.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE));
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the staleness timeout
    pub fn stale_frame_timeout(mut self, timeout: Duration) -> Self {
        self.stale_frame_timeout = timeout;
        self
    }

    /// Set the reconnect delay and jitter
    pub fn retry_delay(mut self, delay: Duration, jitter: Duration) -> Self {
        self.retry_delay = delay;
        self.retry_jitter = jitter;
        self
    }

    /// Set or disable the forced reconnect interval
    pub fn forced_reconnect_interval(mut self, interval: Option<Duration>) -> Self {
        self.forced_reconnect_interval = interval;
        self
    }

    /// Set the stop timeout
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Minimum time between two acquisitions
    ///
    /// Never zero. Works on the raw field too, so a hand-built config with
    /// an out-of-range rate is clamped rather than rejected.
    pub fn frame_interval(&self) -> Option<Duration> {
        let fps = self
            .max_frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)?
            .clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);

        Duration::try_from_secs_f64(fps.recip())
            .ok()
            .filter(|period| !period.is_zero())
    }

    /// Delay before the next reconnect attempt
    pub fn backoff_delay(&self) -> Duration {
        let jitter_ms = self.retry_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.retry_delay;
        }
        self.retry_delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}
