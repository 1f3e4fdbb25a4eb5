use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Cumulative progress of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// Remote path of the transfer.
    pub path: String,
    pub transferred: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Returns the progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.transferred as f64 / self.total as f64 * 100.0
    }
}

/// Callback invoked with transfer progress.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Reports progress of one transfer to the log and an optional callback.
///
/// Reporting never influences control flow.
pub struct ProgressReporter {
    path: String,
    total: u64,
    last: Mutex<u64>,
    speed: SpeedCalculator,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(path: impl Into<String>, total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            path: path.into(),
            total,
            last: Mutex::new(0),
            speed: SpeedCalculator::new(None, None),
            callback,
        }
    }

    /// Records that `transferred` bytes (cumulative) are now on the server.
    pub fn report(&self, transferred: u64) {
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            // Offset corrections can move backwards; only forward motion counts as throughput.
            self.speed.add_sample(transferred.saturating_sub(*last));
            *last = transferred;
        }

        let progress = TransferProgress {
            path: self.path.clone(),
            transferred,
            total: self.total,
        };
        let eta = self.speed.eta(self.total.saturating_sub(transferred));
        debug!(
            path = %self.path,
            transferred,
            total = self.total,
            percent = progress.percentage(),
            bytes_per_sec = self.speed.bytes_per_second() as u64,
            eta_secs = eta.map(|d| d.as_secs()),
            "transfer progress"
        );

        if let Some(cb) = &self.callback {
            cb(progress);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 30 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(30)),
            }),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        if s.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        // The first sample marks the window start; its bytes predate it.
        let total_bytes: u64 = s.samples.iter().skip(1).map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        s.samples.clear();
    }
}
