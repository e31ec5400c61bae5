/// Sizes fetches so that each one covers a fixed window of playback.
///
/// The estimate is a cumulative average over the whole session, not a
/// sliding window.
#[derive(Debug, Clone)]
pub struct BandwidthEstimator {
    target_fetch_bytes: u64,
    buffer_seconds: f64,
}

impl BandwidthEstimator {
    pub fn new(initial_fetch_bytes: u64, buffer_seconds: f64) -> Self {
        Self {
            target_fetch_bytes: initial_fetch_bytes,
            buffer_seconds,
        }
    }

    pub fn fetch_size(&self) -> u64 {
        self.target_fetch_bytes
    }

    pub fn buffer_seconds(&self) -> f64 {
        self.buffer_seconds
    }

    /// Recalibrates from the bytes delivered to the sink and the playback
    /// seconds those bytes made available. Returns the updated fetch size.
    pub fn record_progress(&mut self, bytes_delivered: u64, buffered_seconds: f64) -> u64 {
        let can_estimate =
            bytes_delivered > 0 && buffered_seconds.is_finite() && buffered_seconds > 0.0;
        if !can_estimate {
            return self.target_fetch_bytes;
        }

        let bytes_per_second = (bytes_delivered as f64 / buffered_seconds).round();
        let target = (bytes_per_second * self.buffer_seconds) as u64;
        if target > 0 && target != self.target_fetch_bytes {
            tracing::debug!(
                "Fetch size recalibrated to {target} bytes ({bytes_per_second} B/s over {buffered_seconds:.2}s)"
            );
            self.target_fetch_bytes = target;
        }
        self.target_fetch_bytes
    }
}
