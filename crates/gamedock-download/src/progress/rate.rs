//! Measured throughput and ETA.

use std::time::Instant;

/// EWA smoothing factor (20% of the instant rate, 80% of the previous estimate).
const EWA_SMOOTHING: f64 = 0.2;

/// Turns successive byte counts into a smoothed rate and an ETA.
///
/// The transfer tool reports cumulative bytes only; rate is measured between
/// samples rather than read from the tool.
#[derive(Debug, Default)]
pub struct RateEstimator {
    last: Option<(u64, Instant)>,
    ewa_bps: Option<f64>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample taken now.
    pub fn sample(&mut self, bytes: u64, total: Option<u64>) -> (Option<f64>, Option<u64>) {
        self.sample_at(bytes, total, Instant::now())
    }

    /// Record a sample; returns `(rate_bps, eta_seconds)`.
    ///
    /// The first sample only establishes a baseline and yields no estimate.
    pub fn sample_at(
        &mut self,
        bytes: u64,
        total: Option<u64>,
        now: Instant,
    ) -> (Option<f64>, Option<u64>) {
        let Some((last_bytes, last_time)) = self.last.replace((bytes, now)) else {
            return (None, None);
        };

        let elapsed = now.duration_since(last_time).as_secs_f64();
        if elapsed > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let instant = bytes.saturating_sub(last_bytes) as f64 / elapsed;
            self.ewa_bps = Some(match self.ewa_bps {
                None => instant,
                Some(prev) => EWA_SMOOTHING.mul_add(instant, (1.0 - EWA_SMOOTHING) * prev),
            });
        }

        let rate = self.ewa_bps;
        let eta = match (rate, total) {
            (Some(bps), Some(total)) if bps > 0.0 => {
                #[allow(
                    clippy::cast_precision_loss,
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss
                )]
                let secs = (total.saturating_sub(bytes) as f64 / bps).ceil() as u64;
                Some(secs)
            }
            _ => None,
        };
        (rate, eta)
    }
}
