//! Progress throttling.
//!
//! Rate-limits progress callbacks so downstream consumers are not flooded.

use std::time::{Duration, Instant};

/// Default minimum interval between transfer progress callbacks.
pub const TRANSFER_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Rate-limiter for progress updates.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check if enough time has passed to emit another progress update.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    /// Same as [`Self::should_emit`] with an explicit clock reading.
    pub fn should_emit_at(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Force the next check to return true.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(TRANSFER_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_emit() {
        let mut throttle = ProgressThrottle::default();
        assert!(throttle.should_emit());
    }

    #[test]
    fn test_throttle_respects_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        assert!(throttle.should_emit_at(start));
        assert!(!throttle.should_emit_at(start + Duration::from_millis(400)));
        assert!(!throttle.should_emit_at(start + Duration::from_millis(999)));
        assert!(throttle.should_emit_at(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_throttle_reset() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        throttle.should_emit();
        assert!(!throttle.should_emit());

        throttle.reset();
        assert!(throttle.should_emit());
    }
}
