use rand::Rng;
use std::time::Duration;

/// Exponential backoff intervals in minutes, up to ~4 hours.
///
/// Every value must be even so that half of it is a whole number of minutes.
pub const BACKOFF_DURATIONS_MINUTES: [u64; 8] = [2, 4, 8, 16, 32, 64, 128, 256];

/// Connection attempts a fresh client allows before reporting the stream as
/// unavailable.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Backoff policy for realtime stream reconnection.
///
/// The delay only depends on the number of consecutive failed streams; the
/// retry budget is tracked separately by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum retry budget (also the value restored after a successful open).
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    /// Retry budget for a new client, given the failure count persisted by a
    /// previous process. Never below 1 so a restarted app always tries once.
    pub fn initial_retries(&self, num_failed_streams: u32) -> u32 {
        self.max_retries.saturating_sub(num_failed_streams).max(1)
    }

    /// Un-jittered delay for the given (1-based) failure count.
    ///
    /// Counts beyond the table length stay at the last entry; 0 is treated as 1.
    pub fn base_delay(&self, num_failed_streams: u32) -> Duration {
        let idx = (num_failed_streams.max(1) as usize).min(BACKOFF_DURATIONS_MINUTES.len());
        Duration::from_secs(BACKOFF_DURATIONS_MINUTES[idx - 1] * 60)
    }

    /// Random delay in `[base / 2, base * 3 / 2)` for the given failure count.
    pub fn next_delay<R: Rng + ?Sized>(&self, num_failed_streams: u32, rng: &mut R) -> Duration {
        let base_ms = self.base_delay(num_failed_streams).as_millis() as u64;
        Duration::from_millis(base_ms / 2 + rng.gen_range(0..base_ms))
    }
}
