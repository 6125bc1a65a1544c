//! Load timing statistics.

use std::time::{Duration, Instant};

/// Wall-clock timing of one playlist or fragment request.
#[derive(Debug, Clone, Copy)]
pub struct LoadStats {
    /// Request issued.
    pub trequest: Instant,
    /// First byte received.
    pub tfirst: Instant,
    /// Load complete.
    pub tload: Instant,
    pub loaded_bytes: u64,
}

impl LoadStats {
    /// Stats for a request that started `now` and completed instantly.
    /// Useful for synthetic events in tests.
    #[must_use]
    pub fn zero(now: Instant) -> Self {
        Self {
            trequest: now,
            tfirst: now,
            tload: now,
            loaded_bytes: 0,
        }
    }

    /// Total request round-trip time.
    #[must_use]
    pub fn load_duration(&self) -> Duration {
        self.tload.saturating_duration_since(self.trequest)
    }

    /// Time to first byte.
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.tfirst.saturating_duration_since(self.trequest)
    }
}
