//! Media sink clock abstraction.

use std::fmt;

/// Read/control surface of the attached media element.
///
/// The engine never reaches into a global environment for the sink; a clock
/// is handed over at attach time and dropped on detach. Implementations are
/// expected to be cheap to sample, since the playback-rate controller polls
/// every 250 ms.
pub trait MediaClock: fmt::Debug + Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Buffered time ranges as `(start, end)` pairs in seconds, sorted by
    /// start and non-overlapping.
    fn buffered(&self) -> Vec<(f64, f64)>;

    /// Set the playback rate multiplier.
    fn set_playback_rate(&self, rate: f64);
}
