//! Aggregated engine configuration.

use cadenza_buffer::BufferOptions;
use cadenza_level::LevelOptions;
use cadenza_timeline::TimelineOptions;

/// Top-level configuration, one options struct per subsystem.
#[derive(Clone, Debug, Default)]
pub struct PlayerConfig {
    pub levels: LevelOptions,
    pub buffer: BufferOptions,
    pub timeline: TimelineOptions,
    /// Half-life in seconds of the fast-moving live bandwidth estimate.
    /// Consumed by the external ABR estimator.
    pub abr_ewma_fast_live: Option<f64>,
}

impl PlayerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_levels(mut self, levels: LevelOptions) -> Self {
        self.levels = levels;
        self
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferOptions) -> Self {
        self.buffer = buffer;
        self
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: TimelineOptions) -> Self {
        self.timeline = timeline;
        self
    }

    #[must_use]
    pub fn with_abr_ewma_fast_live(mut self, half_life_secs: f64) -> Self {
        self.abr_ewma_fast_live = Some(half_life_secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compose() {
        let config = PlayerConfig::new()
            .with_abr_ewma_fast_live(3.0)
            .with_buffer(BufferOptions::default().with_latency_target(5.0));
        assert_eq!(config.abr_ewma_fast_live, Some(3.0));
        assert_eq!(config.buffer.latency_target, 5.0);
        assert_eq!(config.levels.level_loading_max_retry, 4);
    }
}
