/// Buffer and latency-control configuration.
#[derive(Clone, Copy, Debug)]
pub struct BufferOptions {
    /// Buffered-range gaps no longer than this many seconds are treated as
    /// contiguous when measuring forward buffer.
    pub max_buffer_hole: f64,
    /// Live latency target in seconds the rate controller steers toward.
    pub latency_target: f64,
    /// Dead-band in seconds around the latency target within which the
    /// playback rate stays at 1.0.
    pub refresh_latency: f64,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            max_buffer_hole: 0.1,
            latency_target: 3.0,
            refresh_latency: 1.0,
        }
    }
}

impl BufferOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the contiguity threshold for buffered-range gaps.
    #[must_use]
    pub fn with_max_buffer_hole(mut self, secs: f64) -> Self {
        self.max_buffer_hole = secs;
        self
    }

    /// Set the live latency target.
    #[must_use]
    pub fn with_latency_target(mut self, secs: f64) -> Self {
        self.latency_target = secs;
        self
    }

    /// Set the rate-control dead-band.
    #[must_use]
    pub fn with_refresh_latency(mut self, secs: f64) -> Self {
        self.refresh_latency = secs;
        self
    }
}
