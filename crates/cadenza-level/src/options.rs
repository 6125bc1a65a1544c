//! Level controller configuration and injected capabilities.

use std::{fmt, sync::Arc, time::Duration};

/// Retry and start-up policy for rendition playlist loading.
#[derive(Clone, Debug)]
pub struct LevelOptions {
    /// Consecutive level-load retries before an error is promoted to fatal.
    pub level_loading_max_retry: u32,
    /// Base delay of the exponential backoff.
    pub level_loading_retry_delay: Duration,
    /// Upper bound of the backoff delay.
    pub level_loading_max_retry_timeout: Duration,
    /// Initial rendition index override.
    pub start_level: Option<usize>,
}

impl Default for LevelOptions {
    fn default() -> Self {
        Self {
            level_loading_max_retry: 4,
            level_loading_retry_delay: Duration::from_millis(1000),
            level_loading_max_retry_timeout: Duration::from_millis(64_000),
            start_level: None,
        }
    }
}

impl LevelOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_retry(mut self, retries: u32) -> Self {
        self.level_loading_max_retry = retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.level_loading_retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.level_loading_max_retry_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_start_level(mut self, level: usize) -> Self {
        self.start_level = Some(level);
        self
    }
}

/// Sink capability descriptor, supplied at engine construction.
///
/// Replaces any reach into a global environment: codec support is an
/// injected predicate and user-agent quirks become explicit flags.
#[derive(Clone)]
pub struct Capabilities {
    /// Whether the media sink can decode a codec string (RFC 6381).
    pub codec_supported: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    /// Erase declared `mp4a.40.34` audio codecs so the demuxer auto-detects
    /// MPEG audio. Historically needed on Chrome and Firefox sinks.
    pub mpeg_audio_workaround: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            codec_supported: Arc::new(|_| true),
            mpeg_audio_workaround: false,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("codec_supported", &"predicate")
            .field("mpeg_audio_workaround", &self.mpeg_audio_workaround)
            .finish()
    }
}

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_codec_support(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.codec_supported = Arc::new(predicate);
        self
    }

    #[must_use]
    pub fn with_mpeg_audio_workaround(mut self, enabled: bool) -> Self {
        self.mpeg_audio_workaround = enabled;
        self
    }
}

/// Source of the next rendition choice when no level is pinned.
///
/// Implemented by the external ABR controller; the default keeps the lowest
/// rendition, which is always safe.
pub trait AutoLevelProvider: Send + Sync {
    fn next_auto_level(&self) -> usize;
}

/// Fallback provider: always the lowest rendition.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestLevelProvider;

impl AutoLevelProvider for LowestLevelProvider {
    fn next_auto_level(&self) -> usize {
        0
    }
}
