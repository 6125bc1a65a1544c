//! Timeline controller configuration.

use std::{fmt, sync::Arc};

use cadenza_core::Cue;

/// Post-processing hook applied to every cue before delivery; the embedder
/// can rewrite text or timing to fit its rendering layer.
pub type CueHandler = Arc<dyn Fn(&mut Cue) + Send + Sync>;

/// Label and language of one CEA-608/708 caption channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionsTrackNaming {
    pub label: String,
    pub language: String,
}

/// Caption and subtitle handling configuration.
#[derive(Clone)]
pub struct TimelineOptions {
    /// Parse WebVTT subtitle fragments.
    pub enable_webvtt: bool,
    /// Parse IMSC1 subtitle fragments.
    pub enable_imsc1: bool,
    /// Extract embedded CEA-608/708 captions.
    pub enable_cea708_captions: bool,
    /// When false, tracks are announced through
    /// `NonNativeTextTracksFound` and cues through `CuesParsed` events.
    pub render_text_tracks_natively: bool,
    /// Naming of the four CEA caption channels.
    pub captions_tracks: [CaptionsTrackNaming; 4],
    /// Optional cue post-processing hook.
    pub cue_handler: Option<CueHandler>,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        let naming = |label: &str, language: &str| CaptionsTrackNaming {
            label: label.to_string(),
            language: language.to_string(),
        };
        Self {
            enable_webvtt: true,
            enable_imsc1: true,
            enable_cea708_captions: true,
            render_text_tracks_natively: false,
            captions_tracks: [
                naming("English", "en"),
                naming("Spanish", "es"),
                naming("Unknown CC", ""),
                naming("Unknown CC", ""),
            ],
            cue_handler: None,
        }
    }
}

impl fmt::Debug for TimelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineOptions")
            .field("enable_webvtt", &self.enable_webvtt)
            .field("enable_imsc1", &self.enable_imsc1)
            .field("enable_cea708_captions", &self.enable_cea708_captions)
            .field(
                "render_text_tracks_natively",
                &self.render_text_tracks_natively,
            )
            .field("captions_tracks", &self.captions_tracks)
            .field("cue_handler", &self.cue_handler.as_ref().map(|_| "CueHandler"))
            .finish()
    }
}

impl TimelineOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_webvtt(mut self, enabled: bool) -> Self {
        self.enable_webvtt = enabled;
        self
    }

    #[must_use]
    pub fn with_imsc1(mut self, enabled: bool) -> Self {
        self.enable_imsc1 = enabled;
        self
    }

    #[must_use]
    pub fn with_cea708_captions(mut self, enabled: bool) -> Self {
        self.enable_cea708_captions = enabled;
        self
    }

    #[must_use]
    pub fn with_native_rendering(mut self, enabled: bool) -> Self {
        self.render_text_tracks_natively = enabled;
        self
    }

    /// Rename one of the four CEA caption channels (1-based).
    #[must_use]
    pub fn with_captions_track(
        mut self,
        channel: usize,
        label: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        if (1..=4).contains(&channel) {
            self.captions_tracks[channel - 1] = CaptionsTrackNaming {
                label: label.into(),
                language: language.into(),
            };
        }
        self
    }

    /// Install a cue post-processing hook.
    #[must_use]
    pub fn with_cue_handler(mut self, handler: CueHandler) -> Self {
        self.cue_handler = Some(handler);
        self
    }
}
