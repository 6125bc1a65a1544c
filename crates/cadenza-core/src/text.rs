//! Text-track value types: cues and non-native track descriptors.

/// Caption kind of a text track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTrackKind {
    Captions,
    Subtitles,
}

impl TextTrackKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Captions => "captions",
            Self::Subtitles => "subtitles",
        }
    }
}

/// One rendered-ready text cue.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Presentation start in seconds.
    pub start: f64,
    /// Presentation end in seconds.
    pub end: f64,
    pub text: String,
    pub id: Option<String>,
}

impl Cue {
    #[must_use]
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            id: None,
        }
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Descriptor of a text track announced to embedders that render cues
/// themselves instead of through a native track API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonNativeTextTrack {
    pub label: String,
    pub kind: TextTrackKind,
    pub lang: Option<String>,
    pub default: bool,
    /// Stable identity used as the `track` field of cue batches.
    pub id: String,
}
