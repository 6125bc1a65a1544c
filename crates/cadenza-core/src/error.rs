//! Protocol error taxonomy carried on the event bus.
//!
//! These are not Rust `Error` types: they describe recoverable and fatal
//! conditions of the playback session itself (network failures, codec
//! incompatibilities) and travel as [`ErrorData`] events so every controller
//! observes the same failure. API misuse and parse failures use per-crate
//! `thiserror` enums instead.

use crate::Fragment;

/// Broad error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Media,
    Other,
}

/// Specific error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDetails {
    ManifestIncompatibleCodecs,
    LevelLoadError,
    LevelLoadTimeout,
    LevelSwitchError,
    FragLoadError,
    FragLoadTimeout,
    KeyLoadError,
    KeyLoadTimeout,
    RemuxAllocError,
}

impl ErrorDetails {
    /// Whether this error is scoped to a whole rendition playlist.
    #[must_use]
    pub fn is_level_scoped(self) -> bool {
        matches!(self, Self::LevelLoadError | Self::LevelLoadTimeout)
    }

    /// Whether this error is scoped to a single fragment or key load.
    #[must_use]
    pub fn is_fragment_scoped(self) -> bool {
        matches!(
            self,
            Self::FragLoadError
                | Self::FragLoadTimeout
                | Self::KeyLoadError
                | Self::KeyLoadTimeout
                | Self::RemuxAllocError
        )
    }
}

/// An error event.
///
/// Recovery logic is allowed to mutate `fatal` (promotion after retry
/// exhaustion) and `level_retry` before the event is re-published, so error
/// dispatch hands controllers a `&mut ErrorData` first and observers see the
/// final form.
#[derive(Debug, Clone)]
pub struct ErrorData {
    pub kind: ErrorKind,
    pub details: ErrorDetails,
    pub fatal: bool,
    /// Index of the rendition the error is attributed to.
    pub level: Option<usize>,
    pub frag: Option<Fragment>,
    pub context: Option<String>,
    pub reason: Option<String>,
    /// Set by the level controller when a retry has been scheduled.
    pub level_retry: bool,
}

impl ErrorData {
    #[must_use]
    pub fn new(kind: ErrorKind, details: ErrorDetails, fatal: bool) -> Self {
        Self {
            kind,
            details,
            fatal,
            level: None,
            frag: None,
            context: None,
            reason: None,
            level_retry: false,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_frag(mut self, frag: Fragment) -> Self {
        self.frag = Some(frag);
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
