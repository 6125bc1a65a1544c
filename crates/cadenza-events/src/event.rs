use cadenza_core::ErrorData;

use crate::{FragEvent, LevelEvent, ManifestEvent, MediaEvent, TextEvent};

/// Unified event for the playback engine.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug)]
pub enum Event {
    /// Media sink attach/detach lifecycle.
    Media(MediaEvent),
    /// Multivariant manifest lifecycle.
    Manifest(ManifestEvent),
    /// Rendition playlist lifecycle.
    Level(LevelEvent),
    /// Fragment load/parse pipeline.
    Frag(FragEvent),
    /// Captions and subtitle output.
    Text(TextEvent),
    /// Protocol error, possibly promoted to fatal by recovery logic.
    Error(ErrorData),
}

impl From<MediaEvent> for Event {
    fn from(e: MediaEvent) -> Self {
        Self::Media(e)
    }
}

impl From<ManifestEvent> for Event {
    fn from(e: ManifestEvent) -> Self {
        Self::Manifest(e)
    }
}

impl From<LevelEvent> for Event {
    fn from(e: LevelEvent) -> Self {
        Self::Level(e)
    }
}

impl From<FragEvent> for Event {
    fn from(e: FragEvent) -> Self {
        Self::Frag(e)
    }
}

impl From<TextEvent> for Event {
    fn from(e: TextEvent) -> Self {
        Self::Text(e)
    }
}

impl From<ErrorData> for Event {
    fn from(e: ErrorData) -> Self {
        Self::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use cadenza_core::{ErrorDetails, ErrorKind};

    use super::*;

    #[test]
    fn media_event_into_event() {
        let event: Event = MediaEvent::Detaching.into();
        assert!(matches!(event, Event::Media(MediaEvent::Detaching)));
    }

    #[test]
    fn error_data_into_event() {
        let event: Event =
            ErrorData::new(ErrorKind::Network, ErrorDetails::LevelLoadTimeout, false).into();
        match event {
            Event::Error(data) => {
                assert_eq!(data.details, ErrorDetails::LevelLoadTimeout);
                assert!(!data.fatal);
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
