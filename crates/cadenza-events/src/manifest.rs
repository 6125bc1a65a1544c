use cadenza_core::{Level, LoadStats, MediaTrackInfo, ParsedLevel};
use url::Url;

/// Multivariant (master) manifest lifecycle events.
#[derive(Clone, Debug)]
pub enum ManifestEvent {
    /// A manifest load has been issued; controllers reset per-session state.
    Loading,
    /// The external loader parsed a multivariant playlist.
    Loaded {
        levels: Vec<ParsedLevel>,
        audio_tracks: Vec<MediaTrackInfo>,
        subtitles: Vec<MediaTrackInfo>,
        /// Whether the manifest advertises embedded closed captions.
        captions: bool,
        url: Url,
        stats: LoadStats,
    },
    /// Admission complete: grouped, filtered and sorted renditions.
    Parsed {
        levels: Vec<Level>,
        audio_tracks: Vec<MediaTrackInfo>,
        first_level: usize,
        stats: LoadStats,
        audio: bool,
        video: bool,
        alt_audio: bool,
    },
}
