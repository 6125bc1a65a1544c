use cadenza_core::{Cue, Fragment, NonNativeTextTrack, TextTrackKind};

/// Captions and subtitle output events.
#[derive(Clone, Debug)]
pub enum TextEvent {
    /// A subtitle fragment left the timeline controller, either parsed
    /// (`success`) or deferred/failed, so the fetcher can advance.
    SubtitleFragProcessed {
        success: bool,
        frag: Fragment,
        error: Option<String>,
    },
    /// A batch of cues is ready for an embedder-rendered track.
    CuesParsed {
        kind: TextTrackKind,
        cues: Vec<Cue>,
        /// Identity of the destination track.
        track: String,
    },
    /// Text tracks discovered; emitted once per track set when native
    /// rendering is disabled.
    NonNativeTextTracksFound { tracks: Vec<NonNativeTextTrack> },
    /// All subtitle tracks were torn down.
    SubtitleTracksCleared,
}
