use cadenza_core::{Level, LevelDetails, LoadStats};
use url::Url;

/// Rendition playlist lifecycle events.
#[derive(Clone, Debug)]
pub enum LevelEvent {
    /// A playlist load should be issued by the external loader.
    Loading {
        url: Url,
        level: usize,
        /// Redundant-URL index the load goes to.
        id: usize,
    },
    /// The external loader delivered parsed playlist details.
    Loaded {
        level: usize,
        details: LevelDetails,
        id: usize,
        stats: LoadStats,
    },
    /// The active rendition is changing.
    Switching { level: usize, bitrate: u32 },
    /// The rendition set changed (level removal, redundant-URL drop).
    Updated { levels: Vec<Level> },
    /// An audio track switch completed; the level controller may re-bind
    /// the redundant URL matching the new group.
    AudioTrackSwitched { id: usize, group_id: Option<String> },
}
