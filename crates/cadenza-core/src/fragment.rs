//! Fragment and track identity types.

use url::Url;

/// Buffer track addressed by the media sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Audio,
    Video,
}

impl TrackType {
    /// Both track types, in a fixed iteration order.
    pub const ALL: [TrackType; 2] = [TrackType::Audio, TrackType::Video];
}

/// Playlist family a fragment was loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Main,
    Audio,
    Subtitle,
}

/// Decryption metadata attached to a fragment (`#EXT-X-KEY`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptData {
    /// Encryption method as written in the playlist, e.g. `AES-128`.
    pub method: String,
    /// Key URI, absolute or relative to the playlist.
    pub uri: Option<String>,
    /// Explicit initialization vector, when present.
    pub iv: Option<[u8; 16]>,
}

/// One media segment entry, immutable once parsed.
///
/// The only field ever rewritten after construction is `level`, and only by
/// level removal when surviving renditions are re-indexed.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Media sequence number.
    pub sn: u64,
    /// Discontinuity counter.
    pub cc: u32,
    /// Index of the owning rendition.
    pub level: usize,
    pub kind: FragmentKind,
    /// Presentation start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub url: Url,
    pub decryptdata: Option<DecryptData>,
    /// Wall-clock anchor from `#EXT-X-PROGRAM-DATE-TIME`, in milliseconds
    /// since the Unix epoch.
    pub program_date_time: Option<i64>,
}

impl Fragment {
    /// End of the fragment's presentation interval in seconds.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}
