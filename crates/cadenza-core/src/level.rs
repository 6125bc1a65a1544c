//! Rendition (level) and playlist state types.

use url::Url;

use crate::Fragment;

/// One rendition entry exactly as it appeared in the multivariant playlist,
/// before grouping and codec filtering.
#[derive(Debug, Clone)]
pub struct ParsedLevel {
    /// Peak bandwidth in bits per second.
    pub bitrate: u32,
    pub url: Url,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    /// `AUDIO` group id from `#EXT-X-STREAM-INF`.
    pub audio_group_id: Option<String>,
    /// `SUBTITLES` group id from `#EXT-X-STREAM-INF`.
    pub text_group_id: Option<String>,
    pub name: Option<String>,
}

/// One alternate-media entry (`#EXT-X-MEDIA`), e.g. an audio rendition or a
/// subtitle playlist.
#[derive(Debug, Clone)]
pub struct MediaTrackInfo {
    pub id: usize,
    pub group_id: Option<String>,
    pub name: Option<String>,
    pub lang: Option<String>,
    pub url: Option<Url>,
    pub default: bool,
}

/// `#EXT-X-PLAYLIST-TYPE` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
}

/// `#EXT-X-SERVER-CONTROL` attributes relevant to low-latency delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerControl {
    /// Server honours `_HLS_msn`/`_HLS_part` blocking reloads.
    pub can_block: bool,
    /// Delta-update window in seconds; 0 disables `_HLS_skip`.
    pub can_skip_until: f64,
    pub hold_back: f64,
    pub part_hold_back: f64,
}

/// Blocking-reload hints a server embedded in the playlist's own URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushParams {
    pub msn: u64,
    pub part: Option<u64>,
}

/// Parsed per-rendition playlist state.
///
/// Created by the external playlist parser, installed on its owning [`Level`]
/// by the level controller, and replaced whole on every successful reload,
/// never mutated in place after installation.
#[derive(Debug, Clone)]
pub struct LevelDetails {
    pub live: bool,
    /// First media sequence number in `fragments`.
    pub start_sn: u64,
    /// Last media sequence number in `fragments`, `end_sn >= start_sn`.
    pub end_sn: u64,
    pub start_cc: u32,
    pub end_cc: u32,
    /// Latest partial-segment index, when the playlist advertises parts.
    pub end_part: Option<u64>,
    /// `#EXT-X-TARGETDURATION` in seconds.
    pub target_duration: f64,
    pub total_duration: f64,
    pub fragments: Vec<Fragment>,
    pub init_segment: Option<Fragment>,
    pub playlist_type: Option<PlaylistType>,
    pub server_control: Option<ServerControl>,
    /// `PART-TARGET` from `#EXT-X-PART-INF`, seconds.
    pub part_target: Option<f64>,
    /// Set by the reload logic: true iff `end_sn` or the URL changed
    /// relative to the previously installed details.
    pub updated: bool,
    /// Estimated edge-availability delay in seconds.
    pub availability_delay: f64,
    /// URL this playlist was loaded from.
    pub url: Url,
    /// Blocking-reload hints parsed out of `url`'s query.
    pub push: Option<PushParams>,
}

impl LevelDetails {
    /// Whether the server supports LL-HLS blocking playlist reloads.
    #[must_use]
    pub fn can_block_reload(&self) -> bool {
        self.part_target.is_some() && self.server_control.is_some_and(|sc| sc.can_block)
    }

    /// Live latency target recommended by the playlist.
    ///
    /// `HOLD-BACK` wins, then `PART-HOLD-BACK`, then three part targets;
    /// `None` for playlists that advertise neither.
    #[must_use]
    pub fn recommended_latency(&self) -> Option<f64> {
        let sc = self.server_control;
        sc.map(|sc| sc.hold_back)
            .filter(|hb| *hb > 0.0)
            .or_else(|| sc.map(|sc| sc.part_hold_back).filter(|phb| *phb > 0.0))
            .or_else(|| self.part_target.map(|pt| pt * 3.0))
    }
}

/// One logical rendition: a bitrate plus one or more redundant playlist URLs.
#[derive(Debug, Clone)]
pub struct Level {
    /// Peak bandwidth in bits per second; unique after manifest grouping.
    pub bitrate: u32,
    /// Redundant playlist URLs, `url.len() >= 1`.
    pub url: Vec<Url>,
    /// Index of the active URL, `url_id < url.len()`.
    pub url_id: usize,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub audio_group_ids: Vec<String>,
    pub text_group_ids: Vec<String>,
    pub name: Option<String>,
    pub details: Option<LevelDetails>,
    /// Consecutive load failures on this level. `load_error < url.len()`
    /// means redundant URLs remain untried.
    pub load_error: usize,
    /// Last failure on this level was fragment-scoped.
    pub fragment_error: bool,
}

impl Level {
    /// Build a level from its first manifest occurrence.
    #[must_use]
    pub fn from_parsed(parsed: &ParsedLevel) -> Self {
        Self {
            bitrate: parsed.bitrate,
            url: vec![parsed.url.clone()],
            url_id: 0,
            audio_codec: parsed.audio_codec.clone(),
            video_codec: parsed.video_codec.clone(),
            audio_group_ids: parsed.audio_group_id.iter().cloned().collect(),
            text_group_ids: parsed.text_group_id.iter().cloned().collect(),
            name: parsed.name.clone(),
            details: None,
            load_error: 0,
            fragment_error: false,
        }
    }

    /// The currently active playlist URL.
    #[must_use]
    pub fn active_url(&self) -> &Url {
        &self.url[self.url_id]
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn details(server_control: Option<ServerControl>, part_target: Option<f64>) -> LevelDetails {
        LevelDetails {
            live: true,
            start_sn: 0,
            end_sn: 0,
            start_cc: 0,
            end_cc: 0,
            end_part: None,
            target_duration: 6.0,
            total_duration: 0.0,
            fragments: Vec::new(),
            init_segment: None,
            playlist_type: None,
            server_control,
            part_target,
            updated: true,
            availability_delay: 0.0,
            url: Url::parse("https://example.com/level.m3u8").unwrap(),
            push: None,
        }
    }

    #[rstest]
    #[case(Some(ServerControl { can_block: true, can_skip_until: 0.0, hold_back: 9.0, part_hold_back: 1.0 }), None, Some(9.0))]
    #[case(Some(ServerControl { can_block: true, can_skip_until: 0.0, hold_back: 0.0, part_hold_back: 1.5 }), None, Some(1.5))]
    #[case(None, Some(0.5), Some(1.5))]
    #[case(None, None, None)]
    fn recommended_latency_prefers_hold_back(
        #[case] server_control: Option<ServerControl>,
        #[case] part_target: Option<f64>,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(
            details(server_control, part_target).recommended_latency(),
            expected
        );
    }

    #[test]
    fn can_block_reload_requires_part_target() {
        let sc = ServerControl {
            can_block: true,
            can_skip_until: 0.0,
            hold_back: 0.0,
            part_hold_back: 0.0,
        };
        assert!(!details(Some(sc), None).can_block_reload());
        assert!(details(Some(sc), Some(1.0)).can_block_reload());
        assert!(!details(None, Some(1.0)).can_block_reload());
    }
}
