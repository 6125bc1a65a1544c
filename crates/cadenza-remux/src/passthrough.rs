//! Pass-through remuxer: forwards fragmented-MP4 payloads untouched except
//! for decode-time alignment.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::bmff::{self, InitData};

const DEFAULT_AUDIO_CODEC: &str = "mp4a.40.5";
const DEFAULT_VIDEO_CODEC: &str = "avc1.42e01e";

/// Content of a remuxed track batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemuxedTrackKind {
    Audio,
    Video,
    /// Audio and video muxed in one fragment stream.
    AudioVideo,
}

impl RemuxedTrackKind {
    #[must_use]
    pub fn container(self) -> &'static str {
        match self {
            Self::Audio => "audio/mp4",
            Self::Video | Self::AudioVideo => "video/mp4",
        }
    }
}

/// Init-segment description attached to the first remuxed batch.
#[derive(Debug, Clone)]
pub struct TrackInitInfo {
    pub kind: RemuxedTrackKind,
    pub container: &'static str,
    pub codec: String,
    /// Raw init segment bytes to append before media data.
    pub data: Bytes,
}

/// Init metadata attached to a remux result.
#[derive(Debug, Clone, Default)]
pub struct InitSegmentData {
    /// Tracks, present exactly once per codec configuration.
    pub tracks: Vec<TrackInitInfo>,
    /// Initial PTS in seconds, present on the batch that established it.
    pub init_pts: Option<f64>,
}

/// One contiguous remuxed media batch.
#[derive(Debug, Clone)]
pub struct RemuxedTrack {
    pub kind: RemuxedTrackKind,
    pub data: Bytes,
    pub start_dts: f64,
    pub end_dts: f64,
    pub has_audio: bool,
    pub has_video: bool,
}

/// Result of one remux call.
#[derive(Debug, Clone, Default)]
pub struct RemuxOutput {
    pub track: Option<RemuxedTrack>,
    pub init_segment: InitSegmentData,
}

/// Capability set shared by all remuxer variants.
pub trait Remuxer {
    /// Drop all state.
    fn destroy(&mut self);

    /// Reset the PTS anchor, optionally adopting a known initial PTS in
    /// seconds.
    fn reset_timestamp(&mut self, default_init_pts: Option<f64>);

    /// Forget the running end-DTS so the next fragment re-anchors on its
    /// time offset.
    fn reset_next_timestamp(&mut self);

    /// Install a new init segment and codec hints; the next remux emits it.
    fn reset_init_segment(
        &mut self,
        init_segment: Option<Bytes>,
        audio_codec: Option<&str>,
        video_codec: Option<&str>,
    );

    /// Remux one fragment payload arriving at `time_offset` seconds.
    fn remux(&mut self, data: Vec<u8>, time_offset: f64) -> RemuxOutput;
}

/// Remuxer for streams that are already fragmented MP4.
///
/// Keeps DTS continuity across the segment stream: each emitted batch starts
/// where the previous one ended, and every track's base media decode time is
/// shifted by the initial PTS so presentation starts at the requested offset.
#[derive(Debug, Default)]
pub struct PassThroughRemuxer {
    init_pts: Option<f64>,
    last_end_dts: Option<f64>,
    init_data: InitData,
    init_segment_bytes: Option<Bytes>,
    init_tracks: Vec<TrackInitInfo>,
    emit_init_segment: bool,
    audio_codec_hint: Option<String>,
    video_codec_hint: Option<String>,
}

impl PassThroughRemuxer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse init data out of `source` and rebuild the one-shot init track
    /// descriptions.
    fn generate_init_segment(&mut self, source: &[u8]) {
        let init = bmff::parse_init_segment(source);
        if init.is_empty() {
            return;
        }

        let bytes = self
            .init_segment_bytes
            .clone()
            .unwrap_or_else(|| Bytes::copy_from_slice(source));

        let audio_codec = init
            .audio()
            .and_then(|t| t.codec.clone())
            .or_else(|| self.audio_codec_hint.clone())
            .unwrap_or_else(|| DEFAULT_AUDIO_CODEC.to_string());
        let video_codec = init
            .video()
            .and_then(|t| t.codec.clone())
            .or_else(|| self.video_codec_hint.clone())
            .unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string());

        self.init_tracks = match (init.audio().is_some(), init.video().is_some()) {
            (true, true) => vec![TrackInitInfo {
                kind: RemuxedTrackKind::AudioVideo,
                container: RemuxedTrackKind::AudioVideo.container(),
                codec: format!("{audio_codec},{video_codec}"),
                data: bytes,
            }],
            (true, false) => vec![TrackInitInfo {
                kind: RemuxedTrackKind::Audio,
                container: RemuxedTrackKind::Audio.container(),
                codec: audio_codec,
                data: bytes,
            }],
            (false, true) => vec![TrackInitInfo {
                kind: RemuxedTrackKind::Video,
                container: RemuxedTrackKind::Video.container(),
                codec: video_codec,
                data: bytes,
            }],
            (false, false) => Vec::new(),
        };
        self.init_data = init;
        self.emit_init_segment = true;
    }

    fn track_kind(&self) -> RemuxedTrackKind {
        match (self.init_data.audio().is_some(), self.init_data.video().is_some()) {
            (true, true) => RemuxedTrackKind::AudioVideo,
            (true, false) => RemuxedTrackKind::Audio,
            _ => RemuxedTrackKind::Video,
        }
    }
}

impl Remuxer for PassThroughRemuxer {
    fn destroy(&mut self) {
        *self = Self::default();
    }

    fn reset_timestamp(&mut self, default_init_pts: Option<f64>) {
        self.init_pts = default_init_pts;
        self.last_end_dts = None;
    }

    fn reset_next_timestamp(&mut self) {
        self.last_end_dts = None;
    }

    fn reset_init_segment(
        &mut self,
        init_segment: Option<Bytes>,
        audio_codec: Option<&str>,
        video_codec: Option<&str>,
    ) {
        self.audio_codec_hint = audio_codec.map(ToString::to_string);
        self.video_codec_hint = video_codec.map(ToString::to_string);
        self.init_segment_bytes = init_segment.clone();
        self.init_data = InitData::default();
        self.init_tracks.clear();
        if let Some(bytes) = init_segment {
            self.generate_init_segment(&bytes);
        }
    }

    fn remux(&mut self, mut data: Vec<u8>, time_offset: f64) -> RemuxOutput {
        let mut result = RemuxOutput::default();

        // A reset leaves no running DTS; the fragment's advertised time
        // offset becomes the new anchor.
        let last_end_dts = match self.last_end_dts {
            Some(dts) => dts,
            None => {
                self.last_end_dts = Some(time_offset);
                time_offset
            }
        };

        if data.is_empty() {
            return result;
        }

        if self.init_data.is_empty() {
            // The payload may be self-initialising fMP4; pull the moov out
            // of it lazily.
            self.generate_init_segment(&data);
        }
        if self.init_data.is_empty() {
            warn!("no init segment generated, dropping fragment");
            return result;
        }

        if self.emit_init_segment {
            result.init_segment.tracks = self.init_tracks.clone();
            self.emit_init_segment = false;
        }

        if self.init_pts.is_none() {
            let start = bmff::get_start_dts(&self.init_data, &data).unwrap_or(time_offset);
            let init_pts = start - time_offset;
            self.init_pts = Some(init_pts);
            result.init_segment.init_pts = Some(init_pts);
            debug!(init_pts, "initial PTS established");
        }
        let init_pts = self.init_pts.unwrap_or(0.0);

        let duration = bmff::get_duration(&data, &self.init_data);
        let start_dts = last_end_dts;
        let end_dts = start_dts + duration;
        bmff::offset_start_dts(&self.init_data, &mut data, init_pts);

        let has_audio = self.init_data.audio().is_some();
        let has_video = self.init_data.video().is_some();
        result.track = Some(RemuxedTrack {
            kind: self.track_kind(),
            data: Bytes::from(data),
            start_dts,
            end_dts,
            has_audio,
            has_video,
        });
        self.last_end_dts = Some(end_dts);
        result
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::bmff::testbox;

    fn self_initialising_fragment(base: u64, durations: &[u32]) -> Vec<u8> {
        let moov = testbox::moov(&[testbox::trak(1, 90_000, b"vide")]);
        let frag = testbox::fragment(1, base, durations);
        [moov, frag].concat()
    }

    #[test]
    fn first_remux_emits_init_and_init_pts() {
        let mut remuxer = PassThroughRemuxer::new();
        let out = remuxer.remux(self_initialising_fragment(90_000, &[90_000]), 0.0);

        let tracks = &out.init_segment.tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind, RemuxedTrackKind::Video);
        assert_eq!(tracks[0].container, "video/mp4");
        // tkhd-only test moov has no stsd; the default codec fills in.
        assert_eq!(tracks[0].codec, "avc1.42e01e");

        // start DTS 1.0s, offset 0 => initPTS 1.0
        assert_eq!(out.init_segment.init_pts, Some(1.0));

        let track = out.track.unwrap();
        assert_eq!(track.start_dts, 0.0);
        assert!((track.end_dts - 1.0).abs() < 1e-9);
    }

    #[test]
    fn init_segment_is_emitted_once() {
        let mut remuxer = PassThroughRemuxer::new();
        let first = remuxer.remux(self_initialising_fragment(0, &[90_000]), 0.0);
        assert!(!first.init_segment.tracks.is_empty());

        let second = remuxer.remux(testbox::fragment(1, 90_000, &[90_000]), 0.0);
        assert!(second.init_segment.tracks.is_empty());
        assert!(second.init_segment.init_pts.is_none());
    }

    #[test]
    fn consecutive_fragments_keep_dts_continuity() {
        let mut remuxer = PassThroughRemuxer::new();
        let durations: &[u32] = &[90_000, 90_000];

        let mut prev_end = None;
        for i in 0..4u64 {
            let out = remuxer.remux(
                if i == 0 {
                    self_initialising_fragment(0, durations)
                } else {
                    testbox::fragment(1, i * 180_000, durations)
                },
                0.0,
            );
            let track = out.track.unwrap();
            if let Some(prev) = prev_end {
                assert!(
                    (track.start_dts - prev as f64).abs() < 1.0,
                    "discontinuous DTS: {} then {}",
                    prev,
                    track.start_dts
                );
                assert_eq!(track.start_dts, prev as f64);
            }
            prev_end = Some(track.end_dts as i64);
        }
    }

    #[test]
    fn reset_next_timestamp_re_anchors_on_time_offset() {
        let mut remuxer = PassThroughRemuxer::new();
        remuxer.remux(self_initialising_fragment(0, &[90_000]), 0.0);

        remuxer.reset_next_timestamp();
        let out = remuxer.remux(testbox::fragment(1, 900_000, &[90_000]), 30.0);
        let track = out.track.unwrap();
        assert_eq!(track.start_dts, 30.0);
        assert!((track.end_dts - 31.0).abs() < 1e-9);
    }

    #[test]
    fn payload_without_init_data_is_dropped() {
        let mut remuxer = PassThroughRemuxer::new();
        // A bare fragment with no moov anywhere: nothing to say about codecs.
        let out = remuxer.remux(testbox::fragment(1, 0, &[90_000]), 0.0);
        assert!(out.track.is_none());
        assert!(out.init_segment.tracks.is_empty());
    }

    #[test]
    fn remux_offsets_media_decode_time_by_init_pts() {
        let mut remuxer = PassThroughRemuxer::new();
        // First sample at 10.0s, requested offset 0 => initPTS 10.0; the
        // rewritten fragment must start at decode time zero.
        let out = remuxer.remux(self_initialising_fragment(900_000, &[90_000]), 0.0);
        let track = out.track.unwrap();

        let init = crate::bmff::parse_init_segment(&testbox::moov(&[testbox::trak(
            1, 90_000, b"vide",
        )]));
        let rewritten = crate::bmff::get_start_dts(&init, &track.data).unwrap();
        assert_eq!(rewritten, 0.0);
    }

    #[rstest]
    #[case(true, false, RemuxedTrackKind::Video)]
    #[case(false, true, RemuxedTrackKind::Audio)]
    #[case(true, true, RemuxedTrackKind::AudioVideo)]
    fn track_kind_follows_init_data(
        #[case] video: bool,
        #[case] audio: bool,
        #[case] expected: RemuxedTrackKind,
    ) {
        let mut traks = Vec::new();
        if video {
            traks.push(testbox::trak(1, 90_000, b"vide"));
        }
        if audio {
            traks.push(testbox::trak(2, 48_000, b"soun"));
        }
        let moov = testbox::moov(&traks);

        let mut remuxer = PassThroughRemuxer::new();
        remuxer.reset_init_segment(Some(Bytes::from(moov)), None, None);
        let out = remuxer.remux(testbox::fragment(1, 0, &[90_000]), 0.0);
        assert_eq!(out.track.unwrap().kind, expected);
    }

    #[test]
    fn reset_init_segment_combines_audio_video_codecs() {
        let moov = testbox::moov(&[
            testbox::trak(1, 90_000, b"vide"),
            testbox::trak(2, 48_000, b"soun"),
        ]);
        let mut remuxer = PassThroughRemuxer::new();
        remuxer.reset_init_segment(Some(Bytes::from(moov)), Some("mp4a.40.2"), Some("avc1.640028"));

        let out = remuxer.remux(testbox::fragment(1, 0, &[90_000]), 0.0);
        let tracks = &out.init_segment.tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind, RemuxedTrackKind::AudioVideo);
        assert_eq!(tracks[0].codec, "mp4a.40.2,avc1.640028");
        assert_eq!(tracks[0].container, "video/mp4");
    }

    #[test]
    fn reset_timestamp_adopts_default_init_pts() {
        let mut remuxer = PassThroughRemuxer::new();
        remuxer.reset_timestamp(Some(2.0));

        let out = remuxer.remux(self_initialising_fragment(180_000, &[90_000]), 0.0);
        // initPTS already known: not re-derived, not re-announced.
        assert!(out.init_segment.init_pts.is_none());

        let init = crate::bmff::parse_init_segment(&testbox::moov(&[testbox::trak(
            1, 90_000, b"vide",
        )]));
        let rewritten = crate::bmff::get_start_dts(&init, &out.track.unwrap().data).unwrap();
        assert_eq!(rewritten, 0.0);
    }
}
