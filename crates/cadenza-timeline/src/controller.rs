//! Cross-track captions/subtitles synchronisation.

use std::collections::HashMap;

use bytes::Bytes;
use cadenza_core::{Cue, Fragment, FragmentKind, MediaTrackInfo, NonNativeTextTrack, TextTrackKind};
use cadenza_events::{Event, EventBus, FragEvent, ManifestEvent, TextEvent};
use tracing::{debug, trace, warn};

use crate::{
    cea608::{extract_cea608, CaptionByteStream, Cea608Sink},
    cues::{CueRanges, RawCue},
    imsc1::{parse_imsc1, IMSC1_CODEC},
    tables::{InitPtsTable, VttCcTable},
    webvtt::parse_webvtt,
    TimelineOptions,
};

/// Initial PTS synthesized for streams that never announce one (pure-audio
/// playlists), in 90 kHz ticks.
const SYNTHESIZED_INIT_PTS: i64 = 90_000;

/// Latched subtitle codec of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleCodec {
    WebVtt,
    Imsc1,
}

impl SubtitleCodec {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebVtt => "wvtt",
            Self::Imsc1 => IMSC1_CODEC,
        }
    }
}

#[derive(Debug)]
struct SubtitleTrackState {
    track_id: String,
    codec: Option<SubtitleCodec>,
    ranges: CueRanges,
}

#[derive(Debug)]
struct CaptionChannelState {
    track_id: String,
    ranges: CueRanges,
}

/// Correlates decoded CEA-608/708 user data, WebVTT and IMSC1 subtitle
/// fragments against the per-discontinuity initial-PTS table, gating parse
/// until PTS is known and de-duplicating overlapping cue ranges.
pub struct TimelineController {
    bus: EventBus,
    opts: TimelineOptions,
    init_pts: InitPtsTable,
    vtt_ccs: VttCcTable,
    unparsed_vtt_frags: Vec<(Fragment, Bytes)>,
    subtitle_tracks: HashMap<usize, SubtitleTrackState>,
    caption_channels: [Option<CaptionChannelState>; 4],
    cea608_sinks: [Box<dyn Cea608Sink>; 2],
    last_main_sn: Option<u64>,
}

impl TimelineController {
    #[must_use]
    pub fn new(bus: EventBus, opts: TimelineOptions) -> Self {
        Self {
            bus,
            opts,
            init_pts: InitPtsTable::default(),
            vtt_ccs: VttCcTable::new(),
            unparsed_vtt_frags: Vec::new(),
            subtitle_tracks: HashMap::new(),
            caption_channels: [None, None, None, None],
            cea608_sinks: [
                Box::new(CaptionByteStream::new()),
                Box::new(CaptionByteStream::new()),
            ],
            last_main_sn: None,
        }
    }

    /// Replace the per-field 608 consumers (field 0 feeds channel 1,
    /// field 1 feeds channel 3).
    pub fn set_cea608_sinks(&mut self, sinks: [Box<dyn Cea608Sink>; 2]) {
        self.cea608_sinks = sinks;
    }

    /// Route one bus event into the matching handler.
    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Manifest(ManifestEvent::Loading) => self.reset(),
            Event::Manifest(ManifestEvent::Loaded { subtitles, .. }) => {
                self.handle_manifest_loaded(subtitles);
            }
            Event::Frag(FragEvent::Loaded { frag, payload }) => {
                self.handle_frag_loaded(frag, payload.clone());
            }
            Event::Frag(FragEvent::InitPtsFound { frag, init_pts, .. }) => {
                self.handle_init_pts_found(frag, *init_pts);
            }
            Event::Frag(FragEvent::ParsingInitSegment { frag }) => {
                self.handle_frag_parsing_init_segment(frag);
            }
            Event::Frag(FragEvent::ParsingUserdata { frag, samples }) => {
                for sample in samples {
                    self.handle_userdata_sample(frag, sample.pts, &sample.bytes);
                }
            }
            Event::Text(TextEvent::SubtitleTracksCleared) => self.clear_subtitle_tracks(),
            _ => {}
        }
    }

    /// Drop all per-session state.
    pub fn reset(&mut self) {
        self.init_pts.clear();
        self.vtt_ccs.reset();
        self.unparsed_vtt_frags.clear();
        self.subtitle_tracks.clear();
        self.caption_channels = [None, None, None, None];
        self.last_main_sn = None;
        for sink in &mut self.cea608_sinks {
            sink.reset();
        }
    }

    pub fn destroy(&mut self) {
        self.reset();
    }

    /// Known initial PTS for a discontinuity, in 90 kHz ticks.
    #[must_use]
    pub fn init_pts(&self, cc: u32) -> Option<i64> {
        self.init_pts.get(cc)
    }

    /// Number of subtitle fragments currently gated on an unknown init PTS.
    #[must_use]
    pub fn gated_fragments(&self) -> usize {
        self.unparsed_vtt_frags.len()
    }

    /// Latched codec of a subtitle track, `None` while auto-detecting.
    #[must_use]
    pub fn track_codec(&self, track: usize) -> Option<SubtitleCodec> {
        self.subtitle_tracks.get(&track).and_then(|t| t.codec)
    }

    pub fn handle_manifest_loaded(&mut self, subtitles: &[MediaTrackInfo]) {
        if !self.opts.enable_webvtt && !self.opts.enable_imsc1 {
            return;
        }
        let mut announced = Vec::new();
        for info in subtitles {
            let track_id = format!("subtitles-{}", info.id);
            self.subtitle_tracks.insert(
                info.id,
                SubtitleTrackState {
                    track_id: track_id.clone(),
                    codec: None,
                    ranges: CueRanges::default(),
                },
            );
            announced.push(NonNativeTextTrack {
                label: info
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Subtitle {}", info.id + 1)),
                kind: TextTrackKind::Subtitles,
                lang: info.lang.clone(),
                default: info.default,
                id: track_id,
            });
        }
        if !self.opts.render_text_tracks_natively && !announced.is_empty() {
            self.bus
                .publish(TextEvent::NonNativeTextTracksFound { tracks: announced });
        }
    }

    pub fn handle_frag_loaded(&mut self, frag: &Fragment, payload: Bytes) {
        match frag.kind {
            FragmentKind::Main => {
                // A sequence-number jump means the 608 stream is about to
                // restart on an unrelated clock.
                if self.last_main_sn.is_some_and(|last| frag.sn != last + 1) {
                    debug!(sn = frag.sn, "main SN discontinuity, resetting CEA-608 state");
                    for sink in &mut self.cea608_sinks {
                        sink.reset();
                    }
                }
                self.last_main_sn = Some(frag.sn);
            }
            FragmentKind::Subtitle => self.process_subtitle(frag.clone(), payload),
            FragmentKind::Audio => {}
        }
    }

    /// Store the initial PTS for a discontinuity and synchronously drain
    /// every fragment it was gating.
    pub fn handle_init_pts_found(&mut self, frag: &Fragment, init_pts: i64) {
        debug!(cc = frag.cc, init_pts, "initial PTS installed");
        self.init_pts.set(frag.cc, init_pts);
        self.drain_unparsed();
    }

    /// Pure-audio streams never announce an init PTS; synthesize one so
    /// captions can still render. Only the very first init segment counts:
    /// a populated table means real anchors exist.
    pub fn handle_frag_parsing_init_segment(&mut self, frag: &Fragment) {
        if self.init_pts.is_empty() {
            debug!(cc = frag.cc, "synthesizing init PTS for captions");
            self.init_pts.set(frag.cc, SYNTHESIZED_INIT_PTS);
            self.drain_unparsed();
        }
    }

    /// Feed one A/53 user-data sample through extraction into the per-field
    /// 608 sinks.
    pub fn handle_userdata_sample(&mut self, _frag: &Fragment, pts: f64, bytes: &[u8]) {
        if !self.opts.enable_cea708_captions {
            return;
        }
        let fields = extract_cea608(bytes);
        if !fields.field1.is_empty() {
            self.cea608_sinks[0].add_data(pts, &fields.field1);
        }
        if !fields.field2.is_empty() {
            self.cea608_sinks[1].add_data(pts, &fields.field2);
        }
    }

    /// Deliver decoded 608 cues for a caption channel (1-based, channels
    /// 1-4). The external 608 decoder calls back through here so cue
    /// de-duplication and track announcement stay in one place.
    pub fn add_caption_cues(&mut self, channel: usize, cues: Vec<Cue>) {
        if !self.opts.enable_cea708_captions || !(1..=4).contains(&channel) {
            return;
        }
        let slot = &mut self.caption_channels[channel - 1];
        if slot.is_none() {
            let naming = &self.opts.captions_tracks[channel - 1];
            let track_id = format!("textTrack{channel}");
            if !self.opts.render_text_tracks_natively {
                self.bus.publish(TextEvent::NonNativeTextTracksFound {
                    tracks: vec![NonNativeTextTrack {
                        label: naming.label.clone(),
                        kind: TextTrackKind::Captions,
                        lang: (!naming.language.is_empty()).then(|| naming.language.clone()),
                        default: false,
                        id: track_id.clone(),
                    }],
                });
            }
            *slot = Some(CaptionChannelState {
                track_id,
                ranges: CueRanges::default(),
            });
        }

        let Some(state) = slot.as_mut() else {
            return;
        };
        let mut delivered = Vec::new();
        for mut cue in cues {
            if !state.ranges.accept(cue.start, cue.end) {
                trace!(start = cue.start, end = cue.end, "dropping duplicate caption cue");
                continue;
            }
            if let Some(handler) = &self.opts.cue_handler {
                handler(&mut cue);
            }
            delivered.push(cue);
        }
        if !delivered.is_empty() {
            self.bus.publish(TextEvent::CuesParsed {
                kind: TextTrackKind::Captions,
                cues: delivered,
                track: state.track_id.clone(),
            });
        }
    }

    /// Tear down subtitle track state (the captions channels survive; they
    /// belong to the main track).
    pub fn clear_subtitle_tracks(&mut self) {
        self.subtitle_tracks.clear();
        self.unparsed_vtt_frags.clear();
    }

    fn process_subtitle(&mut self, frag: Fragment, payload: Bytes) {
        if payload.is_empty() {
            self.bus.publish(TextEvent::SubtitleFragProcessed {
                success: false,
                frag,
                error: Some("empty subtitle payload".to_string()),
            });
            return;
        }

        let cc = frag.cc;
        let Some(init_pts) = self.init_pts.get(cc) else {
            trace!(cc, sn = frag.sn, "subtitle fragment gated on init PTS");
            // Only signal the fetcher once any anchor exists; before that
            // the whole stream is still starting up.
            let signal = !self.init_pts.is_empty();
            if signal {
                self.bus.publish(TextEvent::SubtitleFragProcessed {
                    success: false,
                    frag: frag.clone(),
                    error: None,
                });
            }
            self.unparsed_vtt_frags.push((frag, payload));
            return;
        };

        self.vtt_ccs.ensure(cc, frag.start);

        let track_key = frag.level;
        self.subtitle_tracks
            .entry(track_key)
            .or_insert_with(|| SubtitleTrackState {
                track_id: format!("subtitles-{track_key}"),
                codec: None,
                ranges: CueRanges::default(),
            });
        let codec = self.subtitle_tracks[&track_key].codec;

        match codec {
            Some(SubtitleCodec::WebVtt) => self.parse_as_webvtt(&frag, &payload, init_pts),
            Some(SubtitleCodec::Imsc1) => self.parse_as_imsc1(&frag, &payload, init_pts),
            None => self.detect_and_parse(&frag, &payload, init_pts),
        }
    }

    /// Codec auto-detection: WebVTT first, IMSC1 on parse failure. An IMSC1
    /// success latches the codec; a double failure latches WebVTT so later
    /// fragments fail fast.
    fn detect_and_parse(&mut self, frag: &Fragment, payload: &Bytes, init_pts: i64) {
        if self.opts.enable_webvtt {
            match parse_webvtt(payload) {
                Ok(parsed) => {
                    self.deliver_webvtt(frag, parsed, init_pts);
                    return;
                }
                Err(vtt_err) => {
                    if self.opts.enable_imsc1 {
                        if let Ok(cues) = parse_imsc1(payload) {
                            debug!(track = frag.level, codec = IMSC1_CODEC, "subtitle codec detected");
                            self.latch_codec(frag.level, SubtitleCodec::Imsc1);
                            self.deliver_cues(frag, cues, -(init_pts as f64 / 90_000.0));
                            return;
                        }
                    }
                    debug!(track = frag.level, "assuming WebVTT subtitles");
                    self.latch_codec(frag.level, SubtitleCodec::WebVtt);
                    self.fail_subtitle(frag, &vtt_err.to_string());
                }
            }
        } else if self.opts.enable_imsc1 {
            match parse_imsc1(payload) {
                Ok(cues) => {
                    self.latch_codec(frag.level, SubtitleCodec::Imsc1);
                    self.deliver_cues(frag, cues, -(init_pts as f64 / 90_000.0));
                }
                Err(err) => self.fail_subtitle(frag, &err.to_string()),
            }
        } else {
            self.fail_subtitle(frag, "all subtitle codecs disabled");
        }
    }

    fn parse_as_webvtt(&mut self, frag: &Fragment, payload: &Bytes, init_pts: i64) {
        if !self.opts.enable_webvtt {
            self.fail_subtitle(frag, "WebVTT disabled");
            return;
        }
        match parse_webvtt(payload) {
            Ok(parsed) => self.deliver_webvtt(frag, parsed, init_pts),
            Err(err) => self.fail_subtitle(frag, &err.to_string()),
        }
    }

    fn parse_as_imsc1(&mut self, frag: &Fragment, payload: &Bytes, init_pts: i64) {
        if !self.opts.enable_imsc1 {
            self.fail_subtitle(frag, "IMSC1 disabled");
            return;
        }
        match parse_imsc1(payload) {
            Ok(cues) => self.deliver_cues(frag, cues, -(init_pts as f64 / 90_000.0)),
            Err(err) => self.fail_subtitle(frag, &err.to_string()),
        }
    }

    fn deliver_webvtt(
        &mut self,
        frag: &Fragment,
        parsed: crate::webvtt::WebVttPayload,
        init_pts: i64,
    ) {
        // With a timestamp map the cues anchor on the MPEG-TS clock; without
        // one they anchor on the start of their discontinuity chain entry.
        let offset = match parsed.timestamp_map {
            Some(map) => (map.mpegts - init_pts) as f64 / 90_000.0 - map.local,
            None => self.vtt_ccs.start_of(frag.cc),
        };
        self.deliver_cues(frag, parsed.cues, offset);
    }

    fn deliver_cues(&mut self, frag: &Fragment, raw: Vec<RawCue>, offset: f64) {
        let Some(state) = self.subtitle_tracks.get_mut(&frag.level) else {
            return;
        };

        let mut delivered = Vec::new();
        for cue in raw {
            let start = cue.start + offset;
            let end = cue.end + offset;
            if !state.ranges.accept(start, end) {
                trace!(start, end, "dropping duplicate subtitle cue");
                continue;
            }
            let mut cue = Cue {
                start,
                end,
                text: cue.text,
                id: cue.id,
            };
            if let Some(handler) = &self.opts.cue_handler {
                handler(&mut cue);
            }
            delivered.push(cue);
        }

        let track = state.track_id.clone();
        if !delivered.is_empty() {
            self.bus.publish(TextEvent::CuesParsed {
                kind: TextTrackKind::Subtitles,
                cues: delivered,
                track,
            });
        }
        self.bus.publish(TextEvent::SubtitleFragProcessed {
            success: true,
            frag: frag.clone(),
            error: None,
        });
    }

    fn latch_codec(&mut self, track: usize, codec: SubtitleCodec) {
        if let Some(state) = self.subtitle_tracks.get_mut(&track) {
            state.codec = Some(codec);
        }
    }

    fn fail_subtitle(&mut self, frag: &Fragment, reason: &str) {
        warn!(sn = frag.sn, track = frag.level, reason, "subtitle fragment failed to parse");
        self.bus.publish(TextEvent::SubtitleFragProcessed {
            success: false,
            frag: frag.clone(),
            error: Some(reason.to_string()),
        });
    }

    fn drain_unparsed(&mut self) {
        if self.unparsed_vtt_frags.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.unparsed_vtt_frags);
        debug!(count = pending.len(), "draining deferred subtitle fragments");
        for (frag, payload) in pending {
            self.process_subtitle(frag, payload);
        }
    }
}
