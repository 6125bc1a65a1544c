#![forbid(unsafe_code)]

//! Captions and subtitle synchronisation.
//!
//! The timeline controller correlates three cue sources (embedded CEA-608
//! user data, WebVTT fragments, IMSC1 fragments) against the main
//! track's per-discontinuity initial PTS, so cues land at the right
//! presentation time no matter which track produced them. Parsing is gated
//! until the PTS anchor exists, re-delivered live fragments are
//! de-duplicated per track, and discontinuities are chained so subtitle
//! timelines stay monotonic.

mod cea608;
mod controller;
mod cues;
mod imsc1;
mod options;
mod tables;
mod webvtt;

pub use cea608::{extract_cea608, CaptionByteStream, Cea608Sink, ExtractedFields};
pub use controller::{SubtitleCodec, TimelineController};
pub use cues::{CueRanges, RawCue};
pub use imsc1::{parse_imsc1, Imsc1Error, IMSC1_CODEC};
pub use options::{CaptionsTrackNaming, CueHandler, TimelineOptions};
pub use tables::{InitPtsTable, VttCc, VttCcTable};
pub use webvtt::{parse_webvtt, TimestampMap, WebVttError, WebVttPayload};
