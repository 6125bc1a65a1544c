#![forbid(unsafe_code)]

//! Pass-through remuxing for already-fragmented MP4 payloads.
//!
//! The pass-through path owns the decode-time continuity of the segment
//! stream: consecutive non-discontinuous segments must line up so that one
//! segment's end DTS becomes the next segment's start DTS. It also emits the
//! init segment exactly once per codec configuration and anchors the whole
//! timeline by deriving the initial PTS from the first fragment.

mod bmff;
mod passthrough;

pub use bmff::{
    find_box, get_duration, get_start_dts, offset_start_dts, parse_init_segment, InitData,
    InitTrack, TrackKind,
};
pub use passthrough::{
    InitSegmentData, PassThroughRemuxer, RemuxOutput, RemuxedTrack, RemuxedTrackKind, Remuxer,
    TrackInitInfo,
};
