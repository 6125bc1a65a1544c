use bytes::Bytes;
use cadenza_core::Fragment;

/// One decoded user-data sample (H.264 SEI payload bytes with their PTS).
#[derive(Clone, Debug)]
pub struct UserdataSample {
    /// Presentation timestamp in seconds.
    pub pts: f64,
    pub bytes: Bytes,
}

/// Fragment load/parse pipeline events.
#[derive(Clone, Debug)]
pub enum FragEvent {
    /// A fragment finished loading; `payload` is the raw segment data.
    Loaded { frag: Fragment, payload: Bytes },
    /// A fragment finished decrypting.
    Decrypted { frag: Fragment },
    /// The demuxer extracted A/53 user-data samples from a fragment.
    ParsingUserdata {
        frag: Fragment,
        samples: Vec<UserdataSample>,
    },
    /// The demuxer hit an init segment.
    ParsingInitSegment { frag: Fragment },
    /// Initial PTS of a discontinuity became known on a track.
    InitPtsFound {
        /// Track family the PTS was observed on, e.g. `"main"`.
        id: String,
        frag: Fragment,
        /// 90 kHz ticks.
        init_pts: i64,
    },
}
