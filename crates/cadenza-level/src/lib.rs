#![forbid(unsafe_code)]

//! Rendition management for HLS playback.
//!
//! The level controller owns the `Level` set: it admits the manifest's
//! renditions (grouping redundant streams, filtering unsupported codecs),
//! gates rendition switching, keeps live playlists fresh on a reload timer
//! (blocking LL-HLS reloads included), and runs the error-recovery state
//! machine with backoff, redundant-URL failover and rendition walk-down.

mod controller;
mod ll_hls;
mod options;
mod reload;

pub use controller::LevelController;
pub use ll_hls::{build_blocking_reload_url, parse_push_params};
pub use options::{
    AutoLevelProvider, Capabilities, LevelOptions, LowestLevelProvider,
};
pub use reload::{compute_reload_interval, LOW_LATENCY_HEAD_START, MIN_RELOAD_INTERVAL};
