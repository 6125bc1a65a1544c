#![forbid(unsafe_code)]

//! # Cadenza
//!
//! Facade crate for the cadenza HLS playback engine core: the subsystems
//! that turn loaded playlist and media-segment bytes into a continuously
//! playing, latency-bounded presentation on a media sink.
//!
//! The engine is event-driven: an external loader, demuxer and media-source
//! layer exchange typed events with the controllers re-exported here over
//! the [`events::EventBus`].
//!
//! ## Quick start
//!
//! ```ignore
//! use cadenza::prelude::*;
//!
//! let bus = EventBus::new(256);
//! let config = PlayerConfig::default();
//! let levels = LevelController::new(bus.clone(), config.levels, Capabilities::default());
//! let mut timeline = TimelineController::new(bus.clone(), config.timeline);
//! let mut rate = PlaybackRateController::new(config.buffer);
//!
//! // Dispatch loop: route bus events into the controllers.
//! let mut rx = bus.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     levels.handle_event(&event);
//!     timeline.handle_event(&event);
//! }
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod buffer {
    pub use cadenza_buffer::*;
}

pub mod core {
    pub use cadenza_core::*;
}

pub mod events {
    pub use cadenza_events::*;
}

pub mod level {
    pub use cadenza_level::*;
}

pub mod remux {
    pub use cadenza_remux::*;
}

pub mod timeline {
    pub use cadenza_timeline::*;
}

mod config;

pub use config::PlayerConfig;

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::buffer::{
        BufferOperation, BufferOperationQueue, BufferOptions, PlaybackRateController,
        SourceBufferSink,
    };
    pub use crate::config::PlayerConfig;
    pub use crate::core::{
        ErrorData, ErrorDetails, ErrorKind, Fragment, Level, LevelDetails, MediaClock, TrackType,
    };
    pub use crate::events::{Event, EventBus, FragEvent, LevelEvent, ManifestEvent, TextEvent};
    pub use crate::level::{Capabilities, LevelController, LevelOptions};
    pub use crate::remux::{PassThroughRemuxer, Remuxer};
    pub use crate::timeline::{TimelineController, TimelineOptions};
}
