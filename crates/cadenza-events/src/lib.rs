#![forbid(unsafe_code)]

//! Typed event bus for the cadenza playback engine.
//!
//! The bus is the sole cross-component coupling: controllers publish the
//! events they produce and subscribe to the events they react to. Payload
//! types live in `cadenza-core`.

mod bus;
mod event;
mod frag;
mod level;
mod manifest;
mod media;
mod text;

pub use bus::EventBus;
pub use event::Event;
pub use frag::{FragEvent, UserdataSample};
pub use level::LevelEvent;
pub use manifest::ManifestEvent;
pub use media::MediaEvent;
pub use text::TextEvent;
