#![forbid(unsafe_code)]

//! Buffer operation queue and playback-rate control.
//!
//! The media sink is a single-updater state machine: per track, at most one
//! append/remove may be outstanding until the sink signals `updateend`. The
//! [`BufferOperationQueue`] owns all ordering guarantees so callers can issue
//! appends lock-free. The [`PlaybackRateController`] independently samples
//! the sink clock and nudges the playback rate toward a latency target.

mod error;
mod options;
mod queue;
mod rate;
mod sink;

pub use error::{BufferError, BufferResult};
pub use options::BufferOptions;
pub use queue::{BufferOperation, BufferOperationQueue};
pub use rate::{forward_buffer_length, rate_for, PlaybackRateController};
pub use sink::SourceBufferSink;
