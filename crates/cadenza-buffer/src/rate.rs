//! Closed-loop playback-rate control.
//!
//! While media is attached, the controller samples the sink clock every
//! 250 ms, measures the contiguous forward buffer and steers the playback
//! rate toward the latency target with a saturating sigmoid gain.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use cadenza_core::MediaClock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::BufferOptions;

/// Sampling period of the control loop.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

const SIGMOID_SPAN: f64 = 2.0;
const SIGMOID_SLOPE: f64 = 0.5;

/// Sigmoid gain: saturating in `(0, 2)`, exactly `1` at the target.
fn sigmoid(x: f64, x0: f64) -> f64 {
    SIGMOID_SPAN / (1.0 + f64::exp(-SIGMOID_SLOPE * (x - x0)))
}

/// Playback rate for the given forward buffer length.
///
/// Inside the dead-band (`0 <= latency_target - buffer_length <=
/// refresh_latency`) the rate is exactly `1.0`; outside it, the sigmoid
/// slows playback when the buffer runs dry and speeds it up when the buffer
/// runs long.
#[must_use]
pub fn rate_for(buffer_length: f64, latency_target: f64, refresh_latency: f64) -> f64 {
    let distance = latency_target - buffer_length;
    if distance < 0.0 || distance > refresh_latency {
        sigmoid(buffer_length, latency_target)
    } else {
        1.0
    }
}

/// Length of the contiguous buffered interval forward of `pos`, merging
/// gaps no longer than `max_hole` seconds.
#[must_use]
pub fn forward_buffer_length(pos: f64, ranges: &[(f64, f64)], max_hole: f64) -> f64 {
    let mut end = pos;
    for &(start, range_end) in ranges {
        if range_end <= end {
            continue;
        }
        if start > end + max_hole {
            break;
        }
        end = end.max(range_end);
    }
    end - pos
}

/// Shared mutable targets, updatable while the sampling task runs.
#[derive(Debug)]
struct Targets {
    latency_target_bits: AtomicU64,
}

impl Targets {
    fn new(latency_target: f64) -> Self {
        Self {
            latency_target_bits: AtomicU64::new(latency_target.to_bits()),
        }
    }

    fn latency_target(&self) -> f64 {
        f64::from_bits(self.latency_target_bits.load(Ordering::Acquire))
    }

    fn set_latency_target(&self, secs: f64) {
        self.latency_target_bits.store(secs.to_bits(), Ordering::Release);
    }
}

/// Periodic latency controller. Active only while media is attached.
#[derive(Debug)]
pub struct PlaybackRateController {
    opts: BufferOptions,
    targets: Arc<Targets>,
    cancel: Option<CancellationToken>,
}

impl PlaybackRateController {
    #[must_use]
    pub fn new(opts: BufferOptions) -> Self {
        let targets = Arc::new(Targets::new(opts.latency_target));
        Self {
            opts,
            targets,
            cancel: None,
        }
    }

    /// Attach a media sink and start the 250 ms sampling loop.
    ///
    /// A previous attachment, if any, is detached first.
    pub fn attach(&mut self, media: Arc<dyn MediaClock>) {
        self.detach();

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let targets = Arc::clone(&self.targets);
        let opts = self.opts;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        tick(&*media, &targets, &opts);
                    }
                }
            }
            debug!("playback-rate sampling stopped");
        });

        self.cancel = Some(cancel);
    }

    /// Stop the sampling loop. No further ticks may touch the sink once this
    /// returns; the media handle is released afterwards.
    pub fn detach(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    /// Adopt a new latency target, e.g. the hold-back a live playlist
    /// recommends. Takes effect on the next tick.
    pub fn set_latency_target(&self, secs: f64) {
        self.targets.set_latency_target(secs);
    }

    #[must_use]
    pub fn latency_target(&self) -> f64 {
        self.targets.latency_target()
    }
}

impl Drop for PlaybackRateController {
    fn drop(&mut self) {
        self.detach();
    }
}

fn tick(media: &dyn MediaClock, targets: &Targets, opts: &BufferOptions) {
    let pos = media.current_time();
    let buffer_length = forward_buffer_length(pos, &media.buffered(), opts.max_buffer_hole);
    let rate = rate_for(buffer_length, targets.latency_target(), opts.refresh_latency);
    trace!(pos, buffer_length, rate, "rate sample");
    media.set_playback_rate(rate);
}
