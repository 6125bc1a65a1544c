use std::sync::Arc;

use cadenza_core::MediaClock;

/// Media sink lifecycle events.
#[derive(Clone, Debug)]
pub enum MediaEvent {
    /// A media sink is being attached; controllers take their clock handle
    /// from here.
    Attaching { media: Arc<dyn MediaClock> },
    /// The media sink is going away. Controllers must stop timers before
    /// dropping their handle.
    Detaching,
}
