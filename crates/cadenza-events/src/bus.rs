use tokio::sync::broadcast;

use crate::Event;

/// Fallback channel capacity, sized for the burst of per-fragment events a
/// dispatch turn can produce before subscribers drain.
const DEFAULT_CAPACITY: usize = 64;

/// Typed publish/subscribe channel, the sole coupling between controllers.
///
/// Cheap to clone; every clone publishes into the same channel. Publishing
/// never blocks and never fails: an engine without observers still runs,
/// and a slow subscriber is lagged rather than allowed to stall producers.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create an event bus able to buffer `capacity` undelivered events per
    /// subscriber. Zero selects the default capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event, returning the number of subscribers it reached.
    ///
    /// Accepts any type converting `Into<Event>`, so sub-enum values pass
    /// directly: `bus.publish(LevelEvent::Switching { .. })`. Zero means the
    /// event fell on the floor, which is not an error; controllers publish
    /// unconditionally and leave observation to whoever subscribed.
    pub fn publish<E: Into<Event>>(&self, event: E) -> usize {
        self.tx.send(event.into()).unwrap_or(0)
    }

    /// Subscribe to all events published after this call.
    ///
    /// Each receiver is independent. A receiver that falls more than the
    /// channel capacity behind observes `RecvError::Lagged` and continues
    /// from the oldest retained event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(0)
    }
}
