//! Per-track FIFO serializer over the asynchronous media sink.

use std::{collections::VecDeque, fmt, sync::Arc};

use cadenza_core::TrackType;
use tokio::sync::oneshot;
use tracing::warn;

use crate::{BufferError, SourceBufferSink};

type ExecuteFn = Box<dyn FnOnce() -> Result<(), BufferError> + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(&BufferError) + Send>;

/// One queued buffer mutation.
///
/// `execute` must eventually cause an `updateend` signal on the target
/// buffer (except for blockers, which resolve their handle instead).
/// Operations have no identity; they are compared by queue position only.
pub struct BufferOperation {
    execute: Option<ExecuteFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl BufferOperation {
    pub fn new(execute: impl FnOnce() -> Result<(), BufferError> + Send + 'static) -> Self {
        Self {
            execute: Some(Box::new(execute)),
            on_complete: None,
            on_error: None,
        }
    }

    /// Callback fired when the operation completes via `updateend`.
    #[must_use]
    pub fn on_complete(mut self, cb: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(cb));
        self
    }

    /// Callback fired when `execute` fails synchronously.
    #[must_use]
    pub fn on_error(mut self, cb: impl FnOnce(&BufferError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(cb));
        self
    }

    fn in_flight(&self) -> bool {
        self.execute.is_none()
    }
}

impl fmt::Debug for BufferOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferOperation")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Ordered pending operations per track type.
///
/// Guarantees, for each track:
/// - operations complete in enqueue order;
/// - at most one operation is in flight (dispatched, not yet completed);
/// - a synchronous `execute` failure with an idle sink advances the queue so
///   the track cannot stall.
///
/// Dequeueing after a *successful* `execute` is deliberately left to the
/// external `updateend` observer (via [`shift_and_execute_next`]); this keeps
/// synchronous and asynchronous completions uniform.
///
/// [`shift_and_execute_next`]: BufferOperationQueue::shift_and_execute_next
pub struct BufferOperationQueue {
    sink: Arc<dyn SourceBufferSink>,
    audio: VecDeque<BufferOperation>,
    video: VecDeque<BufferOperation>,
}

impl BufferOperationQueue {
    #[must_use]
    pub fn new(sink: Arc<dyn SourceBufferSink>) -> Self {
        Self {
            sink,
            audio: VecDeque::new(),
            video: VecDeque::new(),
        }
    }

    fn queue_mut(&mut self, track: TrackType) -> &mut VecDeque<BufferOperation> {
        match track {
            TrackType::Audio => &mut self.audio,
            TrackType::Video => &mut self.video,
        }
    }

    fn queue(&self, track: TrackType) -> &VecDeque<BufferOperation> {
        match track {
            TrackType::Audio => &self.audio,
            TrackType::Video => &self.video,
        }
    }

    /// Number of queued operations for `track`, including any in flight.
    #[must_use]
    pub fn len(&self, track: TrackType) -> usize {
        self.queue(track).len()
    }

    #[must_use]
    pub fn is_empty(&self, track: TrackType) -> bool {
        self.queue(track).is_empty()
    }

    /// Whether the head operation for `track` has been dispatched and is
    /// awaiting `updateend`.
    #[must_use]
    pub fn in_flight(&self, track: TrackType) -> bool {
        self.queue(track).front().is_some_and(BufferOperation::in_flight)
    }

    /// Enqueue an operation; starts it immediately iff the queue was empty
    /// and the sink has a buffer for `track`.
    pub fn append(&mut self, op: BufferOperation, track: TrackType) {
        let queue = self.queue_mut(track);
        queue.push_back(op);
        if queue.len() == 1 && self.sink.exists(track) {
            self.execute_next(track);
        }
    }

    /// Enqueue a synthetic operation that resolves the returned handle when
    /// it reaches the head and executes.
    ///
    /// Blockers serialize externally orchestrated actions behind in-flight
    /// buffer work. A blocker produces no `updateend`; once the handle
    /// resolves and the external action is done, the orchestrator must call
    /// [`shift_and_execute_next`] to release the track.
    ///
    /// [`shift_and_execute_next`]: BufferOperationQueue::shift_and_execute_next
    pub fn append_blocker(&mut self, track: TrackType) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.append(
            BufferOperation::new(move || {
                let _ = tx.send(());
                Ok(())
            }),
            track,
        );
        rx
    }

    /// Pop the completed head (firing its completion callback) and begin the
    /// next operation. This is the external `updateend` observer's entry
    /// point.
    pub fn shift_and_execute_next(&mut self, track: TrackType) {
        if let Some(mut op) = self.queue_mut(track).pop_front() {
            if let Some(cb) = op.on_complete.take() {
                cb();
            }
        }
        self.execute_next(track);
    }

    /// Dispatch the head operation for `track`, if any.
    ///
    /// On success the head stays queued until `updateend`. On synchronous
    /// failure the error callback fires and, iff the sink reports the buffer
    /// idle, the head is popped and the next operation is tried; an updating
    /// buffer will still deliver `updateend`, which advances the queue.
    fn execute_next(&mut self, track: TrackType) {
        loop {
            let execute = match self.queue_mut(track).front_mut() {
                None => return,
                Some(head) => match head.execute.take() {
                    // Head already dispatched; updateend will advance us.
                    None => return,
                    Some(execute) => execute,
                },
            };

            match execute() {
                Ok(()) => return,
                Err(err) => {
                    warn!(?track, error = %err, "buffer operation failed synchronously");
                    if let Some(head) = self.queue_mut(track).front_mut() {
                        if let Some(cb) = head.on_error.take() {
                            cb(&err);
                        }
                    }
                    if self.sink.updating(track) {
                        return;
                    }
                    self.queue_mut(track).pop_front();
                }
            }
        }
    }
}

impl fmt::Debug for BufferOperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferOperationQueue")
            .field("audio", &self.audio.len())
            .field("video", &self.video.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;
    use crate::sink::MockSourceBufferSink;

    fn idle_sink() -> Arc<MockSourceBufferSink> {
        let mut sink = MockSourceBufferSink::new();
        sink.expect_exists().return_const(true);
        sink.expect_updating().return_const(false);
        Arc::new(sink)
    }

    #[test]
    fn append_on_empty_queue_executes_immediately() {
        let executed = Arc::new(AtomicUsize::new(0));
        let mut queue = BufferOperationQueue::new(idle_sink());

        let flag = Arc::clone(&executed);
        queue.append(
            BufferOperation::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            TrackType::Video,
        );

        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert!(queue.in_flight(TrackType::Video));
        assert_eq!(queue.len(TrackType::Video), 1);
    }

    #[test]
    fn append_without_buffer_defers_execution() {
        let mut sink = MockSourceBufferSink::new();
        sink.expect_exists().return_const(false);
        sink.expect_updating().return_const(false);

        let executed = Arc::new(AtomicUsize::new(0));
        let mut queue = BufferOperationQueue::new(Arc::new(sink));

        let flag = Arc::clone(&executed);
        queue.append(
            BufferOperation::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            TrackType::Audio,
        );

        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert!(!queue.in_flight(TrackType::Audio));
    }

    #[test]
    fn second_append_waits_for_updateend() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut queue = BufferOperationQueue::new(idle_sink());

        for name in ["a", "b"] {
            let order = Arc::clone(&order);
            queue.append(
                BufferOperation::new(move || {
                    order.lock().unwrap().push(name);
                    Ok(())
                }),
                TrackType::Video,
            );
        }

        assert_eq!(*order.lock().unwrap(), vec!["a"]);

        queue.shift_and_execute_next(TrackType::Video);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(queue.len(TrackType::Video), 1);
    }

    #[test]
    fn completion_callback_fires_on_shift() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut queue = BufferOperationQueue::new(idle_sink());

        let flag = Arc::clone(&completed);
        queue.append(
            BufferOperation::new(|| Ok(())).on_complete(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
            TrackType::Audio,
        );

        assert_eq!(completed.load(Ordering::SeqCst), 0);
        queue.shift_and_execute_next(TrackType::Audio);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_failure_with_idle_buffer_advances_queue() {
        let failed = Arc::new(AtomicUsize::new(0));
        let executed_next = Arc::new(AtomicUsize::new(0));
        let mut queue = BufferOperationQueue::new(idle_sink());

        let fail_flag = Arc::clone(&failed);
        queue.append(
            BufferOperation::new(|| Err(BufferError::Append("boom".into()))).on_error(move |_| {
                fail_flag.fetch_add(1, Ordering::SeqCst);
            }),
            TrackType::Video,
        );

        assert_eq!(failed.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty(TrackType::Video));

        // A follow-up op after the failed one is dispatched directly.
        let next_flag = Arc::clone(&executed_next);
        queue.append(
            BufferOperation::new(move || {
                next_flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            TrackType::Video,
        );
        assert_eq!(executed_next.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_failure_while_updating_keeps_head_queued() {
        let mut sink = MockSourceBufferSink::new();
        sink.expect_exists().return_const(true);
        sink.expect_updating().return_const(true);

        let mut queue = BufferOperationQueue::new(Arc::new(sink));
        queue.append(
            BufferOperation::new(|| Err(BufferError::QuotaExceeded)),
            TrackType::Video,
        );

        // The buffer is mid-update; updateend will advance the queue later.
        assert_eq!(queue.len(TrackType::Video), 1);
    }

    #[tokio::test]
    async fn blocker_resolves_when_reached() {
        let mut queue = BufferOperationQueue::new(idle_sink());

        queue.append(BufferOperation::new(|| Ok(())), TrackType::Audio);
        let mut blocker = queue.append_blocker(TrackType::Audio);

        // Still behind the in-flight append.
        assert!(blocker.try_recv().is_err());

        queue.shift_and_execute_next(TrackType::Audio);
        blocker.await.unwrap();
    }
}
