//! Ordering invariants of the buffer operation queue across tracks.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use cadenza_buffer::{BufferError, BufferOperation, BufferOperationQueue, SourceBufferSink};
use cadenza_core::TrackType;

#[derive(Debug, Default)]
struct StubSink {
    updating_video: AtomicBool,
}

impl SourceBufferSink for StubSink {
    fn exists(&self, _track: TrackType) -> bool {
        true
    }

    fn updating(&self, track: TrackType) -> bool {
        track == TrackType::Video && self.updating_video.load(Ordering::SeqCst)
    }
}

fn recording_op(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BufferOperation {
    let on_execute = Arc::clone(log);
    let on_done = Arc::clone(log);
    BufferOperation::new(move || {
        on_execute.lock().unwrap().push(name);
        Ok(())
    })
    .on_complete(move || {
        on_done.lock().unwrap().push("done");
    })
}

/// Completed operations per track equal the enqueue order, and at most one
/// operation per track is in flight at any time.
#[test]
fn operations_complete_in_enqueue_order_per_track() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut queue = BufferOperationQueue::new(Arc::new(StubSink::default()));

    for name in ["v1", "v2", "v3"] {
        queue.append(recording_op(&log, name), TrackType::Video);
    }
    for name in ["a1", "a2"] {
        queue.append(recording_op(&log, name), TrackType::Audio);
    }

    // Heads dispatched immediately, one per track.
    assert!(queue.in_flight(TrackType::Video));
    assert!(queue.in_flight(TrackType::Audio));
    assert_eq!(queue.len(TrackType::Video), 3);

    // Simulated updateend signals drain the queues in order.
    queue.shift_and_execute_next(TrackType::Video);
    queue.shift_and_execute_next(TrackType::Audio);
    queue.shift_and_execute_next(TrackType::Video);
    queue.shift_and_execute_next(TrackType::Audio);
    queue.shift_and_execute_next(TrackType::Video);

    let order: Vec<&str> = log
        .lock()
        .unwrap()
        .iter()
        .copied()
        .filter(|n| *n != "done")
        .collect();
    assert_eq!(order, vec!["v1", "a1", "v2", "v3", "a2"]);
    assert!(queue.is_empty(TrackType::Video));
    assert!(queue.is_empty(TrackType::Audio));
}

/// S5: A's execute throws synchronously with the buffer idle; A's error
/// callback fires, A pops, and B dispatches.
#[test]
fn sync_failure_with_idle_buffer_dispatches_next() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut queue = BufferOperationQueue::new(Arc::new(StubSink::default()));

    queue.append(recording_op(&log, "a-before"), TrackType::Video);

    let fail_log = Arc::clone(&log);
    let failing = BufferOperation::new(|| Err(BufferError::Append("decode error".into())))
        .on_error(move |_| fail_log.lock().unwrap().push("a-error"));
    queue.append(failing, TrackType::Video);
    queue.append(recording_op(&log, "b"), TrackType::Video);

    // First op completes; the failing head pops and B starts directly.
    queue.shift_and_execute_next(TrackType::Video);

    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["a-before", "done", "a-error", "b"]);
    assert_eq!(queue.len(TrackType::Video), 1);
    assert!(queue.in_flight(TrackType::Video));
}

/// A synchronous failure while the sink is mid-update must not advance the
/// queue; the pending updateend owns that.
#[test]
fn sync_failure_while_updating_defers_to_updateend() {
    let sink = Arc::new(StubSink::default());
    sink.updating_video.store(true, Ordering::SeqCst);
    let mut queue = BufferOperationQueue::new(Arc::clone(&sink) as Arc<dyn SourceBufferSink>);

    let errored = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&errored);
    queue.append(
        BufferOperation::new(|| Err(BufferError::QuotaExceeded))
            .on_error(move |_| flag.store(true, Ordering::SeqCst)),
        TrackType::Video,
    );

    assert!(errored.load(Ordering::SeqCst));
    assert_eq!(queue.len(TrackType::Video), 1, "head stays queued");

    // updateend finally arrives and releases the track.
    sink.updating_video.store(false, Ordering::SeqCst);
    queue.shift_and_execute_next(TrackType::Video);
    assert!(queue.is_empty(TrackType::Video));
}

/// A blocker serializes an external action behind in-flight appends.
#[tokio::test]
async fn blocker_waits_for_preceding_appends() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut queue = BufferOperationQueue::new(Arc::new(StubSink::default()));

    queue.append(recording_op(&log, "append"), TrackType::Audio);
    let mut blocker = queue.append_blocker(TrackType::Audio);
    assert!(blocker.try_recv().is_err(), "blocker waits behind the append");

    queue.shift_and_execute_next(TrackType::Audio);
    blocker.await.expect("blocker resolved");

    // The external action runs here; afterwards the orchestrator releases
    // the track.
    queue.shift_and_execute_next(TrackType::Audio);
    assert!(queue.is_empty(TrackType::Audio));
}
