use cadenza_core::TrackType;
#[cfg(test)]
use mockall::automock;

/// State surface of the single-updater media sink.
///
/// The queue never mutates buffers itself; operations capture their own
/// handles. It only needs to know whether a buffer exists for a track and
/// whether that buffer is currently mid-update.
#[cfg_attr(test, automock)]
pub trait SourceBufferSink: Send + Sync {
    /// Whether a source buffer has been created for `track`.
    fn exists(&self, track: TrackType) -> bool;

    /// Whether the buffer for `track` is currently applying an operation.
    fn updating(&self, track: TrackType) -> bool;
}
