use cadenza_core::TrackType;
use thiserror::Error;

/// Buffer mutation errors.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("append failed: {0}")]
    Append(String),

    #[error("remove failed: {0}")]
    Remove(String),

    #[error("sink quota exceeded")]
    QuotaExceeded,

    #[error("no source buffer for {0:?}")]
    MissingBuffer(TrackType),
}

pub type BufferResult<T> = Result<T, BufferError>;
