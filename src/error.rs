use thiserror::Error;

/// Errors reported by an encode call. Every variant is terminal for that call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Zero or oversized dimensions, or a buffer whose length doesn't match them.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Color mode and bit depth don't form a combination PNG can store.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The deflate compressor reported an error status.
    #[error("compression failed: {0}")]
    CompressionFailure(String),

    /// The worker thread went away without delivering a result.
    #[error("encode worker exited without a result")]
    WorkerLost,
}

pub type EncodeResult<T> = Result<T, EncodeError>;
