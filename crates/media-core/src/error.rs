use thiserror::Error;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
///
/// The pool's read path never propagates an error across the real-time
/// audio boundary: its public operations log these and degrade to a no-op,
/// `0` or `None`. The producer-facing seams ([`RingBuffer::put`] and the
/// bounded waits) return them directly so the embedding layer can react.
///
/// [`RingBuffer::put`]: crate::RingBuffer::put
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No live ring buffer is registered under the given id
    #[error("No ring buffer associated to id '{0}'")]
    BufferNotFound(String),

    /// The reader id has no read offset on the buffer
    #[error("Unknown reader '{0}' on ring buffer '{1}'")]
    UnknownReader(String, String),

    /// A frame did not match the expected audio format
    #[error("Format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        /// Format the buffer is normalized to
        expected: crate::AudioFormat,
        /// Format carried by the offending frame
        actual: crate::AudioFormat,
    },

    /// A bounded wait elapsed before enough data arrived
    #[error("Timed out waiting for data on '{0}'")]
    Timeout(String),
}
