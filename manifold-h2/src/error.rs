//! Error types for stream manager operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported through stream-acquisition and stream-event callbacks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The manager's last external reference was released; no new streams
    /// can be acquired.
    #[error("stream manager is shutting down")]
    ShuttingDown,

    /// The connection pool failed to produce a connection.
    #[error("connection acquisition failed: {0}")]
    ConnectionAcquireFailed(String),

    /// The connection refused to create the stream. Transient; reported per
    /// acquisition while the manager keeps serving others.
    #[error("stream creation failed: {0}")]
    StreamCreateFailed(String),

    /// The connection's event loop would not run the request task.
    #[error("request task cancelled")]
    TaskCancelled,

    /// Header compression failed on a connection codec.
    #[error("hpack: {0}")]
    Hpack(#[from] manifold_hpack::HpackError),
}
