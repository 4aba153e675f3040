//! Contracts consumed by the stream manager.
//!
//! Channel establishment, the HTTP/2 framing layer and the connection pool
//! live outside this crate; these traits pin down exactly what the manager
//! relies on. Production implementations wrap real connections; the test
//! suite drives the manager with scripted doubles.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::request::StreamRequestOptions;

/// A plain unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Whether a scheduled task is running normally or being cancelled because
/// its event loop is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Ready,
    Cancelled,
}

/// A unit of work dispatched onto a connection's event loop.
///
/// Always invoked exactly once: with `Ready` from the event loop thread, or
/// with `Cancelled` (possibly inline from `schedule`) when the loop will
/// never run it.
pub type ChannelTask = Box<dyn FnOnce(TaskStatus) + Send>;

/// Delivery of a pool acquisition outcome.
pub type OnConnectionAcquired =
    Box<dyn FnOnce(std::result::Result<Arc<dyn ClientConnection>, Error>) + Send>;

/// One live HTTP/2 stream.
///
/// `make_request` returns the stream in a created-but-inactive state;
/// `activate` starts it. Once a stream has been returned, its `on_complete`
/// callback fires exactly once, whether activation succeeds or fails.
pub trait Http2Stream: Send + Sync {
    fn id(&self) -> u64;

    fn activate(&self) -> Result<()>;
}

/// One established HTTP/2 connection.
pub trait ClientConnection: Send + Sync {
    /// Creates a stream for `options` on this connection. Must be called
    /// from the connection's event loop thread. On failure the options,
    /// including their callbacks, are dropped uninvoked.
    fn make_request(&self, options: StreamRequestOptions) -> Result<Arc<dyn Http2Stream>>;

    /// Schedules `task` onto this connection's event loop; the loop invokes
    /// it with `Ready`, or with `Cancelled` when it cannot run.
    fn schedule(&self, task: ChannelTask);

    /// Whether the connection accepts new streams. Goes false on GOAWAY or
    /// channel shutdown.
    ///
    /// May be queried while the manager's internal lock is held:
    /// implementations must answer from cached state and must not call back
    /// into the manager.
    fn is_open(&self) -> bool;
}

/// The connection pool contract, as consumed.
///
/// Acquisition completes through a callback which may fire synchronously on
/// failure; callers must not hold locks across `acquire_connection`.
/// `begin_shutdown` is called at most once, after every acquired connection
/// has been released, and must eventually invoke `on_complete`.
pub trait ConnectionPool: Send + Sync {
    fn acquire_connection(&self, on_acquired: OnConnectionAcquired);

    fn release_connection(&self, connection: Arc<dyn ClientConnection>);

    fn begin_shutdown(&self, on_complete: Task);
}
