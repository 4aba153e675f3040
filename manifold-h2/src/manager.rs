//! The HTTP/2 stream manager.
//!
//! Multiplexes user stream acquisitions over a pool of HTTP/2 connections.
//! Every externally triggered event follows one pattern: take the lock,
//! update state, assemble a [`Transaction`] describing the side effects,
//! drop the lock, execute the transaction. No user callback, pool call or
//! channel operation happens while the lock is held, and only rare events
//! log under it.
//!
//! # Lifecycle
//!
//! The external handle is reference counted through `Clone`/`Drop`. When
//! the last handle drops the manager moves from `Ready` to `ShuttingDown`,
//! fails the acquisitions it had not yet bound, and waits for two counters
//! to reach zero: in-flight pool acquires and open streams. It then
//! releases the pool handle; once the pool reports its own shutdown
//! complete, the user's shutdown-complete callback fires exactly once.
//!
//! `ShuttingDown` is terminal. Acquisitions submitted after it begins fail
//! with [`Error::ShuttingDown`], still through the lock-then-execute path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, trace, warn};

use crate::config::StreamManagerOptions;
use crate::connection::{ClientConnection, ConnectionPool, Http2Stream, Task, TaskStatus};
use crate::error::Error;
use crate::request::{OnStreamAcquired, OnStreamComplete, StreamRequestOptions};

/// Point-in-time view of the manager's internal counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerMetrics {
    pub pending_acquisition_count: usize,
    pub open_stream_count: usize,
    pub connections_acquiring: usize,
    pub held_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Ready,
    ShuttingDown,
}

/// A connection the manager holds, with its stream accounting.
struct SmConnection {
    connection: Arc<dyn ClientConnection>,

    /// Streams bound to this connection. Only mutated with the manager lock
    /// held; drives connection selection.
    num_streams_assigned: AtomicUsize,

    /// Streams created on the event loop and not yet completed.
    num_streams_open: AtomicUsize,
}

impl SmConnection {
    fn new(connection: Arc<dyn ClientConnection>) -> Arc<Self> {
        Arc::new(Self {
            connection,
            num_streams_assigned: AtomicUsize::new(0),
            num_streams_open: AtomicUsize::new(0),
        })
    }
}

/// Lives from the user's acquire call until the stream request has been
/// dispatched (or the acquisition failed). Owns the request message via its
/// options; holds its chosen connection from binding to dispatch.
struct PendingAcquisition {
    options: StreamRequestOptions,
    callback: OnStreamAcquired,
    sm_connection: Option<Arc<SmConnection>>,
}

/// Side effects assembled under the lock and executed after it is dropped.
///
/// This is the only output a locked section may produce besides return
/// values.
#[derive(Default)]
struct Transaction {
    /// Acquisitions bound to a connection, to be dispatched onto its event
    /// loop.
    make_requests: Vec<PendingAcquisition>,

    /// Acquisitions to complete with an error.
    failures: Vec<(PendingAcquisition, Error)>,

    /// Connections to request from the pool.
    new_connections: usize,

    /// Connections to hand back to the pool.
    connections_to_release: Vec<Arc<SmConnection>>,

    /// Both lifecycle counters reached zero under `ShuttingDown`.
    should_destroy: bool,
}

struct SyncedData {
    state: ManagerState,

    /// Acquisitions not yet bound to a connection, in arrival order.
    pending_acquisitions: VecDeque<PendingAcquisition>,
    /// Tracked alongside so counting never walks the queue.
    pending_acquisition_count: usize,

    /// Unresolved calls into the connection pool.
    connections_acquiring: usize,

    /// Streams bound or open whose completion has not been observed.
    open_stream_count: usize,

    assumed_max_concurrent_streams: usize,

    /// Held connections in acquisition order.
    connections: Vec<Arc<SmConnection>>,

    /// Destruction has been scheduled; never schedule it twice.
    destroy_scheduled: bool,
}

struct ManagerInner {
    pool: Arc<dyn ConnectionPool>,
    options: StreamManagerOptions,
    external_refs: AtomicUsize,
    shutdown_complete: Mutex<Option<Task>>,
    synced: Mutex<SyncedData>,
}

/// External handle to a stream manager.
///
/// Cloning acquires a reference; dropping releases it. When the last handle
/// drops, the manager shuts down as described in the module docs.
pub struct Http2StreamManager {
    inner: Arc<ManagerInner>,
}

impl Http2StreamManager {
    /// Creates a manager over `pool`.
    ///
    /// `shutdown_complete` fires exactly once, after the last handle has
    /// dropped, every outstanding acquisition and stream has terminated and
    /// the pool has finished its own shutdown. The manager must not be used
    /// through other handles after that point.
    pub fn new(
        options: StreamManagerOptions,
        pool: Arc<dyn ConnectionPool>,
        shutdown_complete: Option<Task>,
    ) -> Self {
        debug_assert!(options.validate().is_ok(), "invalid stream manager options");
        debug!(
            host = %options.host,
            port = options.port,
            max_connections = options.max_connections,
            "creating HTTP/2 stream manager"
        );

        let assumed_max_concurrent_streams = options.assumed_max_concurrent_streams;
        Self {
            inner: Arc::new(ManagerInner {
                pool,
                options,
                external_refs: AtomicUsize::new(1),
                shutdown_complete: Mutex::new(shutdown_complete),
                synced: Mutex::new(SyncedData {
                    state: ManagerState::Ready,
                    pending_acquisitions: VecDeque::new(),
                    pending_acquisition_count: 0,
                    connections_acquiring: 0,
                    open_stream_count: 0,
                    assumed_max_concurrent_streams,
                    connections: Vec::new(),
                    destroy_scheduled: false,
                }),
            }),
        }
    }

    pub fn options(&self) -> &StreamManagerOptions {
        &self.inner.options
    }

    /// Requests a new stream.
    ///
    /// `callback` fires exactly once, with the stream or with an error,
    /// always from the chosen connection's event loop thread, never
    /// synchronously from this call while the manager is `Ready`.
    pub fn acquire_stream(&self, options: StreamRequestOptions, callback: OnStreamAcquired) {
        let record = PendingAcquisition {
            options,
            callback,
            sm_connection: None,
        };

        let mut tx = Transaction::default();
        {
            let mut synced = self.inner.lock_synced();
            synced.pending_acquisitions.push_back(record);
            synced.pending_acquisition_count += 1;
            ManagerInner::build_transaction(&mut synced, &mut tx);
        }
        self.inner.execute_transaction(tx);
    }

    /// Counters snapshot, mainly for tests and monitoring.
    pub fn metrics(&self) -> ManagerMetrics {
        let synced = self.inner.lock_synced();
        ManagerMetrics {
            pending_acquisition_count: synced.pending_acquisition_count,
            open_stream_count: synced.open_stream_count,
            connections_acquiring: synced.connections_acquiring,
            held_connections: synced.connections.len(),
        }
    }
}

impl Clone for Http2StreamManager {
    fn clone(&self) -> Self {
        self.inner.external_refs.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Http2StreamManager {
    fn drop(&mut self) {
        if self.inner.external_refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.on_zero_external_refs();
        }
    }
}

impl ManagerInner {
    fn lock_synced(&self) -> MutexGuard<'_, SyncedData> {
        self.synced.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turns the current state into work. Callers hold the lock; the
    /// returned work must be executed after it is dropped.
    fn build_transaction(synced: &mut SyncedData, tx: &mut Transaction) {
        match synced.state {
            ManagerState::Ready => {
                // Bind pending acquisitions, oldest first, while a
                // connection with spare capacity exists.
                while synced.pending_acquisition_count > 0 {
                    let Some(sm_conn) = Self::select_connection(synced) else {
                        break;
                    };
                    let Some(mut record) = synced.pending_acquisitions.pop_front() else {
                        break;
                    };
                    synced.pending_acquisition_count -= 1;
                    synced.open_stream_count += 1;
                    sm_conn.num_streams_assigned.fetch_add(1, Ordering::Relaxed);
                    record.sm_connection = Some(sm_conn);
                    tx.make_requests.push(record);
                }

                // Size the pool request so the residue fits, assuming each
                // new connection takes assumed_max_concurrent_streams.
                if synced.pending_acquisition_count > 0 {
                    let needed = synced
                        .pending_acquisition_count
                        .div_ceil(synced.assumed_max_concurrent_streams);
                    if needed > synced.connections_acquiring {
                        tx.new_connections = needed - synced.connections_acquiring;
                        synced.connections_acquiring = needed;
                    }
                }
            }

            ManagerState::ShuttingDown => {
                while let Some(record) = synced.pending_acquisitions.pop_front() {
                    tx.failures.push((record, Error::ShuttingDown));
                }
                synced.pending_acquisition_count = 0;

                // Idle connections have no further use; ones with live
                // streams are released on their last completion.
                let released = &mut tx.connections_to_release;
                synced.connections.retain(|sm_conn| {
                    if sm_conn.num_streams_assigned.load(Ordering::Relaxed) == 0 {
                        released.push(Arc::clone(sm_conn));
                        false
                    } else {
                        true
                    }
                });

                if !synced.destroy_scheduled
                    && synced.connections_acquiring == 0
                    && synced.open_stream_count == 0
                {
                    synced.destroy_scheduled = true;
                    tx.should_destroy = true;
                }
            }
        }
    }

    /// Picks the open, not-full connection with the fewest bound streams;
    /// ties go to the earliest acquired.
    fn select_connection(synced: &SyncedData) -> Option<Arc<SmConnection>> {
        synced
            .connections
            .iter()
            .filter(|sm_conn| sm_conn.connection.is_open())
            .filter(|sm_conn| {
                sm_conn.num_streams_assigned.load(Ordering::Relaxed)
                    < synced.assumed_max_concurrent_streams
            })
            .min_by_key(|sm_conn| sm_conn.num_streams_assigned.load(Ordering::Relaxed))
            .cloned()
    }

    /// Performs a transaction's side effects. Never called with the lock
    /// held.
    fn execute_transaction(self: &Arc<Self>, tx: Transaction) {
        let Transaction {
            make_requests,
            failures,
            new_connections,
            connections_to_release,
            should_destroy,
        } = tx;

        for (record, error) in failures {
            debug!(error = %error, "failing stream acquisition");
            (record.callback)(Err(error));
        }

        for sm_conn in connections_to_release {
            trace!("releasing connection back to the pool");
            self.pool.release_connection(Arc::clone(&sm_conn.connection));
        }

        for record in make_requests {
            self.dispatch_make_request(record);
        }

        for _ in 0..new_connections {
            trace!("requesting connection from the pool");
            let inner = Arc::clone(self);
            self.pool.acquire_connection(Box::new(move |result| {
                inner.on_connection_acquired(result);
            }));
        }

        if should_destroy {
            self.begin_destroy();
        }
    }

    /// Hands a bound acquisition to its connection's event loop. Running
    /// there lets the stream be created and activated without racing the
    /// connection's own frame handling, and guarantees the user callback is
    /// asynchronous with respect to `acquire_stream`.
    fn dispatch_make_request(self: &Arc<Self>, record: PendingAcquisition) {
        let Some(sm_conn) = record.sm_connection.as_ref().map(Arc::clone) else {
            debug_assert!(false, "acquisition dispatched without a connection");
            return;
        };
        let inner = Arc::clone(self);
        sm_conn
            .connection
            .schedule(Box::new(move |status| {
                inner.run_make_request(record, status);
            }));
    }

    /// Runs on the connection's event loop thread.
    fn run_make_request(self: &Arc<Self>, record: PendingAcquisition, status: TaskStatus) {
        let PendingAcquisition {
            mut options,
            callback,
            sm_connection,
        } = record;
        let Some(sm_conn) = sm_connection else {
            debug_assert!(false, "request task without a connection");
            return;
        };

        if status == TaskStatus::Cancelled {
            warn!("event loop rejected request task");
            callback(Err(Error::TaskCancelled));
            self.unbind_stream(&sm_conn);
            return;
        }

        // Interpose on completion so the manager sees every stream finish.
        let user_on_complete = options.on_complete.take();
        let complete_inner = Arc::clone(self);
        let complete_conn = Arc::clone(&sm_conn);
        options.on_complete = Some(Box::new(move |result| {
            complete_inner.on_stream_complete(&complete_conn, user_on_complete, result);
        }));

        match sm_conn.connection.make_request(options) {
            Ok(stream) => {
                sm_conn.num_streams_open.fetch_add(1, Ordering::Relaxed);
                trace!(stream = stream.id(), "stream created");
                callback(Ok(Arc::clone(&stream)));
                if let Err(error) = stream.activate() {
                    // Completion still arrives through on_complete per the
                    // Http2Stream contract.
                    warn!(error = %error, "stream activation failed");
                }
                // The request message was handed to the connection; the
                // acquisition's reference dropped with `options`.
            }
            Err(error) => {
                warn!(error = %error, "request creation failed");
                callback(Err(Error::StreamCreateFailed(error.to_string())));
                self.unbind_stream(&sm_conn);
            }
        }
    }

    /// A stream completed on the connection's event loop.
    fn on_stream_complete(
        self: &Arc<Self>,
        sm_conn: &Arc<SmConnection>,
        user_on_complete: Option<OnStreamComplete>,
        result: crate::error::Result<()>,
    ) {
        let still_open = sm_conn.num_streams_open.fetch_sub(1, Ordering::Relaxed) - 1;
        trace!(still_open, "stream completed");
        if let Some(on_complete) = user_on_complete {
            on_complete(result);
        }
        self.unbind_stream(sm_conn);
    }

    /// Undoes one binding against `sm_conn`: on completion, on a cancelled
    /// task, or on request-creation failure. Releases the connection when
    /// this was its last stream and it can take no new ones.
    fn unbind_stream(self: &Arc<Self>, sm_conn: &Arc<SmConnection>) {
        let mut tx = Transaction::default();
        {
            let mut synced = self.lock_synced();
            synced.open_stream_count -= 1;
            let remaining = sm_conn.num_streams_assigned.fetch_sub(1, Ordering::Relaxed) - 1;

            let unusable = !sm_conn.connection.is_open()
                || synced.state == ManagerState::ShuttingDown;
            if remaining == 0 && unusable {
                synced
                    .connections
                    .retain(|held| !Arc::ptr_eq(held, sm_conn));
                tx.connections_to_release.push(Arc::clone(sm_conn));
            }
            ManagerInner::build_transaction(&mut synced, &mut tx);
        }
        self.execute_transaction(tx);
    }

    /// Pool acquisition resolved, from whatever thread the pool runs its
    /// callbacks on.
    fn on_connection_acquired(
        self: &Arc<Self>,
        result: std::result::Result<Arc<dyn ClientConnection>, Error>,
    ) {
        let mut tx = Transaction::default();
        {
            let mut synced = self.lock_synced();
            synced.connections_acquiring -= 1;

            match result {
                Ok(connection) => {
                    let sm_conn = SmConnection::new(connection);
                    if synced.state == ManagerState::Ready {
                        synced.connections.push(sm_conn);
                    } else {
                        tx.connections_to_release.push(sm_conn);
                    }
                }
                Err(error) => {
                    // Fail every acquisition the remaining in-flight
                    // acquires cannot cover rather than re-requesting,
                    // which could recurse through immediate failures.
                    let coverable = synced
                        .connections_acquiring
                        .saturating_mul(synced.assumed_max_concurrent_streams);
                    while synced.pending_acquisition_count > coverable {
                        let Some(record) = synced.pending_acquisitions.pop_back() else {
                            break;
                        };
                        synced.pending_acquisition_count -= 1;
                        tx.failures.push((record, error.clone()));
                    }
                }
            }
            ManagerInner::build_transaction(&mut synced, &mut tx);
        }
        self.execute_transaction(tx);
    }

    /// The last external handle dropped.
    fn on_zero_external_refs(self: &Arc<Self>) {
        let mut tx = Transaction::default();
        {
            let mut synced = self.lock_synced();
            // Rare event; logging under the lock is acceptable here.
            info!(
                pending = synced.pending_acquisition_count,
                open_streams = synced.open_stream_count,
                "last external reference released, stream manager shutting down"
            );
            synced.state = ManagerState::ShuttingDown;
            ManagerInner::build_transaction(&mut synced, &mut tx);
        }
        self.execute_transaction(tx);
    }

    /// Both lifecycle counters hit zero: release the pool handle. The pool
    /// drives the rest of the teardown through its shutdown callback.
    fn begin_destroy(self: &Arc<Self>) {
        debug!("all streams drained, shutting down connection pool");
        let inner = Arc::clone(self);
        self.pool.begin_shutdown(Box::new(move || {
            inner.finish_destroy();
        }));
    }

    fn finish_destroy(&self) {
        info!("connection pool finished shutdown, stream manager destroyed");
        let callback = self
            .shutdown_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_shutdown_complete) = callback {
            on_shutdown_complete();
        }
    }
}
