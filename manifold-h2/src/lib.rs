//! HTTP/2 stream management for the manifold client stack.
//!
//! The centerpiece is [`Http2StreamManager`], which multiplexes user stream
//! acquisitions over a pool of HTTP/2 connections: it queues acquisitions,
//! binds each to the connection with the most spare capacity, sizes
//! new-connection requests from the backlog, and coordinates a ref-counted
//! shutdown with the pool.
//!
//! The channel layer, wire codec and the pool itself are external; the
//! [`connection`] module defines exactly the contracts this crate consumes.
//! [`HeaderCodec`] carries the per-connection HPACK state connections use
//! for their header blocks.
//!
//! # Threading
//!
//! Manager handles may be used from any thread. All mutable manager state
//! sits behind one mutex, and every operation builds its side effects into
//! a work packet executed only after the lock is dropped, so user callbacks
//! never run under it. Stream creation always happens on the owning
//! connection's event loop thread.

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod headers;
pub mod manager;
pub mod request;

pub use config::StreamManagerOptions;
pub use connection::{ChannelTask, ClientConnection, ConnectionPool, Http2Stream, Task, TaskStatus};
pub use error::{Error, Result};
pub use headers::HeaderCodec;
pub use manager::{Http2StreamManager, ManagerMetrics};
pub use request::{
    HeaderBlock, OnStreamAcquired, RequestMessage, StreamRequestOptions,
};
