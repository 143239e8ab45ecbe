//! Remote side of roamsync.
//!
//! This crate provides the remote backend abstraction (PostgREST over HTTP
//! and an in-process backend), the action dispatcher, the server-side queue
//! mirror and the [`SyncEngine`] that ties them to the local store.

pub mod backend;
pub mod dispatcher;
pub mod mirror;
pub mod sync;

pub use backend::{BackendError, Filter, MemoryBackend, RemoteBackend, RestBackend, RestConfig};
pub use dispatcher::{Dispatcher, RemoteOp, remote_op};
pub use mirror::{MirrorRow, QueueMirror};
pub use sync::{CachePolicy, SyncEngine, SyncEvent, SyncOptions, SyncOutcome, SyncReport};
