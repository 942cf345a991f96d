//! Offline-first client for the HTTP API: a local cache of the user's data,
//! a remote adapter, and the reconciler that keeps the two in step.

pub mod cache;
pub mod reconciler;
pub mod remote;

pub use cache::{LocalCache, Snapshot};
pub use reconciler::{
    LoadReport, Outcome, PendingOp, ReconcileError, Reconciler, RejectedOp, SyncReport,
};
pub use remote::{HttpRemote, RemoteApi, RemoteError, RemoteResult};
