//! Sync cycle error types.

use std::time::Duration;

use crate::rally::FetchError;
use crate::store::PersistenceError;

/// Why a sync cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Upstream fetch failed; nothing was changed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Reading or writing the route snapshot failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Another cycle is running
    #[error("a sync cycle is already running")]
    Busy,

    /// The engine is shutting down
    #[error("sync engine is shutting down")]
    Stopped,

    /// A manual sync was requested too soon after the last success
    #[error("synced recently, retry in {}s", .remaining.as_secs().max(1))]
    CoolingDown { remaining: Duration },
}
