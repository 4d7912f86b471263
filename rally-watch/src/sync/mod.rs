//! The fetch, diff, persist and notify cycle.

mod engine;
mod error;
mod scheduler;

pub use engine::{CycleReport, FailureRecord, SyncConfig, SyncEngine, SyncPhase, SyncStatus, Trigger};
pub use error::SyncError;
pub use scheduler::spawn_scheduler;
