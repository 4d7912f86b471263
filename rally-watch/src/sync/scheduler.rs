//! Periodic sync trigger.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::geocode::Geocoder;
use crate::notify::Notifier;
use crate::rally::RouteSource;

use super::engine::SyncEngine;
use super::error::SyncError;

/// Run scheduled cycles on a background task until the engine shuts down.
///
/// A tick that arrives while a cycle is still running is dropped, not
/// queued. Cycle failures are logged by the engine and retried next tick.
pub fn spawn_scheduler<S, G, N>(engine: Arc<SyncEngine<S, G, N>>) -> JoinHandle<()>
where
    S: RouteSource + 'static,
    G: Geocoder + 'static,
    N: Notifier + 'static,
{
    let period = engine.config().interval;
    let start = Instant::now() + engine.config().initial_delay;

    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "Sync scheduler started");
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match engine.run_scheduled().await {
                Ok(_) => {}
                Err(SyncError::Busy) => info!("Previous sync still running, skipping tick"),
                Err(SyncError::Stopped) => {
                    info!("Sync scheduler stopped");
                    break;
                }
                Err(e) => warn!(error = %e, "Scheduled sync failed, retrying next tick"),
            }
        }
    })
}
