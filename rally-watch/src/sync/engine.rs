//! The sync engine.
//!
//! One cycle runs through these phases:
//!
//! ```text
//! Idle -> Fetching -> Diffing -> Persisting -> Notifying -> Idle
//!             \           \           \
//!              +-----------+-----------+--> Error -> Idle
//! ```
//!
//! Fetching includes geocoding the fetched stations. A failure before
//! Persisting completes leaves the stored snapshot exactly as it was.
//! Notification failures are per recipient and never fail the cycle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::{DiffResult, MapExport, RouteKey, RouteSet, Station, StationId, UserId};
use crate::geocode::{GeocodeCache, Geocoder};
use crate::notify::{NotificationDispatcher, Notifier};
use crate::rally::RouteSource;
use crate::store::{FavoriteStore, PersistenceError, RouteStore};

use super::error::SyncError;

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between scheduled cycles
    pub interval: Duration,
    /// Delay before the first scheduled cycle
    pub initial_delay: Duration,
    /// Minimum time between a successful cycle and a manual one
    pub manual_cooldown: Duration,
    /// Concurrent geocoding lookups per cycle
    pub geocode_workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            initial_delay: Duration::from_secs(5),
            manual_cooldown: Duration::from_secs(5 * 60),
            geocode_workers: 4,
        }
    }
}

/// Where the engine currently is in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching,
    Diffing,
    Persisting,
    Notifying,
    Error,
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub added: BTreeSet<RouteKey>,
    pub removed: BTreeSet<RouteKey>,
    /// Routes in the new snapshot
    pub route_count: usize,
    /// Routes with at least one station lacking a coordinate
    pub unlocated: usize,
    /// Whether the snapshot on disk was rewritten
    pub persisted: bool,
    pub delivered: usize,
    pub failed_deliveries: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Point-in-time view of the engine, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Cycles attempted since startup
    pub cycles: u64,
    pub route_count: usize,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<FailureRecord>,
}

#[derive(Debug)]
struct EngineState {
    phase: SyncPhase,
    cycles: u64,
    last_success: Option<(Instant, DateTime<Utc>)>,
    last_failure: Option<FailureRecord>,
}

/// Orchestrates fetch, geocode, diff, persist and notify.
///
/// Cycles and favorite changes are serialized by one async lock, so a
/// favorite added mid-cycle only affects the next cycle's notifications.
pub struct SyncEngine<S, G, N> {
    source: S,
    geocoder: Arc<GeocodeCache<G>>,
    store: RouteStore,
    favorites: Arc<FavoriteStore>,
    dispatcher: NotificationDispatcher<N>,
    config: SyncConfig,

    /// Held for the duration of a cycle or favorite change.
    cycle_lock: Mutex<()>,

    /// Set once shutdown begins; no cycle starts after that.
    stopping: AtomicBool,

    /// Last persisted snapshot.
    snapshot: RwLock<Arc<RouteSet>>,

    state: RwLock<EngineState>,
}

impl<S, G, N> SyncEngine<S, G, N>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    /// Create the engine, loading the last stored snapshot.
    ///
    /// Fails if the snapshot exists but cannot be read, rather than
    /// starting from empty and re-announcing every route.
    pub fn new(
        source: S,
        geocoder: Arc<GeocodeCache<G>>,
        store: RouteStore,
        dispatcher: NotificationDispatcher<N>,
        favorites: Arc<FavoriteStore>,
        config: SyncConfig,
    ) -> Result<Self, PersistenceError> {
        let snapshot = store.load()?;
        info!(
            routes = snapshot.len(),
            path = %store.path().display(),
            "Loaded route snapshot"
        );

        Ok(Self {
            source,
            geocoder,
            store,
            favorites,
            dispatcher,
            config,
            cycle_lock: Mutex::new(()),
            stopping: AtomicBool::new(false),
            snapshot: RwLock::new(Arc::new(snapshot)),
            state: RwLock::new(EngineState {
                phase: SyncPhase::Idle,
                cycles: 0,
                last_success: None,
                last_failure: None,
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn geocoder(&self) -> &GeocodeCache<G> {
        &self.geocoder
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher<N> {
        &self.dispatcher
    }

    /// Run a cycle on the schedule. Skipped with `Busy` if one is running.
    pub async fn run_scheduled(&self) -> Result<CycleReport, SyncError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Err(SyncError::Busy);
        };
        self.ensure_running()?;
        self.run_cycle(Trigger::Scheduled).await
    }

    /// Run a cycle on request.
    ///
    /// Rejected with `Busy` while another cycle runs, and with
    /// `CoolingDown` shortly after a successful one.
    pub async fn sync_now(&self) -> Result<CycleReport, SyncError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Err(SyncError::Busy);
        };
        self.ensure_running()?;
        if let Some(remaining) = self.cooldown_remaining() {
            return Err(SyncError::CoolingDown { remaining });
        }
        self.run_cycle(Trigger::Manual).await
    }

    /// Refuse new cycles and wait for a running one, notifications
    /// included, to finish.
    pub async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let _guard = self.cycle_lock.lock().await;
        info!("Sync engine stopped");
    }

    fn ensure_running(&self) -> Result<(), SyncError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(SyncError::Stopped);
        }
        Ok(())
    }

    /// The most recently persisted route set.
    pub fn routes(&self) -> Arc<RouteSet> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Routes and coordinates for map rendering.
    pub fn map_export(&self) -> MapExport {
        MapExport::from_route_set(&self.routes())
    }

    pub fn status(&self) -> SyncStatus {
        let route_count = self.routes().len();
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        SyncStatus {
            phase: state.phase,
            cycles: state.cycles,
            route_count,
            last_success: state.last_success.map(|(_, at)| at),
            last_failure: state.last_failure.clone(),
        }
    }

    /// Watch a station. Waits for any running cycle to finish.
    pub async fn add_favorite(
        &self,
        user: &UserId,
        station: &StationId,
    ) -> Result<bool, PersistenceError> {
        let _guard = self.cycle_lock.lock().await;
        let added = self.favorites.add(user, station)?;
        if added {
            info!(user = %user, station = %station, "Added favorite");
        }
        Ok(added)
    }

    /// Stop watching a station. Waits for any running cycle to finish.
    pub async fn remove_favorite(
        &self,
        user: &UserId,
        station: &StationId,
    ) -> Result<bool, PersistenceError> {
        let _guard = self.cycle_lock.lock().await;
        let removed = self.favorites.remove(user, station)?;
        if removed {
            info!(user = %user, station = %station, "Removed favorite");
        }
        Ok(removed)
    }

    pub fn favorites(&self, user: &UserId) -> BTreeSet<StationId> {
        self.favorites.stations_for(user)
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (at, _) = state.last_success?;
        self.config
            .manual_cooldown
            .checked_sub(at.elapsed())
            .filter(|remaining| !remaining.is_zero())
    }

    fn set_phase(&self, phase: SyncPhase) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        debug!(from = ?state.phase, to = ?phase, "Sync phase");
        state.phase = phase;
    }

    /// Run one cycle. The caller holds the cycle lock.
    async fn run_cycle(&self, trigger: Trigger) -> Result<CycleReport, SyncError> {
        let started = Instant::now();
        info!(trigger = ?trigger, "Starting sync cycle");
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.cycles += 1;
        }

        let result = self.cycle(trigger, started).await;

        match &result {
            Ok(report) => {
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.last_success = Some((Instant::now(), Utc::now()));
                state.phase = SyncPhase::Idle;
                info!(
                    added = report.added.len(),
                    removed = report.removed.len(),
                    routes = report.route_count,
                    unlocated = report.unlocated,
                    delivered = report.delivered,
                    failed_deliveries = report.failed_deliveries,
                    duration_ms = report.duration_ms,
                    "Sync cycle complete"
                );
            }
            Err(e) => {
                self.set_phase(SyncPhase::Error);
                error!(trigger = ?trigger, error = %e, "Sync cycle failed");
                let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
                state.last_failure = Some(FailureRecord {
                    at: Utc::now(),
                    message: e.to_string(),
                });
                state.phase = SyncPhase::Idle;
            }
        }

        result
    }

    async fn cycle(&self, trigger: Trigger, started: Instant) -> Result<CycleReport, SyncError> {
        self.set_phase(SyncPhase::Fetching);
        let mut current = self.source.fetch_routes().await?;

        let stations: Vec<Station> = current.stations().into_values().cloned().collect();
        let coordinates = self
            .geocoder
            .resolve_all(stations, self.config.geocode_workers)
            .await;
        current.apply_coordinates(&coordinates);

        let unlocated = current.unlocated_count();
        if unlocated > 0 {
            warn!(unlocated, "Routes with unresolved stations");
        }

        self.set_phase(SyncPhase::Diffing);
        let previous = self.store.load()?;
        let diff = DiffResult::between(&previous, &current);

        self.set_phase(SyncPhase::Persisting);
        let persisted = current != previous;
        if persisted {
            self.store.save(&current)?;
        } else {
            debug!("Route set unchanged, snapshot left as is");
        }

        let current = Arc::new(current);
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&current);

        self.set_phase(SyncPhase::Notifying);
        let outcomes = self.dispatcher.dispatch(&diff, &current).await;
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();

        Ok(CycleReport {
            trigger,
            route_count: current.len(),
            added: diff.added,
            removed: diff.removed,
            unlocated,
            persisted,
            delivered,
            failed_deliveries: outcomes.len() - delivered,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
