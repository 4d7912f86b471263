//! Cycle-level tests for the sync engine.

use super::*;
use crate::domain::{Coordinate, DateRange, Route};
use crate::geocode::MockGeocoder;
use crate::notify::{MessageKind, RecordingNotifier};
use crate::rally::{FetchError, MockRouteSource};
use chrono::NaiveDate;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};

type TestEngine = SyncEngine<MockRouteSource, MockGeocoder, RecordingNotifier>;

const PARIS: u64 = 1;
const BERLIN: u64 = 2;
const ROME: u64 = 3;

fn station(id: u64) -> Station {
    let name = match id {
        PARIS => "Paris",
        BERLIN => "Berlin",
        ROME => "Rome",
        _ => "Elsewhere",
    };
    Station::new(StationId::from(id), name, format!("Depot {id}"))
}

fn route(from: u64, to: u64, start: u32, end: u32) -> Route {
    let date = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
    Route::new(
        station(from),
        station(to),
        DateRange::new(date(start), date(end)).unwrap(),
    )
    .unwrap()
}

fn pb1() -> Route {
    route(PARIS, BERLIN, 1, 5)
}

fn br1() -> Route {
    route(BERLIN, ROME, 3, 8)
}

fn user(s: &str) -> UserId {
    UserId::parse(s).unwrap()
}

fn geocoder() -> MockGeocoder {
    MockGeocoder::new([
        ("Paris".to_string(), Coordinate::new(48.8566, 2.3522).unwrap()),
        ("Berlin".to_string(), Coordinate::new(52.52, 13.405).unwrap()),
        ("Rome".to_string(), Coordinate::new(41.9028, 12.4964).unwrap()),
    ])
}

struct Harness {
    dir: TempDir,
    engine: TestEngine,
}

impl Harness {
    fn new(config: SyncConfig) -> Self {
        Self::with_geocoder(config, geocoder())
    }

    fn with_geocoder(config: SyncConfig, geocoder: MockGeocoder) -> Self {
        Self::with_parts(config, geocoder, RecordingNotifier::new())
    }

    fn with_parts(config: SyncConfig, geocoder: MockGeocoder, notifier: RecordingNotifier) -> Self {
        let dir = tempdir().unwrap();
        let engine = build(&dir, config, geocoder, notifier).unwrap();
        Self { dir, engine }
    }

    fn routes_path(&self) -> PathBuf {
        self.dir.path().join("routes.json")
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        std::fs::read(self.routes_path()).unwrap()
    }

    fn serve(&self, routes: impl IntoIterator<Item = Route>) {
        self.engine.source().set_routes(routes);
    }

    fn sent(&self) -> Vec<(UserId, crate::notify::Message)> {
        self.engine.dispatcher().notifier().take()
    }
}

fn build(
    dir: &TempDir,
    config: SyncConfig,
    geocoder: MockGeocoder,
    notifier: RecordingNotifier,
) -> Result<TestEngine, PersistenceError> {
    let favorites = Arc::new(FavoriteStore::open(dir.path().join("favorites.json"))?);
    let geocoder = Arc::new(GeocodeCache::open(
        geocoder,
        dir.path().join("geocode_cache.json"),
    )?);
    let dispatcher = NotificationDispatcher::new(
        notifier,
        Arc::clone(&favorites),
        "https://booking.example.com/en",
    );
    SyncEngine::new(
        MockRouteSource::default(),
        geocoder,
        RouteStore::new(dir.path().join("routes.json")),
        dispatcher,
        favorites,
        config,
    )
}

fn no_cooldown() -> SyncConfig {
    SyncConfig {
        manual_cooldown: Duration::ZERO,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn three_cycle_scenario() {
    let h = Harness::new(no_cooldown());

    h.serve([pb1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.added, BTreeSet::from([pb1().key()]));
    assert!(report.removed.is_empty());

    h.serve([pb1(), br1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.added, BTreeSet::from([br1().key()]));
    assert!(report.removed.is_empty());

    h.serve([br1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.removed, BTreeSet::from([pb1().key()]));

    let stored = RouteStore::new(h.routes_path()).load().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored.contains(&br1().key()));
    assert_eq!(h.engine.status().cycles, 3);
}

#[tokio::test]
async fn unchanged_upstream_is_idempotent() {
    let h = Harness::new(no_cooldown());
    h.serve([pb1(), br1()]);

    let first = h.engine.sync_now().await.unwrap();
    assert!(first.persisted);
    let bytes = h.snapshot_bytes();

    let second = h.engine.sync_now().await.unwrap();
    assert!(second.added.is_empty());
    assert!(second.removed.is_empty());
    assert!(!second.persisted);
    assert_eq!(h.snapshot_bytes(), bytes);
}

#[tokio::test]
async fn fetch_failure_leaves_store_untouched() {
    let h = Harness::new(no_cooldown());
    h.engine.add_favorite(&user("7"), &StationId::from(PARIS)).await.unwrap();
    h.serve([pb1()]);
    h.engine.sync_now().await.unwrap();
    let bytes = h.snapshot_bytes();
    h.sent();

    h.serve([pb1(), br1()]);
    h.engine.source().fail_next(FetchError::RateLimited);
    let result = h.engine.sync_now().await;

    assert!(matches!(result, Err(SyncError::Fetch(FetchError::RateLimited))));
    assert_eq!(h.snapshot_bytes(), bytes);
    assert!(h.sent().is_empty());
    assert_eq!(h.engine.routes().len(), 1);

    let status = h.engine.status();
    assert_eq!(status.phase, SyncPhase::Idle);
    assert!(status.last_failure.is_some());
    assert!(status.last_success.is_some());
}

#[tokio::test]
async fn malformed_upstream_response_leaves_store_untouched() {
    let h = Harness::new(no_cooldown());
    h.engine.add_favorite(&user("7"), &StationId::from(PARIS)).await.unwrap();
    h.serve([pb1()]);
    h.engine.sync_now().await.unwrap();
    let bytes = h.snapshot_bytes();
    assert_eq!(h.sent().len(), 1);

    h.serve([]);
    h.engine.source().fail_next(FetchError::Shape {
        url: "https://rally.example/stations/1".to_string(),
        message: "malformed station detail".to_string(),
    });
    let result = h.engine.sync_now().await;
    assert!(matches!(result, Err(SyncError::Fetch(FetchError::Shape { .. }))));
    assert_eq!(h.snapshot_bytes(), bytes);
    assert_eq!(h.engine.routes().len(), 1);

    // Upstream recovers: nothing was lost, so nothing is announced again.
    h.serve([pb1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert!(report.added.is_empty());
    assert!(report.removed.is_empty());
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn persistence_failure_keeps_previous_snapshot() {
    let h = Harness::new(no_cooldown());
    h.serve([pb1()]);
    h.engine.sync_now().await.unwrap();
    let bytes = h.snapshot_bytes();

    std::fs::create_dir(h.dir.path().join(".routes.json.tmp")).unwrap();
    h.serve([pb1(), br1()]);
    let result = h.engine.sync_now().await;

    assert!(matches!(result, Err(SyncError::Persistence(_))));
    assert_eq!(h.snapshot_bytes(), bytes);
    assert_eq!(h.engine.routes().len(), 1);
}

#[tokio::test]
async fn favorites_drive_notifications() {
    let h = Harness::new(no_cooldown());
    let fan = user("100");
    h.engine.add_favorite(&fan, &StationId::from(BERLIN)).await.unwrap();

    h.serve([pb1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.delivered, 1);
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, fan);
    assert_eq!(sent[0].1.route, pb1().key());
    assert_eq!(sent[0].1.kind, MessageKind::ToFavorite);

    h.serve([pb1(), br1()]);
    h.engine.sync_now().await.unwrap();
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.route, br1().key());
    assert_eq!(sent[0].1.kind, MessageKind::FromFavorite);

    h.serve([br1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.delivered, 0);
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn unrelated_routes_notify_nobody() {
    let h = Harness::new(no_cooldown());
    h.engine.add_favorite(&user("100"), &StationId::from(99)).await.unwrap();

    h.serve([pb1(), br1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.added.len(), 2);
    assert_eq!(report.delivered + report.failed_deliveries, 0);
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn delivery_failure_does_not_fail_cycle() {
    let h = Harness::new(no_cooldown());
    h.engine.add_favorite(&user("1"), &StationId::from(PARIS)).await.unwrap();
    h.engine.add_favorite(&user("2"), &StationId::from(PARIS)).await.unwrap();
    h.engine.dispatcher().notifier().fail_for(user("1"));

    h.serve([pb1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed_deliveries, 1);
    assert!(report.persisted);
}

#[tokio::test]
async fn stations_are_geocoded_once() {
    let h = Harness::new(no_cooldown());

    h.serve([pb1()]);
    h.engine.sync_now().await.unwrap();
    h.serve([pb1(), br1()]);
    h.engine.sync_now().await.unwrap();
    h.engine.sync_now().await.unwrap();

    assert_eq!(h.engine.geocoder().len(), 3);
    assert_eq!(h.engine.geocoder().inner().calls(), 3);
    let routes = h.engine.routes();
    let stored = routes.get(&br1().key()).unwrap();
    assert!(stored.is_located());
}

#[tokio::test]
async fn unresolved_station_does_not_block_route() {
    let partial = MockGeocoder::new([(
        "Berlin".to_string(),
        Coordinate::new(52.52, 13.405).unwrap(),
    )]);
    let h = Harness::with_geocoder(no_cooldown(), partial);

    h.serve([br1()]);
    let report = h.engine.sync_now().await.unwrap();
    assert_eq!(report.added, BTreeSet::from([br1().key()]));
    assert_eq!(report.unlocated, 1);

    let map = h.engine.map_export();
    assert!(map.routes.is_empty());
    assert_eq!(map.unplaced, vec![br1().key()]);
}

#[tokio::test]
async fn manual_sync_rejected_while_busy() {
    let h = Harness::new(no_cooldown());
    let guard = h.engine.cycle_lock.try_lock().unwrap();

    assert!(matches!(h.engine.sync_now().await, Err(SyncError::Busy)));
    assert!(matches!(h.engine.run_scheduled().await, Err(SyncError::Busy)));
    assert_eq!(h.engine.source().calls(), 0);

    drop(guard);
    assert!(h.engine.sync_now().await.is_ok());
}

#[tokio::test]
async fn favorite_changes_wait_for_cycle() {
    let h = Harness::new(no_cooldown());
    let guard = h.engine.cycle_lock.try_lock().unwrap();

    let pending = tokio::time::timeout(
        Duration::from_millis(50),
        h.engine.add_favorite(&user("1"), &StationId::from(PARIS)),
    )
    .await;
    assert!(pending.is_err());
    assert!(h.engine.favorites(&user("1")).is_empty());

    drop(guard);
    assert!(h.engine.add_favorite(&user("1"), &StationId::from(PARIS)).await.unwrap());
    assert!(h.engine.remove_favorite(&user("1"), &StationId::from(PARIS)).await.unwrap());
    assert!(h.engine.favorites(&user("1")).is_empty());
}

#[tokio::test]
async fn manual_sync_cools_down() {
    let h = Harness::new(SyncConfig {
        manual_cooldown: Duration::from_secs(3600),
        ..SyncConfig::default()
    });
    h.serve([pb1()]);

    h.engine.sync_now().await.unwrap();
    match h.engine.sync_now().await {
        Err(SyncError::CoolingDown { remaining }) => {
            assert!(remaining > Duration::from_secs(3500));
        }
        other => panic!("expected cooldown, got {other:?}"),
    }

    let report = h.engine.run_scheduled().await.unwrap();
    assert_eq!(report.trigger, Trigger::Scheduled);
}

#[tokio::test]
async fn failed_cycle_does_not_start_cooldown() {
    let h = Harness::new(SyncConfig {
        manual_cooldown: Duration::from_secs(3600),
        ..SyncConfig::default()
    });
    h.engine.source().fail_next(FetchError::RateLimited);

    assert!(h.engine.sync_now().await.is_err());
    assert!(h.engine.sync_now().await.is_ok());
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempdir().unwrap();
    {
        let engine = build(&dir, no_cooldown(), geocoder(), RecordingNotifier::new()).unwrap();
        engine.source().set_routes([pb1()]);
        engine.sync_now().await.unwrap();
    }

    let engine = build(&dir, no_cooldown(), geocoder(), RecordingNotifier::new()).unwrap();
    assert_eq!(engine.routes().len(), 1);

    engine.source().set_routes([pb1()]);
    let report = engine.sync_now().await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(engine.geocoder().len(), 2);
}

#[test]
fn corrupt_snapshot_blocks_startup() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("routes.json"), "{ nope").unwrap();
    assert!(matches!(
        build(&dir, no_cooldown(), geocoder(), RecordingNotifier::new()),
        Err(PersistenceError::Corrupt { .. })
    ));
}

#[tokio::test]
async fn status_reports_counts() {
    let h = Harness::new(no_cooldown());
    let status = h.engine.status();
    assert_eq!(status.phase, SyncPhase::Idle);
    assert_eq!(status.cycles, 0);
    assert!(status.last_success.is_none());

    h.serve([pb1(), br1()]);
    h.engine.sync_now().await.unwrap();
    let status = h.engine.status();
    assert_eq!(status.cycles, 1);
    assert_eq!(status.route_count, 2);
    assert!(status.last_success.is_some());
    assert!(status.last_failure.is_none());
}

#[tokio::test]
async fn shutdown_waits_for_running_notifications() {
    let h = Harness::with_parts(
        no_cooldown(),
        geocoder(),
        RecordingNotifier::new().with_delay(Duration::from_millis(40)),
    );
    for id in ["1", "2", "3"] {
        h.engine.add_favorite(&user(id), &StationId::from(PARIS)).await.unwrap();
    }
    h.serve([pb1()]);

    let (report, delivered_at_stop) = tokio::join!(h.engine.run_scheduled(), async {
        while h.engine.status().phase != SyncPhase::Notifying {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        h.engine.shutdown().await;
        h.engine.dispatcher().notifier().sent().len()
    });

    assert_eq!(report.unwrap().delivered, 3);
    assert_eq!(delivered_at_stop, 3);
    assert!(matches!(h.engine.sync_now().await, Err(SyncError::Stopped)));
    assert!(matches!(h.engine.run_scheduled().await, Err(SyncError::Stopped)));
    assert_eq!(h.engine.source().calls(), 1);
}
