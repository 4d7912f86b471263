//! Persistent, coalescing coordinate cache.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use moka::future::Cache as MokaCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Coordinate, Station, StationId};
use crate::store::{JsonFile, PersistenceError};

use super::{GeocodeQuery, Geocoder};

/// A resolved coordinate and when it was first looked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub coordinate: Coordinate,
    pub resolved_at: DateTime<Utc>,
}

type EntryMap = BTreeMap<StationId, GeocodeEntry>;

/// Station coordinates, resolved at most once each.
///
/// Successful lookups are written through to disk and never expire.
/// Failures are not remembered, so the next cycle retries them.
/// Concurrent lookups for the same station share a single in-flight
/// request.
pub struct GeocodeCache<G> {
    geocoder: G,

    /// Everything resolved so far; mirrors the file on disk.
    entries: RwLock<EntryMap>,

    /// Coalesces concurrent lookups per station.
    in_flight: MokaCache<StationId, Coordinate>,

    file: JsonFile,
}

impl<G: Geocoder> GeocodeCache<G> {
    /// Open the cache, loading previously resolved coordinates.
    pub fn open(geocoder: G, path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let file = JsonFile::new(path);
        let entries: EntryMap = file.load()?.unwrap_or_default();
        info!(
            stations = entries.len(),
            path = %file.path().display(),
            "Loaded geocode cache"
        );

        Ok(Self {
            geocoder,
            entries: RwLock::new(entries),
            in_flight: MokaCache::builder().build(),
            file,
        })
    }

    /// Cached coordinate for a station, without any lookup.
    pub fn get(&self, id: &StationId) -> Option<Coordinate> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).map(|entry| entry.coordinate)
    }

    /// Cached entry for a station, including when it was resolved.
    pub fn entry(&self, id: &StationId) -> Option<GeocodeEntry> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).copied()
    }

    /// Resolve a station's coordinate, looking it up if not yet known.
    ///
    /// Returns `None` if the lookup fails; the failure is logged and the
    /// station will be retried on the next call.
    pub async fn resolve(&self, station: &Station) -> Option<Coordinate> {
        if let Some(coordinate) = self.get(&station.id) {
            return Some(coordinate);
        }

        let query = GeocodeQuery::for_station(station);
        let result = self
            .in_flight
            .try_get_with(station.id.clone(), async {
                debug!(station = %station.id, query = %query.full(), "Geocoding station");
                self.geocoder.geocode(&query).await
            })
            .await;

        match result {
            Ok(coordinate) => {
                self.record(&station.id, coordinate);
                Some(coordinate)
            }
            Err(e) => {
                warn!(
                    station = %station.id,
                    name = %station.name,
                    error = %e,
                    "Geocoding failed"
                );
                None
            }
        }
    }

    /// Resolve many stations with at most `workers` lookups in flight.
    ///
    /// Stations that could not be resolved are absent from the result.
    pub async fn resolve_all(
        &self,
        stations: Vec<Station>,
        workers: usize,
    ) -> HashMap<StationId, Coordinate> {
        let resolved: Vec<(StationId, Option<Coordinate>)> = stream::iter(stations)
            .map(|station| async move {
                let coordinate = self.resolve(&station).await;
                (station.id, coordinate)
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

        resolved
            .into_iter()
            .filter_map(|(id, coordinate)| coordinate.map(|c| (id, c)))
            .collect()
    }

    /// Forget every coordinate, in memory and on disk.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.file.remove()?;
        guard.clear();
        self.in_flight.invalidate_all();
        info!("Cleared geocode cache");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The wrapped geocoder.
    pub fn inner(&self) -> &G {
        &self.geocoder
    }

    /// Remember a new coordinate and flush. An existing entry is never
    /// overwritten. A failed flush keeps the entry in memory.
    fn record(&self, id: &StationId, coordinate: Coordinate) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(id) {
            return;
        }

        guard.insert(
            id.clone(),
            GeocodeEntry {
                coordinate,
                resolved_at: Utc::now(),
            },
        );

        if let Err(e) = self.file.save(&*guard) {
            warn!(station = %id, error = %e, "Failed to persist geocode cache");
        }
    }
}

impl<G> std::fmt::Debug for GeocodeCache<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodeCache")
            .field("path", &self.file.path())
            .field("in_flight", &self.in_flight.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::MockGeocoder;
    use std::time::Duration;
    use tempfile::tempdir;

    fn berlin() -> Coordinate {
        Coordinate::new(52.52, 13.405).unwrap()
    }

    fn station(id: u64, name: &str) -> Station {
        Station::new(StationId::from(id), name, "Somewhere 1")
    }

    fn geocoder() -> MockGeocoder {
        MockGeocoder::new([
            ("Berlin".to_string(), berlin()),
            ("Paris".to_string(), Coordinate::new(48.8566, 2.3522).unwrap()),
        ])
    }

    #[tokio::test]
    async fn resolves_once_per_station() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(geocoder(), dir.path().join("geo.json")).unwrap();
        let s = station(1, "Berlin");

        assert_eq!(cache.resolve(&s).await, Some(berlin()));
        assert_eq!(cache.resolve(&s).await, Some(berlin()));
        assert_eq!(cache.geocoder.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_retried() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(geocoder(), dir.path().join("geo.json")).unwrap();
        let s = station(1, "Berlin");

        cache.geocoder.set_failing(true);
        assert_eq!(cache.resolve(&s).await, None);
        assert!(cache.is_empty());

        cache.geocoder.set_failing(false);
        assert_eq!(cache.resolve(&s).await, Some(berlin()));
        assert_eq!(cache.geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_place_is_not_cached() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(geocoder(), dir.path().join("geo.json")).unwrap();
        let s = station(3, "Atlantis");

        assert_eq!(cache.resolve(&s).await, None);
        assert_eq!(cache.resolve(&s).await, None);
        assert_eq!(cache.geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_request() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(
            geocoder().with_delay(Duration::from_millis(50)),
            dir.path().join("geo.json"),
        )
        .unwrap();
        let s = station(1, "Berlin");

        let results = futures::future::join_all((0..8).map(|_| cache.resolve(&s))).await;
        assert!(results.iter().all(|r| *r == Some(berlin())));
        assert_eq!(cache.geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn resolve_all_skips_failures() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(geocoder(), dir.path().join("geo.json")).unwrap();
        let stations = vec![station(1, "Berlin"), station(2, "Paris"), station(3, "Atlantis")];

        let resolved = cache.resolve_all(stations, 2).await;
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.get(&StationId::from(1)), Some(&berlin()));
        assert!(!resolved.contains_key(&StationId::from(3)));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geo.json");
        {
            let cache = GeocodeCache::open(geocoder(), &path).unwrap();
            cache.resolve(&station(1, "Berlin")).await;
        }

        let reopened = GeocodeCache::open(geocoder(), &path).unwrap();
        assert_eq!(reopened.get(&StationId::from(1)), Some(berlin()));
        assert_eq!(reopened.resolve(&station(1, "Berlin")).await, Some(berlin()));
        assert_eq!(reopened.geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geo.json");
        let cache = GeocodeCache::open(geocoder(), &path).unwrap();
        cache.resolve(&station(1, "Berlin")).await;
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!path.exists());

        cache.resolve(&station(1, "Berlin")).await;
        assert_eq!(cache.geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn entry_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::open(geocoder(), dir.path().join("geo.json")).unwrap();
        let s = station(1, "Berlin");
        cache.resolve(&s).await;
        let first = cache.entry(&s.id).unwrap();

        cache.record(&s.id, Coordinate::new(0.0, 0.0).unwrap());
        assert_eq!(cache.entry(&s.id), Some(first));
    }

    #[tokio::test]
    async fn corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geo.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            GeocodeCache::open(geocoder(), &path),
            Err(PersistenceError::Corrupt { .. })
        ));
    }
}
