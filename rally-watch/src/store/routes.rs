//! Last-known route snapshot.

use std::path::{Path, PathBuf};

use crate::domain::RouteSet;

use super::error::PersistenceError;
use super::json_file::JsonFile;

/// Durable copy of the most recently synced route set.
///
/// `save` is the only mutator and the sync engine its only caller.
#[derive(Debug)]
pub struct RouteStore {
    file: JsonFile,
}

impl RouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// Load the stored snapshot; empty if nothing has been saved yet.
    ///
    /// A file that exists but does not decode is an error rather than an
    /// empty set, which would otherwise make every route look new.
    pub fn load(&self) -> Result<RouteSet, PersistenceError> {
        Ok(self.file.load()?.unwrap_or_default())
    }

    /// Atomically replace the stored snapshot.
    pub fn save(&self, routes: &RouteSet) -> Result<(), PersistenceError> {
        self.file.save(routes)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, Route, Station, StationId};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn route(from: u64, to: u64) -> Route {
        let date = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        Route::new(
            Station::new(StationId::from(from), format!("S{from}"), "addr"),
            Station::new(StationId::from(to), format!("S{to}"), "addr"),
            DateRange::new(date(1), date(10)).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn empty_when_never_saved() {
        let dir = tempdir().unwrap();
        let store = RouteStore::new(dir.path().join("routes.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let store = RouteStore::new(dir.path().join("routes.json"));
        let set: RouteSet = [route(1, 2), route(2, 3)].into_iter().collect();

        store.save(&set).unwrap();
        assert_eq!(store.load().unwrap(), set);
    }

    #[test]
    fn load_does_not_touch_file() {
        let dir = tempdir().unwrap();
        let store = RouteStore::new(dir.path().join("routes.json"));
        store.save(&[route(1, 2)].into_iter().collect()).unwrap();

        let before = std::fs::read(store.path()).unwrap();
        store.load().unwrap();
        store.load().unwrap();
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_snapshot_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, r#"{"0000000000000001": {"bogus": true}}"#).unwrap();

        let store = RouteStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(PersistenceError::Corrupt { .. })
        ));
    }
}
