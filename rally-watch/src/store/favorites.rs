//! Per-user watched stations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::info;

use crate::domain::{Route, StationId, UserId};

use super::error::PersistenceError;
use super::json_file::JsonFile;

type FavoriteMap = BTreeMap<UserId, BTreeSet<StationId>>;

/// Which stations each user wants to hear about.
///
/// Held in memory and written through to disk on every change. A change
/// only becomes visible in memory after it has been persisted.
#[derive(Debug)]
pub struct FavoriteStore {
    file: JsonFile,
    favorites: RwLock<FavoriteMap>,
}

impl FavoriteStore {
    /// Open the store, loading any previously saved favorites.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let file = JsonFile::new(path);
        let favorites: FavoriteMap = file.load()?.unwrap_or_default();
        info!(
            users = favorites.len(),
            path = %file.path().display(),
            "Loaded favorites"
        );

        Ok(Self {
            file,
            favorites: RwLock::new(favorites),
        })
    }

    /// Watch a station. Returns `false` if the user already watched it.
    pub fn add(&self, user: &UserId, station: &StationId) -> Result<bool, PersistenceError> {
        let mut guard = self.favorites.write().unwrap_or_else(|e| e.into_inner());
        if guard.get(user).is_some_and(|s| s.contains(station)) {
            return Ok(false);
        }

        let mut updated = guard.clone();
        updated
            .entry(user.clone())
            .or_default()
            .insert(station.clone());
        self.file.save(&updated)?;
        *guard = updated;
        Ok(true)
    }

    /// Stop watching a station. Returns `false` if it was not watched.
    pub fn remove(&self, user: &UserId, station: &StationId) -> Result<bool, PersistenceError> {
        let mut guard = self.favorites.write().unwrap_or_else(|e| e.into_inner());
        if !guard.get(user).is_some_and(|s| s.contains(station)) {
            return Ok(false);
        }

        let mut updated = guard.clone();
        if let Some(stations) = updated.get_mut(user) {
            stations.remove(station);
            if stations.is_empty() {
                updated.remove(user);
            }
        }
        self.file.save(&updated)?;
        *guard = updated;
        Ok(true)
    }

    /// Stations a user watches.
    pub fn stations_for(&self, user: &UserId) -> BTreeSet<StationId> {
        let guard = self.favorites.read().unwrap_or_else(|e| e.into_inner());
        guard.get(user).cloned().unwrap_or_default()
    }

    /// Users watching either end of a route.
    pub fn watchers(&self, route: &Route) -> BTreeSet<UserId> {
        let guard = self.favorites.read().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .filter(|(_, stations)| {
                stations.contains(&route.origin.id) || stations.contains(&route.destination.id)
            })
            .map(|(user, _)| user.clone())
            .collect()
    }

    /// Number of users with at least one favorite.
    pub fn user_count(&self) -> usize {
        self.favorites.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
