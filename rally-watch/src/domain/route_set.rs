//! Route snapshots and the diff between two of them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::error::InvalidRoute;
use super::route::{Route, RouteKey};
use super::station::{Coordinate, Station, StationId};

/// One point-in-time snapshot of all published routes, keyed by identity.
///
/// Ordered so that serializing the same set always yields the same bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSet {
    routes: BTreeMap<RouteKey, Route>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route under its key, returning any route it replaced.
    pub fn insert(&mut self, route: Route) -> Option<Route> {
        self.routes.insert(route.key(), route)
    }

    pub fn get(&self, key: &RouteKey) -> Option<&Route> {
        self.routes.get(key)
    }

    pub fn contains(&self, key: &RouteKey) -> bool {
        self.routes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteKey, &Route)> {
        self.routes.iter()
    }

    /// Every distinct station referenced by a route, by id.
    ///
    /// When two routes disagree about a station's details the first one
    /// in key order wins.
    pub fn stations(&self) -> BTreeMap<StationId, &Station> {
        let mut stations = BTreeMap::new();
        for route in self.routes.values() {
            stations
                .entry(route.origin.id.clone())
                .or_insert(&route.origin);
            stations
                .entry(route.destination.id.clone())
                .or_insert(&route.destination);
        }
        stations
    }

    /// Fill in resolved coordinates for both ends of every route.
    ///
    /// Stations absent from `coordinates` keep whatever they had.
    pub fn apply_coordinates(&mut self, coordinates: &HashMap<StationId, Coordinate>) {
        for route in self.routes.values_mut() {
            for station in [&mut route.origin, &mut route.destination] {
                if let Some(coordinate) = coordinates.get(&station.id) {
                    station.coordinate = Some(*coordinate);
                }
            }
        }
    }

    /// Number of routes with at least one unresolved end.
    pub fn unlocated_count(&self) -> usize {
        self.routes.values().filter(|r| !r.is_located()).count()
    }
}

impl FromIterator<Route> for RouteSet {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        let mut set = Self::new();
        for route in iter {
            set.insert(route);
        }
        set
    }
}

impl TryFrom<BTreeMap<RouteKey, Route>> for RouteSet {
    type Error = InvalidRoute;

    /// Accept a keyed map only if every key matches its route.
    fn try_from(routes: BTreeMap<RouteKey, Route>) -> Result<Self, Self::Error> {
        for (stored, route) in &routes {
            let computed = route.key();
            if *stored != computed {
                return Err(InvalidRoute::KeyMismatch {
                    stored: *stored,
                    computed,
                });
            }
        }
        Ok(Self { routes })
    }
}

impl Serialize for RouteSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.routes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RouteSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let routes = BTreeMap::<RouteKey, Route>::deserialize(deserializer)?;
        Self::try_from(routes).map_err(serde::de::Error::custom)
    }
}

/// Keys that appeared and disappeared between two snapshots.
///
/// Identity is by key only: a route whose dates shift is one removal plus
/// one addition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub added: BTreeSet<RouteKey>,
    pub removed: BTreeSet<RouteKey>,
}

impl DiffResult {
    /// Compute what changed going from `previous` to `current`.
    pub fn between(previous: &RouteSet, current: &RouteSet) -> Self {
        let added = current
            .keys()
            .filter(|k| !previous.contains(k))
            .copied()
            .collect();
        let removed = previous
            .keys()
            .filter(|k| !current.contains(k))
            .copied()
            .collect();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateRange;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn station(id: u64, name: &str) -> Station {
        Station::new(StationId::from(id), name, format!("{name} Hbf"))
    }

    fn route(from: (u64, &str), to: (u64, &str), start: NaiveDate, end: NaiveDate) -> Route {
        Route::new(
            station(from.0, from.1),
            station(to.0, to.1),
            DateRange::new(start, end).unwrap(),
        )
        .unwrap()
    }

    fn paris_berlin() -> Route {
        route((1, "Paris"), (2, "Berlin"), date(5, 1), date(5, 10))
    }

    fn berlin_rome() -> Route {
        route((2, "Berlin"), (3, "Rome"), date(6, 1), date(6, 5))
    }

    #[test]
    fn diff_of_empty_sets_is_empty() {
        let diff = DiffResult::between(&RouteSet::new(), &RouteSet::new());
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let previous: RouteSet = [paris_berlin()].into_iter().collect();
        let current: RouteSet = [berlin_rome()].into_iter().collect();

        let diff = DiffResult::between(&previous, &current);
        assert_eq!(diff.added, BTreeSet::from([berlin_rome().key()]));
        assert_eq!(diff.removed, BTreeSet::from([paris_berlin().key()]));
    }

    #[test]
    fn date_shift_is_remove_plus_add() {
        let before = paris_berlin();
        let after = route((1, "Paris"), (2, "Berlin"), date(5, 2), date(5, 10));

        let diff = DiffResult::between(
            &[before.clone()].into_iter().collect(),
            &[after.clone()].into_iter().collect(),
        );
        assert_eq!(diff.added, BTreeSet::from([after.key()]));
        assert_eq!(diff.removed, BTreeSet::from([before.key()]));
    }

    #[test]
    fn coordinates_do_not_affect_diff() {
        let previous: RouteSet = [paris_berlin()].into_iter().collect();
        let mut current = previous.clone();
        let coords = HashMap::from([(StationId::from(1_u64), Coordinate::new(48.85, 2.35).unwrap())]);
        current.apply_coordinates(&coords);

        assert!(DiffResult::between(&previous, &current).is_empty());
        assert_ne!(previous, current);
    }

    #[test]
    fn stations_are_deduplicated() {
        let set: RouteSet = [paris_berlin(), berlin_rome()].into_iter().collect();
        let stations = set.stations();
        let ids: Vec<&str> = stations.keys().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn apply_coordinates_sets_both_ends() {
        let mut set: RouteSet = [paris_berlin(), berlin_rome()].into_iter().collect();
        assert_eq!(set.unlocated_count(), 2);

        let berlin = Coordinate::new(52.52, 13.40).unwrap();
        let coords = HashMap::from([
            (StationId::from(1_u64), Coordinate::new(48.85, 2.35).unwrap()),
            (StationId::from(2_u64), berlin),
        ]);
        set.apply_coordinates(&coords);

        assert_eq!(set.unlocated_count(), 1);
        let br = set.get(&berlin_rome().key()).unwrap();
        assert_eq!(br.origin.coordinate, Some(berlin));
        assert_eq!(br.destination.coordinate, None);
    }

    #[test]
    fn serde_roundtrip_is_byte_stable() {
        let set: RouteSet = [berlin_rome(), paris_berlin()].into_iter().collect();
        let first = serde_json::to_string_pretty(&set).unwrap();
        let reloaded: RouteSet = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string_pretty(&reloaded).unwrap();

        assert_eq!(reloaded, set);
        assert_eq!(first, second);
    }

    #[test]
    fn deserialize_rejects_mismatched_key() {
        let set: RouteSet = [paris_berlin()].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        let tampered = json.replace(&paris_berlin().key().to_string(), "0000000000000001");

        assert!(serde_json::from_str::<RouteSet>(&tampered).is_err());
    }
}
