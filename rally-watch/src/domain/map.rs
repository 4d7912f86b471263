//! Data handed to the map renderer.

use chrono::NaiveDate;
use serde::Serialize;

use super::route::RouteKey;
use super::route_set::RouteSet;
use super::station::{Coordinate, Station, StationId};

/// A located route end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub id: StationId,
    pub name: String,
    pub coordinate: Coordinate,
}

/// A route that can be drawn as a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapRoute {
    pub key: RouteKey,
    pub origin: MapPoint,
    pub destination: MapPoint,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Everything the renderer needs: drawable routes plus the keys of routes
/// that lack a coordinate at one end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapExport {
    pub routes: Vec<MapRoute>,
    pub unplaced: Vec<RouteKey>,
}

impl MapExport {
    pub fn from_route_set(set: &RouteSet) -> Self {
        let mut export = Self::default();
        for (key, route) in set.iter() {
            match (point(&route.origin), point(&route.destination)) {
                (Some(origin), Some(destination)) => export.routes.push(MapRoute {
                    key: *key,
                    origin,
                    destination,
                    start: route.window.start(),
                    end: route.window.end(),
                }),
                _ => export.unplaced.push(*key),
            }
        }
        export
    }
}

fn point(station: &Station) -> Option<MapPoint> {
    Some(MapPoint {
        id: station.id.clone(),
        name: station.name.clone(),
        coordinate: station.coordinate?,
    })
}
