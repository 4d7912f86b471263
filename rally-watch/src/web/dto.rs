//! Data transfer objects for web responses.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Route, RouteKey, RouteSet, StationId, UserId, VehicleModel};

/// A station as shown in listings.
#[derive(Debug, Serialize)]
pub struct StationRef {
    pub id: StationId,
    pub name: String,
    pub located: bool,
}

/// One route in the listing.
#[derive(Debug, Serialize)]
pub struct RouteEntry {
    pub key: RouteKey,
    pub origin: StationRef,
    pub destination: StationRef,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<VehicleModel>,
    pub booking_url: String,
}

impl RouteEntry {
    pub fn from_route(route: &Route, booking_base: &str) -> Self {
        let station_ref = |s: &crate::domain::Station| StationRef {
            id: s.id.clone(),
            name: s.name.clone(),
            located: s.coordinate.is_some(),
        };

        Self {
            key: route.key(),
            origin: station_ref(&route.origin),
            destination: station_ref(&route.destination),
            start: route.window.start(),
            end: route.window.end(),
            days: route.window.days(),
            model: route.model.clone(),
            booking_url: route.booking_url(booking_base),
        }
    }
}

/// Response for `GET /routes`.
#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub count: usize,
    pub routes: Vec<RouteEntry>,
}

impl RoutesResponse {
    pub fn from_route_set(set: &RouteSet, booking_base: &str) -> Self {
        let routes: Vec<RouteEntry> = set
            .iter()
            .map(|(_, route)| RouteEntry::from_route(route, booking_base))
            .collect();
        Self {
            count: routes.len(),
            routes,
        }
    }
}

/// Response for `GET /favorites/:user`.
#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub user: UserId,
    pub stations: Vec<StationId>,
}

/// Response for favorite add/remove.
#[derive(Debug, Serialize)]
pub struct FavoriteChange {
    pub user: UserId,
    pub station: StationId,
    /// False if the request was a no-op
    pub changed: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
