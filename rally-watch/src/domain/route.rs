//! Routes and their stable identity.

use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use super::error::InvalidRoute;
use super::station::{Station, StationId};

/// Stable identity of a route instance.
///
/// XXH64 over origin id, destination id and both dates. Keys are persisted
/// across runs, so the seed and field encoding must never change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey(u64);

const KEY_SEED: u64 = 0;

/// Separates fields so ("1", "23") and ("12", "3") hash differently.
const FIELD_SEPARATOR: u8 = 0x1f;

impl RouteKey {
    /// Derive the key for a route between two stations over a date range.
    pub fn derive(
        origin: &StationId,
        destination: &StationId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();

        let mut hasher = XxHash64::with_seed(KEY_SEED);
        let fields = [origin.as_str(), destination.as_str(), &start, &end];
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                hasher.write(&[FIELD_SEPARATOR]);
            }
            hasher.write(field.as_bytes());
        }

        Self(hasher.finish())
    }

    /// Raw hash value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Error returned when parsing a route key from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid route key: expected 16 hex digits")]
pub struct InvalidRouteKey;

impl FromStr for RouteKey {
    type Err = InvalidRouteKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(InvalidRouteKey);
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| InvalidRouteKey)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteKey({self})")
    }
}

impl Serialize for RouteKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouteKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive validity window of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = InvalidRoute;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Create a window; `start` may equal `end` (a one-day transfer).
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRoute> {
        if end < start {
            return Err(InvalidRoute::DateOrder { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Vehicle offered for a transfer, as listed by the booking search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleModel {
    pub name: String,
    /// Picture of the model, if the search listed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A dated transfer opportunity between two stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRoute")]
pub struct Route {
    pub origin: Station,
    pub destination: Station,
    pub window: DateRange,
    /// Best-effort detail; not part of the route's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<VehicleModel>,
}

#[derive(Deserialize)]
struct RawRoute {
    origin: Station,
    destination: Station,
    window: DateRange,
    #[serde(default)]
    model: Option<VehicleModel>,
}

impl TryFrom<RawRoute> for Route {
    type Error = InvalidRoute;

    fn try_from(raw: RawRoute) -> Result<Self, Self::Error> {
        let route = Self::new(raw.origin, raw.destination, raw.window)?;
        Ok(match raw.model {
            Some(model) => route.with_model(model),
            None => route,
        })
    }
}

impl Route {
    /// Create a route, rejecting loops back to the origin.
    pub fn new(
        origin: Station,
        destination: Station,
        window: DateRange,
    ) -> Result<Self, InvalidRoute> {
        if origin.id == destination.id {
            return Err(InvalidRoute::SameStation(origin.id));
        }
        Ok(Self {
            origin,
            destination,
            window,
            model: None,
        })
    }

    pub fn with_model(mut self, model: VehicleModel) -> Self {
        self.model = Some(model);
        self
    }

    /// The route's identity.
    pub fn key(&self) -> RouteKey {
        RouteKey::derive(
            &self.origin.id,
            &self.destination.id,
            self.window.start,
            self.window.end,
        )
    }

    /// Whether the route starts or ends at the given station.
    pub fn touches(&self, station: &StationId) -> bool {
        &self.origin.id == station || &self.destination.id == station
    }

    /// Whether both ends have a resolved coordinate.
    ///
    /// Routes missing one are still tracked; renderers place them separately.
    pub fn is_located(&self) -> bool {
        self.origin.coordinate.is_some() && self.destination.coordinate.is_some()
    }

    /// Deep link into the provider's booking page for this transfer.
    pub fn booking_url(&self, base_url: &str) -> String {
        format!(
            "{}/rally/pick?pickup_date={}&return_date={}&currency=EUR&startStation={}&endStation={}",
            base_url.trim_end_matches('/'),
            self.window.start.format("%Y-%m-%d"),
            self.window.end.format("%Y-%m-%d"),
            self.origin.id,
            self.destination.id,
        )
    }
}
