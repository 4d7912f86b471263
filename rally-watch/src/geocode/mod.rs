//! Station geocoding.
//!
//! Coordinates are looked up once per station and kept forever: stations
//! do not move, and the public geocoder is slow and rate limited.

mod cache;
mod client;
mod error;
mod mock;

use std::future::Future;

use crate::domain::{Coordinate, Station};

pub use cache::{GeocodeCache, GeocodeEntry};
pub use client::{NominatimClient, NominatimConfig};
pub use error::GeocodeError;
pub use mock::MockGeocoder;

/// What to search for when locating a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeQuery {
    pub address: String,
    pub locality: String,
}

impl GeocodeQuery {
    pub fn for_station(station: &Station) -> Self {
        Self {
            address: station.address.trim().to_string(),
            locality: station.locality().trim().to_string(),
        }
    }

    /// Queries to try in order: address with locality, bare address, then
    /// bare locality. Blank and repeated queries are dropped.
    pub fn candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(3);
        let mut push = |q: String| {
            if !q.is_empty() && !out.contains(&q) {
                out.push(q);
            }
        };

        if !self.address.is_empty() && !self.locality.is_empty() {
            push(format!("{}, {}", self.address, self.locality));
        }
        push(self.address.clone());
        push(self.locality.clone());
        out
    }

    /// The most specific form of the query, for error messages.
    pub fn full(&self) -> String {
        self.candidates().into_iter().next().unwrap_or_default()
    }
}

/// Something that can turn a station's address into a coordinate.
pub trait Geocoder: Send + Sync {
    fn geocode(
        &self,
        query: &GeocodeQuery,
    ) -> impl Future<Output = Result<Coordinate, GeocodeError>> + Send;
}
