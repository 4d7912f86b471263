//! In-memory geocoder for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::domain::Coordinate;

use super::error::GeocodeError;
use super::{GeocodeQuery, Geocoder};

/// Geocoder answering from a fixed locality table.
#[derive(Debug, Default)]
pub struct MockGeocoder {
    places: Mutex<HashMap<String, Coordinate>>,
    failing: AtomicBool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new(places: impl IntoIterator<Item = (String, Coordinate)>) -> Self {
        Self {
            places: Mutex::new(places.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Delay every answer, to let concurrent lookups overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert(&self, locality: impl Into<String>, coordinate: Coordinate) {
        self.places
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(locality.into(), coordinate);
    }

    /// Make every lookup fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Coordinate, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(GeocodeError::RateLimited);
        }

        let places = self.places.lock().unwrap_or_else(|e| e.into_inner());
        places
            .get(&query.locality)
            .copied()
            .ok_or_else(|| GeocodeError::NotFound(query.full()))
    }
}
