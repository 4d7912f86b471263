//! Nominatim (OpenStreetMap) geocoding client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::Coordinate;

use super::error::GeocodeError;
use super::{GeocodeQuery, Geocoder};

/// Default base URL for the public Nominatim instance.
const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// The public instance allows one request per second.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the Nominatim client.
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Base URL for the API
    pub base_url: String,
    /// User-Agent header; Nominatim rejects anonymous clients
    pub user_agent: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Minimum time each request occupies its slot
    pub min_interval: Duration,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl NominatimConfig {
    /// Create a new config with the given User-Agent.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: user_agent.into(),
            max_concurrent: 1,
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout_secs: 10,
        }
    }

    /// Set a custom base URL (for testing or a self-hosted instance).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests and the per-request interval.
    pub fn with_rate(mut self, max_concurrent: usize, min_interval: Duration) -> Self {
        self.max_concurrent = max_concurrent;
        self.min_interval = min_interval;
        self
    }
}

/// One search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Nominatim search client.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    min_interval: Duration,
}

impl NominatimClient {
    /// Create a new client with the given configuration.
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            min_interval: config.min_interval,
        })
    }

    /// Run one free-text search, returning the best hit if any.
    pub async fn search(&self, q: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| GeocodeError::Api {
                status: 0,
                message: "request semaphore closed".to_string(),
            })?;
        let started = Instant::now();

        let result = self.search_unthrottled(q).await;

        // Hold the permit until the interval has passed.
        let elapsed = started.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }

        result
    }

    async fn search_unthrottled(&self, q: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", q), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        let places: Vec<Place> = serde_json::from_str(&body).map_err(|e| GeocodeError::Json {
            message: e.to_string(),
        })?;

        Ok(places.first().and_then(parse_place))
    }
}

fn parse_place(place: &Place) -> Option<Coordinate> {
    let lat = place.lat.parse().ok()?;
    let lon = place.lon.parse().ok()?;
    Coordinate::new(lat, lon)
}

impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Coordinate, GeocodeError> {
        for candidate in query.candidates() {
            if let Some(coordinate) = self.search(&candidate).await? {
                return Ok(coordinate);
            }
            debug!(query = %candidate, "No geocoding match, trying next candidate");
        }
        Err(GeocodeError::NotFound(query.full()))
    }
}
