//! Rally booking API HTTP client.
//!
//! The API has no single "all routes" endpoint, so a fetch crawls it:
//! station list, then each station's allowed returns, then the open
//! timeframes for every (origin, destination) pair. A last, best-effort
//! search per pair names the vehicle on offer.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::domain::{RouteSet, Station, StationId, VehicleModel};

use super::RouteSource;
use super::convert::{
    convert_route, convert_station, parse_date, parse_records, return_ids, vehicle_model,
};
use super::error::FetchError;
use super::types::{SearchOffer, StationDetail, StationRecord, Timeframe};

/// Default base URL for the rally API.
const DEFAULT_BASE_URL: &str = "https://booking.roadsurfer.com/api/en/rally";

/// Page the browser client sends as referer; the API rejects requests without one.
const DEFAULT_REFERER: &str = "https://booking.roadsurfer.com/en/rally?currency=EUR";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the rally client.
#[derive(Debug, Clone)]
pub struct RallyConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Referer header value
    pub referer: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl RallyConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }
}

/// Rally API client.
///
/// Uses a semaphore to limit concurrent requests; a full crawl issues one
/// request per station plus one per station pair.
#[derive(Debug, Clone)]
pub struct RallyClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl RallyClient {
    /// Create a new rally client with the given configuration.
    pub fn new(config: RallyConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-UK,en;q=0.7"));
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));

        let referer = HeaderValue::from_str(&config.referer).map_err(|_| FetchError::Shape {
            url: config.base_url.clone(),
            message: "invalid referer header value".to_string(),
        })?;
        headers.insert("Referer", referer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// GET a path under the base URL and parse the body as JSON.
    ///
    /// `alias` goes into `X-Requested-Alias`, which the booking site uses to
    /// route its own XHR calls.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        alias: &str,
    ) -> Result<serde_json::Value, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Shape {
                url: self.base_url.clone(),
                message: "request semaphore closed".to_string(),
            })?;

        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("X-Requested-Alias", alias)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                url,
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| FetchError::Json {
            url,
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }

    /// Fetch and validate the station list.
    pub async fn fetch_stations(&self) -> Result<Vec<Station>, FetchError> {
        let value = self.get_json("stations", &[], "rally.startStations").await?;

        let serde_json::Value::Array(values) = value else {
            return Err(FetchError::Shape {
                url: format!("{}/stations", self.base_url),
                message: "expected a JSON array of stations".to_string(),
            });
        };

        let total = values.len();
        let records: Vec<StationRecord> = parse_records(values, "station");
        let stations: Vec<Station> = records
            .iter()
            .filter_map(|record| match convert_station(record) {
                Ok(station) => Some(station),
                Err(e) => {
                    warn!(station_id = record.id, error = %e, "Quarantined station record");
                    None
                }
            })
            .collect();

        info!(valid = stations.len(), total, "Fetched station list");
        Ok(stations)
    }

    /// Fetch the ids a vehicle picked up at `origin` may be returned to.
    pub async fn fetch_returns(&self, origin: &StationId) -> Result<Vec<StationId>, FetchError> {
        let path = format!("stations/{origin}");
        let value = self.get_json(&path, &[], "rally.fetchRoutes").await?;

        let detail: StationDetail =
            serde_json::from_value(value).map_err(|e| FetchError::Shape {
                url: format!("{}/{path}", self.base_url),
                message: format!("malformed station detail: {e}"),
            })?;
        Ok(return_ids(origin, &detail))
    }

    /// Fetch open timeframes for one origin/destination pair.
    pub async fn fetch_timeframes(
        &self,
        origin: &StationId,
        destination: &StationId,
    ) -> Result<Vec<Timeframe>, FetchError> {
        let path = format!("timeframes/{origin}-{destination}");
        let value = self.get_json(&path, &[], "rally.timeframes").await?;

        match value {
            serde_json::Value::Array(values) => Ok(parse_records(values, "timeframe")),
            serde_json::Value::Null => Ok(Vec::new()),
            other => Err(FetchError::Shape {
                url: format!("{}/{path}", self.base_url),
                message: format!("expected a JSON array of timeframes, got {}", kind_of(&other)),
            }),
        }
    }

    /// Look up the vehicle offered for a pair over one of its windows.
    pub async fn fetch_model(
        &self,
        origin: &StationId,
        destination: &StationId,
        window: &Timeframe,
    ) -> Result<Option<VehicleModel>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let shape = |message: String| FetchError::Shape {
            url: url.clone(),
            message,
        };
        let start = parse_date(&window.start_date).map_err(|e| shape(e.to_string()))?;
        let end = parse_date(&window.end_date).map_err(|e| shape(e.to_string()))?;

        let stations = format!("[[{origin},{destination}]]");
        let range = format!(r#"["{start}","{end}"]"#);
        let query = [
            ("stations", stations.as_str()),
            ("range", range.as_str()),
            ("currency", "EUR"),
            ("models", "[]"),
        ];
        let value = self.get_json("search", &query, "rally.search").await?;

        let offers: Vec<SearchOffer> = match value {
            serde_json::Value::Array(values) => parse_records(values, "search offer"),
            serde_json::Value::Null => Vec::new(),
            other => {
                return Err(shape(format!(
                    "expected a JSON array of offers, got {}",
                    kind_of(&other)
                )));
            }
        };
        Ok(vehicle_model(&offers))
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl RouteSource for RallyClient {
    async fn fetch_routes(&self) -> Result<RouteSet, FetchError> {
        let stations = self.fetch_stations().await?;
        let by_id: HashMap<&StationId, &Station> = stations.iter().map(|s| (&s.id, s)).collect();

        let returns = try_join_all(stations.iter().map(|s| self.fetch_returns(&s.id))).await?;

        let mut pairs: Vec<(&Station, &Station)> = Vec::new();
        for (origin, destinations) in stations.iter().zip(&returns) {
            for destination_id in destinations {
                match by_id.get(destination_id) {
                    Some(&destination) if destination.id != origin.id => {
                        pairs.push((origin, destination))
                    }
                    Some(_) => debug!(station = %origin.id, "Ignoring return to same station"),
                    None => warn!(
                        origin = %origin.id,
                        destination = %destination_id,
                        "Return station missing from station list"
                    ),
                }
            }
        }

        let timeframes = try_join_all(
            pairs
                .iter()
                .map(|(origin, destination)| self.fetch_timeframes(&origin.id, &destination.id)),
        )
        .await?;

        // Best effort: a failed search only costs the model name.
        let models = join_all(pairs.iter().zip(&timeframes).map(
            |((origin, destination), frames)| async move {
                let window = frames.first()?;
                match self.fetch_model(&origin.id, &destination.id, window).await {
                    Ok(model) => model,
                    Err(e) => {
                        warn!(
                            origin = %origin.id,
                            destination = %destination.id,
                            error = %e,
                            "Vehicle search failed"
                        );
                        None
                    }
                }
            },
        ))
        .await;

        let mut routes = RouteSet::new();
        for (((origin, destination), frames), model) in pairs.iter().zip(timeframes).zip(models) {
            for frame in &frames {
                match convert_route(origin, destination, frame) {
                    Ok(route) => {
                        routes.insert(match &model {
                            Some(model) => route.with_model(model.clone()),
                            None => route,
                        });
                    }
                    Err(e) => warn!(
                        origin = %origin.id,
                        destination = %destination.id,
                        error = %e,
                        "Quarantined timeframe"
                    ),
                }
            }
        }

        info!(
            stations = stations.len(),
            pairs = pairs.len(),
            routes = routes.len(),
            "Fetched rally routes"
        );
        Ok(routes)
    }
}
