//! Upstream rally route source.
//!
//! The booking site publishes one-way vehicle transfers ("rallies")
//! between its stations. This module crawls that API and turns the
//! loosely-typed responses into a validated [`RouteSet`].
//!
//! Key characteristics of the API:
//! - No single "all routes" endpoint; routes are assembled from the
//!   station list, each station's returns, and per-pair timeframes
//! - Requests need browser-like headers and an `X-Requested-Alias`
//! - Dates are ISO datetimes, but only the date part carries meaning

mod client;
mod convert;
mod error;
mod mock;
mod types;

use std::future::Future;

use crate::domain::RouteSet;

pub use client::{RallyClient, RallyConfig};
pub use convert::{ConversionError, clean_text};
pub use error::FetchError;
pub use mock::MockRouteSource;
pub use types::{StationDetail, StationRecord, Timeframe};

/// Something that can produce the current, complete route set.
///
/// A fetch is all-or-nothing: it returns every route the provider
/// currently publishes, or an error. Individual malformed records are
/// dropped inside the source, never surfaced as partial results.
pub trait RouteSource: Send + Sync {
    fn fetch_routes(&self) -> impl Future<Output = Result<RouteSet, FetchError>> + Send;
}

/// The route source chosen at startup.
#[derive(Debug)]
pub enum ConfiguredSource {
    Live(RallyClient),
    /// Replays a saved snapshot instead of calling the API.
    Mock(MockRouteSource),
}

impl RouteSource for ConfiguredSource {
    async fn fetch_routes(&self) -> Result<RouteSet, FetchError> {
        match self {
            Self::Live(client) => client.fetch_routes().await,
            Self::Mock(mock) => mock.fetch_routes().await,
        }
    }
}
