//! Mock route source for testing without API access.
//!
//! Serves a fixed route set, optionally loaded from a JSON snapshot file,
//! and can be told to fail the next fetches.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{Route, RouteSet};

use super::RouteSource;
use super::error::FetchError;

/// Route source that serves in-memory data.
#[derive(Debug, Default)]
pub struct MockRouteSource {
    routes: Mutex<RouteSet>,
    failures: Mutex<VecDeque<FetchError>>,
    calls: AtomicUsize,
}

impl MockRouteSource {
    /// Create a source that returns the given routes.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        Self {
            routes: Mutex::new(routes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Load routes from a snapshot file in the route store format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let path = path.as_ref();
        let url = path.display().to_string();

        let json = std::fs::read_to_string(path).map_err(|e| FetchError::Api {
            status: 0,
            url: url.clone(),
            message: format!("failed to read mock routes: {e}"),
        })?;

        let routes: RouteSet = serde_json::from_str(&json).map_err(|e| FetchError::Json {
            url,
            message: e.to_string(),
            body: None,
        })?;

        Ok(Self {
            routes: Mutex::new(routes),
            ..Self::default()
        })
    }

    /// Replace the routes served by subsequent fetches.
    pub fn set_routes(&self, routes: impl IntoIterator<Item = Route>) {
        *self.routes.lock().unwrap_or_else(|e| e.into_inner()) = routes.into_iter().collect();
    }

    /// Make the next fetch fail with `error`. Queued failures are served in order.
    pub fn fail_next(&self, error: FetchError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Number of fetches served so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteSource for MockRouteSource {
    async fn fetch_routes(&self) -> Result<RouteSet, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(self
            .routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
