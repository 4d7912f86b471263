//! Application state for the web layer.

use std::sync::Arc;

use crate::sync::SyncEngine;

/// Shared application state.
pub struct AppState<S, G, N> {
    pub engine: Arc<SyncEngine<S, G, N>>,

    /// Base of booking links in route listings
    pub booking_url: Arc<str>,
}

impl<S, G, N> AppState<S, G, N> {
    pub fn new(engine: Arc<SyncEngine<S, G, N>>, booking_url: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            booking_url: booking_url.into(),
        }
    }
}

// Derived Clone would require the type parameters to be Clone.
impl<S, G, N> Clone for AppState<S, G, N> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            booking_url: Arc::clone(&self.booking_url),
        }
    }
}
