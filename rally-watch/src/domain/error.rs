//! Domain validation errors.
//!
//! These represent routes that cannot exist. They are distinct from
//! fetch and persistence errors.

use chrono::NaiveDate;

use super::{RouteKey, StationId};

/// Why a route failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRoute {
    /// Origin and destination are the same station
    #[error("route starts and ends at station {0}")]
    SameStation(StationId),

    /// Validity window ends before it starts
    #[error("validity window ends ({end}) before it starts ({start})")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    /// A stored key does not match the route it indexes
    #[error("stored key {stored} does not match computed key {computed}")]
    KeyMismatch { stored: RouteKey, computed: RouteKey },
}
