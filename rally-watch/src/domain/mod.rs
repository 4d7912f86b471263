//! Domain types for rally route tracking.
//!
//! All types enforce their invariants at construction time, so code that
//! receives them can trust their validity. Raw upstream records are turned
//! into these types by the `rally` module before anything else sees them.

mod error;
mod map;
mod route;
mod route_set;
mod station;
mod user;

pub use error::InvalidRoute;
pub use map::{MapExport, MapPoint, MapRoute};
pub use route::{DateRange, InvalidRouteKey, Route, RouteKey, VehicleModel};
pub use route_set::{DiffResult, RouteSet};
pub use station::{Coordinate, InvalidStationId, Station, StationId};
pub use user::{InvalidUserId, UserId};
