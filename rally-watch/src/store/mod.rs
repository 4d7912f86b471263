//! File-backed state.
//!
//! Three independent JSON documents: the route snapshot, user favorites,
//! and the geocode cache (owned by `geocode`). Each is rewritten whole and
//! atomically on every change.

mod error;
mod favorites;
mod json_file;
mod routes;

pub use error::PersistenceError;
pub use favorites::FavoriteStore;
pub use json_file::JsonFile;
pub use routes::RouteStore;
