//! HTTP control API.
//!
//! A thin layer over [`SyncEngine`](crate::sync::SyncEngine): manual sync,
//! status, route listing, map export and favorite management.

mod dto;
mod routes;
mod state;
mod templates;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
