//! Askama templates for the web frontend.

use askama::Template;

use super::dto::RouteEntry;

/// Route listing page.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub routes: Vec<RouteEntry>,
    /// Human-readable time of the last successful sync
    pub last_success: String,
}
