//! HTTP route handlers.

use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::domain::{MapExport, StationId, UserId};
use crate::geocode::Geocoder;
use crate::notify::Notifier;
use crate::rally::RouteSource;
use crate::store::PersistenceError;
use crate::sync::{CycleReport, SyncError, SyncStatus};

use super::dto::*;
use super::state::AppState;
use super::templates::IndexTemplate;

/// Create the application router.
pub fn create_router<S, G, N>(state: AppState<S, G, N>) -> Router
where
    S: RouteSource + 'static,
    G: Geocoder + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/", get(index_page::<S, G, N>))
        .route("/health", get(health))
        .route("/status", get(status::<S, G, N>))
        .route("/sync", post(sync_now::<S, G, N>))
        .route("/routes", get(list_routes::<S, G, N>))
        .route("/map", get(map_export::<S, G, N>))
        .route("/favorites/:user", get(list_favorites::<S, G, N>))
        .route(
            "/favorites/:user/:station",
            put(add_favorite::<S, G, N>).delete(remove_favorite::<S, G, N>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Route listing page.
async fn index_page<S, G, N>(
    State(state): State<AppState<S, G, N>>,
) -> Result<Html<String>, AppError>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    let routes = state.engine.routes();
    let template = IndexTemplate {
        routes: routes
            .iter()
            .map(|(_, route)| RouteEntry::from_route(route, &state.booking_url))
            .collect(),
        last_success: state
            .engine
            .status()
            .last_success
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string()),
    };

    let html = template.render().map_err(|e| AppError::Internal {
        message: format!("Template error: {e}"),
    })?;
    Ok(Html(html))
}

/// Engine phase and last outcomes.
async fn status<S, G, N>(State(state): State<AppState<S, G, N>>) -> Json<SyncStatus>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    Json(state.engine.status())
}

/// Run a sync cycle now.
async fn sync_now<S, G, N>(
    State(state): State<AppState<S, G, N>>,
) -> Result<Json<CycleReport>, AppError>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    Ok(Json(state.engine.sync_now().await?))
}

/// Current route snapshot.
async fn list_routes<S, G, N>(State(state): State<AppState<S, G, N>>) -> Json<RoutesResponse>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    let routes = state.engine.routes();
    Json(RoutesResponse::from_route_set(&routes, &state.booking_url))
}

/// Routes with coordinates, for drawing on a map.
async fn map_export<S, G, N>(State(state): State<AppState<S, G, N>>) -> Json<MapExport>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    Json(state.engine.map_export())
}

async fn list_favorites<S, G, N>(
    State(state): State<AppState<S, G, N>>,
    Path(user): Path<String>,
) -> Result<Json<FavoritesResponse>, AppError>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    let user = parse_user(&user)?;
    let stations = state.engine.favorites(&user).into_iter().collect();
    Ok(Json(FavoritesResponse { user, stations }))
}

async fn add_favorite<S, G, N>(
    State(state): State<AppState<S, G, N>>,
    Path((user, station)): Path<(String, String)>,
) -> Result<Json<FavoriteChange>, AppError>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    let user = parse_user(&user)?;
    let station = parse_station(&station)?;
    let changed = state.engine.add_favorite(&user, &station).await?;
    Ok(Json(FavoriteChange {
        user,
        station,
        changed,
    }))
}

async fn remove_favorite<S, G, N>(
    State(state): State<AppState<S, G, N>>,
    Path((user, station)): Path<(String, String)>,
) -> Result<Json<FavoriteChange>, AppError>
where
    S: RouteSource,
    G: Geocoder,
    N: Notifier,
{
    let user = parse_user(&user)?;
    let station = parse_station(&station)?;
    let changed = state.engine.remove_favorite(&user, &station).await?;
    Ok(Json(FavoriteChange {
        user,
        station,
        changed,
    }))
}

fn parse_user(raw: &str) -> Result<UserId, AppError> {
    UserId::parse(raw).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })
}

fn parse_station(raw: &str) -> Result<StationId, AppError> {
    StationId::parse(raw).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Sync(SyncError),
    Internal { message: String },
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        AppError::Sync(e)
    }
}

impl From<PersistenceError> for AppError {
    fn from(e: PersistenceError) -> Self {
        AppError::Sync(SyncError::Persistence(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, message) = match &self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
            AppError::Sync(e) => {
                let status = match e {
                    SyncError::Busy => StatusCode::CONFLICT,
                    SyncError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
                    SyncError::CoolingDown { remaining } => {
                        retry_after = Some(remaining.as_secs().max(1));
                        StatusCode::TOO_MANY_REQUESTS
                    }
                    SyncError::Fetch(_) => StatusCode::BAD_GATEWAY,
                    SyncError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        if status.is_server_error() {
            error!(status = %status, error = %message, "Request failed");
        } else {
            warn!(status = %status, error = %message, "Request rejected");
        }

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
