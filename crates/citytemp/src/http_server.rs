//! HTTP REST API for the city temperature service.
//!
//! Thin request/response mapping over the store and the refresh
//! orchestrator. Error bodies use the `{"detail": "..."}` shape.

use crate::refresh;
use crate::store::{City, Store, StoreError, Temperature};
use crate::weather::WeatherClient;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Store handle shared by CRUD handlers, locked only for brief
    /// synchronous calls.
    pub store: Arc<Mutex<Store>>,
    /// Database path; refresh tasks open dedicated connections here.
    pub db_path: PathBuf,
    pub weather: Arc<WeatherClient>,
}

/// JSON request body for city create/update.
#[derive(Debug, Deserialize)]
pub struct CityRequest {
    pub name: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// API-level errors, rendered as `{"detail": "..."}` with a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

fn lock_store(state: &AppState) -> Result<MutexGuard<'_, Store>, ApiError> {
    state
        .store
        .lock()
        .map_err(|e| ApiError::Internal(format!("store lock poisoned: {}", e)))
}

/// GET / - Welcome message
async fn read_root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the City Temperature Management API" }))
}

/// POST /api/cities/ - Create a city
async fn create_city(
    State(state): State<AppState>,
    Json(body): Json<CityRequest>,
) -> Result<Json<City>, ApiError> {
    let store = lock_store(&state)?;
    let city = store.create_city(&body.name, body.additional_info.as_deref())?;
    Ok(Json(city))
}

/// GET /api/cities/ - List all cities
async fn read_cities(State(state): State<AppState>) -> Result<Json<Vec<City>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_cities()?))
}

/// GET /api/cities/{id} - Get a single city
async fn read_city(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<City>, ApiError> {
    let store = lock_store(&state)?;
    store
        .get_city(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("City not found".to_string()))
}

/// PUT /api/cities/{id} - Update a city
async fn update_city(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CityRequest>,
) -> Result<Json<City>, ApiError> {
    let store = lock_store(&state)?;
    store
        .update_city(id, &body.name, body.additional_info.as_deref())?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("City not found".to_string()))
}

/// DELETE /api/cities/{id} - Delete a city (and its readings)
async fn delete_city(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<City>, ApiError> {
    let store = lock_store(&state)?;
    store
        .delete_city(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("City not found".to_string()))
}

/// POST /api/temperatures/update/ - Refresh all cities
///
/// Per-city failures are contained inside the orchestrator; the caller
/// sees a uniform success acknowledgment regardless of how many cities
/// actually got a new reading.
async fn update_temperatures(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = refresh::refresh_all(&state.store, &state.db_path, &state.weather)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    log::info!(
        "temperature refresh finished: {}/{} cities updated, {} failed",
        summary.succeeded,
        summary.total,
        summary.failed
    );
    Ok(Json(json!({ "status": "success" })))
}

/// GET /api/temperatures - List all readings (404 when there are none)
async fn read_temperatures(
    State(state): State<AppState>,
) -> Result<Json<Vec<Temperature>>, ApiError> {
    let temperatures = lock_store(&state)?.list_temperatures(None)?;
    if temperatures.is_empty() {
        return Err(ApiError::NotFound("No temperatures found".to_string()));
    }
    Ok(Json(temperatures))
}

/// GET /api/temperatures/{city_id} - List readings for one city
async fn read_temperatures_by_city(
    State(state): State<AppState>,
    Path(city_id): Path<i64>,
) -> Result<Json<Vec<Temperature>>, ApiError> {
    let temperatures = lock_store(&state)?.list_temperatures(Some(city_id))?;
    if temperatures.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No temperatures found for city ID {}",
            city_id
        )));
    }
    Ok(Json(temperatures))
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(read_root))
        .route("/api/cities/", post(create_city).get(read_cities))
        .route(
            "/api/cities/{id}",
            get(read_city).put(update_city).delete(delete_city),
        )
        .route("/api/temperatures/update/", post(update_temperatures))
        .route("/api/temperatures", get(read_temperatures))
        .route("/api/temperatures/{city_id}", get(read_temperatures_by_city))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until the shutdown signal fires.
pub async fn run_http_server(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    log::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
        })
        .await?;

    Ok(())
}
