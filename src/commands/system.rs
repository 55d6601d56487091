use crate::config::{API_PREFIX, APP_NAME, APP_VERSION};
use crate::db;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub api_base: &'static str,
}

pub async fn root_axum() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: APP_NAME,
        version: APP_VERSION,
        status: "running",
        api_base: API_PREFIX,
    })
}

pub async fn health_axum(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::ping(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected", "version": APP_VERSION })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable", "version": APP_VERSION })),
            )
        }
    }
}

/// Endpoint index, relative to the API prefix.
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/crops/master", "Crop catalog"),
    ("GET", "/crops/master/:id", "Crop catalog entry"),
    ("POST", "/crops/recommendations", "Score crops for a farm profile"),
    ("GET", "/crops/recommendations/:farm_ref", "Stored recommendations"),
    ("GET", "/prices/markets", "Markets"),
    ("GET", "/prices/current", "Latest prices"),
    ("GET", "/prices/history", "Daily price history"),
    ("GET", "/prices/prediction", "Price forecast"),
    ("GET", "/prices/comparison", "Cross-market comparison"),
    ("POST", "/prices", "Record a price observation"),
    ("POST", "/prices/alerts/evaluate", "Evaluate a price watch"),
    ("GET", "/diseases/catalog", "Disease catalog"),
    ("GET", "/diseases/catalog/:id", "Disease catalog entry"),
    ("POST", "/diseases/analyze", "Analyze a disease detection"),
    ("GET", "/weather/current", "Current weather"),
    ("GET", "/weather/forecast", "Daily forecast"),
    ("GET", "/weather/advisories", "Farming advisories"),
    ("POST", "/alerts/weather", "Weather alert drafts"),
    ("POST", "/twin/projection", "Digital twin yield projection"),
    ("POST", "/sustainability/summary", "Carbon footprint summary"),
    ("POST", "/finance/summary", "Income and expense roll-up"),
    ("POST", "/finance/crop-performance", "Crop economics"),
    ("POST", "/validate/registration", "Registration field checks"),
];

pub async fn api_index_axum() -> Json<Value> {
    let endpoints: Vec<Value> = ENDPOINTS
        .iter()
        .map(|(method, path, description)| {
            json!({ "method": method, "path": format!("{}{}", API_PREFIX, path), "description": description })
        })
        .collect();

    Json(json!({
        "name": APP_NAME,
        "version": APP_VERSION,
        "endpoints": endpoints,
    }))
}
