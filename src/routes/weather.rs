use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/weather/current",
            get(commands::weather::get_current_weather_axum),
        )
        .route(
            "/api/v1/weather/forecast",
            get(commands::weather::get_forecast_axum),
        )
        .route(
            "/api/v1/weather/advisories",
            get(commands::weather::get_advisories_axum),
        )
        .route(
            "/api/v1/alerts/weather",
            post(commands::alerts::weather_alerts_axum),
        )
}
