use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/prices", post(commands::price::ingest_price_axum))
        .route(
            "/api/v1/prices/markets",
            get(commands::price::list_markets_axum),
        )
        .route(
            "/api/v1/prices/current",
            get(commands::price::get_current_prices_axum),
        )
        .route(
            "/api/v1/prices/history",
            get(commands::price::get_price_history_axum),
        )
        .route(
            "/api/v1/prices/prediction",
            get(commands::price::predict::get_price_prediction_axum),
        )
        .route(
            "/api/v1/prices/comparison",
            get(commands::price::compare_prices_axum),
        )
        // Watches
        .route(
            "/api/v1/prices/alerts/evaluate",
            post(commands::alerts::evaluate_price_watch_axum),
        )
}
