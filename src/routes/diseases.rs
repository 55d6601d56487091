use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/diseases/catalog",
            get(commands::disease::list_diseases_axum),
        )
        .route(
            "/api/v1/diseases/catalog/:id",
            get(commands::disease::get_disease_axum),
        )
        .route(
            "/api/v1/diseases/analyze",
            post(commands::disease::analyze_disease_axum),
        )
}
