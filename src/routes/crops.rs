use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/crops/master",
            get(commands::recommend::list_crop_master_axum),
        )
        .route(
            "/api/v1/crops/master/:id",
            get(commands::recommend::get_crop_master_axum),
        )
        .route(
            "/api/v1/crops/recommendations",
            post(commands::recommend::create_recommendations_axum),
        )
        .route(
            "/api/v1/crops/recommendations/:farm_ref",
            get(commands::recommend::get_recommendations_axum),
        )
}
