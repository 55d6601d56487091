use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/twin/projection",
            post(commands::twin::twin_projection_axum),
        )
        .route(
            "/api/v1/sustainability/summary",
            post(commands::sustainability::sustainability_summary_axum),
        )
        // Finance
        .route(
            "/api/v1/finance/summary",
            post(commands::finance::finance_summary_axum),
        )
        .route(
            "/api/v1/finance/crop-performance",
            post(commands::finance::crop_performance_axum),
        )
        .route(
            "/api/v1/validate/registration",
            post(commands::validation::validate_registration_axum),
        )
}
