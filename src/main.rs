use axum::{http::HeaderValue, middleware as axum_mw};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod state;

#[cfg(test)]
mod business_logic_tests;
#[cfg(test)]
mod integration_tests;

use config::AppConfig;
use state::AppState;

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting {} v{}...", config::APP_NAME, config::APP_VERSION);
    if config.openweather_api_key.is_none() {
        tracing::warn!("OPENWEATHERMAP_API_KEY not set, weather will be simulated");
    }
    if config.huggingface_api_key.is_none() {
        tracing::warn!("HUGGINGFACE_API_KEY not set, disease detection will be simulated");
    }

    let pool = match db::init_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to configure database pool: {}", e);
            return;
        }
    };
    if let Err(e) = db::init_database(&pool).await {
        tracing::error!("Failed to run migrations: {}", e);
    }

    let addr = config.bind_addr();
    let cors = cors_layer(&config);
    let app_state = AppState::new(pool, config);

    let app = routes::create_router()
        .layer(axum_mw::from_fn(middleware::response::wrap_response_middleware))
        .layer(axum_mw::from_fn(middleware::timing::process_time_middleware))
        .layer(cors)
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
