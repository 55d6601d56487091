use crate::commands::weather::WeatherCache;
use crate::config::AppConfig;
use crate::db::DbPool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub weather_cache: Arc<Mutex<WeatherCache>>,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let ttl = std::time::Duration::from_secs(config.weather_cache_ttl_secs);
        Self {
            pool,
            config: Arc::new(config),
            http: reqwest::Client::new(),
            weather_cache: Arc::new(Mutex::new(WeatherCache::new(ttl))),
        }
    }
}

impl axum::extract::FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
