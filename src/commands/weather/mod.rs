pub mod advisory;
pub mod provider;

pub use advisory::{generate_advisories, FarmingAdvisory};

use crate::commands::alerts::{weather_alerts, AlertDraft, WeatherConditions};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const FORECAST_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub visibility_km: f64,
    pub uv_index: Option<f64>,
    pub rain_mm: f64,
    pub description: String,
    pub icon: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub rain_chance: f64,
    pub rain_mm: f64,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    pub uv_index: Option<f64>,
}

type CoordKey = (i64, i64);

fn coord_key(latitude: f64, longitude: f64) -> CoordKey {
    ((latitude * 10_000.0).round() as i64, (longitude * 10_000.0).round() as i64)
}

/// In-memory TTL cache keyed by coordinates rounded to four decimals.
pub struct WeatherCache {
    current_ttl: Duration,
    current: HashMap<CoordKey, (Instant, CurrentWeather)>,
    forecast: HashMap<(CoordKey, u32), (Instant, Vec<ForecastDay>)>,
}

impl WeatherCache {
    pub fn new(current_ttl: Duration) -> Self {
        Self {
            current_ttl,
            current: HashMap::new(),
            forecast: HashMap::new(),
        }
    }

    pub fn get_current(&self, latitude: f64, longitude: f64, now: Instant) -> Option<CurrentWeather> {
        self.current
            .get(&coord_key(latitude, longitude))
            .filter(|(stored, _)| now.duration_since(*stored) < self.current_ttl)
            .map(|(_, w)| w.clone())
    }

    pub fn put_current(&mut self, weather: CurrentWeather, now: Instant) {
        let ttl = self.current_ttl;
        self.current.retain(|_, (stored, _)| now.duration_since(*stored) < ttl);
        self.current
            .insert(coord_key(weather.latitude, weather.longitude), (now, weather));
    }

    pub fn get_forecast(&self, latitude: f64, longitude: f64, days: u32, now: Instant) -> Option<Vec<ForecastDay>> {
        self.forecast
            .get(&(coord_key(latitude, longitude), days))
            .filter(|(stored, _)| now.duration_since(*stored) < FORECAST_CACHE_TTL)
            .map(|(_, f)| f.clone())
    }

    pub fn put_forecast(&mut self, latitude: f64, longitude: f64, days: u32, forecast: Vec<ForecastDay>, now: Instant) {
        self.forecast
            .retain(|_, (stored, _)| now.duration_since(*stored) < FORECAST_CACHE_TTL);
        self.forecast
            .insert((coord_key(latitude, longitude), days), (now, forecast));
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.forecast.len()
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub days: Option<u32>,
}

impl LocationQuery {
    pub fn validate(&self) -> AgriResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AgriError::Validation("latitude must be between -90 and 90".into()));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AgriError::Validation("longitude must be between -180 and 180".into()));
        }
        if let Some(days) = self.days {
            if !(1..=14).contains(&days) {
                return Err(AgriError::Validation("days must be between 1 and 14".into()));
            }
        }
        Ok(())
    }
}

pub async fn current_weather(state: &AppState, latitude: f64, longitude: f64) -> AgriResult<CurrentWeather> {
    {
        let cache = state
            .weather_cache
            .lock()
            .map_err(|_| AgriError::Internal("weather cache lock poisoned".into()))?;
        if let Some(hit) = cache.get_current(latitude, longitude, Instant::now()) {
            return Ok(hit);
        }
    }

    let weather = match state.config.openweather_api_key.as_deref() {
        Some(key) => match provider::fetch_current(&state.http, key, latitude, longitude).await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!("Current weather lookup failed, simulating: {}", e);
                provider::simulate_current(latitude, longitude, &mut rand::rng())
            }
        },
        None => provider::simulate_current(latitude, longitude, &mut rand::rng()),
    };

    if let Ok(mut cache) = state.weather_cache.lock() {
        cache.put_current(weather.clone(), Instant::now());
    }
    Ok(weather)
}

pub async fn weather_forecast(
    state: &AppState,
    latitude: f64,
    longitude: f64,
    days: u32,
) -> AgriResult<Vec<ForecastDay>> {
    {
        let cache = state
            .weather_cache
            .lock()
            .map_err(|_| AgriError::Internal("weather cache lock poisoned".into()))?;
        if let Some(hit) = cache.get_forecast(latitude, longitude, days, Instant::now()) {
            return Ok(hit);
        }
    }

    let today = Local::now().date_naive();
    let forecast = match state.config.openweather_api_key.as_deref() {
        Some(key) => match provider::fetch_forecast(&state.http, key, latitude, longitude, days).await {
            Ok(f) if !f.is_empty() => f,
            Ok(_) => provider::simulate_forecast(latitude, today, days, &mut rand::rng()),
            Err(e) => {
                tracing::warn!("Forecast lookup failed, simulating: {}", e);
                provider::simulate_forecast(latitude, today, days, &mut rand::rng())
            }
        },
        None => provider::simulate_forecast(latitude, today, days, &mut rand::rng()),
    };

    if let Ok(mut cache) = state.weather_cache.lock() {
        cache.put_forecast(latitude, longitude, days, forecast.clone(), Instant::now());
    }
    Ok(forecast)
}

/// Peak conditions over the current reading and the next three forecast days.
pub fn alert_conditions(current: &CurrentWeather, forecast: &[ForecastDay]) -> WeatherConditions {
    let upcoming = &forecast[..forecast.len().min(3)];
    WeatherConditions {
        temperature: upcoming
            .iter()
            .map(|d| d.temp_max)
            .fold(current.temperature, f64::max),
        rain_chance: upcoming.iter().map(|d| d.rain_chance).fold(0.0, f64::max),
        wind_speed: upcoming
            .iter()
            .map(|d| d.wind_speed)
            .fold(current.wind_speed, f64::max),
    }
}

#[derive(Serialize)]
pub struct FarmWeatherReport {
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub advisories: Vec<FarmingAdvisory>,
    pub alerts: Vec<AlertDraft>,
}

pub async fn get_current_weather_axum(
    State(state): State<AppState>,
    Query(params): Query<LocationQuery>,
) -> AgriResult<Json<CurrentWeather>> {
    params.validate()?;
    let weather = current_weather(&state, params.latitude, params.longitude).await?;
    Ok(Json(weather))
}

pub async fn get_forecast_axum(
    State(state): State<AppState>,
    Query(params): Query<LocationQuery>,
) -> AgriResult<Json<Vec<ForecastDay>>> {
    params.validate()?;
    let days = params.days.unwrap_or(7);
    let forecast = weather_forecast(&state, params.latitude, params.longitude, days).await?;
    Ok(Json(forecast))
}

pub async fn get_advisories_axum(
    State(state): State<AppState>,
    Query(params): Query<LocationQuery>,
) -> AgriResult<Json<FarmWeatherReport>> {
    params.validate()?;
    let current = current_weather(&state, params.latitude, params.longitude).await?;
    let forecast = weather_forecast(&state, params.latitude, params.longitude, params.days.unwrap_or(7)).await?;

    let advisories = generate_advisories(&current, &forecast);
    let alerts = weather_alerts(&alert_conditions(&current, &forecast));

    Ok(Json(FarmWeatherReport {
        current,
        forecast,
        advisories,
        alerts,
    }))
}
