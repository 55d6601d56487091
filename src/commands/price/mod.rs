pub mod predict;

use crate::commands::alerts::{percent_change, price_move_alert, AlertDraft};
use crate::db::{self, DbPool, Market};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const EARTH_RADIUS_KM: f64 = 6371.0;
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceObservation {
    pub id: Uuid,
    pub crop_master_id: i32,
    pub crop_name: String,
    pub market_id: Uuid,
    pub market_name: String,
    pub district: Option<String>,
    pub state: Option<String>,
    pub recorded_date: NaiveDate,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub modal_price: f64,
    pub arrival_quantity: Option<f64>,
    pub grade: String,
    pub variety: Option<String>,
    pub source: Option<String>,
    #[sqlx(default)]
    pub latitude: Option<f64>,
    #[sqlx(default)]
    pub longitude: Option<f64>,
}

const OBSERVATION_SELECT: &str = "SELECT p.id, p.crop_master_id, c.name AS crop_name, p.market_id, m.name AS market_name,
        m.district, m.state, p.recorded_date,
        p.min_price::float8 AS min_price, p.max_price::float8 AS max_price, p.modal_price::float8 AS modal_price,
        p.arrival_quantity, p.grade, p.variety, p.source, m.latitude, m.longitude
 FROM crop_prices p
 JOIN crop_master c ON c.id = p.crop_master_id
 JOIN markets m ON m.id = p.market_id";

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketQuote {
    pub market_id: Uuid,
    pub market_name: String,
    pub district: Option<String>,
    pub state: Option<String>,
    pub modal_price: f64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub recorded_date: NaiveDate,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MarketComparison {
    pub crop_id: i32,
    pub crop_name: String,
    pub markets: Vec<MarketQuote>,
    pub best_market: Option<MarketQuote>,
    pub worst_market: Option<MarketQuote>,
    pub price_difference: f64,
    pub recommendation: Option<String>,
}

pub fn compare_markets(
    crop_id: i32,
    crop_name: &str,
    observations: &[PriceObservation],
    origin: Option<(f64, f64)>,
) -> MarketComparison {
    let mut markets: Vec<MarketQuote> = observations
        .iter()
        .map(|o| {
            let distance_km = match (origin, o.latitude, o.longitude) {
                (Some((lat, lon)), Some(mlat), Some(mlon)) => {
                    Some((haversine_km(lat, lon, mlat, mlon) * 10.0).round() / 10.0)
                }
                _ => None,
            };
            MarketQuote {
                market_id: o.market_id,
                market_name: o.market_name.clone(),
                district: o.district.clone(),
                state: o.state.clone(),
                modal_price: o.modal_price,
                min_price: o.min_price,
                max_price: o.max_price,
                recorded_date: o.recorded_date,
                distance_km,
            }
        })
        .collect();
    markets.sort_by(|a, b| b.modal_price.total_cmp(&a.modal_price));

    let best = markets.first().cloned();
    let worst = markets.last().cloned();
    let price_difference = match (&best, &worst) {
        (Some(b), Some(w)) => ((b.modal_price - w.modal_price) * 100.0).round() / 100.0,
        _ => 0.0,
    };

    MarketComparison {
        crop_id,
        crop_name: crop_name.to_string(),
        recommendation: best.as_ref().map(|b| format!("Best price at {}", b.market_name)),
        markets,
        best_market: best,
        worst_market: worst,
        price_difference,
    }
}

#[derive(Debug, Serialize)]
pub struct MarketPrice {
    pub market_name: String,
    pub modal_price: f64,
    pub arrival_quantity: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub modal_price: f64,
    pub markets: Vec<MarketPrice>,
}

/// Expects observations ordered by date; the first row of each date supplies the day's figures.
pub fn group_history(observations: &[PriceObservation]) -> Vec<HistoryDay> {
    let mut days: Vec<HistoryDay> = Vec::new();
    for o in observations {
        let market = MarketPrice {
            market_name: o.market_name.clone(),
            modal_price: o.modal_price,
            arrival_quantity: o.arrival_quantity,
        };
        match days.last_mut() {
            Some(day) if day.date == o.recorded_date => day.markets.push(market),
            _ => days.push(HistoryDay {
                date: o.recorded_date,
                min_price: o.min_price,
                max_price: o.max_price,
                modal_price: o.modal_price,
                markets: vec![market],
            }),
        }
    }
    days
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPriceObservation {
    pub crop_master_id: i32,
    pub market_id: Uuid,
    pub recorded_date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub modal_price: f64,
    pub arrival_quantity: Option<f64>,
    pub grade: Option<String>,
    pub variety: Option<String>,
    pub source: Option<String>,
}

impl NewPriceObservation {
    pub fn validate(&self) -> AgriResult<()> {
        let prices = [Some(self.modal_price), self.min_price, self.max_price];
        if prices.iter().flatten().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AgriError::Validation("Prices must be non-negative numbers".into()));
        }
        if let Some(min) = self.min_price {
            if min > self.modal_price {
                return Err(AgriError::Validation("min_price cannot exceed modal_price".into()));
            }
        }
        if let Some(max) = self.max_price {
            if max < self.modal_price {
                return Err(AgriError::Validation("max_price cannot be below modal_price".into()));
            }
        }
        if self.arrival_quantity.map_or(false, |q| q < 0.0) {
            return Err(AgriError::Validation("arrival_quantity must be non-negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub observation: PriceObservation,
    pub previous_modal_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub alert: Option<AlertDraft>,
}

pub async fn ingest_price(pool: &DbPool, input: NewPriceObservation, today: NaiveDate) -> AgriResult<IngestResult> {
    input.validate()?;
    let crop = db::require_crop_master(pool, input.crop_master_id).await?;

    let market_exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM markets WHERE id = $1)")
        .bind(input.market_id)
        .fetch_one(pool)
        .await?;
    if !market_exists.0 {
        return Err(AgriError::NotFound(format!("Market {}", input.market_id)));
    }

    let recorded_date = input.recorded_date.unwrap_or(today);
    let grade = input.grade.clone().unwrap_or_else(|| "FAQ".to_string());

    let mut tx = pool.begin().await?;

    // Same-grade rows win ties on the previous date, then grade order.
    let previous: Option<(f64,)> = sqlx::query_as(
        "SELECT modal_price::float8 FROM crop_prices
         WHERE crop_master_id = $1 AND market_id = $2 AND recorded_date < $3
         ORDER BY recorded_date DESC, (grade = $4) DESC, grade ASC LIMIT 1",
    )
    .bind(crop.id)
    .bind(input.market_id)
    .bind(recorded_date)
    .bind(&grade)
    .fetch_optional(&mut *tx)
    .await?;

    let min_price = input.min_price.map(db::f64_to_dec).transpose()?;
    let max_price = input.max_price.map(db::f64_to_dec).transpose()?;

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO crop_prices (crop_master_id, market_id, recorded_date, min_price, max_price, modal_price, arrival_quantity, grade, variety, source)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (crop_master_id, market_id, recorded_date, grade) DO UPDATE SET
            min_price = EXCLUDED.min_price,
            max_price = EXCLUDED.max_price,
            modal_price = EXCLUDED.modal_price,
            arrival_quantity = EXCLUDED.arrival_quantity,
            variety = EXCLUDED.variety,
            source = EXCLUDED.source
         RETURNING id",
    )
    .bind(crop.id)
    .bind(input.market_id)
    .bind(recorded_date)
    .bind(min_price)
    .bind(max_price)
    .bind(db::f64_to_dec(input.modal_price)?)
    .bind(input.arrival_quantity)
    .bind(&grade)
    .bind(&input.variety)
    .bind(&input.source)
    .fetch_one(&mut *tx)
    .await?;

    let observation = sqlx::query_as::<_, PriceObservation>(&format!("{} WHERE p.id = $1", OBSERVATION_SELECT))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    let previous_modal_price = previous.map(|p| p.0);
    let change = previous_modal_price.and_then(|prev| percent_change(prev, observation.modal_price));
    let alert = change.and_then(|c| {
        price_move_alert(&observation.crop_name, &observation.market_name, observation.modal_price, c)
    });

    if let Some(a) = &alert {
        tracing::info!("{}", a.message);
    }

    Ok(IngestResult {
        observation,
        previous_modal_price,
        change_percent: change.map(|c| (c * 100.0).round() / 100.0),
        alert,
    })
}

#[derive(Deserialize)]
pub struct MarketQuery {
    pub state: Option<String>,
    pub district: Option<String>,
}

pub async fn list_markets_axum(
    State(state): State<AppState>,
    Query(params): Query<MarketQuery>,
) -> AgriResult<Json<Vec<Market>>> {
    let markets = sqlx::query_as::<_, Market>(
        "SELECT id, name, market_type, city, district, state, latitude, longitude, is_active
         FROM markets
         WHERE is_active = TRUE
           AND ($1::text IS NULL OR LOWER(state) = LOWER($1))
           AND ($2::text IS NULL OR LOWER(district) = LOWER($2))
         ORDER BY name",
    )
    .bind(params.state)
    .bind(params.district)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(markets))
}

#[derive(Deserialize)]
pub struct CurrentPriceQuery {
    pub crop_id: Option<i32>,
    pub market_id: Option<Uuid>,
    pub state: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_current_prices_axum(
    State(state): State<AppState>,
    Query(params): Query<CurrentPriceQuery>,
) -> AgriResult<Json<Vec<PriceObservation>>> {
    let limit = params.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AgriError::Validation("limit must be between 1 and 200".into()));
    }
    let since = Local::now().date_naive() - Duration::days(RECENT_DAYS);

    let sql = format!(
        "{} WHERE p.recorded_date >= $1
           AND ($2::int IS NULL OR p.crop_master_id = $2)
           AND ($3::uuid IS NULL OR p.market_id = $3)
           AND ($4::text IS NULL OR LOWER(m.state) = LOWER($4))
         ORDER BY p.recorded_date DESC, c.name
         LIMIT $5",
        OBSERVATION_SELECT
    );
    let prices = sqlx::query_as::<_, PriceObservation>(&sql)
        .bind(since)
        .bind(params.crop_id)
        .bind(params.market_id)
        .bind(params.state)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(prices))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub crop_id: i32,
    pub market_id: Option<Uuid>,
    pub days: Option<i64>,
}

#[derive(Serialize)]
pub struct PriceHistory {
    pub crop_id: i32,
    pub crop_name: String,
    pub days: i64,
    pub history: Vec<HistoryDay>,
}

pub async fn get_price_history_axum(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> AgriResult<Json<PriceHistory>> {
    let days = params.days.unwrap_or(30);
    if !(7..=365).contains(&days) {
        return Err(AgriError::Validation("days must be between 7 and 365".into()));
    }
    let crop = db::require_crop_master(&state.pool, params.crop_id).await?;
    let since = Local::now().date_naive() - Duration::days(days);

    let sql = format!(
        "{} WHERE p.crop_master_id = $1 AND p.recorded_date >= $2
           AND ($3::uuid IS NULL OR p.market_id = $3)
         ORDER BY p.recorded_date, m.name",
        OBSERVATION_SELECT
    );
    let rows = sqlx::query_as::<_, PriceObservation>(&sql)
        .bind(crop.id)
        .bind(since)
        .bind(params.market_id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(PriceHistory {
        crop_id: crop.id,
        crop_name: crop.name,
        days,
        history: group_history(&rows),
    }))
}

#[derive(Deserialize)]
pub struct ComparisonQuery {
    pub crop_id: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub async fn compare_prices_axum(
    State(state): State<AppState>,
    Query(params): Query<ComparisonQuery>,
) -> AgriResult<Json<MarketComparison>> {
    let crop = db::require_crop_master(&state.pool, params.crop_id).await?;
    let since = Local::now().date_naive() - Duration::days(RECENT_DAYS);

    // latest observation per market inside the window
    let sql = format!(
        "{} WHERE p.crop_master_id = $1 AND p.recorded_date >= $2
         ORDER BY p.market_id, p.recorded_date DESC, p.created_at DESC",
        OBSERVATION_SELECT.replacen("SELECT ", "SELECT DISTINCT ON (p.market_id) ", 1)
    );
    let rows = sqlx::query_as::<_, PriceObservation>(&sql)
        .bind(crop.id)
        .bind(since)
        .fetch_all(&state.pool)
        .await?;

    let origin = params.latitude.zip(params.longitude);
    Ok(Json(compare_markets(crop.id, &crop.name, &rows, origin)))
}

pub async fn ingest_price_axum(
    State(state): State<AppState>,
    Json(payload): Json<NewPriceObservation>,
) -> AgriResult<Json<IngestResult>> {
    let result = ingest_price(&state.pool, payload, Local::now().date_naive()).await?;
    Ok(Json(result))
}
