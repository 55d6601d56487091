use crate::db::{self, CropMaster, DbPool};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::{Json, Path, Query, State};
use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row};
use std::collections::HashMap;

const SOIL_WEIGHT: f64 = 0.25;
const CLIMATE_WEIGHT: f64 = 0.20;
const SEASON_WEIGHT: f64 = 0.15;
const MARKET_WEIGHT: f64 = 0.25;
const WATER_WEIGHT: f64 = 0.15;

const MARKET_WINDOW: i64 = 7;
const MAX_RESULTS: usize = 10;
const COST_SHARE: f64 = 0.4;

const TROPICAL_CROPS: &[&str] = &["rice", "sugarcane", "banana", "coconut"];
const SUBTROPICAL_CROPS: &[&str] = &["grapes", "cotton", "groundnut", "tomato"];
const TEMPERATE_CROPS: &[&str] = &["wheat", "potato", "onion", "apple"];

pub const SEASONS: &[&str] = &["kharif", "rabi", "zaid"];

pub fn season_for_month(month: u32) -> &'static str {
    match month {
        6..=9 => "kharif",
        10..=12 | 1 | 2 => "rabi",
        _ => "zaid",
    }
}

pub fn soil_score(farm_soil: Option<&str>, crop: &CropMaster) -> f64 {
    let Some(soil) = farm_soil.map(str::trim).filter(|s| !s.is_empty()) else {
        return 70.0;
    };
    let Some(suitable) = crop.soil_list() else {
        return 70.0;
    };

    let soil = soil.to_lowercase();
    let suitable: Vec<String> = suitable.iter().map(|s| s.to_lowercase()).collect();

    if suitable
        .iter()
        .any(|s| soil.contains(s.as_str()) || s.contains(soil.as_str()))
    {
        return 95.0;
    }
    if suitable
        .iter()
        .any(|s| s.split_whitespace().any(|word| soil.contains(word)))
    {
        return 75.0;
    }
    50.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateZone {
    Tropical,
    Subtropical,
    Temperate,
}

impl ClimateZone {
    pub fn from_latitude(latitude: f64) -> Self {
        let lat = latitude.abs();
        if lat < 15.0 {
            ClimateZone::Tropical
        } else if lat < 25.0 {
            ClimateZone::Subtropical
        } else {
            ClimateZone::Temperate
        }
    }
}

fn name_in(crop_name: &str, list: &[&str]) -> bool {
    list.iter().any(|c| crop_name.contains(c))
}

pub fn climate_score(latitude: f64, crop_name: &str) -> f64 {
    let name = crop_name.to_lowercase();
    match ClimateZone::from_latitude(latitude) {
        ClimateZone::Tropical if name_in(&name, TROPICAL_CROPS) => 95.0,
        ClimateZone::Tropical if name_in(&name, SUBTROPICAL_CROPS) => 80.0,
        ClimateZone::Tropical => 60.0,
        ClimateZone::Subtropical if name_in(&name, SUBTROPICAL_CROPS) => 95.0,
        ClimateZone::Subtropical => 75.0,
        ClimateZone::Temperate if name_in(&name, TEMPERATE_CROPS) => 95.0,
        ClimateZone::Temperate => 70.0,
    }
}

pub fn season_score(crop_season: &str, season: &str) -> f64 {
    let crop_season = crop_season.to_lowercase();
    if crop_season == season || crop_season == "annual" {
        100.0
    } else {
        50.0
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentage move between the three newest and three oldest prices, newest-first input.
pub fn price_trend_percent(prices_newest_first: &[f64]) -> Option<f64> {
    let prices = prices_newest_first;
    if prices.len() < 2 {
        return None;
    }
    let recent = mean(&prices[..prices.len().min(3)]);
    let older = mean(&prices[prices.len().saturating_sub(3)..]);
    if older > 0.0 {
        Some((recent - older) / older * 100.0)
    } else {
        Some(0.0)
    }
}

pub fn market_score(prices_newest_first: &[f64]) -> f64 {
    match price_trend_percent(prices_newest_first) {
        None => 70.0,
        Some(t) if t > 10.0 => 95.0,
        Some(t) if t > 5.0 => 85.0,
        Some(t) if t > 0.0 => 75.0,
        Some(t) if t > -5.0 => 65.0,
        Some(_) => 55.0,
    }
}

pub fn water_score(availability: Option<&str>, requirement_mm: f64) -> f64 {
    let Some(level) = availability.map(|a| a.to_lowercase()).filter(|a| !a.is_empty()) else {
        return 70.0;
    };

    if level.contains("abundant") || level.contains("high") {
        95.0
    } else if level.contains("moderate") || level.contains("medium") {
        if requirement_mm < 800.0 {
            90.0
        } else if requirement_mm < 1200.0 {
            80.0
        } else {
            65.0
        }
    } else if level.contains("low") || level.contains("scarce") {
        if requirement_mm < 500.0 {
            85.0
        } else if requirement_mm < 800.0 {
            70.0
        } else {
            50.0
        }
    } else {
        70.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FactorScores {
    pub soil: f64,
    pub climate: f64,
    pub season: f64,
    pub market: f64,
    pub water: f64,
}

impl FactorScores {
    pub fn overall(&self) -> f64 {
        self.soil * SOIL_WEIGHT
            + self.climate * CLIMATE_WEIGHT
            + self.season * SEASON_WEIGHT
            + self.market * MARKET_WEIGHT
            + self.water * WATER_WEIGHT
    }

    /// 0..=0.6, lower is safer.
    pub fn risk(&self) -> f64 {
        let mut risk = 0.0;
        if self.soil < 70.0 {
            risk += 0.2;
        }
        if self.climate < 70.0 {
            risk += 0.15;
        }
        if self.market < 60.0 {
            risk += 0.1;
        }
        if self.water < 70.0 {
            risk += 0.15;
        }
        risk
    }
}

pub fn risk_level(risk: f64) -> &'static str {
    if risk < 0.2 {
        "low"
    } else if risk < 0.4 {
        "medium"
    } else {
        "high"
    }
}

pub fn recommendation_reasons(crop_season: &str, scores: &FactorScores) -> Vec<String> {
    let mut reasons = Vec::new();

    if scores.soil > 85.0 {
        reasons.push("Excellent soil match for this crop".to_string());
    } else if scores.soil > 70.0 {
        reasons.push("Good soil compatibility".to_string());
    }

    if scores.climate > 85.0 {
        reasons.push("Ideal climate conditions".to_string());
    } else if scores.climate > 70.0 {
        reasons.push("Favorable weather patterns".to_string());
    }

    if scores.market > 85.0 {
        reasons.push("Strong market demand and rising prices".to_string());
    } else if scores.market > 70.0 {
        reasons.push("Stable market prices".to_string());
    }

    let season = crop_season.to_lowercase();
    if season == "kharif" || season == "rabi" {
        reasons.push(format!("Optimal for {} season planting", season));
    }

    reasons.truncate(4);
    reasons
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarmProfile {
    pub latitude: f64,
    pub longitude: f64,
    pub soil_type: Option<String>,
    pub water_availability: Option<String>,
    pub season: Option<String>,
    pub farm_ref: Option<String>,
}

impl FarmProfile {
    pub fn validate(&self) -> AgriResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AgriError::Validation("Farm coordinates are out of range".into()));
        }
        if let Some(season) = &self.season {
            if !SEASONS.contains(&season.to_lowercase().as_str()) {
                return Err(AgriError::Validation(format!(
                    "Season must be one of: {}",
                    SEASONS.join(", ")
                )));
            }
        }
        if let Some(farm_ref) = &self.farm_ref {
            if farm_ref.trim().is_empty() || farm_ref.len() > 100 {
                return Err(AgriError::Validation("farm_ref must be 1-100 characters".into()));
            }
        }
        Ok(())
    }

    pub fn resolved_season(&self, today: NaiveDate) -> String {
        self.season
            .as_ref()
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| season_for_month(today.month()).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropRecommendation {
    pub crop_master_id: i32,
    pub crop_name: String,
    pub local_name: Option<String>,
    pub category: String,
    pub season: String,
    pub suitability_score: f64,
    pub scores: FactorScores,
    pub expected_yield_per_acre: f64,
    pub yield_unit: String,
    pub expected_profit_per_acre: f64,
    pub risk_score: f64,
    pub risk_level: String,
    pub water_requirement_mm: Option<f64>,
    pub water_requirement: String,
    pub price_trend: String,
    pub demand_level: String,
    pub growing_days: String,
    pub reasons: Vec<String>,
    pub recommendation_text: String,
}

pub fn score_crop(
    crop: &CropMaster,
    profile: &FarmProfile,
    season: &str,
    recent_prices: &[f64],
) -> CropRecommendation {
    let requirement = crop.water_requirement_mm.unwrap_or(0.0);
    let scores = FactorScores {
        soil: soil_score(profile.soil_type.as_deref(), crop),
        climate: climate_score(profile.latitude, &crop.name),
        season: season_score(&crop.season, season),
        market: market_score(recent_prices),
        water: water_score(profile.water_availability.as_deref(), requirement),
    };

    let overall = scores.overall();
    let expected_yield = crop.typical_yield_per_acre.unwrap_or(0.0) * overall / 100.0;

    // modal prices are quoted per quintal
    let latest_price = recent_prices.first().cloned().unwrap_or(0.0);
    let revenue = expected_yield * latest_price / 100.0;
    let profit = revenue - revenue * COST_SHARE;

    let risk = scores.risk();
    let price_trend = if scores.market >= 85.0 {
        "rising"
    } else if scores.market <= 60.0 {
        "falling"
    } else {
        "stable"
    };

    CropRecommendation {
        crop_master_id: crop.id,
        crop_name: crop.name.clone(),
        local_name: crop.local_name.clone(),
        category: crop.category.clone(),
        season: crop.season.clone(),
        suitability_score: round_to(overall, 1),
        scores,
        expected_yield_per_acre: round_to(expected_yield, 1),
        yield_unit: crop.yield_unit.clone(),
        expected_profit_per_acre: profit.round(),
        risk_score: round_to(risk, 2),
        risk_level: risk_level(risk).to_string(),
        water_requirement_mm: crop.water_requirement_mm,
        water_requirement: if requirement <= 800.0 { "medium" } else { "high" }.to_string(),
        price_trend: price_trend.to_string(),
        demand_level: if crop.category == "vegetables" || crop.category == "fruits" {
            "high"
        } else {
            "medium"
        }
        .to_string(),
        growing_days: crop.growing_days(),
        reasons: recommendation_reasons(&crop.season, &scores),
        recommendation_text: format!(
            "Recommended for {} cultivation based on farm conditions.",
            crop.name
        ),
    }
}

/// Scores every crop and keeps the best ten; ties keep catalog order.
pub fn rank_crops(
    crops: &[CropMaster],
    profile: &FarmProfile,
    season: &str,
    prices: &HashMap<i32, Vec<f64>>,
) -> Vec<CropRecommendation> {
    let mut ranked: Vec<CropRecommendation> = crops
        .iter()
        .map(|crop| {
            let history = prices.get(&crop.id).map(Vec::as_slice).unwrap_or(&[]);
            score_crop(crop, profile, season, history)
        })
        .collect();

    ranked.sort_by(|a, b| b.suitability_score.total_cmp(&a.suitability_score));
    ranked.truncate(MAX_RESULTS);
    ranked
}

pub fn valid_until(today: NaiveDate) -> NaiveDate {
    today.checked_add_months(Months::new(1)).unwrap_or(today)
}

/// Up to `limit` newest modal prices per crop, newest first.
pub async fn recent_prices_by_crop(pool: &DbPool, limit: i64) -> AgriResult<HashMap<i32, Vec<f64>>> {
    let rows = sqlx::query(
        "SELECT crop_master_id, modal_price FROM (
             SELECT crop_master_id, modal_price,
                    ROW_NUMBER() OVER (PARTITION BY crop_master_id ORDER BY recorded_date DESC, created_at DESC) AS rn
             FROM crop_prices
         ) ranked
         WHERE rn <= $1
         ORDER BY crop_master_id, rn",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut prices: HashMap<i32, Vec<f64>> = HashMap::new();
    for row in rows {
        let crop_id: i32 = row.get("crop_master_id");
        let modal: rust_decimal::Decimal = row.get("modal_price");
        prices.entry(crop_id).or_default().push(db::dec_to_f64(modal));
    }
    Ok(prices)
}

pub async fn save_recommendations(
    pool: &DbPool,
    farm_ref: &str,
    season: &str,
    recommendations: &[CropRecommendation],
    valid_until: NaiveDate,
) -> AgriResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM crop_recommendations WHERE farm_ref = $1")
        .bind(farm_ref)
        .execute(&mut *tx)
        .await?;

    for rec in recommendations {
        let factors = serde_json::json!({
            "scores": rec.scores,
            "reasons": rec.reasons,
            "risk_level": rec.risk_level,
            "growing_days": rec.growing_days,
        });

        sqlx::query(
            "INSERT INTO crop_recommendations (farm_ref, crop_master_id, season, suitability_score, expected_yield_per_acre, expected_profit_per_acre, risk_score, factors, recommendation_text, water_requirement, price_trend, demand_level, valid_until)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(farm_ref)
        .bind(rec.crop_master_id)
        .bind(season)
        .bind(rec.suitability_score)
        .bind(rec.expected_yield_per_acre)
        .bind(rec.expected_profit_per_acre)
        .bind(rec.risk_score)
        .bind(&factors)
        .bind(&rec.recommendation_text)
        .bind(&rec.water_requirement)
        .bind(&rec.price_trend)
        .bind(&rec.demand_level)
        .bind(valid_until)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Serialize, FromRow)]
pub struct StoredRecommendation {
    pub id: uuid::Uuid,
    pub farm_ref: String,
    pub crop_master_id: i32,
    pub crop_name: String,
    pub season: String,
    pub suitability_score: f64,
    pub expected_yield_per_acre: Option<f64>,
    pub expected_profit_per_acre: Option<f64>,
    pub risk_score: f64,
    pub factors: serde_json::Value,
    pub recommendation_text: Option<String>,
    pub water_requirement: Option<String>,
    pub price_trend: Option<String>,
    pub demand_level: Option<String>,
    pub valid_until: NaiveDate,
}

pub async fn load_recommendations(
    pool: &DbPool,
    farm_ref: &str,
    today: NaiveDate,
) -> AgriResult<Vec<StoredRecommendation>> {
    let rows = sqlx::query_as::<_, StoredRecommendation>(
        "SELECT r.id, r.farm_ref, r.crop_master_id, c.name AS crop_name, r.season, r.suitability_score,
                r.expected_yield_per_acre, r.expected_profit_per_acre, r.risk_score, r.factors,
                r.recommendation_text, r.water_requirement, r.price_trend, r.demand_level, r.valid_until
         FROM crop_recommendations r
         JOIN crop_master c ON c.id = r.crop_master_id
         WHERE r.farm_ref = $1 AND r.valid_until >= $2
         ORDER BY r.suitability_score DESC",
    )
    .bind(farm_ref)
    .bind(today)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn recommend_for_profile(pool: &DbPool, profile: &FarmProfile, today: NaiveDate) -> AgriResult<Vec<CropRecommendation>> {
    profile.validate()?;
    let season = profile.resolved_season(today);

    let crops = db::list_crop_master(pool, None, None).await?;
    let prices = recent_prices_by_crop(pool, MARKET_WINDOW).await?;
    let ranked = rank_crops(&crops, profile, &season, &prices);

    if let Some(farm_ref) = profile.farm_ref.as_deref().map(str::trim) {
        save_recommendations(pool, farm_ref, &season, &ranked, valid_until(today)).await?;
        tracing::info!("Stored {} recommendations for farm {}", ranked.len(), farm_ref);
    }

    Ok(ranked)
}

pub async fn create_recommendations_axum(
    State(state): State<AppState>,
    Json(profile): Json<FarmProfile>,
) -> AgriResult<Json<Vec<CropRecommendation>>> {
    let today = Local::now().date_naive();
    let ranked = recommend_for_profile(&state.pool, &profile, today).await?;
    Ok(Json(ranked))
}

pub async fn get_recommendations_axum(
    State(state): State<AppState>,
    Path(farm_ref): Path<String>,
) -> AgriResult<Json<Vec<StoredRecommendation>>> {
    let today = Local::now().date_naive();
    let rows = load_recommendations(&state.pool, &farm_ref, today).await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct CropCatalogQuery {
    pub category: Option<String>,
    pub season: Option<String>,
}

pub async fn list_crop_master_axum(
    State(state): State<AppState>,
    Query(params): Query<CropCatalogQuery>,
) -> AgriResult<Json<Vec<CropMaster>>> {
    let crops = db::list_crop_master(
        &state.pool,
        params.category.as_deref(),
        params.season.as_deref(),
    )
    .await?;
    Ok(Json(crops))
}

pub async fn get_crop_master_axum(
    State(state): State<AppState>,
    Path(crop_id): Path<i32>,
) -> AgriResult<Json<CropMaster>> {
    let crop = db::require_crop_master(&state.pool, crop_id).await?;
    Ok(Json(crop))
}
