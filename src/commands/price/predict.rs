use crate::db::{self, CropMaster, DbPool};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

const HISTORY_LIMIT: i64 = 90;
const MIN_TREND_POINTS: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Regression trend over observed prices
    Trend,
    /// Category or historic baseline with crop-season adjustment
    SeasonalBaseline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    pub predicted_min: f64,
    pub predicted_max: f64,
    pub predicted_modal: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceForecast {
    pub crop_id: i32,
    pub crop_name: String,
    pub method: ForecastMethod,
    pub observations: usize,
    pub prediction_date: NaiveDate,
    pub current_price: f64,
    pub average_price: f64,
    pub price_volatility: f64,
    pub trend: Trend,
    pub trend_strength: f64,
    pub predictions: Vec<DailyPrediction>,
    pub best_sell_date: NaiveDate,
    pub best_sell_price: f64,
    pub best_sell_window_start: NaiveDate,
    pub best_sell_window_end: NaiveDate,
    pub recommendation: String,
}

pub fn monthly_seasonal_factor(month: u32) -> f64 {
    match month {
        1 => 1.05,
        2 => 1.02,
        3 => 0.98,
        4 => 0.95,
        5 => 0.92,
        6 => 0.95,
        7 => 0.98,
        8 => 1.0,
        9 => 1.02,
        10 => 1.05,
        11 => 1.08,
        12 => 1.05,
        _ => 1.0,
    }
}

/// Post-harvest demand cycle for the crop's own season.
pub fn crop_season_factor(season: &str, month: u32) -> f64 {
    match (season.to_lowercase().as_str(), month) {
        ("kharif", 10) | ("kharif", 12) => 1.1,
        ("kharif", 11) => 1.15,
        ("kharif", 1) => 1.0,
        ("kharif", 2) => 0.95,
        ("rabi", 4) | ("rabi", 6) => 1.1,
        ("rabi", 5) => 1.15,
        ("rabi", 7) => 1.0,
        ("rabi", 8) => 0.95,
        _ => 1.0,
    }
}

pub fn category_base_price(category: &str) -> f64 {
    match category {
        "cereals" => 2500.0,
        "pulses" => 6000.0,
        "vegetables" => 3000.0,
        "fruits" => 4500.0,
        "cash_crops" => 5500.0,
        "oilseeds" => 5000.0,
        "spices" => 12000.0,
        _ => 3000.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero below two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Least-squares slope of price per observation, oldest observation at x = 0.
pub fn regression_slope(chronological: &[f64]) -> f64 {
    let n = chronological.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(chronological);

    let (num, den) = chronological
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

pub fn classify_slope(slope: f64) -> (Trend, f64) {
    if slope > 0.5 {
        (Trend::Rising, 1.02)
    } else if slope < -0.5 {
        (Trend::Falling, 0.98)
    } else {
        (Trend::Stable, 1.0)
    }
}

pub fn sell_recommendation(current_price: f64, best_price: f64) -> &'static str {
    let diff = if current_price > 0.0 {
        (best_price - current_price) / current_price * 100.0
    } else {
        0.0
    };

    if diff > 10.0 {
        "Hold and wait for better prices. Significant price increase expected."
    } else if diff > 5.0 {
        "Consider holding. Moderate price increase likely."
    } else if diff < -10.0 {
        "Consider selling soon. Prices expected to decline."
    } else if diff < -5.0 {
        "Market timing is moderate. Slight price decrease possible."
    } else {
        "Prices are stable. Sell based on your cash flow needs."
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn best_day(predictions: &[DailyPrediction]) -> Option<&DailyPrediction> {
    // earliest day wins ties
    predictions.iter().fold(None, |best: Option<&DailyPrediction>, p| match best {
        Some(b) if b.predicted_modal >= p.predicted_modal => Some(b),
        _ => Some(p),
    })
}

/// Builds a forecast from newest-first modal prices; falls back to a seasonal baseline below seven points.
pub fn forecast_prices(
    crop: &CropMaster,
    history_newest_first: &[f64],
    today: NaiveDate,
    days_ahead: u32,
) -> PriceForecast {
    let history: Vec<f64> = history_newest_first
        .iter()
        .cloned()
        .filter(|p| *p > 0.0)
        .collect();
    let average = mean(&history);
    let volatility = sample_std_dev(&history);

    let (method, current, trend, strength, predictions) = if history.len() >= MIN_TREND_POINTS {
        let chronological: Vec<f64> = history.iter().rev().cloned().collect();
        let slope = regression_slope(&chronological);
        let (trend, weekly_factor) = classify_slope(slope);
        let seasonal = monthly_seasonal_factor(today.month());
        let current = history[0];

        let predictions = (1..=days_ahead)
            .map(|day| {
                let modal = (current * weekly_factor.powf(day as f64 / 7.0) * seasonal).max(0.0);
                DailyPrediction {
                    date: today + Duration::days(day as i64),
                    predicted_min: round2(modal * 0.95),
                    predicted_max: round2(modal * 1.05),
                    predicted_modal: round2(modal),
                    confidence: (95.0 - day as f64 * 0.5).max(60.0),
                }
            })
            .collect::<Vec<_>>();

        (ForecastMethod::Trend, current, trend, slope.abs(), predictions)
    } else {
        let baseline = if history.is_empty() {
            category_base_price(&crop.category)
        } else {
            average
        };
        let factor = crop_season_factor(&crop.season, today.month());
        let trend = if factor > 1.05 {
            Trend::Rising
        } else if factor < 0.97 {
            Trend::Falling
        } else {
            Trend::Stable
        };
        let modal = baseline * factor;

        let predictions = (1..=days_ahead)
            .map(|day| DailyPrediction {
                date: today + Duration::days(day as i64),
                predicted_min: round2(modal * 0.85),
                predicted_max: round2(modal * 1.15),
                predicted_modal: round2(modal),
                confidence: (80.0 - day as f64 * 0.5).max(45.0),
            })
            .collect::<Vec<_>>();

        (ForecastMethod::SeasonalBaseline, baseline, trend, 0.0, predictions)
    };

    let (best_date, best_price) = best_day(&predictions)
        .map(|p| (p.date, p.predicted_modal))
        .unwrap_or((today, current));

    PriceForecast {
        crop_id: crop.id,
        crop_name: crop.name.clone(),
        method,
        observations: history.len(),
        prediction_date: today,
        current_price: round2(current),
        average_price: round2(average),
        price_volatility: round2(volatility),
        trend,
        trend_strength: round2(strength),
        best_sell_date: best_date,
        best_sell_price: best_price,
        best_sell_window_start: best_date - Duration::days(7),
        best_sell_window_end: best_date + Duration::days(14),
        recommendation: sell_recommendation(current, best_price).to_string(),
        predictions,
    }
}

pub async fn modal_history(
    pool: &DbPool,
    crop_id: i32,
    market_id: Option<Uuid>,
) -> AgriResult<Vec<f64>> {
    let rows = sqlx::query(
        "SELECT modal_price FROM crop_prices
         WHERE crop_master_id = $1 AND ($2::uuid IS NULL OR market_id = $2)
         ORDER BY recorded_date DESC, created_at DESC
         LIMIT $3",
    )
    .bind(crop_id)
    .bind(market_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| db::dec_to_f64(r.get("modal_price")))
        .collect())
}

pub async fn save_prediction(pool: &DbPool, forecast: &PriceForecast) -> AgriResult<()> {
    let Some(target) = forecast.predictions.last() else {
        return Ok(());
    };

    sqlx::query(
        "INSERT INTO price_predictions (crop_master_id, prediction_date, target_date, predicted_min, predicted_max, predicted_modal, confidence_score, trend, recommendation)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(forecast.crop_id)
    .bind(forecast.prediction_date)
    .bind(target.date)
    .bind(target.predicted_min)
    .bind(target.predicted_max)
    .bind(target.predicted_modal)
    .bind(target.confidence)
    .bind(forecast.trend.as_str())
    .bind(&forecast.recommendation)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    pub crop_id: i32,
    pub market_id: Option<Uuid>,
    pub days_ahead: Option<u32>,
}

pub async fn get_price_prediction_axum(
    State(state): State<AppState>,
    Query(params): Query<PredictionQuery>,
) -> AgriResult<Json<PriceForecast>> {
    let days_ahead = params.days_ahead.unwrap_or(30);
    if !(7..=90).contains(&days_ahead) {
        return Err(AgriError::Validation("days_ahead must be between 7 and 90".into()));
    }

    let crop = db::require_crop_master(&state.pool, params.crop_id).await?;
    let history = modal_history(&state.pool, crop.id, params.market_id).await?;
    let forecast = forecast_prices(&crop, &history, Local::now().date_naive(), days_ahead);

    if let Err(e) = save_prediction(&state.pool, &forecast).await {
        tracing::warn!("Failed to store prediction for crop {}: {}", crop.id, e);
    }

    Ok(Json(forecast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::recommend::tests::crop;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_statistics_helpers() {
        assert_eq!(sample_std_dev(&[5.0]), 0.0);
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.138089935).abs() < 1e-6);

        assert_eq!(regression_slope(&[1.0, 2.0, 3.0, 4.0]), 1.0);
        assert_eq!(regression_slope(&[10.0, 10.0, 10.0]), 0.0);
        assert_eq!(regression_slope(&[3.0]), 0.0);
    }

    #[test]
    fn test_classify_slope() {
        assert_eq!(classify_slope(0.6).0, Trend::Rising);
        assert_eq!(classify_slope(-0.6).0, Trend::Falling);
        assert_eq!(classify_slope(0.5), (Trend::Stable, 1.0));
    }

    #[test]
    fn test_rising_history_forecast() {
        let onion = crop(9, "Onion", "vegetables", "rabi", 400.0, &["loamy"], 12000.0);
        // newest first: prices climbed by 10 per day
        let history: Vec<f64> = (0..10).map(|i| 2090.0 - i as f64 * 10.0).collect();
        let today = date(2024, 8, 1);
        let f = forecast_prices(&onion, &history, today, 14);

        assert_eq!(f.method, ForecastMethod::Trend);
        assert_eq!(f.trend, Trend::Rising);
        assert_eq!(f.trend_strength, 10.0);
        assert_eq!(f.current_price, 2090.0);
        assert_eq!(f.predictions.len(), 14);
        assert_eq!(f.predictions[0].date, date(2024, 8, 2));

        // August seasonal factor is 1.0, day 7 applies one full weekly step
        assert_eq!(f.predictions[6].predicted_modal, round2(2090.0 * 1.02));
        assert_eq!(f.predictions[6].confidence, 91.5);

        // rising series peaks on the last day
        assert_eq!(f.best_sell_date, date(2024, 8, 15));
        assert_eq!(f.best_sell_window_start, date(2024, 8, 8));
        assert_eq!(f.best_sell_window_end, date(2024, 8, 29));
        assert_eq!(f.recommendation, "Prices are stable. Sell based on your cash flow needs.");
    }

    #[test]
    fn test_confidence_floor() {
        let rice = crop(1, "Rice", "cereals", "kharif", 1200.0, &["clay"], 2000.0);
        let history = vec![2000.0; 8];
        let f = forecast_prices(&rice, &history, date(2024, 8, 1), 90);
        assert_eq!(f.trend, Trend::Stable);
        assert_eq!(f.predictions[69].confidence, 60.0);
        assert_eq!(f.predictions[89].confidence, 60.0);
        // flat prices: earliest day is the best
        assert_eq!(f.best_sell_date, date(2024, 8, 2));
    }

    #[test]
    fn test_baseline_forecast_without_history() {
        let turmeric = crop(15, "Turmeric", "spices", "kharif", 1500.0, &["loamy"], 2500.0);
        let f = forecast_prices(&turmeric, &[], date(2024, 11, 5), 30);
        assert_eq!(f.method, ForecastMethod::SeasonalBaseline);
        assert_eq!(f.current_price, 12000.0);
        assert_eq!(f.trend, Trend::Rising);
        assert_eq!(f.predictions[0].predicted_modal, 13800.0);
        assert_eq!(f.predictions[0].predicted_min, 11730.0);
        assert_eq!(f.predictions[0].predicted_max, 15870.0);
        assert_eq!(
            f.recommendation,
            "Hold and wait for better prices. Significant price increase expected."
        );
    }

    #[test]
    fn test_baseline_uses_sparse_history_average() {
        let wheat = crop(2, "Wheat", "cereals", "rabi", 450.0, &["loamy"], 1800.0);
        let f = forecast_prices(&wheat, &[2200.0, 2000.0, 0.0], date(2024, 8, 10), 7);
        assert_eq!(f.observations, 2);
        assert_eq!(f.current_price, 2100.0);
        assert_eq!(f.trend, Trend::Falling);
        assert_eq!(f.predictions[0].predicted_modal, 1995.0);
        assert_eq!(f.best_sell_price, 1995.0);
        assert_eq!(f.best_sell_date, date(2024, 8, 11));
    }

    #[test]
    fn test_sell_recommendation_bands() {
        assert!(sell_recommendation(100.0, 111.0).starts_with("Hold"));
        assert!(sell_recommendation(100.0, 106.0).starts_with("Consider holding"));
        assert!(sell_recommendation(100.0, 89.0).starts_with("Consider selling"));
        assert!(sell_recommendation(100.0, 94.0).starts_with("Market timing"));
        assert!(sell_recommendation(100.0, 100.0).starts_with("Prices are stable"));
        assert!(sell_recommendation(0.0, 100.0).starts_with("Prices are stable"));
    }

    #[test]
    fn test_season_factor_tables() {
        assert_eq!(crop_season_factor("kharif", 11), 1.15);
        assert_eq!(crop_season_factor("Rabi", 5), 1.15);
        assert_eq!(crop_season_factor("perennial", 5), 1.0);
        assert_eq!(monthly_seasonal_factor(5), 0.92);
        assert_eq!(category_base_price("unknown"), 3000.0);
    }
}
