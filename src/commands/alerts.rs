use crate::error::{AgriError, AgriResult};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Weather,
    Disease,
    Price,
    Irrigation,
    Harvest,
    Market,
    General,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    High,
    Critical,
}

/// An alert ready to be delivered; persistence and fan-out to users happen elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct WeatherConditions {
    pub temperature: f64,
    pub rain_chance: f64,
    pub wind_speed: f64,
}

pub fn weather_alerts(conditions: &WeatherConditions) -> Vec<AlertDraft> {
    let mut alerts = Vec::new();

    if conditions.temperature > 38.0 {
        alerts.push(AlertDraft {
            alert_type: AlertType::Weather,
            severity: AlertSeverity::High,
            title: "Extreme Heat Warning".into(),
            message: format!(
                "Temperature expected to reach {:.1}°C. Take precautions for your crops and livestock.",
                conditions.temperature
            ),
            action_url: None,
            action_label: None,
        });
    }

    if conditions.rain_chance > 80.0 {
        alerts.push(AlertDraft {
            alert_type: AlertType::Weather,
            severity: AlertSeverity::Warning,
            title: "Heavy Rain Expected".into(),
            message: format!(
                "High probability ({:.0}%) of rainfall. Consider delaying outdoor activities.",
                conditions.rain_chance
            ),
            action_url: None,
            action_label: None,
        });
    }

    if conditions.wind_speed > 40.0 {
        alerts.push(AlertDraft {
            alert_type: AlertType::Weather,
            severity: AlertSeverity::Warning,
            title: "High Wind Warning".into(),
            message: format!(
                "Wind speeds up to {:.1} km/h expected. Secure loose items and support tall plants.",
                conditions.wind_speed
            ),
            action_url: None,
            action_label: None,
        });
    }

    alerts
}

pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

/// Moves under 5% are noise and produce no alert.
pub fn price_move_alert(
    crop_name: &str,
    market_name: &str,
    current_price: f64,
    change_percent: f64,
) -> Option<AlertDraft> {
    let magnitude = change_percent.abs();
    if magnitude < 5.0 {
        return None;
    }

    let direction = if change_percent > 0.0 { "increased" } else { "decreased" };
    let severity = if magnitude < 10.0 {
        AlertSeverity::Info
    } else {
        AlertSeverity::Warning
    };

    Some(AlertDraft {
        alert_type: AlertType::Price,
        severity,
        title: format!("Price Alert: {}", crop_name),
        message: format!(
            "{} price {} by {:.1}% at {}. Current price: ₹{:.2}/quintal.",
            crop_name, direction, magnitude, market_name, current_price
        ),
        action_url: Some("/prices".into()),
        action_label: Some("View Prices".into()),
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    Above,
    Below,
    Change,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceWatch {
    pub crop_name: String,
    pub alert_type: String,
    pub target_price: Option<f64>,
    pub percent_change: Option<f64>,
}

impl PriceWatch {
    pub fn kind(&self) -> AgriResult<WatchKind> {
        let kind = match self.alert_type.to_lowercase().as_str() {
            "above" => WatchKind::Above,
            "below" => WatchKind::Below,
            "change" => WatchKind::Change,
            _ => {
                return Err(AgriError::Validation(
                    "Alert type must be 'above', 'below', or 'change'".into(),
                ))
            }
        };

        match kind {
            WatchKind::Above | WatchKind::Below if !self.target_price.is_some_and(|p| p > 0.0) => Err(
                AgriError::Validation("Target price required for above/below alerts".into()),
            ),
            WatchKind::Change if !self.percent_change.is_some_and(|p| p > 0.0) => Err(AgriError::Validation(
                "Percent change required for change alerts".into(),
            )),
            _ => Ok(kind),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceWatchEvaluation {
    pub triggered: bool,
    pub change_percent: Option<f64>,
    pub alert: Option<AlertDraft>,
}

pub fn evaluate_price_watch(
    watch: &PriceWatch,
    previous_price: Option<f64>,
    current_price: f64,
) -> AgriResult<PriceWatchEvaluation> {
    let kind = watch.kind()?;
    let change = previous_price.and_then(|prev| percent_change(prev, current_price));
    let target = watch.target_price.unwrap_or_default();

    let (triggered, message) = match kind {
        WatchKind::Above => (
            current_price >= target,
            format!(
                "{} is now ₹{:.2}/quintal, at or above your target of ₹{:.2}.",
                watch.crop_name, current_price, target
            ),
        ),
        WatchKind::Below => (
            current_price <= target,
            format!(
                "{} is now ₹{:.2}/quintal, at or below your target of ₹{:.2}.",
                watch.crop_name, current_price, target
            ),
        ),
        WatchKind::Change => {
            let threshold = watch.percent_change.unwrap_or_default().abs();
            let moved = change.map(|c| c.abs() >= threshold).unwrap_or(false);
            (
                moved,
                format!(
                    "{} moved {:.1}% to ₹{:.2}/quintal.",
                    watch.crop_name,
                    change.unwrap_or_default(),
                    current_price
                ),
            )
        }
    };

    let alert = triggered.then(|| AlertDraft {
        alert_type: AlertType::Price,
        severity: AlertSeverity::Info,
        title: format!("Price Watch: {}", watch.crop_name),
        message,
        action_url: Some("/prices".into()),
        action_label: Some("View Prices".into()),
    });

    Ok(PriceWatchEvaluation {
        triggered,
        change_percent: change,
        alert,
    })
}

#[derive(Deserialize)]
pub struct EvaluateWatchPayload {
    pub watch: PriceWatch,
    pub previous_price: Option<f64>,
    pub current_price: f64,
}

pub async fn evaluate_price_watch_axum(
    Json(payload): Json<EvaluateWatchPayload>,
) -> AgriResult<Json<PriceWatchEvaluation>> {
    if payload.current_price < 0.0 {
        return Err(AgriError::Validation("current_price must be non-negative".into()));
    }
    let result = evaluate_price_watch(&payload.watch, payload.previous_price, payload.current_price)?;
    Ok(Json(result))
}

pub async fn weather_alerts_axum(
    Json(conditions): Json<WeatherConditions>,
) -> AgriResult<Json<Vec<AlertDraft>>> {
    Ok(Json(weather_alerts(&conditions)))
}
