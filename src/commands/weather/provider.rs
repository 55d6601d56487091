use super::{CurrentWeather, ForecastDay};
use crate::error::{AgriError, AgriResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;

const OWM_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const SKY_CONDITIONS: &[&str] = &["Clear sky", "Partly cloudy", "Cloudy", "Light rain", "Sunny", "Haze"];
const FORECAST_CONDITIONS: &[&str] = &["Sunny", "Partly cloudy", "Cloudy", "Light rain", "Clear"];
const ICON_CODES: &[&str] = &["01d", "02d", "03d", "04d", "10d"];
const RAIN_CHOICES: &[f64] = &[0.0, 0.0, 0.0, 0.5, 1.0, 2.0, 5.0];

fn pick<'a, T: ?Sized, R: Rng + ?Sized>(rng: &mut R, items: &'a [&'a T]) -> &'a T {
    items[rng.random_range(0..items.len())]
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Rough latitude-driven baseline used when no live provider is configured.
pub fn base_temperature(latitude: f64) -> f64 {
    30.0 - (latitude - 20.0).abs() * 0.5
}

pub fn simulate_current<R: Rng + ?Sized>(latitude: f64, longitude: f64, rng: &mut R) -> CurrentWeather {
    let temp = base_temperature(latitude) + rng.random_range(-5.0..5.0);

    CurrentWeather {
        latitude,
        longitude,
        recorded_at: Utc::now(),
        temperature: round1(temp),
        feels_like: round1(temp + rng.random_range(-2.0..3.0)),
        humidity: rng.random_range(40..=85) as f64,
        pressure: round1(rng.random_range(1000.0..1020.0)),
        wind_speed: round1(rng.random_range(5.0..25.0)),
        wind_direction: Some(rng.random_range(0..=360) as f64),
        visibility_km: round1(rng.random_range(5.0..15.0)),
        uv_index: Some(round1(rng.random_range(3.0..10.0))),
        rain_mm: RAIN_CHOICES[rng.random_range(0..RAIN_CHOICES.len())],
        description: pick(rng, SKY_CONDITIONS).to_string(),
        icon: pick(rng, ICON_CODES).to_string(),
        source: "simulated".to_string(),
    }
}

pub fn simulate_forecast<R: Rng + ?Sized>(
    latitude: f64,
    start: NaiveDate,
    days: u32,
    rng: &mut R,
) -> Vec<ForecastDay> {
    let base = base_temperature(latitude);

    (0..days)
        .map(|i| {
            let variation = rng.random_range(-3.0..3.0);
            ForecastDay {
                date: start + Duration::days(i as i64),
                temp_min: round1(base + variation - 5.0),
                temp_max: round1(base + variation + 5.0),
                humidity: rng.random_range(45..=80) as f64,
                rain_chance: rng.random_range(0..=70) as f64,
                rain_mm: 0.0,
                description: pick(rng, FORECAST_CONDITIONS).to_string(),
                icon: pick(rng, ICON_CODES).to_string(),
                wind_speed: round1(rng.random_range(8.0..20.0)),
                uv_index: Some(round1(rng.random_range(4.0..9.0))),
            }
        })
        .collect()
}

pub async fn fetch_current(
    client: &reqwest::Client,
    api_key: &str,
    latitude: f64,
    longitude: f64,
) -> AgriResult<CurrentWeather> {
    let res = client
        .get(format!("{}/weather", OWM_BASE_URL))
        .query(&[
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ])
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?;

    if !res.status().is_success() {
        return Err(AgriError::Upstream(format!("Weather API error: {}", res.status())));
    }

    let body: Value = res.json().await?;
    Ok(parse_current(latitude, longitude, &body))
}

pub async fn fetch_forecast(
    client: &reqwest::Client,
    api_key: &str,
    latitude: f64,
    longitude: f64,
    days: u32,
) -> AgriResult<Vec<ForecastDay>> {
    let res = client
        .get(format!("{}/forecast", OWM_BASE_URL))
        .query(&[
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
            ("cnt", (days * 8).to_string()),
        ])
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?;

    if !res.status().is_success() {
        return Err(AgriError::Upstream(format!("Forecast API error: {}", res.status())));
    }

    let body: Value = res.json().await?;
    Ok(parse_forecast(&body, days))
}

pub fn parse_current(latitude: f64, longitude: f64, data: &Value) -> CurrentWeather {
    let main = &data["main"];
    let weather = &data["weather"][0];

    CurrentWeather {
        latitude,
        longitude,
        recorded_at: Utc::now(),
        temperature: main["temp"].as_f64().unwrap_or(25.0),
        feels_like: main["feels_like"].as_f64().unwrap_or(25.0),
        humidity: main["humidity"].as_f64().unwrap_or(60.0),
        pressure: main["pressure"].as_f64().unwrap_or(1013.0),
        // m/s -> km/h
        wind_speed: data["wind"]["speed"].as_f64().unwrap_or(0.0) * 3.6,
        wind_direction: data["wind"]["deg"].as_f64(),
        visibility_km: data["visibility"].as_f64().unwrap_or(10000.0) / 1000.0,
        uv_index: None,
        rain_mm: data["rain"]["1h"].as_f64().unwrap_or(0.0),
        description: weather["description"].as_str().unwrap_or("").to_string(),
        icon: weather["icon"].as_str().unwrap_or("01d").to_string(),
        source: "openweathermap".to_string(),
    }
}

#[derive(Default)]
struct DayBucket {
    temps: Vec<f64>,
    humidity: Vec<f64>,
    wind: Vec<f64>,
    rain_mm: f64,
    description: String,
    icon: String,
}

/// Folds 3-hourly entries into per-day summaries, oldest day first.
pub fn parse_forecast(data: &Value, days: u32) -> Vec<ForecastDay> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    let entries = data["list"].as_array().cloned().unwrap_or_default();
    for item in &entries {
        let Some(date) = item["dt"]
            .as_i64()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };

        let bucket = buckets.entry(date).or_insert_with(|| DayBucket {
            description: item["weather"][0]["description"].as_str().unwrap_or("").to_string(),
            icon: item["weather"][0]["icon"].as_str().unwrap_or("01d").to_string(),
            ..Default::default()
        });

        if let Some(t) = item["main"]["temp"].as_f64() {
            bucket.temps.push(t);
        }
        if let Some(h) = item["main"]["humidity"].as_f64() {
            bucket.humidity.push(h);
        }
        if let Some(w) = item["wind"]["speed"].as_f64() {
            bucket.wind.push(w);
        }
        bucket.rain_mm += item["rain"]["3h"].as_f64().unwrap_or(0.0);
    }

    buckets
        .into_iter()
        .filter(|(_, b)| !b.temps.is_empty())
        .take(days as usize)
        .map(|(date, b)| ForecastDay {
            date,
            temp_min: b.temps.iter().cloned().fold(f64::INFINITY, f64::min),
            temp_max: b.temps.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            humidity: mean(&b.humidity).trunc(),
            rain_chance: (b.rain_mm * 10.0).trunc().min(100.0),
            rain_mm: b.rain_mm,
            description: b.description,
            icon: b.icon,
            wind_speed: mean(&b.wind) * 3.6,
            uv_index: None,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn test_parse_current_converts_units() {
        let body = json!({
            "main": {"temp": 31.2, "feels_like": 33.0, "humidity": 70, "pressure": 1008},
            "wind": {"speed": 5.0, "deg": 270},
            "visibility": 8000,
            "rain": {"1h": 1.5},
            "weather": [{"description": "light rain", "icon": "10d"}]
        });
        let w = parse_current(19.99, 73.78, &body);
        assert!((w.wind_speed - 18.0).abs() < 1e-9);
        assert!((w.visibility_km - 8.0).abs() < 1e-9);
        assert_eq!(w.rain_mm, 1.5);
        assert_eq!(w.description, "light rain");
        assert_eq!(w.source, "openweathermap");
    }

    #[test]
    fn test_parse_forecast_groups_by_day() {
        // 2024-06-01 00:00 UTC and 2024-06-01 03:00 UTC, then 2024-06-02 00:00 UTC
        let body = json!({
            "list": [
                {"dt": 1717200000, "main": {"temp": 24.0, "humidity": 80}, "wind": {"speed": 2.0},
                 "rain": {"3h": 4.0}, "weather": [{"description": "rain", "icon": "10d"}]},
                {"dt": 1717210800, "main": {"temp": 30.0, "humidity": 61}, "wind": {"speed": 4.0},
                 "rain": {"3h": 9.0}, "weather": [{"description": "clouds", "icon": "03d"}]},
                {"dt": 1717286400, "main": {"temp": 27.0, "humidity": 50}, "wind": {"speed": 1.0},
                 "weather": [{"description": "clear", "icon": "01d"}]}
            ]
        });
        let days = parse_forecast(&body, 7);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(days[0].temp_min, 24.0);
        assert_eq!(days[0].temp_max, 30.0);
        assert_eq!(days[0].humidity, 70.0);
        assert_eq!(days[0].rain_chance, 100.0);
        assert_eq!(days[0].description, "rain");
        assert!((days[0].wind_speed - 10.8).abs() < 1e-9);
        assert_eq!(days[1].rain_chance, 0.0);

        assert_eq!(parse_forecast(&body, 1).len(), 1);
    }

    #[test]
    fn test_simulated_current_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let w = simulate_current(20.0, 75.0, &mut rng);
            assert!(w.temperature >= 25.0 && w.temperature <= 35.0);
            assert!(w.humidity >= 40.0 && w.humidity <= 85.0);
            assert!(RAIN_CHOICES.contains(&w.rain_mm));
            assert_eq!(w.source, "simulated");
        }
    }

    #[test]
    fn test_simulated_forecast_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let days = simulate_forecast(30.0, start, 5, &mut rng);
        assert_eq!(days.len(), 5);
        assert_eq!(days[4].date, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        for d in &days {
            assert!((d.temp_max - d.temp_min - 10.0).abs() < 0.11);
            assert!(d.rain_chance <= 70.0);
        }
    }

    #[test]
    fn test_base_temperature_by_latitude() {
        assert_eq!(base_temperature(20.0), 30.0);
        assert_eq!(base_temperature(30.0), 25.0);
        assert_eq!(base_temperature(10.0), 25.0);
    }
}
