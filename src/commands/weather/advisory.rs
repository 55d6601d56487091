use super::{CurrentWeather, ForecastDay};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmingAdvisory {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
    pub icon: String,
}

fn advisory(title: &str, description: String, priority: &str, category: &str, icon: &str) -> FarmingAdvisory {
    FarmingAdvisory {
        title: title.to_string(),
        description,
        priority: priority.to_string(),
        category: category.to_string(),
        icon: icon.to_string(),
    }
}

pub fn generate_advisories(current: &CurrentWeather, forecast: &[ForecastDay]) -> Vec<FarmingAdvisory> {
    let mut advisories = Vec::new();

    if current.temperature > 35.0 {
        advisories.push(advisory(
            "Heat Alert",
            "High temperature detected. Increase irrigation frequency and consider shade nets for sensitive crops.".into(),
            "high",
            "irrigation",
            "thermostat",
        ));
    } else if current.temperature < 10.0 {
        advisories.push(advisory(
            "Cold Weather Alert",
            "Low temperature expected. Protect frost-sensitive crops with mulching or covers.".into(),
            "high",
            "protection",
            "ac_unit",
        ));
    }

    if current.rain_mm > 20.0 {
        advisories.push(advisory(
            "Heavy Rainfall",
            "Delay irrigation. Check drainage systems and avoid pesticide application.".into(),
            "high",
            "irrigation",
            "water_drop",
        ));
    }

    let rain_days = forecast.iter().filter(|d| d.rain_chance > 60.0).count();
    if rain_days >= 3 {
        advisories.push(advisory(
            "Rainy Period Ahead",
            format!(
                "Rain expected for {} days. Complete harvesting of mature crops and delay new plantings.",
                rain_days
            ),
            "medium",
            "harvest",
            "thunderstorm",
        ));
    } else if rain_days == 0 && forecast.len() >= 5 {
        advisories.push(advisory(
            "Dry Spell Expected",
            "No rain expected in the coming days. Ensure adequate irrigation scheduling.".into(),
            "medium",
            "irrigation",
            "wb_sunny",
        ));
    }

    if current.humidity > 85.0 {
        advisories.push(advisory(
            "High Humidity Alert",
            "Increased risk of fungal diseases. Monitor crops closely and ensure proper ventilation.".into(),
            "medium",
            "pest",
            "water",
        ));
    }

    if current.wind_speed > 40.0 {
        advisories.push(advisory(
            "Strong Wind Warning",
            "High winds detected. Secure shade structures and delay spraying operations.".into(),
            "high",
            "protection",
            "air",
        ));
    }

    if current.uv_index.unwrap_or(0.0) > 8.0 {
        advisories.push(advisory(
            "High UV Index",
            "Extreme UV levels. Avoid field work during peak hours (11am-3pm). Use sun protection.".into(),
            "medium",
            "safety",
            "brightness_7",
        ));
    }

    if advisories.is_empty() {
        advisories.push(advisory(
            "Good Farming Conditions",
            "Weather conditions are favorable for most farming activities. Proceed with regular operations.".into(),
            "low",
            "general",
            "check_circle",
        ));
    }

    advisories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::weather::tests::{calm_day, forecast_with_rain};

    #[test]
    fn test_calm_weather_gives_single_good_conditions_advisory() {
        let advisories = generate_advisories(&calm_day(), &forecast_with_rain(&[30.0, 10.0, 70.0]));
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].title, "Good Farming Conditions");
        assert_eq!(advisories[0].priority, "low");
    }

    #[test]
    fn test_heat_and_wind_stack() {
        let mut current = calm_day();
        current.temperature = 39.0;
        current.wind_speed = 45.0;
        current.uv_index = Some(9.5);
        let titles: Vec<String> = generate_advisories(&current, &[])
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Heat Alert", "Strong Wind Warning", "High UV Index"]);
    }

    #[test]
    fn test_rainy_period_counts_days() {
        let advisories = generate_advisories(
            &calm_day(),
            &forecast_with_rain(&[65.0, 80.0, 10.0, 90.0, 0.0]),
        );
        assert_eq!(advisories[0].title, "Rainy Period Ahead");
        assert!(advisories[0].description.contains("3 days"));
    }

    #[test]
    fn test_dry_spell_needs_five_forecast_days() {
        let short = generate_advisories(&calm_day(), &forecast_with_rain(&[0.0, 0.0, 0.0, 0.0]));
        assert_eq!(short[0].title, "Good Farming Conditions");

        let long = generate_advisories(&calm_day(), &forecast_with_rain(&[0.0, 10.0, 20.0, 30.0, 60.0]));
        assert_eq!(long[0].title, "Dry Spell Expected");
    }

    #[test]
    fn test_cold_and_heavy_rain() {
        let mut current = calm_day();
        current.temperature = 6.0;
        current.rain_mm = 25.0;
        current.humidity = 90.0;
        let titles: Vec<String> = generate_advisories(&current, &[])
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Cold Weather Alert", "Heavy Rainfall", "High Humidity Alert"]);
    }
}
