#[cfg(test)]
mod tests {
    use crate::commands::alerts::{self, AlertSeverity};
    use crate::commands::disease::{analyze_detection, Detection, DetectionSource};
    use crate::commands::finance::{self, CropCosts, CropPerformanceRequest};
    use crate::commands::price::predict::{forecast_prices, ForecastMethod, Trend};
    use crate::commands::recommend::{self, FarmProfile};
    use crate::commands::twin::{self, TwinRequest};
    use crate::commands::weather::advisory::generate_advisories;
    use crate::commands::weather::{alert_conditions, tests as weather_fixtures};
    use chrono::NaiveDate;

    fn rising_history() -> Vec<f64> {
        // newest first, +50 per observation
        (0..10).map(|i| 2900.0 - 50.0 * i as f64).collect()
    }

    /// A hot, windy day ahead of three wet days should surface both
    /// advisories and alert drafts from the same readings.
    #[test]
    fn test_stormy_week_advisories_and_alerts_agree() {
        let mut current = weather_fixtures::calm_day();
        current.temperature = 39.5;
        current.wind_speed = 45.0;
        let forecast = weather_fixtures::forecast_with_rain(&[85.0, 90.0, 70.0, 20.0, 10.0]);

        let titles: Vec<String> = generate_advisories(&current, &forecast)
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert!(titles.contains(&"Heat Alert".to_string()));
        assert!(titles.contains(&"Rainy Period Ahead".to_string()));
        assert!(titles.contains(&"Strong Wind Warning".to_string()));

        let drafts = alerts::weather_alerts(&alert_conditions(&current, &forecast));
        let draft_titles: Vec<&str> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(
            draft_titles,
            vec!["Extreme Heat Warning", "Heavy Rain Expected", "High Wind Warning"]
        );
    }

    #[test]
    fn test_rising_prices_agree_across_recommendation_and_forecast() {
        let wheat = recommend::tests::crop(2, "Wheat", "cereals", "rabi", 450.0, &["loamy"], 1800.0);
        let history = rising_history();

        let profile = FarmProfile {
            latitude: 28.6,
            longitude: 77.2,
            soil_type: Some("loamy".into()),
            water_availability: Some("moderate".into()),
            season: Some("rabi".into()),
            farm_ref: None,
        };
        let rec = recommend::score_crop(&wheat, &profile, "rabi", &history);
        assert_eq!(rec.scores.market, 95.0);
        assert_eq!(rec.price_trend, "rising");

        let today = NaiveDate::from_ymd_opt(2024, 11, 4).unwrap();
        let forecast = forecast_prices(&wheat, &history, today, 30);
        assert_eq!(forecast.method, ForecastMethod::Trend);
        assert_eq!(forecast.trend, Trend::Rising);
        assert_eq!(forecast.current_price, 2900.0);
        assert_eq!(forecast.predictions.len(), 30);
    }

    #[test]
    fn test_disease_alerts_rank_above_price_moves() {
        let detection = Detection {
            label: "Late_Blight".into(),
            confidence: 0.96,
            predictions: Vec::new(),
            source: DetectionSource::Client,
        };
        let analysis = analyze_detection(&detection, "potato", &[]);
        let disease_alert = analysis.alert.expect("high severity raises an alert");

        let price_alert = alerts::price_move_alert("Potato", "Agra Mandi", 1400.0, -15.0)
            .expect("15% move raises an alert");

        assert_eq!(disease_alert.severity, AlertSeverity::High);
        assert_eq!(price_alert.severity, AlertSeverity::Warning);
        assert!(disease_alert.severity > price_alert.severity);
    }

    /// The twin's projection and the finance roll-up price the same harvest identically.
    #[test]
    fn test_twin_projection_matches_crop_economics() {
        let rice = recommend::tests::crop(1, "Rice", "cereals", "kharif", 1200.0, &["clay"], 2000.0);
        let base = twin::catalog_base_yield(&rice).unwrap();
        assert_eq!(base, 20.0);

        let request = TwinRequest {
            crop: None,
            crop_id: Some(rice.id),
            area_acres: 5.0,
            water_level: 100.0,
            fertilizer_level: 100.0,
            pest_control_level: 100.0,
            price_per_quintal: Some(2200.0),
        };
        let projection = twin::project(&rice.name, base, &request);

        let performance = finance::crop_performance(&CropPerformanceRequest {
            crop_name: Some(rice.name.clone()),
            area_acres: 5.0,
            costs: CropCosts { seed_cost: 10000.0, labor_cost: 40000.0, ..Default::default() },
            expected_yield: Some(projection.projected_total_yield),
            actual_yield: Some(projection.projected_total_yield),
            yield_unit: Some("quintal".into()),
            price_per_unit: Some(2200.0),
        });

        assert_eq!(performance.revenue, projection.projected_revenue);
        assert_eq!(performance.yield_achievement_percent, 100.0);
        assert_eq!(performance.profit, Some(170000.0));
    }
}
