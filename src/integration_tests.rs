#[cfg(test)]
mod tests {
    use crate::commands::alerts::AlertSeverity;
    use crate::commands::price::{ingest_price, NewPriceObservation};
    use crate::commands::recommend::{load_recommendations, recommend_for_profile, FarmProfile};
    use crate::db::{self, DbPool};
    use chrono::NaiveDate;
    use uuid::Uuid;

    /// Returns None when no database is configured so the suite still runs offline.
    async fn setup_test_db() -> Option<DbPool> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").ok()?;
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to migrate test database");
        Some(pool)
    }

    async fn crop_and_market(pool: &DbPool) -> (i32, Uuid) {
        let (crop_id,): (i32,) = sqlx::query_as("SELECT id FROM crop_master WHERE name = 'Onion'")
            .fetch_one(pool)
            .await
            .expect("Onion is seeded");
        let (market_id,): (Uuid,) = sqlx::query_as("SELECT id FROM markets WHERE name = 'Nashik APMC'")
            .fetch_one(pool)
            .await
            .expect("Nashik APMC is seeded");
        (crop_id, market_id)
    }

    #[tokio::test]
    async fn test_catalogs_are_seeded_once() {
        let Some(pool) = setup_test_db().await else { return };
        db::init_database(&pool).await.expect("re-running init is idempotent");

        let (crops,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crop_master")
            .fetch_one(&pool)
            .await
            .unwrap();
        let (diseases,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM disease_master")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(crops >= 15);
        assert!(diseases >= 8);

        let wheat = db::list_crop_master(&pool, Some("cereals"), Some("rabi"))
            .await
            .unwrap();
        assert!(wheat.iter().any(|c| c.name == "Wheat"));
    }

    #[tokio::test]
    async fn test_price_ingest_upserts_and_alerts() {
        let Some(pool) = setup_test_db().await else { return };
        let (crop_id, market_id) = crop_and_market(&pool).await;
        let grade = format!("IT-{}", Uuid::new_v4());
        let day1 = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(1999, 1, 2).unwrap();

        let observation = |date: NaiveDate, modal: f64| NewPriceObservation {
            crop_master_id: crop_id,
            market_id,
            recorded_date: Some(date),
            min_price: Some(modal - 100.0),
            max_price: Some(modal + 100.0),
            modal_price: modal,
            arrival_quantity: Some(120.0),
            grade: Some(grade.clone()),
            variety: None,
            source: Some("integration-test".into()),
        };

        let first = ingest_price(&pool, observation(day1, 2000.0), day1).await.unwrap();
        assert_eq!(first.observation.modal_price, 2000.0);

        let second = ingest_price(&pool, observation(day2, 2300.0), day2).await.unwrap();
        assert_eq!(second.previous_modal_price, Some(2000.0));
        assert_eq!(second.change_percent, Some(15.0));
        assert_eq!(second.alert.map(|a| a.severity), Some(AlertSeverity::Warning));

        // Same key again updates in place.
        let again = ingest_price(&pool, observation(day2, 2310.0), day2).await.unwrap();
        assert_eq!(again.observation.id, second.observation.id);
        assert_eq!(again.observation.modal_price, 2310.0);

        let _ = sqlx::query("DELETE FROM crop_prices WHERE grade = $1")
            .bind(&grade)
            .execute(&pool)
            .await;
    }

    #[tokio::test]
    async fn test_price_ingest_prefers_same_grade_previous_row() {
        let Some(pool) = setup_test_db().await else { return };
        let (crop_id, market_id) = crop_and_market(&pool).await;
        let tag = Uuid::new_v4();
        let grade_a = format!("IT-A-{}", tag);
        let grade_b = format!("IT-B-{}", tag);
        let day1 = NaiveDate::from_ymd_opt(1998, 6, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(1998, 6, 2).unwrap();

        let observation = |grade: &str, date: NaiveDate, modal: f64| NewPriceObservation {
            crop_master_id: crop_id,
            market_id,
            recorded_date: Some(date),
            min_price: None,
            max_price: None,
            modal_price: modal,
            arrival_quantity: None,
            grade: Some(grade.to_string()),
            variety: None,
            source: Some("integration-test".into()),
        };

        ingest_price(&pool, observation(&grade_a, day1, 1000.0), day1).await.unwrap();
        ingest_price(&pool, observation(&grade_b, day1, 2000.0), day1).await.unwrap();

        for _ in 0..3 {
            let result = ingest_price(&pool, observation(&grade_b, day2, 2200.0), day2).await.unwrap();
            assert_eq!(result.previous_modal_price, Some(2000.0));
            assert_eq!(result.change_percent, Some(10.0));
        }

        let _ = sqlx::query("DELETE FROM crop_prices WHERE grade = $1 OR grade = $2")
            .bind(&grade_a)
            .bind(&grade_b)
            .execute(&pool)
            .await;
    }

    #[tokio::test]
    async fn test_negative_modal_price_is_rejected_by_schema() {
        let Some(pool) = setup_test_db().await else { return };
        let (crop_id, market_id) = crop_and_market(&pool).await;

        let result = sqlx::query(
            "INSERT INTO crop_prices (crop_master_id, market_id, recorded_date, modal_price, grade)
             VALUES ($1, $2, '1999-02-01', -5, 'IT-NEGATIVE')",
        )
        .bind(crop_id)
        .bind(market_id)
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recommendations_are_persisted_per_farm() {
        let Some(pool) = setup_test_db().await else { return };
        let farm_ref = format!("it-farm-{}", Uuid::new_v4());
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();

        let profile = FarmProfile {
            latitude: 19.99,
            longitude: 73.79,
            soil_type: Some("loamy".into()),
            water_availability: Some("moderate".into()),
            season: None,
            farm_ref: Some(farm_ref.clone()),
        };

        let ranked = recommend_for_profile(&pool, &profile, today).await.unwrap();
        assert_eq!(ranked.len(), 10);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].suitability_score >= w[1].suitability_score));

        let stored = load_recommendations(&pool, &farm_ref, today).await.unwrap();
        assert_eq!(stored.len(), ranked.len());
        assert!(stored.iter().all(|r| r.season == "kharif"));

        // Expired once the validity month has passed.
        let later = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        assert!(load_recommendations(&pool, &farm_ref, later).await.unwrap().is_empty());

        let _ = sqlx::query("DELETE FROM crop_recommendations WHERE farm_ref = $1")
            .bind(&farm_ref)
            .execute(&pool)
            .await;
    }
}
