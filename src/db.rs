use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{AgriError, AgriResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> AgriResult<DbPool> {
    // connect_lazy_with returns immediately; the first query opens the connection.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> AgriResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| AgriError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Prefer);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> AgriResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    if let Err(e) = ensure_seeds(pool).await {
        tracing::warn!("Catalog seeding incomplete: {}", e);
    }
    tracing::info!("Database ready");

    Ok(())
}

pub async fn ping(pool: &DbPool) -> AgriResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

// name, local_name, scientific_name, category, season, min_temp, max_temp,
// water_mm, days_min, days_max, soil_types, yield_per_acre
type CropSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    f64,
    f64,
    i32,
    i32,
    &'static [&'static str],
    f64,
);

const CROP_SEEDS: &[CropSeed] = &[
    ("Rice", "Dhaan", "Oryza sativa", "cereals", "kharif", 20.0, 35.0, 1200.0, 120, 150, &["clay", "loamy"], 2000.0),
    ("Wheat", "Gehun", "Triticum aestivum", "cereals", "rabi", 10.0, 25.0, 450.0, 120, 140, &["loamy", "clay loam"], 1800.0),
    ("Maize", "Makka", "Zea mays", "cereals", "kharif", 18.0, 32.0, 600.0, 90, 120, &["loamy", "sandy loam"], 2500.0),
    ("Cotton", "Kapas", "Gossypium hirsutum", "cash_crops", "kharif", 21.0, 35.0, 700.0, 150, 180, &["black", "loamy"], 500.0),
    ("Sugarcane", "Ganna", "Saccharum officinarum", "cash_crops", "annual", 20.0, 35.0, 2000.0, 300, 365, &["loamy", "clay loam"], 35000.0),
    ("Soybean", "Soyabean", "Glycine max", "pulses", "kharif", 20.0, 30.0, 500.0, 90, 120, &["loamy", "clay loam"], 1200.0),
    ("Groundnut", "Moongfali", "Arachis hypogaea", "oilseeds", "kharif", 22.0, 32.0, 500.0, 100, 130, &["sandy loam", "loamy"], 1500.0),
    ("Tomato", "Tamatar", "Solanum lycopersicum", "vegetables", "rabi", 15.0, 30.0, 600.0, 90, 120, &["loamy", "sandy loam"], 10000.0),
    ("Onion", "Pyaz", "Allium cepa", "vegetables", "rabi", 13.0, 28.0, 400.0, 120, 150, &["loamy", "sandy loam"], 12000.0),
    ("Potato", "Aloo", "Solanum tuberosum", "vegetables", "rabi", 15.0, 25.0, 500.0, 90, 120, &["sandy loam", "loamy"], 15000.0),
    ("Grapes", "Angoor", "Vitis vinifera", "fruits", "perennial", 15.0, 35.0, 700.0, 365, 365, &["sandy loam", "loamy"], 8000.0),
    ("Mango", "Aam", "Mangifera indica", "fruits", "perennial", 24.0, 45.0, 1000.0, 365, 365, &["loamy", "alluvial"], 5000.0),
    ("Banana", "Kela", "Musa acuminata", "fruits", "perennial", 20.0, 35.0, 1800.0, 270, 365, &["loamy", "clay loam"], 25000.0),
    ("Chilli", "Mirchi", "Capsicum annuum", "vegetables", "kharif", 20.0, 35.0, 600.0, 120, 150, &["loamy", "sandy loam"], 2500.0),
    ("Turmeric", "Haldi", "Curcuma longa", "spices", "kharif", 20.0, 30.0, 1500.0, 240, 270, &["loamy", "clay loam"], 2500.0),
];

// name, local_name, category, affected crop names, symptoms, causes, prevention, organic, chemical
type DiseaseSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static [&'static str],
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

const DISEASE_SEEDS: &[DiseaseSeed] = &[
    ("Blast", "Jhulsa", "fungal", &["Rice"], "Spindle-shaped lesions on leaves", "Fungus infection", "Use resistant varieties", "Trichoderma viride spray", "Tricyclazole 75% WP"),
    ("Bacterial Leaf Blight", "Patti Jhulsa", "bacterial", &["Rice"], "Water-soaked lesions at leaf margins", "Bacterial infection", "Use certified seeds", "Copper hydroxide spray", "Streptocycline 0.01%"),
    ("Powdery Mildew", "Safed Chita", "fungal", &["Tomato", "Chilli"], "White powdery coating on leaves", "Erysiphe species", "Proper spacing", "Milk spray (10%)", "Sulfur 80% WP"),
    ("Late Blight", "Picheti Jhulsa", "fungal", &["Tomato", "Potato"], "Dark water-soaked lesions", "Phytophthora infestans", "Use disease-free seeds", "Bordeaux mixture", "Mancozeb 75% WP"),
    ("Downy Mildew", "Mridu Romil", "fungal", &["Grapes"], "Yellow patches on upper leaf", "Peronospora species", "Good air circulation", "Neem oil spray", "Metalaxyl 8%"),
    ("Anthracnose", "Shrinkage", "fungal", &["Tomato", "Mango", "Chilli"], "Dark sunken lesions on fruits", "Colletotrichum species", "Crop rotation", "Trichoderma application", "Carbendazim 50% WP"),
    ("Yellow Mosaic Virus", "Peela Mosaic", "viral", &["Soybean"], "Yellow and green mosaic pattern", "Whitefly transmission", "Control whitefly", "Neem oil", "Imidacloprid for vector"),
    ("Rust", "Ratua", "fungal", &["Wheat", "Soybean"], "Orange to brown pustules", "Puccinia species", "Use resistant varieties", "Sulfur dust", "Propiconazole 25% EC"),
];

// name, market_type, city, district, state, latitude, longitude
type MarketSeed = (&'static str, &'static str, &'static str, &'static str, &'static str, f64, f64);

const MARKET_SEEDS: &[MarketSeed] = &[
    ("Nashik APMC", "apmc", "Nashik", "Nashik", "Maharashtra", 19.9975, 73.7898),
    ("Pune Market Yard", "apmc", "Pune", "Pune", "Maharashtra", 18.5204, 73.8567),
    ("Azadpur Mandi", "mandi", "Delhi", "North Delhi", "Delhi", 28.7041, 77.1025),
    ("Vashi APMC", "apmc", "Navi Mumbai", "Thane", "Maharashtra", 19.0760, 72.9981),
    ("Koyambedu Market", "mandi", "Chennai", "Chennai", "Tamil Nadu", 13.0827, 80.2707),
];

async fn ensure_seeds(pool: &DbPool) -> AgriResult<()> {
    let mut tx = pool.begin().await?;

    for (name, local, sci, category, season, tmin, tmax, water, dmin, dmax, soils, yield_acre) in
        CROP_SEEDS
    {
        sqlx::query(
            "INSERT INTO crop_master (name, local_name, scientific_name, category, season, min_temp, max_temp, water_requirement_mm, growing_days_min, growing_days_max, soil_types, typical_yield_per_acre, yield_unit)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'kg')
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(local)
        .bind(sci)
        .bind(category)
        .bind(season)
        .bind(tmin)
        .bind(tmax)
        .bind(water)
        .bind(dmin)
        .bind(dmax)
        .bind(serde_json::json!(soils))
        .bind(yield_acre)
        .execute(&mut *tx)
        .await?;
    }

    for (name, local, category, crops, symptoms, causes, prevention, organic, chemical) in
        DISEASE_SEEDS
    {
        // affected_crops holds crop_master ids, resolved after the crops above exist
        let crop_names: Vec<String> = crops.iter().map(|c| c.to_string()).collect();
        sqlx::query(
            "INSERT INTO disease_master (name, local_name, category, affected_crops, symptoms, causes, prevention, organic_treatment, chemical_treatment)
             SELECT $1, $2, $3, COALESCE(jsonb_agg(id ORDER BY id), '[]'::jsonb), $5, $6, $7, $8, $9
             FROM crop_master WHERE name = ANY($4)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(local)
        .bind(category)
        .bind(&crop_names)
        .bind(symptoms)
        .bind(causes)
        .bind(prevention)
        .bind(organic)
        .bind(chemical)
        .execute(&mut *tx)
        .await?;
    }

    for (name, market_type, city, district, state, lat, lon) in MARKET_SEEDS {
        sqlx::query(
            "INSERT INTO markets (name, market_type, city, district, state, latitude, longitude)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(market_type)
        .bind(city)
        .bind(district)
        .bind(state)
        .bind(lat)
        .bind(lon)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CropMaster {
    pub id: i32,
    pub name: String,
    pub local_name: Option<String>,
    pub scientific_name: Option<String>,
    pub category: String,
    pub season: String,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub water_requirement_mm: Option<f64>,
    pub growing_days_min: Option<i32>,
    pub growing_days_max: Option<i32>,
    pub soil_types: serde_json::Value,
    pub typical_yield_per_acre: Option<f64>,
    pub yield_unit: String,
}

impl CropMaster {
    /// Suitable soils, or `None` when the stored value is not a JSON string array.
    pub fn soil_list(&self) -> Option<Vec<String>> {
        serde_json::from_value(self.soil_types.clone()).ok()
    }

    pub fn growing_days(&self) -> String {
        format!(
            "{}-{}",
            self.growing_days_min.unwrap_or(90),
            self.growing_days_max.unwrap_or(120)
        )
    }
}

const CROP_COLUMNS: &str = "id, name, local_name, scientific_name, category, season, min_temp, max_temp, water_requirement_mm, growing_days_min, growing_days_max, soil_types, typical_yield_per_acre, yield_unit";

pub async fn list_crop_master(
    pool: &DbPool,
    category: Option<&str>,
    season: Option<&str>,
) -> AgriResult<Vec<CropMaster>> {
    let sql = format!(
        "SELECT {} FROM crop_master
         WHERE ($1::text IS NULL OR LOWER(category) = LOWER($1))
           AND ($2::text IS NULL OR LOWER(season) = LOWER($2))
         ORDER BY name",
        CROP_COLUMNS
    );
    let crops = sqlx::query_as::<_, CropMaster>(&sql)
        .bind(category)
        .bind(season)
        .fetch_all(pool)
        .await?;
    Ok(crops)
}

pub async fn get_crop_master(pool: &DbPool, id: i32) -> AgriResult<Option<CropMaster>> {
    let sql = format!("SELECT {} FROM crop_master WHERE id = $1", CROP_COLUMNS);
    let crop = sqlx::query_as::<_, CropMaster>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(crop)
}

pub async fn require_crop_master(pool: &DbPool, id: i32) -> AgriResult<CropMaster> {
    get_crop_master(pool, id)
        .await?
        .ok_or_else(|| AgriError::NotFound(format!("Crop {}", id)))
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiseaseMaster {
    pub id: i32,
    pub name: String,
    pub local_name: Option<String>,
    pub category: Option<String>,
    pub affected_crops: serde_json::Value,
    pub symptoms: Option<String>,
    pub causes: Option<String>,
    pub prevention: Option<String>,
    pub organic_treatment: Option<String>,
    pub chemical_treatment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: uuid::Uuid,
    pub name: String,
    pub market_type: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
}

pub fn dec_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub fn f64_to_dec(value: f64) -> AgriResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| AgriError::Validation(format!("Invalid price value: {}", value)))
}
