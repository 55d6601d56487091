use crate::db::{self, CropMaster};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

const WATER_WEIGHT: f64 = 0.40;
const FERTILIZER_WEIGHT: f64 = 0.35;
const PEST_WEIGHT: f64 = 0.25;

/// Quintals per acre under ideal inputs.
const BASE_YIELDS: &[(&str, f64)] = &[
    ("rice", 25.0),
    ("wheat", 20.0),
    ("maize", 28.0),
    ("cotton", 10.0),
    ("sugarcane", 350.0),
    ("soybean", 10.0),
    ("groundnut", 12.0),
    ("chickpea", 8.0),
    ("mustard", 8.0),
    ("tomato", 120.0),
    ("potato", 100.0),
    ("onion", 90.0),
];
const DEFAULT_BASE_YIELD: f64 = 20.0;

pub fn builtin_base_yield(crop: &str) -> Option<f64> {
    let crop = crop.trim().to_lowercase();
    BASE_YIELDS.iter().find(|(name, _)| *name == crop).map(|(_, y)| *y)
}

/// Typical catalog yield converted to quintals per acre.
pub fn catalog_base_yield(master: &CropMaster) -> Option<f64> {
    let raw = master.typical_yield_per_acre.filter(|y| *y > 0.0)?;
    Some(match master.yield_unit.to_lowercase().as_str() {
        "kg" => raw / 100.0,
        "tonne" | "ton" | "tons" => raw * 10.0,
        _ => raw,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TwinInput {
    Water,
    Fertilizer,
    PestControl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwinRequest {
    pub crop: Option<String>,
    pub crop_id: Option<i32>,
    pub area_acres: f64,
    pub water_level: f64,
    pub fertilizer_level: f64,
    pub pest_control_level: f64,
    pub price_per_quintal: Option<f64>,
}

impl TwinRequest {
    pub fn validate(&self) -> AgriResult<()> {
        if self.crop.as_deref().map(str::trim).unwrap_or("").is_empty() && self.crop_id.is_none() {
            return Err(AgriError::Validation("Either crop or crop_id is required".into()));
        }
        if !(self.area_acres > 0.0) {
            return Err(AgriError::Validation("area_acres must be greater than 0".into()));
        }
        for (name, level) in [
            ("water_level", self.water_level),
            ("fertilizer_level", self.fertilizer_level),
            ("pest_control_level", self.pest_control_level),
        ] {
            if !(0.0..=100.0).contains(&level) {
                return Err(AgriError::Validation(format!("{} must be between 0 and 100", name)));
            }
        }
        if let Some(price) = self.price_per_quintal {
            if price < 0.0 {
                return Err(AgriError::Validation("price_per_quintal must be non-negative".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinProjection {
    pub crop: String,
    pub area_acres: f64,
    pub base_yield_per_acre: f64,
    /// Fraction in [0, 1].
    pub efficiency: f64,
    pub projected_yield_per_acre: f64,
    pub projected_total_yield: f64,
    pub projected_revenue: Option<f64>,
    pub limiting_input: TwinInput,
    /// Extra total yield from raising the limiting input to 100.
    pub marginal_gain: f64,
}

pub fn efficiency(water: f64, fertilizer: f64, pest: f64) -> f64 {
    (WATER_WEIGHT * water + FERTILIZER_WEIGHT * fertilizer + PEST_WEIGHT * pest) / 100.0
}

/// Lowest level wins; ties resolve in water, fertilizer, pest order.
pub fn limiting_input(water: f64, fertilizer: f64, pest: f64) -> TwinInput {
    let mut limiting = (TwinInput::Water, water);
    for candidate in [(TwinInput::Fertilizer, fertilizer), (TwinInput::PestControl, pest)] {
        if candidate.1 < limiting.1 {
            limiting = candidate;
        }
    }
    limiting.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn project(crop: &str, base_yield: f64, req: &TwinRequest) -> TwinProjection {
    let (w, f, p) = (req.water_level, req.fertilizer_level, req.pest_control_level);
    let eff = efficiency(w, f, p);
    let per_acre = base_yield * eff;
    let total = per_acre * req.area_acres;

    let limiting = limiting_input(w, f, p);
    let boosted = match limiting {
        TwinInput::Water => efficiency(100.0, f, p),
        TwinInput::Fertilizer => efficiency(w, 100.0, p),
        TwinInput::PestControl => efficiency(w, f, 100.0),
    };
    let marginal_gain = base_yield * (boosted - eff) * req.area_acres;

    TwinProjection {
        crop: crop.to_string(),
        area_acres: req.area_acres,
        base_yield_per_acre: base_yield,
        efficiency: (eff * 1000.0).round() / 1000.0,
        projected_yield_per_acre: round2(per_acre),
        projected_total_yield: round2(total),
        projected_revenue: req.price_per_quintal.map(|price| round2(total * price)),
        limiting_input: limiting,
        marginal_gain: round2(marginal_gain),
    }
}

pub async fn twin_projection_axum(
    State(state): State<AppState>,
    Json(req): Json<TwinRequest>,
) -> AgriResult<Json<TwinProjection>> {
    req.validate()?;

    let (crop, base_yield) = match req.crop_id {
        Some(id) => {
            let master = db::require_crop_master(&state.pool, id).await?;
            let base = catalog_base_yield(&master)
                .or_else(|| builtin_base_yield(&master.name))
                .unwrap_or(DEFAULT_BASE_YIELD);
            (master.name, base)
        }
        None => {
            let name = req.crop.clone().unwrap_or_default();
            let base = builtin_base_yield(&name).unwrap_or(DEFAULT_BASE_YIELD);
            (name.trim().to_string(), base)
        }
    };

    Ok(Json(project(&crop, base_yield, &req)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(w: f64, f: f64, p: f64) -> TwinRequest {
        TwinRequest {
            crop: Some("Wheat".into()),
            crop_id: None,
            area_acres: 5.0,
            water_level: w,
            fertilizer_level: f,
            pest_control_level: p,
            price_per_quintal: Some(2200.0),
        }
    }

    #[test]
    fn test_full_inputs_reach_base_yield() {
        let out = project("Wheat", 20.0, &request(100.0, 100.0, 100.0));
        assert_eq!(out.efficiency, 1.0);
        assert_eq!(out.projected_yield_per_acre, 20.0);
        assert_eq!(out.projected_total_yield, 100.0);
        assert_eq!(out.projected_revenue, Some(220000.0));
        assert_eq!(out.marginal_gain, 0.0);
    }

    #[test]
    fn test_weighted_efficiency() {
        // 0.40*50 + 0.35*80 + 0.25*100 = 73
        let out = project("Wheat", 20.0, &request(50.0, 80.0, 100.0));
        assert_eq!(out.efficiency, 0.73);
        assert_eq!(out.projected_yield_per_acre, 14.6);
        assert_eq!(out.limiting_input, TwinInput::Water);
        // Raising water to 100 adds 0.20 efficiency over 5 acres.
        assert_eq!(out.marginal_gain, 20.0);
    }

    #[test]
    fn test_limiting_input_ties() {
        assert_eq!(limiting_input(40.0, 40.0, 40.0), TwinInput::Water);
        assert_eq!(limiting_input(60.0, 30.0, 30.0), TwinInput::Fertilizer);
        assert_eq!(limiting_input(60.0, 50.0, 10.0), TwinInput::PestControl);
    }

    #[test]
    fn test_catalog_yield_in_quintals() {
        let mut rice = crate::commands::recommend::tests::crop(1, "Rice", "cereals", "kharif", 1200.0, &["clay"], 2000.0);
        assert_eq!(catalog_base_yield(&rice), Some(20.0));
        rice.yield_unit = "quintal".into();
        assert_eq!(catalog_base_yield(&rice), Some(2000.0));
        rice.typical_yield_per_acre = None;
        assert_eq!(catalog_base_yield(&rice), None);
    }

    #[test]
    fn test_builtin_table() {
        assert_eq!(builtin_base_yield(" Rice "), Some(25.0));
        assert_eq!(builtin_base_yield("dragonfruit"), None);
    }

    #[test]
    fn test_validation() {
        assert!(request(50.0, 50.0, 50.0).validate().is_ok());
        assert!(request(101.0, 50.0, 50.0).validate().is_err());
        assert!(request(50.0, -1.0, 50.0).validate().is_err());

        let mut no_area = request(50.0, 50.0, 50.0);
        no_area.area_acres = 0.0;
        assert!(no_area.validate().is_err());

        let mut no_crop = request(50.0, 50.0, 50.0);
        no_crop.crop = Some("  ".into());
        assert!(no_crop.validate().is_err());
        no_crop.crop_id = Some(3);
        assert!(no_crop.validate().is_ok());
    }
}
