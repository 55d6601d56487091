use crate::error::{AgriError, AgriResult};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Regional average footprint in kg CO2e per acre.
pub const REGIONAL_AVERAGE_INTENSITY: f64 = 1500.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonRecord {
    pub record_date: Option<NaiveDate>,
    pub fertilizer_emissions: f64,
    pub fuel_emissions: f64,
    pub electricity_emissions: f64,
    pub livestock_emissions: f64,
    pub other_emissions: f64,
    pub crop_sequestration: f64,
    pub tree_sequestration: f64,
    pub soil_sequestration: f64,
    pub notes: Option<String>,
}

impl CarbonRecord {
    pub fn emissions(&self) -> f64 {
        self.fertilizer_emissions
            + self.fuel_emissions
            + self.electricity_emissions
            + self.livestock_emissions
            + self.other_emissions
    }

    pub fn sequestration(&self) -> f64 {
        self.crop_sequestration + self.tree_sequestration + self.soil_sequestration
    }

    pub fn net_emissions(&self) -> f64 {
        self.emissions() - self.sequestration()
    }

    fn fields(&self) -> [(&'static str, f64); 8] {
        [
            ("fertilizer_emissions", self.fertilizer_emissions),
            ("fuel_emissions", self.fuel_emissions),
            ("electricity_emissions", self.electricity_emissions),
            ("livestock_emissions", self.livestock_emissions),
            ("other_emissions", self.other_emissions),
            ("crop_sequestration", self.crop_sequestration),
            ("tree_sequestration", self.tree_sequestration),
            ("soil_sequestration", self.soil_sequestration),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmissionSource {
    Fertilizer,
    Fuel,
    Electricity,
    Livestock,
    Other,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub farm_area_acres: f64,
    #[serde(default)]
    pub records: Vec<CarbonRecord>,
}

impl SummaryRequest {
    pub fn validate(&self) -> AgriResult<()> {
        if !(self.farm_area_acres > 0.0) {
            return Err(AgriError::Validation("farm_area_acres must be greater than 0".into()));
        }
        for (i, record) in self.records.iter().enumerate() {
            if let Some((name, _)) = record.fields().into_iter().find(|(_, v)| !(*v >= 0.0)) {
                return Err(AgriError::Validation(format!(
                    "records[{}].{} must be non-negative",
                    i, name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SustainabilitySummary {
    pub record_count: usize,
    pub total_emissions: f64,
    pub total_sequestration: f64,
    pub net_footprint: f64,
    /// kg CO2e per acre.
    pub carbon_intensity: f64,
    pub eco_score: i32,
    pub comparison_to_average: f64,
    pub dominant_source: Option<EmissionSource>,
    pub recommendations: Vec<String>,
}

pub fn eco_score(intensity: f64) -> i32 {
    (100.0 - 50.0 * intensity / REGIONAL_AVERAGE_INTENSITY)
        .round()
        .clamp(0.0, 100.0) as i32
}

fn dominant_source(records: &[CarbonRecord]) -> Option<EmissionSource> {
    let totals = [
        (EmissionSource::Fertilizer, records.iter().map(|r| r.fertilizer_emissions).sum::<f64>()),
        (EmissionSource::Fuel, records.iter().map(|r| r.fuel_emissions).sum()),
        (EmissionSource::Electricity, records.iter().map(|r| r.electricity_emissions).sum()),
        (EmissionSource::Livestock, records.iter().map(|r| r.livestock_emissions).sum()),
        (EmissionSource::Other, records.iter().map(|r| r.other_emissions).sum()),
    ];

    let mut best: Option<(EmissionSource, f64)> = None;
    for (source, total) in totals {
        if total > 0.0 && best.map(|(_, b)| total > b).unwrap_or(true) {
            best = Some((source, total));
        }
    }
    best.map(|(s, _)| s)
}

fn source_advice(source: EmissionSource) -> &'static str {
    match source {
        EmissionSource::Fertilizer => {
            "Replace part of the synthetic fertilizer with compost or green manure and follow soil-test doses"
        }
        EmissionSource::Fuel => "Service tractors and pumps regularly and combine field operations to save diesel",
        EmissionSource::Electricity => "Consider solar-powered irrigation pumps to cut electricity emissions",
        EmissionSource::Livestock => "Improve feed quality and route manure through a biogas unit",
        EmissionSource::Other => "Review miscellaneous emission sources for reduction opportunities",
    }
}

pub fn summarize(records: &[CarbonRecord], farm_area_acres: f64) -> SustainabilitySummary {
    let total_emissions: f64 = records.iter().map(CarbonRecord::emissions).sum();
    let total_sequestration: f64 = records.iter().map(CarbonRecord::sequestration).sum();
    let net = total_emissions - total_sequestration;
    let intensity = if farm_area_acres > 0.0 { net / farm_area_acres } else { 0.0 };
    let comparison = (intensity - REGIONAL_AVERAGE_INTENSITY) / REGIONAL_AVERAGE_INTENSITY * 100.0;
    let dominant = dominant_source(records);

    let mut recommendations = Vec::new();
    if let Some(source) = dominant {
        recommendations.push(source_advice(source).to_string());
    }
    if total_emissions > 0.0 && total_sequestration < total_emissions * 0.25 {
        recommendations.push(
            "Increase carbon sequestration with cover crops, reduced tillage and boundary tree planting".into(),
        );
    }
    if intensity > REGIONAL_AVERAGE_INTENSITY {
        recommendations.push(format!(
            "Carbon intensity is {:.0}% above the regional average of {:.0} kg CO2e per acre",
            comparison, REGIONAL_AVERAGE_INTENSITY
        ));
    }
    if recommendations.is_empty() {
        recommendations.push("Farm footprint is below the regional average; keep current practices".into());
    }

    SustainabilitySummary {
        record_count: records.len(),
        total_emissions: round2(total_emissions),
        total_sequestration: round2(total_sequestration),
        net_footprint: round2(net),
        carbon_intensity: round2(intensity),
        eco_score: eco_score(intensity),
        comparison_to_average: round2(comparison),
        dominant_source: dominant,
        recommendations,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub async fn sustainability_summary_axum(
    Json(req): Json<SummaryRequest>,
) -> AgriResult<Json<SustainabilitySummary>> {
    req.validate()?;
    Ok(Json(summarize(&req.records, req.farm_area_acres)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fertilizer: f64, fuel: f64, livestock: f64, tree: f64, soil: f64) -> CarbonRecord {
        CarbonRecord {
            fertilizer_emissions: fertilizer,
            fuel_emissions: fuel,
            livestock_emissions: livestock,
            tree_sequestration: tree,
            soil_sequestration: soil,
            ..Default::default()
        }
    }

    #[test]
    fn test_record_net() {
        let r = record(800.0, 300.0, 0.0, 150.0, 50.0);
        assert_eq!(r.emissions(), 1100.0);
        assert_eq!(r.sequestration(), 200.0);
        assert_eq!(r.net_emissions(), 900.0);
    }

    #[test]
    fn test_eco_score_curve() {
        assert_eq!(eco_score(0.0), 100);
        assert_eq!(eco_score(1500.0), 50);
        assert_eq!(eco_score(3000.0), 0);
        assert_eq!(eco_score(6000.0), 0);
        assert_eq!(eco_score(-500.0), 100);
        assert_eq!(eco_score(750.0), 75);
    }

    #[test]
    fn test_summary_above_average() {
        let records = vec![record(4000.0, 1500.0, 500.0, 0.0, 0.0), record(3000.0, 1000.0, 0.0, 0.0, 0.0)];
        let s = summarize(&records, 4.0);
        assert_eq!(s.total_emissions, 10000.0);
        assert_eq!(s.net_footprint, 10000.0);
        assert_eq!(s.carbon_intensity, 2500.0);
        assert_eq!(s.eco_score, 17);
        assert!((s.comparison_to_average - 66.67).abs() < 1e-9);
        assert_eq!(s.dominant_source, Some(EmissionSource::Fertilizer));
        assert_eq!(s.recommendations.len(), 3);
        assert!(s.recommendations[0].contains("compost"));
        assert!(s.recommendations[2].contains("67% above"));
    }

    #[test]
    fn test_summary_sequestering_farm() {
        let records = vec![record(200.0, 100.0, 0.0, 500.0, 200.0)];
        let s = summarize(&records, 2.0);
        assert_eq!(s.net_footprint, -400.0);
        assert_eq!(s.eco_score, 100);
        assert!(s.comparison_to_average < -100.0);
        assert_eq!(s.recommendations.len(), 1);
        assert!(s.recommendations[0].contains("compost"));
    }

    #[test]
    fn test_empty_records() {
        let s = summarize(&[], 3.0);
        assert_eq!(s.record_count, 0);
        assert_eq!(s.dominant_source, None);
        assert_eq!(s.eco_score, 100);
        assert_eq!(s.comparison_to_average, -100.0);
        assert_eq!(s.recommendations.len(), 1);
    }

    #[test]
    fn test_validation() {
        let ok = SummaryRequest { farm_area_acres: 2.0, records: vec![record(1.0, 0.0, 0.0, 0.0, 0.0)] };
        assert!(ok.validate().is_ok());

        let bad_area = SummaryRequest { farm_area_acres: 0.0, records: Vec::new() };
        assert!(bad_area.validate().is_err());

        let negative = SummaryRequest { farm_area_acres: 2.0, records: vec![record(1.0, -3.0, 0.0, 0.0, 0.0)] };
        match negative.validate() {
            Err(AgriError::Validation(msg)) => assert_eq!(msg, "records[0].fuel_emissions must be non-negative"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
