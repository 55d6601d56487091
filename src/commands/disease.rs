use crate::commands::alerts::{AlertDraft, AlertSeverity, AlertType};
use crate::db::{DbPool, DiseaseMaster};
use crate::error::{AgriError, AgriResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const HF_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const GENERAL_MODEL: &str = "google/vit-base-patch16-224";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Healthy,
    VeryLow,
    Low,
    Moderate,
    High,
}

impl Severity {
    pub fn from_detection(label: &str, confidence: f64) -> Self {
        if is_healthy_label(label) {
            return Severity::Healthy;
        }
        if confidence > 0.9 {
            Severity::High
        } else if confidence > 0.7 {
            Severity::Moderate
        } else if confidence > 0.5 {
            Severity::Low
        } else {
            Severity::VeryLow
        }
    }

    pub fn score(self) -> u8 {
        match self {
            Severity::Healthy => 0,
            Severity::VeryLow => 1,
            Severity::Low => 2,
            Severity::Moderate => 3,
            Severity::High => 4,
        }
    }

    /// Estimated yield loss in percent.
    pub fn yield_impact(self) -> u8 {
        match self {
            Severity::Healthy => 0,
            Severity::VeryLow => 5,
            Severity::Low => 15,
            Severity::Moderate => 30,
            Severity::High => 50,
        }
    }

    /// Points removed from a crop's health score by a scan at this severity.
    pub fn health_reduction(self) -> u8 {
        match self {
            Severity::Healthy | Severity::VeryLow => 0,
            Severity::Low => 10,
            Severity::Moderate => 25,
            Severity::High => 40,
        }
    }

    pub fn urgency(self) -> &'static str {
        match self.score() {
            s if s >= 4 => "immediate",
            3 => "soon",
            _ => "monitor",
        }
    }

    fn alert_severity(self) -> Option<AlertSeverity> {
        match self {
            Severity::Healthy | Severity::VeryLow => None,
            Severity::Low => Some(AlertSeverity::Info),
            Severity::Moderate => Some(AlertSeverity::Warning),
            Severity::High => Some(AlertSeverity::High),
        }
    }
}

pub fn is_healthy_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    ["healthy", "normal", "good"].iter().any(|w| lower.contains(w))
}

/// "tomato___early_blight" -> "Tomato Early Blight"
pub fn clean_label(label: &str) -> String {
    label
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Finds the catalog entry whose name (or local name) overlaps the cleaned
/// label in either direction. The longest matching name wins, so
/// "Tomato Late Blight" resolves to "Late Blight" rather than "Blight".
pub fn match_disease<'a>(catalog: &'a [DiseaseMaster], cleaned: &str) -> Option<&'a DiseaseMaster> {
    let needle = cleaned.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let overlaps = |candidate: &str| {
        let candidate = candidate.to_lowercase();
        !candidate.is_empty() && (candidate.contains(&needle) || needle.contains(&candidate))
    };

    catalog
        .iter()
        .filter(|d| overlaps(&d.name) || d.local_name.as_deref().map(overlaps).unwrap_or(false))
        .max_by_key(|d| d.name.len())
}

fn split_list(text: Option<&str>, sep: &str) -> Vec<String> {
    text.map(|t| {
        t.split(sep)
            .map(|s| s.trim().trim_end_matches('.').trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatments {
    pub organic: Vec<String>,
    pub chemical: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiseaseInfo {
    pub disease_id: Option<i32>,
    pub name: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub causes: String,
    pub treatments: Treatments,
    pub prevention: Vec<String>,
}

impl DiseaseInfo {
    pub fn from_catalog(entry: &DiseaseMaster) -> Self {
        Self {
            disease_id: Some(entry.id),
            name: entry.name.clone(),
            description: entry
                .symptoms
                .clone()
                .unwrap_or_else(|| format!("{} affecting crops.", entry.name)),
            symptoms: split_list(entry.symptoms.as_deref(), ". "),
            causes: entry
                .causes
                .clone()
                .unwrap_or_else(|| "Various environmental and pathogenic factors".into()),
            treatments: Treatments {
                organic: split_list(entry.organic_treatment.as_deref(), ", "),
                chemical: split_list(entry.chemical_treatment.as_deref(), ", "),
            },
            prevention: split_list(entry.prevention.as_deref(), ", "),
        }
    }

    pub fn generic(name: &str, crop_type: &str) -> Self {
        Self {
            disease_id: None,
            name: name.to_string(),
            description: format!("Potential {} detected in {}.", name, crop_type),
            symptoms: vec![format!("Visual symptoms of {}", name)],
            causes: "Various environmental and pathogenic factors".into(),
            treatments: Treatments {
                organic: vec!["Consult local agricultural officer".into()],
                chemical: vec!["Consult local agricultural officer".into()],
            },
            prevention: vec![
                "Regular monitoring".into(),
                "Proper plant spacing".into(),
                "Crop rotation".into(),
            ],
        }
    }

    pub fn healthy() -> Self {
        Self {
            disease_id: None,
            name: "Healthy".into(),
            description: "Plant appears healthy with no visible disease symptoms.".into(),
            symptoms: Vec::new(),
            causes: String::new(),
            treatments: Treatments { organic: Vec::new(), chemical: Vec::new() },
            prevention: vec![
                "Continue regular monitoring".into(),
                "Maintain proper spacing".into(),
                "Ensure good drainage".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Client,
    HuggingFace,
    Simulated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub predictions: Vec<LabelScore>,
    pub source: DetectionSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseAnalysis {
    pub disease_id: Option<i32>,
    pub disease_name: String,
    pub crop_type: String,
    pub is_healthy: bool,
    /// Percent, one decimal.
    pub confidence: f64,
    pub severity: Severity,
    pub severity_score: u8,
    pub estimated_yield_impact: u8,
    pub health_reduction: u8,
    pub urgency: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub causes: String,
    pub treatments: Treatments,
    pub prevention: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: DetectionSource,
    pub all_predictions: Vec<LabelScore>,
    pub alert: Option<AlertDraft>,
}

pub fn recommendations(info: &DiseaseInfo) -> Vec<String> {
    let mut recs = Vec::new();
    if !info.prevention.is_empty() {
        recs.push(format!("Prevention: {}", info.prevention.join(", ")));
    }
    if !info.treatments.organic.is_empty() {
        recs.push(format!("Organic Treatment: {}", info.treatments.organic.join(", ")));
    }
    if !info.treatments.chemical.is_empty() {
        recs.push(format!("Chemical Treatment: {}", info.treatments.chemical.join(", ")));
    }
    if recs.is_empty() {
        recs.push("Consult local agricultural expert for treatment advice".into());
    }
    recs
}

pub fn disease_alert(info: &DiseaseInfo, severity: Severity, confidence_pct: f64) -> Option<AlertDraft> {
    let level = severity.alert_severity()?;
    Some(AlertDraft {
        alert_type: AlertType::Disease,
        severity: level,
        title: format!("Disease Detected: {}", info.name),
        message: format!("Confidence: {:.1}%. {}", confidence_pct, info.description),
        action_url: Some("/diseases".into()),
        action_label: Some("View Treatment".into()),
    })
}

pub fn analyze_detection(detection: &Detection, crop_type: &str, catalog: &[DiseaseMaster]) -> DiseaseAnalysis {
    let severity = Severity::from_detection(&detection.label, detection.confidence);
    let is_healthy = severity == Severity::Healthy;

    let info = if is_healthy {
        DiseaseInfo::healthy()
    } else {
        let cleaned = clean_label(&detection.label);
        match match_disease(catalog, &cleaned) {
            Some(entry) => DiseaseInfo::from_catalog(entry),
            None => DiseaseInfo::generic(&cleaned, crop_type),
        }
    };

    let confidence = (detection.confidence * 1000.0).round() / 10.0;

    DiseaseAnalysis {
        disease_id: info.disease_id,
        disease_name: info.name.clone(),
        crop_type: crop_type.to_string(),
        is_healthy,
        confidence,
        severity,
        severity_score: severity.score(),
        estimated_yield_impact: severity.yield_impact(),
        health_reduction: severity.health_reduction(),
        urgency: severity.urgency().to_string(),
        description: info.description.clone(),
        symptoms: info.symptoms.clone(),
        causes: info.causes.clone(),
        recommendations: recommendations(&info),
        alert: disease_alert(&info, severity, confidence),
        treatments: info.treatments,
        prevention: info.prevention,
        source: detection.source,
        all_predictions: detection.predictions.clone(),
    }
}

/// Weighted draw: 60% healthy, 25% early blight, 15% downy mildew.
pub fn simulated_detection<R: Rng + ?Sized>(rng: &mut R) -> Detection {
    let roll: u32 = rng.random_range(0..100);
    let (label, confidence) = match roll {
        0..=59 => ("Healthy", 0.952),
        60..=84 => ("Early Blight", 0.875),
        _ => ("Downy Mildew", 0.823),
    };
    Detection {
        label: label.into(),
        confidence,
        predictions: vec![LabelScore { label: label.into(), score: confidence }],
        source: DetectionSource::Simulated,
    }
}

pub fn model_for_crop(crop_type: &str) -> &'static str {
    match crop_type.to_lowercase().as_str() {
        "tomato" => "linkanjarad/tomato-leaf-disease-classification",
        "potato" => "nateraw/potato-disease-classification",
        "grape" => "marshmelo/grape-disease-detection",
        "rice" => "marshmelo/rice-disease-detection",
        _ => GENERAL_MODEL,
    }
}

/// Maps ImageNet-style labels from the general model onto a crop type.
pub fn crop_from_labels(predictions: &[LabelScore]) -> Option<&'static str> {
    const KEYWORDS: &[(&str, &str)] = &[
        ("tomato", "tomato"),
        ("potato", "potato"),
        ("grape", "grape"),
        ("rice", "rice"),
        ("paddy", "rice"),
        ("corn", "maize"),
        ("maize", "maize"),
        ("wheat", "wheat"),
    ];
    predictions.iter().find_map(|p| {
        let label = p.label.to_lowercase();
        KEYWORDS.iter().find(|(k, _)| label.contains(k)).map(|(_, crop)| *crop)
    })
}

async fn classify(client: &reqwest::Client, api_key: &str, model: &str, image: &[u8]) -> AgriResult<Vec<LabelScore>> {
    let res = client
        .post(format!("{}/{}", HF_BASE_URL, model))
        .bearer_auth(api_key)
        .body(image.to_vec())
        .timeout(Duration::from_secs(30))
        .send()
        .await?;

    if !res.status().is_success() {
        return Err(AgriError::Upstream(format!("Classifier error: {}", res.status())));
    }

    let mut predictions: Vec<LabelScore> = res.json().await?;
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(predictions)
}

async fn classify_with_huggingface(
    client: &reqwest::Client,
    api_key: &str,
    crop_type: Option<&str>,
    image: &[u8],
) -> AgriResult<(String, Detection)> {
    let crop = match crop_type {
        Some(c) => c.to_lowercase(),
        None => {
            let general = classify(client, api_key, GENERAL_MODEL, image).await?;
            crop_from_labels(&general).unwrap_or("unknown").to_string()
        }
    };

    let predictions = classify(client, api_key, model_for_crop(&crop), image).await?;
    let top = predictions
        .first()
        .cloned()
        .ok_or_else(|| AgriError::Upstream("Classifier returned no predictions".into()))?;

    Ok((
        crop,
        Detection {
            label: top.label,
            confidence: top.score,
            predictions: predictions.into_iter().take(5).collect(),
            source: DetectionSource::HuggingFace,
        },
    ))
}

pub fn decode_image_base64(data: &str) -> AgriResult<Vec<u8>> {
    // Accept data URLs as well as bare payloads.
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    Ok(general_purpose::STANDARD.decode(payload.trim())?)
}

/// Accepts only http(s) URLs that point at a public host.
pub fn parse_image_url(raw: &str) -> AgriResult<reqwest::Url> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| AgriError::Validation(format!("image_url is not a valid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AgriError::Validation(format!(
            "image_url scheme '{}' is not allowed",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_lowercase())
        .ok_or_else(|| AgriError::Validation("image_url must include a host".into()))?;
    let internal = host == "localhost"
        || host.ends_with(".localhost")
        || match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
            }
            Ok(IpAddr::V6(ip)) => ip.is_loopback() || ip.is_unspecified(),
            Err(_) => false,
        };
    if internal {
        return Err(AgriError::Validation("image_url must point at a public host".into()));
    }
    Ok(url)
}

async fn fetch_image(client: &reqwest::Client, url: reqwest::Url) -> AgriResult<Vec<u8>> {
    let res = client.get(url).timeout(Duration::from_secs(30)).send().await?;
    if !res.status().is_success() {
        return Err(AgriError::Upstream(format!("Image download failed: {}", res.status())));
    }
    Ok(res.bytes().await?.to_vec())
}

pub async fn list_diseases(pool: &DbPool) -> AgriResult<Vec<DiseaseMaster>> {
    let rows = sqlx::query_as::<_, DiseaseMaster>(
        "SELECT id, name, local_name, category, affected_crops, symptoms, causes,
                prevention, organic_treatment, chemical_treatment
         FROM disease_master ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_disease(pool: &DbPool, id: i32) -> AgriResult<Option<DiseaseMaster>> {
    let row = sqlx::query_as::<_, DiseaseMaster>(
        "SELECT id, name, local_name, category, affected_crops, symptoms, causes,
                prevention, organic_treatment, chemical_treatment
         FROM disease_master WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzePayload {
    pub crop_type: Option<String>,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
}

impl AnalyzePayload {
    pub fn validate(&self) -> AgriResult<()> {
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(AgriError::Validation("confidence must be between 0 and 1".into()));
            }
        }
        if self.confidence.is_some() && self.label.is_none() {
            return Err(AgriError::Validation("confidence requires a label".into()));
        }
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                return Err(AgriError::Validation("label must not be empty".into()));
            }
        }
        if let Some(url) = &self.image_url {
            parse_image_url(url)?;
        }
        Ok(())
    }
}

async fn detect(state: &AppState, payload: &AnalyzePayload) -> AgriResult<(Option<String>, Detection)> {
    if let Some(label) = &payload.label {
        let detection = Detection {
            label: label.trim().to_string(),
            confidence: payload.confidence.unwrap_or(0.0),
            predictions: Vec::new(),
            source: DetectionSource::Client,
        };
        return Ok((payload.crop_type.clone(), detection));
    }

    if let Some(key) = state.config.huggingface_api_key.as_deref() {
        let image = match (&payload.image_base64, &payload.image_url) {
            (Some(data), _) => Some(decode_image_base64(data)?),
            (None, Some(url)) => match fetch_image(&state.http, parse_image_url(url)?).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("Image download failed, simulating: {}", e);
                    None
                }
            },
            (None, None) => None,
        };

        if let Some(image) = image {
            match classify_with_huggingface(&state.http, key, payload.crop_type.as_deref(), &image).await {
                Ok((crop, detection)) => return Ok((Some(crop), detection)),
                Err(e) => tracing::warn!("Disease classification failed, simulating: {}", e),
            }
        }
    }

    Ok((payload.crop_type.clone(), simulated_detection(&mut rand::rng())))
}

pub async fn analyze_disease_axum(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzePayload>,
) -> AgriResult<Json<DiseaseAnalysis>> {
    payload.validate()?;
    let (crop_type, detection) = detect(&state, &payload).await?;
    let catalog = list_diseases(&state.pool).await?;
    let crop = crop_type.unwrap_or_else(|| "unknown".into());

    let analysis = analyze_detection(&detection, &crop, &catalog);
    tracing::info!(
        "Disease analysis: {} ({:.1}%, {:?}) via {:?}",
        analysis.disease_name,
        analysis.confidence,
        analysis.severity,
        analysis.source
    );
    Ok(Json(analysis))
}

pub async fn list_diseases_axum(State(state): State<AppState>) -> AgriResult<Json<Vec<DiseaseMaster>>> {
    Ok(Json(list_diseases(&state.pool).await?))
}

pub async fn get_disease_axum(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AgriResult<Json<DiseaseMaster>> {
    get_disease(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AgriError::NotFound(format!("Disease {}", id)))
}
