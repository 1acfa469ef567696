//! Chart snapshot (odontogram) models.

use serde::{Deserialize, Serialize};

use super::dentition::Dentition;
use super::treatment::{TreatmentPlanItem, TreatmentStatus};
use super::ValidationError;

/// Clinician-authored periodontal assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl OverallHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallHealth::Excellent => "excellent",
            OverallHealth::Good => "good",
            OverallHealth::Fair => "fair",
            OverallHealth::Poor => "poor",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "excellent" => Ok(OverallHealth::Excellent),
            "good" => Ok(OverallHealth::Good),
            "fair" => Ok(OverallHealth::Fair),
            "poor" => Ok(OverallHealth::Poor),
            _ => Err(ValidationError(format!("Unknown overall health: {}", s))),
        }
    }
}

/// Periodontal summary attached to a snapshot.
///
/// Stored as entered by the clinician. Nothing in this crate derives
/// `overall_health` from the per-tooth measurements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodontalChart {
    pub overall_health: OverallHealth,
    pub general_notes: Option<String>,
    pub recommendations: Vec<String>,
}

/// Metadata for an image attached to a chart. The binary lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartImage {
    pub image_id: String,
    /// Storage key
    pub filename: String,
    /// Name as uploaded
    pub original_name: String,
    pub description: Option<String>,
    pub uploaded_at: String,
}

impl ChartImage {
    pub fn new(
        filename: String,
        original_name: String,
        description: Option<String>,
    ) -> Result<Self, ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError("Image filename is required".into()));
        }
        Ok(Self {
            image_id: uuid::Uuid::new_v4().to_string(),
            filename,
            original_name,
            description,
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Acting clinician and clinic, supplied by the caller's auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalContext {
    pub doctor_id: String,
    pub clinic_id: String,
}

impl ClinicalContext {
    pub fn new(doctor_id: impl Into<String>, clinic_id: impl Into<String>) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            clinic_id: clinic_id.into(),
        }
    }
}

/// One versioned dental chart for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    /// Unique chart ID
    pub chart_id: String,
    pub patient_id: String,
    /// 1-based, strictly increasing per patient
    pub version: u32,
    pub doctor_id: String,
    pub clinic_id: String,
    pub created_at: String,
    pub updated_at: String,
    /// False once archived
    pub is_active: bool,
    pub teeth: Dentition,
    pub periodontal: PeriodontalChart,
    pub treatment_plan: Vec<TreatmentPlanItem>,
    pub images: Vec<ChartImage>,
    /// Bumped on every in-place write; used for compare-and-swap updates
    pub revision: u64,
}

impl ChartSnapshot {
    /// Create a new snapshot owning `teeth`.
    pub fn new(
        patient_id: String,
        version: u32,
        context: &ClinicalContext,
        teeth: Dentition,
        periodontal: PeriodontalChart,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            chart_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            version,
            doctor_id: context.doctor_id.clone(),
            clinic_id: context.clinic_id.clone(),
            created_at: now.clone(),
            updated_at: now,
            is_active: true,
            teeth,
            periodontal,
            treatment_plan: Vec::new(),
            images: Vec::new(),
            revision: 0,
        }
    }

    pub fn find_item(&self, item_id: &str) -> Option<&TreatmentPlanItem> {
        self.treatment_plan.iter().find(|i| i.item_id == item_id)
    }

    pub fn find_item_mut(&mut self, item_id: &str) -> Option<&mut TreatmentPlanItem> {
        self.treatment_plan.iter_mut().find(|i| i.item_id == item_id)
    }

    /// Items still planned or in progress.
    pub fn open_items(&self) -> impl Iterator<Item = &TreatmentPlanItem> {
        self.treatment_plan.iter().filter(|i| i.status.is_open())
    }

    pub fn count_with_status(&self, status: TreatmentStatus) -> usize {
        self.treatment_plan
            .iter()
            .filter(|i| i.status == status)
            .count()
    }

    /// Sum of estimated cost over non-cancelled items.
    pub fn estimated_cost(&self) -> f64 {
        self.treatment_plan
            .iter()
            .filter(|i| i.status != TreatmentStatus::Cancelled)
            .map(|i| i.estimated_cost)
            .sum()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
