//! Odontogram Core Library
//!
//! Versioned dental charting and treatment planning with a hash-chained
//! completed-treatment audit log.
//!
//! # Architecture
//!
//! ```text
//!   Clinician action (exam, tooth finding, plan change, procedure done)
//!                                   │
//!                          ┌────────▼────────┐
//!                          │  ChartManager   │  versioning, state machine,
//!                          └────────┬────────┘  validation
//!                                   │
//!              ┌────────────────────┼─────────────────────┐
//!              │                    │                     │
//!              ▼                    ▼                     ▼
//!       New chart version   In-place ledger update   Audit append
//!       (32 owned teeth)    (revision CAS)           (prev_hash → entry_hash)
//!                                   │
//!                    ┌──────────────┴──────────────┐
//!                    ▼                             ▼
//!               Statistics                  Billing export
//!            (computed on read)           (JSON / CSV + chain check)
//! ```
//!
//! # Core Principle
//!
//! **Charts are never overwritten and audit entries are never changed.** A
//! new examination makes a new version; a completed procedure appends to the
//! audit chain.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage with append-only triggers
//! - [`models`]: Domain types (ToothRecord, Dentition, ChartSnapshot, etc.)
//! - [`engine`]: Chart lifecycle, treatment ledger, audit chain, statistics
//! - [`config`]: Startup configuration
//! - [`export`]: Billing reconciliation export

pub mod config;
pub mod db;
pub mod engine;
pub mod export;
pub mod models;

// Re-export commonly used types
pub use config::{ActivePolicy, ChartConfig};
pub use db::{ChartQuery, Database};
pub use engine::{
    AuditChainReport, ChartError, ChartManager, ChartPage, ChartResult, ChartStatistics,
    ChartStore, NewChartVersion, PatientDirectory, StatsScope,
};
pub use models::{
    ChartSnapshot, ClinicalContext, CompletedTreatment, Dentition, PatientRecord, Priority,
    Surface, SurfaceCondition, ToothNumber, ToothRecord, ToothUpdate, TreatmentPlanItem,
    TreatmentStatus,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use models::{
    ChartImage, Mobility, NewCompletedTreatment, NewTreatmentItem, OverallHealth,
    PeriodontalChart, PocketDepths, SurfaceState, Surfaces, ValidationError,
};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum OdontogramError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ChartError> for OdontogramError {
    fn from(e: ChartError) -> Self {
        match e {
            ChartError::Validation(msg) => OdontogramError::Validation(msg),
            ChartError::NotFound(msg) => OdontogramError::NotFound(msg),
            ChartError::Conflict(msg) => OdontogramError::Conflict(msg),
            ChartError::InvalidTransition { from, to } => {
                OdontogramError::InvalidTransition(format!("{} -> {}", from, to))
            }
            ChartError::Storage(err) => OdontogramError::DatabaseError(err.to_string()),
        }
    }
}

impl From<db::DbError> for OdontogramError {
    fn from(e: db::DbError) -> Self {
        ChartError::from(e).into()
    }
}

impl From<ValidationError> for OdontogramError {
    fn from(e: ValidationError) -> Self {
        OdontogramError::Validation(e.0)
    }
}

impl From<serde_json::Error> for OdontogramError {
    fn from(e: serde_json::Error) -> Self {
        OdontogramError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for OdontogramError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        OdontogramError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `active_policy` is "allow-concurrent" (default) or "single-active".
#[uniffi::export]
pub fn open_database(
    path: String,
    active_policy: Option<String>,
) -> Result<Arc<OdontogramCore>, OdontogramError> {
    let config = ChartConfig::from_env_values(Some(path), active_policy)?;
    let db = Database::open(config.database_path())?;
    tracing::info!(
        path = %config.database_path().display(),
        policy = %config.active_policy(),
        "Opened chart database"
    );
    Ok(Arc::new(OdontogramCore {
        db: Arc::new(Mutex::new(db)),
        config,
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<OdontogramCore>, OdontogramError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(OdontogramCore {
        db: Arc::new(Mutex::new(db)),
        config: ChartConfig::default(),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// The mutex serializes every operation, so check-then-act sequences
/// (version assignment, ledger updates) never interleave within one process.
#[derive(uniffi::Object)]
pub struct OdontogramCore {
    db: Arc<Mutex<Database>>,
    config: ChartConfig,
}

#[uniffi::export]
impl OdontogramCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create a new patient.
    pub fn create_patient(
        &self,
        first_name: String,
        last_name: String,
        patient_number: Option<String>,
        date_of_birth: Option<String>,
    ) -> Result<FfiPatient, OdontogramError> {
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(OdontogramError::Validation("Patient name is required".into()));
        }
        let db = self.db.lock()?;
        let mut patient = PatientRecord::new(first_name, last_name);
        patient.patient_number = patient_number;
        patient.date_of_birth = date_of_birth;
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, OdontogramError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search patients by last name.
    pub fn search_patients(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, OdontogramError> {
        let db = self.db.lock()?;
        let patients = db.search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Chart Operations
    // =========================================================================

    /// Create version 1 with 32 healthy teeth.
    pub fn initialize_chart(
        &self,
        patient_id: String,
        doctor_id: String,
        clinic_id: String,
    ) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let chart = manager.initialize_chart(&patient_id, &ClinicalContext::new(doctor_id, clinic_id))?;
        Ok(chart.into())
    }

    /// Return the current chart, creating one when needed.
    pub fn ensure_chart(
        &self,
        patient_id: String,
        doctor_id: String,
        clinic_id: String,
    ) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let chart = manager.ensure_chart(&patient_id, &ClinicalContext::new(doctor_id, clinic_id))?;
        Ok(chart.into())
    }

    /// Create a new version with 32 healthy teeth.
    pub fn create_version(
        &self,
        patient_id: String,
        doctor_id: String,
        clinic_id: String,
        version: Option<u32>,
        teeth: Option<Vec<FfiTooth>>,
        periodontal: Option<FfiPeriodontalChart>,
        treatment_plan: Vec<FfiNewTreatmentItem>,
    ) -> Result<FfiChart, OdontogramError> {
        let teeth = teeth
            .map(|records| {
                records
                    .into_iter()
                    .map(ToothRecord::try_from)
                    .collect::<Result<Vec<_>, ValidationError>>()
                    .and_then(Dentition::from_records)
            })
            .transpose()?;

        let input = NewChartVersion {
            version,
            teeth,
            periodontal: periodontal
                .map(PeriodontalChart::try_from)
                .transpose()?
                .unwrap_or_default(),
            treatment_plan: treatment_plan
                .into_iter()
                .map(NewTreatmentItem::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        };

        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let chart = manager.create_version(&patient_id, &ClinicalContext::new(doctor_id, clinic_id), input)?;
        Ok(chart.into())
    }

    /// Create a new version from the latest teeth with findings applied.
    pub fn revise_teeth(
        &self,
        patient_id: String,
        doctor_id: String,
        clinic_id: String,
        updates: Vec<FfiToothUpdate>,
        periodontal: Option<FfiPeriodontalChart>,
    ) -> Result<FfiChart, OdontogramError> {
        let updates = updates
            .into_iter()
            .map(|u| Ok((u.number, ToothUpdate::try_from(u)?)))
            .collect::<Result<Vec<_>, ValidationError>>()?;
        let periodontal = periodontal.map(PeriodontalChart::try_from).transpose()?;

        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let chart = manager.revise_teeth(
            &patient_id,
            &ClinicalContext::new(doctor_id, clinic_id),
            &updates,
            periodontal,
        )?;
        Ok(chart.into())
    }

    /// Archive a chart version.
    pub fn archive_chart(&self, patient_id: String, version: u32) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.archive_chart(&patient_id, version)?.into())
    }

    /// Get a chart by patient and version.
    pub fn get_chart(&self, patient_id: String, version: u32) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.get_chart(&patient_id, version)?.into())
    }

    /// Get the highest active version.
    pub fn current_chart(&self, patient_id: String) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.current_chart(&patient_id)?.into())
    }

    /// Get the highest version, archived or not.
    pub fn latest_chart(&self, patient_id: String) -> Result<FfiChart, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.latest_chart(&patient_id)?.into())
    }

    /// List a patient's charts, newest first.
    pub fn list_charts(
        &self,
        patient_id: String,
        include_archived: bool,
    ) -> Result<Vec<FfiChart>, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let charts = manager.list_charts(&patient_id, include_archived)?;
        Ok(charts.into_iter().map(|c| c.into()).collect())
    }

    /// Filtered, paged chart listing across patients, newest first.
    ///
    /// `page` defaults to 1 and `limit` to 10.
    pub fn find_charts(
        &self,
        patient_id: Option<String>,
        doctor_id: Option<String>,
        clinic_id: Option<String>,
        include_archived: bool,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<FfiChartPage, OdontogramError> {
        let query = ChartQuery {
            patient_id,
            doctor_id,
            clinic_id,
            include_archived,
        };
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let page = manager.find_charts(
            &query,
            page.unwrap_or(1),
            limit.unwrap_or(engine::DEFAULT_PAGE_SIZE),
        )?;
        Ok(page.into())
    }

    /// Charts authored by a doctor, across patients.
    pub fn charts_by_doctor(&self, doctor_id: String) -> Result<Vec<FfiChart>, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let charts = manager.charts_by_doctor(&doctor_id)?;
        Ok(charts.into_iter().map(|c| c.into()).collect())
    }

    /// Full chart as JSON.
    pub fn chart_json(&self, patient_id: String, version: u32) -> Result<String, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let chart = manager.get_chart(&patient_id, version)?;
        Ok(serde_json::to_string_pretty(&chart)?)
    }

    /// Attach image metadata to a chart.
    pub fn attach_image(
        &self,
        patient_id: String,
        version: u32,
        filename: String,
        original_name: String,
        description: Option<String>,
    ) -> Result<FfiChartImage, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let image = manager.attach_image(&patient_id, version, filename, original_name, description)?;
        Ok(image.into())
    }

    // =========================================================================
    // Treatment Plan Operations
    // =========================================================================

    /// Add a planned item to a chart.
    pub fn add_treatment_item(
        &self,
        patient_id: String,
        version: u32,
        item: FfiNewTreatmentItem,
    ) -> Result<FfiTreatmentItem, OdontogramError> {
        let item = NewTreatmentItem::try_from(item)?;
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.add_treatment_item(&patient_id, version, item)?.into())
    }

    /// Move an item to a new status ("in-progress", "completed", "cancelled").
    pub fn transition_treatment(
        &self,
        patient_id: String,
        version: u32,
        item_id: String,
        status: String,
        doctor_id: String,
        clinic_id: String,
    ) -> Result<FfiTreatmentItem, OdontogramError> {
        let to = TreatmentStatus::parse(&status)?;
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let item = manager.transition_treatment(
            &patient_id,
            version,
            &item_id,
            to,
            &ClinicalContext::new(doctor_id, clinic_id),
        )?;
        Ok(item.into())
    }

    /// Overwrite the whole plan. Existing items are dropped.
    pub fn replace_treatment_plan(
        &self,
        patient_id: String,
        version: u32,
        items: Vec<FfiNewTreatmentItem>,
    ) -> Result<Vec<FfiTreatmentItem>, OdontogramError> {
        let items = items
            .into_iter()
            .map(NewTreatmentItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let items = manager.replace_treatment_plan(&patient_id, version, items)?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    /// Copy open items from one version into another.
    pub fn carry_forward_open_items(
        &self,
        patient_id: String,
        from_version: u32,
        to_version: u32,
    ) -> Result<Vec<FfiTreatmentItem>, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let items = manager.carry_forward_open_items(&patient_id, from_version, to_version)?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Append a performed procedure to the audit log.
    pub fn record_completed_treatment(
        &self,
        patient_id: String,
        version: u32,
        treatment: FfiNewCompletedTreatment,
        doctor_id: String,
        clinic_id: String,
    ) -> Result<FfiCompletedTreatment, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let entry = manager.record_completed_treatment(
            &patient_id,
            version,
            treatment.into(),
            &ClinicalContext::new(doctor_id, clinic_id),
        )?;
        Ok(entry.into())
    }

    /// Audit entries for a chart in append order.
    pub fn completed_treatments(
        &self,
        patient_id: String,
        version: u32,
    ) -> Result<Vec<FfiCompletedTreatment>, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        let entries = manager.completed_treatments(&patient_id, version)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// Recompute and check a chart's audit chain.
    pub fn verify_audit_chain(
        &self,
        patient_id: String,
        version: u32,
    ) -> Result<FfiAuditChainReport, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.verify_audit_chain(&patient_id, version)?.into())
    }

    // =========================================================================
    // Reporting Operations
    // =========================================================================

    /// Aggregate statistics for a scope.
    pub fn statistics(&self, scope: FfiStatsScope) -> Result<FfiChartStatistics, OdontogramError> {
        let db = self.db.lock()?;
        let manager = ChartManager::for_database(&db, &self.config);
        Ok(manager.statistics(&scope.into())?.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export billing data as JSON.
    pub fn export_billing_json(&self) -> Result<String, OdontogramError> {
        let db = self.db.lock()?;
        let exporter = export::BillingExporter::new(&*db);
        let batch = exporter.export_all()?;
        Ok(batch.to_json()?)
    }

    /// Export billing data as CSV.
    pub fn export_billing_csv(&self) -> Result<String, OdontogramError> {
        let db = self.db.lock()?;
        let exporter = export::BillingExporter::new(&*db);
        let batch = exporter.export_all()?;
        Ok(batch.to_csv())
    }

    /// Export billing entries recorded at or after an RFC3339 timestamp as CSV.
    pub fn export_billing_since_csv(&self, since: String) -> Result<String, OdontogramError> {
        let db = self.db.lock()?;
        let exporter = export::BillingExporter::new(&*db);
        let batch = exporter.export_since(&since)?;
        Ok(batch.to_csv())
    }

    /// Export billing for one chart as JSON.
    pub fn export_chart_billing_json(
        &self,
        patient_id: String,
        version: u32,
    ) -> Result<String, OdontogramError> {
        let db = self.db.lock()?;
        let exporter = export::BillingExporter::new(&*db);
        let export = exporter.export_chart(&patient_id, version)?;
        Ok(export.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub patient_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
}

impl From<PatientRecord> for FfiPatient {
    fn from(patient: PatientRecord) -> Self {
        Self {
            patient_id: patient.patient_id,
            patient_number: patient.patient_number,
            first_name: patient.first_name,
            last_name: patient.last_name,
            date_of_birth: patient.date_of_birth,
        }
    }
}

/// FFI-safe surface state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSurface {
    /// "mesial", "distal", "occlusal", "buccal" or "lingual"
    pub surface: String,
    /// "healthy", "caries", "filling", "crown", "missing", "implant" or "bridge"
    pub condition: String,
    pub material: Option<String>,
    pub notes: Option<String>,
}

/// FFI-safe pocket depths (mm).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPocketDepths {
    pub mesial: Option<u8>,
    pub distal: Option<u8>,
    pub buccal: Option<u8>,
    pub lingual: Option<u8>,
}

/// FFI-safe tooth record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTooth {
    pub number: u8,
    pub fdi: u8,
    pub quadrant: String,
    pub surfaces: Vec<FfiSurface>,
    pub mobility: u8,
    pub pocket_depth: FfiPocketDepths,
    pub bleeding: bool,
    pub plaque: bool,
    pub notes: Option<String>,
}

impl From<&ToothRecord> for FfiTooth {
    fn from(tooth: &ToothRecord) -> Self {
        Self {
            number: tooth.number.get(),
            fdi: tooth.number.to_fdi(),
            quadrant: tooth.quadrant().as_str().to_string(),
            surfaces: tooth
                .surfaces
                .iter()
                .map(|(surface, state)| FfiSurface {
                    surface: surface.as_str().to_string(),
                    condition: state.condition.as_str().to_string(),
                    material: state.material.clone(),
                    notes: state.notes.clone(),
                })
                .collect(),
            mobility: tooth.mobility.grade(),
            pocket_depth: FfiPocketDepths {
                mesial: tooth.pocket_depth.mesial,
                distal: tooth.pocket_depth.distal,
                buccal: tooth.pocket_depth.buccal,
                lingual: tooth.pocket_depth.lingual,
            },
            bleeding: tooth.bleeding,
            plaque: tooth.plaque,
            notes: tooth.notes.clone(),
        }
    }
}

/// `fdi` and `quadrant` are derived from `number` and ignored on input.
/// Surfaces that are not listed stay healthy.
impl TryFrom<FfiTooth> for ToothRecord {
    type Error = ValidationError;

    fn try_from(tooth: FfiTooth) -> Result<Self, Self::Error> {
        let mut surfaces = Surfaces::default();
        for surface in tooth.surfaces {
            let (surface, state) = parse_surface(surface)?;
            *surfaces.get_mut(surface) = state;
        }

        Ok(ToothRecord {
            number: ToothNumber::new(tooth.number)?,
            surfaces,
            mobility: Mobility::new(tooth.mobility)?,
            pocket_depth: PocketDepths::new(
                tooth.pocket_depth.mesial,
                tooth.pocket_depth.distal,
                tooth.pocket_depth.buccal,
                tooth.pocket_depth.lingual,
            )?,
            bleeding: tooth.bleeding,
            plaque: tooth.plaque,
            notes: tooth.notes,
        })
    }
}

fn parse_surface(surface: FfiSurface) -> Result<(Surface, SurfaceState), ValidationError> {
    Ok((
        Surface::parse(&surface.surface)?,
        SurfaceState {
            condition: SurfaceCondition::parse(&surface.condition)?,
            material: surface.material,
            notes: surface.notes,
        },
    ))
}

/// FFI-safe partial tooth change. Unset fields are left as they are.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiToothUpdate {
    pub number: u32,
    pub surfaces: Vec<FfiSurface>,
    pub mobility: Option<u8>,
    pub pocket_depth: Option<FfiPocketDepths>,
    pub bleeding: Option<bool>,
    pub plaque: Option<bool>,
    pub notes: Option<String>,
}

impl TryFrom<FfiToothUpdate> for ToothUpdate {
    type Error = ValidationError;

    fn try_from(update: FfiToothUpdate) -> Result<Self, Self::Error> {
        let surfaces = update
            .surfaces
            .into_iter()
            .map(parse_surface)
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(ToothUpdate {
            surfaces,
            mobility: update.mobility.map(Mobility::new).transpose()?,
            pocket_depth: update
                .pocket_depth
                .map(|d| PocketDepths::new(d.mesial, d.distal, d.buccal, d.lingual))
                .transpose()?,
            bleeding: update.bleeding,
            plaque: update.plaque,
            notes: update.notes,
        })
    }
}

/// FFI-safe periodontal summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPeriodontalChart {
    /// "excellent", "good", "fair" or "poor"
    pub overall_health: String,
    pub general_notes: Option<String>,
    pub recommendations: Vec<String>,
}

impl TryFrom<FfiPeriodontalChart> for PeriodontalChart {
    type Error = ValidationError;

    fn try_from(chart: FfiPeriodontalChart) -> Result<Self, Self::Error> {
        Ok(PeriodontalChart {
            overall_health: OverallHealth::parse(&chart.overall_health)?,
            general_notes: chart.general_notes,
            recommendations: chart.recommendations,
        })
    }
}

impl From<PeriodontalChart> for FfiPeriodontalChart {
    fn from(chart: PeriodontalChart) -> Self {
        Self {
            overall_health: chart.overall_health.as_str().to_string(),
            general_notes: chart.general_notes,
            recommendations: chart.recommendations,
        }
    }
}

/// FFI-safe treatment plan item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTreatmentItem {
    pub item_id: String,
    pub tooth: u8,
    pub procedure: String,
    pub priority: String,
    pub estimated_cost: f64,
    pub estimated_duration_minutes: u32,
    pub status: String,
    pub notes: Option<String>,
    pub scheduled_date: Option<String>,
    pub completed_at: Option<String>,
    pub completed_by: Option<String>,
}

impl From<TreatmentPlanItem> for FfiTreatmentItem {
    fn from(item: TreatmentPlanItem) -> Self {
        Self {
            item_id: item.item_id,
            tooth: item.tooth.get(),
            procedure: item.procedure,
            priority: item.priority.as_str().to_string(),
            estimated_cost: item.estimated_cost,
            estimated_duration_minutes: item.estimated_duration_minutes,
            status: item.status.as_str().to_string(),
            notes: item.notes,
            scheduled_date: item.scheduled_date,
            completed_at: item.completed_at,
            completed_by: item.completed_by,
        }
    }
}

/// FFI-safe input for a new plan item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewTreatmentItem {
    pub tooth: u32,
    pub procedure: String,
    /// Defaults to "medium"
    pub priority: Option<String>,
    pub estimated_cost: f64,
    pub estimated_duration_minutes: u32,
    pub notes: Option<String>,
    pub scheduled_date: Option<String>,
}

impl TryFrom<FfiNewTreatmentItem> for NewTreatmentItem {
    type Error = ValidationError;

    fn try_from(item: FfiNewTreatmentItem) -> Result<Self, Self::Error> {
        Ok(NewTreatmentItem {
            tooth: item.tooth,
            procedure: item.procedure,
            priority: item
                .priority
                .as_deref()
                .map(Priority::parse)
                .transpose()?
                .unwrap_or_default(),
            estimated_cost: item.estimated_cost,
            estimated_duration_minutes: item.estimated_duration_minutes,
            notes: item.notes,
            scheduled_date: item.scheduled_date,
        })
    }
}

/// FFI-safe image metadata.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChartImage {
    pub image_id: String,
    pub filename: String,
    pub original_name: String,
    pub description: Option<String>,
    pub uploaded_at: String,
}

impl From<ChartImage> for FfiChartImage {
    fn from(image: ChartImage) -> Self {
        Self {
            image_id: image.image_id,
            filename: image.filename,
            original_name: image.original_name,
            description: image.description,
            uploaded_at: image.uploaded_at,
        }
    }
}

/// FFI-safe chart snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChart {
    pub chart_id: String,
    pub patient_id: String,
    pub version: u32,
    pub doctor_id: String,
    pub clinic_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_active: bool,
    pub teeth: Vec<FfiTooth>,
    pub periodontal: FfiPeriodontalChart,
    pub treatment_plan: Vec<FfiTreatmentItem>,
    pub images: Vec<FfiChartImage>,
}

impl From<ChartSnapshot> for FfiChart {
    fn from(chart: ChartSnapshot) -> Self {
        Self {
            teeth: chart.teeth.iter().map(FfiTooth::from).collect(),
            chart_id: chart.chart_id,
            patient_id: chart.patient_id,
            version: chart.version,
            doctor_id: chart.doctor_id,
            clinic_id: chart.clinic_id,
            created_at: chart.created_at,
            updated_at: chart.updated_at,
            is_active: chart.is_active,
            periodontal: chart.periodontal.into(),
            treatment_plan: chart.treatment_plan.into_iter().map(|i| i.into()).collect(),
            images: chart.images.into_iter().map(|i| i.into()).collect(),
        }
    }
}

/// FFI-safe page of charts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChartPage {
    pub charts: Vec<FfiChart>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl From<ChartPage> for FfiChartPage {
    fn from(page: ChartPage) -> Self {
        Self {
            charts: page.charts.into_iter().map(|c| c.into()).collect(),
            total: page.total,
            page: page.page,
            total_pages: page.total_pages,
        }
    }
}

/// FFI-safe input for a completed treatment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewCompletedTreatment {
    pub tooth: u32,
    pub procedure: String,
    /// RFC 3339, defaults to now
    pub date: Option<String>,
    pub cost: f64,
    pub notes: Option<String>,
}

impl From<FfiNewCompletedTreatment> for NewCompletedTreatment {
    fn from(t: FfiNewCompletedTreatment) -> Self {
        NewCompletedTreatment {
            tooth: t.tooth,
            procedure: t.procedure,
            date: t.date,
            cost: t.cost,
            notes: t.notes,
        }
    }
}

/// FFI-safe audit entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletedTreatment {
    pub entry_id: String,
    pub chart_id: String,
    pub tooth: u8,
    pub procedure: String,
    pub date: String,
    pub cost: f64,
    pub doctor_id: String,
    pub notes: Option<String>,
    pub recorded_at: String,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

impl From<CompletedTreatment> for FfiCompletedTreatment {
    fn from(entry: CompletedTreatment) -> Self {
        Self {
            entry_id: entry.entry_id,
            chart_id: entry.chart_id,
            tooth: entry.tooth.get(),
            procedure: entry.procedure,
            date: entry.date,
            cost: entry.cost,
            doctor_id: entry.doctor_id,
            notes: entry.notes,
            recorded_at: entry.recorded_at,
            previous_hash: entry.previous_hash,
            entry_hash: entry.entry_hash,
        }
    }
}

/// FFI-safe audit chain report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditChainReport {
    pub chart_id: String,
    pub entry_count: u32,
    pub head_hash: Option<String>,
    pub intact: bool,
    pub first_broken_entry: Option<String>,
}

impl From<AuditChainReport> for FfiAuditChainReport {
    fn from(report: AuditChainReport) -> Self {
        Self {
            intact: report.is_intact(),
            chart_id: report.chart_id,
            entry_count: report.entry_count as u32,
            head_hash: report.head_hash,
            first_broken_entry: report.first_broken_entry,
        }
    }
}

/// FFI-safe statistics scope.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiStatsScope {
    All,
    Clinic { clinic_id: String },
    Patient { patient_id: String },
}

impl From<FfiStatsScope> for StatsScope {
    fn from(scope: FfiStatsScope) -> Self {
        match scope {
            FfiStatsScope::All => StatsScope::All,
            FfiStatsScope::Clinic { clinic_id } => StatsScope::Clinic(clinic_id),
            FfiStatsScope::Patient { patient_id } => StatsScope::Patient(patient_id),
        }
    }
}

/// FFI-safe statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChartStatistics {
    pub total_charts: u32,
    pub active_treatments: u32,
    pub planned: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub estimated_revenue: f64,
    pub completion_rate: f64,
    pub realized_revenue: f64,
    pub computed_at: String,
}

impl From<ChartStatistics> for FfiChartStatistics {
    fn from(stats: ChartStatistics) -> Self {
        Self {
            total_charts: stats.total_charts as u32,
            active_treatments: stats.active_treatments as u32,
            planned: stats.status_counts.planned as u32,
            in_progress: stats.status_counts.in_progress as u32,
            completed: stats.status_counts.completed as u32,
            cancelled: stats.status_counts.cancelled as u32,
            estimated_revenue: stats.estimated_revenue,
            completion_rate: stats.completion_rate,
            realized_revenue: stats.realized_revenue,
            computed_at: stats.computed_at,
        }
    }
}
