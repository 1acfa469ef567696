//! Snapshot creation, versioning and archiving.

use std::collections::HashSet;

use crate::config::{ActivePolicy, ChartConfig};
use crate::db::{ChartQuery, Database};
use crate::models::{
    ChartImage, ChartSnapshot, ClinicalContext, Dentition, NewTreatmentItem, PatientRecord,
    PeriodontalChart, ToothNumber, ToothUpdate,
};

use super::{ChartError, ChartResult, ChartStore, PatientDirectory};

/// Input for a new chart version.
#[derive(Debug, Clone, Default)]
pub struct NewChartVersion {
    /// Must equal the next free version when given
    pub version: Option<u32>,
    /// Defaults to 32 healthy teeth
    pub teeth: Option<Dentition>,
    pub periodontal: PeriodontalChart,
    pub treatment_plan: Vec<NewTreatmentItem>,
}

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page [`ChartManager::find_charts`] returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a filtered chart listing.
#[derive(Debug, Clone)]
pub struct ChartPage {
    pub charts: Vec<ChartSnapshot>,
    pub total: u64,
    /// 1-based
    pub page: u32,
    pub total_pages: u32,
}

/// Chart lifecycle manager.
pub struct ChartManager<'a> {
    pub(super) store: &'a dyn ChartStore,
    pub(super) patients: &'a dyn PatientDirectory,
    pub(super) policy: ActivePolicy,
}

impl<'a> ChartManager<'a> {
    pub fn new(
        store: &'a dyn ChartStore,
        patients: &'a dyn PatientDirectory,
        config: &ChartConfig,
    ) -> Self {
        Self {
            store,
            patients,
            policy: config.active_policy(),
        }
    }

    /// Manager backed by one database for both charts and patients.
    pub fn for_database(db: &'a Database, config: &ChartConfig) -> Self {
        Self::new(db, db, config)
    }

    pub fn policy(&self) -> ActivePolicy {
        self.policy
    }

    /// Create version 1 with 32 healthy teeth.
    ///
    /// Fails with [`ChartError::Conflict`] if the patient already has any
    /// chart; use [`ChartManager::ensure_chart`] for the idempotent form.
    pub fn initialize_chart(
        &self,
        patient_id: &str,
        context: &ClinicalContext,
    ) -> ChartResult<ChartSnapshot> {
        if self.store.max_chart_version(patient_id)? > 0 {
            tracing::warn!(patient_id, "Rejected double initialization");
            return Err(ChartError::Conflict(format!(
                "Patient {} already has a chart",
                patient_id
            )));
        }

        self.create_version(
            patient_id,
            context,
            NewChartVersion {
                version: Some(1),
                ..Default::default()
            },
        )
    }

    /// Return the current chart, creating one if the patient has none active.
    ///
    /// With no charts at all this initializes version 1. If every version is
    /// archived, a new version starts from a copy of the latest dentition.
    pub fn ensure_chart(
        &self,
        patient_id: &str,
        context: &ClinicalContext,
    ) -> ChartResult<ChartSnapshot> {
        if let Some(current) = self.store.get_current_chart(patient_id)? {
            tracing::debug!(patient_id, version = current.version, "Chart already present");
            return Ok(current);
        }

        match self.store.get_latest_chart(patient_id)? {
            None => self.initialize_chart(patient_id, context),
            Some(latest) => self.create_version(
                patient_id,
                context,
                NewChartVersion {
                    version: Some(latest.version + 1),
                    teeth: Some(latest.teeth),
                    periodontal: latest.periodontal,
                    treatment_plan: Vec::new(),
                },
            ),
        }
    }

    /// Create the next chart version for a patient.
    ///
    /// Prior versions are left untouched under
    /// [`ActivePolicy::AllowConcurrent`]. Under [`ActivePolicy::SingleActive`]
    /// they are archived in the same transaction as the insert.
    pub fn create_version(
        &self,
        patient_id: &str,
        context: &ClinicalContext,
        input: NewChartVersion,
    ) -> ChartResult<ChartSnapshot> {
        self.require_patient(patient_id)?;
        validate_context(context)?;

        let next = self.store.max_chart_version(patient_id)? + 1;
        let version = match input.version {
            None => next,
            Some(0) => {
                return Err(ChartError::Validation("Chart versions start at 1".into()));
            }
            Some(v) if v == next => v,
            Some(v) if v < next => {
                tracing::warn!(patient_id, version = v, "Rejected existing chart version");
                return Err(ChartError::Conflict(format!(
                    "Chart version {} already exists for patient {}",
                    v, patient_id
                )));
            }
            Some(v) => {
                return Err(ChartError::Validation(format!(
                    "Chart version {} would leave a gap; next version is {}",
                    v, next
                )));
            }
        };

        let teeth = input.teeth.unwrap_or_default();
        teeth.validate()?;

        let plan = input
            .treatment_plan
            .into_iter()
            .map(NewTreatmentItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        let mut chart = ChartSnapshot::new(
            patient_id.to_string(),
            version,
            context,
            teeth,
            input.periodontal,
        );
        chart.treatment_plan = plan;

        let inserted = match self.policy {
            ActivePolicy::AllowConcurrent => self.store.insert_chart(&chart).map(|_| Vec::new()),
            ActivePolicy::SingleActive => self.store.insert_chart_superseding(&chart),
        };
        let archived = inserted.map_err(|e| {
            let err = ChartError::from(e);
            if matches!(err, ChartError::Conflict(_)) {
                tracing::warn!(patient_id, version, "Chart version taken concurrently");
            }
            err
        })?;

        for chart_id in &archived {
            tracing::info!(patient_id, chart_id = %chart_id, "Archived superseded chart");
        }
        tracing::info!(
            patient_id,
            version,
            chart_id = %chart.chart_id,
            doctor_id = %chart.doctor_id,
            "Created chart version"
        );
        Ok(chart)
    }

    /// New version from a copy of the latest dentition with `updates` applied.
    ///
    /// The latest version keeps its own teeth. The treatment plan is not
    /// carried; see [`ChartManager::carry_forward_open_items`].
    pub fn revise_teeth(
        &self,
        patient_id: &str,
        context: &ClinicalContext,
        updates: &[(u32, ToothUpdate)],
        periodontal: Option<PeriodontalChart>,
    ) -> ChartResult<ChartSnapshot> {
        let updates = validate_tooth_updates(updates)?;
        let latest = self.latest_chart(patient_id)?;

        let mut teeth = latest.teeth.clone();
        teeth.apply(&updates)?;

        // Pinned: a version created after `latest` was read is a conflict.
        self.create_version(
            patient_id,
            context,
            NewChartVersion {
                version: Some(latest.version + 1),
                teeth: Some(teeth),
                periodontal: periodontal.unwrap_or(latest.periodontal),
                treatment_plan: Vec::new(),
            },
        )
    }

    /// Archive a chart. Archiving an archived chart is a no-op.
    pub fn archive_chart(&self, patient_id: &str, version: u32) -> ChartResult<ChartSnapshot> {
        let mut chart = self.get_chart(patient_id, version)?;
        if !chart.is_active {
            tracing::debug!(patient_id, version, "Chart already archived");
            return Ok(chart);
        }

        chart.is_active = false;
        chart.touch();
        self.write_back(&mut chart)?;

        tracing::info!(patient_id, version, chart_id = %chart.chart_id, "Archived chart");
        Ok(chart)
    }

    pub fn get_chart(&self, patient_id: &str, version: u32) -> ChartResult<ChartSnapshot> {
        tracing::debug!(patient_id, version, "Loading chart");
        self.store
            .get_chart(patient_id, version)?
            .ok_or_else(|| {
                ChartError::NotFound(format!(
                    "Chart version {} for patient {}",
                    version, patient_id
                ))
            })
    }

    /// Highest active version.
    pub fn current_chart(&self, patient_id: &str) -> ChartResult<ChartSnapshot> {
        self.store
            .get_current_chart(patient_id)?
            .ok_or_else(|| ChartError::NotFound(format!("Active chart for patient {}", patient_id)))
    }

    /// Highest version, archived or not.
    pub fn latest_chart(&self, patient_id: &str) -> ChartResult<ChartSnapshot> {
        self.store
            .get_latest_chart(patient_id)?
            .ok_or_else(|| ChartError::NotFound(format!("Chart for patient {}", patient_id)))
    }

    /// Charts for a patient, newest first.
    pub fn list_charts(
        &self,
        patient_id: &str,
        include_archived: bool,
    ) -> ChartResult<Vec<ChartSnapshot>> {
        self.require_patient(patient_id)?;
        Ok(self
            .store
            .list_charts_for_patient(patient_id, include_archived)?)
    }

    /// Charts a doctor authored, newest first.
    pub fn charts_by_doctor(&self, doctor_id: &str) -> ChartResult<Vec<ChartSnapshot>> {
        Ok(self.store.list_charts_for_doctor(doctor_id)?)
    }

    /// Filtered chart listing across patients, newest first. `page` starts at 1.
    pub fn find_charts(&self, query: &ChartQuery, page: u32, limit: u32) -> ChartResult<ChartPage> {
        if page == 0 {
            return Err(ChartError::Validation("Pages start at 1".into()));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(ChartError::Validation(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, limit
            )));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ChartError::Validation(format!("Page {} is out of range", page)))?;

        let (charts, total) = self.store.find_charts(query, limit, offset)?;
        tracing::debug!(page, limit, total, "Listed charts");

        Ok(ChartPage {
            charts,
            total,
            page,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
        })
    }

    /// Attach image metadata to an active chart.
    pub fn attach_image(
        &self,
        patient_id: &str,
        version: u32,
        filename: String,
        original_name: String,
        description: Option<String>,
    ) -> ChartResult<ChartImage> {
        let image = ChartImage::new(filename, original_name, description)?;
        self.mutate(patient_id, version, |chart| {
            chart.images.push(image.clone());
            Ok(())
        })?;

        tracing::info!(patient_id, version, image_id = %image.image_id, "Attached image");
        Ok(image)
    }

    pub(super) fn require_patient(&self, patient_id: &str) -> ChartResult<PatientRecord> {
        self.patients
            .find_patient(patient_id)?
            .ok_or_else(|| ChartError::NotFound(format!("Patient {}", patient_id)))
    }

    /// Load an active chart, apply `op` and write it back with a
    /// compare-and-swap on its revision. Nothing is written if `op` fails.
    pub(super) fn mutate<T>(
        &self,
        patient_id: &str,
        version: u32,
        op: impl FnOnce(&mut ChartSnapshot) -> ChartResult<T>,
    ) -> ChartResult<(ChartSnapshot, T)> {
        let mut chart = self.get_chart(patient_id, version)?;
        if !chart.is_active {
            tracing::warn!(patient_id, version, "Rejected change to archived chart");
            return Err(ChartError::Conflict(format!(
                "Chart version {} for patient {} is archived",
                version, patient_id
            )));
        }

        let out = op(&mut chart)?;
        chart.touch();
        self.write_back(&mut chart)?;
        Ok((chart, out))
    }

    fn write_back(&self, chart: &mut ChartSnapshot) -> ChartResult<()> {
        if !self.store.update_chart(chart)? {
            tracing::warn!(
                patient_id = %chart.patient_id,
                version = chart.version,
                revision = chart.revision,
                "Stale chart revision"
            );
            return Err(ChartError::Conflict(format!(
                "Chart version {} for patient {} was modified concurrently",
                chart.version, chart.patient_id
            )));
        }
        chart.revision += 1;
        Ok(())
    }
}

pub(super) fn validate_context(context: &ClinicalContext) -> ChartResult<()> {
    if context.doctor_id.trim().is_empty() {
        return Err(ChartError::Validation("Doctor is required".into()));
    }
    if context.clinic_id.trim().is_empty() {
        return Err(ChartError::Validation("Clinic is required".into()));
    }
    Ok(())
}

fn validate_tooth_updates(
    updates: &[(u32, ToothUpdate)],
) -> ChartResult<Vec<(ToothNumber, ToothUpdate)>> {
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(updates.len());

    for (number, update) in updates {
        let tooth = ToothNumber::from_u32(*number)?;
        if !seen.insert(tooth) {
            return Err(ChartError::Validation(format!(
                "Tooth {} appears more than once",
                tooth
            )));
        }
        update.validate()?;
        validated.push((tooth, update.clone()));
    }
    Ok(validated)
}
