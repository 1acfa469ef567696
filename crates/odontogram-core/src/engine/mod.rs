//! Chart lifecycle engine.
//!
//! [`ChartManager`] owns the domain rules: version assignment, default
//! initialization, the treatment ledger state machine, the completed-treatment
//! audit chain and on-demand statistics. Storage sits behind [`ChartStore`]
//! and [`PatientDirectory`], both implemented by [`Database`].

mod ledger;
mod manager;
mod stats;

pub use ledger::*;
pub use manager::*;
pub use stats::*;

use thiserror::Error;

use crate::db::{ChartQuery, Database, DbError, DbResult};
use crate::models::{
    ChartSnapshot, CompletedTreatment, InvalidTransition, PatientRecord, TreatmentStatus,
    ValidationError,
};

/// Errors surfaced by chart operations.
///
/// Every rejected operation leaves stored state unchanged.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: TreatmentStatus,
        to: TreatmentStatus,
    },

    #[error("Storage error: {0}")]
    Storage(DbError),
}

pub type ChartResult<T> = Result<T, ChartError>;

impl From<ValidationError> for ChartError {
    fn from(err: ValidationError) -> Self {
        ChartError::Validation(err.0)
    }
}

impl From<InvalidTransition> for ChartError {
    fn from(err: InvalidTransition) -> Self {
        ChartError::InvalidTransition {
            from: err.from,
            to: err.to,
        }
    }
}

impl From<DbError> for ChartError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Constraint(msg) => ChartError::Conflict(msg),
            DbError::NotFound(msg) => ChartError::NotFound(msg),
            other => ChartError::Storage(other),
        }
    }
}

/// Durable storage for chart snapshots and their audit logs.
pub trait ChartStore {
    /// Insert a new snapshot. A taken (patient, version) is a constraint error.
    fn insert_chart(&self, chart: &ChartSnapshot) -> DbResult<()>;

    /// Insert a snapshot and archive every other active version of the
    /// patient atomically. Returns the archived chart IDs.
    fn insert_chart_superseding(&self, chart: &ChartSnapshot) -> DbResult<Vec<String>>;

    /// Compare-and-swap on `chart.revision`. Returns false if the stored
    /// revision has moved on.
    fn update_chart(&self, chart: &ChartSnapshot) -> DbResult<bool>;

    fn get_chart(&self, patient_id: &str, version: u32) -> DbResult<Option<ChartSnapshot>>;

    fn get_latest_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>>;

    /// Highest active version.
    fn get_current_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>>;

    /// 0 when the patient has no charts.
    fn max_chart_version(&self, patient_id: &str) -> DbResult<u32>;

    fn list_charts_for_patient(
        &self,
        patient_id: &str,
        include_archived: bool,
    ) -> DbResult<Vec<ChartSnapshot>>;

    fn list_charts_for_clinic(&self, clinic_id: &str) -> DbResult<Vec<ChartSnapshot>>;

    fn list_charts_for_doctor(&self, doctor_id: &str) -> DbResult<Vec<ChartSnapshot>>;

    fn list_all_charts(&self) -> DbResult<Vec<ChartSnapshot>>;

    /// One page of matching charts, newest first, and the total match count.
    fn find_charts(
        &self,
        query: &ChartQuery,
        limit: u32,
        offset: u32,
    ) -> DbResult<(Vec<ChartSnapshot>, u64)>;

    /// Append-only. Fails if the entry does not extend the current chain tip.
    fn append_completed_treatment(&self, entry: &CompletedTreatment) -> DbResult<()>;

    fn last_audit_hash(&self, chart_id: &str) -> DbResult<Option<String>>;

    fn list_completed_treatments(&self, chart_id: &str) -> DbResult<Vec<CompletedTreatment>>;

    fn list_all_completed_treatments(&self) -> DbResult<Vec<CompletedTreatment>>;
}

/// Patient identity lookup.
pub trait PatientDirectory {
    fn find_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>>;
}

impl ChartStore for Database {
    fn insert_chart(&self, chart: &ChartSnapshot) -> DbResult<()> {
        Database::insert_chart(self, chart)
    }

    fn insert_chart_superseding(&self, chart: &ChartSnapshot) -> DbResult<Vec<String>> {
        Database::insert_chart_superseding(self, chart)
    }

    fn update_chart(&self, chart: &ChartSnapshot) -> DbResult<bool> {
        Database::update_chart(self, chart)
    }

    fn get_chart(&self, patient_id: &str, version: u32) -> DbResult<Option<ChartSnapshot>> {
        Database::get_chart(self, patient_id, version)
    }

    fn get_latest_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>> {
        Database::get_latest_chart(self, patient_id)
    }

    fn get_current_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>> {
        Database::get_current_chart(self, patient_id)
    }

    fn max_chart_version(&self, patient_id: &str) -> DbResult<u32> {
        Database::max_chart_version(self, patient_id)
    }

    fn list_charts_for_patient(
        &self,
        patient_id: &str,
        include_archived: bool,
    ) -> DbResult<Vec<ChartSnapshot>> {
        Database::list_charts_for_patient(self, patient_id, include_archived)
    }

    fn list_charts_for_clinic(&self, clinic_id: &str) -> DbResult<Vec<ChartSnapshot>> {
        Database::list_charts_for_clinic(self, clinic_id)
    }

    fn list_charts_for_doctor(&self, doctor_id: &str) -> DbResult<Vec<ChartSnapshot>> {
        Database::list_charts_for_doctor(self, doctor_id)
    }

    fn list_all_charts(&self) -> DbResult<Vec<ChartSnapshot>> {
        Database::list_all_charts(self)
    }

    fn find_charts(
        &self,
        query: &ChartQuery,
        limit: u32,
        offset: u32,
    ) -> DbResult<(Vec<ChartSnapshot>, u64)> {
        Database::find_charts(self, query, limit, offset)
    }

    fn append_completed_treatment(&self, entry: &CompletedTreatment) -> DbResult<()> {
        Database::insert_completed_treatment(self, entry)
    }

    fn last_audit_hash(&self, chart_id: &str) -> DbResult<Option<String>> {
        Database::last_audit_hash(self, chart_id)
    }

    fn list_completed_treatments(&self, chart_id: &str) -> DbResult<Vec<CompletedTreatment>> {
        Database::list_completed_treatments(self, chart_id)
    }

    fn list_all_completed_treatments(&self) -> DbResult<Vec<CompletedTreatment>> {
        Database::list_all_completed_treatments(self)
    }
}

impl PatientDirectory for Database {
    fn find_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>> {
        self.get_patient(patient_id)
    }
}
