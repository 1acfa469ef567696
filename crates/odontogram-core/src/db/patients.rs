//! Patient directory database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_aware, Database, DbResult};
use crate::models::PatientRecord;

const PATIENT_COLUMNS: &str = "patient_id, patient_number, first_name, last_name, date_of_birth, created_at, updated_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        patient_id: row.get(0)?,
        patient_number: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_of_birth: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO patients (
                    patient_id, patient_number, first_name, last_name,
                    date_of_birth, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    patient.patient_id,
                    patient.patient_number,
                    patient.first_name,
                    patient.last_name,
                    patient.date_of_birth,
                    patient.created_at,
                    patient.updated_at,
                ],
            )
            .map_err(|e| constraint_aware(e, "insert patient"))?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE patient_id = ?", PATIENT_COLUMNS),
                [patient_id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Search patients by last name (prefix match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<PatientRecord>> {
        let pattern = format!("{}%", query);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE last_name LIKE ? ORDER BY last_name, first_name LIMIT ?",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

}
