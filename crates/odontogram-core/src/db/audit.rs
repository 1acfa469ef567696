//! Completed-treatment audit log operations.
//!
//! Rows are insert-only; the schema aborts any UPDATE or DELETE.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_aware, Database, DbError, DbResult};
use crate::models::{CompletedTreatment, ToothNumber};

const AUDIT_COLUMNS: &str = r#"
    entry_id, chart_id, tooth, procedure_name, performed_at, cost,
    doctor_id, notes, recorded_at, previous_hash, entry_hash
"#;

impl Database {
    /// Append an entry. Fails with [`DbError::Constraint`] if another entry
    /// already extends the same chain tip.
    pub fn insert_completed_treatment(&self, entry: &CompletedTreatment) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO completed_treatments (
                    entry_id, chart_id, tooth, procedure_name, performed_at, cost,
                    doctor_id, notes, recorded_at, previous_hash, entry_hash
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    entry.entry_id,
                    entry.chart_id,
                    entry.tooth.get(),
                    entry.procedure,
                    entry.date,
                    entry.cost,
                    entry.doctor_id,
                    entry.notes,
                    entry.recorded_at,
                    entry.previous_hash.as_deref().unwrap_or(""),
                    entry.entry_hash,
                ],
            )
            .map_err(|e| constraint_aware(e, "append completed treatment"))?;
        Ok(())
    }

    /// Hash of the newest entry for a chart.
    pub fn last_audit_hash(&self, chart_id: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT entry_hash FROM completed_treatments WHERE chart_id = ? ORDER BY seq DESC LIMIT 1",
                [chart_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Entries for one chart in append order.
    pub fn list_completed_treatments(&self, chart_id: &str) -> DbResult<Vec<CompletedTreatment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM completed_treatments WHERE chart_id = ? ORDER BY seq",
            AUDIT_COLUMNS
        ))?;
        let rows = stmt.query_map([chart_id], AuditRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Every entry across all charts in append order.
    pub fn list_all_completed_treatments(&self) -> DbResult<Vec<CompletedTreatment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM completed_treatments ORDER BY seq",
            AUDIT_COLUMNS
        ))?;
        let rows = stmt.query_map([], AuditRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

/// Intermediate row struct for database mapping.
struct AuditRow {
    entry_id: String,
    chart_id: String,
    tooth: u8,
    procedure: String,
    performed_at: String,
    cost: f64,
    doctor_id: String,
    notes: Option<String>,
    recorded_at: String,
    previous_hash: String,
    entry_hash: String,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get(0)?,
            chart_id: row.get(1)?,
            tooth: row.get(2)?,
            procedure: row.get(3)?,
            performed_at: row.get(4)?,
            cost: row.get(5)?,
            doctor_id: row.get(6)?,
            notes: row.get(7)?,
            recorded_at: row.get(8)?,
            previous_hash: row.get(9)?,
            entry_hash: row.get(10)?,
        })
    }
}

impl TryFrom<AuditRow> for CompletedTreatment {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let tooth = ToothNumber::new(row.tooth).map_err(|e| DbError::Constraint(e.0))?;

        Ok(CompletedTreatment {
            entry_id: row.entry_id,
            chart_id: row.chart_id,
            tooth,
            procedure: row.procedure,
            date: row.performed_at,
            cost: row.cost,
            doctor_id: row.doctor_id,
            notes: row.notes,
            recorded_at: row.recorded_at,
            previous_hash: Some(row.previous_hash).filter(|h| !h.is_empty()),
            entry_hash: row.entry_hash,
        })
    }
}
