//! Odontogram (chart snapshot) database operations.

use rusqlite::{params, OptionalExtension, Row, ToSql};

use super::{constraint_aware, Database, DbError, DbResult};
use crate::models::{ChartSnapshot, Dentition, PeriodontalChart};

const CHART_COLUMNS: &str = r#"
    chart_id, patient_id, version, doctor_id, clinic_id, is_active,
    teeth, periodontal, treatment_plan, images, revision, created_at, updated_at
"#;

/// Filters for a paged chart listing. Unset filters match every chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartQuery {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub clinic_id: Option<String>,
    pub include_archived: bool,
}

impl Database {
    /// Insert a new chart snapshot.
    ///
    /// A second row for the same (patient, version) fails with
    /// [`DbError::Constraint`].
    pub fn insert_chart(&self, chart: &ChartSnapshot) -> DbResult<()> {
        let teeth_json = serde_json::to_string(&chart.teeth)?;
        let periodontal_json = serde_json::to_string(&chart.periodontal)?;
        let plan_json = serde_json::to_string(&chart.treatment_plan)?;
        let images_json = serde_json::to_string(&chart.images)?;

        self.conn
            .execute(
                r#"
                INSERT INTO odontograms (
                    chart_id, patient_id, version, doctor_id, clinic_id, is_active,
                    teeth, periodontal, treatment_plan, images, revision,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    chart.chart_id,
                    chart.patient_id,
                    chart.version,
                    chart.doctor_id,
                    chart.clinic_id,
                    chart.is_active,
                    teeth_json,
                    periodontal_json,
                    plan_json,
                    images_json,
                    chart.revision as i64,
                    chart.created_at,
                    chart.updated_at,
                ],
            )
            .map_err(|e| constraint_aware(e, "insert chart"))?;
        Ok(())
    }

    /// Insert a chart and archive every other active chart of the same
    /// patient, in one transaction.
    pub fn insert_chart_superseding(&self, chart: &ChartSnapshot) -> DbResult<Vec<String>> {
        let tx = self.conn.unchecked_transaction()?;

        let archived: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT chart_id FROM odontograms WHERE patient_id = ? AND is_active = 1",
            )?;
            let rows = stmt.query_map([&chart.patient_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.execute(
            r#"
            UPDATE odontograms SET
                is_active = 0,
                revision = revision + 1,
                updated_at = ?2
            WHERE patient_id = ?1 AND is_active = 1
            "#,
            params![chart.patient_id, chart.created_at],
        )?;

        self.insert_chart(chart)?;
        tx.commit()?;
        Ok(archived)
    }

    /// Write the mutable parts of a chart (plan, images, active flag).
    ///
    /// `chart.revision` is the revision the caller read. Returns `false`
    /// when the stored row has moved on (or does not exist), in which case
    /// nothing was written.
    pub fn update_chart(&self, chart: &ChartSnapshot) -> DbResult<bool> {
        let plan_json = serde_json::to_string(&chart.treatment_plan)?;
        let images_json = serde_json::to_string(&chart.images)?;

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE odontograms SET
                    is_active = ?3,
                    treatment_plan = ?4,
                    images = ?5,
                    updated_at = ?6,
                    revision = revision + 1
                WHERE chart_id = ?1 AND revision = ?2
                "#,
                params![
                    chart.chart_id,
                    chart.revision as i64,
                    chart.is_active,
                    plan_json,
                    images_json,
                    chart.updated_at,
                ],
            )
            .map_err(|e| constraint_aware(e, "update chart"))?;
        Ok(rows_affected > 0)
    }

    /// Get a chart by patient and version.
    pub fn get_chart(&self, patient_id: &str, version: u32) -> DbResult<Option<ChartSnapshot>> {
        self.query_one_chart(
            "WHERE patient_id = ?1 AND version = ?2",
            params![patient_id, version],
        )
    }

    /// Highest version for a patient, archived or not.
    pub fn get_latest_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>> {
        self.query_one_chart(
            "WHERE patient_id = ?1 ORDER BY version DESC LIMIT 1",
            params![patient_id],
        )
    }

    /// Highest active version for a patient.
    pub fn get_current_chart(&self, patient_id: &str) -> DbResult<Option<ChartSnapshot>> {
        self.query_one_chart(
            "WHERE patient_id = ?1 AND is_active = 1 ORDER BY version DESC LIMIT 1",
            params![patient_id],
        )
    }

    /// Highest version number stored for a patient (0 when none).
    pub fn max_chart_version(&self, patient_id: &str) -> DbResult<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(version) FROM odontograms WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// List a patient's charts, newest version first.
    pub fn list_charts_for_patient(
        &self,
        patient_id: &str,
        include_archived: bool,
    ) -> DbResult<Vec<ChartSnapshot>> {
        let filter = if include_archived {
            "WHERE patient_id = ?1 ORDER BY version DESC"
        } else {
            "WHERE patient_id = ?1 AND is_active = 1 ORDER BY version DESC"
        };
        self.query_charts(filter, params![patient_id])
    }

    /// List every chart recorded at a clinic.
    pub fn list_charts_for_clinic(&self, clinic_id: &str) -> DbResult<Vec<ChartSnapshot>> {
        self.query_charts(
            "WHERE clinic_id = ?1 ORDER BY patient_id, version",
            params![clinic_id],
        )
    }

    /// List every chart authored by a doctor, newest first.
    pub fn list_charts_for_doctor(&self, doctor_id: &str) -> DbResult<Vec<ChartSnapshot>> {
        self.query_charts(
            "WHERE doctor_id = ?1 ORDER BY created_at DESC",
            params![doctor_id],
        )
    }

    /// List all charts.
    pub fn list_all_charts(&self) -> DbResult<Vec<ChartSnapshot>> {
        self.query_charts("ORDER BY patient_id, version", params![])
    }

    /// One page of charts matching `query`, newest first, plus the total
    /// number of matches.
    pub fn find_charts(
        &self,
        query: &ChartQuery,
        limit: u32,
        offset: u32,
    ) -> DbResult<(Vec<ChartSnapshot>, u64)> {
        let limit = i64::from(limit);
        let offset = i64::from(offset);
        let mut clauses = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();

        for (column, value) in [
            ("patient_id", &query.patient_id),
            ("doctor_id", &query.doctor_id),
            ("clinic_id", &query.clinic_id),
        ] {
            if let Some(value) = value {
                values.push(value);
                clauses.push(format!("{} = ?{}", column, values.len()));
            }
        }
        if !query.include_archived {
            clauses.push("is_active = 1".to_string());
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM odontograms {}", filter),
            values.as_slice(),
            |row| row.get(0),
        )?;

        values.push(&limit);
        values.push(&offset);
        let charts = self.query_charts(
            &format!(
                "{} ORDER BY created_at DESC, patient_id, version DESC LIMIT ?{} OFFSET ?{}",
                filter,
                values.len() - 1,
                values.len()
            ),
            values.as_slice(),
        )?;

        Ok((charts, total as u64))
    }

    fn query_one_chart(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Option<ChartSnapshot>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM odontograms {}", CHART_COLUMNS, filter),
                params,
                ChartRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn query_charts(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Vec<ChartSnapshot>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM odontograms {}", CHART_COLUMNS, filter))?;
        let rows = stmt.query_map(params, ChartRow::from_row)?;

        let mut charts = Vec::new();
        for row in rows {
            charts.push(row?.try_into()?);
        }
        Ok(charts)
    }
}

/// Intermediate row struct for database mapping.
struct ChartRow {
    chart_id: String,
    patient_id: String,
    version: u32,
    doctor_id: String,
    clinic_id: String,
    is_active: bool,
    teeth: String,
    periodontal: String,
    treatment_plan: String,
    images: String,
    revision: i64,
    created_at: String,
    updated_at: String,
}

impl ChartRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chart_id: row.get(0)?,
            patient_id: row.get(1)?,
            version: row.get(2)?,
            doctor_id: row.get(3)?,
            clinic_id: row.get(4)?,
            is_active: row.get(5)?,
            teeth: row.get(6)?,
            periodontal: row.get(7)?,
            treatment_plan: row.get(8)?,
            images: row.get(9)?,
            revision: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl TryFrom<ChartRow> for ChartSnapshot {
    type Error = DbError;

    fn try_from(row: ChartRow) -> Result<Self, Self::Error> {
        let teeth: Dentition = serde_json::from_str(&row.teeth)?;
        let periodontal: PeriodontalChart = serde_json::from_str(&row.periodontal)?;

        Ok(ChartSnapshot {
            chart_id: row.chart_id,
            patient_id: row.patient_id,
            version: row.version,
            doctor_id: row.doctor_id,
            clinic_id: row.clinic_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_active: row.is_active,
            teeth,
            periodontal,
            treatment_plan: serde_json::from_str(&row.treatment_plan)?,
            images: serde_json::from_str(&row.images)?,
            revision: row.revision as u64,
        })
    }
}
