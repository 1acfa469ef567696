//! Billing reconciliation export over the completed-treatment audit log.

use serde::{Deserialize, Serialize};

use crate::engine::{first_broken_link, ChartError, ChartResult, ChartStore};
use crate::models::{ChartSnapshot, CompletedTreatment};

const CSV_HEADER: &str = "chart_id,patient_id,version,entry_id,tooth,tooth_fdi,procedure,performed_at,cost,doctor_id,notes,entry_hash\n";

/// Billing export for a single chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingExport {
    /// Export metadata
    pub metadata: BillingMetadata,
    /// One line per completed treatment
    pub line_items: Vec<BillingLineItem>,
}

/// Billing export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingMetadata {
    pub chart_id: String,
    pub patient_id: String,
    pub chart_version: u32,
    pub clinic_id: String,
    /// Export timestamp
    pub exported_at: String,
    /// Hash of the newest audit entry
    pub audit_head_hash: Option<String>,
    /// Whether every entry hash and back-link verified
    pub chain_intact: bool,
}

/// Single billed procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingLineItem {
    pub entry_id: String,
    /// Universal number
    pub tooth: u8,
    /// FDI two-digit code for external systems
    pub tooth_fdi: u8,
    pub procedure: String,
    pub performed_at: String,
    pub cost: f64,
    pub doctor_id: String,
    pub notes: Option<String>,
    pub entry_hash: String,
}

impl From<&CompletedTreatment> for BillingLineItem {
    fn from(entry: &CompletedTreatment) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            tooth: entry.tooth.get(),
            tooth_fdi: entry.tooth.to_fdi(),
            procedure: entry.procedure.clone(),
            performed_at: entry.date.clone(),
            cost: entry.cost,
            doctor_id: entry.doctor_id.clone(),
            notes: entry.notes.clone(),
            entry_hash: entry.entry_hash.clone(),
        }
    }
}

impl BillingExport {
    /// Create billing export from a chart and its audit entries.
    pub fn from_chart(chart: &ChartSnapshot, entries: &[CompletedTreatment]) -> ChartResult<Self> {
        Ok(Self {
            metadata: BillingMetadata {
                chart_id: chart.chart_id.clone(),
                patient_id: chart.patient_id.clone(),
                chart_version: chart.version,
                clinic_id: chart.clinic_id.clone(),
                exported_at: chrono::Utc::now().to_rfc3339(),
                audit_head_hash: entries.last().map(|e| e.entry_hash.clone()),
                chain_intact: first_broken_link(entries)?.is_none(),
            },
            line_items: entries.iter().map(BillingLineItem::from).collect(),
        })
    }

    pub fn total_cost(&self) -> f64 {
        self.line_items.iter().map(|i| i.cost).sum()
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        self.write_csv_lines(&mut csv);
        csv
    }

    fn write_csv_lines(&self, csv: &mut String) {
        for item in &self.line_items {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{:.2},{},{},{}\n",
                escape_csv(&self.metadata.chart_id),
                escape_csv(&self.metadata.patient_id),
                self.metadata.chart_version,
                escape_csv(&item.entry_id),
                item.tooth,
                item.tooth_fdi,
                escape_csv(&item.procedure),
                escape_csv(&item.performed_at),
                item.cost,
                escape_csv(&item.doctor_id),
                escape_csv(item.notes.as_deref().unwrap_or("")),
                escape_csv(&item.entry_hash),
            ));
        }
    }
}

/// Batch billing export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchBillingExport {
    /// Export timestamp
    pub exported_at: String,
    /// Per-chart exports, charts without entries omitted
    pub charts: Vec<BillingExport>,
    pub total_items: usize,
    pub total_cost: f64,
}

impl BatchBillingExport {
    fn new(charts: Vec<BillingExport>) -> Self {
        Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            total_items: charts.iter().map(|c| c.line_items.len()).sum(),
            total_cost: charts.iter().map(BillingExport::total_cost).sum(),
            charts,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        for export in &self.charts {
            export.write_csv_lines(&mut csv);
        }
        csv
    }
}

/// Billing exporter.
pub struct BillingExporter<'a> {
    store: &'a dyn ChartStore,
}

impl<'a> BillingExporter<'a> {
    pub fn new(store: &'a dyn ChartStore) -> Self {
        Self { store }
    }

    /// Export billing for one chart.
    pub fn export_chart(&self, patient_id: &str, version: u32) -> ChartResult<BillingExport> {
        let chart = self.store.get_chart(patient_id, version)?.ok_or_else(|| {
            ChartError::NotFound(format!(
                "Chart version {} for patient {}",
                version, patient_id
            ))
        })?;
        let entries = self.store.list_completed_treatments(&chart.chart_id)?;
        BillingExport::from_chart(&chart, &entries)
    }

    /// Export billing for every chart with recorded treatments.
    pub fn export_all(&self) -> ChartResult<BatchBillingExport> {
        self.export_matching(|_| true)
    }

    /// Export billing for entries recorded at or after `since` (RFC 3339).
    ///
    /// Chain verification still covers each chart's full log.
    pub fn export_since(&self, since: &str) -> ChartResult<BatchBillingExport> {
        let since = chrono::DateTime::parse_from_rfc3339(since)
            .map_err(|e| ChartError::Validation(format!("Invalid timestamp {}: {}", since, e)))?;

        self.export_matching(|entry| {
            chrono::DateTime::parse_from_rfc3339(&entry.recorded_at)
                .map(|at| at >= since)
                .unwrap_or(false)
        })
    }

    fn export_matching(
        &self,
        keep: impl Fn(&CompletedTreatment) -> bool,
    ) -> ChartResult<BatchBillingExport> {
        let mut charts = Vec::new();

        for chart in self.store.list_all_charts()? {
            let entries = self.store.list_completed_treatments(&chart.chart_id)?;
            if !entries.iter().any(&keep) {
                continue;
            }

            let mut export = BillingExport::from_chart(&chart, &entries)?;
            export.line_items = entries
                .iter()
                .filter(|e| keep(e))
                .map(BillingLineItem::from)
                .collect();
            charts.push(export);
        }

        tracing::info!(charts = charts.len(), "Exported billing");
        Ok(BatchBillingExport::new(charts))
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
