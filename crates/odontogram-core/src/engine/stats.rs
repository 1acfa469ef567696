//! On-demand reporting aggregates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{ChartSnapshot, CompletedTreatment, TreatmentStatus};

use super::{ChartManager, ChartResult};

/// Population a statistics query runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    All,
    Clinic(String),
    Patient(String),
}

/// Plan items grouped by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub planned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn get(&self, status: TreatmentStatus) -> usize {
        match status {
            TreatmentStatus::Planned => self.planned,
            TreatmentStatus::InProgress => self.in_progress,
            TreatmentStatus::Completed => self.completed,
            TreatmentStatus::Cancelled => self.cancelled,
        }
    }

    fn bump(&mut self, status: TreatmentStatus) {
        match status {
            TreatmentStatus::Planned => self.planned += 1,
            TreatmentStatus::InProgress => self.in_progress += 1,
            TreatmentStatus::Completed => self.completed += 1,
            TreatmentStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.planned + self.in_progress + self.completed + self.cancelled
    }
}

/// Point-in-time aggregates.
///
/// `total_charts` and `active_treatments` only look at non-archived charts.
/// Status counts and estimated revenue include archived charts, so history
/// stays visible in reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartStatistics {
    /// Non-archived charts
    pub total_charts: usize,
    /// Planned or in-progress items on non-archived charts
    pub active_treatments: usize,
    pub status_counts: StatusCounts,
    /// Estimated cost of non-cancelled items
    pub estimated_revenue: f64,
    /// Completed over non-cancelled items, 0.0 when there are none
    pub completion_rate: f64,
    /// Sum of recorded completed-treatment costs
    pub realized_revenue: f64,
    pub computed_at: String,
}

impl ChartStatistics {
    /// Aggregate over `charts`. Audit entries belonging to other charts are ignored.
    pub fn compute(charts: &[ChartSnapshot], audit: &[CompletedTreatment]) -> Self {
        let mut status_counts = StatusCounts::default();
        let mut estimated_revenue = 0.0;
        let mut total_charts = 0;
        let mut active_treatments = 0;

        for chart in charts {
            if chart.is_active {
                total_charts += 1;
                active_treatments += chart.open_items().count();
            }
            for item in &chart.treatment_plan {
                status_counts.bump(item.status);
            }
            estimated_revenue += chart.estimated_cost();
        }

        let billable = status_counts.total() - status_counts.cancelled;
        let completion_rate = if billable == 0 {
            0.0
        } else {
            status_counts.completed as f64 / billable as f64
        };

        let chart_ids: HashSet<&str> = charts.iter().map(|c| c.chart_id.as_str()).collect();
        let realized_revenue = audit
            .iter()
            .filter(|e| chart_ids.contains(e.chart_id.as_str()))
            .map(|e| e.cost)
            .sum();

        Self {
            total_charts,
            active_treatments,
            status_counts,
            estimated_revenue,
            completion_rate,
            realized_revenue,
            computed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl<'a> ChartManager<'a> {
    /// Compute statistics for a scope from current data.
    pub fn statistics(&self, scope: &StatsScope) -> ChartResult<ChartStatistics> {
        let charts = match scope {
            StatsScope::All => self.store.list_all_charts()?,
            StatsScope::Clinic(clinic_id) => self.store.list_charts_for_clinic(clinic_id)?,
            StatsScope::Patient(patient_id) => {
                self.require_patient(patient_id)?;
                self.store.list_charts_for_patient(patient_id, true)?
            }
        };

        let audit = match scope {
            StatsScope::Patient(_) => {
                let mut entries = Vec::new();
                for chart in &charts {
                    entries.extend(self.store.list_completed_treatments(&chart.chart_id)?);
                }
                entries
            }
            _ => self.store.list_all_completed_treatments()?,
        };

        let stats = ChartStatistics::compute(&charts, &audit);
        tracing::debug!(
            ?scope,
            total_charts = stats.total_charts,
            active_treatments = stats.active_treatments,
            "Computed chart statistics"
        );
        Ok(stats)
    }
}
