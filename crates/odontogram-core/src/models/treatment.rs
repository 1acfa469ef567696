//! Treatment plan items and completed-treatment audit entries.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tooth::ToothNumber;
use super::ValidationError;

/// Clinical priority of a planned procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "urgent" => Ok(Priority::Urgent),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ValidationError(format!("Unknown priority: {}", s))),
        }
    }
}

/// Treatment plan item status.
///
/// ```text
/// Planned ──► InProgress ──► Completed
///    │            │
///    └────────────┴────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreatmentStatus {
    /// Initial state
    #[default]
    Planned,
    InProgress,
    /// Terminal
    Completed,
    /// Terminal
    Cancelled,
}

/// Allowed (from, to) pairs. Anything not listed is rejected.
const ALLOWED_TRANSITIONS: &[(TreatmentStatus, TreatmentStatus)] = &[
    (TreatmentStatus::Planned, TreatmentStatus::InProgress),
    (TreatmentStatus::Planned, TreatmentStatus::Cancelled),
    (TreatmentStatus::InProgress, TreatmentStatus::Completed),
    (TreatmentStatus::InProgress, TreatmentStatus::Cancelled),
];

impl TreatmentStatus {
    pub const ALL: [TreatmentStatus; 4] = [
        TreatmentStatus::Planned,
        TreatmentStatus::InProgress,
        TreatmentStatus::Completed,
        TreatmentStatus::Cancelled,
    ];

    pub fn can_transition_to(self, to: TreatmentStatus) -> bool {
        ALLOWED_TRANSITIONS.contains(&(self, to))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TreatmentStatus::Completed | TreatmentStatus::Cancelled)
    }

    /// Planned or in progress.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentStatus::Planned => "planned",
            TreatmentStatus::InProgress => "in-progress",
            TreatmentStatus::Completed => "completed",
            TreatmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "planned" => Ok(TreatmentStatus::Planned),
            "in-progress" => Ok(TreatmentStatus::InProgress),
            "completed" => Ok(TreatmentStatus::Completed),
            "cancelled" => Ok(TreatmentStatus::Cancelled),
            _ => Err(ValidationError(format!("Unknown treatment status: {}", s))),
        }
    }
}

impl fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid treatment transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TreatmentStatus,
    pub to: TreatmentStatus,
}

/// A planned procedure on one tooth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlanItem {
    /// Unique item ID
    pub item_id: String,
    pub tooth: ToothNumber,
    pub procedure: String,
    pub priority: Priority,
    pub estimated_cost: f64,
    pub estimated_duration_minutes: u32,
    pub status: TreatmentStatus,
    pub notes: Option<String>,
    /// RFC 3339
    pub scheduled_date: Option<String>,
    /// Set exactly when the item reaches `Completed`
    pub completed_at: Option<String>,
    pub completed_by: Option<String>,
}

impl TreatmentPlanItem {
    /// Move to `to`, stamping completion details when completing.
    pub fn transition(&mut self, to: TreatmentStatus, actor: &str) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        if to == TreatmentStatus::Completed {
            self.completed_at = Some(chrono::Utc::now().to_rfc3339());
            self.completed_by = Some(actor.to_string());
        }
        Ok(())
    }

    /// Open copy with a new ID, used when carrying an item forward.
    pub fn reissue(&self) -> Self {
        Self {
            item_id: uuid::Uuid::new_v4().to_string(),
            completed_at: None,
            completed_by: None,
            ..self.clone()
        }
    }
}

/// Input for a new plan item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTreatmentItem {
    pub tooth: u32,
    pub procedure: String,
    pub priority: Priority,
    pub estimated_cost: f64,
    pub estimated_duration_minutes: u32,
    pub notes: Option<String>,
    pub scheduled_date: Option<String>,
}

impl NewTreatmentItem {
    pub fn new(tooth: u32, procedure: impl Into<String>) -> Self {
        Self {
            tooth,
            procedure: procedure.into(),
            priority: Priority::default(),
            estimated_cost: 0.0,
            estimated_duration_minutes: 0,
            notes: None,
            scheduled_date: None,
        }
    }

    /// Validate and turn into a planned item.
    pub fn into_item(self) -> Result<TreatmentPlanItem, ValidationError> {
        let tooth = ToothNumber::from_u32(self.tooth)?;
        let procedure = self.procedure.trim().to_string();
        if procedure.is_empty() {
            return Err(ValidationError("Procedure is required".into()));
        }
        validate_amount("Estimated cost", self.estimated_cost)?;
        if let Some(date) = &self.scheduled_date {
            validate_timestamp("Scheduled date", date)?;
        }

        Ok(TreatmentPlanItem {
            item_id: uuid::Uuid::new_v4().to_string(),
            tooth,
            procedure,
            priority: self.priority,
            estimated_cost: self.estimated_cost,
            estimated_duration_minutes: self.estimated_duration_minutes,
            status: TreatmentStatus::Planned,
            notes: self.notes,
            scheduled_date: self.scheduled_date,
            completed_at: None,
            completed_by: None,
        })
    }
}

/// A procedure actually performed. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTreatment {
    pub entry_id: String,
    pub chart_id: String,
    pub tooth: ToothNumber,
    pub procedure: String,
    /// When the procedure was performed (RFC 3339)
    pub date: String,
    pub cost: f64,
    pub doctor_id: String,
    pub notes: Option<String>,
    /// When the entry was written
    pub recorded_at: String,
    /// Hash of the previous entry for the same chart
    pub previous_hash: Option<String>,
    /// SHA-256 over the canonical payload
    pub entry_hash: String,
}

#[derive(Serialize)]
struct AuditPayload<'a> {
    entry_id: &'a str,
    chart_id: &'a str,
    tooth: ToothNumber,
    procedure: &'a str,
    date: &'a str,
    cost: f64,
    doctor_id: &'a str,
    notes: Option<&'a str>,
    recorded_at: &'a str,
    previous_hash: Option<&'a str>,
}

impl CompletedTreatment {
    /// Serialize everything but `entry_hash` for hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&AuditPayload {
            entry_id: &self.entry_id,
            chart_id: &self.chart_id,
            tooth: self.tooth,
            procedure: &self.procedure,
            date: &self.date,
            cost: self.cost,
            doctor_id: &self.doctor_id,
            notes: self.notes.as_deref(),
            recorded_at: &self.recorded_at,
            previous_hash: self.previous_hash.as_deref(),
        })
    }
}

/// Input for a completed-treatment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompletedTreatment {
    pub tooth: u32,
    pub procedure: String,
    /// Defaults to now
    pub date: Option<String>,
    pub cost: f64,
    pub notes: Option<String>,
}

impl NewCompletedTreatment {
    pub fn validate(&self) -> Result<ToothNumber, ValidationError> {
        let tooth = ToothNumber::from_u32(self.tooth)?;
        if self.procedure.trim().is_empty() {
            return Err(ValidationError("Procedure is required".into()));
        }
        validate_amount("Cost", self.cost)?;
        if let Some(date) = &self.date {
            validate_timestamp("Treatment date", date)?;
        }
        Ok(tooth)
    }
}

fn validate_amount(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError(format!(
            "{} must be a non-negative amount, got {}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_timestamp(field: &str, value: &str) -> Result<(), ValidationError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| ValidationError(format!("{} is not RFC 3339 ({}): {}", field, e, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned_item() -> TreatmentPlanItem {
        NewTreatmentItem::new(14, "Composite filling")
            .into_item()
            .unwrap()
    }

    #[test]
    fn test_transition_table() {
        use TreatmentStatus::*;

        assert!(Planned.can_transition_to(InProgress));
        assert!(Planned.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));

        assert!(!Planned.can_transition_to(Planned));
        assert!(!InProgress.can_transition_to(Planned));
        for to in TreatmentStatus::ALL {
            assert!(!Completed.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_completion_stamps_actor() {
        let mut item = planned_item();
        item.transition(TreatmentStatus::InProgress, "dr-1").unwrap();
        assert!(item.completed_at.is_none());

        item.transition(TreatmentStatus::Completed, "dr-1").unwrap();
        assert!(item.completed_at.is_some());
        assert_eq!(item.completed_by.as_deref(), Some("dr-1"));
    }

    #[test]
    fn test_rejected_transition_leaves_item_unchanged() {
        let mut item = planned_item();
        item.transition(TreatmentStatus::Cancelled, "dr-1").unwrap();
        let before = item.clone();

        let err = item.transition(TreatmentStatus::Planned, "dr-1").unwrap_err();
        assert_eq!(err.from, TreatmentStatus::Cancelled);
        assert_eq!(err.to, TreatmentStatus::Planned);
        assert_eq!(item, before);
    }

    #[test]
    fn test_new_item_validation() {
        assert!(NewTreatmentItem::new(99, "Extraction").into_item().is_err());
        assert!(NewTreatmentItem::new(0, "Extraction").into_item().is_err());
        assert!(NewTreatmentItem::new(3, "   ").into_item().is_err());

        let mut negative = NewTreatmentItem::new(3, "Crown");
        negative.estimated_cost = -10.0;
        assert!(negative.into_item().is_err());

        let mut bad_date = NewTreatmentItem::new(3, "Crown");
        bad_date.scheduled_date = Some("next tuesday".into());
        assert!(bad_date.into_item().is_err());

        let item = NewTreatmentItem::new(3, " Crown ").into_item().unwrap();
        assert_eq!(item.procedure, "Crown");
        assert_eq!(item.status, TreatmentStatus::Planned);
        assert_eq!(item.priority, Priority::Medium);
    }

    #[test]
    fn test_status_serde_uses_kebab_case() {
        let json = serde_json::to_string(&TreatmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(TreatmentStatus::parse("in-progress").unwrap(), TreatmentStatus::InProgress);
    }

    #[test]
    fn test_reissue_gets_new_id() {
        let mut item = planned_item();
        item.transition(TreatmentStatus::InProgress, "dr-1").unwrap();
        let copy = item.reissue();
        assert_ne!(copy.item_id, item.item_id);
        assert_eq!(copy.status, TreatmentStatus::InProgress);
        assert_eq!(copy.procedure, item.procedure);
    }
}
