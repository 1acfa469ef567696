//! Patient directory models.

use serde::{Deserialize, Serialize};

/// Local directory entry for a patient. Demographics are owned by the
/// practice-management side; charts only need identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Local UUID
    pub patient_id: String,
    /// Human-facing chart number (e.g. "P-000123")
    pub patient_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl PatientRecord {
    /// Create a new patient with required fields.
    pub fn new(first_name: String, last_name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            patient_number: None,
            first_name,
            last_name,
            date_of_birth: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = PatientRecord::new("Ana".into(), "Silva".into());
        assert_eq!(patient.last_name, "Silva");
        assert!(patient.patient_number.is_none());
        assert_eq!(patient.patient_id.len(), 36); // UUID format
    }
}
