//! The fixed 32-tooth set owned by a chart snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::tooth::{ToothNumber, ToothRecord, ToothUpdate, TOOTH_COUNT};
use super::ValidationError;

/// Exactly 32 tooth records, one per number, stored at `number - 1`.
///
/// Only [`Dentition::healthy`] and [`Dentition::from_records`] construct one,
/// so a partially populated or duplicated tooth set cannot exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ToothRecord>", into = "Vec<ToothRecord>")]
pub struct Dentition {
    teeth: [ToothRecord; TOOTH_COUNT],
}

impl Dentition {
    /// Default chart: 32 teeth, every surface healthy.
    pub fn healthy() -> Self {
        Self {
            teeth: std::array::from_fn(|i| ToothRecord::healthy(ToothNumber::from_index(i))),
        }
    }

    /// Build from explicitly supplied records (any order).
    pub fn from_records(records: Vec<ToothRecord>) -> Result<Self, ValidationError> {
        if records.len() != TOOTH_COUNT {
            return Err(ValidationError(format!(
                "Chart must contain exactly {} teeth, got {}",
                TOOTH_COUNT,
                records.len()
            )));
        }

        let mut seen = HashSet::with_capacity(TOOTH_COUNT);
        for record in &records {
            if !seen.insert(record.number) {
                return Err(ValidationError(format!(
                    "Duplicate tooth number {}",
                    record.number
                )));
            }
            record.pocket_depth.validate()?;
        }

        let mut teeth = Self::healthy().teeth;
        for record in records {
            let index = record.number.index();
            teeth[index] = record;
        }
        Ok(Self { teeth })
    }

    pub fn tooth(&self, number: ToothNumber) -> &ToothRecord {
        &self.teeth[number.index()]
    }

    pub(crate) fn tooth_mut(&mut self, number: ToothNumber) -> &mut ToothRecord {
        &mut self.teeth[number.index()]
    }

    /// Re-check what construction guarantees: every record sits in its own
    /// number's slot and every pocket depth is in range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (index, tooth) in self.teeth.iter().enumerate() {
            if tooth.number.index() != index {
                return Err(ValidationError(format!(
                    "Tooth {} stored in position {}",
                    tooth.number,
                    index + 1
                )));
            }
            tooth.pocket_depth.validate()?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToothRecord> {
        self.teeth.iter()
    }

    pub fn len(&self) -> usize {
        self.teeth.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Apply a batch of updates. Every update is checked first, so either
    /// all of them land or none do.
    pub fn apply(&mut self, updates: &[(ToothNumber, ToothUpdate)]) -> Result<(), ValidationError> {
        for (_, update) in updates {
            update.validate()?;
        }
        for (number, update) in updates {
            update.apply(self.tooth_mut(*number));
        }
        Ok(())
    }

    /// Teeth with any non-healthy surface.
    pub fn teeth_with_findings(&self) -> Vec<ToothNumber> {
        self.teeth
            .iter()
            .filter(|t| !t.surfaces.all_healthy())
            .map(|t| t.number)
            .collect()
    }

    pub fn is_all_healthy(&self) -> bool {
        self.teeth.iter().all(|t| t.surfaces.all_healthy())
    }
}

impl Default for Dentition {
    fn default() -> Self {
        Self::healthy()
    }
}

impl TryFrom<Vec<ToothRecord>> for Dentition {
    type Error = ValidationError;

    fn try_from(records: Vec<ToothRecord>) -> Result<Self, Self::Error> {
        Self::from_records(records)
    }
}

impl From<Dentition> for Vec<ToothRecord> {
    fn from(dentition: Dentition) -> Self {
        dentition.teeth.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PocketDepths, Quadrant, Surface, SurfaceCondition, SurfaceState};

    #[test]
    fn test_healthy_dentition() {
        let dentition = Dentition::healthy();
        assert_eq!(dentition.len(), 32);
        assert!(dentition.is_all_healthy());

        for (i, tooth) in dentition.iter().enumerate() {
            assert_eq!(tooth.number.get() as usize, i + 1);
            assert_eq!(tooth.surfaces.iter().count(), 5);
            assert!(tooth
                .surfaces
                .iter()
                .all(|(_, s)| s.material.is_none() && s.notes.is_none()));
        }
    }

    #[test]
    fn test_from_records_rejects_short_set() {
        let records: Vec<ToothRecord> = Dentition::healthy().into();
        let short = records[..31].to_vec();
        assert!(Dentition::from_records(short).is_err());
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let mut records: Vec<ToothRecord> = Dentition::healthy().into();
        records[31] = ToothRecord::healthy(ToothNumber::new(1).unwrap());
        let err = Dentition::from_records(records).unwrap_err();
        assert!(err.0.contains("Duplicate"));
    }

    #[test]
    fn test_from_records_any_order() {
        let mut records: Vec<ToothRecord> = Dentition::healthy().into();
        records.reverse();
        records[0].notes = Some("third molar".into());

        let dentition = Dentition::from_records(records).unwrap();
        let tooth = dentition.tooth(ToothNumber::new(32).unwrap());
        assert_eq!(tooth.notes.as_deref(), Some("third molar"));
        assert_eq!(tooth.quadrant(), Quadrant::LowerRight);
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let json = serde_json::to_string(&Dentition::healthy()).unwrap();
        let back: Dentition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Dentition::healthy());

        let mut records: Vec<ToothRecord> = Dentition::healthy().into();
        records.pop();
        let truncated = serde_json::to_string(&records).unwrap();
        assert!(serde_json::from_str::<Dentition>(&truncated).is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Dentition::healthy();
        let mut copy = original.clone();
        let number = ToothNumber::new(14).unwrap();
        copy.apply(&[(
            number,
            ToothUpdate::default().surface(
                Surface::Mesial,
                SurfaceState::with_condition(SurfaceCondition::Caries),
            ),
        )])
        .unwrap();

        assert!(original.is_all_healthy());
        assert_eq!(copy.teeth_with_findings(), vec![number]);
    }

    #[test]
    fn test_apply_rejects_deep_pocket_atomically() {
        let mut dentition = Dentition::healthy();
        let caries = ToothUpdate::default().surface(
            Surface::Occlusal,
            SurfaceState::with_condition(SurfaceCondition::Caries),
        );
        let too_deep = ToothUpdate {
            pocket_depth: Some(PocketDepths {
                mesial: Some(40),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = dentition.apply(&[
            (ToothNumber::new(3).unwrap(), caries),
            (ToothNumber::new(14).unwrap(), too_deep),
        ]);
        assert!(result.is_err());
        assert!(dentition.is_all_healthy());
        assert!(dentition.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_out_of_range_depth() {
        let mut records: Vec<ToothRecord> = Dentition::healthy().into();
        records[13].pocket_depth.mesial = Some(40);
        assert!(Dentition::from_records(records).is_err());
    }
}
