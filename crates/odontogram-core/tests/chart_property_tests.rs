//! Property-based tests for tooth numbering, the status graph and versioning.

use odontogram_core::db::Database;
use odontogram_core::engine::{ChartError, ChartManager, NewChartVersion};
use odontogram_core::models::{
    ClinicalContext, Dentition, NewTreatmentItem, PatientRecord, Quadrant, ToothNumber,
    TreatmentStatus,
};
use odontogram_core::ChartConfig;
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = TreatmentStatus> {
    prop::sample::select(TreatmentStatus::ALL.to_vec())
}

proptest! {
    /// Quadrant depends only on the number and matches the fixed ranges
    #[test]
    fn quadrant_is_pure(n in 1u8..=32) {
        let tooth = ToothNumber::new(n).unwrap();
        let expected = match n {
            1..=8 => Quadrant::UpperRight,
            9..=16 => Quadrant::UpperLeft,
            17..=24 => Quadrant::LowerLeft,
            _ => Quadrant::LowerRight,
        };
        prop_assert_eq!(tooth.quadrant(), expected);
        prop_assert_eq!(ToothNumber::new(n).unwrap().quadrant(), tooth.quadrant());
        prop_assert_eq!(Dentition::healthy().tooth(tooth).quadrant(), expected);
    }

    /// FDI conversion is a bijection onto the permanent-dentition codes
    #[test]
    fn fdi_mapping_inverts(n in 1u8..=32) {
        let tooth = ToothNumber::new(n).unwrap();
        let fdi = tooth.to_fdi();
        prop_assert!((1..=4).contains(&(fdi / 10)));
        prop_assert!((1..=8).contains(&(fdi % 10)));
        prop_assert_eq!(ToothNumber::from_fdi(fdi).unwrap(), tooth);
    }

    /// Anything outside 1..=32 is rejected
    #[test]
    fn out_of_range_teeth_rejected(n in prop_oneof![Just(0u32), 33u32..10_000]) {
        prop_assert!(ToothNumber::from_u32(n).is_err());
        prop_assert!(NewTreatmentItem::new(n, "Filling").into_item().is_err());
    }

    /// Any path through the status graph leaves terminal items untouched
    #[test]
    fn terminal_states_are_final(path in proptest::collection::vec(status_strategy(), 1..12)) {
        let mut item = NewTreatmentItem::new(14, "Filling").into_item().unwrap();

        for to in path {
            let before = item.clone();
            match item.transition(to, "dr-1") {
                Ok(()) => {
                    prop_assert!(!before.status.is_terminal());
                    prop_assert!(before.status.can_transition_to(to));
                    if to == TreatmentStatus::Completed {
                        prop_assert!(item.completed_at.is_some());
                        prop_assert_eq!(item.completed_by.as_deref(), Some("dr-1"));
                    }
                }
                Err(e) => {
                    prop_assert_eq!(e.from, before.status);
                    prop_assert_eq!(&item, &before);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Sequential creation yields 1..=n with no gaps
    #[test]
    fn versions_strictly_increase(count in 1u32..8) {
        let db = Database::open_in_memory().unwrap();
        let patient = PatientRecord::new("Ana".into(), "Silva".into());
        db.insert_patient(&patient).unwrap();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        let ctx = ClinicalContext::new("dr-1", "clinic-1");

        for expected in 1..=count {
            let chart = manager
                .create_version(&patient.patient_id, &ctx, NewChartVersion::default())
                .unwrap();
            prop_assert_eq!(chart.version, expected);
            prop_assert_eq!(chart.teeth.len(), 32);
            prop_assert!(chart.teeth.is_all_healthy());
        }

        for taken in 1..=count {
            let result = manager.create_version(
                &patient.patient_id,
                &ctx,
                NewChartVersion { version: Some(taken), ..Default::default() },
            );
            prop_assert!(matches!(result, Err(ChartError::Conflict(_))));
        }
    }
}
