//! Chart lifecycle integration tests.

use odontogram_core::db::Database;
use odontogram_core::engine::{ChartError, ChartManager, NewChartVersion, StatsScope};
use odontogram_core::export::BillingExporter;
use odontogram_core::models::{
    ClinicalContext, NewCompletedTreatment, NewTreatmentItem, PatientRecord, Surface,
    SurfaceCondition, SurfaceState, ToothNumber, ToothUpdate, TreatmentStatus,
};
use odontogram_core::{ActivePolicy, ChartConfig};

fn setup_patient(db: &Database, first: &str, last: &str) -> String {
    let patient = PatientRecord::new(first.to_string(), last.to_string());
    db.insert_patient(&patient).unwrap();
    patient.patient_id
}

fn clinic_a() -> ClinicalContext {
    ClinicalContext::new("dr-oliveira", "clinic-a")
}

#[test]
fn test_first_exam_to_second_version() {
    let db = Database::open_in_memory().unwrap();
    let patient_id = setup_patient(&db, "Ana", "Silva");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());

    // First exam: 32 healthy teeth, version 1
    let chart = manager.initialize_chart(&patient_id, &clinic_a()).unwrap();
    assert_eq!(chart.version, 1);
    assert_eq!(chart.teeth.len(), 32);
    for (i, tooth) in chart.teeth.iter().enumerate() {
        assert_eq!(tooth.number.get() as usize, i + 1);
        assert!(Surface::ALL
            .iter()
            .all(|s| tooth.surfaces.get(*s).condition == SurfaceCondition::Healthy));
    }

    // Plan, start and complete a procedure on tooth 14
    let item = manager
        .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(14, "Composite filling"))
        .unwrap();
    assert_eq!(item.status, TreatmentStatus::Planned);

    manager
        .transition_treatment(&patient_id, 1, &item.item_id, TreatmentStatus::InProgress, &clinic_a())
        .unwrap();
    let completed = manager
        .transition_treatment(&patient_id, 1, &item.item_id, TreatmentStatus::Completed, &clinic_a())
        .unwrap();
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.completed_by.as_deref(), Some("dr-oliveira"));

    // Completed is terminal
    for to in TreatmentStatus::ALL {
        let result = manager.transition_treatment(&patient_id, 1, &item.item_id, to, &clinic_a());
        assert!(matches!(result, Err(ChartError::InvalidTransition { .. })));
    }

    // Second version owns its own teeth
    let v2 = manager
        .create_version(&patient_id, &clinic_a(), NewChartVersion::default())
        .unwrap();
    assert_eq!(v2.version, 2);

    let update = ToothUpdate::default().surface(
        Surface::Mesial,
        SurfaceState::with_condition(SurfaceCondition::Filling),
    );
    let v3 = manager
        .revise_teeth(&patient_id, &clinic_a(), &[(14, update)], None)
        .unwrap();
    assert_eq!(v3.version, 3);

    let fourteen = ToothNumber::new(14).unwrap();
    let v1 = manager.get_chart(&patient_id, 1).unwrap();
    let v2 = manager.get_chart(&patient_id, 2).unwrap();
    assert_eq!(
        v1.teeth.tooth(fourteen).surfaces.mesial.condition,
        SurfaceCondition::Healthy
    );
    assert_eq!(
        v2.teeth.tooth(fourteen).surfaces.mesial.condition,
        SurfaceCondition::Healthy
    );
    assert_eq!(
        v3.teeth.tooth(fourteen).surfaces.mesial.condition,
        SurfaceCondition::Filling
    );

    // Version 1 still carries its completed item, version 2 starts empty
    assert_eq!(v1.find_item(&item.item_id), Some(&completed));
    assert!(v2.treatment_plan.is_empty());
}

#[test]
fn test_versions_are_gapless() {
    let db = Database::open_in_memory().unwrap();
    let patient_id = setup_patient(&db, "Ana", "Silva");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());

    manager.initialize_chart(&patient_id, &clinic_a()).unwrap();
    for expected in 2..=6 {
        let chart = manager
            .create_version(&patient_id, &clinic_a(), NewChartVersion::default())
            .unwrap();
        assert_eq!(chart.version, expected);
    }

    let versions: Vec<u32> = manager
        .list_charts(&patient_id, true)
        .unwrap()
        .iter()
        .map(|c| c.version)
        .collect();
    assert_eq!(versions, vec![6, 5, 4, 3, 2, 1]);

    let duplicate = manager.create_version(
        &patient_id,
        &clinic_a(),
        NewChartVersion {
            version: Some(4),
            ..Default::default()
        },
    );
    assert!(matches!(duplicate, Err(ChartError::Conflict(_))));
}

#[test]
fn test_patients_are_independent() {
    let db = Database::open_in_memory().unwrap();
    let ana = setup_patient(&db, "Ana", "Silva");
    let rui = setup_patient(&db, "Rui", "Costa");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());

    manager.initialize_chart(&ana, &clinic_a()).unwrap();
    manager
        .create_version(&ana, &clinic_a(), NewChartVersion::default())
        .unwrap();

    let rui_chart = manager.initialize_chart(&rui, &clinic_a()).unwrap();
    assert_eq!(rui_chart.version, 1);
    assert_eq!(manager.latest_chart(&ana).unwrap().version, 2);
}

#[test]
fn test_single_active_policy_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("charts.db");
    let config = ChartConfig::new(path.clone(), ActivePolicy::SingleActive).unwrap();

    let patient_id = {
        let db = Database::open(config.database_path()).unwrap();
        let patient_id = setup_patient(&db, "Ana", "Silva");
        let manager = ChartManager::for_database(&db, &config);
        manager.initialize_chart(&patient_id, &clinic_a()).unwrap();
        manager
            .create_version(&patient_id, &clinic_a(), NewChartVersion::default())
            .unwrap();
        patient_id
    };

    let db = Database::open(&path).unwrap();
    let manager = ChartManager::for_database(&db, &config);
    let active = manager.list_charts(&patient_id, false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version, 2);
    assert!(!manager.get_chart(&patient_id, 1).unwrap().is_active);
}

#[test]
fn test_statistics_by_scope() {
    let db = Database::open_in_memory().unwrap();
    let ana = setup_patient(&db, "Ana", "Silva");
    let rui = setup_patient(&db, "Rui", "Costa");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());
    let clinic_b = ClinicalContext::new("dr-mendes", "clinic-b");

    manager.initialize_chart(&ana, &clinic_a()).unwrap();
    manager.initialize_chart(&rui, &clinic_b).unwrap();

    let mut crown = NewTreatmentItem::new(3, "Crown");
    crown.estimated_cost = 900.0;
    let crown = manager.add_treatment_item(&ana, 1, crown).unwrap();

    let mut sealant = NewTreatmentItem::new(19, "Sealant");
    sealant.estimated_cost = 60.0;
    let sealant = manager.add_treatment_item(&ana, 1, sealant).unwrap();
    manager
        .transition_treatment(&ana, 1, &sealant.item_id, TreatmentStatus::Cancelled, &clinic_a())
        .unwrap();

    let mut cleaning = NewTreatmentItem::new(8, "Cleaning");
    cleaning.estimated_cost = 100.0;
    let cleaning = manager.add_treatment_item(&rui, 1, cleaning).unwrap();
    for to in [TreatmentStatus::InProgress, TreatmentStatus::Completed] {
        manager
            .transition_treatment(&rui, 1, &cleaning.item_id, to, &clinic_b)
            .unwrap();
    }
    manager
        .record_completed_treatment(
            &rui,
            1,
            NewCompletedTreatment {
                tooth: 8,
                procedure: "Cleaning".into(),
                date: None,
                cost: 95.0,
                notes: Some("Discounted".into()),
            },
            &clinic_b,
        )
        .unwrap();

    let all = manager.statistics(&StatsScope::All).unwrap();
    assert_eq!(all.total_charts, 2);
    assert_eq!(all.active_treatments, 1);
    assert_eq!(all.status_counts.planned, 1);
    assert_eq!(all.status_counts.completed, 1);
    assert_eq!(all.status_counts.cancelled, 1);
    assert_eq!(all.estimated_revenue, 1000.0);
    assert_eq!(all.completion_rate, 0.5);
    assert_eq!(all.realized_revenue, 95.0);

    let clinic = manager
        .statistics(&StatsScope::Clinic("clinic-a".into()))
        .unwrap();
    assert_eq!(clinic.total_charts, 1);
    assert_eq!(clinic.estimated_revenue, 900.0);
    assert_eq!(clinic.realized_revenue, 0.0);

    let patient = manager.statistics(&StatsScope::Patient(rui.clone())).unwrap();
    assert_eq!(patient.completion_rate, 1.0);
    assert_eq!(patient.realized_revenue, 95.0);

    // Archived charts drop out of the active counts but stay in history
    manager.archive_chart(&ana, 1).unwrap();
    let after = manager.statistics(&StatsScope::All).unwrap();
    assert_eq!(after.total_charts, 1);
    assert_eq!(after.active_treatments, 0);
    assert_eq!(after.status_counts.planned, 1);
    assert_eq!(after.estimated_revenue, 1000.0);

    assert_eq!(crown.status, TreatmentStatus::Planned);
    assert!(matches!(
        manager.statistics(&StatsScope::Patient("nobody".into())),
        Err(ChartError::NotFound(_))
    ));
}

#[test]
fn test_audit_log_survives_plan_rewrites() {
    let db = Database::open_in_memory().unwrap();
    let patient_id = setup_patient(&db, "Ana", "Silva");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());
    manager.initialize_chart(&patient_id, &clinic_a()).unwrap();

    manager
        .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(30, "Crown"))
        .unwrap();
    let entry = manager
        .record_completed_treatment(
            &patient_id,
            1,
            NewCompletedTreatment {
                tooth: 30,
                procedure: "Crown".into(),
                date: Some("2025-03-02T14:30:00Z".into()),
                cost: 1100.0,
                notes: None,
            },
            &clinic_a(),
        )
        .unwrap();

    manager.replace_treatment_plan(&patient_id, 1, Vec::new()).unwrap();
    manager.archive_chart(&patient_id, 1).unwrap();

    assert_eq!(manager.completed_treatments(&patient_id, 1).unwrap(), vec![entry.clone()]);
    assert!(manager.verify_audit_chain(&patient_id, 1).unwrap().is_intact());

    let export = BillingExporter::new(&db).export_chart(&patient_id, 1).unwrap();
    assert_eq!(export.line_items.len(), 1);
    assert_eq!(export.line_items[0].entry_hash, entry.entry_hash);
    assert_eq!(export.line_items[0].performed_at, "2025-03-02T14:30:00Z");
}

#[test]
fn test_rejected_operations_leave_state_unchanged() {
    let db = Database::open_in_memory().unwrap();
    let patient_id = setup_patient(&db, "Ana", "Silva");
    let manager = ChartManager::for_database(&db, &ChartConfig::default());
    manager.initialize_chart(&patient_id, &clinic_a()).unwrap();
    manager
        .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(5, "Extraction"))
        .unwrap();
    let before = manager.get_chart(&patient_id, 1).unwrap();

    let bad_tooth = manager.add_treatment_item(&patient_id, 1, NewTreatmentItem::new(99, "Implant"));
    assert!(matches!(bad_tooth, Err(ChartError::Validation(_))));

    let bad_plan = manager.replace_treatment_plan(
        &patient_id,
        1,
        vec![NewTreatmentItem::new(4, "Sealant"), NewTreatmentItem::new(0, "Sealant")],
    );
    assert!(matches!(bad_plan, Err(ChartError::Validation(_))));

    let unknown_version = manager.add_treatment_item(&patient_id, 7, NewTreatmentItem::new(4, "Sealant"));
    assert!(matches!(unknown_version, Err(ChartError::NotFound(_))));

    assert_eq!(manager.get_chart(&patient_id, 1).unwrap(), before);
}
