//! Treatment plan ledger and the completed-treatment audit chain.

use sha2::{Digest, Sha256};

use crate::db::DbError;
use crate::models::{
    ClinicalContext, CompletedTreatment, NewCompletedTreatment, NewTreatmentItem,
    TreatmentPlanItem, TreatmentStatus,
};

use super::manager::validate_context;
use super::{ChartError, ChartManager, ChartResult};

/// Outcome of walking a chart's audit chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditChainReport {
    pub chart_id: String,
    pub entry_count: usize,
    /// Hash of the newest entry
    pub head_hash: Option<String>,
    /// First entry whose hash or back-link does not check out
    pub first_broken_entry: Option<String>,
}

impl AuditChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken_entry.is_none()
    }
}

impl<'a> ChartManager<'a> {
    /// Add a planned item to an active chart.
    pub fn add_treatment_item(
        &self,
        patient_id: &str,
        version: u32,
        item: NewTreatmentItem,
    ) -> ChartResult<TreatmentPlanItem> {
        let item = item.into_item()?;
        self.mutate(patient_id, version, |chart| {
            chart.treatment_plan.push(item.clone());
            Ok(())
        })?;

        tracing::info!(
            patient_id,
            version,
            item_id = %item.item_id,
            tooth = item.tooth.get(),
            "Added treatment item"
        );
        Ok(item)
    }

    /// Move one plan item along the status graph.
    ///
    /// Completing stamps `completed_at` and `completed_by` (the acting
    /// doctor). It does not append to the audit log; record the performed
    /// procedure with [`ChartManager::record_completed_treatment`].
    pub fn transition_treatment(
        &self,
        patient_id: &str,
        version: u32,
        item_id: &str,
        to: TreatmentStatus,
        context: &ClinicalContext,
    ) -> ChartResult<TreatmentPlanItem> {
        validate_context(context)?;

        let (_, (from, item)) = self.mutate(patient_id, version, |chart| {
            let item = chart
                .find_item_mut(item_id)
                .ok_or_else(|| ChartError::NotFound(format!("Treatment item {}", item_id)))?;
            let from = item.status;
            item.transition(to, &context.doctor_id).map_err(|e| {
                tracing::warn!(patient_id, version, item_id, from = %e.from, to = %e.to, "Rejected treatment transition");
                ChartError::from(e)
            })?;
            Ok((from, item.clone()))
        })?;

        tracing::info!(patient_id, version, item_id, from = %from, to = %to, "Treatment status changed");
        Ok(item)
    }

    /// Overwrite the whole plan.
    ///
    /// Coarse and lossy: items not present in `items` are dropped whatever
    /// their status, and every new item starts planned with a fresh ID. Use
    /// the per-item operations for anything in flight.
    pub fn replace_treatment_plan(
        &self,
        patient_id: &str,
        version: u32,
        items: Vec<NewTreatmentItem>,
    ) -> ChartResult<Vec<TreatmentPlanItem>> {
        let items = items
            .into_iter()
            .map(NewTreatmentItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        let (_, dropped_open) = self.mutate(patient_id, version, |chart| {
            let dropped_open = chart.open_items().count();
            chart.treatment_plan = items.clone();
            Ok(dropped_open)
        })?;

        if dropped_open > 0 {
            tracing::warn!(patient_id, version, dropped_open, "Replaced plan dropped open items");
        }
        tracing::info!(patient_id, version, items = items.len(), "Replaced treatment plan");
        Ok(items)
    }

    /// Copy every planned or in-progress item of `from_version` into
    /// `to_version` under fresh IDs. The source chart is not modified.
    pub fn carry_forward_open_items(
        &self,
        patient_id: &str,
        from_version: u32,
        to_version: u32,
    ) -> ChartResult<Vec<TreatmentPlanItem>> {
        if from_version == to_version {
            return Err(ChartError::Validation(
                "Cannot carry items forward into the same version".into(),
            ));
        }

        let source = self.get_chart(patient_id, from_version)?;
        let carried: Vec<TreatmentPlanItem> =
            source.open_items().map(TreatmentPlanItem::reissue).collect();

        self.mutate(patient_id, to_version, |chart| {
            chart.treatment_plan.extend(carried.iter().cloned());
            Ok(())
        })?;

        tracing::info!(
            patient_id,
            from_version,
            to_version,
            carried = carried.len(),
            "Carried open treatment items forward"
        );
        Ok(carried)
    }

    /// Append a performed procedure to the chart's audit log.
    ///
    /// Allowed on archived charts: the log records what happened and is
    /// independent of the plan and of the chart's active flag.
    pub fn record_completed_treatment(
        &self,
        patient_id: &str,
        version: u32,
        input: NewCompletedTreatment,
        context: &ClinicalContext,
    ) -> ChartResult<CompletedTreatment> {
        let tooth = input.validate()?;
        validate_context(context)?;
        let chart = self.get_chart(patient_id, version)?;

        // 1. Link to the current chain tip
        let previous_hash = self.store.last_audit_hash(&chart.chart_id)?;

        // 2. Build and hash the entry
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let mut entry = CompletedTreatment {
            entry_id: uuid::Uuid::new_v4().to_string(),
            chart_id: chart.chart_id,
            tooth,
            procedure: input.procedure.trim().to_string(),
            date: input.date.unwrap_or_else(|| recorded_at.clone()),
            cost: input.cost,
            doctor_id: context.doctor_id.clone(),
            notes: input.notes,
            recorded_at,
            previous_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry_hash(&entry)?;

        // 3. Append; a moved tip means another writer got there first
        self.store.append_completed_treatment(&entry).map_err(|e| {
            let err = ChartError::from(e);
            if matches!(err, ChartError::Conflict(_)) {
                tracing::warn!(patient_id, version, "Audit chain tip moved");
            }
            err
        })?;

        tracing::info!(
            patient_id,
            version,
            entry_id = %entry.entry_id,
            tooth = entry.tooth.get(),
            cost = entry.cost,
            "Recorded completed treatment"
        );
        Ok(entry)
    }

    /// Audit entries of one chart in append order.
    pub fn completed_treatments(
        &self,
        patient_id: &str,
        version: u32,
    ) -> ChartResult<Vec<CompletedTreatment>> {
        let chart = self.get_chart(patient_id, version)?;
        Ok(self.store.list_completed_treatments(&chart.chart_id)?)
    }

    /// Recompute every entry hash and back-link of a chart's audit log.
    pub fn verify_audit_chain(&self, patient_id: &str, version: u32) -> ChartResult<AuditChainReport> {
        let chart = self.get_chart(patient_id, version)?;
        let entries = self.store.list_completed_treatments(&chart.chart_id)?;
        let first_broken_entry = first_broken_link(&entries)?.map(|i| entries[i].entry_id.clone());

        if let Some(entry_id) = &first_broken_entry {
            tracing::warn!(patient_id, version, entry_id = %entry_id, "Audit chain broken");
        }

        Ok(AuditChainReport {
            chart_id: chart.chart_id,
            entry_count: entries.len(),
            head_hash: entries.last().map(|e| e.entry_hash.clone()),
            first_broken_entry,
        })
    }
}

/// Compute SHA-256 hash of data.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash of an entry's canonical payload, which includes its back-link.
pub fn entry_hash(entry: &CompletedTreatment) -> ChartResult<String> {
    let payload = entry
        .to_canonical_json()
        .map_err(|e| ChartError::Storage(DbError::Json(e)))?;
    Ok(hash_data(payload.as_bytes()))
}

/// Index of the first entry that does not link to its predecessor or whose
/// stored hash does not match its payload.
pub fn first_broken_link(entries: &[CompletedTreatment]) -> ChartResult<Option<usize>> {
    let mut expected_previous: Option<&str> = None;
    for (i, entry) in entries.iter().enumerate() {
        if entry.previous_hash.as_deref() != expected_previous || entry_hash(entry)? != entry.entry_hash {
            return Ok(Some(i));
        }
        expected_previous = Some(&entry.entry_hash);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartConfig;
    use crate::db::Database;
    use crate::models::PatientRecord;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = PatientRecord::new("Ana".into(), "Silva".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.patient_id)
    }

    fn ctx() -> ClinicalContext {
        ClinicalContext::new("dr-1", "clinic-1")
    }

    fn completed(tooth: u32, cost: f64) -> NewCompletedTreatment {
        NewCompletedTreatment {
            tooth,
            procedure: "Composite filling".into(),
            date: Some("2025-07-19T18:03:00Z".into()),
            cost,
            notes: None,
        }
    }

    #[test]
    fn test_hash_data() {
        assert_eq!(
            hash_data(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_item_lifecycle() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let item = manager
            .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(14, "Root canal"))
            .unwrap();
        assert_eq!(item.status, TreatmentStatus::Planned);

        manager
            .transition_treatment(&patient_id, 1, &item.item_id, TreatmentStatus::InProgress, &ctx())
            .unwrap();
        let done = manager
            .transition_treatment(&patient_id, 1, &item.item_id, TreatmentStatus::Completed, &ctx())
            .unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.completed_by.as_deref(), Some("dr-1"));

        let reopened = manager.transition_treatment(
            &patient_id,
            1,
            &item.item_id,
            TreatmentStatus::Planned,
            &ctx(),
        );
        assert!(matches!(
            reopened,
            Err(ChartError::InvalidTransition {
                from: TreatmentStatus::Completed,
                to: TreatmentStatus::Planned
            })
        ));

        let stored = manager.get_chart(&patient_id, 1).unwrap();
        assert_eq!(stored.find_item(&item.item_id), Some(&done));
        assert!(manager.completed_treatments(&patient_id, 1).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_transition_writes_nothing() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        let item = manager
            .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(3, "Sealant"))
            .unwrap();
        let before = manager.get_chart(&patient_id, 1).unwrap();

        let skipped = manager.transition_treatment(
            &patient_id,
            1,
            &item.item_id,
            TreatmentStatus::Completed,
            &ctx(),
        );
        assert!(matches!(skipped, Err(ChartError::InvalidTransition { .. })));
        assert_eq!(manager.get_chart(&patient_id, 1).unwrap(), before);
    }

    #[test]
    fn test_unknown_item_not_found() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let result =
            manager.transition_treatment(&patient_id, 1, "missing", TreatmentStatus::Cancelled, &ctx());
        assert!(matches!(result, Err(ChartError::NotFound(_))));
    }

    #[test]
    fn test_out_of_range_tooth_rejected() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let result = manager.add_treatment_item(&patient_id, 1, NewTreatmentItem::new(99, "Implant"));
        assert!(matches!(result, Err(ChartError::Validation(_))));
        assert_eq!(manager.get_chart(&patient_id, 1).unwrap().revision, 0);
    }

    #[test]
    fn test_replace_plan_overwrites() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        manager
            .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(3, "Sealant"))
            .unwrap();

        let replaced = manager
            .replace_treatment_plan(
                &patient_id,
                1,
                vec![NewTreatmentItem::new(8, "Veneer"), NewTreatmentItem::new(9, "Veneer")],
            )
            .unwrap();

        let chart = manager.get_chart(&patient_id, 1).unwrap();
        assert_eq!(chart.treatment_plan, replaced);
        assert_eq!(chart.treatment_plan.len(), 2);
    }

    #[test]
    fn test_carry_forward_copies_open_items_only() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let open = manager
            .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(3, "Sealant"))
            .unwrap();
        let cancelled = manager
            .add_treatment_item(&patient_id, 1, NewTreatmentItem::new(4, "Sealant"))
            .unwrap();
        manager
            .transition_treatment(&patient_id, 1, &cancelled.item_id, TreatmentStatus::Cancelled, &ctx())
            .unwrap();

        manager
            .create_version(&patient_id, &ctx(), Default::default())
            .unwrap();
        let carried = manager.carry_forward_open_items(&patient_id, 1, 2).unwrap();

        assert_eq!(carried.len(), 1);
        assert_ne!(carried[0].item_id, open.item_id);
        assert_eq!(carried[0].tooth, open.tooth);
        assert_eq!(manager.get_chart(&patient_id, 2).unwrap().treatment_plan, carried);
        assert_eq!(manager.get_chart(&patient_id, 1).unwrap().treatment_plan.len(), 2);

        assert!(matches!(
            manager.carry_forward_open_items(&patient_id, 2, 2),
            Err(ChartError::Validation(_))
        ));
    }

    #[test]
    fn test_archived_chart_rejects_ledger_changes() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        manager.archive_chart(&patient_id, 1).unwrap();

        let result = manager.add_treatment_item(&patient_id, 1, NewTreatmentItem::new(3, "Sealant"));
        assert!(matches!(result, Err(ChartError::Conflict(_))));
    }

    #[test]
    fn test_audit_chain_links_entries() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let first = manager
            .record_completed_treatment(&patient_id, 1, completed(14, 120.0), &ctx())
            .unwrap();
        let second = manager
            .record_completed_treatment(&patient_id, 1, completed(15, 80.0), &ctx())
            .unwrap();

        assert!(first.previous_hash.is_none());
        assert_eq!(second.previous_hash.as_deref(), Some(first.entry_hash.as_str()));

        let report = manager.verify_audit_chain(&patient_id, 1).unwrap();
        assert!(report.is_intact());
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.head_hash, Some(second.entry_hash.clone()));

        assert_eq!(
            manager.completed_treatments(&patient_id, 1).unwrap(),
            vec![first, second]
        );
    }

    #[test]
    fn test_tampered_entry_detected() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        manager
            .record_completed_treatment(&patient_id, 1, completed(14, 120.0), &ctx())
            .unwrap();
        manager
            .record_completed_treatment(&patient_id, 1, completed(15, 80.0), &ctx())
            .unwrap();

        let mut entries = manager.completed_treatments(&patient_id, 1).unwrap();
        assert_eq!(first_broken_link(&entries).unwrap(), None);

        entries[1].cost = 8.0;
        assert_eq!(first_broken_link(&entries).unwrap(), Some(1));

        entries.remove(0);
        assert_eq!(first_broken_link(&entries).unwrap(), Some(0));
    }

    #[test]
    fn test_audit_entries_immutable_in_storage() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        manager
            .record_completed_treatment(&patient_id, 1, completed(14, 120.0), &ctx())
            .unwrap();

        assert!(db
            .conn()
            .execute("UPDATE completed_treatments SET cost = 1", [])
            .is_err());
        assert!(db.conn().execute("DELETE FROM completed_treatments", []).is_err());
        assert!(manager.verify_audit_chain(&patient_id, 1).unwrap().is_intact());
    }

    #[test]
    fn test_audit_allowed_on_archived_chart() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();
        manager.archive_chart(&patient_id, 1).unwrap();

        assert!(manager
            .record_completed_treatment(&patient_id, 1, completed(14, 120.0), &ctx())
            .is_ok());
    }

    #[test]
    fn test_invalid_completed_treatment_rejected() {
        let (db, patient_id) = setup();
        let manager = ChartManager::for_database(&db, &ChartConfig::default());
        manager.initialize_chart(&patient_id, &ctx()).unwrap();

        let negative = manager.record_completed_treatment(&patient_id, 1, completed(14, -5.0), &ctx());
        assert!(matches!(negative, Err(ChartError::Validation(_))));
        let bad_tooth = manager.record_completed_treatment(&patient_id, 1, completed(0, 5.0), &ctx());
        assert!(matches!(bad_tooth, Err(ChartError::Validation(_))));
        assert!(manager.completed_treatments(&patient_id, 1).unwrap().is_empty());
    }
}
