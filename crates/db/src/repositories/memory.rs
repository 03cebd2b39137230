use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadcall_core::domain::call::CallRecord;
use leadcall_core::domain::lead::{Lead, LeadId, LeadUpdate};

use super::{CallRecordRepository, LeadQuery, LeadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, Lead>>,
}

impl InMemoryLeadRepository {
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let leads = leads.into_iter().map(|lead| (lead.id.0.clone(), lead)).collect();
        Self { leads: RwLock::new(leads) }
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn list_dialable(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        let mut dialable: Vec<Lead> = leads
            .values()
            .filter(|lead| lead.is_dialable())
            .filter(|lead| match &query.user_id {
                Some(user_id) => lead.user_id.as_ref() == Some(user_id),
                None => true,
            })
            .cloned()
            .collect();

        dialable.sort_by(|left, right| {
            right.priority.cmp(&left.priority).then(left.created_at.cmp(&right.created_at))
        });
        dialable.truncate(query.limit as usize);
        Ok(dialable)
    }

    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        let lead = leads
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "lead", id: id.0.clone() })?;
        lead.apply(update, at);
        Ok(())
    }

    async fn mark_calling(
        &self,
        ids: &[LeadId],
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut leads = self.leads.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(lead) = leads.get_mut(&id.0) {
                lead.apply(&LeadUpdate::Calling, at);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCallRecordRepository {
    records: RwLock<Vec<CallRecord>>,
}

impl InMemoryCallRecordRepository {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CallRecordRepository for InMemoryCallRecordRepository {
    async fn insert(&self, record: CallRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.call_id == record.call_id) {
            return Err(RepositoryError::Conflict {
                entity: "call_record",
                id: record.call_id.0.clone(),
            });
        }
        records.push(record);
        Ok(())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<CallRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<CallRecord> =
            records.iter().filter(|record| &record.lead_id == lead_id).cloned().collect();
        matching.sort_by(|left, right| left.recorded_at.cmp(&right.recorded_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use leadcall_core::domain::lead::{Lead, LeadId, LeadStatus, LeadUpdate};

    use crate::repositories::{
        InMemoryLeadRepository, LeadQuery, LeadRepository, RepositoryError,
    };

    fn lead(id: &str, status: LeadStatus, priority: i64, age_minutes: i64) -> Lead {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let created_at = base + Duration::minutes(age_minutes);
        let mut lead = Lead::new(LeadId(id.to_string()), "Vikram Rao", "9876543210", created_at);
        lead.status = status;
        lead.priority = priority;
        lead
    }

    #[tokio::test]
    async fn in_memory_lead_repo_round_trip() {
        let repo = InMemoryLeadRepository::default();
        let lead = lead("L-1", LeadStatus::ToCall, 0, 0);

        repo.save(lead.clone()).await.expect("save lead");
        let found = repo.find_by_id(&lead.id).await.expect("find lead");

        assert_eq!(found, Some(lead));
    }

    #[tokio::test]
    async fn in_memory_selection_filters_sorts_and_limits() {
        let mut follow_up_capped = lead("L-capped", LeadStatus::FollowUp, 9, 0);
        follow_up_capped.follow_up_count = 3;
        let repo = InMemoryLeadRepository::with_leads([
            lead("L-qualified", LeadStatus::Qualified, 9, 0),
            follow_up_capped,
            lead("L-young", LeadStatus::ToCall, 1, 30),
            lead("L-old", LeadStatus::CallbackRequested, 1, 10),
            lead("L-urgent", LeadStatus::CallFailed, 4, 50),
        ]);

        let selected = repo.list_dialable(&LeadQuery::new(2)).await.expect("select");
        let ids: Vec<_> = selected.iter().map(|lead| lead.id.0.as_str()).collect();

        assert_eq!(ids, vec!["L-urgent", "L-old"]);
    }

    #[tokio::test]
    async fn in_memory_updates_apply_domain_semantics() {
        let repo = InMemoryLeadRepository::with_leads([lead("L-1", LeadStatus::ToCall, 0, 0)]);
        let at = Utc::now();

        let changed = repo
            .mark_calling(&[LeadId("L-1".to_string()), LeadId("L-ghost".to_string())], at)
            .await
            .expect("mark calling");
        assert_eq!(changed, 1);

        repo.apply_update(
            &LeadId("L-1".to_string()),
            &LeadUpdate::CallFailed { error: "provider rejected".to_string() },
            at,
        )
        .await
        .expect("apply failure");

        let stored = repo.find_by_id(&LeadId("L-1".to_string())).await.expect("find");
        assert_eq!(stored.as_ref().map(|lead| lead.status), Some(LeadStatus::CallFailed));
        assert_eq!(stored.and_then(|lead| lead.call_error), Some("provider rejected".to_string()));

        let missing = repo
            .apply_update(&LeadId("L-ghost".to_string()), &LeadUpdate::Calling, at)
            .await
            .expect_err("missing lead");
        assert!(matches!(missing, RepositoryError::NotFound { .. }));
    }
}
