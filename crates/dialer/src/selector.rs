use std::collections::BTreeMap;

use tracing::{info, warn};

use leadcall_core::domain::lead::Lead;
use leadcall_db::repositories::{LeadQuery, LeadRepository, RepositoryError};

/// Leads picked for one calling run. A store failure yields no leads and
/// records the error instead of propagating it.
#[derive(Debug, Default)]
pub struct Selection {
    pub leads: Vec<Lead>,
    pub store_error: Option<RepositoryError>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    /// Selected lead count per status, keyed by the stored status name.
    pub fn status_breakdown(&self) -> BTreeMap<&'static str, usize> {
        let mut breakdown = BTreeMap::new();
        for lead in &self.leads {
            *breakdown.entry(lead.status.as_str()).or_insert(0) += 1;
        }
        breakdown
    }
}

pub async fn select_leads(repo: &dyn LeadRepository, query: &LeadQuery) -> Selection {
    match repo.list_dialable(query).await {
        Ok(leads) => {
            let selection = Selection { leads, store_error: None };
            info!(
                event_name = "dialer.selector.selected",
                limit = query.limit,
                user_id = query.user_id.as_deref().unwrap_or("all"),
                selected = selection.len(),
                breakdown = ?selection.status_breakdown(),
                "selected leads for calling"
            );
            selection
        }
        Err(error) => {
            warn!(
                event_name = "dialer.selector.store_failed",
                error = %error,
                "lead selection failed; returning no leads"
            );
            Selection { leads: Vec::new(), store_error: Some(error) }
        }
    }
}

#[cfg(test)]
mod tests {
    use leadcall_core::domain::lead::{Lead, LeadStatus};
    use leadcall_db::repositories::{InMemoryLeadRepository, LeadQuery, RepositoryError};

    use super::select_leads;
    use crate::test_support::{lead, FaultyLeadRepository};

    fn lead_with(status: LeadStatus, follow_up_count: u32, minute: i64) -> Lead {
        let id = format!("L-{}-{follow_up_count}", status.as_str());
        let mut lead = lead(&id, status, 0, minute);
        lead.follow_up_count = follow_up_count;
        lead
    }

    #[tokio::test]
    async fn selects_exactly_the_dialable_statuses() {
        let mut leads: Vec<Lead> = LeadStatus::ALL
            .iter()
            .enumerate()
            .map(|(index, status)| lead_with(*status, 0, index as i64))
            .collect();
        leads.push(lead_with(LeadStatus::FollowUp, 2, 20));
        leads.push(lead_with(LeadStatus::FollowUp, 3, 21));
        let repo = InMemoryLeadRepository::with_leads(leads);

        let selection = select_leads(&repo, &LeadQuery::new(50)).await;
        let mut ids: Vec<_> = selection.leads.iter().map(|lead| lead.id.0.clone()).collect();
        ids.sort();

        assert_eq!(
            ids,
            vec![
                "L-call_failed-0",
                "L-callback_requested-0",
                "L-follow_up-0",
                "L-follow_up-2",
                "L-to_call-0",
            ]
        );
        assert_eq!(selection.status_breakdown().get("follow_up"), Some(&2));
        assert!(selection.store_error.is_none());
    }

    #[tokio::test]
    async fn store_failure_yields_empty_selection_with_error() {
        let selection = select_leads(&FaultyLeadRepository::offline(), &LeadQuery::new(20)).await;

        assert!(selection.is_empty());
        assert!(matches!(
            selection.store_error,
            Some(RepositoryError::Decode(ref message)) if message == "store offline"
        ));
    }
}
