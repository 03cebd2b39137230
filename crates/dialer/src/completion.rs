use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use leadcall_core::domain::call::{CallId, CallRecord};
use leadcall_core::domain::lead::{LeadId, LeadUpdate};
use leadcall_core::outcome::{classify, Classification};
use leadcall_db::repositories::{CallRecordRepository, LeadRepository, RepositoryError};
use leadcall_voice::{CallResultNotification, CompletionWebhook, ResultNotifier};

use crate::registry::ActiveCallRegistry;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("webhook carried no call id")]
    MissingCallId,
    #[error("call {0} is not active (unknown, expired or already processed)")]
    UnknownCall(CallId),
    #[error("lead {lead_id} for call {call_id} no longer exists")]
    LeadMissing { call_id: CallId, lead_id: LeadId },
    #[error("store failure while completing call {call_id}: {source}")]
    Store {
        call_id: CallId,
        #[source]
        source: RepositoryError,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionReport {
    pub call_id: CallId,
    pub lead_id: LeadId,
    pub classification: Classification,
}

pub struct CompletionHandler {
    leads: Arc<dyn LeadRepository>,
    records: Arc<dyn CallRecordRepository>,
    registry: ActiveCallRegistry,
    notifier: Arc<dyn ResultNotifier>,
}

impl CompletionHandler {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        records: Arc<dyn CallRecordRepository>,
        registry: ActiveCallRegistry,
        notifier: Arc<dyn ResultNotifier>,
    ) -> Self {
        Self { leads, records, registry, notifier }
    }

    /// Classifies a finished call and persists the outcome. The in-flight
    /// entry is claimed before any store access, so it is gone even when a
    /// later step fails.
    pub async fn handle_completion(
        &self,
        webhook: &CompletionWebhook,
    ) -> Result<CompletionReport, CompletionError> {
        let call_id = webhook.call_id().ok_or(CompletionError::MissingCallId)?;
        let active = self.registry.claim(&call_id).await.ok_or_else(|| {
            warn!(
                event_name = "dialer.completion.unknown_call",
                call_id = %call_id,
                "completion received for a call that is not active"
            );
            CompletionError::UnknownCall(call_id.clone())
        })?;
        let lead_id = active.lead_id;

        let store_error =
            |source: RepositoryError| CompletionError::Store { call_id: call_id.clone(), source };
        let lead = self
            .leads
            .find_by_id(&lead_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| CompletionError::LeadMissing {
                call_id: call_id.clone(),
                lead_id: lead_id.clone(),
            })?;

        let now = Utc::now();
        let facts = webhook.facts(call_id.clone());
        let classification = classify(&facts, &lead, now);

        let update = LeadUpdate::CallCompleted(classification.to_update(&facts));
        self.leads.apply_update(&lead_id, &update, now).await.map_err(store_error)?;
        self.records
            .insert(CallRecord::from_facts(
                &facts,
                lead_id.clone(),
                classification.status,
                classification.qualification_score,
                now,
            ))
            .await
            .map_err(store_error)?;

        info!(
            event_name = "dialer.completion.classified",
            call_id = %call_id,
            lead_id = %lead_id,
            rule = ?classification.rule,
            status = %classification.status,
            follow_up_count = classification.follow_up_count,
            "call outcome recorded"
        );

        self.spawn_notification(CallResultNotification {
            lead_id: lead_id.clone(),
            call_id: call_id.clone(),
            status: classification.status,
            result: classification.result.clone(),
            qualification_score: classification.qualification_score,
            summary: facts.summary,
            follow_up_count: classification.follow_up_count,
            callback_scheduled_at: classification.callback_scheduled_at,
            completed_at: now,
        });

        Ok(CompletionReport { call_id, lead_id, classification })
    }

    fn spawn_notification(&self, notification: CallResultNotification) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(error) = notifier.notify(&notification).await {
                warn!(
                    event_name = "dialer.completion.notify_failed",
                    lead_id = %notification.lead_id,
                    call_id = %notification.call_id,
                    error = %error,
                    "downstream notification failed"
                );
            }
        });
    }
}
