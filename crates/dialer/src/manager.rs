use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use leadcall_core::config::DispatchConfig;
use leadcall_core::domain::lead::{LeadId, LeadUpdate};
use leadcall_core::phone::PhoneFormatter;
use leadcall_db::repositories::{
    CallRecordRepository, LeadQuery, LeadRepository, RepositoryError,
};
use leadcall_voice::{CompletionWebhook, ResultNotifier, VoiceProvider};

use crate::completion::{CompletionError, CompletionHandler, CompletionReport};
use crate::dispatcher::{CallDispatcher, DispatchOutcome, DispatchPolicy};
use crate::registry::ActiveCallRegistry;
use crate::selector::select_leads;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("automated calling is already in progress")]
    AlreadyProcessing,
    #[error("lead {0} was not found")]
    LeadNotFound(LeadId),
    #[error("lead selection failed: {0}")]
    Selection(#[source] RepositoryError),
    #[error("failed to mark selected leads as calling: {0}")]
    MarkCalling(#[source] RepositoryError),
    #[error("lead store failure: {0}")]
    Store(#[source] RepositoryError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub message: String,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
    pub total_leads: usize,
    pub max_concurrent: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub active_calls: usize,
    pub max_concurrent: usize,
    pub is_processing: bool,
}

/// Releases the processing flag when a run ends, however it ends.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owns the calling pipeline for one process. Only one automated run may be
/// in progress at a time.
pub struct LeadManager {
    leads: Arc<dyn LeadRepository>,
    registry: ActiveCallRegistry,
    dispatcher: CallDispatcher,
    completion: CompletionHandler,
    default_lead_limit: u32,
    processing: AtomicBool,
}

impl LeadManager {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        records: Arc<dyn CallRecordRepository>,
        voice: Arc<dyn VoiceProvider>,
        notifier: Arc<dyn ResultNotifier>,
        config: &DispatchConfig,
    ) -> Self {
        let registry = ActiveCallRegistry::default();
        let dispatcher = CallDispatcher::new(
            Arc::clone(&leads),
            voice,
            registry.clone(),
            PhoneFormatter::new(config.default_country_code.clone()),
            DispatchPolicy::from(config),
        );
        let completion =
            CompletionHandler::new(Arc::clone(&leads), records, registry.clone(), notifier);

        Self {
            leads,
            registry,
            dispatcher,
            completion,
            default_lead_limit: config.default_lead_limit,
            processing: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn start_automated_calling(
        &self,
        limit: Option<u32>,
        user_id: Option<String>,
    ) -> Result<RunSummary, StartError> {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            warn!(
                event_name = "dialer.manager.already_processing",
                "automated calling already in progress"
            );
            return Err(StartError::AlreadyProcessing);
        };

        let mut query = LeadQuery::new(limit.unwrap_or(self.default_lead_limit));
        if let Some(user_id) = user_id {
            query = query.for_user(user_id);
        }
        info!(
            event_name = "dialer.manager.run_started",
            limit = query.limit,
            user_id = query.user_id.as_deref().unwrap_or("all"),
            "starting automated calling"
        );

        let mut selection = select_leads(self.leads.as_ref(), &query).await;
        if let Some(error) = selection.store_error.take() {
            return Err(StartError::Selection(error));
        }
        let max_concurrent = self.dispatcher.policy().batch_size;
        if selection.is_empty() {
            return Ok(RunSummary {
                message: "No leads available for calling".to_string(),
                success: 0,
                failed: 0,
                results: Vec::new(),
                total_leads: 0,
                max_concurrent,
            });
        }

        let ids: Vec<LeadId> = selection.leads.iter().map(|lead| lead.id.clone()).collect();
        let marked =
            self.leads.mark_calling(&ids, Utc::now()).await.map_err(StartError::MarkCalling)?;
        info!(event_name = "dialer.manager.leads_marked", marked, "marked leads as calling");

        let total_leads = selection.len();
        let batch = self.dispatcher.dispatch_batch(selection.leads).await;
        info!(
            event_name = "dialer.manager.run_finished",
            success = batch.success,
            failed = batch.failed,
            total_leads,
            "automated calling completed"
        );

        Ok(RunSummary {
            message: "Automated calling completed".to_string(),
            success: batch.success,
            failed: batch.failed,
            results: batch.results,
            total_leads,
            max_concurrent,
        })
    }

    /// Places a single call for one lead, outside the batch run.
    pub async fn dispatch_lead(&self, lead_id: &LeadId) -> Result<DispatchOutcome, StartError> {
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await
            .map_err(StartError::Store)?
            .ok_or_else(|| StartError::LeadNotFound(lead_id.clone()))?;
        Ok(self.dispatcher.dispatch_one(lead).await)
    }

    pub async fn handle_completion(
        &self,
        webhook: &CompletionWebhook,
    ) -> Result<CompletionReport, CompletionError> {
        self.completion.handle_completion(webhook).await
    }

    /// Administrative reset of a lead's unanswered-attempt counter.
    pub async fn reset_follow_ups(&self, lead_id: &LeadId) -> Result<(), StartError> {
        self.leads
            .apply_update(lead_id, &LeadUpdate::ResetFollowUps, Utc::now())
            .await
            .map_err(|error| match error {
                RepositoryError::NotFound { .. } => StartError::LeadNotFound(lead_id.clone()),
                other => StartError::Store(other),
            })
    }

    pub async fn stats(&self) -> CallStats {
        CallStats {
            active_calls: self.registry.len().await,
            max_concurrent: self.dispatcher.policy().batch_size,
            is_processing: self.is_processing(),
        }
    }
}
