use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use leadcall_core::config::{AppConfig, DispatchConfig};
use leadcall_core::domain::call::{ActiveCall, CallId};
use leadcall_core::domain::lead::{Lead, LeadId, LeadUpdate};
use leadcall_core::errors::DomainError;
use leadcall_core::phone::PhoneFormatter;
use leadcall_db::repositories::LeadRepository;
use leadcall_voice::{OutboundCall, VoiceError, VoiceProvider};

use crate::registry::ActiveCallRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Retries after the first attempt.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default().dispatch)
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.max_concurrent_calls.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            retry_attempts: config.call_retry_attempts,
            retry_delay: Duration::from_millis(config.call_retry_delay_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("call could not be placed after {attempts} attempts: {source}")]
    Provider {
        attempts: u32,
        #[source]
        source: VoiceError,
    },
}

/// Per-lead result of one dispatch. Every lead lands in exactly one variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Placed { lead_id: LeadId, call_id: CallId },
    Failed { lead_id: LeadId, error: String },
}

impl DispatchOutcome {
    pub fn lead_id(&self) -> &LeadId {
        match self {
            Self::Placed { lead_id, .. } | Self::Failed { lead_id, .. } => lead_id,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
}

impl BatchSummary {
    fn record(&mut self, outcome: DispatchOutcome) {
        if outcome.is_placed() {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }
}

pub struct CallDispatcher {
    leads: Arc<dyn LeadRepository>,
    voice: Arc<dyn VoiceProvider>,
    registry: ActiveCallRegistry,
    formatter: PhoneFormatter,
    policy: DispatchPolicy,
}

impl CallDispatcher {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        voice: Arc<dyn VoiceProvider>,
        registry: ActiveCallRegistry,
        formatter: PhoneFormatter,
        policy: DispatchPolicy,
    ) -> Self {
        Self { leads, voice, registry, formatter, policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Dispatches in fixed-size batches, one batch at a time, pausing between
    /// batches. Results keep the input order.
    pub async fn dispatch_batch(&self, leads: Vec<Lead>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let batch_count = leads.len().div_ceil(self.policy.batch_size);

        for (index, batch) in leads.chunks(self.policy.batch_size).enumerate() {
            info!(
                event_name = "dialer.dispatcher.batch_started",
                batch = index + 1,
                batch_count,
                size = batch.len(),
                "dispatching batch"
            );

            let outcomes =
                join_all(batch.iter().cloned().map(|lead| self.dispatch_one(lead))).await;
            for outcome in outcomes {
                summary.record(outcome);
            }

            if index + 1 < batch_count && !self.policy.batch_delay.is_zero() {
                tokio::time::sleep(self.policy.batch_delay).await;
            }
        }

        info!(
            event_name = "dialer.dispatcher.batch_finished",
            success = summary.success,
            failed = summary.failed,
            "batch dispatch finished"
        );
        summary
    }

    pub async fn dispatch_one(&self, lead: Lead) -> DispatchOutcome {
        let lead_id = lead.id.clone();
        let marked = self.leads.apply_update(&lead_id, &LeadUpdate::Calling, Utc::now()).await;
        if let Err(error) = marked {
            warn!(
                event_name = "dialer.dispatcher.mark_calling_failed",
                lead_id = %lead_id,
                error = %error,
                "could not mark lead as calling"
            );
        }

        match self.place_call(&lead).await {
            Ok(call_id) => {
                self.registry.insert(ActiveCall::new(call_id.clone(), lead, Utc::now())).await;
                let update = LeadUpdate::InCall { call_id: call_id.clone() };
                if let Err(error) = self.leads.apply_update(&lead_id, &update, Utc::now()).await {
                    warn!(
                        event_name = "dialer.dispatcher.mark_in_call_failed",
                        lead_id = %lead_id,
                        call_id = %call_id,
                        error = %error,
                        "call placed but lead status was not updated"
                    );
                }
                info!(
                    event_name = "dialer.dispatcher.call_placed",
                    lead_id = %lead_id,
                    call_id = %call_id,
                    "call placed"
                );
                DispatchOutcome::Placed { lead_id, call_id }
            }
            Err(error) => {
                let message = error.to_string();
                let update = LeadUpdate::CallFailed { error: message.clone() };
                let recorded = self.leads.apply_update(&lead_id, &update, Utc::now()).await;
                if let Err(store_error) = recorded {
                    warn!(
                        event_name = "dialer.dispatcher.mark_failed_failed",
                        lead_id = %lead_id,
                        error = %store_error,
                        "could not record call failure"
                    );
                }
                warn!(
                    event_name = "dialer.dispatcher.call_failed",
                    lead_id = %lead_id,
                    error = %message,
                    "call could not be placed"
                );
                DispatchOutcome::Failed { lead_id, error: message }
            }
        }
    }

    async fn place_call(&self, lead: &Lead) -> Result<CallId, DispatchError> {
        let number = self.formatter.format(&lead.phone_number).ok_or_else(|| {
            DomainError::InvalidPhoneNumber {
                lead_id: lead.id.clone(),
                raw: lead.phone_number.clone(),
            }
        })?;
        let call = OutboundCall::for_lead(lead, number);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.voice.create_call(&call).await {
                Ok(created) => return Ok(created.call_id()),
                Err(error) if attempt <= self.policy.retry_attempts => {
                    warn!(
                        event_name = "dialer.dispatcher.attempt_failed",
                        lead_id = %lead.id,
                        attempt,
                        max_retries = self.policy.retry_attempts,
                        error = %error,
                        "call attempt failed; retrying"
                    );
                    if !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
                Err(error) => {
                    return Err(DispatchError::Provider { attempts: attempt, source: error });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use leadcall_core::config::{AppConfig, DispatchConfig};
    use leadcall_core::domain::call::CallId;
    use leadcall_core::domain::lead::{Lead, LeadId, LeadStatus};
    use leadcall_core::phone::PhoneFormatter;
    use leadcall_db::repositories::{InMemoryLeadRepository, LeadRepository};

    use super::{CallDispatcher, DispatchOutcome, DispatchPolicy};
    use crate::registry::ActiveCallRegistry;
    use crate::test_support::{lead, ScriptedVoiceProvider};

    struct Harness {
        leads: Arc<InMemoryLeadRepository>,
        voice: Arc<ScriptedVoiceProvider>,
        registry: ActiveCallRegistry,
        dispatcher: CallDispatcher,
    }

    fn harness(leads: Vec<Lead>, policy: DispatchPolicy) -> Harness {
        let repo = Arc::new(InMemoryLeadRepository::with_leads(leads));
        let voice = Arc::new(ScriptedVoiceProvider::default());
        let registry = ActiveCallRegistry::default();
        let dispatcher = CallDispatcher::new(
            repo.clone(),
            voice.clone(),
            registry.clone(),
            PhoneFormatter::default(),
            policy,
        );
        Harness { leads: repo, voice, registry, dispatcher }
    }

    fn policy() -> DispatchPolicy {
        DispatchPolicy {
            batch_size: 4,
            batch_delay: Duration::from_secs(2),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    async fn status_of(repo: &InMemoryLeadRepository, id: &str) -> Option<LeadStatus> {
        repo.find_by_id(&LeadId(id.to_string())).await.expect("find").map(|lead| lead.status)
    }

    #[tokio::test(start_paused = true)]
    async fn batches_never_exceed_bound_and_pause_between_groups() {
        let leads: Vec<_> = (0..10)
            .map(|index| lead(&format!("L-{index}"), LeadStatus::ToCall, 0, index))
            .collect();
        let harness = harness(leads.clone(), policy());
        let started = Instant::now();

        let summary = harness.dispatcher.dispatch_batch(leads).await;

        assert_eq!(summary.success, 10);
        assert_eq!(summary.failed, 0);
        let offsets: Vec<u64> = harness
            .voice
            .calls()
            .await
            .iter()
            .map(|(_, _, at)| at.duration_since(started).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 0, 0, 0, 2, 2, 2, 2, 4, 4]);
        assert_eq!(started.elapsed().as_secs(), 4);
        assert_eq!(harness.registry.len().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_with_fixed_delay() {
        let harness = harness(vec![lead("L-flaky", LeadStatus::ToCall, 0, 0)], policy());
        harness.voice.fail_first("L-flaky", 2).await;
        let started = Instant::now();

        let flaky = lead("L-flaky", LeadStatus::ToCall, 0, 0);
        let outcome = harness.dispatcher.dispatch_one(flaky).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Placed {
                lead_id: LeadId("L-flaky".to_string()),
                call_id: CallId("call-L-flaky".to_string()),
            }
        );
        assert_eq!(harness.voice.attempts_for("L-flaky").await, 3);
        assert_eq!(started.elapsed().as_secs(), 10);
        assert_eq!(status_of(&harness.leads, "L-flaky").await, Some(LeadStatus::InCall));
        assert!(harness.registry.contains(&CallId("call-L-flaky".to_string())).await);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_mark_lead_failed() {
        let harness = harness(vec![lead("L-dead", LeadStatus::ToCall, 0, 0)], policy());
        harness.voice.fail_first("L-dead", u32::MAX).await;

        let dead = lead("L-dead", LeadStatus::ToCall, 0, 0);
        let outcome = harness.dispatcher.dispatch_one(dead).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { ref error, .. } if error.contains("after 4 attempts")
        ));
        assert_eq!(harness.voice.attempts_for("L-dead").await, 4);
        assert_eq!(status_of(&harness.leads, "L-dead").await, Some(LeadStatus::CallFailed));
        assert!(harness.registry.is_empty().await);
    }

    #[tokio::test]
    async fn unformattable_phone_fails_without_provider_request() {
        let mut bad = lead("L-bad", LeadStatus::ToCall, 0, 0);
        bad.phone_number = "not provided".to_string();
        let harness = harness(vec![bad.clone()], policy());

        let outcome = harness.dispatcher.dispatch_one(bad).await;

        assert!(!outcome.is_placed());
        assert_eq!(harness.voice.attempts_for("L-bad").await, 0);
        let stored = harness
            .leads
            .find_by_id(&LeadId("L-bad".to_string()))
            .await
            .expect("find")
            .expect("lead exists");
        assert_eq!(stored.status, LeadStatus::CallFailed);
        assert!(stored.call_error.unwrap_or_default().contains("no dialable phone number"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_lead_does_not_block_siblings() {
        let leads = vec![
            lead("L-ok-1", LeadStatus::ToCall, 0, 0),
            lead("L-broken", LeadStatus::ToCall, 0, 1),
            lead("L-ok-2", LeadStatus::ToCall, 0, 2),
        ];
        let harness = harness(leads.clone(), policy());
        harness.voice.fail_first("L-broken", u32::MAX).await;

        let summary = harness.dispatcher.dispatch_batch(leads).await;

        assert_eq!((summary.success, summary.failed), (2, 1));
        let ids: Vec<_> =
            summary.results.iter().map(|outcome| outcome.lead_id().0.as_str()).collect();
        assert_eq!(ids, vec!["L-ok-1", "L-broken", "L-ok-2"]);
        let calls = harness.voice.calls().await;
        assert_eq!(calls[0].1, "+919876543210");
    }

    #[test]
    fn policy_follows_dispatch_config() {
        let config = DispatchConfig {
            max_concurrent_calls: 0,
            batch_delay_ms: 1500,
            call_retry_attempts: 1,
            call_retry_delay_ms: 250,
            ..AppConfig::default().dispatch
        };
        let policy = DispatchPolicy::from(&config);

        assert_eq!(policy.batch_size, 1);
        assert_eq!(policy.batch_delay, Duration::from_millis(1500));
        assert_eq!(policy.retry_attempts, 1);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
    }
}
