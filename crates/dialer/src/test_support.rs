use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use leadcall_core::domain::lead::{Lead, LeadId, LeadStatus, LeadUpdate};
use leadcall_db::repositories::{
    InMemoryLeadRepository, LeadQuery, LeadRepository, RepositoryError,
};
use leadcall_voice::{
    CallResultNotification, CreateCallResponse, NotifyError, OutboundCall, ResultNotifier,
    VoiceError, VoiceProvider,
};

pub(crate) fn lead(id: &str, status: LeadStatus, priority: i64, minute: i64) -> Lead {
    let created_at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + Duration::minutes(minute);
    let mut lead = Lead::new(LeadId(id.to_string()), "Meera Nair", "98765 43210", created_at);
    lead.status = status;
    lead.priority = priority;
    lead
}

#[derive(Default)]
struct ScriptedState {
    failures_remaining: HashMap<LeadId, u32>,
    calls: Vec<(LeadId, String, Instant)>,
}

/// Succeeds with `call-<lead id>` unless the lead was scripted to fail first.
#[derive(Default)]
pub(crate) struct ScriptedVoiceProvider {
    state: Mutex<ScriptedState>,
}

impl ScriptedVoiceProvider {
    pub(crate) async fn fail_first(&self, lead_id: &str, times: u32) {
        let mut state = self.state.lock().await;
        state.failures_remaining.insert(LeadId(lead_id.to_string()), times);
    }

    pub(crate) async fn calls(&self) -> Vec<(LeadId, String, Instant)> {
        self.state.lock().await.calls.clone()
    }

    pub(crate) async fn attempts_for(&self, lead_id: &str) -> usize {
        let state = self.state.lock().await;
        state.calls.iter().filter(|(id, _, _)| id.0 == lead_id).count()
    }
}

#[async_trait]
impl VoiceProvider for ScriptedVoiceProvider {
    async fn create_call(&self, call: &OutboundCall) -> Result<CreateCallResponse, VoiceError> {
        let mut state = self.state.lock().await;
        state.calls.push((call.lead_id.clone(), call.number.clone(), Instant::now()));
        if let Some(remaining) = state.failures_remaining.get_mut(&call.lead_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(VoiceError::Api { status: 503, body: "line busy".to_string() });
            }
        }
        Ok(CreateCallResponse {
            id: format!("call-{}", call.lead_id),
            status: Some("queued".to_string()),
        })
    }
}

/// In-memory store with switchable failures.
#[derive(Default)]
pub(crate) struct FaultyLeadRepository {
    pub(crate) inner: InMemoryLeadRepository,
    pub(crate) offline: bool,
    pub(crate) fail_mark_calling: bool,
}

impl FaultyLeadRepository {
    pub(crate) fn offline() -> Self {
        Self { offline: true, ..Self::default() }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.offline {
            return Err(RepositoryError::Decode("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadRepository for FaultyLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn list_dialable(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError> {
        self.check()?;
        self.inner.list_dialable(query).await
    }

    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.apply_update(id, update, at).await
    }

    async fn mark_calling(
        &self,
        ids: &[LeadId],
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.check()?;
        if self.fail_mark_calling {
            return Err(RepositoryError::Decode("bulk update rejected".to_string()));
        }
        self.inner.mark_calling(ids, at).await
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.save(lead).await
    }
}

pub(crate) struct RecordingNotifier {
    sender: mpsc::UnboundedSender<CallResultNotification>,
}

impl RecordingNotifier {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<CallResultNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ResultNotifier for RecordingNotifier {
    async fn notify(&self, notification: &CallResultNotification) -> Result<(), NotifyError> {
        let _ = self.sender.send(notification.clone());
        Ok(())
    }
}
