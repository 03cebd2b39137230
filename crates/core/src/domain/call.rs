use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::{Lead, LeadId, LeadStatus};

/// End-reason recorded when the provider did not send one.
pub const UNKNOWN_ENDED_REASON: &str = "unknown";

/// Provider-assigned identifier of one outbound call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the provider told us about a finished call, with missing fields
/// already defaulted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallFacts {
    pub call_id: CallId,
    pub provider_status: Option<String>,
    pub ended_reason: String,
    pub transcript: String,
    pub summary: String,
    pub duration_secs: Option<f64>,
    pub cost: Option<Decimal>,
    pub recording_url: Option<String>,
    pub analysis: Option<serde_json::Value>,
}

impl CallFacts {
    pub fn new(call_id: CallId) -> Self {
        Self {
            call_id,
            provider_status: None,
            ended_reason: UNKNOWN_ENDED_REASON.to_string(),
            transcript: String::new(),
            summary: String::new(),
            duration_secs: None,
            cost: None,
            recording_url: None,
            analysis: None,
        }
    }

    pub fn provider_reported_failure(&self) -> bool {
        self.provider_status.as_deref().is_some_and(|status| status.eq_ignore_ascii_case("failed"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveCallStatus {
    Active,
}

/// In-flight bookkeeping for a dispatched call, keyed by provider call id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveCall {
    pub call_id: CallId,
    pub lead_id: LeadId,
    pub lead_snapshot: Lead,
    pub started_at: DateTime<Utc>,
    pub status: ActiveCallStatus,
}

impl ActiveCall {
    pub fn new(call_id: CallId, lead: Lead, started_at: DateTime<Utc>) -> Self {
        Self {
            call_id,
            lead_id: lead.id.clone(),
            lead_snapshot: lead,
            started_at,
            status: ActiveCallStatus::Active,
        }
    }
}

/// Immutable audit row written once per completed call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub lead_id: LeadId,
    pub provider_status: Option<String>,
    pub ended_reason: String,
    pub transcript: String,
    pub summary: String,
    pub duration_secs: Option<f64>,
    pub cost: Option<Decimal>,
    pub recording_url: Option<String>,
    pub lead_status: LeadStatus,
    pub qualification_score: u8,
    pub recorded_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn from_facts(
        facts: &CallFacts,
        lead_id: LeadId,
        lead_status: LeadStatus,
        qualification_score: u8,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id: facts.call_id.clone(),
            lead_id,
            provider_status: facts.provider_status.clone(),
            ended_reason: facts.ended_reason.clone(),
            transcript: facts.transcript.clone(),
            summary: facts.summary.clone(),
            duration_secs: facts.duration_secs,
            cost: facts.cost,
            recording_url: facts.recording_url.clone(),
            lead_status,
            qualification_score,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallFacts, CallId, UNKNOWN_ENDED_REASON};

    #[test]
    fn facts_default_to_unknown_reason_and_empty_text() {
        let facts = CallFacts::new(CallId("call-1".to_string()));
        assert_eq!(facts.ended_reason, UNKNOWN_ENDED_REASON);
        assert!(facts.transcript.is_empty());
        assert!(facts.summary.is_empty());
        assert!(!facts.provider_reported_failure());
    }

    #[test]
    fn failed_provider_status_is_case_insensitive() {
        let mut facts = CallFacts::new(CallId("call-2".to_string()));
        facts.provider_status = Some("FAILED".to_string());
        assert!(facts.provider_reported_failure());
    }
}
