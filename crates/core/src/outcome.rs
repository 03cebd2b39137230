//! Post-call outcome classification.
//!
//! A finished call is mapped to the lead's next lifecycle state by walking an
//! ordered decision table. The first rule whose predicate matches wins; rules
//! are never re-evaluated. Several predicates overlap on purpose (a short
//! "not interested" transcript also looks like "no real conversation"), so
//! the table order is part of the behavior and is asserted by tests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::call::CallFacts;
use crate::domain::lead::{CompletedCallUpdate, Lead, LeadStatus, FOLLOW_UP_CAP};

/// Transcripts shorter than this (in characters) mean nobody really talked.
pub const MIN_CONVERSATION_CHARS: usize = 50;

pub const CALLBACK_DELAY_HOURS: i64 = 24;

const INTEREST_MARKERS: &[&str] = &["interested", "yes, i am", "qualified"];
const DECLINE_MARKERS: &[&str] = &["not interested", "no thank", "don't want", "do not want"];
const NEGATIVE_LANGUAGE: &[&str] =
    &["don't call", "do not call", "stop calling", "remove", "not looking", "no need"];
const CALLBACK_MARKERS: &[&str] = &["callback", "call back", "call later", "busy now"];
const HUMAN_MARKERS: &[&str] = &["transfer", "speak to human", "human needed"];

const NO_CONVERSATION_REASONS: &[&str] = &["no-answer", "voicemail", "busy"];
const TECHNICAL_FAILURE_REASONS: &[&str] =
    &["pipeline-error-openai-voice-failed", "assistant-ended-call"];
const CUSTOMER_HANGUP_REASON: &str = "customer-ended-call";
const ASSISTANT_REQUEST_FAILED_REASON: &str = "assistant-request-failed";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeRule {
    Qualified,
    NotInterested,
    CallbackRequested,
    NoConversation,
    NeedsHuman,
    TechnicalFailure,
    ManualReview,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub rule: OutcomeRule,
    pub status: LeadStatus,
    pub result: String,
    pub qualification_score: u8,
    pub follow_up_count: u32,
    pub callback_scheduled_at: Option<DateTime<Utc>>,
}

impl Classification {
    /// The lead write that records this outcome.
    pub fn to_update(&self, facts: &CallFacts) -> CompletedCallUpdate {
        CompletedCallUpdate {
            call_id: facts.call_id.clone(),
            status: self.status,
            follow_up_count: self.follow_up_count,
            result: self.result.clone(),
            qualification_score: self.qualification_score,
            summary: facts.summary.clone(),
            transcript: facts.transcript.clone(),
            callback_scheduled_at: self.callback_scheduled_at,
        }
    }
}

/// Normalized view of the call text that every predicate reads.
#[derive(Clone, Debug)]
pub struct CallSignals {
    transcript: String,
    summary: String,
    ended_reason: String,
    transcript_chars: usize,
    provider_failed: bool,
}

impl CallSignals {
    pub fn from_facts(facts: &CallFacts) -> Self {
        Self {
            transcript: facts.transcript.to_lowercase(),
            summary: facts.summary.to_lowercase(),
            ended_reason: facts.ended_reason.trim().to_ascii_lowercase(),
            transcript_chars: facts.transcript.chars().count(),
            provider_failed: facts.provider_reported_failure(),
        }
    }

    fn mentions_any(&self, markers: &[&str]) -> bool {
        markers
            .iter()
            .any(|marker| self.transcript.contains(marker) || self.summary.contains(marker))
    }

    fn ended_with_any(&self, reasons: &[&str]) -> bool {
        reasons.contains(&self.ended_reason.as_str())
    }
}

pub struct ClassificationRule {
    pub rule: OutcomeRule,
    matches: fn(&CallSignals) -> bool,
    decide: fn(&Lead, DateTime<Utc>) -> Classification,
}

impl ClassificationRule {
    pub fn matches(&self, signals: &CallSignals) -> bool {
        (self.matches)(signals)
    }
}

/// Evaluated top to bottom; the first match wins.
pub static DECISION_TABLE: [ClassificationRule; 6] = [
    ClassificationRule {
        rule: OutcomeRule::Qualified,
        matches: |signals| signals.mentions_any(INTEREST_MARKERS),
        decide: |lead, _| {
            settled(
                OutcomeRule::Qualified,
                LeadStatus::Qualified,
                "Lead showed interest and was qualified",
                85,
                lead,
            )
        },
    },
    ClassificationRule {
        rule: OutcomeRule::NotInterested,
        matches: |signals| {
            signals.mentions_any(DECLINE_MARKERS)
                || (signals.ended_with_any(&[CUSTOMER_HANGUP_REASON])
                    && signals.mentions_any(NEGATIVE_LANGUAGE))
        },
        decide: |lead, _| {
            settled(
                OutcomeRule::NotInterested,
                LeadStatus::NotInterested,
                "Lead explicitly declined interest",
                10,
                lead,
            )
        },
    },
    ClassificationRule {
        rule: OutcomeRule::CallbackRequested,
        matches: |signals| signals.mentions_any(CALLBACK_MARKERS),
        decide: |lead, now| Classification {
            callback_scheduled_at: Some(now + Duration::hours(CALLBACK_DELAY_HOURS)),
            ..settled(
                OutcomeRule::CallbackRequested,
                LeadStatus::CallbackRequested,
                "Lead requested to be called back later",
                50,
                lead,
            )
        },
    },
    ClassificationRule {
        rule: OutcomeRule::NoConversation,
        matches: |signals| {
            signals.ended_with_any(NO_CONVERSATION_REASONS)
                || signals.transcript_chars < MIN_CONVERSATION_CHARS
        },
        decide: |lead, _| {
            let attempt = lead.follow_up_count.saturating_add(1);
            if attempt >= FOLLOW_UP_CAP {
                Classification {
                    rule: OutcomeRule::NoConversation,
                    status: LeadStatus::Unresponsive,
                    result: format!("No response after {FOLLOW_UP_CAP} follow-up attempts"),
                    qualification_score: 0,
                    follow_up_count: attempt,
                    callback_scheduled_at: None,
                }
            } else {
                Classification {
                    rule: OutcomeRule::NoConversation,
                    status: LeadStatus::FollowUp,
                    result: format!("No answer - attempt {attempt}"),
                    qualification_score: 30,
                    follow_up_count: attempt,
                    callback_scheduled_at: None,
                }
            }
        },
    },
    ClassificationRule {
        rule: OutcomeRule::NeedsHuman,
        matches: |signals| {
            signals.mentions_any(HUMAN_MARKERS)
                || signals.ended_with_any(&[ASSISTANT_REQUEST_FAILED_REASON])
        },
        decide: |lead, _| {
            settled(
                OutcomeRule::NeedsHuman,
                LeadStatus::HumanInputNeeded,
                "AI assistant requested human intervention",
                40,
                lead,
            )
        },
    },
    ClassificationRule {
        rule: OutcomeRule::TechnicalFailure,
        matches: |signals| {
            signals.ended_with_any(TECHNICAL_FAILURE_REASONS) || signals.provider_failed
        },
        decide: |lead, _| {
            settled(
                OutcomeRule::TechnicalFailure,
                LeadStatus::CallFailed,
                "Technical failure during call",
                0,
                lead,
            )
        },
    },
];

/// Applied when nothing in the table matched.
pub static MANUAL_REVIEW_RULE: ClassificationRule = ClassificationRule {
    rule: OutcomeRule::ManualReview,
    matches: |_| true,
    decide: |lead, _| {
        settled(
            OutcomeRule::ManualReview,
            LeadStatus::HumanFollowUp,
            "Call completed but requires manual review",
            30,
            lead,
        )
    },
};

fn settled(
    rule: OutcomeRule,
    status: LeadStatus,
    result: &str,
    qualification_score: u8,
    lead: &Lead,
) -> Classification {
    Classification {
        rule,
        status,
        result: result.to_string(),
        qualification_score,
        follow_up_count: lead.follow_up_count,
        callback_scheduled_at: None,
    }
}

/// Pure: the same facts, lead and clock always give the same result.
pub fn classify(facts: &CallFacts, lead: &Lead, now: DateTime<Utc>) -> Classification {
    let signals = CallSignals::from_facts(facts);
    let rule = DECISION_TABLE
        .iter()
        .find(|candidate| candidate.matches(&signals))
        .unwrap_or(&MANUAL_REVIEW_RULE);
    (rule.decide)(lead, now)
}
