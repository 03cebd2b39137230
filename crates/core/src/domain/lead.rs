use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::call::CallId;

/// Transcripts persisted on the lead row are cut to this many characters.
pub const MAX_STORED_TRANSCRIPT_CHARS: usize = 2000;

/// A lead is dropped from automatic selection once it reaches this many
/// unanswered attempts.
pub const FOLLOW_UP_CAP: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    ToCall,
    Calling,
    InCall,
    Qualified,
    NotInterested,
    CallbackRequested,
    FollowUp,
    Unresponsive,
    HumanInputNeeded,
    CallFailed,
    HumanFollowUp,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 11] = [
        Self::ToCall,
        Self::Calling,
        Self::InCall,
        Self::Qualified,
        Self::NotInterested,
        Self::CallbackRequested,
        Self::FollowUp,
        Self::Unresponsive,
        Self::HumanInputNeeded,
        Self::CallFailed,
        Self::HumanFollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToCall => "to_call",
            Self::Calling => "calling",
            Self::InCall => "in_call",
            Self::Qualified => "qualified",
            Self::NotInterested => "not_interested",
            Self::CallbackRequested => "callback_requested",
            Self::FollowUp => "follow_up",
            Self::Unresponsive => "unresponsive",
            Self::HumanInputNeeded => "human_input_needed",
            Self::CallFailed => "call_failed",
            Self::HumanFollowUp => "human_follow_up",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "to_call" => Some(Self::ToCall),
            "calling" => Some(Self::Calling),
            "in_call" => Some(Self::InCall),
            "qualified" => Some(Self::Qualified),
            "not_interested" => Some(Self::NotInterested),
            "callback_requested" => Some(Self::CallbackRequested),
            "follow_up" => Some(Self::FollowUp),
            "unresponsive" => Some(Self::Unresponsive),
            "human_input_needed" => Some(Self::HumanInputNeeded),
            "call_failed" => Some(Self::CallFailed),
            "human_follow_up" => Some(Self::HumanFollowUp),
            _ => None,
        }
    }

    /// Whether a lead in this status, with the given follow-up count, may be
    /// picked up by the next automated calling run.
    pub fn is_dialable(&self, follow_up_count: u32) -> bool {
        match self {
            Self::ToCall | Self::CallbackRequested | Self::CallFailed => true,
            Self::FollowUp => follow_up_count < FOLLOW_UP_CAP,
            _ => false,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing details for the property a lead enquired about.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub property_name: Option<String>,
    pub location: Option<String>,
    pub price_crores: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area_sqft: Option<u32>,
    pub property_type: Option<String>,
    pub builder: Option<String>,
    pub possession_status: Option<String>,
    pub amenities: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub user_id: Option<String>,
    pub contact_person: String,
    pub phone_number: String,
    pub email: Option<String>,
    #[serde(flatten)]
    pub property: PropertyDetails,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub priority: i64,
    pub follow_up_count: u32,
    pub last_call_id: Option<CallId>,
    pub last_contacted: Option<DateTime<Utc>>,
    pub last_call_result: Option<String>,
    pub qualification_score: Option<u8>,
    pub last_call_summary: Option<String>,
    pub last_call_transcript: Option<String>,
    pub call_scheduled_at: Option<DateTime<Utc>>,
    pub call_completed_at: Option<DateTime<Utc>>,
    pub callback_scheduled_at: Option<DateTime<Utc>>,
    pub call_error: Option<String>,
    pub call_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// A fresh lead waiting for its first call.
    pub fn new(
        id: LeadId,
        contact_person: impl Into<String>,
        phone_number: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: None,
            contact_person: contact_person.into(),
            phone_number: phone_number.into(),
            email: None,
            property: PropertyDetails::default(),
            notes: None,
            status: LeadStatus::ToCall,
            priority: 0,
            follow_up_count: 0,
            last_call_id: None,
            last_contacted: None,
            last_call_result: None,
            qualification_score: None,
            last_call_summary: None,
            last_call_transcript: None,
            call_scheduled_at: None,
            call_completed_at: None,
            callback_scheduled_at: None,
            call_error: None,
            call_failed_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_dialable(&self) -> bool {
        self.status.is_dialable(self.follow_up_count)
    }

    /// Prompt variables handed to the voice assistant. Every value is
    /// stringified; absent fields become empty strings so the assistant
    /// template never sees a missing key.
    pub fn template_variables(&self) -> BTreeMap<String, String> {
        let property = &self.property;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let number = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();

        let mut variables = BTreeMap::new();
        variables.insert("propertyName".to_string(), text(&property.property_name));
        variables.insert("location".to_string(), text(&property.location));
        variables.insert(
            "price".to_string(),
            property.price_crores.map(|price| format!("{price} crores")).unwrap_or_default(),
        );
        variables.insert("bedrooms".to_string(), number(property.bedrooms));
        variables.insert("bathrooms".to_string(), number(property.bathrooms));
        variables.insert(
            "area".to_string(),
            property.area_sqft.map(|area| format!("{area} sq ft")).unwrap_or_default(),
        );
        variables.insert("propertyType".to_string(), text(&property.property_type));
        variables.insert("builder".to_string(), text(&property.builder));
        variables.insert("possessionStatus".to_string(), text(&property.possession_status));
        variables.insert("amenities".to_string(), text(&property.amenities));
        variables.insert("contactPerson".to_string(), self.contact_person.clone());
        variables.insert(
            "leadNotes".to_string(),
            self.notes
                .as_deref()
                .filter(|notes| !notes.trim().is_empty())
                .unwrap_or("No additional notes")
                .to_string(),
        );
        variables
    }

    /// Applies a store write to this in-memory snapshot. The SQL repository
    /// writes the same columns, so both stores agree on what an update means.
    pub fn apply(&mut self, update: &LeadUpdate, at: DateTime<Utc>) {
        match update {
            LeadUpdate::Calling => {
                self.status = LeadStatus::Calling;
                self.call_scheduled_at = Some(at);
            }
            LeadUpdate::InCall { call_id } => {
                self.status = LeadStatus::InCall;
                self.last_call_id = Some(call_id.clone());
                self.last_contacted = Some(at);
            }
            LeadUpdate::CallFailed { error } => {
                self.status = LeadStatus::CallFailed;
                self.call_error = Some(error.clone());
                self.call_failed_at = Some(at);
            }
            LeadUpdate::CallCompleted(completed) => {
                self.status = completed.status;
                self.follow_up_count = completed.follow_up_count;
                self.last_call_id = Some(completed.call_id.clone());
                self.last_contacted = Some(at);
                self.last_call_result = Some(completed.result.clone());
                self.qualification_score = Some(completed.qualification_score);
                self.last_call_summary = Some(completed.summary.clone());
                self.last_call_transcript = Some(truncate_transcript(&completed.transcript));
                self.call_completed_at = Some(at);
                self.callback_scheduled_at = completed.callback_scheduled_at;
            }
            LeadUpdate::ResetFollowUps => {
                self.follow_up_count = 0;
                if self.status == LeadStatus::Unresponsive {
                    self.status = LeadStatus::FollowUp;
                }
            }
        }
        self.updated_at = at;
    }
}

/// Every write the calling pipeline makes to a lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeadUpdate {
    Calling,
    InCall { call_id: CallId },
    CallFailed { error: String },
    CallCompleted(CompletedCallUpdate),
    /// Administrative reset; the only path that lowers `follow_up_count`.
    ResetFollowUps,
}

impl LeadUpdate {
    pub fn resulting_status(&self) -> Option<LeadStatus> {
        match self {
            Self::Calling => Some(LeadStatus::Calling),
            Self::InCall { .. } => Some(LeadStatus::InCall),
            Self::CallFailed { .. } => Some(LeadStatus::CallFailed),
            Self::CallCompleted(completed) => Some(completed.status),
            Self::ResetFollowUps => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedCallUpdate {
    pub call_id: CallId,
    pub status: LeadStatus,
    pub follow_up_count: u32,
    pub result: String,
    pub qualification_score: u8,
    pub summary: String,
    pub transcript: String,
    pub callback_scheduled_at: Option<DateTime<Utc>>,
}

pub fn truncate_transcript(transcript: &str) -> String {
    transcript.chars().take(MAX_STORED_TRANSCRIPT_CHARS).collect()
}
