use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use leadcall_core::domain::call::{CallFacts, CallId, UNKNOWN_ENDED_REASON};
use leadcall_core::domain::lead::{Lead, LeadId};

/// Provider message type carrying the final call report.
pub const END_OF_CALL_REPORT: &str = "end-of-call-report";

/// One call to place, already resolved to a dialable number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundCall {
    pub lead_id: LeadId,
    pub number: String,
    pub customer_name: String,
    pub variables: BTreeMap<String, String>,
}

impl OutboundCall {
    pub fn for_lead(lead: &Lead, number: impl Into<String>) -> Self {
        Self {
            lead_id: lead.id.clone(),
            number: number.into(),
            customer_name: lead.contact_person.clone(),
            variables: lead.template_variables(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCallRequest<'a> {
    pub assistant_id: &'a str,
    pub phone_number_id: &'a str,
    pub customer: Customer<'a>,
    pub assistant_overrides: AssistantOverrides<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Customer<'a> {
    pub number: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssistantOverrides<'a> {
    pub variable_values: &'a BTreeMap<String, String>,
}

impl<'a> CreateCallRequest<'a> {
    pub(crate) fn new(
        assistant_id: &'a str,
        phone_number_id: &'a str,
        call: &'a OutboundCall,
    ) -> Self {
        Self {
            assistant_id,
            phone_number_id,
            customer: Customer { number: &call.number, name: &call.customer_name },
            assistant_overrides: AssistantOverrides { variable_values: &call.variables },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CreateCallResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateCallResponse {
    pub fn call_id(&self) -> CallId {
        CallId(self.id.clone())
    }
}

/// Inbound completion webhook. Providers send either an envelope
/// (`{"message": {"type": ..., "call": {...}}}`) or a flat object with a
/// top-level `callId`; every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionWebhook {
    #[serde(default)]
    pub message: Option<WebhookMessage>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(flatten)]
    pub fields: CallPayload,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub call: Option<CallPayload>,
    #[serde(flatten)]
    pub fields: CallPayload,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "ended_reason")]
    pub ended_reason: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default, alias = "recording_url")]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
}

impl CompletionWebhook {
    pub fn message_type(&self) -> Option<&str> {
        self.message.as_ref().and_then(|message| message.kind.as_deref())
    }

    /// Untyped payloads are treated as final reports.
    pub fn is_end_of_call_report(&self) -> bool {
        self.message_type().map_or(true, |kind| kind == END_OF_CALL_REPORT)
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.message
            .as_ref()
            .and_then(|message| message.call.as_ref())
            .and_then(|call| call.id.clone())
            .or_else(|| self.call_id.clone())
            .filter(|id| !id.trim().is_empty())
            .map(CallId)
    }

    /// Call object first, then the message envelope, then top-level fields.
    pub fn facts(&self, call_id: CallId) -> CallFacts {
        let call = self.message.as_ref().and_then(|message| message.call.as_ref());
        let message = self.message.as_ref().map(|message| &message.fields);
        let layers: Vec<&CallPayload> =
            call.into_iter().chain(message).chain(std::iter::once(&self.fields)).collect();

        let text = |pick: fn(&CallPayload) -> Option<&String>| {
            layers.iter().find_map(|layer| pick(layer)).cloned()
        };
        let number =
            |pick: fn(&CallPayload) -> Option<f64>| layers.iter().find_map(|layer| pick(layer));

        let mut facts = CallFacts::new(call_id);
        facts.provider_status = text(|layer| layer.status.as_ref());
        facts.ended_reason = text(|layer| layer.ended_reason.as_ref())
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ENDED_REASON.to_string());
        facts.transcript = text(|layer| layer.transcript.as_ref()).unwrap_or_default();
        facts.summary = text(|layer| layer.summary.as_ref()).unwrap_or_default();
        facts.duration_secs = number(|layer| layer.duration);
        facts.cost = number(|layer| layer.cost).and_then(Decimal::from_f64);
        facts.recording_url = text(|layer| layer.recording_url.as_ref());
        facts.analysis = layers.iter().find_map(|layer| layer.analysis.clone());
        facts
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use serde_json::json;

    use leadcall_core::domain::call::CallId;
    use leadcall_core::domain::lead::{Lead, LeadId};

    use super::{CompletionWebhook, CreateCallRequest, OutboundCall};

    fn parse(value: serde_json::Value) -> CompletionWebhook {
        serde_json::from_value(value).expect("valid webhook payload")
    }

    #[test]
    fn create_call_request_uses_provider_field_names() {
        let mut lead =
            Lead::new(LeadId("L-1".to_string()), "Rajesh Sharma", "9876543210", Utc::now());
        lead.property.price_crores = Some(4.2);
        let call = OutboundCall::for_lead(&lead, "+919876543210");

        let body = serde_json::to_value(CreateCallRequest::new("asst-1", "pn-1", &call))
            .expect("serialize request");

        assert_eq!(body["assistantId"], "asst-1");
        assert_eq!(body["phoneNumberId"], "pn-1");
        assert_eq!(body["customer"], json!({"number": "+919876543210", "name": "Rajesh Sharma"}));
        assert_eq!(body["assistantOverrides"]["variableValues"]["price"], "4.2 crores");
        assert_eq!(
            body["assistantOverrides"]["variableValues"]["leadNotes"],
            "No additional notes"
        );
    }

    #[test]
    fn call_id_prefers_nested_call_over_top_level() {
        let webhook = parse(json!({
            "message": {"type": "end-of-call-report", "call": {"id": "call-nested"}},
            "callId": "call-flat"
        }));
        assert_eq!(webhook.call_id(), Some(CallId("call-nested".to_string())));

        let flat = parse(json!({"callId": "call-flat", "transcript": "hi"}));
        assert_eq!(flat.call_id(), Some(CallId("call-flat".to_string())));

        let missing = parse(json!({"message": {"type": "end-of-call-report"}}));
        assert_eq!(missing.call_id(), None);
    }

    #[test]
    fn facts_read_call_object_first_then_message_level() {
        let webhook = parse(json!({
            "message": {
                "type": "end-of-call-report",
                "endedReason": "customer-ended-call",
                "transcript": "message level transcript",
                "summary": "message level summary",
                "call": {
                    "id": "call-1",
                    "status": "ended",
                    "transcript": "call level transcript",
                    "duration": 61.5,
                    "cost": 0.125,
                    "recordingUrl": "https://recordings.example/1.wav",
                    "analysis": {"successEvaluation": "true"}
                }
            }
        }));

        let facts = webhook.facts(CallId("call-1".to_string()));

        assert_eq!(facts.transcript, "call level transcript");
        assert_eq!(facts.summary, "message level summary");
        assert_eq!(facts.ended_reason, "customer-ended-call");
        assert_eq!(facts.provider_status.as_deref(), Some("ended"));
        assert_eq!(facts.duration_secs, Some(61.5));
        assert_eq!(facts.cost.map(|cost| cost.to_string()), Some("0.125".to_string()));
        assert_eq!(facts.recording_url.as_deref(), Some("https://recordings.example/1.wav"));
        assert!(facts.analysis.is_some());
    }

    #[test]
    fn snake_case_end_reason_and_missing_fields_default() {
        let webhook = parse(json!({"callId": "call-2", "ended_reason": "voicemail"}));
        let facts = webhook.facts(CallId("call-2".to_string()));
        assert_eq!(facts.ended_reason, "voicemail");
        assert_eq!(facts.transcript, "");
        assert_eq!(facts.summary, "");

        let bare = parse(json!({"callId": "call-3"}));
        assert_eq!(bare.facts(CallId("call-3".to_string())).ended_reason, "unknown");
    }

    #[test]
    fn only_final_reports_are_processed() {
        let report = parse(json!({"message": {"type": "end-of-call-report"}}));
        let update = parse(json!({"message": {"type": "status-update", "status": "ringing"}}));
        let untyped = parse(json!({"callId": "call-4"}));

        assert!(report.is_end_of_call_report());
        assert!(!update.is_end_of_call_report());
        assert!(untyped.is_end_of_call_report());
    }

    #[test]
    fn outbound_call_carries_every_template_variable() {
        let lead = Lead::new(LeadId("L-2".to_string()), "Sneha", "98201 44556", Utc::now());
        let call = OutboundCall::for_lead(&lead, "+919820144556");

        let keys: Vec<_> = call.variables.keys().map(String::as_str).collect();
        let expected: BTreeMap<&str, ()> = [
            "amenities",
            "area",
            "bathrooms",
            "bedrooms",
            "builder",
            "contactPerson",
            "leadNotes",
            "location",
            "possessionStatus",
            "price",
            "propertyName",
            "propertyType",
        ]
        .into_iter()
        .map(|key| (key, ()))
        .collect();
        assert_eq!(keys, expected.keys().copied().collect::<Vec<_>>());
    }
}
