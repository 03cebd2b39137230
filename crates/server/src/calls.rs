//! Calling endpoints: start a run, dispatch one lead, receive provider
//! completion webhooks and read pipeline stats.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use leadcall_core::domain::lead::LeadId;
use leadcall_core::errors::{ApplicationError, DomainError, InterfaceError};
use leadcall_dialer::{CallStats, CompletionError, DispatchOutcome, LeadManager, StartError};
use leadcall_voice::CompletionWebhook;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const WEBHOOK_SECRET_HEADER: &str = "x-vapi-secret";

#[derive(Clone)]
pub struct CallsState {
    manager: Arc<LeadManager>,
    webhook_secret: Option<SecretString>,
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SingleCallResponse {
    success: bool,
    #[serde(flatten)]
    outcome: DispatchOutcome,
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored: Option<String>,
}

pub fn router(manager: Arc<LeadManager>, webhook_secret: Option<SecretString>) -> Router {
    Router::new()
        .route("/api/v1/calls/start", post(start_calls))
        .route("/api/v1/calls/webhook", post(completion_webhook))
        .route("/api/v1/calls/stats", get(call_stats))
        .route("/api/v1/leads/{lead_id}/call", post(call_lead))
        .route("/api/v1/leads/{lead_id}/reset-follow-ups", post(reset_follow_ups))
        .with_state(CallsState { manager, webhook_secret })
}

/// Compares every byte regardless of where the first mismatch is.
fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff == 0
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ApiError { success: false, error: error.into(), correlation_id: None }))
        .into_response()
}

fn interface_response(error: ApplicationError) -> Response {
    let interface = error.into_interface(Uuid::new_v4().to_string());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!(
        event_name = "api.calls.request_failed",
        correlation_id = interface.correlation_id(),
        error = %interface,
        "request failed"
    );
    let body = ApiError {
        success: false,
        error: interface.user_message().to_string(),
        correlation_id: Some(interface.correlation_id().to_string()),
    };
    (status, Json(body)).into_response()
}

fn start_error_response(error: StartError) -> Response {
    match error {
        StartError::AlreadyProcessing => {
            error_response(StatusCode::CONFLICT, "Already processing calls")
        }
        StartError::LeadNotFound(lead_id) => {
            interface_response(ApplicationError::from(DomainError::LeadNotFound(lead_id)))
        }
        other @ (StartError::Selection(_)
        | StartError::MarkCalling(_)
        | StartError::Store(_)) => {
            interface_response(ApplicationError::Persistence(other.to_string()))
        }
    }
}

fn completion_error_response(error: CompletionError) -> Response {
    match error {
        CompletionError::MissingCallId => {
            error_response(StatusCode::BAD_REQUEST, "No call ID in webhook payload")
        }
        CompletionError::UnknownCall(call_id) => {
            error_response(StatusCode::NOT_FOUND, format!("call {call_id} is not active"))
        }
        CompletionError::LeadMissing { lead_id, .. } => {
            interface_response(ApplicationError::from(DomainError::LeadNotFound(lead_id)))
        }
        other @ CompletionError::Store { .. } => {
            interface_response(ApplicationError::Persistence(other.to_string()))
        }
    }
}

async fn start_calls(State(state): State<CallsState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        match serde_json::from_slice::<StartRequest>(&body) {
            Ok(request) => request,
            Err(error) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {error}"))
            }
        }
    };

    match state.manager.start_automated_calling(request.limit, request.user_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => start_error_response(error),
    }
}

async fn call_lead(State(state): State<CallsState>, Path(lead_id): Path<String>) -> Response {
    match state.manager.dispatch_lead(&LeadId(lead_id)).await {
        Ok(outcome) => {
            let success = outcome.is_placed();
            (StatusCode::OK, Json(SingleCallResponse { success, outcome })).into_response()
        }
        Err(error) => start_error_response(error),
    }
}

async fn reset_follow_ups(
    State(state): State<CallsState>,
    Path(lead_id): Path<String>,
) -> Response {
    let lead_id = LeadId(lead_id);
    match state.manager.reset_follow_ups(&lead_id).await {
        Ok(()) => {
            info!(event_name = "api.calls.follow_ups_reset", lead_id = %lead_id, "counter reset");
            (StatusCode::OK, Json(serde_json::json!({"success": true, "lead_id": lead_id})))
                .into_response()
        }
        Err(error) => start_error_response(error),
    }
}

async fn call_stats(State(state): State<CallsState>) -> Json<CallStats> {
    Json(state.manager.stats().await)
}

async fn completion_webhook(
    State(state): State<CallsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers.get(WEBHOOK_SECRET_HEADER).map(|value| value.as_bytes());
        if !provided.is_some_and(|value| secrets_match(value, secret.expose_secret().as_bytes())) {
            return error_response(StatusCode::UNAUTHORIZED, "invalid webhook secret");
        }
    }

    let webhook = match serde_json::from_slice::<CompletionWebhook>(&body) {
        Ok(webhook) => webhook,
        Err(error) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid payload: {error}"))
        }
    };

    if !webhook.is_end_of_call_report() {
        let kind = webhook.message_type().unwrap_or_default().to_string();
        info!(event_name = "api.calls.webhook_ignored", message_type = %kind, "webhook ignored");
        let ack = WebhookAck { success: true, status: None, ignored: Some(kind) };
        return (StatusCode::OK, Json(ack)).into_response();
    }

    match state.manager.handle_completion(&webhook).await {
        Ok(report) => {
            let ack = WebhookAck {
                success: true,
                status: Some(report.classification.status.as_str().to_string()),
                ignored: None,
            };
            (StatusCode::OK, Json(ack)).into_response()
        }
        Err(error) => completion_error_response(error),
    }
}
