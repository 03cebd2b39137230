//! Downstream notification of classified call results.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use leadcall_core::config::NotifierConfig;
use leadcall_core::domain::call::CallId;
use leadcall_core::domain::lead::{LeadId, LeadStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier endpoint returned {status}")]
    Rejected { status: u16 },
    #[error("notifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResultNotification {
    pub lead_id: LeadId,
    pub call_id: CallId,
    pub status: LeadStatus,
    pub result: String,
    pub qualification_score: u8,
    pub summary: String,
    pub follow_up_count: u32,
    pub callback_scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

/// Receives one notification per completed call. Failures are reported to
/// the caller but never roll back the stored outcome.
#[async_trait]
pub trait ResultNotifier: Send + Sync {
    async fn notify(&self, notification: &CallResultNotification) -> Result<(), NotifyError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ResultNotifier for NoopNotifier {
    async fn notify(&self, _notification: &CallResultNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts each notification as JSON to a fixed URL.
#[derive(Clone, Debug)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl ResultNotifier for HttpNotifier {
    async fn notify(&self, notification: &CallResultNotification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        debug!(
            event_name = "voice.notifier.response",
            lead_id = %notification.lead_id,
            status = %status,
            "result notification delivered"
        );
        if !status.is_success() {
            return Err(NotifyError::Rejected { status: status.as_u16() });
        }
        Ok(())
    }
}

pub fn notifier_from_config(
    config: &NotifierConfig,
) -> Result<Arc<dyn ResultNotifier>, NotifyError> {
    match &config.url {
        Some(url) => Ok(Arc::new(HttpNotifier::new(
            url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(NoopNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use leadcall_core::config::NotifierConfig;
    use leadcall_core::domain::call::CallId;
    use leadcall_core::domain::lead::{LeadId, LeadStatus};

    use super::{notifier_from_config, CallResultNotification, NotifyError};

    fn notification() -> CallResultNotification {
        CallResultNotification {
            lead_id: LeadId("L-1".to_string()),
            call_id: CallId("call-1".to_string()),
            status: LeadStatus::Qualified,
            result: "Interested in property".to_string(),
            qualification_score: 85,
            summary: "Wants a site visit".to_string(),
            follow_up_count: 0,
            callback_scheduled_at: None,
            completed_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn http_notifier_posts_camel_case_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/call-result"))
            .and(body_partial_json(json!({
                "leadId": "L-1",
                "callId": "call-1",
                "status": "qualified",
                "qualificationScore": 85
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = notifier_from_config(&NotifierConfig {
            url: Some(format!("{}/hooks/call-result", server.uri())),
            timeout_secs: 5,
        })
        .expect("build notifier");

        notifier.notify(&notification()).await.expect("delivered");
    }

    #[tokio::test]
    async fn rejected_notification_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let notifier =
            notifier_from_config(&NotifierConfig { url: Some(server.uri()), timeout_secs: 5 })
                .expect("build notifier");

        let error = notifier.notify(&notification()).await.expect_err("rejected");
        assert!(matches!(error, NotifyError::Rejected { status: 502 }));
    }

    #[tokio::test]
    async fn missing_url_selects_noop_notifier() {
        let notifier = notifier_from_config(&NotifierConfig { url: None, timeout_secs: 5 })
            .expect("build notifier");
        notifier.notify(&notification()).await.expect("noop succeeds");
    }
}
