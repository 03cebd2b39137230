use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, warn};

use leadcall_core::config::VoiceConfig;

use crate::types::{CreateCallRequest, CreateCallResponse, OutboundCall};

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("voice provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("voice provider response could not be decoded: {0}")]
    Decode(String),
    #[error("voice client configuration is invalid: {0}")]
    Config(String),
}

/// Places outbound calls. One request per call, no retry at this layer.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn create_call(&self, call: &OutboundCall) -> Result<CreateCallResponse, VoiceError>;
}

/// HTTP client for the Vapi call API.
#[derive(Clone, Debug)]
pub struct VapiClient {
    client: reqwest::Client,
    base_url: String,
    assistant_id: String,
    phone_number_id: String,
}

impl VapiClient {
    pub fn new(config: &VoiceConfig) -> Result<Self, VoiceError> {
        let token = format!("Bearer {}", config.api_key.expose_secret());
        let mut bearer = HeaderValue::from_str(&token)
            .map_err(|error| VoiceError::Config(format!("invalid API key header value: {error}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            assistant_id: config.assistant_id.clone(),
            phone_number_id: config.phone_number_id.clone(),
        })
    }

    fn call_url(&self) -> String {
        format!("{}/call", self.base_url)
    }
}

#[async_trait]
impl VoiceProvider for VapiClient {
    async fn create_call(&self, call: &OutboundCall) -> Result<CreateCallResponse, VoiceError> {
        let request = CreateCallRequest::new(&self.assistant_id, &self.phone_number_id, call);
        let response = self.client.post(self.call_url()).json(&request).send().await?;

        let status = response.status();
        debug!(
            event_name = "voice.client.response",
            lead_id = %call.lead_id,
            status = %status,
            "create-call response received"
        );

        let body = response.text().await?;
        if !status.is_success() {
            warn!(
                event_name = "voice.client.rejected",
                lead_id = %call.lead_id,
                status = status.as_u16(),
                "voice provider rejected call"
            );
            return Err(VoiceError::Api { status: status.as_u16(), body });
        }

        let created: CreateCallResponse = serde_json::from_str(&body)
            .map_err(|error| VoiceError::Decode(format!("{error}: {body}")))?;
        if created.id.trim().is_empty() {
            return Err(VoiceError::Decode("response carried an empty call id".to_string()));
        }
        Ok(created)
    }
}
