//! Outbound voice-call provider integration: call creation, completion
//! webhook payloads and the downstream result notifier.

pub mod client;
pub mod notifier;
pub mod types;

pub use client::{VapiClient, VoiceError, VoiceProvider};
pub use notifier::{
    notifier_from_config, CallResultNotification, HttpNotifier, NoopNotifier, NotifyError,
    ResultNotifier,
};
pub use types::{CompletionWebhook, CreateCallResponse, OutboundCall, END_OF_CALL_REPORT};
