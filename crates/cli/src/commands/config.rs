use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadcall_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in effective_values(&config) {
        let source = field_source(
            key,
            &env_key(key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let webhook_secret = match &config.voice.webhook_secret {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("voice.api_key", redact_secret(config.voice.api_key.expose_secret())),
        ("voice.assistant_id", config.voice.assistant_id.clone()),
        ("voice.phone_number_id", config.voice.phone_number_id.clone()),
        ("voice.base_url", config.voice.base_url.clone()),
        ("voice.webhook_secret", webhook_secret),
        ("voice.timeout_secs", config.voice.timeout_secs.to_string()),
        ("dispatch.max_concurrent_calls", config.dispatch.max_concurrent_calls.to_string()),
        ("dispatch.batch_delay_ms", config.dispatch.batch_delay_ms.to_string()),
        ("dispatch.call_retry_attempts", config.dispatch.call_retry_attempts.to_string()),
        ("dispatch.call_retry_delay_ms", config.dispatch.call_retry_delay_ms.to_string()),
        ("dispatch.default_lead_limit", config.dispatch.default_lead_limit.to_string()),
        ("dispatch.default_country_code", config.dispatch.default_country_code.clone()),
        ("notifier.url", config.notifier.url.clone().unwrap_or_else(|| "<unset>".to_string())),
        ("notifier.timeout_secs", config.notifier.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `voice.api_key` is read from `LEADCALL_VOICE_API_KEY`.
fn env_key(key_path: &str) -> String {
    format!("LEADCALL_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    ["leadcall.toml", "config/leadcall.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, env_key, redact_secret};

    #[test]
    fn env_keys_follow_section_and_field() {
        assert_eq!(env_key("voice.api_key"), "LEADCALL_VOICE_API_KEY");
        assert_eq!(
            env_key("dispatch.max_concurrent_calls"),
            "LEADCALL_DISPATCH_MAX_CONCURRENT_CALLS"
        );
    }

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("vapi-abc123"), "vapi-***");
        assert_eq!(redact_secret("abc123"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_config_file() {
        let doc: toml::Value = "[voice]\nassistant_id = \"asst-1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "voice.assistant_id"));
        assert!(!contains_path(&doc, "voice.base_url"));
    }
}
