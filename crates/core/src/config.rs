use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub voice: VoiceConfig,
    pub dispatch: DispatchConfig,
    pub notifier: NotifierConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Voice provider account used to place outbound calls.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub api_key: SecretString,
    pub assistant_id: String,
    pub phone_number_id: String,
    pub base_url: String,
    /// Shared secret expected in the `x-vapi-secret` header of completion webhooks.
    pub webhook_secret: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_concurrent_calls: usize,
    pub batch_delay_ms: u64,
    pub call_retry_attempts: u32,
    pub call_retry_delay_ms: u64,
    pub default_lead_limit: u32,
    pub default_country_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifierConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub voice_api_key: Option<String>,
    pub voice_assistant_id: Option<String>,
    pub voice_phone_number_id: Option<String>,
    pub voice_base_url: Option<String>,
    pub max_concurrent_calls: Option<usize>,
    pub notifier_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadcall.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            voice: VoiceConfig {
                api_key: String::new().into(),
                assistant_id: String::new(),
                phone_number_id: String::new(),
                base_url: "https://api.vapi.ai".to_string(),
                webhook_secret: None,
                timeout_secs: 30,
            },
            dispatch: DispatchConfig {
                max_concurrent_calls: 4,
                batch_delay_ms: 2_000,
                call_retry_attempts: 3,
                call_retry_delay_ms: 5_000,
                default_lead_limit: 20,
                default_country_code: crate::phone::DEFAULT_COUNTRY_CODE.to_string(),
            },
            notifier: NotifierConfig { url: None, timeout_secs: 10 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadcall.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(api_key) = voice.api_key {
                self.voice.api_key = secret_value(api_key);
            }
            if let Some(assistant_id) = voice.assistant_id {
                self.voice.assistant_id = assistant_id;
            }
            if let Some(phone_number_id) = voice.phone_number_id {
                self.voice.phone_number_id = phone_number_id;
            }
            if let Some(base_url) = voice.base_url {
                self.voice.base_url = base_url;
            }
            if let Some(webhook_secret) = voice.webhook_secret {
                self.voice.webhook_secret = Some(secret_value(webhook_secret));
            }
            if let Some(timeout_secs) = voice.timeout_secs {
                self.voice.timeout_secs = timeout_secs;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(max_concurrent_calls) = dispatch.max_concurrent_calls {
                self.dispatch.max_concurrent_calls = max_concurrent_calls;
            }
            if let Some(batch_delay_ms) = dispatch.batch_delay_ms {
                self.dispatch.batch_delay_ms = batch_delay_ms;
            }
            if let Some(call_retry_attempts) = dispatch.call_retry_attempts {
                self.dispatch.call_retry_attempts = call_retry_attempts;
            }
            if let Some(call_retry_delay_ms) = dispatch.call_retry_delay_ms {
                self.dispatch.call_retry_delay_ms = call_retry_delay_ms;
            }
            if let Some(default_lead_limit) = dispatch.default_lead_limit {
                self.dispatch.default_lead_limit = default_lead_limit;
            }
            if let Some(default_country_code) = dispatch.default_country_code {
                self.dispatch.default_country_code = default_country_code;
            }
        }

        if let Some(notifier) = patch.notifier {
            if let Some(url) = notifier.url {
                self.notifier.url = Some(url);
            }
            if let Some(timeout_secs) = notifier.timeout_secs {
                self.notifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADCALL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADCALL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LEADCALL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADCALL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADCALL_VOICE_API_KEY") {
            self.voice.api_key = secret_value(value);
        }
        if let Some(value) = read_env("LEADCALL_VOICE_ASSISTANT_ID") {
            self.voice.assistant_id = value;
        }
        if let Some(value) = read_env("LEADCALL_VOICE_PHONE_NUMBER_ID") {
            self.voice.phone_number_id = value;
        }
        if let Some(value) = read_env("LEADCALL_VOICE_BASE_URL") {
            self.voice.base_url = value;
        }
        if let Some(value) = read_env("LEADCALL_VOICE_WEBHOOK_SECRET") {
            self.voice.webhook_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADCALL_VOICE_TIMEOUT_SECS") {
            self.voice.timeout_secs = parse_u64("LEADCALL_VOICE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADCALL_DISPATCH_MAX_CONCURRENT_CALLS") {
            self.dispatch.max_concurrent_calls =
                parse_usize("LEADCALL_DISPATCH_MAX_CONCURRENT_CALLS", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DISPATCH_BATCH_DELAY_MS") {
            self.dispatch.batch_delay_ms = parse_u64("LEADCALL_DISPATCH_BATCH_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DISPATCH_CALL_RETRY_ATTEMPTS") {
            self.dispatch.call_retry_attempts =
                parse_u32("LEADCALL_DISPATCH_CALL_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DISPATCH_CALL_RETRY_DELAY_MS") {
            self.dispatch.call_retry_delay_ms =
                parse_u64("LEADCALL_DISPATCH_CALL_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DISPATCH_DEFAULT_LEAD_LIMIT") {
            self.dispatch.default_lead_limit =
                parse_u32("LEADCALL_DISPATCH_DEFAULT_LEAD_LIMIT", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_DISPATCH_DEFAULT_COUNTRY_CODE") {
            self.dispatch.default_country_code = value;
        }

        if let Some(value) = read_env("LEADCALL_NOTIFIER_URL") {
            self.notifier.url = Some(value);
        }
        if let Some(value) = read_env("LEADCALL_NOTIFIER_TIMEOUT_SECS") {
            self.notifier.timeout_secs = parse_u64("LEADCALL_NOTIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADCALL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADCALL_SERVER_PORT") {
            self.server.port = parse_u16("LEADCALL_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADCALL_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADCALL_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("LEADCALL_LOGGING_LEVEL").or_else(|| read_env("LEADCALL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADCALL_LOGGING_FORMAT").or_else(|| read_env("LEADCALL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.voice_api_key {
            self.voice.api_key = secret_value(api_key);
        }
        if let Some(assistant_id) = overrides.voice_assistant_id {
            self.voice.assistant_id = assistant_id;
        }
        if let Some(phone_number_id) = overrides.voice_phone_number_id {
            self.voice.phone_number_id = phone_number_id;
        }
        if let Some(base_url) = overrides.voice_base_url {
            self.voice.base_url = base_url;
        }
        if let Some(max_concurrent_calls) = overrides.max_concurrent_calls {
            self.dispatch.max_concurrent_calls = max_concurrent_calls;
        }
        if let Some(url) = overrides.notifier_url {
            self.notifier.url = Some(url);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_voice(&self.voice)?;
        validate_dispatch(&self.dispatch)?;
        validate_notifier(&self.notifier)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadcall.toml"), PathBuf::from("config/leadcall.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("http://") && value.len() > "http://".len())
        || (value.starts_with("https://") && value.len() > "https://".len())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_voice(voice: &VoiceConfig) -> Result<(), ConfigError> {
    if voice.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "voice.api_key is required. Copy the private API key from the voice provider dashboard"
                .to_string(),
        ));
    }
    if voice.assistant_id.trim().is_empty() {
        return Err(ConfigError::Validation("voice.assistant_id is required".to_string()));
    }
    if voice.phone_number_id.trim().is_empty() {
        return Err(ConfigError::Validation("voice.phone_number_id is required".to_string()));
    }
    if !is_http_url(&voice.base_url) {
        return Err(ConfigError::Validation(
            "voice.base_url must start with http:// or https://".to_string(),
        ));
    }
    if voice.timeout_secs == 0 || voice.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "voice.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.max_concurrent_calls == 0 {
        return Err(ConfigError::Validation(
            "dispatch.max_concurrent_calls must be greater than zero".to_string(),
        ));
    }
    if dispatch.default_lead_limit == 0 {
        return Err(ConfigError::Validation(
            "dispatch.default_lead_limit must be greater than zero".to_string(),
        ));
    }

    let country_code = dispatch.default_country_code.trim().trim_start_matches('+');
    let valid_country_code = (1..=3).contains(&country_code.len())
        && country_code.chars().all(|ch| ch.is_ascii_digit());
    if !valid_country_code {
        return Err(ConfigError::Validation(
            "dispatch.default_country_code must be 1-3 digits, e.g. `91`".to_string(),
        ));
    }

    Ok(())
}

fn validate_notifier(notifier: &NotifierConfig) -> Result<(), ConfigError> {
    if let Some(url) = &notifier.url {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(
                "notifier.url must start with http:// or https://".to_string(),
            ));
        }
    }
    if notifier.timeout_secs == 0 || notifier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "notifier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    voice: Option<VoicePatch>,
    dispatch: Option<DispatchPatch>,
    notifier: Option<NotifierPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    api_key: Option<String>,
    assistant_id: Option<String>,
    phone_number_id: Option<String>,
    base_url: Option<String>,
    webhook_secret: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    max_concurrent_calls: Option<usize>,
    batch_delay_ms: Option<u64>,
    call_retry_attempts: Option<u32>,
    call_retry_delay_ms: Option<u64>,
    default_lead_limit: Option<u32>,
    default_country_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifierPatch {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
