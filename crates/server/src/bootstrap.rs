use std::sync::Arc;

use leadcall_core::config::{AppConfig, ConfigError, LoadOptions};
use leadcall_db::connection::connect_with_config;
use leadcall_db::repositories::{SqlCallRecordRepository, SqlLeadRepository};
use leadcall_db::{migrations, DbPool};
use leadcall_dialer::LeadManager;
use leadcall_voice::{notifier_from_config, NotifyError, VapiClient, VoiceError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub manager: Arc<LeadManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("voice client setup failed: {0}")]
    Voice(#[from] VoiceError),
    #[error("result notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let voice = VapiClient::new(&config.voice)?;
    let notifier = notifier_from_config(&config.notifier)?;
    let manager = LeadManager::new(
        Arc::new(SqlLeadRepository::new(db_pool.clone())),
        Arc::new(SqlCallRecordRepository::new(db_pool.clone())),
        Arc::new(voice),
        notifier,
        &config.dispatch,
    );
    info!(
        event_name = "system.bootstrap.dialer_ready",
        max_concurrent_calls = config.dispatch.max_concurrent_calls,
        notifier_enabled = config.notifier.url.is_some(),
        "lead manager initialized"
    );

    Ok(Application { config, db_pool, manager: Arc::new(manager) })
}

#[cfg(test)]
mod tests {
    use leadcall_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str) -> ConfigOverrides {
        ConfigOverrides {
            database_url: Some(database_url.to_string()),
            voice_api_key: Some("vapi-test-key".to_string()),
            voice_assistant_id: Some("asst-test".to_string()),
            voice_phone_number_id: Some("pn-test".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_voice_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                voice_api_key: Some("vapi-test-key".to_string()),
                voice_assistant_id: Some("asst-test".to_string()),
                voice_phone_number_id: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("voice.phone_number_id"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_idle_manager() {
        let app = bootstrap(LoadOptions {
            overrides: overrides("sqlite::memory:?cache=shared"),
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('leads', 'call_records')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 2);

        let stats = app.manager.stats().await;
        assert_eq!(stats.active_calls, 0);
        assert_eq!(stats.max_concurrent, 4);
        assert!(!stats.is_processing);

        app.db_pool.close().await;
    }
}
