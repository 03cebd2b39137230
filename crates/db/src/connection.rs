use std::time::Duration;

use leadcall_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens the lead store. File-backed databases are created on first use so a
/// fresh deployment only needs `migrate`.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let url = with_create_mode(database_url);
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
}

fn with_create_mode(database_url: &str) -> String {
    let is_file = database_url.starts_with("sqlite://") && !database_url.contains(":memory:");
    if is_file && !database_url.contains("mode=") {
        let separator = if database_url.contains('?') { '&' } else { '?' };
        format!("{database_url}{separator}mode=rwc")
    } else {
        database_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{connect_with_settings, with_create_mode};

    #[tokio::test]
    async fn pragmas_are_applied_on_connect() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let foreign_keys = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("read pragma")
            .get::<i64, _>(0);

        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn file_urls_are_opened_in_create_mode() {
        assert_eq!(with_create_mode("sqlite://leadcall.db"), "sqlite://leadcall.db?mode=rwc");
        assert_eq!(
            with_create_mode("sqlite://leadcall.db?cache=shared"),
            "sqlite://leadcall.db?cache=shared&mode=rwc"
        );
        assert_eq!(with_create_mode("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(with_create_mode("sqlite://data.db?mode=ro"), "sqlite://data.db?mode=ro");
    }
}
