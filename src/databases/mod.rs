use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Executor, SqlitePool};
use std::str::FromStr;

use crate::config::Config;

pub mod messages;
mod write_tx;

use messages::MessageStore;

const MESSAGES_SCHEMA: &str = include_str!("../../databases/messages/schema.sql");

async fn connect(cfg: &Config) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("Invalid DATABASE_URL: {}", cfg.database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(cfg.busy_timeout);

    SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect_with(opts)
        .await
        .context("Failed to connect to database")
}

/// Connects to the configured store and makes sure the `messages` table exists.
pub async fn setup_backend(cfg: &Config) -> Result<MessageStore> {
    log::info!("Connecting to {}", cfg.database_url);
    let pool = connect(cfg).await?;

    pool.execute(MESSAGES_SCHEMA)
        .await
        .context("Failed to execute schema SQL")?;
    log::info!("Schema ready");

    Ok(MessageStore::new(pool))
}

#[cfg(test)]
pub async fn in_memory_store() -> MessageStore {
    setup_backend(&Config::in_memory())
        .await
        .expect("in-memory store")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::messages::NewMessage;

    fn file_config(dir: &tempfile::TempDir) -> Config {
        Config {
            database_url: format!("sqlite://{}", dir.path().join("app.db").display()),
            ..Config::default()
        }
    }

    #[actix_web::test]
    async fn setup_creates_the_messages_table() {
        let store = in_memory_store().await;
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'messages')",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert!(exists.0);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn reopening_a_database_keeps_its_rows() {
        let dir = tempfile::tempdir().unwrap();

        let store = setup_backend(&file_config(&dir)).await.unwrap();
        let created = store
            .create(NewMessage { body: "hi".into(), username: "liza".into() })
            .await
            .unwrap();
        store.pool().close().await;

        let reopened = setup_backend(&file_config(&dir)).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![created]);
    }

    #[actix_web::test]
    async fn file_databases_use_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_backend(&file_config(&dir)).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
