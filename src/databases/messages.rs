use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;

use super::write_tx::WriteTx;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Message {
    pub id: i64,
    pub body: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of a [`Message`] (v1).
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageJson {
    pub id: i64,
    pub body: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Message {
    pub fn to_json(&self) -> MessageJson {
        MessageJson {
            id: self.id,
            body: self.body.clone(),
            username: self.username.clone(),
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            updated_at: self.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Message {}: {} - {}>", self.id, self.username, self.body)
    }
}

#[derive(Debug)]
pub struct NewMessage {
    pub body: String,
    pub username: String,
}

// Rows keep microsecond precision so values read back match what was written.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::microseconds(1)).unwrap_or(now)
}

fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Storage access for the `messages` table. Every call runs in its own
/// transaction, committed before it returns. Writes take the write lock when
/// the transaction opens, so concurrent writers queue instead of failing.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn list(&self) -> Result<Vec<Message>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, body, username, created_at, updated_at
             FROM messages
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(messages)
    }

    pub async fn create(&self, new: NewMessage) -> Result<Message, sqlx::Error> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let now = now();

        let inserted = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (body, username, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, body, username, created_at, updated_at",
        )
        .bind(&new.body)
        .bind(&new.username)
        .bind(now)
        .bind(now)
        .fetch_one(tx.conn()?)
        .await;

        match inserted {
            Ok(message) => {
                tx.commit().await?;
                Ok(message)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!("rollback after failed insert: {rollback_err:?}");
                }
                Err(e)
            }
        }
    }

    /// Returns `None` when no message has `id`. A `None` body leaves the row,
    /// including `updated_at`, untouched.
    pub async fn update_body(
        &self,
        id: i64,
        body: Option<String>,
    ) -> Result<Option<Message>, sqlx::Error> {
        let mut tx = WriteTx::begin(&self.pool).await?;

        let current = sqlx::query_as::<_, Message>(
            "SELECT id, body, username, created_at, updated_at FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(body) = body else {
            tx.commit().await?;
            return Ok(Some(current));
        };

        let updated = sqlx::query_as::<_, Message>(
            "UPDATE messages SET body = ?, updated_at = ?
             WHERE id = ?
             RETURNING id, body, username, created_at, updated_at",
        )
        .bind(&body)
        .bind(next_updated_at(current.updated_at))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Returns `false` when no message has `id`.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(tx.conn()?)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
