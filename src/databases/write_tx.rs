use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

/// A write transaction opened with `BEGIN IMMEDIATE`, so the write lock is
/// taken up front and concurrent writers wait on `busy_timeout` instead of
/// failing when a read lock would have to be upgraded.
///
/// A transaction dropped before `commit`/`rollback` detaches its connection
/// from the pool; closing it discards the open transaction.
pub struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut tx = Self {
            conn: Some(pool.acquire().await?),
        };
        sqlx::query("BEGIN IMMEDIATE").execute(tx.conn()?).await?;
        Ok(tx)
    }

    pub fn conn(&mut self) -> Result<&mut SqliteConnection, sqlx::Error> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| sqlx::Error::Protocol("transaction already finished".into()))
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.finish("ROLLBACK").await
    }

    async fn finish(mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(self.conn()?).await?;
        // back to the pool
        self.conn.take();
        Ok(())
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::warn!("write transaction dropped while open, discarding connection");
            drop(conn.detach());
        }
    }
}
