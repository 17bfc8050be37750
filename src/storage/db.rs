use libsql::{Builder, Connection, Database};
use std::sync::Arc;

use super::StorageError;

/// Handle to the local SQLite database. Cheap to clone; every caller opens its
/// own connection.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<Database>,
}

impl DbClient {
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        info!("Opening database at {}", path);
        let db = Builder::new_local(path).build().await?;

        let client = Self { inner: Arc::new(db) };
        client.migrate().await?;

        Ok(client)
    }

    pub async fn get_connection(&self) -> Result<Connection, StorageError> {
        let conn = self.inner.connect()?;
        Ok(conn)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.get_connection().await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_admin INTEGER NOT NULL DEFAULT 0,
                joined_at TEXT NOT NULL,
                last_active TEXT NOT NULL
            )",
            (),
        )
        .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS motivations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                submitted_by INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                schedule_date TEXT
            )",
            (),
        )
        .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            (),
        )
        .await?;

        Ok(())
    }

    /// Throwaway database, used by the service tests. A `:memory:` path does
    /// not work here because libsql gives every `connect()` its own private
    /// in-memory database, so the migrated schema would be invisible to the
    /// services; a unique temp file keeps tests isolated instead.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "motivabot-test-{}-{}.db",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        Self::open(path.to_str().expect("temp path is valid utf-8")).await
    }
}
