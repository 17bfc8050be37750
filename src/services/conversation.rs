use chrono::Utc;
use libsql::params;
use teloxide::types::UserId;

use crate::storage::{DbClient, StorageError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only log of AI relay turns.
#[derive(Clone)]
pub struct ConversationService {
    db: DbClient,
}

impl ConversationService {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    pub async fn record(&self, user_id: UserId, prompt: &str, response: &str) -> Result<(), StorageError> {
        let conn = self.db.get_connection().await?;
        conn.execute(
            "INSERT INTO conversations (user_id, prompt, response, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id.0 as i64,
                prompt,
                response,
                Utc::now().format(TIMESTAMP_FORMAT).to_string()
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM conversations", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}
