use chrono::Utc;
use libsql::params;
use teloxide::types::UserId;

use crate::storage::{DbClient, StorageError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl From<&teloxide::types::User> for UserProfile {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    pub total: u64,
    pub active_last_day: u64,
}

/// Upsert-on-contact registry of everyone who ever messaged the bot.
/// Users are never deleted; opting out only clears `is_active`.
#[derive(Clone)]
pub struct UserService {
    db: DbClient,
}

impl UserService {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Called for every inbound update. Reactivates opted-out users and
    /// refreshes `last_active`.
    pub async fn upsert_on_contact(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let conn = self.db.get_connection().await?;
        conn.execute(
            "INSERT INTO users (user_id, username, first_name, last_name, is_active, is_admin, joined_at, last_active)
             VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                is_active = 1,
                last_active = excluded.last_active",
            params![
                profile.user_id.0 as i64,
                profile.username.clone().unwrap_or_default(),
                profile.first_name.clone(),
                profile.last_name.clone().unwrap_or_default(),
                now
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn deactivate(&self, user_id: UserId) -> Result<(), StorageError> {
        let conn = self.db.get_connection().await?;
        conn.execute(
            "UPDATE users SET is_active = 0 WHERE user_id = ?1",
            params![user_id.0 as i64],
        )
        .await?;
        Ok(())
    }

    pub async fn is_registered(&self, user_id: UserId) -> Result<bool, StorageError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query("SELECT 1 FROM users WHERE user_id = ?1", params![user_id.0 as i64])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn is_active(&self, user_id: UserId) -> Result<bool, StorageError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT is_active FROM users WHERE user_id = ?1",
                params![user_id.0 as i64],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? == 1),
            None => Ok(false),
        }
    }

    pub async fn is_dynamic_admin(&self, user_id: UserId) -> Result<bool, StorageError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT is_admin FROM users WHERE user_id = ?1",
                params![user_id.0 as i64],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? == 1),
            None => Ok(false),
        }
    }

    /// Returns false if no such user is registered.
    pub async fn set_admin(&self, user_id: UserId, is_admin: bool) -> Result<bool, StorageError> {
        let conn = self.db.get_connection().await?;
        let changed = conn
            .execute(
                "UPDATE users SET is_admin = ?2 WHERE user_id = ?1",
                params![user_id.0 as i64, if is_admin { 1i64 } else { 0i64 }],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn active_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query("SELECT user_id FROM users WHERE is_active = 1 ORDER BY user_id", ())
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(UserId(row.get::<i64>(0)? as u64));
        }
        Ok(ids)
    }

    pub async fn stats(&self) -> Result<UserStats, StorageError> {
        let conn = self.db.get_connection().await?;

        let mut rows = conn.query("SELECT COUNT(*) FROM users", ()).await?;
        let total = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM users WHERE last_active >= datetime('now', '-1 day')",
                (),
            )
            .await?;
        let active_last_day = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        Ok(UserStats { total, active_last_day })
    }
}
