// src/models/session.rs

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};

/// Represents the 'sessions' table: one row per logged-in client.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn create(pool: &SqlitePool, user_id: i64, ttl_seconds: u64) -> Result<Session, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES (?, ?, ?)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>("SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Deletes every session whose deadline has passed by `now`.
    ///
    /// Compared through `julianday` since rows may carry either the column
    /// default format or the one sqlx binds.
    pub async fn purge_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE julianday(expires_at) <= julianday(?)")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Removes a session. Deleting an unknown id is not an error.
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
