//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `DatabaseService` port from the `core` crate. It
//! handles all interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnsphere_core::domain::{Account, HistoryRecord, SkillLevel};
use learnsphere_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: i64,
    username: String,
    password_hash: String,
    level: String,
    created_at: DateTime<Utc>,
}

impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            level: SkillLevel::parse(&self.level).unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct HistoryRecordRow {
    id: i64,
    account_id: i64,
    topic: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl HistoryRecordRow {
    fn to_domain(self) -> HistoryRecord {
        HistoryRecord {
            id: self.id,
            account_id: self.account_id,
            topic: self.topic,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_account(&self, username: &str, password_hash: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO accounts (username, password_hash, level, created_at) \
             VALUES (?, ?, 'Beginner', ?) \
             RETURNING id, username, password_hash, level, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict("Username already exists".to_string())
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_account_by_username(&self, username: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, username, password_hash, level, created_at \
             FROM accounts WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Account '{}' not found", username)))?;

        Ok(record.to_domain())
    }

    async fn set_account_level(&self, account_id: i64, level: SkillLevel) -> PortResult<()> {
        sqlx::query("UPDATE accounts SET level = ? WHERE id = ?")
            .bind(level.as_str())
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, account_id, expires_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<i64> {
        let account_id: Option<i64> = sqlx::query_scalar(
            "SELECT account_id FROM auth_sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(session_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        account_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_history_record(
        &self,
        account_id: i64,
        topic: &str,
        content: &str,
    ) -> PortResult<HistoryRecord> {
        let record = sqlx::query_as::<_, HistoryRecordRow>(
            "INSERT INTO history_records (account_id, topic, content, created_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, account_id, topic, content, created_at",
        )
        .bind(account_id)
        .bind(topic)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn history_for_account(&self, account_id: i64) -> PortResult<Vec<HistoryRecord>> {
        let rows = sqlx::query_as::<_, HistoryRecordRow>(
            "SELECT id, account_id, topic, content, created_at \
             FROM history_records WHERE account_id = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows.into_iter().map(HistoryRecordRow::to_domain).collect())
    }
}
