//! crates/learnsphere_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or model APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Account, ExecutionOutcome, HistoryRecord, SkillLevel};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Account Management ---

    /// Creates an account. A duplicate username yields `PortError::Conflict`.
    async fn create_account(&self, username: &str, password_hash: &str) -> PortResult<Account>;

    async fn get_account_by_username(&self, username: &str) -> PortResult<Account>;

    async fn set_account_level(&self, account_id: i64, level: SkillLevel) -> PortResult<()>;

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session token to its account id; expired or unknown
    /// sessions yield `PortError::Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<i64>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Generation History ---

    async fn save_history_record(
        &self,
        account_id: i64,
        topic: &str,
        content: &str,
    ) -> PortResult<HistoryRecord>;

    async fn history_for_account(&self, account_id: i64) -> PortResult<Vec<HistoryRecord>>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Performs one attempt against one model identifier, requesting
    /// JSON-typed output, and returns the raw response text.
    async fn generate_json(&self, model: &str, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait CodeExecutionService: Send + Sync {
    /// Runs a code string and captures its stdout/stderr. Infallible by
    /// contract: any failure to execute is reported inside the outcome's
    /// `error` field, alongside whatever partial output was produced.
    async fn run(&self, code: &str) -> ExecutionOutcome;
}
