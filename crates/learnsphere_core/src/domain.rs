//! crates/learnsphere_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The self-reported skill level attached to an account and fed into the
/// generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }

    /// Parses a level label, case-insensitively. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }
}

/// A registered user account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Salted argon2 hash string, never the plaintext password.
    pub password_hash: String,
    pub level: SkillLevel,
    pub created_at: DateTime<Utc>,
}

/// One persisted past generation, tied to an account.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub id: i64,
    pub account_id: i64,
    pub topic: String,
    /// The full `GenerationResult` serialized as JSON, stored opaquely.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The four-field structured teaching payload returned to the client.
///
/// Unknown fields from the upstream model are rejected so that the wire
/// contract stays exactly these four keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationResult {
    /// Markdown-formatted explanation text.
    pub explanation: String,
    /// A multi-line runnable snippet; lines are implicitly numbered from 1.
    pub code: String,
    /// Maps line numbers (as strings, e.g. "1") to annotations. Alignment
    /// with `code` is a best-effort contract from the upstream model.
    pub xray: BTreeMap<String, String>,
    /// A Mermaid graph definition, fence-free after normalization.
    pub diagram: String,
}

/// Captured output of one code execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    pub error: String,
}
