use super::tokens::TokenCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One ingested usage fact from a JSONL log line.
///
/// Records are created once by the record parser and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// When the request happened (UTC)
    pub timestamp: DateTime<Utc>,
    /// Model identifier as written in the log
    pub model: String,
    /// Token breakdown
    pub tokens: TokenCounts,
    /// Cost in USD (recorded by the assistant or derived from pricing)
    pub cost: f64,
    /// Owning project (directory under `projects/`)
    pub project: String,
    /// Assistant session id, when present
    pub session_id: Option<String>,
    /// Time at which a hit usage limit resets, when the log reported one
    pub usage_limit_reset: Option<DateTime<Utc>>,
    /// File this record was read from
    pub source: PathBuf,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.tokens.total()
    }
}
