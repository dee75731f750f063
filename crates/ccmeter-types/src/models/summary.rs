//! Aggregates returned by the two-phase loader

use super::block::{BurnRate, SessionBlock};
use super::tokens::TokenCounts;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Usage attributed to one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub tokens: TokenCounts,
    pub cost: f64,
    pub records: usize,
}

/// Usage for one local calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub tokens: TokenCounts,
    pub cost: f64,
    pub records: usize,
    /// Distinct models used that day, sorted
    pub models: Vec<String>,
}

/// Usage attributed to one project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUsage {
    pub project: String,
    pub tokens: TokenCounts,
    pub cost: f64,
    pub records: usize,
}

/// Output of the fast "today" phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayResult {
    /// Local calendar date the aggregate covers
    pub date: NaiveDate,
    pub tokens: TokenCounts,
    pub cost: f64,
    pub record_count: usize,
    /// Sorted by cost, most expensive first
    pub by_model: Vec<ModelUsage>,
    pub active_block: Option<SessionBlock>,
    pub burn_rate: Option<BurnRate>,
    /// Largest total among completed blocks, when any exist
    pub auto_token_limit: Option<u64>,
}

/// Output of the slow "history" phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub tokens: TokenCounts,
    pub cost: f64,
    pub record_count: usize,
    /// Ascending by date
    pub daily: Vec<DailyUsage>,
    /// Sorted by cost, most expensive first
    pub by_model: Vec<ModelUsage>,
    /// Sorted by cost, most expensive first
    pub by_project: Vec<ProjectUsage>,
    pub blocks: Vec<SessionBlock>,
    pub first_record: Option<DateTime<Utc>>,
    pub last_record: Option<DateTime<Utc>>,
}

/// Combined output of a full load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub today: TodayResult,
    /// `None` when history already ran today and was not forced
    pub history: Option<HistoryResult>,
}
