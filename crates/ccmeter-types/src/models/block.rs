use super::record::UsageRecord;
use super::tokens::TokenCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consumption rate of a session block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnRate {
    /// Whole tokens per minute (floored)
    pub tokens_per_minute: f64,
    /// USD per hour
    pub cost_per_hour: f64,
}

impl BurnRate {
    pub const fn zero() -> Self {
        Self {
            tokens_per_minute: 0.0,
            cost_per_hour: 0.0,
        }
    }
}

/// Extrapolation of a block's totals to its nominal end time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectedUsage {
    pub total_tokens: f64,
    pub total_cost: f64,
    /// Minutes until the block's nominal end. Negative once the window has elapsed.
    pub remaining_minutes: f64,
}

/// A usage window anchored to an hour boundary.
///
/// Blocks are produced by the session window builder from a full, sorted
/// record list and are never mutated afterwards; a new input batch yields a
/// new block list.
///
/// ```text
///  start_time (floored)      actual_end_time        end_time = start + window
///  |---- records ------------|......................|
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBlock {
    /// Stable id derived from the start time
    pub id: String,
    /// First record's timestamp floored to the top of the hour
    pub start_time: DateTime<Utc>,
    /// `start_time + window`
    pub end_time: DateTime<Utc>,
    /// Timestamp of the last contained record
    pub actual_end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Reserved for synthetic idle blocks; the builder never sets it
    pub is_gap: bool,
    pub records: Vec<UsageRecord>,
    pub token_counts: TokenCounts,
    pub cost: f64,
    /// Distinct models, sorted
    pub models: Vec<String>,
    /// Most recent usage-limit reset reported inside this block
    pub usage_limit_reset: Option<DateTime<Utc>>,
    pub burn_rate: BurnRate,
    pub projected_usage: ProjectedUsage,
}

impl SessionBlock {
    pub fn total_tokens(&self) -> u64 {
        self.token_counts.total()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Neither active nor a synthetic gap
    pub fn is_completed(&self) -> bool {
        !self.is_active && !self.is_gap
    }

    /// Minutes between the block start and its last record
    pub fn duration_minutes(&self) -> f64 {
        self.actual_end_time
            .map(|end| (end - self.start_time).num_seconds() as f64 / 60.0)
            .unwrap_or(0.0)
    }

    /// Window label in UTC (e.g., "2026-02-02 10:00-15:00")
    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.start_time.format("%Y-%m-%d"),
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}
