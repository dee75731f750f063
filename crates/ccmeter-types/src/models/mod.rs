//! Value types produced by the ingestion engine

pub mod block;
pub mod record;
pub mod refresh;
pub mod summary;
pub mod tokens;

pub use block::{BurnRate, ProjectedUsage, SessionBlock};
pub use record::UsageRecord;
pub use refresh::RefreshReason;
pub use summary::{DailyUsage, HistoryResult, LoadResult, ModelUsage, ProjectUsage, TodayResult};
pub use tokens::TokenCounts;
