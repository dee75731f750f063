//! ccmeter-types - Shared value types for ccmeter
//!
//! This crate contains pure data structures without heavy dependencies.
//! No tokio, no async runtime - just serde-serializable types.
//!
//! Used by:
//! - ccmeter-core (ingestion engine, session blocks, loader)
//! - ccmeter (CLI rendering)
//! - any presentation layer that consumes loader output

pub mod models;

pub use models::{
    BurnRate, DailyUsage, HistoryResult, LoadResult, ModelUsage, ProjectUsage, ProjectedUsage,
    RefreshReason, SessionBlock, TodayResult, TokenCounts, UsageRecord,
};
