//! ccmeter-core - Core library for ccmeter
//!
//! Ingests the assistant's JSONL usage logs incrementally, groups records
//! into session blocks with burn rates and projections, and coordinates
//! refreshes from file changes, timers, wake-from-sleep and day rollover.

pub mod aggregate;
pub mod blocks;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod estimator;
pub mod event;
pub mod monitor;
pub mod parsers;
pub mod pricing;
pub mod refresh;
pub mod retry;
pub mod tracker;

pub use blocks::{active_block, auto_token_limit, build_blocks};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{MonitorConfig, RefreshConfig};
pub use dedup::DedupFilter;
pub use error::{CoreError, LoadReport};
pub use event::{EventBus, MonitorEvent};
pub use monitor::UsageMonitor;
pub use refresh::{RefreshCoordinator, RefreshGate, TriggerKind};
pub use tracker::FileTracker;
