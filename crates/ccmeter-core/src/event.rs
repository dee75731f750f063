//! Event bus for ccmeter using tokio::broadcast
//!
//! The loader publishes the fast "today" result before the history phase
//! starts, so subscribers see partial data first.

use ccmeter_types::{HistoryResult, TodayResult};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the usage monitor and its refresh triggers
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// The today phase finished
    TodayLoaded(Arc<TodayResult>),
    /// The history phase recomputed the full aggregate
    HistoryLoaded(Arc<HistoryResult>),
    /// The history phase was skipped (already ran today)
    HistorySkipped,
    /// A load failed structurally; state was left untouched
    LoadFailed(String),
    /// Incremental state was dropped
    CacheCleared,
    /// A trigger source hit an error
    WatcherError(String),
}

/// Event bus for broadcasting monitor events
///
/// Uses tokio::broadcast for multi-consumer support.
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (64 events)
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
