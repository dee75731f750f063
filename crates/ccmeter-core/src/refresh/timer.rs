//! Fixed-interval fallback trigger

use super::{TriggerHandle, TriggerKind, TriggerSource};
use crate::error::CoreError;
use ccmeter_types::RefreshReason;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Emits [`RefreshReason::Timer`] every `interval`, starting one interval
/// after spawn
#[derive(Debug, Clone)]
pub struct TimerTrigger {
    interval: Duration,
}

impl TimerTrigger {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl TriggerSource for TimerTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Timer
    }

    fn spawn(self: Box<Self>, tx: mpsc::Sender<RefreshReason>) -> Result<TriggerHandle, CoreError> {
        if self.interval.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "timer interval must be positive".to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if tx.send(RefreshReason::Timer).await.is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Timer trigger shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TriggerHandle::new(shutdown_tx, task))
    }
}
