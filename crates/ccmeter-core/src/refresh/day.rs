//! Local calendar day rollover trigger

use super::{TriggerHandle, TriggerKind, TriggerSource};
use crate::clock::Clock;
use crate::error::CoreError;
use ccmeter_types::RefreshReason;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Remembers the last observed local date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTracker {
    current: NaiveDate,
}

impl DayTracker {
    pub fn new(today: NaiveDate) -> Self {
        Self { current: today }
    }

    pub fn current(&self) -> NaiveDate {
        self.current
    }

    /// Record `today`; returns `true` when it differs from the last date
    pub fn observe(&mut self, today: NaiveDate) -> bool {
        if today == self.current {
            return false;
        }
        self.current = today;
        true
    }
}

/// Emits [`RefreshReason::DayChange`] when the local date rolls over
pub struct DayChangeTrigger {
    check_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl DayChangeTrigger {
    pub fn new(check_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            check_interval,
            clock,
        }
    }
}

impl TriggerSource for DayChangeTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::DayChange
    }

    fn spawn(self: Box<Self>, tx: mpsc::Sender<RefreshReason>) -> Result<TriggerHandle, CoreError> {
        if self.check_interval.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "day check interval must be positive".to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = self.check_interval;
        let clock = self.clock;

        let task = tokio::spawn(async move {
            let mut tracker = DayTracker::new(clock.today());
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if tracker.observe(clock.today()) {
                            info!(date = %tracker.current(), "Local day changed");
                            if tx.send(RefreshReason::DayChange).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Day-change trigger shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TriggerHandle::new(shutdown_tx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_day_tracker_reports_rollover_once() {
        let mut tracker = DayTracker::new(date(1));
        assert!(!tracker.observe(date(1)));
        assert!(tracker.observe(date(2)));
        assert!(!tracker.observe(date(2)));
        assert_eq!(tracker.current(), date(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_emits_on_rollover() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Box::new(DayChangeTrigger::new(Duration::from_secs(30), clock.clone()))
            .spawn(tx)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rx.try_recv().is_err());

        clock.advance(chrono::Duration::days(1));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().ok(), Some(RefreshReason::DayChange));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());

        handle.stop().await;
    }
}
