//! Wake-from-sleep detection
//!
//! The monotonic clock stops while the machine is suspended; the wall clock
//! does not. Sampling both on a short tick, a wall-clock advance that
//! outruns the monotonic advance by more than a threshold means the process
//! was asleep in between.

use super::{TriggerHandle, TriggerKind, TriggerSource};
use crate::clock::{local_date, Clock};
use crate::error::CoreError;
use ccmeter_types::RefreshReason;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A detected wake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    /// Wall-clock time unaccounted for by the monotonic clock
    pub slept: Duration,
    /// The local date changed while asleep
    pub crossed_day: bool,
}

impl From<Wake> for RefreshReason {
    fn from(wake: Wake) -> Self {
        RefreshReason::Wake {
            crossed_day: wake.crossed_day,
        }
    }
}

/// Compares consecutive (wall, monotonic) samples
#[derive(Debug, Clone)]
pub struct WakeDetector {
    threshold: Duration,
    last_wall: DateTime<Utc>,
    last_mono: Instant,
}

impl WakeDetector {
    pub fn new(threshold: Duration, wall: DateTime<Utc>, mono: Instant) -> Self {
        Self {
            threshold,
            last_wall: wall,
            last_mono: mono,
        }
    }

    /// Take a sample; returns a [`Wake`] if the gap exceeds the threshold
    ///
    /// A wall clock moving backwards (manual adjustment, NTP step) is never
    /// reported.
    pub fn observe(&mut self, wall: DateTime<Utc>, mono: Instant) -> Option<Wake> {
        let wall_elapsed = (wall - self.last_wall).to_std().unwrap_or(Duration::ZERO);
        let mono_elapsed = mono.saturating_duration_since(self.last_mono);
        let crossed_day = local_date(wall) != local_date(self.last_wall);

        self.last_wall = wall;
        self.last_mono = mono;

        let slept = wall_elapsed.saturating_sub(mono_elapsed);
        (slept > self.threshold).then_some(Wake { slept, crossed_day })
    }
}

/// Emits [`RefreshReason::Wake`] after the system resumes from sleep
pub struct WakeTrigger {
    tick: Duration,
    threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl WakeTrigger {
    pub fn new(tick: Duration, threshold: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tick,
            threshold,
            clock,
        }
    }
}

impl TriggerSource for WakeTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Wake
    }

    fn spawn(self: Box<Self>, tx: mpsc::Sender<RefreshReason>) -> Result<TriggerHandle, CoreError> {
        if self.tick.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "wake tick must be positive".to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let tick = self.tick;
        let threshold = self.threshold;
        let clock = self.clock;

        let task = tokio::spawn(async move {
            let mut detector = WakeDetector::new(threshold, clock.now(), Instant::now());
            let mut ticker = interval_at(Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Some(wake) = detector.observe(clock.now(), Instant::now()) {
                            info!(
                                slept_secs = wake.slept.as_secs(),
                                crossed_day = wake.crossed_day,
                                "Wake from sleep detected"
                            );
                            if tx.send(wake.into()).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Wake trigger shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TriggerHandle::new(shutdown_tx, task))
    }
}
