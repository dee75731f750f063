//! Drop-while-busy guard for refresh-driven loads
//!
//! Loads are not preemptible and refresh reasons are not queued: a reason
//! that arrives while a load is running is dropped. The next trigger (or the
//! fallback timer) picks up whatever changed in the meantime.

use crate::error::CoreError;
use crate::monitor::UsageMonitor;
use ccmeter_types::{LoadResult, RefreshReason};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    busy: Arc<AtomicBool>,
}

/// Holds the gate closed; reopens it on drop
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Close the gate if it is open
    pub fn try_begin(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Run `fut` unless another gated call is in flight
    ///
    /// Returns `None` when the reason was dropped.
    pub async fn run<F>(&self, reason: RefreshReason, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        let Some(_guard) = self.try_begin() else {
            debug!(reason = %reason, "Load in flight, dropping refresh");
            return None;
        };
        Some(fut.await)
    }

    /// Full load for `reason`, invalidating the cache when the reason asks for it
    pub async fn load(
        &self,
        monitor: &UsageMonitor,
        reason: RefreshReason,
    ) -> Option<Result<LoadResult, CoreError>> {
        self.run(reason, monitor.load_all(reason.should_invalidate_cache()))
            .await
    }
}
