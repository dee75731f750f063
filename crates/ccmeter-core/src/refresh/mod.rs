//! Refresh coordination
//!
//! Several independent trigger sources (file changes, a fallback timer,
//! wake-from-sleep, local day rollover) each run as their own task and push a
//! [`RefreshReason`] into one fan-in channel. A dispatcher task forwards every
//! reason to the single registered callback.
//!
//! The coordinator does not run loads itself. Callers pair the callback with
//! a [`RefreshGate`] so a refresh arriving while a load is in flight is
//! dropped instead of queued.

pub mod day;
pub mod file_watch;
pub mod gate;
pub mod timer;
pub mod wake;

pub use day::{DayChangeTrigger, DayTracker};
pub use file_watch::{Debouncer, FileChangeTrigger};
pub use gate::{GateGuard, RefreshGate};
pub use timer::TimerTrigger;
pub use wake::{Wake, WakeDetector, WakeTrigger};

use crate::clock::Clock;
use crate::config::RefreshConfig;
use crate::error::CoreError;
use crate::event::{EventBus, MonitorEvent};
use ccmeter_types::RefreshReason;
use notify::RecommendedWatcher;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Capacity of the fan-in channel
const REASON_CHANNEL_CAPACITY: usize = 64;

/// Identifies one trigger source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    FileChange,
    Timer,
    Wake,
    DayChange,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::FileChange,
        TriggerKind::Timer,
        TriggerKind::Wake,
        TriggerKind::DayChange,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::FileChange => "file-change",
            TriggerKind::Timer => "timer",
            TriggerKind::Wake => "wake",
            TriggerKind::DayChange => "day-change",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Callback invoked by the dispatcher for every refresh reason
pub type RefreshCallback = Arc<dyn Fn(RefreshReason) + Send + Sync>;

/// A source of refresh reasons that runs as its own task
pub trait TriggerSource: Send {
    fn kind(&self) -> TriggerKind;

    /// Start the task; it emits into `tx` until stopped
    fn spawn(self: Box<Self>, tx: mpsc::Sender<RefreshReason>) -> Result<TriggerHandle, CoreError>;
}

/// Handle to a running trigger task
pub struct TriggerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    /// Kept alive for as long as the file-change task runs
    _watcher: Option<RecommendedWatcher>,
}

impl TriggerHandle {
    pub fn new(shutdown_tx: mpsc::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown_tx,
            task,
            _watcher: None,
        }
    }

    pub fn with_watcher(mut self, watcher: RecommendedWatcher) -> Self {
        self._watcher = Some(watcher);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Trigger task ended abnormally");
            }
        }
    }

    fn abort(&self) {
        self.task.abort();
    }
}

/// Owns the trigger sources and the dispatcher
pub struct RefreshCoordinator {
    config: RefreshConfig,
    roots: Vec<PathBuf>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    tx: mpsc::Sender<RefreshReason>,
    callback: Arc<RwLock<Option<RefreshCallback>>>,
    triggers: Mutex<HashMap<TriggerKind, TriggerHandle>>,
    dispatcher: JoinHandle<()>,
}

impl RefreshCoordinator {
    /// Create the coordinator and spawn its dispatcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: RefreshConfig, roots: Vec<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let (tx, mut rx) = mpsc::channel::<RefreshReason>(REASON_CHANNEL_CAPACITY);
        let callback: Arc<RwLock<Option<RefreshCallback>>> = Arc::new(RwLock::new(None));

        let dispatch_callback = Arc::clone(&callback);
        let dispatcher = tokio::spawn(async move {
            while let Some(reason) = rx.recv().await {
                let callback = dispatch_callback.read().clone();
                match callback {
                    Some(callback) => {
                        debug!(reason = %reason, "Dispatching refresh");
                        callback(reason);
                    }
                    None => trace!(reason = %reason, "No refresh callback registered"),
                }
            }
            debug!("Refresh dispatcher stopped");
        });

        Self {
            config,
            roots,
            clock,
            event_bus: None,
            tx,
            callback,
            triggers: Mutex::new(HashMap::new()),
            dispatcher,
        }
    }

    /// Publish trigger errors on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Register the callback; replaces any previous one
    pub fn on_refresh<F>(&self, callback: F)
    where
        F: Fn(RefreshReason) + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// Sender for custom trigger sources
    pub fn sender(&self) -> mpsc::Sender<RefreshReason> {
        self.tx.clone()
    }

    /// Inject a reason directly (e.g., a manual refresh)
    ///
    /// Returns `false` if the channel is full or closed.
    pub fn request(&self, reason: RefreshReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(e) => {
                warn!(reason = %reason, error = %e, "Refresh request not queued");
                false
            }
        }
    }

    fn source_for(&self, kind: TriggerKind) -> Box<dyn TriggerSource> {
        let config = &self.config;
        match kind {
            TriggerKind::FileChange => Box::new(
                FileChangeTrigger::new(self.roots.clone(), config.debounce, config.max_debounce)
                    .with_event_bus(self.event_bus.clone()),
            ),
            TriggerKind::Timer => Box::new(TimerTrigger::new(config.timer_interval)),
            TriggerKind::Wake => Box::new(WakeTrigger::new(
                config.wake_tick,
                config.wake_threshold,
                Arc::clone(&self.clock),
            )),
            TriggerKind::DayChange => Box::new(DayChangeTrigger::new(
                config.day_check_interval,
                Arc::clone(&self.clock),
            )),
        }
    }

    /// Start one trigger; no-op if it is already running
    pub fn start(&self, kind: TriggerKind) -> Result<(), CoreError> {
        self.start_source(self.source_for(kind))
    }

    /// Start a caller-provided source in place of the built-in one
    pub fn start_source(&self, source: Box<dyn TriggerSource>) -> Result<(), CoreError> {
        let kind = source.kind();
        let mut triggers = self.triggers.lock();
        if triggers.get(&kind).map(|h| !h.is_finished()).unwrap_or(false) {
            debug!(trigger = %kind, "Trigger already running");
            return Ok(());
        }

        let handle = source.spawn(self.tx.clone()).inspect_err(|e| {
            warn!(trigger = %kind, error = %e, "Failed to start trigger");
            if let Some(bus) = &self.event_bus {
                bus.publish(MonitorEvent::WatcherError(e.to_string()));
            }
        })?;
        triggers.insert(kind, handle);
        info!(trigger = %kind, "Trigger started");
        Ok(())
    }

    /// Start every trigger; returns the first failure after trying all
    pub fn start_all(&self) -> Result<(), CoreError> {
        let mut first_error = None;
        for kind in TriggerKind::ALL {
            if let Err(e) = self.start(kind) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop one trigger; returns `false` if it was not running
    pub async fn stop(&self, kind: TriggerKind) -> bool {
        let handle = self.triggers.lock().remove(&kind);
        match handle {
            Some(handle) => {
                handle.stop().await;
                info!(trigger = %kind, "Trigger stopped");
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        for kind in TriggerKind::ALL {
            self.stop(kind).await;
        }
    }

    pub fn is_running(&self, kind: TriggerKind) -> bool {
        self.triggers
            .lock()
            .get(&kind)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn running(&self) -> Vec<TriggerKind> {
        TriggerKind::ALL
            .into_iter()
            .filter(|kind| self.is_running(*kind))
            .collect()
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        for handle in self.triggers.lock().values() {
            handle.abort();
        }
        self.dispatcher.abort();
    }
}
