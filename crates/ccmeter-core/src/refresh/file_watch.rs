//! File-change trigger
//!
//! Watches each root's `projects/` tree with notify and coalesces bursts of
//! create/modify events on `*.jsonl` files into one refresh, fired after a
//! quiet period (trailing edge). A continuous stream of writes cannot
//! postpone the refresh past `max_debounce`.

use super::{TriggerHandle, TriggerKind, TriggerSource};
use crate::discovery::is_jsonl;
use crate::error::CoreError;
use crate::event::{EventBus, MonitorEvent};
use ccmeter_types::RefreshReason;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

/// Trailing-edge debounce with an upper bound
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    max_wait: Duration,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration, max_wait: Duration) -> Self {
        Self {
            quiet,
            max_wait: max_wait.max(quiet),
            first: None,
            last: None,
        }
    }

    /// Record an event at `now`
    pub fn touch(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
    }

    /// When the pending burst should fire, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first?;
        let last = self.last?;
        Some((last + self.quiet).min(first + self.max_wait))
    }

    pub fn is_pending(&self) -> bool {
        self.first.is_some()
    }

    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
    }
}

/// Only create/modify events touching a `*.jsonl` file matter
fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| is_jsonl(p))
}

/// Emits [`RefreshReason::FileChange`] after log files change
pub struct FileChangeTrigger {
    roots: Vec<PathBuf>,
    debounce: Duration,
    max_debounce: Duration,
    event_bus: Option<EventBus>,
}

impl FileChangeTrigger {
    pub fn new(roots: Vec<PathBuf>, debounce: Duration, max_debounce: Duration) -> Self {
        Self {
            roots,
            debounce,
            max_debounce,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Option<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    fn watch_roots(&self, watcher: &mut RecommendedWatcher) -> Result<usize, CoreError> {
        let mut watched = 0;
        let mut last_error = None;

        for root in &self.roots {
            let projects = root.join("projects");
            match watcher.watch(&projects, RecursiveMode::Recursive) {
                Ok(()) => {
                    debug!(path = %projects.display(), "Watching path");
                    watched += 1;
                }
                Err(e) => {
                    warn!(path = %projects.display(), error = %e, "Cannot watch path");
                    last_error = Some(e);
                }
            }
        }

        if watched == 0 {
            return Err(CoreError::WatchError {
                message: "no projects directory could be watched".to_string(),
                source: last_error,
            });
        }
        Ok(watched)
    }
}

impl TriggerSource for FileChangeTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::FileChange
    }

    fn spawn(self: Box<Self>, tx: mpsc::Sender<RefreshReason>) -> Result<TriggerHandle, CoreError> {
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(256);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        // Runs on notify's own thread, outside the runtime
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            Config::default(),
        )
        .map_err(|e| CoreError::WatchError {
            message: "failed to create file watcher".to_string(),
            source: Some(e),
        })?;

        let watched = self.watch_roots(&mut watcher)?;
        info!(roots = watched, "File watcher started");

        let event_bus = self.event_bus;
        let mut debouncer = Debouncer::new(self.debounce, self.max_debounce);

        let task = tokio::spawn(async move {
            loop {
                let deadline = debouncer.deadline();

                tokio::select! {
                    Some(result) = event_rx.recv() => {
                        match result {
                            Ok(event) if is_relevant(&event) => {
                                trace!(paths = ?event.paths, "Log file changed");
                                debouncer.touch(Instant::now());
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = %e, "File watcher error");
                                if let Some(bus) = &event_bus {
                                    bus.publish(MonitorEvent::WatcherError(e.to_string()));
                                }
                            }
                        }
                    }
                    _ = sleep_until(deadline.unwrap_or_else(Instant::now)),
                        if deadline.is_some() =>
                    {
                        debouncer.reset();
                        debug!("Emitting file change refresh");
                        if tx.send(RefreshReason::FileChange).await.is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("File watcher shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TriggerHandle::new(shutdown_tx, task).with_watcher(watcher))
    }
}
