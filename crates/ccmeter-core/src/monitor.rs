//! Two-phase usage loader
//!
//! The monitor owns all incremental ingestion state behind one async mutex,
//! so entry points are serialized: a load started by one trigger runs to
//! completion before the next one touches the tracker or the dedup set.
//!
//! Phases:
//! - **today**: ingest changed files, then aggregate today's records and
//!   rebuild session blocks concurrently. Fast; runs on every refresh.
//! - **history**: full aggregate over every record. Slow; runs at most once
//!   per local calendar day unless forced.

use crate::aggregate::{aggregate_day, aggregate_history};
use crate::blocks::{active_block, auto_token_limit, build_blocks};
use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::dedup::DedupFilter;
use crate::discovery::{candidate_roots, discover_files, project_from_path, resolve_roots};
use crate::error::{CoreError, LoadError, LoadReport};
use crate::event::{EventBus, MonitorEvent};
use crate::parsers::parse_content;
use crate::retry::with_backoff;
use crate::tracker::FileTracker;
use ccmeter_types::{HistoryResult, LoadResult, SessionBlock, TodayResult, UsageRecord};
use chrono::NaiveDate;
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Incremental ingestion state
#[derive(Debug, Default)]
struct MonitorState {
    tracker: FileTracker,
    dedup: DedupFilter,
    /// Shared with the blocking aggregation tasks
    records: Arc<Vec<UsageRecord>>,
    /// Local date of the last completed history phase
    last_history_date: Option<NaiveDate>,
}

impl MonitorState {
    fn clear(&mut self) {
        self.tracker.clear();
        self.dedup.clear();
        self.records = Arc::new(Vec::new());
        self.last_history_date = None;
    }
}

/// Usage loader over one or more data roots
pub struct UsageMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    state: Mutex<MonitorState>,
    /// Last built block list, readable without waiting for a load
    blocks: RwLock<Arc<Vec<SessionBlock>>>,
    last_report: SyncMutex<LoadReport>,
}

impl UsageMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self, CoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MonitorConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            event_bus: EventBus::default_capacity(),
            state: Mutex::new(MonitorState::default()),
            blocks: RwLock::new(Arc::new(Vec::new())),
            last_report: SyncMutex::new(LoadReport::new()),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Data roots that currently contain a `projects/` directory
    pub fn roots(&self) -> Vec<PathBuf> {
        resolve_roots(&self.config)
    }

    /// Report of the most recent load; `load_all` merges both phases
    pub fn last_report(&self) -> LoadReport {
        self.last_report.lock().clone()
    }

    /// Number of records ingested so far
    pub async fn record_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    /// Block list from the most recent load
    pub fn blocks(&self) -> Arc<Vec<SessionBlock>> {
        Arc::clone(&self.blocks.read())
    }

    pub fn get_active_block(&self) -> Option<SessionBlock> {
        active_block(&self.blocks.read()).cloned()
    }

    pub fn get_auto_token_limit(&self) -> Option<u64> {
        auto_token_limit(&self.blocks.read())
    }

    /// Drop all incremental state; the next load re-reads every file
    pub async fn clear_cache(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        *self.blocks.write() = Arc::new(Vec::new());
        debug!("Usage cache cleared");
        self.event_bus.publish(MonitorEvent::CacheCleared);
    }

    /// Fast phase: today's totals, active block, burn rate
    pub async fn load_today(&self, invalidate_cache: bool) -> Result<TodayResult, CoreError> {
        let mut state = self.state.lock().await;
        let mut report = LoadReport::new();
        let result = self
            .today_locked(&mut state, invalidate_cache, &mut report)
            .await;
        self.finish(&result, report);
        result
    }

    /// Slow phase: full aggregate, at most once per local day unless `force`
    pub async fn load_history(&self, force: bool) -> Result<Option<HistoryResult>, CoreError> {
        let mut state = self.state.lock().await;
        let mut report = LoadReport::new();
        let result = self.history_locked(&mut state, force, &mut report).await;
        match &result {
            // Skipped: no pass ran, keep the previous report
            Ok(None) => {}
            _ => self.finish(&result, report),
        }
        result
    }

    /// Today, then history; today's result is published before history starts
    pub async fn load_all(&self, invalidate_cache: bool) -> Result<LoadResult, CoreError> {
        let mut state = self.state.lock().await;
        let mut report = LoadReport::new();

        let today = self
            .today_locked(&mut state, invalidate_cache, &mut report)
            .await;
        let today = match today {
            Ok(today) => today,
            Err(e) => {
                self.publish_failure(&e);
                return Err(e);
            }
        };

        let history = self
            .history_locked(&mut state, invalidate_cache, &mut report)
            .await;
        // Today's pass ran either way
        *self.last_report.lock() = report;
        if let Err(e) = &history {
            self.publish_failure(e);
        }

        Ok(LoadResult {
            today,
            history: history?,
        })
    }

    /// Publish a failure, or keep the report of a pass that ran
    fn finish<T>(&self, result: &Result<T, CoreError>, report: LoadReport) {
        match result {
            Ok(_) => *self.last_report.lock() = report,
            Err(e) => self.publish_failure(e),
        }
    }

    fn publish_failure(&self, error: &CoreError) {
        warn!(error = %error, "Usage load failed");
        self.event_bus
            .publish(MonitorEvent::LoadFailed(error.to_string()));
    }

    async fn today_locked(
        &self,
        state: &mut MonitorState,
        invalidate_cache: bool,
        report: &mut LoadReport,
    ) -> Result<TodayResult, CoreError> {
        let started = Instant::now();
        let pass = self.ingest(state, invalidate_cache).await?;
        let (files_read, records_added) = (pass.files_read, pass.records_added);
        report.merge(pass);

        let date = self.clock.today();
        let now = self.clock.now();
        let window = self.config.window;
        let day_records = Arc::clone(&state.records);
        let block_records = Arc::clone(&state.records);

        let (day, blocks) = tokio::join!(
            tokio::task::spawn_blocking(move || aggregate_day(&day_records, date)),
            tokio::task::spawn_blocking(move || build_blocks(&block_records, window, now)),
        );
        let day = day.map_err(|source| CoreError::TaskFailed {
            phase: "today aggregate",
            source,
        })?;
        let blocks = blocks.map_err(|source| CoreError::TaskFailed {
            phase: "session blocks",
            source,
        })?;

        let active = active_block(&blocks).cloned();
        let result = TodayResult {
            date,
            tokens: day.tokens,
            cost: day.cost,
            record_count: day.record_count,
            by_model: day.by_model,
            burn_rate: active.as_ref().map(|b| b.burn_rate),
            active_block: active,
            auto_token_limit: auto_token_limit(&blocks),
        };
        *self.blocks.write() = Arc::new(blocks);

        info!(
            date = %date,
            records = result.record_count,
            files_read,
            records_added,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Today load complete"
        );

        self.event_bus
            .publish(MonitorEvent::TodayLoaded(Arc::new(result.clone())));
        Ok(result)
    }

    async fn history_locked(
        &self,
        state: &mut MonitorState,
        force: bool,
        report: &mut LoadReport,
    ) -> Result<Option<HistoryResult>, CoreError> {
        let date = self.clock.today();
        if !force && state.last_history_date == Some(date) {
            debug!(date = %date, "History already loaded today, skipping");
            self.event_bus.publish(MonitorEvent::HistorySkipped);
            return Ok(None);
        }

        let started = Instant::now();
        report.merge(self.ingest(state, false).await?);

        let now = self.clock.now();
        let window = self.config.window;
        let records = Arc::clone(&state.records);

        let history = tokio::task::spawn_blocking(move || {
            let blocks = build_blocks(&records, window, now);
            aggregate_history(&records, blocks)
        })
        .await
        .map_err(|source| CoreError::TaskFailed {
            phase: "history aggregate",
            source,
        })?;

        *self.blocks.write() = Arc::new(history.blocks.clone());
        state.last_history_date = Some(date);

        info!(
            records = history.record_count,
            days = history.daily.len(),
            blocks = history.blocks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "History load complete"
        );

        self.event_bus
            .publish(MonitorEvent::HistoryLoaded(Arc::new(history.clone())));
        Ok(Some(history))
    }

    /// Read every changed file into `state`
    ///
    /// Roots are resolved before anything is touched: when none is readable
    /// the call fails and the prior state (including a requested
    /// invalidation) is left as it was.
    async fn ingest(
        &self,
        state: &mut MonitorState,
        invalidate_cache: bool,
    ) -> Result<LoadReport, CoreError> {
        let roots = resolve_roots(&self.config);
        if roots.is_empty() {
            return Err(CoreError::NoDataRoots {
                searched: candidate_roots(&self.config),
            });
        }

        if invalidate_cache {
            debug!("Invalidating usage cache before load");
            state.clear();
        }

        let files = discover_files(&roots);
        state.tracker.forget_missing(&files);
        let changed = state.tracker.changed_files(&files).await;

        let mut report = LoadReport::new();
        report.files_discovered = files.len();
        self.read_changed(state, changed, &mut report).await;

        debug!(
            files = report.files_discovered,
            read = report.files_read,
            failed = report.files_failed,
            added = report.records_added,
            duplicates = report.duplicates_skipped,
            "Ingestion pass complete"
        );

        Ok(report)
    }

    /// Read and parse each changed file, skipping the ones that fail
    async fn read_changed(
        &self,
        state: &mut MonitorState,
        changed: Vec<(PathBuf, SystemTime)>,
        report: &mut LoadReport,
    ) {
        let mut added: Vec<UsageRecord> = Vec::new();

        for (path, mtime) in changed {
            // Watermark first: a file that fails here waits for its next write
            state.tracker.mark(&path, mtime);

            let read = with_backoff(&self.config.retry, || tokio::fs::read(&path)).await;
            let bytes = match read {
                Ok(bytes) => bytes,
                Err(e) => {
                    let error = CoreError::from_io(&path, e);
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to read usage log, skipping"
                    );
                    let source = path.display().to_string();
                    report.files_failed += 1;
                    // A file removed since discovery is routine; anything else is not
                    report.add_error(match error {
                        CoreError::FileNotFound { .. } => {
                            LoadError::warning(source, error.to_string())
                        }
                        _ => LoadError::error(source, error.to_string()),
                    });
                    continue;
                }
            };

            let content = String::from_utf8_lossy(&bytes);
            let project = project_from_path(&path);
            let parsed = parse_content(&content, &project, &path, &mut state.dedup);

            report.files_read += 1;
            report.records_added += parsed.records.len();
            report.duplicates_skipped += parsed.duplicates;
            added.extend(parsed.records);
        }

        if !added.is_empty() {
            Arc::make_mut(&mut state.records).extend(added);
        }
    }
}
