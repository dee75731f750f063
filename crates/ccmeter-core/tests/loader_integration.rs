//! Integration tests for the two-phase loader against on-disk fixtures

use ccmeter_core::clock::local_date;
use ccmeter_core::{Clock, CoreError, FixedClock, MonitorConfig, MonitorEvent, UsageMonitor};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap()
}

fn line(ts: DateTime<Utc>, input: u64, output: u64, id: &str) -> String {
    format!(
        r#"{{"type":"assistant","timestamp":"{}","sessionId":"s-1","requestId":"req_{id}","message":{{"id":"msg_{id}","model":"claude-sonnet-4-5-20250929","usage":{{"input_tokens":{input},"output_tokens":{output},"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}}}}"#,
        ts.to_rfc3339()
    )
}

struct Fixture {
    dir: TempDir,
    clock: Arc<FixedClock>,
    monitor: UsageMonitor,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("projects")).unwrap();
        let clock = Arc::new(FixedClock::new(now()));
        let monitor = UsageMonitor::with_clock(
            MonitorConfig::with_roots(vec![dir.path().to_path_buf()]),
            clock.clone(),
        )
        .unwrap();
        Self {
            dir,
            clock,
            monitor,
        }
    }

    fn log_path(&self, project: &str, file: &str) -> PathBuf {
        self.dir.path().join("projects").join(project).join(file)
    }

    fn write_log(&self, project: &str, file: &str, lines: &[String]) -> PathBuf {
        let path = self.log_path(project, file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }
}

/// Append lines and push the mtime forward so the tracker sees the write
fn append(path: &Path, lines: &[String]) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    for l in lines {
        writeln!(file, "{l}").unwrap();
    }
    file.set_modified(SystemTime::now() + std::time::Duration::from_secs(60))
        .unwrap();
}

fn standard_logs(fx: &Fixture) -> PathBuf {
    // Yesterday's completed block, then an active block this morning
    fx.write_log(
        "alpha",
        "session.jsonl",
        &[
            line(now() - Duration::hours(28), 1_000, 500, "a1"),
            line(now() - Duration::hours(27), 2_000, 500, "a2"),
            line(now() - Duration::minutes(50), 300, 100, "a3"),
            line(now() - Duration::minutes(20), 100, 100, "a4"),
        ],
    )
}

#[tokio::test]
async fn test_today_aggregates_and_active_block() {
    let fx = Fixture::new();
    standard_logs(&fx);

    let today = fx.monitor.load_today(false).await.unwrap();

    let today_records = [
        now() - Duration::hours(28),
        now() - Duration::hours(27),
        now() - Duration::minutes(50),
        now() - Duration::minutes(20),
    ]
    .iter()
    .filter(|ts| local_date(**ts) == fx.clock.today())
    .count();
    assert_eq!(today.date, fx.clock.today());
    assert_eq!(today.record_count, today_records);

    let active = today.active_block.expect("active block");
    assert_eq!(active.record_count(), 2);
    assert_eq!(active.total_tokens(), 600);
    assert!(active.is_active);
    assert_eq!(today.burn_rate, Some(active.burn_rate));

    // Only yesterday's block is completed
    assert_eq!(today.auto_token_limit, Some(4_000));
    assert_eq!(fx.monitor.get_auto_token_limit(), Some(4_000));
    assert_eq!(
        fx.monitor.get_active_block().map(|b| b.start_time),
        Some(active.start_time)
    );
}

#[tokio::test]
async fn test_second_poll_without_writes_reads_nothing() {
    let fx = Fixture::new();
    standard_logs(&fx);

    fx.monitor.load_today(false).await.unwrap();
    assert_eq!(fx.monitor.last_report().files_read, 1);
    assert_eq!(fx.monitor.record_count().await, 4);

    fx.monitor.load_today(false).await.unwrap();
    let report = fx.monitor.last_report();
    assert_eq!(report.files_discovered, 1);
    assert_eq!(report.files_read, 0);
    assert_eq!(fx.monitor.record_count().await, 4);
}

#[tokio::test]
async fn test_rewritten_file_only_adds_new_lines() {
    let fx = Fixture::new();
    let path = standard_logs(&fx);
    fx.monitor.load_today(false).await.unwrap();

    append(&path, &[line(now() - Duration::minutes(5), 50, 50, "a5")]);
    fx.monitor.load_today(false).await.unwrap();

    let report = fx.monitor.last_report();
    assert_eq!(report.files_read, 1);
    assert_eq!(report.records_added, 1);
    assert_eq!(report.duplicates_skipped, 4);
    assert_eq!(fx.monitor.record_count().await, 5);
}

#[tokio::test]
async fn test_duplicates_across_files_count_once() {
    let fx = Fixture::new();
    let shared = line(now() - Duration::minutes(30), 100, 100, "dup");
    fx.write_log("alpha", "one.jsonl", &[shared.clone()]);
    fx.write_log("beta", "two.jsonl", &[shared]);

    let today = fx.monitor.load_today(false).await.unwrap();

    assert_eq!(fx.monitor.record_count().await, 1);
    assert_eq!(fx.monitor.last_report().duplicates_skipped, 1);
    assert!(today.record_count <= 1);
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let fx = Fixture::new();
    fx.write_log(
        "alpha",
        "session.jsonl",
        &[
            "{not json".to_string(),
            r#"{"type":"summary","summary":"x"}"#.to_string(),
            line(now() - Duration::minutes(10), 10, 10, "ok"),
        ],
    );

    fx.monitor.load_today(false).await.unwrap();

    assert_eq!(fx.monitor.record_count().await, 1);
    assert!(!fx.monitor.last_report().has_errors());
}

#[tokio::test]
async fn test_invalidation_rereads_without_double_counting() {
    let fx = Fixture::new();
    standard_logs(&fx);

    fx.monitor.load_today(false).await.unwrap();
    fx.monitor.load_today(true).await.unwrap();

    assert_eq!(fx.monitor.last_report().files_read, 1);
    assert_eq!(fx.monitor.record_count().await, 4);
}

#[tokio::test]
async fn test_history_runs_once_per_local_day() {
    let fx = Fixture::new();
    standard_logs(&fx);

    let first = fx.monitor.load_all(false).await.unwrap();
    let history = first.history.expect("first history load");
    assert_eq!(history.record_count, 4);
    assert_eq!(history.blocks.len(), 2);

    // Same day: skipped
    assert!(fx.monitor.load_history(false).await.unwrap().is_none());
    assert!(fx.monitor.load_all(false).await.unwrap().history.is_none());

    // Forced
    assert!(fx.monitor.load_history(true).await.unwrap().is_some());

    // Next day
    fx.clock.advance(Duration::days(1));
    assert!(fx.monitor.load_history(false).await.unwrap().is_some());
}

#[tokio::test]
async fn test_load_all_publishes_today_before_history() {
    let fx = Fixture::new();
    standard_logs(&fx);
    let mut events = fx.monitor.event_bus().subscribe();

    fx.monitor.load_all(false).await.unwrap();
    fx.monitor.load_all(false).await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), MonitorEvent::TodayLoaded(_)));
    assert!(matches!(events.recv().await.unwrap(), MonitorEvent::HistoryLoaded(_)));
    assert!(matches!(events.recv().await.unwrap(), MonitorEvent::TodayLoaded(_)));
    assert!(matches!(events.recv().await.unwrap(), MonitorEvent::HistorySkipped));
}

#[tokio::test]
async fn test_structural_failure_leaves_state_untouched() {
    let fx = Fixture::new();
    standard_logs(&fx);
    fx.monitor.load_all(false).await.unwrap();
    let blocks_before = fx.monitor.blocks();

    fs::remove_dir_all(fx.dir.path().join("projects")).unwrap();
    let err = fx.monitor.load_today(true).await.unwrap_err();

    assert!(matches!(err, CoreError::NoDataRoots { .. }));
    assert_eq!(fx.monitor.record_count().await, 4);
    assert_eq!(fx.monitor.blocks(), blocks_before);
    // The day's history is still marked as done
    assert!(fx.monitor.load_history(false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_cache_forces_full_reload() {
    let fx = Fixture::new();
    standard_logs(&fx);
    fx.monitor.load_all(false).await.unwrap();

    fx.monitor.clear_cache().await;
    assert_eq!(fx.monitor.record_count().await, 0);
    assert!(fx.monitor.get_active_block().is_none());

    let result = fx.monitor.load_all(false).await.unwrap();
    assert!(result.history.is_some());
    assert_eq!(fx.monitor.record_count().await, 4);
}
