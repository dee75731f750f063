//! Properties of the session window builder

use ccmeter_core::blocks::{active_block, auto_token_limit, build_blocks, floor_to_hour};
use ccmeter_types::{BurnRate, TokenCounts, UsageRecord};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

fn window() -> Duration {
    Duration::hours(5)
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()
}

fn record(ts: DateTime<Utc>, input: u64, session: &str) -> UsageRecord {
    UsageRecord {
        timestamp: ts,
        model: "claude-sonnet-4".to_string(),
        tokens: TokenCounts::new(input, 0, 0, 0),
        cost: input as f64 * 0.000_003,
        project: "demo".to_string(),
        session_id: Some(session.to_string()),
        usage_limit_reset: None,
        source: PathBuf::from("/logs/demo.jsonl"),
    }
}

/// Deterministic pseudo-random offsets (minutes) across a few days
fn scattered_records(count: usize) -> Vec<UsageRecord> {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    (0..count)
        .map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let minutes = (state >> 33) % (4 * 24 * 60);
            record(
                base() + Duration::minutes(minutes as i64),
                100 + i as u64,
                &format!("s-{i}"),
            )
        })
        .collect()
}

#[test]
fn test_every_record_in_exactly_one_block() {
    let records = scattered_records(500);
    let blocks = build_blocks(&records, window(), base() + Duration::days(10));

    let total: usize = blocks.iter().map(|b| b.record_count()).sum();
    assert_eq!(total, records.len());

    let ids: HashSet<_> = blocks
        .iter()
        .flat_map(|b| b.records.iter())
        .map(|r| r.session_id.clone())
        .collect();
    assert_eq!(ids.len(), records.len());
}

#[test]
fn test_blocks_and_records_are_ordered() {
    let records = scattered_records(300);
    let blocks = build_blocks(&records, window(), base() + Duration::days(10));

    for block in &blocks {
        assert!(block.records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(block.start_time, floor_to_hour(block.records[0].timestamp));
        assert_eq!(block.end_time, block.start_time + window());
        assert!(block.actual_end_time.unwrap() <= block.end_time);
    }
    for pair in blocks.windows(2) {
        assert!(pair[0].actual_end_time.unwrap() < pair[1].records[0].timestamp);
        assert!(pair[0].start_time < pair[1].start_time);
    }
}

#[test]
fn test_build_is_deterministic() {
    let records = scattered_records(200);
    let mut reversed = records.clone();
    reversed.reverse();
    let now = base() + Duration::days(10);

    assert_eq!(
        build_blocks(&records, window(), now),
        build_blocks(&records, window(), now)
    );

    let a = build_blocks(&records, window(), now);
    let b = build_blocks(&reversed, window(), now);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.start_time, y.start_time);
        assert_eq!(x.token_counts, y.token_counts);
    }
}

#[test]
fn test_documented_example_splits_into_two_blocks() {
    let day = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    let records = vec![
        record(day, 10, "a"),
        record(day + Duration::minutes(30), 10, "b"),
        record(day + Duration::minutes(310), 10, "c"),
    ];

    let blocks = build_blocks(&records, window(), day + Duration::days(1));

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].start_time, day);
    assert_eq!(blocks[0].end_time, day + Duration::hours(5));
    assert_eq!(blocks[0].record_count(), 2);
    assert_eq!(blocks[1].start_time, day + Duration::hours(5));
    assert_eq!(blocks[1].end_time, day + Duration::hours(10));
}

#[test]
fn test_record_exactly_one_window_later_stays() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    let records = vec![record(start, 10, "a"), record(start + window(), 10, "b")];

    let blocks = build_blocks(&records, window(), start + Duration::days(1));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].actual_end_time, Some(blocks[0].end_time));
}

#[test]
fn test_idle_gap_opens_new_block() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 9, 20, 0).unwrap();
    let records = vec![
        record(start, 10, "a"),
        record(start + Duration::hours(5) + Duration::minutes(1), 10, "b"),
    ];

    let blocks = build_blocks(&records, window(), start + Duration::days(1));
    assert_eq!(blocks.len(), 2);
    assert_eq!(
        blocks[1].start_time,
        Utc.with_ymd_and_hms(2026, 1, 10, 14, 0, 0).unwrap()
    );
}

#[test]
fn test_active_needs_both_conditions() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    let records = vec![record(start + Duration::minutes(290), 10, "a")];

    // Last record 10 minutes ago, but the window closed at 14:00
    let now = start + Duration::minutes(300);
    let blocks = build_blocks(&records, window(), now);
    assert!(!blocks[0].is_active);
    assert!(active_block(&blocks).is_none());

    // One minute earlier the window is still open
    let blocks = build_blocks(&records, window(), now - Duration::minutes(1));
    assert!(blocks[0].is_active);
}

#[test]
fn test_zero_elapsed_burn_rate_is_zero() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    let blocks = build_blocks(&[record(start, 5_000, "a")], window(), start);

    let block = &blocks[0];
    assert_eq!(block.burn_rate, BurnRate::zero());
    assert!(block.burn_rate.tokens_per_minute.is_finite());
    assert_eq!(block.projected_usage.total_tokens, 5_000.0);
    assert_eq!(block.projected_usage.remaining_minutes, 300.0);
}

#[test]
fn test_projection_uses_last_record_time() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
    let records = vec![
        record(start, 3_000, "a"),
        record(start + Duration::minutes(60), 3_000, "b"),
    ];

    let blocks = build_blocks(&records, window(), start + Duration::minutes(90));
    let block = &blocks[0];

    assert_eq!(block.burn_rate.tokens_per_minute, 100.0);
    assert_eq!(block.projected_usage.remaining_minutes, 240.0);
    assert_eq!(block.projected_usage.total_tokens, 6_000.0 + 100.0 * 240.0);
}

#[test]
fn test_auto_limit_uses_completed_blocks_only() {
    let now = base() + Duration::days(3);
    let records = vec![
        record(base(), 1_000, "a"),
        record(base() + Duration::days(1), 7_000, "b"),
        record(now - Duration::minutes(5), 50_000, "c"),
    ];

    let blocks = build_blocks(&records, window(), now);
    assert_eq!(blocks.len(), 3);
    assert!(blocks[2].is_active);
    assert_eq!(auto_token_limit(&blocks), Some(7_000));

    assert_eq!(auto_token_limit(&[]), None);
}
