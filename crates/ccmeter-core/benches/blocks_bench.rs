//! Benchmarks for the hot paths of a refresh
//!
//! - build_blocks(10k records) → full rebuild on every today load
//! - parse_content(10k lines) → first load of a large log
//! - aggregate_history(10k records)

use ccmeter_core::aggregate::aggregate_history;
use ccmeter_core::blocks::build_blocks;
use ccmeter_core::dedup::DedupFilter;
use ccmeter_core::parsers::parse_content;
use ccmeter_types::{TokenCounts, UsageRecord};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::{Path, PathBuf};

/// Generate records spread over `days`, a few minutes apart with idle gaps
fn generate_records(count: usize, days: i64) -> Vec<UsageRecord> {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let span_minutes = days * 24 * 60;
    (0..count)
        .map(|i| {
            let offset = (i as i64 * 7919) % span_minutes;
            UsageRecord {
                timestamp: start + Duration::minutes(offset),
                model: if i % 3 == 0 {
                    "claude-opus-4-5-20251101".to_string()
                } else {
                    "claude-sonnet-4-5-20250929".to_string()
                },
                tokens: TokenCounts::new(1_000 + i as u64, 500, 200, 5_000),
                cost: 0.01,
                project: format!("project-{}", i % 10),
                session_id: Some(format!("session-{}", i % 50)),
                usage_limit_reset: None,
                source: PathBuf::from(format!("/bench/project-{}/s.jsonl", i % 10)),
            }
        })
        .collect()
}

fn generate_log(lines: usize) -> String {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    (0..lines)
        .map(|i| {
            format!(
                r#"{{"timestamp":"{}","sessionId":"s","requestId":"req_{i}","message":{{"id":"msg_{i}","model":"claude-sonnet-4-5-20250929","usage":{{"input_tokens":{},"output_tokens":200}}}}}}"#,
                (start + Duration::seconds(i as i64 * 30)).to_rfc3339(),
                100 + i
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn blocks_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_blocks");
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

    for count in [100, 1_000, 10_000] {
        let records = generate_records(count, 30);
        group.bench_with_input(BenchmarkId::new("records", count), &records, |b, records| {
            b.iter(|| black_box(build_blocks(records, Duration::hours(5), now)));
        });
    }

    group.finish();
}

fn parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_content");

    for lines in [1_000, 10_000] {
        let content = generate_log(lines);
        group.bench_with_input(BenchmarkId::new("lines", lines), &content, |b, content| {
            b.iter(|| {
                let mut dedup = DedupFilter::new();
                black_box(parse_content(
                    content,
                    "bench",
                    Path::new("/bench/s.jsonl"),
                    &mut dedup,
                ))
            });
        });
    }

    group.finish();
}

fn history_benchmark(c: &mut Criterion) {
    let records = generate_records(10_000, 90);
    let now = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

    c.bench_function("aggregate_history_10k", |b| {
        b.iter(|| {
            let blocks = build_blocks(&records, Duration::hours(5), now);
            black_box(aggregate_history(&records, blocks))
        });
    });
}

criterion_group!(benches, blocks_benchmark, parse_benchmark, history_benchmark);
criterion_main!(benches);
