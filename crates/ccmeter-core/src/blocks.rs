//! Session window builder
//!
//! Groups usage records into fixed-length windows anchored to the hour the
//! first record of each window falls in:
//!
//! ```text
//!  09:00 (floored)  09:12 ... 11:47                14:00 = start + 5h
//!  |------------ records ---|......................|
//!                           actual_end
//! ```
//!
//! A record opens a new block when it falls more than one window after the
//! current block's start, or more than one window after the previous record.
//! Both comparisons are strict, so a record exactly one window later stays in
//! the current block.
//!
//! The builder is stateless: every call rebuilds the full list from the
//! records it is given.

use crate::estimator;
use ccmeter_types::{SessionBlock, TokenCounts, UsageRecord};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::BTreeSet;
use tracing::debug;

/// Floor a timestamp to the top of its UTC hour
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// Build session blocks from `records` (any order)
///
/// Records are sorted by timestamp; equal timestamps keep their input order.
/// Every record lands in exactly one block.
pub fn build_blocks(
    records: &[UsageRecord],
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<SessionBlock> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&UsageRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut blocks = Vec::new();
    let mut current: Vec<UsageRecord> = Vec::new();
    let mut current_start = floor_to_hour(sorted[0].timestamp);

    for record in sorted {
        if let Some(last) = current.last() {
            let past_window = record.timestamp - current_start > window;
            let idle_gap = record.timestamp - last.timestamp > window;

            if past_window || idle_gap {
                let finished = std::mem::take(&mut current);
                blocks.push(finalize(current_start, finished, window, now));
                current_start = floor_to_hour(record.timestamp);
            }
        } else {
            current_start = floor_to_hour(record.timestamp);
        }
        current.push(record.clone());
    }

    if !current.is_empty() {
        blocks.push(finalize(current_start, current, window, now));
    }

    debug!(
        records = records.len(),
        blocks = blocks.len(),
        "Built session blocks"
    );
    blocks
}

fn finalize(
    start_time: DateTime<Utc>,
    records: Vec<UsageRecord>,
    window: Duration,
    now: DateTime<Utc>,
) -> SessionBlock {
    let end_time = start_time + window;
    let actual_end_time = records.last().map(|r| r.timestamp);

    let reference = actual_end_time.unwrap_or(now);
    let is_active = now - reference < window && now < end_time;

    let token_counts: TokenCounts = records.iter().map(|r| &r.tokens).sum();
    let cost: f64 = records.iter().map(|r| r.cost).sum();
    let models: BTreeSet<&str> = records.iter().map(|r| r.model.as_str()).collect();
    let usage_limit_reset = records.iter().rev().find_map(|r| r.usage_limit_reset);

    let total_tokens = token_counts.total();
    let burn_rate = estimator::burn_rate(total_tokens, cost, start_time, reference);
    let projected_usage = estimator::project(total_tokens, cost, &burn_rate, end_time, reference);

    SessionBlock {
        id: start_time.to_rfc3339(),
        start_time,
        end_time,
        actual_end_time,
        is_active,
        is_gap: false,
        models: models.into_iter().map(str::to_string).collect(),
        records,
        token_counts,
        cost,
        usage_limit_reset,
        burn_rate,
        projected_usage,
    }
}

/// The most recent active block, if any
pub fn active_block(blocks: &[SessionBlock]) -> Option<&SessionBlock> {
    blocks.iter().rev().find(|b| b.is_active)
}

/// Largest token total among completed blocks
///
/// Used as an automatic plan limit when none is configured.
pub fn auto_token_limit(blocks: &[SessionBlock]) -> Option<u64> {
    blocks
        .iter()
        .filter(|b| b.is_completed())
        .map(|b| b.total_tokens())
        .max()
}
