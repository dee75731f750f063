//! Burn rate and end-of-window projection
//!
//! Both functions are pure and total: zero or negative elapsed time yields a
//! zero rate instead of NaN or infinity.

use ccmeter_types::{BurnRate, ProjectedUsage};
use chrono::{DateTime, Utc};

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Consumption rate between `start` and `reference`
///
/// `reference` is the block's last record time, or now when it has none.
/// Tokens per minute are floored to whole tokens.
pub fn burn_rate(
    total_tokens: u64,
    cost: f64,
    start: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> BurnRate {
    let elapsed = minutes_between(start, reference);
    if elapsed <= 0.0 {
        return BurnRate::zero();
    }

    BurnRate {
        tokens_per_minute: (total_tokens as f64 / elapsed).floor(),
        cost_per_hour: cost / elapsed * 60.0,
    }
}

/// Extrapolate current totals to `end_time` at `rate`
///
/// Remaining time is not clamped: once the window has elapsed it goes
/// negative and the projection falls below the current totals.
pub fn project(
    total_tokens: u64,
    cost: f64,
    rate: &BurnRate,
    end_time: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> ProjectedUsage {
    let remaining_minutes = minutes_between(reference, end_time);

    ProjectedUsage {
        total_tokens: total_tokens as f64 + rate.tokens_per_minute * remaining_minutes,
        total_cost: cost + rate.cost_per_hour * remaining_minutes / 60.0,
        remaining_minutes,
    }
}
