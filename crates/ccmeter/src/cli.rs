//! Output formatting for CLI commands
//!
//! Every formatter returns a `String`; `json` switches to pretty-printed
//! serde output of the engine's types.

use ccmeter_types::{HistoryResult, SessionBlock, TodayResult};
use chrono::Local;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde::Serialize;
use std::path::PathBuf;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

// ============================================================================
// Today
// ============================================================================

pub fn format_today(today: &TodayResult, json: bool, no_color: bool) -> String {
    if json {
        return to_json(today);
    }

    let mut out = String::new();
    out.push_str(&format!("ccmeter - {}\n", today.date));
    out.push_str(&format!(
        "Tokens: {}  Cost: {}  Requests: {}\n",
        format_tokens(today.tokens.total()),
        format_cost(today.cost),
        today.record_count
    ));

    match &today.active_block {
        Some(block) => {
            out.push('\n');
            out.push_str(&format_active_block(block, today.auto_token_limit));
        }
        None => out.push_str("\nNo active session block.\n"),
    }

    if !today.by_model.is_empty() {
        let mut table = new_table(&["Model", "Requests", "Tokens", "Cost"], no_color);
        for model in &today.by_model {
            table.add_row(Row::from(vec![
                model.model.clone(),
                model.records.to_string(),
                format_tokens(model.tokens.total()),
                format_cost(model.cost),
            ]));
        }
        out.push('\n');
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out
}

fn format_active_block(block: &SessionBlock, limit: Option<u64>) -> String {
    let mut out = format!(
        "Active block: {} (local ends {})\n",
        block.label(),
        block.end_time.with_timezone(&Local).format("%H:%M")
    );
    out.push_str(&format!(
        "  Used:       {} tokens, {}\n",
        format_tokens(block.total_tokens()),
        format_cost(block.cost)
    ));
    out.push_str(&format!(
        "  Burn rate:  {} tokens/min, {}/h\n",
        format_tokens(block.burn_rate.tokens_per_minute as u64),
        format_cost(block.burn_rate.cost_per_hour)
    ));
    out.push_str(&format!(
        "  Projected:  {} tokens, {} ({} left)\n",
        format_tokens(block.projected_usage.total_tokens.max(0.0) as u64),
        format_cost(block.projected_usage.total_cost),
        format_minutes(block.projected_usage.remaining_minutes)
    ));
    if let Some(limit) = limit {
        let pct = if limit > 0 {
            block.total_tokens() as f64 / limit as f64 * 100.0
        } else {
            0.0
        };
        out.push_str(&format!(
            "  Limit:      {} (auto, {:.0}% used)\n",
            format_tokens(limit),
            pct
        ));
    }
    if let Some(reset) = block.usage_limit_reset {
        out.push_str(&format!(
            "  Limit resets at {}\n",
            reset.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    out
}

// ============================================================================
// History
// ============================================================================

pub fn format_history(history: &HistoryResult, json: bool, no_color: bool) -> String {
    if json {
        return to_json(history);
    }

    if history.record_count == 0 {
        return "No usage recorded.".to_string();
    }

    let mut daily = new_table(&["Date", "Requests", "Tokens", "Cost", "Models"], no_color);
    for day in &history.daily {
        daily.add_row(Row::from(vec![
            day.date.to_string(),
            day.records.to_string(),
            format_tokens(day.tokens.total()),
            format_cost(day.cost),
            day.models.join(", "),
        ]));
    }

    let mut models = new_table(&["Model", "Requests", "Tokens", "Cost"], no_color);
    for model in &history.by_model {
        models.add_row(Row::from(vec![
            model.model.clone(),
            model.records.to_string(),
            format_tokens(model.tokens.total()),
            format_cost(model.cost),
        ]));
    }

    let mut projects = new_table(&["Project", "Requests", "Tokens", "Cost"], no_color);
    for project in &history.by_project {
        projects.add_row(Row::from(vec![
            project.project.clone(),
            project.records.to_string(),
            format_tokens(project.tokens.total()),
            format_cost(project.cost),
        ]));
    }

    format!(
        "Total: {} tokens, {} over {} requests\n\n{}\n\n{}\n\n{}\n",
        format_tokens(history.tokens.total()),
        format_cost(history.cost),
        history.record_count,
        daily,
        models,
        projects
    )
}

// ============================================================================
// Blocks
// ============================================================================

pub fn format_blocks(blocks: &[SessionBlock], json: bool, no_color: bool) -> String {
    if json {
        return to_json(blocks);
    }

    if blocks.is_empty() {
        return "No session blocks found.".to_string();
    }

    let mut table = new_table(
        &["Window (UTC)", "Status", "Requests", "Tokens", "Cost", "Burn/min", "Projected"],
        no_color,
    );
    for block in blocks {
        let status = if block.is_active {
            if no_color {
                Cell::new("ACTIVE")
            } else {
                Cell::new("ACTIVE").fg(Color::Green)
            }
        } else {
            Cell::new("done")
        };
        table.add_row(vec![
            Cell::new(block.label()),
            status,
            Cell::new(block.record_count()),
            Cell::new(format_tokens(block.total_tokens())),
            Cell::new(format_cost(block.cost)),
            Cell::new(format_tokens(block.burn_rate.tokens_per_minute as u64)),
            Cell::new(format_tokens(block.projected_usage.total_tokens.max(0.0) as u64)),
        ]);
    }
    table.to_string()
}

// ============================================================================
// Watch / paths
// ============================================================================

/// One-line summary printed after every refresh
pub fn format_watch_line(today: &TodayResult) -> String {
    let now = Local::now().format("%H:%M:%S");
    match &today.active_block {
        Some(block) => format!(
            "[{}] today {} / {} | block {} / {} | {} tok/min | {} left",
            now,
            format_tokens(today.tokens.total()),
            format_cost(today.cost),
            format_tokens(block.total_tokens()),
            format_cost(block.cost),
            format_tokens(block.burn_rate.tokens_per_minute as u64),
            format_minutes(block.projected_usage.remaining_minutes)
        ),
        None => format!(
            "[{}] today {} / {} | no active block",
            now,
            format_tokens(today.tokens.total()),
            format_cost(today.cost)
        ),
    }
}

/// Status of a candidate data root
#[derive(Debug, Serialize)]
pub struct RootStatus {
    pub path: PathBuf,
    pub has_projects: bool,
    pub files: usize,
}

pub fn format_paths(roots: &[RootStatus], json: bool, no_color: bool) -> String {
    if json {
        return to_json(roots);
    }

    let mut table = new_table(&["Root", "projects/", "Log files"], no_color);
    for root in roots {
        table.add_row(Row::from(vec![
            root.path.display().to_string(),
            if root.has_projects { "yes" } else { "no" }.to_string(),
            root.files.to_string(),
        ]));
    }
    table.to_string()
}

// ============================================================================
// Helpers
// ============================================================================

fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

fn format_cost(cost: f64) -> String {
    format!("${:.2}", cost)
}

fn format_minutes(minutes: f64) -> String {
    if minutes <= 0.0 {
        return "0m".to_string();
    }
    let total = minutes.round() as u64;
    if total >= 60 {
        format!("{}h{:02}m", total / 60, total % 60)
    } else {
        format!("{}m", total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccmeter_types::{BurnRate, ProjectedUsage, TokenCounts};
    use chrono::{Duration, TimeZone, Utc};

    fn block(active: bool) -> SessionBlock {
        let start = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();
        SessionBlock {
            id: start.to_rfc3339(),
            start_time: start,
            end_time: start + Duration::hours(5),
            actual_end_time: Some(start + Duration::minutes(30)),
            is_active: active,
            is_gap: false,
            records: Vec::new(),
            token_counts: TokenCounts::new(12_000, 3_000, 0, 0),
            cost: 1.5,
            models: vec!["claude-sonnet-4".to_string()],
            usage_limit_reset: None,
            burn_rate: BurnRate {
                tokens_per_minute: 500.0,
                cost_per_hour: 3.0,
            },
            projected_usage: ProjectedUsage {
                total_tokens: 150_000.0,
                total_cost: 15.0,
                remaining_minutes: 270.0,
            },
        }
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(2_500_000), "2.5M");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(-5.0), "0m");
        assert_eq!(format_minutes(45.2), "45m");
        assert_eq!(format_minutes(270.0), "4h30m");
    }

    #[test]
    fn test_format_blocks_table_and_json() {
        let blocks = vec![block(false), block(true)];

        let table = format_blocks(&blocks, false, true);
        assert!(table.contains("ACTIVE"));
        assert!(table.contains("2026-02-02 09:00-14:00"));
        assert!(table.contains("15.0K"));

        let json = format_blocks(&blocks, true, true);
        let parsed: Vec<SessionBlock> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_format_blocks_empty() {
        assert_eq!(format_blocks(&[], false, true), "No session blocks found.");
    }

    #[test]
    fn test_format_active_block_with_limit() {
        let out = format_active_block(&block(true), Some(30_000));
        assert!(out.contains("50% used"));
        assert!(out.contains("500 tokens/min"));
        assert!(out.contains("4h30m left"));
    }
}
