//! Usage record parser
//!
//! Turns one JSONL line into a [`UsageRecord`]. Two shapes are accepted:
//!
//! - the flat form: `{"timestamp", "model", "input_tokens", ..., "cost", "session_id"}`
//! - the assistant's native form: `{"timestamp", "sessionId", "requestId", "costUSD",
//!   "message": {"id", "model", "usage": {...}}}`
//!
//! A line that cannot be turned into a record is expected input, not an
//! error: the parser returns `None` and ingestion of the file continues.

use super::timestamp::parse_timestamp_value;
use crate::dedup::DedupFilter;
use crate::pricing::calculate_cost;
use ccmeter_types::{TokenCounts, UsageRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::trace;

/// Marker the assistant writes into its synthetic "limit reached" message,
/// followed by `|<epoch seconds>`
const USAGE_LIMIT_MARKER: &str = "usage limit reached|";

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

impl RawUsage {
    fn is_present(&self) -> bool {
        self.input_tokens.is_some()
            || self.output_tokens.is_some()
            || self.cache_creation_input_tokens.is_some()
            || self.cache_read_input_tokens.is_some()
    }

    fn counts(&self) -> TokenCounts {
        TokenCounts::new(
            self.input_tokens.unwrap_or(0),
            self.output_tokens.unwrap_or(0),
            self.cache_creation_input_tokens.unwrap_or(0),
            self.cache_read_input_tokens.unwrap_or(0),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    model: Option<String>,

    // Flat token fields
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,

    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default)]
    message: Option<RawMessage>,

    #[serde(default, alias = "costUSD")]
    cost: Option<f64>,
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
    #[serde(default, alias = "requestId")]
    request_id: Option<String>,
    #[serde(default, alias = "usageLimitResetTime")]
    usage_limit_reset_time: Option<Value>,
}

impl RawLine {
    fn flat_usage(&self) -> RawUsage {
        RawUsage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_creation_input_tokens: self.cache_creation_input_tokens,
            cache_read_input_tokens: self.cache_read_input_tokens,
        }
    }

    /// Nested message usage wins over root usage, which wins over flat fields
    fn tokens(&self) -> Option<TokenCounts> {
        if let Some(usage) = self.message.as_ref().and_then(|m| m.usage.as_ref()) {
            return Some(usage.counts());
        }
        if let Some(usage) = self.usage.as_ref() {
            return Some(usage.counts());
        }
        let flat = self.flat_usage();
        flat.is_present().then(|| flat.counts())
    }

    fn model(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.model.as_deref())
            .or(self.model.as_deref())
            .filter(|m| !m.is_empty())
    }

    fn usage_limit_reset(&self) -> Option<DateTime<Utc>> {
        if let Some(ts) = self.usage_limit_reset_time.as_ref().and_then(parse_timestamp_value) {
            return Some(ts);
        }
        self.message
            .as_ref()
            .and_then(|m| m.content.as_ref())
            .and_then(limit_reset_from_content)
    }
}

/// Find `usage limit reached|<epoch>` in message content (string or text blocks)
fn limit_reset_from_content(content: &Value) -> Option<DateTime<Utc>> {
    match content {
        Value::String(text) => limit_reset_from_text(text),
        Value::Array(blocks) => blocks.iter().find_map(|block| {
            block
                .get("text")
                .and_then(Value::as_str)
                .and_then(limit_reset_from_text)
        }),
        _ => None,
    }
}

fn limit_reset_from_text(text: &str) -> Option<DateTime<Utc>> {
    // ASCII lowering keeps byte offsets aligned with `text`
    let lower = text.to_ascii_lowercase();
    let start = lower.find(USAGE_LIMIT_MARKER)? + USAGE_LIMIT_MARKER.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    parse_timestamp_value(&Value::String(digits))
}

/// A parsed line together with its dedup fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub record: UsageRecord,
    pub hash: String,
}

/// Parse one line without consulting dedup state
pub fn parse_entry(line: &str, project: &str, source: &Path) -> Option<ParsedEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let raw: RawLine = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            trace!(path = %source.display(), error = %e, "Skipping malformed JSONL line");
            return None;
        }
    };

    let Some(timestamp) = raw.timestamp.as_ref().and_then(parse_timestamp_value) else {
        trace!(path = %source.display(), "Skipping line without a usable timestamp");
        return None;
    };
    let model = raw.model()?.to_string();
    let tokens = raw.tokens()?;
    let usage_limit_reset = raw.usage_limit_reset();

    if tokens.is_zero() && usage_limit_reset.is_none() {
        return None;
    }

    let cost = match raw.cost {
        Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
        _ => calculate_cost(&model, &tokens),
    };

    let hash = content_hash(&raw, timestamp, &tokens);

    Some(ParsedEntry {
        record: UsageRecord {
            timestamp,
            model,
            tokens,
            cost,
            project: project.to_string(),
            session_id: raw.session_id.clone(),
            usage_limit_reset,
            source: source.to_path_buf(),
        },
        hash,
    })
}

/// Stable fingerprint of a line's content
///
/// Prefers the assistant's own message/request ids; falls back to
/// timestamp, session and token counts.
fn content_hash(raw: &RawLine, timestamp: DateTime<Utc>, tokens: &TokenCounts) -> String {
    let message_id = raw.message.as_ref().and_then(|m| m.id.as_deref());
    if let (Some(message_id), Some(request_id)) = (message_id, raw.request_id.as_deref()) {
        return format!("{}:{}", message_id, request_id);
    }

    format!(
        "{}|{}|{}|{}|{}|{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        raw.session_id.as_deref().unwrap_or(""),
        tokens.input,
        tokens.output,
        tokens.cache_write,
        tokens.cache_read
    )
}

/// Parse one line, rejecting it if its fingerprint was already ingested
///
/// On success the fingerprint is recorded in `dedup`.
pub fn parse_line(
    line: &str,
    project: &str,
    source: &Path,
    dedup: &mut DedupFilter,
) -> Option<UsageRecord> {
    let entry = parse_entry(line, project, source)?;
    if !dedup.insert(entry.hash) {
        trace!(path = %source.display(), "Skipping duplicate record");
        return None;
    }
    Some(entry.record)
}

/// Outcome of parsing a whole file's content
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub records: Vec<UsageRecord>,
    pub lines: usize,
    pub duplicates: usize,
}

/// Parse every line of `content`, skipping malformed lines and duplicates
pub fn parse_content(
    content: &str,
    project: &str,
    source: &Path,
    dedup: &mut DedupFilter,
) -> ParsedFile {
    let mut parsed = ParsedFile::default();

    for line in content.lines() {
        parsed.lines += 1;
        let Some(entry) = parse_entry(line, project, source) else {
            continue;
        };
        if dedup.insert(entry.hash) {
            parsed.records.push(entry.record);
        } else {
            parsed.duplicates += 1;
        }
    }

    parsed
}
