//! Parsers for usage log lines

pub mod record;
pub mod timestamp;

pub use record::{parse_content, parse_entry, parse_line, ParsedEntry, ParsedFile};
pub use timestamp::{parse_timestamp_str, parse_timestamp_value};
