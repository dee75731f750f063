use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a refresh was requested.
///
/// Each reason carries its own cache policy: reasons that may have crossed
/// a calendar day (or were requested explicitly) drop the incremental
/// ingestion state before the next load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshReason {
    /// A watched log file was created or modified
    FileChange,
    /// Periodic fallback timer
    Timer,
    /// System resumed from sleep
    Wake { crossed_day: bool },
    /// Local calendar date rolled over
    DayChange,
    /// Explicit user request
    Manual,
}

impl RefreshReason {
    pub fn should_invalidate_cache(&self) -> bool {
        match self {
            RefreshReason::FileChange | RefreshReason::Timer => false,
            RefreshReason::Wake { crossed_day } => *crossed_day,
            RefreshReason::DayChange | RefreshReason::Manual => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshReason::FileChange => "file-change",
            RefreshReason::Timer => "timer",
            RefreshReason::Wake { .. } => "wake",
            RefreshReason::DayChange => "day-change",
            RefreshReason::Manual => "manual",
        }
    }
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshReason::Wake { crossed_day: true } => write!(f, "wake (new day)"),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_policy() {
        assert!(!RefreshReason::FileChange.should_invalidate_cache());
        assert!(!RefreshReason::Timer.should_invalidate_cache());
        assert!(!RefreshReason::Wake { crossed_day: false }.should_invalidate_cache());
        assert!(RefreshReason::Wake { crossed_day: true }.should_invalidate_cache());
        assert!(RefreshReason::DayChange.should_invalidate_cache());
        assert!(RefreshReason::Manual.should_invalidate_cache());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_string(&RefreshReason::Wake { crossed_day: true }).unwrap();
        assert_eq!(json, r#"{"kind":"wake","crossed_day":true}"#);
    }
}
