//! Content-hash deduplication across files and polls
//!
//! The same log line can show up twice: copied into a rotated file, or read
//! again after a file's mtime bumped. The filter keeps every hash seen for the
//! process lifetime (or until the cache is invalidated).

use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash`; returns `true` if it was not seen before
    pub fn insert(&mut self, hash: impl Into<String>) -> bool {
        self.seen.insert(hash.into())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
