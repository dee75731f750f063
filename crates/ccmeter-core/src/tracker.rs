//! Per-file modification-time watermarks
//!
//! A file is re-read only when its mtime moved past the recorded watermark.
//! The watermark is recorded before the file is parsed, so a file that fails
//! to parse is not retried until it changes again (or the cache is cleared).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

#[derive(Debug, Default, Clone)]
pub struct FileTracker {
    last_modified: HashMap<PathBuf, SystemTime>,
}

impl FileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates whose mtime is newer than their watermark, or never seen
    ///
    /// Files whose metadata cannot be read are skipped for this poll.
    pub async fn changed_files(&self, candidates: &[PathBuf]) -> Vec<(PathBuf, SystemTime)> {
        let mut changed = Vec::new();

        for path in candidates {
            let mtime = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(e) => {
                    trace!(
                        path = %path.display(),
                        error = %e,
                        "Skipping file without readable metadata"
                    );
                    continue;
                }
            };

            if self.is_changed(path, mtime) {
                changed.push((path.clone(), mtime));
            }
        }

        changed
    }

    pub fn is_changed(&self, path: &Path, mtime: SystemTime) -> bool {
        match self.last_modified.get(path) {
            Some(seen) => mtime > *seen,
            None => true,
        }
    }

    pub fn mark(&mut self, path: impl Into<PathBuf>, mtime: SystemTime) {
        self.last_modified.insert(path.into(), mtime);
    }

    pub fn watermark(&self, path: &Path) -> Option<SystemTime> {
        self.last_modified.get(path).copied()
    }

    /// Drop watermarks for files that are no longer among `candidates`
    pub fn forget_missing(&mut self, candidates: &[PathBuf]) -> usize {
        let present: HashSet<&PathBuf> = candidates.iter().collect();
        let before = self.last_modified.len();
        self.last_modified.retain(|path, _| present.contains(path));
        before - self.last_modified.len()
    }

    pub fn clear(&mut self) {
        self.last_modified.clear();
    }

    pub fn len(&self) -> usize {
        self.last_modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_modified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unseen_files_are_changed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jsonl");
        fs::write(&file, "{}\n").unwrap();

        let tracker = FileTracker::new();
        let changed = tracker.changed_files(std::slice::from_ref(&file)).await;

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, file);
    }

    #[tokio::test]
    async fn test_second_poll_without_writes_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jsonl");
        fs::write(&file, "{}\n").unwrap();
        let candidates = vec![file];

        let mut tracker = FileTracker::new();
        for (path, mtime) in tracker.changed_files(&candidates).await {
            tracker.mark(path, mtime);
        }

        assert!(tracker.changed_files(&candidates).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_metadata_is_skipped() {
        let tracker = FileTracker::new();
        let changed = tracker
            .changed_files(&[PathBuf::from("/nonexistent/ccmeter/a.jsonl")])
            .await;
        assert!(changed.is_empty());
    }

    #[test]
    fn test_newer_mtime_is_changed() {
        let mut tracker = FileTracker::new();
        let path = PathBuf::from("/logs/a.jsonl");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        tracker.mark(&path, t0);

        assert!(!tracker.is_changed(&path, t0));
        assert!(!tracker.is_changed(&path, t0 - Duration::from_secs(1)));
        assert!(tracker.is_changed(&path, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_forget_missing_and_clear() {
        let mut tracker = FileTracker::new();
        let t0 = SystemTime::UNIX_EPOCH;
        tracker.mark("/logs/a.jsonl", t0);
        tracker.mark("/logs/b.jsonl", t0);

        let dropped = tracker.forget_missing(&[PathBuf::from("/logs/a.jsonl")]);
        assert_eq!(dropped, 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.watermark(Path::new("/logs/a.jsonl")).is_some());

        tracker.clear();
        assert!(tracker.is_empty());
    }
}
