//! Data root resolution and log file discovery
//!
//! Layout: `<root>/projects/<project>/<session>.jsonl` (subagent logs may sit
//! one or more directories deeper).

use crate::config::{MonitorConfig, CONFIG_DIR_ENV};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

const PROJECTS_DIR: &str = "projects";

/// Candidate roots in priority order, before existence filtering
///
/// Explicit config roots win; otherwise `CLAUDE_CONFIG_DIR` (comma-separated);
/// otherwise `~/.config/claude` and `~/.claude`.
pub fn candidate_roots(config: &MonitorConfig) -> Vec<PathBuf> {
    if !config.roots.is_empty() {
        return config.roots.clone();
    }

    if let Ok(value) = std::env::var(CONFIG_DIR_ENV) {
        let from_env = split_root_list(&value);
        if !from_env.is_empty() {
            return from_env;
        }
    }

    default_roots()
}

fn split_root_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        roots.push(config_dir.join("claude"));
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("claude");
        if !roots.contains(&xdg) {
            roots.push(xdg);
        }
        roots.push(home.join(".claude"));
    }
    roots
}

/// Resolve the data roots that actually contain a `projects/` directory
pub fn resolve_roots(config: &MonitorConfig) -> Vec<PathBuf> {
    let mut resolved: Vec<PathBuf> = Vec::new();
    for root in candidate_roots(config) {
        if !has_projects_dir(&root) {
            trace!(root = %root.display(), "Skipping root without projects directory");
            continue;
        }
        if !resolved.contains(&root) {
            resolved.push(root);
        }
    }
    debug!(count = resolved.len(), "Resolved data roots");
    resolved
}

pub fn has_projects_dir(root: &Path) -> bool {
    root.join(PROJECTS_DIR).is_dir()
}

/// Every `*.jsonl` file under each root's `projects/` tree, sorted
///
/// A missing or unreadable root contributes nothing.
pub fn discover_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        let projects_dir = root.join(PROJECTS_DIR);
        if !projects_dir.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&projects_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && is_jsonl(path) {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    debug!(count = files.len(), "Discovered usage log files");
    files
}

pub fn is_jsonl(path: &Path) -> bool {
    path.extension().map(|e| e == "jsonl").unwrap_or(false)
}

/// Project identifier: the directory directly under `projects/`
///
/// Format: `<root>/projects/-Users-foo-myproject/<session>.jsonl`
/// Returns: `-Users-foo-myproject`
pub fn project_from_path(path: &Path) -> String {
    let components: Vec<_> = path.components().collect();
    components
        .iter()
        .rposition(|c| c.as_os_str() == PROJECTS_DIR)
        // The file itself is not a project
        .filter(|idx| idx + 2 < components.len())
        .and_then(|idx| components[idx + 1].as_os_str().to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}
