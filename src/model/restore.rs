//! Workspace restore snapshots.
//!
//! A single JSON file records which workspace every window lived on, so
//! a crash or restart can put windows back. Windows are matched against
//! saved entries by app identity first, then exact title, then word-set
//! similarity; a stale file (older than 24 hours) is ignored wholesale.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::collections::HashSet;
use crate::common::config::WorkspaceNumber;

/// Snapshots older than this are discarded on load.
pub const MAX_SNAPSHOT_AGE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreEntry {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    pub workspace: WorkspaceNumber,
    pub monitor: u32,
    pub is_floating: bool,
    pub is_fullscreen: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreSnapshot {
    /// Unix seconds at capture time.
    pub timestamp: u64,
    /// Active workspace per monitor id.
    pub active_workspaces: Vec<(u32, WorkspaceNumber)>,
    pub entries: Vec<RestoreEntry>,
}

impl RestoreSnapshot {
    pub fn stamp_now(mut self) -> Self {
        self.timestamp = unix_now();
        self
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Serialize synchronously, write from a background thread. The
    /// caller stays on the main queue.
    pub fn save_in_background(self, path: PathBuf) {
        std::thread::spawn(move || {
            if let Err(e) = self.save(&path) {
                warn!(path = %path.display(), %e, "failed to write restore file");
            }
        });
    }

    /// Load a snapshot, returning an empty one when the file is missing,
    /// unreadable, or stale.
    pub fn load(path: &Path) -> RestoreSnapshot {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return RestoreSnapshot::default(),
        };
        let snapshot: RestoreSnapshot = match serde_json::from_str(&text) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %path.display(), %e, "restore file is corrupt, ignoring");
                return RestoreSnapshot::default();
            }
        };
        let age = unix_now().saturating_sub(snapshot.timestamp);
        if age > MAX_SNAPSHOT_AGE_SECS {
            debug!(age, "restore file is stale, ignoring");
            return RestoreSnapshot::default();
        }
        snapshot
    }

    /// Index of the saved entry for a live window.
    ///
    /// Candidates are filtered by app identity (name or bundle id).
    /// Among those, an exact title match wins, then the highest Jaccard
    /// word-set similarity; with no usable title the first app match is
    /// taken.
    fn match_index(
        &self,
        app_name: &str,
        bundle_id: Option<&str>,
        title: Option<&str>,
    ) -> Option<usize> {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.app_name.eq_ignore_ascii_case(app_name)
                    || (entry.bundle_id.is_some()
                        && entry.bundle_id.as_deref().map(str::to_lowercase)
                            == bundle_id.map(str::to_lowercase))
            })
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        if let Some(title) = title {
            if let Some(&exact) = candidates
                .iter()
                .find(|&&i| self.entries[i].window_title.as_deref() == Some(title))
            {
                return Some(exact);
            }
            let best = candidates
                .iter()
                .filter_map(|&i| {
                    self.entries[i]
                        .window_title
                        .as_deref()
                        .map(|saved| (jaccard_similarity(title, saved), i))
                })
                .filter(|(score, _)| *score > 0.0)
                .max_by(|(a, _), (b, _)| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                });
            if let Some((_, i)) = best {
                return Some(i);
            }
        }

        // App-only fallback.
        candidates.first().copied()
    }

    pub fn match_window(
        &self,
        app_name: &str,
        bundle_id: Option<&str>,
        title: Option<&str>,
    ) -> Option<&RestoreEntry> {
        self.match_index(app_name, bundle_id, title).map(|i| &self.entries[i])
    }

    /// Claim the matching entry so a second window of the same app does
    /// not reuse it.
    pub fn take_match(
        &mut self,
        app_name: &str,
        bundle_id: Option<&str>,
        title: Option<&str>,
    ) -> Option<RestoreEntry> {
        self.match_index(app_name, bundle_id, title).map(|i| self.entries.remove(i))
    }
}

/// Similarity of two titles as word sets: |A ∩ B| / |A ∪ B|.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() && words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count() as f64;
    let union = words_a.union(&words_b).count() as f64;
    intersection / union
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
