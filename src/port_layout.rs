//! PLT: the persisted `ports` file under a project's session directory.
//!
//! The file is line-oriented (`<host>:<container>` per line) with a
//! trailing `# _yolo_hash: <hash>` comment recording which [`PortPair`]
//! layout the hash was computed from. On each attach the tracker recomputes
//! the layout's hash and compares it against the stored one: a mismatch
//! means the strategy's port requirements changed since the file was
//! written (a different strategy was selected, or this crate added a new
//! default port), and the caller decides whether to `reset` (regenerate and
//! overwrite) or `keep` (leave the file exactly as-is, including its stored
//! hash).

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::file;
use crate::port::PortPair;

const HASH_COMMENT_PREFIX: &str = "# _yolo_hash: ";
const WARNING_COMMENT: &str = "# WARNING: Do not modify the _yolo_hash comment - it is auto-generated";

pub struct PortLayoutTracker {
    path: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// No `ports` file existed yet; this is a first attach.
    Absent,
    /// The stored hash matches the current layout's hash.
    Clean,
    /// The stored hash differs from the current layout's hash.
    Drifted { stored: String, current: String },
}

impl PortLayoutTracker {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        PortLayoutTracker { path: path.into() }
    }

    /// Hash a layout: the list of `host:container` pairs, sorted by
    /// container port so member order never affects the digest.
    pub fn hash_layout(layout: &[PortPair]) -> String {
        let mut sorted: Vec<&PortPair> = layout.iter().collect();
        sorted.sort_by_key(|p| p.container);
        let mut hasher = Sha256::new();
        for pair in sorted {
            hasher.update(format!("{}:{}\n", pair.host, pair.container));
        }
        hex::encode(&hasher.finalize()[..8])
    }

    fn read_raw(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    /// Parse the stored hash comment, if the file exists and carries one.
    pub fn stored_hash(&self) -> Option<String> {
        let contents = self.read_raw()?;
        contents.lines().find_map(|line| {
            line.strip_prefix(HASH_COMMENT_PREFIX)
                .map(|h| h.trim().to_string())
        })
    }

    /// Parse the persisted port pairs, ignoring the hash comment and blank
    /// lines. Lines are `HOST:CONTAINER` (spec.md §6's bit-exact format).
    pub fn stored_layout(&self) -> Vec<PortPair> {
        let Some(contents) = self.read_raw() else {
            return Vec::new();
        };
        contents
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                let (host, container) = line.split_once(':')?;
                Some(PortPair {
                    container: container.trim().parse().ok()?,
                    host: host.trim().parse().ok()?,
                })
            })
            .collect()
    }

    pub fn detect_drift(&self, current_layout: &[PortPair]) -> Drift {
        match self.stored_hash() {
            None => Drift::Absent,
            Some(stored) => {
                let current = Self::hash_layout(current_layout);
                if stored == current {
                    Drift::Clean
                } else {
                    Drift::Drifted { stored, current }
                }
            }
        }
    }

    /// Overwrite the `ports` file with `layout` and its freshly computed
    /// hash. Used for first-attach migration and explicit `--reset`.
    pub fn reset(&self, layout: &[PortPair]) -> Result<()> {
        self.write(layout)
    }

    /// Leave the file untouched. Exists as an explicit no-op so call sites
    /// read as a deliberate decision rather than an accidental skip; it
    /// never rewrites the stored hash, even if the in-memory layout
    /// differs.
    pub fn keep(&self) {}

    fn write(&self, layout: &[PortPair]) -> Result<()> {
        let mut sorted: Vec<&PortPair> = layout.iter().collect();
        sorted.sort_by_key(|p| p.container);
        let mut contents = String::new();
        for pair in &sorted {
            contents.push_str(&format!("{}:{}\n", pair.host, pair.container));
        }
        contents.push_str(WARNING_COMMENT);
        contents.push('\n');
        contents.push_str(HASH_COMMENT_PREFIX);
        contents.push_str(&Self::hash_layout(layout));
        contents.push('\n');
        file::write_atomic(&self.path, contents.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout() -> Vec<PortPair> {
        vec![
            PortPair { container: 3000, host: 3000 },
            PortPair { container: 5432, host: 5432 },
        ]
    }

    #[test]
    fn absent_file_reports_absent_drift() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        assert_eq!(tracker.detect_drift(&layout()), Drift::Absent);
    }

    #[test]
    fn reset_then_detect_is_clean() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        tracker.reset(&layout()).unwrap();
        assert_eq!(tracker.detect_drift(&layout()), Drift::Clean);
    }

    #[test]
    fn changed_layout_is_detected_as_drift() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        tracker.reset(&layout()).unwrap();

        let mut changed = layout();
        changed[0].host = 3001;
        match tracker.detect_drift(&changed) {
            Drift::Drifted { .. } => {}
            other => panic!("expected drift, got {other:?}"),
        }
    }

    #[test]
    fn hash_is_order_independent() {
        let mut reversed = layout();
        reversed.reverse();
        assert_eq!(
            PortLayoutTracker::hash_layout(&layout()),
            PortLayoutTracker::hash_layout(&reversed)
        );
    }

    #[test]
    fn keep_never_rewrites_the_stored_hash() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        tracker.reset(&layout()).unwrap();
        let before = tracker.stored_hash().unwrap();

        tracker.keep();

        let after = tracker.stored_hash().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn written_file_precedes_the_hash_with_a_warning_comment() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        tracker.reset(&layout()).unwrap();

        let contents = std::fs::read_to_string(tracker.path()).unwrap();
        let warning_pos = contents.find(WARNING_COMMENT).expect("warning comment present");
        let hash_pos = contents.find(HASH_COMMENT_PREFIX).expect("hash comment present");
        assert!(warning_pos < hash_pos);
    }

    #[test]
    fn stored_layout_roundtrips() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        tracker.reset(&layout()).unwrap();
        assert_eq!(tracker.stored_layout(), layout());
    }

    #[test]
    fn lines_are_written_host_then_container() {
        let dir = tempdir().unwrap();
        let tracker = PortLayoutTracker::new(dir.path().join("ports"));
        let remapped = vec![PortPair { container: 3000, host: 4000 }];
        tracker.reset(&remapped).unwrap();

        let contents = std::fs::read_to_string(tracker.path()).unwrap();
        assert!(contents.lines().any(|l| l.trim() == "4000:3000"));
        assert_eq!(tracker.stored_layout(), remapped);
    }
}
