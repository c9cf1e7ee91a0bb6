//! SES: the per-project session directory and the one-time migration of
//! legacy layouts.
//!
//! Early versions of this tool kept session state at
//! `<user-agent-config>/projects/<hash>`, keyed only by project hash. The
//! canonical layout (spec.md §4.5 step 3, §4.10) keys it by the encoded
//! worktree path instead — the same scheme the agent itself uses for its
//! own (non-containerized) per-project session storage — so relocating a
//! worktree's strategy, or running it outside a container entirely, still
//! resolves to the same session history. [`migrate`] is run once per
//! attach to fold any legacy hash-keyed directory into the canonical one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::docker::{self, Engine};
use crate::errors::*;
use crate::file::PathExt;
use crate::ident::ProjectHash;

pub fn canonical_dir(sessions_root: &Path, worktree: &Path) -> PathBuf {
    sessions_root.join(worktree.encode_for_session_dir())
}

fn legacy_dir(sessions_root: &Path, hash: &ProjectHash) -> PathBuf {
    sessions_root.join(hash.to_string())
}

/// Fold a pre-existing legacy (hash-keyed) session directory into the
/// canonical (encoded-worktree-path) one, if both the legacy directory
/// exists and no container for this project is currently running
/// (migrating a live session's files out from under a running container
/// would be visible corruption, not just untidiness).
///
/// Collisions (a file existing at both the legacy and canonical path) are
/// resolved "last writer wins": whichever one the legacy directory listing
/// happens to yield last overwrites the canonical copy. This only matters
/// for files a user hand-edited in both locations, which is already an
/// unsupported state.
pub fn migrate(
    sessions_root: &Path,
    hash: &ProjectHash,
    worktree: &Path,
    engine: Option<&Engine>,
    container_name: &str,
    verbose: bool,
) -> Result<bool> {
    let legacy = legacy_dir(sessions_root, hash);
    if !legacy.is_dir() {
        return Ok(false);
    }

    if let Some(engine) = engine {
        let state = docker::engine::container_state(engine, container_name, verbose)?;
        if state == docker::ContainerState::Running {
            return Ok(false);
        }
    }

    let canonical = canonical_dir(sessions_root, worktree);
    fs::create_dir_all(&canonical)
        .wrap_err_with(|| format!("could not create `{}`", canonical.display()))?;

    for entry in fs::read_dir(&legacy)
        .wrap_err_with(|| format!("could not read `{}`", legacy.display()))?
    {
        let entry = entry.wrap_err("could not read directory entry")?;
        let dest = canonical.join(entry.file_name());
        fs::rename(entry.path(), &dest).or_else(|_| {
            // cross-device or other rename failure: fall back to copy+remove.
            if entry.path().is_dir() {
                copy_dir_all(&entry.path(), &dest)?;
                fs::remove_dir_all(entry.path())
            } else {
                fs::copy(entry.path(), &dest).map(|_| ())?;
                fs::remove_file(entry.path())
            }
            .wrap_err_with(|| format!("could not migrate `{}`", entry.path().display()))
        })?;
    }

    fs::remove_dir_all(&legacy).ok();
    Ok(true)
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hash() -> ProjectHash {
        "a1b2c3d4".parse().unwrap()
    }

    fn worktree() -> PathBuf {
        PathBuf::from("/home/me/project")
    }

    #[test]
    fn migrate_is_noop_without_a_legacy_dir() {
        let root = tempdir().unwrap();
        let migrated = migrate(root.path(), &hash(), &worktree(), None, "irrelevant", false).unwrap();
        assert!(!migrated);
    }

    #[test]
    fn migrate_moves_legacy_files_into_canonical_dir() {
        let root = tempdir().unwrap();
        let legacy = legacy_dir(root.path(), &hash());
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("state.json"), "{}").unwrap();

        let migrated = migrate(root.path(), &hash(), &worktree(), None, "irrelevant", false).unwrap();
        assert!(migrated);

        let canonical = canonical_dir(root.path(), &worktree());
        assert!(canonical.join("state.json").exists());
        assert!(!legacy.exists());
    }

    #[test]
    fn canonical_dir_name_is_the_encoded_worktree_path() {
        let root = PathBuf::from("/home/me/.yolo/sessions");
        let dir = canonical_dir(&root, &worktree());
        assert_eq!(dir.file_name().unwrap().to_str().unwrap(), "-home-me-project");
    }
}
