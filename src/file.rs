use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::*;

/// Canonicalize a path, wrapping the error with the path for context. Mirrors
/// `cross`'s `file::canonicalize`, used throughout the mount planner so a
/// missing host directory fails with a useful message instead of a bare
/// `io::Error`.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .wrap_err_with(|| format!("could not canonicalize `{}`", path.display()))
}

/// Canonicalize a path that may not exist yet: canonicalize the deepest
/// existing ancestor and re-append the remaining components. Used when
/// resolving a worktree path whose target directory might be the one the
/// user is about to create (e.g. a first-run session directory).
pub fn canonicalize_lossy(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        match existing.parent() {
            Some(parent) => {
                rest.push(existing.file_name());
                existing = parent;
            }
            None => break,
        }
        if existing.exists() {
            break;
        }
    }
    let mut result = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
    for part in rest.into_iter().rev().flatten() {
        result.push(part);
    }
    result
}

/// Absolute-ify a path against the current directory without requiring it
/// to exist, per `cross`'s `cli.rs::absolute_path` (used for `--manifest-path`
/// style arguments there; here for worktree path resolution before the
/// directory is guaranteed to exist).
pub fn absolute_path(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .wrap_err("could not determine current directory")?
            .join(path))
    }
}

/// Write `contents` to `path` atomically: write to a sibling temp file in
/// the same directory, then rename over the destination. Used by the Port
/// Layout Tracker (§4.7) so the `_yolo_hash` comment is never torn by a
/// partial write, and by the Overlay Trust Store when generating a default
/// `ports` file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("`{}` has no parent directory", path.display()))?;
    fs::create_dir_all(dir).wrap_err_with(|| format!("could not create `{}`", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .wrap_err_with(|| format!("could not create temp file in `{}`", dir.display()))?;
    tmp.write_all(contents)
        .wrap_err("could not write temp file contents")?;
    tmp.persist(path)
        .map_err(|e| eyre::eyre!("could not persist `{}`: {}", path.display(), e.error))?;
    Ok(())
}

/// Open `path` for writing, truncating or creating it. `owner_only` sets
/// mode `0600` on unix, matching the trust-list file permission requirement
/// in spec.md §4.6.
pub fn write_file(path: &Path, owner_only: bool) -> Result<fs::File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).wrap_err_with(|| format!("could not create `{}`", dir.display()))?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(false).append(true);
    #[cfg(unix)]
    if owner_only {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = owner_only;
    options
        .open(path)
        .wrap_err_with(|| format!("could not open `{}`", path.display()))
}

/// Extension mirroring `cross`'s `PathExt`: render a path as POSIX-style
/// forward slashes regardless of host platform, used when a path is about
/// to be embedded in a container-side string (mount destinations, env
/// values) rather than interpreted by the host shell.
pub trait PathExt {
    fn as_posix_relative(&self) -> Result<String>;
    fn encode_for_session_dir(&self) -> String;
}

impl PathExt for Path {
    fn as_posix_relative(&self) -> Result<String> {
        let mut out = String::new();
        for (i, component) in self.components().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Ok(out)
    }

    /// Encode a canonical worktree path into the flat, separator-free form
    /// used for the per-project session directory (spec.md §4.5 step 3):
    /// path separators replaced with `-`.
    fn encode_for_session_dir(&self) -> String {
        self.as_posix_relative()
            .unwrap_or_default()
            .replace('/', "-")
    }
}
