//! OVR: the project-supplied overlay directory and its trust gate.
//!
//! A project may ship a `.yolo/` directory with an `env` file, a `ports`
//! file, a `strategy` file (pins detection instead of auto-detecting), and
//! a `Dockerfile` (replaces the strategy's base image). Because these files
//! execute inside the sandbox with the user's credentials mounted, they are
//! gated behind a persistent, append-only trust list keyed by a content
//! hash: the same overlay content is trusted silently on every subsequent
//! run, and a single byte of drift asks again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::{Context, Result};
use crate::file;
use crate::shell::{MessageInfo, ViewOrApply};

pub const OVERLAY_DIR_NAME: &str = ".yolo";
const ENV_FILE: &str = "env";
const PORTS_FILE: &str = "ports";
const STRATEGY_FILE: &str = "strategy";
const DOCKERFILE: &str = "Dockerfile";
const SETTINGS_FILE: &str = "settings.json";
const COMMANDS_FILE: &str = "commands";

const TRACKED_FILES: &[&str] = &[
    ENV_FILE,
    PORTS_FILE,
    STRATEGY_FILE,
    DOCKERFILE,
    SETTINGS_FILE,
    COMMANDS_FILE,
];

/// The overlay directory for a single project worktree, if present.
pub struct Overlay {
    root: PathBuf,
}

impl Overlay {
    /// Look for `<worktree>/.yolo`. Returns `None` if no such directory
    /// exists (the common case: most projects have no overlay).
    pub fn discover(worktree: &Path) -> Option<Self> {
        let root = worktree.join(OVERLAY_DIR_NAME);
        if root.is_dir() {
            Some(Overlay { root })
        } else {
            None
        }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env_file(&self) -> Option<PathBuf> {
        self.existing(ENV_FILE)
    }

    pub fn ports_file(&self) -> Option<PathBuf> {
        self.existing(PORTS_FILE)
    }

    pub fn strategy_file(&self) -> Option<PathBuf> {
        self.existing(STRATEGY_FILE)
    }

    pub fn dockerfile(&self) -> Option<PathBuf> {
        self.existing(DOCKERFILE)
    }

    pub fn settings_file(&self) -> Option<PathBuf> {
        self.existing(SETTINGS_FILE)
    }

    pub fn commands_file(&self) -> Option<PathBuf> {
        self.existing(COMMANDS_FILE)
    }

    fn existing(&self, name: &str) -> Option<PathBuf> {
        let p = self.root.join(name);
        p.is_file().then_some(p)
    }

    /// Read a pinned strategy name from the overlay's `strategy` file, if
    /// present, trimmed of surrounding whitespace.
    pub fn pinned_strategy(&self) -> Option<String> {
        let path = self.strategy_file()?;
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Content hash of the overlay: every tracked file that exists is read
    /// and concatenated, in the fixed order of [`TRACKED_FILES`] (never
    /// directory iteration order, so unrelated files dropped into `.yolo/`
    /// don't change the hash and reordering never matters), each entry
    /// prefixed by its file name so an empty `env` can't collide with an
    /// empty `strategy`.
    pub fn content_hash(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for name in TRACKED_FILES {
            if let Some(path) = self.existing(name) {
                let bytes = std::fs::read(&path)
                    .wrap_err_with(|| format!("could not read `{}`", path.display()))?;
                hasher.update(name.as_bytes());
                hasher.update(b"\0");
                hasher.update(&bytes);
                hasher.update(b"\0");
            }
        }
        Ok(hex::encode(&hasher.finalize()[..8]))
    }
}

/// The persistent, cross-project allow-list of trusted overlay content
/// hashes. One file, append-only, `0600` on unix (spec.md §4.6, §9).
pub struct TrustStore {
    path: PathBuf,
}

impl TrustStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TrustStore { path: path.into() }
    }

    fn entries(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).wrap_err_with(|| format!("could not read `{}`", self.path.display())),
        }
    }

    pub fn is_trusted(&self, hash: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|e| e == hash))
    }

    /// Append `hash` to the trust list. A no-op if already present, so
    /// re-trusting doesn't grow the file unboundedly across repeated runs.
    pub fn trust(&self, hash: &str) -> Result<()> {
        if self.is_trusted(hash)? {
            return Ok(());
        }
        use std::io::Write;
        let mut file = file::write_file(&self.path, true)?;
        writeln!(file, "{hash}").wrap_err("could not append to trust list")?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.entries()
    }

    /// Remove `hash` from the trust list. Requires rewriting the whole
    /// file since the store is otherwise append-only.
    pub fn revoke(&self, hash: &str) -> Result<()> {
        let remaining: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|e| e != hash)
            .collect();
        let mut contents = remaining.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        file::write_atomic(&self.path, contents.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).ok();
        }
        Ok(())
    }
}

/// Outcome of consulting an overlay's trust status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consultation {
    /// Already trusted; proceed silently.
    AlreadyTrusted,
    /// The user was prompted and approved; now trusted.
    ApprovedNow,
    /// The user declined, or the prompt could not be shown (non-interactive).
    Declined,
}

/// Consult the trust store for `overlay`, prompting the user with the
/// three-way Apply/View/Cancel surface if its content hash isn't already
/// trusted.
pub fn consult(overlay: &Overlay, store: &TrustStore, ui: &MessageInfo) -> Result<Consultation> {
    let hash = overlay.content_hash()?;
    if store.is_trusted(&hash)? {
        return Ok(Consultation::AlreadyTrusted);
    }

    let prompt = format!(
        "project `{}` supplies an untrusted overlay (hash {hash})",
        overlay.root.display()
    );
    let outcome = ui.view_or_apply(&prompt, || {
        for name in TRACKED_FILES {
            if let Some(path) = overlay.existing(name) {
                ui.header(name);
                match std::fs::read_to_string(&path) {
                    Ok(contents) => eprint!("{contents}"),
                    Err(_) => ui.dim("(binary or unreadable)"),
                }
            }
        }
        Ok(())
    })?;

    match outcome {
        ViewOrApply::Apply => {
            store.trust(&hash)?;
            Ok(Consultation::ApprovedNow)
        }
        ViewOrApply::Cancel => Ok(Consultation::Declined),
    }
}

/// Parse a `.env`-style file into ordered key/value pairs: `export KEY=VALUE`
/// prefix allowed, single/double-quoted values stripped, comments and blank
/// lines skipped (spec.md §4.6 step 3's env-file grammar, shared with §4.8's
/// credential-discovery dotenv format). Unlike [`crate::credential`]'s
/// single-token lookup, every pair is kept, in file order.
pub fn parse_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("could not read `{}`", path.display()))?;
    Ok(contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect())
}

/// Summarize which optional files an overlay actually supplies, keyed by
/// name, for `--print` style introspection.
pub fn present_files(overlay: &Overlay) -> BTreeMap<&'static str, PathBuf> {
    let mut out = BTreeMap::new();
    for name in TRACKED_FILES {
        if let Some(path) = overlay.existing(name) {
            out.insert(*name, path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_returns_none_without_overlay_dir() {
        let dir = tempdir().unwrap();
        assert!(Overlay::discover(dir.path()).is_none());
    }

    #[test]
    fn content_hash_ignores_comments_position_but_not_content() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(OVERLAY_DIR_NAME)).unwrap();
        std::fs::write(dir.path().join(OVERLAY_DIR_NAME).join(ENV_FILE), "A=1\n").unwrap();
        let overlay_a = Overlay::discover(dir.path()).unwrap();
        let hash_a = overlay_a.content_hash().unwrap();

        std::fs::write(dir.path().join(OVERLAY_DIR_NAME).join(ENV_FILE), "A=2\n").unwrap();
        let overlay_b = Overlay::discover(dir.path()).unwrap();
        let hash_b = overlay_b.content_hash().unwrap();

        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn content_hash_is_stable_for_identical_content() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(OVERLAY_DIR_NAME)).unwrap();
        std::fs::write(dir.path().join(OVERLAY_DIR_NAME).join(ENV_FILE), "A=1\n").unwrap();
        let overlay = Overlay::discover(dir.path()).unwrap();
        assert_eq!(overlay.content_hash().unwrap(), overlay.content_hash().unwrap());
    }

    #[test]
    fn trust_store_roundtrips() {
        let dir = tempdir().unwrap();
        let store = TrustStore::new(dir.path().join(".trust-list"));
        assert!(!store.is_trusted("deadbeef").unwrap());
        store.trust("deadbeef").unwrap();
        assert!(store.is_trusted("deadbeef").unwrap());
        assert_eq!(store.list().unwrap(), vec!["deadbeef".to_string()]);
    }

    #[test]
    fn trust_store_trust_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = TrustStore::new(dir.path().join(".trust-list"));
        store.trust("abc123").unwrap();
        store.trust("abc123").unwrap();
        assert_eq!(store.list().unwrap(), vec!["abc123".to_string()]);
    }

    #[test]
    fn trust_store_revoke_removes_only_that_hash() {
        let dir = tempdir().unwrap();
        let store = TrustStore::new(dir.path().join(".trust-list"));
        store.trust("aaa").unwrap();
        store.trust("bbb").unwrap();
        store.revoke("aaa").unwrap();
        assert_eq!(store.list().unwrap(), vec!["bbb".to_string()]);
    }

    #[test]
    fn env_file_strips_export_prefix_and_quotes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("env"), "export FOO=\"bar\"\nBAZ='qux'\n").unwrap();
        let pairs = parse_env_file(&dir.path().join("env")).unwrap();
        assert_eq!(
            pairs,
            vec![("FOO".to_string(), "bar".to_string()), ("BAZ".to_string(), "qux".to_string())]
        );
    }

    #[test]
    fn env_file_skips_comments_and_blank_lines() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("env"), "# a comment\n\nFOO=bar\n").unwrap();
        let pairs = parse_env_file(&dir.path().join("env")).unwrap();
        assert_eq!(pairs, vec![("FOO".to_string(), "bar".to_string())]);
    }

    #[cfg(unix)]
    #[test]
    fn trust_store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = TrustStore::new(dir.path().join(".trust-list"));
        store.trust("aaa").unwrap();
        let mode = std::fs::metadata(dir.path().join(".trust-list"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }
}
