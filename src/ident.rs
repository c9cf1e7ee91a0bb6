//! IDENT: deterministic project identity derived from a worktree path.
//!
//! Everything downstream (container names, volume names, the session
//! directory, the deterministic browser port) is keyed off the
//! [`ProjectHash`] computed here, so two invocations against the same
//! worktree must always agree without any persisted state.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::file;

/// An 8 hex-character digest of a canonicalized worktree path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectHash([u8; 4]);

impl ProjectHash {
    /// Hash `worktree` after canonicalizing it, so `.`, symlinked paths, and
    /// trailing slashes all converge on the same identity.
    pub fn for_worktree(worktree: &Path) -> Result<Self> {
        let canonical = file::canonicalize(worktree)?;
        Ok(Self::from_canonical_path(&canonical))
    }

    fn from_canonical_path(canonical: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest[..4]);
        ProjectHash(out)
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The first two bytes of the digest, interpreted big-endian, used as the
    /// seed for the deterministic browser port.
    fn seed(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }
}

impl std::fmt::Display for ProjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl std::str::FromStr for ProjectHash {
    type Err = eyre::Report;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| eyre::eyre!("invalid project hash `{s}`: {e}"))?;
        if bytes.len() != 4 {
            return Err(eyre::eyre!("project hash must be 4 bytes, got {}", bytes.len()));
        }
        let mut out = [0u8; 4];
        out.copy_from_slice(&bytes);
        Ok(ProjectHash(out))
    }
}

/// The lowest browser control-plane port this crate will ever hand out.
pub const BROWSER_PORT_BASE: u16 = 9222;
/// Width of the deterministic port range: `[9222, 9222 + 778) = [9222, 10000)`.
pub const BROWSER_PORT_SPAN: u16 = 778;

/// `9222 + (first 4 hex digits of the project hash, as u16) mod 778`.
///
/// Deterministic and collision-resistant enough in practice: the span was
/// chosen so the full range stays inside the conventional ephemeral-port
/// floor used by remote-debugging browsers (`9222`-`9999`).
pub fn browser_port_for(hash: &ProjectHash) -> u16 {
    BROWSER_PORT_BASE + hash.seed() % BROWSER_PORT_SPAN
}

/// The container/volume name prefix, e.g. `yolo-a1b2c3d4-node`.
pub fn container_name(prefix: &str, hash: &ProjectHash, strategy: &str) -> String {
    format!("{prefix}-{hash}-{strategy}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_same_path() {
        let a = ProjectHash::from_canonical_path(Path::new("/home/me/project"));
        let b = ProjectHash::from_canonical_path(Path::new("/home/me/project"));
        assert_eq!(a, b);
        assert_eq!(a.as_hex().len(), 8);
    }

    #[test]
    fn hash_differs_for_different_paths() {
        let a = ProjectHash::from_canonical_path(Path::new("/home/me/project-a"));
        let b = ProjectHash::from_canonical_path(Path::new("/home/me/project-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn browser_port_stays_in_range() {
        for raw in [0u16, 1, 0x1234, 0xffff, 0x7ff2] {
            let hash = ProjectHash([(raw >> 8) as u8, raw as u8, 0, 0]);
            let port = browser_port_for(&hash);
            assert!(port >= BROWSER_PORT_BASE);
            assert!(port < BROWSER_PORT_BASE + BROWSER_PORT_SPAN);
        }
    }

    #[test]
    fn browser_port_boundary_cases() {
        let low = ProjectHash([0x00, 0x00, 0, 0]);
        assert_eq!(browser_port_for(&low), 9222);

        let high = ProjectHash([0xff, 0xff, 0, 0]);
        // 65535 % 778 == 183, so the high end lands at 9405.
        assert_eq!(browser_port_for(&high), 9405);
    }

    #[test]
    fn roundtrips_through_display_and_fromstr() {
        let hash = ProjectHash::from_canonical_path(Path::new("/tmp/whatever"));
        let s = hash.to_string();
        let parsed: ProjectHash = s.parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn container_name_format() {
        let hash = ProjectHash([0xa1, 0xb2, 0xc3, 0xd4]);
        assert_eq!(container_name("yolo", &hash, "node"), "yolo-a1b2c3d4-node");
    }
}
