//! CRED: forge credential discovery and validation.
//!
//! Search order (first hit wins):
//! 1. `YOLO_FORGE_TOKEN` env var
//! 2. `GH_TOKEN` env var
//! 3. `<worktree>/.env`
//! 4. `~/.env`
//! 5. the forge CLI's own config (`$XDG_CONFIG_HOME/gh/hosts.yml`, falling
//!    back to `~/.config/gh/hosts.yml`)
//!
//! A found token is validated with a real HTTPS call before use, and its
//! OAuth scopes are classified so a broad-scope token can be refused by
//! default (spec.md §4.8, §9).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config;
use crate::errors::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    EnvPrimary,
    EnvSecondary,
    ProjectDotEnv(PathBuf),
    UserDotEnv(PathBuf),
    ForgeConfig(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub source: Source,
}

/// Search order from spec.md §4.8, stopping at the first match.
pub fn find(worktree: &Path) -> Option<Credential> {
    if let Ok(token) = std::env::var(config::PRIMARY_TOKEN_VAR) {
        if !token.is_empty() {
            return Some(Credential { token, source: Source::EnvPrimary });
        }
    }
    if let Ok(token) = std::env::var(config::SECONDARY_TOKEN_VAR) {
        if !token.is_empty() {
            return Some(Credential { token, source: Source::EnvSecondary });
        }
    }
    if let Some(token) = read_dotenv_token(&worktree.join(".env")) {
        return Some(Credential { token, source: Source::ProjectDotEnv(worktree.join(".env")) });
    }
    if let Some(home) = home::home_dir() {
        let user_env = home.join(".env");
        if let Some(token) = read_dotenv_token(&user_env) {
            return Some(Credential { token, source: Source::UserDotEnv(user_env) });
        }
    }
    if let Some(dirs) = directories::BaseDirs::new() {
        let hosts_yml = dirs.config_dir().join("gh").join("hosts.yml");
        if let Some(token) = read_forge_hosts_token(&hosts_yml) {
            return Some(Credential { token, source: Source::ForgeConfig(hosts_yml) });
        }
    }
    None
}

/// Parse a `.env`-style file for the primary/secondary token names,
/// `export` prefix allowed, single/double-quoted values stripped (spec.md
/// §4.8 step 3). The primary name wins over the secondary even if the
/// secondary's line appears first in the file.
fn read_dotenv_token(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let mut secondary: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if value.is_empty() {
            continue;
        }
        if key.trim() == config::PRIMARY_TOKEN_VAR {
            return Some(value.to_string());
        }
        if key.trim() == config::SECONDARY_TOKEN_VAR && secondary.is_none() {
            secondary = Some(value.to_string());
        }
    }

    secondary
}

/// A minimal `hosts.yml` scraper: the `gh` CLI's config format is
/// `<host>:\n    oauth_token: <token>`, indented with two spaces.
fn read_forge_hosts_token(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("oauth_token:")
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeClass {
    /// A token scoped to exactly what this tool needs (or less).
    FineGrained,
    /// A classic token with a handful of scopes, none of them dangerous.
    Narrow,
    /// Carries one or more scopes broad enough to do real damage if leaked
    /// from inside the sandbox.
    Broad,
}

/// Scopes that grant more than a coding agent plausibly needs: destructive
/// repo operations, or admin control over an org, enterprise, GPG key,
/// SSH-signing key, or public key (spec.md §3's closed set). Exactly these
/// six; a forge adding a new dangerous scope requires a deliberate edit
/// here, not silent inheritance.
const DANGEROUS_SCOPES: &[&str] = &[
    "delete_repo",
    "admin:org",
    "admin:enterprise",
    "admin:gpg_key",
    "admin:public_key",
    "admin:ssh_signing_key",
];

pub fn classify_scopes(scopes: &[String]) -> ScopeClass {
    if scopes.is_empty() {
        return ScopeClass::FineGrained;
    }
    if scopes.iter().any(|s| DANGEROUS_SCOPES.contains(&s.as_str())) {
        return ScopeClass::Broad;
    }
    ScopeClass::Narrow
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub scopes: Vec<String>,
    pub class: ScopeClass,
}

const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);
const FORGE_API_BASE: &str = "https://api.github.com";

/// Validate `credential` against the forge's API, returning its granted
/// scopes. A GET against a cheap authenticated endpoint is enough: forges
/// return the token's scopes in an `X-OAuth-Scopes` response header
/// regardless of the endpoint's own payload.
pub fn validate(credential: &Credential) -> Result<ValidationResult> {
    let agent = ureq::AgentBuilder::new()
        .timeout(VALIDATION_TIMEOUT)
        .build();

    let response = agent
        .get(&format!("{FORGE_API_BASE}/user"))
        .set("Authorization", &format!("token {}", credential.token))
        .set("User-Agent", config::TOOL_NAME)
        .call()
        .map_err(|e| eyre::eyre!("credential validation request failed: {e}"))?;

    let scopes: Vec<String> = response
        .header("x-oauth-scopes")
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let class = classify_scopes(&scopes);
    Ok(ValidationResult { scopes, class })
}
