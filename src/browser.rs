//! BRW: the remote-debuggable browser control-plane.
//!
//! The host launches (or reuses) a browser listening on the project's
//! deterministic [`crate::ident::browser_port_for`] port, and the sandbox's
//! tool-server is pointed at it through a generated JSON config bound
//! read-only into the container (see [`crate::mount`]'s
//! `browser_config_file`).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config;
use crate::errors::*;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);
const START_POLL_INTERVAL: Duration = Duration::from_millis(200);
const START_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// True if a remote-debugging endpoint answers `/json/version` on `port`.
pub fn available(port: u16) -> bool {
    probe(port).is_ok()
}

fn probe(port: u16) -> Result<()> {
    ureq::AgentBuilder::new()
        .timeout(HEALTH_TIMEOUT)
        .build()
        .get(&format!("http://127.0.0.1:{port}/json/version"))
        .call()
        .map(|_| ())
        .map_err(|e| eyre::eyre!("browser health probe failed: {e}"))
}

fn browser_binary() -> String {
    std::env::var(config::BROWSER_BIN_OVERRIDE_VAR).unwrap_or_else(|_| default_browser_binary())
}

#[cfg(target_os = "macos")]
fn default_browser_binary() -> String {
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".to_string()
}

#[cfg(not(target_os = "macos"))]
fn default_browser_binary() -> String {
    "google-chrome".to_string()
}

/// Launch the browser headlessly-remote-debuggable on `port`, rooted at
/// `profile_dir` so each project gets an isolated cookie jar, then poll
/// until it answers or the startup timeout elapses.
pub fn ensure_running(port: u16, profile_dir: &Path) -> Result<()> {
    if available(port) {
        return Ok(());
    }

    std::fs::create_dir_all(profile_dir)
        .wrap_err_with(|| format!("could not create `{}`", profile_dir.display()))?;

    Command::new(browser_binary())
        .arg(format!("--remote-debugging-port={port}"))
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .wrap_err("could not launch browser")?;

    let deadline = Instant::now() + START_POLL_TIMEOUT;
    while Instant::now() < deadline {
        if available(port) {
            return Ok(());
        }
        std::thread::sleep(START_POLL_INTERVAL);
    }

    Err(OrchestratorError::BrowserControlPlane.into())
}

/// Which host name the sandbox should use to reach back out to the host's
/// browser: Docker Desktop exposes `host.docker.internal`, whereas rootless
/// podman and Linux-native docker typically need the host's own loopback
/// via `--network host`, which is why we only ever use this host name when
/// `host_network` is false (spec.md §4.9).
pub fn host_for_container(host_network: bool) -> &'static str {
    if host_network {
        "localhost"
    } else {
        "host.docker.internal"
    }
}

/// The tool-server map key this crate's own control-plane entry is filed
/// under. Any overlay-supplied entry under the same name is replaced, never
/// merged with, since it would otherwise describe stale connection details.
const CONTROL_PLANE_SERVER_NAME: &str = "chrome-devtools";

#[derive(Debug, Serialize)]
pub struct ToolServerConfig {
    pub url: String,
}

pub fn generate_tool_server_config(port: u16, host_network: bool) -> ToolServerConfig {
    ToolServerConfig { url: format!("http://{}:{port}", host_for_container(host_network)) }
}

/// Merge the generated browser control-plane entry into any overlay-supplied
/// tool-server configuration the project provides, writing the union to
/// `dest` (spec.md §4.9, concrete scenario 6). Every other server entry the
/// overlay already lists passes through verbatim; only the control-plane
/// entry itself is (over)written with the freshly generated one, so a
/// drifted or hand-edited control-plane entry never survives a run.
pub fn write_tool_server_config(
    config: &ToolServerConfig,
    overlay_settings: Option<&Path>,
    dest: &Path,
) -> Result<()> {
    let mut merged = match overlay_settings {
        Some(overlay_path) => {
            let overlay_contents = std::fs::read_to_string(overlay_path)
                .wrap_err_with(|| format!("could not read `{}`", overlay_path.display()))?;
            match serde_json::from_str::<serde_json::Value>(&overlay_contents) {
                Ok(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            }
        }
        None => serde_json::Map::new(),
    };

    let entry = serde_json::to_value(config).wrap_err("could not serialize browser config")?;
    merged.insert(CONTROL_PLANE_SERVER_NAME.to_string(), entry);

    let rendered =
        serde_json::to_vec_pretty(&serde_json::Value::Object(merged)).wrap_err("could not render merged config")?;
    crate::file::write_atomic(dest, &rendered)
}

pub fn profile_dir_for(session_dir: &Path) -> PathBuf {
    session_dir.join("browser-profile")
}
