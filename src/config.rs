/// Parses a loosely-typed boolean environment variable, matching `cross`'s
/// `config::bool_from_envvar`: accepts `1`/`0`, `true`/`false`, `yes`/`no`
/// case-insensitively, anything else is falsy.
pub fn bool_from_envvar(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// `std::env::var` collapsed to a bool via [`bool_from_envvar`], used for
/// every ambient opt-out/opt-in flag (`YOLO_NO_FORGE`, `YOLO_DETECT_DEEP`, ...).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| bool_from_envvar(&v)).unwrap_or(false)
}

pub const PRIMARY_TOKEN_VAR: &str = "YOLO_FORGE_TOKEN";
pub const SECONDARY_TOKEN_VAR: &str = "GH_TOKEN";
pub const NO_FORGE_VAR: &str = "YOLO_NO_FORGE";
pub const DETECT_DEEP_VAR: &str = "YOLO_DETECT_DEEP";
pub const BROWSER_BIN_OVERRIDE_VAR: &str = "YOLO_BROWSER_BIN";
pub const DOCKER_OPTS_VAR: &str = "YOLO_DOCKER_OPTS";

pub const TOOL_NAME: &str = "yolo";
pub const CONTAINER_PREFIX: &str = "yolo";
/// The in-container (and host-passthrough) agent entrypoint name.
pub const AGENT_BINARY: &str = "agent";
