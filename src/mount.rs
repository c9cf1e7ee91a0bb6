//! MNT: the ordered, reproducible mount list handed to the container
//! runtime. Order matters: it is part of this crate's external contract
//! (`--print`/`-p` renders it, and tests pin it), so entries are always
//! appended in the fixed sequence below rather than assembled from a
//! `HashMap`.

use std::path::PathBuf;

use crate::ident::ProjectHash;
use crate::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    /// A host path bound straight through to a container path.
    Bind {
        host: PathBuf,
        container: String,
        read_only: bool,
    },
    /// A runtime-managed named volume, persistent across container
    /// recreation (strategy caches survive `--reset`, unlike the container
    /// itself).
    NamedVolume { volume: String, container: String },
}

impl Mount {
    pub fn container_path(&self) -> &str {
        match self {
            Mount::Bind { container, .. } => container,
            Mount::NamedVolume { container, .. } => container,
        }
    }
}

/// Everything the planner needs to know about a single invocation. Kept
/// flat rather than threaded as loose arguments, mirroring `cross`'s
/// `Directories` struct.
pub struct MountContext<'a> {
    pub worktree: PathBuf,
    pub credential_store: PathBuf,
    pub session_dir: PathBuf,
    pub agent_config_dir: Option<PathBuf>,
    pub hash: ProjectHash,
    pub strategy: &'a Strategy,
    pub worktree_common_dir: Option<PathBuf>,
    pub overlay_commands_file: Option<PathBuf>,
    pub overlay_settings_file: Option<PathBuf>,
    pub browser_config_file: Option<PathBuf>,
    pub container_prefix: &'a str,
}

pub const WORKSPACE_CONTAINER_PATH: &str = "/workspace";
pub const CREDENTIAL_CONTAINER_PATH: &str = "/home/agent/.credentials";
pub const AGENT_CONFIG_CONTAINER_PATH: &str = "/home/agent/.config/agent";
/// The workspace is always mounted at the fixed in-container path
/// `/workspace`, so the agent's own encoded-path session-keying convention
/// always resolves it to `-workspace` regardless of the host-side worktree
/// path (spec.md §4.5 step 3). That's the whole point of this bind: it
/// translates the host's per-project, per-worktree session directory onto
/// the one session slot the in-container agent will ever look for.
pub const SESSION_CONTAINER_PATH: &str = "/home/agent/.config/agent/projects/-workspace";
pub const WORKTREE_COMMON_CONTAINER_PATH: &str = "/workspace-git-common";
pub const OVERLAY_COMMANDS_CONTAINER_PATH: &str = "/home/agent/.config/agent/commands";
pub const OVERLAY_SETTINGS_CONTAINER_PATH: &str = "/home/agent/.config/agent/settings.json";
pub const BROWSER_CONFIG_CONTAINER_PATH: &str = "/home/agent/.config/agent/tool-server.json";

/// Build the mount list in the fixed 9-step order:
/// 1. workspace bind (read-write)
/// 2. credential store bind (read-only)
/// 3. session directory bind (read-write, per-project persistent state)
/// 4. agent config bind, if the host has one (read-only)
/// 5. strategy cache volumes (read-write, named per project+strategy+cache)
/// 6. git-worktree common-dir bind, if this worktree is a linked worktree (read-only)
/// 7. overlay commands bind, if the project overlay supplies one (read-only)
/// 8. overlay settings bind, if the project overlay supplies one (read-only)
/// 9. browser control-plane config bind, if browser integration is active (read-only)
pub fn plan(ctx: &MountContext) -> Vec<Mount> {
    let mut mounts = Vec::with_capacity(9);

    mounts.push(Mount::Bind {
        host: ctx.worktree.clone(),
        container: WORKSPACE_CONTAINER_PATH.to_string(),
        read_only: false,
    });

    mounts.push(Mount::Bind {
        host: ctx.credential_store.clone(),
        container: CREDENTIAL_CONTAINER_PATH.to_string(),
        read_only: false,
    });

    mounts.push(Mount::Bind {
        host: ctx.session_dir.clone(),
        container: SESSION_CONTAINER_PATH.to_string(),
        read_only: false,
    });

    if let Some(agent_config_dir) = &ctx.agent_config_dir {
        mounts.push(Mount::Bind {
            host: agent_config_dir.clone(),
            container: AGENT_CONFIG_CONTAINER_PATH.to_string(),
            read_only: true,
        });
    }

    for cache in ctx.strategy.caches {
        let volume = format!(
            "{}-{}-{}-{}",
            ctx.container_prefix, ctx.hash, ctx.strategy.name, cache
        );
        mounts.push(Mount::NamedVolume {
            volume,
            container: format!("/home/agent/.cache/{cache}"),
        });
    }

    if let Some(common_dir) = &ctx.worktree_common_dir {
        mounts.push(Mount::Bind {
            host: common_dir.clone(),
            container: WORKTREE_COMMON_CONTAINER_PATH.to_string(),
            read_only: true,
        });
    }

    if let Some(commands) = &ctx.overlay_commands_file {
        mounts.push(Mount::Bind {
            host: commands.clone(),
            container: OVERLAY_COMMANDS_CONTAINER_PATH.to_string(),
            read_only: true,
        });
    }

    if let Some(settings) = &ctx.overlay_settings_file {
        mounts.push(Mount::Bind {
            host: settings.clone(),
            container: OVERLAY_SETTINGS_CONTAINER_PATH.to_string(),
            read_only: true,
        });
    }

    if let Some(browser_config) = &ctx.browser_config_file {
        mounts.push(Mount::Bind {
            host: browser_config.clone(),
            container: BROWSER_CONFIG_CONTAINER_PATH.to_string(),
            read_only: true,
        });
    }

    mounts
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::strategy;

    fn base_ctx() -> MountContext<'static> {
        MountContext {
            worktree: PathBuf::from("/home/me/project"),
            credential_store: PathBuf::from("/home/me/.yolo/credentials"),
            session_dir: PathBuf::from("/home/me/.yolo/sessions/a1b2c3d4"),
            agent_config_dir: None,
            hash: "a1b2c3d4".parse().unwrap(),
            strategy: &strategy::NODE,
            worktree_common_dir: None,
            overlay_commands_file: None,
            overlay_settings_file: None,
            browser_config_file: None,
            container_prefix: "yolo",
        }
    }

    #[test]
    fn minimal_plan_has_three_entries_plus_caches() {
        let ctx = base_ctx();
        let mounts = plan(&ctx);
        // workspace, credentials, session + 1 node_modules cache
        assert_eq!(mounts.len(), 4);
        assert_eq!(mounts[0].container_path(), WORKSPACE_CONTAINER_PATH);
        assert_eq!(mounts[1].container_path(), CREDENTIAL_CONTAINER_PATH);
        assert_eq!(mounts[2].container_path(), SESSION_CONTAINER_PATH);
    }

    #[test]
    fn optional_mounts_append_in_fixed_order() {
        let mut ctx = base_ctx();
        ctx.agent_config_dir = Some(PathBuf::from("/home/me/.config/agent"));
        ctx.overlay_commands_file = Some(PathBuf::from("/home/me/project/.agent/commands"));
        ctx.overlay_settings_file = Some(PathBuf::from("/home/me/project/.agent/settings.json"));
        ctx.browser_config_file = Some(PathBuf::from("/tmp/tool-server.json"));

        let mounts = plan(&ctx);
        let paths: Vec<&str> = mounts.iter().map(Mount::container_path).collect();
        assert_eq!(
            paths,
            vec![
                WORKSPACE_CONTAINER_PATH,
                CREDENTIAL_CONTAINER_PATH,
                SESSION_CONTAINER_PATH,
                AGENT_CONFIG_CONTAINER_PATH,
                "/home/agent/.cache/node_modules",
                OVERLAY_COMMANDS_CONTAINER_PATH,
                OVERLAY_SETTINGS_CONTAINER_PATH,
                BROWSER_CONFIG_CONTAINER_PATH,
            ]
        );
    }

    #[test]
    fn cache_volume_names_are_namespaced_by_hash_and_strategy() {
        let ctx = base_ctx();
        let mounts = plan(&ctx);
        match &mounts[3] {
            Mount::NamedVolume { volume, .. } => assert_eq!(volume, "yolo-a1b2c3d4-node-node_modules"),
            _ => panic!("expected a named volume"),
        }
    }
}
