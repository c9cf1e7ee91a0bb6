//! Translates a fully-resolved invocation (mounts, ports, env, image, name)
//! into the argument list for `docker run`/`docker create`. Kept as a pure
//! function from data to `Vec<String>` so it can be tested without
//! shelling out, the same seam `cross`'s `docker_mount`/`docker_cwd`/
//! `docker_envvars` helpers provide by taking `&mut Command` but acting on
//! plain data.

use crate::mount::Mount;
use crate::port::PortPair;

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub mounts: Vec<Mount>,
    pub ports: Vec<PortPair>,
    pub env: Vec<(String, String)>,
    pub workdir: String,
    pub host_network: bool,
    pub entrypoint: Option<String>,
    pub command: Vec<String>,
    /// Extra raw `docker run` flags from `YOLO_DOCKER_OPTS`, already split
    /// on shell word boundaries. Passed through verbatim, after the
    /// generated flags so they can override them.
    pub extra_args: Vec<String>,
}

/// Parse `YOLO_DOCKER_OPTS`-style free text the way `docker run`'s own
/// `-e`/`-v` repeatable flags are written on a command line.
pub fn parse_docker_opts(value: &str) -> crate::errors::Result<Vec<String>> {
    shell_words::split(value).map_err(|e| eyre::eyre!("could not parse docker opts `{value}`: {e}"))
}

/// Render `spec` as the argument list that would follow `docker create -d`.
/// Order: mounts, then ports (skipped entirely under `host_network`, since
/// a host-network container shares the host's port space directly), then
/// env, then workdir, then entrypoint, then image, then the trailing
/// command.
pub fn to_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["--name".to_string(), spec.name.clone()];

    if spec.host_network {
        args.push("--network".to_string());
        args.push("host".to_string());
    }

    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(mount_arg(mount));
    }

    if !spec.host_network {
        for port in &spec.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", port.host, port.container));
        }
    }

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    args.push("-w".to_string());
    args.push(spec.workdir.clone());

    if let Some(entrypoint) = &spec.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }

    args.extend(spec.extra_args.iter().cloned());

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());

    args
}

fn mount_arg(mount: &Mount) -> String {
    match mount {
        Mount::Bind { host, container, read_only } => {
            let suffix = if *read_only { ":ro" } else { "" };
            format!("{}:{}{}", host.display(), container, suffix)
        }
        Mount::NamedVolume { volume, container } => format!("{volume}:{container}"),
    }
}

/// Render `spec` as a single shell-escaped string suitable for `--print`'s
/// dry-run preview (spec.md §6, SPEC_FULL.md §B.3): never executed, only
/// displayed.
pub fn to_shell_string(engine_path: &str, spec: &RunSpec) -> String {
    let mut parts = vec![engine_path.to_string(), "run".to_string(), "-d".to_string()];
    parts.extend(to_args(spec));
    parts
        .iter()
        .map(|p| shell_escape::escape(p.into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_spec() -> RunSpec {
        RunSpec {
            image: "yolo/node:latest".to_string(),
            name: "yolo-a1b2c3d4-node".to_string(),
            mounts: vec![
                Mount::Bind {
                    host: PathBuf::from("/home/me/project"),
                    container: "/workspace".to_string(),
                    read_only: false,
                },
                Mount::NamedVolume {
                    volume: "yolo-a1b2c3d4-node-node_modules".to_string(),
                    container: "/home/agent/.cache/node_modules".to_string(),
                },
            ],
            ports: vec![PortPair { container: 3000, host: 3000 }],
            env: vec![("NODE_ENV".to_string(), "development".to_string())],
            workdir: "/workspace".to_string(),
            host_network: false,
            entrypoint: None,
            command: vec!["agent".to_string()],
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn extra_args_are_appended_before_the_image() {
        let spec = RunSpec {
            extra_args: vec!["--memory".to_string(), "2g".to_string()],
            ..sample_spec()
        };
        let args = to_args(&spec);
        let image_pos = args.iter().position(|a| a == "yolo/node:latest").unwrap();
        assert_eq!(args[image_pos - 2], "--memory");
        assert_eq!(args[image_pos - 1], "2g");
    }

    #[test]
    fn parse_docker_opts_splits_on_shell_word_boundaries() {
        let parsed = parse_docker_opts("--memory 2g --cpus '1.5'").unwrap();
        assert_eq!(parsed, vec!["--memory", "2g", "--cpus", "1.5"]);
    }

    #[test]
    fn renders_binds_and_named_volumes() {
        let args = to_args(&sample_spec());
        assert!(args.contains(&"/home/me/project:/workspace".to_string()));
        assert!(args.contains(&"yolo-a1b2c3d4-node-node_modules:/home/agent/.cache/node_modules".to_string()));
    }

    #[test]
    fn publishes_ports_unless_host_network() {
        let mut spec = sample_spec();
        let args = to_args(&spec);
        assert!(args.contains(&"3000:3000".to_string()));

        spec.host_network = true;
        let args = to_args(&spec);
        assert!(!args.iter().any(|a| a == "3000:3000"));
        assert!(args.contains(&"host".to_string()));
    }

    #[test]
    fn read_only_binds_get_ro_suffix() {
        let spec = RunSpec {
            mounts: vec![Mount::Bind {
                host: PathBuf::from("/home/me/.yolo/credentials"),
                container: "/home/agent/.credentials".to_string(),
                read_only: true,
            }],
            ..sample_spec()
        };
        let args = to_args(&spec);
        assert!(args.contains(&"/home/me/.yolo/credentials:/home/agent/.credentials:ro".to_string()));
    }

    #[test]
    fn trailing_command_is_appended_after_image() {
        let args = to_args(&sample_spec());
        let image_pos = args.iter().position(|a| a == "yolo/node:latest").unwrap();
        assert_eq!(args[image_pos + 1], "agent");
    }
}
