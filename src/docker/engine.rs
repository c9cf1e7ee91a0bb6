//! Container runtime discovery and the small set of subprocess primitives
//! everything else in `docker/` is built from. Grounded directly on the
//! `Engine`/`EngineType`/`ContainerState` trio and the `volume_*`/
//! `container_*` helpers.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use time::OffsetDateTime;

use crate::errors::*;
use crate::extensions::CommandExt;

const DOCKER: &str = "docker";
const PODMAN: &str = "podman";

/// Rebuild trigger: an image older than this is considered stale even if it
/// still exists, unless the caller explicitly forces a build.
pub const STALE_IMAGE_AGE_DAYS: i64 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineType {
    Docker,
    Podman,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Engine {
    pub kind: EngineType,
    pub path: PathBuf,
}

impl Engine {
    pub fn discover(verbose: bool) -> Result<Engine> {
        let path = find_binary()
            .map_err(|_| eyre::eyre!("no container engine found"))
            .with_suggestion(|| "is docker or podman installed and on PATH?")?;
        let kind = probe_engine_type(&path, verbose)?;
        Ok(Engine { path, kind })
    }

    pub fn from_path(path: PathBuf, verbose: bool) -> Result<Engine> {
        let kind = probe_engine_type(&path, verbose)?;
        Ok(Engine { path, kind })
    }
}

fn find_binary() -> std::result::Result<PathBuf, which::Error> {
    if let Ok(ce) = env::var("YOLO_CONTAINER_ENGINE") {
        which::which(ce)
    } else {
        which::which(DOCKER).or_else(|_| which::which(PODMAN))
    }
}

fn probe_engine_type(path: &Path, verbose: bool) -> Result<EngineType> {
    let stdout = Command::new(path)
        .arg("--help")
        .run_and_get_stdout(verbose)?
        .to_lowercase();

    if stdout.contains("podman") {
        Ok(EngineType::Podman)
    } else if stdout.contains("docker") && !stdout.contains("emulate") {
        Ok(EngineType::Docker)
    } else {
        Ok(EngineType::Other)
    }
}

pub fn command(engine: &Engine) -> Command {
    Command::new(&engine.path)
}

pub fn subcommand(engine: &Engine, subcommand: &str) -> Command {
    let mut cmd = command(engine);
    cmd.arg(subcommand);
    cmd
}

#[derive(Debug, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Dead,
    Exited,
    DoesNotExist,
}

impl ContainerState {
    pub fn parse(state: &str) -> Result<Self> {
        match state {
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "paused" => Ok(ContainerState::Paused),
            "restarting" => Ok(ContainerState::Restarting),
            "dead" => Ok(ContainerState::Dead),
            "exited" => Ok(ContainerState::Exited),
            "" => Ok(ContainerState::DoesNotExist),
            _ => eyre::bail!("unknown container state: got {state}"),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Exited | Self::DoesNotExist)
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Self::DoesNotExist)
    }
}

pub fn container_state(engine: &Engine, container: &str, verbose: bool) -> Result<ContainerState> {
    let stdout = subcommand(engine, "ps")
        .arg("-a")
        .args(["--filter", &format!("name=^{container}$")])
        .args(["--format", "{{.State}}"])
        .run_and_get_stdout(verbose)?;
    ContainerState::parse(stdout.trim())
}

pub fn container_start(engine: &Engine, container: &str, verbose: bool) -> Result<()> {
    subcommand(engine, "start").arg(container).run(verbose)
}

pub fn container_stop(engine: &Engine, container: &str, verbose: bool) -> Result<()> {
    subcommand(engine, "stop").arg(container).run(verbose)
}

pub fn container_rm(engine: &Engine, container: &str, verbose: bool) -> Result<()> {
    subcommand(engine, "rm").args(["-f", container]).run(verbose)
}

pub fn container_attach(engine: &Engine, container: &str, entrypoint: &str, verbose: bool) -> Result<()> {
    subcommand(engine, "exec")
        .args(["-it", container])
        .arg(entrypoint)
        .run(verbose)
}

pub fn volume_exists(engine: &Engine, volume: &str, verbose: bool) -> Result<bool> {
    let output = subcommand(engine, "volume")
        .args(["inspect", volume])
        .run_and_get_output(verbose)?;
    Ok(output.status.success())
}

pub fn volume_create(engine: &Engine, volume: &str, verbose: bool) -> Result<()> {
    subcommand(engine, "volume").args(["create", volume]).run(verbose)
}

pub fn volume_ensure(engine: &Engine, volume: &str, verbose: bool) -> Result<()> {
    if !volume_exists(engine, volume, verbose)? {
        volume_create(engine, volume, verbose)?;
    }
    Ok(())
}

pub fn image_exists(engine: &Engine, image: &str, verbose: bool) -> Result<bool> {
    let output = subcommand(engine, "image")
        .args(["inspect", image])
        .run_and_get_output(verbose)?;
    Ok(output.status.success())
}

pub fn image_build(engine: &Engine, tag: &str, context: &Path, dockerfile: &Path, verbose: bool) -> Result<()> {
    subcommand(engine, "build")
        .args(["-t", tag])
        .args(["-f", &dockerfile.to_string_lossy()])
        .arg(context)
        .run(verbose)
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .wrap_err_with(|| format!("could not parse runtime timestamp `{raw}`"))
}

/// Age of `image` in whole days, from its `Created` timestamp. Spec's
/// rebuild trigger: an image older than [`STALE_IMAGE_AGE_DAYS`] is stale.
pub fn image_age_days(engine: &Engine, image: &str, verbose: bool) -> Result<i64> {
    let stdout = subcommand(engine, "image")
        .args(["inspect", image])
        .args(["--format", "{{.Created}}"])
        .run_and_get_stdout(verbose)?;
    let created = parse_timestamp(stdout.trim())?;
    Ok((OffsetDateTime::now_utc() - created).whole_days().max(0))
}

/// Human-readable uptime for a container, from its `StartedAt` timestamp.
pub fn container_uptime(engine: &Engine, container: &str, verbose: bool) -> Result<String> {
    let stdout = subcommand(engine, "inspect")
        .args(["--format", "{{.State.StartedAt}}"])
        .arg(container)
        .run_and_get_stdout(verbose)?;
    let started = parse_timestamp(stdout.trim())?;
    Ok(humanize_duration(OffsetDateTime::now_utc() - started))
}

fn humanize_duration(elapsed: time::Duration) -> String {
    let total_seconds = elapsed.whole_seconds().max(0);
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_state_parses_known_states() {
        assert_eq!(ContainerState::parse("running").unwrap(), ContainerState::Running);
        assert_eq!(ContainerState::parse("").unwrap(), ContainerState::DoesNotExist);
        assert!(ContainerState::parse("bogus").is_err());
    }

    #[test]
    fn does_not_exist_and_exited_are_stopped() {
        assert!(ContainerState::DoesNotExist.is_stopped());
        assert!(ContainerState::Exited.is_stopped());
        assert!(!ContainerState::Running.is_stopped());
    }

    #[test]
    fn does_not_exist_is_the_only_state_that_does_not_exist() {
        assert!(!ContainerState::DoesNotExist.exists());
        assert!(ContainerState::Created.exists());
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        assert!(parse_timestamp("2024-01-02T15:04:05.123456789Z").is_ok());
    }

    #[test]
    fn humanize_duration_picks_the_coarsest_useful_unit() {
        assert_eq!(humanize_duration(time::Duration::minutes(5)), "5m");
        assert_eq!(humanize_duration(time::Duration::hours(3) + time::Duration::minutes(20)), "3h 20m");
        assert_eq!(humanize_duration(time::Duration::days(2) + time::Duration::hours(4)), "2d 4h");
    }
}
