use clap::Args;
use yolo::docker::{self, Engine};
use yolo::errors::Result;
use yolo::extensions::{CommandExt, OutputExt};

#[derive(Args, Debug)]
pub struct ListContainers {
    /// Provide verbose diagnostic output.
    #[clap(short, long)]
    pub verbose: bool,
    /// Container engine (such as docker or podman).
    #[clap(long)]
    pub engine: Option<String>,
}

impl ListContainers {
    pub fn run(self, engine: Engine) -> Result<()> {
        let stdout = docker::engine::subcommand(&engine, "ps")
            .args(["-a", "--filter", "name=^yolo-"])
            .args(["--format", "{{.Names}}\t{{.State}}"])
            .run_and_get_output(self.verbose)?
            .stdout()?;
        for line in stdout.lines() {
            println!("{line}");
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PruneContainers {
    /// Provide verbose diagnostic output.
    #[clap(short, long)]
    pub verbose: bool,
    /// Remove stopped containers. Default is a dry run.
    #[clap(short, long)]
    pub execute: bool,
    /// Container engine (such as docker or podman).
    #[clap(long)]
    pub engine: Option<String>,
}

impl PruneContainers {
    pub fn run(self, engine: Engine) -> Result<()> {
        let stdout = docker::engine::subcommand(&engine, "ps")
            .args(["-a", "--filter", "name=^yolo-", "--filter", "status=exited"])
            .args(["--format", "{{.Names}}"])
            .run_and_get_output(self.verbose)?
            .stdout()?;

        for name in stdout.lines().filter(|l| !l.is_empty()) {
            if self.execute {
                docker::engine::container_rm(&engine, name, self.verbose)?;
                println!("removed {name}");
            } else {
                println!("would remove {name} (pass --execute to apply)");
            }
        }
        Ok(())
    }
}
