use clap::Args;
use yolo::docker::{self, Engine};
use yolo::errors::Result;
use yolo::extensions::{CommandExt, OutputExt};

#[derive(Args, Debug)]
pub struct ListImages {
    /// Provide verbose diagnostic output.
    #[clap(short, long)]
    pub verbose: bool,
    /// Container engine (such as docker or podman).
    #[clap(long)]
    pub engine: Option<String>,
}

impl ListImages {
    pub fn run(self, engine: Engine) -> Result<()> {
        let stdout = docker::engine::subcommand(&engine, "images")
            .args(["--filter", "reference=yolo/*"])
            .args(["--format", "{{.Repository}}:{{.Tag}}\t{{.Size}}"])
            .run_and_get_output(self.verbose)?
            .stdout()?;
        for line in stdout.lines() {
            println!("{line}");
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PruneImages {
    /// Provide verbose diagnostic output.
    #[clap(short, long)]
    pub verbose: bool,
    /// Remove dangling yolo images. Default is a dry run.
    #[clap(short, long)]
    pub execute: bool,
    /// Container engine (such as docker or podman).
    #[clap(long)]
    pub engine: Option<String>,
}

impl PruneImages {
    pub fn run(self, engine: Engine) -> Result<()> {
        let stdout = docker::engine::subcommand(&engine, "images")
            .args(["--filter", "reference=yolo/*", "--filter", "dangling=true"])
            .args(["--format", "{{.ID}}"])
            .run_and_get_output(self.verbose)?
            .stdout()?;

        for id in stdout.lines().filter(|l| !l.is_empty()) {
            if self.execute {
                docker::engine::subcommand(&engine, "rmi").arg(id).run(self.verbose)?;
                println!("removed {id}");
            } else {
                println!("would remove {id} (pass --execute to apply)");
            }
        }
        Ok(())
    }
}
