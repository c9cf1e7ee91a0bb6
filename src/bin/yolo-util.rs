#![deny(missing_debug_implementations, rust_2018_idioms)]

use clap::{Parser, Subcommand};
use yolo::docker::Engine;

mod commands;

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List yolo containers in local storage.
    Containers(ContainersCmd),
    /// List yolo images in local storage.
    Images(ImagesCmd),
    /// Audit or rescind previously-trusted project overlays.
    Trust(TrustCmd),
}

#[derive(clap::Args, Debug)]
struct TrustCmd {
    #[clap(subcommand)]
    command: TrustSubcommand,
}

#[derive(Subcommand, Debug)]
enum TrustSubcommand {
    List(commands::ListTrust),
    Revoke(commands::RevokeTrust),
}

#[derive(clap::Args, Debug)]
struct ContainersCmd {
    #[clap(subcommand)]
    command: ContainersSubcommand,
}

#[derive(Subcommand, Debug)]
enum ContainersSubcommand {
    List(commands::ListContainers),
    Prune(commands::PruneContainers),
}

#[derive(clap::Args, Debug)]
struct ImagesCmd {
    #[clap(subcommand)]
    command: ImagesSubcommand,
}

#[derive(Subcommand, Debug)]
enum ImagesSubcommand {
    List(commands::ListImages),
    Prune(commands::PruneImages),
}

fn get_container_engine(engine: Option<&str>, verbose: bool) -> yolo::errors::Result<Engine> {
    match engine {
        Some(ce) => Engine::from_path(which::which(ce)?, verbose),
        None => Engine::discover(verbose),
    }
}

pub fn main() -> yolo::errors::Result<()> {
    yolo::errors::install_panic_hook()?;
    let cli = Cli::parse();
    match cli.command {
        Commands::Containers(cmd) => match cmd.command {
            ContainersSubcommand::List(args) => {
                let engine = get_container_engine(args.engine.as_deref(), args.verbose)?;
                args.run(engine)?;
            }
            ContainersSubcommand::Prune(args) => {
                let engine = get_container_engine(args.engine.as_deref(), args.verbose)?;
                args.run(engine)?;
            }
        },
        Commands::Images(cmd) => match cmd.command {
            ImagesSubcommand::List(args) => {
                let engine = get_container_engine(args.engine.as_deref(), args.verbose)?;
                args.run(engine)?;
            }
            ImagesSubcommand::Prune(args) => {
                let engine = get_container_engine(args.engine.as_deref(), args.verbose)?;
                args.run(engine)?;
            }
        },
        Commands::Trust(cmd) => match cmd.command {
            TrustSubcommand::List(args) => args.run()?,
            TrustSubcommand::Revoke(args) => args.run()?,
        },
    }

    Ok(())
}
