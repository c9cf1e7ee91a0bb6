use std::path::{Path, PathBuf};

use yolo::cli;
use yolo::detect;
use yolo::docker::{self, runspec::RunSpec};
use yolo::errors::*;
use yolo::extensions::CommandExt;
use yolo::file::PathExt;
use yolo::ident;
use yolo::mount::MountContext;
use yolo::orchestrator::{Home, Orchestrator};
use yolo::overlay::{self, Consultation, Overlay};
use yolo::port::{self, Mode as PortMode};
use yolo::port_layout::PortLayoutTracker;
use yolo::session;
use yolo::shell::{MessageInfo, Verbosity};

/// Default container ports a strategy without an overlay override exposes,
/// with host initially equal to container — a project overlay's `ports`
/// file is the real source of truth once one exists, and may pin a
/// different host for the same container port.
fn default_ports_for(strategy: &str) -> Vec<port::PortPair> {
    let containers: &[u16] = match strategy {
        "rails" | "jekyll" => &[3000],
        "node" => &[3000, 5173],
        "python" => &[8000],
        "go" => &[8080],
        "android" => &[],
        "rust" => &[],
        _ => &[],
    };
    containers.iter().map(|&container| port::PortPair { container, host: container }).collect()
}

fn find_worktree() -> Result<PathBuf> {
    let cwd = std::env::current_dir().wrap_err("could not determine current directory")?;
    yolo::file::canonicalize(&cwd)
}

/// Without `--yolo`, this binary is a pure passthrough to the agent CLI on
/// the host (spec.md §6): no detection, no container, no mounts.
fn run_host_passthrough(passthrough: &[String]) -> Result<i32> {
    let status = std::process::Command::new(yolo::config::AGENT_BINARY)
        .args(passthrough)
        .status()
        .wrap_err_with(|| format!("could not execute `{}`", yolo::config::AGENT_BINARY))?;
    Ok(status.code().unwrap_or(1))
}

/// `--setup-token`: run the agent's own interactive credential bootstrap on
/// the host, inheriting the controlling terminal, before continuing with
/// the rest of the orchestration (spec.md §6).
fn run_setup_token(verbose: bool) -> Result<()> {
    std::process::Command::new(yolo::config::AGENT_BINARY)
        .arg("--setup-token")
        .run(verbose)
}

fn run() -> Result<i32> {
    yolo::errors::install_panic_hook()?;
    yolo::errors::install_termination_hook()?;

    let args = cli::parse()?;

    if args.help {
        print_help();
        return Ok(0);
    }
    if args.version {
        println!("yolo {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    // `--detect <path>` is a standalone diagnostic: print the best-detected
    // strategy name and exit, silently if none, touching nothing else.
    if let Some(path) = &args.detect {
        let deep = yolo::config::env_flag(yolo::config::DETECT_DEEP_VAR);
        let detection = if deep { detect::detect_deep(path) } else { detect::detect(path) };
        if let Some(d) = detection {
            println!("{}", d.strategy.name);
        }
        return Ok(0);
    }

    let verbosity = if args.verbose { Verbosity::Verbose } else { Verbosity::Normal };
    let ui = MessageInfo::new(verbosity);

    if !args.yolo {
        return run_host_passthrough(&args.passthrough);
    }

    if args.setup_token {
        run_setup_token(args.verbose)?;
    }

    let worktree = find_worktree().wrap_err_with(|| OrchestratorError::ProjectDiscovery)?;
    let home = Home::discover()?;
    let orch = Orchestrator::new(ui.clone(), home);

    let overlay = Overlay::discover(&worktree);
    let strategy = orch.select_strategy(&args, &worktree, overlay.as_ref())?;

    if let Some(overlay) = &overlay {
        match orch.consult_overlay(&args, Some(overlay))? {
            Consultation::Declined => return Err(OrchestratorError::OverlayUntrusted(overlay.root().to_path_buf()).into()),
            Consultation::AlreadyTrusted | Consultation::ApprovedNow => {}
        }
    }

    let hash = orch.project_hash(&worktree)?;
    let container_name = ident::container_name(orch.container_prefix, &hash, strategy.name);
    let session_dir = session::canonical_dir(&orch.home.sessions_root(), &worktree);
    std::fs::create_dir_all(&session_dir)
        .wrap_err_with(|| format!("could not create `{}`", session_dir.display()))?;

    let engine = docker::Engine::discover(args.verbose).map_err(|_| OrchestratorError::Preflight)?;

    orch.migrate_session(&hash, &worktree, &engine, &container_name, args.verbose)?;

    if args.reset {
        docker::engine::container_stop(&engine, &container_name, args.verbose).ok();
        docker::engine::container_rm(&engine, &container_name, args.verbose).ok();
        ui.success(format!("reset `{container_name}`"));
    }

    let tracker = PortLayoutTracker::new(session_dir.join("ports"));
    // An overlay's `ports` file replaces the strategy's own default list
    // (spec.md §4.6 step 4); its host/container pairs are carried through
    // as-is, so an explicit remap (e.g. `3011:3000`) survives into
    // resolution instead of collapsing to host == container. The
    // session-local tracker still owns drift detection against whatever
    // list is actually in effect.
    let overlay_ports: Option<Vec<port::PortPair>> = overlay
        .as_ref()
        .and_then(Overlay::ports_file)
        .map(|path| PortLayoutTracker::new(path).stored_layout());
    let default_ports = overlay_ports.unwrap_or_else(|| default_ports_for(strategy.name));
    let port_mode = if args.print { PortMode::Headless } else { PortMode::Interactive };
    let ports = orch.resolve_ports(&tracker, &default_ports, port_mode, &args)?;

    // An overlay's `env` file seeds the environment (spec.md §4.6 step 3);
    // `--env`/`--env-file` are a run-time override, so they're applied after
    // and win on a key collision.
    let mut env: Vec<(String, String)> = match overlay.as_ref().and_then(Overlay::env_file) {
        Some(path) => overlay::parse_env_file(&path)?,
        None => Vec::new(),
    };
    env.extend(args.env.clone());
    for env_file in &args.env_file {
        env.extend(overlay::parse_env_file(env_file)?);
    }

    let credential = orch.resolve_credential(&args, &worktree)?;

    let browser_config_file = if args.chrome {
        let port = orch.browser_port(&hash);
        let profile_dir = yolo::browser::profile_dir_for(&session_dir);
        yolo::browser::ensure_running(port, &profile_dir)?;
        let config = yolo::browser::generate_tool_server_config(port, false);
        let dest = session_dir.join("tool-server.json");
        yolo::browser::write_tool_server_config(
            &config,
            overlay.as_ref().and_then(Overlay::settings_file).as_deref(),
            &dest,
        )?;
        ui.dim(format!("browser control-plane on port {port}"));
        Some(dest)
    } else {
        None
    };

    let credential_store = orch.home.credential_store();
    std::fs::create_dir_all(&credential_store)
        .wrap_err_with(|| format!("could not create `{}`", credential_store.display()))?;

    let mount_ctx = MountContext {
        worktree: worktree.clone(),
        credential_store,
        session_dir: session_dir.clone(),
        agent_config_dir: None,
        hash,
        strategy,
        worktree_common_dir: None,
        overlay_commands_file: overlay.as_ref().and_then(Overlay::commands_file),
        overlay_settings_file: overlay.as_ref().and_then(Overlay::settings_file),
        browser_config_file,
        container_prefix: orch.container_prefix,
    };
    let mounts = orch.mount_plan(&mount_ctx);

    if let Some(credential) = &credential {
        env.push(("YOLO_FORGE_TOKEN".to_string(), credential.token.clone()));
    }

    let extra_args = match std::env::var(yolo::config::DOCKER_OPTS_VAR) {
        Ok(value) if !value.trim().is_empty() => docker::runspec::parse_docker_opts(&value)?,
        _ => Vec::new(),
    };

    let image = strategy.base_image.to_string();
    let workspace_posix = Path::new(yolo::mount::WORKSPACE_CONTAINER_PATH)
        .as_posix_relative()
        .unwrap_or_else(|_| yolo::mount::WORKSPACE_CONTAINER_PATH.to_string());

    let spec = RunSpec {
        image,
        name: container_name.clone(),
        mounts,
        ports,
        env,
        workdir: workspace_posix,
        host_network: false,
        entrypoint: None,
        command: args.passthrough.clone(),
        extra_args,
    };

    if args.print {
        println!("{}", docker::runspec::to_shell_string(&engine.path.to_string_lossy(), &spec));
        return Ok(0);
    }

    let dockerfile_context = overlay.as_ref().and_then(|o| {
        o.dockerfile().map(|d| (worktree.as_path(), d))
    });

    orch.reconcile(
        &engine,
        &container_name,
        &spec,
        dockerfile_context.as_ref().map(|(c, d)| (*c, d.as_path())),
        args.force_build,
        args.verbose,
    )?;

    ui.success(format!("attaching to `{container_name}`"));
    docker::engine::container_attach(&engine, &container_name, yolo::config::AGENT_BINARY, args.verbose)?;

    Ok(0)
}

fn print_help() {
    println!(
        "yolo {}\n\n\
         Zero setup containerized sandboxes for AI coding agents.\n\n\
         USAGE:\n    yolo [OPTIONS] [-- AGENT ARGS]\n\n\
         OPTIONS:\n\
         \x20   --yolo                enter containerized mode (otherwise a pure passthrough to the host agent)\n\
         \x20   --strategy <NAME>     pin the project strategy instead of auto-detecting\n\
         \x20   --build, --force-build  rebuild the image and recreate the container\n\
         \x20   --reset               remove the existing container before running\n\
         \x20   --chrome              launch the browser control-plane\n\
         \x20   --detect <PATH>       print the best-detected strategy for PATH and exit\n\
         \x20   --print, -p           print the container invocation instead of running it\n\
         \x20   --env <K=V>           set an extra environment variable\n\
         \x20   --env-file <PATH>     load environment variables from a file\n\
         \x20   --trust-credential    allow a broad-scope forge credential\n\
         \x20   --trust-overlay       trust this project's `.yolo/` overlay without prompting\n\
         \x20   --setup-token         interactively store a forge credential\n\
         \x20   --verbose, -v         print the commands being run\n\
         \x20   --help, -h            print this message\n\
         \x20   --version, -V         print the version",
        env!("CARGO_PKG_VERSION")
    );
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let ui = MessageInfo::default();
            ui.fail(format!("{err:#}"));
            std::process::exit(1);
        }
    }
}
