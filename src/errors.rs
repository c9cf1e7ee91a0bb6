use std::sync::atomic::{AtomicBool, Ordering};

pub use color_eyre::Section;
pub use eyre::Context;
pub use eyre::Result;

/// Set once the first interrupt has been handled; a second interrupt exits immediately.
pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn install_panic_hook() -> Result<()> {
    color_eyre::config::HookBuilder::new()
        .display_env_section(false)
        .install()
}

/// Installs the Ctrl-C handler implementing the two-stage cancellation model:
/// the first interrupt flips `INTERRUPTED` so an in-flight attach bridge can
/// unwind cleanly (the container is left running); a second interrupt exits
/// the process outright.
pub fn install_termination_hook() -> Result<()> {
    ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(Into::into)
}

pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Errors surfaced while shelling out to the container runtime or other
/// host binaries (rustup-style `cross` does the same with `CommandError`).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("`{1}` failed with exit code: {0}")]
    NonZeroExitCode(std::process::ExitStatus, String),
    #[error("could not execute `{0}`")]
    CouldNotExecute(#[source] Box<dyn std::error::Error + Send + Sync>, String),
    #[error("`{0:?}` output was not UTF-8")]
    Utf8Error(#[source] std::string::FromUtf8Error, std::process::Output),
}

/// The surface-facing error kinds from spec.md §7. ORCH is the sole
/// renderer: each variant maps to exactly one `UI.fail` message, with
/// `.suggestion()`/`.warning()` sections attached at the call site for the
/// accompanying `UI.dim` hints.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("container runtime is not available")]
    Preflight,
    #[error("could not resolve a project worktree")]
    ProjectDiscovery,
    #[error("strategy selection was cancelled")]
    StrategySelectionCancelled,
    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),
    #[error("overlay at `{0}` was not trusted")]
    OverlayUntrusted(std::path::PathBuf),
    #[error("no credential found")]
    CredentialNotFound,
    #[error("credential validation failed")]
    CredentialInvalid,
    #[error("credential has broad scopes: {0:?}")]
    CredentialBroadScope(Vec<String>),
    #[error("port conflict could not be resolved: {0}")]
    PortConflictUnresolvable(u16),
    #[error("image build failed")]
    ImageBuild,
    #[error("container could not be created or started")]
    Container,
    #[error("browser control-plane could not be reached")]
    BrowserControlPlane,
}
