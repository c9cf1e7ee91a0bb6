//! ORCH: the top-level state machine that composes every other module into
//! a single `yolo` invocation.
//!
//! ```text
//! NONEXISTENT -> CREATED -> RUNNING -> STOPPED
//!      \            |          |          |
//!       \-- build --/          attach   start
//! ```
//!
//! A fresh project has no container (`NONEXISTENT`); the first successful
//! run builds an image and creates one (`CREATED`), then starts and
//! attaches to it (`RUNNING`). Detaching (the first Ctrl-C) leaves it
//! `RUNNING` for next time; `--reset` tears it down back to `NONEXISTENT`.

use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::credential;
use crate::detect;
use crate::docker::{self, ContainerState, Engine};
use crate::errors::*;
use crate::ident::{self, ProjectHash};
use crate::mount::{self, MountContext};
use crate::overlay::{self, Consultation, Overlay, TrustStore};
use crate::port::{self, Mode as PortMode};
use crate::port_layout::{Drift, PortLayoutTracker};
use crate::session;
use crate::shell::MessageInfo;
use crate::strategy::{self, Strategy};

/// Confidence a shallow detection must clear to auto-select without asking
/// (spec.md §4.2 step 3).
const AUTO_SELECT_CONFIDENCE: u32 = 80;
/// How many ranked detections the deep-detect menu shows before its "other"
/// choice (spec.md §4.2 step 4: "top-N union ordered by confidence").
const DETECTION_MENU_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Nonexistent,
    Created,
    Running,
    Stopped,
}

impl From<ContainerState> for State {
    fn from(cs: ContainerState) -> Self {
        match cs {
            ContainerState::DoesNotExist => State::Nonexistent,
            ContainerState::Running => State::Running,
            ContainerState::Created
            | ContainerState::Paused
            | ContainerState::Restarting => State::Created,
            ContainerState::Dead | ContainerState::Exited => State::Stopped,
        }
    }
}

/// Where this crate keeps everything it owns on the host, rooted at
/// `~/.yolo`. Mirrors `cross`'s `Directories`: computed once, passed
/// everywhere instead of re-derived.
pub struct Home {
    pub root: PathBuf,
}

impl Home {
    pub fn discover() -> Result<Self> {
        let home = home::home_dir().ok_or_else(|| eyre::eyre!("could not find home directory"))?;
        Ok(Home { root: home.join(".yolo") })
    }

    pub fn credential_store(&self) -> PathBuf {
        self.root.join("credentials")
    }

    /// Root of this tool's `projects/<encoded-worktree-path>` tree, mirroring
    /// the layout convention the agent itself uses for its own per-project
    /// session storage (spec.md §4.5 step 3).
    pub fn sessions_root(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn trust_list(&self) -> PathBuf {
        self.root.join("trust-list")
    }
}

pub struct Orchestrator {
    pub ui: MessageInfo,
    pub home: Home,
    pub container_prefix: &'static str,
}

impl Orchestrator {
    pub fn new(ui: MessageInfo, home: Home) -> Self {
        Orchestrator { ui, home, container_prefix: crate::config::CONTAINER_PREFIX }
    }

    /// Resolve which strategy to use, per spec.md §4.2's selection policy:
    /// an overlay-pinned strategy has the highest priority (it beats even an
    /// explicit CLI flag, §4.6), then the `--strategy` flag, then a
    /// confident shallow detection, then a deep-detect menu. `generic` is
    /// never chosen automatically — only an overlay pin, `--strategy
    /// generic`, or an explicit menu pick can select it.
    pub fn select_strategy(
        &self,
        args: &Args,
        worktree: &Path,
        overlay: Option<&Overlay>,
    ) -> Result<&'static Strategy> {
        if let Some(overlay) = overlay {
            if let Some(name) = overlay.pinned_strategy() {
                return strategy::by_name(&name)
                    .ok_or_else(|| OrchestratorError::UnknownStrategy(name).into());
            }
        }

        if let Some(name) = &args.strategy {
            return strategy::by_name(name)
                .ok_or_else(|| OrchestratorError::UnknownStrategy(name.clone()).into());
        }

        let shallow = detect::detect_all(worktree);
        let confident: Vec<&detect::Detection> =
            shallow.iter().filter(|d| d.confidence >= AUTO_SELECT_CONFIDENCE).collect();
        if confident.len() == 1 {
            let d = confident[0];
            self.ui.dim(format!("detected `{}` (confidence {})", d.strategy.name, d.confidence));
            return Ok(d.strategy);
        }

        let deep = detect::detect_all_deep(worktree);
        self.select_from_menu(&deep)
    }

    /// Step 4/5 of the selection policy: offer the union of detected
    /// strategies (top-N by confidence) plus an "other" choice that opens
    /// the full registry. Leaving the menu without choosing is a cancel
    /// (spec.md §7 "Strategy selection — user canceled the menu").
    fn select_from_menu(&self, detections: &[detect::Detection]) -> Result<&'static Strategy> {
        let mut top: Vec<&detect::Detection> = Vec::new();
        for d in detections {
            if top.len() >= DETECTION_MENU_TOP_N {
                break;
            }
            if !top.iter().any(|t| t.strategy.name == d.strategy.name) {
                top.push(d);
            }
        }

        let mut options: Vec<String> =
            top.iter().map(|d| format!("{} (confidence {})", d.strategy.name, d.confidence)).collect();
        options.push("other".to_string());

        match self.ui.choose("select a project strategy", &options, None)? {
            Some(choice) if choice <= top.len() => Ok(top[choice - 1].strategy),
            Some(_) => self.select_from_registry(),
            None => Err(OrchestratorError::StrategySelectionCancelled.into()),
        }
    }

    /// The "other" branch of the detect-deep menu: the full registry plus
    /// `generic`, the one menu path that can actually reach it.
    fn select_from_registry(&self) -> Result<&'static Strategy> {
        let mut all: Vec<&'static Strategy> = strategy::REGISTRY.iter().copied().collect();
        all.push(&strategy::GENERIC);
        let options: Vec<String> = all.iter().map(|s| s.name.to_string()).collect();
        match self.ui.choose("select a strategy", &options, None)? {
            Some(choice) => Ok(all[choice - 1]),
            None => Err(OrchestratorError::StrategySelectionCancelled.into()),
        }
    }

    /// Consult the overlay trust store, if the project has an overlay.
    /// `--trust-overlay` pre-approves without prompting (non-interactive
    /// automation, e.g. CI).
    pub fn consult_overlay(&self, args: &Args, overlay: Option<&Overlay>) -> Result<Consultation> {
        let Some(overlay) = overlay else {
            return Ok(Consultation::AlreadyTrusted);
        };
        let store = TrustStore::new(self.home.trust_list());
        if args.trust_overlay {
            store.trust(&overlay.content_hash()?)?;
            return Ok(Consultation::ApprovedNow);
        }
        overlay::consult(overlay, &store, &self.ui)
    }

    /// Resolve a forge credential, enforcing the broad-scope refusal policy
    /// unless the caller explicitly opted in with `--trust-credential` or
    /// `YOLO_NO_FORGE` disables forge integration entirely.
    pub fn resolve_credential(&self, args: &Args, worktree: &Path) -> Result<Option<credential::Credential>> {
        if crate::config::env_flag(crate::config::NO_FORGE_VAR) {
            return Ok(None);
        }
        let Some(found) = credential::find(worktree) else {
            return Ok(None);
        };
        let validation = credential::validate(&found)?;
        if validation.class == credential::ScopeClass::Broad && !args.trust_credential {
            return Err(OrchestratorError::CredentialBroadScope(validation.scopes).into());
        }
        Ok(Some(found))
    }

    /// Resolve the host-side ports for `requested` (the strategy's defaults,
    /// or an overlay's own `host:container` pairs), consulting and updating
    /// the project's persisted port layout. `requested.host` is only a
    /// starting point: a conflict remaps the host side and leaves
    /// `container` untouched, so an overlay's explicit remap survives even
    /// when it has to move again (spec.md §3 `PortPair`).
    pub fn resolve_ports(
        &self,
        tracker: &PortLayoutTracker,
        requested: &[port::PortPair],
        mode: PortMode,
        args: &Args,
    ) -> Result<Vec<port::PortPair>> {
        let resolved: Vec<port::PortPair> = requested
            .iter()
            .map(|&pair| {
                port::resolve_pair(pair, mode)
                    .ok_or(OrchestratorError::PortConflictUnresolvable(pair.container))
            })
            .collect::<std::result::Result<_, _>>()?;

        match tracker.detect_drift(&resolved) {
            Drift::Absent => tracker.reset(&resolved)?,
            Drift::Clean => {}
            Drift::Drifted { .. } if args.reset => tracker.reset(&resolved)?,
            Drift::Drifted { stored, current } => {
                self.ui.warn(format!(
                    "port layout drifted (stored {stored}, current {current}); keeping the stored layout"
                ));
                tracker.keep();
            }
        }

        Ok(resolved)
    }

    /// Reconcile the container for `name` to `Running`, building it first
    /// if it doesn't exist yet (or `--build`/`--force-build` was passed).
    pub fn reconcile(
        &self,
        engine: &Engine,
        name: &str,
        spec: &docker::RunSpec,
        dockerfile_context: Option<(&Path, &Path)>,
        force_build: bool,
        verbose: bool,
    ) -> Result<State> {
        let state: State = docker::engine::container_state(engine, name, verbose)?.into();

        if force_build && state != State::Nonexistent {
            docker::engine::container_stop(engine, name, verbose).ok();
            docker::engine::container_rm(engine, name, verbose)?;
        }

        let state = if force_build { State::Nonexistent } else { state };

        match state {
            State::Nonexistent => {
                let exists = docker::engine::image_exists(engine, &spec.image, verbose)?;
                let stale = exists
                    && docker::engine::image_age_days(engine, &spec.image, verbose)
                        .map(|age| age > docker::engine::STALE_IMAGE_AGE_DAYS)
                        .unwrap_or(false);
                if !exists || stale {
                    if let Some((context, dockerfile)) = dockerfile_context {
                        if stale {
                            self.ui.info(format!("rebuilding stale image `{}` (older than {} days)", spec.image, docker::engine::STALE_IMAGE_AGE_DAYS));
                        } else {
                            self.ui.info(format!("building image `{}`", spec.image));
                        }
                        docker::engine::image_build(engine, &spec.image, context, dockerfile, verbose)
                            .map_err(|_| OrchestratorError::ImageBuild)?;
                    }
                }
                for mount in &spec.mounts {
                    if let crate::mount::Mount::NamedVolume { volume, .. } = mount {
                        docker::engine::volume_ensure(engine, volume, verbose)?;
                    }
                }
                docker::create_and_start(engine, spec, verbose)
                    .map_err(|_| OrchestratorError::Container)?;
                Ok(State::Running)
            }
            State::Stopped | State::Created => {
                docker::engine::container_start(engine, name, verbose)
                    .map_err(|_| OrchestratorError::Container)?;
                Ok(State::Running)
            }
            State::Running => Ok(State::Running),
        }
    }

    pub fn project_hash(&self, worktree: &Path) -> Result<ProjectHash> {
        ProjectHash::for_worktree(worktree)
    }

    pub fn mount_plan(&self, ctx: &MountContext) -> Vec<crate::mount::Mount> {
        mount::plan(ctx)
    }

    pub fn browser_port(&self, hash: &ProjectHash) -> u16 {
        ident::browser_port_for(hash)
    }

    pub fn migrate_session(
        &self,
        hash: &ProjectHash,
        worktree: &Path,
        engine: &Engine,
        container_name: &str,
        verbose: bool,
    ) -> Result<bool> {
        session::migrate(&self.home.sessions_root(), hash, worktree, Some(engine), container_name, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_states_map_to_orchestrator_states() {
        assert_eq!(State::from(ContainerState::DoesNotExist), State::Nonexistent);
        assert_eq!(State::from(ContainerState::Running), State::Running);
        assert_eq!(State::from(ContainerState::Created), State::Created);
        assert_eq!(State::from(ContainerState::Exited), State::Stopped);
    }

    #[test]
    fn select_strategy_prefers_explicit_flag_over_detection() {
        let orch = Orchestrator::new(MessageInfo::default(), Home { root: PathBuf::from("/tmp/yolo-test-home") });
        let mut args = Args::default();
        args.strategy = Some("rust".to_string());
        let strat = orch.select_strategy(&args, Path::new("/tmp"), None).unwrap();
        assert_eq!(strat.name, "rust");
    }

    #[test]
    fn select_strategy_rejects_unknown_explicit_name() {
        let orch = Orchestrator::new(MessageInfo::default(), Home { root: PathBuf::from("/tmp/yolo-test-home") });
        let mut args = Args::default();
        args.strategy = Some("not-a-real-strategy".to_string());
        assert!(orch.select_strategy(&args, Path::new("/tmp"), None).is_err());
    }

    #[test]
    fn overlay_pinned_strategy_beats_the_cli_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".yolo")).unwrap();
        std::fs::write(dir.path().join(".yolo/strategy"), "generic\n").unwrap();
        let overlay = Overlay::discover(dir.path()).unwrap();

        let orch = Orchestrator::new(MessageInfo::default(), Home { root: PathBuf::from("/tmp/yolo-test-home") });
        let mut args = Args::default();
        args.strategy = Some("rails".to_string());

        let strat = orch.select_strategy(&args, dir.path(), Some(&overlay)).unwrap();
        assert_eq!(strat.name, "generic");
    }

    #[test]
    fn ambiguous_detection_without_a_terminal_is_a_cancel_not_a_generic_fallback() {
        let dir = tempfile::tempdir().unwrap();
        // no markers at all: shallow detect is empty, deep detect is empty,
        // the menu has nothing but "other" and a non-interactive `choose`
        // returns the `None` default, which must cancel rather than fall
        // back to generic.
        let orch = Orchestrator::new(MessageInfo::default(), Home { root: PathBuf::from("/tmp/yolo-test-home") });
        let args = Args::default();
        assert!(orch.select_strategy(&args, dir.path(), None).is_err());
    }
}
