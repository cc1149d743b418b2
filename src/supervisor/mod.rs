//! Boots the hub, waits for it, and runs the transport in the foreground
//!
//! One [`Supervisor::run`] call walks the state machine in [`state`]:
//! resolve paths, sweep stale processes, launch the hub with a temp config,
//! poll the shared log until the mandatory components report in, read the
//! hub's address, then block on the transport process. A SIGINT/SIGTERM
//! listener races that flow; whichever finishes first, the owned
//! [`ProcessTree`] is shut down exactly once.

pub mod process_tree;
pub mod readiness;
pub mod stale;
pub mod state;

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::context::{RunContext, absolutize};
use crate::descriptor::{BuiltinBinaries, HUB_BINARY, TRANSPORT_BINARY, build_hub_config};
use crate::error::{Result, SupervisorError};
use crate::registry::PluginRegistry;

pub use process_tree::{ProcessHandle, ProcessTree, SHUTDOWN_GRACE};
pub use readiness::{READY_MARKER, ReadinessPolicy};
pub use state::SupervisorState;

pub const LOG_FILE_NAME: &str = ".orchestra-mcp.log";
pub const PID_FILE_NAME: &str = ".orchestra-mcp.pid";

/// Exit code used for every fatal error
pub const FAILURE_EXIT_CODE: i32 = 1;

/// User-supplied serve options, before resolution
#[derive(Debug, Clone, Default)]
pub struct ServeSettings {
    pub workspace: PathBuf,
    /// May start with `~`
    pub certs_dir: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Absolute paths for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub workspace: PathBuf,
    pub certs_dir: PathBuf,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
}

/// How a run ended when no fatal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The transport exited on its own
    Completed { code: i32 },
    /// A termination signal arrived first
    Interrupted { signal: &'static str },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed { code } => *code,
            RunOutcome::Interrupted { .. } => 0,
        }
    }
}

pub struct Supervisor {
    ctx: RunContext,
    settings: ServeSettings,
    readiness: ReadinessPolicy,
    stale_grace: Duration,
    shutdown_grace: Duration,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(ctx: RunContext, settings: ServeSettings) -> Self {
        Self {
            ctx,
            settings,
            readiness: ReadinessPolicy::default(),
            stale_grace: stale::STALE_GRACE,
            shutdown_grace: SHUTDOWN_GRACE,
            state: SupervisorState::Init,
        }
    }

    pub fn with_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.readiness = policy;
        self
    }

    pub fn with_grace_periods(mut self, stale: Duration, shutdown: Duration) -> Self {
        self.stale_grace = stale;
        self.shutdown_grace = shutdown;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn transition(&mut self, next: SupervisorState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Ignoring illegal state transition");
            return;
        }
        debug!(from = %self.state, to = %next, "Supervisor state");
        self.state = next;
    }

    /// Compute every absolute path the run needs
    pub fn resolve_paths(&self) -> Result<RunPaths> {
        let workspace = absolutize(&self.settings.workspace).map_err(path_error("workspace"))?;

        let certs_dir = match &self.settings.certs_dir {
            Some(raw) => self.ctx.expand_home(raw),
            None => self.ctx.default_certs_dir(),
        };
        let certs_dir = std::path::absolute(&certs_dir).map_err(path_error("certs dir"))?;

        let log_file = match &self.settings.log_file {
            Some(path) => std::path::absolute(path).map_err(path_error("log file"))?,
            None => workspace.join(LOG_FILE_NAME),
        };

        Ok(RunPaths {
            pid_file: workspace.join(PID_FILE_NAME),
            workspace,
            certs_dir,
            log_file,
        })
    }

    /// Run until the transport exits, a signal arrives, or boot fails.
    ///
    /// The process tree is always torn down before this returns.
    pub async fn run(mut self) -> Result<RunOutcome> {
        let mut signals = ShutdownSignals::install()?;
        let mut tree = ProcessTree::with_grace(self.shutdown_grace);

        let outcome = tokio::select! {
            result = self.drive(&mut tree) => result,
            signal = signals.recv() => {
                info!(signal, "Received signal, shutting down");
                Ok(RunOutcome::Interrupted { signal })
            }
        };

        self.transition(SupervisorState::ShuttingDown);
        tree.shutdown().await;
        self.transition(SupervisorState::Terminated);

        outcome
    }

    async fn drive(&mut self, tree: &mut ProcessTree) -> Result<RunOutcome> {
        self.transition(SupervisorState::ResolvingPaths);
        let paths = self.resolve_paths()?;
        let builtins = BuiltinBinaries::resolve(&self.ctx.bin_dir)?;
        let registry = PluginRegistry::load(&self.ctx.registry_path())?;
        debug!(
            workspace = %paths.workspace.display(),
            log = %paths.log_file.display(),
            plugins = registry.len(),
            "Resolved paths"
        );

        self.sweep_stale(&builtins).await;

        let hub_config = build_hub_config(&paths.workspace, &paths.certs_dir, &builtins, &registry);
        let config = hub_config.materialize()?;
        let config_path = config.path().to_path_buf();
        tree.track_config(config);

        self.transition(SupervisorState::LaunchingHub);
        let log = open_log(&paths)?;

        let mut hub = Command::new(&builtins.hub);
        hub.arg("--config")
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(log_stdio(&log, &paths)?)
            .stderr(log_stdio(&log, &paths)?)
            .kill_on_drop(true);
        #[cfg(unix)]
        hub.process_group(0);

        let hub = hub.spawn().map_err(|source| SupervisorError::Spawn {
            name: HUB_BINARY,
            source,
        })?;
        let hub = tree.adopt(HUB_BINARY, hub, true);
        info!(pid = ?tree.pid(hub), config = %config_path.display(), "Started orchestrator");

        if let Some(pid) = tree.pid(hub) {
            tree.track_pid_file(paths.pid_file.clone());
            std::fs::write(&paths.pid_file, pid.to_string()).map_err(|source| {
                SupervisorError::PidFile {
                    path: paths.pid_file.clone(),
                    source,
                }
            })?;
        }

        self.transition(SupervisorState::AwaitingReady);
        if let Err(err) =
            readiness::await_ready(tree.child_mut(hub), &paths.log_file, &self.readiness).await
        {
            self.transition(SupervisorState::Failed);
            return Err(err);
        }
        self.transition(SupervisorState::Ready);

        let log_text = readiness::read_log(&paths.log_file).await;
        let address = readiness::resolve_address(&log_text, &paths.log_file)?;
        info!(address = %address, "Orchestrator ready");

        let transport = Command::new(&builtins.transport)
            .arg(format!("--orchestrator-addr={address}"))
            .arg(format!("--certs-dir={}", paths.certs_dir.display()))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(log_stdio(&log, &paths)?)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                name: TRANSPORT_BINARY,
                source,
            })?;
        let transport = tree.adopt(TRANSPORT_BINARY, transport, false);
        self.transition(SupervisorState::RunningTransport);

        let wait_error = |source| SupervisorError::Wait {
            name: TRANSPORT_BINARY,
            source,
        };
        let transport = tree.child_mut(transport);
        let status = transport.wait().await.map_err(wait_error)?;

        // A transport killed by a signal has no code of its own to pass on.
        let code = status.code().unwrap_or(FAILURE_EXIT_CODE);
        debug!(code, "Transport exited");
        Ok(RunOutcome::Completed { code })
    }

    async fn sweep_stale(&self, builtins: &BuiltinBinaries) {
        let targets: Vec<PathBuf> = builtins.all().iter().map(|p| p.to_path_buf()).collect();

        // Best effort: leftovers from a crashed run are hygiene, not a boot failure.
        match tokio::task::spawn_blocking(move || stale::terminate_stale(&targets)).await {
            Ok(Ok(0)) => {}
            Ok(Ok(killed)) => info!(killed, "Terminated stale processes"),
            Ok(Err(err)) => warn!(error = %err, "Stale process sweep incomplete"),
            Err(err) => warn!(error = %err, "Stale process sweep panicked"),
        }

        tokio::time::sleep(self.stale_grace).await;
    }
}

fn path_error(what: &'static str) -> impl FnOnce(std::io::Error) -> SupervisorError {
    move |source| SupervisorError::PathResolution { what, source }
}

/// Truncate the log, then reopen it for appending
fn open_log(paths: &RunPaths) -> Result<File> {
    let log_err = |source| SupervisorError::LogFile {
        path: paths.log_file.clone(),
        source,
    };

    File::create(&paths.log_file).map_err(log_err)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)
        .map_err(log_err)
}

fn log_stdio(log: &File, paths: &RunPaths) -> Result<Stdio> {
    log.try_clone()
        .map(Stdio::from)
        .map_err(|source| SupervisorError::LogFile {
            path: paths.log_file.clone(),
            source,
        })
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(SupervisorError::Signals)?,
            terminate: signal(SignalKind::terminate()).map_err(SupervisorError::Signals)?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(_) => std::future::pending().await,
        }
    }
}
