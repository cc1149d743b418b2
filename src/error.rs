//! Error types for the registry and the supervisor
//!
//! Every variant here is fatal for the command that hits it. Best-effort
//! steps (stale sweeps, cleanup) also report through these types but their
//! call sites log and continue instead of propagating.

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or writing the plugin registry
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("read registry {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse registry {}", .path.display())]
    #[diagnostic(
        code(orchestra::registry::parse),
        help("The registry must be a JSON object with a \"plugins\" map. Fix or delete the file.")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize registry")]
    Serialize(#[source] serde_json::Error),

    #[error("write registry {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures raised while booting, running or tearing down the process tree
#[derive(Debug, Error, Diagnostic)]
pub enum SupervisorError {
    #[error("could not determine the home directory")]
    #[diagnostic(help("Set HOME, or pass --certs-dir and ORCHESTRA_HOME explicitly"))]
    HomeDirUnavailable,

    #[error("resolve {what}")]
    PathResolution {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("missing binary {name:?} at {}", .path.display())]
    #[diagnostic(
        code(orchestra::install::missing_binary),
        help("Reinstall orchestra so every bundled binary sits next to the orchestra executable")
    )]
    MissingBinary { name: &'static str, path: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("create temp config")]
    ConfigCreate(#[source] io::Error),

    #[error("serialize hub config")]
    ConfigSerialize(#[from] serde_yaml::Error),

    #[error("open log {}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("start {name}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("write pid file {}", .path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("orchestrator exited unexpectedly ({status}). Check {}", .log.display())]
    HubExited { status: String, log: PathBuf },

    #[error("orchestrator did not become ready in {seconds} seconds. Check {}", .log.display())]
    ReadyTimeout { seconds: u64, log: PathBuf },

    #[error("could not determine orchestrator address. Check {}", .log.display())]
    AddressNotFound { log: PathBuf },

    #[error("wait for {name}")]
    Wait {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("install signal handlers")]
    Signals(#[source] io::Error),

    #[error("could not terminate stale processes: {}", join_pids(.pids))]
    StaleProcesses { pids: Vec<u32> },
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
