use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use orchestra::context::RunContext;
use orchestra::supervisor::{ServeSettings, Supervisor};

/// Arguments for `orchestra serve`
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Project workspace directory
    #[arg(long, default_value = ".", env = "ORCHESTRA_WORKSPACE")]
    pub workspace: PathBuf,

    /// mTLS certificates directory [default: ~/.orchestra/certs]
    #[arg(long = "certs-dir", env = "ORCHESTRA_CERTS_DIR")]
    pub certs_dir: Option<String>,

    /// Log file path [default: <workspace>/.orchestra-mcp.log]
    #[arg(long = "log", env = "ORCHESTRA_LOG")]
    pub log: Option<PathBuf>,
}

/// Boot the hub and bridge stdio until the transport exits.
///
/// Returns the exit code the process should end with.
pub fn serve_command(ctx: RunContext, args: ServeArgs) -> Result<i32> {
    let settings = ServeSettings {
        workspace: args.workspace,
        certs_dir: args.certs_dir,
        log_file: args.log,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let outcome = runtime.block_on(Supervisor::new(ctx, settings).run())?;
    Ok(outcome.exit_code())
}
