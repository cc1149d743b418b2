use anyhow::Result;
use clap::{Parser, Subcommand};
use miette::Diagnostic;
use std::path::PathBuf;
use std::process::ExitCode;

use orchestra::context::RunContext;
use orchestra::error::{RegistryError, SupervisorError};
use orchestra::supervisor::FAILURE_EXIT_CODE;

mod commands;

use commands::{ServeArgs, plugins_command, serve_command, uninstall_command, version_command};

#[derive(Parser)]
#[command(
    name = "orchestra",
    about = "Runs the Orchestra MCP hub, its plugins and the stdio transport",
    version,
    author,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Serve options used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    /// Enable verbose output (use -vv for debug output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the bundled binaries
    #[arg(
        long = "bin-dir",
        global = true,
        hide = true,
        env = "ORCHESTRA_BIN_DIR"
    )]
    bin_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server over stdio (default command)
    #[command(visible_alias = "start")]
    Serve(ServeArgs),

    /// List installed plugins
    Plugins,

    /// Remove an installed plugin
    #[command(visible_alias = "remove")]
    Uninstall {
        /// Plugin repository or id
        target: String,
    },

    /// Print version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_fatal(&err);
            FAILURE_EXIT_CODE
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cli: Cli) -> Result<i32> {
    let bin_dir = cli.bin_dir;
    let context = move || RunContext::capture(bin_dir);

    match cli.command {
        Some(Commands::Serve(args)) => serve_command(context()?, args),
        Some(Commands::Plugins) => {
            plugins_command(&context()?)?;
            Ok(0)
        }
        Some(Commands::Uninstall { target }) => {
            uninstall_command(&context()?, &target)?;
            Ok(0)
        }
        Some(Commands::Version) => {
            version_command();
            Ok(0)
        }
        // Default to serve
        None => serve_command(context()?, cli.serve),
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    // stdout belongs to the MCP client once the transport runs
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("orchestra=warn"),
        1 => EnvFilter::new("orchestra=info"),
        _ => EnvFilter::new("orchestra=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn report_fatal(err: &anyhow::Error) {
    eprintln!("orchestra: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if let Some(help) = fatal_help(err) {
        eprintln!("  help: {help}");
    }
}

fn fatal_help(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        let diagnostic: &dyn Diagnostic = if let Some(e) = cause.downcast_ref::<SupervisorError>() {
            e
        } else {
            cause.downcast_ref::<RegistryError>()?
        };
        diagnostic.help().map(|help| help.to_string())
    })
}
