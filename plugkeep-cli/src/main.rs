//! plugkeep — keeps installed plugins at their latest published release.
//!
//! # Usage
//!
//! ```text
//! plugkeep init
//! plugkeep check [--force-console] [--json]
//! plugkeep status [--json]
//! plugkeep daemon start|stop|status
//! ```
//!
//! Every command accepts `--plugins-dir`, `--config-dir` and `--state-dir`;
//! anything not given falls back to `~/.plugkeep/{plugins,config,state}`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, daemon::DaemonCommand, status::StatusArgs};
use plugkeep_core::Paths;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "plugkeep",
    version,
    about = "Keep installed plugins up to date with their latest releases",
    long_about = None,
)]
struct Cli {
    /// Root directory holding one sub-directory per installed plugin.
    #[arg(long, global = true, env = "PLUGKEEP_PLUGINS_DIR", value_name = "DIR")]
    plugins_dir: Option<PathBuf>,

    /// Directory holding config.yaml.
    #[arg(long, global = true, env = "PLUGKEEP_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Directory for the daemon socket and host runtime files.
    #[arg(long, global = true, env = "PLUGKEEP_STATE_DIR", value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default config file if it does not exist yet.
    Init,

    /// Run one update pass now and report what happened.
    Check(CheckArgs),

    /// Show installed, trusted and loaded versions of configured plugins.
    Status(StatusArgs),

    /// Run or talk to the background update daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.plugins_dir, cli.config_dir, cli.state_dir)
        .context("could not determine plugkeep directories")?;

    match cli.command {
        Commands::Init => commands::init::run(&paths),
        Commands::Check(args) => {
            init_cli_tracing();
            args.run(&paths)
        }
        Commands::Status(args) => {
            init_cli_tracing();
            args.run(&paths)
        }
        Commands::Daemon { command } => commands::daemon::run(command, &paths),
    }
}

/// Warnings and above on stderr, so stdout stays clean for `--json`.
fn init_cli_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
