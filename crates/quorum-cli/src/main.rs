//! quorum - weighted multisig registry administration
//!
//! CLI for building approver registries, exporting membership proofs,
//! signing bundles and verifying bundles and permits offline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// quorum - weighted multisig registry administration
#[derive(Parser, Debug)]
#[command(name = "quorum")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Approver registry commands
    Registry(commands::registry::RegistryCommand),

    /// Action inspection commands
    Action(commands::action::ActionCommand),

    /// Authorization bundle commands
    Bundle(commands::bundle::BundleCommand),

    /// Permit commands
    Permit(commands::permit::PermitCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let exit_code = match cli.command {
        Commands::Registry(cmd) => commands::registry::run(&cmd),
        Commands::Action(cmd) => commands::action::run(&cmd),
        Commands::Bundle(cmd) => commands::bundle::run(&cmd),
        Commands::Permit(cmd) => commands::permit::run(&cmd),
    };

    if exit_code != commands::exit_codes::SUCCESS {
        // Bypass anyhow so the verification outcome reaches the shell.
        std::process::exit(i32::from(exit_code));
    }
    Ok(())
}
