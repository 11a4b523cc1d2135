use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "trellis", about = "Assemble and inspect trellis plugin applications")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra configuration file, layered over user and project config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the message of the day
    Motd(commands::motd::MotdArgs),
    /// List plugins and what they declare and contribute
    Plugins,
    /// Print the contributions to an extension point
    Extensions(commands::extensions::ExtensionsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = app::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Motd(args) => commands::motd::run(config, args),
        Commands::Plugins => commands::plugins::run(config),
        Commands::Extensions(args) => commands::extensions::run(config, args),
    }
}
