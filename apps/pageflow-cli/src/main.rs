use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCmd, ReplayArgs};

#[derive(Parser)]
#[command(name = "pageflow", version, about = "Paged query replay utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted page fixture through the continuation driver
    Replay(ReplayArgs),
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    pageflow_otel::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => commands::replay::run(args).await,
        Commands::Config { cmd } => commands::config::run(cmd),
    }
}
