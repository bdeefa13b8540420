use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(about = "Launchpad - multi-agent workspace sessions", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to <config dir>/launchpad/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session walkthrough against an in-memory store
    Demo {
        /// User identity to sign in as
        #[arg(long, default_value = "demo-user")]
        user: String,

        /// Completion endpoint; overrides the configured one
        #[arg(long)]
        completion_url: Option<String>,
    },
    /// List the view plugins available to custom agents
    Plugins,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Demo {
            user,
            completion_url,
        } => commands::demo::run(cli.config, user, completion_url).await?,
        Commands::Plugins => commands::plugins::list(),
    }

    Ok(())
}
