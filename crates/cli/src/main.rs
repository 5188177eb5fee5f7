//! Relay CLI: the main entry point.
//!
//! Commands:
//! - `ask`     Run the agent loop on a prompt with the project-file tools
//! - `route`   Show which model the router picks for a task
//! - `models`  Probe every pool model
//! - `init`    Print a starter configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Relay: an agent loop that routes every task to the right model",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.relay/config.toml)
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a prompt and print its answer
    Ask {
        prompt: String,

        /// System prompt placed before the user prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Root the file tools work from (defaults to the current directory)
        #[arg(long)]
        project_root: Option<PathBuf>,
    },

    /// Print the id of the model the router picks for a task
    Route { task: String },

    /// Show every pool model and whether it is reachable
    Models,

    /// Print a default configuration
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Ask {
            prompt,
            system,
            project_root,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::ask::run(&config, prompt, system, project_root).await?
        }
        Commands::Route { task } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::route::run(&config, &task).await?
        }
        Commands::Models => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::models::run(&config).await?
        }
    }

    Ok(())
}
