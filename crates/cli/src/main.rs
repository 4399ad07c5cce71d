//! Open Swarm CLI: the main entry point.
//!
//! Commands:
//! - `config init`      write a starter `swarm_config.json`
//! - `config validate`  resolve the config and report problems
//! - `config show`      print the resolved settings
//! - `config path`      print the file that would be loaded
//! - `config profile`   print one LLM profile
//! - `context truncate` fit a saved history into a budget

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "swarm",
    about = "Open Swarm: blueprint configuration and context tooling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of searching for one
    #[arg(long, global = true, env = "SWARM_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and bootstrap swarm_config.json
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Work with conversation histories
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Resolve the config and check every referenced profile
    Validate {
        /// Resolve as this blueprint would
        #[arg(short, long)]
        blueprint: Option<String>,
    },

    /// Print the merged settings
    Show {
        #[arg(short, long)]
        blueprint: Option<String>,

        /// Force the active LLM profile
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Print the path of the config file that would be loaded
    Path,

    /// Print one LLM profile (secrets redacted)
    Profile {
        /// Profile name
        name: String,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Truncate a JSON message history to fit a budget
    Truncate {
        /// File holding a JSON array of messages
        file: PathBuf,

        /// Token budget (defaults to the configured value)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Message budget (defaults to the configured value)
        #[arg(long)]
        max_messages: Option<usize>,

        /// simple or pairs
        #[arg(long)]
        mode: Option<String>,

        /// Model name passed to the token counter
        #[arg(long, default_value = "gpt-4o")]
        model: String,
    },
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

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(config, force).await?,
            ConfigAction::Validate { blueprint } => {
                commands::config_cmd::validate(config, blueprint.as_deref()).await?
            }
            ConfigAction::Show { blueprint, profile } => {
                commands::config_cmd::show(config, blueprint.as_deref(), profile.as_deref()).await?
            }
            ConfigAction::Path => commands::config_cmd::path(config).await?,
            ConfigAction::Profile { name } => commands::config_cmd::profile(config, &name).await?,
        },
        Commands::Context { action } => match action {
            ContextAction::Truncate {
                file,
                max_tokens,
                max_messages,
                mode,
                model,
            } => {
                let args = commands::context_cmd::TruncateArgs {
                    file,
                    max_tokens,
                    max_messages,
                    mode,
                    model,
                };
                commands::context_cmd::truncate(config, args).await?
            }
        },
    }

    Ok(())
}
