//! caplift: inspect and exercise the capability rewriting engine.

use anyhow::{Context, Result};
use caplift_runtime::cli;
use caplift_runtime::config::RuntimeConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "caplift",
    author,
    version,
    about = "Capability-negotiation rewriter for streaming players"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Suppress status lines
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.caplift/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a JSON document (file or stdin) and print it
    Patch { file: Option<PathBuf> },

    /// Show the classifier verdict for one field
    Classify { key: String, value: String },

    /// Run a payload through the text-encode hook (envelope aware)
    Encode { file: Option<PathBuf> },

    /// Run a payload through the decode hook
    Decode { file: Option<PathBuf> },

    /// List the rule table, targets and profile catalog
    Rules,

    /// Navigate an in-memory page through a list of routes
    Simulate {
        /// Routes pushed through the history hook, in order ("back" goes back)
        #[arg(required = true)]
        routes: Vec<String>,

        /// Initial location
        #[arg(long, default_value = "https://localhost/browse")]
        start: String,

        /// Delay between routes in milliseconds
        #[arg(long, default_value_t = 300)]
        step_ms: u64,

        /// Publish a player object once a watch route is reached
        #[arg(long)]
        player: bool,
    },
}

fn init_tracing(json: bool, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("caplift_runtime={level}").parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_path(path),
        None => RuntimeConfig::load(),
    };
    config.context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Output helpers read these.
    if cli.json {
        std::env::set_var("CAPLIFT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("CAPLIFT_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("CAPLIFT_VERBOSE", "1");
    }
    init_tracing(cli.json, cli.verbose)?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Patch { file } => cli::patch_cmd::run(&config, file.as_deref()),
        Commands::Classify { key, value } => cli::patch_cmd::classify(&config, &key, &value),
        Commands::Encode { file } => cli::codec_cmd::encode(&config, file.as_deref()),
        Commands::Decode { file } => cli::codec_cmd::decode(&config, file.as_deref()),
        Commands::Rules => cli::rules_cmd::run(&config),
        Commands::Simulate {
            routes,
            start,
            step_ms,
            player,
        } => cli::simulate_cmd::run(&config, &start, &routes, step_ms, player).await,
    }
}
