//! CLI entry point for operating the gateway core out-of-process: generate
//! API keys, price a usage record against a price table, and check for a
//! newer release — the pieces that don't need the full dispatcher wired up.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use llmgate::config::SystemConfig;
use llmgate::model::{ModelPrice, Usage};

#[derive(Parser)]
#[command(name = "llmgate", about = "Multi-provider LLM gateway business core")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generates a new API key and prints both the public token and its
    /// stored hash.
    GenKey,
    /// Prices a `Usage` JSON value against a `ModelPrice` JSON value.
    Price {
        #[arg(long)]
        usage: String,
        #[arg(long)]
        price: String,
    },
    /// Polls the configured release feed and reports whether a newer
    /// version than `current` is available.
    CheckVersion {
        #[arg(long)]
        current: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SystemConfig::load(path)?,
        None => SystemConfig::default(),
    };

    match cli.command {
        Command::GenKey => {
            let key = llmgate::apikey::generate();
            let hashed = llmgate::apikey::hash(&key);
            println!("public:  {key}");
            println!("stored:  {hashed}");
        }
        Command::Price { usage, price } => {
            let usage: Usage = serde_json::from_str(&usage)?;
            let price: ModelPrice = serde_json::from_str(&price)?;
            let breakdown = llmgate::cost::compute_cost(&usage, &price);
            println!("{}", serde_json::to_string_pretty(&breakdown)?);
        }
        Command::CheckVersion { current } => {
            let client = llmgate::version::build_client("llmgate")?;
            let latest =
                llmgate::version::fetch_latest_release(&client, &config.version_repo.owner, &config.version_repo.repo)
                    .await?;
            match latest {
                Some(release) if llmgate::version::is_newer(&current, &release.tag) => {
                    println!("update available: {} -> {}", current, release.tag);
                }
                Some(release) => println!("up to date (latest release: {})", release.tag),
                None => println!("no eligible release found"),
            }
        }
    }

    Ok(())
}
