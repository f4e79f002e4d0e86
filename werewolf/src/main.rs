//! Werewolf played by Claude agents.
//!
//! ```bash
//! cargo run -p werewolf -- run --players Alice,Bob,Charlie,David,Eve,Frank --seed 7
//! cargo run -p werewolf -- transcript game_logs/game_20250101_120000.json
//! ```

mod game;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "werewolf", about = "Werewolf games played by language models", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one game
    Run(RunArgs),

    /// Print a saved game
    Transcript {
        /// A `.json` record written by `run`
        file: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Comma-separated player names
    #[arg(long, value_delimiter = ',')]
    pub players: Option<Vec<String>>,

    /// Number of werewolves
    #[arg(long)]
    pub werewolves: Option<usize>,

    /// Rounds before the game is called inconclusive
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Seed for roles and tie-breaks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not retrieve earlier statements during discussion
    #[arg(long)]
    pub no_rag: bool,

    /// Do not record memory at all
    #[arg(long)]
    pub no_memory: bool,

    /// TOML game config; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Claude model for every player
    #[arg(long, env = "WEREWOLF_MODEL")]
    pub model: Option<String>,

    /// Messages API root, for gateways and proxies
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    pub base_url: Option<String>,

    /// Embedding backend for semantic memory
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hashing)]
    pub embedder: EmbedderKind,

    /// Directory for the saved record and transcript
    #[arg(long, default_value = "game_logs")]
    pub log_dir: PathBuf,

    /// Per-call agent timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature hashing
    Hashing,
    /// OpenAI-compatible embeddings endpoint (needs OPENAI_API_KEY)
    Openai,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => game::run(args).await,
        Commands::Transcript { file } => game::print_transcript(&file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "werewolf",
            "run",
            "--players",
            "Ann,Ben,Cat,Dan,Eve",
            "--base-url",
            "http://localhost:8080/v1",
            "--embedder",
            "openai",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.players.unwrap().len(), 5);
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(args.embedder, EmbedderKind::Openai);
        assert_eq!(args.log_dir, PathBuf::from("game_logs"));
    }
}
