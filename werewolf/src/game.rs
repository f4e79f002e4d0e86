//! The `run` and `transcript` commands.

use crate::{EmbedderKind, RunArgs};
use anyhow::{bail, Context, Result};
use claude::Claude;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use werewolf_core::memory::{FlatIndex, MemoryManager, OpenAiEmbedder};
use werewolf_core::persist::GameRecord;
use werewolf_core::usage::UsageLedger;
use werewolf_core::{ClaudeGenerator, GameConfig, GameFlow, GameResult, LlmAgent};

/// Smallest table the CLI will seat.
const MIN_PLAYERS: usize = 5;

pub async fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args).await?;
    if config.players.len() < MIN_PLAYERS {
        bail!(
            "at least {MIN_PLAYERS} players are required, got {}",
            config.players.len()
        );
    }
    config.validate()?;

    let mut client = Claude::from_env().context("ANTHROPIC_API_KEY must be set")?;
    if let Some(model) = &args.model {
        client = client.with_model(model);
    }
    if let Some(base_url) = &args.base_url {
        client = client.with_base_url(base_url);
    }

    let ledger = UsageLedger::new();
    let mut flow = GameFlow::new(config.clone(), |player, personality| {
        let generator = ClaudeGenerator::new(client.clone()).with_ledger(ledger.clone());
        Box::new(LlmAgent::new(&player.name, player.role, personality, generator))
    })?
    .with_usage(ledger.clone());

    // The flow already carries a hashing index when memory is on.
    if config.use_memory && args.embedder == EmbedderKind::Openai {
        let embedder = OpenAiEmbedder::from_env()?;
        flow = flow.with_memory(MemoryManager::new(FlatIndex::new(embedder)));
    }

    info!(
        players = %config.players.join(", "),
        werewolves = config.werewolves,
        model = client.model(),
        "starting game"
    );
    for (player, role) in flow.roles() {
        info!(player = %player, role = %role, "role assigned");
    }

    let result = flow.run().await;
    print_summary(&result);

    let record = GameRecord::from_result(&result);
    let path = args.log_dir.join(record.default_file_name());
    let transcript = record
        .save(&path)
        .await
        .with_context(|| format!("saving game record to {}", path.display()))?;
    println!("\nRecord saved to {}", path.display());
    println!("Transcript saved to {}", transcript.display());
    Ok(())
}

/// File config (if any) overlaid with command-line flags.
async fn build_config(args: &RunArgs) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GameConfig::default(),
    };

    if let Some(players) = &args.players {
        config.players = players
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }
    if let Some(werewolves) = args.werewolves {
        config.werewolves = werewolves;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_agent_timeout(Duration::from_secs(secs));
    }
    if args.no_rag {
        config.use_rag = false;
    }
    if args.no_memory {
        config.use_memory = false;
    }
    Ok(config)
}

fn print_summary(result: &GameResult) {
    println!("\n=== Game over after {} rounds ===", result.rounds);
    match result.winner {
        Some(winner) => println!("Winner: {winner} ({})", result.reason),
        None if result.reason.is_empty() => println!("No winner"),
        None => println!("No winner ({})", result.reason),
    }
    println!("Survivors: {}", result.survivors.join(", "));
    println!("Roles:");
    for (player, role) in &result.roles {
        println!("  {player}: {role}");
    }
    if let Some(usage) = &result.usage {
        println!("Usage: {usage}");
    }
}

pub async fn print_transcript(path: &Path) -> Result<()> {
    let record = GameRecord::load(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    print!("{}", record.transcript());
    Ok(())
}
