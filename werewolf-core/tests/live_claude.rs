//! Games played by real Claude agents.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p werewolf-core --test live_claude -- --ignored`

use claude::Claude;
use werewolf_core::usage::UsageLedger;
use werewolf_core::{ClaudeGenerator, EndReason, GameConfig, GameFlow, LlmAgent};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p werewolf-core --test live_claude -- --ignored
async fn test_one_round_with_claude() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let client = Claude::from_env().expect("client from env");
    let ledger = UsageLedger::new();
    let config = GameConfig::default().with_max_rounds(1).with_seed(3);

    let mut flow = GameFlow::new(config, |player, personality| {
        let generator = ClaudeGenerator::new(client.clone())
            .with_max_tokens(512)
            .with_ledger(ledger.clone());
        Box::new(LlmAgent::new(&player.name, player.role, personality, generator))
    })
    .expect("valid config")
    .with_usage(ledger.clone());

    let result = flow.run().await;

    assert!(!matches!(result.end, EndReason::Aborted(_)), "{:?}", result.end);
    assert!(!ledger.is_empty(), "no model calls were recorded");
    let usage = result.usage.expect("usage summary");
    assert!(usage.total_tokens > 0);
    println!("{usage}");
}
