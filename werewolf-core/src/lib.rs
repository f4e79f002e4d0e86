//! Werewolf game engine with language-model players.
//!
//! This crate provides:
//! - Role assignment, vote resolution and the win check
//! - A phase-driven orchestrator with an append-only history
//! - Language-model agents built on the `claude` client
//! - Episodic and semantic memory with retrieval of earlier statements
//! - Transcript persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use claude::Claude;
//! use werewolf_core::{ClaudeGenerator, GameConfig, GameFlow, LlmAgent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Claude::from_env()?;
//!     let config = GameConfig::default().with_seed(7);
//!
//!     let mut flow = GameFlow::new(config, |player, personality| {
//!         let generator = ClaudeGenerator::new(client.clone());
//!         Box::new(LlmAgent::new(&player.name, player.role, personality, generator))
//!     })?;
//!
//!     let result = flow.run().await;
//!     println!("{:?} won: {}", result.winner, result.reason);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod announcer;
pub mod config;
pub mod flow;
pub mod memory;
pub mod persist;
pub mod rag;
pub mod roles;
pub mod rules;
pub mod state;
pub mod testing;
pub mod usage;
pub mod votes;

use thiserror::Error;

// Primary public API
pub use agent::{Agent, AgentError, ClaudeGenerator, Generator, LlmAgent};
pub use announcer::{Announcement, Announcer};
pub use config::GameConfig;
pub use flow::{EndReason, GameFlow, GameResult};
pub use memory::{MemoryError, MemoryEvent, MemoryManager};
pub use persist::{GameRecord, PersistError};
pub use rag::RetrievalEngine;
pub use roles::{assign_roles, Personality, Player, Role, RoleMap};
pub use rules::{check_win_condition, Verdict, Winner};
pub use state::{GameState, HistoryEntry, HistoryEvent, Phase, StateSnapshot};
pub use testing::{ScriptedAgent, ScriptedGenerator, TestHarness};
pub use usage::{UsageLedger, UsageSummary};
pub use votes::{resolve_night_kill, resolve_votes, Resolution, VoteTally};

/// Errors from setting up or running a game.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}
