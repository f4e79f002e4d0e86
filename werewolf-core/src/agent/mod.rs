//! Player agents.
//!
//! An [`Agent`] is anything that can take a player's turn: pick a night
//! target, give a speech, cast a vote. The orchestrator only sees this
//! trait; [`LlmAgent`] implements it on top of a text [`Generator`], and
//! the `testing` module provides scripted agents.

mod parse;
mod player;
mod prompts;

pub use parse::{extract_json, parse_ballot, parse_night_action, parse_speech};
pub use player::{ClaudeGenerator, LlmAgent, MEMORY_SUMMARY_LEN};

use crate::state::{Phase, StateSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The text-generation capability failed.
#[derive(Debug, Clone, Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

impl From<claude::Error> for GenerationError {
    fn from(err: claude::Error) -> Self {
        GenerationError(err.to_string())
    }
}

/// Errors from an agent turn. The orchestrator recovers from all of them.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("agent did not answer within {0:?}")]
    Timeout(Duration),
}

/// A werewolf's choice of victim; `None` abstains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightDecision {
    pub target: Option<String>,
    pub reasoning: String,
}

/// A public statement during discussion.
///
/// Only `speech` is shown to other players; `suspicion` and `reasoning`
/// are kept in the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub speech: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicion: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl Speech {
    pub fn is_silent(&self) -> bool {
        self.speech.trim().is_empty()
    }
}

/// A day vote; `None` abstains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub vote: Option<String>,
    pub reasoning: String,
}

/// One entry in an agent's private thought log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thought {
    pub round: u32,
    pub phase: Phase,
    /// Short description of what the agent did, e.g. `vote Bob`.
    pub action: String,
    pub reasoning: String,
}

/// A generated reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<claude::Usage>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// `generate(system, user) -> text`, the only model capability agents need.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, GenerationError>;
}

/// A participant in the game.
#[async_trait]
pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Choose a kill target. Villagers return the default decision.
    async fn night_action(&mut self, view: &StateSnapshot) -> Result<NightDecision, AgentError>;

    /// Speak during discussion. `evidence` is the retrieved history block.
    async fn discuss(
        &mut self,
        view: &StateSnapshot,
        evidence: Option<&str>,
    ) -> Result<Speech, AgentError>;

    async fn vote(&mut self, view: &StateSnapshot) -> Result<Ballot, AgentError>;

    /// Receive a public event (announcement, speech, death).
    fn observe(&mut self, _round: u32, _event: &str) {}

    /// The agent's private thought log, if it keeps one.
    fn thoughts(&self) -> Vec<Thought> {
        Vec::new()
    }
}
