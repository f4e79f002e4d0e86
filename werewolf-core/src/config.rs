//! Game configuration.

use crate::roles::validate_roster;
use crate::GameError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one game.
///
/// Every field has a default, so a TOML file only needs the keys it wants
/// to change:
///
/// ```toml
/// players = ["Alice", "Bob", "Charlie", "David", "Eve", "Frank"]
/// werewolves = 2
/// seed = 7
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Player names in speaking order.
    pub players: Vec<String>,

    /// Number of werewolves to assign.
    pub werewolves: usize,

    /// Rounds played before the game is called inconclusive.
    pub max_rounds: u32,

    /// Record events in episodic memory.
    pub use_memory: bool,

    /// Retrieve earlier statements during discussion. Needs memory.
    pub use_rag: bool,

    /// Statements retrieved per speaker.
    pub rag_top_k: usize,

    /// Similarity floor for retrieval, at most 1.0. Unset uses the
    /// memory backend's own floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,

    /// Per-call agent timeout in seconds; 0 disables it.
    pub agent_timeout_secs: u64,

    /// Seed for role assignment and tie-breaks. Random if unset.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: ["Alice", "Bob", "Charlie", "David", "Eve"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            werewolves: 2,
            max_rounds: 10,
            use_memory: true,
            use_rag: true,
            rag_top_k: 5,
            similarity_threshold: None,
            agent_timeout_secs: 60,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Create a config for the given roster with default settings.
    pub fn new<I, S>(players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            players: players.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_werewolves(mut self, werewolves: usize) -> Self {
        self.werewolves = werewolves;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_memory(mut self, enabled: bool) -> Self {
        self.use_memory = enabled;
        self
    }

    pub fn with_rag(mut self, enabled: bool) -> Self {
        self.use_rag = enabled;
        self
    }

    pub fn with_rag_top_k(mut self, k: usize) -> Self {
        self.rag_top_k = k;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn agent_timeout(&self) -> Option<Duration> {
        (self.agent_timeout_secs > 0).then(|| Duration::from_secs(self.agent_timeout_secs))
    }

    /// Retrieval runs only when both memory and RAG are on.
    pub fn retrieval_enabled(&self) -> bool {
        self.use_memory && self.use_rag
    }

    pub fn from_toml_str(text: &str) -> Result<Self, GameError> {
        Ok(toml::from_str(text)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&text)
    }

    /// Check the roster and the werewolf count.
    pub fn validate(&self) -> Result<(), GameError> {
        validate_roster(&self.players)?;
        if self.players.len() < 2 {
            return Err(GameError::InvalidConfiguration(
                "at least two players are required".into(),
            ));
        }
        if self.werewolves < 1 || self.werewolves >= self.players.len() {
            return Err(GameError::InvalidConfiguration(format!(
                "werewolf count must be between 1 and {}, got {}",
                self.players.len() - 1,
                self.werewolves
            )));
        }
        if self.max_rounds == 0 {
            return Err(GameError::InvalidConfiguration(
                "max_rounds must be at least 1".into(),
            ));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(threshold.is_finite() && threshold <= 1.0) {
                return Err(GameError::InvalidConfiguration(format!(
                    "similarity_threshold must be at most 1.0, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}
