//! Episodic and semantic memory.
//!
//! Game events are kept twice: in an ordered episodic log owned by the
//! [`MemoryManager`], and as embedded text in a [`VectorStore`] that answers
//! nearest-neighbour queries. The store is a trait object, so the in-memory
//! [`FlatIndex`] and networked backends are interchangeable.

mod embedding;
mod manager;
#[cfg(feature = "qdrant")]
mod qdrant;
mod store;

pub use embedding::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use manager::{MemoryManager, DEFAULT_SIMILARITY_THRESHOLD};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantStore;
pub use store::FlatIndex;

use crate::state::Phase;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from embedding or vector storage.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Backend(String),

    #[error("Embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What kind of game event a memory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Speech,
    Vote,
    Death,
    Execution,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Speech => "speech",
            EventKind::Vote => "vote",
            EventKind::Death => "death",
            EventKind::Execution => "execution",
        };
        f.write_str(name)
    }
}

/// An episodic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub kind: EventKind,
    /// The player the event is attributed to (speaker, voter, victim).
    pub player: String,
    pub round: u32,
    pub phase: Phase,
    pub content: String,
}

impl MemoryEvent {
    pub fn speech(round: u32, player: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Speech,
            player: player.into(),
            round,
            phase: Phase::Discussion,
            content: content.into(),
        }
    }

    pub fn vote(round: u32, voter: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Vote,
            player: voter.into(),
            round,
            phase: Phase::Voting,
            content: target.into(),
        }
    }

    pub fn death(round: u32, victim: impl Into<String>) -> Self {
        let victim = victim.into();
        Self {
            kind: EventKind::Death,
            content: format!("{victim} was killed during the night"),
            player: victim,
            round,
            phase: Phase::DayAnnounce,
        }
    }

    pub fn execution(round: u32, executed: impl Into<String>) -> Self {
        let executed = executed.into();
        Self {
            kind: EventKind::Execution,
            content: format!("{executed} was executed by vote"),
            player: executed,
            round,
            phase: Phase::Voting,
        }
    }

    /// The text that gets embedded and indexed.
    pub fn text(&self) -> String {
        match self.kind {
            EventKind::Speech => format!("Round {}, {} said: {}", self.round, self.player, self.content),
            EventKind::Vote => format!("Round {}, {} voted for {}", self.round, self.player, self.content),
            EventKind::Death | EventKind::Execution => {
                format!("Round {}, {}: {}", self.round, self.player, self.content)
            }
        }
    }

    pub fn metadata(&self) -> MemoryMetadata {
        MemoryMetadata {
            kind: self.kind,
            player: self.player.clone(),
            round: self.round,
            phase: self.phase,
        }
    }
}

/// Metadata stored alongside each indexed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub kind: EventKind,
    pub player: String,
    pub round: u32,
    pub phase: Phase,
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: MemoryMetadata,
    /// In `(0, 1]`; higher is closer.
    pub similarity: f32,
}

/// Map a vector distance onto a similarity score.
///
/// Strictly decreasing in `distance`, with 1.0 at distance zero.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// A searchable index of text fragments with metadata.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&mut self, text: &str, metadata: MemoryMetadata) -> Result<(), MemoryError>;

    /// Similarity floor to use when the caller sets none.
    fn default_threshold(&self) -> f32 {
        DEFAULT_SIMILARITY_THRESHOLD
    }

    /// At most `k` hits with `similarity >= threshold`, closest first.
    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MemoryError>;
}
