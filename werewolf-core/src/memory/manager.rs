//! Episodic log plus semantic index.

use super::{MemoryError, MemoryEvent, SearchHit, VectorStore};
use std::collections::HashSet;
use tracing::debug;

/// Similarity floor for dense embeddings, used unless the store says otherwise.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Owns the ordered episodic log and forwards every event to a vector store.
pub struct MemoryManager {
    store: Box<dyn VectorStore>,
    episodic: Vec<MemoryEvent>,
    threshold: f32,
}

impl MemoryManager {
    pub fn new(store: impl VectorStore + 'static) -> Self {
        Self::from_boxed(Box::new(store))
    }

    /// Starts with the store's own similarity floor.
    pub fn from_boxed(store: Box<dyn VectorStore>) -> Self {
        let threshold = store.default_threshold();
        Self {
            store,
            episodic: Vec::new(),
            threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Index the event, then append it to the episodic log.
    ///
    /// If indexing fails the log is left untouched.
    pub async fn add_episodic(&mut self, event: MemoryEvent) -> Result<(), MemoryError> {
        self.store.add(&event.text(), event.metadata()).await?;
        debug!(kind = %event.kind, player = %event.player, round = event.round, "memory recorded");
        self.episodic.push(event);
        Ok(())
    }

    /// Every event from the `n_rounds` most recent distinct rounds.
    ///
    /// Rounds are collected scanning the log from newest to oldest; the
    /// returned events keep insertion order.
    pub fn recent_episodic(&self, n_rounds: usize) -> Vec<&MemoryEvent> {
        if n_rounds == 0 {
            return Vec::new();
        }
        let mut rounds = HashSet::new();
        for event in self.episodic.iter().rev() {
            rounds.insert(event.round);
            if rounds.len() >= n_rounds {
                break;
            }
        }
        self.episodic
            .iter()
            .filter(|e| rounds.contains(&e.round))
            .collect()
    }

    /// The last `limit` events attributed to `player`, oldest first.
    pub fn player_episodic(&self, player: &str, limit: usize) -> Vec<&MemoryEvent> {
        let events: Vec<&MemoryEvent> = self
            .episodic
            .iter()
            .filter(|e| e.player == player)
            .collect();
        let start = events.len().saturating_sub(limit);
        events[start..].to_vec()
    }

    pub async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, MemoryError> {
        self.store.search(query, k, self.threshold).await
    }

    pub fn all(&self) -> &[MemoryEvent] {
        &self.episodic
    }

    pub fn len(&self) -> usize {
        self.episodic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodic.is_empty()
    }

    /// Forget the episodic log. The vector store keeps its contents so
    /// later games can still search them.
    pub fn clear(&mut self) {
        self.episodic.clear();
    }
}
