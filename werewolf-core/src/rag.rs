//! Retrieval of earlier statements for the discussion phase.
//!
//! The one hard rule here: a speaker never gets their own words back, and
//! nobody sees anything from the current round or later.

use crate::memory::{EventKind, MemoryError, MemoryManager, SearchHit};
use tracing::debug;

/// Appended to every retrieval query to pull suspicion and evidence talk.
pub const QUERY_SUFFIX: &str = "earlier statements suspicion evidence";

/// Returned when nothing survives filtering.
pub const NO_RELEVANT_HISTORY: &str = "No relevant earlier statements.";

/// Candidates fetched per requested result, to leave room for filtering.
const OVERFETCH: usize = 4;

/// Pairs shown by [`RetrievalEngine::contradiction_evidence`].
const MAX_CONTRADICTION_PAIRS: usize = 3;

/// Statements per player considered for contradictions.
const CONTRADICTION_WINDOW: usize = 20;

const EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    top_k: usize,
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl RetrievalEngine {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The discussion query used for `player`'s turn in `round`.
    pub fn discussion_query(round: u32) -> String {
        format!("Round {round} discussion: assess the situation and find the suspicious players")
    }

    /// Search for statements relevant to `query`, excluding `exclude_player`
    /// and anything from `before_round` onward, and render the best `k`.
    pub async fn retrieve_relevant_speeches(
        &self,
        memory: &MemoryManager,
        query: &str,
        exclude_player: &str,
        before_round: u32,
        k: usize,
    ) -> Result<String, MemoryError> {
        let hits = self
            .relevant_hits(memory, query, exclude_player, before_round, k)
            .await?;
        if hits.is_empty() {
            return Ok(NO_RELEVANT_HISTORY.to_string());
        }

        let mut block = String::from("Relevant earlier statements:\n");
        for (i, hit) in hits.iter().enumerate() {
            block.push_str(&format!(
                "{}. [Round {}] {}: {} (similarity: {:.2})\n",
                i + 1,
                hit.metadata.round,
                hit.metadata.player,
                hit.text,
                hit.similarity
            ));
        }
        Ok(block)
    }

    /// The filtered hits behind [`Self::retrieve_relevant_speeches`].
    pub async fn relevant_hits(
        &self,
        memory: &MemoryManager,
        query: &str,
        exclude_player: &str,
        before_round: u32,
        k: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let search_query = format!("{query} {QUERY_SUFFIX}");
        let candidates = memory
            .semantic_search(&search_query, k.saturating_mul(OVERFETCH))
            .await?;
        let fetched = candidates.len();

        let hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|hit| hit.metadata.player != exclude_player && hit.metadata.round < before_round)
            .take(k)
            .collect();

        debug!(fetched, kept = hits.len(), exclude_player, before_round, "retrieved history");
        Ok(hits)
    }

    /// Side-by-side excerpts of `player`'s earlier speeches.
    ///
    /// Only speeches from rounds before `current_round` count, and each pair
    /// spans two different rounds.
    pub fn contradiction_evidence(
        &self,
        memory: &MemoryManager,
        player: &str,
        current_round: u32,
    ) -> String {
        let speeches: Vec<_> = memory
            .player_episodic(player, CONTRADICTION_WINDOW)
            .into_iter()
            .filter(|e| e.kind == EventKind::Speech && e.round < current_round)
            .collect();

        if speeches.len() < 2 {
            return format!("{player} has too few recorded statements to compare.");
        }

        let mut pairs = Vec::new();
        'outer: for (i, first) in speeches.iter().enumerate() {
            for second in &speeches[i + 1..] {
                if second.round == first.round {
                    continue;
                }
                pairs.push((*first, *second));
                if pairs.len() == MAX_CONTRADICTION_PAIRS {
                    break 'outer;
                }
            }
        }

        if pairs.is_empty() {
            return format!("{player}'s statements are consistent.");
        }

        let mut evidence = format!("Earlier statements by {player}:\n");
        for (i, (first, second)) in pairs.iter().enumerate() {
            evidence.push_str(&format!(
                "{}. Round {}: {}\n   Round {}: {}\n",
                i + 1,
                first.round,
                excerpt(&first.content),
                second.round,
                excerpt(&second.content)
            ));
        }
        evidence
    }

    /// Semantic hits that may back up `suspicion`.
    pub async fn supporting_evidence(
        &self,
        memory: &MemoryManager,
        suspicion: &str,
        current_round: u32,
    ) -> Result<String, MemoryError> {
        let hits: Vec<SearchHit> = memory
            .semantic_search(suspicion, self.top_k.saturating_mul(OVERFETCH))
            .await?
            .into_iter()
            .filter(|hit| hit.metadata.round < current_round)
            .take(self.top_k)
            .collect();

        if hits.is_empty() {
            return Ok("No evidence supports this suspicion yet.".to_string());
        }

        let mut evidence = String::from("Supporting evidence:\n");
        for (i, hit) in hits.iter().enumerate() {
            evidence.push_str(&format!(
                "{}. [Round {}] {}: {}\n",
                i + 1,
                hit.metadata.round,
                hit.metadata.player,
                hit.text
            ));
        }
        Ok(evidence)
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}
