//! In-memory exhaustive vector index.

use super::{
    similarity_from_distance, Embedder, MemoryError, MemoryMetadata, SearchHit, VectorStore,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    text: String,
    metadata: MemoryMetadata,
    vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct SavedIndex {
    dimension: usize,
    entries: Vec<Entry>,
}

/// Flat L2 index: every search scans every entry.
pub struct FlatIndex<E> {
    embedder: E,
    entries: Vec<Entry>,
}

impl<E: Embedder> FlatIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Write texts, metadata and vectors as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let saved = SavedIndex {
            dimension: self.embedder.dimension(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&saved)?;
        tokio::fs::write(path.as_ref(), json).await?;
        debug!(path = %path.as_ref().display(), entries = self.entries.len(), "saved vector index");
        Ok(())
    }

    /// Load an index written by [`FlatIndex::save`].
    ///
    /// The file must have been produced with an embedder of the same
    /// dimension as `embedder`.
    pub async fn load(path: impl AsRef<Path>, embedder: E) -> Result<Self, MemoryError> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let saved: SavedIndex = serde_json::from_str(&json)?;
        if saved.dimension != embedder.dimension() {
            return Err(MemoryError::DimensionMismatch {
                expected: embedder.dimension(),
                actual: saved.dimension,
            });
        }
        Ok(Self {
            embedder,
            entries: saved.entries,
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), MemoryError> {
        if vector.len() != self.embedder.dimension() {
            return Err(MemoryError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl<E: Embedder> VectorStore for FlatIndex<E> {
    fn default_threshold(&self) -> f32 {
        self.embedder.default_threshold()
    }

    async fn add(&mut self, text: &str, metadata: MemoryMetadata) -> Result<(), MemoryError> {
        let vector = self.embedder.embed(text).await?;
        self.check_dimension(&vector)?;
        self.entries.push(Entry {
            text: text.to_string(),
            metadata,
            vector,
        });
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(query).await?;
        self.check_dimension(&query)?;

        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (similarity_from_distance(l2_distance(&query, &entry.vector)), entry))
            .filter(|(similarity, _)| *similarity >= threshold)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(similarity, entry)| SearchHit {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                similarity,
            })
            .collect())
    }
}
