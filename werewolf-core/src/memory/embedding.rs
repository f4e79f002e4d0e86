//! Text embedding.

use super::{MemoryError, DEFAULT_SIMILARITY_THRESHOLD};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Turns text into a fixed-size vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Similarity floor that suits this embedder's vectors.
    fn default_threshold(&self) -> f32 {
        DEFAULT_SIMILARITY_THRESHOLD
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// Deterministic offline embedder using signed feature hashing.
///
/// Each lowercase alphanumeric token is hashed with FNV-1a into one of
/// `dimension` buckets; the top hash bit picks the sign. The result is
/// L2-normalised, so texts sharing vocabulary land close together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Texts with no shared token are orthogonal: distance `sqrt(2)`,
    /// similarity about 0.414. The floor sits just above that, so any
    /// shared vocabulary passes and ranking does the rest.
    pub const DEFAULT_THRESHOLD: f32 = 0.42;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn default_threshold(&self) -> f32 {
        Self::DEFAULT_THRESHOLD
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok(self.embed_sync(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "text-embedding-3-small";
const OPENAI_DIMENSION: usize = 1536;

/// Embedder for any OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: OPENAI_MODEL.to_string(),
            base_url: OPENAI_BASE.to_string(),
            dimension: OPENAI_DIMENSION,
        }
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, MemoryError> {
        let key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| MemoryError::Embedding("OPENAI_API_KEY is not set".into()))?;
        Ok(Self::new(key))
    }

    /// Use another model; `dimension` must match what it returns.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Embedding(format!("API error ({status}): {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MemoryError::Embedding("no embedding returned".into()))?;

        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::similarity_from_distance;

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_sync("Ben was quiet all day");
        let b = embedder.embed_sync("ben WAS quiet, all day!");
        assert_eq!(a, b);
        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSION);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new(512);
        let query = embedder.embed_sync("who voted against Ben");
        let near = embedder.embed_sync("Cat voted against Ben yesterday");
        let far = embedder.embed_sync("the moon rose over quiet fields");
        assert!(distance(&query, &near) < distance(&query, &far));
    }

    #[test]
    fn test_hashing_threshold_admits_shared_vocabulary_only() {
        let embedder = HashingEmbedder::default();
        let floor = embedder.default_threshold();
        assert!(floor < DEFAULT_SIMILARITY_THRESHOLD);
        // Unit vectors with nothing in common.
        assert!(similarity_from_distance(2f32.sqrt()) < floor);

        let query = embedder.embed_sync("Round 2 discussion: find the suspicious players");
        let statement = embedder.embed_sync("Round 1, Ben said: Cat looks suspicious to me");
        let similarity = similarity_from_distance(distance(&query, &statement));
        assert!(similarity >= floor, "similarity {similarity} below {floor}");
        assert!(similarity < DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_sync("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_trait_embed_matches_sync() {
        let embedder = HashingEmbedder::new(32);
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.embed("hello").await.unwrap(), embedder.embed_sync("hello"));
    }
}
