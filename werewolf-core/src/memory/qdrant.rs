//! Qdrant-backed vector store.

use super::{
    similarity_from_distance, Embedder, MemoryError, MemoryMetadata, SearchHit, VectorStore,
};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};

fn backend(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend(err.to_string())
}

/// Random v4 id for a new point.
fn new_point_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Metadata fields plus the raw `text`.
fn point_payload(
    text: &str,
    metadata: &MemoryMetadata,
) -> Result<HashMap<String, serde_json::Value>, MemoryError> {
    let mut payload: HashMap<String, serde_json::Value> =
        serde_json::from_value(serde_json::to_value(metadata)?)?;
    payload.insert("text".to_string(), serde_json::Value::String(text.to_string()));
    Ok(payload)
}

/// Stores memories as points in a Qdrant collection with Euclid distance.
pub struct QdrantStore<E> {
    client: Qdrant,
    collection: String,
    embedder: E,
}

impl<E: Embedder> QdrantStore<E> {
    /// Connect and create `collection` if it does not exist yet.
    pub async fn connect(
        url: &str,
        api_key: Option<String>,
        collection: impl Into<String>,
        embedder: E,
    ) -> Result<Self, MemoryError> {
        let client = match api_key {
            Some(key) => Qdrant::from_url(url).api_key(key).build(),
            None => Qdrant::from_url(url).build(),
        }
        .map_err(backend)?;

        let collection = collection.into();
        if !client.collection_exists(&collection).await.map_err(backend)? {
            client
                .create_collection(
                    CreateCollectionBuilder::new(&collection).vectors_config(
                        VectorParamsBuilder::new(embedder.dimension() as u64, Distance::Euclid),
                    ),
                )
                .await
                .map_err(backend)?;
            info!(%collection, "created memory collection");
        }

        Ok(Self {
            client,
            collection,
            embedder,
        })
    }
}

#[async_trait]
impl<E: Embedder> VectorStore for QdrantStore<E> {
    fn default_threshold(&self) -> f32 {
        self.embedder.default_threshold()
    }

    async fn add(&mut self, text: &str, metadata: MemoryMetadata) -> Result<(), MemoryError> {
        let vector = self.embedder.embed(text).await?;

        let point = PointStruct::new(new_point_id(), vector, point_payload(text, &metadata)?);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, k as u64).with_payload(true),
            )
            .await
            .map_err(backend)?;

        let mut hits = Vec::new();
        for point in response.result {
            // Euclid scores are distances.
            let similarity = similarity_from_distance(point.score);
            if similarity < threshold {
                continue;
            }
            let payload = serde_json::to_value(&point.payload)?;
            let text = payload
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value::<MemoryMetadata>(payload) {
                Ok(metadata) => hits.push(SearchHit {
                    text,
                    metadata,
                    similarity,
                }),
                Err(e) => debug!(error = %e, "skipping point with foreign payload"),
            }
        }
        Ok(hits)
    }
}
