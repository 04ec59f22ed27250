use crate::error::SearchError;
use crate::models::{ChunkHit, VectorRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore {
    async fn add(&self, records: &[VectorRecord]) -> Result<(), SearchError>;

    // Best top_k matches, ascending distance.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkHit>, SearchError>;

    async fn count(&self) -> Result<usize, SearchError>;

    async fn clear(&self) -> Result<(), SearchError>;
}
