use crate::error::SearchError;
use crate::models::{ChunkHit, VectorRecord};
use crate::traits::VectorStore;
use async_trait::async_trait;
use tokio::sync::RwLock;

// Brute-force in-process store, squared L2 over every record.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, records: &[VectorRecord]) -> Result<(), SearchError> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkHit>, SearchError> {
        let records = self.records.read().await;

        let mut hits: Vec<ChunkHit> = records
            .iter()
            .filter(|record| record.vector.len() == vector.len())
            .map(|record| ChunkHit {
                chunk_id: record.id.clone(),
                distance: squared_l2(&record.vector, vector),
                text: record.text.clone(),
            })
            .collect();

        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, SearchError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), SearchError> {
        self.records.write().await.clear();
        Ok(())
    }
}
