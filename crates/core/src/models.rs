use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::IndexError;

// Source ids must never contain this; the corpus loader enforces it.
pub const CHUNK_ID_SEPARATOR: &str = "::";

const CHUNK_ID_TAG: &str = "chunk";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDocument {
    pub source_id: String,
    pub raw_text: String,
}

// Stores and persisted metadata carry the flat `encode()` form;
// everything in-process goes through this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub source_id: String,
    pub chunk_index: u64,
    pub uid: String,
}

impl ChunkKey {
    pub fn new(source_id: impl Into<String>, chunk_index: u64) -> Self {
        Self {
            source_id: source_id.into(),
            chunk_index,
            uid: Uuid::new_v4().to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{src}{sep}{tag}{sep}{idx}{sep}{uid}",
            src = self.source_id,
            sep = CHUNK_ID_SEPARATOR,
            tag = CHUNK_ID_TAG,
            idx = self.chunk_index,
            uid = self.uid,
        )
    }

    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.split(CHUNK_ID_SEPARATOR);
        let source_id = parts.next()?;
        if parts.next()? != CHUNK_ID_TAG {
            return None;
        }
        let chunk_index = parts.next()?.parse::<u64>().ok()?;
        let uid = parts.next()?;
        if source_id.is_empty() || uid.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            source_id: source_id.to_string(),
            chunk_index,
            uid: uid.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeChunk {
    pub key: ChunkKey,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub distance: f32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CandidateRecipe {
    pub source_id: String,
    pub aggregated_text: String,
    pub embedding_similarity: f32,
    pub ingredient_overlap: f32,
    pub final_score: f32,
    pub matched_ingredients: BTreeSet<String>,
    pub all_ingredients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeMatch {
    pub source_id: String,
    pub score: f32,
    pub recipe_text: String,
    pub matched_ingredients: BTreeSet<String>,
    pub missing_ingredients: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 100,
        }
    }
}

impl ChunkingOptions {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IndexError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// The weights do not have to sum to one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RerankWeights {
    pub alpha: f32,
    pub beta: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            alpha: 0.75,
            beta: 0.25,
        }
    }
}
