use tracing::{debug, info};

use crate::embeddings::{EmbeddingProvider, RetryingEmbedder};
use crate::error::{IndexError, SearchError};
use crate::extractor::IngredientExtractor;
use crate::index::IndexState;
use crate::matcher::{match_ingredients, missing_ingredients};
use crate::models::{CandidateRecipe, ChunkKey, RecipeMatch, RerankWeights, RetrievedChunk};
use crate::rerank::{dot, hybrid_score, l2_normalize, overlap_ratio};
use crate::retrieval::aggregate_hits;
use crate::traits::VectorStore;

const DEFAULT_TOP_K: usize = 5;

// Retrieve-then-rerank: embed the query, pull top-K chunk hits, group
// them per recipe, blend cosine similarity with ingredient overlap.
pub struct RecipePipeline<P, S> {
    embedder: RetryingEmbedder<P>,
    store: S,
    extractor: IngredientExtractor,
    weights: RerankWeights,
    top_k: usize,
    index: IndexState,
}

impl<P, S> RecipePipeline<P, S>
where
    P: EmbeddingProvider + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(embedder: RetryingEmbedder<P>, store: S) -> Result<Self, IndexError> {
        Ok(Self {
            embedder,
            store,
            extractor: IngredientExtractor::new()?,
            weights: RerankWeights::default(),
            top_k: DEFAULT_TOP_K,
            index: IndexState::unloaded(),
        })
    }

    pub fn with_weights(mut self, weights: RerankWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_index_state(mut self, index: IndexState) -> Self {
        self.index = index;
        self
    }

    pub fn index_state(&self) -> &IndexState {
        &self.index
    }

    pub fn embedder(&self) -> &RetryingEmbedder<P> {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // `Ok(None)` means retrieval found nothing.
    pub async fn search_ingredients(
        &self,
        user_ingredients: &[String],
    ) -> Result<Option<RecipeMatch>, SearchError> {
        if user_ingredients.is_empty() {
            return Err(SearchError::Request(
                "ingredient list is empty".to_string(),
            ));
        }

        let query = user_ingredients.join(" ");
        info!(query = %query, "running hybrid recipe search");

        let Some(query_outcome) = self
            .embedder
            .embed(std::slice::from_ref(&query))
            .await
            .into_iter()
            .next()
        else {
            return Err(SearchError::Request(
                "embedding provider returned no vector for the query".to_string(),
            ));
        };

        let mut degraded = query_outcome.is_degraded();
        let query_vector = l2_normalize(query_outcome.vector());

        let hits = self.store.query(&query_vector, self.top_k).await?;
        if hits.is_empty() {
            info!("no chunk hits for query");
            return Ok(None);
        }

        let groups = aggregate_hits(&hits);
        let mut candidates: Vec<CandidateRecipe> = Vec::with_capacity(groups.len());

        for group in &groups {
            let aggregated_text = group.aggregated_text();

            let Some(outcome) = self
                .embedder
                .embed(std::slice::from_ref(&aggregated_text))
                .await
                .into_iter()
                .next()
            else {
                continue;
            };
            if outcome.is_degraded() {
                degraded = true;
            }

            let candidate_vector = l2_normalize(outcome.vector());
            let embedding_similarity = dot(&query_vector, &candidate_vector);

            let all_ingredients = self.extractor.extract(&aggregated_text);
            let matched_ingredients = match_ingredients(user_ingredients, &all_ingredients);
            let ingredient_overlap =
                overlap_ratio(matched_ingredients.len(), all_ingredients.len());

            let final_score = hybrid_score(&self.weights, embedding_similarity, ingredient_overlap);
            debug!(
                source_id = %group.source_id,
                embedding_similarity,
                ingredient_overlap,
                final_score,
                "scored candidate"
            );

            candidates.push(CandidateRecipe {
                source_id: group.source_id.clone(),
                aggregated_text,
                embedding_similarity,
                ingredient_overlap,
                final_score,
                matched_ingredients,
                all_ingredients,
            });
        }

        // Stable sort: ties keep the aggregator's first-seen order.
        candidates.sort_by(|left, right| right.final_score.total_cmp(&left.final_score));

        let Some(best) = candidates.into_iter().next() else {
            return Ok(None);
        };

        let missing = missing_ingredients(user_ingredients, &best.all_ingredients);
        let recipe_text = self
            .index
            .recipe_text(&best.source_id)
            .map(str::to_string)
            .unwrap_or(best.aggregated_text);

        Ok(Some(RecipeMatch {
            source_id: best.source_id,
            score: best.final_score,
            recipe_text,
            matched_ingredients: best.matched_ingredients,
            missing_ingredients: missing,
            degraded,
        }))
    }

    // Plain semantic retrieval over chunks, no reranking.
    pub async fn search_text(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query = query.to_string();
        let Some(outcome) = self
            .embedder
            .embed(std::slice::from_ref(&query))
            .await
            .into_iter()
            .next()
        else {
            return Ok(Vec::new());
        };

        let hits = self.store.query(outcome.vector(), top_k.max(1)).await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let source_id = self
                    .index
                    .source_for_chunk(&hit.chunk_id)
                    .map(str::to_string)
                    .or_else(|| ChunkKey::parse(&hit.chunk_id).map(|key| key.source_id))
                    .unwrap_or_else(|| "unknown".to_string());

                RetrievedChunk {
                    chunk_id: hit.chunk_id,
                    source_id,
                    text: hit.text,
                    similarity: 1.0 - hit.distance,
                }
            })
            .collect())
    }
}
