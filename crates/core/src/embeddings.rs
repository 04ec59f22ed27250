use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::SearchError;

pub const OPENAI_EMBEDDING_DIMENSIONS: usize = 1536;
pub const DEFAULT_HASH_DIMENSIONS: usize = 128;

#[async_trait]
pub trait EmbeddingProvider {
    fn dimensions(&self) -> usize;

    // One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Fresh(Vec<f32>),
    Degraded { vector: Vec<f32>, reason: String },
}

impl EmbeddingOutcome {
    pub fn vector(&self) -> &[f32] {
        match self {
            Self::Fresh(vector) => vector,
            Self::Degraded { vector, .. } => vector,
        }
    }

    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Self::Fresh(vector) => vector,
            Self::Degraded { vector, .. } => vector,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub batch_size: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            batch_size: 32,
        }
    }
}

// Exhausted retries degrade the affected batch to zero vectors
// instead of failing the request.
pub struct RetryingEmbedder<P> {
    provider: P,
    policy: RetryPolicy,
}

impl<P> RetryingEmbedder<P>
where
    P: EmbeddingProvider + Send + Sync,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(provider: P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn embed(&self, texts: &[String]) -> Vec<EmbeddingOutcome> {
        if texts.is_empty() {
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.policy.batch_size.max(1)) {
            match self.embed_batch(batch).await {
                Ok(vectors) => outcomes.extend(vectors.into_iter().map(EmbeddingOutcome::Fresh)),
                Err(reason) => {
                    error!(
                        batch_len = batch.len(),
                        max_attempts = self.policy.max_attempts,
                        reason = %reason,
                        "embedding failed after retries, degrading to zero vectors"
                    );
                    let zero = vec![0.0; self.provider.dimensions()];
                    outcomes.extend(batch.iter().map(|_| EmbeddingOutcome::Degraded {
                        vector: zero.clone(),
                        reason: reason.clone(),
                    }));
                }
            }
        }
        outcomes
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match self.provider.embed(batch).await {
                Ok(vectors) if vectors.len() == batch.len() => return Ok(vectors),
                Ok(vectors) => format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                ),
                Err(error) => error.to_string(),
            };

            if attempt >= self.policy.max_attempts {
                return Err(failure);
            }

            let delay = self.policy.base_delay * 2u32.saturating_pow(attempt - 1);
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %failure,
                "embedding batch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiEmbeddingsResponse {
    data: Vec<OpenAiEmbeddingRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiEmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            dimensions: OPENAI_EMBEDDING_DIMENSIONS,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: OpenAiEmbeddingsResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}

// Deterministic character-trigram hashing embedder for local runs
// and tests.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASH_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFailing {
        dimensions: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for AlwaysFailing {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            Err(SearchError::Request("provider is down".to_string()))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(0),
            batch_size: 2,
        }
    }

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::default();
        assert_eq!(
            embedder.embed_one("tomato garlic rice"),
            embedder.embed_one("tomato garlic rice")
        );
    }

    #[test]
    fn hash_embedder_outputs_configured_length() {
        let embedder = HashEmbedder { dimensions: 32 };
        assert_eq!(embedder.embed_one("rice").len(), 32);
    }

    #[tokio::test]
    async fn persistent_failure_degrades_to_zero_vectors() {
        let embedder =
            RetryingEmbedder::with_policy(AlwaysFailing { dimensions: 8 }, fast_policy());
        let outcomes = embedder.embed(&["x".to_string()]).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_degraded());
        assert_eq!(outcomes[0].vector(), vec![0.0; 8].as_slice());
    }

    #[tokio::test]
    async fn degradation_covers_every_input_across_batches() {
        let embedder =
            RetryingEmbedder::with_policy(AlwaysFailing { dimensions: 4 }, fast_policy());
        let inputs: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let outcomes = embedder.embed(&inputs).await;

        assert_eq!(outcomes.len(), inputs.len());
        assert!(outcomes.iter().all(EmbeddingOutcome::is_degraded));
    }

    #[tokio::test]
    async fn healthy_provider_passes_through_in_order() {
        let embedder =
            RetryingEmbedder::with_policy(HashEmbedder { dimensions: 16 }, fast_policy());
        let inputs = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let outcomes = embedder.embed(&inputs).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.is_degraded()));
        assert_eq!(
            outcomes[1].vector(),
            HashEmbedder { dimensions: 16 }.embed_one("second").as_slice()
        );
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let embedder = RetryingEmbedder::new(HashEmbedder::default());
        assert!(embedder.embed(&[]).await.is_empty());
    }
}
