use crate::error::SearchError;
use crate::models::{ChunkHit, VectorRecord};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

// Collections are resolved with get_or_create on every call; the
// server call is idempotent.
pub struct ChromaStore {
    client: Client,
    endpoint: String,
    collection: String,
}

impl ChromaStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
        })
    }

    async fn collection_id(&self) -> Result<String, SearchError> {
        let response = self
            .client
            .post(format!("{}/api/v1/collections", self.endpoint))
            .json(&json!({
                "name": self.collection,
                "get_or_create": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection response had no id".to_string(),
            })
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn add(&self, records: &[VectorRecord]) -> Result<(), SearchError> {
        if records.is_empty() {
            return Ok(());
        }

        let collection_id = self.collection_id().await?;
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        let documents: Vec<&str> = records.iter().map(|record| record.text.as_str()).collect();
        let embeddings: Vec<&[f32]> = records
            .iter()
            .map(|record| record.vector.as_slice())
            .collect();

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/add",
                self.endpoint, collection_id
            ))
            .json(&json!({
                "ids": ids,
                "documents": documents,
                "embeddings": embeddings,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkHit>, SearchError> {
        let collection_id = self.collection_id().await?;

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.endpoint, collection_id
            ))
            .json(&json!({
                "query_embeddings": [vector],
                "n_results": top_k,
                "include": ["distances", "documents"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let ids = parsed
            .pointer("/ids/0")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let distances = parsed
            .pointer("/distances/0")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let documents = parsed
            .pointer("/documents/0")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut hits = Vec::new();
        for ((id, distance), document) in ids.iter().zip(distances.iter()).zip(documents.iter()) {
            let Some(chunk_id) = id.as_str() else {
                continue;
            };
            hits.push(ChunkHit {
                chunk_id: chunk_id.to_string(),
                distance: distance.as_f64().unwrap_or(0.0) as f32,
                text: document.as_str().unwrap_or_default().to_string(),
            });
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize, SearchError> {
        let collection_id = self.collection_id().await?;

        let response = self
            .client
            .get(format!(
                "{}/api/v1/collections/{}/count",
                self.endpoint, collection_id
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: "count response was not a number".to_string(),
            })
    }

    async fn clear(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(format!(
                "{}/api/v1/collections/{}",
                self.endpoint, self.collection
            ))
            .send()
            .await?;

        // An absent collection is already cleared.
        if !response.status().is_success() && !response.status().is_client_error() {
            return Err(SearchError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_a_valid_url() {
        assert!(ChromaStore::new("not a url", "recipes").is_err());
        assert!(ChromaStore::new("http://localhost:8000", "recipes").is_ok());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let store = ChromaStore::new("http://localhost:8000/", "recipes").expect("valid url");
        assert_eq!(store.endpoint, "http://localhost:8000");
    }
}
