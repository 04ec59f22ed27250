use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunking::chunk_text;
use crate::embeddings::{EmbeddingProvider, RetryingEmbedder};
use crate::error::IndexError;
use crate::models::{
    ChunkKey, ChunkingOptions, RecipeChunk, RecipeDocument, VectorRecord, CHUNK_ID_SEPARATOR,
};
use crate::traits::VectorStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub chunk_to_source: HashMap<String, String>,
    pub recipes: HashMap<String, String>,
    pub checksums: HashMap<String, String>,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl IndexMetadata {
    pub fn is_empty(&self) -> bool {
        self.chunk_to_source.is_empty()
    }

    // Missing or unreadable metadata just forces the next build to re-embed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path).map_err(IndexError::from).and_then(
            |contents| serde_json::from_str::<Self>(&contents).map_err(IndexError::from),
        ) {
            Ok(metadata) => {
                info!(
                    chunks = metadata.chunk_to_source.len(),
                    recipes = metadata.recipes.len(),
                    "loaded index metadata"
                );
                metadata
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to load index metadata, forcing rebuild");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "index metadata saved");
        Ok(())
    }
}

// Immutable snapshot; a rebuild produces a fresh one and the owner
// swaps it in whole.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    metadata: IndexMetadata,
    loaded: bool,
}

impl IndexState {
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn from_metadata(metadata: IndexMetadata, loaded: bool) -> Self {
        Self { metadata, loaded }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn recipe_text(&self, source_id: &str) -> Option<&str> {
        self.metadata.recipes.get(source_id).map(String::as_str)
    }

    pub fn source_for_chunk(&self, chunk_id: &str) -> Option<&str> {
        self.metadata
            .chunk_to_source
            .get(chunk_id)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub chunking: ChunkingOptions,
    pub metadata_path: PathBuf,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingOptions::default(),
            metadata_path: PathBuf::from("./vectordata/recipe_meta.json"),
        }
    }
}

pub fn load_corpus(dir: &Path) -> Result<Vec<RecipeDocument>, IndexError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_txt = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort_unstable();

    let mut documents = Vec::new();
    for path in paths {
        let Some(source_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            warn!(path = %path.display(), "skipping file with unreadable name");
            continue;
        };

        if source_id.contains(CHUNK_ID_SEPARATOR) {
            warn!(
                source_id,
                "skipping recipe whose name contains the chunk id separator"
            );
            continue;
        }

        let raw_text = fs::read_to_string(&path)?.trim().to_string();
        if raw_text.is_empty() {
            warn!(source_id, "skipping empty recipe file");
            continue;
        }

        documents.push(RecipeDocument {
            source_id: source_id.to_string(),
            raw_text,
        });
    }

    Ok(documents)
}

fn checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Nonzero store count plus nonempty previous metadata skips the
// rebuild entirely; pass an empty previous state to force one.
pub async fn build_index<P, S>(
    corpus_dir: &Path,
    embedder: &RetryingEmbedder<P>,
    store: &S,
    options: &IndexOptions,
    previous: &IndexState,
) -> Result<IndexState, IndexError>
where
    P: EmbeddingProvider + Send + Sync,
    S: VectorStore + Send + Sync,
{
    options.chunking.validate()?;

    let stored = store.count().await.unwrap_or(0);
    if stored > 0 && !previous.metadata().is_empty() {
        info!(
            stored,
            chunks = previous.metadata().chunk_to_source.len(),
            "existing vector data and metadata found, skipping re-embedding"
        );
        return Ok(IndexState::from_metadata(previous.metadata().clone(), true));
    }

    if !corpus_dir.exists() {
        warn!(dir = %corpus_dir.display(), "recipe directory not found, index left unbuilt");
        return Ok(IndexState::unloaded());
    }

    let documents = load_corpus(corpus_dir)?;
    if documents.is_empty() {
        warn!(dir = %corpus_dir.display(), "no recipe files found, index left unbuilt");
        return Ok(IndexState::unloaded());
    }

    info!(recipes = documents.len(), "indexing recipe corpus");

    let mut metadata = IndexMetadata::default();
    let mut records = Vec::new();
    let mut degraded = 0usize;

    for document in documents {
        let chunks: Vec<RecipeChunk> = chunk_text(&document.raw_text, &options.chunking)
            .into_iter()
            .enumerate()
            .map(|(index, text)| RecipeChunk {
                key: ChunkKey::new(&document.source_id, index as u64),
                text,
            })
            .collect();
        if chunks.is_empty() {
            continue;
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let outcomes = embedder.embed(&texts).await;
        for (chunk, outcome) in chunks.into_iter().zip(outcomes) {
            if outcome.is_degraded() {
                degraded += 1;
            }
            let id = chunk.key.encode();
            metadata
                .chunk_to_source
                .insert(id.clone(), document.source_id.clone());
            records.push(VectorRecord {
                id,
                text: chunk.text,
                vector: outcome.into_vector(),
            });
        }

        metadata
            .checksums
            .insert(document.source_id.clone(), checksum(&document.raw_text));
        metadata
            .recipes
            .insert(document.source_id, document.raw_text);
    }

    if records.is_empty() {
        warn!("corpus produced no chunks, index left unbuilt");
        return Ok(IndexState::unloaded());
    }

    // Stale records must not survive a rebuild.
    if stored > 0 {
        info!(stored, "clearing existing vector data before rebuild");
        store.clear().await?;
    }
    store.add(&records).await?;
    metadata.indexed_at = Some(Utc::now());
    metadata.save(&options.metadata_path)?;

    if degraded > 0 {
        warn!(degraded, "some chunks were indexed with degraded zero vectors");
    }
    info!(
        chunks = records.len(),
        recipes = metadata.recipes.len(),
        "index built"
    );

    Ok(IndexState::from_metadata(metadata, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{HashEmbedder, RetryPolicy};
    use crate::error::SearchError;
    use crate::stores::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    struct CountingProvider {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                inner: HashEmbedder { dimensions: 16 },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn dimensions(&self) -> usize {
            self.inner.dimensions
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    fn fast_embedder(provider: CountingProvider) -> RetryingEmbedder<CountingProvider> {
        RetryingEmbedder::with_policy(
            provider,
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(0),
                batch_size: 8,
            },
        )
    }

    fn options_in(dir: &Path) -> IndexOptions {
        IndexOptions {
            chunking: ChunkingOptions {
                chunk_size: 200,
                overlap: 20,
            },
            metadata_path: dir.join("meta.json"),
        }
    }

    #[tokio::test]
    async fn missing_corpus_leaves_index_unbuilt() {
        let dir = tempdir().expect("tempdir");
        let embedder = fast_embedder(CountingProvider::new());
        let store = MemoryStore::new();

        let state = build_index(
            &dir.path().join("does-not-exist"),
            &embedder,
            &store,
            &options_in(dir.path()),
            &IndexState::unloaded(),
        )
        .await
        .expect("missing corpus is not an error");

        assert!(!state.is_loaded());
        assert_eq!(store.count().await.expect("count succeeds"), 0);
    }

    #[tokio::test]
    async fn corpus_without_txt_files_leaves_index_unbuilt() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.md"), "not a recipe").expect("write");

        let embedder = fast_embedder(CountingProvider::new());
        let store = MemoryStore::new();
        let state = build_index(
            dir.path(),
            &embedder,
            &store,
            &options_in(dir.path()),
            &IndexState::unloaded(),
        )
        .await
        .expect("empty corpus is not an error");

        assert!(!state.is_loaded());
    }

    #[tokio::test]
    async fn builds_and_persists_metadata() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("tomato_soup.txt"),
            "Tomato Soup\n\nIngredients:\n- tomatoes\n- salt\n",
        )
        .expect("write");

        let options = options_in(dir.path());
        let embedder = fast_embedder(CountingProvider::new());
        let store = MemoryStore::new();

        let state = build_index(dir.path(), &embedder, &store, &options, &IndexState::unloaded())
            .await
            .expect("build succeeds");

        assert!(state.is_loaded());
        assert!(state.recipe_text("tomato_soup").is_some());
        assert!(store.count().await.expect("count succeeds") > 0);

        let reloaded = IndexMetadata::load(&options.metadata_path);
        assert_eq!(reloaded.recipes.len(), 1);
        assert!(!reloaded.chunk_to_source.is_empty());
        assert!(reloaded.indexed_at.is_some());
    }

    #[tokio::test]
    async fn skip_rule_issues_zero_embedding_calls() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("soup.txt"), "Ingredients:\n- water\n").expect("write");

        let store = MemoryStore::new();
        store
            .add(&[VectorRecord {
                id: ChunkKey::new("soup", 0).encode(),
                text: "Ingredients:\n- water".to_string(),
                vector: vec![0.0; 16],
            }])
            .await
            .expect("seed store");

        let mut previous_meta = IndexMetadata::default();
        previous_meta
            .chunk_to_source
            .insert(ChunkKey::new("soup", 0).encode(), "soup".to_string());
        previous_meta
            .recipes
            .insert("soup".to_string(), "Ingredients:\n- water".to_string());
        let previous = IndexState::from_metadata(previous_meta, false);

        let embedder = fast_embedder(CountingProvider::new());
        let state = build_index(dir.path(), &embedder, &store, &options_in(dir.path()), &previous)
            .await
            .expect("skip path succeeds");

        assert!(state.is_loaded());
        assert_eq!(
            embedder.provider().calls.load(Ordering::SeqCst),
            0,
            "skip rule must not touch the embedding provider"
        );
    }

    #[tokio::test]
    async fn rebuild_replaces_records_instead_of_duplicating() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("soup.txt"),
            "Tomato Soup\n\nIngredients:\n- tomatoes\n- salt\n",
        )
        .expect("write");

        let options = options_in(dir.path());
        let store = MemoryStore::new();

        let first = build_index(
            dir.path(),
            &fast_embedder(CountingProvider::new()),
            &store,
            &options,
            &IndexState::unloaded(),
        )
        .await
        .expect("first build succeeds");
        let count_after_first = store.count().await.expect("count succeeds");

        // Forced rebuild: unloaded previous state against a non-empty store.
        let second = build_index(
            dir.path(),
            &fast_embedder(CountingProvider::new()),
            &store,
            &options,
            &IndexState::unloaded(),
        )
        .await
        .expect("rebuild succeeds");

        let count_after_second = store.count().await.expect("count succeeds");
        assert_eq!(count_after_first, count_after_second);
        assert_eq!(
            count_after_second,
            second.metadata().chunk_to_source.len(),
            "every stored record must be referenced by the new metadata"
        );
        assert_eq!(
            first.metadata().chunk_to_source.len(),
            second.metadata().chunk_to_source.len()
        );
    }

    #[test]
    fn corrupt_metadata_falls_back_to_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("meta.json");
        fs::write(&path, "{ not json").expect("write");

        let metadata = IndexMetadata::load(&path);
        assert!(metadata.is_empty());
    }

    #[test]
    fn metadata_roundtrips_through_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("meta.json");

        let mut metadata = IndexMetadata::default();
        metadata
            .recipes
            .insert("soup".to_string(), "recipe text".to_string());
        metadata.save(&path).expect("save succeeds");

        let reloaded = IndexMetadata::load(&path);
        assert_eq!(reloaded.recipes.get("soup").map(String::as_str), Some("recipe text"));
    }

    #[test]
    fn corpus_loader_rejects_separator_in_names() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a::b.txt"), "Ingredients:\n- salt\n").expect("write");
        fs::write(dir.path().join("fine.txt"), "Ingredients:\n- salt\n").expect("write");

        let documents = load_corpus(dir.path()).expect("load succeeds");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_id, "fine");
    }
}
