pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use chunking::chunk_text;
pub use embeddings::{
    EmbeddingOutcome, EmbeddingProvider, HashEmbedder, OpenAiEmbedder, RetryPolicy,
    RetryingEmbedder, DEFAULT_HASH_DIMENSIONS, OPENAI_EMBEDDING_DIMENSIONS,
};
pub use error::{IndexError, SearchError};
pub use extractor::IngredientExtractor;
pub use index::{build_index, load_corpus, IndexMetadata, IndexOptions, IndexState};
pub use matcher::{match_ingredients, missing_ingredients};
pub use models::{
    CandidateRecipe, ChunkHit, ChunkKey, ChunkingOptions, RecipeChunk, RecipeDocument,
    RecipeMatch, RerankWeights, RetrievedChunk, VectorRecord, CHUNK_ID_SEPARATOR,
};
pub use pipeline::RecipePipeline;
pub use rerank::{dot, hybrid_score, l2_normalize, overlap_ratio};
pub use retrieval::{aggregate_hits, CandidateGroup};
pub use stores::{ChromaStore, MemoryStore};
pub use traits::VectorStore;
