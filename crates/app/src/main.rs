use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use recipe_search_core::{
    build_index, ChromaStore, ChunkingOptions, EmbeddingProvider, HashEmbedder, IndexMetadata,
    IndexOptions, IndexState, MemoryStore, OpenAiEmbedder, RecipePipeline, RerankWeights,
    RetryingEmbedder, VectorStore,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "recipe-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder containing recipe .txt files.
    #[arg(long, default_value = "./data/recipes")]
    recipes_dir: String,

    /// Vector store backend.
    #[arg(long, value_enum, default_value_t = StoreKind::Chroma)]
    store: StoreKind,

    /// Chroma server base URL.
    #[arg(long, default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Chroma collection name.
    #[arg(long, default_value = "recipes")]
    collection: String,

    /// Embedding provider.
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// OpenAI API key for the openai embedder.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    openai_api_key: String,

    /// Where index metadata is persisted.
    #[arg(long, default_value = "./vectordata/recipe_meta.json")]
    metadata_path: String,

    /// Weight of embedding similarity in the hybrid score.
    #[arg(long, default_value_t = 0.75)]
    alpha: f32,

    /// Weight of ingredient overlap in the hybrid score.
    #[arg(long, default_value_t = 0.25)]
    beta: f32,

    /// Chunk window size in characters.
    #[arg(long, default_value_t = 800)]
    chunk_size: usize,

    /// Character overlap between consecutive chunks.
    #[arg(long, default_value_t = 100)]
    overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Chroma,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Openai,
    Hash,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store the recipe folder.
    Index {
        /// Re-embed even if store and metadata already exist.
        #[arg(long, default_value_t = false)]
        rebuild: bool,
    },
    /// Find the best recipe for your ingredients, or run a plain text query.
    Search {
        /// Comma-separated ingredients you have on hand.
        #[arg(long, value_delimiter = ',')]
        ingredients: Vec<String>,
        /// Free-text query instead of an ingredient list.
        #[arg(long)]
        query: Option<String>,
        /// Number of chunk candidates to retrieve.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "recipe-search boot"
    );

    if cli.embedder == EmbedderKind::Openai && cli.openai_api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; embedding calls will fail and degrade to zero vectors");
    }

    match (cli.store, cli.embedder) {
        (StoreKind::Memory, EmbedderKind::Hash) => {
            run(
                &cli,
                RetryingEmbedder::new(HashEmbedder::default()),
                MemoryStore::new(),
            )
            .await
        }
        (StoreKind::Memory, EmbedderKind::Openai) => {
            run(
                &cli,
                RetryingEmbedder::new(OpenAiEmbedder::new(&cli.openai_api_key)),
                MemoryStore::new(),
            )
            .await
        }
        (StoreKind::Chroma, EmbedderKind::Hash) => {
            run(
                &cli,
                RetryingEmbedder::new(HashEmbedder::default()),
                ChromaStore::new(&cli.chroma_url, &cli.collection)?,
            )
            .await
        }
        (StoreKind::Chroma, EmbedderKind::Openai) => {
            run(
                &cli,
                RetryingEmbedder::new(OpenAiEmbedder::new(&cli.openai_api_key)),
                ChromaStore::new(&cli.chroma_url, &cli.collection)?,
            )
            .await
        }
    }
}

async fn run<P, S>(cli: &Cli, embedder: RetryingEmbedder<P>, store: S) -> anyhow::Result<()>
where
    P: EmbeddingProvider + Send + Sync,
    S: VectorStore + Send + Sync,
{
    let options = IndexOptions {
        chunking: ChunkingOptions {
            chunk_size: cli.chunk_size,
            overlap: cli.overlap,
        },
        metadata_path: PathBuf::from(&cli.metadata_path),
    };
    let corpus = Path::new(&cli.recipes_dir);

    match &cli.command {
        Command::Index { rebuild } => {
            let previous = if *rebuild {
                IndexState::unloaded()
            } else {
                IndexState::from_metadata(IndexMetadata::load(&options.metadata_path), false)
            };

            let state = build_index(corpus, &embedder, &store, &options, &previous).await?;
            if state.is_loaded() {
                println!(
                    "{} recipes indexed ({} chunks) at {}",
                    state.metadata().recipes.len(),
                    state.metadata().chunk_to_source.len(),
                    Utc::now().to_rfc3339()
                );
            } else {
                println!("index not built (missing or empty recipe folder: {})", cli.recipes_dir);
            }
        }
        Command::Search {
            ingredients,
            query,
            top_k,
        } => {
            // Reuses an existing index when store and metadata agree;
            // otherwise embeds the corpus before serving the query.
            let previous =
                IndexState::from_metadata(IndexMetadata::load(&options.metadata_path), false);
            let state = build_index(corpus, &embedder, &store, &options, &previous).await?;

            let pipeline = RecipePipeline::new(embedder, store)?
                .with_weights(RerankWeights {
                    alpha: cli.alpha,
                    beta: cli.beta,
                })
                .with_top_k(*top_k)
                .with_index_state(state);

            if !ingredients.is_empty() {
                match pipeline.search_ingredients(ingredients).await? {
                    Some(result) => {
                        println!("recipe: {} (score {:.4})", result.source_id, result.score);
                        if result.degraded {
                            println!("  (degraded: some embeddings fell back to zero vectors)");
                        }
                        println!(
                            "  you have: {}",
                            result
                                .matched_ingredients
                                .iter()
                                .cloned()
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                        if result.missing_ingredients.is_empty() {
                            println!("  shopping list: nothing, you are set");
                        } else {
                            println!(
                                "  shopping list: {}",
                                result.missing_ingredients.join(", ")
                            );
                        }
                        println!("\n{}", result.recipe_text);
                    }
                    None => println!("no recipes matched"),
                }
            } else if let Some(query) = query {
                let chunks = pipeline.search_text(query, *top_k).await?;
                if chunks.is_empty() {
                    println!("no results");
                }
                for chunk in chunks {
                    println!(
                        "[{:.4}] {} ({})",
                        chunk.similarity, chunk.source_id, chunk.chunk_id
                    );
                    println!("{}\n", chunk.text);
                }
            } else {
                anyhow::bail!("provide --ingredients or --query");
            }
        }
    }

    Ok(())
}
