use crate::config::AppConfig;
use anyhow::{Context, Result};
use apidocs_doc_store::{Document, Filters, LocalDocumentStore, StoreConfig};
use apidocs_embeddings::Embedder;
use apidocs_llm_client::build_generator;
use apidocs_retrieval::{HybridRetriever, SearchResults};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "apidocs", version, about = "Hybrid search over API documentation snippets")]
pub struct Cli {
    /// TOML file with [retrieval], [generation] and [store] sections
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: DocsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DocsCommand {
    /// Add documents from a JSON file and rebuild the lexical index
    Ingest(IngestArgs),

    /// Check that the lexical index builds from the store. The index lives in
    /// memory only; every search rebuilds it.
    Sync,

    /// Search the documentation
    Search(SearchArgs),

    /// Show store and configuration statistics
    Stats,
}

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// JSON array of `{ "id", "content", "metadata" }` objects
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query; `key:value` tokens become metadata filters
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = 5)]
    pub limit: usize,

    /// Metadata filter, repeatable
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter_pair)]
    pub filters: Vec<(String, String)>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Show full snippets and search statistics
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = AppConfig::load(self.config.as_deref())?;
        match self.command {
            DocsCommand::Ingest(args) => run_ingest(config, args).await,
            DocsCommand::Sync => run_sync(config).await,
            DocsCommand::Search(args) => run_search(config, args).await,
            DocsCommand::Stats => run_stats(config).await,
        }
    }
}

#[cfg(feature = "local-model")]
fn build_embedder(store: &StoreConfig) -> Result<Arc<dyn Embedder>> {
    let config = apidocs_embeddings::EmbeddingConfig {
        dimension: store.embedding_dim,
        ..Default::default()
    };
    let service = apidocs_embeddings::EmbeddingService::with_config(config).with_context(|| {
        format!(
            "Failed to initialize embedding model for store dimension {}",
            store.embedding_dim
        )
    })?;
    Ok(Arc::new(service))
}

#[cfg(not(feature = "local-model"))]
fn build_embedder(store: &StoreConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(apidocs_embeddings::HashEmbedder::new(
        store.embedding_dim,
    )))
}

async fn open_store(config: &AppConfig) -> Result<Arc<LocalDocumentStore>> {
    let embedder = build_embedder(&config.store)?;
    let store = LocalDocumentStore::open(config.store.clone(), embedder)
        .await
        .context("Failed to open document store")?;
    Ok(Arc::new(store))
}

/// Build a retriever and sync its lexical index. Only `search` needs the
/// text generator.
async fn open_retriever(
    config: &AppConfig,
    store: Arc<LocalDocumentStore>,
    with_expansion: bool,
) -> Result<HybridRetriever> {
    let generator = match config.generation.as_ref().filter(|_| with_expansion) {
        Some(generation) => {
            Some(build_generator(generation).context("Failed to configure text generation")?)
        }
        None => None,
    };

    let retriever = HybridRetriever::new(config.retrieval.clone(), store, generator)
        .context("Failed to initialize retrieval engine")?;
    retriever
        .sync()
        .await
        .context("Failed to build lexical index")?;
    Ok(retriever)
}

fn ensure_store_exists(config: &AppConfig) -> Result<()> {
    let path = config.store_path();
    if !path.exists() {
        anyhow::bail!(
            "Store not found at {}. Run 'apidocs ingest <FILE>' first.",
            path.display()
        );
    }
    Ok(())
}

async fn run_ingest(config: AppConfig, args: IngestArgs) -> Result<()> {
    let raw = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let documents: Vec<Document> = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a JSON array of documents", args.file.display()))?;
    let submitted = documents.len();

    println!(
        "{} Ingesting {} documents into {}",
        "▶".bright_blue(),
        submitted,
        config.store_path().display()
    );

    let store = open_store(&config).await?;
    let added = store
        .add_documents(documents)
        .await
        .context("Failed to add documents")?;

    let retriever = open_retriever(&config, store, false).await?;
    let indexed = retriever.indexed_documents().await;

    println!("{} Ingestion complete!", "✓".bright_green());
    println!("  Documents added: {}", added.bright_cyan());
    println!(
        "  Documents skipped: {}",
        (submitted - added).bright_cyan()
    );
    println!("  Documents indexed: {}", indexed.bright_cyan());

    Ok(())
}

async fn run_sync(config: AppConfig) -> Result<()> {
    ensure_store_exists(&config)?;

    let store = open_store(&config).await?;
    let retriever = open_retriever(&config, store, false).await?;

    println!(
        "{} Lexical index builds with {} documents",
        "✓".bright_green(),
        retriever.indexed_documents().await.bright_cyan()
    );

    Ok(())
}

async fn run_search(config: AppConfig, args: SearchArgs) -> Result<()> {
    ensure_store_exists(&config)?;

    let store = open_store(&config).await?;
    let retriever = open_retriever(&config, store, true).await?;

    let filters: Filters = args.filters.into_iter().collect();
    let filters = (!filters.is_empty()).then_some(filters);
    let results = retriever
        .search(&args.query, args.limit, filters.as_ref())
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    print_results(&results, args.verbose);
    Ok(())
}

fn print_results(results: &SearchResults, verbose: bool) {
    if results.is_empty() {
        println!("{} No results found", "✗".bright_red());
        return;
    }

    println!(
        "{} Found {} results in {}ms\n",
        "✓".bright_green(),
        results.len().to_string().bright_cyan(),
        results.stats.total_time_ms.to_string().bright_cyan()
    );

    for (i, (id, content)) in results.iter().enumerate() {
        println!("{}. {}", (i + 1).to_string().bright_yellow(), id.bright_cyan());
        let shown = if verbose { usize::MAX } else { 3 };
        for line in content.lines().take(shown) {
            println!("   {}", line.dimmed());
        }
        if !verbose && content.lines().count() > shown {
            println!("   {}", "...".dimmed());
        }
        println!();
    }

    if verbose {
        let stats = &results.stats;
        println!("{}", "Search Statistics:".bright_blue());
        println!(
            "  Expansion: {}ms ({} variants)",
            stats.expansion_time_ms, stats.variants
        );
        println!(
            "  Retrieval: {}ms ({} lexical, {} vector hits)",
            stats.retrieval_time_ms, stats.lexical_count, stats.vector_count
        );
        println!(
            "  Fusion: {}ms ({} distinct ids)",
            stats.fusion_time_ms, stats.fused_count
        );
        println!(
            "  Diversification: {}ms fetch, {}ms MMR ({} candidates)",
            stats.fetch_time_ms, stats.mmr_time_ms, stats.candidate_count
        );
        if let Some(kind) = stats.cache_hit {
            println!("  {} Cache hit ({kind:?})", "⚡".bright_yellow());
        }
        if stats.degraded() {
            println!(
                "  {} Degraded: {} vector failures, embedding fetch failed: {}, expansion failed: {}, query embedding failed: {}",
                "!".bright_red(),
                stats.vector_failures,
                stats.embedding_fetch_failed,
                stats.expansion_failed,
                stats.query_embedding_failed
            );
        }
    }
}

async fn run_stats(config: AppConfig) -> Result<()> {
    let path = config.store_path();
    if !path.exists() {
        println!("{} Store not found at {}", "✗".bright_red(), path.display());
        println!("  Run 'apidocs ingest <FILE>' to create one.");
        return Ok(());
    }

    let store = open_store(&config).await?;
    let retrieval = &config.retrieval;

    println!("{} Store Status", "▶".bright_blue());
    println!("  Location: {}", path.display().to_string().bright_cyan());
    println!("  Documents: {}", store.count().await.bright_cyan());
    println!(
        "  Embedding dimension: {}",
        config.store.embedding_dim.bright_cyan()
    );

    println!("{} Retrieval", "▶".bright_blue());
    println!(
        "  RRF k: {}, MMR lambda: {}",
        retrieval.rrf_k, retrieval.mmr_lambda
    );
    println!(
        "  Cache: {} (exact {}, semantic {} @ {})",
        if retrieval.enable_cache { "on" } else { "off" },
        retrieval.cache.exact_capacity,
        retrieval.cache.semantic_capacity,
        retrieval.cache.semantic_threshold
    );
    match (&config.generation, retrieval.enable_expansion) {
        (Some(generation), true) => println!(
            "  Expansion: {:?} {} ({} variations)",
            generation.provider,
            generation.resolved_model(),
            retrieval.max_query_variations
        ),
        _ => println!("  Expansion: off"),
    }

    Ok(())
}

fn parse_filter_pair(raw: &str) -> Result<(String, String), String> {
    let mut parts = raw.splitn(2, '=');
    let key = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "filters must be in KEY=VALUE form".to_string())?;
    let value = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "filters must be in KEY=VALUE form".to_string())?;

    Ok((key.to_string(), value.to_string()))
}
