use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wikigraph::cache::EmbeddingCache;
use wikigraph::collect::collect_topics;
use wikigraph::db::{migrate, Db};
use wikigraph::embeddings::{process_pending_embeddings, OllamaEmbedder};
use wikigraph::graph::render::render_graph;
use wikigraph::graph::{build_knowledge_graph, RelationshipVocabulary};
use wikigraph::store::store_topics;
use wikigraph::Config;

#[derive(Parser, Debug)]
#[command(name = "wikigraph")]
#[command(about = "Generate a knowledge graph from domain-specific topics dynamically")]
struct Args {
    /// Domain to fetch topics for (default: default_domain from config.toml)
    #[arg(short, long)]
    domain: Option<String>,

    /// Number of topics to fetch
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Save the JSON output to a file instead of printing
    #[arg(long)]
    save_graph: bool,

    /// Also render GraphML and interactive HTML into the output directory
    #[arg(long)]
    render: bool,

    /// Skip embedding generation
    #[arg(long)]
    skip_embed: bool,
}

/// Build a configured embedder with an optional LRU embedding cache.
fn build_embedder(config: &Config) -> OllamaEmbedder {
    let cache = if config.embeddings.cache_capacity > 0 {
        Some(Arc::new(EmbeddingCache::new(config.embeddings.cache_capacity)))
    } else {
        None
    };

    OllamaEmbedder::new_with_cache(
        config.embeddings.base_url.clone(),
        config.embeddings.model.clone(),
        config.embeddings.batch_size,
        cache,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    log::info!("Starting Wikigraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let domain = args
        .domain
        .unwrap_or_else(|| config.wikigraph.default_domain.clone());
    log::info!("Domain: {} (limit {})", domain, args.limit);
    log::info!("Database path: {}", config.db_path().display());

    // Initialize database
    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await?;
    log::info!("Database initialized");

    // Timestamped output directory per run
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir: PathBuf = config.data_dir().join(timestamp);

    // Dynamically fetch and enrich topics
    let topics = collect_topics(&config, &domain, args.limit).await?;
    if topics.is_empty() {
        log::warn!("No topics retrieved; exiting.");
        return Ok(());
    }

    // Store topics in the document store
    let stats = store_topics(&db, &topics, &domain).await?;
    log::info!(
        "Stored in topic store: {} new/updated, {} unchanged",
        stats.stored,
        stats.unchanged
    );

    // Generate embeddings for topics that need them
    if args.skip_embed {
        log::info!("Skipping embedding generation (--skip-embed)");
    } else {
        let embedder = build_embedder(&config);
        let embed_stats = process_pending_embeddings(
            &db,
            &embedder,
            Some(&domain),
            false,
            config.embeddings.batch_size,
        )
        .await?;
        log::info!(
            "Embeddings: {} generated, {} without text, {} failed",
            embed_stats.embedded,
            embed_stats.skipped_no_text,
            embed_stats.failed
        );
    }

    // Build the knowledge graph
    let graph = build_knowledge_graph(&topics, &RelationshipVocabulary::default())?;
    log::info!(
        "Built graph: {} nodes, {} relationships",
        graph.nodes.len(),
        graph.relationships.len()
    );
    let graph_json = graph.to_json_pretty()?;

    if args.save_graph {
        std::fs::create_dir_all(&output_dir)?;
        let out_path = output_dir.join(format!("graph_{}_limit{}.json", domain, args.limit));
        std::fs::write(&out_path, &graph_json)?;
        log::info!("Saved graph to {}", out_path.display());
    } else {
        println!("{}", graph_json);
    }

    if args.render {
        let colors = &config.domain(&domain)?.colors;
        let html_path = render_graph(&graph, colors, &output_dir)?;
        log::info!(
            "Knowledge graph visualization created at {}",
            html_path.display()
        );
    }

    Ok(())
}
