use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use wikigraph::cache::EmbeddingCache;
use wikigraph::db::{migrate, Db};
use wikigraph::embeddings::{process_pending_embeddings, OllamaEmbedder};
use wikigraph::Config;

#[derive(Parser, Debug)]
#[command(name = "embed")]
#[command(about = "Generate embeddings for stored topics (incremental: only topics without embeddings by default)")]
struct Args {
    /// Re-embed all topics (ignore existing embeddings)
    #[arg(short, long)]
    force: bool,

    /// Restrict to one domain (default: all domains)
    #[arg(short, long)]
    domain: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    log::info!("Starting Wikigraph embedding generation");
    log::info!(
        "Embedding strategy: {}",
        if args.force {
            "FORCE (all topics)"
        } else {
            "INCREMENTAL (topics without embeddings)"
        }
    );

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());
    log::info!(
        "Embedder configured: model={}, batch_size={}",
        config.embeddings.model,
        config.embeddings.batch_size
    );

    // Initialize database (in case it is new)
    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await?;

    let cache = if config.embeddings.cache_capacity > 0 {
        Some(Arc::new(EmbeddingCache::new(config.embeddings.cache_capacity)))
    } else {
        None
    };
    let embedder = OllamaEmbedder::new_with_cache(
        config.embeddings.base_url.clone(),
        config.embeddings.model.clone(),
        config.embeddings.batch_size,
        cache,
    );

    let stats = process_pending_embeddings(
        &db,
        &embedder,
        args.domain.as_deref(),
        args.force,
        config.embeddings.batch_size,
    )
    .await?;

    log::info!("Embedding generation complete!");
    log::info!("Successfully embedded: {} topics", stats.embedded);
    if stats.skipped_no_text > 0 {
        log::warn!("Topics without embeddable text: {}", stats.skipped_no_text);
    }
    if stats.failed > 0 {
        log::warn!("Failed to embed: {} topics", stats.failed);
    }

    Ok(())
}
