use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use wikigraph::graph::render::render_graph;
use wikigraph::graph::GraphDocument;
use wikigraph::Config;

#[derive(Parser, Debug)]
#[command(name = "visualize")]
#[command(about = "Generate GraphML and HTML visualizations for a saved knowledge graph")]
struct Args {
    /// Path to the knowledge graph JSON file (default: the most recent
    /// graph_*.json under data_dir)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Domain to use for visualization colors (default: default_domain from config.toml)
    #[arg(short, long)]
    domain: Option<String>,
}

/// Most recently modified `graph_*.json` under the data directory.
fn newest_graph_file(data_dir: &Path) -> Result<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(data_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.starts_with("graph_") || !name.ends_with(".json") {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.into_path()));
        }
    }

    newest
        .map(|(_, path)| path)
        .context("No knowledge graph files found. Run wikigraph --save-graph first.")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let file = match args.file {
        Some(file) => file,
        None => {
            let file = newest_graph_file(config.data_dir())?;
            log::info!("Using the most recent file: {}", file.display());
            file
        }
    };

    let json = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read graph file: {}", file.display()))?;
    let graph: GraphDocument = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse graph file: {}", file.display()))?;

    let domain = args
        .domain
        .unwrap_or_else(|| config.wikigraph.default_domain.clone());
    let colors = &config.domain(&domain)?.colors;

    let out_dir = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.data_dir().to_path_buf());
    let html_path = render_graph(&graph, colors, &out_dir)?;

    println!(
        "Knowledge graph visualization created at {}",
        html_path.display()
    );
    Ok(())
}
