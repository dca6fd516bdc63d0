use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub wikigraph: WikigraphConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    /// Domain name -> fetch seeds and visualization colors.
    pub domains: HashMap<String, DomainConfig>,
}

/// Wikigraph-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikigraphConfig {
    /// Directory where timestamped run outputs (graph JSON, renderings) land.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_domain")]
    pub default_domain: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Wikidata SPARQL endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikidataConfig {
    #[serde(default = "default_wikidata_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_wikidata_user_agent")]
    pub user_agent: String,
    /// Bounded concurrency for per-topic property fetches and enrichment.
    #[serde(default = "default_fetch_batch_size")]
    pub batch_size: usize,
}

/// Wikipedia REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_wikipedia_user_agent")]
    pub user_agent: String,
}

/// Embeddings configuration (local Ollama server)
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Per-domain fetch seeds and visualization colors
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    /// Display name, e.g. "Programming".
    pub name: String,
    /// Topic type -> color hex; should include an `unknown` fallback.
    #[serde(default)]
    pub colors: HashMap<String, String>,
    /// SPARQL seed classes fetched for this domain.
    pub topics: Vec<TopicSeed>,
}

/// One SPARQL seed: instances/subclasses of `entity_id` become topics of
/// type `topic_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicSeed {
    #[serde(rename = "type")]
    pub topic_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub description: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./wikigraph.db")
}

fn default_domain() -> String {
    "programming".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_wikidata_endpoint() -> String {
    "https://query.wikidata.org/sparql".to_string()
}

fn default_wikidata_user_agent() -> String {
    "WikigraphBot/1.0 (wikigraph@example.com)".to_string()
}

fn default_fetch_batch_size() -> usize {
    5
}

fn default_wikipedia_endpoint() -> String {
    "https://en.wikipedia.org/api/rest_v1".to_string()
}

fn default_wikipedia_user_agent() -> String {
    "WikigraphWikipediaBot/1.0 (wikigraph@example.com)".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            endpoint: default_wikidata_endpoint(),
            user_agent: default_wikidata_user_agent(),
            batch_size: default_fetch_batch_size(),
        }
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_wikipedia_endpoint(),
            user_agent: default_wikipedia_user_agent(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_embedding_model(),
            batch_size: default_embed_batch_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in WIKIGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("WIKIGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            anyhow::bail!("At least one [domains.<name>] section is required");
        }

        if !self.domains.contains_key(&self.wikigraph.default_domain) {
            anyhow::bail!(
                "default_domain '{}' has no [domains.{}] section",
                self.wikigraph.default_domain,
                self.wikigraph.default_domain
            );
        }

        for (domain, config) in &self.domains {
            if config.topics.is_empty() {
                anyhow::bail!("Domain '{}' must declare at least one seed topic", domain);
            }
            for seed in &config.topics {
                if !seed.entity_id.starts_with('Q') {
                    anyhow::bail!(
                        "Domain '{}': entity_id '{}' is not a Wikidata Q-id",
                        domain,
                        seed.entity_id
                    );
                }
            }
        }

        if self.wikidata.batch_size == 0 {
            anyhow::bail!("wikidata.batch_size must be greater than 0");
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.wikigraph.db_path
    }

    /// Get the run output directory root
    pub fn data_dir(&self) -> &Path {
        &self.wikigraph.data_dir
    }

    /// Domain configuration by name
    pub fn domain(&self, name: &str) -> crate::error::Result<&DomainConfig> {
        self.domains.get(name).ok_or_else(|| {
            crate::error::WikigraphError::Config(format!(
                "Domain '{}' is not configured (add a [domains.{}] section)",
                name, name
            ))
        })
    }
}
