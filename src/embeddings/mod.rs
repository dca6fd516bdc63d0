//! Embedding generation and persistence for stored topics.

mod ollama;
pub mod storage;

pub use ollama::OllamaEmbedder;
pub use storage::{get_topic_embedding, store_topic_embedding};

use serde_json::Value;

use crate::db::Db;
use crate::error::Result;
use crate::store::{topics_for_embedding, StoredTopic};

/// Retry budget for single-text embedding calls.
const EMBED_MAX_RETRIES: usize = 3;

/// Outcome counters for one embedding pass.
#[derive(Debug, Default, PartialEq)]
pub struct EmbedStats {
    pub embedded: usize,
    pub skipped_no_text: usize,
    pub failed: usize,
}

/// Text used to embed a topic: `content_for_embedding`, falling back to
/// `summary`. None when the topic was never enriched.
pub fn embedding_text(payload: &Value) -> Option<String> {
    payload
        .get("content_for_embedding")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            payload
                .get("summary")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
        .map(str::to_string)
}

/// Embed stored topics and persist the vectors.
///
/// Processes topics missing an embedding (all topics with `force`),
/// batching requests; a failed batch is logged and skipped so one bad
/// batch does not abort the whole pass.
pub async fn process_pending_embeddings(
    db: &Db,
    embedder: &OllamaEmbedder,
    domain: Option<&str>,
    force: bool,
    batch_size: usize,
) -> Result<EmbedStats> {
    let pending = topics_for_embedding(db, domain, force).await?;
    let mut stats = EmbedStats::default();

    let embeddable: Vec<(StoredTopic, String)> = pending
        .into_iter()
        .filter_map(|topic| match embedding_text(&topic.payload) {
            Some(text) => Some((topic, text)),
            None => {
                log::warn!(
                    "Topic {} (domain {}) has no summary to embed, skipping",
                    topic.topic_id,
                    topic.domain
                );
                stats.skipped_no_text += 1;
                None
            }
        })
        .collect();

    if embeddable.is_empty() {
        log::info!("No topics need embedding");
        return Ok(stats);
    }

    let total = embeddable.len();
    log::info!("Embedding {} topics", total);

    for batch in embeddable.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

        match embedder.embed_batch(texts).await {
            Ok(embeddings) => {
                for ((topic, _), embedding) in batch.iter().zip(embeddings.iter()) {
                    match store_topic_embedding(db, &topic.topic_id, &topic.domain, embedding)
                        .await
                    {
                        Ok(()) => stats.embedded += 1,
                        Err(e) => {
                            stats.failed += 1;
                            log::error!(
                                "Failed to store embedding for topic {}: {}",
                                topic.topic_id,
                                e
                            );
                        }
                    }
                }
                log::info!("Embedding progress: {}/{} topics", stats.embedded, total);
            }
            Err(e) => {
                stats.failed += batch.len();
                log::error!("Failed to generate embeddings for batch: {}", e);
                log::warn!("Continuing with next batch...");
            }
        }
    }

    Ok(stats)
}

/// Embed a single ad-hoc text with retries (e.g. for similarity queries).
pub async fn embed_text(embedder: &OllamaEmbedder, text: &str) -> Result<Vec<f32>> {
    embedder.embed_with_cache(text, EMBED_MAX_RETRIES).await
}
