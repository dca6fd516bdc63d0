//! Topic collection: Wikidata discovery enriched with Wikipedia summaries.
//!
//! Produces the fully-materialized topic batch the graph builder consumes;
//! per-topic property fetches and enrichment run with bounded concurrency.

mod wikidata;
mod wikipedia;

pub use wikidata::WikidataClient;
pub use wikipedia::WikipediaClient;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;

/// Fetch and enrich topics for a domain.
///
/// An empty result is not an error; the caller decides whether to abort.
pub async fn collect_topics(config: &Config, domain_name: &str, limit: usize) -> Result<Vec<Value>> {
    let domain = config.domain(domain_name)?;
    let concurrency = config.wikidata.batch_size;

    let wikidata = WikidataClient::new(&config.wikidata);
    let topics = wikidata.fetch_domain_topics(domain, limit).await?;
    if topics.is_empty() {
        log::error!("Failed to retrieve {} topics from Wikidata", domain_name);
        return Ok(Vec::new());
    }
    log::info!(
        "Successfully retrieved {} topics from Wikidata",
        topics.len()
    );

    // Attach relationship properties per topic.
    let wikidata_ref = &wikidata;
    let topics: Vec<Result<Value>> = stream::iter(topics.into_iter().map(|mut topic| async move {
        if let Some(qid) = topic.get("id").and_then(Value::as_str).map(str::to_string) {
            let properties = wikidata_ref.fetch_topic_properties(&qid).await?;
            if !properties.is_empty() {
                topic["properties"] = Value::Object(properties);
            }
        }
        Ok(topic)
    }))
    .buffered(concurrency)
    .collect()
    .await;
    let topics = topics.into_iter().collect::<Result<Vec<_>>>()?;

    // Enrich with Wikipedia summaries. Missing pages or per-topic failures
    // leave the record unenriched; the batch still flows through.
    let wikipedia = WikipediaClient::new(&config.wikipedia)?;
    let wikipedia_ref = &wikipedia;
    let topics: Vec<Value> = stream::iter(topics.into_iter().map(|mut topic| async move {
        if let Err(e) = wikipedia_ref.enrich_topic(&mut topic).await {
            let title = topic
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("<untitled>");
            log::warn!("Wikipedia enrichment failed for '{}': {}", title, e);
        }
        topic
    }))
    .buffered(concurrency)
    .collect()
    .await;

    let enriched = topics
        .iter()
        .filter(|t| t.get("summary").is_some())
        .count();
    log::info!(
        "Successfully enriched {}/{} topics with Wikipedia data",
        enriched,
        topics.len()
    );

    Ok(topics)
}
