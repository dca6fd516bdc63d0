//! Wikipedia REST client: summary enrichment of topic records.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::config::WikipediaConfig;
use crate::error::{Result, WikigraphError};

/// Client for the Wikipedia REST API (`/page/summary/{title}`).
pub struct WikipediaClient {
    client: Client,
    endpoint: Url,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            WikigraphError::Config(format!(
                "Invalid wikipedia.endpoint '{}': {}",
                config.endpoint, e
            ))
        })?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self { client, endpoint })
    }

    fn summary_url(&self, title: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        // Wikipedia page titles use underscores for spaces; everything else
        // is percent-encoded by the segment writer.
        let page = title.trim().replace(' ', "_");
        url.path_segments_mut()
            .map_err(|_| {
                WikigraphError::Config(format!("wikipedia.endpoint '{}' cannot be a base", self.endpoint))
            })?
            .extend(["page", "summary", page.as_str()]);
        Ok(url)
    }

    /// Enrich one topic record with its Wikipedia summary.
    ///
    /// Sets `summary`, `content_for_embedding`, and `references` on the
    /// record. Returns false (without error) when the page does not exist;
    /// partial coverage of a domain is expected.
    pub async fn enrich_topic(&self, topic: &mut Value) -> Result<bool> {
        let Some(title) = topic.get("title").and_then(Value::as_str).map(str::to_string) else {
            return Ok(false);
        };

        let url = self.summary_url(&title)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WikigraphError::Fetch(format!("Wikipedia request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            log::warn!("No Wikipedia page for '{}'", title);
            return Ok(false);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(WikigraphError::Fetch(format!(
                "Wikipedia summary for '{}' failed with {}",
                title, status
            )));
        }

        let summary: Value = response
            .json()
            .await
            .map_err(|e| WikigraphError::Fetch(format!("Invalid summary JSON: {}", e)))?;

        let Some(extract) = summary
            .get("extract")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        else {
            log::warn!("Empty Wikipedia summary for '{}'", title);
            return Ok(false);
        };

        topic["summary"] = json!(extract);
        topic["content_for_embedding"] = json!(format!("{}: {}", title, extract));
        if let Some(page_url) = summary
            .pointer("/content_urls/desktop/page")
            .and_then(Value::as_str)
        {
            topic["references"] = json!([page_url]);
        }

        Ok(true)
    }
}
