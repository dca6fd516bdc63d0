//! Wikidata SPARQL client: domain topic discovery and per-topic
//! relationship properties.

use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::{DomainConfig, TopicSeed, WikidataConfig};
use crate::error::{Result, WikigraphError};

/// Wikidata property ids backing the relationship vocabulary keys.
const VOCABULARY_PROPERTIES: [(&str, &str); 5] = [
    ("P31", "instance of"),
    ("P279", "subclass of"),
    ("P737", "influenced by"),
    ("P178", "developer"),
    ("P856", "official website"),
];

/// SPARQL client for the Wikidata query service.
pub struct WikidataClient {
    client: Client,
    endpoint: String,
}

impl WikidataClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(config: &WikidataConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    /// Fetch base topic records for a domain, splitting `limit` across the
    /// domain's seed classes.
    pub async fn fetch_domain_topics(
        &self,
        domain: &DomainConfig,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut topics: Vec<Value> = Vec::new();
        if limit == 0 || domain.topics.is_empty() {
            return Ok(topics);
        }

        let per_seed = (limit + domain.topics.len() - 1) / domain.topics.len();

        for seed in &domain.topics {
            if topics.len() >= limit {
                break;
            }
            log::debug!(
                "Querying Wikidata for '{}' instances (class {})",
                seed.topic_type,
                seed.entity_id
            );
            let bindings = self.run_query(&topic_batch_query(seed, per_seed)).await?;
            topics.extend(parse_topic_bindings(&bindings, &seed.topic_type));
        }

        topics.truncate(limit);
        Ok(topics)
    }

    /// Fetch the relationship-bearing properties of one entity, grouped
    /// into the nested `properties` map shape.
    pub async fn fetch_topic_properties(&self, qid: &str) -> Result<Map<String, Value>> {
        let bindings = self.run_query(&topic_properties_query(qid)).await?;
        Ok(group_property_bindings(&bindings))
    }

    async fn run_query(&self, query: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query), ("format", "json")])
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| WikigraphError::Fetch(format!("Wikidata request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(WikigraphError::Fetch(format!(
                "Wikidata query failed with {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| WikigraphError::Fetch(format!("Invalid SPARQL JSON: {}", e)))?;

        body["results"]["bindings"]
            .as_array()
            .cloned()
            .ok_or_else(|| {
                WikigraphError::Fetch("SPARQL response missing results.bindings".to_string())
            })
    }
}

fn topic_batch_query(seed: &TopicSeed, limit: usize) -> String {
    format!(
        r#"SELECT ?item ?itemLabel ?itemDescription WHERE {{
  ?item wdt:P31/wdt:P279* wd:{entity}.
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}
LIMIT {limit}"#,
        entity = seed.entity_id,
        limit = limit
    )
}

fn topic_properties_query(qid: &str) -> String {
    let props = VOCABULARY_PROPERTIES
        .iter()
        .map(|(pid, _)| format!("wdt:{}", pid))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        r#"SELECT ?prop ?value ?valueLabel WHERE {{
  VALUES ?prop {{ {props} }}
  wd:{qid} ?prop ?value.
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}"#,
        props = props,
        qid = qid
    )
}

/// The `value` field of one SPARQL binding variable.
fn binding_field<'a>(binding: &'a Value, name: &str) -> Option<&'a str> {
    binding.get(name)?.get("value")?.as_str()
}

/// Entity id from an entity URI, e.g.
/// `http://www.wikidata.org/entity/Q9143` -> `Q9143`.
fn qid_from_uri(uri: &str) -> Option<&str> {
    uri.rsplit('/').next().filter(|s| s.starts_with('Q'))
}

/// Vocabulary key for a direct-property URI, or None for properties
/// outside the vocabulary.
fn property_key_for_uri(uri: &str) -> Option<&'static str> {
    let pid = uri.rsplit('/').next()?;
    VOCABULARY_PROPERTIES
        .iter()
        .find(|(p, _)| *p == pid)
        .map(|(_, key)| *key)
}

/// Convert item bindings into base topic records.
fn parse_topic_bindings(bindings: &[Value], topic_type: &str) -> Vec<Value> {
    bindings
        .iter()
        .filter_map(|binding| {
            let uri = binding_field(binding, "item")?;
            let qid = qid_from_uri(uri)?;
            let title = binding_field(binding, "itemLabel").unwrap_or(qid);

            let mut topic = json!({
                "id": qid,
                "title": title,
                "topic_type": topic_type,
            });
            if let Some(description) = binding_field(binding, "itemDescription") {
                topic["description"] = json!(description);
            }
            Some(topic)
        })
        .collect()
}

/// Group property bindings into the nested `properties` map:
/// vocabulary key -> sequence of `{label, id?}` value-objects.
fn group_property_bindings(bindings: &[Value]) -> Map<String, Value> {
    let mut properties: Map<String, Value> = Map::new();

    for binding in bindings {
        let Some(key) = binding_field(binding, "prop").and_then(property_key_for_uri) else {
            continue;
        };
        let Some(value_uri) = binding_field(binding, "value") else {
            continue;
        };
        // Entities resolve to their English label; literals (e.g. website
        // URLs) are their own label.
        let label = binding_field(binding, "valueLabel").unwrap_or(value_uri);

        let mut object = Map::new();
        object.insert("label".to_string(), json!(label));
        if let Some(qid) = qid_from_uri(value_uri) {
            object.insert("id".to_string(), json!(qid));
        }

        match properties.get_mut(key) {
            Some(Value::Array(values)) => values.push(Value::Object(object)),
            _ => {
                properties.insert(key.to_string(), json!([object]));
            }
        }
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> TopicSeed {
        TopicSeed {
            topic_type: "programming_language".to_string(),
            entity_id: "Q9143".to_string(),
            description: "Programming languages".to_string(),
        }
    }

    #[test]
    fn test_topic_batch_query_shape() {
        let query = topic_batch_query(&seed(), 10);
        assert!(query.contains("wd:Q9143"));
        assert!(query.contains("wdt:P31/wdt:P279*"));
        assert!(query.contains("LIMIT 10"));
    }

    #[test]
    fn test_topic_properties_query_covers_vocabulary() {
        let query = topic_properties_query("Q28865");
        assert!(query.contains("wd:Q28865"));
        for (pid, _) in VOCABULARY_PROPERTIES {
            assert!(query.contains(&format!("wdt:{}", pid)), "missing {}", pid);
        }
    }

    #[test]
    fn test_qid_from_uri() {
        assert_eq!(
            qid_from_uri("http://www.wikidata.org/entity/Q9143"),
            Some("Q9143")
        );
        assert_eq!(qid_from_uri("https://www.python.org/"), None);
    }

    #[test]
    fn test_parse_topic_bindings() {
        let bindings = vec![serde_json::json!({
            "item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q28865"},
            "itemLabel": {"type": "literal", "value": "Python"},
            "itemDescription": {"type": "literal", "value": "programming language"}
        })];

        let topics = parse_topic_bindings(&bindings, "programming_language");
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0]["id"], "Q28865");
        assert_eq!(topics[0]["title"], "Python");
        assert_eq!(topics[0]["topic_type"], "programming_language");
        assert_eq!(topics[0]["description"], "programming language");
    }

    #[test]
    fn test_parse_topic_bindings_skips_non_entities() {
        let bindings = vec![serde_json::json!({
            "item": {"type": "literal", "value": "not a uri"}
        })];
        assert!(parse_topic_bindings(&bindings, "entity").is_empty());
    }

    #[test]
    fn test_group_property_bindings() {
        let bindings = vec![
            serde_json::json!({
                "prop": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P737"},
                "value": {"type": "uri", "value": "http://www.wikidata.org/entity/Q4075"},
                "valueLabel": {"type": "literal", "value": "ABC"}
            }),
            serde_json::json!({
                "prop": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P856"},
                "value": {"type": "uri", "value": "https://www.python.org/"},
                "valueLabel": {"type": "literal", "value": "https://www.python.org/"}
            }),
            // Property outside the vocabulary is dropped
            serde_json::json!({
                "prop": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P138"},
                "value": {"type": "uri", "value": "http://www.wikidata.org/entity/Q16402"},
                "valueLabel": {"type": "literal", "value": "Monty Python"}
            }),
        ];

        let properties = group_property_bindings(&bindings);
        assert_eq!(properties.len(), 2);

        let influenced = properties["influenced by"].as_array().unwrap();
        assert_eq!(influenced[0]["label"], "ABC");
        assert_eq!(influenced[0]["id"], "Q4075");

        let website = properties["official website"].as_array().unwrap();
        assert_eq!(website[0]["label"], "https://www.python.org/");
        assert!(website[0].get("id").is_none());
    }

    #[test]
    fn test_group_property_bindings_accumulates_values() {
        let binding = |label: &str| {
            serde_json::json!({
                "prop": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P737"},
                "value": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1"},
                "valueLabel": {"type": "literal", "value": label}
            })
        };
        let properties = group_property_bindings(&[binding("ABC"), binding("Lisp")]);

        let influenced = properties["influenced by"].as_array().unwrap();
        assert_eq!(influenced.len(), 2);
    }
}
