//! Knowledge graph module: typed nodes, typed relationships, and the
//! construction engine that assembles a batch of topic records into a
//! graph document.

mod builder;
pub mod render;

pub use builder::build_knowledge_graph;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute key under which a topic's raw relationship-property map is
/// preserved on its node, for audit/debugging alongside the derived edges.
/// A source field with the same name is overwritten by the raw map.
pub const RELATIONSHIP_PROPERTIES_KEY: &str = "relationship_properties";

/// Node type assigned when a topic carries no `topic_type` and to nodes
/// materialized from relationship values.
pub const DEFAULT_NODE_TYPE: &str = "entity";

/// Fallback node id for topics without a usable title.
pub const UNKNOWN_NODE_ID: &str = "Unknown";

/// Mapping of relationship-bearing property keys to edge types.
///
/// Property keys outside the vocabulary never produce relationships. The
/// default vocabulary covers the wiki-derived keys the pipeline emits.
#[derive(Debug, Clone)]
pub struct RelationshipVocabulary {
    entries: HashMap<String, String>,
}

impl RelationshipVocabulary {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Edge type for a source property key, or None if the key is not in
    /// the vocabulary.
    pub fn relation_type(&self, property_key: &str) -> Option<&str> {
        self.entries.get(property_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RelationshipVocabulary {
    fn default() -> Self {
        Self::new([
            ("instance of", "instance_of"),
            ("subclass of", "subclass_of"),
            ("influenced by", "influenced_by"),
            ("developer", "developer"),
            ("official website", "official_website"),
        ])
    }
}

/// A vertex in the knowledge graph, identified by its canonical label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical label of the entity, unique within a document.
    pub id: String,
    /// Entity classification tag, e.g. `programming_language`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Open attribute bag: every source field not consumed structurally.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Node {
    /// No validation beyond what the builder already guarantees; callers
    /// must supply a non-empty id.
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties,
        }
    }

    /// Serialized form: `{id, type, properties}`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("node serialization is infallible")
    }
}

/// A directed, typed edge between two nodes, referencing them by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Id of the source node.
    pub source: String,
    /// Id of the target node.
    pub target: String,
    /// Edge type from the relationship vocabulary.
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Edge-level metadata, empty unless the derivation supplies any.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            properties,
        }
    }

    /// Serialized form: `{source, target, type, properties}`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("relationship serialization is infallible")
    }
}

/// Aggregate of nodes and relationships produced by one construction call.
///
/// Nodes are in first-seen order, relationships in insertion order; both
/// orders are stable so re-serializing an unmodified document is
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl GraphDocument {
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        Self {
            nodes,
            relationships,
        }
    }

    /// Serialized form: `{nodes: [...], relationships: [...]}`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("graph serialization is infallible")
    }

    /// Pretty-printed JSON, the hand-off artifact for persistence and
    /// visualization collaborators.
    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_serializes_with_type_key() {
        let mut props = Map::new();
        props.insert("description".to_string(), json!("a language"));
        let node = Node::new("Python", "programming_language", props);

        let value = node.to_value();
        assert_eq!(value["id"], "Python");
        assert_eq!(value["type"], "programming_language");
        assert_eq!(value["properties"]["description"], "a language");
    }

    #[test]
    fn test_relationship_serializes_endpoint_ids() {
        let rel = Relationship::new("Python", "ABC", "influenced_by", Map::new());

        let value = rel.to_value();
        assert_eq!(value["source"], "Python");
        assert_eq!(value["target"], "ABC");
        assert_eq!(value["type"], "influenced_by");
        assert!(value["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_graph_document_shape() {
        let doc = GraphDocument::new(
            vec![Node::new("Go", "programming_language", Map::new())],
            vec![],
        );

        let value = doc.to_value();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 1);
        assert_eq!(value["relationships"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_graph_document_roundtrip() {
        let doc = GraphDocument::new(
            vec![Node::new("Go", "programming_language", Map::new())],
            vec![Relationship::new("Go", "Go", "influenced_by", Map::new())],
        );

        let json = doc.to_json_pretty().unwrap();
        let parsed: GraphDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_default_vocabulary() {
        let vocab = RelationshipVocabulary::default();
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.relation_type("instance of"), Some("instance_of"));
        assert_eq!(vocab.relation_type("subclass of"), Some("subclass_of"));
        assert_eq!(vocab.relation_type("influenced by"), Some("influenced_by"));
        assert_eq!(vocab.relation_type("developer"), Some("developer"));
        assert_eq!(vocab.relation_type("official website"), Some("official_website"));
        assert_eq!(vocab.relation_type("named after"), None);
    }
}
