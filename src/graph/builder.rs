//! Two-pass construction of a [`GraphDocument`] from a batch of topic
//! records.
//!
//! Pass one materializes a node per topic (last write wins on duplicate
//! titles). Pass two re-walks the batch and derives directed edges from the
//! nested `properties` map, materializing external nodes for labels the
//! batch itself never declared.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{Result, WikigraphError};

use super::{
    GraphDocument, Node, Relationship, RelationshipVocabulary, DEFAULT_NODE_TYPE,
    RELATIONSHIP_PROPERTIES_KEY, UNKNOWN_NODE_ID,
};

/// Fields consumed structurally in the node pass; everything else passes
/// through into the node's attribute bag.
const STRUCTURAL_FIELDS: [&str; 4] = ["title", "topic_type", "properties", "references"];

/// Node table preserving first-seen insertion order.
///
/// Overwriting an existing id keeps its original position, matching the
/// ordering contract of the serialized document.
#[derive(Default)]
struct NodeTable {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodeTable {
    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Insert a node, replacing any existing node with the same id.
    fn upsert(&mut self, node: Node) {
        match self.index.get(&node.id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Insert a node only if its id is not yet present.
    fn insert_if_absent(&mut self, node: Node) {
        if !self.contains(&node.id) {
            self.upsert(node);
        }
    }

    fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

/// Assemble a batch of topic records into a graph document.
///
/// Identity resolution is by exact, whitespace-trimmed label equality: a
/// relationship value whose label matches an existing node id reuses that
/// node instead of creating a duplicate. Labels never seen before become
/// external nodes of type `entity` carrying the full value-object as their
/// attributes.
///
/// Malformed records (non-mapping topics, non-mapping `properties`,
/// non-sequence property values, non-mapping value-objects, non-string
/// `title`/`topic_type`/`label`) fail the entire construction: no partial
/// document is ever returned.
pub fn build_knowledge_graph(
    topics: &[Value],
    vocabulary: &RelationshipVocabulary,
) -> Result<GraphDocument> {
    let mut table = NodeTable::default();
    let mut relationships = Vec::new();

    // First, create nodes for each topic.
    for (i, topic) in topics.iter().enumerate() {
        let record = as_record(topic, i)?;
        let node_id = resolve_node_id(record, i)?;
        let node_type = match record.get("topic_type") {
            None => DEFAULT_NODE_TYPE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(malformed(i, "topic_type is not a string")),
        };

        let mut attributes: Map<String, Value> = record
            .iter()
            .filter(|(k, _)| !STRUCTURAL_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        // Preserve the raw relationship data verbatim, separate from the
        // edges derived from it below.
        if let Some(props) = record.get("properties") {
            attributes.insert(RELATIONSHIP_PROPERTIES_KEY.to_string(), props.clone());
        }

        table.upsert(Node::new(node_id, node_type, attributes));
    }

    // Now, derive relationships from each topic's nested "properties" map.
    for (i, topic) in topics.iter().enumerate() {
        let record = as_record(topic, i)?;
        let source_id = resolve_node_id(record, i)?;
        if !table.contains(&source_id) {
            continue;
        }

        let Some(props_value) = record.get("properties") else {
            continue;
        };
        let props = props_value
            .as_object()
            .ok_or_else(|| malformed(i, "properties is not a mapping"))?;

        for (property_key, values) in props {
            let Some(relation_type) = vocabulary.relation_type(property_key) else {
                continue;
            };
            let values = values.as_array().ok_or_else(|| {
                malformed(i, format!("values for '{property_key}' are not a sequence"))
            })?;

            for value in values {
                let object = value.as_object().ok_or_else(|| {
                    malformed(i, format!("value under '{property_key}' is not a mapping"))
                })?;
                let target_label = match object.get("label") {
                    None => continue,
                    Some(Value::String(s)) => s.trim(),
                    Some(_) => {
                        return Err(malformed(
                            i,
                            format!("label under '{property_key}' is not a string"),
                        ))
                    }
                };
                if target_label.is_empty() {
                    continue;
                }

                // Reuse an existing node with this label, or materialize an
                // external node carrying the full value-object.
                table.insert_if_absent(Node::new(
                    target_label,
                    DEFAULT_NODE_TYPE,
                    object.clone(),
                ));

                relationships.push(Relationship::new(
                    source_id.clone(),
                    target_label,
                    relation_type,
                    Map::new(),
                ));
            }
        }
    }

    Ok(GraphDocument::new(table.into_nodes(), relationships))
}

/// Node id of a topic record: trimmed `title`, falling back to the
/// `Unknown` placeholder when the title is absent or blank so that ids are
/// never empty.
fn resolve_node_id(record: &Map<String, Value>, index: usize) -> Result<String> {
    match record.get("title") {
        None => Ok(UNKNOWN_NODE_ID.to_string()),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(UNKNOWN_NODE_ID.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(malformed(index, "title is not a string")),
    }
}

fn as_record(topic: &Value, index: usize) -> Result<&Map<String, Value>> {
    topic
        .as_object()
        .ok_or_else(|| malformed(index, "topic record is not a mapping"))
}

fn malformed(index: usize, message: impl std::fmt::Display) -> WikigraphError {
    WikigraphError::MalformedTopic(format!("topic {index}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(topics: Vec<Value>) -> GraphDocument {
        build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap()
    }

    #[test]
    fn test_python_influenced_by_abc() {
        let doc = build(vec![json!({
            "title": "Python",
            "topic_type": "programming_language",
            "properties": {"influenced by": [{"label": "ABC"}]}
        })]);

        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].id, "Python");
        assert_eq!(doc.nodes[0].node_type, "programming_language");
        assert_eq!(doc.nodes[1].id, "ABC");
        assert_eq!(doc.nodes[1].node_type, "entity");

        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].source, "Python");
        assert_eq!(doc.relationships[0].target, "ABC");
        assert_eq!(doc.relationships[0].relation_type, "influenced_by");
    }

    #[test]
    fn test_empty_properties_yields_node_only() {
        let doc = build(vec![json!({
            "title": "Rust",
            "topic_type": "programming_language",
            "properties": {}
        })]);

        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_absent_properties_yields_node_only() {
        let doc = build(vec![json!({"title": "Rust"})]);

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].node_type, "entity");
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_whitespace_label_skipped() {
        let doc = build(vec![json!({
            "title": "Python",
            "properties": {"influenced by": [{"label": "  "}]}
        })]);

        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_absent_label_skipped() {
        let doc = build(vec![json!({
            "title": "Python",
            "properties": {"influenced by": [{"id": "Q4075"}]}
        })]);

        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_reference_resolves_to_existing_topic_node() {
        let doc = build(vec![
            json!({"title": "Go", "topic_type": "programming_language"}),
            json!({
                "title": "Kubernetes",
                "topic_type": "software_framework",
                "properties": {"developer": [{"label": " Go "}]}
            }),
        ]);

        // No duplicate "Go" node; the edge targets the topic's own node.
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.node("Go").unwrap().node_type, "programming_language");
        assert_eq!(doc.relationships[0].target, "Go");
    }

    #[test]
    fn test_external_node_shared_across_records() {
        let doc = build(vec![
            json!({"title": "Python", "properties": {"influenced by": [{"label": "ABC"}]}}),
            json!({"title": "Perl", "properties": {"influenced by": [{"label": "ABC"}]}}),
        ]);

        // ABC is materialized once and reused.
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.relationships.len(), 2);
        assert!(doc.relationships.iter().all(|r| r.target == "ABC"));
    }

    #[test]
    fn test_external_node_keeps_full_value_object() {
        let doc = build(vec![json!({
            "title": "Python",
            "properties": {"developer": [{"label": "PSF", "id": "Q123", "kind": "org"}]}
        })]);

        let psf = doc.node("PSF").unwrap();
        assert_eq!(psf.node_type, "entity");
        assert_eq!(psf.properties["label"], "PSF");
        assert_eq!(psf.properties["id"], "Q123");
        assert_eq!(psf.properties["kind"], "org");
    }

    #[test]
    fn test_last_write_wins_on_duplicate_title() {
        let doc = build(vec![
            json!({"title": "Go", "topic_type": "programming_language", "summary": "first"}),
            json!({"title": " Go ", "topic_type": "programming_language", "summary": "second"}),
        ]);

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].properties["summary"], "second");
    }

    #[test]
    fn test_unknown_vocabulary_key_ignored() {
        let doc = build(vec![json!({
            "title": "Python",
            "properties": {"named after": [{"label": "Monty Python"}]}
        })]);

        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_self_relationship_permitted() {
        let doc = build(vec![json!({
            "title": "Lisp",
            "properties": {"influenced by": [{"label": "Lisp"}]}
        })]);

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].source, "Lisp");
        assert_eq!(doc.relationships[0].target, "Lisp");
    }

    #[test]
    fn test_duplicate_relationships_preserved() {
        let doc = build(vec![json!({
            "title": "Python",
            "properties": {"influenced by": [{"label": "ABC"}, {"label": "ABC"}]}
        })]);

        assert_eq!(doc.relationships.len(), 2);
        assert_eq!(doc.relationships[0], doc.relationships[1]);
    }

    #[test]
    fn test_missing_title_falls_back_to_unknown() {
        let doc = build(vec![json!({"topic_type": "programming_language"})]);

        assert_eq!(doc.nodes[0].id, "Unknown");
    }

    #[test]
    fn test_blank_title_falls_back_to_unknown() {
        let doc = build(vec![json!({"title": "   "})]);

        assert_eq!(doc.nodes[0].id, "Unknown");
    }

    #[test]
    fn test_attributes_exclude_structural_fields() {
        let doc = build(vec![json!({
            "title": "Python",
            "topic_type": "programming_language",
            "references": ["https://example.com"],
            "summary": "a language",
            "properties": {"influenced by": [{"label": "ABC"}]}
        })]);

        let node = doc.node("Python").unwrap();
        assert!(!node.properties.contains_key("title"));
        assert!(!node.properties.contains_key("topic_type"));
        assert!(!node.properties.contains_key("references"));
        assert!(!node.properties.contains_key("properties"));
        assert_eq!(node.properties["summary"], "a language");
    }

    #[test]
    fn test_raw_relationship_properties_preserved() {
        let props = json!({"influenced by": [{"label": "ABC"}]});
        let doc = build(vec![json!({"title": "Python", "properties": props})]);

        let node = doc.node("Python").unwrap();
        assert_eq!(node.properties[RELATIONSHIP_PROPERTIES_KEY], props);
    }

    #[test]
    fn test_node_ids_unique() {
        let doc = build(vec![
            json!({"title": "Python", "properties": {"influenced by": [{"label": "ABC"}]}}),
            json!({"title": "ABC", "topic_type": "programming_language"}),
            json!({"title": "Python"}),
        ]);

        let mut ids: Vec<_> = doc.nodes.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), doc.nodes.len());
    }

    #[test]
    fn test_every_endpoint_resolves() {
        let doc = build(vec![
            json!({"title": "Python", "properties": {
                "influenced by": [{"label": "ABC"}, {"label": "Lisp"}],
                "developer": [{"label": "PSF"}]
            }}),
            json!({"title": "Lisp", "properties": {"influenced by": [{"label": "Python"}]}}),
        ]);

        for rel in &doc.relationships {
            assert!(doc.node(&rel.source).is_some(), "missing source {}", rel.source);
            assert!(doc.node(&rel.target).is_some(), "missing target {}", rel.target);
        }
    }

    #[test]
    fn test_construction_is_idempotent() {
        let topics = vec![
            json!({"title": "Python", "topic_type": "programming_language", "properties": {
                "influenced by": [{"label": "ABC"}],
                "developer": [{"label": "PSF"}]
            }}),
            json!({"title": "ABC", "topic_type": "programming_language"}),
        ];

        let first = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap();
        let second = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.to_json_pretty().unwrap(),
            second.to_json_pretty().unwrap()
        );
    }

    #[test]
    fn test_relationship_order_follows_input_order() {
        let doc = build(vec![
            json!({"title": "A", "properties": {
                "instance of": [{"label": "X"}, {"label": "Y"}],
                "developer": [{"label": "Z"}]
            }}),
            json!({"title": "B", "properties": {"influenced by": [{"label": "A"}]}}),
        ]);

        let order: Vec<_> = doc
            .relationships
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str()))
            .collect();
        assert_eq!(order, vec![("A", "X"), ("A", "Y"), ("A", "Z"), ("B", "A")]);
    }

    #[test]
    fn test_non_mapping_topic_fails_whole_call() {
        let topics = vec![json!({"title": "Python"}), json!("not a record")];
        let err = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap_err();
        assert!(matches!(err, WikigraphError::MalformedTopic(_)));
        assert!(err.to_string().contains("topic 1"));
    }

    #[test]
    fn test_non_mapping_properties_fails() {
        let topics = vec![json!({"title": "Python", "properties": "oops"})];
        let err = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap_err();
        assert!(matches!(err, WikigraphError::MalformedTopic(_)));
    }

    #[test]
    fn test_non_sequence_values_fails() {
        let topics = vec![json!({"title": "Python", "properties": {"developer": {"label": "PSF"}}})];
        let err = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap_err();
        assert!(matches!(err, WikigraphError::MalformedTopic(_)));
    }

    #[test]
    fn test_non_mapping_value_object_fails() {
        let topics = vec![json!({"title": "Python", "properties": {"developer": ["PSF"]}})];
        let err = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap_err();
        assert!(matches!(err, WikigraphError::MalformedTopic(_)));
    }

    #[test]
    fn test_non_string_label_fails() {
        let topics = vec![json!({"title": "Python", "properties": {"developer": [{"label": 42}]}})];
        let err = build_knowledge_graph(&topics, &RelationshipVocabulary::default()).unwrap_err();
        assert!(matches!(err, WikigraphError::MalformedTopic(_)));
    }

    #[test]
    fn test_empty_batch_yields_empty_document() {
        let doc = build(vec![]);
        assert!(doc.nodes.is_empty());
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = RelationshipVocabulary::new([("depends on", "depends_on")]);
        let topics = vec![json!({
            "title": "A",
            "properties": {
                "depends on": [{"label": "B"}],
                "influenced by": [{"label": "C"}]
            }
        })];

        let doc = build_knowledge_graph(&topics, &vocab).unwrap();
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].relation_type, "depends_on");
    }
}
