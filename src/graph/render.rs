//! GraphML emission and interactive HTML visualization of graph documents.
//!
//! The renderer consumes the `nodes`/`edges` shape: relationships are
//! adapted into edges with a default weight of 1 before rendering.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use serde_json::{json, Value};

use crate::error::Result;
use crate::graph::{GraphDocument, Node};

/// Color used when a node type has no entry in the scheme and the scheme
/// has no `unknown` fallback.
pub const FALLBACK_COLOR: &str = "#cccccc";

const GRAPH_BASENAME: &str = "knowledge_graph";

/// A directed edge in renderer form.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub weight: f64,
}

/// Renderer-facing view of a graph document.
#[derive(Debug, Clone)]
pub struct RenderGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<RenderEdge>,
}

impl RenderGraph {
    /// Adapt a graph document: `relationships` become `edges` with a
    /// default weight of 1.
    pub fn from_document(doc: &GraphDocument) -> Self {
        Self {
            nodes: doc.nodes.clone(),
            edges: doc
                .relationships
                .iter()
                .map(|rel| RenderEdge {
                    source: rel.source.clone(),
                    target: rel.target.clone(),
                    edge_type: rel.relation_type.clone(),
                    weight: 1.0,
                })
                .collect(),
        }
    }
}

/// Color hex code for a topic type, with case-insensitive lookup and an
/// `unknown` fallback.
pub fn color_for_type(topic_type: &str, scheme: &HashMap<String, String>) -> String {
    let key = topic_type.trim().to_lowercase();
    scheme
        .get(&key)
        .or_else(|| scheme.get("unknown"))
        .cloned()
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

fn node_description(node: &Node) -> String {
    node.properties
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Convert a render graph to a GraphML document.
pub fn to_graphml(graph: &RenderGraph, scheme: &HashMap<String, String>) -> String {
    log::info!("Converting knowledge graph data to GraphML format");

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>\n");
    out.push_str(
        "  <key id=\"description\" for=\"node\" attr.name=\"description\" attr.type=\"string\"/>\n",
    );
    out.push_str(
        "  <key id=\"topic_type\" for=\"node\" attr.name=\"topic_type\" attr.type=\"string\"/>\n",
    );
    out.push_str("  <key id=\"color\" for=\"node\" attr.name=\"color\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"edge_type\" for=\"edge\" attr.name=\"type\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"weight\" for=\"edge\" attr.name=\"weight\" attr.type=\"double\"/>\n");
    out.push_str("  <graph id=\"G\" edgedefault=\"undirected\">\n");

    for node in &graph.nodes {
        let label = escape(node.id.as_str());
        let description = node_description(node);
        let topic_type = node.node_type.to_lowercase();
        let color = color_for_type(&topic_type, scheme);

        let _ = writeln!(out, "    <node id=\"{label}\">");
        let _ = writeln!(out, "      <data key=\"label\">{label}</data>");
        if !description.is_empty() {
            let _ = writeln!(
                out,
                "      <data key=\"description\">{}</data>",
                escape(description.as_str())
            );
        }
        let _ = writeln!(
            out,
            "      <data key=\"topic_type\">{}</data>",
            escape(topic_type.as_str())
        );
        let _ = writeln!(out, "      <data key=\"color\">{color}</data>");
        out.push_str("    </node>\n");
    }

    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "    <edge source=\"{}\" target=\"{}\">",
            escape(edge.source.as_str()),
            escape(edge.target.as_str())
        );
        let _ = writeln!(
            out,
            "      <data key=\"edge_type\">{}</data>",
            escape(edge.edge_type.as_str())
        );
        let _ = writeln!(out, "      <data key=\"weight\">{}</data>", edge.weight);
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n");
    out.push_str("</graphml>");
    out
}

/// Force-layout options for the interactive view.
const NETWORK_OPTIONS: &str = r##"{
  "physics": {
    "forceAtlas2Based": {
      "gravitationalConstant": -50,
      "centralGravity": 0.01,
      "springLength": 100,
      "springConstant": 0.08
    },
    "solver": "forceAtlas2Based",
    "stabilization": {
      "iterations": 150
    }
  },
  "nodes": {
    "font": {
      "size": 14,
      "face": "Tahoma",
      "color": "#333333"
    },
    "borderWidth": 2,
    "borderWidthSelected": 4,
    "scaling": {
      "min": 20,
      "max": 30
    },
    "shadow": true
  },
  "edges": {
    "color": {
      "inherit": false,
      "opacity": 0.7
    },
    "smooth": {
      "enabled": true,
      "type": "continuous"
    },
    "arrows": {
      "to": {
        "enabled": true,
        "scaleFactor": 0.5
      }
    },
    "shadow": true
  },
  "interaction": {
    "hover": true,
    "tooltipDelay": 200,
    "hideEdgesOnDrag": true
  }
}"##;

/// Build the self-contained interactive HTML page (vis-network).
pub fn to_html(graph: &RenderGraph, scheme: &HashMap<String, String>) -> Result<String> {
    let nodes: Vec<Value> = graph
        .nodes
        .iter()
        .map(|node| {
            let description = node_description(node);
            json!({
                "id": node.id,
                "label": node.id,
                "color": color_for_type(&node.node_type, scheme),
                "title": format!("{}<br>{}", node.id, description),
            })
        })
        .collect();

    let edges: Vec<Value> = graph
        .edges
        .iter()
        .map(|edge| {
            json!({
                "from": edge.source,
                "to": edge.target,
                "value": edge.weight,
                "title": format!("Type: {}", edge.edge_type),
            })
        })
        .collect();

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>Knowledge Graph</title>
  <script src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
  <style>
    #graph {{ width: 100%; height: 800px; border: 1px solid #ddd; }}
  </style>
</head>
<body>
  <div id="graph"></div>
  <script>
    const nodes = new vis.DataSet({nodes});
    const edges = new vis.DataSet({edges});
    const container = document.getElementById("graph");
    const options = {options};
    new vis.Network(container, {{ nodes: nodes, edges: edges }}, options);
  </script>
</body>
</html>
"#,
        nodes = serde_json::to_string(&nodes)?,
        edges = serde_json::to_string(&edges)?,
        options = NETWORK_OPTIONS,
    ))
}

/// Generate and save the knowledge graph as GraphML and HTML files.
///
/// Returns the path of the HTML file.
pub fn render_graph(
    doc: &GraphDocument,
    scheme: &HashMap<String, String>,
    save_dir: &Path,
) -> Result<PathBuf> {
    log::info!("Generating and saving knowledge graph visualizations");
    std::fs::create_dir_all(save_dir)?;

    let graph = RenderGraph::from_document(doc);

    let graphml_path = save_dir.join(format!("{GRAPH_BASENAME}.graphml"));
    std::fs::write(&graphml_path, to_graphml(&graph, scheme))?;
    log::info!("GraphML data saved to {}", graphml_path.display());

    let html_path = save_dir.join(format!("{GRAPH_BASENAME}.html"));
    std::fs::write(&html_path, to_html(&graph, scheme)?)?;
    log::info!(
        "Interactive visualization saved to {}",
        html_path.display()
    );

    Ok(html_path)
}
