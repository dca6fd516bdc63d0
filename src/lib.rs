pub mod config;
pub mod error;
pub mod db;
pub mod store;
pub mod collect;
pub mod embeddings;
pub mod cache;
pub mod graph;

pub use config::Config;
pub use error::{WikigraphError, Result};
pub use graph::{GraphDocument, Node, Relationship, RelationshipVocabulary, build_knowledge_graph};
