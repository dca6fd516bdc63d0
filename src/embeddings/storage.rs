//! Embedding persistence: topic embeddings stored as little-endian f32
//! BLOBs on the topic row.

use rusqlite::params;

use crate::db::Db;
use crate::error::{Result, WikigraphError};

/// Encode an embedding as raw little-endian bytes.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian BLOB back into an embedding.
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(WikigraphError::Embedding(
            "Invalid embedding BLOB length".to_string(),
        ));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

/// Store an embedding for a topic.
pub async fn store_topic_embedding(
    db: &Db,
    topic_id: &str,
    domain: &str,
    embedding: &[f32],
) -> Result<()> {
    let bytes = encode_embedding(embedding);
    let topic_id = topic_id.to_string();
    let domain = domain.to_string();

    db.with_connection(move |conn| {
        let rows_affected = conn.execute(
            "UPDATE topics SET embedding = ?1 WHERE topic_id = ?2 AND domain = ?3",
            params![bytes, topic_id, domain],
        )?;

        if rows_affected == 0 {
            return Err(WikigraphError::TopicNotFound(format!(
                "{} (domain {})",
                topic_id, domain
            )));
        }

        Ok(())
    })
    .await
}

/// Retrieve a topic's embedding, or an error if the topic is missing or
/// has no embedding yet.
pub async fn get_topic_embedding(db: &Db, topic_id: &str, domain: &str) -> Result<Vec<f32>> {
    let id = topic_id.to_string();
    let dom = domain.to_string();

    let blob = db
        .with_connection(move |conn| {
            let mut stmt = conn
                .prepare("SELECT embedding FROM topics WHERE topic_id = ?1 AND domain = ?2")?;
            let mut rows = stmt.query(params![id, dom])?;

            match rows.next()? {
                Some(row) => Ok::<Option<Vec<u8>>, WikigraphError>(row.get(0)?),
                None => Err(WikigraphError::TopicNotFound(format!("{} (domain {})", id, dom))),
            }
        })
        .await?;

    match blob {
        Some(blob) => decode_embedding(&blob),
        None => Err(WikigraphError::Embedding(format!(
            "Topic {} has no stored embedding",
            topic_id
        ))),
    }
}
