//! Topic document store: upsert and retrieval of enriched topic records,
//! one document per (topic id, domain).

use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::db::Db;
use crate::error::{Result, WikigraphError};

/// Outcome counters for one `store_topics` call.
#[derive(Debug, Default, PartialEq)]
pub struct StoreStats {
    /// Rows inserted or updated.
    pub stored: usize,
    /// Rows skipped because the payload hash was unchanged.
    pub unchanged: usize,
    /// Records skipped because they carry no `id` field.
    pub skipped: usize,
}

/// A stored topic, as returned by the embedding queries.
#[derive(Debug, Clone)]
pub struct StoredTopic {
    pub topic_id: String,
    pub domain: String,
    pub payload: Value,
}

fn payload_hash(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

/// Store or upsert topics for a domain.
///
/// Topics whose payload is byte-identical to the stored row are skipped.
/// A changed payload invalidates the stored embedding (reset to NULL) so
/// the embed pass re-generates it.
pub async fn store_topics(db: &Db, topics: &[Value], domain: &str) -> Result<StoreStats> {
    let mut rows = Vec::new();
    let mut stats = StoreStats::default();

    for topic in topics {
        let Some(topic_id) = topic.get("id").and_then(Value::as_str) else {
            log::warn!("Skipping topic without an 'id' field");
            stats.skipped += 1;
            continue;
        };
        let title = topic
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let topic_type = topic
            .get("topic_type")
            .and_then(Value::as_str)
            .unwrap_or("entity")
            .to_string();
        let payload = serde_json::to_string(topic)?;
        let hash = payload_hash(&payload);
        rows.push((topic_id.to_string(), title, topic_type, payload, hash));
    }

    if rows.is_empty() {
        return Ok(stats);
    }

    let domain = domain.to_string();
    let updated_at = Utc::now().to_rfc3339();
    let (stored, unchanged) = db
        .with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut stored = 0usize;
            let mut unchanged = 0usize;

            for (topic_id, title, topic_type, payload, hash) in rows {
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT payload_hash FROM topics WHERE topic_id = ?1 AND domain = ?2",
                        params![topic_id, domain],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                if existing.as_deref() == Some(hash.as_str()) {
                    unchanged += 1;
                    continue;
                }

                tx.execute(
                    r#"
                    INSERT INTO topics (
                        topic_id, domain, title, topic_type,
                        payload_json, payload_hash, embedding, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)
                    ON CONFLICT(topic_id, domain) DO UPDATE SET
                        title = excluded.title,
                        topic_type = excluded.topic_type,
                        payload_json = excluded.payload_json,
                        payload_hash = excluded.payload_hash,
                        embedding = NULL,
                        updated_at = excluded.updated_at
                    "#,
                    params![topic_id, domain, title, topic_type, payload, hash, updated_at],
                )?;
                stored += 1;
            }

            tx.commit()?;
            Ok::<(usize, usize), WikigraphError>((stored, unchanged))
        })
        .await?;

    stats.stored = stored;
    stats.unchanged = unchanged;
    log::info!(
        "Stored {} topics ({} unchanged, {} without id)",
        stats.stored,
        stats.unchanged,
        stats.skipped
    );
    Ok(stats)
}

/// Retrieve up to `limit` topic payloads for a domain, ordered by topic id
/// for deterministic output.
pub async fn get_topics(db: &Db, domain: &str, limit: usize) -> Result<Vec<Value>> {
    let domain = domain.to_string();
    let payloads = db
        .with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT payload_json FROM topics WHERE domain = ?1 ORDER BY topic_id LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![domain, limit as i64], |row| {
                row.get::<_, String>(0)
            })?;
            let mut payloads = Vec::new();
            for row in rows {
                payloads.push(row?);
            }
            Ok::<Vec<String>, WikigraphError>(payloads)
        })
        .await?;

    payloads
        .into_iter()
        .map(|p| serde_json::from_str(&p).map_err(WikigraphError::Json))
        .collect()
}

/// Topics that need an embedding. With `include_embedded` every topic is
/// returned (used by `embed --force`); otherwise only rows whose
/// embedding column is NULL.
pub async fn topics_for_embedding(
    db: &Db,
    domain: Option<&str>,
    include_embedded: bool,
) -> Result<Vec<StoredTopic>> {
    let domain = domain.map(str::to_string);
    let rows = db
        .with_connection(move |conn| {
            let mut sql =
                String::from("SELECT topic_id, domain, payload_json FROM topics WHERE 1=1");
            if !include_embedded {
                sql.push_str(" AND embedding IS NULL");
            }
            if domain.is_some() {
                sql.push_str(" AND domain = ?1");
            }
            sql.push_str(" ORDER BY domain, topic_id");

            let mut stmt = conn.prepare(&sql)?;
            let map_row = |row: &rusqlite::Row<'_>| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            };
            let rows = match &domain {
                Some(d) => stmt.query_map(params![d], map_row)?,
                None => stmt.query_map([], map_row)?,
            };
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok::<Vec<(String, String, String)>, WikigraphError>(out)
        })
        .await?;

    rows.into_iter()
        .map(|(topic_id, domain, payload)| {
            Ok(StoredTopic {
                topic_id,
                domain,
                payload: serde_json::from_str(&payload)?,
            })
        })
        .collect()
}
