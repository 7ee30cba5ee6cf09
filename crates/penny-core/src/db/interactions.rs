//! AI interaction audit log storage
//!
//! Rows are insert-only; triggers reject UPDATE and DELETE.

use std::str::FromStr;

use async_trait::async_trait;
use rusqlite::params;

use super::{parse_datetime, Database};
use crate::audit::{AuditLog, InteractionKind, InteractionPayload, InteractionRecord, LogError};
use crate::error::{Error, Result};

/// Raw row before JSON decoding
struct InteractionRow {
    id: i64,
    user_id: String,
    kind: String,
    input: String,
    output: String,
    model: String,
    latency_ms: i64,
    created_at: String,
}

impl InteractionRow {
    fn into_record(self) -> Result<InteractionRecord> {
        let kind = InteractionKind::from_str(&self.kind).map_err(Error::InvalidData)?;
        let payload = InteractionPayload::from_parts(
            kind,
            serde_json::from_str(&self.input)?,
            serde_json::from_str(&self.output)?,
        )?;

        Ok(InteractionRecord {
            id: Some(self.id),
            user_id: self.user_id,
            timestamp: parse_datetime(&self.created_at)?,
            model: self.model,
            latency_ms: u64::try_from(self.latency_ms).unwrap_or(0),
            payload,
        })
    }
}

impl Database {
    /// Append one interaction record, returning its id
    pub fn append_interaction(&self, record: &InteractionRecord) -> Result<i64> {
        let input = serde_json::to_string(&record.payload.input_json()?)?;
        let output = serde_json::to_string(&record.payload.output_json()?)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ai_interactions (
                user_id, kind, input, output, success, model, latency_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.user_id,
                record.kind().as_str(),
                input,
                output,
                record.payload.is_success(),
                record.model,
                i64::try_from(record.latency_ms).unwrap_or(i64::MAX),
                record.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// A user's most recent interactions, newest first
    pub fn list_interactions(&self, user_id: &str, limit: i64) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, kind, input, output, model, latency_ms, created_at
            FROM ai_interactions
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(InteractionRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    input: row.get(3)?,
                    output: row.get(4)?,
                    model: row.get(5)?,
                    latency_ms: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(InteractionRow::into_record).collect()
    }

    /// Number of stored interactions, optionally for one user
    pub fn count_interactions(&self, user_id: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match user_id {
            Some(user_id) => conn.query_row(
                "SELECT COUNT(*) FROM ai_interactions WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM ai_interactions", [], |row| row.get(0))?,
        };
        Ok(count)
    }
}

#[async_trait]
impl AuditLog for Database {
    async fn append(&self, record: &InteractionRecord) -> std::result::Result<(), LogError> {
        let db = self.clone();
        let record = record.clone();

        // SQLite writes block, keep them off the async workers
        tokio::task::spawn_blocking(move || db.append_interaction(&record))
            .await
            .map_err(|e| LogError::Storage(format!("audit task failed: {}", e)))?
            .map(|_| ())
            .map_err(|e| LogError::Storage(e.to_string()))
    }
}
