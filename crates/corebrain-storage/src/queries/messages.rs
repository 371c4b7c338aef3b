// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message history.

use std::str::FromStr;

use corebrain_core::{CoreBrainError, Message, MessageRole};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    metadata: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            metadata: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_message(self) -> Result<Message, CoreBrainError> {
        let role = MessageRole::from_str(&self.role).map_err(|e| CoreBrainError::Storage {
            source: format!("invalid role '{}' on message {}: {e}", self.role, self.id).into(),
        })?;
        let metadata = match self.metadata {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| CoreBrainError::Storage {
                source: Box::new(e),
            })?),
            None => None,
        };
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            role,
            content: self.content,
            metadata,
            created_at: self.created_at,
        })
    }
}

pub async fn insert_message(db: &Database, message: &Message) -> Result<(), CoreBrainError> {
    let m = message.clone();
    let role = m.role.to_string();
    let metadata = m.metadata.as_ref().map(|v| v.to_string());
    db.connection()
        .call(move |conn| -> rusqlite::Result<_> {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![m.id, m.conversation_id, role, m.content, metadata, m.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All messages of a conversation in insertion order.
pub async fn get_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, CoreBrainError> {
    let conversation_id = conversation_id.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, metadata, created_at
                 FROM messages WHERE conversation_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt.query_map(params![conversation_id], MessageRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;
    rows.into_iter().map(MessageRow::into_message).collect()
}

/// The newest `limit` messages, returned oldest first.
pub async fn get_recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, CoreBrainError> {
    let conversation_id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, metadata, created_at FROM (
                     SELECT seq, id, conversation_id, role, content, metadata, created_at
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY seq DESC LIMIT ?2
                 ) ORDER BY seq",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit], MessageRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;
    rows.into_iter().map(MessageRow::into_message).collect()
}
