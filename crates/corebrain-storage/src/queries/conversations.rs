// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use corebrain_core::{Conversation, CoreBrainError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Conversation, String)> {
    Ok((
        Conversation {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            metadata: serde_json::Value::Null,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        },
        row.get(3)?,
    ))
}

fn with_metadata((mut conversation, raw): (Conversation, String)) -> Conversation {
    conversation.metadata = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
    conversation
}

pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), CoreBrainError> {
    let c = conversation.clone();
    let metadata = c.metadata.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<_> {
            conn.execute(
                "INSERT INTO conversations (id, owner_id, title, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![c.id, c.owner_id, c.title, metadata, c.created_at, c.updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, CoreBrainError> {
    let id = id.to_string();
    let row = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, title, metadata, created_at, updated_at
                 FROM conversations WHERE id = ?1",
            )?;
            match stmt.query_row(params![id], row_to_conversation) {
                Ok(found) => Ok(Some(found)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;
    Ok(row.map(with_metadata))
}

/// Conversations for one owner, most recently updated first.
pub async fn list_conversations(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<Conversation>, CoreBrainError> {
    let owner_id = owner_id.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, title, metadata, created_at, updated_at
                 FROM conversations WHERE owner_id = ?1
                 ORDER BY updated_at DESC, id",
            )?;
            let rows = stmt.query_map(params![owner_id], row_to_conversation)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(rows.into_iter().map(with_metadata).collect())
}

/// Replace metadata and bump `updated_at`. Unknown ids are a `NotFound`.
pub async fn update_metadata(
    db: &Database,
    id: &str,
    metadata: &serde_json::Value,
    updated_at: &str,
) -> Result<(), CoreBrainError> {
    let id = id.to_string();
    let lookup = id.clone();
    let metadata = metadata.to_string();
    let updated_at = updated_at.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            conn.execute(
                "UPDATE conversations SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
                params![metadata, updated_at, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(CoreBrainError::NotFound(format!("conversation {lookup}")));
    }
    Ok(())
}
