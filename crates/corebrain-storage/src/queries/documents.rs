// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON document rows for the SQLite document backend.
//!
//! Bodies are stored as JSON text keyed by `(collection, doc_id)`; scans
//! return them in insertion order.

use corebrain_core::CoreBrainError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Insert or replace documents, all in one transaction. Returns the number
/// of rows written.
pub async fn upsert_documents(
    db: &Database,
    collection: &str,
    rows: Vec<(String, String)>,
) -> Result<usize, CoreBrainError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
                     ON CONFLICT (collection, doc_id) DO UPDATE SET body = excluded.body",
                )?;
                for (doc_id, body) in &rows {
                    written += stmt.execute(params![collection, doc_id, body])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_collections(db: &Database) -> Result<Vec<String>, CoreBrainError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<_> {
            let mut stmt =
                conn.prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Raw JSON bodies of a collection, at most `limit` when given.
pub async fn scan_bodies(
    db: &Database,
    collection: &str,
    limit: Option<usize>,
) -> Result<Vec<String>, CoreBrainError> {
    let collection = collection.to_string();
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    db.connection()
        .call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT body FROM documents WHERE collection = ?1 ORDER BY seq LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![collection, limit], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_documents(db: &Database, collection: &str) -> Result<u64, CoreBrainError> {
    let collection = collection.to_string();
    let count: i64 = db
        .connection()
        .call(move |conn| -> rusqlite::Result<_> {
            conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Remove every document of a collection. Returns the number removed.
pub async fn drop_collection(db: &Database, collection: &str) -> Result<usize, CoreBrainError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<_> {
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1",
                params![collection],
            )
        })
        .await
        .map_err(map_tr_err)
}
