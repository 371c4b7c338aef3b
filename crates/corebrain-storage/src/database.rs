// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup and migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do not open additional connections for writes.

use std::path::Path;

use corebrain_core::CoreBrainError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into `CoreBrainError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CoreBrainError {
    CoreBrainError::Storage {
        source: Box::new(e),
    }
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> CoreBrainError {
    CoreBrainError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the CoreBrain SQLite file.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub async fn open(path: &str) -> Result<Self, CoreBrainError> {
        Self::open_with(path, true).await
    }

    /// Like [`Self::open`], with explicit control over WAL journaling.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, CoreBrainError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CoreBrainError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            run_migrations(&mut conn).map(|_| ())
        })
        .await
        .map_err(|e| CoreBrainError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(storage_err)?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), CoreBrainError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "WAL checkpoint complete");
        Ok(())
    }
}
