// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema versions for the conversation, ledger and document tables.
//!
//! The `V<n>__*.sql` files are embedded at build time by refinery; history
//! lives in `refinery_schema_history`.

use corebrain_core::CoreBrainError;
use tracing::{debug, info};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Bring `conn` up to the latest schema. Returns how many versions ran.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<usize, CoreBrainError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| CoreBrainError::Storage { source: Box::new(e) })?;

    let applied = report.applied_migrations();
    for migration in applied {
        info!(version = migration.version(), name = migration.name(), "applied schema migration");
    }
    if applied.is_empty() {
        debug!("schema already current");
    }
    Ok(applied.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn fresh_database_gets_every_table_once() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), 3);
        let names = tables(&conn);
        for table in ["conversations", "messages", "cost_ledger", "documents"] {
            assert!(names.iter().any(|n| n == table), "missing {table}");
        }
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);
    }
}
