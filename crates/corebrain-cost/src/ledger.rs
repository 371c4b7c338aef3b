// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost ledger for persisting priced requests to SQLite.
//!
//! One row per pipeline request, written to the `cost_ledger` table created
//! by the storage migrations. Supports per-day and per-conversation totals.

use corebrain_core::{CoreBrainError, TokenUsage, now_timestamp};
use corebrain_storage::{Database, map_tr_err};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accountant::CostTotals;

/// A single priced request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Unique record identifier (UUID v4).
    pub id: String,
    /// Conversation that triggered the request; direct queries have none.
    pub conversation_id: Option<String>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    /// True when the answer came from the response cache.
    pub cache_hit: bool,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl CostRecord {
    pub fn new(
        conversation_id: Option<String>,
        model: String,
        usage: &TokenUsage,
        cost_usd: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            model,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd,
            cache_hit: false,
            created_at: now_timestamp(),
        }
    }

    /// `YYYY-MM-DD` of `created_at`.
    pub fn day(&self) -> &str {
        self.created_at.get(..10).unwrap_or(&self.created_at)
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

/// Persistent cost ledger backed by SQLite.
pub struct CostLedger {
    db: Database,
}

const TOTALS_SQL: &str = "SELECT COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0), \
     COALESCE(SUM(cost_usd), 0.0), COUNT(*) FROM cost_ledger";

fn totals_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CostTotals> {
    let input: i64 = row.get(0)?;
    let output: i64 = row.get(1)?;
    let cost: f64 = row.get(2)?;
    let calls: i64 = row.get(3)?;
    Ok(CostTotals::from_parts(
        u64::try_from(input).unwrap_or(0),
        u64::try_from(output).unwrap_or(0),
        cost,
        u64::try_from(calls).unwrap_or(0),
    ))
}

impl CostLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn open(path: &str) -> Result<Self, CoreBrainError> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn record(&self, record: &CostRecord) -> Result<(), CoreBrainError> {
        let r = record.clone();
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO cost_ledger (id, conversation_id, model, input_tokens, \
                     output_tokens, cost_usd, cache_hit, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        r.id,
                        r.conversation_id,
                        r.model,
                        r.input_tokens,
                        r.output_tokens,
                        r.cost_usd,
                        r.cache_hit,
                        r.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        info!(
            conversation_id = record.conversation_id.as_deref().unwrap_or("-"),
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost_usd = record.cost_usd,
            cache_hit = record.cache_hit,
            "cost recorded"
        );
        Ok(())
    }

    /// Totals for one UTC date (`YYYY-MM-DD`).
    pub async fn daily_totals(&self, date: &str) -> Result<CostTotals, CoreBrainError> {
        let pattern = format!("{date}%");
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<_> {
                conn.query_row(
                    &format!("{TOTALS_SQL} WHERE created_at LIKE ?1"),
                    rusqlite::params![pattern],
                    totals_from_row,
                )
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn conversation_totals(
        &self,
        conversation_id: &str,
    ) -> Result<CostTotals, CoreBrainError> {
        let conversation_id = conversation_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> rusqlite::Result<_> {
                conn.query_row(
                    &format!("{TOTALS_SQL} WHERE conversation_id = ?1"),
                    rusqlite::params![conversation_id],
                    totals_from_row,
                )
            })
            .await
            .map_err(map_tr_err)
    }
}
