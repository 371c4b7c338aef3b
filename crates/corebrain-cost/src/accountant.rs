// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost accountant with monotonic running totals.
//!
//! [`record`] is a pure function of token counts and the rate table. The
//! accountant folds records into per-conversation and per-day totals; totals
//! only ever grow. Amounts are summed as integer nano-dollars, so the order
//! in which records arrive never changes a total.

use std::sync::Arc;

use corebrain_core::{CoreBrainError, TokenUsage};
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::ledger::{CostLedger, CostRecord};
use crate::pricing::{RateTable, calculate_cost};

const NANOS_PER_USD: f64 = 1_000_000_000.0;

fn to_nanos(usd: f64) -> u64 {
    if usd.is_finite() && usd > 0.0 {
        (usd * NANOS_PER_USD).round() as u64
    } else {
        0
    }
}

/// Accumulated usage for a conversation or a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    cost_nanos: u64,
    pub calls: u64,
}

impl CostTotals {
    pub fn from_parts(input_tokens: u64, output_tokens: u64, cost_usd: f64, calls: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cost_nanos: to_nanos(cost_usd),
            calls,
        }
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_nanos as f64 / NANOS_PER_USD
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add(&mut self, record: &CostRecord) {
        self.input_tokens = self
            .input_tokens
            .saturating_add(u64::from(record.input_tokens));
        self.output_tokens = self
            .output_tokens
            .saturating_add(u64::from(record.output_tokens));
        self.cost_nanos = self.cost_nanos.saturating_add(to_nanos(record.cost_usd));
        self.calls = self.calls.saturating_add(1);
    }
}

impl Serialize for CostTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("CostTotals", 5)?;
        s.serialize_field("input_tokens", &self.input_tokens)?;
        s.serialize_field("output_tokens", &self.output_tokens)?;
        s.serialize_field("total_tokens", &self.total_tokens())?;
        s.serialize_field("cost_usd", &self.cost_usd())?;
        s.serialize_field("api_calls", &self.calls)?;
        s.end()
    }
}

/// Price one request.
pub fn record(
    conversation_id: Option<&str>,
    model: &str,
    usage: &TokenUsage,
    rates: &RateTable,
) -> CostRecord {
    let cost = calculate_cost(usage, rates.rate_for(model));
    CostRecord::new(conversation_id.map(str::to_string), model.to_string(), usage, cost)
}

pub struct CostAccountant {
    rates: RateTable,
    conversations: DashMap<String, CostTotals>,
    days: DashMap<String, CostTotals>,
    ledger: Option<Arc<CostLedger>>,
}

impl CostAccountant {
    pub fn new(rates: RateTable) -> Self {
        Self {
            rates,
            conversations: DashMap::new(),
            days: DashMap::new(),
            ledger: None,
        }
    }

    /// Persist every accumulated record to `ledger` as well.
    pub fn with_ledger(mut self, ledger: Arc<CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn price(&self, conversation_id: Option<&str>, model: &str, usage: &TokenUsage) -> CostRecord {
        record(conversation_id, model, usage, &self.rates)
    }

    /// Fold `record` into the in-memory totals.
    pub fn accumulate(&self, record: &CostRecord) {
        if let Some(id) = &record.conversation_id {
            self.conversations
                .entry(id.clone())
                .or_default()
                .add(record);
        }
        self.days
            .entry(record.day().to_string())
            .or_default()
            .add(record);
        debug!(
            conversation_id = record.conversation_id.as_deref().unwrap_or("-"),
            cost_usd = record.cost_usd,
            "cost accumulated"
        );
    }

    /// Accumulate, then append to the ledger when one is attached. Totals
    /// are updated even if the ledger write fails.
    pub async fn commit(&self, record: &CostRecord) -> Result<(), CoreBrainError> {
        self.accumulate(record);
        match &self.ledger {
            Some(ledger) => ledger.record(record).await,
            None => Ok(()),
        }
    }

    /// Totals for a conversation: from the ledger when attached, otherwise
    /// from this process's running totals.
    pub async fn conversation_totals(&self, conversation_id: &str) -> Result<CostTotals, CoreBrainError> {
        match &self.ledger {
            Some(ledger) => ledger.conversation_totals(conversation_id).await,
            None => Ok(self
                .conversations
                .get(conversation_id)
                .map(|t| *t)
                .unwrap_or_default()),
        }
    }

    pub async fn daily_totals(&self, date: &str) -> Result<CostTotals, CoreBrainError> {
        match &self.ledger {
            Some(ledger) => ledger.daily_totals(date).await,
            None => Ok(self.days.get(date).map(|t| *t).unwrap_or_default()),
        }
    }

    /// Today's UTC date as used for daily totals.
    pub fn today() -> String {
        chrono::Utc::now().format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usage(input: u32, output: u32) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn record_is_pure_pricing() {
        let rates = RateTable::default();
        let r = record(Some("c1"), "claude-3-opus-20240229", &usage(1_000_000, 0), &rates);
        assert!((r.cost_usd - 15.0).abs() < 1e-9);
        assert_eq!(r.conversation_id.as_deref(), Some("c1"));
        assert_eq!(r.input_tokens, 1_000_000);
    }

    #[tokio::test]
    async fn totals_grow_per_conversation_and_day() {
        let accountant = CostAccountant::new(RateTable::default());
        let a = accountant.price(Some("c1"), "claude-3-haiku", &usage(4000, 400));
        let b = accountant.price(Some("c2"), "claude-3-haiku", &usage(10, 10));
        accountant.commit(&a).await.unwrap();
        accountant.commit(&b).await.unwrap();

        let c1 = accountant.conversation_totals("c1").await.unwrap();
        assert_eq!(c1.calls, 1);
        assert_eq!(c1.total_tokens(), 4400);

        let day = accountant.daily_totals(a.day()).await.unwrap();
        assert_eq!(day.calls, 2);
        assert!(day.cost_usd() >= c1.cost_usd());
        assert_eq!(
            accountant.conversation_totals("none").await.unwrap(),
            CostTotals::default()
        );
    }

    #[test]
    fn totals_serialize_with_derived_fields() {
        let mut totals = CostTotals::default();
        totals.add(&record(None, "opus", &usage(100, 50), &RateTable::default()));
        let json = serde_json::to_value(totals).unwrap();
        assert_eq!(json["api_calls"], 1);
        assert_eq!(json["total_tokens"], 150);
        assert!(json["cost_usd"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn ledger_backed_totals_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost.db");
        let path = path.to_str().unwrap();
        {
            let ledger = Arc::new(CostLedger::open(path).await.unwrap());
            let accountant = CostAccountant::new(RateTable::default()).with_ledger(ledger);
            let r = accountant.price(Some("c1"), "claude-3-sonnet", &usage(1000, 1000));
            accountant.commit(&r).await.unwrap();
        }
        let ledger = Arc::new(CostLedger::open(path).await.unwrap());
        let accountant = CostAccountant::new(RateTable::default()).with_ledger(ledger);
        let totals = accountant.conversation_totals("c1").await.unwrap();
        assert_eq!(totals.calls, 1);
        assert!((totals.cost_usd() - 0.018).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn accumulation_order_does_not_matter(
            a in (0u32..2_000_000, 0u32..2_000_000),
            b in (0u32..2_000_000, 0u32..2_000_000),
        ) {
            let rates = RateTable::default();
            let r1 = record(Some("c"), "claude-3-opus", &usage(a.0, a.1), &rates);
            let r2 = record(Some("c"), "claude-3-opus", &usage(b.0, b.1), &rates);

            let forward = CostAccountant::new(rates.clone());
            forward.accumulate(&r1);
            forward.accumulate(&r2);
            let backward = CostAccountant::new(rates);
            backward.accumulate(&r2);
            backward.accumulate(&r1);

            let f = *forward.conversations.get("c").unwrap();
            let b = *backward.conversations.get("c").unwrap();
            prop_assert_eq!(f, b);
            prop_assert!(f.cost_usd() >= r1.cost_usd.max(r2.cost_usd) - 1e-9);
        }
    }
}
