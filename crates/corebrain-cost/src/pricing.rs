// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model rate tables and cost calculation.
//!
//! Rates are USD per million tokens. A model id is priced by the longest
//! configured key it contains (case-insensitive), so `claude-3-opus-20240229`
//! matches `opus`. Unmatched models use the fallback rate so cost tracking
//! never silently drops a record.

use std::collections::BTreeMap;

use corebrain_config::model::{ModelRate, PricingConfig};
use corebrain_core::TokenUsage;

#[derive(Debug, Clone)]
pub struct RateTable {
    rates: BTreeMap<String, ModelRate>,
    fallback: ModelRate,
}

impl RateTable {
    pub fn new(rates: BTreeMap<String, ModelRate>, fallback: ModelRate) -> Self {
        let rates = rates
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { rates, fallback }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self::new(config.rates.clone(), config.fallback)
    }

    pub fn rate_for(&self, model: &str) -> &ModelRate {
        let lower = model.to_lowercase();
        self.rates
            .iter()
            .filter(|(key, _)| lower.contains(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map_or(&self.fallback, |(_, rate)| rate)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

/// Cost in USD: `tokens / 1M * rate` for input and output.
pub fn calculate_cost(usage: &TokenUsage, rate: &ModelRate) -> f64 {
    let input = (f64::from(usage.input_tokens) / 1_000_000.0) * rate.input_per_mtok;
    let output = (f64::from(usage.output_tokens) / 1_000_000.0) * rate.output_per_mtok;
    input + output
}
