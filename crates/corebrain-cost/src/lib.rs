// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost tracking and pricing for CoreBrain.
//!
//! - **Pricing**: rate-table lookup and per-call cost calculation
//! - **Accountant**: pure record construction plus monotonic per-conversation
//!   and per-day totals
//! - **Ledger**: durable SQLite record of every priced request

pub mod accountant;
pub mod ledger;
pub mod pricing;

pub use accountant::{CostAccountant, CostTotals, record};
pub use ledger::{CostLedger, CostRecord};
pub use pricing::{RateTable, calculate_cost};
