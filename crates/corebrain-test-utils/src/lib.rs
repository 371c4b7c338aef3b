// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for CoreBrain integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Model provider replaying a scripted queue of replies
//! - [`CountingStore`] - Document store wrapper counting query executions
//! - [`fixtures`] - Seeded product catalogue
//! - [`TestHarness`] - The whole pipeline wired in a temp directory

pub mod fixtures;
pub mod harness;
pub mod mock_provider;

pub use fixtures::CountingStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::MockProvider;
