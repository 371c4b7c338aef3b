// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes a [`crate::Database`] and runs
//! on its background thread.

pub mod conversations;
pub mod documents;
pub mod messages;
