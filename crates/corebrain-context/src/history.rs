// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history trimming.
//!
//! History arrives as the trailing window of stored messages, oldest first.
//! A [`HistoryTrimmer`] picks the part of it that fits the token budget and
//! converts it to provider turns.

use corebrain_core::{Message, MessageRole, ProviderMessage};
use tracing::debug;

use crate::estimate::TokenEstimator;

/// Policy deciding which history messages a prompt carries.
pub trait HistoryTrimmer: Send + Sync {
    /// `history` is oldest first; the returned turns are too.
    fn trim(
        &self,
        history: &[Message],
        token_budget: usize,
        estimator: &dyn TokenEstimator,
    ) -> Vec<ProviderMessage>;
}

/// Keeps the newest messages whose combined estimate fits the budget.
///
/// System messages are skipped, consecutive turns by the same role are
/// merged, and the result never starts with an assistant turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewestFirstTrimmer;

impl HistoryTrimmer for NewestFirstTrimmer {
    fn trim(
        &self,
        history: &[Message],
        token_budget: usize,
        estimator: &dyn TokenEstimator,
    ) -> Vec<ProviderMessage> {
        let mut used = 0usize;
        let mut kept: Vec<&Message> = Vec::new();
        for message in history.iter().rev() {
            if message.role == MessageRole::System {
                continue;
            }
            let cost = estimator.estimate(&message.content);
            if used + cost > token_budget {
                break;
            }
            used += cost;
            kept.push(message);
        }
        kept.reverse();

        let mut turns: Vec<ProviderMessage> = Vec::with_capacity(kept.len());
        for message in kept {
            let role = message.role.to_string();
            match turns.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&message.content);
                }
                _ => turns.push(ProviderMessage {
                    role,
                    content: message.content.clone(),
                }),
            }
        }
        while turns.first().is_some_and(|t| t.role != "user") {
            turns.remove(0);
        }

        debug!(
            available = history.len(),
            kept = turns.len(),
            estimated_tokens = used,
            "history trimmed"
        );
        turns
    }
}

/// Appends the current user message, merging it into a trailing user turn.
pub fn push_user_turn(turns: &mut Vec<ProviderMessage>, content: String) {
    match turns.last_mut() {
        Some(last) if last.role == "user" => {
            last.content.push_str("\n\n");
            last.content.push_str(&content);
        }
        _ => turns.push(ProviderMessage::user(content)),
    }
}
