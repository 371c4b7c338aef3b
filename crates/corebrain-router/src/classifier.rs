// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification: does a message need data access?
//!
//! [`KeywordIntentClassifier`] uses zero-cost heuristic signals against the
//! catalog vocabulary. Other policies (for example a cheap model call) plug
//! in behind [`IntentClassifier`].

use async_trait::async_trait;
use tracing::debug;

use crate::vocabulary::{Vocabulary, words};

/// Outcome of intent classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The message plausibly needs a query against the store.
    DataAccess,
    /// Greeting, thanks, or a question answerable from the conversation.
    Conversational,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::DataAccess => write!(f, "data_access"),
            Intent::Conversational => write!(f, "conversational"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentDecision {
    pub intent: Intent,
    /// Confidence in the decision (0.0-1.0).
    pub confidence: f32,
    pub reason: &'static str,
}

/// Pluggable intent policy.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// `recent` holds the trailing conversation texts, oldest first.
    async fn classify(
        &self,
        message: &str,
        recent: &[&str],
        vocabulary: &Vocabulary,
    ) -> IntentDecision;
}

/// Messages that never need data (exact match, case-insensitive).
const CONVERSATIONAL_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay", "yes", "no",
    "sure", "great", "cool", "nice", "good morning", "good night", "got it",
];

/// Phrases typical of data questions (contains, case-insensitive).
const DATA_PHRASES: &[&str] = &[
    "how many", "how much", "list", "show", "top ", "count", "average", "total",
    "find", "which", "most", "least", "best", "worst", "highest", "lowest", "sum of",
    "per ", "group", "sorted", "greater than", "less than", "between", "latest",
];

/// Follow-ups that inherit the data intent of earlier turns.
const FOLLOW_UP_PHRASES: &[&str] = &[
    "what about", "and the", "those", "them", "same for", "only the", "instead",
];

/// Heuristic classifier over the collection/field vocabulary.
pub struct KeywordIntentClassifier {
    /// Below this confidence a conversational decision defaults to data access.
    confidence_threshold: f32,
}

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self {
            confidence_threshold: 0.4,
        }
    }

    pub fn with_threshold(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn decide(&self, message: &str, recent: &[&str], vocabulary: &Vocabulary) -> IntentDecision {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return IntentDecision {
                intent: Intent::Conversational,
                confidence: 1.0,
                reason: "empty message",
            };
        }
        let lower = trimmed.to_lowercase();
        let normalized = lower.trim_end_matches(['!', '.', '?']).trim();
        if CONVERSATIONAL_EXACT.contains(&normalized) {
            return IntentDecision {
                intent: Intent::Conversational,
                confidence: 1.0,
                reason: "conversational phrase",
            };
        }

        let mut score: i32 = 0;

        // Signal 1: vocabulary hits
        score += match vocabulary.hits(&lower) {
            0 => 0,
            1 => 2,
            _ => 3,
        };

        // Signal 2: data phrasing
        if DATA_PHRASES.iter().any(|p| lower.contains(p)) {
            score += 2;
        }

        // Signal 3: numbers ("top 5", "over 100")
        if words(&lower).any(|w| w.chars().all(|c| c.is_ascii_digit())) {
            score += 1;
        }

        // Signal 4: follow-up to a data turn
        if FOLLOW_UP_PHRASES.iter().any(|p| lower.contains(p))
            && Self::recent_hits(recent, vocabulary)
        {
            score += 2;
        }

        // Signal 5: very short messages lean conversational
        if trimmed.split_whitespace().count() <= 2 {
            score -= 1;
        }

        let (intent, confidence, reason) = Self::score_to_intent(score);
        let decision = if intent == Intent::Conversational && confidence < self.confidence_threshold
        {
            IntentDecision {
                intent: Intent::DataAccess,
                confidence,
                reason: "low confidence, defaulting to data access",
            }
        } else {
            IntentDecision {
                intent,
                confidence,
                reason,
            }
        };
        debug!(
            score,
            intent = %decision.intent,
            confidence = decision.confidence,
            reason = decision.reason,
            "intent classified"
        );
        decision
    }

    fn recent_hits(recent: &[&str], vocabulary: &Vocabulary) -> bool {
        let tail = &recent[recent.len().saturating_sub(3)..];
        tail.iter().any(|m| vocabulary.hits(m) > 0)
    }

    fn score_to_intent(score: i32) -> (Intent, f32, &'static str) {
        if score >= 2 {
            let confidence = (score as f32 / 5.0).min(1.0);
            (Intent::DataAccess, confidence, "data access indicators")
        } else {
            let confidence = ((2 - score) as f32 / 4.0).min(1.0);
            (Intent::Conversational, confidence, "no data access indicators")
        }
    }
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(
        &self,
        message: &str,
        recent: &[&str],
        vocabulary: &Vocabulary,
    ) -> IntentDecision {
        self.decide(message, recent, vocabulary)
    }
}
