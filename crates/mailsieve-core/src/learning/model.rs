//! Learning data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Decision, Message, Tier};

/// One decision in the history, reduced to what mining needs.
///
/// Subjects are truncated on record so the history never stores whole
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Truncated subject.
    pub subject: String,
    /// Sender address, lowercased.
    pub sender: String,
    /// Category the engine applied.
    pub category: String,
    /// Tier that produced the decision.
    pub tier: Tier,
    /// Decision confidence.
    pub confidence: f32,
    /// Category the user corrected to, if they disagreed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_override: Option<String>,
    /// When the decision was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Builds a record from a message and its decision.
    #[must_use]
    pub fn from_decision(
        message: &Message,
        decision: &Decision,
        user_override: Option<String>,
        subject_max_chars: usize,
    ) -> Self {
        Self {
            subject: message.subject.chars().take(subject_max_chars).collect(),
            sender: message.sender_address(),
            category: decision.category.clone(),
            tier: decision.tier,
            confidence: decision.confidence,
            user_override,
            recorded_at: Utc::now(),
        }
    }

    /// The category that ultimately stood: the override if present.
    #[must_use]
    pub fn effective_category(&self) -> &str {
        self.user_override.as_deref().unwrap_or(&self.category)
    }

    /// Whether the user corrected this decision.
    #[must_use]
    pub fn corrected(&self) -> bool {
        self.user_override
            .as_deref()
            .is_some_and(|o| o != self.category)
    }

    /// The sender's domain, if the address has one.
    #[must_use]
    pub fn sender_domain(&self) -> Option<&str> {
        self.sender.rsplit_once('@').map(|(_, domain)| domain)
    }
}

/// What kind of rule change a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Add a sender to an existing category rule.
    SenderRule,
    /// Add a subject keyword to an existing category rule.
    KeywordRule,
    /// Create a category that does not exist yet.
    NewCategory,
}

/// An advisory rule change mined from the history.
///
/// Suggestions are never self-applied; `apply_suggestion` runs only on
/// explicit human approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Kind of change proposed.
    pub kind: SuggestionKind,
    /// Target (or proposed) category.
    pub category: String,
    /// The sender, keyword, or domain the suggestion is about.
    pub value: String,
    /// Number of history records supporting the suggestion.
    pub evidence: u32,
    /// Fraction of the supporting group that agrees.
    pub confidence: f32,
    /// Human-readable rationale.
    pub detail: String,
}
