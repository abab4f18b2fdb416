//! Core data models for messages and triage decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known category names.
///
/// Category names map 1:1 to provider label names, so these are label
/// names too. Everything else in the taxonomy comes from the local
/// rule set.
pub mod category {
    /// Critical mail that stays front and center.
    pub const INBOX: &str = "INBOX";
    /// Important but not critical; labeled, kept in the inbox.
    pub const PRIORITY: &str = "PRIORITY";
    /// Low-confidence terminal category routed to human judgment.
    pub const REVIEW: &str = "REVIEW";
    /// Provider spam label.
    pub const SPAM: &str = "SPAM";
}

/// Provider message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Provider label identifier (distinct from the label's display name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelId(pub String);

impl LabelId {
    /// Creates a label id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// A provider label.
#[derive(Debug, Clone)]
pub struct Label {
    /// Provider-assigned identifier used in mutations.
    pub id: LabelId,
    /// Human-visible name; matches category names.
    pub name: String,
}

/// An email message as fetched for one classification pass.
///
/// Never persisted by the engine; only a truncated trace of the
/// decision survives in history.
#[derive(Debug, Clone)]
pub struct Message {
    /// Provider message id.
    pub id: MessageId,
    /// Subject header.
    pub subject: String,
    /// Raw From header (`Display Name <addr@domain>` or bare address).
    pub from: String,
    /// Date header as provided.
    pub date: String,
    /// Plain-text body.
    pub body: String,
    /// Label names currently on the message.
    pub labels: Vec<String>,
    /// Whether the message is unread.
    pub unread: bool,
}

impl Message {
    /// The bare sender address, lowercased.
    ///
    /// `"Acme Billing <billing@acme.com>"` yields `billing@acme.com`.
    #[must_use]
    pub fn sender_address(&self) -> String {
        let raw = self.from.trim();
        let addr = match (raw.rfind('<'), raw.rfind('>')) {
            (Some(start), Some(end)) if start < end => &raw[start + 1..end],
            _ => raw,
        };
        addr.trim().to_lowercase()
    }

    /// The sender's domain, lowercased, if the address has one.
    #[must_use]
    pub fn sender_domain(&self) -> Option<String> {
        let addr = self.sender_address();
        addr.rsplit_once('@').map(|(_, domain)| domain.to_string())
    }
}

/// Which stage of the pipeline produced a decision.
///
/// Precedence is fixed: filter > local rule > heuristic > model. A
/// higher tier's decision is never overridden within the same pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Provider-native filter, applied in phase 1.
    Filter,
    /// Local deterministic rule.
    LocalRule,
    /// Weighted keyword/sender heuristic.
    Heuristic,
    /// Language-model fallback.
    Model,
}

impl Tier {
    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "filter" => Some(Self::Filter),
            "local_rule" => Some(Self::LocalRule),
            "heuristic" => Some(Self::Heuristic),
            "model" => Some(Self::Model),
            _ => None,
        }
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::LocalRule => "local_rule",
            Self::Heuristic => "heuristic",
            Self::Model => "model",
        }
    }
}

/// What to do with a categorized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Apply the category label and archive out of the inbox.
    #[default]
    LabelAndArchive,
    /// Apply the category label, leave the message in the inbox.
    LabelOnly,
    /// Hand the message to the provider's spam handling.
    MarkSpam,
}

impl RuleAction {
    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "label_only" | "label" => Self::LabelOnly,
            "mark_spam" | "spam" => Self::MarkSpam,
            _ => Self::LabelAndArchive,
        }
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LabelAndArchive => "label_and_archive",
            Self::LabelOnly => "label_only",
            Self::MarkSpam => "mark_spam",
        }
    }
}

/// The outcome of classifying one message.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Category name; maps 1:1 to a provider label name.
    pub category: String,
    /// Mutation to execute.
    pub action: RuleAction,
    /// Short human-readable rationale.
    pub reason: String,
    /// Classifier certainty in `[0, 1]`.
    pub confidence: f32,
    /// Stage that produced this decision.
    pub tier: Tier,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    /// Creates a decision, clamping confidence into `[0, 1]`.
    pub fn new(
        category: impl Into<String>,
        action: RuleAction,
        reason: impl Into<String>,
        confidence: f32,
        tier: Tier,
    ) -> Self {
        Self {
            category: category.into(),
            action,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            tier,
            decided_at: Utc::now(),
        }
    }

    /// A zero-confidence REVIEW decision (the degradation path).
    pub fn review(reason: impl Into<String>, tier: Tier) -> Self {
        Self::new(category::REVIEW, RuleAction::LabelOnly, reason, 0.0, tier)
    }

    /// Whether the category keeps the message in the inbox untouched.
    #[must_use]
    pub fn is_keep(&self) -> bool {
        self.category == category::INBOX
    }
}
