//! Category rule data model and rule-file normalization.

use serde::{Deserialize, Serialize};

use crate::message::RuleAction;

/// One user-authored categorization rule.
///
/// The category name doubles as the provider label name applied by the
/// rule's action. A message matches when any sender, domain, or
/// keyword condition hits, unless an exclude-keyword voids the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category (and label) name, e.g. `BILLS`.
    pub category: String,
    /// Sender addresses or address fragments, matched as substrings.
    #[serde(default)]
    pub senders: Vec<String>,
    /// Sender domains, matched exactly or as a dot-suffix.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Case-insensitive substrings matched against the subject.
    #[serde(default)]
    pub subject_keywords: Vec<String>,
    /// Case-insensitive substrings matched against the body.
    #[serde(default)]
    pub body_keywords: Vec<String>,
    /// Keywords that void this rule when present in subject or body.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// What to do with matching messages.
    #[serde(default)]
    pub action: RuleAction,
    /// Optional free-text description, surfaced to the model prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryRule {
    /// Creates an empty rule for a category.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            senders: Vec::new(),
            domains: Vec::new(),
            subject_keywords: Vec::new(),
            body_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            action: RuleAction::default(),
            description: None,
        }
    }

    /// Whether this rule already covers a sender address.
    #[must_use]
    pub fn covers_sender(&self, sender: &str) -> bool {
        let sender = sender.to_lowercase();
        if self
            .senders
            .iter()
            .any(|s| sender.contains(&s.to_lowercase()))
        {
            return true;
        }
        sender.rsplit_once('@').is_some_and(|(_, domain)| {
            self.domains.iter().any(|d| {
                let d = d.to_lowercase();
                domain == d || domain.ends_with(&format!(".{d}"))
            })
        })
    }

    /// A one-line description of what the category holds, derived from
    /// the rule when no explicit description was written.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        let mut parts = Vec::new();
        if !self.senders.is_empty() || !self.domains.is_empty() {
            let mut from: Vec<&str> = self
                .senders
                .iter()
                .chain(self.domains.iter())
                .take(4)
                .map(String::as_str)
                .collect();
            if self.senders.len() + self.domains.len() > 4 {
                from.push("...");
            }
            parts.push(format!("mail from {}", from.join(", ")));
        }
        if !self.subject_keywords.is_empty() || !self.body_keywords.is_empty() {
            let mut topics: Vec<&str> = self
                .subject_keywords
                .iter()
                .chain(self.body_keywords.iter())
                .take(4)
                .map(String::as_str)
                .collect();
            if self.subject_keywords.len() + self.body_keywords.len() > 4 {
                topics.push("...");
            }
            parts.push(format!("about {}", topics.join(", ")));
        }
        if parts.is_empty() {
            format!("messages categorized as {}", self.category)
        } else {
            parts.join("; ")
        }
    }
}

/// A rule file: either the canonical ordered array of rules, or the
/// legacy map of category name to conditions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawRuleFile {
    /// Canonical shape: ordered list of full rules.
    Rules(Vec<CategoryRule>),
    /// Legacy shape: `{ "JUNK": [...senders] }` or `{ "JUNK": {...} }`.
    CategoryMap(std::collections::BTreeMap<String, RawRuleBody>),
}

/// Conditions under a category key in the legacy map shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawRuleBody {
    /// Bare sender list.
    Senders(Vec<String>),
    /// Full condition object (category supplied by the map key).
    Full(Box<RawRuleDetails>),
}

/// Full condition object for the legacy map shape.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawRuleDetails {
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub subject_keywords: Vec<String>,
    #[serde(default)]
    pub body_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawRuleFile {
    /// Normalizes either file shape into canonical rules.
    pub(crate) fn into_rules(self) -> Vec<CategoryRule> {
        match self {
            Self::Rules(rules) => rules,
            Self::CategoryMap(map) => map
                .into_iter()
                .map(|(category, body)| match body {
                    RawRuleBody::Senders(senders) => CategoryRule {
                        senders,
                        ..CategoryRule::new(category)
                    },
                    RawRuleBody::Full(details) => CategoryRule {
                        category,
                        senders: details.senders,
                        domains: details.domains,
                        subject_keywords: details.subject_keywords,
                        body_keywords: details.body_keywords,
                        exclude_keywords: details.exclude_keywords,
                        action: details.action,
                        description: details.description,
                    },
                })
                .collect(),
        }
    }
}
