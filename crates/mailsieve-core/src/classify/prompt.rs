//! Classification prompt assembly.
//!
//! The category taxonomy is data: it is rebuilt from the live rule set
//! on every run, so locally created categories show up in the prompt
//! without code changes.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::message::{Message, RuleAction, category};
use crate::rules::CategoryRule;

/// One taxonomy entry surfaced to the model.
#[derive(Debug, Clone)]
pub(crate) struct TaxonomyEntry {
    pub description: String,
    pub action: RuleAction,
}

/// Builds classification prompts from the live taxonomy.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    taxonomy: Vec<(String, TaxonomyEntry)>,
    hints: Vec<String>,
    body_excerpt_chars: usize,
}

impl PromptBuilder {
    /// Creates a builder from the rule set and learned-pattern hints.
    #[must_use]
    pub fn new(rules: &[CategoryRule], hints: Vec<String>, config: &EngineConfig) -> Self {
        let mut taxonomy: Vec<(String, TaxonomyEntry)> = vec![
            (
                category::INBOX.to_string(),
                TaxonomyEntry {
                    description: "critical mail that needs immediate attention".to_string(),
                    action: RuleAction::LabelOnly,
                },
            ),
            (
                category::PRIORITY.to_string(),
                TaxonomyEntry {
                    description: "important mail to handle soon".to_string(),
                    action: RuleAction::LabelOnly,
                },
            ),
        ];
        for rule in rules {
            if taxonomy.iter().any(|(name, _)| *name == rule.category) {
                continue;
            }
            taxonomy.push((
                rule.category.clone(),
                TaxonomyEntry {
                    description: rule.describe(),
                    action: rule.action,
                },
            ));
        }
        taxonomy.push((
            category::REVIEW.to_string(),
            TaxonomyEntry {
                description: "anything that fits no other category or you are unsure about"
                    .to_string(),
                action: RuleAction::LabelOnly,
            },
        ));

        Self {
            taxonomy,
            hints,
            body_excerpt_chars: config.body_excerpt_chars,
        }
    }

    /// Category names and their actions, for decision validation.
    #[must_use]
    pub fn categories(&self) -> BTreeMap<String, RuleAction> {
        self.taxonomy
            .iter()
            .map(|(name, entry)| (name.clone(), entry.action))
            .collect()
    }

    /// Assembles the instruction prompt for one message.
    #[must_use]
    pub fn build(&self, message: &Message) -> String {
        let mut prompt = String::from(
            "You are an email triage assistant. \
             Assign the message below to exactly one category.\n\nCategories:\n",
        );
        for (name, entry) in &self.taxonomy {
            prompt.push_str(&format!("- {name}: {}\n", entry.description));
        }
        if !self.hints.is_empty() {
            prompt.push_str("\nLearned patterns from past decisions:\n");
            for hint in &self.hints {
                prompt.push_str(&format!("- {hint}\n"));
            }
        }
        prompt.push_str(&format!(
            "\nMessage:\nFrom: {}\nSubject: {}\nBody: {}\n",
            sanitize(&message.from, 200),
            sanitize(&message.subject, 300),
            sanitize(&message.body, self.body_excerpt_chars),
        ));
        prompt.push_str(
            "\nAnswer with JSON only, no prose:\n\
             {\"action\": \"<CATEGORY>\", \"reason\": \"<short reason>\", \"confidence\": <0.0-1.0>}\n",
        );
        prompt
    }
}

/// Strips control characters and bounds the excerpt length.
fn sanitize(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c == '\n' || c == '\t' {
                ' '
            } else if c.is_control() {
                '\u{fffd}'
            } else {
                c
            }
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;

    fn message(subject: &str, body: &str) -> Message {
        Message {
            id: MessageId::new("m1"),
            subject: subject.to_string(),
            from: "sender@example.com".to_string(),
            date: String::new(),
            body: body.to_string(),
            labels: vec![],
            unread: true,
        }
    }

    fn bills_rule() -> CategoryRule {
        CategoryRule {
            senders: vec!["billing@acme.com".to_string()],
            ..CategoryRule::new("BILLS")
        }
    }

    #[test]
    fn test_new_categories_appear_automatically() {
        let config = EngineConfig::default();
        let builder = PromptBuilder::new(&[bills_rule()], vec![], &config);
        let prompt = builder.build(&message("hi", "hello"));
        assert!(prompt.contains("- BILLS: mail from billing@acme.com"));
        assert!(prompt.contains("- INBOX:"));
        assert!(prompt.contains("- REVIEW:"));
    }

    #[test]
    fn test_hints_included() {
        let config = EngineConfig::default();
        let builder = PromptBuilder::new(
            &[],
            vec!["Mail from digest@news.dev is usually NEWSLETTERS".to_string()],
            &config,
        );
        let prompt = builder.build(&message("x", "y"));
        assert!(prompt.contains("Learned patterns"));
        assert!(prompt.contains("digest@news.dev"));
    }

    #[test]
    fn test_body_excerpt_bounded() {
        let mut config = EngineConfig::default();
        config.body_excerpt_chars = 20;
        let builder = PromptBuilder::new(&[], vec![], &config);
        let prompt = builder.build(&message("s", &"lorem ".repeat(100)));
        assert!(!prompt.contains(&"lorem ".repeat(10)));
        assert!(prompt.contains("..."));
    }

    #[test]
    fn test_control_characters_stripped() {
        let config = EngineConfig::default();
        let builder = PromptBuilder::new(&[], vec![], &config);
        let prompt = builder.build(&message("a\x1b[31mb", "line1\nline2\x07"));
        assert!(!prompt.contains('\x1b'));
        assert!(!prompt.contains('\x07'));
        assert!(prompt.contains("line1 line2"));
    }

    #[test]
    fn test_categories_map_carries_actions() {
        let config = EngineConfig::default();
        let builder = PromptBuilder::new(&[bills_rule()], vec![], &config);
        let categories = builder.categories();
        assert_eq!(
            categories.get("BILLS"),
            Some(&RuleAction::LabelAndArchive)
        );
        assert_eq!(categories.get("REVIEW"), Some(&RuleAction::LabelOnly));
    }
}
