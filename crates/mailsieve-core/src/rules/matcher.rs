//! Declaration-order rule evaluation.

use crate::message::{Decision, Message, Tier};

use super::model::CategoryRule;

/// Evaluates messages against the local rule set.
///
/// Rules are checked in declaration order; the first full match wins
/// with confidence 1.0. A rule whose exclude-keywords hit is voided
/// for that message and evaluation continues with the next rule.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<CategoryRule>,
}

impl RuleMatcher {
    /// Creates a matcher over a rule snapshot.
    #[must_use]
    pub const fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// The rule snapshot this matcher evaluates.
    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Returns the first matching rule's decision, or `None`.
    #[must_use]
    pub fn evaluate(&self, message: &Message) -> Option<Decision> {
        let sender = message.sender_address();
        let domain = message.sender_domain();
        let subject = message.subject.to_lowercase();
        let body = message.body.to_lowercase();

        for rule in &self.rules {
            let Some(reason) = match_rule(rule, &sender, domain.as_deref(), &subject, &body) else {
                continue;
            };
            if let Some(excluded) = excluded_by(rule, &subject, &body) {
                tracing::debug!(
                    category = %rule.category,
                    keyword = excluded,
                    "rule voided by exclude keyword"
                );
                continue;
            }
            return Some(Decision::new(
                rule.category.clone(),
                rule.action,
                reason,
                1.0,
                Tier::LocalRule,
            ));
        }
        None
    }
}

/// Returns a match reason if any positive condition of `rule` hits.
fn match_rule(
    rule: &CategoryRule,
    sender: &str,
    domain: Option<&str>,
    subject: &str,
    body: &str,
) -> Option<String> {
    if let Some(hit) = rule
        .senders
        .iter()
        .find(|s| sender.contains(&s.to_lowercase()))
    {
        return Some(format!("sender matches '{hit}'"));
    }
    if let Some(domain) = domain
        && let Some(hit) = rule.domains.iter().find(|d| {
            let d = d.to_lowercase();
            domain == d || domain.ends_with(&format!(".{d}"))
        })
    {
        return Some(format!("sender domain matches '{hit}'"));
    }
    if let Some(hit) = rule
        .subject_keywords
        .iter()
        .find(|k| subject.contains(&k.to_lowercase()))
    {
        return Some(format!("subject contains '{hit}'"));
    }
    if let Some(hit) = rule
        .body_keywords
        .iter()
        .find(|k| body.contains(&k.to_lowercase()))
    {
        return Some(format!("body contains '{hit}'"));
    }
    None
}

/// Returns the exclude keyword that voids `rule`, if any.
fn excluded_by<'a>(rule: &'a CategoryRule, subject: &str, body: &str) -> Option<&'a str> {
    rule.exclude_keywords
        .iter()
        .find(|k| {
            let k = k.to_lowercase();
            subject.contains(&k) || body.contains(&k)
        })
        .map(String::as_str)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{MessageId, RuleAction};

    fn message(from: &str, subject: &str, body: &str) -> Message {
        Message {
            id: MessageId::new("m1"),
            subject: subject.to_string(),
            from: from.to_string(),
            date: String::new(),
            body: body.to_string(),
            labels: vec!["INBOX".to_string()],
            unread: true,
        }
    }

    fn bills_rule() -> CategoryRule {
        CategoryRule {
            senders: vec!["billing@acme.com".to_string()],
            subject_keywords: vec!["invoice".to_string()],
            exclude_keywords: vec!["webinar".to_string()],
            ..CategoryRule::new("BILLS")
        }
    }

    #[test]
    fn test_sender_match_wins_with_full_confidence() {
        let matcher = RuleMatcher::new(vec![bills_rule()]);
        let decision = matcher
            .evaluate(&message("Acme <billing@acme.com>", "Receipt", ""))
            .unwrap();
        assert_eq!(decision.category, "BILLS");
        assert!((decision.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(decision.tier, Tier::LocalRule);
    }

    #[test]
    fn test_subject_keyword_case_insensitive() {
        let matcher = RuleMatcher::new(vec![bills_rule()]);
        let decision = matcher.evaluate(&message("x@y.com", "Your INVOICE is ready", ""));
        assert!(decision.is_some());
    }

    #[test]
    fn test_domain_suffix_match() {
        let rule = CategoryRule {
            domains: vec!["acme.com".to_string()],
            ..CategoryRule::new("BILLS")
        };
        let matcher = RuleMatcher::new(vec![rule]);
        assert!(matcher.evaluate(&message("a@mail.acme.com", "", "")).is_some());
        assert!(matcher.evaluate(&message("a@notacme.com", "", "")).is_none());
    }

    #[test]
    fn test_exclusion_voids_rule_and_continues() {
        let fallback = CategoryRule {
            subject_keywords: vec!["invoice".to_string()],
            ..CategoryRule::new("EVENTS")
        };
        let matcher = RuleMatcher::new(vec![bills_rule(), fallback]);
        // Exclude keyword voids BILLS; evaluation continues to EVENTS.
        let decision = matcher
            .evaluate(&message("x@y.com", "Invoice for webinar seats", ""))
            .unwrap();
        assert_eq!(decision.category, "EVENTS");
    }

    #[test]
    fn test_declaration_order_decides_ties() {
        let first = CategoryRule {
            subject_keywords: vec!["report".to_string()],
            ..CategoryRule::new("WORK")
        };
        let second = CategoryRule {
            subject_keywords: vec!["report".to_string()],
            ..CategoryRule::new("ARCHIVEME")
        };
        let matcher = RuleMatcher::new(vec![first, second]);
        let decision = matcher.evaluate(&message("a@b.c", "Q3 report", "")).unwrap();
        assert_eq!(decision.category, "WORK");
    }

    #[test]
    fn test_no_match_returns_none() {
        let matcher = RuleMatcher::new(vec![bills_rule()]);
        assert!(matcher.evaluate(&message("a@b.c", "hello", "hi")).is_none());
    }

    #[test]
    fn test_rule_action_carried_through() {
        let rule = CategoryRule {
            senders: vec!["deals@".to_string()],
            action: RuleAction::MarkSpam,
            ..CategoryRule::new("JUNK")
        };
        let matcher = RuleMatcher::new(vec![rule]);
        let decision = matcher.evaluate(&message("deals@shop.com", "", "")).unwrap();
        assert_eq!(decision.action, RuleAction::MarkSpam);
    }
}
