//! Language-model classification tier.
//!
//! The model is the last and most expensive tier. Its output is
//! untrusted text: parsing is total (strict JSON, then lenient
//! cleanup, then field extraction, then a REVIEW fallback) and the
//! parsed decision is validated against the live taxonomy before use.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::message::{Decision, Message, RuleAction, Tier, category};
use crate::retry::RetryPolicy;
use crate::service::InferenceService;

use super::prompt::PromptBuilder;

#[allow(clippy::expect_used)]
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:action|category)"\s*:\s*"([^"]+)""#).expect("literal pattern")
});
#[allow(clippy::expect_used)]
static REASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""reason"\s*:\s*"([^"]*)""#).expect("literal pattern"));
#[allow(clippy::expect_used)]
static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""confidence"\s*:\s*([0-9]+(?:\.[0-9]+)?)"#).expect("literal pattern")
});

/// Raw model reply; every field is optional because models improvise.
#[derive(Debug, Default, Deserialize)]
struct RawReply {
    action: Option<String>,
    category: Option<String>,
    reason: Option<String>,
    confidence: Option<f32>,
}

/// Classifies messages through the inference endpoint.
pub struct ModelClassifier<'a, I> {
    infer: &'a I,
    retry: &'a RetryPolicy,
    config: &'a EngineConfig,
}

impl<'a, I: InferenceService> ModelClassifier<'a, I> {
    /// Creates a classifier over an inference backend.
    pub const fn new(infer: &'a I, retry: &'a RetryPolicy, config: &'a EngineConfig) -> Self {
        Self {
            infer,
            retry,
            config,
        }
    }

    /// Classifies one message, degrading to REVIEW on failure.
    ///
    /// Transient inference errors retry under the shared policy (with
    /// the longer rate-limit curve where applicable); exhaustion is a
    /// classification failure, not a run failure.
    ///
    /// # Errors
    ///
    /// Returns only [`Error::Cancelled`] or a fatal auth error;
    /// anything else becomes a REVIEW decision.
    pub async fn classify(
        &self,
        message: &Message,
        prompts: &PromptBuilder,
        cancel: &CancellationToken,
    ) -> Result<Decision> {
        let prompt = prompts.build(message);
        let completion = self
            .retry
            .run(cancel, || {
                self.infer.complete(
                    &prompt,
                    self.config.model_max_tokens,
                    self.config.model_temperature,
                )
            })
            .await;

        let text = match completion {
            Ok(text) => text,
            Err(e) if matches!(e, Error::Cancelled) || e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(id = %message.id, "model classification failed: {e}");
                return Ok(Decision::review(
                    format!("classification unavailable: {e}"),
                    Tier::Model,
                ));
            }
        };

        let parsed = parse_response(&text);
        Ok(validate(parsed, &prompts.categories(), self.config))
    }
}

/// Parses arbitrary model output into a decision. Total: never fails.
///
/// Strict JSON first, then a lenient pass over the first `{...}` span
/// (code fences stripped), then regex field extraction, then REVIEW
/// with confidence 0.
#[must_use]
pub fn parse_response(text: &str) -> Decision {
    let trimmed = text.trim();

    if let Some(decision) = parse_strict(trimmed) {
        return decision;
    }
    if let Some(decision) = extract_json_span(trimmed).and_then(parse_strict) {
        return decision;
    }
    if let Some(decision) = extract_fields(trimmed) {
        return decision;
    }
    Decision::review("unparseable model response", Tier::Model)
}

fn parse_strict(text: &str) -> Option<Decision> {
    let reply: RawReply = serde_json::from_str(text).ok()?;
    reply_to_decision(reply)
}

/// The first `{` through the last `}`, with code fences removed.
fn extract_json_span(text: &str) -> Option<&str> {
    let cleaned = text
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    (start < end).then(|| &cleaned[start..=end])
}

/// Last-ditch extraction of quoted fields from non-JSON text.
fn extract_fields(text: &str) -> Option<Decision> {
    let reply = RawReply {
        action: ACTION_RE
            .captures(text)
            .map(|c| c[1].to_string()),
        category: None,
        reason: REASON_RE.captures(text).map(|c| c[1].to_string()),
        confidence: CONFIDENCE_RE
            .captures(text)
            .and_then(|c| c[1].parse().ok()),
    };
    reply_to_decision(reply)
}

fn reply_to_decision(reply: RawReply) -> Option<Decision> {
    let category = reply.action.or(reply.category)?;
    let category = category.trim().to_uppercase();
    if category.is_empty() {
        return None;
    }
    Some(Decision::new(
        category,
        RuleAction::default(),
        reply.reason.unwrap_or_default(),
        // Missing confidence defaults to 0.5 ("present but unstated").
        reply.confidence.unwrap_or(0.5),
        Tier::Model,
    ))
}

/// Validates a parsed decision against the live taxonomy.
///
/// Clamps confidence into `[0, 1]`, maps categories outside the
/// taxonomy to REVIEW, truncates the reason, and resolves the action
/// from the matched category's rule. Idempotent: validating an
/// already-valid decision changes nothing.
#[must_use]
pub fn validate(
    mut decision: Decision,
    categories: &BTreeMap<String, RuleAction>,
    config: &EngineConfig,
) -> Decision {
    decision.confidence = decision.confidence.clamp(0.0, 1.0);
    if !decision.confidence.is_finite() {
        decision.confidence = 0.0;
    }

    match categories.get(&decision.category) {
        Some(action) => decision.action = *action,
        None => {
            let unknown = std::mem::replace(&mut decision.category, category::REVIEW.to_string());
            decision.action = RuleAction::LabelOnly;
            if !decision.reason.starts_with("unknown category") {
                decision.reason = format!("unknown category '{unknown}'");
            }
        }
    }

    if decision.reason.chars().count() > config.reason_max_chars {
        decision.reason = decision
            .reason
            .chars()
            .take(config.reason_max_chars)
            .collect();
    }
    decision
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::MessageId;
    use crate::rules::CategoryRule;
    use crate::service::fake::FakeInference;

    fn taxonomy() -> BTreeMap<String, RuleAction> {
        let mut map = BTreeMap::new();
        map.insert(category::INBOX.to_string(), RuleAction::LabelOnly);
        map.insert(category::PRIORITY.to_string(), RuleAction::LabelOnly);
        map.insert(category::REVIEW.to_string(), RuleAction::LabelOnly);
        map.insert("JUNK".to_string(), RuleAction::MarkSpam);
        map.insert("BILLS".to_string(), RuleAction::LabelAndArchive);
        map
    }

    #[test]
    fn test_parse_clean_json() {
        let decision =
            parse_response(r#"{"action": "JUNK", "reason": "promo blast", "confidence": 0.9}"#);
        assert_eq!(decision.category, "JUNK");
        assert_eq!(decision.reason, "promo blast");
        assert!((decision.confidence - 0.9).abs() < 1e-6);
        assert_eq!(decision.tier, Tier::Model);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        // Chatty models wrap the JSON in pleasantries.
        let decision = parse_response(
            r#"Sure! {"action":"JUNK","reason":"promo","confidence":0.8} Let me know if you need more."#,
        );
        assert_eq!(decision.category, "JUNK");
        assert!((decision.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_code_fenced_json() {
        let decision =
            parse_response("```json\n{\"action\": \"BILLS\", \"confidence\": 0.7}\n```");
        assert_eq!(decision.category, "BILLS");
    }

    #[test]
    fn test_parse_near_json_via_field_extraction() {
        let decision =
            parse_response(r#"action: hmm, I'd say "action": "PRIORITY", "confidence": 0.66 ok"#);
        assert_eq!(decision.category, "PRIORITY");
        assert!((decision.confidence - 0.66).abs() < 1e-6);
    }

    #[test]
    fn test_parse_garbage_degrades_to_review() {
        let decision = parse_response("I have no idea what this email is.");
        assert_eq!(decision.category, category::REVIEW);
        assert!(decision.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_missing_confidence_defaults() {
        let decision = parse_response(r#"{"action": "JUNK"}"#);
        assert!((decision.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_category_key_accepted() {
        let decision = parse_response(r#"{"category": "bills", "confidence": 1}"#);
        assert_eq!(decision.category, "BILLS");
    }

    #[test]
    fn test_validate_unknown_category_maps_to_review() {
        let config = EngineConfig::default();
        let decision = Decision::new("ALIENS", RuleAction::LabelAndArchive, "", 0.9, Tier::Model);
        let validated = validate(decision, &taxonomy(), &config);
        assert_eq!(validated.category, category::REVIEW);
        assert_eq!(validated.action, RuleAction::LabelOnly);
        assert!(validated.reason.contains("ALIENS"));
    }

    #[test]
    fn test_validate_resolves_action_from_taxonomy() {
        let config = EngineConfig::default();
        let decision = Decision::new("JUNK", RuleAction::LabelOnly, "promo", 0.8, Tier::Model);
        let validated = validate(decision, &taxonomy(), &config);
        assert_eq!(validated.action, RuleAction::MarkSpam);
    }

    #[test]
    fn test_validate_truncates_reason() {
        let mut config = EngineConfig::default();
        config.reason_max_chars = 10;
        let decision = Decision::new("JUNK", RuleAction::MarkSpam, "x".repeat(50), 0.8, Tier::Model);
        let validated = validate(decision, &taxonomy(), &config);
        assert_eq!(validated.reason.chars().count(), 10);
    }

    #[test]
    fn test_validate_idempotent() {
        let config = EngineConfig::default();
        let categories = taxonomy();
        for raw in [
            Decision::new("ALIENS", RuleAction::LabelOnly, "weird", 7.0, Tier::Model),
            Decision::new("JUNK", RuleAction::LabelOnly, "promo", -2.0, Tier::Model),
            Decision::review("nothing", Tier::Model),
        ] {
            let once = validate(raw, &categories, &config);
            let twice = validate(once.clone(), &categories, &config);
            assert_eq!(once.category, twice.category);
            assert_eq!(once.action, twice.action);
            assert_eq!(once.reason, twice.reason);
            assert!((once.confidence - twice.confidence).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_classify_uses_taxonomy_and_validates() {
        let infer = FakeInference::new();
        infer.push_response(r#"{"action": "BILLS", "reason": "invoice", "confidence": 0.92}"#);
        let config = EngineConfig::default();
        let retry = RetryPolicy::new(config.retry.clone());
        let classifier = ModelClassifier::new(&infer, &retry, &config);
        let rules = vec![CategoryRule {
            senders: vec!["billing@acme.com".to_string()],
            ..CategoryRule::new("BILLS")
        }];
        let prompts = PromptBuilder::new(&rules, vec![], &config);

        let decision = classifier
            .classify(&sample_message(), &prompts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.category, "BILLS");
        assert_eq!(decision.action, RuleAction::LabelAndArchive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_exhaustion_degrades_to_review() {
        let infer = FakeInference::new();
        for _ in 0..3 {
            infer.push_error(Error::Transient("inference down".into()));
        }
        let mut config = EngineConfig::default();
        config.retry.jitter = 0.0;
        let retry = RetryPolicy::new(config.retry.clone());
        let classifier = ModelClassifier::new(&infer, &retry, &config);
        let prompts = PromptBuilder::new(&[], vec![], &config);

        let decision = classifier
            .classify(&sample_message(), &prompts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.category, category::REVIEW);
        assert!(decision.reason.contains("classification unavailable"));
    }

    fn sample_message() -> Message {
        Message {
            id: MessageId::new("m1"),
            subject: "Invoice #1234".to_string(),
            from: "billing@acme.com".to_string(),
            date: String::new(),
            body: "Your invoice is attached.".to_string(),
            labels: vec![],
            unread: true,
        }
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn parse_response_is_total(text in ".*") {
                let decision = parse_response(&text);
                prop_assert!(!decision.category.is_empty());
            }

            #[test]
            fn parse_then_validate_always_in_range(text in ".*") {
                let config = EngineConfig::default();
                let decision = validate(parse_response(&text), &taxonomy(), &config);
                prop_assert!((0.0..=1.0).contains(&decision.confidence));
                prop_assert!(decision.reason.chars().count() <= config.reason_max_chars);
            }

            #[test]
            fn validate_is_idempotent(
                category in "[A-Z]{1,8}",
                reason in ".{0,300}",
                confidence in -10.0f32..10.0,
            ) {
                let config = EngineConfig::default();
                let categories = taxonomy();
                let raw = Decision::new(category, RuleAction::LabelOnly, reason, confidence, Tier::Model);
                let once = validate(raw, &categories, &config);
                let twice = validate(once.clone(), &categories, &config);
                prop_assert_eq!(once.category, twice.category);
                prop_assert_eq!(once.reason, twice.reason);
                prop_assert!((once.confidence - twice.confidence).abs() < f32::EPSILON);
            }
        }
    }
}
