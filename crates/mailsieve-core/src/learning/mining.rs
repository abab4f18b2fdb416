//! Suggestion mining over the decision history.
//!
//! Both mining functions are pure: the same history and rule set
//! always yield the same suggestions, and neither touches the rule
//! set. `apply_suggestion` is the only way a suggestion becomes a
//! rule, and it returns a new snapshot instead of mutating.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::EngineConfig;
use crate::message::category;
use crate::rules::CategoryRule;

use super::model::{HistoryRecord, Suggestion, SuggestionKind};

/// Subject tokens too common to be evidence of anything.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "our", "with", "from", "this", "that", "are", "has",
    "have", "was", "will", "can", "not", "all", "out", "now", "new", "get", "please",
];

/// Mines sender-consistency and correction-keyword suggestions.
///
/// Senders seen at least `min_sender_occurrences` times whose
/// decisions agree on one category at `sender_consistency` or better
/// (and that no existing rule already routes there) yield sender-rule
/// suggestions. Subject keywords recurring through user corrections
/// yield keyword-rule suggestions.
#[must_use]
pub fn suggest_rule_updates(
    history: &[HistoryRecord],
    rules: &[CategoryRule],
    config: &EngineConfig,
) -> Vec<Suggestion> {
    let mut suggestions = sender_suggestions(history, rules, config);
    suggestions.extend(correction_keyword_suggestions(history, rules, config));
    suggestions
}

fn sender_suggestions(
    history: &[HistoryRecord],
    rules: &[CategoryRule],
    config: &EngineConfig,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for (sender, categories) in sender_groups(history) {
        let total: u32 = categories.values().sum();
        if (total as usize) < config.min_sender_occurrences {
            continue;
        }
        let Some((top_category, count_ref)) = categories.iter().max_by_key(|kv| *kv.1) else {
            continue;
        };
        let count = *count_ref;
        let share = count as f32 / total as f32;
        if share < config.sender_consistency {
            continue;
        }
        // Already routed there by a rule: nothing to learn.
        if rules
            .iter()
            .any(|r| r.category == **top_category && r.covers_sender(sender))
        {
            continue;
        }
        let corrections = history
            .iter()
            .filter(|r| r.sender == sender && r.corrected() && r.effective_category() == *top_category)
            .count();
        suggestions.push(Suggestion {
            kind: SuggestionKind::SenderRule,
            category: (*top_category).to_string(),
            value: sender.to_string(),
            evidence: count,
            confidence: share,
            detail: format!(
                "{count} of {total} decisions for {sender} ended as {top_category} \
                 ({corrections} user corrections)"
            ),
        });
    }
    suggestions
}

fn correction_keyword_suggestions(
    history: &[HistoryRecord],
    rules: &[CategoryRule],
    config: &EngineConfig,
) -> Vec<Suggestion> {
    // Cluster corrected records by the category the user moved them to.
    let mut clusters: BTreeMap<&str, Vec<&HistoryRecord>> = BTreeMap::new();
    for record in history.iter().filter(|r| r.corrected()) {
        clusters
            .entry(record.effective_category())
            .or_default()
            .push(record);
    }

    let mut suggestions = Vec::new();
    for (target, cluster) in clusters {
        if cluster.len() < config.min_correction_cluster {
            continue;
        }
        let known: BTreeSet<String> = rules
            .iter()
            .filter(|r| r.category == target)
            .flat_map(|r| r.subject_keywords.iter().map(|k| k.to_lowercase()))
            .collect();

        for (token, count) in token_frequencies(cluster.iter().map(|r| r.subject.as_str())) {
            let share = count as f32 / cluster.len() as f32;
            if share < config.keyword_frequency || known.contains(&token) {
                continue;
            }
            suggestions.push(Suggestion {
                kind: SuggestionKind::KeywordRule,
                category: target.to_string(),
                value: token.clone(),
                evidence: count,
                confidence: share,
                detail: format!(
                    "'{token}' appears in {count} of {} subjects corrected to {target}",
                    cluster.len()
                ),
            });
        }
    }
    suggestions
}

/// Clusters REVIEW-tier history into new-category proposals.
///
/// Records that ended in REVIEW are grouped by sender domain; a group
/// larger than `min_pattern_cluster` proposes a category named after
/// the domain, with its recurring subject keywords as evidence.
#[must_use]
pub fn detect_new_patterns(
    history: &[HistoryRecord],
    rules: &[CategoryRule],
    config: &EngineConfig,
) -> Vec<Suggestion> {
    let mut domains: BTreeMap<&str, Vec<&HistoryRecord>> = BTreeMap::new();
    for record in history
        .iter()
        .filter(|r| r.effective_category() == category::REVIEW)
    {
        if let Some(domain) = record.sender_domain() {
            domains.entry(domain).or_default().push(record);
        }
    }

    let existing: BTreeSet<&str> = rules
        .iter()
        .map(|r| r.category.as_str())
        .chain([
            category::INBOX,
            category::PRIORITY,
            category::REVIEW,
            category::SPAM,
        ])
        .collect();

    let mut suggestions = Vec::new();
    for (domain, cluster) in domains {
        if cluster.len() <= config.min_pattern_cluster {
            continue;
        }
        let Some(name) = category_name_for(domain) else {
            continue;
        };
        if existing.contains(name.as_str()) {
            continue;
        }
        let tokens = token_frequencies(cluster.iter().map(|r| r.subject.as_str()));
        let shared: Vec<String> = tokens
            .iter()
            .filter(|(_, count)| *count as f32 / cluster.len() as f32 >= config.keyword_frequency)
            .take(3)
            .map(|(token, _)| token.clone())
            .collect();
        let confidence = tokens
            .first()
            .map_or(0.5, |(_, count)| *count as f32 / cluster.len() as f32);
        suggestions.push(Suggestion {
            kind: SuggestionKind::NewCategory,
            category: name,
            value: domain.to_string(),
            evidence: cluster.len() as u32,
            confidence: confidence.clamp(0.0, 1.0),
            detail: format!(
                "{} REVIEW messages from {domain}, recurring subjects: {}",
                cluster.len(),
                if shared.is_empty() {
                    "none".to_string()
                } else {
                    shared.join(", ")
                }
            ),
        });
    }
    suggestions
}

/// Short "learned pattern" lines for the model prompt.
#[must_use]
pub fn pattern_hints(
    history: &[HistoryRecord],
    config: &EngineConfig,
    limit: usize,
) -> Vec<String> {
    let mut consistent: Vec<(u32, String)> = Vec::new();
    for (sender, categories) in sender_groups(history) {
        let total: u32 = categories.values().sum();
        if (total as usize) < config.min_sender_occurrences {
            continue;
        }
        if let Some((top, count_ref)) = categories.iter().max_by_key(|kv| *kv.1)
            && { let count = *count_ref; count as f32 / total as f32 >= config.sender_consistency }
        {
            let count = *count_ref;
            consistent.push((count, format!("Mail from {sender} is usually {top}")));
        }
    }
    consistent.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    consistent
        .into_iter()
        .take(limit)
        .map(|(_, hint)| hint)
        .collect()
}

/// Applies an approved suggestion, returning a new rule snapshot.
///
/// Never called by the engine itself; suggestion application is a
/// human-gated operation.
#[must_use]
pub fn apply_suggestion(rules: &[CategoryRule], suggestion: &Suggestion) -> Vec<CategoryRule> {
    let mut updated = rules.to_vec();
    let existing = updated
        .iter_mut()
        .find(|r| r.category == suggestion.category);

    match (suggestion.kind, existing) {
        (SuggestionKind::SenderRule, Some(rule)) => {
            if !rule.senders.contains(&suggestion.value) {
                rule.senders.push(suggestion.value.clone());
            }
        }
        (SuggestionKind::SenderRule, None) => {
            let mut rule = CategoryRule::new(&suggestion.category);
            rule.senders.push(suggestion.value.clone());
            updated.push(rule);
        }
        (SuggestionKind::KeywordRule, Some(rule)) => {
            if !rule.subject_keywords.contains(&suggestion.value) {
                rule.subject_keywords.push(suggestion.value.clone());
            }
        }
        (SuggestionKind::KeywordRule, None) => {
            let mut rule = CategoryRule::new(&suggestion.category);
            rule.subject_keywords.push(suggestion.value.clone());
            updated.push(rule);
        }
        (SuggestionKind::NewCategory, Some(rule)) => {
            if !rule.domains.contains(&suggestion.value) {
                rule.domains.push(suggestion.value.clone());
            }
        }
        (SuggestionKind::NewCategory, None) => {
            let mut rule = CategoryRule::new(&suggestion.category);
            rule.domains.push(suggestion.value.clone());
            rule.description = Some(suggestion.detail.clone());
            updated.push(rule);
        }
    }
    updated
}

/// Sender → effective category → count, in deterministic order.
fn sender_groups(history: &[HistoryRecord]) -> BTreeMap<&str, BTreeMap<&str, u32>> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, u32>> = BTreeMap::new();
    for record in history {
        *groups
            .entry(record.sender.as_str())
            .or_default()
            .entry(record.effective_category())
            .or_default() += 1;
    }
    groups
}

/// Token document frequencies over subjects, highest first.
///
/// Each subject counts a token once; ties break alphabetically so the
/// output is deterministic.
fn token_frequencies<'a>(subjects: impl Iterator<Item = &'a str>) -> Vec<(String, u32)> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for subject in subjects {
        let tokens: BTreeSet<String> = subject
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 3 && !STOPWORDS.contains(t))
            .map(ToString::to_string)
            .collect();
        for token in tokens {
            *counts.entry(token).or_default() += 1;
        }
    }
    let mut ordered: Vec<(String, u32)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered
}

/// Uppercased second-level domain, e.g. `mail.acme.com` → `ACME`.
fn category_name_for(domain: &str) -> Option<String> {
    let parts: Vec<&str> = domain.split('.').filter(|p| !p.is_empty()).collect();
    let label = match parts.len() {
        0 => return None,
        1 => parts[0],
        n => parts[n - 2],
    };
    let name: String = label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase();
    (!name.is_empty()).then_some(name)
}
