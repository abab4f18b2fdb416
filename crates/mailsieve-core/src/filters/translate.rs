//! Translation of provider filters into canonical rule descriptors.

use crate::error::Result;
use crate::message::category;
use crate::service::MailService;

use super::model::{FilterRule, ProviderFilter};

/// Fetches the account's filters and translates them.
///
/// Filters without searchable criteria or without any action are
/// skipped with a warning; they cannot be applied in bulk.
///
/// # Errors
///
/// Returns an error only if the filter listing itself fails.
pub async fn harvest_filters<M: MailService + ?Sized>(mail: &M) -> Result<Vec<FilterRule>> {
    let provider_filters = mail.list_filters().await?;
    let mut rules = Vec::with_capacity(provider_filters.len());
    for filter in &provider_filters {
        match translate_filter(filter) {
            Some(rule) => rules.push(rule),
            None => {
                tracing::warn!(id = %filter.id, "skipping untranslatable filter");
            }
        }
    }
    tracing::info!(
        harvested = rules.len(),
        total = provider_filters.len(),
        "translated provider filters"
    );
    Ok(rules)
}

/// Translates one filter, or `None` when it has nothing to search or do.
fn translate_filter(filter: &ProviderFilter) -> Option<FilterRule> {
    let mut parts = Vec::new();
    if let Some(from) = non_empty(filter.criteria.from.as_deref()) {
        parts.push(format!("from:{from}"));
    }
    if let Some(subject) = non_empty(filter.criteria.subject.as_deref()) {
        if subject.contains(char::is_whitespace) {
            parts.push(format!("subject:\"{subject}\""));
        } else {
            parts.push(format!("subject:{subject}"));
        }
    }
    if let Some(query) = non_empty(filter.criteria.query.as_deref()) {
        parts.push(query.to_string());
    }
    if parts.is_empty() {
        return None;
    }

    let mut add_labels = filter.action.add_labels.clone();
    if filter.action.mark_spam && !add_labels.iter().any(|l| l == category::SPAM) {
        add_labels.push(category::SPAM.to_string());
    }
    let remove_labels = filter.action.remove_labels.clone();
    if add_labels.is_empty() && remove_labels.is_empty() {
        return None;
    }

    Some(FilterRule {
        id: filter.id.clone(),
        query: parts.join(" "),
        add_labels,
        remove_labels,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
