//! Bulk application of translated filters.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::message::{LabelId, MessageId};
use crate::retry::RetryPolicy;
use crate::service::{MailService, RunHooks};

use super::model::{FilterRule, FilterStats};

/// Lazily populated label name → provider id map.
///
/// Populated on first use; a miss invalidates the cache and refreshes
/// once before failing, so labels created mid-run are picked up.
#[derive(Debug, Default)]
pub struct LabelCache {
    map: Option<HashMap<String, LabelId>>,
}

impl LabelCache {
    /// Creates an empty, unpopulated cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { map: None }
    }

    /// Resolves a label name to its provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the label listing fails or the name is
    /// unknown even after a refresh.
    pub async fn resolve<M: MailService + ?Sized>(
        &mut self,
        mail: &M,
        name: &str,
    ) -> Result<LabelId> {
        if self.map.is_none() {
            self.refresh(mail).await?;
        }
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        // Miss: the label may have been created since we cached.
        self.refresh(mail).await?;
        self.lookup(name)
            .ok_or_else(|| Error::FilterApplication(format!("unknown label: {name}")))
    }

    fn lookup(&self, name: &str) -> Option<LabelId> {
        self.map.as_ref()?.get(&name.to_uppercase()).cloned()
    }

    async fn refresh<M: MailService + ?Sized>(&mut self, mail: &M) -> Result<()> {
        let labels = mail.list_labels().await?;
        self.map = Some(
            labels
                .into_iter()
                .map(|l| (l.name.to_uppercase(), l.id))
                .collect(),
        );
        Ok(())
    }
}

/// Outcome of the filter application phase.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Messages successfully mutated across all filters.
    pub processed: u64,
    /// Ids of every affected message, for downstream exclusion.
    pub affected: HashSet<MessageId>,
    /// Distinct label names applied, for the phase-2 exclusion clause.
    pub applied_labels: Vec<String>,
    /// Per-filter statistics.
    pub stats: Vec<FilterStats>,
}

/// Applies translated filters to the unread backlog in bulk.
pub struct FilterApplier<'a, M> {
    mail: &'a M,
    retry: &'a RetryPolicy,
    config: &'a EngineConfig,
}

impl<'a, M: MailService> FilterApplier<'a, M> {
    /// Creates an applier over the given collaborators.
    pub const fn new(mail: &'a M, retry: &'a RetryPolicy, config: &'a EngineConfig) -> Self {
        Self {
            mail,
            retry,
            config,
        }
    }

    /// Applies each filter to matching unread inbox messages.
    ///
    /// One filter's failure is recorded and skipped; it never aborts
    /// the remaining filters. Only authentication failures and
    /// cancellation end the phase early.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] or a fatal error; everything else
    /// is captured in the per-filter stats.
    pub async fn apply(
        &self,
        filters: &[FilterRule],
        labels: &mut LabelCache,
        cancel: &CancellationToken,
        hooks: &RunHooks,
    ) -> Result<FilterOutcome> {
        let mut outcome = FilterOutcome::default();
        for filter in filters {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.apply_one(filter, labels, cancel, &mut outcome).await {
                Ok(stats) => {
                    hooks.log(&format!(
                        "filter {}: matched {}, mutated {}",
                        filter.id, stats.matched, stats.mutated
                    ));
                    outcome.stats.push(stats);
                }
                Err(e) if e.is_fatal() || matches!(e, Error::Cancelled) => return Err(e),
                Err(e) => {
                    tracing::warn!(id = %filter.id, "filter skipped: {e}");
                    outcome.stats.push(FilterStats {
                        id: filter.id.clone(),
                        query: filter.query.clone(),
                        matched: 0,
                        mutated: 0,
                        failed_chunks: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Applies a single filter: search, resolve labels, mutate in chunks.
    async fn apply_one(
        &self,
        filter: &FilterRule,
        labels: &mut LabelCache,
        cancel: &CancellationToken,
        outcome: &mut FilterOutcome,
    ) -> Result<FilterStats> {
        let query = format!("{} is:unread in:inbox", filter.query);
        let ids = self.search_bounded(&query, cancel).await?;

        let mut add_ids = Vec::with_capacity(filter.add_labels.len());
        for name in &filter.add_labels {
            add_ids.push(labels.resolve(self.mail, name).await?);
        }
        let mut remove_ids = Vec::with_capacity(filter.remove_labels.len());
        for name in &filter.remove_labels {
            remove_ids.push(labels.resolve(self.mail, name).await?);
        }

        let mut stats = FilterStats {
            id: filter.id.clone(),
            query,
            matched: ids.len() as u64,
            mutated: 0,
            failed_chunks: 0,
            error: None,
        };

        for chunk in ids.chunks(self.config.mutate_chunk_size.max(1)) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let result = self
                .retry
                .run(cancel, || {
                    self.mail.batch_mutate(chunk, &add_ids, &remove_ids)
                })
                .await;
            match result {
                Ok(()) => {
                    stats.mutated += chunk.len() as u64;
                    outcome.processed += chunk.len() as u64;
                    outcome.affected.extend(chunk.iter().cloned());
                }
                Err(e) if e.is_fatal() || matches!(e, Error::Cancelled) => return Err(e),
                Err(e) => {
                    stats.failed_chunks += 1;
                    tracing::warn!(id = %filter.id, "mutation chunk failed after retries: {e}");
                }
            }
        }

        for name in &filter.add_labels {
            if !outcome.applied_labels.contains(name) {
                outcome.applied_labels.push(name.clone());
            }
        }
        Ok(stats)
    }

    /// Pages through the search, bounded by the per-filter cap.
    async fn search_bounded(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<MessageId>> {
        let cap = self.config.max_messages_per_filter;
        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .retry
                .run(cancel, || {
                    self.mail
                        .list_messages(query, token.as_deref(), self.config.page_size)
                })
                .await?;
            ids.extend(page.ids);
            if ids.len() >= cap {
                ids.truncate(cap);
                tracing::debug!(query, cap, "filter match capped");
                break;
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }
}
