//! The backlog processor: drives the full triage run.
//!
//! Phase 1 applies the account's own filters in bulk; phase 2 pages
//! through what remains and runs each message through the decision
//! pipeline. Sub-batch boundaries are the only pause/cancel
//! checkpoints and the only points where history is written, so a
//! multi-hour run can stop and resume without double-processing.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::classify::{HeuristicClassifier, ModelClassifier, PromptBuilder};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::filters::{FilterApplier, LabelCache, harvest_filters};
use crate::learning::{
    HistoryLog, HistoryRecord, Suggestion, detect_new_patterns, pattern_hints,
    suggest_rule_updates,
};
use crate::message::{Decision, LabelId, Message, category};
use crate::pipeline::{DecisionPipeline, PipelineOutcome};
use crate::retry::RetryPolicy;
use crate::rules::{CategoryRule, RuleMatcher};
use crate::service::{HistoryStore, InferenceService, MailService, RunHooks};

use super::progress::{Checkpoint, RunOutcome, RunStats, RunSummary};

/// How many learned-pattern hints the prompt carries.
const MAX_PROMPT_HINTS: usize = 8;

/// Runs backlog passes against one account session.
///
/// One processor owns one run at a time; the caller spawns `run` on a
/// worker task and talks to it only through [`RunHooks`] and the
/// cancellation token.
pub struct BacklogProcessor<M, I, H> {
    mail: M,
    infer: I,
    history_store: H,
    rules: Vec<CategoryRule>,
    history: HistoryLog,
    config: EngineConfig,
}

impl<M, I, H> BacklogProcessor<M, I, H>
where
    M: MailService,
    I: InferenceService,
    H: HistoryStore,
{
    /// Creates a processor, loading prior history from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the history store is unreadable.
    pub fn new(
        mail: M,
        infer: I,
        history_store: H,
        rules: Vec<CategoryRule>,
        config: EngineConfig,
    ) -> Result<Self> {
        let history =
            HistoryLog::from_records(history_store.load_history()?, config.history_capacity);
        Ok(Self {
            mail,
            infer,
            history_store,
            rules,
            history,
            config,
        })
    }

    /// The retained decision history.
    #[must_use]
    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// The rule snapshot this processor classifies with.
    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Records a decision made outside a run (e.g. a user correction).
    ///
    /// # Errors
    ///
    /// Returns an error if the history store write fails; the
    /// in-memory log is updated regardless.
    pub fn record_decision(
        &mut self,
        message: &Message,
        decision: &Decision,
        user_override: Option<String>,
    ) -> Result<HistoryRecord> {
        let record = self.history.record(
            message,
            decision,
            user_override,
            self.config.subject_history_chars,
        );
        self.history_store
            .append_history(std::slice::from_ref(&record))?;
        Ok(record)
    }

    /// Mines the history for rule suggestions.
    #[must_use]
    pub fn suggestions(&self) -> Vec<Suggestion> {
        suggest_rule_updates(&self.history.snapshot(), &self.rules, &self.config)
    }

    /// Mines REVIEW clusters for new-category proposals.
    #[must_use]
    pub fn new_patterns(&self) -> Vec<Suggestion> {
        detect_new_patterns(&self.history.snapshot(), &self.rules, &self.config)
    }

    /// Runs one backlog pass.
    ///
    /// Never returns an error: every ending, including fatal aborts,
    /// is folded into the summary with a readable report.
    pub async fn run(
        &mut self,
        hooks: &RunHooks,
        cancel: &CancellationToken,
        resume: Option<Checkpoint>,
    ) -> RunSummary {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let outcome = match self.run_inner(hooks, cancel, resume, &mut stats).await {
            Ok(outcome) => outcome,
            Err(Error::Cancelled) => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Aborted(e.to_string()),
        };
        let summary = RunSummary {
            stats,
            outcome,
            elapsed: started.elapsed(),
        };
        hooks.log(&summary.report());
        summary
    }

    async fn run_inner(
        &mut self,
        hooks: &RunHooks,
        cancel: &CancellationToken,
        resume: Option<Checkpoint>,
        stats: &mut RunStats,
    ) -> Result<RunOutcome> {
        let retry = RetryPolicy::new(self.config.retry.clone());
        let mut labels = LabelCache::new();

        // Phase 1: the provider's own filters. A resumed run skips
        // this; the mailbox already reflects the earlier pass.
        let (excluded, exclusion_labels) = if let Some(checkpoint) = &resume {
            hooks.log("resuming run: filter phase already applied");
            (HashSet::new(), checkpoint.exclusion_labels.clone())
        } else {
            match harvest_filters(&self.mail).await {
                Ok(filters) => {
                    let applier = FilterApplier::new(&self.mail, &retry, &self.config);
                    let outcome = applier.apply(&filters, &mut labels, cancel, hooks).await?;
                    stats.filter_processed = outcome.processed;
                    stats.filter_stats = outcome.stats;
                    (outcome.affected, outcome.applied_labels)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("filter harvest failed, continuing without filters: {e}");
                    (HashSet::new(), Vec::new())
                }
            }
        };

        let query = candidate_query(&exclusion_labels);
        hooks.log(&format!("processing backlog with query: {query}"));

        let matcher = RuleMatcher::new(self.rules.clone());
        let heuristic = HeuristicClassifier::new(&self.config);
        let hints = pattern_hints(&self.history.snapshot(), &self.config, MAX_PROMPT_HINTS);
        let prompts = PromptBuilder::new(&self.rules, hints, &self.config);
        let model = ModelClassifier::new(&self.infer, &retry, &self.config);
        let pipeline = DecisionPipeline::new(&matcher, &heuristic, &model, &prompts);

        let mut page_token = resume.as_ref().and_then(|c| c.page_token.clone());
        let mut skip_batches = resume.as_ref().map_or(0, |c| c.sub_batch_index);
        let batch_size = self.config.batch_size.max(1);

        // Phase 2: paginate what the filters did not handle.
        loop {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            let current_token = page_token.clone();
            let page = retry
                .run(cancel, || {
                    self.mail.list_messages(
                        &query,
                        current_token.as_deref(),
                        self.config.page_size,
                    )
                })
                .await?;

            for (index, batch) in page.ids.chunks(batch_size).enumerate() {
                if index < skip_batches {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Ok(RunOutcome::Cancelled);
                }
                if hooks.pause_requested() {
                    return Ok(RunOutcome::Paused(Checkpoint {
                        page_token: current_token,
                        sub_batch_index: index,
                        exclusion_labels,
                    }));
                }

                // Decide every message in the sub-batch.
                let mut decided: Vec<(Message, Decision)> = Vec::with_capacity(batch.len());
                for id in batch {
                    let fetched = retry.run(cancel, || self.mail.get_message(id)).await;
                    let message = match fetched {
                        Ok(message) => message,
                        Err(e) if e.is_fatal() || matches!(e, Error::Cancelled) => return Err(e),
                        Err(e) => {
                            stats.failed += 1;
                            tracing::warn!(id = %id, "message fetch failed: {e}");
                            continue;
                        }
                    };
                    match pipeline.decide(&message, &excluded, cancel).await? {
                        PipelineOutcome::Skipped => stats.skipped += 1,
                        PipelineOutcome::Decided(decision) => decided.push((message, decision)),
                    }
                }

                // Execute mutations grouped by identical label sets.
                let mut records: Vec<HistoryRecord> = Vec::with_capacity(decided.len());
                let mut groups: BTreeMap<(Vec<String>, Vec<String>), Vec<usize>> = BTreeMap::new();
                for (i, (message, decision)) in decided.iter().enumerate() {
                    let mutation = mutation_for(decision);
                    if mutation.0.is_empty() && mutation.1.is_empty() {
                        stats.record_decision(decision);
                        records.push(HistoryRecord::from_decision(
                            message,
                            decision,
                            None,
                            self.config.subject_history_chars,
                        ));
                    } else {
                        groups.entry(mutation).or_default().push(i);
                    }
                }
                for ((add, remove), indices) in groups {
                    let resolved =
                        resolve_labels(&self.mail, &mut labels, &add, &remove).await;
                    let (add_ids, remove_ids) = match resolved {
                        Ok(pair) => pair,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            stats.failed += indices.len() as u64;
                            tracing::warn!("label resolution failed: {e}");
                            continue;
                        }
                    };
                    for chunk in indices.chunks(self.config.mutate_chunk_size.max(1)) {
                        let ids: Vec<_> =
                            chunk.iter().map(|&i| decided[i].0.id.clone()).collect();
                        let result = retry
                            .run(cancel, || {
                                self.mail.batch_mutate(&ids, &add_ids, &remove_ids)
                            })
                            .await;
                        match result {
                            Ok(()) => {
                                for &i in chunk {
                                    let (message, decision) = &decided[i];
                                    stats.record_decision(decision);
                                    records.push(HistoryRecord::from_decision(
                                        message,
                                        decision,
                                        None,
                                        self.config.subject_history_chars,
                                    ));
                                }
                            }
                            Err(e)
                                if e.is_fatal() || matches!(e, Error::Cancelled) =>
                            {
                                return Err(e);
                            }
                            Err(e) => {
                                stats.failed += chunk.len() as u64;
                                tracing::warn!("mutation chunk failed after retries: {e}");
                            }
                        }
                    }
                }

                // History checkpoint: the only write point during a run.
                for record in &records {
                    self.history.push(record.clone());
                }
                if !records.is_empty()
                    && let Err(e) = self.history_store.append_history(&records)
                {
                    tracing::warn!("history append failed: {e}");
                }

                let done = stats.processed + stats.skipped + stats.failed;
                let remaining = page.ids.len().saturating_sub((index + 1) * batch_size);
                hooks.progress(done, done + remaining as u64);
            }
            skip_batches = 0;

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(RunOutcome::Completed)
    }
}

/// Builds the phase-2 candidate query, excluding filter-applied labels.
fn candidate_query(exclusion_labels: &[String]) -> String {
    let mut query = String::from("is:unread in:inbox");
    for label in exclusion_labels {
        query.push_str(&format!(" -label:{label}"));
    }
    query
}

/// Label adds/removes for an executed decision.
fn mutation_for(decision: &Decision) -> (Vec<String>, Vec<String>) {
    use crate::message::RuleAction;

    if decision.is_keep() {
        return (Vec::new(), Vec::new());
    }
    match decision.action {
        RuleAction::LabelOnly => (vec![decision.category.clone()], Vec::new()),
        RuleAction::LabelAndArchive => (
            vec![decision.category.clone()],
            vec![category::INBOX.to_string()],
        ),
        RuleAction::MarkSpam => (
            vec![category::SPAM.to_string()],
            vec![category::INBOX.to_string()],
        ),
    }
}

async fn resolve_labels<M: MailService>(
    mail: &M,
    cache: &mut LabelCache,
    add: &[String],
    remove: &[String],
) -> Result<(Vec<LabelId>, Vec<LabelId>)> {
    let mut add_ids = Vec::with_capacity(add.len());
    for name in add {
        add_ids.push(cache.resolve(mail, name).await?);
    }
    let mut remove_ids = Vec::with_capacity(remove.len());
    for name in remove {
        remove_ids.push(cache.resolve(mail, name).await?);
    }
    Ok((add_ids, remove_ids))
}
