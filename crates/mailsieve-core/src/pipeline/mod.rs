//! The per-message decision pipeline.
//!
//! Tiers run in fixed precedence order: a message already handled by a
//! phase-1 filter is skipped outright; otherwise local rules, then
//! heuristics, then the model. The first non-nil result is final for
//! the pass.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::classify::{HeuristicClassifier, ModelClassifier, PromptBuilder};
use crate::error::Result;
use crate::message::{Decision, Message, MessageId};
use crate::rules::RuleMatcher;
use crate::service::InferenceService;

/// Outcome of running one message through the pipeline.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Already handled by a phase-1 filter; terminal.
    Skipped,
    /// A tier decided.
    Decided(Decision),
}

/// Sequences the classification tiers for one message at a time.
pub struct DecisionPipeline<'a, I> {
    matcher: &'a RuleMatcher,
    heuristic: &'a HeuristicClassifier,
    model: &'a ModelClassifier<'a, I>,
    prompts: &'a PromptBuilder,
}

impl<'a, I: InferenceService> DecisionPipeline<'a, I> {
    /// Creates a pipeline over the three decision tiers.
    pub const fn new(
        matcher: &'a RuleMatcher,
        heuristic: &'a HeuristicClassifier,
        model: &'a ModelClassifier<'a, I>,
        prompts: &'a PromptBuilder,
    ) -> Self {
        Self {
            matcher,
            heuristic,
            model,
            prompts,
        }
    }

    /// Decides one message.
    ///
    /// # Errors
    ///
    /// Returns only cancellation or fatal errors from the model tier;
    /// every other model failure degrades to a REVIEW decision.
    pub async fn decide(
        &self,
        message: &Message,
        excluded: &HashSet<MessageId>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        if excluded.contains(&message.id) {
            return Ok(PipelineOutcome::Skipped);
        }
        if let Some(decision) = self.matcher.evaluate(message) {
            return Ok(PipelineOutcome::Decided(decision));
        }
        if let Some(decision) = self.heuristic.classify(message) {
            return Ok(PipelineOutcome::Decided(decision));
        }
        let decision = self.model.classify(message, self.prompts, cancel).await?;
        Ok(PipelineOutcome::Decided(decision))
    }
}
