//! # mailsieve-core
//!
//! Tiered categorization and backlog processing engine for email
//! triage. Given a mailbox with tens of thousands of unread messages,
//! the engine:
//!
//! - applies the account's provider-native filters in bulk (phase 1)
//! - pages through the remainder and classifies each message through
//!   tiers ordered by cost and trust: local rules, fast heuristics,
//!   then a language-model fallback (phase 2)
//! - executes the resulting label mutations in chunks with shared
//!   retry/backoff machinery
//! - records every decision to a bounded history and mines it for
//!   rule suggestions that a human can approve
//!
//! External collaborators (mail provider, inference server, rule and
//! history stores, caller callbacks) are injected through the traits
//! in [`service`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backlog;
pub mod classify;
pub mod config;
mod error;
pub mod filters;
pub mod learning;
pub mod message;
pub mod pipeline;
pub mod retry;
pub mod rules;
pub mod service;

pub use backlog::{BacklogProcessor, Checkpoint, RunOutcome, RunStats, RunSummary};
pub use classify::{HeuristicClassifier, ModelClassifier, PromptBuilder, parse_response, validate};
pub use config::{EngineConfig, RetryConfig};
pub use error::{Error, Result};
pub use filters::{FilterApplier, FilterRule, harvest_filters};
pub use learning::{
    HistoryLog, HistoryRecord, JsonHistoryStore, Suggestion, SuggestionKind, apply_suggestion,
    detect_new_patterns, pattern_hints, suggest_rule_updates,
};
pub use message::{Decision, Label, LabelId, Message, MessageId, RuleAction, Tier, category};
pub use pipeline::{DecisionPipeline, PipelineOutcome};
pub use retry::RetryPolicy;
pub use rules::{CategoryRule, JsonRuleStore, RuleMatcher};
pub use service::{
    HistoryStore, InferenceService, MailService, MessagePage, RuleStore, RunHooks,
};
