//! Decision history and rule-suggestion mining.
//!
//! Every decision (plus any user correction) lands in a bounded
//! history. Mining the history yields advisory suggestions; applying
//! one is a separate, explicitly human-gated operation that produces a
//! new rule snapshot.

mod history;
mod mining;
mod model;

pub use history::{HistoryLog, JsonHistoryStore};
pub use mining::{apply_suggestion, detect_new_patterns, pattern_hints, suggest_rule_updates};
pub use model::{HistoryRecord, Suggestion, SuggestionKind};
