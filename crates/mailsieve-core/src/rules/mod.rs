//! Local category rules: the authoritative, user-authored rule set.
//!
//! Rules are deterministic sender/domain/keyword predicates evaluated
//! in declaration order, ahead of the heuristic and model tiers. The
//! rule set is read-only during a run; it only changes through
//! explicitly approved suggestions producing a new snapshot.

mod matcher;
mod model;
mod store;

pub use matcher::RuleMatcher;
pub use model::CategoryRule;
pub use store::JsonRuleStore;
