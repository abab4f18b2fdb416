//! Provider-native filter harvesting and bulk application.
//!
//! Phase 1 of a backlog run: the account's own filters are translated
//! into query + action descriptors and applied in bulk, so the
//! classification phase never re-processes mail the user already has
//! rules for.

mod apply;
mod model;
mod translate;

pub use apply::{FilterApplier, FilterOutcome, LabelCache};
pub use model::{FilterAction, FilterCriteria, FilterRule, FilterStats, ProviderFilter};
pub use translate::harvest_filters;
