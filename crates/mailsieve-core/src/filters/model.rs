//! Filter data models.

/// A provider-native filter as returned by the mail service.
#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    /// Provider-assigned filter id.
    pub id: String,
    /// Match criteria, AND-combined.
    pub criteria: FilterCriteria,
    /// What the filter does to matching mail.
    pub action: FilterAction,
}

/// Match criteria of a provider filter.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Sender address or fragment.
    pub from: Option<String>,
    /// Subject substring.
    pub subject: Option<String>,
    /// Free-form has-the-words query.
    pub query: Option<String>,
}

/// Actions of a provider filter, expressed as label names.
#[derive(Debug, Clone, Default)]
pub struct FilterAction {
    /// Label names the filter adds.
    pub add_labels: Vec<String>,
    /// Label names the filter removes (archiving removes `INBOX`).
    pub remove_labels: Vec<String>,
    /// Whether the filter marks matches as spam.
    pub mark_spam: bool,
}

/// A translated filter: one search query plus label mutations.
#[derive(Debug, Clone)]
pub struct FilterRule {
    /// Originating provider filter id.
    pub id: String,
    /// Provider search query built from the criteria.
    pub query: String,
    /// Label names to add to matches.
    pub add_labels: Vec<String>,
    /// Label names to remove from matches.
    pub remove_labels: Vec<String>,
}

/// Per-filter application statistics.
#[derive(Debug, Clone)]
pub struct FilterStats {
    /// Provider filter id.
    pub id: String,
    /// The query that was searched.
    pub query: String,
    /// Messages matched by the search.
    pub matched: u64,
    /// Messages successfully mutated.
    pub mutated: u64,
    /// Mutation chunks that failed after retries.
    pub failed_chunks: u32,
    /// Error that made this filter skip entirely, if any.
    pub error: Option<String>,
}
