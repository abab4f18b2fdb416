//! Collaborator contracts consumed by the engine.
//!
//! The engine never talks to a mail provider, inference server, or
//! store directly; callers inject implementations of these traits.
//! Authentication and transport setup are the implementor's problem.

use async_trait::async_trait;

use crate::error::Result;
use crate::filters::ProviderFilter;
use crate::learning::HistoryRecord;
use crate::message::{Label, LabelId, Message, MessageId};
use crate::rules::CategoryRule;

#[cfg(test)]
pub(crate) mod fake;

/// One page of a message listing.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    /// Message ids on this page.
    pub ids: Vec<MessageId>,
    /// Token for the next page, if any.
    pub next_page_token: Option<String>,
}

/// Mail provider operations the engine depends on.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Lists message ids matching a provider query, one page at a time.
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<MessagePage>;

    /// Fetches one message with headers, body text, and labels.
    async fn get_message(&self, id: &MessageId) -> Result<Message>;

    /// Adds and removes labels on a batch of messages.
    async fn batch_mutate(
        &self,
        ids: &[MessageId],
        add_labels: &[LabelId],
        remove_labels: &[LabelId],
    ) -> Result<()>;

    /// Lists the account's provider-native filters.
    async fn list_filters(&self) -> Result<Vec<ProviderFilter>>;

    /// Lists the account's labels.
    async fn list_labels(&self) -> Result<Vec<Label>>;
}

/// Text-completion backend used by the model tier.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Completes `prompt` and returns the generated text.
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Returns the loaded model id, or `None` if the server is idle.
    async fn health_probe(&self) -> Result<Option<String>>;
}

#[async_trait]
impl InferenceService for mailsieve_infer::InferClient {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        Ok(mailsieve_infer::InferClient::complete(self, prompt, max_tokens, temperature).await?)
    }

    async fn health_probe(&self) -> Result<Option<String>> {
        Ok(mailsieve_infer::InferClient::health_probe(self).await?)
    }
}

/// Source of the authoritative local rule set.
///
/// Atomic write-back is the store's responsibility.
pub trait RuleStore: Send + Sync {
    /// Loads all category rules. Unreadable rule files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself is unreachable.
    fn load_rules(&self) -> Result<Vec<CategoryRule>>;

    /// Replaces the stored rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn store_rules(&self, rules: &[CategoryRule]) -> Result<()>;
}

/// Persistence for the decision history.
pub trait HistoryStore: Send + Sync {
    /// Loads all retained history records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreadable.
    fn load_history(&self) -> Result<Vec<HistoryRecord>>;

    /// Appends records; the store enforces its own capacity bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append_history(&self, records: &[HistoryRecord]) -> Result<()>;
}

/// Caller-injected callbacks crossing the worker boundary.
///
/// All callbacks must be cheap and thread-safe; they are invoked from
/// the processing worker, never concurrently with themselves.
pub struct RunHooks {
    on_log: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_progress: Option<Box<dyn Fn(u64, u64) + Send + Sync>>,
    on_pause_check: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl RunHooks {
    /// Hooks that do nothing (progress still goes to tracing).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            on_log: None,
            on_progress: None,
            on_pause_check: None,
        }
    }

    /// Sets the log callback.
    #[must_use]
    pub fn with_log(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Box::new(f));
        self
    }

    /// Sets the progress callback, called after every sub-batch.
    #[must_use]
    pub fn with_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Sets the pause check, polled at sub-batch boundaries.
    #[must_use]
    pub fn with_pause_check(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.on_pause_check = Some(Box::new(f));
        self
    }

    pub(crate) fn log(&self, text: &str) {
        tracing::info!("{text}");
        if let Some(f) = &self.on_log {
            f(text);
        }
    }

    pub(crate) fn progress(&self, done: u64, total: u64) {
        if let Some(f) = &self.on_progress {
            f(done, total);
        }
    }

    pub(crate) fn pause_requested(&self) -> bool {
        self.on_pause_check.as_ref().is_some_and(|f| f())
    }
}

impl Default for RunHooks {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHooks")
            .field("on_log", &self.on_log.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_pause_check", &self.on_pause_check.is_some())
            .finish()
    }
}
