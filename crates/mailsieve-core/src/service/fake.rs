//! In-memory collaborator fakes for tests.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::filters::ProviderFilter;
use crate::learning::HistoryRecord;
use crate::message::{Label, LabelId, Message, MessageId};
use crate::service::{HistoryStore, InferenceService, MailService, MessagePage};

/// One recorded `batch_mutate` call.
#[derive(Debug, Clone)]
pub struct MutateCall {
    pub ids: Vec<MessageId>,
    pub add: Vec<LabelId>,
    pub remove: Vec<LabelId>,
}

/// In-memory mail service with a tiny query interpreter.
///
/// Supports the query forms the engine generates: `is:unread`,
/// `in:inbox`, `from:`, `subject:` (quoted or bare), `label:`,
/// `-label:`, and bare words matched against subject/body.
#[derive(Default)]
pub struct FakeMailService {
    pub messages: Mutex<BTreeMap<String, Message>>,
    pub labels: Mutex<Vec<Label>>,
    pub filters: Mutex<Vec<ProviderFilter>>,
    pub mutations: Mutex<Vec<MutateCall>>,
    /// Fetch calls seen by `get_message`.
    pub fetched: Mutex<Vec<MessageId>>,
    /// Stable listing snapshot per query, like a real provider cursor.
    listings: Mutex<BTreeMap<String, Vec<MessageId>>>,
    /// Next N `list_messages` calls fail with a transient error.
    pub fail_next_lists: Mutex<u32>,
    /// Next N `batch_mutate` calls fail with a transient error.
    pub fail_next_mutates: Mutex<u32>,
    /// All `list_messages` calls fail with an auth error.
    pub auth_broken: Mutex<bool>,
}

impl FakeMailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.labels.lock().unwrap().push(Label {
            id: LabelId::new(id),
            name: name.to_string(),
        });
    }

    pub fn add_message(&self, msg: Message) {
        self.messages.lock().unwrap().insert(msg.id.0.clone(), msg);
    }

    /// Convenience constructor for an unread inbox message.
    pub fn seed_message(&self, id: &str, from: &str, subject: &str, body: &str) {
        self.add_message(Message {
            id: MessageId::new(id),
            subject: subject.to_string(),
            from: from.to_string(),
            date: "2026-01-01".to_string(),
            body: body.to_string(),
            labels: vec!["INBOX".to_string(), "UNREAD".to_string()],
            unread: true,
        });
    }

    pub fn labels_of(&self, id: &str) -> Vec<String> {
        self.messages.lock().unwrap()[id].labels.clone()
    }

    fn matches(msg: &Message, query: &str) -> bool {
        for term in split_query(query) {
            let ok = if let Some(rest) = term.strip_prefix("-label:") {
                !msg.labels.iter().any(|l| l.eq_ignore_ascii_case(rest))
            } else if let Some(rest) = term.strip_prefix("label:") {
                msg.labels.iter().any(|l| l.eq_ignore_ascii_case(rest))
            } else if term == "is:unread" {
                msg.unread
            } else if term == "in:inbox" {
                msg.labels.iter().any(|l| l == "INBOX")
            } else if let Some(rest) = term.strip_prefix("from:") {
                msg.sender_address().contains(&rest.to_lowercase())
            } else if let Some(rest) = term.strip_prefix("subject:") {
                msg.subject.to_lowercase().contains(&rest.to_lowercase())
            } else {
                let needle = term.to_lowercase();
                msg.subject.to_lowercase().contains(&needle)
                    || msg.body.to_lowercase().contains(&needle)
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Splits a query into terms, keeping quoted phrases together.
fn split_query(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in query.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

#[async_trait]
impl MailService for FakeMailService {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<MessagePage> {
        if *self.auth_broken.lock().unwrap() {
            return Err(Error::Auth("token expired".into()));
        }
        {
            let mut failures = self.fail_next_lists.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Transient("listing unavailable".into()));
            }
        }

        // Cursors are stable: the first listing of a query snapshots
        // its result set, and every page (and re-fetch of a page) is
        // served from that snapshot. Mutations made while paging do
        // not shift the cursor, matching provider pagination.
        let matching: Vec<MessageId> = {
            let mut listings = self.listings.lock().unwrap();
            listings
                .entry(query.to_string())
                .or_insert_with(|| {
                    self.messages
                        .lock()
                        .unwrap()
                        .values()
                        .filter(|m| Self::matches(m, query))
                        .map(|m| m.id.clone())
                        .collect()
                })
                .clone()
        };

        let offset: usize = page_token.map_or(0, |t| t.parse().unwrap_or(0));
        let end = (offset + max_results as usize).min(matching.len());
        let next_page_token = (end < matching.len()).then(|| end.to_string());
        Ok(MessagePage {
            ids: matching[offset..end].to_vec(),
            next_page_token,
        })
    }

    async fn get_message(&self, id: &MessageId) -> Result<Message> {
        self.fetched.lock().unwrap().push(id.clone());
        self.messages
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::Transient(format!("no such message: {id}")))
    }

    async fn batch_mutate(
        &self,
        ids: &[MessageId],
        add_labels: &[LabelId],
        remove_labels: &[LabelId],
    ) -> Result<()> {
        {
            let mut failures = self.fail_next_mutates.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Transient("mutation unavailable".into()));
            }
        }
        self.mutations.lock().unwrap().push(MutateCall {
            ids: ids.to_vec(),
            add: add_labels.to_vec(),
            remove: remove_labels.to_vec(),
        });

        let label_names: BTreeMap<String, String> = self
            .labels
            .lock()
            .unwrap()
            .iter()
            .map(|l| (l.id.0.clone(), l.name.clone()))
            .collect();
        let mut messages = self.messages.lock().unwrap();
        for id in ids {
            if let Some(msg) = messages.get_mut(&id.0) {
                for add in add_labels {
                    if let Some(name) = label_names.get(&add.0)
                        && !msg.labels.contains(name)
                    {
                        msg.labels.push(name.clone());
                    }
                }
                for remove in remove_labels {
                    if let Some(name) = label_names.get(&remove.0) {
                        msg.labels.retain(|l| l != name);
                    }
                }
            }
        }
        Ok(())
    }

    async fn list_filters(&self) -> Result<Vec<ProviderFilter>> {
        Ok(self.filters.lock().unwrap().clone())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        Ok(self.labels.lock().unwrap().clone())
    }
}

/// Inference fake that replays queued responses.
#[derive(Default)]
pub struct FakeInference {
    pub responses: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, err: Error) {
        self.responses.lock().unwrap().push_back(Err(err));
    }
}

#[async_trait]
impl InferenceService for FakeInference {
    async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(r#"{"action":"REVIEW","confidence":0.0}"#.to_string()))
    }

    async fn health_probe(&self) -> Result<Option<String>> {
        Ok(Some("fake-model".to_string()))
    }
}

/// History store that keeps appended records in memory.
#[derive(Default)]
pub struct MemoryHistoryStore {
    pub records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load_history(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    fn append_history(&self, records: &[HistoryRecord]) -> Result<()> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}
