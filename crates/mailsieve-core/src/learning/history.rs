//! Bounded decision history and its file-backed store.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::message::{Decision, Message};
use crate::service::HistoryStore;

use super::model::HistoryRecord;

/// In-memory ring buffer of past decisions.
///
/// Appending beyond capacity evicts the oldest record; the count never
/// exceeds the configured capacity.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl HistoryLog {
    /// Creates an empty log with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Creates a log from stored records, keeping only the newest.
    #[must_use]
    pub fn from_records(records: Vec<HistoryRecord>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        for record in records {
            log.push(record);
        }
        log
    }

    /// Records a decision with an optional user override.
    ///
    /// Returns the appended record.
    pub fn record(
        &mut self,
        message: &Message,
        decision: &Decision,
        user_override: Option<String>,
        subject_max_chars: usize,
    ) -> HistoryRecord {
        let record =
            HistoryRecord::from_decision(message, decision, user_override, subject_max_chars);
        self.push(record.clone());
        record
    }

    /// Appends a record, evicting the oldest on overflow.
    pub fn push(&mut self, record: HistoryRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copies the retained records out, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }
}

/// History store over a single JSON file.
///
/// The file holds a JSON array of records, oldest first, truncated to
/// the capacity bound on every write.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
    capacity: usize,
}

impl JsonHistoryStore {
    /// Creates a store at the given path with a capacity bound.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load_history(&self) -> Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn append_history(&self, records: &[HistoryRecord]) -> Result<()> {
        let mut all = self.load_history()?;
        all.extend_from_slice(records);
        if all.len() > self.capacity {
            all.drain(..all.len() - self.capacity);
        }
        let text = serde_json::to_string(&all)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, text)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::message::Tier;

    fn record(n: usize) -> HistoryRecord {
        HistoryRecord {
            subject: format!("subject {n}"),
            sender: "a@b.com".to_string(),
            category: "JUNK".to_string(),
            tier: Tier::Model,
            confidence: 0.5,
            user_override: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut log = HistoryLog::new(5);
        for n in 0..50 {
            log.push(record(n));
            assert!(log.len() <= 5);
        }
        assert_eq!(log.len(), 5);
        // Oldest evicted first.
        assert_eq!(log.snapshot()[0].subject, "subject 45");
    }

    #[test]
    fn test_from_records_truncates_to_newest() {
        let records: Vec<HistoryRecord> = (0..10).map(record).collect();
        let log = HistoryLog::from_records(records, 3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.snapshot()[0].subject, "subject 7");
    }

    #[test]
    fn test_store_roundtrip_and_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"), 4);

        store
            .append_history(&(0..3).map(record).collect::<Vec<_>>())
            .unwrap();
        store
            .append_history(&(3..6).map(record).collect::<Vec<_>>())
            .unwrap();

        let loaded = store.load_history().unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[0].subject, "subject 2");
        assert_eq!(loaded[3].subject, "subject 5");
    }

    #[test]
    fn test_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("none.json"), 10);
        assert!(store.load_history().unwrap().is_empty());
    }
}
