//! # Operation Log
//!
//! Durable, per-document, monotonically sequenced record of applied
//! operations.
//!
//! ## Persistence
//!
//! Each log lives under `operation_log_<documentKey>` in a
//! [`KeyValueStore`] with the shape `{ operations, lastSequence }` and is
//! written synchronously after every append. When a write fails the log
//! compacts itself to half its retention and retries once; a second
//! failure is recorded in [`OperationLog::last_error`] and logged, but the
//! in-memory entry is kept.
//!
//! A persisted log that cannot be read is never overwritten. The registry
//! either reports the failure ([`LogRegistry::open_log`]) or hands out a
//! detached log that keeps entries in memory only.
//!
//! ## Garbage collection
//!
//! Only the newest `retention` entries are kept. GC never lowers
//! `last_sequence` and never reorders entries.

use crate::errors::EditorResult;
use crate::operations::{ApplyResult, Operation, OperationError};
use crate::storage::{KeyValueStore, MemoryStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const LOG_KEY_PREFIX: &str = "operation_log_";
pub const DEFAULT_RETENTION: usize = 1000;
pub const DEFAULT_CATCH_UP_WINDOW: usize = 100;

/// Storage key for a document's log
pub fn log_key(document_key: &str) -> String {
    format!("{}{}", LOG_KEY_PREFIX, document_key)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLog {
    #[serde(default)]
    operations: Vec<Operation>,

    #[serde(default)]
    last_sequence: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLogRef<'a> {
    operations: &'a [Operation],
    last_sequence: u64,
}

/// Outcome of re-applying one logged entry
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub sequence: u64,
    pub result: Result<ApplyResult, OperationError>,
}

impl ReplayOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn sequence_of(op: &Operation) -> u64 {
    op.sequence.unwrap_or(0)
}

#[derive(Debug)]
pub struct OperationLog {
    document_key: String,
    operations: Vec<Operation>,
    last_sequence: u64,
    retention: usize,
    store: Arc<dyn KeyValueStore>,
    last_error: Option<String>,
    detached: bool,
}

impl OperationLog {
    /// Empty log; nothing is read from the store
    pub fn new(document_key: impl Into<String>, store: Arc<dyn KeyValueStore>, retention: usize) -> Self {
        Self {
            document_key: document_key.into(),
            operations: Vec::new(),
            last_sequence: 0,
            retention: retention.max(1),
            store,
            last_error: None,
            detached: false,
        }
    }

    /// In-memory log standing in for a persisted one that could not be read
    fn detached(
        document_key: &str,
        store: Arc<dyn KeyValueStore>,
        retention: usize,
        reason: String,
    ) -> Self {
        let mut log = Self::new(document_key, store, retention);
        log.detached = true;
        log.last_error = Some(reason);
        log
    }

    /// Restore a persisted log, or start empty when none exists
    pub fn open(
        document_key: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        retention: usize,
    ) -> EditorResult<Self> {
        let mut log = Self::new(document_key, store, retention);
        if let Some(raw) = log.store.get(&log.key())? {
            let persisted: PersistedLog = serde_json::from_str(&raw)?;
            log.operations = persisted.operations;
            log.operations.sort_by_key(sequence_of);
            let highest = log.operations.last().map(sequence_of).unwrap_or(0);
            log.last_sequence = persisted.last_sequence.max(highest);

            debug!(
                key = %log.key(),
                entries = log.operations.len(),
                last_sequence = log.last_sequence,
                "Restored operation log"
            );
        }
        Ok(log)
    }

    pub fn in_memory(document_key: impl Into<String>) -> Self {
        Self::new(document_key, Arc::new(MemoryStore::new()), DEFAULT_RETENTION)
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    pub fn key(&self) -> String {
        log_key(&self.document_key)
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Most recent persistence failure, cleared by the next successful write
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True when nothing this log records will reach the store
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Record an applied operation. Returns its sequence number.
    pub fn append(&mut self, mut operation: Operation) -> u64 {
        self.last_sequence += 1;
        let sequence = self.last_sequence;
        operation.sequence = Some(sequence);
        self.operations.push(operation);

        self.compact(self.retention);
        self.persist_with_recovery();
        sequence
    }

    /// Entries with a sequence strictly greater than `since`
    pub fn get_operations(&self, since: u64) -> &[Operation] {
        let start = self.operations.partition_point(|op| sequence_of(op) <= since);
        &self.operations[start..]
    }

    /// The newest `window` entries, for a client joining late
    pub fn catch_up(&self, window: usize) -> &[Operation] {
        let start = self.operations.len().saturating_sub(window);
        &self.operations[start..]
    }

    /// Re-apply entries with `from <= sequence <= to` in ascending order.
    ///
    /// A failing entry is reported in its outcome; replay carries on.
    pub fn replay<F>(&self, from: u64, to: Option<u64>, mut apply: F) -> Vec<ReplayOutcome>
    where
        F: FnMut(&Operation) -> Result<ApplyResult, OperationError>,
    {
        let upper = to.unwrap_or(u64::MAX);
        self.operations
            .iter()
            .filter(|op| (from..=upper).contains(&sequence_of(op)))
            .map(|op| {
                let result = apply(op);
                if let Err(e) = &result {
                    warn!(sequence = sequence_of(op), error = %e, "Replay of entry failed");
                }
                ReplayOutcome {
                    sequence: sequence_of(op),
                    result,
                }
            })
            .collect()
    }

    /// Apply entries from another replica that this log has not seen yet.
    ///
    /// Entries are processed in ascending sequence order; anything at or
    /// below `last_sequence` is skipped. Successful entries are recorded
    /// with their original sequence.
    pub fn merge_remote<F>(&mut self, mut entries: Vec<Operation>, mut apply: F) -> Vec<ReplayOutcome>
    where
        F: FnMut(&Operation) -> Result<ApplyResult, OperationError>,
    {
        entries.sort_by_key(sequence_of);

        let mut outcomes = Vec::new();
        for entry in entries {
            let Some(sequence) = entry.sequence else {
                warn!(item_id = %entry.item_id, "Remote entry without sequence ignored");
                continue;
            };
            if sequence <= self.last_sequence {
                continue;
            }

            let result = apply(&entry);
            self.last_sequence = sequence;
            if result.is_ok() {
                self.operations.push(entry);
            }
            outcomes.push(ReplayOutcome { sequence, result });
        }

        if !outcomes.is_empty() {
            debug!(key = %self.key(), merged = outcomes.len(), "Merged remote entries");
            self.compact(self.retention);
            self.persist_with_recovery();
        }
        outcomes
    }

    /// Drop all entries; the sequence counter keeps counting
    pub fn clear(&mut self) {
        self.operations.clear();
        self.persist_with_recovery();
    }

    /// Keep only the newest `keep` entries and persist. Returns how many were dropped.
    pub fn gc(&mut self, keep: usize) -> usize {
        let dropped = self.compact(keep);
        if dropped > 0 {
            self.persist_with_recovery();
        }
        dropped
    }

    fn compact(&mut self, keep: usize) -> usize {
        let excess = self.operations.len().saturating_sub(keep);
        if excess > 0 {
            self.operations.drain(..excess);
            debug!(key = %self.key(), dropped = excess, kept = keep, "Operation log compacted");
        }
        excess
    }

    fn persist(&self) -> StorageResult<()> {
        let snapshot = serde_json::to_string(&PersistedLogRef {
            operations: &self.operations,
            last_sequence: self.last_sequence,
        })?;
        self.store.set(&self.key(), &snapshot)
    }

    fn persist_with_recovery(&mut self) {
        if self.detached {
            return;
        }
        let Err(first) = self.persist() else {
            self.last_error = None;
            return;
        };

        let keep = (self.retention / 2).max(1);
        warn!(key = %self.key(), error = %first, keep, "Persisting operation log failed, compacting");
        self.compact(keep);

        match self.persist() {
            Ok(()) => self.last_error = None,
            Err(e) => {
                warn!(key = %self.key(), error = %e, "Operation log not persisted");
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// Opens logs on demand, one per document key, over a shared store
#[derive(Debug)]
pub struct LogRegistry {
    store: Arc<dyn KeyValueStore>,
    retention: usize,
    logs: HashMap<String, OperationLog>,
}

impl LogRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, retention: usize) -> Self {
        Self {
            store,
            retention,
            logs: HashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_RETENTION)
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Existing log for the key, restoring it on first use. Fails when a
    /// persisted log exists but cannot be read.
    pub fn open_log(&mut self, document_key: &str) -> EditorResult<&mut OperationLog> {
        match self.logs.entry(document_key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let log = OperationLog::open(document_key, Arc::clone(&self.store), self.retention)?;
                Ok(entry.insert(log))
            }
        }
    }

    /// Like [`Self::open_log`], but an unreadable persisted log yields a
    /// detached log instead of an error
    pub fn log_mut(&mut self, document_key: &str) -> &mut OperationLog {
        match self.logs.entry(document_key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let store = Arc::clone(&self.store);
                let log = OperationLog::open(document_key, Arc::clone(&store), self.retention)
                    .unwrap_or_else(|e| {
                        error!(document_key, error = %e, "Persisted log unreadable, new entries stay in memory");
                        OperationLog::detached(document_key, store, self.retention, e.to_string())
                    });
                entry.insert(log)
            }
        }
    }

    /// Log for the key if it has been opened
    pub fn log(&self, document_key: &str) -> Option<&OperationLog> {
        self.logs.get(document_key)
    }

    pub fn document_keys(&self) -> impl Iterator<Item = &str> {
        self.logs.keys().map(String::as_str)
    }
}

impl Default for LogRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}
