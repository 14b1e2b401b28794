//! # Event Bus
//!
//! Notifications emitted by the manager and the arbitrator.
//!
//! Synchronous listeners registered with [`EventBus::subscribe`] run before
//! `emit` returns. Asynchronous consumers call [`EventBus::watch`] and read
//! from a `tokio` broadcast receiver; lagging receivers lose the oldest
//! events, never the newest.

use crate::authority::Authority;
use crate::operations::{ApplyResult, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use twodo_model::{Document, DocumentId};

pub type ViewId = String;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Why an operation was turned away before touching the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AuthorityConflict,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::AuthorityConflict => "authority_conflict",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditorEvent {
    #[serde(rename = "operation:applied", rename_all = "camelCase")]
    OperationApplied {
        operation: Operation,
        sequence: u64,
        result: ApplyResult,
        document_id: DocumentId,
    },

    #[serde(rename = "operation:rejected", rename_all = "camelCase")]
    OperationRejected {
        operation: Operation,
        reason: RejectReason,
        document_id: DocumentId,
    },

    #[serde(rename = "authority:mode_changed", rename_all = "camelCase")]
    AuthorityModeChanged {
        document_id: DocumentId,
        view_id: ViewId,
        old_mode: Authority,
        new_mode: Authority,
    },

    #[serde(rename = "authority:drift_detected", rename_all = "camelCase")]
    DriftDetected {
        document_id: DocumentId,
        view_id: ViewId,
        authority: Authority,
        source_text: String,
        canonical_model: Option<Document>,
    },
}

impl EditorEvent {
    /// Wire name, as found in the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            EditorEvent::OperationApplied { .. } => "operation:applied",
            EditorEvent::OperationRejected { .. } => "operation:rejected",
            EditorEvent::AuthorityModeChanged { .. } => "authority:mode_changed",
            EditorEvent::DriftDetected { .. } => "authority:drift_detected",
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            EditorEvent::OperationApplied { document_id, .. }
            | EditorEvent::OperationRejected { document_id, .. }
            | EditorEvent::AuthorityModeChanged { document_id, .. }
            | EditorEvent::DriftDetected { document_id, .. } => document_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&EditorEvent) + Send + Sync>;

struct BusInner {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<EditorEvent>,
}

/// Cloneable handle; clones share listeners and channel
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                sender,
            }),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EditorEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver for asynchronous consumers
    pub fn watch(&self) -> broadcast::Receiver<EditorEvent> {
        self.inner.sender.subscribe()
    }

    pub fn emit(&self, event: EditorEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        tracing::trace!(event = event.name(), listeners = listeners.len(), "Emitting event");
        for listener in listeners {
            listener(&event);
        }

        // No receivers is not an error
        let _ = self.inner.sender.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.inner.sender.receiver_count())
            .finish()
    }
}
