//! # Undo/Redo Stack
//!
//! Tracks operation history and enables undo/redo.
//!
//! ## Design
//!
//! - Each entry keeps the applied operation, its result and its inverse
//! - Undo runs the inverses (newest first) and moves the batch to the redo stack
//! - Redo re-runs the original operations and records fresh inverses
//! - New operations clear the redo stack
//! - Supports batched operations (group multiple operations as one undo step)
//!
//! The stack only does bookkeeping. Running inverses back through the
//! manager pipeline (so undo is logged and broadcast like any edit) is the
//! manager's job; see [`crate::OperationManager::undo`].

use crate::operations::{ApplyResult, Operation};

/// One applied operation and how to take it back
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub operation: Operation,
    pub result: ApplyResult,
    pub inverse: Option<Operation>,
}

/// A group of operations that should be undone/redone together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationBatch {
    /// The entries in this batch (in application order)
    pub entries: Vec<HistoryEntry>,

    /// Optional description of this batch
    pub description: Option<String>,
}

impl OperationBatch {
    /// Create a single-operation batch
    pub fn single(entry: HistoryEntry) -> Self {
        Self {
            entries: vec![entry],
            description: None,
        }
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Inverses in undo order (newest first)
    pub fn inverses(&self) -> impl Iterator<Item = Option<&Operation>> {
        self.entries.iter().rev().map(|entry| entry.inverse.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Undo/redo stack for one edit session
#[derive(Debug)]
pub struct UndoStack {
    /// Stack of applied batches (most recent last)
    undo_stack: Vec<OperationBatch>,

    /// Stack of undone batches (most recent last)
    redo_stack: Vec<OperationBatch>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Currently building a batch
    current_batch: Option<OperationBatch>,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// Create an undo stack with custom max levels
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record a new edit
    pub fn record(&mut self, entry: HistoryEntry) {
        match &mut self.current_batch {
            Some(batch) => {
                batch.entries.push(entry);
                // New action invalidates future
                self.redo_stack.clear();
            }
            None => self.push_batch(OperationBatch::single(entry)),
        }
    }

    /// Start a batch of operations (will be undone/redone together)
    pub fn begin_batch(&mut self) {
        self.current_batch = Some(OperationBatch::default());
    }

    /// End the current batch and push to undo stack
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.is_empty() {
                self.push_batch(batch);
            }
        }
    }

    pub fn in_batch(&self) -> bool {
        self.current_batch.is_some()
    }

    /// Set description for current batch (if batching)
    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    /// Push a batch to the undo stack
    fn push_batch(&mut self, batch: OperationBatch) {
        self.push_undo(batch);

        // Clear redo stack (new action invalidates future)
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, batch: OperationBatch) {
        self.undo_stack.push(batch);

        // Trim if exceeded max levels
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Take the most recent batch for undoing. An open batch is closed first.
    pub fn take_undo(&mut self) -> Option<OperationBatch> {
        self.end_batch();
        self.undo_stack.pop()
    }

    /// Take the most recently undone batch for redoing
    pub fn take_redo(&mut self) -> Option<OperationBatch> {
        self.redo_stack.pop()
    }

    /// File a batch whose inverses were just applied
    pub fn push_undone(&mut self, batch: OperationBatch) {
        self.redo_stack.push(batch);
    }

    /// File a batch that was just redone, keeping the rest of the redo stack
    pub fn push_redone(&mut self, batch: OperationBatch) {
        self.push_undo(batch);
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.current_batch.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the number of undo levels available
    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of redo levels available
    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    /// Get description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }

    /// Get description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
