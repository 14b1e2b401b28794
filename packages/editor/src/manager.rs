//! # Operation Manager
//!
//! The single write path into the canonical model.
//!
//! ```text
//! descriptor ─► Operation ─► validate ─► authority ─► apply ─► history
//!                                            │                   │
//!                                       Rejected           log append
//!                                                                │
//!                                                   views ◄─ broadcast
//! ```
//!
//! Every step runs synchronously inside one call. Validation and apply
//! failures come back as [`ApplyOutcome::Failed`]; an authority conflict is
//! a distinct [`ApplyOutcome::Rejected`]. Log persistence failures are
//! handled inside the log and never fail the operation.

use crate::authority::{Authority, AuthorityArbitrator, AuthorityDecision};
use crate::clock::{Clock, SystemClock};
use crate::errors::{EditorError, EditorResult};
use crate::events::{EditorEvent, EventBus, RejectReason};
use crate::oplog::{LogRegistry, ReplayOutcome};
use crate::operations::{ApplyResult, ClientId, Operation, OperationDescriptor, OperationError};
use crate::projection::{View, ViewRegistry, ViewUpdate};
use crate::undo_stack::{HistoryEntry, OperationBatch, UndoStack};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};
use twodo_model::{CanonicalModel, DocumentId};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_CLIENT_ID: &str = "local";

/// An operation that made it all the way through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOperation {
    /// As logged, with its sequence filled in
    pub operation: Operation,
    pub result: ApplyResult,
    pub inverse: Option<Operation>,
    pub document_id: DocumentId,
    pub sequence: u64,
}

impl AppliedOperation {
    fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            operation: self.operation.clone(),
            result: self.result.clone(),
            inverse: self.inverse.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(AppliedOperation),
    Rejected {
        reason: RejectReason,
        document_id: DocumentId,
        authority: Authority,
    },
    Failed(OperationError),
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }

    pub fn applied(&self) -> Option<&AppliedOperation> {
        match self {
            ApplyOutcome::Applied(applied) => Some(applied),
            _ => None,
        }
    }

    pub fn into_result(self) -> EditorResult<AppliedOperation> {
        match self {
            ApplyOutcome::Applied(applied) => Ok(applied),
            ApplyOutcome::Rejected {
                document_id,
                authority,
                ..
            } => Err(EditorError::AuthorityConflict {
                document_id,
                authority,
            }),
            ApplyOutcome::Failed(e) => Err(e.into()),
        }
    }
}

/// Undo/redo replays an operation as a new edit
fn fresh(mut operation: Operation) -> Operation {
    operation.sequence = None;
    operation.timestamp = 0;
    operation.client_id.clear();
    operation
}

#[derive(Debug)]
pub struct OperationManager {
    arbitrator: Option<AuthorityArbitrator>,
    logs: LogRegistry,
    history: VecDeque<AppliedOperation>,
    history_limit: usize,
    undo: UndoStack,
    views: ViewRegistry,
    events: EventBus,
    clock: Arc<dyn Clock>,
    client_id: ClientId,
}

impl OperationManager {
    /// Manager without an arbitrator: every validated operation is accepted
    pub fn new(logs: LogRegistry, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            arbitrator: None,
            logs,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            undo: UndoStack::with_max_levels(DEFAULT_HISTORY_LIMIT),
            views: ViewRegistry::new(),
            events,
            clock,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(LogRegistry::in_memory(), EventBus::new(), Arc::new(SystemClock))
    }

    pub fn with_arbitrator(mut self, arbitrator: AuthorityArbitrator) -> Self {
        self.arbitrator = Some(arbitrator);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Bounds both the history and the undo levels
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self.undo = UndoStack::with_max_levels(self.history_limit);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn arbitrator(&self) -> Option<&AuthorityArbitrator> {
        self.arbitrator.as_ref()
    }

    pub fn arbitrator_mut(&mut self) -> Option<&mut AuthorityArbitrator> {
        self.arbitrator.as_mut()
    }

    pub fn logs(&self) -> &LogRegistry {
        &self.logs
    }

    pub fn logs_mut(&mut self) -> &mut LogRegistry {
        &mut self.logs
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn register_view(&mut self, model: &CanonicalModel, view: Box<dyn View>) {
        self.views.register(model, view);
    }

    /// Unregister a view and release any authority it held over its document
    pub fn destroy_view(&mut self, view_id: &str) -> EditorResult<()> {
        let document_id = self.views.destroy(view_id)?;
        if let Some(arbitrator) = &mut self.arbitrator {
            arbitrator.clear_view(&document_id, view_id);
        }
        Ok(())
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// Run an operation through the full pipeline
    pub fn apply_operation(&mut self, model: &mut CanonicalModel, operation: Operation) -> ApplyOutcome {
        self.run(model, operation, None, true)
    }

    /// Same as [`Self::apply_operation`], authorized against one view's authority
    pub fn apply_from_view(
        &mut self,
        model: &mut CanonicalModel,
        operation: Operation,
        view_id: &str,
    ) -> ApplyOutcome {
        self.run(model, operation, Some(view_id), true)
    }

    /// Materialize a plain descriptor, then apply it
    pub fn apply_descriptor(
        &mut self,
        model: &mut CanonicalModel,
        descriptor: &OperationDescriptor,
    ) -> ApplyOutcome {
        match Operation::from_descriptor(descriptor) {
            Ok(operation) => self.apply_operation(model, operation),
            Err(e) => {
                warn!(op = %descriptor.op, item_id = %descriptor.item_id, error = %e, "Malformed operation");
                ApplyOutcome::Failed(e)
            }
        }
    }

    fn run(
        &mut self,
        model: &mut CanonicalModel,
        operation: Operation,
        view_id: Option<&str>,
        record_undo: bool,
    ) -> ApplyOutcome {
        let operation = operation.stamped(&self.client_id, self.clock.timestamp_millis());

        if let Err(e) = operation.validate(model) {
            warn!(op = operation.op_type(), item_id = %operation.item_id, error = %e, "Operation failed validation");
            return ApplyOutcome::Failed(e);
        }

        let Some(document_id) = operation.resolve_document(model) else {
            return ApplyOutcome::Failed(OperationError::ItemNotFound(operation.item_id.clone()));
        };

        if let Some(arbitrator) = &self.arbitrator {
            if let AuthorityDecision::Rejected { authority } =
                arbitrator.validate_operation(&operation, &document_id, view_id)
            {
                let reason = RejectReason::AuthorityConflict;
                self.events.emit(EditorEvent::OperationRejected {
                    operation,
                    reason,
                    document_id: document_id.clone(),
                });
                return ApplyOutcome::Rejected {
                    reason,
                    document_id,
                    authority,
                };
            }
        }

        let result = match operation.apply(model) {
            Ok(result) => result,
            Err(e) => {
                warn!(op = operation.op_type(), item_id = %operation.item_id, error = %e, "Operation failed to apply");
                return ApplyOutcome::Failed(e);
            }
        };
        let inverse = operation.invert(&result);

        let sequence = self.logs.log_mut(&document_id).append(operation.clone());
        let mut operation = operation;
        operation.sequence = Some(sequence);

        let applied = AppliedOperation {
            operation,
            result,
            inverse,
            document_id,
            sequence,
        };

        self.history.push_back(applied.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        if record_undo {
            self.undo.record(applied.history_entry());
        }

        self.notify(model, &applied);

        debug!(
            op = applied.operation.op_type(),
            item_id = %applied.operation.item_id,
            document_id = %applied.document_id,
            sequence,
            "Operation applied"
        );
        ApplyOutcome::Applied(applied)
    }

    fn notify(&mut self, model: &CanonicalModel, applied: &AppliedOperation) -> Vec<(String, ViewUpdate)> {
        let updates = self.views.dispatch(model, applied, self.arbitrator.as_ref());
        self.events.emit(EditorEvent::OperationApplied {
            operation: applied.operation.clone(),
            sequence: applied.sequence,
            result: applied.result.clone(),
            document_id: applied.document_id.clone(),
        });
        updates
    }

    /// Group the following edits into one undo step
    pub fn begin_batch(&mut self, description: Option<&str>) {
        self.undo.begin_batch();
        if let Some(description) = description {
            self.undo.set_batch_description(description);
        }
    }

    pub fn end_batch(&mut self) {
        self.undo.end_batch();
    }

    /// Undo the most recent step by running its inverses through the pipeline.
    ///
    /// Returns the applied inverses; empty when there is nothing to undo.
    pub fn undo(&mut self, model: &mut CanonicalModel) -> EditorResult<Vec<AppliedOperation>> {
        let Some(batch) = self.undo.take_undo() else {
            return Ok(Vec::new());
        };

        let mut applied = Vec::new();
        for index in (0..batch.entries.len()).rev() {
            let entry = &batch.entries[index];
            let step = match &entry.inverse {
                Some(inverse) => self.run(model, fresh(inverse.clone()), None, false).into_result(),
                None => Err(EditorError::NotInvertible(entry.operation.op_type().to_string())),
            };

            match step {
                Ok(done) => applied.push(done),
                Err(e) => {
                    warn!(error = %e, "Undo stopped part way");
                    self.undo.push_redone(OperationBatch {
                        entries: batch.entries[..=index].to_vec(),
                        description: batch.description.clone(),
                    });
                    if index + 1 < batch.entries.len() {
                        self.undo.push_undone(OperationBatch {
                            entries: batch.entries[index + 1..].to_vec(),
                            description: batch.description.clone(),
                        });
                    }
                    return Err(e);
                }
            }
        }

        self.undo.push_undone(batch);
        Ok(applied)
    }

    /// Re-apply the most recently undone step, recording fresh inverses
    pub fn redo(&mut self, model: &mut CanonicalModel) -> EditorResult<Vec<AppliedOperation>> {
        let Some(batch) = self.undo.take_redo() else {
            return Ok(Vec::new());
        };

        let mut applied: Vec<AppliedOperation> = Vec::new();
        for (index, entry) in batch.entries.iter().enumerate() {
            match self.run(model, fresh(entry.operation.clone()), None, false).into_result() {
                Ok(done) => applied.push(done),
                Err(e) => {
                    warn!(error = %e, "Redo stopped part way");
                    if !applied.is_empty() {
                        self.undo.push_redone(OperationBatch {
                            entries: applied.iter().map(AppliedOperation::history_entry).collect(),
                            description: batch.description.clone(),
                        });
                    }
                    self.undo.push_undone(OperationBatch {
                        entries: batch.entries[index..].to_vec(),
                        description: batch.description.clone(),
                    });
                    return Err(e);
                }
            }
        }

        self.undo.push_redone(OperationBatch {
            entries: applied.iter().map(AppliedOperation::history_entry).collect(),
            description: batch.description,
        });
        Ok(applied)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Most recent applied operations, oldest first
    pub fn get_history(&self, limit: Option<usize>) -> Vec<&AppliedOperation> {
        let skip = limit.map_or(0, |limit| self.history.len().saturating_sub(limit));
        self.history.iter().skip(skip).collect()
    }

    pub fn get_last_operation(&self) -> Option<&AppliedOperation> {
        self.history.back()
    }

    /// Forget in-memory history and undo levels; the log is untouched
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.undo.clear();
    }

    /// Re-apply logged entries of a document, without logging them again
    pub fn replay_log(
        &mut self,
        model: &mut CanonicalModel,
        document_id: &str,
        from: u64,
        to: Option<u64>,
    ) -> Vec<ReplayOutcome> {
        self.logs
            .log_mut(document_id)
            .replay(from, to, |op| op.apply(model))
    }

    /// Apply remote log entries this replica has not seen, notifying views
    /// and listeners for each one that lands
    pub fn merge_remote(
        &mut self,
        model: &mut CanonicalModel,
        document_id: &str,
        entries: Vec<Operation>,
    ) -> Vec<ReplayOutcome> {
        let views = &mut self.views;
        let events = &self.events;
        let arbitrator = self.arbitrator.as_ref();

        self.logs.log_mut(document_id).merge_remote(entries, |op| {
            let result = op.apply(model)?;
            let applied = AppliedOperation {
                operation: op.clone(),
                inverse: op.invert(&result),
                result: result.clone(),
                document_id: document_id.to_string(),
                sequence: op.sequence.unwrap_or_default(),
            };
            views.dispatch(model, &applied, arbitrator);
            events.emit(EditorEvent::OperationApplied {
                operation: applied.operation,
                sequence: applied.sequence,
                result: applied.result,
                document_id: applied.document_id,
            });
            Ok(result)
        })
    }
}

impl Default for OperationManager {
    fn default() -> Self {
        Self::in_memory()
    }
}
