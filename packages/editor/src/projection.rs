//! # View Projection Protocol
//!
//! Views are read-only consumers of the canonical model. They only ever
//! see `&CanonicalModel`, so they cannot write to it.
//!
//! On every applied operation the [`ViewRegistry`] walks its views and, per
//! view:
//!
//! 1. skips the operation if it echoes the view's own authoritative source
//!    (the view produced it, re-rendering would fight the author),
//! 2. skips it if it is not relevant to the view,
//! 3. tries an incremental [`Projection::apply_operation`],
//! 4. falls back to a full [`Projection::project`].
//!
//! The rendered output is pushed to the view's sink.

use crate::authority::AuthorityArbitrator;
use crate::errors::{EditorError, EditorResult};
use crate::events::ViewId;
use crate::manager::AppliedOperation;
use crate::operations::{ApplyResult, OperationKind};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};
use twodo_model::{tree, CanonicalModel, DocumentId, ItemId};

/// Pure mapping from the canonical model to a view representation
pub trait Projection: Send {
    type Output: Send;

    /// Full projection of one document
    fn project(&self, model: &CanonicalModel, document_id: &str) -> Self::Output;

    /// Patch `current` in place. Returns false when the operation needs a
    /// full projection instead.
    fn apply_operation(
        &mut self,
        _current: &mut Self::Output,
        _applied: &AppliedOperation,
        _model: &CanonicalModel,
    ) -> bool {
        false
    }

    /// Default: the operation belongs to the view's document
    fn is_operation_relevant(&self, applied: &AppliedOperation, document_id: &str) -> bool {
        applied.document_id == document_id
    }
}

/// Object-safe surface the registry drives
pub trait View: Send {
    fn id(&self) -> &str;
    fn document_id(&self) -> &str;
    fn init(&mut self, model: &CanonicalModel);
    fn is_operation_relevant(&self, applied: &AppliedOperation) -> bool;
    /// Incremental update, else full projection
    fn update(&mut self, model: &CanonicalModel, applied: &AppliedOperation) -> ViewUpdate;
    fn destroy(&mut self);
}

/// What a view did with one applied operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    SkippedEcho,
    Irrelevant,
    Incremental,
    Refreshed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    pub incremental: usize,
    pub refreshed: usize,
}

pub type Sink<T> = Box<dyn FnMut(&T) + Send>;
pub type RelevanceFilter = Box<dyn Fn(&AppliedOperation) -> bool + Send>;

/// A [`Projection`] bound to a document and a sink
pub struct ProjectedView<P: Projection> {
    id: ViewId,
    document_id: DocumentId,
    projection: P,
    sink: Option<Sink<P::Output>>,
    filter: Option<RelevanceFilter>,
    current: Option<P::Output>,
    stats: ViewStats,
}

impl<P: Projection> ProjectedView<P> {
    pub fn new(id: impl Into<ViewId>, document_id: impl Into<DocumentId>, projection: P) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            projection,
            sink: None,
            filter: None,
            current: None,
            stats: ViewStats::default(),
        }
    }

    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&P::Output) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replace the document-membership check
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&AppliedOperation) -> bool + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn current(&self) -> Option<&P::Output> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> ViewStats {
        self.stats
    }

    fn refresh(&mut self, model: &CanonicalModel) {
        let output = self.projection.project(model, &self.document_id);
        self.stats.refreshed += 1;
        self.publish(output);
    }

    fn publish(&mut self, output: P::Output) {
        if let Some(sink) = &mut self.sink {
            sink(&output);
        }
        self.current = Some(output);
    }
}

impl<P: Projection> View for ProjectedView<P> {
    fn id(&self) -> &str {
        &self.id
    }

    fn document_id(&self) -> &str {
        &self.document_id
    }

    fn init(&mut self, model: &CanonicalModel) {
        self.refresh(model);
    }

    fn is_operation_relevant(&self, applied: &AppliedOperation) -> bool {
        match &self.filter {
            Some(filter) => filter(applied),
            None => self.projection.is_operation_relevant(applied, &self.document_id),
        }
    }

    fn update(&mut self, model: &CanonicalModel, applied: &AppliedOperation) -> ViewUpdate {
        if let Some(mut current) = self.current.take() {
            if self.projection.apply_operation(&mut current, applied, model) {
                self.stats.incremental += 1;
                self.publish(current);
                return ViewUpdate::Incremental;
            }
        }
        self.refresh(model);
        ViewUpdate::Refreshed
    }

    fn destroy(&mut self) {
        self.sink = None;
        self.current = None;
    }
}

impl<P: Projection> fmt::Debug for ProjectedView<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectedView")
            .field("id", &self.id)
            .field("document_id", &self.document_id)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Registered views, notified in registration order
#[derive(Default)]
pub struct ViewRegistry {
    views: Vec<Box<dyn View>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the view against the current model and start notifying it.
    /// A view with the same id is destroyed and replaced.
    pub fn register(&mut self, model: &CanonicalModel, mut view: Box<dyn View>) {
        if let Some(index) = self.position(view.id()) {
            let mut replaced = self.views.remove(index);
            replaced.destroy();
            debug!(view_id = view.id(), "View replaced");
        }
        view.init(model);
        debug!(view_id = view.id(), document_id = view.document_id(), "View registered");
        self.views.push(view);
    }

    /// Returns the document the view was projecting
    pub fn destroy(&mut self, view_id: &str) -> EditorResult<DocumentId> {
        let index = self
            .position(view_id)
            .ok_or_else(|| EditorError::ViewNotFound(view_id.to_string()))?;
        let mut view = self.views.remove(index);
        view.destroy();
        debug!(view_id, "View destroyed");
        Ok(view.document_id().to_string())
    }

    fn position(&self, view_id: &str) -> Option<usize> {
        self.views.iter().position(|v| v.id() == view_id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn contains(&self, view_id: &str) -> bool {
        self.position(view_id).is_some()
    }

    /// Fan out one applied operation. Returns what each view did.
    pub fn dispatch(
        &mut self,
        model: &CanonicalModel,
        applied: &AppliedOperation,
        arbitrator: Option<&AuthorityArbitrator>,
    ) -> Vec<(ViewId, ViewUpdate)> {
        self.views
            .iter_mut()
            .map(|view| {
                let echo = arbitrator.is_some_and(|a| {
                    a.is_update_from_authoritative_source(view.document_id(), view.id())
                });
                let update = if echo {
                    ViewUpdate::SkippedEcho
                } else if !view.is_operation_relevant(applied) {
                    ViewUpdate::Irrelevant
                } else {
                    view.update(model, applied)
                };
                trace!(view_id = view.id(), ?update, "View notified");
                (view.id().to_string(), update)
            })
            .collect()
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.views.iter().map(|v| v.id()))
            .finish()
    }
}

/// One rendered outline row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineLine {
    pub item_id: ItemId,
    pub depth: usize,
    pub text: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// Flat outline of a document in display order, with derived depths.
/// Text edits are patched in place; structural edits re-project.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineProjection;

impl OutlineProjection {
    pub fn lines(model: &CanonicalModel, document_id: &str) -> Vec<OutlineLine> {
        let Some(document) = model.document(document_id) else {
            return Vec::new();
        };
        document
            .items()
            .map(|item| OutlineLine {
                item_id: item.id.clone(),
                depth: tree::compute_depth(model, item),
                text: item.text.clone(),
                item_type: item.item_type.clone(),
            })
            .collect()
    }
}

impl Projection for OutlineProjection {
    type Output = Vec<OutlineLine>;

    fn project(&self, model: &CanonicalModel, document_id: &str) -> Self::Output {
        Self::lines(model, document_id)
    }

    fn apply_operation(
        &mut self,
        current: &mut Self::Output,
        applied: &AppliedOperation,
        _model: &CanonicalModel,
    ) -> bool {
        let (OperationKind::SetText(_), ApplyResult::SetText { new_text, .. }) =
            (&applied.operation.kind, &applied.result)
        else {
            return false;
        };
        match current.iter_mut().find(|line| line.item_id == applied.operation.item_id) {
            Some(line) => {
                line.text = new_text.clone();
                true
            }
            None => false,
        }
    }
}
