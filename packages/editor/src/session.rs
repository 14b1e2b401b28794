//! # Edit Session
//!
//! Owns one canonical model together with everything that may touch it:
//! the operation manager (arbitrator, logs, history, views, event bus) and
//! the text bridges. There is no global state; two sessions never share
//! anything unless they are handed the same store or event bus.

use crate::authority::{Authority, AuthorityArbitrator, UpdateSource};
use crate::bridge::{OutlineBridge, OutlineSyntax, TextBridge};
use crate::clock::{Clock, SystemClock};
use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use crate::events::EventBus;
use crate::manager::{AppliedOperation, ApplyOutcome, OperationManager};
use crate::oplog::{LogRegistry, ReplayOutcome};
use crate::operations::{Operation, OperationDescriptor};
use crate::projection::View;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use twodo_model::CanonicalModel;

pub struct EditSession {
    /// Session identifier, used as the client id of local edits
    pub id: String,

    model: CanonicalModel,
    manager: OperationManager,
    bridges: HashMap<OutlineSyntax, Box<dyn TextBridge>>,
    config: EditorConfig,
}

impl EditSession {
    /// In-memory session with default configuration
    pub fn new(id: impl Into<String>, model: CanonicalModel) -> Self {
        Self::with_parts(
            id,
            model,
            EditorConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Session whose logs live under the configured log directory.
    ///
    /// The log of every document in the model is restored up front; an
    /// unreadable one fails the call.
    pub fn open(model: CanonicalModel, config: EditorConfig, cwd: impl AsRef<Path>) -> EditorResult<Self> {
        let store = FileStore::open(config.log_dir(cwd))?;
        let id = config.client_id.clone();
        let mut session = Self::with_parts(id, model, config, Arc::new(store), Arc::new(SystemClock));
        for document in &session.model.documents {
            session.manager.logs_mut().open_log(&document.id)?;
        }
        Ok(session)
    }

    /// Restore a document's log, failing when it exists but cannot be read
    pub fn open_log(&mut self, document_id: &str) -> EditorResult<()> {
        self.manager.logs_mut().open_log(document_id)?;
        Ok(())
    }

    pub fn with_parts(
        id: impl Into<String>,
        model: CanonicalModel,
        config: EditorConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = id.into();
        let events = EventBus::new();
        let arbitrator = AuthorityArbitrator::new(events.clone(), Arc::clone(&clock))
            .with_window(config.suppression_window());
        let manager = OperationManager::new(
            LogRegistry::new(store, config.log_retention),
            events,
            clock,
        )
        .with_arbitrator(arbitrator)
        .with_client_id(id.clone())
        .with_history_limit(config.history_limit);

        let mut bridges: HashMap<OutlineSyntax, Box<dyn TextBridge>> = HashMap::new();
        bridges.insert(OutlineSyntax::Markdown, Box::new(OutlineBridge::markdown()));
        bridges.insert(OutlineSyntax::Latex, Box::new(OutlineBridge::latex()));

        Self {
            id,
            model,
            manager,
            bridges,
            config,
        }
    }

    /// Replace the bridge used for one syntax
    pub fn register_bridge(&mut self, syntax: OutlineSyntax, bridge: Box<dyn TextBridge>) {
        self.bridges.insert(syntax, bridge);
    }

    pub fn model(&self) -> &CanonicalModel {
        &self.model
    }

    pub fn into_model(self) -> CanonicalModel {
        self.model
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn manager(&self) -> &OperationManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut OperationManager {
        &mut self.manager
    }

    pub fn events(&self) -> &EventBus {
        self.manager.events()
    }

    pub fn apply(&mut self, operation: Operation) -> ApplyOutcome {
        self.manager.apply_operation(&mut self.model, operation)
    }

    pub fn apply_descriptor(&mut self, descriptor: &OperationDescriptor) -> ApplyOutcome {
        self.manager.apply_descriptor(&mut self.model, descriptor)
    }

    pub fn apply_from_view(&mut self, operation: Operation, view_id: &str) -> ApplyOutcome {
        self.manager.apply_from_view(&mut self.model, operation, view_id)
    }

    pub fn undo(&mut self) -> EditorResult<Vec<AppliedOperation>> {
        self.manager.undo(&mut self.model)
    }

    pub fn redo(&mut self) -> EditorResult<Vec<AppliedOperation>> {
        self.manager.redo(&mut self.model)
    }

    pub fn replay(&mut self, document_id: &str, from: u64, to: Option<u64>) -> Vec<ReplayOutcome> {
        self.manager.replay_log(&mut self.model, document_id, from, to)
    }

    pub fn merge_remote(&mut self, document_id: &str, entries: Vec<Operation>) -> Vec<ReplayOutcome> {
        self.manager.merge_remote(&mut self.model, document_id, entries)
    }

    /// Newest log entries of a document, bounded by the catch-up window
    pub fn catch_up(&mut self, document_id: &str) -> Vec<Operation> {
        let window = self.config.catch_up_window;
        self.manager.logs_mut().log_mut(document_id).catch_up(window).to_vec()
    }

    pub fn get_authority(&self, document_id: &str, view_id: &str) -> Authority {
        self.manager
            .arbitrator()
            .map(|a| a.get_authority(document_id, view_id))
            .unwrap_or_default()
    }

    /// Returns the previous mode
    pub fn set_authority(&mut self, document_id: &str, view_id: &str, mode: Authority) -> Authority {
        self.manager
            .arbitrator_mut()
            .map(|a| a.set_authority(document_id, view_id, mode))
            .unwrap_or_default()
    }

    pub fn register_view(&mut self, view: Box<dyn View>) {
        self.manager.register_view(&self.model, view);
    }

    pub fn destroy_view(&mut self, view_id: &str) -> EditorResult<()> {
        self.manager.destroy_view(view_id)
    }

    pub fn render(&self, document_id: &str, syntax: OutlineSyntax) -> EditorResult<String> {
        let bridge = self
            .bridges
            .get(&syntax)
            .ok_or_else(|| EditorError::NoBridge(syntax.to_string()))?;
        Ok(bridge.render(&self.model, document_id)?)
    }

    /// Push an edit made in a text view into the model.
    ///
    /// The syntax follows the view's authority; a canonical view is read as
    /// Markdown.
    pub fn sync_text(
        &mut self,
        document_id: &str,
        view_id: &str,
        before: &str,
        after: &str,
    ) -> EditorResult<Vec<AppliedOperation>> {
        let syntax = match self.get_authority(document_id, view_id) {
            Authority::Latex => OutlineSyntax::Latex,
            Authority::Markdown | Authority::Canonical => OutlineSyntax::Markdown,
        };
        self.sync_text_as(syntax, document_id, view_id, before, after)
    }

    pub fn sync_text_as(
        &mut self,
        syntax: OutlineSyntax,
        document_id: &str,
        view_id: &str,
        before: &str,
        after: &str,
    ) -> EditorResult<Vec<AppliedOperation>> {
        if !self.bridges.contains_key(&syntax) {
            return Err(EditorError::NoBridge(syntax.to_string()));
        }
        let source: UpdateSource = syntax.source();
        if let Some(arbitrator) = self.manager.arbitrator_mut() {
            arbitrator.prevent_circular_update(document_id, view_id, source);
        }

        let diffed = match self.bridges.get(&syntax) {
            Some(bridge) => bridge.diff(before, after, &self.model, document_id),
            None => return Err(EditorError::NoBridge(syntax.to_string())),
        };
        let operations = match diffed {
            Ok(operations) => operations,
            Err(e) => {
                if let Some(arbitrator) = self.manager.arbitrator_mut() {
                    arbitrator.clear_source(document_id, view_id);
                    arbitrator.reconcile(document_id, view_id, after, self.model.document(document_id));
                }
                return Err(e.into());
            }
        };

        debug!(document_id, view_id, count = operations.len(), "Syncing text edit");
        self.manager
            .begin_batch(Some(&format!("{} sync of {}", syntax, view_id)));
        let mut applied = Vec::with_capacity(operations.len());
        for operation in operations {
            match self
                .manager
                .apply_from_view(&mut self.model, operation, view_id)
                .into_result()
            {
                Ok(done) => applied.push(done),
                Err(e) => {
                    self.manager.end_batch();
                    if let Some(arbitrator) = self.manager.arbitrator_mut() {
                        arbitrator.clear_source(document_id, view_id);
                    }
                    return Err(e);
                }
            }
        }
        self.manager.end_batch();

        if !applied.is_empty() {
            info!(document_id, view_id, applied = applied.len(), "Text edit synced");
        }
        Ok(applied)
    }
}
