//! # Twodo Editor
//!
//! Operation-sourced editing engine for outlines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ text views: Markdown / LaTeX                │
//! │  - bridge diff → setText operations         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ manager: the only write path                │
//! │  - validate, authorize, apply, invert       │
//! │  - append to the per-document log           │
//! │  - history, undo/redo batches               │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ views + event bus: derived projections      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Model is source of truth**: text and outline views are derived
//! 2. **Semantic operations**: every edit is one of seven typed operations
//! 3. **Everything is logged**: the log can rebuild the model by replay
//! 4. **Authority per view**: a text view can own a document for a while
//!
//! ## Usage
//!
//! ```rust,ignore
//! use twodo_editor::{EditSession, Operation, OutlineSyntax};
//!
//! let mut session = EditSession::new("client-1", model);
//! session.apply(Operation::set_text("item-1", "Hi", Some("Item 1")));
//!
//! let markdown = session.render("page-1", OutlineSyntax::Markdown)?;
//! session.undo()?;
//! ```

mod apply;
mod authority;
mod bridge;
mod clock;
mod config;
mod errors;
mod events;
mod inverse;
mod manager;
mod operations;
mod oplog;
mod projection;
mod session;
mod storage;
mod undo_stack;

pub use authority::{
    Authority, AuthorityArbitrator, AuthorityDecision, UpdateSource, DEFAULT_SUPPRESSION_WINDOW,
};
pub use bridge::{BridgeError, OutlineBridge, OutlineSyntax, ParsedLine, TextBridge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EditorConfig, CONFIG_FILE_NAME};
pub use errors::{EditorError, EditorResult};
pub use events::{EditorEvent, EventBus, ListenerId, RejectReason, ViewId};
pub use manager::{
    AppliedOperation, ApplyOutcome, OperationManager, DEFAULT_CLIENT_ID, DEFAULT_HISTORY_LIMIT,
};
pub use operations::{
    ApplyResult, ClientId, CreateParams, DeletedItem, ErrorCategory, MergeParams, MoveParams, OpKind,
    Operation, OperationDescriptor, OperationError, OperationKind, Placement, PositionedItem,
    ReparentParams, SetTextParams, SplitParams,
};
pub use oplog::{
    log_key, LogRegistry, OperationLog, ReplayOutcome, DEFAULT_CATCH_UP_WINDOW, DEFAULT_RETENTION,
    LOG_KEY_PREFIX,
};
pub use projection::{
    OutlineLine, OutlineProjection, ProjectedView, Projection, View, ViewRegistry, ViewStats, ViewUpdate,
};
pub use session::EditSession;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult};
pub use undo_stack::{HistoryEntry, OperationBatch, UndoStack};

// Re-export the model for convenience
pub use twodo_model::{CanonicalModel, Document, DocumentId, Group, GroupId, Item, ItemId};
