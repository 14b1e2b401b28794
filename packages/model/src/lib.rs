//! # Twodo Model
//!
//! The canonical document model: documents own groups, groups own a flat,
//! ordered list of items, and items link to each other logically through
//! `parent_id` / `child_ids`.
//!
//! ```text
//! CanonicalModel
//!   └─ Document { id, metadata }
//!        └─ Group { id }
//!             └─ Item { id, type, text, parent_id, child_ids, config }
//! ```
//!
//! The model is plain data. Structural edits go through the [`tree`]
//! accessor, which keeps `parent_id` and the parent's `child_ids` in
//! agreement. Depth is never stored; see [`tree::compute_depth`].

pub mod document;
pub mod error;
pub mod tree;

pub use document::{CanonicalModel, Document, Group, Item, DEFAULT_ITEM_TYPE};
pub use error::{ModelError, ModelResult};
pub use tree::{ItemPath, ItemRef};

pub type DocumentId = String;
pub type GroupId = String;
pub type ItemId = String;
