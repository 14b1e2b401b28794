//! # Semantic Operations
//!
//! Typed, invertible edit actions on the canonical model.
//!
//! ## Kinds
//!
//! | kind       | required params              |
//! |------------|------------------------------|
//! | `setText`  | `text`                       |
//! | `split`    | `caretPosition`, `newItemId` |
//! | `merge`    | `previousItemId`             |
//! | `move`     | `newParentId`, `newIndex`    |
//! | `reparent` | `newParentId`, `newDepth`    |
//! | `delete`   | none                         |
//! | `create`   | `type`, `parentId`, `index`  |
//!
//! An [`Operation`] is the typed form; [`OperationDescriptor`] is the plain
//! wire shape (`{op, itemId, params, timestamp, clientId, sequence?}`).
//! The wire name always comes from the [`OpKind`] tag.
//!
//! Indices (`index`, `newIndex`) address the physical item list of the
//! target group. Positions inside a parent's `childIds` are derived from
//! display order unless a `childPosition` is given explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use twodo_model::{DocumentId, GroupId, Item, ItemId, ModelError};

pub type ClientId = String;

/// Discriminant of the operation variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpKind {
    SetText,
    Split,
    Merge,
    Move,
    Reparent,
    Delete,
    Create,
}

impl OpKind {
    pub const ALL: [OpKind; 7] = [
        OpKind::SetText,
        OpKind::Split,
        OpKind::Merge,
        OpKind::Move,
        OpKind::Reparent,
        OpKind::Delete,
        OpKind::Create,
    ];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::SetText => "setText",
            OpKind::Split => "split",
            OpKind::Merge => "merge",
            OpKind::Move => "move",
            OpKind::Reparent => "reparent",
            OpKind::Delete => "delete",
            OpKind::Create => "create",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OperationError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTextParams {
    pub text: String,

    /// Text the author expected to replace (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
}

/// Explicit location for an item created by `split`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub parent_id: Option<ItemId>,
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitParams {
    /// Character (not byte) offset into the item's text
    pub caret_position: usize,
    pub new_item_id: ItemId,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    /// Children handed over to the new item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub take_children: Vec<ItemId>,

    /// Overrides "sibling immediately after"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeParams {
    pub previous_item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub new_parent_id: Option<ItemId>,
    pub new_index: usize,

    /// Target group; defaults to the new parent's group, then the current one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparentParams {
    pub new_parent_id: Option<ItemId>,
    pub new_depth: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_position: Option<usize>,
}

/// An item snapshot together with where it lived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedItem {
    pub group_id: GroupId,
    pub index: usize,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    #[serde(rename = "type")]
    pub item_type: String,
    pub parent_id: Option<ItemId>,
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_data: Option<Item>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_position: Option<usize>,

    /// Subtree restored alongside the item (inverse of a cascading delete)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descendants: Vec<PositionedItem>,
}

/// The closed set of edit actions
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    SetText(SetTextParams),
    Split(SplitParams),
    Merge(MergeParams),
    Move(MoveParams),
    Reparent(ReparentParams),
    Delete,
    Create(CreateParams),
}

impl OperationKind {
    pub fn op_kind(&self) -> OpKind {
        match self {
            OperationKind::SetText(_) => OpKind::SetText,
            OperationKind::Split(_) => OpKind::Split,
            OperationKind::Merge(_) => OpKind::Merge,
            OperationKind::Move(_) => OpKind::Move,
            OperationKind::Reparent(_) => OpKind::Reparent,
            OperationKind::Delete => OpKind::Delete,
            OperationKind::Create(_) => OpKind::Create,
        }
    }

    /// Params as a plain JSON object
    pub fn params(&self) -> Value {
        let value = match self {
            OperationKind::SetText(p) => serde_json::to_value(p),
            OperationKind::Split(p) => serde_json::to_value(p),
            OperationKind::Merge(p) => serde_json::to_value(p),
            OperationKind::Move(p) => serde_json::to_value(p),
            OperationKind::Reparent(p) => serde_json::to_value(p),
            OperationKind::Delete => Ok(Value::Object(Default::default())),
            OperationKind::Create(p) => serde_json::to_value(p),
        };
        value.unwrap_or_default()
    }

    /// Typed params from a plain JSON object. Missing or mistyped required
    /// params are a validation failure.
    pub fn from_params(kind: OpKind, params: Value) -> Result<Self, OperationError> {
        fn parse<T: serde::de::DeserializeOwned>(kind: OpKind, params: Value) -> Result<T, OperationError> {
            if params.is_null() {
                return Err(OperationError::InvalidParams {
                    kind,
                    message: "missing params".to_string(),
                });
            }
            serde_json::from_value(params).map_err(|e| OperationError::InvalidParams {
                kind,
                message: e.to_string(),
            })
        }

        Ok(match kind {
            OpKind::SetText => OperationKind::SetText(parse(kind, params)?),
            OpKind::Split => OperationKind::Split(parse(kind, params)?),
            OpKind::Merge => OperationKind::Merge(parse(kind, params)?),
            OpKind::Move => OperationKind::Move(parse(kind, params)?),
            OpKind::Reparent => OperationKind::Reparent(parse(kind, params)?),
            OpKind::Delete => OperationKind::Delete,
            OpKind::Create => OperationKind::Create(parse(kind, params)?),
        })
    }
}

/// Plain wire shape of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub op: String,
    pub item_id: ItemId,

    #[serde(default)]
    pub params: Value,

    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub client_id: ClientId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// A semantic edit. Immutable once logged; `sequence` is assigned by the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OperationDescriptor", try_from = "OperationDescriptor")]
pub struct Operation {
    pub item_id: ItemId,
    pub kind: OperationKind,
    pub timestamp: i64,
    pub client_id: ClientId,
    pub sequence: Option<u64>,
}

impl Operation {
    /// Unstamped operation; the manager fills in timestamp and client id
    pub fn new(item_id: impl Into<ItemId>, kind: OperationKind) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            timestamp: 0,
            client_id: ClientId::new(),
            sequence: None,
        }
    }

    pub fn set_text(item_id: impl Into<ItemId>, text: impl Into<String>, old_text: Option<&str>) -> Self {
        Self::new(
            item_id,
            OperationKind::SetText(SetTextParams {
                text: text.into(),
                old_text: old_text.map(str::to_string),
            }),
        )
    }

    pub fn split(item_id: impl Into<ItemId>, caret_position: usize, new_item_id: impl Into<ItemId>) -> Self {
        Self::new(
            item_id,
            OperationKind::Split(SplitParams {
                caret_position,
                new_item_id: new_item_id.into(),
                item_type: None,
                config: None,
                take_children: Vec::new(),
                placement: None,
            }),
        )
    }

    /// Merge `item_id` into `previous_item_id`
    pub fn merge(item_id: impl Into<ItemId>, previous_item_id: impl Into<ItemId>) -> Self {
        Self::new(
            item_id,
            OperationKind::Merge(MergeParams {
                previous_item_id: previous_item_id.into(),
            }),
        )
    }

    pub fn move_to(item_id: impl Into<ItemId>, new_parent_id: Option<&str>, new_index: usize) -> Self {
        Self::new(
            item_id,
            OperationKind::Move(MoveParams {
                new_parent_id: new_parent_id.map(str::to_string),
                new_index,
                group_id: None,
                child_position: None,
            }),
        )
    }

    pub fn reparent(item_id: impl Into<ItemId>, new_parent_id: Option<&str>, new_depth: usize) -> Self {
        Self::new(
            item_id,
            OperationKind::Reparent(ReparentParams {
                new_parent_id: new_parent_id.map(str::to_string),
                new_depth,
                child_position: None,
            }),
        )
    }

    pub fn delete(item_id: impl Into<ItemId>) -> Self {
        Self::new(item_id, OperationKind::Delete)
    }

    pub fn create(
        item_id: impl Into<ItemId>,
        item_type: impl Into<String>,
        parent_id: Option<&str>,
        index: usize,
    ) -> Self {
        Self::new(
            item_id,
            OperationKind::Create(CreateParams {
                item_type: item_type.into(),
                parent_id: parent_id.map(str::to_string),
                index,
                group_id: None,
                document_id: None,
                item_data: None,
                child_position: None,
                descendants: Vec::new(),
            }),
        )
    }

    /// Create a root-level item in a specific group
    pub fn create_in_group(
        item_id: impl Into<ItemId>,
        item_type: impl Into<String>,
        group_id: impl Into<GroupId>,
        index: usize,
    ) -> Self {
        let mut op = Self::create(item_id, item_type, None, index);
        if let OperationKind::Create(params) = &mut op.kind {
            params.group_id = Some(group_id.into());
        }
        op
    }

    pub fn with_client(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Fill in identity and time where the author left them blank
    pub fn stamped(mut self, client_id: &str, timestamp: i64) -> Self {
        if self.client_id.is_empty() {
            self.client_id = client_id.to_string();
        }
        if self.timestamp == 0 {
            self.timestamp = timestamp;
        }
        self
    }

    pub fn op_kind(&self) -> OpKind {
        self.kind.op_kind()
    }

    /// Wire name of the variant
    pub fn op_type(&self) -> &'static str {
        self.kind.op_kind().as_str()
    }

    pub fn to_descriptor(&self) -> OperationDescriptor {
        OperationDescriptor {
            op: self.op_type().to_string(),
            item_id: self.item_id.clone(),
            params: self.kind.params(),
            timestamp: self.timestamp,
            client_id: self.client_id.clone(),
            sequence: self.sequence,
        }
    }

    /// Materialize a typed operation from its wire shape
    pub fn from_descriptor(descriptor: &OperationDescriptor) -> Result<Self, OperationError> {
        let kind: OpKind = descriptor.op.parse()?;
        Ok(Self {
            item_id: descriptor.item_id.clone(),
            kind: OperationKind::from_params(kind, descriptor.params.clone())?,
            timestamp: descriptor.timestamp,
            client_id: descriptor.client_id.clone(),
            sequence: descriptor.sequence,
        })
    }
}

impl From<Operation> for OperationDescriptor {
    fn from(op: Operation) -> Self {
        op.to_descriptor()
    }
}

impl TryFrom<OperationDescriptor> for Operation {
    type Error = OperationError;

    fn try_from(descriptor: OperationDescriptor) -> Result<Self, Self::Error> {
        Operation::from_descriptor(&descriptor)
    }
}

/// Snapshot captured by `delete`, enough to recreate the subtree exactly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItem {
    pub item: Item,
    pub document_id: DocumentId,
    pub group_id: GroupId,
    pub index: usize,
    pub parent_id: Option<ItemId>,
    pub child_position: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descendants: Vec<PositionedItem>,
}

/// What `apply` did, including whatever `invert` needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ApplyResult {
    #[serde(rename_all = "camelCase")]
    SetText { old_text: String, new_text: String },

    #[serde(rename_all = "camelCase")]
    Split {
        new_item_id: ItemId,
        caret_position: usize,
        index: usize,
    },

    #[serde(rename_all = "camelCase")]
    Merge {
        previous_item_id: ItemId,
        caret_position: usize,
        merged: Item,
        original_parent_id: Option<ItemId>,
        original_index: usize,
        original_child_position: Option<usize>,
        adopted_children: Vec<ItemId>,
    },

    #[serde(rename_all = "camelCase")]
    Move {
        old_parent_id: Option<ItemId>,
        old_group_id: GroupId,
        old_index: usize,
        old_child_position: Option<usize>,
        new_parent_id: Option<ItemId>,
        new_group_id: GroupId,
        new_index: usize,
    },

    #[serde(rename_all = "camelCase")]
    Reparent {
        old_parent_id: Option<ItemId>,
        old_depth: usize,
        old_child_position: Option<usize>,
        new_parent_id: Option<ItemId>,
        new_depth: usize,
    },

    #[serde(rename_all = "camelCase")]
    Delete { snapshot: DeletedItem },

    #[serde(rename_all = "camelCase")]
    Create {
        item_id: ItemId,
        group_id: GroupId,
        index: usize,
        restored_descendants: usize,
    },
}

/// Coarse error taxonomy used by callers and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed params, or a structural rule was violated
    Validation,
    /// Target item, parent, group or document absent
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Unknown operation kind: {0}")]
    UnknownKind(String),

    #[error("Invalid params for {kind}: {message}")]
    InvalidParams { kind: OpKind, message: String },

    #[error("Operation has no item id")]
    MissingItemId,

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    #[error("Cannot merge across groups ({item_group} into {previous_group})")]
    CrossGroupMerge {
        item_group: String,
        previous_group: String,
    },

    #[error("Cannot link items across documents")]
    CrossDocument,

    #[error("Would create cycle: {item_id} under {parent_id}")]
    CycleDetected { item_id: String, parent_id: String },

    #[error("Caret {caret} outside text of length {length}")]
    CaretOutOfRange { caret: usize, length: usize },

    #[error("Depth mismatch: parent implies {expected}, got {given}")]
    DepthMismatch { expected: usize, given: usize },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

impl OperationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OperationError::ItemNotFound(_)
            | OperationError::ParentNotFound(_)
            | OperationError::GroupNotFound(_)
            | OperationError::DocumentNotFound(_) => ErrorCategory::NotFound,
            _ => ErrorCategory::Validation,
        }
    }
}

impl From<ModelError> for OperationError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::ItemNotFound(id) => OperationError::ItemNotFound(id),
            ModelError::ParentNotFound(id) => OperationError::ParentNotFound(id),
            ModelError::GroupNotFound(id) => OperationError::GroupNotFound(id),
            ModelError::DocumentNotFound(id) => OperationError::DocumentNotFound(id),
            ModelError::Integrity(msg) => OperationError::InvalidStructure(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_name_comes_from_variant() {
        for kind in OpKind::ALL {
            assert_eq!(kind.as_str().parse::<OpKind>().unwrap(), kind);
        }
        assert_eq!(Operation::delete("x").op_type(), "delete");
        assert_eq!(Operation::split("x", 1, "y").op_type(), "split");
    }

    #[test]
    fn test_operation_serializes_to_wire_shape() {
        let op = Operation::set_text("item-1", "Hi", Some("Item 1"))
            .with_client("local")
            .with_timestamp(42);

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(
            json,
            json!({
                "op": "setText",
                "itemId": "item-1",
                "params": { "text": "Hi", "oldText": "Item 1" },
                "timestamp": 42,
                "clientId": "local"
            })
        );

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_descriptor_with_missing_required_param_is_rejected() {
        let descriptor: OperationDescriptor = serde_json::from_value(json!({
            "op": "split",
            "itemId": "item-1",
            "params": { "caretPosition": 3 }
        }))
        .unwrap();

        let err = Operation::from_descriptor(&descriptor).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { kind: OpKind::Split, .. }));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_descriptor_with_unknown_kind_is_rejected() {
        let descriptor = OperationDescriptor {
            op: "indent".to_string(),
            item_id: "a".to_string(),
            params: json!({}),
            timestamp: 0,
            client_id: String::new(),
            sequence: None,
        };
        assert_eq!(
            Operation::from_descriptor(&descriptor).unwrap_err(),
            OperationError::UnknownKind("indent".to_string())
        );
    }

    #[test]
    fn test_delete_accepts_absent_params() {
        let op: Operation = serde_json::from_str(r#"{"op":"delete","itemId":"a"}"#).unwrap();
        assert_eq!(op.kind, OperationKind::Delete);
    }

    #[test]
    fn test_create_params_accept_null_parent() {
        let op: Operation = serde_json::from_value(json!({
            "op": "create",
            "itemId": "n",
            "params": { "type": "task", "parentId": null, "index": 0, "groupId": "g-1" }
        }))
        .unwrap();

        match op.kind {
            OperationKind::Create(params) => {
                assert_eq!(params.item_type, "task");
                assert!(params.parent_id.is_none());
                assert_eq!(params.group_id.as_deref(), Some("g-1"));
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_stamped_keeps_author_values() {
        let op = Operation::delete("a").with_client("remote").stamped("local", 99);
        assert_eq!(op.client_id, "remote");
        assert_eq!(op.timestamp, 99);
    }

    #[test]
    fn test_apply_result_is_tagged_by_kind() {
        let result = ApplyResult::SetText {
            old_text: "a".into(),
            new_text: "b".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({ "kind": "setText", "oldText": "a", "newText": "b" }));
    }
}
