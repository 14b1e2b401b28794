//! # Canonical Model
//!
//! Owned data for the active document set. Nothing in here knows about
//! operations; the editor mutates these structures exclusively through
//! [`crate::tree`].

use crate::{DocumentId, GroupId, ItemId, ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Item type used when an operation creates an item without explicit data
pub const DEFAULT_ITEM_TYPE: &str = "text";

fn default_item_type() -> String {
    DEFAULT_ITEM_TYPE.to_string()
}

/// A single outline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,

    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub parent_id: Option<ItemId>,

    #[serde(default)]
    pub child_ids: Vec<ItemId>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

impl Item {
    /// Default-shaped item with the given type
    pub fn new(id: impl Into<ItemId>, item_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            text: String::new(),
            parent_id: None,
            child_ids: Vec::new(),
            config: Value::Null,
        }
    }

    /// Default-typed item holding `text`
    pub fn with_text(id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        let mut item = Self::new(id, DEFAULT_ITEM_TYPE);
        item.text = text.into();
        item
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Physical storage for items. Order here is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,

    #[serde(default)]
    pub items: Vec<Item>,
}

impl Group {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
        }
    }

    pub fn with_items(id: impl Into<GroupId>, items: Vec<Item>) -> Self {
        Self {
            id: id.into(),
            items,
        }
    }

    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }
}

/// Root of a forest of items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,

    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            groups: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    /// All items in display order (group by group)
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    /// Verify id uniqueness and parent/child agreement.
    ///
    /// Every structural operation keeps these invariants; this check exists
    /// for loaders and tests.
    pub fn check_integrity(&self) -> ModelResult<()> {
        let mut by_id: HashMap<&str, &Item> = HashMap::new();
        for item in self.items() {
            if by_id.insert(item.id.as_str(), item).is_some() {
                return Err(ModelError::Integrity(format!(
                    "duplicate item id '{}' in document '{}'",
                    item.id, self.id
                )));
            }
        }

        for item in by_id.values() {
            if let Some(parent_id) = &item.parent_id {
                let parent = by_id.get(parent_id.as_str()).ok_or_else(|| {
                    ModelError::Integrity(format!(
                        "item '{}' points at missing parent '{}'",
                        item.id, parent_id
                    ))
                })?;
                if !parent.child_ids.iter().any(|c| c == &item.id) {
                    return Err(ModelError::Integrity(format!(
                        "parent '{}' does not list child '{}'",
                        parent_id, item.id
                    )));
                }
            }

            let mut seen = HashSet::new();
            for child_id in &item.child_ids {
                if !seen.insert(child_id.as_str()) {
                    return Err(ModelError::Integrity(format!(
                        "item '{}' lists child '{}' twice",
                        item.id, child_id
                    )));
                }
                let child = by_id.get(child_id.as_str()).ok_or_else(|| {
                    ModelError::Integrity(format!(
                        "item '{}' lists missing child '{}'",
                        item.id, child_id
                    ))
                })?;
                if child.parent_id.as_deref() != Some(item.id.as_str()) {
                    return Err(ModelError::Integrity(format!(
                        "child '{}' does not point back at '{}'",
                        child_id, item.id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The active document set.
///
/// Owned by the embedding application; the editor only ever borrows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalModel {
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl CanonicalModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Make a document resident. Replaces any document with the same id.
    pub fn insert_document(&mut self, document: Document) {
        match self.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }
    }

    /// Drop a document from the active set
    pub fn evict_document(&mut self, document_id: &str) -> Option<Document> {
        let index = self.documents.iter().position(|d| d.id == document_id)?;
        Some(self.documents.remove(index))
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    pub fn document_index(&self, document_id: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.id == document_id)
    }

    /// Ids of every item in a document, in display order
    pub fn item_ids(&self, document_id: &str) -> Vec<ItemId> {
        self.document(document_id)
            .map(|doc| doc.items().map(|item| item.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn check_integrity(&self) -> ModelResult<()> {
        self.documents.iter().try_for_each(Document::check_integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut parent = Item::with_text("a", "Parent");
        parent.child_ids.push("b".to_string());
        let mut child = Item::with_text("b", "Child");
        child.parent_id = Some("a".to_string());

        Document::new("doc-1").with_group(Group::with_items("g-1", vec![parent, child]))
    }

    #[test]
    fn test_item_serialization_uses_wire_names() {
        let mut item = Item::with_text("item-1", "Hello");
        item.parent_id = Some("root".to_string());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["parentId"], "root");
        assert!(json.get("config").is_none());

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_item_defaults_when_fields_missing() {
        let item: Item = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(item.item_type, DEFAULT_ITEM_TYPE);
        assert!(item.text.is_empty());
        assert!(item.child_ids.is_empty());
    }

    #[test]
    fn test_integrity_accepts_consistent_links() {
        assert!(sample().check_integrity().is_ok());
    }

    #[test]
    fn test_integrity_rejects_one_sided_link() {
        let mut doc = sample();
        doc.groups[0].items[0].child_ids.clear();
        assert!(matches!(doc.check_integrity(), Err(ModelError::Integrity(_))));
    }

    #[test]
    fn test_integrity_rejects_duplicate_ids() {
        let mut doc = sample();
        doc.groups[0].items.push(Item::with_text("a", "again"));
        assert!(doc.check_integrity().is_err());
    }

    #[test]
    fn test_insert_document_replaces_by_id() {
        let mut model = CanonicalModel::new();
        model.insert_document(sample());
        model.insert_document(Document::new("doc-1"));

        assert_eq!(model.documents.len(), 1);
        assert_eq!(model.document("doc-1").unwrap().item_count(), 0);
    }
}
