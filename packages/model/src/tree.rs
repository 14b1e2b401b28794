//! # Tree Accessor
//!
//! Lookup and structural helpers shared by every operation.
//!
//! Items are stored flat inside groups; the hierarchy lives in
//! `parent_id` / `child_ids`. Lookups are a scoped breadth search over the
//! resident documents (documents → groups → items) rather than a global
//! index, so worst case is O(documents × groups × items). The embedding
//! application keeps the resident set small.

use crate::{CanonicalModel, Group, Item, ItemId, ModelError, ModelResult};

/// Physical address of an item inside the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemPath {
    pub document_index: usize,
    pub group_index: usize,
    pub item_index: usize,
}

/// Result of [`find_item`]
#[derive(Debug, Clone, Copy)]
pub struct ItemRef<'a> {
    pub item: &'a Item,
    pub document_id: &'a str,
    pub group_id: &'a str,
    pub item_index: usize,
    pub parent_item: Option<&'a Item>,
    pub group: &'a Group,
    pub path: ItemPath,
}

/// Locate an item across all resident documents
pub fn locate(model: &CanonicalModel, item_id: &str) -> Option<ItemPath> {
    if item_id.is_empty() {
        return None;
    }
    (0..model.documents.len()).find_map(|document_index| {
        locate_in_document(model, document_index, item_id)
    })
}

/// Locate an item inside one document
pub fn locate_in_document(
    model: &CanonicalModel,
    document_index: usize,
    item_id: &str,
) -> Option<ItemPath> {
    let document = model.documents.get(document_index)?;
    document
        .groups
        .iter()
        .enumerate()
        .find_map(|(group_index, group)| {
            group.position(item_id).map(|item_index| ItemPath {
                document_index,
                group_index,
                item_index,
            })
        })
}

/// Locate a group by id, returning `(document_index, group_index)`
pub fn locate_group(model: &CanonicalModel, group_id: &str) -> Option<(usize, usize)> {
    model
        .documents
        .iter()
        .enumerate()
        .find_map(|(document_index, document)| {
            document
                .groups
                .iter()
                .position(|g| g.id == group_id)
                .map(|group_index| (document_index, group_index))
        })
}

/// Find an item together with its document, group and parent
pub fn find_item<'a>(model: &'a CanonicalModel, item_id: &str) -> Option<ItemRef<'a>> {
    let path = locate(model, item_id)?;
    let document = &model.documents[path.document_index];
    let group = &document.groups[path.group_index];
    let item = &group.items[path.item_index];

    let parent_item = item.parent_id.as_deref().and_then(|parent_id| {
        locate_in_document(model, path.document_index, parent_id)
            .and_then(|parent_path| item_at(model, parent_path))
    });

    Some(ItemRef {
        item,
        document_id: &document.id,
        group_id: &group.id,
        item_index: path.item_index,
        parent_item,
        group,
        path,
    })
}

pub fn item_at(model: &CanonicalModel, path: ItemPath) -> Option<&Item> {
    model
        .documents
        .get(path.document_index)?
        .groups
        .get(path.group_index)?
        .items
        .get(path.item_index)
}

pub fn item_at_mut(model: &mut CanonicalModel, path: ItemPath) -> Option<&mut Item> {
    model
        .documents
        .get_mut(path.document_index)?
        .groups
        .get_mut(path.group_index)?
        .items
        .get_mut(path.item_index)
}

pub fn group_mut(
    model: &mut CanonicalModel,
    document_index: usize,
    group_index: usize,
) -> Option<&mut Group> {
    model
        .documents
        .get_mut(document_index)?
        .groups
        .get_mut(group_index)
}

fn item_mut<'a>(model: &'a mut CanonicalModel, item_id: &str) -> Option<&'a mut Item> {
    let path = locate(model, item_id)?;
    item_at_mut(model, path)
}

/// Insert into a group, clamping `index` into `[0, len]`. Returns the index used.
pub fn insert_at(group: &mut Group, item: Item, index: usize) -> usize {
    let index = index.min(group.items.len());
    group.items.insert(index, item);
    index
}

/// Remove from a group, clamping `index` into `[0, len - 1]`
pub fn remove_at(group: &mut Group, index: usize) -> Option<Item> {
    if group.items.is_empty() {
        return None;
    }
    let index = index.min(group.items.len() - 1);
    Some(group.items.remove(index))
}

/// Link `item_id` into the parent's `child_ids` (append when `position` is None).
///
/// Only the parent side is touched; see [`reassign_child`] for both sides.
pub fn add_child(
    model: &mut CanonicalModel,
    parent_id: &str,
    item_id: &str,
    position: Option<usize>,
) -> ModelResult<usize> {
    let parent =
        item_mut(model, parent_id).ok_or_else(|| ModelError::ParentNotFound(parent_id.to_string()))?;

    if let Some(existing) = parent.child_ids.iter().position(|c| c == item_id) {
        return Ok(existing);
    }

    let position = position
        .unwrap_or(parent.child_ids.len())
        .min(parent.child_ids.len());
    parent.child_ids.insert(position, item_id.to_string());
    Ok(position)
}

/// Unlink `item_id` from the parent's `child_ids`. Returns the old position.
pub fn remove_child(
    model: &mut CanonicalModel,
    parent_id: &str,
    item_id: &str,
) -> ModelResult<Option<usize>> {
    let parent =
        item_mut(model, parent_id).ok_or_else(|| ModelError::ParentNotFound(parent_id.to_string()))?;

    let position = parent.child_ids.iter().position(|c| c == item_id);
    if let Some(position) = position {
        parent.child_ids.remove(position);
    }
    Ok(position)
}

/// Move the logical link of `item_id` from one parent to another.
///
/// Updates the item's `parent_id` and both parents' `child_ids`. Both
/// parents and the item are checked before anything is written.
pub fn reassign_child(
    model: &mut CanonicalModel,
    old_parent_id: Option<&str>,
    new_parent_id: Option<&str>,
    item_id: &str,
    position: Option<usize>,
) -> ModelResult<()> {
    let item_path = locate(model, item_id).ok_or_else(|| ModelError::ItemNotFound(item_id.to_string()))?;
    for parent_id in old_parent_id.iter().chain(new_parent_id.iter()) {
        if locate(model, parent_id).is_none() {
            return Err(ModelError::ParentNotFound(parent_id.to_string()));
        }
    }

    if let Some(old_parent_id) = old_parent_id {
        remove_child(model, old_parent_id, item_id)?;
    }
    if let Some(new_parent_id) = new_parent_id {
        add_child(model, new_parent_id, item_id, position)?;
    }
    if let Some(item) = item_at_mut(model, item_path) {
        item.parent_id = new_parent_id.map(str::to_string);
    }

    tracing::trace!(
        item_id,
        old_parent = ?old_parent_id,
        new_parent = ?new_parent_id,
        "Reassigned child"
    );
    Ok(())
}

/// Length of the parent chain. Never stored, always derived.
///
/// A broken or cyclic chain stops counting at the first missing parent or
/// after visiting every item in the document once.
pub fn compute_depth(model: &CanonicalModel, item: &Item) -> usize {
    let Some(path) = locate(model, &item.id) else {
        return 0;
    };
    let limit = model.documents[path.document_index].item_count();

    let mut depth = 0;
    let mut current = item.parent_id.clone();
    while let Some(parent_id) = current {
        if depth >= limit {
            tracing::warn!(item_id = %item.id, "Parent chain does not terminate");
            break;
        }
        match locate_in_document(model, path.document_index, &parent_id)
            .and_then(|p| item_at(model, p))
        {
            Some(parent) => {
                depth += 1;
                current = parent.parent_id.clone();
            }
            None => break,
        }
    }
    depth
}

/// Depth of the item with `item_id`, if it exists
pub fn depth_of(model: &CanonicalModel, item_id: &str) -> Option<usize> {
    find_item(model, item_id).map(|found| compute_depth(model, found.item))
}

/// True when `item_id` sits somewhere below `ancestor_id`
pub fn is_descendant(model: &CanonicalModel, ancestor_id: &str, item_id: &str) -> bool {
    descendants(model, ancestor_id).iter().any(|id| id == item_id)
}

/// All items below `item_id`, depth first, in `child_ids` order
pub fn descendants(model: &CanonicalModel, item_id: &str) -> Vec<ItemId> {
    let Some(path) = locate(model, item_id) else {
        return Vec::new();
    };
    let limit = model.documents[path.document_index].item_count();

    let mut out = Vec::new();
    let mut stack: Vec<ItemId> = item_at(model, path)
        .map(|item| item.child_ids.iter().rev().cloned().collect())
        .unwrap_or_default();

    while let Some(next) = stack.pop() {
        if out.len() >= limit || out.contains(&next) {
            break;
        }
        if let Some(child) = locate_in_document(model, path.document_index, &next)
            .and_then(|p| item_at(model, p))
        {
            stack.extend(child.child_ids.iter().rev().cloned());
        }
        out.push(next);
    }
    out
}

/// Where `item_id` belongs in the parent's `child_ids` given display order:
/// the number of the parent's other children displayed before it.
pub fn ordered_child_position(model: &CanonicalModel, parent_id: &str, item_id: &str) -> usize {
    let (Some(parent), Some(item_path)) = (find_item(model, parent_id), locate(model, item_id)) else {
        return 0;
    };
    let key = |path: ItemPath| (path.group_index, path.item_index);

    parent
        .item
        .child_ids
        .iter()
        .filter(|id| id.as_str() != item_id)
        .filter_map(|id| locate_in_document(model, item_path.document_index, id))
        .filter(|sibling| key(*sibling) < key(item_path))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, Group};

    /// a
    ///   b
    ///     c
    /// d
    fn model() -> CanonicalModel {
        let mut a = Item::with_text("a", "A");
        a.child_ids = vec!["b".into()];
        let mut b = Item::with_text("b", "B");
        b.parent_id = Some("a".into());
        b.child_ids = vec!["c".into()];
        let mut c = Item::with_text("c", "C");
        c.parent_id = Some("b".into());
        let d = Item::with_text("d", "D");

        CanonicalModel::with_documents(vec![
            Document::new("doc-1").with_group(Group::with_items("g-1", vec![a, b, c, d])),
            Document::new("doc-2").with_group(Group::with_items("g-2", vec![Item::with_text("x", "X")])),
        ])
    }

    #[test]
    fn test_find_item_reports_location_and_parent() {
        let model = model();
        let found = find_item(&model, "c").unwrap();

        assert_eq!(found.document_id, "doc-1");
        assert_eq!(found.group_id, "g-1");
        assert_eq!(found.item_index, 2);
        assert_eq!(found.parent_item.map(|p| p.id.as_str()), Some("b"));

        let other = find_item(&model, "x").unwrap();
        assert_eq!(other.document_id, "doc-2");
        assert!(other.parent_item.is_none());
    }

    #[test]
    fn test_find_item_missing_or_empty_id() {
        let model = model();
        assert!(find_item(&model, "nope").is_none());
        assert!(find_item(&model, "").is_none());
    }

    #[test]
    fn test_insert_and_remove_clamp_indices() {
        let mut group = Group::new("g");
        assert_eq!(insert_at(&mut group, Item::with_text("1", "one"), 10), 0);
        assert_eq!(insert_at(&mut group, Item::with_text("2", "two"), 99), 1);

        let removed = remove_at(&mut group, 42).unwrap();
        assert_eq!(removed.id, "2");
        assert_eq!(group.items.len(), 1);

        remove_at(&mut group, 0);
        assert!(remove_at(&mut group, 0).is_none());
    }

    #[test]
    fn test_compute_depth_follows_parent_chain() {
        let model = model();
        let c = find_item(&model, "c").unwrap().item;
        assert_eq!(compute_depth(&model, c), 2);
        assert_eq!(depth_of(&model, "a"), Some(0));
        assert_eq!(depth_of(&model, "missing"), None);
    }

    #[test]
    fn test_compute_depth_survives_cycles() {
        let mut model = model();
        // Corrupt: a -> c makes a cycle a -> b -> c -> a
        model.documents[0].groups[0].items[0].parent_id = Some("c".into());
        let a = find_item(&model, "a").unwrap().item.clone();
        assert!(compute_depth(&model, &a) <= 4);
    }

    #[test]
    fn test_reassign_child_updates_both_sides() {
        let mut model = model();
        reassign_child(&mut model, Some("b"), Some("d"), "c", None).unwrap();

        assert!(find_item(&model, "b").unwrap().item.child_ids.is_empty());
        assert_eq!(find_item(&model, "d").unwrap().item.child_ids, vec!["c"]);
        assert_eq!(find_item(&model, "c").unwrap().item.parent_id.as_deref(), Some("d"));
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_reassign_child_checks_parents_first() {
        let mut model = model();
        let before = model.clone();
        let err = reassign_child(&mut model, Some("b"), Some("ghost"), "c", None).unwrap_err();

        assert_eq!(err, ModelError::ParentNotFound("ghost".into()));
        assert_eq!(model, before);
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut model = model();
        assert_eq!(add_child(&mut model, "a", "b", Some(5)).unwrap(), 0);
        assert_eq!(find_item(&model, "a").unwrap().item.child_ids.len(), 1);
    }

    #[test]
    fn test_descendants_and_cycle_check() {
        let model = model();
        assert_eq!(descendants(&model, "a"), vec!["b", "c"]);
        assert!(is_descendant(&model, "a", "c"));
        assert!(!is_descendant(&model, "c", "a"));
    }

    #[test]
    fn test_ordered_child_position_uses_display_order() {
        let mut model = model();
        // Put d under a, displayed after b and c
        reassign_child(&mut model, None, Some("a"), "d", None).unwrap();
        assert_eq!(ordered_child_position(&model, "a", "d"), 1);
        assert_eq!(ordered_child_position(&model, "a", "b"), 0);
    }
}
