//! Validation and application of operations against the canonical model.
//!
//! `apply` always validates first and only writes once every lookup it
//! depends on has succeeded, so a failed operation leaves the model
//! untouched.

use crate::operations::{
    ApplyResult, CreateParams, DeletedItem, MergeParams, MoveParams, OpKind, Operation,
    OperationError, OperationKind, PositionedItem, ReparentParams, SetTextParams, SplitParams,
};
use std::collections::HashSet;
use twodo_model::tree::{self, ItemPath, ItemRef};
use twodo_model::{CanonicalModel, DocumentId, Item, ItemId};

impl Operation {
    /// Check the operation against the current model without touching it
    pub fn validate(&self, model: &CanonicalModel) -> Result<(), OperationError> {
        if self.item_id.is_empty() {
            return Err(OperationError::MissingItemId);
        }

        if let OperationKind::Create(params) = &self.kind {
            return validate_create(model, &self.item_id, params);
        }

        let found = tree::find_item(model, &self.item_id)
            .ok_or_else(|| OperationError::ItemNotFound(self.item_id.clone()))?;

        match &self.kind {
            OperationKind::SetText(_) | OperationKind::Delete | OperationKind::Create(_) => Ok(()),
            OperationKind::Split(params) => validate_split(model, &found, params),
            OperationKind::Merge(params) => validate_merge(model, &found, params),
            OperationKind::Move(params) => validate_move(model, &found, params),
            OperationKind::Reparent(params) => validate_reparent(model, &found, params),
        }
    }

    /// Validate, then mutate the model
    pub fn apply(&self, model: &mut CanonicalModel) -> Result<ApplyResult, OperationError> {
        self.validate(model)?;

        let id = self.item_id.as_str();
        let result = match &self.kind {
            OperationKind::SetText(params) => apply_set_text(model, id, params),
            OperationKind::Split(params) => apply_split(model, id, params),
            OperationKind::Merge(params) => apply_merge(model, id, params),
            OperationKind::Move(params) => apply_move(model, id, params),
            OperationKind::Reparent(params) => apply_reparent(model, id, params),
            OperationKind::Delete => apply_delete(model, id),
            OperationKind::Create(params) => apply_create(model, id, params),
        }?;

        tracing::trace!(op = self.op_type(), item_id = id, "Applied operation");
        Ok(result)
    }

    /// Document the operation targets, if it can be resolved
    pub fn resolve_document(&self, model: &CanonicalModel) -> Option<DocumentId> {
        match &self.kind {
            OperationKind::Create(params) => create_target(model, params)
                .ok()
                .map(|(document_index, _)| model.documents[document_index].id.clone()),
            _ => tree::find_item(model, &self.item_id).map(|found| found.document_id.to_string()),
        }
    }
}

/// Byte offset of the `caret`-th character, clamped to the end
fn byte_offset(text: &str, caret: usize) -> usize {
    text.char_indices()
        .nth(caret)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

fn path_of(model: &CanonicalModel, item_id: &str) -> Result<ItemPath, OperationError> {
    tree::locate(model, item_id).ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))
}

fn item_mut<'a>(model: &'a mut CanonicalModel, item_id: &str) -> Result<&'a mut Item, OperationError> {
    let path = path_of(model, item_id)?;
    tree::item_at_mut(model, path).ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))
}

fn group_id_at(model: &CanonicalModel, document_index: usize, group_index: usize) -> String {
    model.documents[document_index].groups[group_index].id.clone()
}

fn child_position_in(parent: Option<&Item>, item_id: &str) -> Option<usize> {
    parent.and_then(|p| p.child_ids.iter().position(|c| c == item_id))
}

fn resolve_parent<'a>(
    model: &'a CanonicalModel,
    found: &ItemRef<'_>,
    parent_id: &str,
) -> Result<ItemRef<'a>, OperationError> {
    let parent = tree::find_item(model, parent_id)
        .ok_or_else(|| OperationError::ParentNotFound(parent_id.to_string()))?;
    if parent.document_id != found.document_id {
        return Err(OperationError::CrossDocument);
    }
    Ok(parent)
}

/// A new parent must exist in the same document and must not sit below the item
fn validate_target_parent<'a>(
    model: &'a CanonicalModel,
    found: &ItemRef<'_>,
    parent_id: Option<&str>,
) -> Result<Option<ItemRef<'a>>, OperationError> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };
    let cycle = || OperationError::CycleDetected {
        item_id: found.item.id.clone(),
        parent_id: parent_id.to_string(),
    };

    if parent_id == found.item.id {
        return Err(cycle());
    }
    let parent = resolve_parent(model, found, parent_id)?;
    if tree::is_descendant(model, &found.item.id, parent_id) {
        return Err(cycle());
    }
    Ok(Some(parent))
}

fn validate_split(
    model: &CanonicalModel,
    found: &ItemRef<'_>,
    params: &SplitParams,
) -> Result<(), OperationError> {
    let length = found.item.text.chars().count();
    if params.caret_position > length {
        return Err(OperationError::CaretOutOfRange {
            caret: params.caret_position,
            length,
        });
    }
    if params.new_item_id.is_empty() {
        return Err(OperationError::InvalidParams {
            kind: OpKind::Split,
            message: "newItemId is empty".to_string(),
        });
    }
    if tree::locate(model, &params.new_item_id).is_some() {
        return Err(OperationError::AlreadyExists(params.new_item_id.clone()));
    }

    for child_id in &params.take_children {
        if !found.item.child_ids.contains(child_id) {
            return Err(OperationError::InvalidStructure(format!(
                "'{}' is not a child of '{}'",
                child_id, found.item.id
            )));
        }
        if tree::locate(model, child_id).is_none() {
            return Err(OperationError::ItemNotFound(child_id.clone()));
        }
    }

    if let Some(parent_id) = params.placement.as_ref().and_then(|p| p.parent_id.as_deref()) {
        if parent_id != found.item.id {
            resolve_parent(model, found, parent_id)?;
        }
        let under_taken_child = params
            .take_children
            .iter()
            .any(|child| child == parent_id || tree::is_descendant(model, child, parent_id));
        if under_taken_child {
            return Err(OperationError::CycleDetected {
                item_id: params.new_item_id.clone(),
                parent_id: parent_id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_merge(
    model: &CanonicalModel,
    found: &ItemRef<'_>,
    params: &MergeParams,
) -> Result<(), OperationError> {
    if params.previous_item_id == found.item.id {
        return Err(OperationError::InvalidStructure(format!(
            "cannot merge '{}' into itself",
            found.item.id
        )));
    }
    let previous = tree::find_item(model, &params.previous_item_id)
        .ok_or_else(|| OperationError::ItemNotFound(params.previous_item_id.clone()))?;

    if previous.document_id != found.document_id || previous.group_id != found.group_id {
        return Err(OperationError::CrossGroupMerge {
            item_group: found.group_id.to_string(),
            previous_group: previous.group_id.to_string(),
        });
    }
    if tree::is_descendant(model, &found.item.id, &params.previous_item_id) {
        return Err(OperationError::InvalidStructure(format!(
            "cannot merge '{}' into its descendant '{}'",
            found.item.id, params.previous_item_id
        )));
    }
    Ok(())
}

fn validate_move(
    model: &CanonicalModel,
    found: &ItemRef<'_>,
    params: &MoveParams,
) -> Result<(), OperationError> {
    validate_target_parent(model, found, params.new_parent_id.as_deref())?;

    if let Some(group_id) = &params.group_id {
        let document = &model.documents[found.path.document_index];
        if document.group(group_id).is_none() {
            return match tree::locate_group(model, group_id) {
                Some(_) => Err(OperationError::CrossDocument),
                None => Err(OperationError::GroupNotFound(group_id.clone())),
            };
        }
    }
    Ok(())
}

fn validate_reparent(
    model: &CanonicalModel,
    found: &ItemRef<'_>,
    params: &ReparentParams,
) -> Result<(), OperationError> {
    let parent = validate_target_parent(model, found, params.new_parent_id.as_deref())?;
    let expected = parent
        .map(|p| tree::compute_depth(model, p.item) + 1)
        .unwrap_or(0);

    if params.new_depth != expected {
        return Err(OperationError::DepthMismatch {
            expected,
            given: params.new_depth,
        });
    }
    Ok(())
}

/// Where a created item lands: `(document_index, group_index)`.
///
/// Explicit group first, then the parent's group, then the first group of
/// the named (or only resident) document.
fn create_target(model: &CanonicalModel, params: &CreateParams) -> Result<(usize, usize), OperationError> {
    let document_index = match &params.document_id {
        Some(document_id) => Some(
            model
                .document_index(document_id)
                .ok_or_else(|| OperationError::DocumentNotFound(document_id.clone()))?,
        ),
        None => None,
    };

    if let Some(group_id) = &params.group_id {
        return match document_index {
            Some(d) => model.documents[d]
                .groups
                .iter()
                .position(|g| &g.id == group_id)
                .map(|g| (d, g))
                .ok_or_else(|| OperationError::GroupNotFound(group_id.clone())),
            None => tree::locate_group(model, group_id)
                .ok_or_else(|| OperationError::GroupNotFound(group_id.clone())),
        };
    }

    if let Some(parent_id) = &params.parent_id {
        let path = tree::locate(model, parent_id)
            .ok_or_else(|| OperationError::ParentNotFound(parent_id.clone()))?;
        return Ok((path.document_index, path.group_index));
    }

    let d = match document_index {
        Some(d) => d,
        None if model.documents.len() == 1 => 0,
        None => {
            return Err(OperationError::InvalidParams {
                kind: OpKind::Create,
                message: "root-level create needs groupId or documentId".to_string(),
            })
        }
    };
    if model.documents[d].groups.is_empty() {
        return Err(OperationError::GroupNotFound(format!(
            "document '{}' has no groups",
            model.documents[d].id
        )));
    }
    Ok((d, 0))
}

fn validate_create(
    model: &CanonicalModel,
    item_id: &str,
    params: &CreateParams,
) -> Result<(), OperationError> {
    if params.item_type.is_empty() {
        return Err(OperationError::InvalidParams {
            kind: OpKind::Create,
            message: "type is empty".to_string(),
        });
    }
    if tree::locate(model, item_id).is_some() {
        return Err(OperationError::AlreadyExists(item_id.to_string()));
    }

    let (document_index, _) = create_target(model, params)?;

    if let Some(parent_id) = &params.parent_id {
        let path = tree::locate(model, parent_id)
            .ok_or_else(|| OperationError::ParentNotFound(parent_id.clone()))?;
        if path.document_index != document_index {
            return Err(OperationError::CrossDocument);
        }
    }

    let document = &model.documents[document_index];
    let mut seen = HashSet::from([item_id]);
    for entry in &params.descendants {
        let id = entry.item.id.as_str();
        if id.is_empty() {
            return Err(OperationError::InvalidParams {
                kind: OpKind::Create,
                message: "descendant without id".to_string(),
            });
        }
        if !seen.insert(id) || tree::locate(model, id).is_some() {
            return Err(OperationError::AlreadyExists(id.to_string()));
        }
        if document.group(&entry.group_id).is_none() {
            return Err(OperationError::GroupNotFound(entry.group_id.clone()));
        }
    }
    Ok(())
}

fn apply_set_text(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &SetTextParams,
) -> Result<ApplyResult, OperationError> {
    let item = item_mut(model, item_id)?;
    let old_text = std::mem::replace(&mut item.text, params.text.clone());

    Ok(ApplyResult::SetText {
        old_text,
        new_text: params.text.clone(),
    })
}

fn apply_split(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &SplitParams,
) -> Result<ApplyResult, OperationError> {
    let path = path_of(model, item_id)?;

    let (new_item, target_index, explicit_position) = {
        let item = tree::item_at(model, path)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        let offset = byte_offset(&item.text, params.caret_position);

        let (parent_id, target_index, explicit_position) = match &params.placement {
            Some(placement) => (
                placement.parent_id.clone(),
                placement.index,
                placement.child_position,
            ),
            None => (item.parent_id.clone(), path.item_index + 1, None),
        };

        let new_item = Item {
            id: params.new_item_id.clone(),
            item_type: params.item_type.clone().unwrap_or_else(|| item.item_type.clone()),
            text: item.text[offset..].to_string(),
            parent_id,
            child_ids: params.take_children.clone(),
            config: params.config.clone().unwrap_or_default(),
        };
        (new_item, target_index, explicit_position)
    };

    {
        let item = tree::item_at_mut(model, path)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        let offset = byte_offset(&item.text, params.caret_position);
        item.text.truncate(offset);
        item.child_ids.retain(|c| !params.take_children.contains(c));
    }

    let new_id = new_item.id.clone();
    let parent_id = new_item.parent_id.clone();
    let group = tree::group_mut(model, path.document_index, path.group_index)
        .ok_or_else(|| OperationError::GroupNotFound(format!("#{}", path.group_index)))?;
    let index = tree::insert_at(group, new_item, target_index);

    for child_id in &params.take_children {
        item_mut(model, child_id)?.parent_id = Some(new_id.clone());
    }

    if let Some(parent_id) = &parent_id {
        let position = explicit_position
            .unwrap_or_else(|| tree::ordered_child_position(model, parent_id, &new_id));
        tree::add_child(model, parent_id, &new_id, Some(position))?;
    }

    Ok(ApplyResult::Split {
        new_item_id: new_id,
        caret_position: params.caret_position,
        index,
    })
}

fn apply_merge(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &MergeParams,
) -> Result<ApplyResult, OperationError> {
    let previous_id = params.previous_item_id.as_str();

    let (merged, path, original_child_position, live_parent, adopted) = {
        let found = tree::find_item(model, item_id)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        let adopted: Vec<ItemId> = found
            .item
            .child_ids
            .iter()
            .filter(|c| tree::locate(model, c).is_some())
            .cloned()
            .collect();
        (
            found.item.clone(),
            found.path,
            child_position_in(found.parent_item, item_id),
            found.parent_item.map(|p| p.id.clone()),
            adopted,
        )
    };

    let previous = item_mut(model, previous_id)?;
    let caret_position = previous.text.chars().count();
    previous.text.push_str(&merged.text);

    let group = tree::group_mut(model, path.document_index, path.group_index)
        .ok_or_else(|| OperationError::GroupNotFound(format!("#{}", path.group_index)))?;
    tree::remove_at(group, path.item_index);

    if let Some(parent_id) = &live_parent {
        tree::remove_child(model, parent_id, item_id)?;
    }
    for child_id in &adopted {
        item_mut(model, child_id)?.parent_id = Some(previous_id.to_string());
        tree::add_child(model, previous_id, child_id, None)?;
    }

    Ok(ApplyResult::Merge {
        previous_item_id: previous_id.to_string(),
        caret_position,
        original_parent_id: merged.parent_id.clone(),
        original_index: path.item_index,
        original_child_position,
        adopted_children: adopted,
        merged,
    })
}

fn apply_move(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &MoveParams,
) -> Result<ApplyResult, OperationError> {
    let (path, old_parent_id, live_parent, old_child_position, target_group) = {
        let found = tree::find_item(model, item_id)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        let document = &model.documents[found.path.document_index];

        let target_group = match (&params.group_id, &params.new_parent_id) {
            (Some(group_id), _) => document
                .groups
                .iter()
                .position(|g| &g.id == group_id)
                .ok_or_else(|| OperationError::GroupNotFound(group_id.clone()))?,
            (None, Some(parent_id)) => path_of(model, parent_id)?.group_index,
            (None, None) => found.path.group_index,
        };
        (
            found.path,
            found.item.parent_id.clone(),
            found.parent_item.map(|p| p.id.clone()),
            child_position_in(found.parent_item, item_id),
            target_group,
        )
    };

    let group = tree::group_mut(model, path.document_index, path.group_index)
        .ok_or_else(|| OperationError::GroupNotFound(format!("#{}", path.group_index)))?;
    let mut item = tree::remove_at(group, path.item_index)
        .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;

    if let Some(parent_id) = &live_parent {
        tree::remove_child(model, parent_id, item_id)?;
    }

    item.parent_id = params.new_parent_id.clone();
    let target = tree::group_mut(model, path.document_index, target_group)
        .ok_or_else(|| OperationError::GroupNotFound(format!("#{}", target_group)))?;
    let new_index = tree::insert_at(target, item, params.new_index);

    if let Some(parent_id) = &params.new_parent_id {
        let position = params
            .child_position
            .unwrap_or_else(|| tree::ordered_child_position(model, parent_id, item_id));
        tree::add_child(model, parent_id, item_id, Some(position))?;
    }

    Ok(ApplyResult::Move {
        old_parent_id,
        old_group_id: group_id_at(model, path.document_index, path.group_index),
        old_index: path.item_index,
        old_child_position,
        new_parent_id: params.new_parent_id.clone(),
        new_group_id: group_id_at(model, path.document_index, target_group),
        new_index,
    })
}

fn apply_reparent(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &ReparentParams,
) -> Result<ApplyResult, OperationError> {
    let (old_parent_id, live_parent, old_child_position, old_depth) = {
        let found = tree::find_item(model, item_id)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        (
            found.item.parent_id.clone(),
            found.parent_item.map(|p| p.id.clone()),
            child_position_in(found.parent_item, item_id),
            tree::compute_depth(model, found.item),
        )
    };

    let position = params.child_position.or_else(|| {
        params
            .new_parent_id
            .as_deref()
            .map(|parent_id| tree::ordered_child_position(model, parent_id, item_id))
    });

    tree::reassign_child(
        model,
        live_parent.as_deref(),
        params.new_parent_id.as_deref(),
        item_id,
        position,
    )?;

    Ok(ApplyResult::Reparent {
        old_parent_id,
        old_depth,
        old_child_position,
        new_parent_id: params.new_parent_id.clone(),
        new_depth: params.new_depth,
    })
}

/// Removes the item and its whole subtree
fn apply_delete(model: &mut CanonicalModel, item_id: &str) -> Result<ApplyResult, OperationError> {
    let (snapshot, mut paths, live_parent) = {
        let found = tree::find_item(model, item_id)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.to_string()))?;
        let document_index = found.path.document_index;
        let document = &model.documents[document_index];

        let mut entries: Vec<(ItemPath, PositionedItem)> = tree::descendants(model, item_id)
            .iter()
            .filter_map(|id| tree::locate_in_document(model, document_index, id))
            .filter_map(|path| {
                let item = tree::item_at(model, path)?;
                Some((
                    path,
                    PositionedItem {
                        group_id: document.groups[path.group_index].id.clone(),
                        index: path.item_index,
                        item: item.clone(),
                    },
                ))
            })
            .collect();
        entries.sort_by_key(|(path, _)| *path);

        let mut paths: Vec<ItemPath> = entries.iter().map(|(path, _)| *path).collect();
        paths.push(found.path);

        let snapshot = DeletedItem {
            item: found.item.clone(),
            document_id: found.document_id.to_string(),
            group_id: found.group_id.to_string(),
            index: found.item_index,
            parent_id: found.item.parent_id.clone(),
            child_position: child_position_in(found.parent_item, item_id),
            descendants: entries.into_iter().map(|(_, entry)| entry).collect(),
        };
        (snapshot, paths, found.parent_item.map(|p| p.id.clone()))
    };

    // Back to front so earlier indices stay valid
    paths.sort();
    for path in paths.iter().rev() {
        if let Some(group) = tree::group_mut(model, path.document_index, path.group_index) {
            tree::remove_at(group, path.item_index);
        }
    }

    if let Some(parent_id) = &live_parent {
        tree::remove_child(model, parent_id, item_id)?;
    }

    tracing::debug!(
        item_id,
        removed = snapshot.descendants.len() + 1,
        "Deleted subtree"
    );
    Ok(ApplyResult::Delete { snapshot })
}

fn apply_create(
    model: &mut CanonicalModel,
    item_id: &str,
    params: &CreateParams,
) -> Result<ApplyResult, OperationError> {
    let (document_index, group_index) = create_target(model, params)?;

    let mut root = params
        .item_data
        .clone()
        .unwrap_or_else(|| Item::new(item_id, params.item_type.clone()));
    root.id = item_id.to_string();
    root.item_type = params.item_type.clone();
    root.parent_id = params.parent_id.clone();
    if params.descendants.is_empty() {
        root.child_ids.clear();
    }

    let mut inserts: Vec<(usize, usize, Item)> = vec![(group_index, params.index, root)];
    for entry in &params.descendants {
        let g = model.documents[document_index]
            .groups
            .iter()
            .position(|g| g.id == entry.group_id)
            .ok_or_else(|| OperationError::GroupNotFound(entry.group_id.clone()))?;
        inserts.push((g, entry.index, entry.item.clone()));
    }
    // Ascending order restores every original index exactly
    inserts.sort_by_key(|(g, index, _)| (*g, *index));

    let mut root_index = 0;
    for (g, index, item) in inserts {
        let is_root = item.id == item_id;
        let group = tree::group_mut(model, document_index, g)
            .ok_or_else(|| OperationError::GroupNotFound(format!("#{}", g)))?;
        let used = tree::insert_at(group, item, index);
        if is_root {
            root_index = used;
        }
    }

    if let Some(parent_id) = &params.parent_id {
        let position = params
            .child_position
            .unwrap_or_else(|| tree::ordered_child_position(model, parent_id, item_id));
        tree::add_child(model, parent_id, item_id, Some(position))?;
    }

    Ok(ApplyResult::Create {
        item_id: item_id.to_string(),
        group_id: group_id_at(model, document_index, group_index),
        index: root_index,
        restored_descendants: params.descendants.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::ErrorCategory;
    use twodo_model::{Document, Group};

    /// g-1: a, b (child of a), c ; g-2: z
    fn model() -> CanonicalModel {
        let mut a = Item::with_text("a", "Hello");
        a.child_ids = vec!["b".into()];
        let mut b = Item::with_text("b", "World");
        b.parent_id = Some("a".into());
        let c = Item::with_text("c", "Third");

        CanonicalModel::with_documents(vec![Document::new("doc-1")
            .with_group(Group::with_items("g-1", vec![a, b, c]))
            .with_group(Group::with_items("g-2", vec![Item::with_text("z", "Zed")]))])
    }

    fn text(model: &CanonicalModel, id: &str) -> String {
        tree::find_item(model, id).unwrap().item.text.clone()
    }

    #[test]
    fn test_set_text_records_old_text() {
        let mut model = model();
        let result = Operation::set_text("a", "Hi", None).apply(&mut model).unwrap();

        assert_eq!(
            result,
            ApplyResult::SetText {
                old_text: "Hello".into(),
                new_text: "Hi".into()
            }
        );
        assert_eq!(text(&model, "a"), "Hi");
    }

    #[test]
    fn test_split_places_tail_after_item() {
        let mut model = model();
        Operation::split("c", 3, "c2").apply(&mut model).unwrap();

        assert_eq!(text(&model, "c"), "Thi");
        assert_eq!(text(&model, "c2"), "rd");
        assert_eq!(model.item_ids("doc-1"), vec!["a", "b", "c", "c2", "z"]);
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let mut model = model();
        Operation::set_text("c", "héllo", None).apply(&mut model).unwrap();
        Operation::split("c", 2, "c2").apply(&mut model).unwrap();

        assert_eq!(text(&model, "c"), "hé");
        assert_eq!(text(&model, "c2"), "llo");
    }

    #[test]
    fn test_split_of_child_joins_same_parent() {
        let mut model = model();
        Operation::split("b", 2, "b2").apply(&mut model).unwrap();

        let a = tree::find_item(&model, "a").unwrap().item;
        assert_eq!(a.child_ids, vec!["b", "b2"]);
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_split_rejects_caret_past_end() {
        let mut model = model();
        let err = Operation::split("a", 6, "x").apply(&mut model).unwrap_err();
        assert_eq!(err, OperationError::CaretOutOfRange { caret: 6, length: 5 });
        assert!(tree::locate(&model, "x").is_none());
    }

    #[test]
    fn test_merge_appends_text_and_adopts_children() {
        let mut model = model();
        let result = Operation::merge("a", "c").apply(&mut model).unwrap();

        assert_eq!(text(&model, "c"), "ThirdHello");
        assert!(tree::locate(&model, "a").is_none());
        assert_eq!(tree::find_item(&model, "c").unwrap().item.child_ids, vec!["b"]);
        assert_eq!(tree::find_item(&model, "b").unwrap().item.parent_id.as_deref(), Some("c"));
        match result {
            ApplyResult::Merge {
                caret_position,
                adopted_children,
                ..
            } => {
                assert_eq!(caret_position, 5);
                assert_eq!(adopted_children, vec!["b"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_merge_rejects_other_group() {
        let mut model = model();
        let err = Operation::merge("z", "a").apply(&mut model).unwrap_err();
        assert!(matches!(err, OperationError::CrossGroupMerge { .. }));
    }

    #[test]
    fn test_move_rejects_cycle() {
        let mut model = model();
        let err = Operation::move_to("a", Some("b"), 0).apply(&mut model).unwrap_err();
        assert!(matches!(err, OperationError::CycleDetected { .. }));
    }

    #[test]
    fn test_move_clamps_index_and_links_parent() {
        let mut model = model();
        let result = Operation::move_to("c", Some("a"), 99).apply(&mut model).unwrap();

        match result {
            ApplyResult::Move { new_index, .. } => assert_eq!(new_index, 2),
            other => panic!("unexpected {:?}", other),
        }
        let a = tree::find_item(&model, "a").unwrap().item;
        assert_eq!(a.child_ids, vec!["b", "c"]);
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_reparent_checks_depth() {
        let mut model = model();
        let err = Operation::reparent("c", Some("b"), 1).apply(&mut model).unwrap_err();
        assert_eq!(err, OperationError::DepthMismatch { expected: 2, given: 1 });

        Operation::reparent("c", Some("b"), 2).apply(&mut model).unwrap();
        assert_eq!(tree::depth_of(&model, "c"), Some(2));
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_delete_cascades_to_descendants() {
        let mut model = model();
        let result = Operation::delete("a").apply(&mut model).unwrap();

        assert_eq!(model.item_ids("doc-1"), vec!["c", "z"]);
        match result {
            ApplyResult::Delete { snapshot } => {
                assert_eq!(snapshot.index, 0);
                assert_eq!(snapshot.descendants.len(), 1);
                assert_eq!(snapshot.descendants[0].item.id, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_under_parent() {
        let mut model = model();
        Operation::create("n", "task", Some("a"), 1).apply(&mut model).unwrap();

        let n = tree::find_item(&model, "n").unwrap();
        assert_eq!(n.item.item_type, "task");
        assert_eq!(n.group_id, "g-1");
        assert_eq!(tree::find_item(&model, "a").unwrap().item.child_ids, vec!["n", "b"]);
        model.check_integrity().unwrap();
    }

    #[test]
    fn test_create_rejects_duplicate_and_missing_parent() {
        let mut model = model();
        assert_eq!(
            Operation::create("a", "text", None, 0).apply(&mut model).unwrap_err(),
            OperationError::AlreadyExists("a".into())
        );
        let err = Operation::create("n", "text", Some("ghost"), 0)
            .apply(&mut model)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let mut model = model();
        let before = model.clone();
        let err = Operation::set_text("ghost", "x", None).apply(&mut model).unwrap_err();

        assert_eq!(err, OperationError::ItemNotFound("ghost".into()));
        assert_eq!(model, before);
    }

    #[test]
    fn test_resolve_document() {
        let model = model();
        assert_eq!(Operation::delete("z").resolve_document(&model).as_deref(), Some("doc-1"));
        assert_eq!(
            Operation::create_in_group("n", "text", "g-2", 0)
                .resolve_document(&model)
                .as_deref(),
            Some("doc-1")
        );
        assert!(Operation::delete("ghost").resolve_document(&model).is_none());
    }
}
