//! Inversion of applied operations.
//!
//! The inverse is computed from the [`ApplyResult`] of the forward
//! application, never from the operation alone, so it can restore exactly
//! what the forward step destroyed (old text, positions, deleted subtrees).

use crate::operations::{
    ApplyResult, CreateParams, MergeParams, MoveParams, Operation, OperationKind, Placement,
    ReparentParams, SetTextParams, SplitParams,
};

impl Operation {
    /// Build the operation that undoes `self`, given what applying it did.
    ///
    /// Returns `None` when `result` does not belong to this operation kind.
    pub fn invert(&self, result: &ApplyResult) -> Option<Operation> {
        let same_item = self.item_id.clone();
        let (item_id, kind) = match (&self.kind, result) {
            (OperationKind::SetText(params), ApplyResult::SetText { old_text, .. }) => (
                same_item,
                OperationKind::SetText(SetTextParams {
                    text: old_text.clone(),
                    old_text: Some(params.text.clone()),
                }),
            ),

            // The split-off item merges back into the original
            (OperationKind::Split(_), ApplyResult::Split { new_item_id, .. }) => (
                new_item_id.clone(),
                OperationKind::Merge(MergeParams {
                    previous_item_id: same_item,
                }),
            ),

            (
                OperationKind::Merge(_),
                ApplyResult::Merge {
                    previous_item_id,
                    caret_position,
                    merged,
                    original_parent_id,
                    original_index,
                    original_child_position,
                    adopted_children,
                },
            ) => (
                previous_item_id.clone(),
                OperationKind::Split(SplitParams {
                    caret_position: *caret_position,
                    new_item_id: merged.id.clone(),
                    item_type: Some(merged.item_type.clone()),
                    config: Some(merged.config.clone()),
                    take_children: adopted_children.clone(),
                    placement: Some(Placement {
                        parent_id: original_parent_id.clone(),
                        index: *original_index,
                        child_position: *original_child_position,
                    }),
                }),
            ),

            (
                OperationKind::Move(_),
                ApplyResult::Move {
                    old_parent_id,
                    old_group_id,
                    old_index,
                    old_child_position,
                    ..
                },
            ) => (
                same_item,
                OperationKind::Move(MoveParams {
                    new_parent_id: old_parent_id.clone(),
                    new_index: *old_index,
                    group_id: Some(old_group_id.clone()),
                    child_position: *old_child_position,
                }),
            ),

            (
                OperationKind::Reparent(_),
                ApplyResult::Reparent {
                    old_parent_id,
                    old_depth,
                    old_child_position,
                    ..
                },
            ) => (
                same_item,
                OperationKind::Reparent(ReparentParams {
                    new_parent_id: old_parent_id.clone(),
                    new_depth: *old_depth,
                    child_position: *old_child_position,
                }),
            ),

            (OperationKind::Delete, ApplyResult::Delete { snapshot }) => (
                same_item,
                OperationKind::Create(CreateParams {
                    item_type: snapshot.item.item_type.clone(),
                    parent_id: snapshot.parent_id.clone(),
                    index: snapshot.index,
                    group_id: Some(snapshot.group_id.clone()),
                    document_id: Some(snapshot.document_id.clone()),
                    item_data: Some(snapshot.item.clone()),
                    child_position: snapshot.child_position,
                    descendants: snapshot.descendants.clone(),
                }),
            ),

            (OperationKind::Create(_), ApplyResult::Create { .. }) => (same_item, OperationKind::Delete),

            _ => return None,
        };

        Some(Operation {
            item_id,
            kind,
            timestamp: self.timestamp,
            client_id: self.client_id.clone(),
            sequence: None,
        })
    }
}
