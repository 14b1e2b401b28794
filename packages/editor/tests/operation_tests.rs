//! End-to-end operation scenarios through an edit session

use std::sync::Arc;
use twodo_editor::{
    ApplyOutcome, CanonicalModel, Document, EditSession, EditorConfig, Group, Item, ManualClock,
    MemoryStore, Operation, OperationDescriptor, OperationError,
};
use twodo_model::tree;

fn two_items() -> CanonicalModel {
    CanonicalModel::with_documents(vec![Document::new("page-1").with_group(Group::with_items(
        "g-1",
        vec![Item::with_text("item-1", "Item 1"), Item::with_text("item-2", "Item 2")],
    ))])
}

fn nested() -> CanonicalModel {
    let mut a = Item::with_text("a", "Alpha");
    a.child_ids = vec!["b".into()];
    let mut b = Item::with_text("b", "Beta");
    b.parent_id = Some("a".into());
    let c = Item::with_text("c", "Gamma");

    CanonicalModel::with_documents(vec![
        Document::new("page-1").with_group(Group::with_items("g-1", vec![a, b, c]))
    ])
}

fn session(model: CanonicalModel) -> EditSession {
    EditSession::with_parts(
        "client-1",
        model,
        EditorConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::default()),
    )
}

fn text(session: &EditSession, id: &str) -> String {
    tree::find_item(session.model(), id).unwrap().item.text.clone()
}

fn ids(session: &EditSession) -> Vec<String> {
    session.model().item_ids("page-1")
}

#[test]
fn test_set_text_is_logged_with_first_sequence() {
    let mut session = session(two_items());

    let outcome = session.apply(Operation::set_text("item-1", "Hi", Some("Item 1")));
    let applied = outcome.applied().unwrap();

    assert_eq!(applied.sequence, 1);
    assert_eq!(text(&session, "item-1"), "Hi");
    assert_eq!(text(&session, "item-2"), "Item 2");

    let log = session.manager().logs().log("page-1").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log.get_operations(0)[0].sequence, Some(1));
}

#[test]
fn test_split_places_new_item_right_after() {
    let mut session = session(CanonicalModel::with_documents(vec![Document::new("page-1")
        .with_group(Group::with_items(
            "g-1",
            vec![Item::with_text("item-1", "Hello"), Item::with_text("item-2", "After")],
        ))]));

    assert!(session.apply(Operation::split("item-1", 3, "item-new")).is_success());

    assert_eq!(text(&session, "item-1"), "Hel");
    assert_eq!(text(&session, "item-new"), "lo");
    assert_eq!(ids(&session), vec!["item-1", "item-new", "item-2"]);
}

#[test]
fn test_split_then_merge_restores_text() {
    let base = two_items();
    let mut session = session(base.clone());

    session.apply(Operation::split("item-1", 2, "item-1b"));
    session.apply(Operation::merge("item-1b", "item-1"));

    assert_eq!(text(&session, "item-1"), "Item 1");
    assert_eq!(session.model(), &base);
}

#[test]
fn test_create_then_delete_restores_item_set() {
    let base = two_items();
    let mut session = session(base.clone());

    session.apply(Operation::create("item-3", "bullet", None, 2));
    assert_eq!(ids(&session), vec!["item-1", "item-2", "item-3"]);

    session.apply(Operation::delete("item-3"));
    assert_eq!(session.model(), &base);
}

#[test]
fn test_set_text_undo_restores_exact_text() {
    let base = two_items();
    let mut session = session(base.clone());

    session.apply(Operation::set_text("item-2", "", None));
    session.undo().unwrap();

    assert_eq!(session.model(), &base);
}

#[test]
fn test_delete_subtree_then_undo() {
    let base = nested();
    let mut session = session(base.clone());

    session.apply(Operation::delete("a"));
    assert_eq!(ids(&session), vec!["c"]);

    session.undo().unwrap();
    assert_eq!(session.model(), &base);

    session.redo().unwrap();
    assert_eq!(ids(&session), vec!["c"]);
}

#[test]
fn test_structural_edits_undo_in_reverse_order() {
    let base = nested();
    let mut session = session(base.clone());

    assert!(session.apply(Operation::reparent("c", Some("a"), 1)).is_success());
    assert_eq!(
        tree::find_item(session.model(), "c").unwrap().item.parent_id.as_deref(),
        Some("a")
    );
    assert!(session.apply(Operation::move_to("b", None, 0)).is_success());
    assert!(session.apply(Operation::split("a", 3, "a2")).is_success());

    for _ in 0..3 {
        session.undo().unwrap();
    }
    assert_eq!(session.model(), &base);
    assert!(!session.manager().can_undo());
}

#[test]
fn test_sequences_strictly_increase_across_undo() {
    let mut session = session(two_items());

    session.apply(Operation::set_text("item-1", "A", None));
    session.apply(Operation::set_text("item-1", "B", None));
    session.undo().unwrap();
    session.apply(Operation::set_text("item-2", "C", None));

    let sequences: Vec<u64> = session
        .manager()
        .logs()
        .log("page-1")
        .unwrap()
        .get_operations(0)
        .iter()
        .filter_map(|op| op.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[test]
fn test_invalid_operations_leave_model_untouched() {
    let base = nested();
    let mut session = session(base.clone());

    let cycle = session.apply(Operation::reparent("a", Some("b"), 2));
    assert!(matches!(
        cycle,
        ApplyOutcome::Failed(OperationError::CycleDetected { .. })
    ));

    let caret = session.apply(Operation::split("c", 99, "c2"));
    assert!(matches!(
        caret,
        ApplyOutcome::Failed(OperationError::CaretOutOfRange { .. })
    ));

    let duplicate = session.apply(Operation::create("b", "bullet", None, 0));
    assert!(matches!(
        duplicate,
        ApplyOutcome::Failed(OperationError::AlreadyExists(_))
    ));

    assert_eq!(session.model(), &base);
    assert!(session.manager().get_last_operation().is_none());
}

#[test]
fn test_descriptor_from_wire_json() {
    let mut session = session(two_items());
    let descriptor: OperationDescriptor = serde_json::from_str(
        r#"{
            "op": "setText",
            "itemId": "item-2",
            "params": { "text": "From the wire", "oldText": "Item 2" },
            "timestamp": 1700000000000,
            "clientId": "peer"
        }"#,
    )
    .unwrap();

    let applied = session.apply_descriptor(&descriptor).into_result().unwrap();
    assert_eq!(applied.operation.client_id, "peer");
    assert_eq!(applied.operation.timestamp, 1_700_000_000_000);
    assert_eq!(text(&session, "item-2"), "From the wire");

    let unknown = OperationDescriptor {
        op: "indent".into(),
        ..descriptor
    };
    assert!(matches!(
        session.apply_descriptor(&unknown),
        ApplyOutcome::Failed(OperationError::UnknownKind(_))
    ));
}
