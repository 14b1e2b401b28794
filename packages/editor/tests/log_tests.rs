//! Operation log persistence, replay and garbage collection

use std::sync::Arc;
use twodo_editor::{
    log_key, CanonicalModel, Document, EditSession, EditorConfig, FileStore, Group, Item,
    KeyValueStore, MemoryStore, Operation, OperationLog,
};

fn model() -> CanonicalModel {
    CanonicalModel::with_documents(vec![Document::new("page-1").with_group(Group::with_items(
        "g-1",
        vec![Item::with_text("item-1", "Hello world"), Item::with_text("item-2", "Second")],
    ))])
}

#[test]
fn test_persisted_log_rebuilds_model_in_new_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = model();

    let edited = {
        let mut session = EditSession::open(base.clone(), EditorConfig::default(), dir.path())?;
        session.apply(Operation::split("item-1", 5, "item-1b")).into_result()?;
        session.apply(Operation::set_text("item-1b", "there", None)).into_result()?;
        session.apply(Operation::reparent("item-1b", Some("item-1"), 1)).into_result()?;
        session.apply(Operation::delete("item-2")).into_result()?;
        session.into_model()
    };

    let store = FileStore::open(dir.path().join(".twodo/log"))?;
    assert!(store.get(&log_key("page-1"))?.is_some());

    let mut session = EditSession::open(base, EditorConfig::default(), dir.path())?;
    let outcomes = session.replay("page-1", 0, None);

    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(session.model(), &edited);

    // The sequence counter carries on where the last run stopped
    let next = session.apply(Operation::set_text("item-1", "Hi", None)).into_result()?;
    assert_eq!(next.sequence, 5);
    Ok(())
}

#[test]
fn test_replay_visits_range_in_order() {
    let mut log = OperationLog::in_memory("page-1");
    for n in 0..5 {
        log.append(Operation::set_text("item-1", n.to_string(), None));
    }

    let mut seen = Vec::new();
    let outcomes = log.replay(2, Some(4), |op| {
        seen.push(op.sequence.unwrap());
        Err(twodo_editor::OperationError::ItemNotFound(op.item_id.clone()))
    });

    assert_eq!(seen, vec![2, 3, 4]);
    assert!(outcomes.iter().all(|o| !o.is_ok()));
}

#[test]
fn test_gc_keeps_sequence_and_order() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut log = OperationLog::new("page-1", Arc::clone(&store), 3);
    for n in 0..10 {
        log.append(Operation::set_text("item-1", n.to_string(), None));
    }

    assert_eq!(log.len(), 3);
    assert_eq!(log.last_sequence(), 10);
    let sequences: Vec<_> = log.get_operations(0).iter().filter_map(|op| op.sequence).collect();
    assert_eq!(sequences, vec![8, 9, 10]);

    assert_eq!(log.gc(1), 2);
    assert_eq!(log.last_sequence(), 10);

    let reopened = OperationLog::open("page-1", store, 3).unwrap();
    assert_eq!(reopened.last_sequence(), 10);
    assert_eq!(reopened.len(), 1);
}

#[test]
fn test_remote_entries_merge_once() {
    let base = model();
    let mut author = EditSession::new("author", base.clone());
    author.apply(Operation::set_text("item-1", "Shared", None));
    author.apply(Operation::create("item-3", "bullet", None, 2));
    let entries = author.catch_up("page-1");

    let mut follower = EditSession::new("follower", base);
    let first = follower.merge_remote("page-1", entries.clone());
    let second = follower.merge_remote("page-1", entries);

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(follower.model(), author.model());
    assert_eq!(
        follower.manager().logs().log("page-1").unwrap().last_sequence(),
        2
    );
}

#[test]
fn test_unreadable_log_fails_session_open() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join(".twodo/log")).unwrap();
    store.set(&log_key("page-1"), "{ truncated").unwrap();

    let opened = EditSession::open(model(), EditorConfig::default(), dir.path());
    assert!(opened.is_err());
    assert_eq!(
        store.get(&log_key("page-1")).unwrap().as_deref(),
        Some("{ truncated")
    );
}

#[test]
fn test_spaced_document_id_keeps_sequence_across_sessions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = CanonicalModel::with_documents(vec![Document::new("my page").with_group(
        Group::with_items("g-1", vec![Item::with_text("item-1", "Hello")]),
    )]);

    {
        let mut session = EditSession::open(base.clone(), EditorConfig::default(), dir.path())?;
        session.apply(Operation::set_text("item-1", "One", None)).into_result()?;
        session.apply(Operation::set_text("item-1", "Two", None)).into_result()?;
    }

    let mut session = EditSession::open(base, EditorConfig::default(), dir.path())?;
    let applied = session.apply(Operation::set_text("item-1", "Three", None)).into_result()?;
    assert_eq!(applied.sequence, 3);
    Ok(())
}
