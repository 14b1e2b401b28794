//! Authority arbitration and text sync through a session

use std::sync::Arc;
use std::time::Duration;
use twodo_editor::{
    ApplyOutcome, Authority, CanonicalModel, Document, EditSession, EditorConfig, EditorError,
    EditorEvent, Group, Item, ManualClock, MemoryStore, Operation, OutlineProjection, OutlineSyntax,
    ProjectedView, RejectReason,
};
use twodo_model::tree;

fn model() -> CanonicalModel {
    CanonicalModel::with_documents(vec![Document::new("page-1").with_group(Group::with_items(
        "g-1",
        vec![Item::with_text("item-1", "Item 1"), Item::with_text("item-2", "Item 2")],
    ))])
}

fn session() -> (EditSession, ManualClock) {
    let clock = ManualClock::default();
    let session = EditSession::with_parts(
        "client-1",
        model(),
        EditorConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
    );
    (session, clock)
}

#[test]
fn test_markdown_authority_rejects_canonical_edit() {
    let (mut session, _) = session();
    session.set_authority("page-1", "view-1", Authority::Markdown);
    let mut rx = session.events().watch();

    let outcome = session.apply(Operation::set_text("item-1", "Hi", None));
    assert_eq!(
        outcome,
        ApplyOutcome::Rejected {
            reason: RejectReason::AuthorityConflict,
            document_id: "page-1".into(),
            authority: Authority::Markdown,
        }
    );

    match rx.try_recv().unwrap() {
        EditorEvent::OperationRejected { reason, .. } => {
            assert_eq!(reason.as_str(), "authority_conflict")
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(session.manager().logs().log("page-1").is_none());
}

#[test]
fn test_source_tag_admits_edit_until_it_expires() {
    let (mut session, clock) = session();
    session.set_authority("page-1", "view-1", Authority::Markdown);

    session
        .manager_mut()
        .arbitrator_mut()
        .unwrap()
        .prevent_circular_update("page-1", "view-1", twodo_editor::UpdateSource::Markdown);
    assert!(session
        .apply(Operation::set_text("item-1", "Hi", None))
        .is_success());

    clock.advance(Duration::from_millis(200));
    assert!(!session
        .apply(Operation::set_text("item-1", "Again", None))
        .is_success());
}

#[test]
fn test_other_documents_stay_editable() {
    let (mut session, _) = session();
    session.set_authority("page-2", "view-9", Authority::Latex);

    assert!(session
        .apply(Operation::set_text("item-1", "Free", None))
        .is_success());
}

#[test]
fn test_back_to_canonical_restores_edits() {
    let (mut session, _) = session();
    session.set_authority("page-1", "view-1", Authority::Markdown);
    let old = session.set_authority("page-1", "view-1", Authority::Canonical);

    assert_eq!(old, Authority::Markdown);
    assert!(session
        .apply(Operation::set_text("item-1", "Hi", None))
        .is_success());
}

#[test]
fn test_markdown_view_edit_flows_into_model_and_views() {
    let (mut session, clock) = session();
    session.register_view(Box::new(ProjectedView::new("md", "page-1", OutlineProjection)));
    session.register_view(Box::new(ProjectedView::new("outline", "page-1", OutlineProjection)));
    session.set_authority("page-1", "md", Authority::Markdown);

    let before = session.render("page-1", OutlineSyntax::Markdown).unwrap();
    assert_eq!(before, "- Item 1\n- Item 2\n");

    let applied = session
        .sync_text("page-1", "md", &before, "- Item 1\n- Edited in markdown\n")
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(
        tree::find_item(session.model(), "item-2").unwrap().item.text,
        "Edited in markdown"
    );

    // Undo runs through authority like any edit; Markdown still owns the page
    clock.advance(Duration::from_millis(200));
    assert!(matches!(
        session.undo(),
        Err(EditorError::AuthorityConflict { .. })
    ));
    assert!(session.manager().can_undo());
}

#[test]
fn test_latex_render_and_sync() {
    let (mut session, _) = session();
    session.set_authority("page-1", "tex", Authority::Latex);

    let before = session.render("page-1", OutlineSyntax::Latex).unwrap();
    assert_eq!(
        before,
        "\\begin{itemize}\n\\item Item 1\n\\item Item 2\n\\end{itemize}\n"
    );

    let after = before.replace("Item 1", "First");
    session.sync_text("page-1", "tex", &before, &after).unwrap();
    assert_eq!(
        tree::find_item(session.model(), "item-1").unwrap().item.text,
        "First"
    );
}

#[test]
fn test_destroyed_view_releases_authority() {
    let (mut session, _) = session();
    session.register_view(Box::new(ProjectedView::new("md", "page-1", OutlineProjection)));
    session.set_authority("page-1", "md", Authority::Markdown);
    assert!(!session
        .apply(Operation::set_text("item-1", "Blocked", None))
        .is_success());

    let mut rx = session.events().watch();
    session.destroy_view("md").unwrap();

    assert_eq!(session.get_authority("page-1", "md"), Authority::Canonical);
    match rx.try_recv().unwrap() {
        EditorEvent::AuthorityModeChanged { new_mode, .. } => {
            assert_eq!(new_mode, Authority::Canonical)
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(session
        .apply(Operation::set_text("item-1", "Free again", None))
        .is_success());
    assert_eq!(
        tree::find_item(session.model(), "item-1").unwrap().item.text,
        "Free again"
    );
}
