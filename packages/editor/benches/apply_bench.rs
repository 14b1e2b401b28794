use criterion::{black_box, criterion_group, criterion_main, Criterion};
use twodo_editor::{CanonicalModel, Document, Group, Item, OperationManager, Operation};

fn outline(items: usize) -> CanonicalModel {
    let items = (0..items)
        .map(|n| Item::with_text(format!("item-{}", n), format!("Item {}", n)))
        .collect();
    CanonicalModel::with_documents(vec![Document::new("page-1").with_group(Group::with_items("g-1", items))])
}

fn apply_set_text(c: &mut Criterion) {
    let mut model = outline(100);
    let mut manager = OperationManager::in_memory();

    c.bench_function("apply_set_text", |b| {
        b.iter(|| {
            manager.apply_operation(
                &mut model,
                black_box(Operation::set_text("item-50", "Edited", None)),
            )
        })
    });
}

fn split_then_undo(c: &mut Criterion) {
    let mut model = outline(100);
    let mut manager = OperationManager::in_memory();

    c.bench_function("split_then_undo", |b| {
        b.iter(|| {
            manager.apply_operation(&mut model, black_box(Operation::split("item-10", 3, "item-new")));
            manager.undo(&mut model)
        })
    });
}

fn invert_delete(c: &mut Criterion) {
    let model = outline(1_000);

    c.bench_function("invert_delete", |b| {
        b.iter(|| {
            let mut model = model.clone();
            let op = Operation::delete("item-500");
            let result = op.apply(&mut model).ok();
            result.and_then(|result| op.invert(black_box(&result)))
        })
    });
}

criterion_group!(benches, apply_set_text, split_then_undo, invert_delete);
criterion_main!(benches);
