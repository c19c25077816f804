use criterion::{Criterion, criterion_group, criterion_main};
use surface_reconcile_engine::{EditorState, MirrorView, NoHooks, QuirkPolicy, Reconciler, Request, SurfaceView};
use surface_reconcile_model::{Node, builders::*};

fn large_doc(paragraphs: usize) -> Node {
    let children = (0..paragraphs).map(|i| {
        if i % 10 == 0 {
            ul([li([p([t("list item with "), em(t("emphasis"))])])])
        } else {
            p([t("Paragraph with some content and "), strong(t("bold")), t(" text.")])
        }
    });
    doc(children)
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    group.sample_size(10);

    let doc = large_doc(200);
    let state = EditorState::new(doc.clone());
    let reconciler = Reconciler::default();

    let mut typed = MirrorView::new(&doc, QuirkPolicy::none());
    let first_text = typed.surface().find_text("Paragraph").map(|point| point.node);
    if let Some(text) = first_text {
        typed.surface_mut().set_text(text, "Paragraphs with some content and ");
    }
    // The first paragraph follows a list.
    let paragraph_start = state.doc.child(0).node_size();
    let paragraph_size = state.doc.child(1).node_size();

    group.bench_function("typing_in_paragraph", |b| {
        b.iter(|| {
            let request = Request::new(paragraph_start + 1, paragraph_start + paragraph_size - 1);
            std::hint::black_box(reconciler.reconcile(&state, &typed, &mut NoHooks, request))
        });
    });

    let untouched = MirrorView::new(&doc, QuirkPolicy::none());
    group.bench_function("whole_document_no_change", |b| {
        b.iter(|| {
            let request = Request::new(0, state.doc.content_size());
            std::hint::black_box(reconciler.reconcile(&state, &untouched, &mut NoHooks, request))
        });
    });

    group.bench_function("render", |b| {
        let mut view = MirrorView::new(&doc, QuirkPolicy::none());
        b.iter(|| {
            view.render(std::hint::black_box(&doc), None);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
