use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_cos::{
    clone_into, default_filters, pdf_dict, Document, NameTree, ObjectId, PdfString, Value,
    WriteOptions,
};

/// A document with a page tree of `pages` pages, each with a content stream.
fn document_with_pages(pages: usize) -> (Document, Vec<ObjectId>) {
    let mut doc = Document::new();
    let kids = doc.new_array();
    let tree = pdf_dict!(doc, {
        "Type": (Value::name("Pages")),
        "MediaBox": [0, 0, 612, 792]
    });
    doc.dict_set(&tree, "Kids", kids.clone()).unwrap();
    let tree = doc.register(tree);

    let mut ids = Vec::with_capacity(pages);
    for i in 0..pages {
        let contents = doc.new_stream(format!("BT /F1 12 Tf ({}) Tj ET", i).into_bytes());
        let contents = doc.register(contents);
        let page = pdf_dict!(doc, {
            "Type": (Value::name("Page")),
            "Parent": (Value::Reference(tree)),
            "Contents": (Value::Reference(contents))
        });
        let page = doc.register(page);
        doc.array_push(&kids, Value::Reference(page)).unwrap();
        ids.push(page);
    }
    let catalog = doc.catalog();
    doc.dict_set(&catalog, "Pages", Value::Reference(tree)).unwrap();
    (doc, ids)
}

fn benchmark_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_full");
    for size in [10, 100, 500].iter() {
        let (mut doc, _) = document_with_pages(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| doc.save(black_box(&WriteOptions::new())))
        });
    }
    group.finish();
}

fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for size in [10, 100, 500].iter() {
        let (mut doc, _) = document_with_pages(*size);
        let bytes = doc.save(&WriteOptions::new()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| Document::load(black_box(bytes.clone())))
        });
    }
    group.finish();
}

fn benchmark_load_and_resolve(c: &mut Criterion) {
    let (mut doc, ids) = document_with_pages(200);
    let bytes = doc.save(&WriteOptions::new()).unwrap();

    c.bench_function("load_resolve_all_pages", |b| {
        b.iter(|| {
            let mut loaded = Document::load(bytes.clone()).unwrap();
            for id in &ids {
                black_box(loaded.resolve_object(*id));
            }
        })
    });
}

fn benchmark_incremental_save(c: &mut Criterion) {
    let (mut doc, ids) = document_with_pages(200);
    let bytes = doc.save(&WriteOptions::new()).unwrap();

    c.bench_function("incremental_save_one_change", |b| {
        b.iter(|| {
            let mut loaded = Document::load(bytes.clone()).unwrap();
            let page = loaded.resolve(&Value::Reference(ids[7]));
            loaded.dict_set(&page, "Rotate", Value::from(90)).unwrap();
            loaded.save(black_box(&WriteOptions::incremental()))
        })
    });
}

fn benchmark_tree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_tree_insert");
    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut doc = Document::new();
                let tree = NameTree::create(&mut doc);
                for i in 0..size {
                    let key = PdfString::from(format!("key{:05}", (i * 7919) % size));
                    tree.insert(&mut doc, key, Value::from(i), true).unwrap();
                }
                doc
            })
        });
    }
    group.finish();
}

fn benchmark_tree_lookup(c: &mut Criterion) {
    let mut doc = Document::new();
    let tree = NameTree::create(&mut doc);
    for i in 0..2000 {
        tree.insert(&mut doc, PdfString::from(format!("key{:05}", i)), Value::from(i), false)
            .unwrap();
    }
    let key = PdfString::from("key01234");

    c.bench_function("name_tree_lookup", |b| {
        b.iter(|| tree.get(&mut doc, black_box(&key)))
    });
}

fn benchmark_clone_pages(c: &mut Criterion) {
    let (mut source, ids) = document_with_pages(50);
    let filters = default_filters();

    c.bench_function("clone_50_pages", |b| {
        b.iter(|| {
            let mut target = Document::new();
            for id in &ids {
                clone_into(&mut target, &mut source, &filters, &Value::Reference(*id)).unwrap();
            }
            target
        })
    });
}

criterion_group!(
    benches,
    benchmark_save,
    benchmark_load,
    benchmark_load_and_resolve,
    benchmark_incremental_save,
    benchmark_tree_insert,
    benchmark_tree_lookup,
    benchmark_clone_pages
);
criterion_main!(benches);
