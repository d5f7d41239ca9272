use pdf_cos::{
    Document, DocumentOptions, Error, NameTree, NumberTree, PdfString, TreeStats, Value,
    WriteOptions,
};

fn name(i: usize) -> PdfString {
    PdfString::from(format!("dest{:03}", i))
}

#[test]
fn test_full_leaf_splits_into_two_kids() {
    let mut doc = Document::new();
    let tree = NameTree::create(&mut doc);
    for i in 0..10 {
        tree.insert(&mut doc, name(i), Value::from(i), false).unwrap();
    }
    assert_eq!(
        tree.validate(&mut doc).unwrap(),
        TreeStats { height: 1, leaves: 1, entries: 10 }
    );

    tree.insert(&mut doc, name(10), Value::from(10), false).unwrap();
    let stats = tree.validate(&mut doc).unwrap();
    assert_eq!(stats, TreeStats { height: 2, leaves: 2, entries: 11 });

    let root = doc.resolve(tree.root());
    assert!(!doc.dict_contains(&root, "Names"));
    assert!(!doc.dict_contains(&root, "Limits"));
    let kids = doc.dict_get_resolved(&root, "Kids");
    assert_eq!(doc.array_len(&kids), Some(2));

    let first = doc.array_get(&kids, 0).unwrap();
    let first = doc.resolve(&first);
    let limits = doc.dict_get_resolved(&first, "Limits");
    assert_eq!(
        doc.array_items(&limits).unwrap(),
        vec![Value::String(name(0)), Value::String(name(4))]
    );
}

#[test]
fn test_many_keys_grow_three_levels() {
    let mut doc = Document::new();
    let tree = NameTree::create(&mut doc);
    // Interleaved order exercises splits in the middle of the key space.
    for i in (0..200).step_by(2).chain((1..200).step_by(2)) {
        tree.insert(&mut doc, name(i), Value::from(i), false).unwrap();
    }
    let stats = tree.validate(&mut doc).unwrap();
    assert_eq!(stats.entries, 200);
    assert!(stats.height >= 3);

    let keys = tree.keys(&mut doc).unwrap();
    let expected: Vec<PdfString> = (0..200).map(name).collect();
    assert_eq!(keys, expected);

    for i in [0, 57, 128, 199] {
        assert_eq!(tree.get(&mut doc, &name(i)).unwrap(), Some(Value::from(i)));
    }
    assert_eq!(tree.get(&mut doc, &PdfString::from("zzz")).unwrap(), None);
    assert_eq!(tree.get(&mut doc, &PdfString::from("a")).unwrap(), None);
}

#[test]
fn test_removal_keeps_tree_valid() {
    let mut doc = Document::with_options(DocumentOptions::new().with_tree_low_order(3));
    let tree = NumberTree::create(&mut doc);
    for n in 0..150i64 {
        tree.insert(&mut doc, n * 10, Value::from(n), false).unwrap();
    }
    for n in (0..150i64).filter(|n| n % 4 != 1) {
        assert!(tree.remove(&mut doc, &(n * 10)).unwrap());
        tree.validate(&mut doc).unwrap();
    }
    assert!(!tree.remove(&mut doc, &0).unwrap());

    let keys = tree.keys(&mut doc).unwrap();
    let expected: Vec<i64> = (0..150i64).filter(|n| n % 4 == 1).map(|n| n * 10).collect();
    assert_eq!(keys, expected);
    assert_eq!(tree.get(&mut doc, &10).unwrap(), Some(Value::from(1i64)));
}

#[test]
fn test_tree_survives_save_and_load() {
    let mut doc = Document::new();
    let dests = doc.names_tree("Dests").unwrap();
    for i in 0..40 {
        dests.insert(&mut doc, name(i), Value::from(i), false).unwrap();
    }
    let bytes = doc.save(&WriteOptions::new()).unwrap();

    let mut reloaded = Document::load(bytes).unwrap();
    let dests = reloaded.names_tree("Dests").unwrap();
    assert!(!reloaded.is_virtual(dests.root()));
    assert_eq!(dests.validate(&mut reloaded).unwrap().entries, 40);
    assert_eq!(dests.get(&mut reloaded, &name(33)).unwrap(), Some(Value::from(33)));

    dests
        .insert(&mut reloaded, name(40), Value::from(40), false)
        .unwrap();
    let updated = reloaded.save(&WriteOptions::incremental()).unwrap();
    let mut again = Document::load(updated).unwrap();
    let dests = again.names_tree("Dests").unwrap();
    assert_eq!(dests.len(&mut again).unwrap(), 41);
}

#[test]
fn test_iteration_pairs_values() {
    let mut doc = Document::new();
    let labels = NumberTree::create(&mut doc);
    let roman = doc.new_dictionary_with([("S", Value::name("r"))]);
    let decimal = doc.new_dictionary_with([("S", Value::name("D"))]);
    labels.insert(&mut doc, 4, decimal, false).unwrap();
    labels.insert(&mut doc, 0, roman, false).unwrap();

    let pairs: Vec<(i64, Value)> = labels.iter(&mut doc).collect::<Result<_, Error>>().unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, 0);
    assert_eq!(doc.dict_get(&pairs[0].1, "S"), Some(Value::name("r")));
    assert_eq!(pairs[1].0, 4);
}

#[test]
fn test_duplicate_without_overwrite_is_rejected() {
    let mut doc = Document::new();
    let tree = NameTree::create(&mut doc);
    for i in 0..25 {
        tree.insert(&mut doc, name(i), Value::Null, false).unwrap();
    }
    let err = tree
        .insert(&mut doc, name(12), Value::from(1), false)
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));
    tree.insert(&mut doc, name(12), Value::from(1), true).unwrap();
    assert_eq!(tree.get(&mut doc, &name(12)).unwrap(), Some(Value::from(1)));
    assert_eq!(tree.len(&mut doc).unwrap(), 25);
}
