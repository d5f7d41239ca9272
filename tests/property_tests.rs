//! Property-based tests over generated inputs: written values parse back to equal
//! structures, trees agree with an ordered map model, and date strings round-trip.

use chrono::{FixedOffset, TimeZone};
use pdf_cos::{Document, DocumentOptions, Name, NumberTree, ObjectId, PdfString, StringMode, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Shape {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    Text(Vec<u8>, StringMode),
    Reference(u32, u16),
    Array(Vec<Shape>),
    Dictionary(Vec<(Vec<u8>, Shape)>),
}

fn finite_real() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<f64>().prop_filter("finite", |r| r.is_finite()),
        (-1.0e6..1.0e6f64),
        Just(-0.0),
    ]
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Null),
        any::<bool>().prop_map(Shape::Boolean),
        any::<i64>().prop_map(Shape::Integer),
        finite_real().prop_map(Shape::Real),
        prop::collection::vec(any::<u8>(), 1..8).prop_map(Shape::Name),
        (
            prop::collection::vec(any::<u8>(), 0..16),
            prop_oneof![Just(StringMode::Literal), Just(StringMode::Hex)],
        )
            .prop_map(|(bytes, mode)| Shape::Text(bytes, mode)),
        (1u32.., any::<u16>()).prop_map(|(number, generation)| Shape::Reference(number, generation)),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Shape::Array),
            prop::collection::vec((prop::collection::vec(any::<u8>(), 1..6), inner), 0..6)
                .prop_map(Shape::Dictionary),
        ]
    })
}

fn build(doc: &mut Document, shape: &Shape) -> Value {
    match shape {
        Shape::Null => Value::Null,
        Shape::Boolean(b) => Value::Boolean(*b),
        Shape::Integer(i) => Value::Integer(*i),
        Shape::Real(r) => Value::Real(*r),
        Shape::Name(bytes) => Value::Name(Name::from_bytes(bytes)),
        Shape::Text(bytes, mode) => Value::String(PdfString::with_mode(bytes.clone(), *mode)),
        Shape::Reference(number, generation) => {
            Value::Reference(ObjectId::new(*number, *generation))
        }
        Shape::Array(items) => {
            let items = items.iter().map(|item| build(doc, item)).collect();
            doc.new_array_with(items)
        }
        Shape::Dictionary(entries) => {
            let entries: Vec<(Name, Value)> = entries
                .iter()
                .map(|(key, value)| (Name::from_bytes(key), build(doc, value)))
                .collect();
            let dict = doc.new_dictionary();
            for (key, value) in entries {
                doc.dict_set(&dict, key, value).unwrap();
            }
            dict
        }
    }
}

/// Pairs of simple values found at the same position in two trees.
fn simple_pairs(doc: &Document, a: &Value, b: &Value) -> Vec<(Value, Value)> {
    let mut pairs = Vec::new();
    let mut stack = vec![(a.clone(), b.clone())];
    while let Some((x, y)) = stack.pop() {
        match (&x, &y) {
            (Value::Array(_), Value::Array(_)) => {
                let xs = doc.array_items(&x).unwrap_or_default();
                let ys = doc.array_items(&y).unwrap_or_default();
                stack.extend(xs.into_iter().zip(ys));
            }
            (Value::Dictionary(_), Value::Dictionary(_)) => {
                for (key, value) in doc.dict_entries(&x) {
                    if let Some(other) = doc.dict_get(&y, &key) {
                        stack.push((value, other));
                    }
                }
            }
            _ => pairs.push((x, y)),
        }
    }
    pairs
}

proptest! {
    #[test]
    fn prop_written_values_parse_back(shape in shape()) {
        let mut doc = Document::new();
        let value = build(&mut doc, &shape);
        let bytes = doc.to_bytes(&value);
        let parsed = doc.parse_value(&bytes).unwrap();
        prop_assert!(doc.structurally_equal(&value, &parsed));
        for (written, read) in simple_pairs(&doc, &value, &parsed) {
            match (&written, &read) {
                (Value::Real(a), Value::Real(b)) => prop_assert_eq!(a.to_bits(), b.to_bits()),
                (Value::String(a), Value::String(b)) => prop_assert_eq!(a.mode(), b.mode()),
                _ => prop_assert_eq!(&written, &read),
            }
        }
    }

    #[test]
    fn prop_reals_are_bit_exact(real in finite_real()) {
        let mut doc = Document::new();
        let bytes = doc.to_bytes(&Value::Real(real));
        prop_assert!(!bytes.contains(&b'e') && !bytes.contains(&b'E'));
        match doc.parse_value(&bytes).unwrap() {
            Value::Real(read) => prop_assert_eq!(read.to_bits(), real.to_bits()),
            other => prop_assert!(false, "expected a real, got {:?}", other),
        }
    }

    #[test]
    fn prop_parser_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut doc = Document::new();
        let _ = doc.parse_value(&bytes);
    }

    #[test]
    fn prop_number_tree_matches_model(
        ops in prop::collection::vec((any::<bool>(), 0i64..80), 1..120)
    ) {
        let mut doc = Document::with_options(DocumentOptions::new().with_tree_low_order(2));
        let tree = NumberTree::create(&mut doc);
        let mut model = BTreeMap::new();

        for (insert, key) in ops {
            if insert {
                tree.insert(&mut doc, key, Value::from(key * 2), true).unwrap();
                model.insert(key, key * 2);
            } else {
                let removed = tree.remove(&mut doc, &key).unwrap();
                prop_assert_eq!(removed, model.remove(&key).is_some());
            }
        }

        let stats = tree.validate(&mut doc).unwrap();
        prop_assert_eq!(stats.entries, model.len());
        let keys = tree.keys(&mut doc).unwrap();
        prop_assert_eq!(keys, model.keys().copied().collect::<Vec<_>>());
        for (key, value) in &model {
            prop_assert_eq!(tree.get(&mut doc, key).unwrap(), Some(Value::from(*value)));
        }
    }

    #[test]
    fn prop_dates_roundtrip(
        year in 1000i32..=9999,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
        offset_minutes in -(12 * 60)..=(14 * 60),
    ) {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
        let date = offset
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .unwrap();
        let string = PdfString::from_date(&date);
        prop_assert_eq!(string.as_date(), Some(date));
    }
}
