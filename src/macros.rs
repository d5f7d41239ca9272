/// Builds a value inside a document, creating arrays and dictionaries as needed.
///
/// `[...]` becomes an array, `{ "Key": ... }` a dictionary and `null` the null value.
/// Anything else goes through `Value::from`, so literals become integers, reals, booleans
/// or strings. Multi-token expressions must be parenthesized.
///
/// ```rust
/// use pdf_cos::{pdf_value, Document, Value};
///
/// let mut doc = Document::new();
/// let page = pdf_value!(doc, {
///     "Type": (Value::name("Page")),
///     "MediaBox": [0, 0, 612, 792],
///     "Rotate": 90
/// });
/// assert_eq!(doc.dict_get(&page, "Rotate"), Some(Value::Integer(90)));
/// ```
#[macro_export]
macro_rules! pdf_value {
    ($doc:expr, null) => {
        $crate::Value::Null
    };

    ($doc:expr, [ $($elem:tt),* $(,)? ]) => {{
        let items: ::std::vec::Vec<$crate::Value> = vec![$($crate::pdf_value!($doc, $elem)),*];
        $doc.new_array_with(items)
    }};

    ($doc:expr, { $($key:literal : $value:tt),* $(,)? }) => {{
        let entries: ::std::vec::Vec<(&str, $crate::Value)> =
            vec![$(($key, $crate::pdf_value!($doc, $value))),*];
        $doc.new_dictionary_with(entries)
    }};

    ($doc:expr, $other:expr) => {
        $crate::Value::from($other)
    };
}

/// Builds a dictionary in a document. See [`pdf_value!`].
#[macro_export]
macro_rules! pdf_dict {
    ($doc:expr, { $($body:tt)* }) => {
        $crate::pdf_value!($doc, { $($body)* })
    };
}

/// Builds an array in a document. See [`pdf_value!`].
#[macro_export]
macro_rules! pdf_array {
    ($doc:expr, [ $($body:tt)* ]) => {
        $crate::pdf_value!($doc, [ $($body)* ])
    };
}

#[cfg(test)]
mod tests {
    use crate::{Document, Value};

    #[test]
    fn test_pdf_value_primitives() {
        let _doc = Document::new();
        assert_eq!(pdf_value!(_doc, null), Value::Null);
        assert_eq!(pdf_value!(_doc, true), Value::Boolean(true));
        assert_eq!(pdf_value!(_doc, 42), Value::Integer(42));
        assert_eq!(pdf_value!(_doc, 3.5), Value::Real(3.5));
        assert_eq!(pdf_value!(_doc, "hello"), Value::string("hello"));
    }

    #[test]
    fn test_pdf_array() {
        let mut doc = Document::new();
        let empty = pdf_array!(doc, []);
        assert_eq!(doc.array_len(&empty), Some(0));

        let array = pdf_array!(doc, [1, [2, 3], null]);
        assert_eq!(doc.array_len(&array), Some(3));
        assert_eq!(doc.array_get(&array, 0), Some(Value::Integer(1)));
        let nested = doc.array_get(&array, 1).unwrap();
        assert_eq!(doc.array_items(&nested), Some(vec![Value::Integer(2), Value::Integer(3)]));
        assert_eq!(doc.array_get(&array, 2), Some(Value::Null));
    }

    #[test]
    fn test_pdf_dict() {
        let mut doc = Document::new();
        let dict = pdf_dict!(doc, {
            "Type": (Value::name("Font")),
            "Widths": [500, 600],
            "Missing": null,
        });
        assert_eq!(doc.dict_len(&dict), Some(2));
        assert!(doc.dict_get(&dict, "Type").unwrap().is_name("Font"));
        let widths = doc.dict_get(&dict, "Widths").unwrap();
        assert_eq!(doc.owner(&widths), dict.node_id().map(crate::Owner::Container));
    }
}
