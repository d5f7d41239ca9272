//! Serializable views of value subtrees, for debugging and JSON dumps.
//!
//! References are rendered as `"N G R"` strings and never followed, names as `"/Name"`,
//! strings as their (lossy) text. Streams become `{"header": ..., "length": n}`.
//!
//! ```rust
//! use pdf_cos::{Document, ObjectId, Value};
//!
//! let mut doc = Document::new();
//! let dict = doc.new_dictionary_with([
//!     ("Type", Value::name("Page")),
//!     ("Parent", Value::Reference(ObjectId::new(3, 0))),
//! ]);
//! let json = serde_json::to_string(&doc.view(&dict)).unwrap();
//! assert_eq!(json, r#"{"Type":"/Page","Parent":"3 0 R"}"#);
//! ```

use crate::value::Value;
use crate::Document;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A borrowed value of a document that implements [`Serialize`].
#[derive(Clone, Copy)]
pub struct ValueView<'d> {
    doc: &'d Document,
    value: &'d Value,
    depth: usize,
}

impl Document {
    /// A serializable view of `value`. Containers must belong to this document.
    #[must_use]
    pub fn view<'d>(&'d self, value: &'d Value) -> ValueView<'d> {
        ValueView {
            doc: self,
            value,
            depth: 0,
        }
    }
}

impl<'d> ValueView<'d> {
    fn child(&self, value: &'d Value) -> ValueView<'d> {
        ValueView {
            doc: self.doc,
            value,
            depth: self.depth + 1,
        }
    }
}

impl Serialize for ValueView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.depth > self.doc.options().max_nesting {
            return Err(S::Error::custom("value nesting exceeds the configured limit"));
        }
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Name(name) => serializer.serialize_str(&format!("/{}", name)),
            Value::String(string) => serializer.serialize_str(&string.to_text_lossy()),
            Value::Reference(id) => serializer.serialize_str(&id.to_string()),
            Value::Array(id) => {
                let items = self.doc.arena.items(*id).map(Vec::as_slice).unwrap_or_default();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Dictionary(id) => {
                let Some(entries) = self.doc.arena.entries(*id) else {
                    return serializer.serialize_unit();
                };
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_text_lossy(), &self.child(value))?;
                }
                map.end()
            }
            Value::Stream(id) => {
                let Some(stream) = self.doc.arena.stream(*id) else {
                    return serializer.serialize_unit();
                };
                let header = Value::Dictionary(stream.header);
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(
                    "header",
                    &ValueView {
                        doc: self.doc,
                        value: &header,
                        depth: self.depth + 1,
                    },
                )?;
                map.serialize_entry("length", &stream.body.len())?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_renders_nested_values() {
        let mut doc = Document::new();
        let array = doc.new_array_with(vec![Value::from(1), Value::from(2.5), Value::Null]);
        let dict = doc.new_dictionary_with([("A", array), ("S", Value::string("hi"))]);
        let json = serde_json::to_value(doc.view(&dict)).unwrap();
        assert_eq!(json, json!({"A": [1, 2.5, null], "S": "hi"}));
    }

    #[test]
    fn test_view_renders_streams() {
        let mut doc = Document::new();
        let stream = doc.new_stream(b"12345".to_vec());
        doc.dict_set(&stream, "Type", Value::name("XObject")).unwrap();
        let json = serde_json::to_value(doc.view(&stream)).unwrap();
        assert_eq!(json, json!({"header": {"Type": "/XObject"}, "length": 5}));
    }
}
