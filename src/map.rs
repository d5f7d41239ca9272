//! Ordered entry map backing dictionary nodes.
//!
//! [`PdfMap`] wraps an [`IndexMap`] keyed by [`Name`]. Dictionary semantics do not depend
//! on entry order, but keeping insertion order makes written output deterministic and lets
//! a load-then-save cycle reproduce the original entry layout.
//!
//! Entry maps are owned by the document's container arena; user code reaches them through
//! [`Document`](crate::Document) methods so that mutations are tracked.

use crate::value::{Name, Value};
use indexmap::IndexMap;

/// An ordered map of names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfMap(IndexMap<Name, Value>);

impl PdfMap {
    #[must_use]
    pub fn new() -> Self {
        PdfMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        PdfMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts an entry, returning the previous value for the key.
    ///
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, key: Name, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> Option<&Value> {
        self.0.get(key.as_ref())
    }

    /// Removes an entry, preserving the order of the remaining entries.
    pub fn remove<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K) -> Option<Value> {
        self.0.shift_remove(key.as_ref())
    }

    #[must_use]
    pub fn contains_key<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        self.0.contains_key(key.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Name, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, Name, Value> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Name, Value> {
        self.0.iter()
    }

    pub(crate) fn drain(&mut self) -> indexmap::map::Drain<'_, Name, Value> {
        self.0.drain(..)
    }
}

impl IntoIterator for PdfMap {
    type Item = (Name, Value);
    type IntoIter = indexmap::map::IntoIter<Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PdfMap {
    type Item = (&'a Name, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Name, Value)> for PdfMap {
    fn from_iter<T: IntoIterator<Item = (Name, Value)>>(iter: T) -> Self {
        PdfMap(IndexMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position_on_replace() {
        let mut map = PdfMap::new();
        map.insert(Name::from("A"), Value::from(1));
        map.insert(Name::from("B"), Value::from(2));
        map.insert(Name::from("A"), Value::from(3));

        let keys: Vec<_> = map.keys().map(|k| k.to_text_lossy()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(map.get("A"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut map: PdfMap = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, k)| (Name::from(*k), Value::from(i)))
            .collect();
        assert_eq!(map.remove("B"), Some(Value::Integer(1)));
        let keys: Vec<_> = map.keys().map(|k| k.to_text_lossy()).collect();
        assert_eq!(keys, vec!["A", "C"]);
        assert!(!map.contains_key("B"));
    }
}
