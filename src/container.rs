//! Container operations and update tracking.
//!
//! Every mutation of an array, dictionary or stream header goes through a [`Document`]
//! method that runs the same explicit chain:
//!
//! 1. `include(new)` attaches the incoming container to its new owner (a container that
//!    already has an owner is copied first, so each container has exactly one owner);
//! 2. `exclude(old)` detaches the container being replaced or removed;
//! 3. `mark_updated(container)` flags the container and its owner chain as updated and
//!    concrete, and queues a loaded owning object for the next incremental update.
//!
//! Container arguments may be references: mutators resolve them to the referenced
//! payload. Getters take `&self` and follow references only when the payload is already
//! materialized; resolve first when working on a freshly loaded document.

use crate::error::{Error, Result};
use crate::map::PdfMap;
use crate::node::{NodeData, Owner, StreamData};
use crate::options::MismatchPolicy;
use crate::value::{ChildKey, ContainerKind, Name, NodeId, Value};
use crate::Document;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Want {
    Array,
    Dictionary,
    Stream,
}

impl Want {
    fn as_str(self) -> &'static str {
        match self {
            Want::Array => "array",
            Want::Dictionary => "dictionary",
            Want::Stream => "stream",
        }
    }
}

impl Document {
    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    pub fn new_array(&mut self) -> Value {
        Value::Array(self.arena.alloc(NodeData::Array(Vec::new())))
    }

    /// Creates an array holding `items`.
    pub fn new_array_with(&mut self, items: Vec<Value>) -> Value {
        let id = self.arena.alloc(NodeData::Array(Vec::with_capacity(items.len())));
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| self.include(Owner::Container(id), item))
            .collect();
        if let Some(slot) = self.arena.items_mut(id) {
            *slot = items;
        }
        Value::Array(id)
    }

    pub fn new_dictionary(&mut self) -> Value {
        Value::Dictionary(self.arena.alloc(NodeData::Dictionary(PdfMap::new())))
    }

    /// Creates a dictionary holding `entries`. Null values are skipped.
    pub fn new_dictionary_with<I, K>(&mut self, entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Name>,
    {
        let id = self.arena.alloc(NodeData::Dictionary(PdfMap::new()));
        for (key, value) in entries {
            if value.is_null() {
                continue;
            }
            let value = self.include(Owner::Container(id), value);
            if let Some(map) = self.arena.entries_mut(id) {
                map.insert(key.into(), value);
            }
        }
        Value::Dictionary(id)
    }

    /// Creates a stream with an empty header and the given (raw) body.
    pub fn new_stream(&mut self, body: Vec<u8>) -> Value {
        let header = self.arena.alloc(NodeData::Dictionary(PdfMap::new()));
        let id = self.arena.alloc(NodeData::Stream(StreamData {
            header,
            body,
            body_resolved: true,
        }));
        if let Some(node) = self.arena.get_mut(header) {
            node.owner = Some(Owner::Container(id));
        }
        Value::Stream(id)
    }

    fn new_default(&mut self, kind: ContainerKind) -> Value {
        match kind {
            ContainerKind::Array => self.new_array(),
            ContainerKind::Dictionary => self.new_dictionary(),
            ContainerKind::Stream => self.new_stream(Vec::new()),
        }
    }

    // ---------------------------------------------------------------
    // Tracking
    // ---------------------------------------------------------------

    /// The structural owner of a container value.
    #[must_use]
    pub fn owner(&self, value: &Value) -> Option<Owner> {
        value
            .node_id()
            .and_then(|id| self.arena.get(id))
            .and_then(|node| node.owner)
    }

    /// `true` for auto-created defaults that were never mutated, whether held inline or
    /// through a reference.
    #[must_use]
    pub fn is_virtual(&self, value: &Value) -> bool {
        match value {
            Value::Reference(id) => self.slot(*id).map_or(false, |slot| slot.virtual_),
            other => other
                .node_id()
                .and_then(|id| self.arena.get(id))
                .map_or(false, |node| node.virtual_),
        }
    }

    /// `true` once a container (or the object behind a reference) has been mutated.
    #[must_use]
    pub fn is_updated(&self, value: &Value) -> bool {
        match value {
            Value::Reference(id) => self.slot(*id).map_or(false, |slot| slot.updated),
            other => other
                .node_id()
                .and_then(|id| self.arena.get(id))
                .map_or(false, |node| node.updated),
        }
    }

    /// Sets the owner link of a freshly built container, without copy checks.
    pub(crate) fn attach(&mut self, owner: Owner, value: &Value) {
        if let Some(node) = value.node_id().and_then(|id| self.arena.get_mut(id)) {
            node.owner = Some(owner);
        }
    }

    /// Attaches `value` to `owner`, copying containers that already have another owner.
    pub(crate) fn include(&mut self, owner: Owner, value: Value) -> Value {
        let Some(id) = value.node_id() else {
            return value;
        };
        let attached = match self.arena.get(id) {
            Some(node) => node.owner.is_some(),
            None => return value,
        };
        let value = if attached { self.duplicate(&value) } else { value };
        self.attach(owner, &value);
        value
    }

    /// Detaches `value` from `owner`.
    pub(crate) fn exclude(&mut self, owner: Owner, value: &Value) {
        if let Some(node) = value.node_id().and_then(|id| self.arena.get_mut(id)) {
            if node.owner == Some(owner) {
                node.owner = None;
            }
        }
    }

    /// Flags `node` and its owner chain as updated and concrete.
    ///
    /// Stops at the first ancestor that is already updated and concrete. Reaching an
    /// object queues it for the next incremental update when it was loaded; reaching a
    /// virtual object continues with the container that auto-created it.
    pub(crate) fn mark_updated(&mut self, node: NodeId) {
        let mut cursor = Some(Owner::Container(node));
        let mut budget = self.arena.len() + self.slots.len() + 1;
        while let Some(link) = cursor {
            if budget == 0 {
                break;
            }
            budget -= 1;
            cursor = match link {
                Owner::Container(id) => match self.arena.get_mut(id) {
                    Some(node) if node.updated && !node.virtual_ => None,
                    Some(node) => {
                        node.updated = true;
                        node.virtual_ = false;
                        node.owner
                    }
                    None => None,
                },
                Owner::Object(id) => self.touch_slot(id.number).map(Owner::Container),
            };
        }
    }

    fn target(&mut self, container: &Value, want: Want) -> Result<NodeId> {
        let resolved = self.resolve(container);
        Self::select(&resolved, want)
    }

    pub(crate) fn stream_node(&mut self, stream: &Value) -> Result<NodeId> {
        self.target(stream, Want::Stream)
    }

    fn peek_target(&self, container: &Value, want: Want) -> Option<NodeId> {
        Self::select(&self.peek(container), want).ok()
    }

    fn select(resolved: &Value, want: Want) -> Result<NodeId> {
        match (resolved, want) {
            (Value::Array(id), Want::Array) => Ok(*id),
            (Value::Dictionary(id), Want::Dictionary) => Ok(*id),
            (Value::Stream(id), Want::Stream) => Ok(*id),
            (other, _) if other.is_simple() => Err(Error::immutable(other.kind().as_str())),
            (other, want) => Err(Error::type_mismatch(want.as_str(), other.kind().as_str())),
        }
    }

    /// Dictionary node behind a dictionary or a stream header.
    fn dict_target(&mut self, container: &Value) -> Result<NodeId> {
        let resolved = self.resolve(container);
        self.dict_node(&resolved)
    }

    fn dict_node(&self, resolved: &Value) -> Result<NodeId> {
        match resolved {
            Value::Stream(id) => self
                .arena
                .stream(*id)
                .map(|s| s.header)
                .ok_or_else(|| Error::malformed("dangling stream handle")),
            other => Self::select(other, Want::Dictionary),
        }
    }

    fn peek_dict(&self, container: &Value) -> Option<NodeId> {
        self.dict_node(&self.peek(container)).ok()
    }

    // ---------------------------------------------------------------
    // Arrays
    // ---------------------------------------------------------------

    #[must_use]
    pub fn array_len(&self, array: &Value) -> Option<usize> {
        let id = self.peek_target(array, Want::Array)?;
        self.arena.items(id).map(Vec::len)
    }

    /// The raw item at `index` (references are not followed).
    #[must_use]
    pub fn array_get(&self, array: &Value, index: usize) -> Option<Value> {
        let id = self.peek_target(array, Want::Array)?;
        self.arena.items(id)?.get(index).cloned()
    }

    /// A snapshot of the raw items.
    #[must_use]
    pub fn array_items(&self, array: &Value) -> Option<Vec<Value>> {
        let id = self.peek_target(array, Want::Array)?;
        self.arena.items(id).cloned()
    }

    pub fn array_push(&mut self, array: &Value, item: Value) -> Result<()> {
        let id = self.target(array, Want::Array)?;
        let len = self.arena.items(id).map_or(0, Vec::len);
        self.splice_items(id, len, 0, vec![item]);
        Ok(())
    }

    pub fn array_insert(&mut self, array: &Value, index: usize, item: Value) -> Result<()> {
        let id = self.target(array, Want::Array)?;
        let len = self.arena.items(id).map_or(0, Vec::len);
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        self.splice_items(id, index, 0, vec![item]);
        Ok(())
    }

    /// Replaces the item at `index`, returning the previous item.
    pub fn array_set(&mut self, array: &Value, index: usize, item: Value) -> Result<Value> {
        let id = self.target(array, Want::Array)?;
        let len = self.arena.items(id).map_or(0, Vec::len);
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let mut old = self.splice_items(id, index, 1, vec![item]);
        Ok(old.pop().unwrap_or_default())
    }

    pub fn array_remove(&mut self, array: &Value, index: usize) -> Result<Value> {
        let id = self.target(array, Want::Array)?;
        let len = self.arena.items(id).map_or(0, Vec::len);
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let mut old = self.splice_items(id, index, 1, Vec::new());
        Ok(old.pop().unwrap_or_default())
    }

    /// Replaces `count` items at `index` with `items`, with full update tracking.
    ///
    /// Callers guarantee the range is valid.
    pub(crate) fn splice_items(
        &mut self,
        id: NodeId,
        index: usize,
        count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let owner = Owner::Container(id);
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| self.include(owner, item))
            .collect();
        let removed: Vec<Value> = match self.arena.items_mut(id) {
            Some(current) => {
                let end = (index + count).min(current.len());
                let start = index.min(end);
                current.splice(start..end, items).collect()
            }
            None => return Vec::new(),
        };
        for old in &removed {
            self.exclude(owner, old);
        }
        self.mark_updated(id);
        removed
    }

    // ---------------------------------------------------------------
    // Dictionaries
    // ---------------------------------------------------------------

    #[must_use]
    pub fn dict_len(&self, dict: &Value) -> Option<usize> {
        let id = self.peek_dict(dict)?;
        self.arena.entries(id).map(PdfMap::len)
    }

    /// The raw entry for `key` (references are not followed).
    #[must_use]
    pub fn dict_get<K: AsRef<[u8]> + ?Sized>(&self, dict: &Value, key: &K) -> Option<Value> {
        let id = self.peek_dict(dict)?;
        self.arena.entries(id)?.get(key).cloned()
    }

    /// The entry for `key`, dereferenced; `Null` when absent.
    pub fn dict_get_resolved<K: AsRef<[u8]> + ?Sized>(&mut self, dict: &Value, key: &K) -> Value {
        let container = self.resolve(dict);
        let raw = self.dict_get(&container, key).unwrap_or_default();
        self.resolve(&raw)
    }

    #[must_use]
    pub fn dict_contains<K: AsRef<[u8]> + ?Sized>(&self, dict: &Value, key: &K) -> bool {
        self.peek_dict(dict)
            .and_then(|id| self.arena.entries(id))
            .map_or(false, |map| map.contains_key(key))
    }

    #[must_use]
    pub fn dict_keys(&self, dict: &Value) -> Vec<Name> {
        self.peek_dict(dict)
            .and_then(|id| self.arena.entries(id))
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn dict_entries(&self, dict: &Value) -> Vec<(Name, Value)> {
        self.peek_dict(dict)
            .and_then(|id| self.arena.entries(id))
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Sets an entry, returning the previous value. Setting `Null` removes the key.
    pub fn dict_set(
        &mut self,
        dict: &Value,
        key: impl Into<Name>,
        value: Value,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let id = self.dict_target(dict)?;
        if value.is_null() {
            return self.remove_entry(id, &key);
        }
        Ok(self.put_tracked(id, key, value))
    }

    pub fn dict_remove<K: AsRef<[u8]> + ?Sized>(
        &mut self,
        dict: &Value,
        key: &K,
    ) -> Result<Option<Value>> {
        let id = self.dict_target(dict)?;
        self.remove_entry(id, key)
    }

    fn put_tracked(&mut self, id: NodeId, key: Name, value: Value) -> Option<Value> {
        let owner = Owner::Container(id);
        let current = self.arena.entries(id).and_then(|m| m.get(&key).cloned());
        if value.is_container() && current.as_ref() == Some(&value) {
            self.mark_updated(id);
            return current;
        }
        let value = self.include(owner, value);
        let old = self.arena.entries_mut(id).and_then(|m| m.insert(key, value));
        if let Some(old) = &old {
            self.exclude(owner, old);
        }
        self.mark_updated(id);
        old
    }

    fn remove_entry<K: AsRef<[u8]> + ?Sized>(&mut self, id: NodeId, key: &K) -> Result<Option<Value>> {
        let old = self.arena.entries_mut(id).and_then(|m| m.remove(key));
        if let Some(old) = &old {
            self.exclude(Owner::Container(id), old);
            self.mark_updated(id);
        }
        Ok(old)
    }

    /// Reverse lookup: the first key whose value is structurally equal to `value`.
    ///
    /// Linear in the number of entries.
    #[must_use]
    pub fn dict_key_of(&self, dict: &Value, value: &Value) -> Option<Name> {
        let id = self.peek_dict(dict)?;
        self.arena
            .entries(id)?
            .iter()
            .find(|(_, candidate)| self.structurally_equal(candidate, value))
            .map(|(key, _)| key.clone())
    }

    // ---------------------------------------------------------------
    // Generic child access
    // ---------------------------------------------------------------

    /// The raw child at `key` of an array (index) or dictionary (name).
    #[must_use]
    pub fn get_child(&self, container: &Value, key: &ChildKey) -> Option<Value> {
        match key {
            ChildKey::Index(index) => self.array_get(container, *index),
            ChildKey::Key(name) => self.dict_get(container, name),
        }
    }

    /// Replaces a child, returning the previous one. An index equal to the array length
    /// appends.
    pub fn set_child(
        &mut self,
        container: &Value,
        key: ChildKey,
        value: Value,
    ) -> Result<Option<Value>> {
        match key {
            ChildKey::Key(name) => self.dict_set(container, name, value),
            ChildKey::Index(index) => {
                let resolved = self.resolve(container);
                let len = self.array_len(&resolved).unwrap_or(0);
                if index == len {
                    self.array_push(container, value).map(|_| None)
                } else {
                    self.array_set(container, index, value).map(Some)
                }
            }
        }
    }

    /// Returns the child at `key` when it resolves to `kind`, creating a virtual default
    /// otherwise.
    ///
    /// The default is held inline when `direct`, or registered as a new (virtual)
    /// indirect object referenced from the container. Virtual values are left out of
    /// serialized output until they, or something inside them, are mutated. Inserting a
    /// default does not by itself mark the container updated.
    ///
    /// An existing entry of another kind is handled by
    /// [`DocumentOptions::mismatch_policy`](crate::DocumentOptions::mismatch_policy);
    /// entries resolving to `Null` count as missing.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] for a wrong-kind entry under [`MismatchPolicy::Fail`]
    /// - [`Error::ImmutableMutation`] when `container` is a simple value
    /// - [`Error::IndexOutOfBounds`] for an index past the end of an array
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::{ContainerKind, Document};
    ///
    /// let mut doc = Document::new();
    /// let catalog = doc.catalog();
    /// let names = doc.get_or_create(&catalog, "Names", ContainerKind::Dictionary, true).unwrap();
    /// assert!(doc.is_virtual(&names));
    /// ```
    pub fn get_or_create(
        &mut self,
        container: &Value,
        key: impl Into<ChildKey>,
        kind: ContainerKind,
        direct: bool,
    ) -> Result<Value> {
        let key = key.into();
        let id = match &key {
            ChildKey::Index(_) => self.target(container, Want::Array)?,
            ChildKey::Key(_) => self.dict_target(container)?,
        };

        let existing = match &key {
            ChildKey::Index(index) => {
                let len = self.arena.items(id).map_or(0, Vec::len);
                if *index > len {
                    return Err(Error::IndexOutOfBounds { index: *index, len });
                }
                self.arena.items(id).and_then(|items| items.get(*index).cloned())
            }
            ChildKey::Key(name) => self
                .arena
                .entries(id)
                .and_then(|map| map.get(name).cloned()),
        };

        let mut replacing = false;
        if let Some(raw) = existing {
            let resolved = self.resolve(&raw);
            if resolved.kind() == kind.value_kind() {
                return Ok(resolved);
            }
            if !resolved.is_null() {
                if self.options().mismatch_policy == MismatchPolicy::Fail {
                    return Err(Error::type_mismatch(
                        kind.value_kind().as_str(),
                        resolved.kind().as_str(),
                    ));
                }
                replacing = true;
            }
        }

        let fresh = self.new_default(kind);
        if let Some(node) = fresh.node_id().and_then(|n| self.arena.get_mut(n)) {
            node.virtual_ = true;
        }
        let entry = if direct {
            fresh.clone()
        } else {
            let object = self.register(fresh.clone());
            if let Some(slot) = self.slots.get_mut(&object.number) {
                slot.virtual_ = true;
                slot.updated = false;
                slot.referrer = Some(id);
            }
            Value::Reference(object)
        };

        let owner = Owner::Container(id);
        self.attach(owner, &entry);
        let old = match &key {
            ChildKey::Index(index) => self.arena.items_mut(id).and_then(|items| {
                if *index == items.len() {
                    items.push(entry);
                    None
                } else {
                    Some(std::mem::replace(&mut items[*index], entry))
                }
            }),
            ChildKey::Key(name) => self
                .arena
                .entries_mut(id)
                .and_then(|map| map.insert(name.clone(), entry)),
        };
        if let Some(old) = &old {
            self.exclude(owner, old);
        }
        if replacing {
            self.mark_updated(id);
        }
        Ok(fresh)
    }

    // ---------------------------------------------------------------
    // Equality and copies
    // ---------------------------------------------------------------

    /// Recursive structural equality inside this document.
    ///
    /// Identical handles are equal without inspection; references compare by identity.
    #[must_use]
    pub fn structurally_equal(&self, a: &Value, b: &Value) -> bool {
        deep_eq(self, a, self, b)
    }

    /// Deep copy of a container inside this document. Simple values (including
    /// references) are returned as they are; the copy has no owner.
    pub fn duplicate(&mut self, value: &Value) -> Value {
        let Some(source) = value.node_id() else {
            return value.clone();
        };
        let Some((root, root_id)) = self.shell_of(source) else {
            return Value::Null;
        };
        let mut stack: Vec<(NodeId, NodeId)> = vec![(source, root_id)];
        while let Some((from, to)) = stack.pop() {
            let data = match self.arena.get(from) {
                Some(node) => node.data.clone(),
                None => continue,
            };
            match data {
                NodeData::Array(items) => {
                    let mut copies = Vec::with_capacity(items.len());
                    for item in items {
                        copies.push(self.copy_child(item, to, &mut stack));
                    }
                    if let Some(target) = self.arena.items_mut(to) {
                        *target = copies;
                    }
                }
                NodeData::Dictionary(map) => {
                    let mut copies = PdfMap::with_capacity(map.len());
                    for (key, item) in map {
                        copies.insert(key, self.copy_child(item, to, &mut stack));
                    }
                    if let Some(target) = self.arena.entries_mut(to) {
                        *target = copies;
                    }
                }
                NodeData::Stream(data) => {
                    if let Some(header) = self.arena.stream(to).map(|s| s.header) {
                        stack.push((data.header, header));
                    }
                }
            }
        }
        root
    }

    fn copy_child(
        &mut self,
        item: Value,
        parent: NodeId,
        stack: &mut Vec<(NodeId, NodeId)>,
    ) -> Value {
        match item.node_id().and_then(|id| self.shell_of(id).map(|s| (id, s))) {
            Some((from, (shell, to))) => {
                self.attach(Owner::Container(parent), &shell);
                stack.push((from, to));
                shell
            }
            None => item,
        }
    }

    /// An empty container of the same kind as `source` (streams keep their body).
    fn shell_of(&mut self, source: NodeId) -> Option<(Value, NodeId)> {
        let shell = match &self.arena.get(source)?.data {
            NodeData::Array(_) => self.new_array(),
            NodeData::Dictionary(_) => self.new_dictionary(),
            NodeData::Stream(data) => {
                let (body, resolved) = (data.body.clone(), data.body_resolved);
                let stream = self.new_stream(body);
                if let Some(s) = stream.node_id().and_then(|id| self.arena.stream_mut(id)) {
                    s.body_resolved = resolved;
                }
                stream
            }
        };
        let id = shell.node_id()?;
        Some((shell, id))
    }
}

/// Structural equality across two documents.
///
/// Containers compare recursively (explicit stack), streams by header and body,
/// references by object identity, reals by value.
#[must_use]
pub fn deep_eq(left: &Document, a: &Value, right: &Document, b: &Value) -> bool {
    let same_document = std::ptr::eq(left, right);
    let mut stack = vec![(a.clone(), b.clone())];
    while let Some((x, y)) = stack.pop() {
        match (&x, &y) {
            (Value::Array(i), Value::Array(j)) => {
                if same_document && i == j {
                    continue;
                }
                match (left.arena.items(*i), right.arena.items(*j)) {
                    (Some(xs), Some(ys)) if xs.len() == ys.len() => {
                        stack.extend(xs.iter().cloned().zip(ys.iter().cloned()));
                    }
                    _ => return false,
                }
            }
            (Value::Dictionary(i), Value::Dictionary(j)) => {
                if same_document && i == j {
                    continue;
                }
                match (left.arena.entries(*i), right.arena.entries(*j)) {
                    (Some(xs), Some(ys)) if xs.len() == ys.len() => {
                        for (key, value) in xs {
                            match ys.get(key) {
                                Some(other) => stack.push((value.clone(), other.clone())),
                                None => return false,
                            }
                        }
                    }
                    _ => return false,
                }
            }
            (Value::Stream(i), Value::Stream(j)) => {
                if same_document && i == j {
                    continue;
                }
                match (left.arena.stream(*i), right.arena.stream(*j)) {
                    (Some(s), Some(t)) if s.body == t.body => {
                        stack.push((Value::Dictionary(s.header), Value::Dictionary(t.header)));
                    }
                    _ => return false,
                }
            }
            (x, y) if x.kind() == y.kind() && x.is_simple() => {
                if x != y {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectId;

    #[test]
    fn test_set_child_through_reference() {
        let mut doc = Document::new();
        let array = doc.new_array_with(vec![Value::from(1)]);
        let id = doc.register(array);
        let reference = Value::Reference(id);

        assert_eq!(doc.set_child(&reference, ChildKey::from(1), Value::from(2)).unwrap(), None);
        assert_eq!(
            doc.set_child(&reference, ChildKey::from(0), Value::from(7)).unwrap(),
            Some(Value::from(1))
        );
        let resolved = doc.resolve(&reference);
        assert_eq!(doc.array_items(&resolved), Some(vec![Value::from(7), Value::from(2)]));
        assert!(matches!(
            doc.set_child(&reference, ChildKey::from(5), Value::Null),
            Err(Error::IndexOutOfBounds { .. })
        ));

        let dict = doc.new_dictionary();
        doc.set_child(&dict, ChildKey::from("K"), Value::from(3)).unwrap();
        assert_eq!(doc.get_child(&dict, &ChildKey::from("K")), Some(Value::from(3)));
    }

    #[test]
    fn test_array_operations() {
        let mut doc = Document::new();
        let array = doc.new_array();
        doc.array_push(&array, Value::from(1)).unwrap();
        doc.array_push(&array, Value::from(3)).unwrap();
        doc.array_insert(&array, 1, Value::from(2)).unwrap();

        assert_eq!(
            doc.array_items(&array).unwrap(),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
        assert_eq!(doc.array_set(&array, 0, Value::from(0)).unwrap(), Value::from(1));
        assert_eq!(doc.array_remove(&array, 2).unwrap(), Value::from(3));
        assert_eq!(doc.array_len(&array), Some(2));
        assert!(matches!(
            doc.array_remove(&array, 5),
            Err(Error::IndexOutOfBounds { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_dictionary_operations() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        doc.dict_set(&dict, "A", Value::from(1)).unwrap();
        doc.dict_set(&dict, "B", Value::name("X")).unwrap();

        assert_eq!(doc.dict_len(&dict), Some(2));
        assert_eq!(doc.dict_key_of(&dict, &Value::name("X")), Some(Name::from("B")));
        assert_eq!(doc.dict_set(&dict, "A", Value::Null).unwrap(), Some(Value::from(1)));
        assert!(!doc.dict_contains(&dict, "A"));
    }

    #[test]
    fn test_simple_values_are_immutable() {
        let mut doc = Document::new();
        for target in [Value::from(1), Value::name("N"), Value::Null, Value::string("s")] {
            assert!(matches!(
                doc.array_push(&target, Value::Null),
                Err(Error::ImmutableMutation(_))
            ));
            assert!(matches!(
                doc.dict_set(&target, "K", Value::from(1)),
                Err(Error::ImmutableMutation(_))
            ));
        }
    }

    #[test]
    fn test_wrong_container_kind() {
        let mut doc = Document::new();
        let array = doc.new_array();
        assert!(matches!(
            doc.dict_set(&array, "K", Value::from(1)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_include_sets_owner_and_exclude_clears_it() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        let child = doc.new_array();
        doc.dict_set(&dict, "Kids", child.clone()).unwrap();
        assert_eq!(doc.owner(&child), Some(Owner::Container(dict.node_id().unwrap())));

        doc.dict_remove(&dict, "Kids").unwrap();
        assert_eq!(doc.owner(&child), None);
    }

    #[test]
    fn test_attached_container_is_copied_on_second_insert() {
        let mut doc = Document::new();
        let first = doc.new_dictionary();
        let second = doc.new_dictionary();
        let child = doc.new_array_with(vec![Value::from(1)]);
        doc.dict_set(&first, "A", child.clone()).unwrap();
        doc.dict_set(&second, "A", child.clone()).unwrap();

        let copy = doc.dict_get(&second, "A").unwrap();
        assert_ne!(copy, child);
        assert!(doc.structurally_equal(&copy, &child));
    }

    #[test]
    fn test_mutation_propagates_to_owning_object() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        let inner = doc.new_array();
        doc.dict_set(&dict, "Inner", inner.clone()).unwrap();
        let id = doc.register(dict.clone());

        doc.array_push(&inner, Value::from(1)).unwrap();
        assert!(doc.is_updated(&inner));
        assert!(doc.is_updated(&dict));
        assert!(doc.is_updated(&Value::Reference(id)));
    }

    #[test]
    fn test_get_or_create_direct_is_virtual_until_mutated() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        let child = doc
            .get_or_create(&dict, "Child", ContainerKind::Dictionary, true)
            .unwrap();
        assert!(doc.is_virtual(&child));
        assert!(!doc.is_updated(&dict));

        let again = doc
            .get_or_create(&dict, "Child", ContainerKind::Dictionary, true)
            .unwrap();
        assert_eq!(again, child);

        doc.dict_set(&child, "K", Value::from(1)).unwrap();
        assert!(!doc.is_virtual(&child));
        assert!(doc.is_updated(&dict));
    }

    #[test]
    fn test_get_or_create_indirect_registers_virtual_slot() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        let child = doc
            .get_or_create(&dict, "Kids", ContainerKind::Array, false)
            .unwrap();
        let reference = doc.dict_get(&dict, "Kids").unwrap();
        let id = reference.as_reference().unwrap();
        assert!(doc.slot(id).unwrap().is_virtual());
        assert_eq!(doc.resolve(&reference), child);

        doc.array_push(&child, Value::from(1)).unwrap();
        assert!(!doc.slot(id).unwrap().is_virtual());
        assert!(doc.is_updated(&dict));
    }

    #[test]
    fn test_get_or_create_mismatch_policies() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        doc.dict_set(&dict, "K", Value::from(1)).unwrap();
        assert!(matches!(
            doc.get_or_create(&dict, "K", ContainerKind::Array, true),
            Err(Error::TypeMismatch { .. })
        ));

        let mut lenient = Document::with_options(
            crate::DocumentOptions::new().with_mismatch_policy(MismatchPolicy::Replace),
        );
        let dict = lenient.new_dictionary();
        lenient.dict_set(&dict, "K", Value::from(1)).unwrap();
        let created = lenient
            .get_or_create(&dict, "K", ContainerKind::Array, true)
            .unwrap();
        assert!(created.is_array());
    }

    #[test]
    fn test_get_or_create_treats_dangling_reference_as_missing() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        doc.dict_set(&dict, "K", Value::Reference(ObjectId::new(500, 0)))
            .unwrap();
        let created = doc
            .get_or_create(&dict, "K", ContainerKind::Dictionary, true)
            .unwrap();
        assert!(created.is_dictionary());
    }

    #[test]
    fn test_get_or_create_on_array_index() {
        let mut doc = Document::new();
        let array = doc.new_array();
        let first = doc.get_or_create(&array, 0usize, ContainerKind::Array, true).unwrap();
        assert!(first.is_array());
        assert_eq!(doc.array_len(&array), Some(1));
        assert!(matches!(
            doc.get_or_create(&array, 3usize, ContainerKind::Array, true),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_structural_equality() {
        let mut doc = Document::new();
        let a = doc.new_array_with(vec![Value::from(1), Value::name("X")]);
        let b = doc.new_array_with(vec![Value::from(1), Value::name("X")]);
        let c = doc.new_array_with(vec![Value::from(1), Value::name("Y")]);
        assert!(doc.structurally_equal(&a, &b));
        assert!(!doc.structurally_equal(&a, &c));
        assert!(doc.structurally_equal(&a, &a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_deep_copies_containers() {
        let mut doc = Document::new();
        let inner = doc.new_array_with(vec![Value::from(1)]);
        let outer = doc.new_dictionary_with([("Inner", inner.clone())]);
        let copy = doc.duplicate(&outer);

        assert!(doc.structurally_equal(&copy, &outer));
        let copied_inner = doc.dict_get(&copy, "Inner").unwrap();
        assert_ne!(copied_inner, inner);
        doc.array_push(&copied_inner, Value::from(2)).unwrap();
        assert_eq!(doc.array_len(&inner), Some(1));
    }
}
