//! The document context and its indirect object space.
//!
//! A [`Document`] owns:
//!
//! - the slot table, one [`IndirectSlot`] per object number, each holding a
//!   cross-reference entry and a lazily resolved payload
//! - the container arena every array, dictionary and stream of the document lives in
//! - the trailer dictionary, the next-free-number counter and the set of loaded objects
//!   that changed since loading (the content of the next incremental update)
//!
//! ## Read paths and write paths
//!
//! Dereferencing is lenient: a reference to a missing, free or unparseable object resolves
//! to `None` (or [`Value::Null`] through [`Document::resolve`]) so traversal code keeps
//! going over damaged documents. Operations that mean to change a specific object
//! ([`Document::set_object`], [`Document::delete`], [`Document::swap`], ...) fail with
//! [`Error::UndefinedIndirectObject`] when their target does not exist.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, Value};
//!
//! let mut doc = Document::new();
//! let id = doc.register(Value::from(42));
//! assert_eq!(doc.resolve(&Value::Reference(id)), Value::Integer(42));
//!
//! doc.delete(id).unwrap();
//! assert_eq!(doc.resolve(&Value::Reference(id)), Value::Null);
//! ```

use crate::error::{Error, Result};
use crate::file::{FileStore, MemoryFileStore};
use crate::filter::FilterRegistry;
use crate::node::{Arena, Owner};
use crate::objstm::ObjectStreamIndex;
use crate::options::DocumentOptions;
use crate::value::{Name, NodeId, ObjectId, Value};
use crate::xref::{XrefEntry, XrefUsage};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// One numbered entry of the indirect object space.
#[derive(Debug, Clone)]
pub struct IndirectSlot {
    pub(crate) entry: XrefEntry,
    pub(crate) payload: Option<Value>,
    pub(crate) original: bool,
    pub(crate) virtual_: bool,
    pub(crate) updated: bool,
    /// Container that auto-created this slot as a virtual default.
    pub(crate) referrer: Option<NodeId>,
}

impl IndirectSlot {
    pub(crate) fn loaded(entry: XrefEntry) -> Self {
        IndirectSlot {
            entry,
            payload: None,
            original: true,
            virtual_: false,
            updated: false,
            referrer: None,
        }
    }

    fn registered(payload: Value) -> Self {
        IndirectSlot {
            entry: XrefEntry::in_use(None, 0),
            payload: Some(payload),
            original: false,
            virtual_: false,
            updated: true,
            referrer: None,
        }
    }

    #[must_use]
    pub fn entry(&self) -> &XrefEntry {
        &self.entry
    }

    #[must_use]
    pub fn generation(&self) -> u16 {
        self.entry.generation
    }

    /// `true` when the slot came from the loaded cross-reference data.
    #[must_use]
    pub fn is_original(&self) -> bool {
        self.original
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.virtual_
    }

    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// `true` once the payload has been materialized (or assigned).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.payload.is_some()
    }
}

/// A document: indirect object space, container arena and trailer.
pub struct Document {
    pub(crate) arena: Arena,
    pub(crate) slots: BTreeMap<u32, IndirectSlot>,
    pub(crate) next_number: u32,
    pub(crate) trailer: Value,
    pub(crate) source: Option<Rc<[u8]>>,
    /// Offset of the newest cross-reference section of the loaded bytes.
    pub(crate) previous_xref: Option<u64>,
    /// The loaded bytes use cross-reference streams.
    pub(crate) uses_xref_streams: bool,
    pub(crate) modified: BTreeSet<u32>,
    pub(crate) loading: HashSet<u32>,
    pub(crate) objstm_cache: HashMap<u32, Rc<ObjectStreamIndex>>,
    pub(crate) filters: FilterRegistry,
    pub(crate) files: Box<dyn FileStore>,
    options: DocumentOptions,
}

impl Document {
    /// Creates a new document with a catalog referenced from the trailer's `Root`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    #[must_use]
    pub fn with_options(options: DocumentOptions) -> Self {
        let mut doc = Self::empty(options);
        let catalog = doc.new_dictionary();
        doc.put_entry(&catalog, "Type", Value::name("Catalog"));
        let root = doc.register(catalog);
        let trailer = doc.trailer.clone();
        doc.put_entry(&trailer, "Root", Value::Reference(root));
        doc
    }

    /// A document without catalog; the loader fills it from existing bytes.
    pub(crate) fn empty(options: DocumentOptions) -> Self {
        let mut arena = Arena::default();
        let trailer = Value::Dictionary(arena.alloc(crate::node::NodeData::Dictionary(
            crate::map::PdfMap::new(),
        )));
        let mut slots = BTreeMap::new();
        slots.insert(0, IndirectSlot::loaded(XrefEntry::free(0, u16::MAX)));
        Document {
            arena,
            slots,
            next_number: 1,
            trailer,
            source: None,
            previous_xref: None,
            uses_xref_streams: false,
            modified: BTreeSet::new(),
            loading: HashSet::new(),
            objstm_cache: HashMap::new(),
            filters: FilterRegistry::default(),
            files: Box::new(MemoryFileStore::new()),
            options,
        }
    }

    /// Loads a document from its serialized bytes.
    ///
    /// Only the cross-reference data and the trailer are read up front; object payloads
    /// are parsed on first access.
    ///
    /// # Errors
    ///
    /// Returns an error when neither the cross-reference data nor a repair scan yields a
    /// usable trailer.
    pub fn load(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::load_with_options(bytes, DocumentOptions::default())
    }

    pub fn load_with_options(bytes: impl Into<Vec<u8>>, options: DocumentOptions) -> Result<Self> {
        let mut doc = Self::empty(options);
        doc.source = Some(Rc::from(bytes.into()));
        crate::xref::load_cross_references(&mut doc)?;
        Ok(doc)
    }

    #[must_use]
    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// The trailer dictionary.
    #[must_use]
    pub fn trailer(&self) -> Value {
        self.trailer.clone()
    }

    /// The resolved document catalog (`Root` entry of the trailer), or `Null`.
    pub fn catalog(&mut self) -> Value {
        let root = self.dict_get(&self.trailer.clone(), "Root").unwrap_or_default();
        self.resolve(&root)
    }

    pub fn set_file_store(&mut self, store: Box<dyn FileStore>) {
        self.files = store;
    }

    #[must_use]
    pub fn file_store(&self) -> &dyn FileStore {
        self.files.as_ref()
    }

    #[must_use]
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    /// The object number the next registration will receive.
    #[must_use]
    pub fn next_number(&self) -> u32 {
        self.next_number
    }

    /// `true` when the document was loaded from bytes.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    /// The slot addressed by `id`, if its generation matches.
    #[must_use]
    pub fn slot(&self, id: ObjectId) -> Option<&IndirectSlot> {
        self.slots
            .get(&id.number)
            .filter(|slot| slot.entry.generation == id.generation)
    }

    #[must_use]
    pub fn entry(&self, id: ObjectId) -> Option<&XrefEntry> {
        self.slot(id).map(|slot| &slot.entry)
    }

    /// Identities of every in-use slot, ascending by number.
    #[must_use]
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .filter(|(_, slot)| !slot.entry.is_free())
            .map(|(number, slot)| ObjectId::new(*number, slot.entry.generation))
            .collect()
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.slots.values().filter(|s| !s.entry.is_free()).count()
    }

    /// Loaded objects changed since loading, i.e. the content of the next incremental
    /// update (new objects are not listed).
    #[must_use]
    pub fn pending_updates(&self) -> Vec<ObjectId> {
        self.modified
            .iter()
            .filter_map(|number| {
                self.slots
                    .get(number)
                    .map(|slot| ObjectId::new(*number, slot.entry.generation))
            })
            .collect()
    }

    /// Registers `value` as a new indirect object and returns its identity.
    ///
    /// A container that already has an owner is registered as a copy.
    pub fn register(&mut self, value: Value) -> ObjectId {
        let number = self.next_number;
        self.next_number += 1;
        let id = ObjectId::new(number, 0);
        let value = self.include(Owner::Object(id), value);
        self.slots.insert(number, IndirectSlot::registered(value));
        debug!(object = %id, "registered indirect object");
        id
    }

    /// Dereferences `id`, parsing its payload on first access.
    ///
    /// Free, missing and unparseable objects yield `None`; parse failures are logged.
    pub fn resolve_object(&mut self, id: ObjectId) -> Option<Value> {
        match self.try_resolve_object(id) {
            Ok(value) => value,
            Err(err) => {
                warn!(object = %id, error = %err, "failed to load indirect object");
                None
            }
        }
    }

    /// Like [`Document::resolve_object`], but reports load failures.
    pub fn try_resolve_object(&mut self, id: ObjectId) -> Result<Option<Value>> {
        let usage = match self.slot(id) {
            None => return Ok(None),
            Some(slot) if slot.entry.is_free() => return Ok(None),
            Some(slot) => {
                if let Some(payload) = &slot.payload {
                    return Ok(Some(payload.clone()));
                }
                slot.entry.usage.clone()
            }
        };

        // A payload that refers back to itself while loading (e.g. a stream whose
        // Length points at its own object) must not recurse.
        if !self.loading.insert(id.number) {
            return Ok(None);
        }
        let loaded = self.load_payload(id, usage);
        self.loading.remove(&id.number);
        let value = loaded?;

        self.attach(Owner::Object(id), &value);
        if let Some(slot) = self.slots.get_mut(&id.number) {
            slot.payload = Some(value.clone());
        }
        Ok(Some(value))
    }

    fn load_payload(&mut self, id: ObjectId, usage: XrefUsage) -> Result<Value> {
        match usage {
            XrefUsage::InUse {
                offset: Some(offset),
            } => {
                debug!(object = %id, offset, "parsing indirect object");
                crate::parser::parse_indirect_at(self, offset as usize, id)
            }
            XrefUsage::InUseCompressed {
                stream,
                index: Some(index),
            } => self.load_compressed(id, stream, index),
            _ => Ok(Value::Null),
        }
    }

    /// Resolves references; every other value resolves to itself.
    pub fn resolve(&mut self, value: &Value) -> Value {
        match value {
            Value::Reference(id) => self.resolve_object(*id).unwrap_or(Value::Null),
            other => other.clone(),
        }
    }

    /// Follows a reference only when its payload is already materialized.
    pub(crate) fn peek(&self, value: &Value) -> Value {
        match value {
            Value::Reference(id) => self
                .slot(*id)
                .and_then(|slot| slot.payload.clone())
                .unwrap_or(Value::Null),
            other => other.clone(),
        }
    }

    pub(crate) fn writable_slot(&self, id: ObjectId) -> Result<&IndirectSlot> {
        match self.slot(id) {
            Some(slot) if !slot.entry.is_free() => Ok(slot),
            _ => Err(Error::UndefinedIndirectObject(id)),
        }
    }

    /// Replaces the payload of an existing object, returning the previous payload.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when `id` is missing or free.
    pub fn set_object(&mut self, id: ObjectId, value: Value) -> Result<Option<Value>> {
        self.writable_slot(id)?;
        let value = self.include(Owner::Object(id), value);
        let old = self
            .slots
            .get_mut(&id.number)
            .and_then(|slot| slot.payload.replace(value));
        if let Some(old) = &old {
            self.exclude(Owner::Object(id), old);
        }
        self.touch_slot(id.number);
        Ok(old)
    }

    /// Flags an object as changed so the next incremental update rewrites it.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when `id` is missing or free.
    pub fn mark_object_updated(&mut self, id: ObjectId) -> Result<()> {
        self.writable_slot(id)?;
        self.touch_slot(id.number);
        Ok(())
    }

    /// Marks a slot updated and concrete. Returns the container that auto-created it when
    /// the slot stops being virtual, so the caller can continue propagating.
    pub(crate) fn touch_slot(&mut self, number: u32) -> Option<NodeId> {
        let slot = self.slots.get_mut(&number)?;
        let was_virtual = slot.virtual_;
        slot.updated = true;
        slot.virtual_ = false;
        if slot.original {
            self.modified.insert(number);
        }
        if was_virtual {
            slot.referrer.take()
        } else {
            None
        }
    }

    /// Frees an object: uncompresses it, marks the entry free and drops the payload.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when `id` is missing or already free.
    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        self.writable_slot(id)?;
        self.uncompress(id)?;
        let (payload, original) = match self.slots.get_mut(&id.number) {
            Some(slot) => {
                let generation = slot.entry.generation.saturating_add(1);
                slot.entry = XrefEntry::free(0, generation);
                slot.virtual_ = false;
                slot.referrer = None;
                (slot.payload.take(), slot.original)
            }
            None => return Err(Error::UndefinedIndirectObject(id)),
        };
        if let Some(payload) = payload {
            self.exclude(Owner::Object(id), &payload);
        }
        if original {
            self.modified.insert(id.number);
        } else {
            self.modified.remove(&id.number);
        }
        debug!(object = %id, "deleted indirect object");
        Ok(())
    }

    /// Exchanges the payloads of two objects; each keeps its identity and entry.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when either object is missing or free.
    pub fn swap(&mut self, a: ObjectId, b: ObjectId) -> Result<()> {
        self.writable_slot(a)?;
        self.writable_slot(b)?;
        if a == b {
            return Ok(());
        }
        let payload_a = self.resolve_object(a).unwrap_or_default();
        let payload_b = self.resolve_object(b).unwrap_or_default();

        self.reown(&payload_a, Owner::Object(b));
        self.reown(&payload_b, Owner::Object(a));
        if let Some(slot) = self.slots.get_mut(&a.number) {
            slot.payload = Some(payload_b);
        }
        if let Some(slot) = self.slots.get_mut(&b.number) {
            slot.payload = Some(payload_a);
        }
        self.touch_slot(a.number);
        self.touch_slot(b.number);
        Ok(())
    }

    fn reown(&mut self, value: &Value, owner: Owner) {
        if let Some(node) = value.node_id().and_then(|id| self.arena.get_mut(id)) {
            node.owner = Some(owner);
        }
    }

    /// Sets an entry while building internal structures, without update tracking.
    pub(crate) fn put_entry(&mut self, dict: &Value, key: &str, value: Value) {
        let Some(id) = dict.node_id() else { return };
        self.attach(Owner::Container(id), &value);
        if let Some(map) = self.arena.entries_mut(id) {
            map.insert(Name::from(key), value);
        }
    }

    /// Reads the `Root`/`Info`-style reference of the trailer.
    pub(crate) fn trailer_entry(&self, key: &str) -> Option<Value> {
        self.dict_get(&self.trailer, key)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("objects", &self.object_count())
            .field("next_number", &self.next_number)
            .field("containers", &self.arena.len())
            .field("pending_updates", &self.modified.len())
            .field("loaded", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_catalog() {
        let mut doc = Document::new();
        let catalog = doc.catalog();
        assert!(catalog.is_dictionary());
        assert!(doc.dict_get(&catalog, "Type").unwrap().is_name("Catalog"));
        assert_eq!(doc.next_number(), 2);
    }

    #[test]
    fn test_register_assigns_increasing_numbers() {
        let mut doc = Document::new();
        let a = doc.register(Value::from(1));
        let b = doc.register(Value::from(2));
        assert_eq!(b.number, a.number + 1);
        assert_eq!(a.generation, 0);
        assert!(!doc.slot(a).unwrap().is_original());
    }

    #[test]
    fn test_read_paths_degrade_softly() {
        let mut doc = Document::new();
        assert_eq!(doc.resolve_object(ObjectId::new(99, 0)), None);
        assert_eq!(doc.resolve(&Value::Reference(ObjectId::new(99, 0))), Value::Null);
        assert_eq!(doc.resolve_object(ObjectId::new(0, u16::MAX)), None);
    }

    #[test]
    fn test_write_paths_fail_fast() {
        let mut doc = Document::new();
        let missing = ObjectId::new(99, 0);
        assert!(matches!(
            doc.set_object(missing, Value::Null),
            Err(Error::UndefinedIndirectObject(id)) if id == missing
        ));
        assert!(doc.mark_object_updated(missing).is_err());
        assert!(doc.delete(missing).is_err());
    }

    #[test]
    fn test_delete_frees_and_bumps_generation() {
        let mut doc = Document::new();
        let id = doc.register(Value::from(1));
        doc.delete(id).unwrap();

        assert!(doc.slot(id).is_none());
        let entry = doc.entry(ObjectId::new(id.number, 1)).unwrap();
        assert!(entry.is_free());
        assert!(doc.delete(id).is_err());
    }

    #[test]
    fn test_swap_exchanges_payloads_only() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        let a = doc.register(dict.clone());
        let b = doc.register(Value::from(7));

        doc.swap(a, b).unwrap();
        assert_eq!(doc.resolve_object(a), Some(Value::Integer(7)));
        assert_eq!(doc.resolve_object(b), Some(dict.clone()));
        assert_eq!(doc.owner(&dict), Some(Owner::Object(b)));
    }

    #[test]
    fn test_set_object_replaces_payload() {
        let mut doc = Document::new();
        let id = doc.register(Value::from(1));
        let old = doc.set_object(id, Value::from(2)).unwrap();
        assert_eq!(old, Some(Value::Integer(1)));
        assert_eq!(doc.resolve_object(id), Some(Value::Integer(2)));
    }
}
