//! Copying value graphs from one document into another.
//!
//! [`clone_into`] copies a value of a source document into a target document. Containers
//! are rebuilt child by child, stream bodies are copied verbatim, and every indirect object
//! reached through a reference is copied once: the target object is registered before its
//! payload is copied, so shared objects stay shared and cycles terminate.
//!
//! [`CloneFilter`]s recognise document shapes (pages, actions, annotation arrays) by their
//! keys and hook into the copy: they can veto single entries, post-process copied children
//! and fix up the finished copy.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{clone_into, default_filters, Document, Value};
//!
//! let mut source = Document::new();
//! let shared = source.new_dictionary_with([("N", Value::from(1))]);
//! let shared = source.register(shared);
//! let outer = source.new_dictionary_with([
//!     ("x", Value::Reference(shared)),
//!     ("y", Value::Reference(shared)),
//! ]);
//!
//! let mut target = Document::new();
//! let copy = clone_into(&mut target, &mut source, &default_filters(), &outer).unwrap();
//! assert_eq!(target.dict_get(&copy, "x"), target.dict_get(&copy, "y"));
//! ```

use crate::error::{Error, Result};
use crate::value::{ChildKey, NodeId, ObjectId, Value};
use crate::Document;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A hook set applied to the containers it matches while cloning.
///
/// `source` arguments are resolved values of the source document, `clone` arguments the
/// corresponding values of the target document.
pub trait CloneFilter {
    fn name(&self) -> &str;

    /// Whether this filter handles the container `source`. The first matching filter wins.
    fn matches(&self, cx: &mut CloneContext<'_>, source: &Value) -> bool;

    /// Runs before the child at `key` is copied; returning `false` drops that child.
    fn before_child(
        &self,
        _cx: &mut CloneContext<'_>,
        _source: &Value,
        _key: &ChildKey,
        _child: &Value,
    ) -> Result<bool> {
        Ok(true)
    }

    /// Runs once the child at `key` (and everything below it) has been copied.
    fn after_child(
        &self,
        _cx: &mut CloneContext<'_>,
        _source: &Value,
        _clone: &Value,
        _key: &ChildKey,
        _child_source: &Value,
        _child_clone: &Value,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs once every child of the container has been processed.
    fn after_object(&self, _cx: &mut CloneContext<'_>, _source: &Value, _clone: &Value) -> Result<()> {
        Ok(())
    }
}

struct Hook {
    filter: usize,
    parent_source: Value,
    parent_clone: Value,
    key: ChildKey,
    child_source: Value,
    child_clone: Value,
}

struct Frame {
    source: Value,
    clone: Value,
    children: Vec<(ChildKey, Value)>,
    next: usize,
    filter: Option<usize>,
    hook: Option<Hook>,
}

/// State of one clone session, handed to filter hooks.
pub struct CloneContext<'a> {
    source: &'a mut Document,
    target: &'a mut Document,
    filters: &'a [Box<dyn CloneFilter>],
    memo: &'a mut HashMap<ObjectId, ObjectId>,
}

impl<'a> CloneContext<'a> {
    pub fn source(&mut self) -> &mut Document {
        self.source
    }

    pub fn target(&mut self) -> &mut Document {
        self.target
    }

    /// Target identity of a source object copied in this session.
    #[must_use]
    pub fn mapped(&self, id: ObjectId) -> Option<ObjectId> {
        self.memo.get(&id).copied()
    }

    /// Copies `value` into the target, sharing this session's memo table.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedClone`] for object streams and cross-reference streams
    /// - errors raised by filter hooks
    pub fn clone_value(&mut self, value: &Value) -> Result<Value> {
        let (clone, frame) = self.copy(value)?;
        if let Some(frame) = frame {
            self.run(vec![frame])?;
        }
        Ok(clone)
    }

    fn run(&mut self, mut stack: Vec<Frame>) -> Result<()> {
        let filters = self.filters;
        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.children.len() {
                if let Some(frame) = stack.pop() {
                    self.finish(frame)?;
                }
                continue;
            }
            let (key, child) = frame.children[frame.next].clone();
            frame.next += 1;
            let (source, clone, filter) = (frame.source.clone(), frame.clone.clone(), frame.filter);

            if let Some(index) = filter {
                if !filters[index].before_child(self, &source, &key, &child)? {
                    continue;
                }
            }
            let (child_clone, child_frame) = self.copy(&child)?;
            match &key {
                ChildKey::Index(_) => self.target.array_push(&clone, child_clone.clone())?,
                ChildKey::Key(name) => {
                    self.target.dict_set(&clone, name.clone(), child_clone.clone())?;
                }
            }

            let hook = filter.map(|index| Hook {
                filter: index,
                parent_source: source,
                parent_clone: clone,
                key,
                child_source: self.source.resolve(&child),
                child_clone,
            });
            match (child_frame, hook) {
                (Some(mut child_frame), hook) => {
                    child_frame.hook = hook;
                    stack.push(child_frame);
                }
                (None, Some(hook)) => self.after_child(&hook)?,
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn finish(&mut self, frame: Frame) -> Result<()> {
        let filters = self.filters;
        if let Some(index) = frame.filter {
            filters[index].after_object(self, &frame.source, &frame.clone)?;
        }
        if let Some(hook) = &frame.hook {
            self.after_child(hook)?;
        }
        Ok(())
    }

    fn after_child(&mut self, hook: &Hook) -> Result<()> {
        let filters = self.filters;
        filters[hook.filter].after_child(
            self,
            &hook.parent_source,
            &hook.parent_clone,
            &hook.key,
            &hook.child_source,
            &hook.child_clone,
        )
    }

    /// The target counterpart of `value`, with a frame to fill it in for containers.
    fn copy(&mut self, value: &Value) -> Result<(Value, Option<Frame>)> {
        let Value::Reference(id) = value else {
            return self.shell(value);
        };
        if let Some(mapped) = self.memo.get(id) {
            return Ok((Value::Reference(*mapped), None));
        }
        let Some(payload) = self.source.resolve_object(*id) else {
            warn!(object = %id, "dangling reference copied as null");
            return Ok((Value::Null, None));
        };
        self.check_supported(&payload)?;

        let mapped = self.target.register(Value::Null);
        self.memo.insert(*id, mapped);
        let (shell, frame) = self.shell(&payload)?;
        self.target.set_object(mapped, shell)?;
        Ok((Value::Reference(mapped), frame))
    }

    fn check_supported(&self, payload: &Value) -> Result<()> {
        let kind = self
            .source
            .stream_header(payload)
            .and_then(|header| self.source.dict_get(&header, "Type"));
        match kind.as_ref().and_then(Value::as_name) {
            Some(name) if name == "ObjStm" || name == "XRef" => Err(Error::unsupported_clone(
                &format!("{} streams cannot be copied between documents", name),
            )),
            _ => Ok(()),
        }
    }

    fn shell(&mut self, value: &Value) -> Result<(Value, Option<Frame>)> {
        let (clone, source, target, children) = match value {
            Value::Array(id) => {
                let children = self
                    .source
                    .arena
                    .items(*id)
                    .map(|items| {
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| (ChildKey::Index(i), item.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                let clone = self.target.new_array();
                (clone.clone(), value.clone(), clone, children)
            }
            Value::Dictionary(id) => {
                let clone = self.target.new_dictionary();
                (clone.clone(), value.clone(), clone, self.entries_of(*id))
            }
            Value::Stream(id) => {
                self.check_supported(value)?;
                let Some(data) = self.source.arena.stream(*id) else {
                    return Ok((Value::Null, None));
                };
                let (header, body, resolved) = (data.header, data.body.clone(), data.body_resolved);
                let clone = self.target.new_stream(body);
                let clone_header = match clone.node_id().and_then(|n| self.target.arena.stream_mut(n)) {
                    Some(stream) => {
                        stream.body_resolved = resolved;
                        stream.header
                    }
                    None => return Ok((Value::Null, None)),
                };
                (
                    clone,
                    Value::Dictionary(header),
                    Value::Dictionary(clone_header),
                    self.entries_of(header),
                )
            }
            simple => return Ok((simple.clone(), None)),
        };

        let filter = self.match_filter(&source);
        Ok((
            clone,
            Some(Frame {
                source,
                clone: target,
                children,
                next: 0,
                filter,
                hook: None,
            }),
        ))
    }

    fn entries_of(&self, dict: NodeId) -> Vec<(ChildKey, Value)> {
        self.source
            .arena
            .entries(dict)
            .map(|map| {
                map.iter()
                    .map(|(key, value)| (ChildKey::Key(key.clone()), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn match_filter(&mut self, source: &Value) -> Option<usize> {
        let filters = self.filters;
        filters
            .iter()
            .position(|filter| filter.matches(self, source))
    }
}

impl fmt::Debug for CloneContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloneContext")
            .field("filters", &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("copied", &self.memo.len())
            .finish()
    }
}

/// Copies `value` from `source` into `target` and returns the copy.
///
/// Each call uses its own memo table: two calls copying the same source object produce
/// two target objects. Use a [`Cloner`] to share objects across calls.
///
/// # Errors
///
/// - [`Error::UnsupportedClone`] for object streams and cross-reference streams
/// - errors raised by filter hooks
pub fn clone_into(
    target: &mut Document,
    source: &mut Document,
    filters: &[Box<dyn CloneFilter>],
    value: &Value,
) -> Result<Value> {
    let mut memo = HashMap::new();
    let mut cx = CloneContext {
        source,
        target,
        filters,
        memo: &mut memo,
    };
    let clone = cx.clone_value(value)?;
    debug!(objects = memo.len(), "cloned value graph");
    Ok(clone)
}

/// A clone session whose memo table outlives single calls.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::{Cloner, Document, Value};
///
/// let mut source = Document::new();
/// let shared = source.register(Value::from(42));
/// let mut target = Document::new();
///
/// let mut cloner = Cloner::with_default_filters();
/// let a = cloner.clone_value(&mut source, &mut target, &Value::Reference(shared)).unwrap();
/// let b = cloner.clone_value(&mut source, &mut target, &Value::Reference(shared)).unwrap();
/// assert_eq!(a, b);
/// ```
pub struct Cloner {
    filters: Vec<Box<dyn CloneFilter>>,
    memo: HashMap<ObjectId, ObjectId>,
}

impl Cloner {
    pub fn new(filters: Vec<Box<dyn CloneFilter>>) -> Self {
        Cloner {
            filters,
            memo: HashMap::new(),
        }
    }

    pub fn with_default_filters() -> Self {
        Self::new(crate::clone_filters::default_filters())
    }

    /// Copies `value`, reusing target objects already copied by this session.
    ///
    /// The session must keep being used with the same pair of documents.
    pub fn clone_value(
        &mut self,
        source: &mut Document,
        target: &mut Document,
        value: &Value,
    ) -> Result<Value> {
        let before = self.memo.len();
        let mut cx = CloneContext {
            source,
            target,
            filters: &self.filters,
            memo: &mut self.memo,
        };
        let clone = cx.clone_value(value)?;
        debug!(
            objects = self.memo.len() - before,
            "cloned value graph in session"
        );
        Ok(clone)
    }

    #[must_use]
    pub fn mapped(&self, id: ObjectId) -> Option<ObjectId> {
        self.memo.get(&id).copied()
    }

    /// Number of source objects copied so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

impl Default for Cloner {
    fn default() -> Self {
        Self::with_default_filters()
    }
}

impl fmt::Debug for Cloner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cloner")
            .field("filters", &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("copied", &self.memo.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Veto(&'static str);

    impl CloneFilter for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn matches(&self, _cx: &mut CloneContext<'_>, source: &Value) -> bool {
            source.is_dictionary()
        }

        fn before_child(
            &self,
            _cx: &mut CloneContext<'_>,
            _source: &Value,
            key: &ChildKey,
            _child: &Value,
        ) -> Result<bool> {
            Ok(*key != ChildKey::from(self.0))
        }
    }

    #[test]
    fn test_simple_values_are_copied() {
        let mut source = Document::new();
        let mut target = Document::new();
        let value = Value::string("text");
        let copy = clone_into(&mut target, &mut source, &[], &value).unwrap();
        assert_eq!(copy, value);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut source = Document::new();
        let node = source.new_dictionary();
        let id = source.register(node.clone());
        source.dict_set(&node, "Self", Value::Reference(id)).unwrap();

        let mut target = Document::new();
        let copy = clone_into(&mut target, &mut source, &[], &Value::Reference(id)).unwrap();
        let copied = target.resolve(&copy);
        assert_eq!(target.dict_get(&copied, "Self"), Some(copy));
    }

    #[test]
    fn test_filter_veto_drops_entry() {
        let mut source = Document::new();
        let dict = source.new_dictionary_with([("Keep", Value::from(1)), ("Drop", Value::from(2))]);
        let mut target = Document::new();
        let filters: Vec<Box<dyn CloneFilter>> = vec![Box::new(Veto("Drop"))];
        let copy = clone_into(&mut target, &mut source, &filters, &dict).unwrap();
        assert!(target.dict_contains(&copy, "Keep"));
        assert!(!target.dict_contains(&copy, "Drop"));
    }

    #[test]
    fn test_stream_body_is_verbatim() {
        let mut source = Document::new();
        let stream = source.new_stream(b"4142".to_vec());
        source.dict_set(&stream, "Filter", Value::name("ASCIIHexDecode")).unwrap();
        let mut target = Document::new();
        let copy = clone_into(&mut target, &mut source, &[], &stream).unwrap();
        assert_eq!(target.stream_body(&copy, false).unwrap(), b"4142");
        assert_eq!(target.stream_body(&copy, true).unwrap(), b"AB");
    }

    #[test]
    fn test_object_streams_are_rejected() {
        let mut source = Document::new();
        let objstm = source.create_object_stream();
        let mut target = Document::new();
        let before = target.object_count();
        let err = clone_into(&mut target, &mut source, &[], &Value::Reference(objstm)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedClone(_)));
        assert_eq!(target.object_count(), before);
    }
}
