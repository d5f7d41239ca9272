//! Dynamic value representation for document objects.
//!
//! This module provides the [`Value`] enum, the tagged union every object in a
//! [`Document`](crate::Document) is made of, together with its building blocks:
//!
//! - [`ObjectId`]: the `(number, generation)` identity of an indirect object
//! - [`Name`]: an interned name such as `/Type`
//! - [`PdfString`]: a byte string with its serialization mode (literal or hex)
//! - [`NodeId`]: a handle to a container living in a document's container arena
//!
//! ## Simple values and containers
//!
//! Simple values (null, booleans, numbers, names, strings, references) are plain data and
//! are immutable once built. Containers (arrays, dictionaries, streams) are handles: the
//! items live in the owning document, and every mutation goes through the document so that
//! update tracking can propagate.
//!
//! ```rust
//! use pdf_cos::{Document, Value};
//!
//! let mut doc = Document::new();
//! let dict = doc.new_dictionary();
//! doc.dict_set(&dict, "Count", Value::from(3)).unwrap();
//!
//! assert!(dict.is_dictionary());
//! assert_eq!(doc.dict_get(&dict, "Count").and_then(|v| v.as_i64()), Some(3));
//! ```
//!
//! ## Equality
//!
//! `==` on [`Value`] is shallow: simple values compare by raw value, containers by handle
//! identity. Use [`Document::structurally_equal`](crate::Document::structurally_equal) to
//! compare container contents.

use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Identity of an indirect object inside one document.
///
/// Two references with the same `ObjectId` within the same document designate the same
/// object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    #[inline]
    #[must_use]
    pub const fn new(number: u32, generation: u16) -> Self {
        ObjectId { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        ObjectId { number, generation }
    }
}

/// An interned name.
///
/// Names are byte sequences; most are ASCII, but `#xx` escapes may decode to any byte, and
/// those bytes are kept as they are. Clones share the bytes behind an `Rc`.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::Name;
///
/// let name = Name::from("Type");
/// assert_eq!(name.as_text(), Some("Type"));
/// assert_eq!(name, "Type");
///
/// let latin1 = Name::from_bytes(b"Caf\xE9");
/// assert_eq!(latin1.as_bytes(), b"Caf\xE9");
/// assert_eq!(latin1.as_text(), None);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Rc<[u8]>);

impl Name {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Name(Rc::from(text.as_bytes()))
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Name(Rc::from(bytes))
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as text, when its bytes are valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    #[must_use]
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.to_text_lossy())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text_lossy())
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(&value)
    }
}

impl From<&[u8]> for Name {
    fn from(value: &[u8]) -> Self {
        Name::from_bytes(value)
    }
}

impl From<&Name> for Name {
    fn from(value: &Name) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == other.as_bytes()
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_text_lossy())
    }
}

/// How a byte string is written: `(literal)` or `<hex>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StringMode {
    #[default]
    Literal,
    Hex,
}

/// A byte string.
///
/// Equality and ordering only look at the bytes; the [`StringMode`] is a serialization
/// detail. Name-tree keys are ordered by this byte-wise comparison.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::{PdfString, StringMode};
///
/// let literal = PdfString::from("abc");
/// let hex = PdfString::with_mode(b"abc".to_vec(), StringMode::Hex);
/// assert_eq!(literal, hex);
/// assert!(PdfString::from("abc") < PdfString::from("abd"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    mode: StringMode,
}

impl PdfString {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        PdfString {
            bytes,
            mode: StringMode::Literal,
        }
    }

    #[must_use]
    pub fn with_mode(bytes: Vec<u8>, mode: StringMode) -> Self {
        PdfString { bytes, mode }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> StringMode {
        self.mode
    }

    /// Interprets the bytes as UTF-8 text, if they are valid.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Lossy text rendition, used in error messages and views.
    #[must_use]
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PdfString {}

impl PartialOrd for PdfString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PdfString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl std::hash::Hash for PdfString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl From<&str> for PdfString {
    fn from(value: &str) -> Self {
        PdfString::new(value.as_bytes().to_vec())
    }
}

impl From<String> for PdfString {
    fn from(value: String) -> Self {
        PdfString::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for PdfString {
    fn from(value: Vec<u8>) -> Self {
        PdfString::new(value)
    }
}

impl From<&[u8]> for PdfString {
    fn from(value: &[u8]) -> Self {
        PdfString::new(value.to_vec())
    }
}

impl fmt::Display for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text_lossy())
    }
}

/// Handle to a container stored in a document's container arena.
///
/// A `NodeId` is only meaningful for the document that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dynamically-typed document object.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::{ObjectId, Value};
///
/// let null = Value::Null;
/// let number = Value::from(42);
/// let name = Value::name("Page");
/// let reference = Value::Reference(ObjectId::new(4, 0));
///
/// assert!(null.is_null());
/// assert_eq!(number.as_i64(), Some(42));
/// assert_eq!(name.as_name().and_then(|n| n.as_text()), Some("Page"));
/// assert_eq!(reference.as_reference(), Some(ObjectId::new(4, 0)));
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    Array(NodeId),
    Dictionary(NodeId),
    Stream(NodeId),
    Reference(ObjectId),
}

/// The kind of a [`Value`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Real,
    Name,
    String,
    Array,
    Dictionary,
    Stream,
    Reference,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Name => "name",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Dictionary => "dictionary",
            ValueKind::Stream => "stream",
            ValueKind::Reference => "reference",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds that [`Document::get_or_create`](crate::Document::get_or_create) can default-construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Dictionary,
    Stream,
}

impl ContainerKind {
    #[must_use]
    pub const fn value_kind(&self) -> ValueKind {
        match self {
            ContainerKind::Array => ValueKind::Array,
            ContainerKind::Dictionary => ValueKind::Dictionary,
            ContainerKind::Stream => ValueKind::Stream,
        }
    }
}

/// Position of a child inside its container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Index(usize),
    Key(Name),
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Index(i) => write!(f, "[{}]", i),
            ChildKey::Key(name) => write!(f, "/{}", name),
        }
    }
}

impl From<usize> for ChildKey {
    fn from(value: usize) -> Self {
        ChildKey::Index(value)
    }
}

impl From<&str> for ChildKey {
    fn from(value: &str) -> Self {
        ChildKey::Key(Name::from(value))
    }
}

impl From<Name> for ChildKey {
    fn from(value: Name) -> Self {
        ChildKey::Key(value)
    }
}

impl Value {
    /// Builds a name value.
    #[must_use]
    pub fn name(text: &str) -> Self {
        Value::Name(Name::from(text))
    }

    /// Builds a literal byte string value.
    #[must_use]
    pub fn string(text: &str) -> Self {
        Value::String(PdfString::from(text))
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::Name(_) => ValueKind::Name,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Dictionary(_) => ValueKind::Dictionary,
            Value::Stream(_) => ValueKind::Stream,
            Value::Reference(_) => ValueKind::Reference,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_dictionary(&self) -> bool {
        matches!(self, Value::Dictionary(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Value::Stream(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Returns `true` for arrays, dictionaries and streams.
    #[inline]
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Dictionary(_) | Value::Stream(_)
        )
    }

    /// Returns `true` for values that can never be mutated in place.
    #[inline]
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        !self.is_container()
    }

    /// The arena handle of a container value.
    #[inline]
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Value::Array(id) | Value::Dictionary(id) | Value::Stream(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload; reals with no fractional part are accepted too.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` when this value is the name `name`.
    #[inline]
    #[must_use]
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Value::Name(n) if n == name)
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| crate::Error::type_mismatch("integer", value.kind().as_str()))
    }
}

impl TryFrom<Value> for f64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| crate::Error::type_mismatch("number", value.kind().as_str()))
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| crate::Error::type_mismatch("boolean", value.kind().as_str()))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<Name> for Value {
    fn from(value: Name) -> Self {
        Value::Name(value)
    }
}

impl From<PdfString> for Value {
    fn from(value: PdfString) -> Self {
        Value::String(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Reference(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}
