//! # pdf_cos
//!
//! The object layer of PDF: values, containers and the indirect object space of a document,
//! with lazy loading, incremental updates, name/number trees and cross-document cloning.
//!
//! ## What is in a document?
//!
//! A [`Document`] owns every container it holds. Arrays, dictionaries and streams are
//! handles ([`Value::Array`], [`Value::Dictionary`], [`Value::Stream`]) into the document's
//! arena and are read and written through the document. Indirect objects are numbered slots
//! that are parsed from the source bytes on first access.
//!
//! ## Key Features
//!
//! - **Lazy loading**: only the cross-reference data and the trailer are read up front;
//!   damaged cross-reference data is rebuilt by scanning for `N G obj` headers
//! - **Change tracking**: every mutation marks the owning indirect object as updated, so an
//!   incremental save only appends what changed
//! - **Virtual defaults**: [`Document::get_or_create`] can hand out containers that are only
//!   written once something is stored in them
//! - **Trees**: balanced name and number trees with configurable node size
//! - **Cloning**: copies object graphs between documents, preserving shared references and
//!   cycles, with filters for pages, actions and annotations
//!
//! ## Quick Start
//!
//! ```rust
//! use pdf_cos::{pdf_dict, Document, Value, WriteOptions};
//!
//! let mut doc = Document::new();
//! let info = pdf_dict!(doc, { "Title": "Report", "Pages": 3 });
//! let id = doc.register(info);
//! let trailer = doc.trailer();
//! doc.dict_set(&trailer, "Info", Value::Reference(id)).unwrap();
//!
//! let bytes = doc.save(&WriteOptions::new()).unwrap();
//! assert!(bytes.starts_with(b"%PDF-"));
//!
//! let mut reloaded = pdf_cos::from_slice(&bytes).unwrap();
//! let info = reloaded.resolve(&Value::Reference(id));
//! assert_eq!(reloaded.dict_get(&info, "Pages"), Some(Value::Integer(3)));
//! ```
//!
//! ### Incremental Updates
//!
//! ```rust
//! use pdf_cos::{Document, Value, WriteOptions};
//!
//! let mut doc = Document::new();
//! let id = doc.register(Value::from(1));
//! let original = doc.save(&WriteOptions::new()).unwrap();
//!
//! let mut doc = Document::load(original.clone()).unwrap();
//! doc.set_object(id, Value::from(2)).unwrap();
//! let updated = doc.save(&WriteOptions::incremental()).unwrap();
//! assert!(updated.starts_with(&original));
//! ```
//!
//! ### Name Trees
//!
//! ```rust
//! use pdf_cos::{Document, PdfString, Value};
//!
//! let mut doc = Document::new();
//! let dests = doc.names_tree("Dests").unwrap();
//! dests.insert(&mut doc, PdfString::from("intro"), Value::from(1), false).unwrap();
//! assert_eq!(
//!     dests.get(&mut doc, &PdfString::from("intro")).unwrap(),
//!     Some(Value::Integer(1))
//! );
//! ```
//!
//! ## Logging
//!
//! Structural events (loading, repair, saves, tree splits) are reported through
//! [`tracing`]. Install any subscriber to see them.
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Reading never panics on malformed input; broken references resolve to `Null`
//! - Recursion over untrusted structure is bounded by [`DocumentOptions::max_nesting`]

mod node;

pub mod clone_filters;
pub mod cloner;
pub mod container;
pub mod date;
pub mod document;
pub mod error;
pub mod file;
pub mod filter;
pub mod lexer;
pub mod macros;
pub mod map;
pub mod objstm;
pub mod options;
pub mod parser;
pub mod stream;
pub mod tree;
pub mod value;
pub mod view;
pub mod writer;
pub mod xref;

pub use clone_filters::{
    default_filters, ActionFilter, AnnotationsFilter, PageFilter, INHERITABLE_PAGE_ATTRIBUTES,
};
pub use cloner::{clone_into, CloneContext, CloneFilter, Cloner};
pub use container::deep_eq;
pub use document::{Document, IndirectSlot};
pub use error::{Error, Result};
pub use file::{DirectoryFileStore, FileStore, MemoryFileStore};
pub use filter::{AsciiHexFilter, FilterRegistry, StreamFilter};
pub use map::PdfMap;
pub use node::Owner;
pub use options::{CompressionPolicy, DocumentOptions, MismatchPolicy, SaveMode, WriteOptions};
pub use stream::DataFileTransfer;
pub use tree::{NameTree, NumberTree, Tree, TreeIter, TreeKey, TreeStats};
pub use value::{ChildKey, ContainerKind, Name, NodeId, ObjectId, PdfString, StringMode, Value, ValueKind};
pub use view::ValueView;
pub use xref::{XrefEntry, XrefUsage};

use std::io;

/// Loads a document from its serialized bytes.
///
/// # Examples
///
/// ```rust
/// let bytes = pdf_cos::to_vec(&mut pdf_cos::Document::new()).unwrap();
/// let doc = pdf_cos::from_slice(&bytes).unwrap();
/// assert!(doc.is_loaded());
/// ```
///
/// # Errors
///
/// Returns an error when the bytes carry no usable trailer, even after repair.
pub fn from_slice(bytes: &[u8]) -> Result<Document> {
    Document::load(bytes.to_vec())
}

/// Loads a document with custom options.
///
/// # Errors
///
/// Returns an error when the bytes carry no usable trailer, even after repair.
pub fn from_slice_with_options(bytes: &[u8], options: DocumentOptions) -> Result<Document> {
    Document::load_with_options(bytes.to_vec(), options)
}

/// Serializes a document with default write options (a full save).
///
/// # Errors
///
/// Returns an error if a stream body cannot be produced (for example an external data
/// file that cannot be read).
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec(doc: &mut Document) -> Result<Vec<u8>> {
    doc.save(&WriteOptions::default())
}

/// Serializes a document to a writer.
///
/// # Errors
///
/// Returns an error if serialization fails or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W>(writer: W, doc: &mut Document, options: &WriteOptions) -> Result<()>
where
    W: io::Write,
{
    doc.save_to(writer, options)
}

/// Parses a single value in the wire syntax into `doc`.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::{Document, Value};
///
/// let mut doc = Document::new();
/// let dict = pdf_cos::parse_value(&mut doc, b"<< /Type /Page /Rotate 90 >>").unwrap();
/// assert_eq!(doc.dict_get(&dict, "Rotate"), Some(Value::Integer(90)));
/// ```
///
/// # Errors
///
/// Returns [`Error::Syntax`] for malformed input.
pub fn parse_value(doc: &mut Document, bytes: &[u8]) -> Result<Value> {
    doc.parse_value(bytes)
}
