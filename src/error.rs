//! Error types for the object model, the indirect object space, trees and the cloner.
//!
//! ## Error Categories
//!
//! - **Structure errors**: a tree node that is neither a leaf nor an intermediate node,
//!   cross-reference data that cannot be interpreted
//! - **Mutation errors**: writes aimed at missing indirect objects, at primitives, or at
//!   containers of the wrong kind
//! - **Syntax errors**: malformed wire syntax, with the byte offset of the problem
//! - **Collaborator errors**: unknown stream filters, external file I/O
//!
//! Read paths (dereferencing, tree lookups over dangling references) degrade to `Null`
//! instead of returning these errors. Write paths fail fast.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, Error, Value};
//!
//! let mut doc = Document::new();
//! let err = doc.array_push(&Value::Integer(1), Value::Null).unwrap_err();
//! assert!(matches!(err, Error::ImmutableMutation(_)));
//! ```

use crate::value::ObjectId;
use std::fmt;
use thiserror::Error;

/// Represents all possible errors raised by document operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error while reading or writing document bytes or external files
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed wire syntax
    #[error("Syntax error at offset {offset}: {msg}")]
    Syntax { offset: usize, msg: String },

    /// A structure that does not follow the expected document convention
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    /// Tree insertion without overwrite hit an existing key
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Write-path access to an indirect object that does not exist
    #[error("Undefined indirect object: {0}")]
    UndefinedIndirectObject(ObjectId),

    /// Attempt to clone a payload that cannot be transplanted
    #[error("Unsupported clone: {0}")]
    UnsupportedClone(String),

    /// An existing entry resolved to an incompatible kind
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Attempted in-place mutation of a simple value
    #[error("Immutable mutation: {0}")]
    ImmutableMutation(String),

    /// Array position outside of the valid range
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A stream filter that is not registered
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a syntax error located at a byte offset.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::Error;
    ///
    /// let err = Error::syntax(42, "unterminated string");
    /// assert!(err.to_string().contains("offset 42"));
    /// ```
    pub fn syntax(offset: usize, msg: &str) -> Self {
        Error::Syntax {
            offset,
            msg: msg.to_string(),
        }
    }

    /// Creates a malformed structure error.
    pub fn malformed<T: fmt::Display>(msg: T) -> Self {
        Error::MalformedStructure(msg.to_string())
    }

    /// Creates a type mismatch error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::Error;
    ///
    /// let err = Error::type_mismatch("dictionary", "array");
    /// assert!(err.to_string().contains("expected dictionary"));
    /// ```
    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates an immutable mutation error naming the kind that was targeted.
    pub fn immutable(kind: &str) -> Self {
        Error::ImmutableMutation(format!("{} values cannot be mutated in place", kind))
    }

    pub fn unsupported_clone(msg: &str) -> Self {
        Error::UnsupportedClone(msg.to_string())
    }

    pub fn unsupported_filter(name: &str) -> Self {
        Error::UnsupportedFilter(name.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
