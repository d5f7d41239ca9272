//! Configuration for documents and for saving them.
//!
//! - [`DocumentOptions`]: policy constants used while mutating a document
//! - [`WriteOptions`]: how a document is saved
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, DocumentOptions, MismatchPolicy};
//!
//! let options = DocumentOptions::new()
//!     .with_tree_low_order(3)
//!     .with_mismatch_policy(MismatchPolicy::Replace);
//! let doc = Document::with_options(options);
//! assert_eq!(doc.options().tree_low_order, 3);
//! ```

use serde::{Deserialize, Serialize};

/// What `get_or_create` does when an existing entry resolves to the wrong kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MismatchPolicy {
    /// Leave the entry alone and return a type mismatch error.
    #[default]
    Fail,
    /// Replace the entry with a fresh virtual default.
    Replace,
}

/// Which payloads may be moved into an object stream.
///
/// Streams and objects with a non-zero generation are never compressible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionPolicy {
    /// Integers are usually stream lengths that writers patch after the fact, so they stay
    /// out of object streams unless this is set.
    pub allow_integers: bool,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy {
            allow_integers: false,
        }
    }
}

/// Policy constants for a [`Document`](crate::Document).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    /// Low order `L` of name and number trees: leaves hold `L..=2L` pairs, intermediate
    /// nodes `L..=2L` kids.
    pub tree_low_order: usize,
    /// Deepest tree descent tolerated before the tree is reported as malformed.
    pub max_tree_depth: usize,
    pub mismatch_policy: MismatchPolicy,
    pub compression: CompressionPolicy,
    /// Deepest container nesting accepted by the parser.
    pub max_nesting: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            tree_low_order: 5,
            max_tree_depth: 64,
            mismatch_policy: MismatchPolicy::default(),
            compression: CompressionPolicy::default(),
            max_nesting: 512,
        }
    }
}

impl DocumentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tree low order. Values below 2 are raised to 2.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::DocumentOptions;
    ///
    /// assert_eq!(DocumentOptions::new().with_tree_low_order(1).tree_low_order, 2);
    /// ```
    #[must_use]
    pub fn with_tree_low_order(mut self, low_order: usize) -> Self {
        self.tree_low_order = low_order.max(2);
        self
    }

    #[must_use]
    pub fn with_max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = depth;
        self
    }

    #[must_use]
    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }
}

/// Whether a save rewrites everything or appends changes to the loaded bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveMode {
    #[default]
    Full,
    Incremental,
}

/// Options for [`Document::save`](crate::Document::save).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Header version written by full saves.
    pub version: String,
    pub mode: SaveMode,
    /// Stamp `/ModDate` into the Info dictionary, when the trailer has one.
    pub update_mod_date: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            version: "1.7".to_string(),
            mode: SaveMode::Full,
            update_mod_date: false,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for an incremental update.
    #[must_use]
    pub fn incremental() -> Self {
        WriteOptions {
            mode: SaveMode::Incremental,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_mod_date(mut self, update: bool) -> Self {
        self.update_mod_date = update;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DocumentOptions::new();
        assert_eq!(options.tree_low_order, 5);
        assert_eq!(options.mismatch_policy, MismatchPolicy::Fail);
        assert!(!options.compression.allow_integers);

        let write = WriteOptions::new();
        assert_eq!(write.mode, SaveMode::Full);
        assert_eq!(write.version, "1.7");
    }

    #[test]
    fn test_options_serde_roundtrip() {
        let options = DocumentOptions::new()
            .with_tree_low_order(7)
            .with_mismatch_policy(MismatchPolicy::Replace);
        let json = serde_json::to_string(&options).unwrap();
        let back: DocumentOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
