//! Stream filters.
//!
//! Compression algorithms are collaborators: a [`StreamFilter`] turns encoded stream data
//! into decoded data and back. Documents look filters up by name (or abbreviation) in
//! their [`FilterRegistry`]. Only `ASCIIHexDecode` is built in; register further filters
//! with [`FilterRegistry::register`].
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{FilterRegistry, StreamFilter};
//!
//! let registry = FilterRegistry::default();
//! let hex = registry.get("AHx").unwrap();
//! assert_eq!(hex.decode(b"48 69>", None).unwrap(), b"Hi");
//! ```

use crate::error::{Error, Result};
use crate::map::PdfMap;
use std::fmt;

/// A named stream encoding.
pub trait StreamFilter {
    /// Full filter name as written in `/Filter`, e.g. `ASCIIHexDecode`.
    fn name(&self) -> &str;

    /// Abbreviated name accepted in inline images and by lenient readers.
    fn abbreviation(&self) -> Option<&str> {
        None
    }

    /// Decodes `data`. `params` is the filter's decode-parameters dictionary, if any.
    fn decode(&self, data: &[u8], params: Option<&PdfMap>) -> Result<Vec<u8>>;

    /// Encodes `data` so that [`StreamFilter::decode`] restores it.
    fn encode(&self, data: &[u8], params: Option<&PdfMap>) -> Result<Vec<u8>>;
}

/// The `ASCIIHexDecode` filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiHexFilter;

impl StreamFilter for AsciiHexFilter {
    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }

    fn abbreviation(&self) -> Option<&str> {
        Some("AHx")
    }

    fn decode(&self, data: &[u8], _params: Option<&PdfMap>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() / 2);
        let mut high: Option<u8> = None;
        for (position, &byte) in data.iter().enumerate() {
            let nibble = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                b'A'..=b'F' => byte - b'A' + 10,
                b'>' => break,
                b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => continue,
                _ => return Err(Error::syntax(position, "invalid character in hex data")),
            };
            match high.take() {
                Some(hi) => out.push(hi << 4 | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(hi) = high {
            out.push(hi << 4);
        }
        Ok(out)
    }

    fn encode(&self, data: &[u8], _params: Option<&PdfMap>) -> Result<Vec<u8>> {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = Vec::with_capacity(data.len() * 2 + 1);
        for &byte in data {
            out.push(DIGITS[usize::from(byte >> 4)]);
            out.push(DIGITS[usize::from(byte & 0x0F)]);
        }
        out.push(b'>');
        Ok(out)
    }
}

/// Filters known to a document, looked up by name.
pub struct FilterRegistry {
    filters: Vec<Box<dyn StreamFilter>>,
}

impl FilterRegistry {
    /// A registry without any filter.
    #[must_use]
    pub fn empty() -> Self {
        FilterRegistry {
            filters: Vec::new(),
        }
    }

    /// Adds a filter. A later registration under the same name shadows the earlier one.
    pub fn register(&mut self, filter: Box<dyn StreamFilter>) {
        self.filters.insert(0, filter);
    }

    /// Looks a filter up by full name or abbreviation.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFilter`] when no filter is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&dyn StreamFilter> {
        self.filters
            .iter()
            .find(|f| f.name() == name || f.abbreviation() == Some(name))
            .map(|f| f.as_ref())
            .ok_or_else(|| Error::unsupported_filter(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.name())
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut registry = FilterRegistry::empty();
        registry.register(Box::new(AsciiHexFilter));
        registry
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl StreamFilter for Reverse {
        fn name(&self) -> &str {
            "Reverse"
        }

        fn decode(&self, data: &[u8], _params: Option<&PdfMap>) -> Result<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }

        fn encode(&self, data: &[u8], params: Option<&PdfMap>) -> Result<Vec<u8>> {
            self.decode(data, params)
        }
    }

    #[test]
    fn test_ascii_hex_decode() {
        let filter = AsciiHexFilter;
        assert_eq!(filter.decode(b"48 65\n6c 6C 6f>", None).unwrap(), b"Hello");
        assert_eq!(filter.decode(b"7", None).unwrap(), vec![0x70]);
        assert!(filter.decode(b"4G", None).is_err());
    }

    #[test]
    fn test_ascii_hex_encode() {
        let filter = AsciiHexFilter;
        let encoded = filter.encode(b"Hi", None).unwrap();
        assert_eq!(encoded, b"4869>");
        assert_eq!(filter.decode(&encoded, None).unwrap(), b"Hi");
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = FilterRegistry::default();
        assert!(registry.contains("ASCIIHexDecode"));
        assert!(registry.contains("AHx"));
        assert!(matches!(
            registry.get("FlateDecode"),
            Err(Error::UnsupportedFilter(_))
        ));

        registry.register(Box::new(Reverse));
        assert_eq!(registry.get("Reverse").unwrap().decode(b"ab", None).unwrap(), b"ba");
    }
}
