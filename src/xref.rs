//! Cross-reference entries and loading.
//!
//! Loading starts from `startxref` and walks the chain of cross-reference sections
//! (classic `xref` tables, hybrid `/XRefStm` sections and cross-reference streams), newest
//! first. Entries from newer sections win. When the chain is unusable, the loader scans
//! the bytes for `N G obj` headers instead and rebuilds the table from what it finds.

use crate::document::IndirectSlot;
use crate::error::{Error, Result};
use crate::lexer::{find_from, is_regular, rfind, Lexer, Token};
use crate::node::Owner;
use crate::parser::{self, Parser};
use crate::value::{Name, ObjectId, Value};
use crate::Document;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Where an indirect object is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefUsage {
    /// Unused number; `next` links the free list.
    Free { next: u32 },
    /// Stored as a top-level object. The offset is undefined until the object is written.
    InUse { offset: Option<u64> },
    /// Stored inside the object stream `stream`. The index is undefined until the object
    /// stream is written.
    InUseCompressed { stream: u32, index: Option<u32> },
}

/// A cross-reference entry: storage location plus generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub generation: u16,
    pub usage: XrefUsage,
}

impl XrefEntry {
    #[must_use]
    pub const fn free(next: u32, generation: u16) -> Self {
        XrefEntry {
            generation,
            usage: XrefUsage::Free { next },
        }
    }

    #[must_use]
    pub const fn in_use(offset: Option<u64>, generation: u16) -> Self {
        XrefEntry {
            generation,
            usage: XrefUsage::InUse { offset },
        }
    }

    #[must_use]
    pub const fn compressed(stream: u32, index: Option<u32>) -> Self {
        XrefEntry {
            generation: 0,
            usage: XrefUsage::InUseCompressed { stream, index },
        }
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.usage, XrefUsage::Free { .. })
    }

    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        matches!(self.usage, XrefUsage::InUseCompressed { .. })
    }

    /// The object stream holding this entry's object, if compressed.
    #[must_use]
    pub const fn object_stream(&self) -> Option<u32> {
        match self.usage {
            XrefUsage::InUseCompressed { stream, .. } => Some(stream),
            _ => None,
        }
    }
}

impl fmt::Display for XrefEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.usage {
            XrefUsage::Free { next } => write!(f, "free (next {}, gen {})", next, self.generation),
            XrefUsage::InUse { offset: Some(offset) } => {
                write!(f, "in use at {} (gen {})", offset, self.generation)
            }
            XrefUsage::InUse { offset: None } => write!(f, "in use (gen {})", self.generation),
            XrefUsage::InUseCompressed { stream, index } => match index {
                Some(index) => write!(f, "compressed in {} at {}", stream, index),
                None => write!(f, "compressed in {}", stream),
            },
        }
    }
}

/// Trailer keys that describe a single section rather than the document.
pub(crate) const SECTION_KEYS: &[&str] = &[
    "Prev",
    "XRefStm",
    "Type",
    "W",
    "Index",
    "Length",
    "Filter",
    "DecodeParms",
    "Size",
];

pub(crate) fn is_section_key(key: &Name) -> bool {
    SECTION_KEYS.iter().any(|section| key == section)
}

/// Fills the slot table and trailer of `doc` from its source bytes.
pub(crate) fn load_cross_references(doc: &mut Document) -> Result<()> {
    let source = doc
        .source
        .clone()
        .ok_or_else(|| Error::malformed("document has no source bytes"))?;

    let mut size = 0u32;
    match read_chain(doc, &source, &mut size) {
        Ok(start) if doc.trailer_entry("Root").is_some() => {
            doc.previous_xref = Some(start);
        }
        Ok(_) => {
            warn!("cross-reference data has no Root entry, scanning for objects");
            reset_slots(doc);
            repair(doc, &source)?;
        }
        Err(err) => {
            warn!(error = %err, "cross-reference data unusable, scanning for objects");
            reset_slots(doc);
            repair(doc, &source)?;
        }
    }

    let highest = doc.slots.keys().next_back().copied().unwrap_or(0);
    doc.next_number = size.max(highest.saturating_add(1)).max(1);
    debug!(
        objects = doc.object_count(),
        next_number = doc.next_number,
        "loaded cross-reference data"
    );
    Ok(())
}

fn reset_slots(doc: &mut Document) {
    doc.slots.retain(|number, _| *number == 0);
    doc.uses_xref_streams = false;
    let trailer = doc.trailer.clone();
    let Some(id) = trailer.node_id() else { return };
    for key in doc.dict_keys(&trailer) {
        let old = doc.arena.entries_mut(id).and_then(|m| m.remove(&key));
        if let Some(old) = old {
            doc.exclude(Owner::Container(id), &old);
        }
    }
}

/// Walks the section chain from `startxref`. Returns the offset of the newest section.
fn read_chain(doc: &mut Document, source: &Rc<[u8]>, size: &mut u32) -> Result<u64> {
    let marker = rfind(source, b"startxref")
        .ok_or_else(|| Error::malformed("missing startxref"))?;
    let mut lexer = Lexer::new(source, marker + b"startxref".len());
    let start = lexer
        .read_unsigned()
        .ok_or_else(|| Error::syntax(marker, "startxref without offset"))?;

    let mut visited = HashSet::new();
    let mut next = Some(start);
    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            warn!(offset, "cross-reference chain loops");
            break;
        }
        let position = usize::try_from(offset)
            .ok()
            .filter(|p| *p < source.len())
            .ok_or_else(|| Error::malformed(format!("xref offset {} out of range", offset)))?;
        let section = read_section(doc, source, position)?;
        *size = (*size).max(section.size);
        next = section.prev;
    }
    Ok(start)
}

struct Section {
    prev: Option<u64>,
    size: u32,
}

fn read_section(doc: &mut Document, source: &Rc<[u8]>, position: usize) -> Result<Section> {
    let mut lexer = Lexer::new(source, position);
    lexer.skip_whitespace();
    if lexer.starts_with(b"xref") {
        read_table(doc, source, lexer.position() + 4)
    } else {
        read_stream_section(doc, source, position)
    }
}

fn read_table(doc: &mut Document, source: &Rc<[u8]>, position: usize) -> Result<Section> {
    let mut lexer = Lexer::new(source, position);
    let mut entries: Vec<(u32, XrefEntry)> = Vec::new();
    loop {
        let offset = lexer.position();
        match lexer.next_token()? {
            Some(token) if token.is_keyword(b"trailer") => break,
            Some(Token::Integer(first)) => {
                let count = lexer
                    .read_unsigned()
                    .ok_or_else(|| Error::syntax(offset, "xref subsection without count"))?;
                let first = u32::try_from(first)
                    .map_err(|_| Error::syntax(offset, "negative xref subsection start"))?;
                for i in 0..count {
                    let at = lexer.position();
                    let field = lexer
                        .read_unsigned()
                        .ok_or_else(|| Error::syntax(at, "truncated xref entry"))?;
                    let generation = lexer
                        .read_unsigned()
                        .ok_or_else(|| Error::syntax(at, "truncated xref entry"))?;
                    let generation = u16::try_from(generation).unwrap_or(u16::MAX);
                    let kind = lexer.next_token()?;
                    let entry = match kind {
                        Some(t) if t.is_keyword(b"n") => XrefEntry::in_use(Some(field), generation),
                        Some(t) if t.is_keyword(b"f") => {
                            XrefEntry::free(u32::try_from(field).unwrap_or(0), generation)
                        }
                        _ => return Err(Error::syntax(at, "invalid xref entry type")),
                    };
                    entries.push((first.saturating_add(i as u32), entry));
                }
            }
            _ => return Err(Error::syntax(offset, "expected xref subsection or trailer")),
        }
    }

    let max_nesting = doc.options().max_nesting;
    let mut parser = Parser::new(source, lexer.position(), max_nesting);
    let trailer = parser.parse_value(doc)?;
    if !trailer.is_dictionary() {
        return Err(Error::malformed("trailer is not a dictionary"));
    }

    // A hybrid file's stream section lists the compressed objects of this update, so it
    // takes precedence over the table of the same section.
    if let Some(stm) = doc.dict_get(&trailer, "XRefStm").and_then(|v| v.as_i64()) {
        match usize::try_from(stm).ok().filter(|p| *p < source.len()) {
            Some(at) => {
                if let Err(err) = read_stream_section(doc, source, at) {
                    warn!(offset = stm, error = %err, "ignoring unreadable XRefStm section");
                }
            }
            None => warn!(offset = stm, "XRefStm offset out of range"),
        }
    }

    for (number, entry) in entries {
        doc.slots
            .entry(number)
            .or_insert_with(|| IndirectSlot::loaded(entry));
    }
    section_trailer(doc, &trailer)
}

fn read_stream_section(doc: &mut Document, source: &Rc<[u8]>, position: usize) -> Result<Section> {
    let (id, _) = parser::read_object_header(source, position)
        .ok_or_else(|| Error::syntax(position, "expected xref table or stream"))?;
    let stream = parser::parse_indirect_at(doc, position, id)?;
    let header = doc
        .stream_header(&stream)
        .ok_or_else(|| Error::malformed("cross-reference section is not a stream"))?;
    if !doc.dict_get(&header, "Type").map_or(false, |t| t.is_name("XRef")) {
        return Err(Error::malformed("cross-reference stream lacks /Type /XRef"));
    }
    doc.uses_xref_streams = true;

    let widths: Vec<usize> = int_array(doc, &header, "W")
        .into_iter()
        .map(|w| usize::try_from(w).unwrap_or(0))
        .collect();
    if widths.len() < 3 || widths.iter().any(|w| *w > 8) {
        return Err(Error::malformed("invalid /W in cross-reference stream"));
    }
    let size = doc
        .dict_get(&header, "Size")
        .and_then(|v| v.as_i64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    let index = {
        let index = int_array(doc, &header, "Index");
        if index.is_empty() {
            vec![0, i64::from(size)]
        } else {
            index
        }
    };

    let data = doc.decoded_bytes(&stream)?;
    let row = widths[0] + widths[1] + widths[2];
    let mut rows = data.chunks_exact(row.max(1));
    for range in index.chunks(2) {
        let (Some(&first), Some(&count)) = (range.first(), range.get(1)) else {
            break;
        };
        for i in 0..count.max(0) {
            let Some(bytes) = rows.next() else {
                return Err(Error::malformed("cross-reference stream data too short"));
            };
            let number = u32::try_from(first + i)
                .map_err(|_| Error::malformed("object number out of range"))?;
            let kind = if widths[0] == 0 {
                1
            } else {
                read_field(&bytes[..widths[0]])
            };
            let second = read_field(&bytes[widths[0]..widths[0] + widths[1]]);
            let third = read_field(&bytes[widths[0] + widths[1]..row]);
            let entry = match kind {
                0 => XrefEntry::free(second as u32, third as u16),
                1 => XrefEntry::in_use(Some(second), third as u16),
                2 => XrefEntry::compressed(second as u32, Some(third as u32)),
                // Unknown types are references to the null object.
                _ => continue,
            };
            doc.slots
                .entry(number)
                .or_insert_with(|| IndirectSlot::loaded(entry));
        }
    }

    let mut section = section_trailer(doc, &header)?;
    section.size = section.size.max(size);
    Ok(section)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| acc << 8 | u64::from(*b))
}

fn int_array(doc: &Document, dict: &Value, key: &str) -> Vec<i64> {
    let Some(array) = doc.dict_get(dict, key) else {
        return Vec::new();
    };
    doc.array_items(&array)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_i64)
        .collect()
}

/// Merges a section trailer into the document trailer; newer keys win.
fn section_trailer(doc: &mut Document, trailer: &Value) -> Result<Section> {
    let prev = doc
        .dict_get(trailer, "Prev")
        .and_then(|v| v.as_i64())
        .and_then(|v| u64::try_from(v).ok());
    let size = doc
        .dict_get(trailer, "Size")
        .and_then(|v| v.as_i64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    merge_trailer(doc, trailer);
    Ok(Section { prev, size })
}

fn merge_trailer(doc: &mut Document, section: &Value) {
    let target = doc.trailer.clone();
    for (key, value) in doc.dict_entries(section) {
        if is_section_key(&key) || doc.dict_contains(&target, &key) {
            continue;
        }
        let Some(id) = target.node_id() else { return };
        let value = doc.include(Owner::Container(id), value);
        if let Some(map) = doc.arena.entries_mut(id) {
            map.insert(key, value);
        }
    }
}

/// Rebuilds the slot table by scanning for object headers.
fn repair(doc: &mut Document, source: &Rc<[u8]>) -> Result<()> {
    let mut found = 0usize;
    let mut from = 0;
    while let Some(at) = find_from(source, from, b"obj") {
        from = at + 3;
        if source.get(at + 3).map_or(false, |b| is_regular(*b)) {
            continue;
        }
        if let Some((id, offset)) = header_before(source, at) {
            // Later definitions of the same number belong to later updates.
            doc.slots.insert(
                id.number,
                IndirectSlot::loaded(XrefEntry::in_use(Some(offset as u64), id.generation)),
            );
            found += 1;
        }
    }
    if found == 0 {
        return Err(Error::malformed("no indirect objects found"));
    }
    warn!(objects = found, "rebuilt cross-reference table from object headers");

    if let Some(at) = rfind(source, b"trailer") {
        let mut parser = Parser::new(source, at + b"trailer".len(), doc.options().max_nesting);
        if let Ok(trailer) = parser.parse_value(doc) {
            if trailer.is_dictionary() {
                merge_trailer(doc, &trailer);
            }
        }
    }

    let numbers: Vec<u32> = doc.slots.keys().copied().filter(|n| *n != 0).collect();
    for number in numbers {
        let Some(generation) = doc.slots.get(&number).map(|s| s.entry.generation) else {
            continue;
        };
        let id = ObjectId::new(number, generation);
        let Some(value) = doc.resolve_object(id) else {
            continue;
        };
        let kind = doc.dict_get(&value, "Type");
        match kind {
            Some(t) if t.is_name("Catalog") && doc.trailer_entry("Root").is_none() => {
                let trailer = doc.trailer.clone();
                doc.put_entry(&trailer, "Root", Value::Reference(id));
            }
            Some(t) if t.is_name("XRef") => {
                if let Some(header) = doc.stream_header(&value) {
                    merge_trailer(doc, &header);
                }
            }
            Some(t) if t.is_name("ObjStm") => {
                if let Ok(index) = doc.object_stream_index(number) {
                    for (i, member) in index.members().enumerate() {
                        doc.slots.entry(member).or_insert_with(|| {
                            IndirectSlot::loaded(XrefEntry::compressed(number, Some(i as u32)))
                        });
                    }
                }
            }
            _ => {}
        }
    }

    if doc.trailer_entry("Root").is_none() {
        return Err(Error::malformed("no document catalog found"));
    }
    Ok(())
}

/// Finds the `N G` before an `obj` keyword at `at`, returning the identity and the offset
/// of `N`.
fn header_before(source: &[u8], at: usize) -> Option<(ObjectId, usize)> {
    let skip_ws = |mut i: usize| {
        while i > 0 && crate::lexer::is_whitespace(source[i - 1]) {
            i -= 1;
        }
        i
    };
    let digits = |mut i: usize| {
        let stop = i;
        while i > 0 && source[i - 1].is_ascii_digit() {
            i -= 1;
        }
        (i, stop)
    };

    let end = skip_ws(at);
    if end == at {
        return None;
    }
    let (gen_start, gen_end) = digits(end);
    if gen_start == gen_end {
        return None;
    }
    let number_end = skip_ws(gen_start);
    if number_end == gen_start {
        return None;
    }
    let (number_start, number_end) = digits(number_end);
    if number_start == number_end {
        return None;
    }
    if number_start > 0 && is_regular(source[number_start - 1]) {
        return None;
    }
    let number: u32 = std::str::from_utf8(&source[number_start..number_end])
        .ok()?
        .parse()
        .ok()?;
    let generation: u16 = std::str::from_utf8(&source[gen_start..gen_end])
        .ok()?
        .parse()
        .ok()?;
    Some((ObjectId::new(number, generation), number_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_constructors() {
        assert!(XrefEntry::free(0, 65535).is_free());
        assert!(!XrefEntry::in_use(Some(10), 0).is_free());
        let compressed = XrefEntry::compressed(7, Some(2));
        assert!(compressed.is_compressed());
        assert_eq!(compressed.object_stream(), Some(7));
        assert_eq!(compressed.to_string(), "compressed in 7 at 2");
    }

    #[test]
    fn test_header_before() {
        let source = b"junk\n12 0 obj\n<< >>";
        let at = find_from(source, 0, b"obj").unwrap();
        assert_eq!(header_before(source, at), Some((ObjectId::new(12, 0), 5)));
        assert_eq!(header_before(b"x12 0 obj", 6), None);
        assert_eq!(header_before(b"0 obj", 2), None);
    }

    #[test]
    fn test_read_field_is_big_endian() {
        assert_eq!(read_field(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_field(&[]), 0);
    }
}
