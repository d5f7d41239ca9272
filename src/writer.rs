//! Serialization of values and documents.
//!
//! [`Document::to_bytes`] writes a single value in object syntax; [`Document::save`] writes
//! the whole document, either as a full rewrite or as an incremental update appended to
//! the loaded bytes.
//!
//! Values are written with an explicit task stack. Virtual entries (auto-created defaults
//! that were never mutated) are left out of arrays and dictionaries, and virtual indirect
//! objects are written as free cross-reference entries.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, Value};
//!
//! let mut doc = Document::new();
//! let dict = doc.new_dictionary_with([
//!     ("Type", Value::name("Page")),
//!     ("Rotate", Value::Real(90.0)),
//! ]);
//! assert_eq!(doc.to_bytes(&dict), b"<< /Type /Page /Rotate 90.0 >>");
//! ```

use crate::error::Result;
use crate::options::{SaveMode, WriteOptions};
use crate::value::{Name, NodeId, ObjectId, PdfString, StringMode, Value};
use crate::xref::{is_section_key, XrefEntry, XrefUsage};
use crate::Document;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::rc::Rc;
use tracing::{debug, warn};

enum Task {
    Value(Value),
    Raw(&'static [u8]),
    Key(Name),
    Body(NodeId),
}

impl Document {
    /// Writes a value in object syntax. References are written as `N G R`, not followed.
    #[must_use]
    pub fn to_bytes(&self, value: &Value) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        self.write_value(&mut out, value);
        out
    }

    fn write_value(&self, out: &mut Vec<u8>, value: &Value) {
        let mut tasks = vec![Task::Value(value.clone())];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Raw(bytes) => out.extend_from_slice(bytes),
                Task::Key(name) => write_name(out, &name),
                Task::Body(id) => self.write_body(out, id),
                Task::Value(value) => match value {
                    Value::Null => out.extend_from_slice(b"null"),
                    Value::Boolean(true) => out.extend_from_slice(b"true"),
                    Value::Boolean(false) => out.extend_from_slice(b"false"),
                    Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
                    Value::Real(r) => out.extend_from_slice(format_real(r).as_bytes()),
                    Value::Name(name) => write_name(out, &name),
                    Value::String(string) => write_string(out, &string),
                    Value::Reference(id) => {
                        out.extend_from_slice(format!("{} {} R", id.number, id.generation).as_bytes())
                    }
                    Value::Array(id) => {
                        out.push(b'[');
                        tasks.push(Task::Raw(b"]"));
                        let items: Vec<Value> = self
                            .arena
                            .items(id)
                            .map(|items| {
                                items
                                    .iter()
                                    .filter(|item| !self.is_virtual(item))
                                    .cloned()
                                    .collect()
                            })
                            .unwrap_or_default();
                        for (i, item) in items.into_iter().enumerate().rev() {
                            tasks.push(Task::Value(item));
                            if i > 0 {
                                tasks.push(Task::Raw(b" "));
                            }
                        }
                    }
                    Value::Dictionary(id) => {
                        out.extend_from_slice(b"<<");
                        tasks.push(Task::Raw(b" >>"));
                        self.push_entries(&mut tasks, id, None);
                    }
                    Value::Stream(id) => {
                        let Some(stream) = self.arena.stream(id) else {
                            out.extend_from_slice(b"null");
                            continue;
                        };
                        let length = if self.is_external(stream.header) {
                            0
                        } else {
                            stream.body.len()
                        };
                        out.extend_from_slice(b"<<");
                        tasks.push(Task::Body(id));
                        tasks.push(Task::Raw(b" >>"));
                        tasks.push(Task::Value(Value::Integer(length as i64)));
                        tasks.push(Task::Raw(b" "));
                        tasks.push(Task::Key(Name::from("Length")));
                        tasks.push(Task::Raw(b" "));
                        self.push_entries(&mut tasks, stream.header, Some("Length"));
                    }
                },
            }
        }
    }

    fn push_entries(&self, tasks: &mut Vec<Task>, dict: NodeId, skip: Option<&str>) {
        let Some(map) = self.arena.entries(dict) else {
            return;
        };
        let entries: Vec<(Name, Value)> = map
            .iter()
            .filter(|(key, value)| skip.map_or(true, |skip| key.as_bytes() != skip.as_bytes()) && !self.is_virtual(value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in entries.into_iter().rev() {
            tasks.push(Task::Value(value));
            tasks.push(Task::Raw(b" "));
            tasks.push(Task::Key(key));
            tasks.push(Task::Raw(b" "));
        }
    }

    fn is_external(&self, header: NodeId) -> bool {
        self.arena
            .entries(header)
            .map_or(false, |map| map.contains_key("F"))
    }

    fn write_body(&self, out: &mut Vec<u8>, id: NodeId) {
        out.extend_from_slice(b"\nstream\n");
        if let Some(stream) = self.arena.stream(id) {
            if !self.is_external(stream.header) {
                out.extend_from_slice(&stream.body);
            }
        }
        out.extend_from_slice(b"\nendstream");
    }

    /// Serializes the document.
    ///
    /// A full save writes every in-use, non-virtual object, rebuilding object streams. An
    /// incremental save appends the changed and new objects to the loaded bytes with a
    /// cross-reference section chained to the previous one; documents that were not
    /// loaded from bytes are always saved in full.
    ///
    /// After saving, the document refers to the written bytes: update flags are cleared
    /// and later changes go into the next incremental update.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::{Document, Value, WriteOptions};
    ///
    /// let mut doc = Document::new();
    /// doc.register(Value::from("hello"));
    /// let bytes = doc.save(&WriteOptions::new()).unwrap();
    /// assert!(bytes.starts_with(b"%PDF-1.7"));
    ///
    /// let mut reloaded = Document::load(bytes).unwrap();
    /// assert!(reloaded.catalog().is_dictionary());
    /// ```
    pub fn save(&mut self, options: &WriteOptions) -> Result<Vec<u8>> {
        if options.update_mod_date {
            self.stamp_mod_date(Utc::now().into())?;
        }
        let incremental = options.mode == SaveMode::Incremental;
        if incremental && self.source.is_some() && self.previous_xref.is_some() {
            self.write_incremental()
        } else {
            if incremental && self.source.is_some() {
                warn!("loaded bytes have no usable cross-reference chain, writing a full save");
            }
            self.write_full(&options.version)
        }
    }

    /// Serializes the document into `writer`.
    pub fn save_to<W: io::Write>(&mut self, mut writer: W, options: &WriteOptions) -> Result<()> {
        let bytes = self.save(options)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn stamp_mod_date(&mut self, now: DateTime<FixedOffset>) -> Result<()> {
        let info = self.trailer_entry("Info").unwrap_or_default();
        let info = self.resolve(&info);
        if info.is_dictionary() {
            self.dict_set(&info, "ModDate", Value::String(PdfString::from_date(&now)))?;
        }
        Ok(())
    }

    fn write_object(&self, out: &mut Vec<u8>, id: ObjectId, payload: &Value) -> u64 {
        let offset = out.len() as u64;
        out.extend_from_slice(format!("{} {} obj\n", id.number, id.generation).as_bytes());
        self.write_value(out, payload);
        out.extend_from_slice(b"\nendobj\n");
        offset
    }

    fn is_xref_stream(&self, payload: &Value) -> bool {
        self.stream_header(payload)
            .and_then(|header| self.dict_get(&header, "Type"))
            .map_or(false, |t| t.is_name("XRef"))
    }

    fn write_full(&mut self, version: &str) -> Result<Vec<u8>> {
        for id in self.object_ids() {
            self.resolve_object(id);
        }
        self.objstm_cache.clear();

        // Old cross-reference streams describe bytes that are about to be replaced.
        let stale: Vec<ObjectId> = self
            .object_ids()
            .into_iter()
            .filter(|id| {
                self.slot(*id)
                    .and_then(|slot| slot.payload.as_ref())
                    .map_or(false, |payload| self.is_xref_stream(payload))
            })
            .collect();
        for id in stale {
            self.delete(id)?;
        }

        self.pack_object_streams()?;

        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut written: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        let numbers: Vec<u32> = self.slots.keys().copied().collect();
        for number in numbers {
            let Some(slot) = self.slots.get(&number) else {
                continue;
            };
            if slot.entry.is_free() || slot.virtual_ {
                continue;
            }
            let id = ObjectId::new(number, slot.entry.generation);
            match slot.entry.usage {
                XrefUsage::InUseCompressed {
                    index: Some(_), ..
                } => {
                    written.insert(number, slot.entry);
                }
                _ => {
                    let payload = slot.payload.clone().unwrap_or_default();
                    let offset = self.write_object(&mut out, id, &payload);
                    written.insert(number, XrefEntry::in_use(Some(offset), id.generation));
                }
            }
        }

        let compressed = written.values().any(XrefEntry::is_compressed);
        let xref_offset = if compressed {
            let number = self.next_number;
            self.next_number += 1;
            let entries = self.full_entries(&written, number + 1);
            self.write_xref_stream(&mut out, number, entries, number + 1, None)
        } else {
            let size = self.next_number;
            let entries = self.full_entries(&written, size);
            self.write_xref_table(&mut out, entries, size, None)
        };

        debug!(
            objects = written.len(),
            bytes = out.len(),
            "wrote full document"
        );
        self.uses_xref_streams = compressed;
        self.finish_save(&out, &written, xref_offset);
        Ok(out)
    }

    /// Rewrites every object stream that has members and assigns member indices.
    fn pack_object_streams(&mut self) -> Result<()> {
        let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (number, slot) in &self.slots {
            if let XrefUsage::InUseCompressed { stream, .. } = slot.entry.usage {
                if !slot.virtual_ {
                    groups.entry(stream).or_default().push(*number);
                }
            }
        }

        for id in self.object_ids() {
            if !groups.contains_key(&id.number) && self.is_object_stream(id) {
                let stream = self.resolve_object(id).unwrap_or_default();
                self.set_stream_body(&stream, Vec::new())?;
                self.dict_set(&stream, "N", Value::Integer(0))?;
                self.dict_set(&stream, "First", Value::Integer(0))?;
            }
        }

        for (stream_number, members) in groups {
            let generation = self.slots.get(&stream_number).map(|s| s.entry.generation);
            let stream_id = ObjectId::new(stream_number, generation.unwrap_or(0));
            let target = self.resolve_object(stream_id).unwrap_or_default();
            let valid = self
                .stream_header(&target)
                .and_then(|header| self.dict_get(&header, "Type"))
                .map_or(false, |t| t.is_name("ObjStm"));
            if !valid {
                warn!(object_stream = stream_number, "object stream is gone, writing members top-level");
                for member in members {
                    if let Some(slot) = self.slots.get_mut(&member) {
                        slot.entry = XrefEntry::in_use(None, slot.entry.generation);
                    }
                }
                continue;
            }

            let mut table = Vec::new();
            let mut objects = Vec::new();
            for (index, member) in members.iter().enumerate() {
                let payload = self
                    .slots
                    .get(member)
                    .and_then(|slot| slot.payload.clone())
                    .unwrap_or_default();
                table.extend_from_slice(format!("{} {} ", member, objects.len()).as_bytes());
                self.write_value(&mut objects, &payload);
                objects.push(b'\n');
                if let Some(slot) = self.slots.get_mut(member) {
                    slot.entry = XrefEntry::compressed(stream_number, Some(index as u32));
                }
            }
            let first = table.len();
            table.extend_from_slice(&objects);

            self.set_stream_body(&target, table)?;
            self.dict_set(&target, "N", Value::from(members.len()))?;
            self.dict_set(&target, "First", Value::from(first))?;
            debug!(object_stream = stream_number, members = members.len(), "packed object stream");
        }
        Ok(())
    }

    /// Every number below `size`, with free entries linked into a list.
    fn full_entries(&self, written: &BTreeMap<u32, XrefEntry>, size: u32) -> Vec<(u32, XrefEntry)> {
        let free: Vec<u32> = (0..size).filter(|n| !written.contains_key(n)).collect();
        let mut entries = Vec::with_capacity(size as usize);
        for number in 0..size {
            match written.get(&number) {
                Some(entry) => entries.push((number, *entry)),
                None => {
                    let position = free.iter().position(|n| *n == number).unwrap_or(0);
                    let next = free.get(position + 1).copied().unwrap_or(0);
                    let generation = if number == 0 {
                        u16::MAX
                    } else {
                        self.slots
                            .get(&number)
                            .filter(|slot| slot.entry.is_free())
                            .map_or(0, |slot| slot.entry.generation)
                    };
                    entries.push((number, XrefEntry::free(next, generation)));
                }
            }
        }
        entries
    }

    fn write_incremental(&mut self) -> Result<Vec<u8>> {
        let source = self.source.clone().unwrap_or_else(|| Rc::from(Vec::new()));
        let mut out = source.to_vec();
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }

        let mut numbers: BTreeSet<u32> = self.modified.clone();
        numbers.extend(
            self.slots
                .iter()
                .filter(|(number, slot)| **number != 0 && !slot.original)
                .map(|(number, _)| *number),
        );

        let mut written: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        for number in numbers {
            let Some(slot) = self.slots.get(&number) else {
                continue;
            };
            let generation = slot.entry.generation;
            if slot.entry.is_free() || slot.virtual_ {
                written.insert(number, XrefEntry::free(0, generation));
                continue;
            }
            let id = ObjectId::new(number, generation);
            let payload = self.resolve_object(id).unwrap_or_default();
            let offset = self.write_object(&mut out, id, &payload);
            written.insert(number, XrefEntry::in_use(Some(offset), generation));
        }

        let prev = self.previous_xref;
        let entries: Vec<(u32, XrefEntry)> = written.iter().map(|(n, e)| (*n, *e)).collect();
        let xref_offset = if self.uses_xref_streams {
            let number = self.next_number;
            self.next_number += 1;
            self.write_xref_stream(&mut out, number, entries, number + 1, prev)
        } else {
            let size = self.next_number;
            self.write_xref_table(&mut out, entries, size, prev)
        };

        debug!(
            objects = written.len(),
            bytes = out.len() - source.len(),
            "appended incremental update"
        );
        self.finish_save(&out, &written, xref_offset);
        Ok(out)
    }

    fn trailer_entries(&self) -> Vec<(Name, Value)> {
        self.dict_entries(&self.trailer)
            .into_iter()
            .filter(|(key, value)| !is_section_key(key) && !self.is_virtual(value))
            .collect()
    }

    fn write_entries(&self, out: &mut Vec<u8>, entries: &[(Name, Value)]) {
        for (key, value) in entries {
            out.push(b' ');
            write_name(out, key);
            out.push(b' ');
            self.write_value(out, value);
        }
    }

    fn write_xref_table(
        &self,
        out: &mut Vec<u8>,
        entries: Vec<(u32, XrefEntry)>,
        size: u32,
        prev: Option<u64>,
    ) -> u64 {
        let offset = out.len() as u64;
        out.extend_from_slice(b"xref\n");
        for (first, run) in subsections(&entries) {
            out.extend_from_slice(format!("{} {}\n", first, run.len()).as_bytes());
            for entry in run {
                let line = match entry.usage {
                    XrefUsage::Free { next } => {
                        format!("{:010} {:05} f\r\n", next, entry.generation)
                    }
                    XrefUsage::InUse { offset } => {
                        format!("{:010} {:05} n\r\n", offset.unwrap_or(0), entry.generation)
                    }
                    XrefUsage::InUseCompressed { .. } => {
                        format!("{:010} {:05} f\r\n", 0, entry.generation)
                    }
                };
                out.extend_from_slice(line.as_bytes());
            }
        }

        out.extend_from_slice(b"trailer\n<<");
        out.extend_from_slice(format!(" /Size {}", size).as_bytes());
        if let Some(prev) = prev {
            out.extend_from_slice(format!(" /Prev {}", prev).as_bytes());
        }
        self.write_entries(out, &self.trailer_entries());
        out.extend_from_slice(format!(" >>\nstartxref\n{}\n%%EOF\n", offset).as_bytes());
        offset
    }

    fn write_xref_stream(
        &self,
        out: &mut Vec<u8>,
        number: u32,
        mut entries: Vec<(u32, XrefEntry)>,
        size: u32,
        prev: Option<u64>,
    ) -> u64 {
        let offset = out.len() as u64;
        entries.retain(|(n, _)| *n != number);
        entries.push((number, XrefEntry::in_use(Some(offset), 0)));
        entries.sort_by_key(|(n, _)| *n);

        let mut index = Vec::new();
        let mut rows: Vec<(u8, u64, u64)> = Vec::with_capacity(entries.len());
        for (first, run) in subsections(&entries) {
            index.push(format!("{} {}", first, run.len()));
            rows.extend(run.iter().map(|entry| match entry.usage {
                XrefUsage::Free { next } => (0, u64::from(next), u64::from(entry.generation)),
                XrefUsage::InUse { offset } => {
                    (1, offset.unwrap_or(0), u64::from(entry.generation))
                }
                XrefUsage::InUseCompressed { stream, index } => {
                    (2, u64::from(stream), u64::from(index.unwrap_or(0)))
                }
            }));
        }

        // Field widths grow with the largest offset and index written.
        let second = field_width(rows.iter().map(|row| row.1).max().unwrap_or(0));
        let third = field_width(rows.iter().map(|row| row.2).max().unwrap_or(0));
        let mut data = Vec::with_capacity(rows.len() * (1 + second + third));
        for (kind, field2, field3) in rows {
            data.push(kind);
            data.extend_from_slice(&field2.to_be_bytes()[8 - second..]);
            data.extend_from_slice(&field3.to_be_bytes()[8 - third..]);
        }

        out.extend_from_slice(format!("{} 0 obj\n<< /Type /XRef", number).as_bytes());
        out.extend_from_slice(
            format!(
                " /Size {} /W [1 {} {}] /Index [{}]",
                size,
                second,
                third,
                index.join(" ")
            )
            .as_bytes(),
        );
        if let Some(prev) = prev {
            out.extend_from_slice(format!(" /Prev {}", prev).as_bytes());
        }
        self.write_entries(out, &self.trailer_entries());
        out.extend_from_slice(format!(" /Length {} >>\nstream\n", data.len()).as_bytes());
        out.extend_from_slice(&data);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", offset).as_bytes());
        offset
    }

    /// Points the document at the bytes just written.
    fn finish_save(&mut self, bytes: &[u8], written: &BTreeMap<u32, XrefEntry>, xref_offset: u64) {
        for (number, entry) in written {
            if let Some(slot) = self.slots.get_mut(number) {
                if slot.virtual_ {
                    continue;
                }
                slot.entry = *entry;
                slot.original = true;
            }
        }
        for slot in self.slots.values_mut() {
            slot.updated = false;
        }
        self.arena.clear_updated();
        self.modified.clear();
        self.objstm_cache.clear();
        self.source = Some(Rc::from(bytes.to_vec()));
        self.previous_xref = Some(xref_offset);
    }
}

/// Splits ascending entries into runs of consecutive numbers.
fn subsections(entries: &[(u32, XrefEntry)]) -> Vec<(u32, Vec<XrefEntry>)> {
    let mut runs: Vec<(u32, Vec<XrefEntry>)> = Vec::new();
    for (number, entry) in entries {
        match runs.last_mut() {
            Some((first, run)) if *first + run.len() as u32 == *number => run.push(*entry),
            _ => runs.push((*number, vec![*entry])),
        }
    }
    runs
}

/// Formats a real without exponent and with a fractional part. Non-finite values are
/// written as zero.
/// Bytes needed to hold `max` in a cross-reference stream field, at least one.
pub(crate) fn field_width(max: u64) -> usize {
    let bits = 64 - max.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

pub(crate) fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn write_name(out: &mut Vec<u8>, name: &Name) {
    out.push(b'/');
    for &byte in name.as_bytes() {
        if (0x21..=0x7E).contains(&byte)
            && byte != b'#'
            && !crate::lexer::is_delimiter(byte)
        {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, string: &PdfString) {
    match string.mode() {
        StringMode::Hex => {
            out.push(b'<');
            for byte in string.as_bytes() {
                out.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            out.push(b'>');
        }
        StringMode::Literal => {
            out.push(b'(');
            for &byte in string.as_bytes() {
                match byte {
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    b'\t' => out.extend_from_slice(b"\\t"),
                    b'\x08' => out.extend_from_slice(b"\\b"),
                    b'\x0C' => out.extend_from_slice(b"\\f"),
                    b'(' => out.extend_from_slice(b"\\("),
                    b')' => out.extend_from_slice(b"\\)"),
                    b'\\' => out.extend_from_slice(b"\\\\"),
                    other => out.push(other),
                }
            }
            out.push(b')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_width() {
        assert_eq!(field_width(0), 1);
        assert_eq!(field_width(255), 1);
        assert_eq!(field_width(65_535), 2);
        assert_eq!(field_width(65_536), 3);
        assert_eq!(field_width(u64::from(u32::MAX) + 1), 5);
    }

    #[test]
    fn test_xref_stream_widens_fields() {
        let doc = Document::new();
        let entries = vec![
            (1, XrefEntry::compressed(5, Some(70_000))),
            (2, XrefEntry::in_use(Some(5_000_000_000), 0)),
        ];
        let mut out = Vec::new();
        doc.write_xref_stream(&mut out, 3, entries, 4, None);

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/W [1 5 3] /Index [1 3]"));
        let start = text.find("stream\n").unwrap() + "stream\n".len();
        let data = &out[start..start + 27];
        assert_eq!(&data[..9], &[2, 0, 0, 0, 0, 5, 0x01, 0x11, 0x70]);
        assert_eq!(&data[9..18], &[1, 0x01, 0x2A, 0x05, 0xF2, 0x00, 0, 0, 0]);
        assert_eq!(&data[18..], &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.0), "1.0");
        assert_eq!(format_real(-2.5), "-2.5");
        assert_eq!(format_real(0.000001), "0.000001");
        assert_eq!(format_real(1e20), "100000000000000000000.0");
        assert_eq!(format_real(f64::NAN), "0.0");
    }

    #[test]
    fn test_write_primitives() {
        let doc = Document::new();
        assert_eq!(doc.to_bytes(&Value::Null), b"null");
        assert_eq!(doc.to_bytes(&Value::from(-3)), b"-3");
        assert_eq!(doc.to_bytes(&Value::name("A B#")), b"/A#20B#23");
        assert_eq!(doc.to_bytes(&Value::string("a(b)\\\n")), b"(a\\(b\\)\\\\\\n)");
        assert_eq!(
            doc.to_bytes(&Value::String(PdfString::with_mode(vec![0xAB, 1], StringMode::Hex))),
            b"<AB01>"
        );
        assert_eq!(doc.to_bytes(&Value::Reference(ObjectId::new(4, 1))), b"4 1 R");
    }

    #[test]
    fn test_non_utf8_name_is_written_back() {
        let mut doc = Document::new();
        let name = doc.parse_value(b"/Caf#E9").unwrap();
        assert_eq!(doc.to_bytes(&name), b"/Caf#E9");

        let dict = doc.parse_value(b"<< /Font#E9 /Sans#FF >>").unwrap();
        assert!(doc.dict_contains(&dict, b"Font\xE9".as_slice()));
        assert_eq!(doc.to_bytes(&dict), b"<< /Font#E9 /Sans#FF >>");
    }

    #[test]
    fn test_write_containers() {
        let mut doc = Document::new();
        let inner = doc.new_array_with(vec![Value::from(1), Value::from(2)]);
        let dict = doc.new_dictionary_with([("K", inner)]);
        assert_eq!(doc.to_bytes(&dict), b"<< /K [1 2] >>");
        let empty = doc.new_array();
        assert_eq!(doc.to_bytes(&empty), b"[]");
    }

    #[test]
    fn test_virtual_entries_are_skipped() {
        let mut doc = Document::new();
        let dict = doc.new_dictionary();
        doc.dict_set(&dict, "A", Value::from(1)).unwrap();
        doc.get_or_create(&dict, "V", crate::ContainerKind::Dictionary, true)
            .unwrap();
        doc.get_or_create(&dict, "W", crate::ContainerKind::Array, false)
            .unwrap();
        assert_eq!(doc.to_bytes(&dict), b"<< /A 1 >>");
    }

    #[test]
    fn test_stream_length_is_recomputed() {
        let mut doc = Document::new();
        let stream = doc.new_stream(b"abc".to_vec());
        doc.dict_set(&stream, "Length", Value::from(99)).unwrap();
        assert_eq!(
            doc.to_bytes(&stream),
            b"<< /Length 3 >>\nstream\nabc\nendstream"
        );
    }

    #[test]
    fn test_subsections() {
        let entries = vec![
            (1, XrefEntry::in_use(Some(1), 0)),
            (2, XrefEntry::in_use(Some(2), 0)),
            (5, XrefEntry::free(0, 1)),
        ];
        let runs = subsections(&entries);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].0, 1);
        assert_eq!(runs[0].1.len(), 2);
        assert_eq!(runs[1].0, 5);
    }
}
