//! Object streams.
//!
//! An object stream (`/Type /ObjStm`) packs several non-stream objects into one stream
//! body: a header of `number offset` pairs followed by the objects themselves, starting at
//! `/First`. Membership is not stored anywhere else than in the cross-reference entries of
//! the members, which point at the stream by number.

use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{ObjectId, Value};
use crate::xref::{XrefEntry, XrefUsage};
use crate::Document;
use std::rc::Rc;
use tracing::debug;

/// Decoded data of an object stream with its member table.
#[derive(Debug)]
pub(crate) struct ObjectStreamIndex {
    data: Vec<u8>,
    /// `(object number, absolute offset in data)` per member, in stream order.
    members: Vec<(u32, usize)>,
}

impl ObjectStreamIndex {
    fn parse(data: Vec<u8>, count: usize, first: usize) -> Result<Self> {
        let mut members = Vec::with_capacity(count);
        {
            let mut lexer = Lexer::new(&data, 0);
            for _ in 0..count {
                let (Some(number), Some(offset)) = (lexer.read_unsigned(), lexer.read_unsigned())
                else {
                    return Err(Error::malformed("truncated object stream header"));
                };
                let number = u32::try_from(number)
                    .map_err(|_| Error::malformed("object number out of range"))?;
                let offset = usize::try_from(offset)
                    .ok()
                    .and_then(|o| o.checked_add(first))
                    .filter(|o| *o <= data.len())
                    .ok_or_else(|| Error::malformed("object stream offset out of range"))?;
                members.push((number, offset));
            }
        }
        Ok(ObjectStreamIndex { data, members })
    }

    pub fn members(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().map(|(number, _)| *number)
    }

    fn member(&self, index: usize) -> Option<(u32, usize)> {
        self.members.get(index).copied()
    }
}

impl Document {
    /// Member table of object stream `number`, parsed once and cached.
    pub(crate) fn object_stream_index(&mut self, number: u32) -> Result<Rc<ObjectStreamIndex>> {
        if let Some(index) = self.objstm_cache.get(&number) {
            return Ok(Rc::clone(index));
        }
        let generation = self
            .slots
            .get(&number)
            .map(|slot| slot.entry.generation)
            .unwrap_or(0);
        let id = ObjectId::new(number, generation);
        let stream = self
            .resolve_object(id)
            .ok_or(Error::UndefinedIndirectObject(id))?;
        let header = self
            .stream_header(&stream)
            .ok_or_else(|| Error::malformed(format!("object stream {} is not a stream", id)))?;
        let count = self.dict_get(&header, "N").and_then(|v| v.as_i64()).unwrap_or(0);
        let first = self.dict_get(&header, "First").and_then(|v| v.as_i64()).unwrap_or(0);
        let (Ok(count), Ok(first)) = (usize::try_from(count), usize::try_from(first)) else {
            return Err(Error::malformed("invalid object stream header"));
        };

        let data = self.decoded_bytes(&stream)?;
        let index = Rc::new(ObjectStreamIndex::parse(data, count, first)?);
        debug!(object_stream = number, members = count, "indexed object stream");
        self.objstm_cache.insert(number, Rc::clone(&index));
        Ok(index)
    }

    /// Parses member `index` of object stream `stream`.
    pub(crate) fn load_compressed(&mut self, id: ObjectId, stream: u32, index: u32) -> Result<Value> {
        let objects = self.object_stream_index(stream)?;
        let (number, offset) = objects.member(index as usize).ok_or_else(|| {
            Error::malformed(format!("object stream {} has no member {}", stream, index))
        })?;
        if number != id.number {
            return Err(Error::malformed(format!(
                "object stream {} holds object {} at index {}, not {}",
                stream, number, index, id.number
            )));
        }
        let mut parser = Parser::new(&objects.data, offset, self.options().max_nesting);
        parser.parse_value(self)
    }

    /// Creates an empty object stream and returns its identity.
    pub fn create_object_stream(&mut self) -> ObjectId {
        let stream = self.new_stream(Vec::new());
        if let Some(header) = self.stream_header(&stream) {
            self.put_entry(&header, "Type", Value::name("ObjStm"));
            self.put_entry(&header, "N", Value::Integer(0));
            self.put_entry(&header, "First", Value::Integer(0));
        }
        self.register(stream)
    }

    /// `true` when `id` names a live `/Type /ObjStm` stream.
    pub(crate) fn is_object_stream(&mut self, id: ObjectId) -> bool {
        let Some(value) = self.resolve_object(id) else {
            return false;
        };
        self.stream_header(&value)
            .and_then(|header| self.dict_get(&header, "Type"))
            .map_or(false, |t| t.is_name("ObjStm"))
    }

    /// Moves `id` into the object stream `into`, if its payload may live there.
    ///
    /// The object is uncompressed first. Streams, objects with a non-zero generation and
    /// (unless [`CompressionPolicy::allow_integers`](crate::CompressionPolicy) is set)
    /// integers stay top-level. Returns whether the object was moved.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when `id` is missing or free.
    pub fn compress(&mut self, id: ObjectId, into: ObjectId) -> Result<bool> {
        self.writable_slot(id)?;
        self.uncompress(id)?;
        if id == into || id.generation != 0 || !self.is_object_stream(into) {
            return Ok(false);
        }
        let payload = self.resolve_object(id).unwrap_or_default();
        let compressible = match payload {
            Value::Stream(_) => false,
            Value::Integer(_) => self.options().compression.allow_integers,
            _ => true,
        };
        if !compressible {
            return Ok(false);
        }
        if let Some(slot) = self.slots.get_mut(&id.number) {
            slot.entry = XrefEntry::compressed(into.number, None);
        }
        self.touch_slot(id.number);
        debug!(object = %id, object_stream = %into, "compressed object");
        Ok(true)
    }

    /// Moves a compressed object back to top level. Returns whether it was compressed.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedIndirectObject`] when `id` is missing or free.
    pub fn uncompress(&mut self, id: ObjectId) -> Result<bool> {
        let slot = self.writable_slot(id)?;
        if !slot.entry.is_compressed() {
            return Ok(false);
        }
        // The payload has to be read before the entry stops pointing at its data.
        let payload = self.resolve_object(id);
        if let Some(slot) = self.slots.get_mut(&id.number) {
            slot.entry = XrefEntry::in_use(None, slot.entry.generation);
            if slot.payload.is_none() {
                slot.payload = payload;
            }
        }
        self.touch_slot(id.number);
        debug!(object = %id, "uncompressed object");
        Ok(true)
    }

    /// Objects whose entries point at the object stream `stream`.
    #[must_use]
    pub fn object_stream_members(&self, stream: ObjectId) -> Vec<ObjectId> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                matches!(slot.entry.usage, XrefUsage::InUseCompressed { stream: s, .. } if s == stream.number)
            })
            .map(|(number, slot)| ObjectId::new(*number, slot.entry.generation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionPolicy, DocumentOptions};

    #[test]
    fn test_index_parsing() {
        let data = b"4 0 5 3 12 (a) 13".to_vec();
        let index = ObjectStreamIndex::parse(data, 2, 8).unwrap();
        assert_eq!(index.members().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(index.member(1), Some((5, 11)));
        assert!(ObjectStreamIndex::parse(b"4".to_vec(), 1, 0).is_err());
    }

    #[test]
    fn test_compress_and_uncompress() {
        let mut doc = Document::new();
        let objstm = doc.create_object_stream();
        let dict = doc.new_dictionary();
        let id = doc.register(dict);

        assert!(doc.compress(id, objstm).unwrap());
        assert_eq!(doc.object_stream_members(objstm), vec![id]);
        assert!(doc.entry(id).unwrap().is_compressed());

        assert!(doc.uncompress(id).unwrap());
        assert!(!doc.uncompress(id).unwrap());
        assert!(doc.object_stream_members(objstm).is_empty());
        assert!(doc.resolve_object(id).unwrap().is_dictionary());
    }

    #[test]
    fn test_compressibility_rules() {
        let mut doc = Document::new();
        let objstm = doc.create_object_stream();
        let stream = doc.new_stream(Vec::new());
        let stream_id = doc.register(stream);
        let integer = doc.register(Value::from(3));
        let plain = doc.register(Value::from(true));

        assert!(!doc.compress(stream_id, objstm).unwrap());
        assert!(!doc.compress(integer, objstm).unwrap());
        assert!(!doc.compress(objstm, objstm).unwrap());
        assert!(!doc.compress(plain, plain).unwrap());
        assert!(doc.compress(plain, objstm).unwrap());

        let mut lenient = Document::with_options(
            DocumentOptions::new().with_compression(CompressionPolicy {
                allow_integers: true,
            }),
        );
        let objstm = lenient.create_object_stream();
        let integer = lenient.register(Value::from(3));
        assert!(lenient.compress(integer, objstm).unwrap());
    }

    #[test]
    fn test_compress_missing_object_fails() {
        let mut doc = Document::new();
        let objstm = doc.create_object_stream();
        assert!(matches!(
            doc.compress(ObjectId::new(77, 0), objstm),
            Err(Error::UndefinedIndirectObject(_))
        ));
    }
}
