//! Stream bodies: lazy loading, decoding, encoding and external data files.
//!
//! A stream's body is kept as raw bytes next to its header dictionary. Decoding applies the
//! filters listed in the header (`Filter`/`DecodeParms`, or `FFilter`/`FDecodeParms` when
//! the data lives in an external file named by `F`), stores the decoded bytes and removes
//! the filter entries, so decoding twice is a no-op.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, Value};
//!
//! let mut doc = Document::new();
//! let stream = doc.new_stream(b"48656C6C6F>".to_vec());
//! doc.dict_set(&stream, "Filter", Value::name("ASCIIHexDecode")).unwrap();
//!
//! assert_eq!(doc.stream_body(&stream, true).unwrap(), b"Hello");
//! assert!(!doc.dict_contains(&stream, "Filter"));
//! assert_eq!(doc.stream_body(&stream, true).unwrap(), b"Hello");
//! ```

use crate::error::{Error, Result};
use crate::map::PdfMap;
use crate::node::{NodeData, Owner, StreamData};
use crate::value::{Name, NodeId, Value};
use crate::Document;
use tracing::debug;

/// What [`Document::set_stream_data_file`] did with the stream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileTransfer {
    /// Local data dropped, the stream now points at the new file.
    SubstituteLocalWithNew,
    /// Local data written to the new file, local body emptied.
    ExportLocalToNewFile,
    /// The stream points at another file; no data was copied.
    SubstituteOldFileWithNew,
    /// Data of the old file copied into the new file.
    CopyOldFileDataToNewFile,
    /// Local stream without target: nothing to do.
    NoAction,
    /// External reference dropped without importing; the body is empty.
    EmptyLocal,
    /// External data imported into the body, external reference dropped.
    ImportOldFileToLocal,
}

struct FilterKeys {
    filter: &'static str,
    params: &'static str,
}

const LOCAL_KEYS: FilterKeys = FilterKeys {
    filter: "Filter",
    params: "DecodeParms",
};

const FILE_KEYS: FilterKeys = FilterKeys {
    filter: "FFilter",
    params: "FDecodeParms",
};

impl Document {
    /// Wraps a parsed header dictionary and a raw body into a stream.
    pub(crate) fn stream_with_header(&mut self, header: NodeId, body: Vec<u8>) -> Value {
        let external = self
            .arena
            .entries(header)
            .map_or(false, |map| map.contains_key("F"));
        let id = self.arena.alloc(NodeData::Stream(StreamData {
            header,
            body,
            body_resolved: !external,
        }));
        if let Some(node) = self.arena.get_mut(header) {
            node.owner = Some(Owner::Container(id));
        }
        Value::Stream(id)
    }

    /// The header dictionary of a stream.
    #[must_use]
    pub fn stream_header(&self, stream: &Value) -> Option<Value> {
        match self.peek(stream) {
            Value::Stream(id) => self.arena.stream(id).map(|s| Value::Dictionary(s.header)),
            _ => None,
        }
    }

    /// The external file specification (`F`) of a stream, if any.
    #[must_use]
    pub fn stream_data_file(&self, stream: &Value) -> Option<String> {
        let header = self.stream_header(stream)?.node_id()?;
        self.file_spec(header)
    }

    fn file_spec(&self, header: NodeId) -> Option<String> {
        match self.arena.entries(header)?.get("F").map(|v| self.peek(v))? {
            Value::String(spec) => Some(spec.to_text_lossy()),
            dict @ Value::Dictionary(_) => ["UF", "F"].iter().find_map(|key| {
                self.dict_get(&dict, key)
                    .and_then(|v| v.as_string().map(|s| s.to_text_lossy()))
            }),
            _ => None,
        }
    }

    fn filter_keys(&self, header: NodeId) -> &'static FilterKeys {
        let external = self
            .arena
            .entries(header)
            .map_or(false, |map| map.contains_key("F"));
        if external {
            &FILE_KEYS
        } else {
            &LOCAL_KEYS
        }
    }

    fn header_of(&self, stream: NodeId) -> Result<NodeId> {
        self.arena
            .stream(stream)
            .map(|s| s.header)
            .ok_or_else(|| Error::malformed("dangling stream handle"))
    }

    /// Filters listed under `keys`, each with its parameter dictionary.
    fn filter_chain(&self, header: NodeId, keys: &FilterKeys) -> Vec<(Name, Option<PdfMap>)> {
        let dict = Value::Dictionary(header);
        let names: Vec<Name> = match self.dict_get(&dict, keys.filter).map(|v| self.peek(&v)) {
            Some(Value::Name(name)) => vec![name],
            Some(array @ Value::Array(_)) => self
                .array_items(&array)
                .unwrap_or_default()
                .iter()
                .filter_map(|item| self.peek(item).as_name().cloned())
                .collect(),
            _ => Vec::new(),
        };
        let params: Vec<Option<PdfMap>> =
            match self.dict_get(&dict, keys.params).map(|v| self.peek(&v)) {
                Some(Value::Dictionary(id)) => vec![self.arena.entries(id).cloned()],
                Some(array @ Value::Array(_)) => self
                    .array_items(&array)
                    .unwrap_or_default()
                    .iter()
                    .map(|item| match self.peek(item) {
                        Value::Dictionary(id) => self.arena.entries(id).cloned(),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, params.get(i).cloned().flatten()))
            .collect()
    }

    fn apply_decoders(&self, chain: &[(Name, Option<PdfMap>)], data: Vec<u8>) -> Result<Vec<u8>> {
        let mut data = data;
        for (name, params) in chain {
            data = self.filters.get(&name.to_text_lossy())?.decode(&data, params.as_ref())?;
        }
        Ok(data)
    }

    /// Pulls the data of an external file into the body, once.
    fn materialize_body(&mut self, stream: NodeId) -> Result<()> {
        let header = self.header_of(stream)?;
        if self.arena.stream(stream).map_or(true, |s| s.body_resolved) {
            return Ok(());
        }
        let data = match self.file_spec(header) {
            Some(spec) => {
                debug!(file = %spec, "loading external stream data");
                self.files.read(&spec)?
            }
            None => Vec::new(),
        };
        if let Some(s) = self.arena.stream_mut(stream) {
            s.body = data;
            s.body_resolved = true;
        }
        Ok(())
    }

    /// The body of a stream, decoded when `decode` is set.
    ///
    /// Decoding replaces the stored body with the decoded bytes and removes the filter
    /// entries from the header, which marks the stream updated.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFilter`] when a listed filter is not registered
    /// - [`Error::Io`] when external data cannot be read
    /// - [`Error::TypeMismatch`] / [`Error::ImmutableMutation`] when `stream` is not a stream
    pub fn stream_body(&mut self, stream: &Value, decode: bool) -> Result<Vec<u8>> {
        let id = self.stream_node(stream)?;
        self.materialize_body(id)?;
        if decode {
            self.decode_in_place(id)?;
        }
        Ok(self
            .arena
            .stream(id)
            .map(|s| s.body.clone())
            .unwrap_or_default())
    }

    fn decode_in_place(&mut self, stream: NodeId) -> Result<()> {
        let header = self.header_of(stream)?;
        let keys = self.filter_keys(header);
        let chain = self.filter_chain(header, keys);
        if chain.is_empty() {
            return Ok(());
        }
        let body = self
            .arena
            .stream(stream)
            .map(|s| s.body.clone())
            .unwrap_or_default();
        let decoded = self.apply_decoders(&chain, body)?;
        debug!(filters = chain.len(), bytes = decoded.len(), "decoded stream body");
        if let Some(s) = self.arena.stream_mut(stream) {
            s.body = decoded;
        }
        let header_value = Value::Dictionary(header);
        self.dict_remove(&header_value, keys.filter)?;
        self.dict_remove(&header_value, keys.params)?;
        self.mark_updated(stream);
        Ok(())
    }

    /// Decoded body of a stream without touching the document.
    pub(crate) fn decoded_bytes(&self, stream: &Value) -> Result<Vec<u8>> {
        let Value::Stream(id) = self.peek(stream) else {
            return Err(Error::type_mismatch("stream", self.peek(stream).kind().as_str()));
        };
        let header = self.header_of(id)?;
        let body = match self.arena.stream(id) {
            Some(s) if s.body_resolved => s.body.clone(),
            _ => match self.file_spec(header) {
                Some(spec) => self.files.read(&spec)?,
                None => Vec::new(),
            },
        };
        let chain = self.filter_chain(header, self.filter_keys(header));
        self.apply_decoders(&chain, body)
    }

    /// Replaces the body with unencoded `body`, dropping the filter entries.
    pub fn set_stream_body(&mut self, stream: &Value, body: Vec<u8>) -> Result<()> {
        let id = self.stream_node(stream)?;
        let header = self.header_of(id)?;
        let keys = self.filter_keys(header);
        if let Some(s) = self.arena.stream_mut(id) {
            s.body = body;
            s.body_resolved = true;
        }
        let header_value = Value::Dictionary(header);
        self.dict_remove(&header_value, keys.filter)?;
        self.dict_remove(&header_value, keys.params)?;
        self.mark_updated(id);
        Ok(())
    }

    /// Encodes the body with a registered filter, prepending it to the filter entry.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFilter`] when `filter` is not registered.
    pub fn encode_stream(&mut self, stream: &Value, filter: &str) -> Result<()> {
        let id = self.stream_node(stream)?;
        self.materialize_body(id)?;
        let header = self.header_of(id)?;
        let keys = self.filter_keys(header);

        let (name, encoded) = {
            let encoder = self.filters.get(filter)?;
            let body = self
                .arena
                .stream(id)
                .map(|s| s.body.as_slice())
                .unwrap_or_default();
            (encoder.name().to_string(), encoder.encode(body, None)?)
        };

        let header_value = Value::Dictionary(header);
        let filters = match self.dict_remove(&header_value, keys.filter)? {
            None => Value::name(&name),
            Some(previous) => match self.resolve(&previous) {
                array @ Value::Array(_) => {
                    self.array_insert(&array, 0, Value::name(&name))?;
                    self.include_detached(array)
                }
                single => self.new_array_with(vec![Value::name(&name), single]),
            },
        };
        self.dict_set(&header_value, keys.filter, filters)?;

        if let Some(previous) = self.dict_remove(&header_value, keys.params)? {
            let params = match self.resolve(&previous) {
                array @ Value::Array(_) => {
                    self.array_insert(&array, 0, Value::Null)?;
                    self.include_detached(array)
                }
                single => self.new_array_with(vec![Value::Null, single]),
            };
            self.dict_set(&header_value, keys.params, params)?;
        }

        if let Some(s) = self.arena.stream_mut(id) {
            s.body = encoded;
        }
        self.mark_updated(id);
        debug!(filter = %name, "encoded stream body");
        Ok(())
    }

    /// A container that was referenced indirectly is copied when moved back inline.
    fn include_detached(&mut self, value: Value) -> Value {
        if self.owner(&value).is_some() {
            self.duplicate(&value)
        } else {
            value
        }
    }

    /// Moves the stream data to or from an external file named `target`.
    ///
    /// With `preserve`, existing data is carried over (exported, copied or imported);
    /// without it, the stream simply switches to the new source. Filter entries follow the
    /// data between `Filter`/`DecodeParms` and `FFilter`/`FDecodeParms`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when preserving data fails to read or write a file.
    pub fn set_stream_data_file(
        &mut self,
        stream: &Value,
        target: Option<&str>,
        preserve: bool,
    ) -> Result<DataFileTransfer> {
        let id = self.stream_node(stream)?;
        let header = self.header_of(id)?;
        let header_value = Value::Dictionary(header);
        let old = self.file_spec(header);

        let transfer = match (old, target) {
            (None, None) => return Ok(DataFileTransfer::NoAction),
            (None, Some(target)) => {
                let transfer = if preserve {
                    let body = self
                        .arena
                        .stream(id)
                        .map(|s| s.body.clone())
                        .unwrap_or_default();
                    self.files.write(target, &body)?;
                    DataFileTransfer::ExportLocalToNewFile
                } else {
                    DataFileTransfer::SubstituteLocalWithNew
                };
                self.move_entry(&header_value, "Filter", "FFilter")?;
                self.move_entry(&header_value, "DecodeParms", "FDecodeParms")?;
                self.dict_set(&header_value, "F", Value::string(target))?;
                self.reset_body(id, Vec::new(), false);
                transfer
            }
            (Some(old), Some(target)) => {
                let transfer = if preserve {
                    let data = self.files.read(&old)?;
                    self.files.write(target, &data)?;
                    DataFileTransfer::CopyOldFileDataToNewFile
                } else {
                    DataFileTransfer::SubstituteOldFileWithNew
                };
                self.dict_set(&header_value, "F", Value::string(target))?;
                self.reset_body(id, Vec::new(), false);
                transfer
            }
            (Some(old), None) => {
                if preserve {
                    let data = self.files.read(&old)?;
                    self.dict_remove(&header_value, "F")?;
                    self.move_entry(&header_value, "FFilter", "Filter")?;
                    self.move_entry(&header_value, "FDecodeParms", "DecodeParms")?;
                    self.reset_body(id, data, true);
                    DataFileTransfer::ImportOldFileToLocal
                } else {
                    self.dict_remove(&header_value, "F")?;
                    self.dict_remove(&header_value, "FFilter")?;
                    self.dict_remove(&header_value, "FDecodeParms")?;
                    self.reset_body(id, Vec::new(), true);
                    DataFileTransfer::EmptyLocal
                }
            }
        };
        self.mark_updated(id);
        debug!(?transfer, "moved stream data");
        Ok(transfer)
    }

    fn reset_body(&mut self, stream: NodeId, body: Vec<u8>, resolved: bool) {
        if let Some(s) = self.arena.stream_mut(stream) {
            s.body = body;
            s.body_resolved = resolved;
        }
    }

    fn move_entry(&mut self, dict: &Value, from: &str, to: &str) -> Result<()> {
        match self.dict_remove(dict, from)? {
            Some(value) => self.dict_set(dict, to, value).map(|_| ()),
            None => self.dict_remove(dict, to).map(|_| ()),
        }
    }
}
