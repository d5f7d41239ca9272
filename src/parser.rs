//! Object parser.
//!
//! Values are parsed with an explicit frame stack, so deeply nested input cannot overflow
//! the call stack; nesting beyond
//! [`DocumentOptions::max_nesting`](crate::DocumentOptions::max_nesting) is rejected.
//! Containers are allocated in the document while parsing.

use crate::error::{Error, Result};
use crate::lexer::{find_from, Lexer, Token};
use crate::value::{Name, NodeId, ObjectId, Value};
use crate::Document;
use tracing::trace;

enum Frame {
    Array(Vec<Value>),
    Dictionary {
        entries: Vec<(Name, Value)>,
        key: Option<Name>,
    },
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    max_nesting: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8], position: usize, max_nesting: usize) -> Self {
        Parser {
            lexer: Lexer::new(input, position),
            max_nesting,
        }
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Parses one direct value.
    pub fn parse_value(&mut self, doc: &mut Document) -> Result<Value> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let offset = self.lexer.position();
            let Some(token) = self.lexer.next_token()? else {
                return Err(Error::syntax(offset, "unexpected end of input"));
            };

            let value = match token {
                Token::ArrayStart | Token::DictStart => {
                    if stack.len() >= self.max_nesting {
                        return Err(Error::syntax(offset, "containers nested too deeply"));
                    }
                    stack.push(if token == Token::ArrayStart {
                        Frame::Array(Vec::new())
                    } else {
                        Frame::Dictionary {
                            entries: Vec::new(),
                            key: None,
                        }
                    });
                    continue;
                }
                Token::ArrayEnd => match stack.pop() {
                    Some(Frame::Array(items)) => doc.new_array_with(items),
                    _ => return Err(Error::syntax(offset, "unexpected ']'")),
                },
                Token::DictEnd => match stack.pop() {
                    Some(Frame::Dictionary { entries, key: None }) => {
                        doc.new_dictionary_with(entries)
                    }
                    Some(Frame::Dictionary { key: Some(key), .. }) => {
                        return Err(Error::syntax(
                            offset,
                            &format!("missing value for key /{}", key),
                        ))
                    }
                    _ => return Err(Error::syntax(offset, "unexpected '>>'")),
                },
                Token::Name(name) => {
                    if let Some(Frame::Dictionary { key: key @ None, .. }) = stack.last_mut() {
                        *key = Some(name);
                        continue;
                    }
                    Value::Name(name)
                }
                Token::Integer(number) => self.integer_or_reference(number)?,
                Token::Real(value) => Value::Real(value),
                Token::String(string) => Value::String(string),
                Token::Keyword(keyword) => match keyword.as_slice() {
                    b"true" => Value::Boolean(true),
                    b"false" => Value::Boolean(false),
                    b"null" => Value::Null,
                    // An empty object body ("1 0 obj endobj") reads as null.
                    b"endobj" if stack.is_empty() => {
                        self.lexer.seek(offset);
                        Value::Null
                    }
                    other => {
                        return Err(Error::syntax(
                            offset,
                            &format!("unexpected keyword '{}'", String::from_utf8_lossy(other)),
                        ))
                    }
                },
            };

            match stack.last_mut() {
                None => return Ok(value),
                Some(Frame::Array(items)) => items.push(value),
                Some(Frame::Dictionary { entries, key }) => match key.take() {
                    Some(key) => entries.push((key, value)),
                    None => return Err(Error::syntax(offset, "dictionary key must be a name")),
                },
            }
        }
    }

    fn integer_or_reference(&mut self, number: i64) -> Result<Value> {
        if !(0..=i64::from(u32::MAX)).contains(&number) {
            return Ok(Value::Integer(number));
        }
        let position = self.lexer.position();
        if let Ok(Some(Token::Integer(generation))) = self.lexer.next_token() {
            if (0..=i64::from(u16::MAX)).contains(&generation) {
                if let Ok(Some(token)) = self.lexer.next_token() {
                    if token.is_keyword(b"R") {
                        return Ok(Value::Reference(ObjectId::new(
                            number as u32,
                            generation as u16,
                        )));
                    }
                }
            }
        }
        self.lexer.seek(position);
        Ok(Value::Integer(number))
    }
}

/// Reads an `N G obj` header at `offset`, returning the identity and the position after
/// the keyword.
pub(crate) fn read_object_header(input: &[u8], offset: usize) -> Option<(ObjectId, usize)> {
    let mut lexer = Lexer::new(input, offset);
    let number = lexer.read_unsigned()?;
    let generation = lexer.read_unsigned()?;
    let keyword = lexer.next_token().ok()??;
    if !keyword.is_keyword(b"obj") || number > u64::from(u32::MAX) || generation > 65535 {
        return None;
    }
    Some((
        ObjectId::new(number as u32, generation as u16),
        lexer.position(),
    ))
}

/// Parses the indirect object stored at `offset` of the document source.
pub(crate) fn parse_indirect_at(doc: &mut Document, offset: usize, id: ObjectId) -> Result<Value> {
    let source = doc
        .source
        .clone()
        .ok_or_else(|| Error::malformed("document has no source bytes"))?;
    let (found, body) = read_object_header(&source, offset)
        .ok_or_else(|| Error::syntax(offset, "expected object header"))?;
    if found.number != id.number {
        return Err(Error::malformed(format!(
            "expected object {} at offset {}, found {}",
            id, offset, found
        )));
    }

    let mut parser = Parser::new(&source, body, doc.options().max_nesting);
    let value = parser.parse_value(doc)?;
    let value = match value {
        Value::Dictionary(header) => {
            let lexer = parser.lexer_mut();
            if matches!(lexer.peek_token(), Ok(Some(token)) if token.is_keyword(b"stream")) {
                let _ = lexer.next_token()?;
                lexer.skip_stream_eol();
                let start = lexer.position();
                read_stream(doc, &source, header, start)?
            } else {
                value
            }
        }
        other => other,
    };
    trace!(object = %id, kind = %value.kind(), "parsed indirect object");
    Ok(value)
}

/// Builds a stream from its parsed header and the body starting at `start`.
///
/// The body length comes from `/Length` (direct or indirect); when it is missing or does
/// not land on `endstream`, the body runs up to the next `endstream` keyword.
fn read_stream(doc: &mut Document, input: &[u8], header: NodeId, start: usize) -> Result<Value> {
    let length = match doc.dict_get(&Value::Dictionary(header), "Length") {
        Some(Value::Reference(id)) => doc.resolve_object(id).and_then(|v| v.as_i64()),
        Some(other) => other.as_i64(),
        None => None,
    };

    let declared_end = length
        .and_then(|len| usize::try_from(len).ok())
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= input.len() && endstream_follows(input, *end));
    let end = match declared_end {
        Some(end) => end,
        None => {
            let keyword = find_from(input, start, b"endstream")
                .ok_or_else(|| Error::syntax(start, "missing endstream"))?;
            let mut end = keyword;
            if end > start && input[end - 1] == b'\n' {
                end -= 1;
            }
            if end > start && input[end - 1] == b'\r' {
                end -= 1;
            }
            end
        }
    };

    let body = input[start..end].to_vec();
    Ok(doc.stream_with_header(header, body))
}

fn endstream_follows(input: &[u8], position: usize) -> bool {
    let mut lexer = Lexer::new(input, position);
    lexer.skip_whitespace();
    lexer.starts_with(b"endstream")
}

impl Document {
    /// Parses a direct value written in object syntax, allocating its containers in this
    /// document.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdf_cos::{Document, Value};
    ///
    /// let mut doc = Document::new();
    /// let value = doc.parse_value(b"<< /Type /Page /Count 3 >>").unwrap();
    /// assert_eq!(doc.dict_get(&value, "Count"), Some(Value::Integer(3)));
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::Syntax`] for malformed input.
    pub fn parse_value(&mut self, bytes: &[u8]) -> Result<Value> {
        let mut parser = Parser::new(bytes, 0, self.options().max_nesting);
        parser.parse_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentOptions;

    #[test]
    fn test_parse_nested_containers() {
        let mut doc = Document::new();
        let value = doc
            .parse_value(b"[1 2.5 /N (s) <41> true null << /K [3 0 R] >>]")
            .unwrap();
        let items = doc.array_items(&value).unwrap();
        assert_eq!(items.len(), 8);
        assert_eq!(items[0], Value::Integer(1));
        assert_eq!(items[1], Value::Real(2.5));
        assert!(items[2].is_name("N"));
        assert_eq!(items[5], Value::Boolean(true));
        let kids = doc.dict_get(&items[7], "K").unwrap();
        assert_eq!(
            doc.array_get(&kids, 0),
            Some(Value::Reference(ObjectId::new(3, 0)))
        );
    }

    #[test]
    fn test_integers_without_r_stay_integers() {
        let mut doc = Document::new();
        let value = doc.parse_value(b"[1 0 2 0 R 5]").unwrap();
        assert_eq!(
            doc.array_items(&value).unwrap(),
            vec![
                Value::Integer(1),
                Value::Integer(0),
                Value::Reference(ObjectId::new(2, 0)),
                Value::Integer(5)
            ]
        );
    }

    #[test]
    fn test_null_dictionary_values_are_dropped() {
        let mut doc = Document::new();
        let value = doc.parse_value(b"<< /A null /B 1 >>").unwrap();
        assert!(!doc.dict_contains(&value, "A"));
        assert_eq!(doc.dict_len(&value), Some(1));
    }

    #[test]
    fn test_nesting_limit() {
        let mut doc = Document::with_options(DocumentOptions::new().with_max_nesting(3));
        assert!(doc.parse_value(b"[[[1]]]").is_ok());
        assert!(matches!(
            doc.parse_value(b"[[[[1]]]]"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_deep_nesting_is_iterative() {
        let mut doc = Document::with_options(DocumentOptions::new().with_max_nesting(100_000));
        let depth = 20_000;
        let mut input = vec![b'['; depth];
        input.extend(std::iter::repeat(b']').take(depth));
        assert!(doc.parse_value(&input).unwrap().is_array());
    }

    #[test]
    fn test_syntax_errors() {
        let mut doc = Document::new();
        assert!(doc.parse_value(b"[1 2").is_err());
        assert!(doc.parse_value(b"<< 1 2 >>").is_err());
        assert!(doc.parse_value(b"<< /K >>").is_err());
        assert!(doc.parse_value(b"]").is_err());
    }

    #[test]
    fn test_read_object_header() {
        let input = b"  12 3 obj << >> endobj";
        let (id, after) = read_object_header(input, 0).unwrap();
        assert_eq!(id, ObjectId::new(12, 3));
        assert_eq!(&input[after..after + 3], b" <<");
        assert!(read_object_header(b"12 obj", 0).is_none());
    }
}
