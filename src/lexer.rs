//! Byte-level tokenizer for the object syntax.
//!
//! The lexer is position based: callers can save [`Lexer::position`] and [`Lexer::seek`]
//! back to it, which is how the parser looks ahead for `N G R` references.

use crate::error::{Error, Result};
use crate::value::{Name, PdfString, StringMode};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// Any other run of regular characters: `true`, `obj`, `R`, `stream`, ...
    Keyword(Vec<u8>),
}

impl Token {
    pub fn is_keyword(&self, keyword: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if k.as_slice() == keyword)
    }
}

#[inline]
pub(crate) const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

#[inline]
pub(crate) const fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

#[inline]
pub(crate) const fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8], position: usize) -> Self {
        Lexer {
            input,
            position: position.min(input.len()),
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.input.len());
    }

    #[inline]
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    #[inline]
    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.position += 1;
        Some(byte)
    }

    /// Skips whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek_byte() {
            if is_whitespace(byte) {
                self.position += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek_byte() {
                    if byte == b'\n' || byte == b'\r' {
                        break;
                    }
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Skips the end-of-line marker that follows the `stream` keyword.
    pub fn skip_stream_eol(&mut self) {
        match self.peek_byte() {
            Some(b'\r') => {
                self.position += 1;
                if self.peek_byte() == Some(b'\n') {
                    self.position += 1;
                }
            }
            Some(b'\n') => self.position += 1,
            _ => {}
        }
    }

    /// `true` when the input continues with `text` at the current position.
    pub fn starts_with(&self, text: &[u8]) -> bool {
        self.input[self.position..].starts_with(text)
    }

    /// Reads the next token, or `None` at the end of the input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let start = self.position;
        let Some(byte) = self.next_byte() else {
            return Ok(None);
        };
        let token = match byte {
            b'[' => Token::ArrayStart,
            b']' => Token::ArrayEnd,
            b'<' => {
                if self.peek_byte() == Some(b'<') {
                    self.position += 1;
                    Token::DictStart
                } else {
                    Token::String(self.lex_hex_string(start)?)
                }
            }
            b'>' => {
                if self.next_byte() == Some(b'>') {
                    Token::DictEnd
                } else {
                    return Err(Error::syntax(start, "unexpected '>'"));
                }
            }
            b'(' => Token::String(self.lex_literal_string(start)?),
            b')' => return Err(Error::syntax(start, "unbalanced ')'")),
            b'/' => Token::Name(self.lex_name()),
            b'{' | b'}' => Token::Keyword(vec![byte]),
            b'+' | b'-' | b'.' | b'0'..=b'9' => {
                self.position = start;
                self.lex_number()
            }
            _ => {
                self.position = start;
                Token::Keyword(self.lex_regular_run().to_vec())
            }
        };
        Ok(Some(token))
    }

    /// Reads the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        let position = self.position;
        let token = self.next_token();
        self.position = position;
        token
    }

    fn lex_regular_run(&mut self) -> &'a [u8] {
        let start = self.position;
        while self.peek_byte().map_or(false, is_regular) {
            self.position += 1;
        }
        let input = self.input;
        &input[start..self.position]
    }

    fn lex_number(&mut self) -> Token {
        let run = self.lex_regular_run();
        let text = String::from_utf8_lossy(run);
        if !text.contains('.') {
            if let Ok(value) = text.parse::<i64>() {
                return Token::Integer(value);
            }
        }
        // Integers that overflow and sloppy reals such as "--5" or "5.-" still lex as
        // numbers; anything unparseable becomes zero.
        let cleaned: String = text
            .trim_start_matches('+')
            .chars()
            .enumerate()
            .filter(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
            .map(|(_, c)| c)
            .collect();
        match cleaned.parse::<f64>() {
            Ok(value) => Token::Real(value),
            Err(_) if run.iter().all(|b| matches!(b, b'+' | b'-' | b'.' | b'0'..=b'9')) => {
                Token::Real(0.0)
            }
            Err(_) => Token::Keyword(run.to_vec()),
        }
    }

    fn lex_name(&mut self) -> Name {
        let run = self.lex_regular_run();
        let mut bytes = Vec::with_capacity(run.len());
        let mut i = 0;
        while i < run.len() {
            if run[i] == b'#' && i + 2 < run.len() {
                if let (Some(hi), Some(lo)) = (hex_value(run[i + 1]), hex_value(run[i + 2])) {
                    bytes.push(hi << 4 | lo);
                    i += 3;
                    continue;
                }
            }
            bytes.push(run[i]);
            i += 1;
        }
        Name::from_bytes(&bytes)
    }

    fn lex_hex_string(&mut self, start: usize) -> Result<PdfString> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            let Some(byte) = self.next_byte() else {
                return Err(Error::syntax(start, "unterminated hex string"));
            };
            if byte == b'>' {
                break;
            }
            if is_whitespace(byte) {
                continue;
            }
            let Some(nibble) = hex_value(byte) else {
                return Err(Error::syntax(self.position - 1, "invalid hex digit"));
            };
            match high.take() {
                Some(hi) => bytes.push(hi << 4 | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(hi) = high {
            bytes.push(hi << 4);
        }
        Ok(PdfString::with_mode(bytes, StringMode::Hex))
    }

    fn lex_literal_string(&mut self, start: usize) -> Result<PdfString> {
        let mut bytes = Vec::new();
        let mut depth = 1usize;
        loop {
            let Some(byte) = self.next_byte() else {
                return Err(Error::syntax(start, "unterminated string"));
            };
            match byte {
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\r' => {
                    if self.peek_byte() == Some(b'\n') {
                        self.position += 1;
                    }
                    bytes.push(b'\n');
                }
                b'\\' => {
                    let Some(escaped) = self.next_byte() else {
                        return Err(Error::syntax(start, "unterminated string"));
                    };
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(b'\x08'),
                        b'f' => bytes.push(b'\x0C'),
                        b'0'..=b'7' => {
                            let mut code = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek_byte() {
                                    Some(digit @ b'0'..=b'7') => {
                                        code = code * 8 + u32::from(digit - b'0');
                                        self.position += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push((code & 0xFF) as u8);
                        }
                        b'\r' => {
                            if self.peek_byte() == Some(b'\n') {
                                self.position += 1;
                            }
                        }
                        b'\n' => {}
                        // \( \) \\ and unknown escapes keep the escaped byte.
                        other => bytes.push(other),
                    }
                }
                other => bytes.push(other),
            }
        }
        Ok(PdfString::with_mode(bytes, StringMode::Literal))
    }

    /// Reads an unsigned integer token at the current position, if there is one.
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let position = self.position;
        match self.next_token() {
            Ok(Some(Token::Integer(value))) if value >= 0 => Some(value as u64),
            _ => {
                self.position = position;
                None
            }
        }
    }

    /// Finds `needle` at or after the current position.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_from(self.input, self.position, needle)
    }
}

/// Position of the first occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find_from(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

/// Position of the last occurrence of `needle` in `haystack`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input.as_bytes(), 0);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 -7 +3 3.5 -.25 4."),
            vec![
                Token::Integer(42),
                Token::Integer(-7),
                Token::Integer(3),
                Token::Real(3.5),
                Token::Real(-0.25),
                Token::Real(4.0),
            ]
        );
    }

    #[test]
    fn test_integer_overflow_becomes_real() {
        assert!(matches!(
            tokens("99999999999999999999")[0],
            Token::Real(value) if value > 9.0e18
        ));
    }

    #[test]
    fn test_names_with_escapes() {
        assert_eq!(tokens("/A#20B")[0], Token::Name(Name::from("A B")));
        assert_eq!(tokens("/Type/Page")[1], Token::Name(Name::from("Page")));
    }

    #[test]
    fn test_name_bytes_are_not_reencoded() {
        assert_eq!(tokens("/Caf#E9")[0], Token::Name(Name::from_bytes(b"Caf\xE9")));
        assert_eq!(tokens("/#FF#FE")[0], Token::Name(Name::from_bytes(&[0xFF, 0xFE])));
    }

    #[test]
    fn test_literal_string_escapes() {
        let parsed = tokens(r"(a\(b\)c\\ \n\101 nested (x) end)");
        assert_eq!(
            parsed[0],
            Token::String(PdfString::from("a(b)c\\ \nA nested (x) end"))
        );
    }

    #[test]
    fn test_line_continuation_and_eol_normalization() {
        let parsed = tokens("(one\\\ntwo\r\nthree)");
        assert_eq!(parsed[0], Token::String(PdfString::from("onetwo\nthree")));
    }

    #[test]
    fn test_hex_string() {
        let parsed = tokens("<48 65 6C6C 6F7>");
        match &parsed[0] {
            Token::String(s) => {
                assert_eq!(s.as_bytes(), b"Hellop");
                assert_eq!(s.mode(), StringMode::Hex);
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_delimiters_and_comments() {
        assert_eq!(
            tokens("<< /K [1 0 R] >> % comment\n true"),
            vec![
                Token::DictStart,
                Token::Name(Name::from("K")),
                Token::ArrayStart,
                Token::Integer(1),
                Token::Integer(0),
                Token::Keyword(b"R".to_vec()),
                Token::ArrayEnd,
                Token::DictEnd,
                Token::Keyword(b"true".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_offset() {
        let mut lexer = Lexer::new(b"  (abc", 0);
        match lexer.next_token() {
            Err(Error::Syntax { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_find_helpers() {
        assert_eq!(find_from(b"abcabc", 1, b"abc"), Some(3));
        assert_eq!(rfind(b"abcabc", b"abc"), Some(3));
        assert_eq!(rfind(b"ab", b"abc"), None);
    }
}
