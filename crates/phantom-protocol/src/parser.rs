//! Recursive-descent parser for the parameter language.
//!
//! # Grammar
//!
//! ```text
//! value       = ws (tagged_list | string | hex | resolution | unsigned | signed | name) ws
//! unsigned    = digit+
//! signed      = '-' digit+
//! hex         = "0x" hexdigit+
//! string      = '"' (not '"')* '"'
//! resolution  = unsigned ws 'x' ws unsigned
//! name        = identifier ('.' identifier)*
//! identifier  = alpha (alnum | '_')*
//! tagged_list = '{' ws [entry (',' entry)*] ws '}'
//! entry       = ws name ws ':' value
//! ```
//!
//! A scalar is only accepted when it is followed by whitespace, `,`, `}` or the
//! end of input, so `12abc` is an error rather than `12` followed by garbage.
//! `0x` followed by a hex digit always reads as a hex literal; a resolution with
//! zero width must be written with spaces (`0 x 480`).
//!
//! # Example
//!
//! ```
//! use phantom_core::Resolution;
//! use phantom_protocol::{Value, parse};
//!
//! let value = parse("{ cine: -1, res:1920 x 1080, fmt:272}").unwrap();
//! let list = value.as_list().unwrap();
//!
//! assert_eq!(list.get("cine"), Some(&Value::SignedInt(-1)));
//! assert_eq!(list.get("res"), Some(&Value::Resolution(Resolution::new(1920, 1080))));
//! assert_eq!(list.get("fmt"), Some(&Value::UnsignedInt(272)));
//! ```

use crate::value::{DottedName, TaggedList, Value};
use phantom_core::{Error, Resolution, Result};

/// Deepest tagged-list nesting accepted before the input is rejected.
const MAX_DEPTH: usize = 32;

/// Parse one complete value from `text`.
///
/// # Errors
/// Returns `Error::ProtocolSyntax` naming the unparsed fragment when `text` is
/// not exactly one well-formed value surrounded by optional whitespace.
pub fn parse(text: &str) -> Result<Value> {
    let mut parser = Parser::new(text);
    let value = parser.value(0)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Parse `text` and require the result to be a tagged list.
///
/// # Errors
/// Returns `Error::ProtocolSyntax` if `text` does not parse or is not a list.
pub fn parse_tagged_list(text: &str) -> Result<TaggedList> {
    match parse(text)? {
        Value::List(list) => Ok(list),
        _ => Err(Error::syntax("expected a tagged list", text.trim())),
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::syntax(message, &self.input[self.pos..])
    }

    fn error_at(&self, start: usize, message: &str) -> Error {
        Error::syntax(message, &self.input[start..])
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        self.skip_ws();
        let value = match self.peek() {
            Some(b'{') => Value::List(self.tagged_list(depth)?),
            Some(b'"') => Value::QuotedString(self.string()?),
            Some(b'0') if self.at_hex_prefix() => Value::HexInt(self.hex()?),
            Some(b) if b.is_ascii_digit() => self.resolution_or_unsigned()?,
            Some(b'-') => Value::SignedInt(self.signed()?),
            Some(b) if b.is_ascii_alphabetic() => Value::Name(self.name()?),
            Some(_) => return Err(self.error("unexpected character")),
            None => return Err(self.error("expected a value")),
        };
        self.expect_delimiter()?;
        Ok(value)
    }

    fn expect_delimiter(&self) -> Result<()> {
        match self.peek() {
            None | Some(b',' | b'}') => Ok(()),
            Some(b) if b.is_ascii_whitespace() => Ok(()),
            Some(_) => Err(self.error("unexpected character after value")),
        }
    }

    fn at_hex_prefix(&self) -> bool {
        matches!(self.peek_at(1), Some(b'x' | b'X'))
            && self.peek_at(2).is_some_and(|b| b.is_ascii_hexdigit())
    }

    fn digits(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn hex(&mut self) -> Result<u64> {
        let start = self.pos;
        self.pos += 2;
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        u64::from_str_radix(&self.input[digits_start..self.pos], 16)
            .map_err(|_| self.error_at(start, "hex literal out of range"))
    }

    fn resolution_or_unsigned(&mut self) -> Result<Value> {
        let start = self.pos;
        let width = self.digits();
        let after_width = self.pos;

        self.skip_ws();
        if self.peek() == Some(b'x') {
            self.pos += 1;
            self.skip_ws();
            if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                let height = self.digits();
                let width = width
                    .parse()
                    .map_err(|_| self.error_at(start, "resolution width out of range"))?;
                let height = height
                    .parse()
                    .map_err(|_| self.error_at(start, "resolution height out of range"))?;
                return Ok(Value::Resolution(Resolution::new(width, height)));
            }
        }

        self.pos = after_width;
        width
            .parse()
            .map(Value::UnsignedInt)
            .map_err(|_| self.error_at(start, "integer out of range"))
    }

    fn signed(&mut self) -> Result<i64> {
        let start = self.pos;
        self.pos += 1;
        if self.digits().is_empty() {
            return Err(self.error_at(start, "expected digits after '-'"));
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| self.error_at(start, "integer out of range"))
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        match self.input[self.pos..].find('"') {
            Some(len) => {
                let body = &self.input[self.pos..self.pos + len];
                self.pos += len + 1;
                Ok(body.to_string())
            }
            None => Err(self.error_at(start, "unterminated string")),
        }
    }

    fn identifier(&mut self) -> bool {
        if !self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            return false;
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        true
    }

    fn name(&mut self) -> Result<DottedName> {
        let start = self.pos;
        if !self.identifier() {
            return Err(self.error("expected a name"));
        }
        while self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
            self.identifier();
        }
        Ok(DottedName::new(&self.input[start..self.pos]))
    }

    fn tagged_list(&mut self, depth: usize) -> Result<TaggedList> {
        if depth >= MAX_DEPTH {
            return Err(self.error("tagged lists nested too deeply"));
        }
        let start = self.pos;
        self.pos += 1;
        let mut list = TaggedList::new();

        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(list);
        }

        loop {
            self.skip_ws();
            let key = self.name()?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':' after name"));
            }
            self.pos += 1;

            let value = self.value(depth + 1)?;
            list.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(list);
                }
                None => return Err(self.error_at(start, "unterminated tagged list")),
                Some(_) => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}
