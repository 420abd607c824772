use super::CanonValue;
use std::collections::BTreeMap;

/// Reason a canonical-JSON decode failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    /// Input ended before a complete value was parsed.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A token did not match any expected production at the given byte offset.
    #[error("unexpected byte {found:?} at offset {offset}")]
    UnexpectedByte {
        /// Byte offset into the input where parsing failed.
        offset: usize,
        /// The offending byte, if any remained.
        found: Option<u8>,
    },
    /// A number token could not be parsed as a finite `f64`.
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
    /// A string escape sequence was malformed.
    #[error("invalid string escape: {0}")]
    InvalidEscape(String),
    /// Trailing bytes remained after a complete value was parsed.
    #[error("trailing bytes after value")]
    TrailingBytes,
}

/// Parses canonical JSON bytes into a [`CanonValue`] tree.
///
/// This is a plain recursive-descent parser, not a permissive JSON reader:
/// it accepts exactly the grammar the encoder in this module produces
/// (no whitespace required, but tolerated between tokens for input that
/// was hand-edited or came from another canonical-JSON producer).
pub fn decode(bytes: &[u8]) -> Result<CanonValue, DecodeErrorKind> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DecodeErrorKind::InvalidEscape(e.to_string()))?;
    let mut parser = Parser {
        chars: text.char_indices().peekable(),
        input: text,
    };
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.chars.peek().is_some() {
        return Err(DecodeErrorKind::TrailingBytes);
    }
    Ok(value)
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ' ' || c == '\t' || c == '\n' || c == '\r' {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn expect_byte(&mut self, expected: char) -> Result<(), DecodeErrorKind> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((i, c)) => Err(DecodeErrorKind::UnexpectedByte {
                offset: i,
                found: Some(c as u8),
            }),
            None => Err(DecodeErrorKind::UnexpectedEof),
        }
    }

    fn expect_literal(&mut self, lit: &str) -> Result<(), DecodeErrorKind> {
        for expected in lit.chars() {
            self.expect_byte(expected)?;
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<CanonValue, DecodeErrorKind> {
        self.skip_ws();
        match self.peek_char() {
            None => Err(DecodeErrorKind::UnexpectedEof),
            Some('"') => self.parse_string().map(CanonValue::Str),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('n') => {
                self.expect_literal("null")?;
                Ok(CanonValue::Null)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => {
                let offset = self.offset();
                Err(DecodeErrorKind::UnexpectedByte {
                    offset,
                    found: Some(c as u8),
                })
            }
        }
    }

    fn parse_object(&mut self) -> Result<CanonValue, DecodeErrorKind> {
        self.expect_byte('{')?;
        let mut fields = BTreeMap::new();
        self.skip_ws();
        if self.peek_char() == Some('}') {
            self.chars.next();
            return Ok(CanonValue::Object(fields));
        }
        loop {
            self.skip_ws();
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect_byte(':')?;
            let value = self.parse_value()?;
            fields.insert(key, value);
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, '}')) => break,
                Some((i, c)) => {
                    return Err(DecodeErrorKind::UnexpectedByte {
                        offset: i,
                        found: Some(c as u8),
                    })
                }
                None => return Err(DecodeErrorKind::UnexpectedEof),
            }
        }
        Ok(CanonValue::Object(fields))
    }

    fn parse_array(&mut self) -> Result<CanonValue, DecodeErrorKind> {
        self.expect_byte('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek_char() == Some(']') {
            self.chars.next();
            return Ok(CanonValue::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, ']')) => break,
                Some((i, c)) => {
                    return Err(DecodeErrorKind::UnexpectedByte {
                        offset: i,
                        found: Some(c as u8),
                    })
                }
                None => return Err(DecodeErrorKind::UnexpectedEof),
            }
        }
        Ok(CanonValue::Array(items))
    }

    fn parse_string(&mut self) -> Result<String, DecodeErrorKind> {
        self.expect_byte('"')?;
        let mut s = String::new();
        loop {
            match self.chars.next() {
                None => return Err(DecodeErrorKind::UnexpectedEof),
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, '"')) => s.push('"'),
                    Some((_, '\\')) => s.push('\\'),
                    Some((_, '/')) => s.push('/'),
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'b')) => s.push('\u{0008}'),
                    Some((_, 'f')) => s.push('\u{000c}'),
                    Some((_, 'u')) => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let (_, c) = self
                                .chars
                                .next()
                                .ok_or(DecodeErrorKind::UnexpectedEof)?;
                            let digit = c.to_digit(16).ok_or_else(|| {
                                DecodeErrorKind::InvalidEscape(format!("bad hex digit {c}"))
                            })?;
                            code = code * 16 + digit;
                        }
                        let c = char::from_u32(code).ok_or_else(|| {
                            DecodeErrorKind::InvalidEscape(format!("bad code point {code:x}"))
                        })?;
                        s.push(c);
                    }
                    Some((_, c)) => {
                        return Err(DecodeErrorKind::InvalidEscape(format!("\\{c}")))
                    }
                    None => return Err(DecodeErrorKind::UnexpectedEof),
                },
                Some((_, c)) => s.push(c),
            }
        }
        Ok(s)
    }

    fn parse_number(&mut self) -> Result<CanonValue, DecodeErrorKind> {
        let start = self.offset();
        if self.peek_char() == Some('-') {
            self.chars.next();
        }
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else if c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
                is_float = true;
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.offset();
        let text = &self.input[start..end];
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| DecodeErrorKind::InvalidNumber(text.to_string()))?;
            Ok(CanonValue::plain(value))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| DecodeErrorKind::InvalidNumber(text.to_string()))?;
            Ok(CanonValue::Int(value))
        }
    }
}
