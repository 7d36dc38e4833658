//! Streaming XML reader

use indexmap::IndexMap;

use crate::config::ReaderConfig;
use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::xml::cursor::Cursor;
use crate::xml::event::{is_xml_whitespace, Event};

/// Pull reader over an XML fragment.
///
/// Declarations, processing instructions and DOCTYPE are skipped. Several
/// top-level elements are accepted so that AML fragments can be read without
/// a wrapper.
#[derive(Debug)]
pub struct Reader<'a> {
    cursor: Cursor<'a>,
    config: ReaderConfig,
    open: Vec<String>,
    size_checked: bool,
}

impl<'a> Reader<'a> {
    /// Create a reader with the default limits
    pub fn new(input: &'a str) -> Self {
        Self::with_config(input, ReaderConfig::default())
    }

    /// Create a reader with custom limits
    pub fn with_config(input: &'a str, config: ReaderConfig) -> Self {
        Self {
            cursor: Cursor::new(input.as_bytes()),
            config,
            open: Vec::new(),
            size_checked: false,
        }
    }

    /// Current position in the input
    pub fn position(&self) -> Pos {
        self.cursor.position()
    }

    /// Read the next event, or `None` at the end of the input
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if !self.size_checked {
            self.size_checked = true;
            let size = self.cursor.remaining().len();
            if self.config.max_size > 0 && size > self.config.max_size {
                return Err(Error::new(
                    ErrorKind::MaxSizeExceeded {
                        max: self.config.max_size,
                    },
                    Span::empty(),
                ));
            }
        }

        loop {
            if self.cursor.is_eof() {
                if let Some(name) = self.open.last() {
                    return Err(self.error_here(
                        ErrorKind::UnexpectedEof,
                        format!("unterminated element <{name}>"),
                    ));
                }
                return Ok(None);
            }

            if self.cursor.current() != Some(b'<') {
                let text = self.read_text()?;
                if self.open.is_empty() {
                    if text.chars().all(is_xml_whitespace) {
                        continue;
                    }
                    return Err(self.error_here(
                        ErrorKind::InvalidToken,
                        "text outside of the root element",
                    ));
                }
                return Ok(Some(Event::Text(text)));
            }

            if self.cursor.starts_with(b"<!--") {
                self.cursor.advance_by(4);
                let body = self.read_until(b"-->")?;
                return Ok(Some(Event::Comment(body)));
            }

            if self.cursor.starts_with(b"<![CDATA[") {
                self.cursor.advance_by(9);
                let body = self.read_until(b"]]>")?;
                return Ok(Some(Event::CData(body)));
            }

            if self.cursor.starts_with(b"<!") || self.cursor.starts_with(b"<?") {
                self.skip_markup()?;
                continue;
            }

            if self.cursor.starts_with(b"</") {
                return self.read_end_tag().map(Some);
            }

            return self.read_start_tag().map(Some);
        }
    }

    fn read_start_tag(&mut self) -> Result<Event> {
        self.cursor.advance();
        let name = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.cursor.consume(b'/') {
            self.expect_byte(b'>')?;
            return Ok(Event::Start {
                name,
                attributes,
                empty: true,
            });
        }
        self.expect_byte(b'>')?;

        if self.config.max_depth > 0 && self.open.len() >= usize::from(self.config.max_depth) {
            return Err(Error::new(
                ErrorKind::MaxDepthExceeded {
                    max: self.config.max_depth,
                },
                self.span_here(),
            ));
        }
        self.open.push(name.clone());
        Ok(Event::Start {
            name,
            attributes,
            empty: false,
        })
    }

    fn read_end_tag(&mut self) -> Result<Event> {
        self.cursor.advance_by(2);
        let name = self.parse_name()?;
        self.cursor.skip_whitespace();
        self.expect_byte(b'>')?;

        match self.open.pop() {
            Some(expected) if expected == name => Ok(Event::End { name }),
            Some(expected) => Err(Error::new(
                ErrorKind::MismatchedTag {
                    expected,
                    found: name,
                },
                self.span_here(),
            )),
            None => Err(self.error_here(ErrorKind::InvalidToken, "unexpected closing tag")),
        }
    }

    fn parse_attributes(&mut self) -> Result<IndexMap<String, String>> {
        let mut attrs = IndexMap::new();

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/') | Some(b'>') => break,
                Some(_) => {}
                None => return Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated tag")),
            }

            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attrs.contains_key(&name) {
                return Err(self.error_here(
                    ErrorKind::InvalidToken,
                    format!("duplicate attribute {name}"),
                ));
            }
            attrs.insert(name, value);
        }

        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => {
                return Err(
                    self.error_here(ErrorKind::InvalidToken, "expected quoted attribute value")
                )
            }
        };
        self.cursor.advance();

        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                let text = self.bytes_to_string(raw)?;
                return self.decode(&text);
            }
            self.cursor.advance();
        }

        Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated attribute value"))
    }

    fn read_text(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = self.bytes_to_string(raw)?;
        self.decode(&text)
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.cursor.pos();

        match self.cursor.current() {
            Some(first) if is_name_start(first) => self.cursor.advance(),
            Some(_) => return Err(self.error_here(ErrorKind::InvalidToken, "expected name")),
            None => return Err(self.error_here(ErrorKind::UnexpectedEof, "expected name")),
        }
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        let raw = self.cursor.slice_from(start);
        self.bytes_to_string(raw)
    }

    fn read_until(&mut self, pattern: &[u8]) -> Result<String> {
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance_by(pattern.len());
                return self.bytes_to_string(raw);
            }
            self.cursor.advance();
        }
        Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated markup"))
    }

    fn skip_markup(&mut self) -> Result<()> {
        let end: &[u8] = if self.cursor.starts_with(b"<?") { b"?>" } else { b">" };
        self.read_until(end).map(|_| ())
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else if self.cursor.is_eof() {
            Err(self.error_here(ErrorKind::UnexpectedEof, "unexpected end of input"))
        } else {
            Err(self.error_here(ErrorKind::InvalidToken, "unexpected token"))
        }
    }

    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| self.error_here(ErrorKind::InvalidToken, "invalid utf-8"))
    }

    fn decode(&self, text: &str) -> Result<String> {
        decode_entities(text).map_err(|err| Error::new(err.kind().clone(), self.span_here()))
    }

    fn span_here(&self) -> Span {
        let pos = self.cursor.position();
        Span::new(pos, pos)
    }

    fn error_here(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        Error::with_message(kind, self.span_here(), message)
    }
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

/// Replace predefined and numeric character references
pub fn decode_entities(input: &str) -> Result<String> {
    if !input.contains('&') {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }

        let mut entity = String::new();
        for next in chars.by_ref() {
            if next == ';' {
                break;
            }
            entity.push(next);
        }

        let decoded = match entity.as_str() {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(&entity),
        };

        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidEntity { entity },
                    Span::empty(),
                ));
            }
        }
    }

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        None
    }
}
