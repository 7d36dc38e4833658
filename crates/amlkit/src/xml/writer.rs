//! Streaming XML writer

use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

/// Writes XML into any [`fmt::Write`] sink.
///
/// The start tag of the most recent element stays open until content or a
/// child is written, so attributes can still be appended after
/// [`Writer::start_element`] returned.
#[derive(Debug)]
pub struct Writer<W: fmt::Write> {
    out: W,
    open: Vec<String>,
    start_open: bool,
}

impl<W: fmt::Write> Writer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            open: Vec::new(),
            start_open: false,
        }
    }

    /// True while attributes may still be written to the current element
    pub fn is_start_open(&self) -> bool {
        self.start_open
    }

    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.close_start()?;
        self.put("<")?;
        self.put(name)?;
        self.open.push(name.to_string());
        self.start_open = true;
        Ok(())
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.start_open {
            return Err(Error::invalid_operation(format!(
                "cannot write attribute {name} after element content"
            )));
        }
        self.put(" ")?;
        self.put(name)?;
        self.put("=\"")?;
        self.put(&escape_attribute(value))?;
        self.put("\"")
    }

    /// Escaped character data; empty text leaves the start tag open
    pub fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.close_start()?;
        self.put(&escape_text(text))
    }

    /// Unescaped markup
    pub fn raw(&mut self, markup: &str) -> Result<()> {
        if markup.is_empty() {
            return Ok(());
        }
        self.close_start()?;
        self.put(markup)
    }

    pub fn cdata(&mut self, text: &str) -> Result<()> {
        self.close_start()?;
        self.put("<![CDATA[")?;
        self.put(&text.replace("]]>", "]]]]><![CDATA[>"))?;
        self.put("]]>")
    }

    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.close_start()?;
        self.put("<!--")?;
        self.put(text)?;
        self.put("-->")
    }

    /// Close the innermost element, using `<name />` when it has no content
    pub fn end_element(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| Error::invalid_operation("no open element to close"))?;
        if self.start_open {
            self.start_open = false;
            self.put(" />")
        } else {
            self.put("</")?;
            self.put(&name)?;
            self.put(">")
        }
    }

    /// Close every open element and return the sink
    pub fn finish(mut self) -> Result<W> {
        while !self.open.is_empty() {
            self.end_element()?;
        }
        Ok(self.out)
    }

    fn close_start(&mut self) -> Result<()> {
        if self.start_open {
            self.start_open = false;
            self.put(">")?;
        }
        Ok(())
    }

    fn put(&mut self, s: &str) -> Result<()> {
        self.out
            .write_str(s)
            .map_err(|_| Error::invalid_operation("failed to write XML output"))
    }
}

/// Escape character data
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Escape a double-quoted attribute value
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\n', '\r', '\t']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
