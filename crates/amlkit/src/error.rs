//! Error types for amlkit

use std::fmt;
use thiserror::Error;

/// Position in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.start.line == 0 && self.end.line == 0
    }
}

/// Where a raw (`!`-suffixed) parameter was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawLocation {
    Attribute,
    CData,
}

impl fmt::Display for RawLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => write!(f, "an attribute"),
            Self::CData => write!(f, "a CDATA section"),
        }
    }
}

/// Error kind for detailed categorization
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid token")]
    InvalidToken,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },
    #[error("invalid xml entity: &{entity};")]
    InvalidEntity { entity: String },
    #[error("max depth exceeded: {max}")]
    MaxDepthExceeded { max: u16 },
    #[error("max size exceeded: {max}")]
    MaxSizeExceeded { max: usize },

    #[error("invalid operation")]
    InvalidOperation,
    #[error("raw parameter not allowed in {location}")]
    RawParameterNotAllowed { location: RawLocation },
    #[error("unsupported namespace prefix: {prefix}")]
    UnsupportedPrefix { prefix: String },

    #[error("value cannot be converted to {target}")]
    InvalidValue { target: &'static str },
    #[error("invalid date range")]
    InvalidDateRange,

    #[error("server error (fault code {fault_code})")]
    Server { fault_code: String },
    #[error("no items of type {item_type} found")]
    NoItemsFound { item_type: String },
    #[error("multiple items were found when only one was expected")]
    MultipleItems,
    #[error("an item of type '{found}' was found while an item of type '{expected}' was expected")]
    TypeMismatch { expected: String, found: String },
    #[error("validation failed")]
    Validation {
        item_type: Option<String>,
        item_id: Option<String>,
        properties: Vec<String>,
    },
}

/// Database and query an error was raised for
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub database: Option<String>,
    pub query: Option<String>,
}

/// Main error type for amlkit
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
    details: Option<ErrorDetails>,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
            details: None,
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            details: None,
        }
    }

    /// Error for a mutation that the node does not allow
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::InvalidOperation, Span::empty(), message)
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, offset: usize, line: u32, col: u32) -> Self {
        let pos = Pos::new(offset, line, col);
        Self::new(kind, Span::new(pos, pos))
    }

    /// Attach the database and query the failing request was sent with
    pub fn with_details(mut self, database: Option<&str>, query: Option<&str>) -> Self {
        if database.is_some() || query.is_some() {
            self.details = Some(ErrorDetails {
                database: database.map(str::to_string),
                query: query.map(str::to_string),
            });
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        self.details.as_ref()
    }

    /// True for the "no items found" kind, which callers often tolerate
    pub fn is_no_items_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NoItemsFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "error at {}: {}", self.span.start, self.message)?;
        }
        if let Some(database) = self.details.as_ref().and_then(|d| d.database.as_deref()) {
            write!(f, " (database: {database})")?;
        }
        Ok(())
    }
}

/// Result type alias for amlkit
pub type Result<T> = std::result::Result<T, Error>;
