//! Flat-SQL parameter scanning

use crate::context::ServerContext;
use crate::subst::render::is_parameter_char;
use crate::value::Value;

/// Formats values for embedding in SQL literals
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SqlFormatter {
    context: ServerContext,
}

impl SqlFormatter {
    pub fn new(context: ServerContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Formatted text with single quotes doubled
    pub fn format(&self, value: &Value) -> String {
        self.context.format(value).replace('\'', "''")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Normal,
    /// Inside a literal or bracketed identifier closed by the char
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Copy `sql` to a new string, handing every `@name` token outside of
/// literals and comments to `on_parameter`, which appends its replacement.
pub fn scan_parameters<F>(sql: &str, mut on_parameter: F) -> String
where
    F: FnMut(&str, &mut String),
{
    let mut out = String::with_capacity(sql.len());
    let mut state = ScanState::Normal;
    let mut chars = sql.char_indices().peekable();
    let mut last = 0;

    while let Some((index, ch)) = chars.next() {
        let next = chars.peek().map(|(_, c)| *c);
        match state {
            ScanState::Normal => match ch {
                '\'' => state = ScanState::Quoted('\''),
                '"' => state = ScanState::Quoted('"'),
                '[' => state = ScanState::Quoted(']'),
                '-' if next == Some('-') => {
                    chars.next();
                    state = ScanState::LineComment;
                }
                '/' if next == Some('*') => {
                    chars.next();
                    state = ScanState::BlockComment;
                }
                '@' => {
                    out.push_str(sql.get(last..index).unwrap_or_default());
                    let start = index + 1;
                    let mut end = start;
                    while let Some(&(position, c)) = chars.peek() {
                        if !is_parameter_char(c) {
                            break;
                        }
                        end = position + c.len_utf8();
                        chars.next();
                    }
                    on_parameter(sql.get(start..end).unwrap_or_default(), &mut out);
                    last = end;
                }
                _ => {}
            },
            ScanState::Quoted(close) => {
                if ch == close {
                    state = ScanState::Normal;
                }
            }
            ScanState::LineComment => {
                if ch == '\n' || ch == '\r' {
                    state = ScanState::Normal;
                }
            }
            ScanState::BlockComment => {
                if ch == '*' && next == Some('/') {
                    chars.next();
                    state = ScanState::Normal;
                }
            }
        }
    }

    out.push_str(sql.get(last..).unwrap_or_default());
    out
}

/// Whether the text written so far ends an `in` keyword, and whether the
/// list parenthesis is already open
pub(crate) fn in_clause_tail(out: &str) -> Option<bool> {
    let tail_len = out.len().min(5);
    let tail = out.get(out.len() - tail_len..).unwrap_or_default();
    if tail.eq_ignore_ascii_case(" in (") {
        return Some(true);
    }
    let tail = tail.get(tail.len().saturating_sub(4)..).unwrap_or_default();
    if tail.eq_ignore_ascii_case(" in ") {
        return Some(false);
    }
    None
}
