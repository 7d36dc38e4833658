//! XML pull reader events

use indexmap::IndexMap;

/// Events emitted by the XML reader
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Start tag; `empty` is set for `<name />`, which has no matching `End`
    Start {
        name: String,
        attributes: IndexMap<String, String>,
        empty: bool,
    },
    /// End tag
    End { name: String },
    /// Decoded character data, possibly whitespace only
    Text(String),
    /// Contents of a `<![CDATA[...]]>` section
    CData(String),
    /// Contents of a `<!--...-->` comment
    Comment(String),
}

impl Event {
    /// True for text consisting solely of XML whitespace
    pub fn is_whitespace(&self) -> bool {
        match self {
            Self::Text(text) => text.chars().all(is_xml_whitespace),
            _ => false,
        }
    }
}

pub(crate) fn is_xml_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

/// Local part of a possibly prefixed name
pub fn local_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

/// Namespace prefix of a name, if any
pub fn prefix(name: &str) -> Option<&str> {
    name.split_once(':')
        .map(|(prefix, _)| prefix)
        .filter(|prefix| !prefix.is_empty())
}
