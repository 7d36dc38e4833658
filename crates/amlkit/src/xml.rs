//! XML reader and writer used by the document model and substitution engine

pub mod cursor;
pub mod event;
pub mod reader;
pub mod writer;

pub(crate) use event::is_xml_whitespace;
pub use event::{local_name, prefix, Event};
pub use reader::{decode_entities, Reader};
pub use writer::{escape_attribute, escape_text, Writer};
