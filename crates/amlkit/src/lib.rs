//! amlkit - AML request building, injection-safe parameter substitution
//! and response handling for PLM servers
//!
//! # Quick Start
//!
//! ```
//! use amlkit::{Command, ServerContext};
//! # fn main() -> amlkit::Result<()> {
//! let mut cmd = Command::new("<Item type='Part' action='get'><keyed_name condition='like'>@0</keyed_name></Item>")
//!     .with_args(["O'Brien*"]);
//! let aml = cmd.to_normalized_aml(&ServerContext::default())?;
//! assert_eq!(
//!     aml,
//!     r#"<Item type="Part" action="get"><keyed_name condition="like">O'Brien*</keyed_name></Item>"#
//! );
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorDetails, ErrorKind, Pos, RawLocation, Result, Span};

pub mod config;
pub use config::{AmlWriterSettings, ReaderConfig};

pub mod value;
pub use value::Value;

pub mod date_range;
pub use date_range::{Condition, DateMagnitude, DynamicDateRange, StaticDateRange};

pub mod context;
pub use context::ServerContext;

pub mod xml;

pub mod model;
pub use model::{
    AttributeName, Content, Document, ItemReference, Lookup, NodeId, NodeKind, PropertyName,
    PropertyRef,
};

pub mod subst;
pub use subst::{Mode, ParameterStyle, ParameterSubstitution, RenderContext};

pub mod command;
pub use command::{Command, CommandAction};

pub mod result;
pub use result::AmlResult;

pub mod transport;
pub use transport::{execute, Transport};
