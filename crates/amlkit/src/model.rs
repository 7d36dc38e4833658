//! AML document model
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`] handles. Lookups by name return a [`Lookup`] so that chains such
//! as `doc.property(item, "x").as_int()` stay total for absent properties.

mod document;
mod names;
mod property;
mod serialize;

pub use document::{Content, Document, Lookup, NodeId, NodeKind};
pub use names::{AttributeName, PropertyName};
pub use property::{DefaultProperty, ItemReference, PropertyRef};
