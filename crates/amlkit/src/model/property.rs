//! Typed read access to item properties

use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use crate::context::{is_guid, strip_prefix_ignore_case, VAULT_PICTURE_PREFIX};
use crate::error::Result;
use crate::model::document::{Document, Lookup, NodeId, NodeKind};
use crate::model::names::{AttributeName, PropertyName};
use crate::value::Value;

/// Schema defaults answered by items loaded from the server when the
/// property itself was not returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultProperty {
    Generation,
    IsCurrent,
    IsReleased,
    MajorRev,
    NewVersion,
    NotLockable,
}

impl DefaultProperty {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            PropertyName::GENERATION => Some(Self::Generation),
            PropertyName::IS_CURRENT => Some(Self::IsCurrent),
            PropertyName::IS_RELEASED => Some(Self::IsReleased),
            PropertyName::MAJOR_REV => Some(Self::MajorRev),
            PropertyName::NEW_VERSION => Some(Self::NewVersion),
            PropertyName::NOT_LOCKABLE => Some(Self::NotLockable),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generation => PropertyName::GENERATION,
            Self::IsCurrent => PropertyName::IS_CURRENT,
            Self::IsReleased => PropertyName::IS_RELEASED,
            Self::MajorRev => PropertyName::MAJOR_REV,
            Self::NewVersion => PropertyName::NEW_VERSION,
            Self::NotLockable => PropertyName::NOT_LOCKABLE,
        }
    }

    pub const fn value(self) -> &'static str {
        match self {
            Self::Generation | Self::IsCurrent => "1",
            Self::IsReleased | Self::NewVersion | Self::NotLockable => "0",
            Self::MajorRev => "A",
        }
    }
}

/// Target of a foreign-key property
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemReference {
    pub type_name: String,
    pub id: String,
    pub keyed_name: Option<String>,
}

/// Read view of a property that may be absent.
///
/// Every accessor returns `None` (or the supplied default) for absent
/// properties and for properties flagged `is_null`.
#[derive(Clone, Copy, Debug)]
pub struct PropertyRef<'a> {
    doc: &'a Document,
    lookup: Lookup,
    default: Option<DefaultProperty>,
}

impl Document {
    /// Look up a property of an item
    pub fn property(&self, item: NodeId, name: &str) -> PropertyRef<'_> {
        let lookup = self.element(item, name);
        let default = match lookup {
            Lookup::Absent if self.is_from_data_store(item) => DefaultProperty::from_name(name),
            _ => None,
        };
        PropertyRef {
            doc: self,
            lookup,
            default,
        }
    }
}

impl<'a> PropertyRef<'a> {
    pub fn lookup(&self) -> Lookup {
        self.lookup
    }

    pub fn node(&self) -> Option<NodeId> {
        self.lookup.node()
    }

    /// True if the property is present or answered by a schema default
    pub fn exists(&self) -> bool {
        self.lookup.exists() || self.default.is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.node().and_then(|id| self.doc.attribute(id, name))
    }

    pub fn is_null(&self) -> bool {
        match self.lookup {
            Lookup::Found(id) => self
                .doc
                .attribute(id, AttributeName::IS_NULL)
                .is_some_and(|flag| matches!(flag, "1" | "true")),
            Lookup::Absent => self.default.is_none(),
        }
    }

    /// The value typed accessors read from: null when `is_null` is set,
    /// the `neutral_value` attribute when present, the raw content otherwise
    pub fn neutral_value(&self) -> Value {
        match self.lookup {
            Lookup::Found(id) => {
                if self.is_null() {
                    return Value::Null;
                }
                match self.doc.attribute(id, AttributeName::NEUTRAL_VALUE) {
                    Some(neutral) if !neutral.is_empty() => Value::from(neutral),
                    _ => self.doc.content(id).clone(),
                }
            }
            Lookup::Absent => self
                .default
                .map_or(Value::Null, |default| Value::from(default.value())),
        }
    }

    /// Content formatted as text
    pub fn value(&self) -> Option<String> {
        match self.lookup {
            Lookup::Found(id) => self.doc.value(id),
            Lookup::Absent => self.default.map(|default| default.value().to_string()),
        }
    }

    pub fn as_string(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        self.value()
    }

    pub fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|| default.to_string())
    }

    pub fn as_boolean(&self) -> Result<Option<bool>> {
        self.doc.context().as_boolean(&self.neutral_value())
    }

    pub fn as_boolean_or(&self, default: bool) -> Result<bool> {
        Ok(self.as_boolean()?.unwrap_or(default))
    }

    pub fn as_int(&self) -> Result<Option<i32>> {
        self.doc.context().as_int(&self.neutral_value())
    }

    pub fn as_int_or(&self, default: i32) -> Result<i32> {
        Ok(self.as_int()?.unwrap_or(default))
    }

    pub fn as_long(&self) -> Result<Option<i64>> {
        self.doc.context().as_long(&self.neutral_value())
    }

    pub fn as_long_or(&self, default: i64) -> Result<i64> {
        Ok(self.as_long()?.unwrap_or(default))
    }

    pub fn as_double(&self) -> Result<Option<f64>> {
        self.doc.context().as_double(&self.neutral_value())
    }

    pub fn as_double_or(&self, default: f64) -> Result<f64> {
        Ok(self.as_double()?.unwrap_or(default))
    }

    /// Date in the client's local zone
    pub fn as_date_time(&self) -> Result<Option<PrimitiveDateTime>> {
        self.doc.context().as_date_time(&self.neutral_value())
    }

    pub fn as_date_time_utc(&self) -> Result<Option<PrimitiveDateTime>> {
        self.doc.context().as_date_time_utc(&self.neutral_value())
    }

    pub fn as_date_time_offset(&self) -> Result<Option<OffsetDateTime>> {
        self.doc.context().as_date_time_offset(&self.neutral_value())
    }

    /// GUID from the raw content; vault picture links yield the file id
    pub fn as_guid(&self) -> Result<Option<Uuid>> {
        match self.lookup {
            Lookup::Found(id) => self.doc.context().as_guid(self.doc.content(id)),
            Lookup::Absent => Ok(None),
        }
    }

    /// Target of a foreign-key property.
    ///
    /// Reads a nested item, the `type`/`keyed_name` shorthand with an id as
    /// content, or a `vault:///?fileId=` link to a `File`.
    pub fn item_reference(&self) -> Option<ItemReference> {
        let id = self.node()?;
        let doc = self.doc;

        if let Some(item) = doc
            .children(id)
            .iter()
            .copied()
            .find(|child| doc.kind(*child) == Some(NodeKind::Item))
        {
            return Some(ItemReference {
                type_name: doc.type_name(item)?.to_string(),
                id: doc.item_id(item)?,
                keyed_name: doc.keyed_name(item),
            });
        }

        let content = doc.value(id)?;
        if let Some(type_name) = doc.attribute(id, AttributeName::TYPE) {
            if is_guid(&content) {
                return Some(ItemReference {
                    type_name: type_name.to_string(),
                    id: content,
                    keyed_name: doc
                        .attribute(id, AttributeName::KEYED_NAME)
                        .map(str::to_string),
                });
            }
        }

        strip_prefix_ignore_case(&content, VAULT_PICTURE_PREFIX).map(|file_id| ItemReference {
            type_name: "File".to_string(),
            id: file_id.to_string(),
            keyed_name: None,
        })
    }
}
