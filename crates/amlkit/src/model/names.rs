//! Well-known AML attribute and property names

/// Attribute names with special meaning to the server or this crate
#[derive(Debug)]
pub struct AttributeName;

impl AttributeName {
    pub const ACTION: &'static str = "action";
    pub const CONDITION: &'static str = "condition";
    pub const ID: &'static str = "id";
    pub const IDLIST: &'static str = "idlist";
    pub const IS_NULL: &'static str = "is_null";
    pub const KEYED_NAME: &'static str = "keyed_name";
    pub const NEUTRAL_VALUE: &'static str = "neutral_value";
    pub const ORIG_DATE_RANGE: &'static str = "origDateRange";
    pub const SELECT: &'static str = "select";
    pub const TYPE: &'static str = "type";
    pub const WHERE: &'static str = "where";
    pub const XML_LANG: &'static str = "xml:lang";
}

/// Property names shared by every item type
#[derive(Debug)]
pub struct PropertyName;

impl PropertyName {
    pub const CONFIG_ID: &'static str = "config_id";
    pub const CREATED_BY_ID: &'static str = "created_by_id";
    pub const CREATED_ON: &'static str = "created_on";
    pub const GENERATION: &'static str = "generation";
    pub const ID: &'static str = "id";
    pub const IS_CURRENT: &'static str = "is_current";
    pub const IS_RELEASED: &'static str = "is_released";
    pub const KEYED_NAME: &'static str = "keyed_name";
    pub const MAJOR_REV: &'static str = "major_rev";
    pub const MODIFIED_ON: &'static str = "modified_on";
    pub const NEW_VERSION: &'static str = "new_version";
    pub const NOT_LOCKABLE: &'static str = "not_lockable";
    pub const STATE: &'static str = "state";
}
