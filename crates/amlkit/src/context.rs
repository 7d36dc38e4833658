//! Server localization context
//!
//! Every value written into AML goes through [`ServerContext::format`], and
//! every typed read of a property goes through one of the `as_*` parsers.
//! Dates are written in the server's zone and read back into the client's
//! local zone.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::warn;
use uuid::Uuid;

use crate::date_range::{Condition, DynamicDateRange};
use crate::error::{Error, ErrorKind, Result, Span};
use crate::value::Value;

const AML_DATETIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const AML_DATETIME_FRACTION: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
const SPACED_DATETIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const AML_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Prefix of property values that point at a vault file
pub const VAULT_PICTURE_PREFIX: &str = "vault:///?fileId=";

/// Locale and time zone information used when formatting and parsing values
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerContext {
    language_code: String,
    locale: String,
    time_zone: UtcOffset,
    local_offset: UtcOffset,
    fixed_now: Option<PrimitiveDateTime>,
}

impl Default for ServerContext {
    fn default() -> Self {
        Self {
            language_code: "en".to_string(),
            locale: "en-US".to_string(),
            time_zone: UtcOffset::UTC,
            local_offset: UtcOffset::UTC,
            fixed_now: None,
        }
    }
}

impl ServerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language_code(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Offset of the server's time zone
    pub fn with_time_zone(mut self, offset: UtcOffset) -> Self {
        self.time_zone = offset;
        self
    }

    /// Offset of the client's local time zone
    pub fn with_local_offset(mut self, offset: UtcOffset) -> Self {
        self.local_offset = offset;
        self
    }

    /// Pin "now" (in the local zone) for evaluating dynamic date ranges
    pub fn with_fixed_clock(mut self, now: PrimitiveDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn time_zone(&self) -> UtcOffset {
        self.time_zone
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.local_offset
    }

    /// Current local time
    pub fn now(&self) -> PrimitiveDateTime {
        self.fixed_now.unwrap_or_else(|| {
            let now = OffsetDateTime::now_utc();
            let local = now.checked_to_offset(self.local_offset).unwrap_or(now);
            PrimitiveDateTime::new(local.date(), local.time())
        })
    }

    /// Render a value as AML text
    pub fn format(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => self.format_local(*dt),
            Value::DateTimeOffset(dt) => self.format_offset(*dt),
            Value::Guid(id) => format_guid(id),
            Value::List(items) => items
                .iter()
                .map(|item| self.format(item))
                .collect::<Vec<_>>()
                .join(","),
            Value::DynamicRange(range) => self.format_dynamic_range(range),
            Value::StaticRange(range) => self.format_bounds(range.start, range.end),
        }
    }

    /// AML text of a condition (empty for [`Condition::Undefined`])
    pub fn format_condition(&self, condition: Condition) -> &'static str {
        condition.as_aml().unwrap_or_default()
    }

    fn format_local(&self, value: PrimitiveDateTime) -> String {
        self.format_offset(value.assume_offset(self.local_offset))
    }

    fn format_offset(&self, value: OffsetDateTime) -> String {
        let server = value.checked_to_offset(self.time_zone).unwrap_or(value);
        PrimitiveDateTime::new(server.date(), server.time())
            .format(AML_DATETIME)
            .unwrap_or_default()
    }

    fn format_dynamic_range(&self, range: &DynamicDateRange) -> String {
        match range.evaluate(self.now()) {
            Ok((start, end)) => self.format_bounds(start, end),
            Err(err) => {
                warn!(range = %range.serialize(), error = %err, "date range cannot be evaluated");
                range.serialize()
            }
        }
    }

    fn format_bounds(
        &self,
        start: Option<PrimitiveDateTime>,
        end: Option<PrimitiveDateTime>,
    ) -> String {
        match (start, end) {
            (Some(start), Some(end)) => {
                format!("{} and {}", self.format_local(start), self.format_local(end))
            }
            (Some(bound), None) | (None, Some(bound)) => self.format_local(bound),
            (None, None) => String::new(),
        }
    }

    /// Interpret a value as a boolean (`1`/`0`/`true`/`false`)
    pub fn as_boolean(&self, value: &Value) -> Result<Option<bool>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Int(n) => Ok(Some(*n != 0)),
            Value::String(s) => match s.trim() {
                "" => Ok(None),
                "1" => Ok(Some(true)),
                "0" => Ok(Some(false)),
                other if other.eq_ignore_ascii_case("true") => Ok(Some(true)),
                other if other.eq_ignore_ascii_case("false") => Ok(Some(false)),
                _ => Err(invalid("boolean")),
            },
            _ => Err(invalid("boolean")),
        }
    }

    pub fn as_int(&self, value: &Value) -> Result<Option<i32>> {
        self.as_long(value)?
            .map(|n| i32::try_from(n).map_err(|_| invalid("int")))
            .transpose()
    }

    pub fn as_long(&self, value: &Value) -> Result<Option<i64>> {
        match value {
            Value::Null => Ok(None),
            Value::Int(n) => Ok(Some(*n)),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            Value::Float(f) if f.fract() == 0.0 => format!("{f:.0}")
                .parse()
                .map(Some)
                .map_err(|_| invalid("long")),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s.trim().parse().map(Some).map_err(|_| invalid("long")),
            _ => Err(invalid("long")),
        }
    }

    pub fn as_double(&self, value: &Value) -> Result<Option<f64>> {
        match value {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Int(n) => Ok(Some(n.to_string().parse().map_err(|_| invalid("double"))?)),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s.trim().parse().map(Some).map_err(|_| invalid("double")),
            _ => Err(invalid("double")),
        }
    }

    /// Interpret a value as a date in the server zone and return it with an offset
    pub fn as_date_time_offset(&self, value: &Value) -> Result<Option<OffsetDateTime>> {
        match value {
            Value::Null => Ok(None),
            Value::DateTime(dt) => Ok(Some(dt.assume_offset(self.local_offset))),
            Value::DateTimeOffset(dt) => Ok(Some(*dt)),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_aml_datetime(s.trim())
                .map(|dt| Some(dt.assume_offset(self.time_zone)))
                .ok_or_else(|| invalid("date")),
            _ => Err(invalid("date")),
        }
    }

    /// Interpret a value as a date, converted into the client's local zone
    pub fn as_date_time(&self, value: &Value) -> Result<Option<PrimitiveDateTime>> {
        Ok(self
            .as_date_time_offset(value)?
            .map(|dt| to_primitive(dt, self.local_offset)))
    }

    /// Interpret a value as a date, converted into UTC
    pub fn as_date_time_utc(&self, value: &Value) -> Result<Option<PrimitiveDateTime>> {
        Ok(self
            .as_date_time_offset(value)?
            .map(|dt| to_primitive(dt, UtcOffset::UTC)))
    }

    /// Interpret a value as a GUID, accepting vault picture references
    pub fn as_guid(&self, value: &Value) -> Result<Option<Uuid>> {
        match value {
            Value::Null => Ok(None),
            Value::Guid(id) => Ok(Some(*id)),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => {
                let s = s.trim();
                let s = strip_prefix_ignore_case(s, VAULT_PICTURE_PREFIX).unwrap_or(s);
                Uuid::parse_str(s).map(Some).map_err(|_| invalid("guid"))
            }
            _ => Err(invalid("guid")),
        }
    }
}

/// Format an id the way AML writes them: 32 upper-case hex digits
pub fn format_guid(id: &Uuid) -> String {
    id.simple().to_string().to_ascii_uppercase()
}

/// True when `value` is a 32-digit (or hyphenated) GUID
pub fn is_guid(value: &str) -> bool {
    Uuid::parse_str(value.trim()).is_ok()
}

pub(crate) fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

fn parse_aml_datetime(value: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(value, AML_DATETIME)
        .or_else(|_| PrimitiveDateTime::parse(value, AML_DATETIME_FRACTION))
        .or_else(|_| PrimitiveDateTime::parse(value, SPACED_DATETIME))
        .ok()
        .or_else(|| {
            Date::parse(value, AML_DATE)
                .ok()
                .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT))
        })
}

fn to_primitive(value: OffsetDateTime, offset: UtcOffset) -> PrimitiveDateTime {
    let converted = value.checked_to_offset(offset).unwrap_or(value);
    PrimitiveDateTime::new(converted.date(), converted.time())
}

fn invalid(target: &'static str) -> Error {
    Error::new(ErrorKind::InvalidValue { target }, Span::empty())
}
