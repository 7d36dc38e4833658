//! Placeholder recognition and context-dependent value rendering

use crate::value::Value;

/// Sentinel rendered for an empty list in an `in` clause so the query
/// matches nothing instead of being malformed
pub const EMPTY_LIST_SENTINEL: &str = "`EMTPY_VALUE_LIST`";

/// How a substituted value is rendered, chosen from the enclosing
/// attribute name, `condition` value or `sql` element
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderContext {
    /// `idlist`: comma-joined, unquoted
    IdList,
    /// `in` / `not in`: comma-joined, each member quoted unless numeric
    In,
    /// `like` / `not like`
    Like,
    /// `sql` / `where`: the text is flat SQL
    Sql,
    /// `between` / `not between`: unresolved text passes through
    Between,
    #[default]
    Default,
}

impl RenderContext {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let is = |candidate: &str| name.eq_ignore_ascii_case(candidate);
        if is("idlist") {
            Self::IdList
        } else if is("in") || is("not in") {
            Self::In
        } else if is("like") || is("not like") {
            Self::Like
        } else if is("sql") || is("where") {
            Self::Sql
        } else if is("between") || is("not between") {
            Self::Between
        } else {
            Self::Default
        }
    }

    pub fn from_condition(condition: Option<&str>) -> Self {
        condition.map_or(Self::Default, Self::from_name)
    }
}

/// Placeholder syntax
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterStyle {
    /// `@name`, or `@name!` for a raw parameter
    #[default]
    Sql,
    /// `{0}` or `{0:format}`
    CSharp,
}

/// A placeholder occupying an entire attribute value or text node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub raw: bool,
}

impl Placeholder {
    pub fn parse(style: ParameterStyle, text: &str) -> Option<Self> {
        if text.len() < 2 {
            return None;
        }
        match style {
            ParameterStyle::Sql => {
                let body = text.strip_prefix('@')?;
                let (name, raw) = match body.strip_suffix('!') {
                    Some(name) => (name, true),
                    None => (body, false),
                };
                if name.is_empty() || !name.chars().all(is_parameter_char) {
                    return None;
                }
                Some(Self {
                    name: name.to_string(),
                    raw,
                })
            }
            ParameterStyle::CSharp => {
                let body = text.strip_prefix('{')?.strip_suffix('}')?;
                let index = body.split_once(':').map_or(body, |(index, _)| index);
                let index: u32 = index.parse().ok()?;
                Some(Self {
                    name: index.to_string(),
                    raw: false,
                })
            }
        }
    }
}

pub(crate) fn is_parameter_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Render a value as a list or scalar.
///
/// Strings and scalars are formatted as-is. Lists are comma-joined; when
/// `quote` is set, non-numeric lists quote each member as `N'..'` and an
/// empty list becomes the sentinel.
pub fn render_enum(value: &Value, quote: bool, format: impl Fn(&Value) -> String) -> String {
    let Value::List(items) = value else {
        return format(value);
    };

    if !quote || value.is_numeric_list() {
        return items.iter().map(&format).collect::<Vec<_>>().join(",");
    }

    if items.is_empty() {
        return quoted(&format(&Value::from(EMPTY_LIST_SENTINEL)));
    }
    items
        .iter()
        .map(|item| quoted(&format(item)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `N'...'` with embedded quotes doubled
pub fn quoted(text: &str) -> String {
    format!("N'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            _ => String::new(),
        }
    }

    #[test]
    fn test_context_names() {
        assert_eq!(RenderContext::from_name("not in"), RenderContext::In);
        assert_eq!(RenderContext::from_name("IdList"), RenderContext::IdList);
        assert_eq!(RenderContext::from_name("where"), RenderContext::Sql);
        assert_eq!(RenderContext::from_name("eq"), RenderContext::Default);
        assert_eq!(RenderContext::from_condition(None), RenderContext::Default);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            Placeholder::parse(ParameterStyle::Sql, "@file_1!"),
            Some(Placeholder {
                name: "file_1".to_string(),
                raw: true
            })
        );
        assert_eq!(Placeholder::parse(ParameterStyle::Sql, "@a b"), None);
        assert_eq!(Placeholder::parse(ParameterStyle::Sql, "@!"), None);
        assert_eq!(Placeholder::parse(ParameterStyle::Sql, "x@0"), None);
        assert_eq!(
            Placeholder::parse(ParameterStyle::CSharp, "{2:yyyy}").map(|p| p.name),
            Some("2".to_string())
        );
        assert_eq!(Placeholder::parse(ParameterStyle::CSharp, "{x}"), None);
    }

    #[test]
    fn test_render_enum() {
        let strings = Value::from(vec!["1", "it's"]);
        assert_eq!(render_enum(&strings, false, plain), "1,it's");
        assert_eq!(render_enum(&strings, true, plain), "N'1',N'it''s'");
        assert_eq!(render_enum(&Value::from([1, 2]), true, plain), "1,2");
        assert_eq!(
            render_enum(&Value::List(Vec::new()), true, plain),
            "N'`EMTPY_VALUE_LIST`'"
        );
        assert_eq!(render_enum(&Value::from("a"), true, plain), "a");
    }
}
