//! Parameter substitution
//!
//! Replaces `@name` (or `{N}`) placeholders in AML or flat SQL with
//! escaped, context-aware renderings of typed values. A parameter whose name
//! ends with `!` is raw: it is inserted without escaping, and only element
//! text may hold one.
//!
//! ```
//! use amlkit::{ParameterSubstitution, ServerContext, Value};
//! # fn main() -> amlkit::Result<()> {
//! let mut sub = ParameterSubstitution::new();
//! sub.add_parameter("0", Value::from("a & b"));
//! let aml = sub.substitute("<Item><name>@0</name></Item>", &ServerContext::default())?;
//! assert_eq!(aml, "<Item><name>a &amp; b</name></Item>");
//! # Ok(())
//! # }
//! ```

pub mod render;
pub mod sql;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::context::ServerContext;
use crate::date_range::DynamicDateRange;
use crate::error::{Error, ErrorKind, RawLocation, Result, Span};
use crate::model::AttributeName;
use crate::value::Value;
use crate::xml::{is_xml_whitespace, local_name, Event, Reader, Writer};

pub use render::{ParameterStyle, Placeholder, RenderContext, EMPTY_LIST_SENTINEL};
pub use sql::SqlFormatter;

const XML_SPACE: &str = "xml:space";

/// Whether templates starting with `<` are treated as AML
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    #[default]
    Aml,
    Sql,
}

/// Callback invoked with every parameter name looked up
pub type AccessListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Debug)]
struct Rendered {
    text: String,
    raw: bool,
    original: Option<Value>,
}

impl Rendered {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw: false,
            original: None,
        }
    }
}

/// A parameter table and the engine that applies it to templates
#[derive(Clone, Default)]
pub struct ParameterSubstitution {
    parameters: IndexMap<String, Value>,
    mode: Mode,
    style: ParameterStyle,
    item_count: usize,
    listener: Option<AccessListener>,
    formatter: SqlFormatter,
}

impl fmt::Debug for ParameterSubstitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSubstitution")
            .field("parameters", &self.parameters)
            .field("mode", &self.mode)
            .field("style", &self.style)
            .field("item_count", &self.item_count)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl ParameterSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn style(&self) -> ParameterStyle {
        self.style
    }

    pub fn set_style(&mut self, style: ParameterStyle) {
        self.style = style;
    }

    pub fn set_access_listener(&mut self, listener: Option<AccessListener>) {
        self.listener = listener;
    }

    /// Number of top-level `Item` elements seen by the last AML substitution
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    /// Set or overwrite a parameter
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Add values under the names `"0"`, `"1"`, ...
    pub fn add_indexed_parameters<I, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for (index, value) in values.into_iter().enumerate() {
            self.parameters.insert(index.to_string(), value.into());
        }
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Substitute parameters into a template.
    ///
    /// Templates whose first non-whitespace character is `<` are walked as
    /// AML when the mode is [`Mode::Aml`]; anything else is flat SQL.
    pub fn substitute(&mut self, query: &str, context: &ServerContext) -> Result<String> {
        let mut out = String::with_capacity(query.len());
        self.substitute_to(query, context, &mut out)?;
        Ok(out)
    }

    /// Stream the substituted template into `out`
    pub fn substitute_to<W: fmt::Write>(
        &mut self,
        query: &str,
        context: &ServerContext,
        out: &mut W,
    ) -> Result<()> {
        self.refresh_formatter(context);

        let trimmed = query.trim_start();
        if trimmed.is_empty() {
            return write_str(out, query);
        }

        if trimmed.starts_with('<') && self.mode == Mode::Aml {
            debug!(params = self.parameters.len(), "substituting AML template");
            let mut writer = Writer::new(out);
            self.substitute_aml(query, &mut writer)?;
            writer.finish()?;
            Ok(())
        } else {
            debug!(params = self.parameters.len(), "substituting SQL template");
            let replaced = self.sql_replace(query, false);
            write_str(out, &replaced)
        }
    }

    /// Rebuild the cached formatter when the server context changed
    fn refresh_formatter(&mut self, context: &ServerContext) {
        if self.formatter.context() != context {
            self.formatter = SqlFormatter::new(context.clone());
        }
    }

    fn substitute_aml<W: fmt::Write>(&mut self, query: &str, writer: &mut Writer<W>) -> Result<()> {
        let context = self.formatter.context().clone();
        let mut reader = Reader::new(query);
        let mut condition: Option<String> = None;
        let mut date_range: Option<DynamicDateRange> = None;
        let mut written: Vec<String> = Vec::new();
        let mut tags: Vec<String> = Vec::new();
        let mut preserve: Vec<bool> = Vec::new();
        self.item_count = 0;

        while let Some(event) = reader.next_event()? {
            let preserving = preserve.last().copied().unwrap_or(false);
            if event.is_whitespace() && !preserving {
                continue;
            }
            match event {
                Event::CData(text) => {
                    let rendered =
                        self.render_value(RenderContext::from_condition(condition.as_deref()), &text);
                    if rendered.raw {
                        return Err(raw_not_allowed(RawLocation::CData, &reader));
                    }
                    writer.cdata(&rendered.text)?;
                }
                Event::Comment(text) => writer.comment(&text)?,
                Event::Start {
                    name,
                    attributes,
                    empty,
                } => {
                    date_range = None;
                    condition = None;
                    writer.start_element(&name)?;

                    let mut attrs: Vec<(String, String)> = Vec::with_capacity(attributes.len());
                    for (attr, value) in attributes {
                        let attr_local = local_name(&attr);
                        let rendered = self.render_value(RenderContext::from_name(attr_local), &value);
                        if rendered.raw {
                            return Err(raw_not_allowed(RawLocation::Attribute, &reader));
                        }
                        if attr_local == AttributeName::CONDITION {
                            condition = Some(rendered.text.clone());
                        } else if attr_local == AttributeName::ORIG_DATE_RANGE {
                            date_range = DynamicDateRange::deserialize(&value);
                        }
                        attrs.push((attr, rendered.text));
                    }

                    if let Some(range) = &date_range {
                        let range_condition = range.condition().as_aml();
                        let existing = attrs
                            .iter()
                            .position(|(attr, _)| local_name(attr) == AttributeName::CONDITION);
                        let index = match existing {
                            Some(index) => index,
                            None => {
                                attrs.push((AttributeName::CONDITION.to_string(), "between".to_string()));
                                attrs.len() - 1
                            }
                        };
                        if let Some((_, value)) = attrs.get_mut(index) {
                            if let Some(range_condition) = range_condition {
                                *value = range_condition.to_string();
                            }
                            condition = Some(value.clone());
                        }
                    }

                    let space = attrs
                        .iter()
                        .find(|(attr, _)| attr == XML_SPACE)
                        .map(|(_, value)| value.as_str());
                    let scope = match space {
                        Some("preserve") => true,
                        Some("default") => false,
                        _ => preserving,
                    };

                    written.clear();
                    for (attr, value) in &attrs {
                        writer.attribute(attr, value)?;
                        written.push(local_name(attr).to_string());
                    }

                    let local = local_name(&name);
                    match local {
                        "Item" => {
                            if !tags.iter().any(|tag| tag == "Item") {
                                self.item_count += 1;
                            }
                        }
                        "sql" | "SQL" => condition = Some("sql".to_string()),
                        _ => {}
                    }

                    if empty {
                        writer.end_element()?;
                    } else {
                        tags.push(local.to_string());
                        preserve.push(scope);
                    }
                }
                Event::End { .. } => {
                    writer.end_element()?;
                    tags.pop();
                    preserve.pop();
                    condition = None;
                }
                Event::Text(text) if text.chars().all(is_xml_whitespace) => writer.text(&text)?,
                Event::Text(text) => {
                    let source = match &date_range {
                        Some(range) => context.format(&Value::DynamicRange(*range)),
                        None => text,
                    };
                    let rendered =
                        self.render_value(RenderContext::from_condition(condition.as_deref()), &source);
                    write_range_attributes(&context, &rendered, &written, writer)?;

                    if rendered.raw {
                        writer.raw(&rendered.text)?;
                    } else {
                        writer.text(&rendered.text)?;
                    }
                }
            }
        }

        debug!(items = self.item_count, "AML substitution complete");
        Ok(())
    }

    fn render_value(&self, context: RenderContext, content: &str) -> Rendered {
        if content.trim().is_empty() {
            return Rendered::text(content);
        }

        // a raw placeholder stays raw even when it does not resolve
        let placeholder = Placeholder::parse(self.style, content);
        let raw = placeholder.as_ref().is_some_and(|p| p.raw);

        if let Some(placeholder) = placeholder {
            if let Some(value) = self.lookup(&placeholder.name) {
                let server = self.formatter.context();
                let text = if placeholder.raw {
                    server.format(&value)
                } else {
                    let quote = context == RenderContext::In;
                    render::render_enum(&value, quote, |v| server.format(v))
                };
                return Rendered {
                    text,
                    raw,
                    original: Some(value),
                };
            }
        }

        let text = match context {
            RenderContext::Between => content.to_string(),
            RenderContext::Sql => self.sql_replace(content, false),
            RenderContext::In if content.trim_start().starts_with('(') => {
                let content = content.trim();
                if content.chars().nth(1) == Some('@') {
                    let inner = content.trim_start_matches('(').trim_end_matches(')');
                    self.sql_replace(inner, true)
                } else {
                    self.sql_replace(content, false)
                }
            }
            RenderContext::In | RenderContext::IdList | RenderContext::Like | RenderContext::Default => {
                content.to_string()
            }
        };
        Rendered {
            text,
            raw,
            original: None,
        }
    }

    /// Flat-SQL substitution; `in_list` renders lists as an `in` clause body
    /// without adding parentheses
    fn sql_replace(&self, query: &str, in_list: bool) -> String {
        let formatter = &self.formatter;
        sql::scan_parameters(query, |name, out| {
            let Some(value) = self.lookup(name) else {
                trace!(name, "unresolved parameter left in place");
                out.push('@');
                out.push_str(name);
                return;
            };

            let tail = sql::in_clause_tail(out);
            let wrap = tail == Some(false);
            let in_clause = in_list || tail.is_some();

            let rendered = match &value {
                Value::Null => "null".to_string(),
                Value::Int(_) | Value::Float(_) => formatter.format(&value),
                Value::List(_) if in_clause => {
                    render::render_enum(&value, true, |v| formatter.context().format(v))
                }
                _ => format!("N'{}'", formatter.format(&value)),
            };

            if wrap {
                out.push('(');
                out.push_str(&rendered);
                out.push(')');
            } else {
                out.push_str(&rendered);
            }
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(listener) = &self.listener {
            listener(name);
        }
        let value = self.parameters.get(name).cloned();
        if value.is_none() {
            trace!(name, "parameter not found");
        }
        value
    }
}

/// Add `condition`/`origDateRange` for a date range substituted into text,
/// unless the element already carries them or its start tag was closed
fn write_range_attributes<W: fmt::Write>(
    context: &ServerContext,
    rendered: &Rendered,
    written: &[String],
    writer: &mut Writer<W>,
) -> Result<()> {
    if !writer.is_start_open() {
        return Ok(());
    }
    let has = |name: &str| written.iter().any(|attr| attr == name);

    match &rendered.original {
        Some(Value::DynamicRange(range)) => {
            let condition = context.format_condition(range.condition());
            if !has(AttributeName::CONDITION) && !condition.is_empty() {
                writer.attribute(AttributeName::CONDITION, condition)?;
            }
            if !has(AttributeName::ORIG_DATE_RANGE) {
                writer.attribute(AttributeName::ORIG_DATE_RANGE, &range.serialize())?;
            }
        }
        Some(Value::StaticRange(range)) => {
            let condition = context.format_condition(range.condition());
            if !has(AttributeName::CONDITION) && !condition.is_empty() {
                writer.attribute(AttributeName::CONDITION, condition)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn raw_not_allowed(location: RawLocation, reader: &Reader<'_>) -> Error {
    let pos = reader.position();
    Error::new(ErrorKind::RawParameterNotAllowed { location }, Span::new(pos, pos))
}

fn write_str<W: fmt::Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_str(text)
        .map_err(|_| Error::invalid_operation("failed to write substituted output"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sub_with(values: Vec<Value>) -> ParameterSubstitution {
        let mut sub = ParameterSubstitution::new();
        sub.add_indexed_parameters(values);
        sub
    }

    #[test]
    fn test_item_count_ignores_nested_items() -> Result<()> {
        let mut sub = sub_with(vec![Value::from("x")]);
        sub.substitute(
            "<AML><Item><id>@0</id><Relationships><Item /></Relationships></Item><Item /></AML>",
            &ServerContext::default(),
        )?;
        assert_eq!(sub.item_count(), 2);
        Ok(())
    }

    #[test]
    fn test_access_listener_sees_every_lookup() -> Result<()> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut sub = sub_with(vec![Value::from(1)]);
        sub.set_access_listener(Some(Arc::new(move |name: &str| {
            if let Ok(mut names) = sink.lock() {
                names.push(name.to_string());
            }
        })));
        sub.substitute("select @0, @missing", &ServerContext::default())?;
        let names = seen.lock().map(|n| n.clone()).unwrap_or_default();
        assert_eq!(names, vec!["0".to_string(), "missing".to_string()]);
        Ok(())
    }

    #[test]
    fn test_formatter_follows_context() -> Result<()> {
        let mut sub = sub_with(vec![Value::from(true)]);
        let de = ServerContext::default().with_language_code("de");
        sub.substitute("select @0", &ServerContext::default())?;
        sub.substitute("select @0", &de)?;
        assert_eq!(sub.formatter.context().language_code(), "de");
        Ok(())
    }

    #[test]
    fn test_whitespace_template_is_unchanged() -> Result<()> {
        let mut sub = sub_with(vec![Value::from(1)]);
        assert_eq!(sub.substitute("  \n", &ServerContext::default())?, "  \n");
        Ok(())
    }

    #[test]
    fn test_whitespace_kept_only_where_preserved() -> Result<()> {
        let mut sub = sub_with(vec![Value::from("x")]);
        let ctx = ServerContext::default();
        assert_eq!(
            sub.substitute("<name xml:space='preserve'>   </name>", &ctx)?,
            r#"<name xml:space="preserve">   </name>"#
        );
        assert_eq!(
            sub.substitute("<a xml:space='preserve'><b xml:space='default'> </b><c>\n</c></a>", &ctx)?,
            "<a xml:space=\"preserve\"><b xml:space=\"default\" /><c>\n</c></a>"
        );
        assert_eq!(sub.substitute("<a>\n  <b>@0</b>\n</a>", &ctx)?, "<a><b>x</b></a>");
        Ok(())
    }

    #[test]
    fn test_sql_mode_never_parses_xml() -> Result<()> {
        let mut sub = sub_with(vec![Value::from("a")]);
        sub.set_mode(Mode::Sql);
        assert_eq!(
            sub.substitute("<not xml @0", &ServerContext::default())?,
            "<not xml N'a'"
        );
        Ok(())
    }
}
