//! AML requests

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::context::ServerContext;
use crate::error::{Error, Result};
use crate::model::{AttributeName, Document, NodeId};
use crate::subst::{AccessListener, Mode, ParameterStyle, ParameterSubstitution};
use crate::value::Value;

/// SOAP actions understood by the server
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandAction {
    ApplyAML,
    #[default]
    ApplyItem,
    ApplyMethod,
    ApplySQL,
    ApplyUpdate,
    CacheDiag,
    ClearCache,
    GenerateNewGUID,
    GenerateNewGUIDEx,
    GetAssignedTasks,
    GetIdentityList,
    GetItem,
    GetNextSequence,
    GetUsersList,
    LogMessage,
    LogXml,
    PurgeItem,
    ValidateUser,
}

impl CommandAction {
    const ALL: [Self; 18] = [
        Self::ApplyAML,
        Self::ApplyItem,
        Self::ApplyMethod,
        Self::ApplySQL,
        Self::ApplyUpdate,
        Self::CacheDiag,
        Self::ClearCache,
        Self::GenerateNewGUID,
        Self::GenerateNewGUIDEx,
        Self::GetAssignedTasks,
        Self::GetIdentityList,
        Self::GetItem,
        Self::GetNextSequence,
        Self::GetUsersList,
        Self::LogMessage,
        Self::LogXml,
        Self::PurgeItem,
        Self::ValidateUser,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApplyAML => "ApplyAML",
            Self::ApplyItem => "ApplyItem",
            Self::ApplyMethod => "ApplyMethod",
            Self::ApplySQL => "ApplySQL",
            Self::ApplyUpdate => "ApplyUpdate",
            Self::CacheDiag => "CacheDiag",
            Self::ClearCache => "ClearCache",
            Self::GenerateNewGUID => "GenerateNewGUID",
            Self::GenerateNewGUIDEx => "GenerateNewGUIDEx",
            Self::GetAssignedTasks => "GetAssignedTasks",
            Self::GetIdentityList => "GetIdentityList",
            Self::GetItem => "GetItem",
            Self::GetNextSequence => "GetNextSequence",
            Self::GetUsersList => "GetUsersList",
            Self::LogMessage => "LogMessage",
            Self::LogXml => "LogXml",
            Self::PurgeItem => "PurgeItem",
            Self::ValidateUser => "ValidateUser",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandAction {
    type Err = Error;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_operation(format!("unknown action {s}")))
    }
}

/// An AML request: one or more template fragments, the SOAP action they are
/// sent with, and the parameters substituted into them.
///
/// ```
/// use amlkit::{Command, ServerContext};
/// # fn main() -> amlkit::Result<()> {
/// let mut cmd = Command::new("<Item type='Part' action='get'><item_number>@0</item_number></Item>")
///     .with_args(["A-100"]);
/// let aml = cmd.to_normalized_aml(&ServerContext::default())?;
/// assert_eq!(aml, r#"<Item type="Part" action="get"><item_number>A-100</item_number></Item>"#);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Command {
    queries: Vec<String>,
    substitution: ParameterSubstitution,
    action: CommandAction,
    custom_action: Option<String>,
    accept_mime_type: String,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            substitution: ParameterSubstitution::new(),
            action: CommandAction::default(),
            custom_action: None,
            accept_mime_type: "text/xml".to_string(),
        }
    }
}

impl Command {
    pub fn new(aml: impl Into<String>) -> Self {
        let mut command = Self::default();
        command.set_aml(aml);
        command
    }

    /// Command for a serialized node; an `<AML>` wrapper holding several
    /// requests selects `ApplyAML`
    pub fn from_node(doc: &Document, node: NodeId) -> Result<Self> {
        let mut command = Self::new(doc.to_aml(node)?);
        if doc.name(node) == "AML" && doc.children(node).len() > 1 {
            command.action = CommandAction::ApplyAML;
        }
        Ok(command)
    }

    /// Command wrapping several nodes in `<AML>`, sent with `ApplyAML`
    pub fn from_nodes(doc: &Document, nodes: impl IntoIterator<Item = NodeId>) -> Result<Self> {
        let mut aml = String::from("<AML>");
        for node in nodes {
            aml.push_str(&doc.to_aml(node)?);
        }
        aml.push_str("</AML>");
        Ok(Self::new(aml).with_action(CommandAction::ApplyAML))
    }

    /// Replace the template and bind positional arguments `@0`, `@1`, ...
    pub fn with_aml<I, V>(mut self, aml: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.set_aml(aml);
        self.substitution.add_indexed_parameters(args);
        self
    }

    /// Bind positional arguments `@0`, `@1`, ...
    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.substitution.add_indexed_parameters(args);
        self
    }

    /// Set or overwrite a named parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.substitution.add_parameter(name, value);
        self
    }

    pub fn with_action(mut self, action: CommandAction) -> Self {
        self.action = action;
        self.custom_action = None;
        self
    }

    /// Set the action by name, keeping unknown names verbatim
    pub fn with_action_name(mut self, action: &str) -> Self {
        match action.parse::<CommandAction>() {
            Ok(parsed) => {
                self.action = parsed;
                self.custom_action = None;
            }
            Err(_) => self.custom_action = Some(action.to_string()),
        }
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.accept_mime_type = mime_type.into();
        self
    }

    /// Use `{N}` placeholders instead of `@name`
    pub fn with_style(mut self, style: ParameterStyle) -> Self {
        self.substitution.set_style(style);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.substitution.set_mode(mode);
        self
    }

    pub fn with_access_listener(mut self, listener: AccessListener) -> Self {
        self.substitution.set_access_listener(Some(listener));
        self
    }

    /// The template, wrapped in `<AML>` when several fragments were added
    pub fn aml(&self) -> Option<Cow<'_, str>> {
        match self.queries.as_slice() {
            [] => None,
            [single] => Some(Cow::Borrowed(single.as_str())),
            many => Some(Cow::Owned(format!("<AML>{}</AML>", many.concat()))),
        }
    }

    /// Replace all fragments with a single template
    pub fn set_aml(&mut self, aml: impl Into<String>) {
        self.queries.clear();
        self.queries.push(aml.into());
    }

    /// Append a fragment
    pub fn add_aml(&mut self, aml: impl Into<String>) {
        self.queries.push(aml.into());
    }

    pub fn clear_aml(&mut self) {
        self.queries.clear();
    }

    pub fn action(&self) -> CommandAction {
        self.action
    }

    /// The SOAP action name, including free-text actions
    pub fn action_name(&self) -> &str {
        self.custom_action
            .as_deref()
            .unwrap_or_else(|| self.action.as_str())
    }

    pub fn accept_mime_type(&self) -> &str {
        &self.accept_mime_type
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.substitution.parameters()
    }

    /// Top-level items seen by the last normalization
    pub fn item_count(&self) -> usize {
        self.substitution.item_count()
    }

    /// The template with all parameters substituted
    pub fn to_normalized_aml(&mut self, context: &ServerContext) -> Result<String> {
        let mut out = String::new();
        self.write_normalized_aml(context, &mut out)?;
        Ok(out)
    }

    /// Stream the normalized template into `out`
    pub fn write_normalized_aml<W: fmt::Write>(
        &mut self,
        context: &ServerContext,
        out: &mut W,
    ) -> Result<()> {
        let aml = self.aml().map(Cow::into_owned).unwrap_or_default();
        debug!(
            action = self.action_name(),
            params = self.substitution.param_count(),
            "normalizing command"
        );

        if self.needs_substitution(&aml) {
            self.substitution.substitute_to(&aml, context, out)
        } else {
            out.write_str(&aml)
                .map_err(|_| Error::invalid_operation("failed to write command"))
        }
    }

    fn needs_substitution(&self, aml: &str) -> bool {
        self.substitution.param_count() > 0 || aml.contains(AttributeName::ORIG_DATE_RANGE)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aml().as_deref().unwrap_or_default())
    }
}

impl From<&str> for Command {
    fn from(aml: &str) -> Self {
        Self::new(aml)
    }
}

impl From<String> for Command {
    fn from(aml: String) -> Self {
        Self::new(aml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() -> Result<()> {
        assert_eq!("applysql".parse::<CommandAction>()?, CommandAction::ApplySQL);
        assert!("NotAnAction".parse::<CommandAction>().is_err());

        let custom = Command::new("<x />").with_action_name("MyServerMethod");
        assert_eq!(custom.action_name(), "MyServerMethod");
        assert_eq!(custom.action(), CommandAction::ApplyItem);

        let known = custom.with_action_name("ApplyAML");
        assert_eq!(known.action_name(), "ApplyAML");
        Ok(())
    }

    #[test]
    fn test_fragments_are_wrapped_only_when_serialized() {
        let mut cmd = Command::new("<Item type='A' />");
        assert_eq!(cmd.to_string(), "<Item type='A' />");
        cmd.add_aml("<Item type='B' />");
        assert_eq!(cmd.to_string(), "<AML><Item type='A' /><Item type='B' /></AML>");
        cmd.set_aml("<Item type='C' />");
        assert_eq!(cmd.to_string(), "<Item type='C' />");
        cmd.clear_aml();
        assert_eq!(cmd.aml(), None);
    }

    #[test]
    fn test_static_template_is_untouched() -> Result<()> {
        let template = "<Item type='Part'  action='get' />";
        let mut cmd = Command::new(template);
        assert_eq!(cmd.to_normalized_aml(&ServerContext::default())?, template);
        Ok(())
    }

    #[test]
    fn test_from_nodes() -> Result<()> {
        let mut doc = Document::default();
        let first = doc.create_item("Part", Some("get"));
        let second = doc.create_item("Document", Some("get"));
        let cmd = Command::from_nodes(&doc, [first, second])?;
        assert_eq!(cmd.action(), CommandAction::ApplyAML);
        assert_eq!(
            cmd.to_string(),
            r#"<AML><Item type="Part" action="get" /><Item type="Document" action="get" /></AML>"#
        );

        let aml = doc.create_element("AML");
        doc.add(aml, first)?;
        doc.add(aml, second)?;
        assert_eq!(Command::from_node(&doc, aml)?.action(), CommandAction::ApplyAML);
        assert_eq!(Command::from_node(&doc, first)?.action(), CommandAction::ApplyItem);
        Ok(())
    }

    #[test]
    fn test_item_count_after_normalization() -> Result<()> {
        let mut cmd = Command::new("<AML><Item action='get' type='@0' /><Item action='get' type='@0' /></AML>")
            .with_args(["Part"]);
        cmd.to_normalized_aml(&ServerContext::default())?;
        assert_eq!(cmd.item_count(), 2);
        Ok(())
    }
}
