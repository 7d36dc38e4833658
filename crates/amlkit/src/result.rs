//! Results of an AML exchange

use tracing::debug;

use crate::config::AmlWriterSettings;
use crate::context::ServerContext;
use crate::error::{Error, ErrorKind, Result, Span};
use crate::model::{Content, Document, NodeId};
use crate::xml::{local_name, Writer};

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const FAULT_NS: &str = "http://www.aras.com/InnovatorFault";
const NO_ITEMS_FAULT_CODE: &str = "0";
const SERVER_FAULT_CODE: &str = "SOAP-ENV:Server";

#[derive(Clone, Debug, Default)]
enum Payload {
    #[default]
    Empty,
    Items(Vec<NodeId>),
    Value(String),
    Fault(Error),
}

/// Items, a scalar value or an error returned for one request.
///
/// Items live in the result's own [`Document`]; use [`AmlResult::document`]
/// to read them.
#[derive(Clone, Debug, Default)]
pub struct AmlResult {
    doc: Document,
    payload: Payload,
    message: Option<NodeId>,
    errors: Vec<String>,
    error_properties: Vec<String>,
    error_context: Option<NodeId>,
    database: Option<String>,
    query: Option<String>,
}

impl AmlResult {
    pub fn new(context: ServerContext) -> Self {
        Self {
            doc: Document::new(context),
            ..Self::default()
        }
    }

    /// Record the database and query so raised errors can report them
    pub fn with_details(mut self, database: Option<&str>, query: Option<&str>) -> Self {
        self.database = database.map(str::to_string);
        self.query = query.map(str::to_string);
        self
    }

    /// Parse a SOAP response.
    ///
    /// Reads the items or scalar value of `<Result>`, the optional
    /// `<Message>`, or a `<SOAP-ENV:Fault>`. Fault code `0` is reported as
    /// [`ErrorKind::NoItemsFound`]. The parsed tree is read-only.
    pub fn from_response(xml: &str, context: ServerContext) -> Result<Self> {
        let doc = Document::parse_stored(xml, context)?;
        let mut result = Self {
            doc,
            ..Self::default()
        };

        let root = result
            .doc
            .root()
            .ok_or_else(|| Error::invalid_operation("empty response"))?;
        let containers: Vec<NodeId> = if local_name(result.doc.name(root)) == "Envelope" {
            result
                .child_named(root, "Body")
                .map(|body| result.doc.children(body).to_vec())
                .unwrap_or_default()
        } else {
            result.doc.roots().collect()
        };

        for node in containers {
            let name = local_name(result.doc.name(node)).to_string();
            match name.as_str() {
                "Result" => {
                    let items: Vec<NodeId> = result.doc.items(node).collect();
                    if !items.is_empty() {
                        result.payload = Payload::Items(items);
                    } else if let Some(value) = result.doc.value(node) {
                        result.payload = Payload::Value(value);
                    }
                }
                "Item" => match &mut result.payload {
                    Payload::Items(items) => items.push(node),
                    _ => result.payload = Payload::Items(vec![node]),
                },
                "Message" => result.message = Some(node),
                "Fault" => result.payload = Payload::Fault(result.parse_fault(node)),
                _ => {}
            }
        }

        let roots: Vec<NodeId> = result.doc.roots().collect();
        for root in roots {
            result.doc.freeze(root)?;
        }

        debug!(
            items = result.items_slice().len(),
            fault = matches!(result.payload, Payload::Fault(_)),
            "parsed response"
        );
        Ok(result)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for building a result by hand
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Append an item of this result's document
    pub fn add(&mut self, item: NodeId) -> &mut Self {
        match &mut self.payload {
            Payload::Items(items) => items.push(item),
            _ => self.payload = Payload::Items(vec![item]),
        }
        self
    }

    /// Copy an item from another document and append it
    pub fn import(&mut self, source: &Document, item: NodeId) -> Result<NodeId> {
        let copy = self.doc.import(source, item)?;
        self.add(copy);
        Ok(copy)
    }

    pub fn value(&self) -> Option<&str> {
        match &self.payload {
            Payload::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.payload = Payload::Value(value.into());
    }

    pub fn set_fault(&mut self, error: Error) {
        self.payload = Payload::Fault(error);
    }

    /// The out-of-band `<Message>` element, if any
    pub fn message(&self) -> Option<NodeId> {
        self.message
    }

    /// Add content to the `<Message>` element, creating it if needed
    pub fn add_message(&mut self, content: impl Into<Content>) -> Result<()> {
        let message = match self.message {
            Some(message) => message,
            None => {
                let message = self.doc.create_element("Message");
                self.message = Some(message);
                message
            }
        };
        self.doc.add(message, content)
    }

    /// Record a validation message, optionally naming offending properties
    pub fn error_msg<I, S>(&mut self, message: impl Into<String>, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.push(message.into());
        self.error_properties
            .extend(properties.into_iter().map(Into::into));
        self
    }

    /// Bind validation messages to an item
    pub fn error_context(&mut self, item: NodeId) -> &mut Self {
        self.error_context = Some(item);
        self
    }

    /// The error this result represents, if any.
    ///
    /// Recorded messages become a validation error when an error context
    /// item was set and a generic server error otherwise.
    pub fn exception(&self) -> Option<Error> {
        if !self.errors.is_empty() {
            let message = self.errors.join("\n");
            let kind = match self.error_context {
                Some(item) => ErrorKind::Validation {
                    item_type: self.doc.type_name(item).map(str::to_string),
                    item_id: self.doc.item_id(item),
                    properties: self.error_properties.clone(),
                },
                None => ErrorKind::Server {
                    fault_code: SERVER_FAULT_CODE.to_string(),
                },
            };
            return Some(self.detailed(Error::with_message(kind, Span::empty(), message)));
        }

        match &self.payload {
            Payload::Fault(error) => Some(self.detailed(error.clone())),
            _ => None,
        }
    }

    /// Fail on any error, optionally tolerating "no items found"
    pub fn assert_no_error(&self, ignore_no_items_found: bool) -> Result<()> {
        match self.exception() {
            Some(error) if ignore_no_items_found && error.is_no_items_found() => Ok(()),
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The single item of the result, optionally of the given type
    pub fn assert_item(&self, item_type: Option<&str>) -> Result<NodeId> {
        let item = match self.assert_items()? {
            [] => return Err(self.no_items()),
            [item] => *item,
            _ => {
                return Err(self.detailed(Error::new(ErrorKind::MultipleItems, Span::empty())));
            }
        };

        match item_type {
            Some(expected) if self.doc.type_name(item) != Some(expected) => {
                Err(self.detailed(Error::new(
                    ErrorKind::TypeMismatch {
                        expected: expected.to_string(),
                        found: self.doc.type_name(item).unwrap_or_default().to_string(),
                    },
                    Span::empty(),
                )))
            }
            _ => Ok(item),
        }
    }

    /// All items; any error, including "no items found", fails
    pub fn assert_items(&self) -> Result<&[NodeId]> {
        if let Some(error) = self.exception() {
            return Err(error);
        }
        match &self.payload {
            Payload::Items(items) => Ok(items),
            _ => Err(self.no_items()),
        }
    }

    /// All items; "no items found" yields an empty slice
    pub fn items(&self) -> Result<&[NodeId]> {
        match self.exception() {
            Some(error) if error.is_no_items_found() => Ok(&[]),
            Some(error) => Err(error),
            None => Ok(self.items_slice()),
        }
    }

    /// Render the result as a SOAP envelope
    pub fn to_aml(&self) -> Result<String> {
        self.to_aml_with(&AmlWriterSettings::default())
    }

    pub fn to_aml_with(&self, settings: &AmlWriterSettings) -> Result<String> {
        let mut writer = Writer::new(String::new());
        writer.start_element("SOAP-ENV:Envelope")?;
        writer.attribute("xmlns:SOAP-ENV", SOAP_ENV_NS)?;
        writer.start_element("SOAP-ENV:Body")?;

        if let Some(error) = self.exception() {
            write_fault(&error, &mut writer)?;
        } else {
            writer.start_element("Result")?;
            match &self.payload {
                Payload::Items(items) => {
                    for item in items {
                        self.doc.write_aml(*item, settings, &mut writer)?;
                    }
                }
                Payload::Value(value) => writer.text(value)?,
                Payload::Empty | Payload::Fault(_) => {}
            }
            writer.end_element()?;
            if let Some(message) = self.message {
                self.doc.write_aml(message, settings, &mut writer)?;
            }
        }

        writer.finish()
    }

    fn items_slice(&self) -> &[NodeId] {
        match &self.payload {
            Payload::Items(items) => items,
            _ => &[],
        }
    }

    fn no_items(&self) -> Error {
        match self.exception() {
            Some(error) if error.is_no_items_found() => error,
            _ => self.detailed(Error::new(
                ErrorKind::NoItemsFound {
                    item_type: "?".to_string(),
                },
                Span::empty(),
            )),
        }
    }

    fn detailed(&self, error: Error) -> Error {
        if error.details().is_some() {
            return error;
        }
        error.with_details(self.database.as_deref(), self.query.as_deref())
    }

    fn child_named(&self, node: NodeId, local: &str) -> Option<NodeId> {
        self.doc
            .children(node)
            .iter()
            .copied()
            .find(|child| local_name(self.doc.name(*child)) == local)
    }

    fn parse_fault(&self, fault: NodeId) -> Error {
        let text = |name: &str| {
            self.child_named(fault, name)
                .and_then(|node| self.doc.value(node))
                .unwrap_or_default()
        };
        let code = text("faultcode");
        let message = text("faultstring");

        let kind = if code.trim() == NO_ITEMS_FAULT_CODE {
            ErrorKind::NoItemsFound {
                item_type: self
                    .fault_item_type(fault)
                    .or_else(|| item_type_from_message(&message))
                    .unwrap_or_else(|| "?".to_string()),
            }
        } else {
            ErrorKind::Server { fault_code: code }
        };
        Error::with_message(kind, Span::empty(), message)
    }

    /// `type` of the `<af:item>` element in the fault detail
    fn fault_item_type(&self, fault: NodeId) -> Option<String> {
        let detail = self.child_named(fault, "detail")?;
        let item = self.child_named(detail, "item")?;
        self.doc.type_name(item).map(str::to_string)
    }
}

/// Item type named by "No items of type X found."
fn item_type_from_message(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("of type ")?;
    let (item_type, _) = rest.split_once(" found")?;
    Some(item_type.trim().trim_matches('\'').to_string())
}

fn fault_code(error: &Error) -> String {
    match error.kind() {
        ErrorKind::NoItemsFound { .. } => NO_ITEMS_FAULT_CODE.to_string(),
        ErrorKind::Server { fault_code } => fault_code.clone(),
        _ => SERVER_FAULT_CODE.to_string(),
    }
}

fn write_fault<W: std::fmt::Write>(error: &Error, writer: &mut Writer<W>) -> Result<()> {
    writer.start_element("SOAP-ENV:Fault")?;
    writer.attribute("xmlns:af", FAULT_NS)?;
    writer.start_element("faultcode")?;
    writer.text(&fault_code(error))?;
    writer.end_element()?;
    writer.start_element("faultstring")?;
    writer.text(error.message())?;
    writer.end_element()?;
    writer.start_element("detail")?;
    match error.kind() {
        ErrorKind::NoItemsFound { item_type } => {
            writer.start_element("af:item")?;
            writer.attribute("type", item_type)?;
            writer.end_element()?;
        }
        ErrorKind::Validation {
            item_type,
            item_id,
            properties,
        } => {
            writer.start_element("af:item")?;
            if let Some(item_type) = item_type {
                writer.attribute("type", item_type)?;
            }
            if let Some(item_id) = item_id {
                writer.attribute("id", item_id)?;
            }
            writer.end_element()?;
            for property in properties {
                writer.start_element("af:property")?;
                writer.text(property)?;
                writer.end_element()?;
            }
        }
        _ => {
            writer.start_element("af:legacy_detail")?;
            writer.text(error.message())?;
            writer.end_element()?;
        }
    }
    writer.end_element()?;
    writer.end_element()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items_and_message() -> Result<()> {
        let xml = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><Result><Item type="Part" id="1"><name>a</name></Item></Result><Message><event name="x" /></Message></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;
        let result = AmlResult::from_response(xml, ServerContext::default())?;
        let item = result.assert_item(Some("Part"))?;
        let doc = result.document();
        assert!(doc.is_read_only(item));
        assert_eq!(doc.property(item, "name").as_string().as_deref(), Some("a"));
        assert_eq!(doc.property(item, "is_current").as_boolean()?, Some(true));
        assert!(result.message().is_some());
        Ok(())
    }

    #[test]
    fn test_scalar_result() -> Result<()> {
        let xml = "<SOAP-ENV:Envelope xmlns:SOAP-ENV='x'><SOAP-ENV:Body><Result>42</Result></SOAP-ENV:Body></SOAP-ENV:Envelope>";
        let result = AmlResult::from_response(xml, ServerContext::default())?;
        assert_eq!(result.value(), Some("42"));
        assert_eq!(result.items()?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_validation_error() -> Result<()> {
        let mut result = AmlResult::new(ServerContext::default())
            .with_details(Some("PLM"), None);
        let item = result.document_mut().create_item("Part", None);
        result.document_mut().set_attribute(item, "id", "ABC")?;
        result
            .error_context(item)
            .error_msg("Name is required", ["name"]);

        let err = result.exception();
        assert_eq!(
            err.as_ref().map(Error::kind),
            Some(&ErrorKind::Validation {
                item_type: Some("Part".to_string()),
                item_id: Some("ABC".to_string()),
                properties: vec!["name".to_string()],
            })
        );
        assert_eq!(
            err.as_ref()
                .and_then(Error::details)
                .and_then(|d| d.database.as_deref()),
            Some("PLM")
        );
        Ok(())
    }

    #[test]
    fn test_item_type_from_message() {
        assert_eq!(
            item_type_from_message("No items of type Part BOM found.").as_deref(),
            Some("Part BOM")
        );
        assert_eq!(item_type_from_message("Something else"), None);
    }

    #[test]
    fn test_fault_envelope() -> Result<()> {
        let mut result = AmlResult::new(ServerContext::default());
        result.set_fault(Error::with_message(
            ErrorKind::NoItemsFound {
                item_type: "Part".to_string(),
            },
            Span::empty(),
            "No items of type Part found.",
        ));
        let aml = result.to_aml()?;
        assert!(aml.contains("<faultcode>0</faultcode>"));
        assert!(aml.contains(r#"<af:item type="Part" />"#));

        let parsed = AmlResult::from_response(&aml, ServerContext::default())?;
        assert!(parsed.items()?.is_empty());
        let err = parsed.assert_items().err();
        assert_eq!(
            err.as_ref().map(Error::kind),
            Some(&ErrorKind::NoItemsFound {
                item_type: "Part".to_string()
            })
        );
        Ok(())
    }
}
