//! AML serialization of document nodes

use std::fmt;

use crate::config::AmlWriterSettings;
use crate::error::{Error, ErrorKind, Result, Span};
use crate::model::document::{Document, NodeId, NodeKind};
use crate::model::names::AttributeName;
use crate::xml::{local_name, prefix, Writer};

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const FAULT_NS: &str = "http://www.aras.com/InnovatorFault";
const I18N_NS: &str = "http://www.aras.com/I18N";

impl Document {
    /// Serialize a node with default settings
    pub fn to_aml(&self, id: NodeId) -> Result<String> {
        self.to_aml_with(id, &AmlWriterSettings::default())
    }

    pub fn to_aml_with(&self, id: NodeId, settings: &AmlWriterSettings) -> Result<String> {
        let mut writer = Writer::new(String::new());
        self.write_aml(id, settings, &mut writer)?;
        writer.finish()
    }

    /// Serialize a node into an existing writer
    pub fn write_aml<W: fmt::Write>(
        &self,
        id: NodeId,
        settings: &AmlWriterSettings,
        writer: &mut Writer<W>,
    ) -> Result<()> {
        Serializer {
            doc: self,
            settings,
            declared: Vec::new(),
        }
        .write_node(id, writer)
    }
}

struct Serializer<'a> {
    doc: &'a Document,
    settings: &'a AmlWriterSettings,
    declared: Vec<&'static str>,
}

impl Serializer<'_> {
    fn write_node<W: fmt::Write>(&mut self, id: NodeId, writer: &mut Writer<W>) -> Result<()> {
        let doc = self.doc;
        let name = doc.name(id);
        let scope = self.declared.len();

        let translated = doc
            .attribute(id, AttributeName::XML_LANG)
            .is_some_and(|lang| lang != doc.context().language_code());
        if translated {
            writer.start_element(&format!("i18n:{}", local_name(name)))?;
            self.declare("i18n", I18N_NS, writer)?;
        } else if let Some(element_prefix) = prefix(name) {
            let (known, namespace) = match element_prefix {
                "SOAP-ENV" => ("SOAP-ENV", SOAP_ENV_NS),
                "af" => ("af", FAULT_NS),
                other => return Err(unsupported(other)),
            };
            writer.start_element(name)?;
            self.declare(known, namespace, writer)?;
        } else {
            writer.start_element(name)?;
        }

        for (attr, value) in doc.attributes(id) {
            match prefix(attr) {
                Some("xmlns") => {}
                Some("xml") | None => writer.attribute(attr, value)?,
                Some(other) => return Err(unsupported(other)),
            }
        }

        if doc.children(id).is_empty() {
            if let Some(text) = doc.value(id) {
                writer.text(&text)?;
            }
        } else if let Some(item) = self.collapsible_item(id) {
            if doc.attribute(id, AttributeName::TYPE).is_none() {
                if let Some(type_name) = doc.type_name(item) {
                    writer.attribute(AttributeName::TYPE, type_name)?;
                }
            }
            if doc.attribute(id, AttributeName::KEYED_NAME).is_none() {
                if let Some(keyed_name) = doc.keyed_name(item).filter(|k| !k.is_empty()) {
                    writer.attribute(AttributeName::KEYED_NAME, &keyed_name)?;
                }
            }
            if let Some(item_id) = doc.item_id(item) {
                writer.text(&item_id)?;
            }
        } else {
            for child in doc.children(id) {
                self.write_node(*child, writer)?;
            }
        }

        writer.end_element()?;
        self.declared.truncate(scope);
        Ok(())
    }

    /// The nested item of a property written as a foreign-key reference
    fn collapsible_item(&self, id: NodeId) -> Option<NodeId> {
        let doc = self.doc;
        if self.settings.expand_property_items || doc.kind(id) != Some(NodeKind::Property) {
            return None;
        }
        doc.items(id)
            .next()
            .filter(|item| doc.attribute(*item, AttributeName::ACTION).is_none())
    }

    fn declare<W: fmt::Write>(
        &mut self,
        prefix: &'static str,
        namespace: &str,
        writer: &mut Writer<W>,
    ) -> Result<()> {
        if self.declared.contains(&prefix) {
            return Ok(());
        }
        writer.attribute(&format!("xmlns:{prefix}"), namespace)?;
        self.declared.push(prefix);
        Ok(())
    }
}

fn unsupported(prefix: &str) -> Error {
    Error::new(
        ErrorKind::UnsupportedPrefix {
            prefix: prefix.to_string(),
        },
        Span::empty(),
    )
}
