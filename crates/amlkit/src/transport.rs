//! Sending commands to a server

use tracing::{debug, instrument};

use crate::command::Command;
use crate::context::ServerContext;
use crate::error::Result;
use crate::result::AmlResult;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Delivers a request body for a SOAP action and returns the response body
pub trait Transport {
    fn send(&self, action: &str, body: &str) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, action: &str, body: &str) -> Result<String> {
        (**self).send(action, body)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, action: &str, body: &str) -> Result<String> {
        (**self).send(action, body)
    }
}

/// Normalize a command, send it and parse the response
#[instrument(skip_all, fields(action = command.action_name()))]
pub fn execute<T: Transport + ?Sized>(
    transport: &T,
    command: &mut Command,
    context: &ServerContext,
) -> Result<AmlResult> {
    let mut body = String::from(XML_DECLARATION);
    command.write_normalized_aml(context, &mut body)?;
    debug!(bytes = body.len(), items = command.item_count(), "sending command");

    let response = transport.send(command.action_name(), &body)?;
    let query = body.get(XML_DECLARATION.len()..);
    Ok(AmlResult::from_response(&response, context.clone())?.with_details(None, query))
}
