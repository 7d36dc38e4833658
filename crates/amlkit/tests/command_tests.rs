use std::sync::{Arc, Mutex};

use amlkit::{Command, CommandAction, Content, Document, ServerContext, Value};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_fragments_are_wrapped_only_when_serialized() -> TestResult {
    let mut cmd = Command::new("<Item type='Part' action='get' />");
    cmd.add_aml("<Item type='Document' action='get' />");
    assert_eq!(
        cmd.aml().as_deref(),
        Some("<AML><Item type='Part' action='get' /><Item type='Document' action='get' /></AML>")
    );

    let mut cmd = cmd.with_param("unused", 1);
    let aml = cmd.to_normalized_aml(&ServerContext::default())?;
    assert_eq!(
        aml,
        r#"<AML><Item type="Part" action="get" /><Item type="Document" action="get" /></AML>"#
    );
    assert_eq!(cmd.item_count(), 2);
    Ok(())
}

#[test]
fn test_list_argument_is_one_positional_value() -> TestResult {
    let mut cmd = Command::new("<Item type='Part' action='get'><id condition='in'>@0</id><name>@1</name></Item>")
        .with_args([Value::list(["A", "B"]), Value::from("x")]);
    assert_eq!(
        cmd.to_normalized_aml(&ServerContext::default())?,
        r#"<Item type="Part" action="get"><id condition="in">N'A',N'B'</id><name>x</name></Item>"#
    );
    Ok(())
}

#[test]
fn test_with_param_overwrites() -> TestResult {
    let mut cmd = Command::new("<Item type='Part' action='get'><name>@0</name></Item>")
        .with_args(["first"])
        .with_param("0", "second");
    assert_eq!(cmd.parameters().count(), 1);
    assert_eq!(
        cmd.to_normalized_aml(&ServerContext::default())?,
        r#"<Item type="Part" action="get"><name>second</name></Item>"#
    );
    Ok(())
}

#[test]
fn test_access_listener_sees_every_lookup() -> TestResult {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut cmd = Command::new("<Item type='Part' action='@1'><name>@0</name></Item>")
        .with_args(["x"])
        .with_access_listener(Arc::new(move |name: &str| {
            if let Ok(mut names) = sink.lock() {
                names.push(name.to_string());
            }
        }));
    cmd.to_normalized_aml(&ServerContext::default())?;

    let names = seen.lock().map_err(|_| "listener lock poisoned")?.clone();
    assert_eq!(names, vec!["1".to_string(), "0".to_string()]);
    Ok(())
}

#[test]
fn test_from_document_nodes() -> TestResult {
    let mut doc = Document::default();
    let part = doc.create_item("Part", Some("get"));
    let document = doc.create_item("Document", Some("get"));

    let single = Command::from_node(&doc, part)?;
    assert_eq!(single.action(), CommandAction::ApplyItem);
    assert_eq!(single.to_string(), r#"<Item type="Part" action="get" />"#);

    let many = Command::from_nodes(&doc, [part, document])?;
    assert_eq!(many.action(), CommandAction::ApplyAML);
    assert_eq!(
        many.to_string(),
        r#"<AML><Item type="Part" action="get" /><Item type="Document" action="get" /></AML>"#
    );

    let aml = doc.create_element("AML");
    doc.add(aml, vec![Content::from(part), Content::from(document)])?;
    assert_eq!(Command::from_node(&doc, aml)?.action(), CommandAction::ApplyAML);
    Ok(())
}

#[test]
fn test_action_names() {
    let cmd = Command::new("<x />").with_action_name("applysql");
    assert_eq!(cmd.action(), CommandAction::ApplySQL);
    assert_eq!(cmd.action_name(), "ApplySQL");

    let cmd = Command::new("<x />").with_action_name("CustomAction");
    assert_eq!(cmd.action_name(), "CustomAction");
    assert_eq!(cmd.accept_mime_type(), "text/xml");
}
