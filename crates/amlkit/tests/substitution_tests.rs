use amlkit::{
    Command, DateMagnitude, DynamicDateRange, ErrorKind, Mode, ParameterSubstitution,
    RawLocation, ServerContext, StaticDateRange, Value,
};
use time::macros::datetime;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn render(template: &str, args: Vec<Value>) -> amlkit::Result<String> {
    let mut sub = ParameterSubstitution::new();
    sub.add_indexed_parameters(args);
    sub.substitute(template, &ServerContext::default())
}

#[test]
fn test_text_values_are_escaped_and_formatted() -> TestResult {
    let output = render(
        "<Item><name>@0</name><is_current>@1</is_current><date>@2</date></Item>",
        vec![
            Value::from("first & second > third"),
            Value::from(true),
            Value::from(datetime!(2015-01-01 0:00)),
        ],
    )?;
    assert_eq!(
        output,
        "<Item><name>first &amp; second &gt; third</name><is_current>1</is_current><date>2015-01-01T00:00:00</date></Item>"
    );
    Ok(())
}

#[test]
fn test_in_condition_quotes_each_member() -> TestResult {
    let output = render(
        "<name condition='in'>@0</name>",
        vec![Value::list(["1", "2", "3"])],
    )?;
    assert_eq!(output, r#"<name condition="in">N'1',N'2',N'3'</name>"#);

    let numeric = render("<id condition='in'>@0</id>", vec![Value::list([1, 2, 3])])?;
    assert_eq!(numeric, r#"<id condition="in">1,2,3</id>"#);
    Ok(())
}

#[test]
fn test_in_condition_escapes_quotes_and_markup() -> TestResult {
    let output = render(
        "<name condition='not in'>@0</name>",
        vec![Value::list(["O'Brien", "<x>"])],
    )?;
    assert_eq!(
        output,
        r#"<name condition="not in">N'O''Brien',N'&lt;x&gt;'</name>"#
    );
    Ok(())
}

#[test]
fn test_empty_list_renders_sentinel() -> TestResult {
    let output = render(
        "<name condition='in'>@0</name>",
        vec![Value::List(Vec::new())],
    )?;
    assert_eq!(
        output,
        r#"<name condition="in">N'`EMTPY_VALUE_LIST`'</name>"#
    );
    Ok(())
}

#[test]
fn test_idlist_attribute_is_unquoted() -> TestResult {
    let output = render(
        "<Item type='Part' action='get' idlist='@0' />",
        vec![Value::list(["A1", "B2"])],
    )?;
    assert_eq!(
        output,
        r#"<Item type="Part" action="get" idlist="A1,B2" />"#
    );
    Ok(())
}

#[test]
fn test_raw_parameter_in_text_is_not_escaped() -> TestResult {
    let raw = render("<is_current>@0!</is_current>", vec![Value::from("<Item />")])?;
    assert_eq!(raw, "<is_current><Item /></is_current>");

    let escaped = render("<name>@0</name>", vec![Value::from("<Item />")])?;
    assert_eq!(escaped, "<name>&lt;Item /&gt;</name>");
    Ok(())
}

#[test]
fn test_raw_parameter_rejected_in_attribute_and_cdata() {
    let attr = render("<Item id='@0!' />", vec![Value::from("x")]);
    assert!(matches!(
        attr.as_ref().map_err(amlkit::Error::kind),
        Err(ErrorKind::RawParameterNotAllowed {
            location: RawLocation::Attribute
        })
    ));

    let cdata = render("<sql><![CDATA[@0!]]></sql>", vec![Value::from("x")]);
    assert!(matches!(
        cdata.as_ref().map_err(amlkit::Error::kind),
        Err(ErrorKind::RawParameterNotAllowed {
            location: RawLocation::CData
        })
    ));
}

#[test]
fn test_unresolved_raw_parameter_rejected_in_attribute_and_cdata() {
    let attr = render("<Item id='@missing!' />", Vec::new());
    assert!(matches!(
        attr.as_ref().map_err(amlkit::Error::kind),
        Err(ErrorKind::RawParameterNotAllowed {
            location: RawLocation::Attribute
        })
    ));

    let cdata = render("<sql><![CDATA[@missing!]]></sql>", Vec::new());
    assert!(matches!(
        cdata.as_ref().map_err(amlkit::Error::kind),
        Err(ErrorKind::RawParameterNotAllowed {
            location: RawLocation::CData
        })
    ));
}

#[test]
fn test_flat_sql_quoting() -> TestResult {
    let output = render("select @0", vec![Value::from("test '>' thing")])?;
    assert_eq!(output, "select N'test ''>'' thing'");

    let output = render(
        "select * from t where a = @0 and b = @1 and c = @2",
        vec![Value::from(42), Value::Null, Value::from(1.5)],
    )?;
    assert_eq!(output, "select * from t where a = 42 and b = null and c = 1.5");

    let output = render("select @0, @1", vec![Value::from(true), Value::from(false)])?;
    assert_eq!(output, "select N'1', N'0'");
    Ok(())
}

#[test]
fn test_flat_sql_in_clause_adds_parentheses() -> TestResult {
    let list = Value::list(["a", "b'c"]);
    let output = render("select * from t where id in @0", vec![list.clone()])?;
    assert_eq!(output, "select * from t where id in (N'a',N'b''c')");

    let output = render("select * from t where id IN (@0)", vec![list])?;
    assert_eq!(output, "select * from t where id IN (N'a',N'b''c')");
    Ok(())
}

#[test]
fn test_flat_sql_skips_literals_and_comments() -> TestResult {
    let output = render(
        "select '@0', [@0], \"@0\" -- @0\n/* @0 */ from t where x = @0",
        vec![Value::from("v")],
    )?;
    assert_eq!(
        output,
        "select '@0', [@0], \"@0\" -- @0\n/* @0 */ from t where x = N'v'"
    );
    Ok(())
}

#[test]
fn test_unresolved_parameters_pass_through() -> TestResult {
    let output = render("select @missing from t", Vec::new())?;
    assert_eq!(output, "select @missing from t");

    let output = render("<Item><name>@missing</name></Item>", vec![Value::from("x")])?;
    assert_eq!(output, "<Item><name>@missing</name></Item>");

    let output = render("<Item><name>@missing!</name></Item>", Vec::new())?;
    assert_eq!(output, "<Item><name>@missing!</name></Item>");
    Ok(())
}

#[test]
fn test_parenthesized_in_text_uses_flat_sql_rules() -> TestResult {
    let output = render(
        "<id condition='in'>(@0)</id>",
        vec![Value::list(["a", "b'c"])],
    )?;
    assert_eq!(output, r#"<id condition="in">N'a',N'b''c'</id>"#);

    let output = render(
        "<id condition='in'>(@0, @1)</id>",
        vec![Value::from("a"), Value::from(2)],
    )?;
    assert_eq!(output, r#"<id condition="in">N'a', 2</id>"#);

    let output = render("<id condition='not in'>('x', @0)</id>", vec![Value::from("y")])?;
    assert_eq!(output, r#"<id condition="not in">('x', N'y')</id>"#);
    Ok(())
}

#[test]
fn test_between_keeps_unresolved_text() -> TestResult {
    let output = render(
        "<created_on condition='between'>@missing</created_on>",
        vec![Value::from("x")],
    )?;
    assert_eq!(output, r#"<created_on condition="between">@missing</created_on>"#);

    let output = render(
        "<created_on condition='between'>2020-01-01 and @0</created_on>",
        vec![Value::from("x")],
    )?;
    assert_eq!(
        output,
        r#"<created_on condition="between">2020-01-01 and @0</created_on>"#
    );
    Ok(())
}

#[test]
fn test_sql_element_uses_flat_sql_rules() -> TestResult {
    let output = render(
        "<Item action='SQL Process'><sql>select 1 where name = @0</sql></Item>",
        vec![Value::from("it's")],
    )?;
    assert_eq!(
        output,
        r#"<Item action="SQL Process"><sql>select 1 where name = N'it''s'</sql></Item>"#
    );
    Ok(())
}

#[test]
fn test_where_attribute_uses_flat_sql_rules() -> TestResult {
    let output = render(
        "<Item type='Part' action='get' where='[Part].name = @0' />",
        vec![Value::from("x")],
    )?;
    assert_eq!(
        output,
        r#"<Item type="Part" action="get" where="[Part].name = N'x'" />"#
    );
    Ok(())
}

#[test]
fn test_sql_mode_never_walks_xml() -> TestResult {
    let mut sub = ParameterSubstitution::new();
    sub.set_mode(Mode::Sql);
    sub.add_parameter("name", "x");
    let output = sub.substitute("<b>@name</b>", &ServerContext::default())?;
    assert_eq!(output, "<b>N'x'</b>");
    Ok(())
}

#[test]
fn test_static_template_is_untouched() -> TestResult {
    let template = "<Item  type='Part'   action=\"get\" ><name>a</name></Item>";
    let mut cmd = Command::new(template);
    assert_eq!(cmd.to_normalized_aml(&ServerContext::default())?, template);
    Ok(())
}

#[test]
fn test_dynamic_date_range_in_text() -> TestResult {
    let context = ServerContext::default().with_fixed_clock(datetime!(2024-03-15 10:30));
    let mut sub = ParameterSubstitution::new();
    sub.add_parameter(
        "0",
        DynamicDateRange::new(DateMagnitude::Month, -1, DateMagnitude::Month, -1),
    );
    let output = sub.substitute("<Item><created_on>@0</created_on></Item>", &context)?;
    assert_eq!(
        output,
        r#"<Item><created_on condition="between" origDateRange="Dynamic|Month|-1|Month|-1">2024-02-01T00:00:00 and 2024-02-29T23:59:59</created_on></Item>"#
    );
    Ok(())
}

#[test]
fn test_open_date_range_sets_single_bound_condition() -> TestResult {
    let context = ServerContext::default().with_fixed_clock(datetime!(2024-03-15 10:30));
    let mut sub = ParameterSubstitution::new();
    sub.add_parameter("0", DynamicDateRange::starting(DateMagnitude::Day, 0));
    let output = sub.substitute("<created_on>@0</created_on>", &context)?;
    assert_eq!(
        output,
        r#"<created_on condition="ge" origDateRange="Dynamic|Day|0|Year|1000">2024-03-15T00:00:00</created_on>"#
    );
    Ok(())
}

#[test]
fn test_explicit_condition_is_kept() -> TestResult {
    let mut sub = ParameterSubstitution::new();
    sub.add_parameter(
        "0",
        StaticDateRange::new(Some(datetime!(2024-01-01 0:00)), None),
    );
    let output = sub.substitute(
        "<modified_on condition='gt'>@0</modified_on>",
        &ServerContext::default(),
    )?;
    assert_eq!(
        output,
        r#"<modified_on condition="gt">2024-01-01T00:00:00</modified_on>"#
    );
    Ok(())
}

#[test]
fn test_orig_date_range_is_re_evaluated() -> TestResult {
    let context = ServerContext::default().with_fixed_clock(datetime!(2024-07-04 8:00));
    let mut cmd = Command::new(
        "<created_on origDateRange='Dynamic|Year|0|Year|0'>2020-01-01T00:00:00 and 2020-12-31T23:59:59</created_on>",
    );
    assert_eq!(
        cmd.to_normalized_aml(&context)?,
        r#"<created_on origDateRange="Dynamic|Year|0|Year|0" condition="between">2024-01-01T00:00:00 and 2024-12-31T23:59:59</created_on>"#
    );
    Ok(())
}

#[test]
fn test_date_conversion_between_zones() -> TestResult {
    let context = ServerContext::default()
        .with_local_offset(time::macros::offset!(+2))
        .with_time_zone(time::macros::offset!(-5));
    let mut sub = ParameterSubstitution::new();
    sub.add_parameter("0", datetime!(2024-06-01 12:00));
    assert_eq!(
        sub.substitute("<d>@0</d>", &context)?,
        "<d>2024-06-01T05:00:00</d>"
    );
    Ok(())
}

#[test]
fn test_named_and_csharp_parameters() -> TestResult {
    let mut cmd = Command::new("<Item type='{0}' action='get'><name>{1}</name></Item>")
        .with_style(amlkit::ParameterStyle::CSharp)
        .with_args(["Part", "a<b"]);
    assert_eq!(
        cmd.to_normalized_aml(&ServerContext::default())?,
        r#"<Item type="Part" action="get"><name>a&lt;b</name></Item>"#
    );

    let mut cmd = Command::new("<Item type='Part' action='get'><name>@name</name></Item>")
        .with_param("name", "x");
    assert_eq!(
        cmd.to_normalized_aml(&ServerContext::default())?,
        r#"<Item type="Part" action="get"><name>x</name></Item>"#
    );
    Ok(())
}
