//! Property tests for text pre-processing through the parser

use std::sync::Arc;

use once_cell::sync::Lazy;
use proptest::prelude::*;

use xmlbinding::{Parser, ParserSettings, SchemaReader, Value, XsConfiguration, XsdSchema};

const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="count" type="xs:integer"/>
  <xs:element name="label" type="xs:token"/>
  <xs:element name="raw" type="xs:string"/>
  <xs:element name="values">
    <xs:simpleType>
      <xs:list itemType="xs:integer"/>
    </xs:simpleType>
  </xs:element>
</xs:schema>"#;

static SCHEMA: Lazy<Arc<XsdSchema>> = Lazy::new(|| SchemaReader::new().read_str(XSD).unwrap());

fn parse(xml: &str) -> Option<Value> {
    Parser::new(Arc::new(XsConfiguration))
        .with_settings(ParserSettings::new().with_schema(SCHEMA.clone()))
        .parse_str(xml)
        .unwrap()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

proptest! {
    #[test]
    fn prop_integer_ignores_surrounding_whitespace(
        n in any::<i64>(),
        before in "[ \t\n]{0,5}",
        after in "[ \t\n]{0,5}",
    ) {
        let xml = format!("<count>{}{}{}</count>", before, n, after);
        prop_assert_eq!(parse(&xml), Some(Value::Integer(n)));
    }

    #[test]
    fn prop_token_is_collapsed(text in "[ a-c\t\n]{0,30}") {
        let xml = format!("<label>{}</label>", text);
        let collapsed = collapse(&text);
        let expected = if collapsed.is_empty() { None } else { Some(Value::String(collapsed)) };
        prop_assert_eq!(parse(&xml), expected);
    }

    #[test]
    fn prop_string_is_preserved(text in "[ a-c\t\n]{0,30}") {
        let xml = format!("<raw>{}</raw>", text);
        let expected = if text.trim().is_empty() { None } else { Some(Value::String(text.clone())) };
        prop_assert_eq!(parse(&xml), expected);
    }

    #[test]
    fn prop_list_items_split_on_any_whitespace(
        items in prop::collection::vec((any::<i32>(), "[ \t\n]{1,3}"), 1..10),
    ) {
        let text: String = items.iter().map(|(n, sep)| format!("{}{}", n, sep)).collect();
        let xml = format!("<values>{}</values>", text);
        let expected: Vec<Value> = items.iter().map(|(n, _)| Value::Integer(i64::from(*n))).collect();
        prop_assert_eq!(parse(&xml), Some(Value::List(expected)));
    }
}
