//! Streaming integration tests
//!
//! Large repetitive documents delivered element by element, through the
//! synchronous delivery buffer and through the background parser.

use std::io::Cursor;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use xmlbinding::events::{EventReader, XmlEvent};
use xmlbinding::parser::{DeliveryBuffer, ParserHandler};
use xmlbinding::{
    BindingWalker, Error, Parser, ParserSettings, QName, SchemaReader, Value, XsConfiguration, XsdSchema,
};

const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="batch">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="header" type="xs:string"/>
        <xs:element name="record" type="Record" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="Record">
    <xs:sequence>
      <xs:element name="name" type="xs:string"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:integer"/>
  </xs:complexType>
</xs:schema>"#;

fn schema() -> Arc<XsdSchema> {
    SchemaReader::new().read_str(XSD).unwrap()
}

fn batch(count: usize) -> String {
    let mut xml = String::from("<batch><header>h</header>");
    for i in 0..count {
        xml.push_str(&format!(r#"<record id="{i}"><name>n{i}</name></record>"#));
    }
    xml.push_str("</batch>");
    xml
}

fn settings() -> ParserSettings {
    ParserSettings::new()
        .with_schema(schema())
        .with_streaming_target(QName::wildcard("record"))
}

fn record_id(value: &Value) -> Option<i64> {
    value
        .as_record()
        .and_then(|r| r.attribute(&QName::local("id")))
        .and_then(Value::as_integer)
}

// ============================================================================
// Delivery Buffer
// ============================================================================

#[test]
fn test_records_delivered_in_document_order() {
    let mut parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    let root = parser.parse_str(&batch(10_000)).unwrap().unwrap();

    let buffer = parser.buffer().unwrap().clone();
    assert!(buffer.is_closed());
    let ids: Vec<i64> = buffer.iter().map(|item| record_id(&item.unwrap()).unwrap()).collect();
    assert_eq!(ids.len(), 10_000);
    assert!(ids.iter().enumerate().all(|(i, id)| *id == i as i64));

    let root = root.as_record().unwrap();
    assert_eq!(root.child_local("header"), Some(&Value::from("h")));
    assert!(root.children_named(&QName::local("record")).is_empty());
}

#[test]
fn test_delivered_record_content() {
    let mut parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    parser.parse_str(&batch(1)).unwrap();
    let value = parser.buffer().unwrap().take().unwrap().unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.child_local("name"), Some(&Value::from("n0")));
    assert_eq!(record.type_name, Some(QName::local("Record")));
}

#[test]
fn test_tree_pruned_after_delivery() {
    let parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    let buffer = Arc::new(DeliveryBuffer::new());
    let mut handler = ParserHandler::new(
        parser.settings().clone(),
        parser.context().clone(),
        BindingWalker::new(parser.loader().clone()),
        None,
    )
    .with_buffer(buffer.clone());

    let xml = batch(500);
    let mut reader = EventReader::from_str(&xml);
    let mut peak = 0;
    loop {
        let event = reader.next_event().unwrap();
        let end = matches!(event, XmlEvent::EndDocument);
        handler.handle(event).unwrap();
        peak = peak.max(handler.node_count());
        if end {
            break;
        }
    }

    assert_eq!(buffer.len(), 500);
    // batch, header, one record with its id and name
    assert!(peak <= 5, "peak node count {peak}");
    // batch and header
    assert_eq!(handler.node_count(), 2);
}

#[test]
fn test_root_as_target_yields_no_result() {
    let mut parser = Parser::new(Arc::new(XsConfiguration)).with_settings(
        ParserSettings::new()
            .with_schema(schema())
            .with_streaming_target(QName::local("batch")),
    );
    assert_eq!(parser.parse_str(&batch(2)).unwrap(), None);
    assert_eq!(parser.buffer().unwrap().len(), 1);
}

#[test]
fn test_buffer_renewed_between_parses() {
    let mut parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    parser.parse_str(&batch(3)).unwrap();
    parser.parse_str(&batch(2)).unwrap();
    let buffer = parser.buffer().unwrap();
    assert_eq!(buffer.iter().count(), 2);
}

// ============================================================================
// Background Parser
// ============================================================================

#[test]
fn test_streaming_parser_yields_records() {
    let parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    let stream = parser.stream(Cursor::new(batch(1_000))).unwrap();
    let ids: Vec<i64> = stream.map(|item| record_id(&item.unwrap()).unwrap()).collect();
    assert_eq!(ids, (0..1_000).collect::<Vec<i64>>());
}

#[test]
fn test_streaming_parser_delivers_error_last() {
    let parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    let xml = r#"<batch><header>h</header><record id="1"><name>a</name></record><record id="x"><name>b</name></record></batch>"#;
    let items: Vec<_> = parser.stream(Cursor::new(xml.to_string())).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(record_id(items[0].as_ref().unwrap()), Some(1));
    assert!(items[1].is_err());
}

#[test]
fn test_streaming_parser_needs_target() {
    let parser = Parser::new(Arc::new(XsConfiguration))
        .with_settings(ParserSettings::new().with_schema(schema()));
    let err = parser.stream(Cursor::new(batch(1))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_streaming_parser_join() {
    let parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings());
    let mut stream = parser.stream(Cursor::new(batch(5))).unwrap();
    let first = stream.next().unwrap().unwrap();
    assert_eq!(record_id(&first), Some(0));
    assert_eq!(stream.by_ref().count(), 4);
    stream.join().unwrap();
}
