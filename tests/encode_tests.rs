//! Encoding integration tests
//!
//! Parse-encode-parse round trips and the shape of encoded documents.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use xmlbinding::{
    Encoder, EncoderSettings, Error, Parser, ParserSettings, QName, Record, SchemaReader, Value,
    XsConfiguration, XsdSchema,
};

const NS: &str = "urn:shop";

const XSD: &str = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns="urn:shop" targetNamespace="urn:shop" elementFormDefault="qualified">
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="line" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="sku" type="xs:string"/>
              <xs:element name="qty" type="xs:integer"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="tags" type="Tags" minOccurs="0"/>
        <xs:element name="placed" type="xs:date"/>
        <xs:any namespace="##any" processContents="lax" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:integer" use="required"/>
      <xs:attribute name="rush" type="xs:boolean"/>
    </xs:complexType>
  </xs:element>
  <xs:simpleType name="Tags">
    <xs:list itemType="xs:token"/>
  </xs:simpleType>
</xs:schema>"###;

const ORDER: &str = r#"<order xmlns="urn:shop" id="17" rush="true">
  <line><sku>A-1</sku><qty>2</qty></line>
  <line><sku>B-2</sku><qty>5</qty></line>
  <tags>gift  fragile</tags>
  <placed>2024-03-01</placed>
</order>"#;

fn schema() -> Arc<XsdSchema> {
    SchemaReader::new().read_str(XSD).unwrap()
}

fn parse(xml: &str) -> Option<Value> {
    Parser::new(Arc::new(XsConfiguration))
        .with_settings(ParserSettings::new().with_schema(schema()))
        .parse_str(xml)
        .unwrap()
}

fn encoder(settings: EncoderSettings) -> Encoder {
    Encoder::new(Arc::new(XsConfiguration))
        .with_schema(schema())
        .with_settings(settings)
}

fn name(local: &str) -> QName {
    QName::namespaced(NS, local)
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_round_trip_preserves_value() {
    let value = parse(ORDER).unwrap();
    let xml = encoder(EncoderSettings::new())
        .encode_to_string(Some(&value), &name("order"))
        .unwrap();
    assert_eq!(parse(&xml), Some(value));
}

#[test]
fn test_round_trip_pretty_output() {
    let value = parse(ORDER).unwrap();
    let xml = encoder(EncoderSettings::new().with_pretty(true))
        .encode_to_string(Some(&value), &name("order"))
        .unwrap();
    assert!(xml.contains('\n'));
    assert_eq!(parse(&xml), Some(value));
}

#[test]
fn test_parsed_values_are_typed() {
    let value = parse(ORDER).unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.attribute(&QName::local("id")), Some(&Value::Integer(17)));
    assert_eq!(record.attribute(&QName::local("rush")), Some(&Value::Boolean(true)));
    assert_eq!(record.children_named(&name("line")).len(), 2);
    assert_eq!(
        record.child(&name("tags")),
        Some(&Value::List(vec![Value::from("gift"), Value::from("fragile")]))
    );
}

// ============================================================================
// Document Shape
// ============================================================================

fn line(sku: &str, qty: i64) -> Value {
    Value::Record(
        Record::new()
            .with_child(name("sku"), Value::from(sku))
            .with_child(name("qty"), Value::Integer(qty)),
    )
}

#[test]
fn test_children_written_in_schema_order() {
    let value = Value::Record(
        Record::new()
            .with_attribute(QName::local("id"), Value::Integer(1))
            .with_child(name("placed"), Value::from("2024-01-02"))
            .with_child(name("line"), line("C-3", 1)),
    );
    let xml = encoder(EncoderSettings::new().with_xml_declaration(false))
        .encode_to_string(Some(&value), &name("order"))
        .unwrap();
    assert_eq!(
        xml,
        r#"<order xmlns="urn:shop" id="1"><line><sku>C-3</sku><qty>1</qty></line><placed>2024-01-02</placed></order>"#
    );
}

#[test]
fn test_repeated_values_written_as_siblings() {
    let value = Value::Record(
        Record::new()
            .with_attribute(QName::local("id"), Value::Integer(2))
            .with_child(name("line"), line("A", 1))
            .with_child(name("line"), line("B", 2))
            .with_child(name("line"), line("C", 3))
            .with_child(name("placed"), Value::from("2024-01-02")),
    );
    let xml = encoder(EncoderSettings::new())
        .encode_to_string(Some(&value), &name("order"))
        .unwrap();
    assert_eq!(xml.matches("<line>").count(), 3);
    assert!(xml.find("<sku>A</sku>") < xml.find("<sku>C</sku>"));
}

#[test]
fn test_undeclared_children_kept() {
    let value = Value::Record(
        Record::new()
            .with_attribute(QName::local("id"), Value::Integer(3))
            .with_child(name("placed"), Value::from("2024-01-02"))
            .with_child(name("memo"), Value::from("one"))
            .with_child(name("memo"), Value::from("two")),
    );
    let xml = encoder(EncoderSettings::new())
        .encode_to_string(Some(&value), &name("order"))
        .unwrap();
    assert_eq!(xml.matches("<memo>").count(), 2);
    assert!(xml.find("<placed>") < xml.find("<memo>"));
}

#[test]
fn test_encode_unknown_element_fails() {
    let err = encoder(EncoderSettings::new())
        .encode(Some(&Value::from("x")), &name("invoice"))
        .unwrap_err();
    assert!(matches!(err, Error::Declaration { .. }), "unexpected error: {err}");
}

#[test]
fn test_encode_document_root() {
    let value = Value::Record(
        Record::new()
            .with_attribute(QName::local("id"), Value::Integer(4))
            .with_child(name("placed"), Value::from("2024-01-02")),
    );
    let document = encoder(EncoderSettings::new())
        .encode(Some(&value), &name("order"))
        .unwrap();
    let root = document.root.unwrap();
    assert_eq!(root.local_name(), "order");
    assert_eq!(root.namespace(), Some(NS));
    assert_eq!(root.get_attribute("id"), Some("4"));
    assert_eq!(root.first_child("placed").unwrap().text(), "2024-01-02");
}
