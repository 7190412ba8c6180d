//! Binding dispatch integration tests
//!
//! Custom bindings registered through a configuration, checked against the
//! order they run in, execution modes, value type filtering and the
//! context handed to child elements.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use xmlbinding::parser::{InstanceComponent, NodeRef};
use xmlbinding::values::Object;
use xmlbinding::{
    Binding, BindingInfo, BindingLoader, BindingWalker, ComplexBinding, Configuration, Context, Encoder,
    EncoderSettings, Error, ExecutionMode, Parser, ParserSettings, Property, QName, Record, Result,
    SchemaIndex, SchemaReader, SimpleBinding, Value, ValueType, XsdSchema,
};

const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Base">
    <xs:restriction base="xs:string"/>
  </xs:simpleType>
  <xs:simpleType name="Derived">
    <xs:restriction base="Base"/>
  </xs:simpleType>
  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal"/>
  </xs:simpleType>

  <xs:complexType name="Point">
    <xs:sequence>
      <xs:element name="x" type="xs:integer"/>
      <xs:element name="y" type="xs:integer"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Measure">
    <xs:sequence>
      <xs:element name="amount" type="Amount"/>
    </xs:sequence>
  </xs:complexType>

  <xs:element name="tag" type="Derived"/>
  <xs:element name="point" type="Point"/>
  <xs:element name="measure" type="Measure"/>
  <xs:element name="amount" type="Amount"/>
</xs:schema>"#;

fn schema() -> Arc<XsdSchema> {
    SchemaReader::new().read_str(XSD).unwrap()
}

fn parse_with(configuration: impl Configuration + 'static, xml: &str) -> Result<Option<Value>> {
    Parser::new(Arc::new(configuration))
        .with_settings(ParserSettings::new().with_schema(schema()))
        .parse_str(xml)
}

// ============================================================================
// Dispatch Order
// ============================================================================

/// Appends its marker to string values
struct Marker {
    target: &'static str,
    marker: &'static str,
    mode: ExecutionMode,
}

impl BindingInfo for Marker {
    fn target(&self) -> Option<QName> {
        Some(QName::local(self.target))
    }

    fn value_type(&self) -> ValueType {
        ValueType::String
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl SimpleBinding for Marker {
    fn parse(&self, _instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
        Ok(value.map(|v| match v {
            Value::String(s) => Value::String(format!("{}|{}", s, self.marker)),
            other => other,
        }))
    }
}

struct Markers(Vec<(&'static str, &'static str, ExecutionMode)>);

impl Configuration for Markers {
    fn register_bindings(&self, loader: &mut BindingLoader) {
        for (target, marker, mode) in &self.0 {
            loader.register_instance(Binding::simple(Marker {
                target: *target,
                marker: *marker,
                mode: *mode,
            }));
        }
    }
}

#[test]
fn test_derived_binding_runs_before_base() {
    let config = Markers(vec![
        ("Base", "base", ExecutionMode::Chain),
        ("Derived", "derived", ExecutionMode::Chain),
    ]);
    let value = parse_with(config, "<tag>x</tag>").unwrap();
    assert_eq!(value, Some(Value::from("x|derived|base")));
}

#[test]
fn test_element_binding_runs_first() {
    let config = Markers(vec![
        ("Base", "base", ExecutionMode::Chain),
        ("tag", "element", ExecutionMode::Chain),
    ]);
    let value = parse_with(config, "<tag>x</tag>").unwrap();
    assert_eq!(value, Some(Value::from("x|element|base")));
}

#[test]
fn test_override_stops_at_binding() {
    let config = Markers(vec![
        ("Base", "base", ExecutionMode::Chain),
        ("Derived", "derived", ExecutionMode::Override),
    ]);
    let value = parse_with(config, "<tag>x</tag>").unwrap();
    assert_eq!(value, Some(Value::from("x|derived")));
}

#[test]
fn test_later_registration_replaces_earlier() {
    let config = Markers(vec![
        ("Derived", "first", ExecutionMode::Chain),
        ("Derived", "second", ExecutionMode::Chain),
    ]);
    let value = parse_with(config, "<tag>x</tag>").unwrap();
    assert_eq!(value, Some(Value::from("x|second")));
}

// ============================================================================
// Domain Objects
// ============================================================================

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl Object for Point {
    fn kind(&self) -> &str {
        "point"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn Object) -> bool {
        other.as_any().downcast_ref::<Point>() == Some(self)
    }
}

struct PointBinding(ExecutionMode);

impl BindingInfo for PointBinding {
    fn target(&self) -> Option<QName> {
        Some(QName::local("Point"))
    }

    fn value_type(&self) -> ValueType {
        ValueType::Object("point".to_string())
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.0
    }
}

impl ComplexBinding for PointBinding {
    fn parse(&self, _instance: &InstanceComponent, node: &NodeRef<'_>, _value: Option<Value>) -> Result<Option<Value>> {
        let coordinate = |name: &str| {
            node.child_value(&QName::local(name))
                .and_then(Value::as_integer)
                .ok_or_else(|| Error::Value(format!("point without {}", name)))
        };
        let point = Point {
            x: coordinate("x")?,
            y: coordinate("y")?,
        };
        Ok(Some(Value::Object(Arc::new(point))))
    }

    fn property(&self, value: &Value, name: &QName) -> Option<Property> {
        let point = value.downcast_ref::<Point>()?;
        match name.local_name.as_str() {
            "x" => Some(Property::One(Value::Integer(point.x))),
            "y" => Some(Property::One(Value::Integer(point.y))),
            _ => None,
        }
    }
}

struct PointConfiguration(ExecutionMode);

impl Configuration for PointConfiguration {
    fn register_bindings(&self, loader: &mut BindingLoader) {
        loader.register_instance(Binding::complex(PointBinding(self.0)));
    }
}

fn encoder(mode: ExecutionMode) -> Encoder {
    Encoder::new(Arc::new(PointConfiguration(mode)))
        .with_schema(schema())
        .with_settings(EncoderSettings::new().with_xml_declaration(false))
}

#[test]
fn test_object_round_trip() {
    let xml = "<point><x>1</x><y>2</y></point>";
    let value = parse_with(PointConfiguration(ExecutionMode::Chain), xml).unwrap().unwrap();
    assert_eq!(value.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));

    let encoded = encoder(ExecutionMode::Chain)
        .encode_to_string(Some(&value), &QName::local("point"))
        .unwrap();
    assert_eq!(encoded, xml);

    let reparsed = parse_with(PointConfiguration(ExecutionMode::Chain), &encoded).unwrap();
    assert_eq!(reparsed, Some(value));
}

#[test]
fn test_mismatched_value_uses_any_type_binding_once() {
    let parser = Parser::new(Arc::new(PointConfiguration(ExecutionMode::Override)));
    let walker = BindingWalker::new(parser.loader().clone());
    let index = SchemaIndex::new(vec![schema()]);
    let declaration = index.element(&QName::local("point")).unwrap();
    let def = index.element_type(&declaration);

    let value = Value::Record(Record::new());
    let mut visited = Vec::new();
    let count = walker
        .walk(
            &declaration.name,
            &def,
            Some(&value),
            &index,
            parser.context(),
            &mut |b: &Binding| -> Result<()> {
                visited.push(b.target());
                Ok(())
            },
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(visited, vec![Some(QName::xs("anyType"))]);
}

#[test]
fn test_record_encoded_through_any_type_binding() {
    let value = Value::Record(
        Record::new()
            .with_child(QName::local("x"), Value::Integer(3))
            .with_child(QName::local("y"), Value::Integer(4)),
    );
    let encoded = encoder(ExecutionMode::Override)
        .encode_to_string(Some(&value), &QName::local("point"))
        .unwrap();
    assert_eq!(encoded, "<point><x>3</x><y>4</y></point>");
}

// ============================================================================
// Child Context
// ============================================================================

struct Unit(String);

/// Registers the unit for the children of a measure
struct MeasureBinding;

impl BindingInfo for MeasureBinding {
    fn target(&self) -> Option<QName> {
        Some(QName::local("Measure"))
    }

    fn value_type(&self) -> ValueType {
        ValueType::Record
    }
}

impl ComplexBinding for MeasureBinding {
    fn parse(&self, _instance: &InstanceComponent, _node: &NodeRef<'_>, _value: Option<Value>) -> Result<Option<Value>> {
        Ok(None)
    }

    fn initialize_child_context(
        &self,
        _instance: &InstanceComponent,
        _node: &NodeRef<'_>,
        context: &Arc<Context>,
    ) -> Option<Arc<Context>> {
        let child = context.child();
        child.register(Unit("cm".to_string()));
        Some(child)
    }
}

/// Suffixes amounts with the unit it was built with
struct WithUnit(String);

impl BindingInfo for WithUnit {
    fn target(&self) -> Option<QName> {
        Some(QName::local("Amount"))
    }

    fn value_type(&self) -> ValueType {
        ValueType::String
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Override
    }
}

impl SimpleBinding for WithUnit {
    fn parse(&self, _instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
        Ok(value
            .and_then(|v| v.to_lexical())
            .map(|text| Value::String(format!("{} {}", text, self.0))))
    }
}

struct MeasureConfiguration;

impl Configuration for MeasureConfiguration {
    fn register_bindings(&self, loader: &mut BindingLoader) {
        loader.register_instance(Binding::complex(MeasureBinding));
        loader.register_factory(QName::local("Amount"), |context| {
            let unit = context
                .get::<Unit>()
                .map(|u| u.0.clone())
                .unwrap_or_else(|| "none".to_string());
            Ok(Binding::simple(WithUnit(unit)))
        });
    }
}

#[test]
fn test_child_context_reaches_child_bindings() {
    let value = parse_with(MeasureConfiguration, "<measure><amount>12.5</amount></measure>")
        .unwrap()
        .unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.child_local("amount"), Some(&Value::from("12.5 cm")));
}

#[test]
fn test_child_context_not_visible_outside() {
    let value = parse_with(MeasureConfiguration, "<amount>3</amount>").unwrap();
    assert_eq!(value, Some(Value::from("3 none")));
}

// ============================================================================
// Per-document Bindings
// ============================================================================

/// Builds the Amount binding from the configuration found in the context
/// and counts how often it does
struct CountingConfiguration {
    built: Arc<AtomicUsize>,
}

impl Configuration for CountingConfiguration {
    fn namespace(&self) -> Option<&str> {
        Some("urn:units")
    }

    fn register_bindings(&self, loader: &mut BindingLoader) {
        let built = self.built.clone();
        loader.register_factory(QName::local("Amount"), move |context| {
            built.fetch_add(1, Ordering::SeqCst);
            let configuration = context.require::<Arc<dyn Configuration>>()?;
            let unit = configuration.namespace().unwrap_or("none").to_string();
            Ok(Binding::simple(WithUnit(unit)))
        });
    }
}

#[test]
fn test_factory_binding_built_once_per_document() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut parser = Parser::new(Arc::new(CountingConfiguration { built: built.clone() }))
        .with_settings(ParserSettings::new().with_schema(schema()));

    assert_eq!(parser.parse_str("<amount>1</amount>").unwrap(), Some(Value::from("1 urn:units")));
    assert_eq!(parser.parse_str("<amount>2</amount>").unwrap(), Some(Value::from("2 urn:units")));
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn test_encoder_builds_factory_binding_per_document() {
    let built = Arc::new(AtomicUsize::new(0));
    let encoder = Encoder::new(Arc::new(CountingConfiguration { built: built.clone() }))
        .with_schema(schema())
        .with_settings(EncoderSettings::new().with_xml_declaration(false));

    for _ in 0..2 {
        let xml = encoder
            .encode_to_string(Some(&Value::from("4")), &QName::local("amount"))
            .unwrap();
        assert_eq!(xml, "<amount>4</amount>");
    }
    assert_eq!(built.load(Ordering::SeqCst), 2);
}
