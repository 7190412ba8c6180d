//! Built-in XS bindings
//!
//! One binding per built-in type that needs its own value space: the
//! primitives, the bounded integer types, and the two roots (anyType,
//! anySimpleType). Derived string types (token, NCName, ...) have no binding
//! of their own; the walker reaches the xs:string binding through their
//! base chain.

use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::Decimal;

use crate::codecs::{Duration, XsDate, XsDateTime, XsTime};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::context::Context;
use crate::namespaces::{DocumentNamespaces, QName};
use crate::parser::tree::{InstanceComponent, NodeRef};
use crate::schema::builtins::*;
use crate::values::{format_double, Record, Value, ValueType};

use super::registry::BindingLoader;
use super::{Binding, BindingInfo, ComplexBinding, Property, SimpleBinding};

// =============================================================================
// Roots
// =============================================================================

/// Binding for xs:anyType: builds a [`Record`] from attributes, children
/// and text, and exposes records to the encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyTypeBinding;

impl BindingInfo for AnyTypeBinding {
    fn target(&self) -> Option<QName> {
        Some(QName::xs(XSD_ANY_TYPE))
    }

    fn value_type(&self) -> ValueType {
        ValueType::Any
    }
}

impl ComplexBinding for AnyTypeBinding {
    fn parse(
        &self,
        instance: &InstanceComponent,
        node: &NodeRef<'_>,
        value: Option<Value>,
    ) -> Result<Option<Value>> {
        if matches!(value, Some(Value::Record(_)) | Some(Value::Object(_))) {
            return Ok(value);
        }
        if !node.has_attributes() && !node.has_children() {
            if value.is_some() || instance.is_attribute() || instance.type_definition.is_simple() {
                return Ok(value);
            }
            if let Some(complex) = instance.type_definition.as_complex() {
                if matches!(complex.content, crate::schema::ContentModel::Simple) {
                    return Ok(None);
                }
            }
        }

        let mut record = Record::new();
        record.type_name = instance.type_definition.name().cloned();
        for attribute in node.attributes() {
            if let Some(v) = attribute.value() {
                record.attributes.insert(attribute.component().name.clone(), v.clone());
            }
        }
        for child in node.children() {
            if let Some(v) = child.value() {
                record.children.push((child.component().name.clone(), v.clone()));
            }
        }
        record.text = value.map(Box::new);
        Ok(Some(Value::Record(record)))
    }

    fn encode(&self, value: &Value, mut element: Element) -> Result<Element> {
        let has_content = !element.children.is_empty();
        if has_content {
            return Ok(element);
        }
        let text = match value {
            Value::Record(record) => record.text.as_ref().and_then(|t| t.to_lexical()),
            Value::Object(_) => None,
            scalar => scalar.to_lexical(),
        };
        if let Some(text) = text {
            element.set_text(text);
        }
        Ok(element)
    }

    fn property(&self, value: &Value, name: &QName) -> Option<Property> {
        let record = value.as_record()?;
        let children: Vec<Value> = record.children_named(name).into_iter().cloned().collect();
        if !children.is_empty() {
            return Property::from_values(children, false);
        }
        record.attribute(name).cloned().map(Property::One)
    }

    fn properties(&self, value: &Value) -> Vec<(QName, Value)> {
        match value {
            Value::Record(record) => record.children.clone(),
            _ => Vec::new(),
        }
    }

    fn attributes(&self, value: &Value) -> Vec<(QName, Value)> {
        match value {
            Value::Record(record) => record
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Binding for xs:anySimpleType; passes values through
#[derive(Debug, Default, Clone, Copy)]
pub struct AnySimpleTypeBinding;

impl BindingInfo for AnySimpleTypeBinding {
    fn target(&self) -> Option<QName> {
        Some(QName::xs(XSD_ANY_SIMPLE_TYPE))
    }

    fn value_type(&self) -> ValueType {
        ValueType::Any
    }
}

impl SimpleBinding for AnySimpleTypeBinding {
    fn parse(&self, _instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
        Ok(value)
    }
}

// =============================================================================
// Atomic types
// =============================================================================

type LexicalParser = fn(&str, &InstanceComponent) -> Result<Value>;
type LexicalWriter = fn(&Value, &mut Element) -> Option<String>;

/// Binding for a built-in atomic type, driven by a lexical parser and an
/// optional inclusive integer range
#[derive(Clone)]
pub struct AtomicBinding {
    target: QName,
    value_type: ValueType,
    parser: LexicalParser,
    writer: Option<LexicalWriter>,
    bounds: (Option<Decimal>, Option<Decimal>),
}

impl std::fmt::Debug for AtomicBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicBinding")
            .field("target", &self.target)
            .field("value_type", &self.value_type)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl AtomicBinding {
    /// Create a binding for the built-in type `local_name`
    pub fn new(local_name: &str, value_type: ValueType, parser: LexicalParser) -> Self {
        Self {
            target: QName::xs(local_name),
            value_type,
            parser,
            writer: None,
            bounds: (None, None),
        }
    }

    fn with_writer(mut self, writer: LexicalWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    fn with_bounds(mut self, min: Option<i128>, max: Option<i128>) -> Self {
        self.bounds = (min.and_then(to_decimal), max.and_then(to_decimal));
        self
    }

    fn check_bounds(&self, value: &Value) -> Result<()> {
        let number = match value {
            Value::Integer(i) => Decimal::from(*i),
            Value::Decimal(d) => *d,
            _ => return Ok(()),
        };
        let (min, max) = &self.bounds;
        if min.map(|m| number < m).unwrap_or(false) || max.map(|m| number > m).unwrap_or(false) {
            return Err(Error::Value(format!(
                "{} is out of range for {}",
                number, self.target.local_name
            )));
        }
        Ok(())
    }
}

fn to_decimal(n: i128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(n, 0).ok()
}

impl BindingInfo for AtomicBinding {
    fn target(&self) -> Option<QName> {
        Some(self.target.clone())
    }

    fn value_type(&self) -> ValueType {
        self.value_type.clone()
    }
}

impl SimpleBinding for AtomicBinding {
    fn parse(&self, instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
        match value {
            Some(Value::String(text)) if self.value_type != ValueType::String => {
                let parsed = (self.parser)(&text, instance)?;
                self.check_bounds(&parsed)?;
                Ok(Some(parsed))
            }
            Some(other) => {
                if self.value_type.is_assignable_from(&other.value_type()) {
                    self.check_bounds(&other)?;
                }
                Ok(Some(other))
            }
            None => Ok(None),
        }
    }

    fn encode(&self, value: &Value, text: Option<String>, owner: &mut Element) -> Result<Option<String>> {
        if text.is_some() {
            return Ok(text);
        }
        self.check_bounds(value)?;
        let text = match self.writer {
            Some(writer) => writer(value, owner),
            None => value.to_lexical(),
        };
        Ok(text)
    }
}

fn parse_string(text: &str, _: &InstanceComponent) -> Result<Value> {
    Ok(Value::String(text.to_string()))
}

fn parse_boolean(text: &str, _: &InstanceComponent) -> Result<Value> {
    match text {
        "true" | "1" => Ok(Value::Boolean(true)),
        "false" | "0" => Ok(Value::Boolean(false)),
        _ => Err(Error::Value(format!("'{}' is not a valid xs:boolean", text))),
    }
}

fn is_decimal_lexical(text: &str, allow_point: bool) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if allow_point && !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}

fn parse_decimal(text: &str, _: &InstanceComponent) -> Result<Value> {
    if !is_decimal_lexical(text, true) {
        return Err(Error::Value(format!("'{}' is not a valid xs:decimal", text)));
    }
    let unsigned = text.strip_prefix('+').unwrap_or(text);
    Decimal::from_str(unsigned)
        .map(Value::Decimal)
        .map_err(|e| Error::Value(format!("'{}' is not a valid xs:decimal: {}", text, e)))
}

fn parse_integer(text: &str, _: &InstanceComponent) -> Result<Value> {
    if !is_decimal_lexical(text, false) {
        return Err(Error::Value(format!("'{}' is not a valid xs:integer", text)));
    }
    let unsigned = text.strip_prefix('+').unwrap_or(text);
    if let Ok(i) = unsigned.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    Decimal::from_str(unsigned)
        .map(Value::Decimal)
        .map_err(|e| Error::Value(format!("'{}' is out of range: {}", text, e)))
}

fn parse_f64(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ if text.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => text.parse().ok(),
        _ => None,
    }
}

fn parse_double(text: &str, _: &InstanceComponent) -> Result<Value> {
    parse_f64(text)
        .map(Value::Double)
        .ok_or_else(|| Error::Value(format!("'{}' is not a valid xs:double", text)))
}

fn parse_float(text: &str, _: &InstanceComponent) -> Result<Value> {
    parse_f64(text)
        .map(|f| Value::Float(f as f32))
        .ok_or_else(|| Error::Value(format!("'{}' is not a valid xs:float", text)))
}

fn write_float(value: &Value, _: &mut Element) -> Option<String> {
    match value {
        Value::Float(f) => Some(format_double(f64::from(*f))),
        Value::Double(d) => Some(format_double(*d)),
        other => other.to_lexical(),
    }
}

fn parse_duration(text: &str, _: &InstanceComponent) -> Result<Value> {
    Duration::parse(text).map(Value::Duration)
}

fn parse_date_time(text: &str, _: &InstanceComponent) -> Result<Value> {
    XsDateTime::parse(text).map(Value::DateTime)
}

fn parse_date(text: &str, _: &InstanceComponent) -> Result<Value> {
    XsDate::parse(text).map(Value::Date)
}

fn parse_time(text: &str, _: &InstanceComponent) -> Result<Value> {
    XsTime::parse(text).map(Value::Time)
}

fn parse_hex_binary(text: &str, _: &InstanceComponent) -> Result<Value> {
    let invalid = || Error::Value(format!("'{}' is not a valid xs:hexBinary", text));
    if text.len() % 2 != 0 {
        return Err(invalid());
    }
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for pair in text.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
        bytes.push(u8::from_str_radix(pair, 16).map_err(|_| invalid())?);
    }
    Ok(Value::Binary(bytes))
}

fn write_hex_binary(value: &Value, _: &mut Element) -> Option<String> {
    match value {
        Value::Binary(bytes) => Some(bytes.iter().map(|b| format!("{:02X}", b)).collect()),
        other => other.to_lexical(),
    }
}

fn parse_base64_binary(text: &str, _: &InstanceComponent) -> Result<Value> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map(Value::Binary)
        .map_err(|e| Error::Value(format!("'{}' is not a valid xs:base64Binary: {}", text, e)))
}

fn parse_any_uri(text: &str, _: &InstanceComponent) -> Result<Value> {
    Ok(Value::Uri(text.to_string()))
}

fn write_qname(value: &Value, owner: &mut Element) -> Option<String> {
    let Value::QName(name) = value else {
        return value.to_lexical();
    };
    let Some(namespace) = name.namespace() else {
        return Some(name.local_name.clone());
    };
    let prefix = match owner.namespaces.get_prefix(namespace) {
        Some(prefix) => prefix.to_string(),
        None => {
            let prefix = format!("qn{}", owner.namespaces.iter().count());
            owner.declare_namespace(Some(&prefix), namespace);
            prefix
        }
    };
    Some(format!("{}:{}", prefix, name.local_name))
}

// =============================================================================
// QName
// =============================================================================

/// Binding for xs:QName. Prefixes resolve through the [`DocumentNamespaces`]
/// of the document being parsed, or through the scope recorded on the
/// component when no document is in progress.
#[derive(Debug, Clone, Default)]
pub struct QNameBinding {
    namespaces: Option<Arc<DocumentNamespaces>>,
}

impl QNameBinding {
    /// Binding resolving through `namespaces`
    pub fn new(namespaces: Option<Arc<DocumentNamespaces>>) -> Self {
        Self { namespaces }
    }

    /// Binding resolving through the namespace service of `context`
    pub fn from_context(context: &Arc<Context>) -> Self {
        Self::new(context.get::<DocumentNamespaces>())
    }
}

impl BindingInfo for QNameBinding {
    fn target(&self) -> Option<QName> {
        Some(QName::xs(XSD_QNAME))
    }

    fn value_type(&self) -> ValueType {
        ValueType::QName
    }
}

impl SimpleBinding for QNameBinding {
    fn parse(&self, instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
        let Some(Value::String(text)) = value else {
            return Ok(value);
        };
        let text = text.trim();
        crate::names::validate_qname(text)?;
        let name = match &self.namespaces {
            Some(namespaces) => namespaces.resolve_value(text)?,
            None => instance.resolve_qname(text)?,
        };
        Ok(Some(Value::QName(name)))
    }

    fn encode(&self, value: &Value, text: Option<String>, owner: &mut Element) -> Result<Option<String>> {
        if text.is_some() {
            return Ok(text);
        }
        Ok(write_qname(value, owner))
    }
}

/// (type, min, max) for the bounded integer types
const INTEGER_RANGES: &[(&str, Option<i128>, Option<i128>)] = &[
    (XSD_LONG, Some(i64::MIN as i128), Some(i64::MAX as i128)),
    (XSD_INT, Some(i32::MIN as i128), Some(i32::MAX as i128)),
    (XSD_SHORT, Some(i16::MIN as i128), Some(i16::MAX as i128)),
    (XSD_BYTE, Some(i8::MIN as i128), Some(i8::MAX as i128)),
    (XSD_NON_NEGATIVE_INTEGER, Some(0), None),
    (XSD_POSITIVE_INTEGER, Some(1), None),
    (XSD_NON_POSITIVE_INTEGER, None, Some(0)),
    (XSD_NEGATIVE_INTEGER, None, Some(-1)),
    (XSD_UNSIGNED_LONG, Some(0), Some(u64::MAX as i128)),
    (XSD_UNSIGNED_INT, Some(0), Some(u32::MAX as i128)),
    (XSD_UNSIGNED_SHORT, Some(0), Some(u16::MAX as i128)),
    (XSD_UNSIGNED_BYTE, Some(0), Some(u8::MAX as i128)),
];

/// All built-in bindings
pub fn xs_bindings() -> Vec<Binding> {
    let mut bindings = vec![
        Binding::complex(AnyTypeBinding),
        Binding::simple(AnySimpleTypeBinding),
        Binding::simple(AtomicBinding::new(XSD_STRING, ValueType::String, parse_string)),
        Binding::simple(AtomicBinding::new(XSD_BOOLEAN, ValueType::Boolean, parse_boolean)),
        Binding::simple(AtomicBinding::new(XSD_DECIMAL, ValueType::Decimal, parse_decimal)),
        Binding::simple(AtomicBinding::new(XSD_INTEGER, ValueType::Integer, parse_integer)),
        Binding::simple(
            AtomicBinding::new(XSD_FLOAT, ValueType::Float, parse_float).with_writer(write_float),
        ),
        Binding::simple(
            AtomicBinding::new(XSD_DOUBLE, ValueType::Double, parse_double).with_writer(write_float),
        ),
        Binding::simple(AtomicBinding::new(XSD_DURATION, ValueType::Duration, parse_duration)),
        Binding::simple(AtomicBinding::new(XSD_DATETIME, ValueType::DateTime, parse_date_time)),
        Binding::simple(AtomicBinding::new(XSD_DATE, ValueType::Date, parse_date)),
        Binding::simple(AtomicBinding::new(XSD_TIME, ValueType::Time, parse_time)),
        Binding::simple(
            AtomicBinding::new(XSD_HEX_BINARY, ValueType::Binary, parse_hex_binary)
                .with_writer(write_hex_binary),
        ),
        Binding::simple(AtomicBinding::new(XSD_BASE64_BINARY, ValueType::Binary, parse_base64_binary)),
        Binding::simple(AtomicBinding::new(XSD_ANY_URI, ValueType::Uri, parse_any_uri)),
    ];
    for (name, min, max) in INTEGER_RANGES {
        bindings.push(Binding::simple(
            AtomicBinding::new(name, ValueType::Integer, parse_integer).with_bounds(*min, *max),
        ));
    }
    bindings
}

/// Register the built-in bindings. xs:QName is built per document so that
/// it sees the document's namespace scopes.
pub fn register_xs_bindings(loader: &mut BindingLoader) {
    for binding in xs_bindings() {
        loader.register_instance(binding);
    }
    loader.register_factory(QName::xs(XSD_QNAME), |context| {
        Ok(Binding::simple(QNameBinding::from_context(context)))
    });
}
