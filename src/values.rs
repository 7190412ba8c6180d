//! Parsed values
//!
//! [`Value`] is what bindings produce when parsing and consume when
//! encoding. Scalars cover the XSD primitive value spaces; composites are
//! either a generic [`Record`] (what the any-type binding builds from an
//! element's attributes and children) or a user [`Object`] produced by a
//! custom complex binding.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};

use crate::codecs::{Duration, XsDate, XsDateTime, XsTime};
use crate::namespaces::QName;

/// Domain object produced by a complex binding
pub trait Object: Any + Send + Sync + fmt::Debug {
    /// Name of the object kind, matched by [`ValueType::Object`]
    fn kind(&self) -> &str;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Structural equality with another object
    fn equals(&self, other: &dyn Object) -> bool;

    /// JSON rendering used by the command line front end
    fn to_json(&self) -> JsonValue {
        JsonValue::String(format!("{:?}", self))
    }
}

/// Generic composite value: attributes, child values and text content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Type of the element the record was parsed from
    pub type_name: Option<QName>,
    /// Attribute values in document order
    pub attributes: IndexMap<QName, Value>,
    /// Child element values in document order
    pub children: Vec<(QName, Value)>,
    /// Simple content or mixed text
    pub text: Option<Box<Value>>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the type name
    pub fn with_type_name(mut self, name: QName) -> Self {
        self.type_name = Some(name);
        self
    }

    /// Add an attribute value
    pub fn with_attribute(mut self, name: QName, value: Value) -> Self {
        self.attributes.insert(name, value);
        self
    }

    /// Add a child value
    pub fn with_child(mut self, name: QName, value: Value) -> Self {
        self.children.push((name, value));
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: Value) -> Self {
        self.text = Some(Box::new(text));
        self
    }

    /// First child value named `name`
    pub fn child(&self, name: &QName) -> Option<&Value> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// First child value with local name `local_name`
    pub fn child_local(&self, local_name: &str) -> Option<&Value> {
        self.children
            .iter()
            .find(|(n, _)| n.local_name == local_name)
            .map(|(_, v)| v)
    }

    /// All child values named `name`
    pub fn children_named(&self, name: &QName) -> Vec<&Value> {
        self.children
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    /// Attribute value by name
    pub fn attribute(&self, name: &QName) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Typed value
#[derive(Debug, Clone)]
pub enum Value {
    /// xs:boolean
    Boolean(bool),
    /// xs:integer family values that fit in an i64
    Integer(i64),
    /// xs:decimal, and integers outside the i64 range
    Decimal(Decimal),
    /// xs:float
    Float(f32),
    /// xs:double
    Double(f64),
    /// String family values
    String(String),
    /// xs:duration
    Duration(Duration),
    /// xs:dateTime
    DateTime(XsDateTime),
    /// xs:date
    Date(XsDate),
    /// xs:time
    Time(XsTime),
    /// xs:hexBinary / xs:base64Binary
    Binary(Vec<u8>),
    /// xs:anyURI
    Uri(String),
    /// xs:QName
    QName(QName),
    /// List type values
    List(Vec<Value>),
    /// Generic composite
    Record(Record),
    /// Domain object
    Object(Arc<dyn Object>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Double(a), Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (String(a), String(b)) => a == b,
            (Duration(a), Duration(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (Uri(a), Uri(b)) => a == b,
            (QName(a), QName(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Object(a), Object(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }
}

/// Value type a binding declares and a value reports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Accepts every value
    Any,
    /// Boolean
    Boolean,
    /// Integer
    Integer,
    /// Decimal (accepts integers)
    Decimal,
    /// Float
    Float,
    /// Double (accepts floats)
    Double,
    /// String
    String,
    /// Duration
    Duration,
    /// DateTime
    DateTime,
    /// Date
    Date,
    /// Time
    Time,
    /// Binary data
    Binary,
    /// URI
    Uri,
    /// Qualified name
    QName,
    /// List
    List,
    /// Generic record
    Record,
    /// Domain object of the named kind
    Object(String),
}

impl ValueType {
    /// Whether a binding declaring `self` accepts values of type `other`
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Any, _) => true,
            (ValueType::Decimal, ValueType::Integer) => true,
            (ValueType::Double, ValueType::Float) => true,
            (a, b) => a == b,
        }
    }

    /// Whether values of this type are composites
    pub fn is_composite(&self) -> bool {
        matches!(self, ValueType::Record | ValueType::Object(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Object(kind) => write!(f, "object<{}>", kind),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

impl Value {
    /// Runtime type of the value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Duration(_) => ValueType::Duration,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::Binary(_) => ValueType::Binary,
            Value::Uri(_) => ValueType::Uri,
            Value::QName(_) => ValueType::QName,
            Value::List(_) => ValueType::List,
            Value::Record(_) => ValueType::Record,
            Value::Object(o) => ValueType::Object(o.kind().to_string()),
        }
    }

    /// Whether this is a record or domain object
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Record(_) | Value::Object(_))
    }

    /// String content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Record content, if this is a record
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// List items, if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast a domain object
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Canonical lexical form of a scalar or list value; composites have
    /// none and are never stringified
    pub fn to_lexical(&self) -> Option<String> {
        let text = match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Float(f) => format_double(f64::from(*f)),
            Value::Double(d) => format_double(*d),
            Value::String(s) | Value::Uri(s) => s.clone(),
            Value::Duration(d) => d.to_string(),
            Value::DateTime(dt) => dt.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Time(t) => t.to_string(),
            Value::Binary(bytes) => BASE64.encode(bytes),
            Value::QName(q) => q.to_string(),
            Value::List(items) => {
                let parts: Option<Vec<String>> = items.iter().map(|v| v.to_lexical()).collect();
                parts?.join(" ")
            }
            Value::Record(_) | Value::Object(_) => return None,
        };
        Some(text)
    }

    /// JSON rendering: records become objects with `@`-prefixed attributes,
    /// repeated children become arrays and text goes under `$`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(format_double(*d))),
            Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(format_double(f64::from(*f)))),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => record_to_json(record),
            Value::Object(o) => o.to_json(),
            other => JsonValue::String(other.to_lexical().unwrap_or_default()),
        }
    }
}

fn record_to_json(record: &Record) -> JsonValue {
    let mut map = Map::new();
    for (name, value) in &record.attributes {
        map.insert(format!("@{}", name.local_name), value.to_json());
    }
    for (name, value) in &record.children {
        let json = value.to_json();
        match map.get_mut(&name.local_name) {
            Some(JsonValue::Array(items)) if record.children_named(name).len() > 1 => {
                items.push(json)
            }
            Some(existing) => {
                let first = existing.take();
                *existing = JsonValue::Array(vec![first, json]);
            }
            None => {
                let repeated = record.children_named(name).len() > 1;
                let json = if repeated { JsonValue::Array(vec![json]) } else { json };
                map.insert(name.local_name.clone(), json);
            }
        }
    }
    if let Some(text) = &record.text {
        map.insert("$".to_string(), text.to_json());
    }
    JsonValue::Object(map)
}

/// XSD lexical form of a double (INF, -INF, NaN)
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        value.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
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

    #[test]
    fn test_assignability() {
        assert!(ValueType::Any.is_assignable_from(&ValueType::Record));
        assert!(ValueType::Decimal.is_assignable_from(&ValueType::Integer));
        assert!(!ValueType::Integer.is_assignable_from(&ValueType::Decimal));
        assert!(ValueType::Object("point".into()).is_assignable_from(&ValueType::Object("point".into())));
        assert!(!ValueType::Object("point".into()).is_assignable_from(&ValueType::Object("line".into())));
    }

    #[test]
    fn test_lexical_forms() {
        assert_eq!(Value::Integer(42).to_lexical().as_deref(), Some("42"));
        assert_eq!(
            Value::Decimal(Decimal::from_str("1.500").unwrap()).to_lexical().as_deref(),
            Some("1.5")
        );
        assert_eq!(Value::Double(f64::NEG_INFINITY).to_lexical().as_deref(), Some("-INF"));
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::Integer(2)]).to_lexical().as_deref(),
            Some("1 2")
        );
        assert_eq!(Value::Record(Record::new()).to_lexical(), None);
    }

    #[test]
    fn test_objects() {
        let a = Value::Object(Arc::new(Point { x: 1 }));
        let b = Value::Object(Arc::new(Point { x: 1 }));
        assert_eq!(a, b);
        assert_eq!(a.value_type(), ValueType::Object("point".into()));
        assert_eq!(a.downcast_ref::<Point>().map(|p| p.x), Some(1));
        assert!(a.is_composite());
    }

    #[test]
    fn test_record_json() {
        let record = Record::new()
            .with_attribute(QName::local("id"), Value::from("r1"))
            .with_child(QName::local("item"), Value::Integer(1))
            .with_child(QName::local("item"), Value::Integer(2))
            .with_child(QName::local("note"), Value::from("hi"));
        let json = Value::Record(record).to_json();
        assert_eq!(
            json,
            serde_json::json!({"@id": "r1", "item": [1, 2], "note": "hi"})
        );
    }
}
