//! Value coercion
//!
//! Before a binding encodes a scalar value the encoder tries to convert it
//! to the value type the binding declares. [`Converters`] holds an ordered
//! list of [`ValueConverter`]s and asks each in turn. Composite values
//! (records and domain objects) are never converted: turning an object into
//! text through a generic fallback would produce content no binding asked
//! for.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::trace;

use crate::codecs::{Duration, XsDate, XsDateTime, XsTime};
use crate::values::{Value, ValueType};

/// Converts values between value types
pub trait ValueConverter: Send + Sync {
    /// Convert `value` to `target`, or `None` if this converter cannot
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value>;
}

/// Conversions between the numeric types
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericConverter;

impl ValueConverter for NumericConverter {
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        let decimal = match value {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Float(f) => Decimal::from_f32(*f),
            Value::Double(d) => Decimal::from_f64(*d),
            _ => return None,
        };
        match target {
            ValueType::Integer => {
                let d = decimal?;
                if d.fract().is_zero() {
                    d.to_i64().map(Value::Integer)
                } else {
                    None
                }
            }
            ValueType::Decimal => decimal.map(Value::Decimal),
            ValueType::Double => match value {
                Value::Float(f) => Some(Value::Double(f64::from(*f))),
                Value::Double(d) => Some(Value::Double(*d)),
                _ => decimal?.to_f64().map(Value::Double),
            },
            ValueType::Float => match value {
                Value::Double(d) => Some(Value::Float(*d as f32)),
                _ => decimal?.to_f32().map(Value::Float),
            },
            _ => None,
        }
    }
}

/// Conversions from strings by parsing, and from scalars to their
/// lexical form
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalConverter;

impl ValueConverter for LexicalConverter {
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        if let Value::String(s) = value {
            let s = s.trim();
            return match target {
                ValueType::Boolean => match s {
                    "true" | "1" => Some(Value::Boolean(true)),
                    "false" | "0" => Some(Value::Boolean(false)),
                    _ => None,
                },
                ValueType::Integer => s.parse::<i64>().ok().map(Value::Integer),
                ValueType::Decimal => Decimal::from_str(s).ok().map(Value::Decimal),
                ValueType::Double => s.parse::<f64>().ok().map(Value::Double),
                ValueType::Float => s.parse::<f32>().ok().map(Value::Float),
                ValueType::Uri => Some(Value::Uri(s.to_string())),
                ValueType::Duration => Duration::parse(s).ok().map(Value::Duration),
                ValueType::DateTime => XsDateTime::parse(s).ok().map(Value::DateTime),
                ValueType::Date => XsDate::parse(s).ok().map(Value::Date),
                ValueType::Time => XsTime::parse(s).ok().map(Value::Time),
                _ => None,
            };
        }
        match target {
            ValueType::String => value.to_lexical().map(Value::String),
            _ => None,
        }
    }
}

/// Ordered registry of value converters
#[derive(Clone)]
pub struct Converters {
    converters: Vec<Arc<dyn ValueConverter>>,
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converters")
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl Default for Converters {
    fn default() -> Self {
        Self::new()
            .with_converter(Arc::new(NumericConverter))
            .with_converter(Arc::new(LexicalConverter))
    }
}

impl Converters {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Add a converter; converters are consulted in registration order
    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    /// Coerce `value` to `target`.
    ///
    /// Values already assignable to `target` are returned unchanged.
    /// Composite values are only ever returned unchanged.
    pub fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        let actual = value.value_type();
        if target.is_assignable_from(&actual) {
            return Some(value.clone());
        }
        if value.is_composite() {
            trace!(from = %actual, to = %target, "composite values are not converted");
            return None;
        }
        self.converters.iter().find_map(|c| c.convert(value, target))
    }
}
