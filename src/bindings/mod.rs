//! Bindings
//!
//! A binding attaches parse and encode logic to one schema type (or one
//! element name). Simple bindings turn text into scalar values and back;
//! complex bindings build composite values from a parsed node's children
//! and attributes, and expose the properties of a composite value so the
//! encoder can write its children.
//!
//! Several bindings usually apply to one component: one for each type in
//! its derivation chain. The [`walker::BindingWalker`] runs them from the
//! most derived type to the most general, feeding each binding the result
//! of the previous one.

pub mod registry;
pub mod walker;
pub mod xs;

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::documents::Element;
use crate::error::Result;
use crate::namespaces::QName;
use crate::parser::tree::{InstanceComponent, NodeRef};
use crate::values::{Value, ValueType};

pub use registry::{BindingAdapter, BindingDescriptor, BindingLoader};
pub use walker::{BindingVisitor, BindingWalker};

/// How a binding combines with the bindings of base types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Run, then continue with the bindings of base types
    #[default]
    Chain,
    /// Run, and skip the bindings of base types
    Override,
}

/// Metadata shared by simple and complex bindings
pub trait BindingInfo: Send + Sync {
    /// Qualified name of the type (or element) this binding targets.
    /// `None` makes the binding a universal fallback.
    fn target(&self) -> Option<QName>;

    /// Type of the values this binding produces and accepts
    fn value_type(&self) -> ValueType;

    /// Execution mode
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Chain
    }
}

/// Binding for scalar content
pub trait SimpleBinding: BindingInfo {
    /// Parse the component's value. `value` is the pre-parsed text (or the
    /// result of a more derived binding); returning `None` keeps `value`.
    fn parse(&self, instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>>;

    /// Encode `value` as text. `text` is what more derived bindings
    /// produced so far. `owner` is the element being written, where
    /// namespace declarations needed by the text can be added.
    fn encode(&self, value: &Value, text: Option<String>, owner: &mut Element) -> Result<Option<String>> {
        let _ = owner;
        Ok(text.or_else(|| value.to_lexical()))
    }
}

/// Value of a complex object property
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Single value
    One(Value),
    /// Repeated values
    Many(Vec<Value>),
}

impl Property {
    /// Build from collected values: one value stays single unless
    /// `multiple` is set
    pub fn from_values(mut values: Vec<Value>, multiple: bool) -> Option<Self> {
        match values.len() {
            0 => None,
            1 if !multiple => values.pop().map(Property::One),
            _ => Some(Property::Many(values)),
        }
    }

    /// The contained values
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Property::One(v) => vec![v],
            Property::Many(vs) => vs.iter().collect(),
        }
    }

    /// Number of contained values
    pub fn len(&self) -> usize {
        match self {
            Property::One(_) => 1,
            Property::Many(vs) => vs.len(),
        }
    }

    /// Whether no value is contained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binding for structured content
pub trait ComplexBinding: BindingInfo {
    /// Parse the component's value from the node's children and
    /// attributes. `value` is the pre-parsed text or the result of a more
    /// derived binding; returning `None` keeps `value`.
    fn parse(
        &self,
        instance: &InstanceComponent,
        node: &NodeRef<'_>,
        value: Option<Value>,
    ) -> Result<Option<Value>>;

    /// Encode `value` into `element`. The returned element replaces the
    /// one passed in.
    fn encode(&self, value: &Value, element: Element) -> Result<Element> {
        let _ = value;
        Ok(element)
    }

    /// Property of `value` corresponding to a child element or attribute
    fn property(&self, value: &Value, name: &QName) -> Option<Property> {
        let _ = (value, name);
        None
    }

    /// Properties of `value` that the schema does not list, in extraction
    /// order; repeated names form multi-valued properties
    fn properties(&self, value: &Value) -> Vec<(QName, Value)> {
        let _ = value;
        Vec::new()
    }

    /// Attribute values of `value` that the schema does not list
    fn attributes(&self, value: &Value) -> Vec<(QName, Value)> {
        let _ = value;
        Vec::new()
    }

    /// Derive the context used for the children of an element, called when
    /// the element starts. `None` keeps the current context.
    fn initialize_child_context(
        &self,
        instance: &InstanceComponent,
        node: &NodeRef<'_>,
        context: &Arc<Context>,
    ) -> Option<Arc<Context>> {
        let _ = (instance, node, context);
        None
    }
}

/// A simple or complex binding
#[derive(Clone)]
pub enum Binding {
    /// Scalar binding
    Simple(Arc<dyn SimpleBinding>),
    /// Structured binding
    Complex(Arc<dyn ComplexBinding>),
}

impl Binding {
    /// Wrap a simple binding
    pub fn simple(binding: impl SimpleBinding + 'static) -> Self {
        Binding::Simple(Arc::new(binding))
    }

    /// Wrap a complex binding
    pub fn complex(binding: impl ComplexBinding + 'static) -> Self {
        Binding::Complex(Arc::new(binding))
    }

    /// Target of the binding
    pub fn target(&self) -> Option<QName> {
        match self {
            Binding::Simple(b) => b.target(),
            Binding::Complex(b) => b.target(),
        }
    }

    /// Declared value type
    pub fn value_type(&self) -> ValueType {
        match self {
            Binding::Simple(b) => b.value_type(),
            Binding::Complex(b) => b.value_type(),
        }
    }

    /// Execution mode
    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            Binding::Simple(b) => b.execution_mode(),
            Binding::Complex(b) => b.execution_mode(),
        }
    }

    /// Complex binding, if this is one
    pub fn as_complex(&self) -> Option<&Arc<dyn ComplexBinding>> {
        match self {
            Binding::Complex(b) => Some(b),
            Binding::Simple(_) => None,
        }
    }

    /// Whether both handles refer to the same binding instance
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Simple(a), Binding::Simple(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Binding::Complex(a), Binding::Complex(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Binding::Simple(_) => "Simple",
            Binding::Complex(_) => "Complex",
        };
        f.debug_struct(kind)
            .field("target", &self.target())
            .field("value_type", &self.value_type())
            .finish()
    }
}
