//! Binding dispatch
//!
//! The walker collects the bindings that apply to a component: first one
//! registered for the component's own name, then one for each named type
//! from the component's type up to xs:anyType, then the universal
//! fallbacks. A binding in override mode ends the walk.
//!
//! When the value being processed is a composite, bindings whose declared
//! value type cannot accept it are skipped; if none accepts it, the
//! any-type binding runs alone.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::context::Context;
use crate::error::Result;
use crate::namespaces::QName;
use crate::schema::builtins::XSD_ANY_TYPE;
use crate::schema::{SchemaIndex, TypeDefinition};
use crate::values::Value;

use super::registry::BindingLoader;
use super::xs::AnyTypeBinding;
use super::{Binding, ExecutionMode};

/// Receives the bindings selected by [`BindingWalker::walk`]
pub trait BindingVisitor {
    /// Called once per binding, most derived first
    fn visit(&mut self, binding: &Binding) -> Result<()>;
}

impl<F> BindingVisitor for F
where
    F: FnMut(&Binding) -> Result<()>,
{
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        self(binding)
    }
}

/// Resolves and orders the bindings of a component
#[derive(Debug, Clone)]
pub struct BindingWalker {
    loader: Arc<BindingLoader>,
}

impl BindingWalker {
    /// Create a walker over `loader`
    pub fn new(loader: Arc<BindingLoader>) -> Self {
        Self { loader }
    }

    /// The binding registry
    pub fn loader(&self) -> &Arc<BindingLoader> {
        &self.loader
    }

    /// Bindings applying to a component named `component` of type `def`,
    /// most derived first
    pub fn bindings(
        &self,
        component: &QName,
        def: &Arc<TypeDefinition>,
        index: &SchemaIndex,
        context: &Arc<Context>,
    ) -> Result<Vec<Binding>> {
        let mut out = Vec::new();

        if let Some(binding) = self.loader.binding_for(component, context)? {
            trace!(component = %component, "element binding");
            let stop = binding.execution_mode() == ExecutionMode::Override;
            out.push(binding);
            if stop {
                return Ok(out);
            }
        }

        self.collect_type_bindings(component, def, index, context, &mut out)?;
        Ok(out)
    }

    /// Bindings applying to values of type `def`, most derived first,
    /// without the element-name binding
    pub fn type_bindings(
        &self,
        component: &QName,
        def: &Arc<TypeDefinition>,
        index: &SchemaIndex,
        context: &Arc<Context>,
    ) -> Result<Vec<Binding>> {
        let mut out = Vec::new();
        self.collect_type_bindings(component, def, index, context, &mut out)?;
        Ok(out)
    }

    fn collect_type_bindings(
        &self,
        component: &QName,
        def: &Arc<TypeDefinition>,
        index: &SchemaIndex,
        context: &Arc<Context>,
        out: &mut Vec<Binding>,
    ) -> Result<()> {
        for t in index.type_hierarchy(def) {
            let Some(name) = t.name() else { continue };
            if let Some(binding) = self.loader.binding_for(name, context)? {
                trace!(component = %component, type_name = %name, "type binding");
                let stop = binding.execution_mode() == ExecutionMode::Override;
                out.push(binding);
                if stop {
                    return Ok(());
                }
            }
        }
        out.extend(self.loader.fallbacks().iter().cloned());
        Ok(())
    }

    /// The binding for xs:anyType
    pub fn any_type_binding(&self, context: &Arc<Context>) -> Result<Binding> {
        Ok(self
            .loader
            .binding_for(&QName::xs(XSD_ANY_TYPE), context)?
            .unwrap_or_else(|| Binding::complex(AnyTypeBinding)))
    }

    /// Drop bindings that cannot accept the composite `value`; the
    /// any-type binding replaces them when none can
    pub fn filter_for_value(
        &self,
        component: &QName,
        bindings: Vec<Binding>,
        value: &Value,
        context: &Arc<Context>,
    ) -> Result<Vec<Binding>> {
        if !value.is_composite() {
            return Ok(bindings);
        }
        let actual = value.value_type();
        let (matching, skipped): (Vec<Binding>, Vec<Binding>) = bindings
            .into_iter()
            .partition(|b| b.value_type().is_assignable_from(&actual));
        for binding in &skipped {
            warn!(
                component = %component,
                binding = ?binding.target(),
                expected = %binding.value_type(),
                actual = %actual,
                "skipping binding, value type mismatch"
            );
        }
        if matching.is_empty() {
            warn!(component = %component, actual = %actual, "no binding accepts the value, using the any-type binding");
            return Ok(vec![self.any_type_binding(context)?]);
        }
        Ok(matching)
    }

    /// Visit the bindings of a component in dispatch order and return how
    /// many were visited
    pub fn walk(
        &self,
        component: &QName,
        def: &Arc<TypeDefinition>,
        value: Option<&Value>,
        index: &SchemaIndex,
        context: &Arc<Context>,
        visitor: &mut dyn BindingVisitor,
    ) -> Result<usize> {
        let mut bindings = self.bindings(component, def, index, context)?;
        if let Some(value) = value {
            bindings = self.filter_for_value(component, bindings, value, context)?;
        }
        for binding in &bindings {
            visitor.visit(binding)?;
        }
        Ok(bindings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::xs::register_xs_bindings;
    use crate::bindings::{BindingInfo, ComplexBinding};
    use crate::parser::tree::{InstanceComponent, NodeRef};
    use crate::schema::SchemaReader;
    use crate::values::{Object, ValueType};
    use std::any::Any;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:t" targetNamespace="urn:t">
      <xs:complexType name="Base"><xs:sequence/></xs:complexType>
      <xs:complexType name="Derived">
        <xs:complexContent><xs:extension base="t:Base"/></xs:complexContent>
      </xs:complexType>
      <xs:element name="d" type="t:Derived"/>
    </xs:schema>"#;

    struct Marker {
        target: QName,
        value_type: ValueType,
        mode: ExecutionMode,
    }

    impl BindingInfo for Marker {
        fn target(&self) -> Option<QName> {
            Some(self.target.clone())
        }
        fn value_type(&self) -> ValueType {
            self.value_type.clone()
        }
        fn execution_mode(&self) -> ExecutionMode {
            self.mode
        }
    }

    impl ComplexBinding for Marker {
        fn parse(&self, _i: &InstanceComponent, _n: &NodeRef<'_>, v: Option<Value>) -> Result<Option<Value>> {
            Ok(v)
        }
    }

    #[derive(Debug)]
    struct Shape;

    impl Object for Shape {
        fn kind(&self) -> &str {
            "shape"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn equals(&self, other: &dyn Object) -> bool {
            other.as_any().is::<Shape>()
        }
    }

    fn t(local: &str) -> QName {
        QName::namespaced("urn:t", local)
    }

    fn marker(local: &str, value_type: ValueType, mode: ExecutionMode) -> Binding {
        Binding::complex(Marker {
            target: t(local),
            value_type,
            mode,
        })
    }

    fn setup(loader: BindingLoader) -> (SchemaIndex, BindingWalker, Arc<TypeDefinition>) {
        let schema = SchemaReader::new().read_str(XSD).unwrap();
        let index = SchemaIndex::new(vec![schema]);
        let def = index.type_definition(&t("Derived")).unwrap();
        (index, BindingWalker::new(Arc::new(loader)), def)
    }

    fn targets(bindings: &[Binding]) -> Vec<String> {
        bindings
            .iter()
            .map(|b| b.target().map(|n| n.local_name).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_derived_before_base() {
        let mut loader = BindingLoader::new();
        register_xs_bindings(&mut loader);
        loader.register_instance(marker("Base", ValueType::Any, ExecutionMode::Chain));
        loader.register_instance(marker("Derived", ValueType::Any, ExecutionMode::Chain));
        let (index, walker, def) = setup(loader);

        let bindings = walker.bindings(&t("d"), &def, &index, &Context::new()).unwrap();
        assert_eq!(targets(&bindings), vec!["Derived", "Base", "anyType"]);
    }

    #[test]
    fn test_element_binding_first_and_override_stops() {
        let mut loader = BindingLoader::new();
        register_xs_bindings(&mut loader);
        loader.register_instance(marker("d", ValueType::Any, ExecutionMode::Chain));
        loader.register_instance(marker("Derived", ValueType::Any, ExecutionMode::Override));
        loader.register_instance(marker("Base", ValueType::Any, ExecutionMode::Chain));
        let (index, walker, def) = setup(loader);

        let bindings = walker.bindings(&t("d"), &def, &index, &Context::new()).unwrap();
        assert_eq!(targets(&bindings), vec!["d", "Derived"]);
    }

    #[test]
    fn test_mismatch_substitutes_any_type() {
        let mut loader = BindingLoader::new();
        register_xs_bindings(&mut loader);
        loader.register_instance(marker(
            "Derived",
            ValueType::Object("circle".into()),
            ExecutionMode::Override,
        ));
        let (index, walker, def) = setup(loader);
        let value = Value::Object(Arc::new(Shape));

        let mut visited = Vec::new();
        let count = walker
            .walk(&t("d"), &def, Some(&value), &index, &Context::new(), &mut |b: &Binding| {
                visited.push(b.target());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(visited, vec![Some(QName::xs("anyType"))]);
    }

    #[test]
    fn test_scalar_values_are_not_filtered() {
        let mut loader = BindingLoader::new();
        loader.register_instance(marker("Derived", ValueType::Boolean, ExecutionMode::Chain));
        let (index, walker, def) = setup(loader);
        let mut count = 0;
        walker
            .walk(&t("d"), &def, Some(&Value::from("x")), &index, &Context::new(), &mut |_: &Binding| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
