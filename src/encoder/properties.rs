//! Property extraction
//!
//! Before the children of a composite value are encoded, its properties
//! are matched against the element's child particles. Extraction runs in
//! two phases:
//!
//! 1. every declared particle, in schema order, is looked up through the
//!    bindings' `property` accessors; the first binding answering wins;
//! 2. the bindings' `properties` lists supply whatever the schema does not
//!    name. Repeated names are grouped into one multi-valued property and
//!    a particle is inferred for each.
//!
//! The combined list is put back into schema order when every property
//! maps to a declared child and there are no more properties than
//! declared children. Otherwise extraction order is kept.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::bindings::{Binding, BindingWalker, Property};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::{ChildParticles, ElementDecl, Occurs, Particle, SchemaIndex, TypeDefinition};
use crate::values::Value;

/// A property of a composite value with the particle it is encoded as
#[derive(Debug, Clone)]
pub struct ExtractedProperty {
    /// Declared or inferred particle
    pub particle: Particle,
    /// Property value
    pub value: Property,
    /// Whether the particle comes from the schema rather than inference
    pub declared: bool,
}

impl ExtractedProperty {
    /// Name of the child element
    pub fn name(&self) -> &QName {
        self.particle.name()
    }
}

/// Extracts the child properties of composite values
pub struct BindingPropertyExtractor<'a> {
    index: &'a SchemaIndex,
    walker: &'a BindingWalker,
}

impl<'a> BindingPropertyExtractor<'a> {
    /// Create an extractor
    pub fn new(index: &'a SchemaIndex, walker: &'a BindingWalker) -> Self {
        Self { index, walker }
    }

    /// Properties of `value` encoded as children of `element` with type `def`
    pub fn properties(
        &self,
        value: &Value,
        element: &Arc<ElementDecl>,
        def: &Arc<TypeDefinition>,
        context: &Arc<Context>,
    ) -> Result<Vec<ExtractedProperty>> {
        let bindings = self
            .walker
            .bindings(&element.name, def, self.index, context)
            .and_then(|b| self.walker.filter_for_value(&element.name, b, value, context))
            .map_err(|e| Error::binding(&element.name, e))?;
        let complex: Vec<_> = bindings.iter().filter_map(Binding::as_complex).collect();
        let particles = self.index.child_particles_of(element, def);

        let mut extracted = Vec::new();
        let mut found = HashSet::new();
        for (name, particle) in particles.iter() {
            if let Some(property) = complex.iter().find_map(|b| b.property(value, name)) {
                trace!(element = %element.name, property = %name, "declared property");
                found.insert(name.clone());
                extracted.push(ExtractedProperty {
                    particle: particle.clone(),
                    value: property,
                    declared: true,
                });
            }
        }

        // first binding reporting a name owns it
        let mut additional: IndexMap<QName, (usize, Vec<Value>)> = IndexMap::new();
        for (position, binding) in complex.iter().enumerate() {
            for (name, v) in binding.properties(value) {
                if found.contains(&name) {
                    continue;
                }
                let entry = additional.entry(name).or_insert_with(|| (position, Vec::new()));
                if entry.0 == position {
                    entry.1.push(v);
                }
            }
        }
        for (name, (_, values)) in additional {
            let (particle, declared) = self.infer_particle(&particles, &name, values.len());
            let multiple = !particle.occurs.is_single();
            if let Some(property) = Property::from_values(values, multiple) {
                trace!(element = %element.name, property = %name, declared, "additional property");
                extracted.push(ExtractedProperty {
                    particle,
                    value: property,
                    declared,
                });
            }
        }

        self.sort(&particles, &mut extracted);
        Ok(extracted)
    }

    /// Particle for a property the bindings reported without the schema
    /// naming it directly
    fn infer_particle(&self, particles: &ChildParticles, name: &QName, count: usize) -> (Particle, bool) {
        if let Some(particle) = particles.get(name) {
            return (particle.clone(), true);
        }
        let declaration = self
            .index
            .element(name)
            .unwrap_or_else(|| Arc::new(ElementDecl::any_type(name.clone())));
        if let Some((_, head)) = particles
            .iter()
            .find(|(head_name, _)| self.index.is_substitutable(name, head_name))
        {
            return (Particle::new(declaration, head.occurs), true);
        }
        let occurs = if count > 1 {
            Occurs::zero_or_more()
        } else {
            Occurs::optional()
        };
        (Particle::new(declaration, occurs), false)
    }

    fn position(&self, particles: &ChildParticles, name: &QName) -> Option<usize> {
        particles.position(name).or_else(|| {
            particles
                .iter()
                .position(|(head, _)| self.index.is_substitutable(name, head))
        })
    }

    fn sort(&self, particles: &ChildParticles, extracted: &mut Vec<ExtractedProperty>) {
        if extracted.len() > particles.len() {
            debug!(
                properties = extracted.len(),
                children = particles.len(),
                "more properties than declared children, keeping extraction order"
            );
            return;
        }
        let positions: Option<Vec<usize>> = extracted.iter().map(|p| self.position(particles, p.name())).collect();
        let Some(positions) = positions else {
            debug!("unmatched property, keeping extraction order");
            return;
        };
        let mut keyed: Vec<(usize, ExtractedProperty)> = positions.into_iter().zip(extracted.drain(..)).collect();
        keyed.sort_by_key(|(position, _)| *position);
        extracted.extend(keyed.into_iter().map(|(_, p)| p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::xs::register_xs_bindings;
    use crate::bindings::{BindingInfo, BindingLoader, ComplexBinding, ExecutionMode};
    use crate::parser::tree::{InstanceComponent, NodeRef};
    use crate::schema::SchemaReader;
    use crate::values::{Record, ValueType};
    use pretty_assertions::assert_eq;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="shape" substitutionGroup="geometry" type="xs:string"/>
      <xs:element name="geometry" type="xs:string"/>
      <xs:complexType name="Feature">
        <xs:sequence>
          <xs:element name="a" type="xs:string"/>
          <xs:element name="b" type="xs:string"/>
          <xs:element name="c" type="xs:string"/>
        </xs:sequence>
      </xs:complexType>
      <xs:complexType name="Located">
        <xs:sequence>
          <xs:element ref="geometry" maxOccurs="unbounded"/>
        </xs:sequence>
      </xs:complexType>
      <xs:element name="feature" type="Feature"/>
      <xs:element name="located" type="Located"/>
    </xs:schema>"#;

    /// Reports the record's children only through `properties`
    struct Listing;

    impl BindingInfo for Listing {
        fn target(&self) -> Option<QName> {
            Some(QName::local("Feature"))
        }
        fn value_type(&self) -> ValueType {
            ValueType::Record
        }
        fn execution_mode(&self) -> ExecutionMode {
            ExecutionMode::Override
        }
    }

    impl ComplexBinding for Listing {
        fn parse(&self, _i: &InstanceComponent, _n: &NodeRef<'_>, v: Option<Value>) -> Result<Option<Value>> {
            Ok(v)
        }
        fn properties(&self, value: &Value) -> Vec<(QName, Value)> {
            value.as_record().map(|r| r.children.clone()).unwrap_or_default()
        }
    }

    fn setup(listing: bool) -> (SchemaIndex, BindingWalker) {
        let schema = SchemaReader::new().read_str(XSD).unwrap();
        let mut loader = BindingLoader::new();
        register_xs_bindings(&mut loader);
        if listing {
            loader.register_instance(Binding::complex(Listing));
        }
        (SchemaIndex::new(vec![schema]), BindingWalker::new(Arc::new(loader)))
    }

    fn record(children: &[(&str, &str)]) -> Value {
        let mut record = Record::new();
        for (name, text) in children {
            record.children.push((QName::local(*name), Value::from(*text)));
        }
        Value::Record(record)
    }

    fn names(extracted: &[ExtractedProperty]) -> Vec<String> {
        extracted.iter().map(|p| p.name().local_name.clone()).collect()
    }

    #[test]
    fn test_declared_properties_in_schema_order() {
        let (index, walker) = setup(false);
        let decl = index.element(&QName::local("feature")).unwrap();
        let def = index.element_type(&decl);
        let value = record(&[("c", "3"), ("a", "1"), ("b", "2")]);
        let extracted = BindingPropertyExtractor::new(&index, &walker)
            .properties(&value, &decl, &def, &Context::new())
            .unwrap();
        assert_eq!(names(&extracted), vec!["a", "b", "c"]);
        assert!(extracted.iter().all(|p| p.declared));
    }

    #[test]
    fn test_additional_properties_resorted() {
        let (index, walker) = setup(true);
        let decl = index.element(&QName::local("feature")).unwrap();
        let def = index.element_type(&decl);
        let value = record(&[("c", "3"), ("a", "1"), ("b", "2")]);
        let extracted = BindingPropertyExtractor::new(&index, &walker)
            .properties(&value, &decl, &def, &Context::new())
            .unwrap();
        assert_eq!(names(&extracted), vec!["a", "b", "c"]);
        assert!(extracted.iter().all(|p| p.declared));
        assert_eq!(extracted[0].value, Property::One(Value::from("1")));
    }

    #[test]
    fn test_unmatched_property_keeps_extraction_order() {
        let (index, walker) = setup(false);
        let decl = index.element(&QName::local("feature")).unwrap();
        let def = index.element_type(&decl);
        let value = record(&[("c", "3"), ("extra", "x"), ("extra", "y"), ("a", "1")]);
        let extracted = BindingPropertyExtractor::new(&index, &walker)
            .properties(&value, &decl, &def, &Context::new())
            .unwrap();
        assert_eq!(names(&extracted), vec!["a", "c", "extra"]);
        let extra = &extracted[2];
        assert!(!extra.declared);
        assert_eq!(extra.particle.occurs, Occurs::zero_or_more());
        assert_eq!(extra.value.len(), 2);
    }

    #[test]
    fn test_single_undeclared_value_is_optional() {
        let (index, walker) = setup(false);
        let decl = index.element(&QName::local("feature")).unwrap();
        let def = index.element_type(&decl);
        let value = record(&[("a", "1"), ("note", "n")]);
        let extracted = BindingPropertyExtractor::new(&index, &walker)
            .properties(&value, &decl, &def, &Context::new())
            .unwrap();
        let note = extracted.iter().find(|p| p.name().local_name == "note").unwrap();
        assert_eq!(note.particle.occurs, Occurs::optional());
        assert_eq!(note.value, Property::One(Value::from("n")));
    }

    #[test]
    fn test_substitution_member_inherits_head_occurs() {
        let (index, walker) = setup(false);
        let decl = index.element(&QName::local("located")).unwrap();
        let def = index.element_type(&decl);
        let value = record(&[("shape", "s")]);
        let extracted = BindingPropertyExtractor::new(&index, &walker)
            .properties(&value, &decl, &def, &Context::new())
            .unwrap();
        assert_eq!(names(&extracted), vec!["shape"]);
        assert!(extracted[0].declared);
        assert_eq!(extracted[0].particle.occurs, Occurs::new(1, None));
        assert_eq!(extracted[0].value, Property::Many(vec![Value::from("s")]));
    }
}
