//! Encoding
//!
//! The [`Encoder`] writes a value back to XML under an element declaration.
//! For each element it creates a namespaced [`Element`], runs the bindings
//! of the declaration in dispatch order, then encodes the value's
//! properties as child elements and attributes.
//!
//! Simple bindings produce text. Before a simple binding runs, a scalar
//! value is coerced to the binding's value type through the context's
//! [`Converters`]; a binding whose type cannot be reached is skipped.
//! Composite values are never coerced. Complex bindings receive the
//! element and return the element that replaces it.

pub mod properties;

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::bindings::{Binding, BindingLoader, BindingWalker};
use crate::config::{default_schema, document_context, session_context, Configuration, EncoderSettings};
use crate::context::Context;
use crate::converters::Converters;
use crate::documents::{Attribute, Document, Element, Node, WriteOptions};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::schema::{AttributeDecl, ElementDecl, SchemaIndex, TypeDefinition, XsdSchema};
use crate::values::Value;

pub use properties::{BindingPropertyExtractor, ExtractedProperty};

/// Schema-driven XML encoder
pub struct Encoder {
    configuration: Arc<dyn Configuration>,
    settings: EncoderSettings,
    context: Arc<Context>,
    loader: Arc<BindingLoader>,
    walker: BindingWalker,
    schemas: Vec<Arc<XsdSchema>>,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("namespace", &self.configuration.namespace())
            .field("settings", &self.settings)
            .field("schemas", &self.schemas.len())
            .field("bindings", &self.loader.len())
            .finish()
    }
}

impl Encoder {
    /// Create an encoder for `configuration` with default settings
    pub fn new(configuration: Arc<dyn Configuration>) -> Self {
        let (context, loader) = session_context(&configuration);
        let walker = BindingWalker::new(loader.clone());
        Self {
            configuration,
            settings: EncoderSettings::default(),
            context,
            loader,
            walker,
            schemas: Vec::new(),
        }
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: EncoderSettings) -> Self {
        self.context.register(settings.clone());
        self.settings = settings;
        self
    }

    /// Encode against `schema` in addition to the configuration's default
    pub fn with_schema(mut self, schema: Arc<XsdSchema>) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Current settings
    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Session context
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    fn index(&self) -> Result<SchemaIndex> {
        let candidates = self.schemas.iter().cloned().map(Ok).collect();
        SchemaIndex::resolve(candidates, default_schema(&self.configuration), false)
    }

    /// Encoding state for one document, working in a child of the session
    /// context so that bindings are instantiated per document
    fn session<'a>(&'a self, index: &'a SchemaIndex, context: &'a Arc<Context>) -> ElementEncoder<'a> {
        let converters = context
            .get::<Converters>()
            .unwrap_or_else(|| Arc::new(Converters::default()));
        ElementEncoder {
            index,
            walker: &self.walker,
            context,
            converters,
            limits: self.settings.limits(),
        }
    }

    /// Encode `value` as a document whose root element is `name`
    pub fn encode(&self, value: Option<&Value>, name: &QName) -> Result<Document> {
        let value = value.ok_or_else(|| Error::Encode(format!("no value to encode as {}", name)))?;
        let index = self.index()?;
        let result = self.encode_root(value, name, &index);
        index.detach();
        result
    }

    fn encode_root(&self, value: &Value, name: &QName, index: &SchemaIndex) -> Result<Document> {
        let declaration = index
            .element(name)
            .ok_or_else(|| Error::Declaration { name: name.clone() })?;
        let (context, _) = document_context(&self.context);
        let mut root = self.session(index, &context).encode_element(value, &declaration, 1)?;
        for (prefix, namespace) in self.settings.namespace_prefixes() {
            if root.namespaces.get_namespace(prefix).is_none() {
                root.declare_namespace(Some(prefix.as_str()), namespace.clone());
            }
        }
        debug!(element = %name, "value encoded");
        Ok(Document::with_root(root))
    }

    /// Encode `value` and serialize the document
    pub fn encode_to_string(&self, value: Option<&Value>, name: &QName) -> Result<String> {
        let document = self.encode(value, name)?;
        let options = WriteOptions::new()
            .with_indent(self.settings.pretty().then_some(2))
            .with_xml_declaration(self.settings.xml_declaration());
        Ok(document.write(&options))
    }

    /// Encode `value` as an element named `name`
    pub fn encode_element(&self, value: Option<&Value>, name: &QName) -> Result<Element> {
        let value = value.ok_or_else(|| Error::Encode(format!("no value to encode as {}", name)))?;
        let index = self.index()?;
        let result = index
            .element(name)
            .ok_or_else(|| Error::Declaration { name: name.clone() })
            .and_then(|declaration| {
                let (context, _) = document_context(&self.context);
                self.session(&index, &context).encode_element(value, &declaration, 1)
            });
        index.detach();
        result
    }

    /// Encode `value` as an attribute named `name`
    pub fn encode_attribute(&self, value: Option<&Value>, name: &QName) -> Result<Attribute> {
        let value = value.ok_or_else(|| Error::Encode(format!("no value to encode as {}", name)))?;
        let index = self.index()?;
        let result = index
            .attribute(name)
            .ok_or_else(|| Error::Declaration { name: name.clone() })
            .and_then(|declaration| {
                let mut owner = Element::new(name.clone());
                let (context, _) = document_context(&self.context);
                self.session(&index, &context).encode_attribute(value, &declaration, &mut owner)
            });
        index.detach();
        result
    }
}

/// Encoding state for one session
struct ElementEncoder<'a> {
    index: &'a SchemaIndex,
    walker: &'a BindingWalker,
    context: &'a Arc<Context>,
    converters: Arc<Converters>,
    limits: &'a Limits,
}

impl<'a> ElementEncoder<'a> {
    fn encode_element(&self, value: &Value, declaration: &Arc<ElementDecl>, depth: usize) -> Result<Element> {
        self.limits.check_depth(depth)?;
        let name = &declaration.name;
        let def = self.index.element_type(declaration);
        let bindings = self
            .walker
            .bindings(name, &def, self.index, self.context)
            .and_then(|b| self.walker.filter_for_value(name, b, value, self.context))
            .map_err(|e| Error::binding(name, e))?;

        let mut element = Element::new(name.clone());
        let text = self
            .run_bindings(name, &bindings, value, &mut element)
            .map_err(|e| Error::binding(name, e))?;
        if let Some(text) = text {
            if !element.children.iter().any(|c| matches!(c, Node::Element(_))) {
                element.set_text(text);
            }
        }

        if value.is_composite() {
            self.encode_attributes(value, &def, &bindings, &mut element)?;
            self.encode_children(value, declaration, &def, depth, &mut element)?;
        }
        trace!(element = %name, bindings = bindings.len(), "element encoded");
        Ok(element)
    }

    /// Run the bindings over `value`, returning the text produced by the
    /// simple ones
    fn run_bindings(
        &self,
        name: &QName,
        bindings: &[Binding],
        value: &Value,
        element: &mut Element,
    ) -> Result<Option<String>> {
        let mut text = None;
        for binding in bindings {
            match binding {
                Binding::Simple(b) => {
                    let Some(coerced) = self.coerce(name, binding, value) else {
                        continue;
                    };
                    text = b.encode(&coerced, text, element)?;
                }
                Binding::Complex(b) => {
                    let current = std::mem::replace(element, Element::new(name.clone()));
                    *element = b.encode(value, current)?;
                }
            }
        }
        Ok(text)
    }

    fn coerce(&self, name: &QName, binding: &Binding, value: &Value) -> Option<Value> {
        if value.is_composite() {
            return Some(value.clone());
        }
        let target = binding.value_type();
        let converted = self.converters.convert(value, &target);
        if converted.is_none() {
            warn!(
                component = %name,
                binding = ?binding.target(),
                expected = %target,
                actual = %value.value_type(),
                "cannot convert value, skipping binding"
            );
        }
        converted
    }

    fn encode_attributes(
        &self,
        value: &Value,
        def: &Arc<TypeDefinition>,
        bindings: &[Binding],
        element: &mut Element,
    ) -> Result<()> {
        let complex: Vec<_> = bindings.iter().filter_map(Binding::as_complex).collect();
        for attribute_use in self.index.attribute_uses(def) {
            let declaration = attribute_use.declaration;
            if element.get_attribute_qname(&declaration.name).is_some() {
                continue;
            }
            let property = complex.iter().find_map(|b| b.property(value, &declaration.name));
            let Some(v) = property.as_ref().and_then(|p| p.values().into_iter().next().cloned()) else {
                continue;
            };
            let attribute = self.encode_attribute(&v, &declaration, element)?;
            element.set_attribute(attribute);
        }

        for binding in &complex {
            for (name, v) in binding.attributes(value) {
                if element.get_attribute_qname(&name).is_some() {
                    continue;
                }
                let declaration = self
                    .index
                    .attribute_for(def, &name)
                    .unwrap_or_else(|| Arc::new(AttributeDecl::new(name.clone(), None)));
                let attribute = self.encode_attribute(&v, &declaration, element)?;
                element.set_attribute(attribute);
            }
        }
        Ok(())
    }

    fn encode_attribute(&self, value: &Value, declaration: &Arc<AttributeDecl>, owner: &mut Element) -> Result<Attribute> {
        let name = &declaration.name;
        if value.is_composite() {
            return Err(Error::binding(
                name,
                Error::Encode(format!("composite value cannot be written as attribute {}", name)),
            ));
        }
        let def = self.index.attribute_type(declaration);
        let bindings = self
            .walker
            .bindings(name, &def, self.index, self.context)
            .map_err(|e| Error::binding(name, e))?;
        let mut text = None;
        for binding in &bindings {
            if let Binding::Simple(b) = binding {
                let Some(coerced) = self.coerce(name, binding, value) else {
                    continue;
                };
                text = b.encode(&coerced, text, owner).map_err(|e| Error::binding(name, e))?;
            }
        }
        let text = text
            .or_else(|| value.to_lexical())
            .ok_or_else(|| Error::Encode(format!("no text for attribute {}", name)))?;
        Ok(Attribute::new(name.clone(), text))
    }

    fn encode_children(
        &self,
        value: &Value,
        declaration: &Arc<ElementDecl>,
        def: &Arc<TypeDefinition>,
        depth: usize,
        element: &mut Element,
    ) -> Result<()> {
        if element.children.iter().any(|c| matches!(c, Node::Element(_))) {
            // a complex binding already wrote the content
            return Ok(());
        }
        let extractor = BindingPropertyExtractor::new(self.index, self.walker);
        for property in extractor.properties(value, declaration, def, self.context)? {
            for v in property.value.values() {
                let child = self.encode_element(v, &property.particle.element, depth + 1)?;
                element.add_child(child);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::XsConfiguration;
    use crate::values::Record;
    use pretty_assertions::assert_eq;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:t" targetNamespace="urn:t" elementFormDefault="qualified">
      <xs:element name="order">
        <xs:complexType>
          <xs:sequence>
            <xs:element name="qty" type="xs:int"/>
            <xs:element name="note" type="xs:string" minOccurs="0"/>
          </xs:sequence>
          <xs:attribute name="id" type="xs:integer"/>
        </xs:complexType>
      </xs:element>
      <xs:element name="when" type="xs:boolean"/>
    </xs:schema>"#;

    fn encoder() -> Encoder {
        let schema = XsdSchema::from_str(XSD).unwrap();
        Encoder::new(Arc::new(XsConfiguration)).with_schema(schema)
    }

    fn t(local: &str) -> QName {
        QName::namespaced("urn:t", local)
    }

    #[test]
    fn test_null_value_is_an_error() {
        let err = encoder().encode(None, &t("when")).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_scalar_coerced_to_binding_type() {
        let element = encoder()
            .encode_element(Some(&Value::from("true")), &t("when"))
            .unwrap();
        assert_eq!(element.text(), "true");
    }

    #[test]
    fn test_record_children_and_attributes() {
        let record = Record::new()
            .with_attribute(QName::local("id"), Value::Integer(9))
            .with_child(t("note"), Value::from("rush"))
            .with_child(t("qty"), Value::Integer(3));
        let xml = encoder()
            .with_settings(EncoderSettings::new().with_xml_declaration(false))
            .encode_to_string(Some(&Value::Record(record)), &t("order"))
            .unwrap();
        assert_eq!(
            xml,
            r#"<order xmlns="urn:t" id="9"><qty>3</qty><note>rush</note></order>"#
        );
    }

    #[test]
    fn test_configured_prefix() {
        let xml = encoder()
            .with_settings(
                EncoderSettings::new()
                    .with_prefix("t", "urn:t")
                    .with_xml_declaration(false),
            )
            .encode_to_string(Some(&Value::Boolean(false)), &t("when"))
            .unwrap();
        assert_eq!(xml, r#"<t:when xmlns:t="urn:t">false</t:when>"#);
    }

    #[test]
    fn test_attribute() {
        let encoder = Encoder::new(Arc::new(XsConfiguration))
            .with_schema(XsdSchema::from_str(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
              <xs:attribute name="size" type="xs:decimal"/>
            </xs:schema>"#).unwrap());
        let attribute = encoder
            .encode_attribute(Some(&Value::Integer(12)), &QName::local("size"))
            .unwrap();
        assert_eq!(attribute.value, "12");
    }
}
