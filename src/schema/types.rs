//! Simple and complex type definitions
//!
//! Type references are by name so that recursive and forward references
//! need no cycles in the object graph; the schema index resolves them.

use std::sync::Arc;

use crate::namespaces::QName;

use super::components::AttributeUse;
use super::facets::FacetSet;
use super::particles::ModelGroup;

/// Reference from a component to its type
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Named (global or built-in) type
    Named(QName),
    /// Anonymous type declared inline
    Anonymous(Arc<TypeDefinition>),
}

impl TypeRef {
    /// Reference to a built-in XSD type
    pub fn xs(local_name: &str) -> Self {
        TypeRef::Named(QName::xs(local_name))
    }

    /// Name of the referenced type, if it is named
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Anonymous(def) => def.name(),
        }
    }
}

/// How a simple type is derived from its base
#[derive(Debug, Clone)]
pub enum SimpleDerivation {
    /// Primitive built-in type (base is anySimpleType)
    Primitive,
    /// Restriction of a base type
    Restriction(TypeRef),
    /// List of an item type
    List(TypeRef),
    /// Union of member types
    Union(Vec<TypeRef>),
}

/// Simple type definition
#[derive(Debug, Clone)]
pub struct SimpleTypeDef {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Derivation from the base type
    pub derivation: SimpleDerivation,
    /// Facets declared by this restriction step
    pub facets: FacetSet,
}

impl SimpleTypeDef {
    /// Create a restriction of `base`
    pub fn restriction(name: Option<QName>, base: TypeRef) -> Self {
        Self {
            name,
            derivation: SimpleDerivation::Restriction(base),
            facets: FacetSet::new(),
        }
    }

    /// Create a list of `item`
    pub fn list(name: Option<QName>, item: TypeRef) -> Self {
        Self {
            name,
            derivation: SimpleDerivation::List(item),
            facets: FacetSet::new(),
        }
    }

    /// Create a union of `members`
    pub fn union(name: Option<QName>, members: Vec<TypeRef>) -> Self {
        Self {
            name,
            derivation: SimpleDerivation::Union(members),
            facets: FacetSet::new(),
        }
    }

    /// Set the facets
    pub fn with_facets(mut self, facets: FacetSet) -> Self {
        self.facets = facets;
        self
    }
}

/// Derivation method of a complex type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Extension of the base type
    Extension,
    /// Restriction of the base type
    Restriction,
}

/// Content of a complex type
#[derive(Debug, Clone)]
pub enum ContentModel {
    /// No text and no children
    Empty,
    /// Simple content (text typed by the base simple type)
    Simple,
    /// Element content
    Elements(ModelGroup),
    /// Any content (xs:anyType)
    Any,
}

/// Complex type definition
#[derive(Debug, Clone)]
pub struct ComplexTypeDef {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Base type (None means xs:anyType)
    pub base: Option<TypeRef>,
    /// Derivation method from the base
    pub derivation: Derivation,
    /// Content declared by this type (the base content is added for
    /// extensions by the index)
    pub content: ContentModel,
    /// Attributes declared by this type
    pub attributes: Vec<AttributeUse>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<QName>,
    /// Whether any attribute is allowed
    pub any_attribute: bool,
    /// Mixed content
    pub mixed: bool,
}

impl ComplexTypeDef {
    /// Create a complex type with empty content
    pub fn new(name: Option<QName>) -> Self {
        Self {
            name,
            base: None,
            derivation: Derivation::Restriction,
            content: ContentModel::Empty,
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: false,
            mixed: false,
        }
    }

    /// Set the base type and derivation
    pub fn with_base(mut self, base: TypeRef, derivation: Derivation) -> Self {
        self.base = Some(base);
        self.derivation = derivation;
        self
    }

    /// Set the content model
    pub fn with_content(mut self, content: ContentModel) -> Self {
        self.content = content;
        self
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeUse) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Simple or complex type definition
#[derive(Debug, Clone)]
pub enum TypeDefinition {
    /// Simple type
    Simple(SimpleTypeDef),
    /// Complex type
    Complex(ComplexTypeDef),
}

impl TypeDefinition {
    /// Type name (None for anonymous types)
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeDefinition::Simple(s) => s.name.as_ref(),
            TypeDefinition::Complex(c) => c.name.as_ref(),
        }
    }

    /// Base type reference; None only for xs:anyType
    pub fn base(&self) -> Option<TypeRef> {
        match self {
            TypeDefinition::Simple(s) => match &s.derivation {
                SimpleDerivation::Restriction(base) => Some(base.clone()),
                _ if s.name.as_ref() == Some(&QName::xs("anySimpleType")) => {
                    Some(TypeRef::xs("anyType"))
                }
                _ => Some(TypeRef::xs("anySimpleType")),
            },
            TypeDefinition::Complex(c) => {
                if c.name.as_ref() == Some(&QName::xs("anyType")) {
                    None
                } else {
                    Some(c.base.clone().unwrap_or_else(|| TypeRef::xs("anyType")))
                }
            }
        }
    }

    /// Whether this is a simple type
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeDefinition::Simple(_))
    }

    /// Simple type definition, if simple
    pub fn as_simple(&self) -> Option<&SimpleTypeDef> {
        match self {
            TypeDefinition::Simple(s) => Some(s),
            TypeDefinition::Complex(_) => None,
        }
    }

    /// Complex type definition, if complex
    pub fn as_complex(&self) -> Option<&ComplexTypeDef> {
        match self {
            TypeDefinition::Complex(c) => Some(c),
            TypeDefinition::Simple(_) => None,
        }
    }

    /// Mixed content
    pub fn is_mixed(&self) -> bool {
        matches!(self, TypeDefinition::Complex(c) if c.mixed)
    }

    /// Display name, `(anonymous)` for unnamed types
    pub fn display_name(&self) -> String {
        self.name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(anonymous)".to_string())
    }
}
