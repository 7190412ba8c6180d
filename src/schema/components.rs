//! Element and attribute declarations

use std::sync::Arc;

use crate::namespaces::QName;

use super::types::TypeRef;

/// Element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Element qualified name
    pub name: QName,
    /// Declared type; None means the substitution group head's type or
    /// xs:anyType
    pub type_ref: Option<TypeRef>,
    /// Head of the substitution group this element belongs to
    pub substitution_group: Option<QName>,
    /// Whether xsi:nil is allowed
    pub nillable: bool,
    /// Abstract element (only substitutes may appear)
    pub is_abstract: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Whether the element is declared at the top level of a schema
    pub global: bool,
}

impl ElementDecl {
    /// Create a new element declaration
    pub fn new(name: QName, type_ref: Option<TypeRef>) -> Self {
        Self {
            name,
            type_ref,
            substitution_group: None,
            nillable: false,
            is_abstract: false,
            default: None,
            fixed: None,
            global: false,
        }
    }

    /// Declaration accepting any content, used when an element has no
    /// declaration and the parser runs permissively
    pub fn any_type(name: QName) -> Self {
        Self::new(name, Some(TypeRef::xs("anyType")))
    }

    /// Mark as a global declaration
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Set the substitution group head
    pub fn with_substitution_group(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Value to use when the element text is empty
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

/// Attribute declaration
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Attribute qualified name
    pub name: QName,
    /// Declared simple type; None means xs:anySimpleType
    pub type_ref: Option<TypeRef>,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
}

impl AttributeDecl {
    /// Create a new attribute declaration
    pub fn new(name: QName, type_ref: Option<TypeRef>) -> Self {
        Self {
            name,
            type_ref,
            default: None,
            fixed: None,
        }
    }
}

/// Attribute declaration reached from a type
#[derive(Debug, Clone)]
pub enum AttributeRef {
    /// Locally declared attribute
    Local(Arc<AttributeDecl>),
    /// Reference to a global attribute
    Global(QName),
}

impl AttributeRef {
    /// Name of the attribute
    pub fn name(&self) -> &QName {
        match self {
            AttributeRef::Local(decl) => &decl.name,
            AttributeRef::Global(name) => name,
        }
    }
}

/// Use of an attribute by a complex type or attribute group
#[derive(Debug, Clone)]
pub struct AttributeUse {
    /// The attribute
    pub attribute: AttributeRef,
    /// use="required"
    pub required: bool,
    /// use="prohibited"
    pub prohibited: bool,
}

impl AttributeUse {
    /// Optional use of an attribute
    pub fn optional(attribute: AttributeRef) -> Self {
        Self {
            attribute,
            required: false,
            prohibited: false,
        }
    }

    /// Required use of an attribute
    pub fn required(attribute: AttributeRef) -> Self {
        Self {
            attribute,
            required: true,
            prohibited: false,
        }
    }
}

/// Named attribute group
#[derive(Debug, Clone)]
pub struct AttributeGroupDecl {
    /// Group name
    pub name: QName,
    /// Attributes declared by the group
    pub attributes: Vec<AttributeUse>,
    /// Nested attribute group references
    pub groups: Vec<QName>,
}

/// Declaration of an instance component (element or attribute)
#[derive(Debug, Clone)]
pub enum Declaration {
    /// Element declaration
    Element(Arc<ElementDecl>),
    /// Attribute declaration
    Attribute(Arc<AttributeDecl>),
}

impl Declaration {
    /// Qualified name of the declared component
    pub fn name(&self) -> &QName {
        match self {
            Declaration::Element(e) => &e.name,
            Declaration::Attribute(a) => &a.name,
        }
    }

    /// Declared type reference
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Declaration::Element(e) => e.type_ref.as_ref(),
            Declaration::Attribute(a) => a.type_ref.as_ref(),
        }
    }

    /// Element declaration, if this is one
    pub fn as_element(&self) -> Option<&Arc<ElementDecl>> {
        match self {
            Declaration::Element(e) => Some(e),
            Declaration::Attribute(_) => None,
        }
    }

    /// Whether this declares an attribute
    pub fn is_attribute(&self) -> bool {
        matches!(self, Declaration::Attribute(_))
    }
}
