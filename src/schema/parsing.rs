//! XSD Document Parsing
//!
//! Reads XSD documents into [`XsdSchema`]s. `xs:include` merges the
//! included document into the including schema, `xs:import` loads a
//! separate schema through the configured [`SchemaLocator`]. Imports that
//! cannot be located or loaded are dropped with a warning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codecs::WhiteSpace;
use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::loaders::Loader;
use crate::locations::{Location, RelativeLocator, SchemaLocator};
use crate::names::validate_ncname;
use crate::namespaces::{QName, XSD_NAMESPACE};

use super::components::{
    AttributeDecl, AttributeGroupDecl, AttributeRef, AttributeUse, ElementDecl,
};
use super::facets::{FacetSet, PatternFacet};
use super::particles::{parse_occurs, ElementTerm, ModelGroup, ModelGroupKind, Occurs, Term};
use super::schemas::XsdSchema;
use super::types::{
    ComplexTypeDef, ContentModel, Derivation, SimpleTypeDef, TypeDefinition, TypeRef,
};

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    // Facets
    pub const WHITE_SPACE: &str = "whiteSpace";
    pub const PATTERN: &str = "pattern";
    pub const ENUMERATION: &str = "enumeration";
    pub const MIN_LENGTH: &str = "minLength";
    pub const MAX_LENGTH: &str = "maxLength";
    pub const LENGTH: &str = "length";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const ELEMENT_FORM_DEFAULT: &str = "elementFormDefault";
    pub const ATTRIBUTE_FORM_DEFAULT: &str = "attributeFormDefault";
    pub const FORM: &str = "form";
    pub const NILLABLE: &str = "nillable";
    pub const DEFAULT: &str = "default";
    pub const FIXED: &str = "fixed";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const MIXED: &str = "mixed";
    pub const ABSTRACT: &str = "abstract";
    pub const SUBSTITUTION_GROUP: &str = "substitutionGroup";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const ITEM_TYPE: &str = "itemType";
    pub const MEMBER_TYPES: &str = "memberTypes";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const USE: &str = "use";
}

use xsd_attrs as attrs;
use xsd_elements as elems;

/// Reads XSD documents, following imports and includes
pub struct SchemaReader {
    locator: Arc<dyn SchemaLocator>,
    loader: Loader,
    loaded: HashMap<String, Arc<XsdSchema>>,
}

impl Default for SchemaReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace settings of the schema document being read
#[derive(Debug, Clone)]
struct SchemaScope {
    target_namespace: Option<String>,
    element_qualified: bool,
    attribute_qualified: bool,
}

impl SchemaScope {
    fn global_name(&self, local: &str) -> QName {
        QName::new(self.target_namespace.clone(), local)
    }

    fn local_name(&self, local: &str, form: Option<&str>, default_qualified: bool) -> QName {
        let qualified = match form {
            Some(form) => form == "qualified",
            None => default_qualified,
        };
        if qualified {
            self.global_name(local)
        } else {
            QName::local(local)
        }
    }
}

impl SchemaReader {
    /// Create a reader resolving locations relative to the including
    /// document
    pub fn new() -> Self {
        Self {
            locator: Arc::new(RelativeLocator),
            loader: Loader::new(),
            loaded: HashMap::new(),
        }
    }

    /// Set the schema locator
    pub fn with_locator(mut self, locator: Arc<dyn SchemaLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// Set the resource loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Read a schema from XSD text
    pub fn read_str(&mut self, xsd: &str) -> Result<Arc<XsdSchema>> {
        let doc = Document::from_string(xsd)?;
        self.build(&doc, None)
    }

    /// Read a schema from a location
    pub fn read_location(&mut self, location: &Location) -> Result<Arc<XsdSchema>> {
        let key = location_key(location);
        if let Some(schema) = key.as_ref().and_then(|k| self.loaded.get(k)) {
            return Ok(schema.clone());
        }
        let text = self.loader.load(location)?;
        let doc = Document::from_string(&text)?;
        self.build(&doc, Some(location.clone()))
    }

    fn build(&mut self, doc: &Document, location: Option<Location>) -> Result<Arc<XsdSchema>> {
        let root = schema_root(doc)?;
        let scope = SchemaScope {
            target_namespace: root.get_attribute(attrs::TARGET_NAMESPACE).map(str::to_string),
            element_qualified: root.get_attribute(attrs::ELEMENT_FORM_DEFAULT) == Some("qualified"),
            attribute_qualified: root.get_attribute(attrs::ATTRIBUTE_FORM_DEFAULT)
                == Some("qualified"),
        };

        let mut schema = XsdSchema::new(scope.target_namespace.as_deref());
        if let Some(location) = &location {
            schema = schema.with_location(location.clone());
        }
        let schema = Arc::new(schema);
        if let Some(key) = location.as_ref().and_then(location_key) {
            self.loaded.insert(key, schema.clone());
        }

        let mut included = HashSet::new();
        if let Some(key) = location.as_ref().and_then(location_key) {
            included.insert(key);
        }
        self.read_schema_children(&schema, root, &scope, location.as_ref(), &mut included)?;
        debug!(
            target_namespace = ?scope.target_namespace,
            elements = schema.elements().len(),
            types = schema.types().len(),
            "schema read"
        );
        Ok(schema)
    }

    fn read_schema_children(
        &mut self,
        schema: &Arc<XsdSchema>,
        root: &Element,
        scope: &SchemaScope,
        base: Option<&Location>,
        included: &mut HashSet<String>,
    ) -> Result<()> {
        for child in root.child_elements() {
            if child.namespace() != Some(XSD_NAMESPACE) {
                continue;
            }
            match child.local_name() {
                elems::IMPORT => self.read_import(schema, child, base),
                elems::INCLUDE => self.read_include(schema, child, scope, base, included)?,
                elems::ELEMENT => {
                    schema.add_element(parse_global_element(child, scope)?);
                }
                elems::ATTRIBUTE => {
                    schema.add_attribute(parse_global_attribute(child, scope)?);
                }
                elems::ATTRIBUTE_GROUP => {
                    schema.add_attribute_group(parse_attribute_group(child, scope)?);
                }
                elems::COMPLEX_TYPE => {
                    let name = required_name(child, scope)?;
                    schema.add_type(TypeDefinition::Complex(parse_complex_type(
                        child,
                        scope,
                        Some(name),
                    )?))?;
                }
                elems::SIMPLE_TYPE => {
                    let name = required_name(child, scope)?;
                    schema.add_type(TypeDefinition::Simple(parse_simple_type(
                        child,
                        scope,
                        Some(name),
                    )?))?;
                }
                elems::GROUP => {
                    let name = required_name(child, scope)?;
                    let group = child
                        .child_elements()
                        .find(|c| is_model_group(c))
                        .map(|c| parse_model_group(c, scope))
                        .transpose()?
                        .unwrap_or_else(|| ModelGroup::new(ModelGroupKind::Sequence));
                    schema.add_group(name, group);
                }
                // annotation, notation, redefine
                _ => {}
            }
        }
        Ok(())
    }

    fn read_import(&mut self, schema: &Arc<XsdSchema>, elem: &Element, base: Option<&Location>) {
        let namespace = elem.get_attribute(attrs::NAMESPACE);
        if namespace == Some(XSD_NAMESPACE) {
            return;
        }
        let hint = elem.get_attribute(attrs::SCHEMA_LOCATION);
        let Some(location) = self.locator.locate(namespace, hint, base) else {
            warn!(namespace = ?namespace, hint = ?hint, "import could not be located, dropping it");
            return;
        };
        match self.read_location(&location) {
            Ok(imported) => {
                if !Arc::ptr_eq(&imported, schema) {
                    schema.add_import(imported);
                }
            }
            Err(e) => {
                warn!(location = %location.as_str(), error = %e, "failed to load import, dropping it");
            }
        }
    }

    fn read_include(
        &mut self,
        schema: &Arc<XsdSchema>,
        elem: &Element,
        scope: &SchemaScope,
        base: Option<&Location>,
        included: &mut HashSet<String>,
    ) -> Result<()> {
        let hint = elem.get_attribute(attrs::SCHEMA_LOCATION);
        let Some(location) = self.locator.locate(scope.target_namespace.as_deref(), hint, base)
        else {
            warn!(hint = ?hint, "include could not be located, dropping it");
            return Ok(());
        };
        if let Some(key) = location_key(&location) {
            if !included.insert(key) {
                return Ok(());
            }
        }
        let doc = match self
            .loader
            .load(&location)
            .and_then(|text| Document::from_string(&text))
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!(location = %location.as_str(), error = %e, "failed to load include, dropping it");
                return Ok(());
            }
        };
        let root = schema_root(&doc)?;
        let included_scope = SchemaScope {
            // chameleon includes take the including namespace
            target_namespace: root
                .get_attribute(attrs::TARGET_NAMESPACE)
                .map(str::to_string)
                .or_else(|| scope.target_namespace.clone()),
            element_qualified: root.get_attribute(attrs::ELEMENT_FORM_DEFAULT) == Some("qualified"),
            attribute_qualified: root.get_attribute(attrs::ATTRIBUTE_FORM_DEFAULT)
                == Some("qualified"),
        };
        if included_scope.target_namespace != scope.target_namespace {
            return Err(Error::Schema(format!(
                "Included schema '{}' has a different target namespace",
                location.as_str()
            )));
        }
        self.read_schema_children(schema, root, &included_scope, Some(&location), included)
    }
}

fn location_key(location: &Location) -> Option<String> {
    match location {
        Location::String(_) => None,
        other => Some(other.as_str()),
    }
}

fn schema_root(doc: &Document) -> Result<&Element> {
    let root = doc
        .root
        .as_ref()
        .ok_or_else(|| Error::Schema("Empty schema document".to_string()))?;
    if root.namespace() != Some(XSD_NAMESPACE) || root.local_name() != elems::SCHEMA {
        return Err(Error::Schema(format!(
            "Root element {} is not xs:schema",
            root.qname
        )));
    }
    Ok(root)
}

fn is_xsd(elem: &Element, local: &str) -> bool {
    elem.namespace() == Some(XSD_NAMESPACE) && elem.local_name() == local
}

fn is_model_group(elem: &Element) -> bool {
    is_xsd(elem, elems::SEQUENCE) || is_xsd(elem, elems::CHOICE) || is_xsd(elem, elems::ALL)
}

fn xsd_child<'a>(elem: &'a Element, local: &str) -> Option<&'a Element> {
    elem.child_elements().find(|c| is_xsd(c, local))
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1"))
}

fn required_name(elem: &Element, scope: &SchemaScope) -> Result<QName> {
    let name = elem.get_attribute(attrs::NAME).ok_or_else(|| {
        Error::Schema(format!("Global xs:{} without a name", elem.local_name()))
    })?;
    validate_ncname(name)?;
    Ok(scope.global_name(name))
}

fn resolve_attr(elem: &Element, attr: &str) -> Result<Option<QName>> {
    elem.get_attribute(attr)
        .map(|value| elem.resolve_qname(value))
        .transpose()
}

fn parse_occurs_attrs(elem: &Element) -> Result<Occurs> {
    parse_occurs(
        elem.get_attribute(attrs::MIN_OCCURS),
        elem.get_attribute(attrs::MAX_OCCURS),
    )
}

/// Type of an element or attribute: `type` attribute or inline definition
fn parse_type_ref(elem: &Element, scope: &SchemaScope) -> Result<Option<TypeRef>> {
    if let Some(name) = resolve_attr(elem, attrs::TYPE)? {
        return Ok(Some(TypeRef::Named(name)));
    }
    if let Some(complex) = xsd_child(elem, elems::COMPLEX_TYPE) {
        let def = parse_complex_type(complex, scope, None)?;
        return Ok(Some(TypeRef::Anonymous(Arc::new(TypeDefinition::Complex(def)))));
    }
    if let Some(simple) = xsd_child(elem, elems::SIMPLE_TYPE) {
        let def = parse_simple_type(simple, scope, None)?;
        return Ok(Some(TypeRef::Anonymous(Arc::new(TypeDefinition::Simple(def)))));
    }
    Ok(None)
}

fn fill_element(mut decl: ElementDecl, elem: &Element) -> ElementDecl {
    decl.nillable = is_true(elem.get_attribute(attrs::NILLABLE));
    decl.is_abstract = is_true(elem.get_attribute(attrs::ABSTRACT));
    decl.default = elem.get_attribute(attrs::DEFAULT).map(str::to_string);
    decl.fixed = elem.get_attribute(attrs::FIXED).map(str::to_string);
    decl
}

fn parse_global_element(elem: &Element, scope: &SchemaScope) -> Result<ElementDecl> {
    let name = required_name(elem, scope)?;
    let type_ref = parse_type_ref(elem, scope)?;
    let mut decl = fill_element(ElementDecl::new(name, type_ref), elem).global();
    decl.substitution_group = resolve_attr(elem, attrs::SUBSTITUTION_GROUP)?;
    Ok(decl)
}

fn parse_local_element(elem: &Element, scope: &SchemaScope) -> Result<Term> {
    let occurs = parse_occurs_attrs(elem)?;
    if let Some(target) = resolve_attr(elem, attrs::REF)? {
        return Ok(Term::Element(ElementTerm::Ref(target), occurs));
    }
    let local = elem
        .get_attribute(attrs::NAME)
        .ok_or_else(|| Error::Schema("Local xs:element needs a name or ref".to_string()))?;
    validate_ncname(local)?;
    let name = scope.local_name(local, elem.get_attribute(attrs::FORM), scope.element_qualified);
    let type_ref = parse_type_ref(elem, scope)?;
    let decl = fill_element(ElementDecl::new(name, type_ref), elem);
    Ok(Term::Element(ElementTerm::Local(Arc::new(decl)), occurs))
}

fn parse_model_group(elem: &Element, scope: &SchemaScope) -> Result<ModelGroup> {
    let kind = match elem.local_name() {
        elems::CHOICE => ModelGroupKind::Choice,
        elems::ALL => ModelGroupKind::All,
        _ => ModelGroupKind::Sequence,
    };
    let mut group = ModelGroup::new(kind).with_occurs(parse_occurs_attrs(elem)?);

    for child in elem.child_elements() {
        if child.namespace() != Some(XSD_NAMESPACE) {
            continue;
        }
        let term = match child.local_name() {
            elems::ELEMENT => parse_local_element(child, scope)?,
            elems::SEQUENCE | elems::CHOICE | elems::ALL => {
                Term::Group(parse_model_group(child, scope)?)
            }
            elems::GROUP => parse_group_ref(child)?,
            elems::ANY => Term::Any(parse_occurs_attrs(child)?),
            _ => continue,
        };
        group.terms.push(term);
    }
    Ok(group)
}

fn parse_group_ref(elem: &Element) -> Result<Term> {
    let target = resolve_attr(elem, attrs::REF)?
        .ok_or_else(|| Error::Schema("Local xs:group needs a ref".to_string()))?;
    Ok(Term::GroupRef(target, parse_occurs_attrs(elem)?))
}

/// Content particle of a complex type or complexContent derivation
fn parse_particle_content(elem: &Element, scope: &SchemaScope) -> Result<Option<ModelGroup>> {
    for child in elem.child_elements() {
        if is_model_group(child) {
            return parse_model_group(child, scope).map(Some);
        }
        if is_xsd(child, elems::GROUP) {
            let term = parse_group_ref(child)?;
            return Ok(Some(ModelGroup::new(ModelGroupKind::Sequence).with_term(term)));
        }
    }
    Ok(None)
}

/// Attribute uses, attribute group references and wildcards of `elem`
fn parse_attribute_uses(
    elem: &Element,
    scope: &SchemaScope,
    uses: &mut Vec<AttributeUse>,
    groups: &mut Vec<QName>,
) -> Result<bool> {
    let mut any_attribute = false;
    for child in elem.child_elements() {
        if child.namespace() != Some(XSD_NAMESPACE) {
            continue;
        }
        match child.local_name() {
            elems::ATTRIBUTE => uses.push(parse_attribute_use(child, scope)?),
            elems::ATTRIBUTE_GROUP => {
                if let Some(target) = resolve_attr(child, attrs::REF)? {
                    groups.push(target);
                }
            }
            elems::ANY_ATTRIBUTE => any_attribute = true,
            _ => {}
        }
    }
    Ok(any_attribute)
}

fn parse_complex_type(
    elem: &Element,
    scope: &SchemaScope,
    name: Option<QName>,
) -> Result<ComplexTypeDef> {
    let mut def = ComplexTypeDef::new(name);
    def.mixed = is_true(elem.get_attribute(attrs::MIXED));

    if let Some(simple) = xsd_child(elem, elems::SIMPLE_CONTENT) {
        let (derivation, body) = derivation_of(simple)?;
        let base = resolve_attr(body, attrs::BASE)?
            .ok_or_else(|| Error::Schema("simpleContent derivation needs a base".to_string()))?;
        def.base = Some(TypeRef::Named(base));
        def.derivation = derivation;
        def.content = ContentModel::Simple;
        def.any_attribute =
            parse_attribute_uses(body, scope, &mut def.attributes, &mut def.attribute_groups)?;
        return Ok(def);
    }

    if let Some(complex) = xsd_child(elem, elems::COMPLEX_CONTENT) {
        if complex.get_attribute(attrs::MIXED).is_some() {
            def.mixed = is_true(complex.get_attribute(attrs::MIXED));
        }
        let (derivation, body) = derivation_of(complex)?;
        let base = resolve_attr(body, attrs::BASE)?
            .ok_or_else(|| Error::Schema("complexContent derivation needs a base".to_string()))?;
        def.base = Some(TypeRef::Named(base));
        def.derivation = derivation;
        if let Some(group) = parse_particle_content(body, scope)? {
            def.content = ContentModel::Elements(group);
        }
        def.any_attribute =
            parse_attribute_uses(body, scope, &mut def.attributes, &mut def.attribute_groups)?;
        return Ok(def);
    }

    if let Some(group) = parse_particle_content(elem, scope)? {
        def.content = ContentModel::Elements(group);
    }
    def.any_attribute =
        parse_attribute_uses(elem, scope, &mut def.attributes, &mut def.attribute_groups)?;
    Ok(def)
}

fn derivation_of(content: &Element) -> Result<(Derivation, &Element)> {
    if let Some(ext) = xsd_child(content, elems::EXTENSION) {
        return Ok((Derivation::Extension, ext));
    }
    if let Some(res) = xsd_child(content, elems::RESTRICTION) {
        return Ok((Derivation::Restriction, res));
    }
    Err(Error::Schema(format!(
        "xs:{} without extension or restriction",
        content.local_name()
    )))
}

fn parse_simple_type(
    elem: &Element,
    scope: &SchemaScope,
    name: Option<QName>,
) -> Result<SimpleTypeDef> {
    if let Some(restriction) = xsd_child(elem, elems::RESTRICTION) {
        let base = match resolve_attr(restriction, attrs::BASE)? {
            Some(base) => TypeRef::Named(base),
            None => {
                let inline = xsd_child(restriction, elems::SIMPLE_TYPE).ok_or_else(|| {
                    Error::Schema("xs:restriction needs a base or an inline simpleType".to_string())
                })?;
                TypeRef::Anonymous(Arc::new(TypeDefinition::Simple(parse_simple_type(
                    inline, scope, None,
                )?)))
            }
        };
        let facets = parse_facets(restriction)?;
        return Ok(SimpleTypeDef::restriction(name, base).with_facets(facets));
    }

    if let Some(list) = xsd_child(elem, elems::LIST) {
        let item = match resolve_attr(list, attrs::ITEM_TYPE)? {
            Some(item) => TypeRef::Named(item),
            None => {
                let inline = xsd_child(list, elems::SIMPLE_TYPE).ok_or_else(|| {
                    Error::Schema("xs:list needs an itemType or an inline simpleType".to_string())
                })?;
                TypeRef::Anonymous(Arc::new(TypeDefinition::Simple(parse_simple_type(
                    inline, scope, None,
                )?)))
            }
        };
        let facets = FacetSet::new().with_white_space(WhiteSpace::Collapse);
        return Ok(SimpleTypeDef::list(name, item).with_facets(facets));
    }

    if let Some(union) = xsd_child(elem, elems::UNION) {
        let mut members = Vec::new();
        if let Some(names) = union.get_attribute(attrs::MEMBER_TYPES) {
            for member in names.split_whitespace() {
                members.push(TypeRef::Named(union.resolve_qname(member)?));
            }
        }
        for inline in union.child_elements().filter(|c| is_xsd(c, elems::SIMPLE_TYPE)) {
            members.push(TypeRef::Anonymous(Arc::new(TypeDefinition::Simple(
                parse_simple_type(inline, scope, None)?,
            ))));
        }
        if members.is_empty() {
            return Err(Error::Schema("xs:union without member types".to_string()));
        }
        return Ok(SimpleTypeDef::union(name, members));
    }

    Err(Error::Schema(
        "xs:simpleType needs a restriction, list or union".to_string(),
    ))
}

fn parse_facets(restriction: &Element) -> Result<FacetSet> {
    let mut facets = FacetSet::new();
    let mut patterns = Vec::new();

    for child in restriction.child_elements() {
        if child.namespace() != Some(XSD_NAMESPACE) {
            continue;
        }
        let value = child.get_attribute(attrs::VALUE);
        let length = || -> Result<usize> {
            value
                .unwrap_or_default()
                .trim()
                .parse::<usize>()
                .map_err(|_| {
                    Error::Schema(format!(
                        "xs:{} value must be a non-negative integer",
                        child.local_name()
                    ))
                })
        };
        match child.local_name() {
            elems::WHITE_SPACE => {
                facets.white_space = Some(WhiteSpace::from_str(value.unwrap_or_default())?)
            }
            elems::LENGTH => facets.length = Some(length()?),
            elems::MIN_LENGTH => facets.min_length = Some(length()?),
            elems::MAX_LENGTH => facets.max_length = Some(length()?),
            elems::ENUMERATION => facets.enumeration.push(value.unwrap_or_default().to_string()),
            elems::PATTERN => patterns.push(value.unwrap_or_default().to_string()),
            _ => {}
        }
    }

    // patterns of one derivation step are alternatives
    if !patterns.is_empty() {
        let combined = patterns
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");
        facets.patterns.push(PatternFacet::new(&combined)?);
    }
    Ok(facets)
}

fn parse_attribute_decl(elem: &Element, name: QName, scope: &SchemaScope) -> Result<AttributeDecl> {
    let type_ref = match resolve_attr(elem, attrs::TYPE)? {
        Some(ty) => Some(TypeRef::Named(ty)),
        None => match xsd_child(elem, elems::SIMPLE_TYPE) {
            Some(simple) => Some(TypeRef::Anonymous(Arc::new(TypeDefinition::Simple(
                parse_simple_type(simple, scope, None)?,
            )))),
            None => None,
        },
    };
    let mut decl = AttributeDecl::new(name, type_ref);
    decl.default = elem.get_attribute(attrs::DEFAULT).map(str::to_string);
    decl.fixed = elem.get_attribute(attrs::FIXED).map(str::to_string);
    Ok(decl)
}

fn parse_global_attribute(elem: &Element, scope: &SchemaScope) -> Result<AttributeDecl> {
    let name = required_name(elem, scope)?;
    parse_attribute_decl(elem, name, scope)
}

fn parse_attribute_use(elem: &Element, scope: &SchemaScope) -> Result<AttributeUse> {
    let attribute = match resolve_attr(elem, attrs::REF)? {
        Some(target) => AttributeRef::Global(target),
        None => {
            let local = elem.get_attribute(attrs::NAME).ok_or_else(|| {
                Error::Schema("Local xs:attribute needs a name or ref".to_string())
            })?;
            validate_ncname(local)?;
            let name =
                scope.local_name(local, elem.get_attribute(attrs::FORM), scope.attribute_qualified);
            AttributeRef::Local(Arc::new(parse_attribute_decl(elem, name, scope)?))
        }
    };
    let mut attribute_use = AttributeUse::optional(attribute);
    match elem.get_attribute(attrs::USE).map(str::trim) {
        Some("required") => attribute_use.required = true,
        Some("prohibited") => attribute_use.prohibited = true,
        _ => {}
    }
    Ok(attribute_use)
}

fn parse_attribute_group(elem: &Element, scope: &SchemaScope) -> Result<AttributeGroupDecl> {
    let name = required_name(elem, scope)?;
    let mut group = AttributeGroupDecl {
        name,
        attributes: Vec::new(),
        groups: Vec::new(),
    };
    parse_attribute_uses(elem, scope, &mut group.attributes, &mut group.groups)?;
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::MemoryLocator;
    use crate::schema::types::SimpleDerivation;

    const PURCHASE_ORDER: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:po="urn:po" targetNamespace="urn:po" elementFormDefault="qualified">
  <xs:element name="order" type="po:OrderType"/>
  <xs:element name="comment" type="xs:string"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="item" type="po:ItemType" maxOccurs="unbounded"/>
      <xs:element ref="po:comment" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:ID" use="required"/>
  </xs:complexType>
  <xs:complexType name="ItemType">
    <xs:simpleContent>
      <xs:extension base="xs:decimal">
        <xs:attribute name="sku" type="po:Sku"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
  <xs:simpleType name="Sku">
    <xs:restriction base="xs:string">
      <xs:pattern value="\d{3}-[A-Z]{2}"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Sizes">
    <xs:list itemType="xs:integer"/>
  </xs:simpleType>
</xs:schema>"#;

    #[test]
    fn test_read_purchase_order() {
        let schema = SchemaReader::new().read_str(PURCHASE_ORDER).unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:po"));

        let order = schema.element(&QName::namespaced("urn:po", "order")).unwrap();
        assert!(order.global);
        assert_eq!(
            order.type_ref.as_ref().and_then(|t| t.name()),
            Some(&QName::namespaced("urn:po", "OrderType"))
        );

        let order_type = schema
            .type_definition(&QName::namespaced("urn:po", "OrderType"))
            .unwrap();
        let complex = order_type.as_complex().unwrap();
        assert_eq!(complex.attributes.len(), 1);
        assert!(complex.attributes[0].required);
        match &complex.content {
            ContentModel::Elements(group) => {
                assert_eq!(group.terms.len(), 2);
                match &group.terms[0] {
                    Term::Element(ElementTerm::Local(item), occurs) => {
                        assert_eq!(item.name, QName::namespaced("urn:po", "item"));
                        assert_eq!(*occurs, Occurs::one_or_more());
                    }
                    other => panic!("unexpected term {:?}", other),
                }
                assert!(matches!(&group.terms[1], Term::Element(ElementTerm::Ref(_), _)));
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_simple_types() {
        let schema = SchemaReader::new().read_str(PURCHASE_ORDER).unwrap();
        let sku = schema.type_definition(&QName::namespaced("urn:po", "Sku")).unwrap();
        let sku = sku.as_simple().unwrap();
        assert_eq!(sku.facets.patterns.len(), 1);
        assert!(sku.facets.patterns[0].is_match("123-AB"));

        let sizes = schema.type_definition(&QName::namespaced("urn:po", "Sizes")).unwrap();
        assert!(matches!(
            sizes.as_simple().unwrap().derivation,
            SimpleDerivation::List(_)
        ));

        let item = schema.type_definition(&QName::namespaced("urn:po", "ItemType")).unwrap();
        let item = item.as_complex().unwrap();
        assert!(matches!(item.content, ContentModel::Simple));
        assert_eq!(item.derivation, Derivation::Extension);
    }

    #[test]
    fn test_unqualified_local_elements() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
            <xs:element name="root">
              <xs:complexType><xs:sequence><xs:element name="child" type="xs:int"/></xs:sequence></xs:complexType>
            </xs:element>
          </xs:schema>"#;
        let schema = SchemaReader::new().read_str(xsd).unwrap();
        let root = schema.element(&QName::namespaced("urn:t", "root")).unwrap();
        let Some(TypeRef::Anonymous(def)) = &root.type_ref else {
            panic!("expected an anonymous type");
        };
        let ContentModel::Elements(group) = &def.as_complex().unwrap().content else {
            panic!("expected element content");
        };
        let Term::Element(ElementTerm::Local(child), _) = &group.terms[0] else {
            panic!("expected a local element");
        };
        assert_eq!(child.name, QName::local("child"));
    }

    #[test]
    fn test_imports_through_locator() {
        let common = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:common">
            <xs:element name="note" type="xs:string"/>
          </xs:schema>"#;
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
            <xs:import namespace="urn:common" schemaLocation="common.xsd"/>
            <xs:import namespace="urn:missing" schemaLocation="missing.xsd"/>
          </xs:schema>"#;
        let locator = Arc::new(MemoryLocator::new().with_location("common.xsd", common));
        let schema = SchemaReader::new().with_locator(locator).read_str(main).unwrap();

        let imports = schema.imports();
        assert_eq!(imports.len(), 1);
        assert!(imports[0]
            .element(&QName::namespaced("urn:common", "note"))
            .is_some());
    }

    #[test]
    fn test_not_a_schema() {
        assert!(matches!(
            SchemaReader::new().read_str("<root/>"),
            Err(Error::Schema(_))
        ));
    }
}
