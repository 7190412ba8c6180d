//! Schema index
//!
//! Lookup tables over a set of schemas (and everything they import):
//! qualified name to element, attribute, attribute group and type. The
//! tables are built lazily under double-checked locking so that a shared
//! index tolerates concurrent readers. The index registers itself as a
//! listener on every schema it covers; a mutation drops the affected table
//! and the next lookup rebuilds it. Child particle lists are cached per
//! element declaration and never patched in place.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::codecs::WhiteSpace;
use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::builtins::{any_type, builtin_type, XSD_ANY_SIMPLE_TYPE};
use super::components::{AttributeDecl, AttributeGroupDecl, AttributeRef, AttributeUse, ElementDecl};
use super::particles::{ElementTerm, ModelGroup, ModelGroupKind, Occurs, Particle, Term};
use super::schemas::{ListenerId, SchemaChange, SchemaListener, XsdSchema};
use super::types::{ContentModel, Derivation, SimpleDerivation, TypeDefinition, TypeRef};

/// Deepest type hierarchy or group nesting followed before giving up
const MAX_DEPTH: usize = 64;

/// Kind of global component looked up through [`SchemaIndex::declaration_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Global element
    Element,
    /// Global attribute
    Attribute,
    /// Attribute group
    AttributeGroup,
    /// Named type
    Type,
}

/// Component found by [`SchemaIndex::declaration_for`]
#[derive(Debug, Clone)]
pub enum IndexedComponent {
    /// Element declaration
    Element(Arc<ElementDecl>),
    /// Attribute declaration
    Attribute(Arc<AttributeDecl>),
    /// Attribute group
    AttributeGroup(Arc<AttributeGroupDecl>),
    /// Type definition
    Type(Arc<TypeDefinition>),
}

/// Ordered child element particles of an element
#[derive(Debug, Clone, Default)]
pub struct ChildParticles {
    particles: IndexMap<QName, Particle>,
    wildcard: bool,
}

impl ChildParticles {
    /// Particle for a child name
    pub fn get(&self, name: &QName) -> Option<&Particle> {
        self.particles.get(name)
    }

    /// Particles in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&QName, &Particle)> {
        self.particles.iter()
    }

    /// Position of a child name in schema order
    pub fn position(&self, name: &QName) -> Option<usize> {
        self.particles.get_index_of(name)
    }

    /// Number of declared children
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether no child is declared
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Whether the content model contains an element wildcard
    pub fn has_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The only declared child, if there is exactly one
    pub fn single(&self) -> Option<&Particle> {
        if self.particles.len() == 1 {
            self.particles.values().next()
        } else {
            None
        }
    }

    fn push(&mut self, element: Arc<ElementDecl>, occurs: Occurs) {
        match self.particles.get_mut(&element.name) {
            Some(existing) => existing.occurs = existing.occurs.add(occurs),
            None => {
                self.particles
                    .insert(element.name.clone(), Particle::new(element, occurs));
            }
        }
    }
}

/// Attribute use with its declaration resolved
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    /// Attribute declaration
    pub declaration: Arc<AttributeDecl>,
    /// use="required"
    pub required: bool,
}

/// Variety of a simple type
#[derive(Debug, Clone)]
pub enum SimpleVariety {
    /// Atomic type
    Atomic,
    /// List of the given item type
    List(Arc<TypeDefinition>),
    /// Union type
    Union,
}

type Table<T> = RwLock<Option<Arc<HashMap<QName, Arc<T>>>>>;
type ChildKey = (usize, usize);
type ChildEntry = (Arc<ElementDecl>, Arc<TypeDefinition>, Arc<ChildParticles>);

#[derive(Default)]
struct IndexState {
    elements: Table<ElementDecl>,
    attributes: Table<AttributeDecl>,
    attribute_groups: Table<AttributeGroupDecl>,
    types: Table<TypeDefinition>,
    substitutions: RwLock<Option<Arc<HashMap<QName, Vec<Arc<ElementDecl>>>>>>,
    children: RwLock<HashMap<ChildKey, ChildEntry>>,
    rebuilds: AtomicUsize,
}

fn clear<T>(lock: &RwLock<Option<T>>) {
    *lock.write().unwrap_or_else(|p| p.into_inner()) = None;
}

impl IndexState {
    fn clear_children(&self) {
        self.children.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    fn clear_all(&self) {
        clear(&self.elements);
        clear(&self.attributes);
        clear(&self.attribute_groups);
        clear(&self.types);
        clear(&self.substitutions);
        self.clear_children();
    }
}

impl SchemaListener for IndexState {
    fn schema_changed(&self, _schema: &XsdSchema, change: &SchemaChange) {
        debug!(change = ?change, "invalidating schema index");
        match change {
            SchemaChange::Element(_) => {
                clear(&self.elements);
                clear(&self.substitutions);
                self.clear_children();
            }
            SchemaChange::Attribute(_) => clear(&self.attributes),
            SchemaChange::AttributeGroup(_) => clear(&self.attribute_groups),
            SchemaChange::Type(_) => {
                clear(&self.types);
                self.clear_children();
            }
            SchemaChange::Group(_) => self.clear_children(),
            SchemaChange::Import => self.clear_all(),
        }
    }
}

/// Lazily built lookup tables over a set of schemas
pub struct SchemaIndex {
    roots: Vec<Arc<XsdSchema>>,
    state: Arc<IndexState>,
    listeners: Mutex<Vec<(Weak<XsdSchema>, ListenerId)>>,
}

impl std::fmt::Debug for SchemaIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaIndex")
            .field("schemas", &self.roots.len())
            .finish()
    }
}

impl SchemaIndex {
    /// Create an index over `schemas` and the schemas they import
    pub fn new(schemas: Vec<Arc<XsdSchema>>) -> Self {
        let index = Self {
            roots: schemas,
            state: Arc::new(IndexState::default()),
            listeners: Mutex::new(Vec::new()),
        };
        index.attach();
        index
    }

    /// Create an index from schema load results.
    ///
    /// Schemas that failed to load are dropped with a warning. When none
    /// remain, `default_schema` is used; without one the index is empty,
    /// or creation fails in strict mode.
    pub fn resolve(
        candidates: Vec<Result<Arc<XsdSchema>>>,
        default_schema: Option<Arc<XsdSchema>>,
        strict: bool,
    ) -> Result<Self> {
        let mut schemas = Vec::new();
        for candidate in candidates {
            match candidate {
                Ok(schema) => schemas.push(schema),
                Err(e) => warn!(error = %e, "dropping schema that failed to resolve"),
            }
        }
        if schemas.is_empty() {
            match default_schema {
                Some(schema) => {
                    debug!("no schema resolved, using the configuration default schema");
                    schemas.push(schema);
                }
                None if strict => {
                    return Err(Error::Schema("No schema could be resolved".to_string()));
                }
                None => warn!("no schema resolved, continuing with an empty index"),
            }
        }
        Ok(Self::new(schemas))
    }

    fn attach(&self) {
        let listener: Weak<dyn SchemaListener> = Arc::downgrade(&self.state) as Weak<dyn SchemaListener>;
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        for schema in self.schemas() {
            let id = schema.add_listener(listener.clone());
            listeners.push((Arc::downgrade(&schema), id));
        }
    }

    /// Detach from every observed schema and drop all cached tables
    pub fn detach(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        for (schema, id) in listeners.drain(..) {
            if let Some(schema) = schema.upgrade() {
                schema.remove_listener(id);
            }
        }
        self.state.clear_all();
    }

    /// Root schemas followed by their transitive imports
    pub fn schemas(&self) -> Vec<Arc<XsdSchema>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: Vec<Arc<XsdSchema>> = self.roots.iter().rev().cloned().collect();
        while let Some(schema) = queue.pop() {
            if !seen.insert(Arc::as_ptr(&schema) as usize) {
                continue;
            }
            for import in schema.imports().into_iter().rev() {
                queue.push(import);
            }
            out.push(schema);
        }
        out
    }

    /// Number of table rebuilds so far
    pub fn rebuild_count(&self) -> usize {
        self.state.rebuilds.load(Ordering::Relaxed)
    }

    fn cached<T>(
        &self,
        lock: &RwLock<Option<Arc<T>>>,
        what: &str,
        build: impl FnOnce(&[Arc<XsdSchema>]) -> T,
    ) -> Arc<T> {
        if let Some(table) = lock.read().unwrap_or_else(|p| p.into_inner()).as_ref() {
            return table.clone();
        }
        let mut guard = lock.write().unwrap_or_else(|p| p.into_inner());
        if let Some(table) = guard.as_ref() {
            return table.clone();
        }
        debug!(table = what, "building schema index table");
        self.state.rebuilds.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(build(&self.schemas()));
        *guard = Some(table.clone());
        table
    }

    fn element_table(&self) -> Arc<HashMap<QName, Arc<ElementDecl>>> {
        self.cached(&self.state.elements, "elements", |schemas| {
            let mut map = HashMap::new();
            for schema in schemas {
                for e in schema.elements() {
                    map.entry(e.name.clone()).or_insert(e);
                }
            }
            map
        })
    }

    fn attribute_table(&self) -> Arc<HashMap<QName, Arc<AttributeDecl>>> {
        self.cached(&self.state.attributes, "attributes", |schemas| {
            let mut map = HashMap::new();
            for schema in schemas {
                for a in schema.attributes() {
                    map.entry(a.name.clone()).or_insert(a);
                }
            }
            map
        })
    }

    fn attribute_group_table(&self) -> Arc<HashMap<QName, Arc<AttributeGroupDecl>>> {
        self.cached(&self.state.attribute_groups, "attribute groups", |schemas| {
            let mut map = HashMap::new();
            for schema in schemas {
                for g in schema.attribute_groups() {
                    map.entry(g.name.clone()).or_insert(g);
                }
            }
            map
        })
    }

    fn type_table(&self) -> Arc<HashMap<QName, Arc<TypeDefinition>>> {
        self.cached(&self.state.types, "types", |schemas| {
            let mut map = HashMap::new();
            for schema in schemas {
                for t in schema.types() {
                    if let Some(name) = t.name() {
                        map.entry(name.clone()).or_insert_with(|| t.clone());
                    }
                }
            }
            map
        })
    }

    fn substitution_table(&self) -> Arc<HashMap<QName, Vec<Arc<ElementDecl>>>> {
        let elements = self.element_table();
        self.cached(&self.state.substitutions, "substitution groups", |_| {
            let mut map: HashMap<QName, Vec<Arc<ElementDecl>>> = HashMap::new();
            for e in elements.values() {
                if let Some(head) = &e.substitution_group {
                    map.entry(head.clone()).or_default().push(e.clone());
                }
            }
            for members in map.values_mut() {
                members.sort_by(|a, b| a.name.cmp(&b.name));
            }
            map
        })
    }

    /// Look up `name` in `table`; the wildcard namespace matches on local
    /// name and only succeeds when exactly one candidate matches
    fn lookup<T>(table: &HashMap<QName, Arc<T>>, name: &QName) -> Option<Arc<T>> {
        if !name.is_wildcard() {
            return table.get(name).cloned();
        }
        let mut matches = table
            .iter()
            .filter(|(k, _)| k.local_name == name.local_name)
            .map(|(_, v)| v);
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(name = %name.local_name, "ambiguous wildcard lookup");
            return None;
        }
        Some(first.clone())
    }

    // =========================================================================
    // Global lookups
    // =========================================================================

    /// Global component of `kind` named `name`
    pub fn declaration_for(&self, kind: ComponentKind, name: &QName) -> Option<IndexedComponent> {
        match kind {
            ComponentKind::Element => self.element(name).map(IndexedComponent::Element),
            ComponentKind::Attribute => self.attribute(name).map(IndexedComponent::Attribute),
            ComponentKind::AttributeGroup => {
                self.attribute_group(name).map(IndexedComponent::AttributeGroup)
            }
            ComponentKind::Type => self.type_definition(name).map(IndexedComponent::Type),
        }
    }

    /// Global element declaration
    pub fn element(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        Self::lookup(&self.element_table(), name)
    }

    /// Global element ignoring namespaces (unique local name match)
    pub fn element_ignoring_namespace(&self, local_name: &str) -> Option<Arc<ElementDecl>> {
        self.element(&QName::wildcard(local_name))
    }

    /// Global attribute declaration
    pub fn attribute(&self, name: &QName) -> Option<Arc<AttributeDecl>> {
        Self::lookup(&self.attribute_table(), name)
    }

    /// Attribute group
    pub fn attribute_group(&self, name: &QName) -> Option<Arc<AttributeGroupDecl>> {
        Self::lookup(&self.attribute_group_table(), name)
    }

    /// Type definition, including built-in types
    pub fn type_definition(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        builtin_type(name).or_else(|| Self::lookup(&self.type_table(), name))
    }

    /// Named model group
    pub fn group(&self, name: &QName) -> Option<Arc<ModelGroup>> {
        self.schemas().iter().find_map(|s| s.group(name))
    }

    /// Global elements of all schemas, in schema order
    pub fn global_elements(&self) -> Vec<Arc<ElementDecl>> {
        self.schemas().iter().flat_map(|s| s.elements()).collect()
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Resolve a type reference
    pub fn resolve_type(&self, type_ref: &TypeRef) -> Option<Arc<TypeDefinition>> {
        match type_ref {
            TypeRef::Named(name) => self.type_definition(name),
            TypeRef::Anonymous(def) => Some(def.clone()),
        }
    }

    /// Effective type of an element: its declared type, the type of its
    /// substitution group head, or xs:anyType
    pub fn element_type(&self, element: &ElementDecl) -> Arc<TypeDefinition> {
        let mut current = Some(element.clone());
        for _ in 0..MAX_DEPTH {
            let Some(decl) = current.take() else { break };
            if let Some(type_ref) = &decl.type_ref {
                return match self.resolve_type(type_ref) {
                    Some(def) => def,
                    None => {
                        warn!(element = %element.name, type_name = ?type_ref.name(), "unresolved type, using xs:anyType");
                        any_type()
                    }
                };
            }
            current = decl
                .substitution_group
                .as_ref()
                .and_then(|head| self.element(head))
                .map(|head| (*head).clone());
        }
        any_type()
    }

    /// Effective type of an attribute (xs:anySimpleType when undeclared)
    pub fn attribute_type(&self, attribute: &AttributeDecl) -> Arc<TypeDefinition> {
        attribute
            .type_ref
            .as_ref()
            .and_then(|t| self.resolve_type(t))
            .or_else(|| builtin_type(&QName::xs(XSD_ANY_SIMPLE_TYPE)))
            .unwrap_or_else(any_type)
    }

    /// Base type of a definition
    pub fn base_type(&self, def: &TypeDefinition) -> Option<Arc<TypeDefinition>> {
        def.base().and_then(|b| self.resolve_type(&b))
    }

    /// `def` followed by its base types, most derived first, ending at
    /// xs:anyType
    pub fn type_hierarchy(&self, def: &Arc<TypeDefinition>) -> Vec<Arc<TypeDefinition>> {
        let mut chain = vec![def.clone()];
        let mut current = def.clone();
        while chain.len() < MAX_DEPTH {
            let Some(base) = self.base_type(&current) else { break };
            if chain.iter().any(|t| Arc::ptr_eq(t, &base)) {
                warn!(type_name = %current.display_name(), "circular type derivation");
                break;
            }
            chain.push(base.clone());
            current = base;
        }
        trace!(types = chain.len(), "type hierarchy");
        chain
    }

    /// Whether `def` is `ancestor` or derives from it
    pub fn derives_from(&self, def: &Arc<TypeDefinition>, ancestor: &QName) -> bool {
        self.type_hierarchy(def)
            .iter()
            .any(|t| t.name() == Some(ancestor))
    }

    /// Simple type governing the text of `def`: `def` itself for simple
    /// types, the simple base for complex types with simple content
    pub fn simple_content_type(&self, def: &Arc<TypeDefinition>) -> Option<Arc<TypeDefinition>> {
        let mut current = def.clone();
        for _ in 0..MAX_DEPTH {
            match current.as_ref() {
                TypeDefinition::Simple(_) => return Some(current),
                TypeDefinition::Complex(c) => {
                    if !matches!(c.content, ContentModel::Simple) {
                        return None;
                    }
                    current = self.base_type(&current)?;
                }
            }
        }
        None
    }

    /// Variety of a simple type (restrictions inherit the base variety)
    pub fn variety(&self, def: &Arc<TypeDefinition>) -> SimpleVariety {
        let mut current = def.clone();
        for _ in 0..MAX_DEPTH {
            let Some(simple) = current.as_simple() else {
                return SimpleVariety::Atomic;
            };
            match &simple.derivation {
                SimpleDerivation::Primitive => return SimpleVariety::Atomic,
                SimpleDerivation::Union(_) => return SimpleVariety::Union,
                SimpleDerivation::List(item) => {
                    return match self.resolve_type(item) {
                        Some(item) => SimpleVariety::List(item),
                        None => {
                            warn!(type_name = %current.display_name(), "unresolved list item type");
                            SimpleVariety::List(
                                builtin_type(&QName::xs(XSD_ANY_SIMPLE_TYPE)).unwrap_or_else(any_type),
                            )
                        }
                    };
                }
                SimpleDerivation::Restriction(base) => match self.resolve_type(base) {
                    Some(base) => current = base,
                    None => return SimpleVariety::Atomic,
                },
            }
        }
        SimpleVariety::Atomic
    }

    /// Effective whiteSpace facet of a simple type
    pub fn white_space(&self, def: &Arc<TypeDefinition>) -> WhiteSpace {
        for t in self.type_hierarchy(def) {
            let Some(simple) = t.as_simple() else { break };
            if let Some(ws) = simple.facets.white_space {
                return ws;
            }
            if matches!(simple.derivation, SimpleDerivation::List(_)) {
                return WhiteSpace::Collapse;
            }
        }
        WhiteSpace::Preserve
    }

    /// Simple types in the restriction chain of `def` that declare facets
    pub fn facet_chain(&self, def: &Arc<TypeDefinition>) -> Vec<Arc<TypeDefinition>> {
        self.type_hierarchy(def)
            .into_iter()
            .take_while(|t| t.is_simple())
            .filter(|t| t.as_simple().map(|s| !s.facets.is_empty()).unwrap_or(false))
            .collect()
    }

    // =========================================================================
    // Substitution groups
    // =========================================================================

    /// Elements substitutable for `head`, transitively
    pub fn substitution_members(&self, head: &QName) -> Vec<Arc<ElementDecl>> {
        let table = self.substitution_table();
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = vec![head.clone()];
        while let Some(name) = queue.pop() {
            for member in table.get(&name).into_iter().flatten() {
                if seen.insert(member.name.clone()) {
                    queue.push(member.name.clone());
                    out.push(member.clone());
                }
            }
        }
        out
    }

    /// Whether `member` may substitute for `head`
    pub fn is_substitutable(&self, member: &QName, head: &QName) -> bool {
        member == head || self.substitution_members(head).iter().any(|m| &m.name == member)
    }

    // =========================================================================
    // Children and attributes
    // =========================================================================

    /// Child particles of an element with its declared type
    pub fn child_particles(&self, element: &Arc<ElementDecl>) -> Arc<ChildParticles> {
        let def = self.element_type(element);
        self.child_particles_of(element, &def)
    }

    /// Child particles of an element with an explicit type (xsi:type)
    pub fn child_particles_of(
        &self,
        element: &Arc<ElementDecl>,
        def: &Arc<TypeDefinition>,
    ) -> Arc<ChildParticles> {
        let key = (Arc::as_ptr(element) as usize, Arc::as_ptr(def) as usize);
        if let Some((_, _, cached)) = self
            .state
            .children
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&key)
        {
            return cached.clone();
        }
        let mut children = ChildParticles::default();
        self.collect_type_children(def, &mut children, 0);
        let children = Arc::new(children);
        trace!(element = %element.name, children = children.len(), "child particles computed");
        self.state
            .children
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(key)
            .or_insert_with(|| (element.clone(), def.clone(), children.clone()))
            .2
            .clone()
    }

    fn collect_type_children(&self, def: &Arc<TypeDefinition>, out: &mut ChildParticles, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        let Some(complex) = def.as_complex() else { return };
        if complex.derivation == Derivation::Extension {
            if let Some(base) = self.base_type(def) {
                self.collect_type_children(&base, out, depth + 1);
            }
        }
        match &complex.content {
            ContentModel::Elements(group) => self.collect_group(group, Occurs::once(), out, depth),
            ContentModel::Any => out.wildcard = true,
            ContentModel::Empty | ContentModel::Simple => {}
        }
    }

    fn collect_group(&self, group: &ModelGroup, outer: Occurs, out: &mut ChildParticles, depth: usize) {
        if depth > MAX_DEPTH {
            warn!("model group nesting too deep");
            return;
        }
        let mut occurs = group.occurs.multiply(outer);
        if group.kind == ModelGroupKind::Choice && group.terms.len() > 1 {
            occurs = occurs.emptiable();
        }
        for term in &group.terms {
            match term {
                Term::Element(element, term_occurs) => {
                    let decl = match element {
                        ElementTerm::Local(decl) => Some(decl.clone()),
                        ElementTerm::Ref(name) => {
                            let found = self.element(name);
                            if found.is_none() {
                                warn!(element = %name, "unresolved element reference");
                            }
                            found
                        }
                    };
                    if let Some(decl) = decl {
                        out.push(decl, term_occurs.multiply(occurs));
                    }
                }
                Term::Group(nested) => self.collect_group(nested, occurs, out, depth + 1),
                Term::GroupRef(name, term_occurs) => match self.group(name) {
                    Some(named) => {
                        let referenced = ModelGroup {
                            occurs: *term_occurs,
                            ..(*named).clone()
                        };
                        self.collect_group(&referenced, occurs, out, depth + 1);
                    }
                    None => warn!(group = %name, "unresolved group reference"),
                },
                Term::Any(_) => out.wildcard = true,
            }
        }
    }

    /// Attribute uses of a type, including inherited ones and attribute
    /// groups; prohibited uses are removed
    pub fn attribute_uses(&self, def: &Arc<TypeDefinition>) -> Vec<ResolvedAttribute> {
        let mut uses: IndexMap<QName, ResolvedAttribute> = IndexMap::new();
        let chain = self.type_hierarchy(def);
        for t in chain.iter().rev() {
            let Some(complex) = t.as_complex() else { continue };
            let mut own = Vec::new();
            self.expand_attribute_uses(&complex.attributes, &complex.attribute_groups, &mut own, 0);
            for (attribute_use, declaration) in own {
                if attribute_use.prohibited {
                    uses.shift_remove(&declaration.name);
                    continue;
                }
                uses.insert(
                    declaration.name.clone(),
                    ResolvedAttribute {
                        declaration,
                        required: attribute_use.required,
                    },
                );
            }
        }
        uses.into_values().collect()
    }

    fn expand_attribute_uses(
        &self,
        attributes: &[AttributeUse],
        groups: &[QName],
        out: &mut Vec<(AttributeUse, Arc<AttributeDecl>)>,
        depth: usize,
    ) {
        for attribute_use in attributes {
            let declaration = match &attribute_use.attribute {
                AttributeRef::Local(decl) => Some(decl.clone()),
                AttributeRef::Global(name) => self.attribute(name),
            };
            match declaration {
                Some(decl) => out.push((attribute_use.clone(), decl)),
                None => warn!(attribute = %attribute_use.attribute.name(), "unresolved attribute reference"),
            }
        }
        if depth > MAX_DEPTH {
            return;
        }
        for name in groups {
            match self.attribute_group(name) {
                Some(group) => {
                    self.expand_attribute_uses(&group.attributes, &group.groups, out, depth + 1)
                }
                None => warn!(group = %name, "unresolved attribute group"),
            }
        }
    }

    /// Attribute declared on `def` (or globally) named `name`
    pub fn attribute_for(&self, def: &Arc<TypeDefinition>, name: &QName) -> Option<Arc<AttributeDecl>> {
        self.attribute_uses(def)
            .into_iter()
            .find(|a| &a.declaration.name == name)
            .map(|a| a.declaration)
            .or_else(|| self.attribute(name))
    }
}

impl Drop for SchemaIndex {
    fn drop(&mut self) {
        self.detach();
    }
}
