//! XSD schema documents
//!
//! An [`XsdSchema`] holds the global components of one target namespace
//! and the schemas it imports. Every mutation is announced to registered
//! [`SchemaListener`]s so that indexes built over the schema can drop
//! stale lookup tables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::locations::Location;
use crate::namespaces::QName;

use super::components::{AttributeDecl, AttributeGroupDecl, ElementDecl};
use super::particles::ModelGroup;
use super::types::TypeDefinition;

/// Kind of structural change made to a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Global element added or replaced
    Element(QName),
    /// Global attribute added or replaced
    Attribute(QName),
    /// Attribute group added or replaced
    AttributeGroup(QName),
    /// Named type added or replaced
    Type(QName),
    /// Named model group added or replaced
    Group(QName),
    /// Imported schema added
    Import,
}

/// Observer of schema mutations
pub trait SchemaListener: Send + Sync {
    /// Called after `schema` changed
    fn schema_changed(&self, schema: &XsdSchema, change: &SchemaChange);
}

/// Handle used to detach a listener
pub type ListenerId = u64;

#[derive(Debug, Default)]
struct SchemaComponents {
    elements: IndexMap<QName, Arc<ElementDecl>>,
    attributes: IndexMap<QName, Arc<AttributeDecl>>,
    attribute_groups: IndexMap<QName, Arc<AttributeGroupDecl>>,
    types: IndexMap<QName, Arc<TypeDefinition>>,
    groups: IndexMap<QName, Arc<ModelGroup>>,
}

/// A parsed XSD schema document
pub struct XsdSchema {
    target_namespace: Option<String>,
    location: Option<Location>,
    components: RwLock<SchemaComponents>,
    imports: RwLock<Vec<Arc<XsdSchema>>>,
    listeners: RwLock<Vec<(ListenerId, Weak<dyn SchemaListener>)>>,
    next_listener: AtomicU64,
}

impl std::fmt::Debug for XsdSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XsdSchema")
            .field("target_namespace", &self.target_namespace)
            .field("location", &self.location)
            .field("components", &*read(&self.components))
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl XsdSchema {
    /// Create an empty schema for `target_namespace`
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            location: None,
            components: RwLock::new(SchemaComponents::default()),
            imports: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Set the location the schema was loaded from
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Parse a schema from XSD text
    pub fn from_str(xsd: &str) -> Result<Arc<Self>> {
        super::parsing::SchemaReader::new().read_str(xsd)
    }

    /// Parse a schema from a file, resolving imports relative to it
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Arc<Self>> {
        super::parsing::SchemaReader::new()
            .read_location(&Location::Path(path.as_ref().to_path_buf()))
    }

    /// Target namespace
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Location the schema was loaded from
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add or replace a global element
    pub fn add_element(&self, element: ElementDecl) -> Arc<ElementDecl> {
        let element = Arc::new(element);
        let name = element.name.clone();
        write(&self.components).elements.insert(name.clone(), element.clone());
        self.notify(SchemaChange::Element(name));
        element
    }

    /// Add or replace a global attribute
    pub fn add_attribute(&self, attribute: AttributeDecl) -> Arc<AttributeDecl> {
        let attribute = Arc::new(attribute);
        let name = attribute.name.clone();
        write(&self.components).attributes.insert(name.clone(), attribute.clone());
        self.notify(SchemaChange::Attribute(name));
        attribute
    }

    /// Add or replace an attribute group
    pub fn add_attribute_group(&self, group: AttributeGroupDecl) -> Arc<AttributeGroupDecl> {
        let group = Arc::new(group);
        let name = group.name.clone();
        write(&self.components).attribute_groups.insert(name.clone(), group.clone());
        self.notify(SchemaChange::AttributeGroup(name));
        group
    }

    /// Add or replace a named type
    pub fn add_type(&self, definition: TypeDefinition) -> Result<Arc<TypeDefinition>> {
        let name = definition
            .name()
            .cloned()
            .ok_or_else(|| Error::Schema("Global type definitions must be named".to_string()))?;
        let definition = Arc::new(definition);
        write(&self.components).types.insert(name.clone(), definition.clone());
        self.notify(SchemaChange::Type(name));
        Ok(definition)
    }

    /// Add or replace a named model group
    pub fn add_group(&self, name: QName, group: ModelGroup) -> Arc<ModelGroup> {
        let group = Arc::new(group);
        write(&self.components).groups.insert(name.clone(), group.clone());
        self.notify(SchemaChange::Group(name));
        group
    }

    /// Add an imported schema
    pub fn add_import(&self, schema: Arc<XsdSchema>) {
        write(&self.imports).push(schema);
        self.notify(SchemaChange::Import);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Global element by name (this schema only)
    pub fn element(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        read(&self.components).elements.get(name).cloned()
    }

    /// Global attribute by name (this schema only)
    pub fn attribute(&self, name: &QName) -> Option<Arc<AttributeDecl>> {
        read(&self.components).attributes.get(name).cloned()
    }

    /// Attribute group by name (this schema only)
    pub fn attribute_group(&self, name: &QName) -> Option<Arc<AttributeGroupDecl>> {
        read(&self.components).attribute_groups.get(name).cloned()
    }

    /// Named type by name (this schema only)
    pub fn type_definition(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        read(&self.components).types.get(name).cloned()
    }

    /// Named model group by name (this schema only)
    pub fn group(&self, name: &QName) -> Option<Arc<ModelGroup>> {
        read(&self.components).groups.get(name).cloned()
    }

    /// Global elements in declaration order
    pub fn elements(&self) -> Vec<Arc<ElementDecl>> {
        read(&self.components).elements.values().cloned().collect()
    }

    /// Global attributes in declaration order
    pub fn attributes(&self) -> Vec<Arc<AttributeDecl>> {
        read(&self.components).attributes.values().cloned().collect()
    }

    /// Attribute groups in declaration order
    pub fn attribute_groups(&self) -> Vec<Arc<AttributeGroupDecl>> {
        read(&self.components).attribute_groups.values().cloned().collect()
    }

    /// Named types in declaration order
    pub fn types(&self) -> Vec<Arc<TypeDefinition>> {
        read(&self.components).types.values().cloned().collect()
    }

    /// Imported schemas
    pub fn imports(&self) -> Vec<Arc<XsdSchema>> {
        read(&self.imports).clone()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a listener; the schema only keeps a weak reference
    pub fn add_listener(&self, listener: Weak<dyn SchemaListener>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        write(&self.listeners).push((id, listener));
        id
    }

    /// Detach a listener
    pub fn remove_listener(&self, id: ListenerId) {
        write(&self.listeners).retain(|(other, _)| *other != id);
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        read(&self.listeners).len()
    }

    fn notify(&self, change: SchemaChange) {
        let live: Vec<Arc<dyn SchemaListener>> = {
            let mut listeners = write(&self.listeners);
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };
        if !live.is_empty() {
            debug!(change = ?change, listeners = live.len(), "schema changed");
        }
        for listener in live {
            listener.schema_changed(self, &change);
        }
    }
}
