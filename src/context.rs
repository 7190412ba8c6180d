//! Session context
//!
//! A [`Context`] is the service registry of one parse or encode session:
//! converters, the binding loader, settings, and whatever services
//! configurations and callers register. Contexts form a scope chain; a
//! child context answers from its own services first and falls back to its
//! parent. Complex bindings may derive a child context for the subtree
//! below an element to override services there.
//!
//! Each context also caches the bindings instantiated against it. A binding
//! requested twice in the same context is built once; a child context that
//! registers its own services gets its own cache, so bindings there see the
//! overridden services.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::bindings::Binding;
use crate::error::{Error, Result};
use crate::namespaces::QName;

type Service = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ServiceKey {
    Type(TypeId),
    Named(String),
}

/// Hierarchical service registry scoped to a session
pub struct Context {
    parent: Option<Arc<Context>>,
    services: RwLock<HashMap<ServiceKey, Service>>,
    bindings: RwLock<HashMap<QName, Binding>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("services", &read(&self.services).len())
            .field("bindings", &read(&self.bindings).len())
            .field("depth", &self.depth())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Context {
    /// Create a root context
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            services: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        })
    }

    /// Derive a child context falling back to `self`
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(self.clone()),
            services: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        })
    }

    /// Parent context
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_ref();
        while let Some(ctx) = current {
            depth += 1;
            current = ctx.parent.as_ref();
        }
        depth
    }

    fn insert(&self, key: ServiceKey, service: Service) {
        write(&self.services).insert(key, service);
        // bindings built earlier saw the old services
        write(&self.bindings).clear();
    }

    /// Register a service under its type
    pub fn register<T: Any + Send + Sync>(&self, service: T) {
        self.register_arc(Arc::new(service));
    }

    /// Register a shared service under its type
    pub fn register_arc<T: Any + Send + Sync>(&self, service: Arc<T>) {
        trace!(service = type_name::<T>(), "registering service");
        self.insert(ServiceKey::Type(TypeId::of::<T>()), service);
    }

    /// Register a service under a name
    pub fn register_named<T: Any + Send + Sync>(&self, name: impl Into<String>, service: T) {
        self.insert(ServiceKey::Named(name.into()), Arc::new(service));
    }

    fn lookup(&self, key: &ServiceKey) -> Option<Service> {
        if let Some(service) = read(&self.services).get(key) {
            return Some(service.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(key))
    }

    /// Service registered under type `T`, searching the scope chain
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.lookup(&ServiceKey::Type(TypeId::of::<T>()))
            .and_then(|s| s.downcast::<T>().ok())
    }

    /// Service registered under `name`, searching the scope chain
    pub fn get_named<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.lookup(&ServiceKey::Named(name.to_string()))
            .and_then(|s| s.downcast::<T>().ok())
    }

    /// Service registered under type `T`; a missing service is a
    /// configuration error
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            Error::Config(format!("no service of type {} in context", type_name::<T>()))
        })
    }

    /// Whether a service of type `T` is visible from this context
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Whether this context registers services of its own
    pub fn has_local_services(&self) -> bool {
        !read(&self.services).is_empty()
    }

    /// Context whose binding cache serves lookups from this one: the
    /// nearest context in the chain that registers services of its own
    fn binding_scope(&self) -> &Context {
        let mut current = self;
        while !current.has_local_services() {
            match current.parent.as_deref() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Binding cached for `name` in this context's scope
    pub fn cached_binding(&self, name: &QName) -> Option<Binding> {
        read(&self.binding_scope().bindings).get(name).cloned()
    }

    /// Cache a binding built against this context's scope
    pub fn cache_binding(&self, name: QName, binding: Binding) {
        write(&self.binding_scope().bindings).insert(name, binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_scope_chain_lookup() {
        let root = Context::new();
        root.register(Greeting("hello"));
        root.register_named("answer", 42u32);

        let child = root.child();
        assert_eq!(child.get::<Greeting>().unwrap().0, "hello");
        assert_eq!(*child.get_named::<u32>("answer").unwrap(), 42);

        child.register(Greeting("override"));
        assert_eq!(child.get::<Greeting>().unwrap().0, "override");
        assert_eq!(root.get::<Greeting>().unwrap().0, "hello");
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_require_missing_service() {
        let ctx = Context::new();
        let err = ctx.require::<Greeting>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Greeting"));
    }

    #[test]
    fn test_wrong_type_is_not_returned() {
        let ctx = Context::new();
        ctx.register_named("answer", 42u32);
        assert!(ctx.get_named::<String>("answer").is_none());
    }
}
