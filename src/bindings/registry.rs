//! Binding registry
//!
//! Maps qualified names to binding descriptors. A descriptor is a ready
//! instance, a constructor run against the session [`Context`] (so the
//! binding can pull the services it depends on), or an adapter that manages
//! its own instances. Constructed bindings are cached in the context they
//! were built against.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::Binding;

/// Constructor building a binding from context services
pub type BindingConstructor = Arc<dyn Fn(&Arc<Context>) -> Result<Binding> + Send + Sync>;

/// Pre-wired factory that manages its own binding instances
pub trait BindingAdapter: Send + Sync {
    /// Binding to use within `context`
    fn binding(&self, context: &Arc<Context>) -> Result<Binding>;
}

/// How a registered binding is obtained
#[derive(Clone)]
pub enum BindingDescriptor {
    /// Shared instance
    Instance(Binding),
    /// Constructor run once per context
    Factory(BindingConstructor),
    /// Adapter consulted on every lookup
    Adapter(Arc<dyn BindingAdapter>),
}

impl fmt::Debug for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingDescriptor::Instance(b) => f.debug_tuple("Instance").field(b).finish(),
            BindingDescriptor::Factory(_) => f.write_str("Factory"),
            BindingDescriptor::Adapter(_) => f.write_str("Adapter"),
        }
    }
}

/// Registry of bindings keyed by qualified type or element name
#[derive(Debug, Clone, Default)]
pub struct BindingLoader {
    bindings: IndexMap<QName, BindingDescriptor>,
    fallbacks: Vec<Binding>,
}

impl BindingLoader {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under `name`, replacing any earlier one
    pub fn register(&mut self, name: QName, descriptor: BindingDescriptor) {
        if self.bindings.insert(name.clone(), descriptor).is_some() {
            debug!(name = %name, "replacing binding registration");
        }
    }

    /// Register an instance under its own target. A binding without a
    /// target becomes a universal fallback applied to every component.
    pub fn register_instance(&mut self, binding: Binding) {
        match binding.target() {
            Some(target) => self.register(target, BindingDescriptor::Instance(binding)),
            None => {
                warn!(binding = ?binding, "binding declares no target, registering it as a universal fallback");
                self.fallbacks.push(binding);
            }
        }
    }

    /// Register a constructor under `name`
    pub fn register_factory<F>(&mut self, name: QName, constructor: F)
    where
        F: Fn(&Arc<Context>) -> Result<Binding> + Send + Sync + 'static,
    {
        self.register(name, BindingDescriptor::Factory(Arc::new(constructor)));
    }

    /// Register an adapter under `name`
    pub fn register_adapter(&mut self, name: QName, adapter: Arc<dyn BindingAdapter>) {
        self.register(name, BindingDescriptor::Adapter(adapter));
    }

    /// Whether a binding is registered under `name`
    pub fn contains(&self, name: &QName) -> bool {
        self.bindings.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.bindings.keys()
    }

    /// Number of registrations, fallbacks excluded
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.fallbacks.is_empty()
    }

    /// Universal fallback bindings
    pub fn fallbacks(&self) -> &[Binding] {
        &self.fallbacks
    }

    /// Binding registered for `name`, instantiated within `context`
    pub fn binding_for(&self, name: &QName, context: &Arc<Context>) -> Result<Option<Binding>> {
        let Some(descriptor) = self.bindings.get(name) else {
            return Ok(None);
        };
        match descriptor {
            BindingDescriptor::Instance(binding) => Ok(Some(binding.clone())),
            BindingDescriptor::Factory(constructor) => {
                if let Some(cached) = context.cached_binding(name) {
                    return Ok(Some(cached));
                }
                let binding = constructor(context).map_err(|e| instantiation_error(name, e))?;
                if binding.target().is_none() {
                    warn!(name = %name, "binding declares no target");
                }
                trace!(name = %name, "binding instantiated");
                context.cache_binding(name.clone(), binding.clone());
                Ok(Some(binding))
            }
            BindingDescriptor::Adapter(adapter) => adapter
                .binding(context)
                .map(Some)
                .map_err(|e| instantiation_error(name, e)),
        }
    }
}

fn instantiation_error(name: &QName, cause: Error) -> Error {
    match cause {
        Error::Config(msg) => Error::Config(format!("cannot instantiate binding for {}: {}", name, msg)),
        other => Error::Config(format!("cannot instantiate binding for {}: {}", name, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingInfo, SimpleBinding};
    use crate::parser::tree::InstanceComponent;
    use crate::values::{Value, ValueType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Suffix {
        target: Option<QName>,
        suffix: String,
    }

    impl BindingInfo for Suffix {
        fn target(&self) -> Option<QName> {
            self.target.clone()
        }
        fn value_type(&self) -> ValueType {
            ValueType::String
        }
    }

    impl SimpleBinding for Suffix {
        fn parse(&self, _instance: &InstanceComponent, value: Option<Value>) -> Result<Option<Value>> {
            let text = value.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
            Ok(Some(Value::String(text + &self.suffix)))
        }
    }

    struct Suffix2(String);

    fn name() -> QName {
        QName::namespaced("urn:test", "T")
    }

    fn counting_loader(counter: Arc<AtomicUsize>) -> BindingLoader {
        let mut loader = BindingLoader::new();
        loader.register_factory(name(), move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            let suffix = ctx.require::<Suffix2>()?;
            Ok(Binding::simple(Suffix {
                target: Some(name()),
                suffix: suffix.0.clone(),
            }))
        });
        loader
    }

    #[test]
    fn test_factory_cached_per_context() {
        let counter = Arc::new(AtomicUsize::new(0));
        let loader = counting_loader(counter.clone());
        let ctx = Context::new();
        ctx.register(Suffix2("!".into()));

        let a = loader.binding_for(&name(), &ctx).unwrap().unwrap();
        let b = loader.binding_for(&name(), &ctx).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // a child without services of its own shares the parent's cache
        let plain_child = ctx.child();
        let c = loader.binding_for(&name(), &plain_child).unwrap().unwrap();
        assert!(a.ptr_eq(&c));

        // overriding a service builds a fresh binding
        let child = ctx.child();
        child.register(Suffix2("?".into()));
        let d = loader.binding_for(&name(), &child).unwrap().unwrap();
        assert!(!a.ptr_eq(&d));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsatisfied_dependency_is_config_error() {
        let loader = counting_loader(Arc::new(AtomicUsize::new(0)));
        let err = loader.binding_for(&name(), &Context::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("{urn:test}T"));
    }

    #[test]
    fn test_targetless_binding_becomes_fallback() {
        let mut loader = BindingLoader::new();
        loader.register_instance(Binding::simple(Suffix {
            target: None,
            suffix: String::new(),
        }));
        assert_eq!(loader.len(), 0);
        assert_eq!(loader.fallbacks().len(), 1);
        assert!(loader.binding_for(&name(), &Context::new()).unwrap().is_none());
    }
}
