//! Configuration
//!
//! A [`Configuration`] supplies what a parse or encode session needs beyond
//! the schema: binding registrations, context services, and optionally a
//! default schema for documents whose schemas cannot be resolved.
//! Configurations declare dependencies; a session applies the built-in
//! [`XsConfiguration`] first, then every dependency before its dependents.
//!
//! [`ParserSettings`] and [`EncoderSettings`] hold the per-session options.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bindings::xs::register_xs_bindings;
use crate::bindings::BindingLoader;
use crate::context::Context;
use crate::converters::Converters;
use crate::limits::Limits;
use crate::locations::{Location, RelativeLocator, SchemaLocator};
use crate::namespaces::{DocumentNamespaces, QName, XSD_NAMESPACE};
use crate::schema::XsdSchema;

/// Supplies bindings, services and a default schema for one namespace
pub trait Configuration: Send + Sync {
    /// Namespace this configuration is responsible for
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Schema used when none of a document's schemas can be resolved
    fn default_schema(&self) -> Option<Arc<XsdSchema>> {
        None
    }

    /// Configurations that must be applied before this one
    fn dependencies(&self) -> Vec<Arc<dyn Configuration>> {
        Vec::new()
    }

    /// Register bindings
    fn register_bindings(&self, loader: &mut BindingLoader) {
        let _ = loader;
    }

    /// Register context services
    fn configure_context(&self, context: &Arc<Context>) {
        let _ = context;
    }
}

/// Built-in XS bindings; always applied first
#[derive(Debug, Default, Clone, Copy)]
pub struct XsConfiguration;

impl Configuration for XsConfiguration {
    fn namespace(&self) -> Option<&str> {
        Some(XSD_NAMESPACE)
    }

    fn register_bindings(&self, loader: &mut BindingLoader) {
        register_xs_bindings(loader);
    }
}

/// Configuration with nothing beyond the built-in bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyConfiguration;

impl Configuration for EmptyConfiguration {}

fn config_key(config: &Arc<dyn Configuration>) -> String {
    match config.namespace() {
        Some(ns) => ns.to_string(),
        None => format!("@{:p}", Arc::as_ptr(config) as *const ()),
    }
}

/// Configurations to apply for `root`, dependencies first, each once
pub fn ordered_configurations(root: &Arc<dyn Configuration>) -> Vec<Arc<dyn Configuration>> {
    fn visit(
        config: &Arc<dyn Configuration>,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<dyn Configuration>>,
        depth: usize,
    ) {
        if depth > 32 || !seen.insert(config_key(config)) {
            return;
        }
        for dependency in config.dependencies() {
            visit(&dependency, seen, out, depth + 1);
        }
        out.push(config.clone());
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let xs: Arc<dyn Configuration> = Arc::new(XsConfiguration);
    visit(&xs, &mut seen, &mut out, 0);
    visit(root, &mut seen, &mut out, 0);
    out
}

/// Default schema of `root`, falling back to those of its dependencies
pub fn default_schema(root: &Arc<dyn Configuration>) -> Option<Arc<XsdSchema>> {
    ordered_configurations(root)
        .iter()
        .rev()
        .find_map(|c| c.default_schema())
}

/// Build the binding registry and the session context for `root`.
///
/// The context holds the [`Converters`], the shared [`BindingLoader`], the
/// root configuration (as `Arc<dyn Configuration>`) and whatever the
/// configurations register.
pub fn session_context(root: &Arc<dyn Configuration>) -> (Arc<Context>, Arc<BindingLoader>) {
    let configurations = ordered_configurations(root);
    let mut loader = BindingLoader::new();
    for config in &configurations {
        trace!(namespace = ?config.namespace(), "registering bindings");
        config.register_bindings(&mut loader);
    }
    let loader = Arc::new(loader);
    debug!(bindings = loader.len(), configurations = configurations.len(), "session configured");

    let context = Context::new();
    context.register(Converters::default());
    context.register_arc(loader.clone());
    context.register(root.clone());
    for config in &configurations {
        config.configure_context(&context);
    }
    (context, loader)
}

/// Derive the context of a single document from the session context.
///
/// The child registers a fresh [`DocumentNamespaces`], so it has services
/// of its own: bindings built by factories are instantiated again for every
/// document and cached for that document only.
pub fn document_context(session: &Arc<Context>) -> (Arc<Context>, Arc<DocumentNamespaces>) {
    let context = session.child();
    let namespaces = Arc::new(DocumentNamespaces::new());
    context.register_arc(namespaces.clone());
    (context, namespaces)
}

/// Options of a parse session
#[derive(Clone)]
pub struct ParserSettings {
    /// Fail when an element has no declaration instead of falling back
    strict: bool,
    /// Run structural and facet validation
    validating: bool,
    /// Abort on the first validation error
    fail_on_validation_error: bool,
    /// Depth and attribute limits
    limits: Limits,
    /// Element whose values are streamed instead of retained
    streaming_target: Option<QName>,
    /// Schemas to parse against
    schemas: Vec<Arc<XsdSchema>>,
    /// Schema locations to load before parsing
    schema_locations: Vec<Location>,
    /// Follow xsi:schemaLocation hints in the document
    use_schema_location_hints: bool,
    /// Resolves schema location hints
    locator: Arc<dyn SchemaLocator>,
}

impl std::fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserSettings")
            .field("strict", &self.strict)
            .field("validating", &self.validating)
            .field("fail_on_validation_error", &self.fail_on_validation_error)
            .field("limits", &self.limits)
            .field("streaming_target", &self.streaming_target)
            .field("schemas", &self.schemas.len())
            .field("schema_locations", &self.schema_locations)
            .field("use_schema_location_hints", &self.use_schema_location_hints)
            .finish()
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            strict: false,
            validating: false,
            fail_on_validation_error: false,
            limits: Limits::default(),
            streaming_target: None,
            schemas: Vec::new(),
            schema_locations: Vec::new(),
            use_schema_location_hints: true,
            locator: Arc::new(RelativeLocator),
        }
    }
}

impl ParserSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether strict declaration resolution is on
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Whether validation is on
    pub fn validating(&self) -> bool {
        self.validating
    }

    /// Whether the first validation error aborts the parse
    pub fn fail_on_validation_error(&self) -> bool {
        self.fail_on_validation_error
    }

    /// Limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Streaming target
    pub fn streaming_target(&self) -> Option<&QName> {
        self.streaming_target.as_ref()
    }

    /// Schemas
    pub fn schemas(&self) -> &[Arc<XsdSchema>] {
        &self.schemas
    }

    /// Schema locations
    pub fn schema_locations(&self) -> &[Location] {
        &self.schema_locations
    }

    /// Whether xsi:schemaLocation hints are followed
    pub fn use_schema_location_hints(&self) -> bool {
        self.use_schema_location_hints
    }

    /// Schema locator
    pub fn locator(&self) -> &Arc<dyn SchemaLocator> {
        &self.locator
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Turn validation on or off
    pub fn with_validating(mut self, validating: bool) -> Self {
        self.validating = validating;
        self
    }

    /// Abort on the first validation error
    pub fn with_fail_on_validation_error(mut self, fail: bool) -> Self {
        self.fail_on_validation_error = fail;
        self
    }

    /// Set limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Stream the values of elements named `target`; a wildcard name
    /// matches the local name in any namespace
    pub fn with_streaming_target(mut self, target: QName) -> Self {
        self.streaming_target = Some(target);
        self
    }

    /// Add a schema
    pub fn with_schema(mut self, schema: Arc<XsdSchema>) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Add a schema location
    pub fn with_schema_location(mut self, location: Location) -> Self {
        self.schema_locations.push(location);
        self
    }

    /// Follow or ignore xsi:schemaLocation hints
    pub fn with_schema_location_hints(mut self, use_hints: bool) -> Self {
        self.use_schema_location_hints = use_hints;
        self
    }

    /// Set the schema locator
    pub fn with_locator(mut self, locator: Arc<dyn SchemaLocator>) -> Self {
        self.locator = locator;
        self
    }
}

/// Options of an encode session
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    /// Preferred prefixes, declared on the root element
    namespace_prefixes: Vec<(String, String)>,
    /// Write the XML declaration
    xml_declaration: bool,
    /// Indent element-only content
    pretty: bool,
    /// Depth limit
    limits: Limits,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            namespace_prefixes: Vec::new(),
            xml_declaration: true,
            pretty: false,
            limits: Limits::default(),
        }
    }
}

impl EncoderSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferred (prefix, namespace) pairs
    pub fn namespace_prefixes(&self) -> &[(String, String)] {
        &self.namespace_prefixes
    }

    /// Whether the XML declaration is written
    pub fn xml_declaration(&self) -> bool {
        self.xml_declaration
    }

    /// Whether output is indented
    pub fn pretty(&self) -> bool {
        self.pretty
    }

    /// Limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Prefer `prefix` for `namespace`
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.namespace_prefixes.push((prefix.into(), namespace.into()));
        self
    }

    /// Write or omit the XML declaration
    pub fn with_xml_declaration(mut self, xml_declaration: bool) -> Self {
        self.xml_declaration = xml_declaration;
        self
    }

    /// Indent output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
