//! Handler stack
//!
//! [`ParserHandler`] consumes [`XmlEvent`]s and keeps one frame per open
//! element, so the stack depth always equals the nesting depth of the
//! document. A start tag resolves the element's declaration, creates its
//! node and pushes a frame; character data goes to the node of the top
//! frame; an end tag pops the frame and computes the node's value.
//!
//! Declarations are resolved in this order: the parent's child particles,
//! the global elements, the context's [`HandlerFactories`], the context's
//! [`ParserDelegates`]. Outside strict mode an unresolved element then
//! falls back to the parent's only child declaration, to a global element
//! with the same local name in another namespace, and finally to an
//! xs:anyType declaration.
//!
//! The handler works in a child of the session context holding the
//! document's [`DocumentNamespaces`]. An element's namespace scope stays
//! open until its value has been computed, so bindings resolving prefixed
//! content see the declarations made on the element itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::bindings::{Binding, BindingWalker};
use crate::context::Context;
use crate::error::{Error, Result, ValidationError};
use crate::events::{split_namespace_declarations, RawAttribute, XmlEvent};
use crate::namespaces::{DocumentNamespaces, NamespaceContext, QName, XSI_NAMESPACE};
use crate::schema::builtins::XSD_ANY_SIMPLE_TYPE;
use crate::schema::{
    any_type, AttributeDecl, ChildParticles, Declaration, ElementDecl, SchemaIndex, SchemaReader,
    TypeDefinition, TypeRef, XsdSchema,
};
use crate::config::{document_context, ParserSettings};
use crate::values::Value;

use super::delegates::{DelegateSession, HandlerFactories, ParserDelegate, ParserDelegates};
use super::executor::ParseExecutor;
use super::streaming::DeliveryBuffer;
use super::tree::{InstanceComponent, NodeId, ParseTree};
use super::validation::{self, ErrorCollector};

/// Frame of an element parsed through bindings
struct ElementHandler {
    node: NodeId,
    particles: Arc<ChildParticles>,
    counts: HashMap<QName, u32>,
    /// Context the element's own bindings run in
    context: Arc<Context>,
    /// Context handed to the children
    child_context: Arc<Context>,
    path: String,
}

/// Frame of an element handed to a parser delegate
struct DelegateHandler {
    node: NodeId,
    session: Box<dyn DelegateSession>,
    depth: usize,
}

enum Handler {
    Document,
    Element(ElementHandler),
    Delegate(DelegateHandler),
}

/// What the parent frame contributes to resolving a child
struct Parent {
    node: Option<NodeId>,
    name: Option<QName>,
    particles: Option<Arc<ChildParticles>>,
    context: Arc<Context>,
    path: String,
}

enum Resolution {
    Declared(Arc<ElementDecl>),
    Delegated(Arc<dyn ParserDelegate>),
}

/// Event-driven parser state for one document
pub struct ParserHandler {
    settings: ParserSettings,
    context: Arc<Context>,
    walker: BindingWalker,
    default_schema: Option<Arc<XsdSchema>>,
    index: Option<Arc<SchemaIndex>>,
    tree: ParseTree,
    stack: Vec<Handler>,
    namespaces: Arc<DocumentNamespaces>,
    errors: ErrorCollector,
    buffer: Option<Arc<DeliveryBuffer>>,
    result: Option<Value>,
    finished: bool,
}

impl std::fmt::Debug for ParserHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserHandler")
            .field("depth", &self.depth())
            .field("nodes", &self.tree.len())
            .field("errors", &self.errors.errors().len())
            .finish()
    }
}

impl ParserHandler {
    /// Create a handler with the document frame pushed. The handler works
    /// in a child of `session`, so bindings are instantiated per document.
    pub fn new(
        settings: ParserSettings,
        session: Arc<Context>,
        walker: BindingWalker,
        default_schema: Option<Arc<XsdSchema>>,
    ) -> Self {
        let errors = ErrorCollector::new(settings.validating(), settings.fail_on_validation_error());
        let (context, namespaces) = document_context(&session);
        Self {
            settings,
            context,
            walker,
            default_schema,
            index: None,
            tree: ParseTree::new(),
            stack: vec![Handler::Document],
            namespaces,
            errors,
            buffer: None,
            result: None,
            finished: false,
        }
    }

    /// Deliver the values of the streaming target to `buffer`
    pub fn with_buffer(mut self, buffer: Arc<DeliveryBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// Number of live parse tree nodes
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// The schema index, once the root element has been seen
    pub fn index(&self) -> Option<&Arc<SchemaIndex>> {
        self.index.as_ref()
    }

    /// Validation errors collected so far
    pub fn errors(&self) -> &[ValidationError] {
        self.errors.errors()
    }

    /// Take the collected validation errors
    pub fn take_errors(&mut self) -> Vec<ValidationError> {
        self.errors.take()
    }

    /// Value of the root element, once the document has ended
    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// Context of the document being parsed
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Whether the document end has been processed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process one event
    pub fn handle(&mut self, event: XmlEvent) -> Result<()> {
        match event {
            XmlEvent::StartElement { name, attributes } => self.start_element(&name, attributes),
            XmlEvent::EndElement { name } => self.end_element(&name),
            XmlEvent::Characters(text) => self.characters(&text),
            XmlEvent::EndDocument => self.end_document(),
        }
    }

    /// Detach the index from its schemas. The delivery buffer stays open;
    /// its owner closes it.
    pub fn finish(&mut self) {
        if let Some(index) = &self.index {
            index.detach();
        }
    }

    fn parent(&self) -> Parent {
        match self.stack.last() {
            Some(Handler::Element(h)) => Parent {
                node: Some(h.node),
                name: self.tree.node(h.node).map(|n| n.component().name.clone()),
                particles: Some(h.particles.clone()),
                context: h.child_context.clone(),
                path: h.path.clone(),
            },
            _ => Parent {
                node: None,
                name: None,
                particles: None,
                context: self.context.clone(),
                path: String::new(),
            },
        }
    }

    fn start_element(&mut self, raw_name: &str, attributes: Vec<RawAttribute>) -> Result<()> {
        let limits = self.settings.limits();
        limits.check_depth(self.namespaces.depth() + 1)?;
        limits.check_attributes(attributes.len())?;

        let (declarations, attributes) = split_namespace_declarations(attributes);
        self.namespaces.push_scope(declarations);
        let name = self.namespaces.resolve_element(raw_name)?;
        let mut resolved = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            resolved.push((self.namespaces.resolve_attribute(&attribute.name)?, attribute.value));
        }

        if let Some(Handler::Delegate(delegate)) = self.stack.last_mut() {
            delegate.depth += 1;
            return delegate.session.start_element(&name, &resolved);
        }

        let index = match &self.index {
            Some(index) => index.clone(),
            None => {
                let index = Arc::new(self.build_index(&resolved)?);
                self.index = Some(index.clone());
                index
            }
        };

        let parent = self.parent();
        let path = format!("{}/{}", parent.path, name.local_name);
        let resolution = self.resolve_declaration(&name, &parent, &index)?;
        if self.errors.is_enabled() {
            self.count_child(&name, &parent, &index, &path)?;
        }

        match resolution {
            Resolution::Declared(declaration) => {
                self.start_declared(name, declaration, resolved, parent, &index, path)
            }
            Resolution::Delegated(delegate) => {
                let declaration = Arc::new(ElementDecl::any_type(name.clone()));
                let component = InstanceComponent::new(
                    name.clone(),
                    Declaration::Element(declaration),
                    any_type(),
                    self.namespaces.snapshot(),
                );
                let node = self.tree.add_element(component, parent.node);
                let mut session = delegate.start(&name);
                session.start_element(&name, &resolved)?;
                trace!(element = %name, "delegate handler pushed");
                self.stack.push(Handler::Delegate(DelegateHandler {
                    node,
                    session,
                    depth: 0,
                }));
                Ok(())
            }
        }
    }

    fn build_index(&self, attributes: &[(QName, String)]) -> Result<SchemaIndex> {
        let mut candidates: Vec<Result<Arc<XsdSchema>>> =
            self.settings.schemas().iter().cloned().map(Ok).collect();
        let locator = self.settings.locator().clone();
        let mut reader = SchemaReader::new().with_locator(locator.clone());
        for location in self.settings.schema_locations() {
            candidates.push(reader.read_location(location));
        }

        if self.settings.use_schema_location_hints() {
            let mut hints: Vec<(Option<String>, String)> = Vec::new();
            for (name, value) in attributes {
                if name.namespace() != Some(XSI_NAMESPACE) {
                    continue;
                }
                match name.local_name.as_str() {
                    "schemaLocation" => {
                        let parts: Vec<&str> = value.split_whitespace().collect();
                        for pair in parts.chunks(2) {
                            if let [namespace, hint] = pair {
                                hints.push((Some(namespace.to_string()), hint.to_string()));
                            }
                        }
                    }
                    "noNamespaceSchemaLocation" => hints.push((None, value.trim().to_string())),
                    _ => {}
                }
            }
            for (namespace, hint) in hints {
                match locator.locate(namespace.as_deref(), Some(&hint), None) {
                    Some(location) => candidates.push(reader.read_location(&location)),
                    None => candidates.push(Err(Error::Schema(format!("cannot locate schema '{}'", hint)))),
                }
            }
        }

        debug!(candidates = candidates.len(), "building schema index");
        SchemaIndex::resolve(candidates, self.default_schema.clone(), self.settings.strict())
    }

    fn resolve_declaration(&self, name: &QName, parent: &Parent, index: &SchemaIndex) -> Result<Resolution> {
        if let Some(particle) = parent.particles.as_ref().and_then(|p| p.get(name)) {
            return Ok(Resolution::Declared(particle.element.clone()));
        }
        if let Some(declaration) = index.element(name) {
            return Ok(Resolution::Declared(declaration));
        }
        if let Some(factories) = parent.context.get::<HandlerFactories>() {
            if let Some(declaration) = factories.declaration(name, parent.name.as_ref(), index) {
                debug!(element = %name, "declaration supplied by handler factory");
                return Ok(Resolution::Declared(declaration));
            }
        }
        if let Some(delegates) = parent.context.get::<ParserDelegates>() {
            if let Some(delegate) = delegates.find(name) {
                debug!(element = %name, "element handed to parser delegate");
                return Ok(Resolution::Delegated(delegate.clone()));
            }
        }

        if self.settings.strict() {
            return Err(Error::Declaration { name: name.clone() });
        }
        if let Some(single) = parent.particles.as_ref().and_then(|p| p.single()) {
            warn!(element = %name, assumed = %single.name(), "no declaration found, assuming the only child declaration");
            return Ok(Resolution::Declared(single.element.clone()));
        }
        if let Some(declaration) = index.element_ignoring_namespace(&name.local_name) {
            warn!(element = %name, found = %declaration.name, "no declaration found, using a declaration from another namespace");
            return Ok(Resolution::Declared(declaration));
        }
        warn!(element = %name, "no declaration found, parsing as xs:anyType");
        Ok(Resolution::Declared(Arc::new(ElementDecl::any_type(name.clone()))))
    }

    fn count_child(&mut self, name: &QName, parent: &Parent, index: &SchemaIndex, path: &str) -> Result<()> {
        let Some(particles) = &parent.particles else {
            if index.element(name).is_none() {
                return self.errors.report(validation::unexpected_child(path, name));
            }
            return Ok(());
        };
        let matched = validation::matching_particle(particles, name, |m, h| index.is_substitutable(m, h))
            .map(|p| (p.name().clone(), p.clone()));
        let Some((key, particle)) = matched else {
            if !particles.has_wildcard() {
                return self.errors.report(validation::unexpected_child(&parent.path, name));
            }
            return Ok(());
        };
        let count = match self.stack.last_mut() {
            Some(Handler::Element(h)) => {
                let count = h.counts.entry(key).or_insert(0);
                *count += 1;
                *count
            }
            _ => 1,
        };
        if let Some(error) = validation::check_max_occurs(&parent.path, &particle, count) {
            self.errors.report(error)?;
        }
        Ok(())
    }

    fn start_declared(
        &mut self,
        name: QName,
        declaration: Arc<ElementDecl>,
        attributes: Vec<(QName, String)>,
        parent: Parent,
        index: &Arc<SchemaIndex>,
        path: String,
    ) -> Result<()> {
        let mut def = index.element_type(&declaration);
        let mut overridden = false;
        let mut nil = false;
        let mut ordinary = Vec::with_capacity(attributes.len());
        for (attr, value) in attributes {
            if attr.namespace() != Some(XSI_NAMESPACE) {
                ordinary.push((attr, value));
                continue;
            }
            match attr.local_name.as_str() {
                "type" => {
                    let type_name = self.namespaces.resolve_element(value.trim())?;
                    match index.type_definition(&type_name) {
                        Some(t) => {
                            trace!(element = %name, type_name = %type_name, "xsi:type override");
                            def = t;
                            overridden = true;
                        }
                        None => warn!(element = %name, type_name = %type_name, "unknown xsi:type, keeping the declared type"),
                    }
                }
                "nil" => nil = matches!(value.trim(), "true" | "1"),
                _ => {}
            }
        }

        let particles = if overridden {
            index.child_particles_of(&declaration, &def)
        } else {
            index.child_particles(&declaration)
        };
        let scope = self.namespaces.snapshot();
        let component =
            InstanceComponent::new(name.clone(), Declaration::Element(declaration.clone()), def.clone(), scope.clone());
        let node = self.tree.add_element(component, parent.node);
        if nil {
            if !declaration.nillable {
                self.errors.report(validation::not_nillable(&path, &name))?;
            }
            self.tree.set_nil(node, true);
        }

        self.add_attributes(node, &def, ordinary, &scope, index, &parent.context, &path)?;

        let mut child_context = parent.context.clone();
        let bindings = self
            .walker
            .bindings(&name, &def, index, &parent.context)
            .map_err(|e| Error::binding(&name, e))?;
        if let Some(view) = self.tree.node(node) {
            for binding in bindings.iter().filter_map(Binding::as_complex) {
                if let Some(derived) = binding.initialize_child_context(view.component(), &view, &child_context) {
                    trace!(element = %name, "child context derived");
                    child_context = derived;
                }
            }
        }

        trace!(element = %name, depth = self.stack.len(), "element handler pushed");
        self.stack.push(Handler::Element(ElementHandler {
            node,
            particles,
            counts: HashMap::new(),
            context: parent.context,
            child_context,
            path,
        }));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_attributes(
        &mut self,
        owner: NodeId,
        def: &Arc<TypeDefinition>,
        attributes: Vec<(QName, String)>,
        scope: &NamespaceContext,
        index: &Arc<SchemaIndex>,
        context: &Arc<Context>,
        path: &str,
    ) -> Result<()> {
        let open = def.as_complex().map(|c| c.any_attribute).unwrap_or(false);
        let mut present = HashSet::new();
        for (name, value) in attributes {
            let declaration = match index.attribute_for(def, &name) {
                Some(declaration) => declaration,
                None => {
                    if !open {
                        self.errors.report(validation::unexpected_attribute(path, &name))?;
                    }
                    Arc::new(AttributeDecl::new(name.clone(), Some(TypeRef::xs(XSD_ANY_SIMPLE_TYPE))))
                }
            };
            present.insert(name.clone());
            self.add_attribute(owner, name, declaration, value, scope, index, context, path)?;
        }

        for attribute_use in index.attribute_uses(def) {
            let declaration = attribute_use.declaration;
            if present.contains(&declaration.name) {
                continue;
            }
            if attribute_use.required {
                self.errors.report(validation::missing_attribute(path, &declaration.name))?;
            } else if let Some(default) = declaration.default.clone().or_else(|| declaration.fixed.clone()) {
                let name = declaration.name.clone();
                self.add_attribute(owner, name, declaration, default, scope, index, context, path)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_attribute(
        &mut self,
        owner: NodeId,
        name: QName,
        declaration: Arc<AttributeDecl>,
        text: String,
        scope: &NamespaceContext,
        index: &Arc<SchemaIndex>,
        context: &Arc<Context>,
        path: &str,
    ) -> Result<()> {
        let def = index.attribute_type(&declaration);
        let attribute_path = format!("{}/@{}", path, name.local_name);
        let mut component = InstanceComponent::new(name, Declaration::Attribute(declaration), def, scope.clone());
        component.text = text;
        let id = self.tree.add_attribute(component, owner);
        let executor = ParseExecutor::new(index, &self.walker);
        let value = executor.execute(&self.tree, id, context, &mut self.errors, &attribute_path)?;
        self.tree.set_value(id, value);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Handler::Element(h)) => {
                let node = h.node;
                self.tree.append_text(node, text);
                Ok(())
            }
            Some(Handler::Delegate(d)) => d.session.characters(text),
            _ => Ok(()),
        }
    }

    fn end_element(&mut self, raw_name: &str) -> Result<()> {
        let name = self.namespaces.resolve_element(raw_name)?;
        let handler = match self.stack.pop() {
            Some(Handler::Document) | None => {
                return Err(Error::Xml(format!("unexpected end tag {}", name)));
            }
            Some(handler) => handler,
        };

        match handler {
            Handler::Delegate(mut d) => {
                self.namespaces.pop_scope();
                d.session.end_element(&name)?;
                if d.depth > 0 {
                    d.depth -= 1;
                    self.stack.push(Handler::Delegate(d));
                    return Ok(());
                }
                let value = d.session.finish().map_err(|e| Error::binding(&name, e))?;
                self.tree.set_value(d.node, value);
                trace!(element = %name, "delegate handler popped");
                self.complete(d.node, &name)
            }
            Handler::Element(h) => {
                let open_name = self.tree.node(h.node).map(|n| n.component().name.clone());
                if open_name.as_ref() != Some(&name) {
                    return Err(Error::Xml(format!(
                        "mismatched end tag {}, expected {}",
                        name,
                        open_name.map(|n| n.to_string()).unwrap_or_default()
                    )));
                }
                let nil = self.tree.node(h.node).map(|n| n.is_nil()).unwrap_or(false);
                if self.errors.is_enabled() && !nil {
                    let missing = validation::check_min_occurs(&h.path, &h.particles, |n| {
                        h.counts.get(n).copied().unwrap_or(0)
                    });
                    self.errors.report_all(missing)?;
                }

                let Some(index) = self.index.clone() else {
                    return Err(Error::Xml(format!("end tag {} before any start tag", name)));
                };
                let executor = ParseExecutor::new(&index, &self.walker);
                let value = executor.execute(&self.tree, h.node, &h.context, &mut self.errors, &h.path)?;
                self.namespaces.pop_scope();
                self.tree.set_value(h.node, value);
                self.tree.release_child_values(h.node);
                trace!(element = %name, depth = self.stack.len(), "element handler popped");
                self.complete(h.node, &name)
            }
            Handler::Document => Ok(()),
        }
    }

    fn is_streaming_target(&self, name: &QName) -> bool {
        match self.settings.streaming_target() {
            Some(target) if target.is_wildcard() => target.local_name == name.local_name,
            Some(target) => target == name,
            None => false,
        }
    }

    /// Hand a finished node to its consumer: the delivery buffer for the
    /// streaming target, the result slot for the root
    fn complete(&mut self, node: NodeId, name: &QName) -> Result<()> {
        if self.is_streaming_target(name) {
            if let Some(buffer) = &self.buffer {
                if let Some(value) = self.tree.take_value(node) {
                    if !buffer.put(Ok(value)) {
                        return Err(Error::Other("delivery buffer closed by the consumer".to_string()));
                    }
                }
                self.tree.prune(node);
                return Ok(());
            }
        }
        if matches!(self.stack.last(), Some(Handler::Document)) {
            self.result = self.tree.take_value(node);
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        if self.stack.len() != 1 {
            return Err(Error::Xml(format!(
                "unexpected end of document, {} element(s) still open",
                self.depth()
            )));
        }
        if self.index.is_none() {
            return Err(Error::Xml("document has no root element".to_string()));
        }
        self.finished = true;
        debug!(validation_errors = self.errors.errors().len(), "document parsed");
        Ok(())
    }
}
