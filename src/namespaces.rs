//! XML namespace handling
//!
//! This module provides qualified names (QNames), single-scope prefix
//! mappings and a scoped namespace stack that tracks `xmlns` declarations
//! while an instance document is being read.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema Instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Wildcard namespace used by lookups that match on local name only
pub const ANY_NAMESPACE: &str = "*";

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()).filter(|s: &String| !s.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace), local_name)
    }

    /// Create a QName in the XML Schema namespace
    pub fn xs(local_name: impl Into<String>) -> Self {
        Self::namespaced(XSD_NAMESPACE, local_name)
    }

    /// Create a QName matching any namespace
    pub fn wildcard(local_name: impl Into<String>) -> Self {
        Self::namespaced(ANY_NAMESPACE, local_name)
    }

    /// Namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether this name uses the wildcard namespace
    pub fn is_wildcard(&self) -> bool {
        self.namespace.as_deref() == Some(ANY_NAMESPACE)
    }

    /// Whether this name is in the XML Schema namespace
    pub fn is_xs(&self) -> bool {
        self.namespace.as_deref() == Some(XSD_NAMESPACE)
    }

    /// Same local name, no namespace
    pub fn without_namespace(&self) -> QName {
        QName::local(self.local_name.clone())
    }

    /// Parse the `{namespace}local` notation produced by `Display`
    pub fn parse_clark(s: &str) -> Result<Self> {
        match s.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest
                    .split_once('}')
                    .ok_or_else(|| Error::Value(format!("Unterminated namespace in '{}'", s)))?;
                if local.is_empty() {
                    return Err(Error::Value(format!("Missing local name in '{}'", s)));
                }
                Ok(QName::new(Some(ns), local))
            }
            None => Ok(QName::local(s)),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find a prefix bound to `namespace`
    pub fn get_prefix(&self, namespace: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, ns)| ns.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Iterate over prefix bindings
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }

    /// Whether the context declares nothing
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Value(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

/// Stack of namespace scopes mirroring element nesting.
///
/// A scope is pushed for every start tag and popped at the matching end tag.
#[derive(Debug, Clone)]
pub struct NamespaceSupport {
    scopes: Vec<NamespaceContext>,
}

impl NamespaceSupport {
    /// Create a stack with the implicit `xml` prefix bound
    pub fn new() -> Self {
        let mut root = NamespaceContext::new();
        root.add_prefix("xml", XML_NAMESPACE);
        Self { scopes: vec![root] }
    }

    /// Open a scope with the declarations of a start tag
    pub fn push_scope(&mut self, declarations: NamespaceContext) {
        self.scopes.push(declarations);
    }

    /// Close the innermost scope
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Current nesting depth (the root scope is not counted)
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Namespace bound to `prefix` in the innermost scope declaring it
    pub fn namespace_for(&self, prefix: &str) -> Option<&str> {
        self.scopes.iter().rev().find_map(|s| s.get_namespace(prefix))
    }

    /// Default namespace in effect
    pub fn default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get_default_namespace())
            .filter(|ns| !ns.is_empty())
    }

    /// Resolve an element name (unprefixed names take the default namespace)
    pub fn resolve_element(&self, raw: &str) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let ns = self
                    .namespace_for(prefix)
                    .ok_or_else(|| Error::Xml(format!("Unbound namespace prefix '{}'", prefix)))?;
                Ok(QName::namespaced(ns, local))
            }
            None => Ok(QName::new(self.default_namespace(), raw)),
        }
    }

    /// Resolve an attribute name (unprefixed attributes have no namespace)
    pub fn resolve_attribute(&self, raw: &str) -> Result<QName> {
        match raw.split_once(':') {
            Some(_) => self.resolve_element(raw),
            None => Ok(QName::local(raw)),
        }
    }

    /// Flatten the visible bindings into a single context
    pub fn snapshot(&self) -> NamespaceContext {
        let mut ctx = NamespaceContext::new();
        for scope in &self.scopes {
            for (prefix, ns) in scope.iter() {
                ctx.add_prefix(prefix, ns);
            }
            if let Some(ns) = scope.get_default_namespace() {
                ctx.set_default_namespace(ns);
            }
        }
        ctx
    }
}

impl Default for NamespaceSupport {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace scopes of the document being parsed.
///
/// The parser pushes and pops scopes as elements open and close; bindings
/// reach the same instance through the document's context to resolve
/// prefixed values in the scope of the element being parsed.
#[derive(Debug, Default)]
pub struct DocumentNamespaces {
    support: RwLock<NamespaceSupport>,
}

impl DocumentNamespaces {
    /// Create scopes holding only the implicit `xml` prefix
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, NamespaceSupport> {
        self.support.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, NamespaceSupport> {
        self.support.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a scope with the declarations of a start tag
    pub fn push_scope(&self, declarations: NamespaceContext) {
        self.write().push_scope(declarations);
    }

    /// Close the innermost scope
    pub fn pop_scope(&self) {
        self.write().pop_scope();
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.read().depth()
    }

    /// Resolve an element name
    pub fn resolve_element(&self, raw: &str) -> Result<QName> {
        self.read().resolve_element(raw)
    }

    /// Resolve an attribute name
    pub fn resolve_attribute(&self, raw: &str) -> Result<QName> {
        self.read().resolve_attribute(raw)
    }

    /// Resolve a prefixed name appearing in content, such as an xs:QName
    /// value; unprefixed names take the default namespace
    pub fn resolve_value(&self, prefixed: &str) -> Result<QName> {
        self.read()
            .resolve_element(prefixed)
            .map_err(|_| Error::Value(format!("Unknown prefix in '{}'", prefixed)))
    }

    /// Flatten the visible bindings into a single context
    pub fn snapshot(&self) -> NamespaceContext {
        self.read().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_empty_namespace_is_none() {
        assert_eq!(QName::new(Some(""), "a"), QName::local("a"));
    }

    #[test]
    fn test_qname_display_and_parse() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");
        assert_eq!(QName::parse_clark(&qname.to_string()).unwrap(), qname);
        assert_eq!(QName::local("element").to_string(), "element");
        assert!(QName::parse_clark("{urn:x").is_err());
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", XSD_NAMESPACE);

        let qname = ctx.resolve("xs:element").unwrap();
        assert!(qname.is_xs());
        assert_eq!(qname.local_name, "element");
        assert!(ctx.resolve("foo:bar").is_err());
    }

    #[test]
    fn test_namespace_support_scopes() {
        let mut ns = NamespaceSupport::new();
        let mut outer = NamespaceContext::new();
        outer.set_default_namespace("urn:outer");
        outer.add_prefix("p", "urn:p");
        ns.push_scope(outer);

        let mut inner = NamespaceContext::new();
        inner.set_default_namespace("urn:inner");
        ns.push_scope(inner);

        assert_eq!(ns.resolve_element("a").unwrap(), QName::namespaced("urn:inner", "a"));
        assert_eq!(ns.resolve_element("p:a").unwrap(), QName::namespaced("urn:p", "a"));
        assert_eq!(ns.resolve_attribute("a").unwrap(), QName::local("a"));

        ns.pop_scope();
        assert_eq!(ns.resolve_element("a").unwrap(), QName::namespaced("urn:outer", "a"));
        assert!(ns.resolve_element("q:a").is_err());
        assert_eq!(ns.snapshot().get_namespace("xml"), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_document_namespaces_follow_scopes() {
        let namespaces = DocumentNamespaces::new();
        let mut outer = NamespaceContext::new();
        outer.add_prefix("t", "urn:t");
        namespaces.push_scope(outer);
        let mut inner = NamespaceContext::new();
        inner.set_default_namespace("urn:d");
        namespaces.push_scope(inner);

        assert_eq!(namespaces.depth(), 2);
        assert_eq!(namespaces.resolve_value("t:a").unwrap(), QName::namespaced("urn:t", "a"));
        assert_eq!(namespaces.resolve_value("b").unwrap(), QName::namespaced("urn:d", "b"));

        namespaces.pop_scope();
        assert_eq!(namespaces.resolve_value("b").unwrap(), QName::local("b"));
        assert!(matches!(namespaces.resolve_value("u:a"), Err(Error::Value(_))));
    }
}
