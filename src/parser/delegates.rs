//! Parser extension points
//!
//! Two kinds of plugins can take part in declaration resolution when the
//! schema does not know an element:
//!
//! * a [`HandlerFactory`] supplies a declaration, after which the element
//!   is parsed through bindings as usual;
//! * a [`ParserDelegate`] takes over the whole subtree: it receives the raw
//!   events of the element and everything below it and produces the value
//!   itself.
//!
//! Both are looked up as services of the session context
//! ([`HandlerFactories`], [`ParserDelegates`]).

use std::sync::Arc;

use crate::documents::{Attribute, Element};
use crate::error::Result;
use crate::namespaces::QName;
use crate::schema::{ElementDecl, SchemaIndex};
use crate::values::{Object, Value};

/// Supplies declarations for elements the schema does not declare
pub trait HandlerFactory: Send + Sync {
    /// Declaration to use for an element named `name` whose parent element
    /// is `parent` (`None` at the document root)
    fn declaration(&self, name: &QName, parent: Option<&QName>, index: &SchemaIndex)
        -> Option<Arc<ElementDecl>>;
}

/// Handler factories registered in a context
#[derive(Clone, Default)]
pub struct HandlerFactories(pub Vec<Arc<dyn HandlerFactory>>);

impl HandlerFactories {
    /// First declaration any factory supplies
    pub fn declaration(&self, name: &QName, parent: Option<&QName>, index: &SchemaIndex) -> Option<Arc<ElementDecl>> {
        self.0.iter().find_map(|f| f.declaration(name, parent, index))
    }
}

/// Receives the events of a delegated subtree
pub trait DelegateSession: Send {
    /// Start tag below the delegated element; attributes are resolved
    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()>;

    /// Character data
    fn characters(&mut self, text: &str) -> Result<()>;

    /// End tag below the delegated element
    fn end_element(&mut self, name: &QName) -> Result<()>;

    /// Value of the delegated element, called after its end tag
    fn finish(self: Box<Self>) -> Result<Option<Value>>;
}

/// Parses elements outside the schema-driven path
pub trait ParserDelegate: Send + Sync {
    /// Whether the delegate handles elements named `name`
    fn can_handle(&self, name: &QName) -> bool;

    /// Open a session for one element. The session receives the element's
    /// own start tag first.
    fn start(&self, name: &QName) -> Box<dyn DelegateSession>;
}

/// Parser delegates registered in a context
#[derive(Clone, Default)]
pub struct ParserDelegates(pub Vec<Arc<dyn ParserDelegate>>);

impl ParserDelegates {
    /// First delegate that handles `name`
    pub fn find(&self, name: &QName) -> Option<&Arc<dyn ParserDelegate>> {
        self.0.iter().find(|d| d.can_handle(name))
    }
}

/// A captured XML subtree, the value produced by [`CaptureDelegate`]
#[derive(Debug, Clone, PartialEq)]
pub struct XmlFragment(pub Element);

impl Object for XmlFragment {
    fn kind(&self) -> &str {
        "xml"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn equals(&self, other: &dyn Object) -> bool {
        other
            .as_any()
            .downcast_ref::<XmlFragment>()
            .map(|o| o == self)
            .unwrap_or(false)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.0.to_xml_string())
    }
}

/// Delegate capturing whole subtrees of the given elements as
/// [`XmlFragment`] values
#[derive(Debug, Clone, Default)]
pub struct CaptureDelegate {
    names: Vec<QName>,
}

impl CaptureDelegate {
    /// Capture elements named `name`; a wildcard name matches any
    /// namespace
    pub fn new(names: impl IntoIterator<Item = QName>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }
}

impl ParserDelegate for CaptureDelegate {
    fn can_handle(&self, name: &QName) -> bool {
        self.names.iter().any(|n| {
            n == name || (n.is_wildcard() && n.local_name == name.local_name)
        })
    }

    fn start(&self, _name: &QName) -> Box<dyn DelegateSession> {
        Box::new(CaptureSession::default())
    }
}

#[derive(Debug, Default)]
struct CaptureSession {
    open: Vec<Element>,
    root: Option<Element>,
}

impl DelegateSession for CaptureSession {
    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        let mut element = Element::new(name.clone());
        for (name, value) in attributes {
            element.set_attribute(Attribute::new(name.clone(), value.clone()));
        }
        self.open.push(element);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if let Some(current) = self.open.last_mut() {
            current.append_text(text);
        }
        Ok(())
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        if let Some(done) = self.open.pop() {
            match self.open.last_mut() {
                Some(parent) => parent.add_child(done),
                None => self.root = Some(done),
            }
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Option<Value>> {
        Ok(self.root.map(|e| Value::Object(Arc::new(XmlFragment(e)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_session_builds_subtree() {
        let delegate = CaptureDelegate::new([QName::wildcard("extra")]);
        assert!(delegate.can_handle(&QName::namespaced("urn:x", "extra")));
        assert!(!delegate.can_handle(&QName::local("other")));

        let mut session = delegate.start(&QName::local("extra"));
        session
            .start_element(&QName::local("extra"), &[(QName::local("id"), "7".into())])
            .unwrap();
        session.start_element(&QName::local("note"), &[]).unwrap();
        session.characters("hi").unwrap();
        session.end_element(&QName::local("note")).unwrap();
        session.end_element(&QName::local("extra")).unwrap();

        let value = session.finish().unwrap().unwrap();
        let fragment = value.downcast_ref::<XmlFragment>().unwrap();
        assert_eq!(fragment.0.get_attribute("id"), Some("7"));
        assert_eq!(fragment.0.first_child("note").unwrap().text(), "hi");
    }
}
