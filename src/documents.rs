//! XML document trees
//!
//! A small namespaced DOM. It is read from text when loading XSD documents
//! and built programmatically by the encoder, which serializes it back to
//! XML with [`Document::to_xml_string`].

use crate::error::{Error, Result};
use crate::events::{split_namespace_declarations, EventReader, XmlEvent};
use crate::namespaces::{NamespaceContext, NamespaceSupport, QName, XML_NAMESPACE};
use quick_xml::escape::escape;
use std::fmt::Write;

/// Attribute of an [`Element`]
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute qualified name
    pub name: QName,
    /// Preferred prefix when serializing a namespaced attribute
    pub prefix: Option<String>,
    /// Attribute value
    pub value: String,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            prefix: None,
            value: value.into(),
        }
    }

    /// Set the preferred prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Child of an [`Element`]
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data
    Text(String),
}

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Preferred prefix when serializing
    pub prefix: Option<String>,
    /// Element attributes in document order
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order
    pub children: Vec<Node>,
    /// Namespace declarations made on this element
    pub namespaces: NamespaceContext,
    /// Namespace bindings in scope at this element (filled when reading)
    pub scope: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            prefix: None,
            attributes: Vec::new(),
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
            scope: NamespaceContext::new(),
        }
    }

    /// Set the preferred prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an attribute value by local name, preferring unqualified
    /// attributes
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == name)
            .or_else(|| self.attributes.iter().find(|a| a.name.local_name == name))
            .map(|a| a.value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == qname)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing any attribute with the same name
    pub fn set_attribute(&mut self, attribute: Attribute) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// Declare a namespace on this element (`None` prefix declares the
    /// default namespace)
    pub fn declare_namespace(&mut self, prefix: Option<&str>, namespace: impl Into<String>) {
        match prefix {
            Some(prefix) => self.namespaces.add_prefix(prefix, namespace),
            None => self.namespaces.set_default_namespace(namespace),
        }
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append character data, merging with a trailing text node
    pub fn append_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Replace all text children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|c| !matches!(c, Node::Text(_)));
        self.children.push(Node::Text(text.into()));
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Iterate over child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.child_elements()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// First child element with the given local name
    pub fn first_child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.local_name() == local_name)
    }

    /// Resolve a prefixed name (such as an attribute value `tns:item`)
    /// against the namespaces in scope at this element
    pub fn resolve_qname(&self, prefixed: &str) -> Result<QName> {
        let prefixed = prefixed.trim();
        match prefixed.split_once(':') {
            Some(("xml", local)) => Ok(QName::namespaced(XML_NAMESPACE, local)),
            Some((prefix, local)) => {
                let ns = self.scope.get_namespace(prefix).ok_or_else(|| {
                    Error::Schema(format!("Unbound prefix '{}' in '{}'", prefix, prefixed))
                })?;
                Ok(QName::namespaced(ns, local))
            }
            None => Ok(QName::new(self.scope.get_default_namespace(), prefixed)),
        }
    }

    /// Serialize this element as an XML fragment
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        let mut writer = XmlWriter::new(None);
        writer.write_element(&mut out, self, 0);
        out
    }
}

/// XML Document representation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with a root element
    pub fn with_root(root: Element) -> Self {
        Self { root: Some(root) }
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = EventReader::new(xml);
        let mut namespaces = NamespaceSupport::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut doc = Document::new();

        loop {
            match reader.next_event()? {
                XmlEvent::StartElement { name, attributes } => {
                    let (declarations, attributes) = split_namespace_declarations(attributes);
                    namespaces.push_scope(declarations.clone());

                    let mut element = Element::new(namespaces.resolve_element(&name)?);
                    element.prefix = name.split_once(':').map(|(p, _)| p.to_string());
                    element.namespaces = declarations;
                    element.scope = namespaces.snapshot();
                    for attr in attributes {
                        let qname = namespaces.resolve_attribute(&attr.name)?;
                        let mut attribute = Attribute::new(qname, attr.value);
                        attribute.prefix = attr.name.split_once(':').map(|(p, _)| p.to_string());
                        element.attributes.push(attribute);
                    }
                    element_stack.push(element);
                }
                XmlEvent::EndElement { .. } => {
                    namespaces.pop_scope();
                    if let Some(current) = element_stack.pop() {
                        match element_stack.last_mut() {
                            Some(parent) => parent.add_child(current),
                            None => doc.root = Some(current),
                        }
                    }
                }
                XmlEvent::Characters(text) => {
                    if let Some(current) = element_stack.last_mut() {
                        current.append_text(&text);
                    }
                }
                XmlEvent::EndDocument => break,
            }
        }

        if doc.root.is_none() {
            return Err(Error::Xml("Document has no root element".to_string()));
        }
        Ok(doc)
    }

    /// Serialize the document with an XML declaration
    pub fn to_xml_string(&self) -> String {
        self.write(&WriteOptions::new())
    }

    /// Serialize the document, indenting element-only content
    pub fn to_pretty_string(&self) -> String {
        self.write(&WriteOptions::new().with_indent(Some(2)))
    }

    /// Serialize the document with `options`
    pub fn write(&self, options: &WriteOptions) -> String {
        let mut out = String::new();
        if options.xml_declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            if options.indent.is_some() {
                out.push('\n');
            }
        }
        if let Some(root) = &self.root {
            let mut writer = XmlWriter::new(options.indent);
            writer.write_element(&mut out, root, 0);
        }
        out
    }
}

/// Options for [`Document::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    indent: Option<usize>,
    xml_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: None,
            xml_declaration: true,
        }
    }
}

impl WriteOptions {
    /// Compact output with an XML declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent element-only content by `indent` spaces per level
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    /// Write or omit the XML declaration
    pub fn with_xml_declaration(mut self, declaration: bool) -> Self {
        self.xml_declaration = declaration;
        self
    }
}

/// Serializer tracking the prefixes in scope so that every namespaced
/// name it writes is declared
struct XmlWriter {
    indent: Option<usize>,
    scopes: Vec<NamespaceContext>,
    generated: usize,
}

impl XmlWriter {
    fn new(indent: Option<usize>) -> Self {
        let mut root = NamespaceContext::new();
        root.add_prefix("xml", XML_NAMESPACE);
        Self {
            indent,
            scopes: vec![root],
            generated: 0,
        }
    }

    fn lookup_prefix(&self, prefix: &str) -> Option<&str> {
        self.scopes.iter().rev().find_map(|s| s.get_namespace(prefix))
    }

    fn default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get_default_namespace())
            .filter(|ns| !ns.is_empty())
    }

    fn prefix_for(&self, namespace: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            if let Some(prefix) = scope.get_prefix(namespace) {
                // shadowed prefixes do not count
                if self.lookup_prefix(prefix) == Some(namespace) {
                    return Some(prefix.to_string());
                }
            }
        }
        None
    }

    fn fresh_prefix(&mut self) -> String {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if self.lookup_prefix(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn write_element(&mut self, out: &mut String, element: &Element, level: usize) {
        let mut declared = element.namespaces.clone();
        self.scopes.push(element.namespaces.clone());

        let tag = self.element_tag(element, &mut declared);

        let mut attrs = Vec::with_capacity(element.attributes.len());
        for attr in &element.attributes {
            let name = self.attribute_name(attr, &mut declared);
            attrs.push((name, attr.value.as_str()));
        }

        self.pad(out, level);
        let _ = write!(out, "<{}", tag);
        if let Some(ns) = declared.get_default_namespace() {
            let _ = write!(out, " xmlns=\"{}\"", escape(ns));
        }
        let mut prefixes: Vec<(&str, &str)> = declared.iter().collect();
        prefixes.sort();
        for (prefix, ns) in prefixes {
            let _ = write!(out, " xmlns:{}=\"{}\"", prefix, escape(ns));
        }
        for (name, value) in attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }

        if element.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            let element_only = element
                .children
                .iter()
                .all(|c| matches!(c, Node::Element(_)));
            for child in &element.children {
                match child {
                    Node::Element(e) => {
                        if element_only {
                            self.newline(out);
                        }
                        self.write_element(out, e, level + 1);
                    }
                    Node::Text(t) => out.push_str(&escape(t.as_str())),
                }
            }
            if element_only {
                self.newline(out);
                self.pad(out, level);
            }
            let _ = write!(out, "</{}>", tag);
        }

        self.scopes.pop();
    }

    fn element_tag(&mut self, element: &Element, declared: &mut NamespaceContext) -> String {
        let local = &element.qname.local_name;
        match element.namespace() {
            None => {
                if self.default_namespace().is_some() {
                    declared.set_default_namespace("");
                    self.bind(None, "");
                }
                local.clone()
            }
            Some(ns) => {
                if let Some(prefix) = &element.prefix {
                    if self.lookup_prefix(prefix) != Some(ns) {
                        declared.add_prefix(prefix.as_str(), ns);
                        self.bind(Some(prefix), ns);
                    }
                    return format!("{}:{}", prefix, local);
                }
                if self.default_namespace() == Some(ns) {
                    return local.clone();
                }
                if let Some(prefix) = self.prefix_for(ns) {
                    return format!("{}:{}", prefix, local);
                }
                declared.set_default_namespace(ns);
                self.bind(None, ns);
                local.clone()
            }
        }
    }

    fn attribute_name(&mut self, attr: &Attribute, declared: &mut NamespaceContext) -> String {
        let local = &attr.name.local_name;
        let Some(ns) = attr.name.namespace() else {
            return local.clone();
        };
        if let Some(prefix) = &attr.prefix {
            if self.lookup_prefix(prefix) != Some(ns) {
                declared.add_prefix(prefix.as_str(), ns);
                self.bind(Some(prefix), ns);
            }
            return format!("{}:{}", prefix, local);
        }
        if let Some(prefix) = self.prefix_for(ns) {
            return format!("{}:{}", prefix, local);
        }
        let prefix = self.fresh_prefix();
        declared.add_prefix(prefix.as_str(), ns);
        self.bind(Some(&prefix), ns);
        format!("{}:{}", prefix, local)
    }

    fn bind(&mut self, prefix: Option<&str>, namespace: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            match prefix {
                Some(p) => scope.add_prefix(p, namespace),
                None => scope.set_default_namespace(namespace),
            }
        }
    }

    fn pad(&self, out: &mut String, level: usize) {
        if let Some(width) = self.indent {
            out.extend(std::iter::repeat(' ').take(width * level));
        }
    }

    fn newline(&self, out: &mut String) {
        if self.indent.is_some() {
            out.push('\n');
        }
    }
}
