//! Parse tree
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node is
//! created when its element starts (attribute nodes are created with it),
//! accumulates text and children while the element is open, and receives
//! its value when the element ends. Streaming consumers prune the nodes
//! they have delivered; pruned slots are reused.

use std::sync::Arc;

use crate::error::Result;
use crate::namespaces::{NamespaceContext, QName};
use crate::schema::{Declaration, TypeDefinition};
use crate::values::Value;

/// An element or attribute occurrence in an instance document
#[derive(Debug, Clone)]
pub struct InstanceComponent {
    /// Name as it occurs in the document
    pub name: QName,
    /// Declaration governing the occurrence
    pub declaration: Declaration,
    /// Effective type (the declared type, or the xsi:type override)
    pub type_definition: Arc<TypeDefinition>,
    /// Accumulated character data
    pub text: String,
    /// Namespace bindings in scope at the occurrence
    pub namespaces: NamespaceContext,
}

impl InstanceComponent {
    /// Create a component with no text yet
    pub fn new(
        name: QName,
        declaration: Declaration,
        type_definition: Arc<TypeDefinition>,
        namespaces: NamespaceContext,
    ) -> Self {
        Self {
            name,
            declaration,
            type_definition,
            text: String::new(),
            namespaces,
        }
    }

    /// Whether this is an attribute occurrence
    pub fn is_attribute(&self) -> bool {
        self.declaration.is_attribute()
    }

    /// Resolve a prefixed name against the namespaces in scope
    pub fn resolve_qname(&self, prefixed: &str) -> Result<QName> {
        self.namespaces.resolve(prefixed.trim())
    }
}

/// Index of a node in a [`ParseTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct NodeData {
    component: InstanceComponent,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<NodeId>,
    value: Option<Value>,
    nil: bool,
}

/// Arena of parse tree nodes
#[derive(Debug, Default)]
pub struct ParseTree {
    nodes: Vec<Option<NodeData>>,
    free: Vec<usize>,
    live: usize,
}

impl ParseTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(data);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(data));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Add an element node, linked as the last child of `parent`
    pub fn add_element(&mut self, component: InstanceComponent, parent: Option<NodeId>) -> NodeId {
        let id = self.alloc(NodeData {
            component,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
            value: None,
            nil: false,
        });
        if let Some(parent) = parent.and_then(|p| self.data_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    /// Add an attribute node to `owner`
    pub fn add_attribute(&mut self, component: InstanceComponent, owner: NodeId) -> NodeId {
        let id = self.alloc(NodeData {
            component,
            parent: Some(owner),
            children: Vec::new(),
            attributes: Vec::new(),
            value: None,
            nil: false,
        });
        if let Some(owner) = self.data_mut(owner) {
            owner.attributes.push(id);
        }
        id
    }

    /// Append character data to a node
    pub fn append_text(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.data_mut(id) {
            node.component.text.push_str(text);
        }
    }

    /// Set the computed value of a node
    pub fn set_value(&mut self, id: NodeId, value: Option<Value>) {
        if let Some(node) = self.data_mut(id) {
            node.value = value;
        }
    }

    /// Take the computed value out of a node
    pub fn take_value(&mut self, id: NodeId) -> Option<Value> {
        self.data_mut(id).and_then(|n| n.value.take())
    }

    /// Drop the values of the children and attributes of `id`. Called once
    /// the value of `id` has been built from them, so a value lives in one
    /// place only.
    pub fn release_child_values(&mut self, id: NodeId) {
        let Some(node) = self.data(id) else {
            return;
        };
        let owned: Vec<NodeId> = node.children.iter().chain(&node.attributes).copied().collect();
        for child in owned {
            if let Some(child) = self.data_mut(child) {
                child.value = None;
            }
        }
    }

    /// Mark a node as explicitly nil
    pub fn set_nil(&mut self, id: NodeId, nil: bool) {
        if let Some(node) = self.data_mut(id) {
            node.nil = nil;
        }
    }

    /// Replace the effective type of a node (xsi:type)
    pub fn set_type(&mut self, id: NodeId, def: Arc<TypeDefinition>) {
        if let Some(node) = self.data_mut(id) {
            node.component.type_definition = def;
        }
    }

    /// Detach a node from its parent and free it with its subtree
    pub fn prune(&mut self, id: NodeId) {
        let parent = self.data(id).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.data_mut(p)) {
            parent.children.retain(|c| *c != id);
            parent.attributes.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
                stack.extend(node.attributes);
                self.free.push(current.0);
                self.live -= 1;
            }
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.data(id).map(|_| NodeRef { tree: self, id })
    }
}

/// Read-only view of a parse tree node
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ParseTree,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("name", &self.component().name)
            .field("children", &self.data().children.len())
            .field("value", &self.data().value)
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a NodeData {
        match self.tree.nodes[self.id.0].as_ref() {
            Some(data) => data,
            // NodeRefs are only handed out for live slots and the tree is
            // borrowed for their lifetime
            None => unreachable!("NodeRef to a pruned node"),
        }
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The instance component
    pub fn component(&self) -> &'a InstanceComponent {
        &self.data().component
    }

    /// Computed value
    pub fn value(&self) -> Option<&'a Value> {
        self.data().value.as_ref()
    }

    /// Accumulated text
    pub fn text(&self) -> &'a str {
        &self.data().component.text
    }

    /// Whether the element was marked xsi:nil
    pub fn is_nil(&self) -> bool {
        self.data().nil
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent.and_then(|p| self.tree.node(p))
    }

    /// Child element nodes in document order
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().filter_map(move |id| tree.node(*id))
    }

    /// Attribute nodes
    pub fn attributes(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data().attributes.iter().filter_map(move |id| tree.node(*id))
    }

    /// First child named `name`
    pub fn child(&self, name: &QName) -> Option<NodeRef<'a>> {
        self.children().find(|c| &c.component().name == name)
    }

    /// First child with local name `local_name`, any namespace
    pub fn child_local(&self, local_name: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.component().name.local_name == local_name)
    }

    /// Value of the first child named `name`
    pub fn child_value(&self, name: &QName) -> Option<&'a Value> {
        self.child(name).and_then(|c| c.value())
    }

    /// Values of all children named `name`
    pub fn child_values(&self, name: &QName) -> Vec<&'a Value> {
        self.children()
            .filter(|c| &c.component().name == name)
            .filter_map(|c| c.value())
            .collect()
    }

    /// Attribute node named `name`
    pub fn attribute(&self, name: &QName) -> Option<NodeRef<'a>> {
        self.attributes().find(|a| &a.component().name == name)
    }

    /// Value of the attribute named `name`
    pub fn attribute_value(&self, name: &QName) -> Option<&'a Value> {
        self.attribute(name).and_then(|a| a.value())
    }

    /// Whether a child named `name` exists
    pub fn has_child(&self, name: &QName) -> bool {
        self.child(name).is_some()
    }

    /// Whether the node has child elements
    pub fn has_children(&self) -> bool {
        !self.data().children.is_empty()
    }

    /// Whether the node has attributes
    pub fn has_attributes(&self) -> bool {
        !self.data().attributes.is_empty()
    }
}
