//! Arena-backed AML tree

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::ReaderConfig;
use crate::context::ServerContext;
use crate::error::{Error, Result};
use crate::model::names::AttributeName;
use crate::value::Value;
use crate::xml::{Event, Reader};

static NULL_VALUE: Value = Value::Null;

/// Handle of a node inside a [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its document's arena
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Role of a node in an AML tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    /// An `<Item>` element
    Item,
    /// A child of an item, other than `Relationships`
    Property,
}

/// Result of looking up a child by name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(NodeId),
    Absent,
}

impl Lookup {
    pub const fn exists(self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub const fn node(self) -> Option<NodeId> {
        match self {
            Self::Found(id) => Some(id),
            Self::Absent => None,
        }
    }
}

/// Anything that can be added to an element
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    /// A node of the same document; re-parented or cloned
    Node(NodeId),
    Attribute { name: String, value: String },
    /// Scalar content, replacing any children
    Value(Value),
    /// Each member is added in order
    Many(Vec<Content>),
}

impl Content {
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<NodeId> for Content {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for Content {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i32> for Content {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for Content {
    fn from(value: i64) -> Self {
        Self::Value(Value::Int(value))
    }
}

impl From<f64> for Content {
    fn from(value: f64) -> Self {
        Self::Value(Value::Float(value))
    }
}

impl From<Vec<Content>> for Content {
    fn from(items: Vec<Content>) -> Self {
        Self::Many(items)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Parent {
    /// Standalone root of a tree
    Root,
    Attached(NodeId),
    /// Removed from its parent
    Detached,
}

#[derive(Clone, Debug)]
pub(super) struct NodeData {
    pub(super) name: String,
    pub(super) kind: NodeKind,
    pub(super) attributes: IndexMap<String, String>,
    pub(super) content: Value,
    pub(super) children: Vec<NodeId>,
    pub(super) parent: Parent,
    pub(super) read_only: bool,
    pub(super) from_data_store: bool,
}

impl NodeData {
    fn new(name: String, kind: NodeKind, parent: Parent) -> Self {
        Self {
            name,
            kind,
            attributes: IndexMap::new(),
            content: Value::Null,
            children: Vec::new(),
            parent,
            read_only: false,
            from_data_store: false,
        }
    }
}

/// A forest of AML nodes sharing one [`ServerContext`]
///
/// Nodes live in an append-only arena and [`NodeId`]s stay valid for the
/// life of the document. Removed nodes keep their slots, and every copy
/// [`Document::add`] makes of an attached node takes new ones. To drop that
/// garbage from a long-lived document, [`Document::import`] the live roots
/// into a fresh one.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub(super) nodes: Vec<NodeData>,
    pub(super) context: ServerContext,
}

impl Document {
    pub fn new(context: ServerContext) -> Self {
        Self {
            nodes: Vec::new(),
            context,
        }
    }

    /// Parse AML written by a client
    pub fn parse(xml: &str, context: ServerContext) -> Result<Self> {
        Self::parse_with(xml, context, ReaderConfig::default(), false)
    }

    /// Parse AML returned by the server; items answer schema defaults for
    /// properties the server omitted
    pub fn parse_stored(xml: &str, context: ServerContext) -> Result<Self> {
        Self::parse_with(xml, context, ReaderConfig::default(), true)
    }

    pub fn parse_with(
        xml: &str,
        context: ServerContext,
        config: ReaderConfig,
        from_data_store: bool,
    ) -> Result<Self> {
        let mut doc = Self::new(context);
        let mut reader = Reader::with_config(xml, config);
        let mut stack: Vec<(NodeId, String)> = Vec::new();

        while let Some(event) = reader.next_event()? {
            match event {
                Event::Start {
                    name,
                    attributes,
                    empty,
                } => {
                    let parent = stack.last().map(|(id, _)| *id);
                    let kind = classify(&name, parent.and_then(|p| doc.kind(p)));
                    let id = doc.push_node(NodeData {
                        attributes,
                        from_data_store,
                        ..NodeData::new(name, kind, parent.map_or(Parent::Root, Parent::Attached))
                    });
                    if let Some(parent) = parent {
                        doc.data_mut(parent)?.children.push(id);
                    }
                    if !empty {
                        stack.push((id, String::new()));
                    }
                }
                Event::End { .. } => {
                    if let Some((id, text)) = stack.pop() {
                        let node = doc.data_mut(id)?;
                        if node.children.is_empty() && !text.is_empty() {
                            node.content = Value::String(text);
                        }
                    }
                }
                Event::Text(text) | Event::CData(text) => {
                    if let Some((_, buffer)) = stack.last_mut() {
                        buffer.push_str(&text);
                    }
                }
                Event::Comment(_) => {}
            }
        }

        debug!(nodes = doc.nodes.len(), from_data_store, "parsed AML document");
        Ok(doc)
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn set_context(&mut self, context: ServerContext) {
        self.context = context;
    }

    /// Number of nodes ever allocated, including removed ones
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Standalone tree roots in creation order
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent == Parent::Root)
            .map(|(index, _)| NodeId(index))
    }

    /// First root, typically the element a parsed fragment started with
    pub fn root(&self) -> Option<NodeId> {
        self.roots().next()
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.data(id).map_or("", |node| node.name.as_str())
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.data(id).map(|node| node.kind)
    }

    /// True if the node is a standalone root or reachable from one
    pub fn exists(&self, id: NodeId) -> bool {
        self.data(id)
            .is_some_and(|node| node.parent != Parent::Detached)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match self.data(id)?.parent {
            Parent::Attached(parent) => Some(parent),
            Parent::Root | Parent::Detached => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).map_or(&[], |node| node.children.as_slice())
    }

    /// First child element with the given name
    pub fn element(&self, id: NodeId, name: &str) -> Lookup {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.name(*child) == name)
            .map_or(Lookup::Absent, Lookup::Found)
    }

    /// Child items, e.g. the members of a `Result` or `Relationships` element
    pub fn items(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.kind(*child) == Some(NodeKind::Item))
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.data(id)?.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.data(id)
            .into_iter()
            .flat_map(|node| node.attributes.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Scalar content, `Null` for containers and absent nodes
    pub fn content(&self, id: NodeId) -> &Value {
        self.data(id).map_or(&NULL_VALUE, |node| &node.content)
    }

    /// Scalar content formatted for the wire
    pub fn value(&self, id: NodeId) -> Option<String> {
        let node = self.data(id)?;
        if node.content.is_null() || !node.children.is_empty() {
            return None;
        }
        Some(self.context.format(&node.content))
    }

    pub fn is_read_only(&self, id: NodeId) -> bool {
        self.data(id).is_some_and(|node| node.read_only)
    }

    pub fn is_from_data_store(&self, id: NodeId) -> bool {
        self.data(id).is_some_and(|node| node.from_data_store)
    }

    /// The `type` attribute of an item
    pub fn type_name(&self, item: NodeId) -> Option<&str> {
        self.attribute(item, AttributeName::TYPE)
    }

    /// The `id` attribute of an item, falling back to its `id` property
    pub fn item_id(&self, item: NodeId) -> Option<String> {
        if let Some(id) = self.attribute(item, AttributeName::ID) {
            return Some(id.to_string());
        }
        self.element(item, AttributeName::ID)
            .node()
            .and_then(|prop| self.value(prop))
    }

    /// The `keyed_name` property, falling back to the `keyed_name` attribute
    /// of the `id` property
    pub fn keyed_name(&self, item: NodeId) -> Option<String> {
        if let Some(keyed) = self
            .element(item, AttributeName::KEYED_NAME)
            .node()
            .and_then(|prop| self.value(prop))
        {
            return Some(keyed);
        }
        self.element(item, AttributeName::ID)
            .node()
            .and_then(|prop| self.attribute(prop, AttributeName::KEYED_NAME))
            .map(str::to_string)
    }

    /// True if `ancestor` lies on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push_node(NodeData::new(name.into(), NodeKind::Element, Parent::Root))
    }

    pub fn create_property(&mut self, name: impl Into<String>) -> NodeId {
        self.push_node(NodeData::new(name.into(), NodeKind::Property, Parent::Root))
    }

    /// Create `<Item type=".." action="..">`
    pub fn create_item(&mut self, type_name: &str, action: Option<&str>) -> NodeId {
        let mut node = NodeData::new("Item".to_string(), NodeKind::Item, Parent::Root);
        node.attributes
            .insert(AttributeName::TYPE.to_string(), type_name.to_string());
        if let Some(action) = action {
            node.attributes
                .insert(AttributeName::ACTION.to_string(), action.to_string());
        }
        self.push_node(node)
    }

    /// Add content to a node.
    ///
    /// Nodes without a parent are moved under `id`; nodes owned by another
    /// parent are deep-cloned first.
    pub fn add(&mut self, id: NodeId, content: impl Into<Content>) -> Result<()> {
        self.assert_modifiable(id)?;
        match content.into() {
            Content::Node(child) => self.add_node(id, child)?,
            Content::Attribute { name, value } => {
                self.data_mut(id)?.attributes.insert(name, value);
            }
            Content::Value(value) => self.add_value(id, value)?,
            Content::Many(items) => {
                for item in items {
                    self.add(id, item)?;
                }
            }
        }
        Ok(())
    }

    /// Replace the content and children of a node
    pub fn set(&mut self, id: NodeId, content: impl Into<Content>) -> Result<()> {
        self.assert_modifiable(id)?;
        self.clear_content(id)?;
        let content = content.into();
        if matches!(content, Content::Value(Value::Null)) {
            return self.sync_property_flags(id);
        }
        self.add(id, content)
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.assert_modifiable(id)?;
        self.data_mut(id)?
            .attributes
            .insert(name.into(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.assert_modifiable(id)?;
        self.data_mut(id)?.attributes.shift_remove(name);
        Ok(())
    }

    pub fn remove_attributes(&mut self, id: NodeId) -> Result<()> {
        self.assert_modifiable(id)?;
        self.data_mut(id)?.attributes.clear();
        Ok(())
    }

    /// Detach a node from its parent; no-op when already detached
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.assert_modifiable(id)?;
        match self.data(id).map(|node| node.parent) {
            Some(Parent::Attached(parent)) => {
                self.assert_modifiable(parent)?;
                self.data_mut(parent)?.children.retain(|child| *child != id);
            }
            Some(Parent::Root) => {}
            Some(Parent::Detached) | None => return Ok(()),
        }
        self.data_mut(id)?.parent = Parent::Detached;
        trace!(node = id.index(), "removed node");
        Ok(())
    }

    /// Detach every child of a node
    pub fn remove_nodes(&mut self, id: NodeId) -> Result<()> {
        self.assert_modifiable(id)?;
        let children = std::mem::take(&mut self.data_mut(id)?.children);
        for child in children {
            self.data_mut(child)?.parent = Parent::Detached;
        }
        Ok(())
    }

    pub fn set_read_only(&mut self, id: NodeId, read_only: bool) -> Result<()> {
        self.data_mut(id)?.read_only = read_only;
        Ok(())
    }

    /// Mark a node and all of its descendants read-only
    pub fn freeze(&mut self, id: NodeId) -> Result<()> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = self.data_mut(current)?;
            node.read_only = true;
            pending.extend(node.children.iter().copied());
        }
        Ok(())
    }

    /// Find the named property of an item, creating and attaching it if
    /// absent
    pub fn property_node(&mut self, item: NodeId, name: &str) -> Result<NodeId> {
        if let Lookup::Found(id) = self.element(item, name) {
            return Ok(id);
        }
        self.assert_modifiable(item)?;
        let prop = self.create_property(name);
        self.add_node(item, prop)?;
        Ok(prop)
    }

    /// Replace the content of the named property, creating it if needed
    pub fn set_property(
        &mut self,
        item: NodeId,
        name: &str,
        content: impl Into<Content>,
    ) -> Result<NodeId> {
        let prop = self.property_node(item, name)?;
        self.set(prop, content)?;
        Ok(prop)
    }

    /// Deep copy of a subtree as a new standalone root
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let copies = self.copy_nodes(id)?;
        Ok(self.insert_copies(copies))
    }

    /// Deep copy of a subtree of another document as a new standalone root
    pub fn import(&mut self, source: &Document, id: NodeId) -> Result<NodeId> {
        let copies = source.copy_nodes(id)?;
        Ok(self.insert_copies(copies))
    }

    fn add_node(&mut self, id: NodeId, child: NodeId) -> Result<()> {
        let child = match self.data(child).map(|node| node.parent) {
            None => return Err(Error::invalid_operation("unknown node")),
            Some(Parent::Attached(parent)) if parent == id => return Ok(()),
            // a child of a removed subtree moves instead of being copied
            Some(Parent::Attached(parent)) if !self.exists(parent) => {
                self.check_not_ancestor(child, id)?;
                self.data_mut(parent)?.children.retain(|node| *node != child);
                child
            }
            Some(Parent::Attached(_)) => self.clone_subtree(child)?,
            Some(Parent::Root) | Some(Parent::Detached) => {
                self.check_not_ancestor(child, id)?;
                child
            }
        };

        let node = self.data_mut(id)?;
        node.content = Value::Null;
        node.children.push(child);
        self.data_mut(child)?.parent = Parent::Attached(id);
        self.sync_property_flags(id)
    }

    fn check_not_ancestor(&self, child: NodeId, id: NodeId) -> Result<()> {
        if child == id || self.is_ancestor(child, id) {
            return Err(Error::invalid_operation(
                "cannot add an element to itself or one of its descendants",
            ));
        }
        Ok(())
    }

    fn add_value(&mut self, id: NodeId, value: Value) -> Result<()> {
        if !value.is_null() {
            self.clear_content(id)?;
            self.data_mut(id)?.content = value;
        }
        self.sync_property_flags(id)
    }

    fn clear_content(&mut self, id: NodeId) -> Result<()> {
        let node = self.data_mut(id)?;
        node.content = Value::Null;
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.data_mut(child)?.parent = Parent::Detached;
        }
        Ok(())
    }

    /// Keep `is_null`, `condition` and `origDateRange` in line with the
    /// content of a property
    fn sync_property_flags(&mut self, id: NodeId) -> Result<()> {
        let node = self.data_mut(id)?;
        if node.kind != NodeKind::Property {
            return Ok(());
        }

        if node.content.is_null() && node.children.is_empty() {
            node.attributes
                .insert(AttributeName::IS_NULL.to_string(), "1".to_string());
            return Ok(());
        }
        node.attributes.shift_remove(AttributeName::IS_NULL);

        match &node.content {
            Value::DynamicRange(range) => {
                if let Some(condition) = range.condition().as_aml() {
                    let serialized = range.serialize();
                    node.attributes
                        .insert(AttributeName::CONDITION.to_string(), condition.to_string());
                    node.attributes
                        .insert(AttributeName::ORIG_DATE_RANGE.to_string(), serialized);
                }
            }
            Value::StaticRange(range) => {
                if let Some(condition) = range.condition().as_aml() {
                    node.attributes
                        .insert(AttributeName::CONDITION.to_string(), condition.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Pre-order copy of a subtree with indexes of each copy's parent
    fn copy_nodes(&self, id: NodeId) -> Result<Vec<(NodeData, Option<usize>)>> {
        let mut copies = Vec::new();
        let mut pending = vec![(id, None)];
        while let Some((current, parent)) = pending.pop() {
            let node = self
                .data(current)
                .ok_or_else(|| Error::invalid_operation("unknown node"))?;
            let index = copies.len();
            copies.push((
                NodeData {
                    children: Vec::new(),
                    read_only: false,
                    from_data_store: false,
                    ..node.clone()
                },
                parent,
            ));
            pending.extend(node.children.iter().rev().map(|child| (*child, Some(index))));
        }
        Ok(copies)
    }

    fn insert_copies(&mut self, copies: Vec<(NodeData, Option<usize>)>) -> NodeId {
        let mut ids: Vec<NodeId> = Vec::with_capacity(copies.len());
        for (mut node, parent) in copies {
            let parent = parent.and_then(|index| ids.get(index).copied());
            node.parent = parent.map_or(Parent::Root, Parent::Attached);
            let id = self.push_node(node);
            if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
                parent.children.push(id);
            }
            ids.push(id);
        }
        ids.first().copied().unwrap_or(NodeId(0))
    }

    fn assert_modifiable(&self, id: NodeId) -> Result<()> {
        match self.data(id) {
            Some(node) if node.read_only => Err(Error::invalid_operation(format!(
                "cannot modify read-only element {}",
                node.name
            ))),
            Some(_) => Ok(()),
            None => Err(Error::invalid_operation("unknown node")),
        }
    }

    fn push_node(&mut self, node: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(super) fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| Error::invalid_operation("unknown node"))
    }
}

fn classify(name: &str, parent: Option<NodeKind>) -> NodeKind {
    if name == "Item" {
        NodeKind::Item
    } else if parent == Some(NodeKind::Item) && name != "Relationships" {
        NodeKind::Property
    } else {
        NodeKind::Element
    }
}
