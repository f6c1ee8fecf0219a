use std::collections::HashMap;
use std::fmt;

use super::handler::Handler;
use super::properties::{PropertyDescriptor, PrototypeId, PrototypeRegistry};
use crate::{Error, Result};

/// Generational handle to a DOM node.
///
/// A handle never keeps its node alive: once the node is disposed the slot is recycled with a
/// new generation and every old handle to it reads as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.index)?;
        if self.generation > 0 {
            write!(f, "v{}", self.generation)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) prototype: PrototypeId,
    pub(crate) own_properties: Vec<(String, PropertyDescriptor)>,
    pub(crate) inline_handlers: HashMap<String, Handler>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<u32>,
    document: NodeId,
    prototypes: PrototypeRegistry,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let mut dom = Self {
            slots: Vec::new(),
            free: Vec::new(),
            document: NodeId {
                index: 0,
                generation: 0,
            },
            prototypes: PrototypeRegistry::new(),
        };
        dom.document = dom.alloc(Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        });
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| Error::StaleNode(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| Error::StaleNode(id.to_string()))
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id).ok()?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn require_element(&self, id: NodeId) -> Result<&Element> {
        match &self.node(id)?.node_type {
            NodeType::Element(element) => Ok(element),
            _ => Err(Error::NotAnElement(id.to_string())),
        }
    }

    pub(crate) fn require_element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match &mut self.node_mut(id)?.node_type {
            NodeType::Element(element) => Ok(element),
            _ => Err(Error::NotAnElement(id.to_string())),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Inclusive containment, like `Node.contains`. Stale handles are never contained.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_alive(ancestor) || !self.is_alive(node) {
            return false;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.document, node)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        self.element(id)
            .map(|element| element.attrs.as_slice())
            .unwrap_or(&[])
    }

    /// The `id` attribute, if present and non-empty.
    pub fn id_attr(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "id").filter(|value| !value.is_empty())
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        class_tokens(self.attr(id, "class"))
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(text) => out.push_str(text),
            _ => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Elements of the subtree rooted at `root`, in document order, `root` included.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Ok(node) = self.node(id) else {
                continue;
            };
            if matches!(node.node_type, NodeType::Element(_)) {
                out.push(id);
            }
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.parent(current);
        }
        out
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.document).into_iter().next()
    }

    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .into_iter()
            .find(|child| self.tag_name(*child) == Some("body"))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.document)
            .into_iter()
            .find(|node| self.attr(*node, "id") == Some(id))
    }

    /// The nearest inclusive ancestor element with the given tag.
    pub fn closest_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if self
                .tag_name(current)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn computed_style(&self, id: NodeId) -> Result<ComputedStyle> {
        let element = self.require_element(id)?;
        let decls = parse_style_declarations(self.attr(id, "style"));
        let declared = |name: &str| {
            decls
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_ascii_lowercase())
        };

        let hidden_by_default = self.has_attr(id, "hidden")
            || (element.tag_name == "dialog" && !self.has_attr(id, "open"))
            || matches!(element.tag_name.as_str(), "script" | "style" | "template");
        let display = declared("display").unwrap_or_else(|| {
            if hidden_by_default {
                "none".to_string()
            } else {
                default_display(&element.tag_name).to_string()
            }
        });

        Ok(ComputedStyle {
            display,
            visibility: declared("visibility").unwrap_or_else(|| "visible".to_string()),
            position: declared("position").unwrap_or_else(|| "static".to_string()),
            z_index: declared("z-index").unwrap_or_else(|| "auto".to_string()),
        })
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        match &node.node_type {
            NodeType::Document => {
                for child in &node.children {
                    self.serialize_into(*child, out);
                }
            }
            NodeType::Text(text) => out.push_str(text),
            NodeType::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&value.replace('"', "&quot;"));
                    out.push('"');
                }
                out.push('>');
                if super::html::is_void_tag(&element.tag_name) {
                    return;
                }
                for child in &node.children {
                    self.serialize_into(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }

    pub fn prototypes(&self) -> &PrototypeRegistry {
        &self.prototypes
    }

    pub fn prototype_of(&self, id: NodeId) -> Result<PrototypeId> {
        Ok(self.require_element(id)?.prototype)
    }

    pub(crate) fn create_element(&mut self, tag: &str) -> NodeId {
        let tag_name = tag.to_ascii_lowercase();
        let prototype = self.prototypes.for_tag(&tag_name);
        self.alloc(Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Element(Element {
                tag_name,
                attrs: Vec::new(),
                prototype,
                own_properties: Vec::new(),
                inline_handlers: HashMap::new(),
            }),
        })
    }

    pub(crate) fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Text(text.to_string()),
        })
    }

    /// Moves `child` under `parent`. Returns the parent it was detached from, if any.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<Option<NodeId>> {
        self.insert_before(parent, child, None)
    }

    pub(crate) fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        if matches!(self.node(parent)?.node_type, NodeType::Text(_)) {
            return Err(Error::HierarchyRequest(format!(
                "{parent} cannot have children"
            )));
        }
        if matches!(self.node(child)?.node_type, NodeType::Document) {
            return Err(Error::HierarchyRequest(
                "the document cannot be inserted".into(),
            ));
        }
        if self.contains(child, parent) {
            return Err(Error::HierarchyRequest(format!(
                "{child} is an inclusive ancestor of {parent}"
            )));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(Error::HierarchyRequest(format!(
                    "{reference} is not a child of {parent}"
                )));
            }
        }

        let old_parent = self.detach(child)?;
        let node = self.node_mut(parent)?;
        let position = reference
            .and_then(|reference| node.children.iter().position(|c| *c == reference))
            .unwrap_or(node.children.len());
        node.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(old_parent)
    }

    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(Error::HierarchyRequest(format!(
                "{child} is not a child of {parent}"
            )));
        }
        self.detach(child)?;
        Ok(())
    }

    fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>> {
        let old_parent = self.node(child)?.parent;
        if let Some(old_parent) = old_parent {
            self.node_mut(old_parent)?.children.retain(|c| *c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(old_parent)
    }

    /// Sets an attribute and returns its previous value.
    pub(crate) fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<Option<String>> {
        let element = self.require_element_mut(id)?;
        let name = name.to_ascii_lowercase();
        if let Some(entry) = element.attrs.iter_mut().find(|(key, _)| *key == name) {
            return Ok(Some(std::mem::replace(&mut entry.1, value.to_string())));
        }
        element.attrs.push((name, value.to_string()));
        Ok(None)
    }

    pub(crate) fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        let element = self.require_element_mut(id)?;
        let name = name.to_ascii_lowercase();
        let Some(position) = element.attrs.iter().position(|(key, _)| *key == name) else {
            return Ok(None);
        };
        Ok(Some(element.attrs.remove(position).1))
    }

    /// Frees a detached subtree. Every handle into it becomes stale.
    pub(crate) fn dispose(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        if id == self.document {
            return Err(Error::HierarchyRequest("the document cannot be disposed".into()));
        }
        if self.node(id)?.parent.is_some() {
            return Err(Error::HierarchyRequest(format!(
                "{id} must be detached before it is disposed"
            )));
        }
        let mut freed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            stack.extend(node.children);
            freed.push(current);
        }
        Ok(freed)
    }

    pub(crate) fn own_property(&self, id: NodeId, name: &str) -> Option<&PropertyDescriptor> {
        self.element(id)?
            .own_properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub(crate) fn define_own_property(
        &mut self,
        id: NodeId,
        name: &str,
        descriptor: PropertyDescriptor,
    ) -> Result<()> {
        let element = self.require_element_mut(id)?;
        if let Some(entry) = element.own_properties.iter_mut().find(|(key, _)| key == name) {
            entry.1 = descriptor;
        } else {
            element.own_properties.push((name.to_string(), descriptor));
        }
        Ok(())
    }

    pub(crate) fn delete_own_property(&mut self, id: NodeId, name: &str) -> Result<bool> {
        let element = self.require_element_mut(id)?;
        let before = element.own_properties.len();
        element.own_properties.retain(|(key, _)| key != name);
        Ok(element.own_properties.len() != before)
    }

    pub(crate) fn inline_handler(&self, id: NodeId, event_type: &str) -> Option<Handler> {
        self.element(id)?.inline_handlers.get(event_type).cloned()
    }

    pub(crate) fn set_inline_handler(
        &mut self,
        id: NodeId,
        event_type: &str,
        handler: Option<Handler>,
    ) -> Result<()> {
        let element = self.require_element_mut(id)?;
        match handler {
            Some(handler) => {
                element.inline_handlers.insert(event_type.to_string(), handler);
            }
            None => {
                element.inline_handlers.remove(event_type);
            }
        }
        Ok(())
    }
}

/// The handful of resolved style values the popup heuristics read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub position: String,
    pub z_index: String,
}

impl ComputedStyle {
    pub fn is_visible(&self) -> bool {
        self.display != "none" && self.visibility != "hidden"
    }

    pub fn is_positioned_overlay(&self) -> bool {
        matches!(self.position.as_str(), "fixed" | "absolute")
    }

    /// Leading integer of `z-index`, `None` for `auto` and garbage.
    pub fn z_index_value(&self) -> Option<i64> {
        let value = self.z_index.trim();
        let digits_start = usize::from(value.starts_with(['-', '+']));
        let digits_end = value[digits_start..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(value.len(), |end| end + digits_start);
        if digits_end == digits_start {
            return None;
        }
        value[..digits_end].parse().ok()
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "a" | "span" | "button" | "img" | "input" | "label" | "select" | "textarea" | "b"
        | "i" | "em" | "strong" | "code" => "inline",
        _ => "block",
    }
}

pub(crate) fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| {
            value
                .split_whitespace()
                .filter(|token| !token.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_style_declarations(style_attr: Option<&str>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Some(style_attr) = style_attr else {
        return out;
    };

    for decl in style_attr.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();
        if let Some(pos) = out.iter().position(|(existing, _)| existing == &name) {
            out[pos].1 = value;
        } else {
            out.push((name, value));
        }
    }

    out
}
