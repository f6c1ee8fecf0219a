use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Page;
use super::dom::NodeId;
use super::handler::Value;

pub type Getter = Rc<dyn Fn(&Page, NodeId) -> Value>;
pub type Setter = Rc<dyn Fn(&mut Page, NodeId, Value)>;

/// A property slot, either on an element (own property) or on a prototype.
#[derive(Clone)]
pub enum PropertyDescriptor {
    Data(Value),
    Accessor { get: Getter, set: Option<Setter> },
}

impl PropertyDescriptor {
    /// Identity comparison: accessors are equal only if they share the same functions.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Accessor { get: g1, set: s1 }, Self::Accessor { get: g2, set: s2 }) => {
                Rc::ptr_eq(g1, g2)
                    && match (s1, s2) {
                        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Accessor { set, .. } => f
                .debug_struct("Accessor")
                .field("writable", &set.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// Inline handler attributes every HTML element exposes.
pub const GLOBAL_EVENT_HANDLERS: &[&str] = &[
    "abort",
    "animationend",
    "animationiteration",
    "animationstart",
    "blur",
    "change",
    "click",
    "contextmenu",
    "dblclick",
    "drag",
    "dragend",
    "dragenter",
    "dragleave",
    "dragover",
    "dragstart",
    "drop",
    "error",
    "focus",
    "input",
    "keydown",
    "keypress",
    "keyup",
    "load",
    "mousedown",
    "mousemove",
    "mouseout",
    "mouseover",
    "mouseup",
    "reset",
    "resize",
    "scroll",
    "submit",
    "touchcancel",
    "touchend",
    "touchmove",
    "touchstart",
    "transitionend",
    "wheel",
];

/// Window-reflecting handlers only `<body>` exposes.
pub const WINDOW_EVENT_HANDLERS: &[&str] = &[
    "beforeunload",
    "hashchange",
    "pagehide",
    "pageshow",
    "popstate",
    "unload",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrototypeId(usize);

#[derive(Debug)]
struct Prototype {
    name: String,
    parent: Option<PrototypeId>,
    properties: Vec<(String, PropertyDescriptor)>,
}

/// `EventTarget -> Node -> Element -> HTMLElement -> HTML*Element` chains.
#[derive(Debug)]
pub struct PrototypeRegistry {
    prototypes: Vec<Prototype>,
    by_tag: HashMap<String, PrototypeId>,
    html_element: PrototypeId,
}

impl PrototypeRegistry {
    pub(crate) fn new() -> Self {
        let mut registry = Self {
            prototypes: Vec::new(),
            by_tag: HashMap::new(),
            html_element: PrototypeId(0),
        };
        let event_target = registry.push("EventTarget", None, Vec::new());
        let node = registry.push("Node", Some(event_target), Vec::new());
        let element = registry.push("Element", Some(node), Vec::new());
        registry.html_element = registry.push(
            "HTMLElement",
            Some(element),
            inline_handler_properties(GLOBAL_EVENT_HANDLERS),
        );
        registry
    }

    fn push(
        &mut self,
        name: &str,
        parent: Option<PrototypeId>,
        properties: Vec<(String, PropertyDescriptor)>,
    ) -> PrototypeId {
        let id = PrototypeId(self.prototypes.len());
        self.prototypes.push(Prototype {
            name: name.to_string(),
            parent,
            properties,
        });
        id
    }

    pub(crate) fn for_tag(&mut self, tag: &str) -> PrototypeId {
        if let Some(id) = self.by_tag.get(tag) {
            return *id;
        }
        let properties = match tag {
            "body" => inline_handler_properties(WINDOW_EVENT_HANDLERS),
            "form" => inline_handler_properties(&["formdata"]),
            _ => Vec::new(),
        };
        let id = self.push(&interface_name(tag), Some(self.html_element), properties);
        self.by_tag.insert(tag.to_string(), id);
        id
    }

    pub fn name(&self, id: PrototypeId) -> &str {
        self.prototypes
            .get(id.0)
            .map_or("", |prototype| prototype.name.as_str())
    }

    pub fn parent(&self, id: PrototypeId) -> Option<PrototypeId> {
        self.prototypes.get(id.0)?.parent
    }

    /// `id` followed by each of its ancestors.
    pub fn chain(&self, id: PrototypeId) -> Vec<PrototypeId> {
        let mut out = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.parent(current);
        }
        out
    }

    pub fn own_properties(&self, id: PrototypeId) -> &[(String, PropertyDescriptor)] {
        self.prototypes
            .get(id.0)
            .map_or(&[], |prototype| prototype.properties.as_slice())
    }

    pub fn lookup(&self, id: PrototypeId, name: &str) -> Option<&PropertyDescriptor> {
        self.chain(id).into_iter().find_map(|proto| {
            self.own_properties(proto)
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, descriptor)| descriptor)
        })
    }
}

fn interface_name(tag: &str) -> String {
    let known = match tag {
        "a" => "Anchor",
        "p" => "Paragraph",
        "ul" => "UList",
        "ol" => "OList",
        "li" => "LI",
        "img" => "Image",
        "tr" => "TableRow",
        "td" | "th" => "TableCell",
        "textarea" => "TextArea",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "Heading",
        _ => "",
    };
    if !known.is_empty() {
        return format!("HTML{known}Element");
    }
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => format!("HTML{}{}Element", first.to_ascii_uppercase(), chars.as_str()),
        None => "HTMLUnknownElement".to_string(),
    }
}

fn inline_handler_properties(event_types: &[&str]) -> Vec<(String, PropertyDescriptor)> {
    event_types
        .iter()
        .map(|event_type| inline_handler_property(event_type))
        .collect()
}

fn inline_handler_property(event_type: &str) -> (String, PropertyDescriptor) {
    let slot = event_type.to_string();
    let get_slot = slot.clone();
    let get: Getter = Rc::new(move |page: &Page, node: NodeId| {
        page.dom()
            .inline_handler(node, &get_slot)
            .map_or(Value::Null, Value::Handler)
    });
    let set: Setter = Rc::new(move |page: &mut Page, node: NodeId, value: Value| {
        // Non-callable assignments clear the slot.
        let handler = match value {
            Value::Handler(handler) => Some(handler),
            _ => None,
        };
        if let Err(err) = page.dom_mut().set_inline_handler(node, &slot, handler) {
            log::debug!(target: crate::LOG_TARGET, "inline handler on{slot} not stored: {err}");
        }
    });
    (
        format!("on{event_type}"),
        PropertyDescriptor::Accessor {
            get,
            set: Some(set),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_prototypes_share_html_element_handlers() {
        let mut registry = PrototypeRegistry::new();
        let button = registry.for_tag("button");
        let div = registry.for_tag("div");
        assert_eq!(registry.name(button), "HTMLButtonElement");
        assert_eq!(registry.for_tag("button"), button);

        let chain: Vec<_> = registry
            .chain(button)
            .into_iter()
            .map(|id| registry.name(id).to_string())
            .collect();
        assert_eq!(
            chain,
            vec!["HTMLButtonElement", "HTMLElement", "Element", "Node", "EventTarget"]
        );

        let from_button = registry.lookup(button, "onclick");
        let from_div = registry.lookup(div, "onclick");
        assert!(matches!((from_button, from_div), (Some(a), Some(b)) if a.same_as(b)));
    }

    #[test]
    fn body_adds_window_handlers() {
        let mut registry = PrototypeRegistry::new();
        let body = registry.for_tag("body");
        let div = registry.for_tag("div");
        assert!(registry.lookup(body, "onhashchange").is_some());
        assert!(registry.lookup(div, "onhashchange").is_none());
        let form = registry.for_tag("form");
        assert!(registry.lookup(form, "onformdata").is_some());
        assert!(registry.lookup(form, "onsubmit").is_some());
        let anchor = registry.for_tag("a");
        assert_eq!(registry.name(anchor), "HTMLAnchorElement");
    }
}
