use std::collections::HashSet;

use super::dom::NodeId;

/// Something listeners can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

impl EventTarget {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Self::Window => None,
            Self::Node(node) => Some(node),
        }
    }
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// Extra data carried by history and page lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationDetail {
    pub old_url: Option<String>,
    pub new_url: Option<String>,
    pub has_state: bool,
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub navigation: Option<NavigationDetail>,
}

impl EventInit {
    /// Browser defaults for a native event of this type.
    pub fn for_type(event_type: &str) -> Self {
        let bubbles = !matches!(
            event_type,
            "focus"
                | "blur"
                | "load"
                | "unload"
                | "scroll"
                | "resize"
                | "mouseenter"
                | "mouseleave"
                | "pageshow"
                | "pagehide"
                | "hashchange"
                | "popstate"
                | "error"
                | "abort"
        );
        let cancelable = matches!(
            event_type,
            "click"
                | "dblclick"
                | "mousedown"
                | "mouseup"
                | "mouseover"
                | "mouseout"
                | "mousemove"
                | "contextmenu"
                | "wheel"
                | "keydown"
                | "keypress"
                | "keyup"
                | "submit"
                | "reset"
                | "touchstart"
                | "touchmove"
                | "touchend"
                | "dragstart"
                | "drag"
                | "dragenter"
                | "dragover"
                | "drop"
                | "beforeunload"
        );
        Self {
            bubbles,
            cancelable,
            navigation: None,
        }
    }

    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn with_navigation(mut self, detail: NavigationDetail) -> Self {
        self.navigation = Some(detail);
        self
    }
}

/// A native event while it is being dispatched.
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) event_type: String,
    pub(crate) target: EventTarget,
    pub(crate) current_target: EventTarget,
    pub(crate) phase: EventPhase,
    pub(crate) bubbles: bool,
    pub(crate) cancelable: bool,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
    pub(crate) immediate_propagation_stopped: bool,
    pub(crate) in_passive_listener: bool,
    pub(crate) path: Vec<EventTarget>,
    pub(crate) time_stamp: i64,
    pub(crate) serial: u64,
    pub(crate) navigation: Option<NavigationDetail>,
    // Subtree whose listeners still observe the event once it has been isolated.
    pub(crate) isolation_scope: Option<NodeId>,
    pub(crate) inline_chain: HashSet<String>,
}

impl Event {
    pub(crate) fn new(
        event_type: &str,
        target: EventTarget,
        init: EventInit,
        path: Vec<EventTarget>,
        time_stamp: i64,
        serial: u64,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            phase: EventPhase::None,
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            in_passive_listener: false,
            path,
            time_stamp,
            serial,
            navigation: init.navigation,
            isolation_scope: None,
            inline_chain: HashSet::new(),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn target_node(&self) -> Option<NodeId> {
        self.target.node()
    }

    pub fn current_target(&self) -> EventTarget {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether propagation was stopped. Isolation applied by the tracker is not propagation
    /// stopping and is not reported here.
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn time_stamp(&self) -> i64 {
        self.time_stamp
    }

    /// Window first, target last.
    pub fn composed_path(&self) -> &[EventTarget] {
        &self.path
    }

    pub fn navigation(&self) -> Option<&NavigationDetail> {
        self.navigation.as_ref()
    }

    pub fn is_isolated(&self) -> bool {
        self.isolation_scope.is_some()
    }

    pub fn prevent_default(&mut self) {
        // Ignored inside passive listeners.
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.stop_propagation();
        self.immediate_propagation_stopped = true;
    }

    /// From now on only listeners inside `scope` (and instrumentation listeners) see the event.
    pub(crate) fn isolate_within(&mut self, scope: NodeId) {
        self.isolation_scope.get_or_insert(scope);
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    /// Marks an inline handler as running for this event. False if it already was.
    pub(crate) fn enter_inline_chain(&mut self, key: &str) -> bool {
        self.inline_chain.insert(key.to_string())
    }

    pub(crate) fn leave_inline_chain(&mut self, key: &str) {
        self.inline_chain.remove(key);
    }
}

/// Result of a completed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl From<&Event> for DispatchOutcome {
    fn from(event: &Event) -> Self {
        Self {
            default_prevented: event.default_prevented,
            propagation_stopped: event.propagation_stopped,
        }
    }
}
