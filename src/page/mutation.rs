use std::fmt;
use std::rc::Rc;

use super::Page;
use super::dom::{Dom, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub attribute_filter: Option<Vec<String>>,
    pub subtree: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            Self::ChildList { target, .. } | Self::Attributes { target, .. } => *target,
        }
    }
}

pub type MutationCallback = Rc<dyn Fn(&mut Page, Vec<MutationRecord>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    target: NodeId,
    init: MutationObserverInit,
    callback: MutationCallback,
    pending: Vec<MutationRecord>,
}

impl Observer {
    fn watches(&self, dom: &Dom, node: NodeId) -> bool {
        self.target == node || (self.init.subtree && dom.contains(self.target, node))
    }

    fn wants_attribute(&self, name: &str) -> bool {
        self.init.attributes
            && self
                .init
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|allowed| allowed.eq_ignore_ascii_case(name)))
    }
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Vec<Observer>,
    next_id: u64,
}

impl ObserverRegistry {
    pub(crate) fn observe(
        &mut self,
        target: NodeId,
        init: MutationObserverInit,
        callback: MutationCallback,
    ) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.observers.push(Observer {
            id,
            target,
            init,
            callback,
            pending: Vec::new(),
        });
        id
    }

    /// Drops the observer and any records it had not been handed yet.
    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|observer| observer.id != id);
        self.observers.len() != before
    }

    pub(crate) fn is_observing(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|observer| observer.id == id)
    }

    pub(crate) fn queue_child_list(
        &mut self,
        dom: &Dom,
        parent: NodeId,
        added: &[NodeId],
        removed: &[NodeId],
    ) {
        for observer in &mut self.observers {
            if observer.init.child_list && observer.watches(dom, parent) {
                observer.pending.push(MutationRecord::ChildList {
                    target: parent,
                    added: added.to_vec(),
                    removed: removed.to_vec(),
                });
            }
        }
    }

    pub(crate) fn queue_attribute(
        &mut self,
        dom: &Dom,
        node: NodeId,
        name: &str,
        old_value: Option<&str>,
    ) {
        for observer in &mut self.observers {
            if observer.wants_attribute(name) && observer.watches(dom, node) {
                observer.pending.push(MutationRecord::Attributes {
                    target: node,
                    name: name.to_string(),
                    old_value: old_value.map(str::to_string),
                });
            }
        }
    }

    pub(crate) fn take_deliveries(&mut self) -> Vec<(MutationCallback, Vec<MutationRecord>)> {
        self.observers
            .iter_mut()
            .filter(|observer| !observer.pending.is_empty())
            .map(|observer| {
                (
                    Rc::clone(&observer.callback),
                    std::mem::take(&mut observer.pending),
                )
            })
            .collect()
    }

    pub(crate) fn retain_targets(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.observers.retain(|observer| keep(observer.target));
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}
