use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use super::Page;
use super::event::EventTarget;
use super::handler::Handler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
    // Instrumentation listeners keep observing events that were isolated to a subtree.
    #[serde(skip)]
    pub(crate) instrumentation: bool,
}

impl ListenerOptions {
    pub fn bubble() -> Self {
        Self::default()
    }

    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub(crate) fn instrumentation(mut self) -> Self {
        self.instrumentation = true;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) options: ListenerOptions,
    pub(crate) handler: Handler,
}

#[derive(Debug, Default)]
pub(crate) struct ListenerStore {
    map: HashMap<EventTarget, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    /// Adds a listener unless an identical (handler, capture) pair is already registered.
    pub(crate) fn add(&mut self, target: EventTarget, event: &str, listener: Listener) -> bool {
        let listeners = self
            .map
            .entry(target)
            .or_default()
            .entry(event.to_string())
            .or_default();
        if listeners.iter().any(|existing| {
            existing.options.capture == listener.options.capture
                && existing.handler.ptr_eq(&listener.handler)
        }) {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub(crate) fn remove(
        &mut self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: &Handler,
    ) -> bool {
        let Some(events) = self.map.get_mut(&target) else {
            return false;
        };
        let Some(listeners) = events.get_mut(event) else {
            return false;
        };

        let Some(pos) = listeners
            .iter()
            .position(|listener| listener.options.capture == capture && listener.handler.ptr_eq(handler))
        else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            events.remove(event);
        }
        if events.is_empty() {
            self.map.remove(&target);
        }
        true
    }

    pub(crate) fn contains(
        &self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: &Handler,
    ) -> bool {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .is_some_and(|listeners| {
                listeners
                    .iter()
                    .any(|listener| listener.options.capture == capture && listener.handler.ptr_eq(handler))
            })
    }

    pub(crate) fn get(&self, target: EventTarget, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.options.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, target: EventTarget, event: &str) -> usize {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map_or(0, Vec::len)
    }

    pub(crate) fn retain_targets(&mut self, mut keep: impl FnMut(EventTarget) -> bool) {
        self.map.retain(|target, _| keep(*target));
    }
}

pub type AddListenerFn = dyn Fn(&mut Page, EventTarget, &str, &Handler, ListenerOptions);
pub type RemoveListenerFn = dyn Fn(&mut Page, EventTarget, &str, &Handler, ListenerOptions);

/// The page-wide `addEventListener` / `removeEventListener` implementations.
///
/// Every registration made through [`Page::add_event_listener`] and
/// [`Page::remove_event_listener`] is routed through whichever pair is installed, which lets
/// instrumentation observe registrations and later put the originals back untouched.
#[derive(Clone)]
pub struct RegistrationEntryPoints {
    pub add: Rc<AddListenerFn>,
    pub remove: Rc<RemoveListenerFn>,
}

impl RegistrationEntryPoints {
    pub fn native() -> Self {
        Self {
            add: Rc::new(
                |page: &mut Page,
                 target: EventTarget,
                 event_type: &str,
                 handler: &Handler,
                 options: ListenerOptions| {
                    page.register_listener(target, event_type, handler, options);
                },
            ),
            remove: Rc::new(
                |page: &mut Page,
                 target: EventTarget,
                 event_type: &str,
                 handler: &Handler,
                 options: ListenerOptions| {
                    page.unregister_listener(target, event_type, handler, options.capture);
                },
            ),
        }
    }

    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.add, &other.add) && Rc::ptr_eq(&self.remove, &other.remove)
    }
}

impl fmt::Debug for RegistrationEntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationEntryPoints").finish_non_exhaustive()
    }
}
