//! Inline `on*` handler property patching.
//!
//! Patching shadows an element's prototype accessor with an own accessor. Handlers assigned
//! through it are wrapped before they reach the native slot; the raw handler is remembered so
//! reads and restoration see exactly what the page assigned.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::filter::{describe_node, is_tracker_element};
use super::{EventLogEntry, LogPhase, Shared, TrackerState, with_state};
use crate::catalog::SelectedEventTypes;
use crate::page::{
    Event, Getter, Handler, HandlerResult, NodeId, Page, PropertyDescriptor, PrototypeId, Setter,
    Value,
};
use crate::stack::tracker_location;
use crate::weak::NodeWeakMap;
use crate::{LOG_TARGET, Result};

#[derive(Debug, Default)]
pub(crate) struct InlineInterceptor {
    /// `on*` accessor names reachable from each prototype.
    handler_names: HashMap<PrototypeId, Vec<String>>,
    patched: NodeWeakMap<PatchedElement>,
}

#[derive(Debug, Default)]
struct PatchedElement {
    props: Vec<String>,
    /// Last raw value assigned per property.
    values: HashMap<String, Value>,
}

impl InlineInterceptor {
    fn handler_names(&mut self, page: &Page, prototype: PrototypeId) -> Vec<String> {
        self.handler_names
            .entry(prototype)
            .or_insert_with(|| {
                let registry = page.prototypes();
                let mut names: Vec<String> = Vec::new();
                for link in registry.chain(prototype) {
                    for (name, descriptor) in registry.own_properties(link) {
                        if name.starts_with("on")
                            && descriptor.is_accessor()
                            && !names.contains(name)
                        {
                            names.push(name.clone());
                        }
                    }
                }
                names
            })
            .clone()
    }

    fn remember(&mut self, page: &Page, node: NodeId, prop: &str, value: Value) {
        if let Some(patched) = self.patched.get_mut(page.dom(), node) {
            patched.values.insert(prop.to_string(), value);
        }
    }

    fn raw_value(&self, page: &Page, node: NodeId, prop: &str) -> Option<Value> {
        self.patched
            .get(page.dom(), node)
            .and_then(|patched| patched.values.get(prop).cloned())
    }

    /// Patches the selected `on*` properties of one element. Returns how many existing handlers
    /// were wrapped.
    fn patch_element(
        &mut self,
        shared: &Weak<Shared>,
        page: &mut Page,
        node: NodeId,
        selected: &SelectedEventTypes,
    ) -> Result<usize> {
        if self.patched.get(page.dom(), node).is_some() {
            return Ok(0);
        }
        let prototype = page.prototype_of(node)?;
        let mut element = PatchedElement::default();
        let mut wrapped = 0;
        for prop in self.handler_names(page, prototype) {
            if !selected.is_selected(&prop[2..]) {
                continue;
            }
            if page.own_property(node, &prop).is_some() {
                log::debug!(target: LOG_TARGET, "{node} already has an own {prop}, leaving it alone");
                continue;
            }
            let Some(original) = page.original_descriptor(prototype, &prop) else {
                continue;
            };
            let PropertyDescriptor::Accessor {
                get,
                set: Some(set),
            } = &original
            else {
                continue;
            };

            let current = get(page, node);
            page.define_own_property(node, &prop, accessor(shared, &prop, &original))?;
            if let Value::Handler(raw) = current {
                set(page, node, Value::Handler(wrap(shared, node, &prop, raw.clone())));
                element.values.insert(prop.clone(), Value::Handler(raw));
                wrapped += 1;
            }
            element.props.push(prop);
        }
        *self.patched.get_or_insert_with(node, PatchedElement::default) = element;
        Ok(wrapped)
    }
}

/// Patches `root` and every element below it, skipping the tracker's own UI. Returns how many
/// existing handlers were wrapped.
pub(crate) fn patch_subtree(
    shared: &Rc<Shared>,
    page: &mut Page,
    root: NodeId,
    selected: &SelectedEventTypes,
) -> usize {
    let output = shared
        .state
        .try_borrow()
        .ok()
        .and_then(|state| state.output());
    let mut nodes = vec![root];
    nodes.extend(page.dom().descendants(root));

    let weak = Rc::downgrade(shared);
    let Ok(mut interceptor) = shared.inline.try_borrow_mut() else {
        log::debug!(target: LOG_TARGET, "inline patching already in progress");
        return 0;
    };
    let mut wrapped = 0;
    for node in nodes {
        if !page.dom().is_element(node) || is_tracker_element(page, node, output) {
            continue;
        }
        match interceptor.patch_element(&weak, page, node, selected) {
            Ok(count) => wrapped += count,
            Err(err) => log::debug!(target: LOG_TARGET, "inline patching skipped {node}: {err}"),
        }
    }
    wrapped
}

/// Drops bookkeeping for patched elements that have been disposed since. Returns how many.
pub(crate) fn prune_disposed(shared: &Shared, page: &Page) -> usize {
    match shared.inline.try_borrow_mut() {
        Ok(mut interceptor) => interceptor.patched.prune(page.dom()),
        Err(_) => 0,
    }
}

/// Puts every patched property back. Elements disposed in the meantime are skipped. Returns how
/// many properties were restored.
pub(crate) fn restore_all(shared: &Shared, page: &mut Page) -> usize {
    let Ok(mut interceptor) = shared.inline.try_borrow_mut() else {
        log::debug!(target: LOG_TARGET, "inline restore skipped, interceptor busy");
        return 0;
    };
    let (live, stale) = interceptor.patched.drain_live(page.dom());
    drop(interceptor);

    for node in stale {
        log::debug!(target: LOG_TARGET, "{node} was disposed while patched, nothing to restore");
    }
    let mut restored = 0;
    for (node, mut element) in live {
        for prop in element.props {
            match page.delete_own_property(node, &prop) {
                Ok(_) => restored += 1,
                Err(err) => {
                    log::debug!(target: LOG_TARGET, "cannot restore {prop} on {node}: {err}");
                    continue;
                }
            }
            if let Some(value) = element.values.remove(&prop) {
                if let Err(err) = page.set_property(node, &prop, value) {
                    log::debug!(target: LOG_TARGET, "cannot reassign {prop} on {node}: {err}");
                }
            }
        }
    }
    restored
}

fn accessor(shared: &Weak<Shared>, prop: &str, original: &PropertyDescriptor) -> PropertyDescriptor {
    let get: Getter = {
        let weak = shared.clone();
        let prop = prop.to_string();
        let original = original.clone();
        Rc::new(move |page: &Page, node: NodeId| {
            let remembered = weak.upgrade().and_then(|shared| {
                let interceptor = shared.inline.try_borrow().ok()?;
                interceptor.raw_value(page, node, &prop)
            });
            match (remembered, &original) {
                (Some(value), _) => value,
                (None, PropertyDescriptor::Accessor { get, .. }) => match get(page, node) {
                    // The native slot holds our wrapper only while we remember the raw value.
                    Value::Handler(_) => Value::Null,
                    other => other,
                },
                (None, PropertyDescriptor::Data(_)) => Value::Null,
            }
        })
    };
    let set: Setter = {
        let weak = shared.clone();
        let prop = prop.to_string();
        let original = original.clone();
        Rc::new(move |page: &mut Page, node: NodeId, value: Value| {
            assign(&weak, &original, page, node, &prop, value)
        })
    };
    PropertyDescriptor::Accessor { get, set: Some(set) }
}

fn assign(
    shared: &Weak<Shared>,
    original: &PropertyDescriptor,
    page: &mut Page,
    node: NodeId,
    prop: &str,
    value: Value,
) {
    let PropertyDescriptor::Accessor {
        set: Some(native_set),
        ..
    } = original
    else {
        return;
    };
    let forwarded = match &value {
        Value::Handler(raw) => Value::Handler(wrap(shared, node, prop, raw.clone())),
        other => other.clone(),
    };
    native_set(page, node, forwarded);

    if let Some(strong) = shared.upgrade() {
        if let Ok(mut interceptor) = strong.inline.try_borrow_mut() {
            interceptor.remember(page, node, prop, value.clone());
        }
    }
    if value.as_handler().is_some() {
        with_state(shared, |state| {
            let descriptor = describe_node(page, node);
            state.info(page, format!("{prop} was set on {descriptor}"));
        });
    }
}

fn wrap(shared: &Weak<Shared>, node: NodeId, prop: &str, raw: Handler) -> Handler {
    let weak = shared.clone();
    let prop = prop.to_string();
    Handler::new(
        tracker_location("inlineProxy", 1520),
        move |page: &mut Page, event: &mut Event| run_inline(&weak, page, event, node, &prop, &raw),
    )
}

fn run_inline(
    shared: &Weak<Shared>,
    page: &mut Page,
    event: &mut Event,
    node: NodeId,
    prop: &str,
    raw: &Handler,
) -> HandlerResult {
    let key = format!("{node}#{prop}");
    if !event.enter_inline_chain(&key) {
        return raw.call(page, event);
    }
    let stopped_before = event.propagation_stopped();
    with_state(shared, |state| state.inline_fired(page, event, node, prop));

    let result = raw.call(page, event);
    if result.is_ok() {
        with_state(shared, |state| {
            state.inline_finished(page, event, prop, stopped_before)
        });
    }
    event.leave_inline_chain(&key);
    result
}

impl TrackerState {
    fn inline_fired(&mut self, page: &mut Page, event: &mut Event, node: NodeId, prop: &str) {
        let Some(root) = self.root() else {
            return;
        };
        if self.config.isolate_propagation {
            event.isolate_within(root);
        }
        let descriptor = describe_node(page, node);
        let stack = if self.config.inline_stack {
            self.stack(page)
        } else {
            None
        };
        let entry = EventLogEntry::message(
            LogPhase::Inline,
            format!("Inline handler {prop} fired on {descriptor}"),
            page.now_ms(),
        )
        .with_event_type(event.event_type())
        .with_target(descriptor)
        .with_stack(stack);
        self.log(page, entry);
    }

    fn inline_finished(&mut self, page: &mut Page, event: &Event, prop: &str, stopped_before: bool) {
        if self.session.is_none() {
            return;
        }
        if event.default_prevented() {
            self.info(page, format!("{prop} prevented the default action"));
        }
        if event.propagation_stopped() && !stopped_before {
            self.info(page, format!("{prop} stopped propagation"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SourceLocation;

    #[test]
    fn handler_names_walk_the_whole_chain_once() -> Result<()> {
        let page = Page::from_html("<form id='f'></form><div id='d'></div>")?;
        let mut interceptor = InlineInterceptor::default();
        let form = page.prototype_of(page.select("#f")?)?;
        let div = page.prototype_of(page.select("#d")?)?;

        let form_names = interceptor.handler_names(&page, form);
        assert!(form_names.iter().any(|name| name == "onclick"));
        assert!(form_names.iter().any(|name| name == "onformdata"));
        let div_names = interceptor.handler_names(&page, div);
        assert!(!div_names.iter().any(|name| name == "onformdata"));
        assert_eq!(interceptor.handler_names.len(), 2);
        Ok(())
    }

    #[test]
    fn disposed_elements_are_forgotten_by_the_next_mutation_batch() -> Result<()> {
        let mut page = Page::from_html(
            "<div id='x'><button id='b'>go</button><p>text</p></div><div id='out'></div>",
        )?;
        let root = page.select("#x")?;
        let button = page.select("#b")?;
        let tracker = crate::EventTracker::new(page.select("#out")?)?;
        tracker.set_selected_event_types(&mut page, SelectedEventTypes::only(["click"]));
        tracker.start_tracking(&mut page, root);
        let patched = |tracker: &crate::EventTracker| tracker.shared.inline.borrow().patched.len();
        assert_eq!(patched(&tracker), 3);

        page.dispose(button)?;
        page.flush_microtasks();
        assert_eq!(patched(&tracker), 3);
        page.advance_time(60);
        assert_eq!(patched(&tracker), 2);
        Ok(())
    }

    #[test]
    fn raw_values_are_only_remembered_for_patched_elements() -> Result<()> {
        let page = Page::from_html("<p id='p'></p>")?;
        let node = page.select("#p")?;
        let mut interceptor = InlineInterceptor::default();
        let handler = Handler::new(SourceLocation::anonymous("app.js", 1, 1), |_, _| Ok(()));
        interceptor.remember(&page, node, "onclick", Value::Handler(handler.clone()));
        assert!(interceptor.raw_value(&page, node, "onclick").is_none());

        interceptor.patched.get_or_insert_with(node, PatchedElement::default);
        interceptor.remember(&page, node, "onclick", Value::Handler(handler.clone()));
        assert_eq!(
            interceptor.raw_value(&page, node, "onclick"),
            Some(Value::Handler(handler))
        );
        Ok(())
    }
}
