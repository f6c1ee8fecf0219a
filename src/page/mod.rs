//! Deterministic single-threaded page host.
//!
//! [`Page`] owns the DOM arena and everything a browser tab would provide to injected
//! instrumentation: listener registration, capture/bubble dispatch, inline `on*` properties
//! backed by prototype descriptors, mutation observers, a virtual clock, globals and
//! `localStorage`.

mod dispatch;
mod dom;
mod event;
mod handler;
mod html;
mod listeners;
mod location;
mod mutation;
mod patch_state;
mod properties;
mod selector;
mod timers;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

pub use dom::{ComputedStyle, Dom, NodeId};
pub use event::{DispatchOutcome, Event, EventInit, EventPhase, EventTarget, NavigationDetail};
pub use handler::{CallArgs, CallResult, Function, Handler, HandlerResult, ScriptError, SourceLocation, Value};
pub use listeners::{AddListenerFn, ListenerOptions, RegistrationEntryPoints, RemoveListenerFn};
pub use mutation::{MutationCallback, MutationObserverInit, MutationRecord, ObserverId};
pub use properties::{
    GLOBAL_EVENT_HANDLERS, Getter, PropertyDescriptor, PrototypeId, PrototypeRegistry, Setter,
    WINDOW_EVENT_HANDLERS,
};
pub use timers::{PendingTimer, TimerId};

pub(crate) use handler::WeakHandler;
pub(crate) use selector::SelectorList;

use listeners::{Listener, ListenerStore};
use location::Location;
use mutation::ObserverRegistry;
use patch_state::PatchState;
use timers::TimerQueue;

use crate::{Error, LOG_TARGET, Result};

const DEFAULT_URL: &str = "https://page.test/index.html";
const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;
const DEFAULT_TIMER_STEP_LIMIT: usize = 10_000;
const MAX_MICROTASK_ROUNDS: usize = 1_000;
const OUTCOME_HISTORY: usize = 256;

pub struct Page {
    dom: Dom,
    listeners: ListenerStore,
    entry_points: RegistrationEntryPoints,
    patch_state: PatchState,
    observers: ObserverRegistry,
    timers: TimerQueue,
    now_ms: i64,
    timer_step_limit: usize,
    call_stack: Vec<Rc<SourceLocation>>,
    globals: BTreeMap<String, Value>,
    location: Location,
    navigations: Vec<String>,
    opened_windows: Vec<(String, String)>,
    local_storage: BTreeMap<String, String>,
    resources: HashMap<String, String>,
    uncaught_errors: Vec<ScriptError>,
    dispatch_depth: usize,
    next_event_serial: u64,
    outcomes: VecDeque<(u64, DispatchOutcome)>,
    in_checkpoint: bool,
    trace: bool,
    trace_logs: VecDeque<String>,
    trace_log_limit: usize,
}

impl Page {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut page = Self {
            dom: Dom::new(),
            listeners: ListenerStore::default(),
            entry_points: RegistrationEntryPoints::native(),
            patch_state: PatchState::default(),
            observers: ObserverRegistry::default(),
            timers: TimerQueue::default(),
            now_ms: 0,
            timer_step_limit: DEFAULT_TIMER_STEP_LIMIT,
            call_stack: Vec::new(),
            globals: BTreeMap::new(),
            location: Location::new(DEFAULT_URL),
            navigations: Vec::new(),
            opened_windows: Vec::new(),
            local_storage: BTreeMap::new(),
            resources: HashMap::new(),
            uncaught_errors: Vec::new(),
            dispatch_depth: 0,
            next_event_serial: 0,
            outcomes: VecDeque::new(),
            in_checkpoint: false,
            trace: false,
            trace_logs: VecDeque::new(),
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
        };
        page.ensure_document_structure();
        page
    }

    /// Parses `html` into a fresh document. Markup without an `<html>` root is placed inside
    /// `<body>`.
    pub fn from_html(html: &str) -> Result<Self> {
        let mut page = Self::new();
        let document = page.dom.document();
        let html_root = page.dom.document_element();
        if let Some(root) = html_root {
            page.dom.remove_child(document, root)?;
            page.dom.dispose(root)?;
        }
        html::parse_html_into(&mut page.dom, document, html)?;
        page.ensure_document_structure();
        Ok(page)
    }

    fn ensure_document_structure(&mut self) {
        let document = self.dom.document();
        let has_html_root = self
            .dom
            .document_element()
            .is_some_and(|root| self.dom.tag_name(root) == Some("html"));
        if !has_html_root {
            let loose = self.dom.children(document);
            let html = self.dom.create_element("html");
            let head = self.dom.create_element("head");
            let body = self.dom.create_element("body");
            let structure = [(document, html), (html, head), (html, body)];
            for (parent, child) in structure {
                if let Err(err) = self.dom.append_child(parent, child) {
                    log::debug!(target: LOG_TARGET, "document structure: {err}");
                }
            }
            for node in loose {
                if let Err(err) = self.dom.append_child(body, node) {
                    log::debug!(target: LOG_TARGET, "document structure: {err}");
                }
            }
            return;
        }
        if self.dom.body().is_none() {
            if let Some(html) = self.dom.document_element() {
                let body = self.dom.create_element("body");
                if let Err(err) = self.dom.append_child(html, body) {
                    log::debug!(target: LOG_TARGET, "document structure: {err}");
                }
            }
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub(crate) fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn document(&self) -> NodeId {
        self.dom.document()
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.dom.document_element()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.dom.body()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.dom.get_element_by_id(id)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(list.query_all(&self.dom, self.dom.document()))
    }

    /// First match for `selector`, or [`Error::SelectorNotFound`].
    pub fn select(&self, selector: &str) -> Result<NodeId> {
        self.query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        Ok(SelectorList::parse(selector)?.matches(&self.dom, node))
    }

    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        Ok(SelectorList::parse(selector)?.closest(&self.dom, node))
    }

    pub fn computed_style(&self, node: NodeId) -> Result<ComputedStyle> {
        self.dom.computed_style(node)
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        self.dom.outer_html(node)
    }

    // DOM mutation. Every structural change is reported to mutation observers.

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.dom.create_element(tag)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.dom.create_text(text)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        let old_parent = self.dom.insert_before(parent, child, reference)?;
        if let Some(old_parent) = old_parent {
            self.observers
                .queue_child_list(&self.dom, old_parent, &[], &[child]);
        }
        self.observers
            .queue_child_list(&self.dom, parent, &[child], &[]);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.dom.remove_child(parent, child)?;
        self.observers
            .queue_child_list(&self.dom, parent, &[], &[child]);
        Ok(())
    }

    /// Detaches `node` if needed, then frees its subtree together with any listeners and
    /// observers attached to it.
    pub fn dispose(&mut self, node: NodeId) -> Result<()> {
        if let Some(parent) = self.dom.parent(node) {
            self.remove_child(parent, node)?;
        }
        self.dom.dispose(node)?;
        let dom = &self.dom;
        self.listeners.retain_targets(|target| match target {
            EventTarget::Window => true,
            EventTarget::Node(node) => dom.is_alive(node),
        });
        self.observers.retain_targets(|target| dom.is_alive(target));
        Ok(())
    }

    /// Parses `html` and appends the nodes to `parent`, one mutation record per top-level node.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        let staging = self.dom.create_element("template");
        let created = html::parse_html_into(&mut self.dom, staging, html)?;
        for node in &created {
            self.append_child(parent, *node)?;
        }
        self.dom.dispose(staging)?;
        Ok(created)
    }

    /// Replaces all children of `node` with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.clear_children(node)?;
        if !text.is_empty() {
            let text_node = self.dom.create_text(text);
            self.append_child(node, text_node)?;
        }
        Ok(())
    }

    /// Removes and frees every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) -> Result<()> {
        for child in self.dom.node(node)?.children.clone() {
            self.dispose(child)?;
        }
        Ok(())
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let old_value = self.dom.set_attr(node, name, value)?;
        self.observers
            .queue_attribute(&self.dom, node, &name.to_ascii_lowercase(), old_value.as_deref());
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        if let Some(old_value) = self.dom.remove_attr(node, name)? {
            self.observers
                .queue_attribute(&self.dom, node, &name.to_ascii_lowercase(), Some(&old_value));
        }
        Ok(())
    }

    pub fn add_class(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        let mut classes = self.dom.class_list(node);
        if classes.iter().any(|c| c == class_name) {
            return Ok(());
        }
        classes.push(class_name.to_string());
        self.set_attribute(node, "class", &classes.join(" "))
    }

    pub fn remove_class(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        let classes = self.dom.class_list(node);
        if !classes.iter().any(|c| c == class_name) {
            return Ok(());
        }
        let kept: Vec<_> = classes.into_iter().filter(|c| c != class_name).collect();
        self.set_attribute(node, "class", &kept.join(" "))
    }

    /// Flips `class_name`; returns whether it is now present.
    pub fn toggle_class(&mut self, node: NodeId, class_name: &str) -> Result<bool> {
        if self.dom.has_class(node, class_name) {
            self.remove_class(node, class_name)?;
            Ok(false)
        } else {
            self.add_class(node, class_name)?;
            Ok(true)
        }
    }

    // Listener registration, routed through the installed entry points.

    pub fn add_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) {
        let add = Rc::clone(&self.entry_points.add);
        add(self, target.into(), event_type, handler, options);
    }

    pub fn remove_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) {
        let remove = Rc::clone(&self.entry_points.remove);
        remove(self, target.into(), event_type, handler, options);
    }

    pub fn entry_points(&self) -> RegistrationEntryPoints {
        self.entry_points.clone()
    }

    pub fn set_entry_points(&mut self, entry_points: RegistrationEntryPoints) {
        self.entry_points = entry_points;
    }

    /// The entry points installed before anything patched them. The first call captures the
    /// pair installed at that moment; every later call returns that same pair.
    pub fn original_entry_points(&mut self) -> RegistrationEntryPoints {
        let current = &self.entry_points;
        self.patch_state.entry_points(|| current.clone())
    }

    pub fn listener_count(&self, target: impl Into<EventTarget>, event_type: &str) -> usize {
        self.listeners.count(target.into(), event_type)
    }

    pub fn has_listener(
        &self,
        target: impl Into<EventTarget>,
        event_type: &str,
        handler: &Handler,
        capture: bool,
    ) -> bool {
        self.listeners
            .contains(target.into(), event_type, capture, handler)
    }

    pub(crate) fn register_listener(
        &mut self,
        target: EventTarget,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) {
        if let EventTarget::Node(node) = target {
            if !self.dom.is_alive(node) {
                log::debug!(target: LOG_TARGET, "ignoring {event_type} listener on stale {node}");
                return;
            }
        }
        let added = self.listeners.add(
            target,
            event_type,
            Listener {
                options,
                handler: handler.clone(),
            },
        );
        if added {
            self.trace_line(format!(
                "[listener] add {event_type} on {} capture={}",
                self.trace_target_label(target),
                options.capture
            ));
        }
    }

    pub(crate) fn unregister_listener(
        &mut self,
        target: EventTarget,
        event_type: &str,
        handler: &Handler,
        capture: bool,
    ) {
        if self.listeners.remove(target, event_type, capture, handler) {
            self.trace_line(format!(
                "[listener] remove {event_type} on {} capture={capture}",
                self.trace_target_label(target)
            ));
        }
    }

    // Properties.

    /// Own property first, then the prototype chain.
    pub fn property_descriptor(&self, node: NodeId, name: &str) -> Result<Option<PropertyDescriptor>> {
        let element = self.dom.require_element(node)?;
        if let Some(own) = self.dom.own_property(node, name) {
            return Ok(Some(own.clone()));
        }
        Ok(self
            .dom
            .prototypes()
            .lookup(element.prototype, name)
            .cloned())
    }

    pub fn own_property(&self, node: NodeId, name: &str) -> Option<PropertyDescriptor> {
        self.dom.own_property(node, name).cloned()
    }

    pub fn get_property(&self, node: NodeId, name: &str) -> Result<Value> {
        Ok(match self.property_descriptor(node, name)? {
            Some(PropertyDescriptor::Data(value)) => value,
            Some(PropertyDescriptor::Accessor { get, .. }) => get(self, node),
            None => Value::Undefined,
        })
    }

    /// Assigns through a setter when one is found; otherwise creates or overwrites an own data
    /// property.
    pub fn set_property(&mut self, node: NodeId, name: &str, value: Value) -> Result<()> {
        match self.property_descriptor(node, name)? {
            Some(PropertyDescriptor::Accessor { set: Some(set), .. }) => {
                set(self, node, value);
                Ok(())
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Ok(()),
            _ => self
                .dom
                .define_own_property(node, name, PropertyDescriptor::Data(value)),
        }
    }

    pub fn define_own_property(
        &mut self,
        node: NodeId,
        name: &str,
        descriptor: PropertyDescriptor,
    ) -> Result<()> {
        self.dom.define_own_property(node, name, descriptor)
    }

    pub fn delete_own_property(&mut self, node: NodeId, name: &str) -> Result<bool> {
        self.dom.delete_own_property(node, name)
    }

    pub fn prototype_of(&self, node: NodeId) -> Result<PrototypeId> {
        self.dom.prototype_of(node)
    }

    pub fn prototypes(&self) -> &PrototypeRegistry {
        self.dom.prototypes()
    }

    /// Descriptor `prop` resolved to on `prototype` the first time it was asked for, by name.
    pub fn original_descriptor(&mut self, prototype: PrototypeId, prop: &str) -> Option<PropertyDescriptor> {
        self.patch_state
            .descriptor(self.dom.prototypes(), prototype, prop)
    }

    // Mutation observers.

    pub fn observe(
        &mut self,
        target: NodeId,
        init: MutationObserverInit,
        callback: MutationCallback,
    ) -> Result<ObserverId> {
        self.dom.node(target)?;
        Ok(self.observers.observe(target, init, callback))
    }

    pub fn disconnect(&mut self, observer: ObserverId) -> bool {
        self.observers.disconnect(observer)
    }

    pub fn is_observing(&self, observer: ObserverId) -> bool {
        self.observers.is_observing(observer)
    }

    /// Delivers queued mutation records until none remain.
    pub fn flush_microtasks(&mut self) {
        self.perform_microtask_checkpoint();
    }

    fn perform_microtask_checkpoint(&mut self) {
        if self.in_checkpoint {
            return;
        }
        self.in_checkpoint = true;
        for _ in 0..MAX_MICROTASK_ROUNDS {
            let deliveries = self.observers.take_deliveries();
            if deliveries.is_empty() {
                break;
            }
            for (callback, records) in deliveries {
                self.trace_line(format!("[mutation] deliver {} record(s)", records.len()));
                callback(self, records);
            }
        }
        self.in_checkpoint = false;
    }

    // Virtual clock.

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn set_timeout<F>(&mut self, delay_ms: i64, callback: F) -> TimerId
    where
        F: FnOnce(&mut Page) + 'static,
    {
        let due_at = self.now_ms.saturating_add(delay_ms.max(0));
        let id = self.timers.schedule(due_at, Box::new(callback));
        self.trace_line(format!("[timer] schedule {id:?} due_at={due_at}"));
        id
    }

    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.timers.pending()
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Config(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.timer_step_limit = max_steps;
        Ok(())
    }

    /// Moves the clock forward, running every timer that falls due on the way. Returns the
    /// number of timers that ran.
    pub fn advance_time(&mut self, delta_ms: i64) -> usize {
        self.perform_microtask_checkpoint();
        let target = self.now_ms.saturating_add(delta_ms.max(0));
        let mut ran = 0;
        while let Some(task) = self.timers.pop_due(target) {
            self.now_ms = self.now_ms.max(task.due_at);
            self.trace_line(format!("[timer] run {:?} at {}", task.id, self.now_ms));
            (task.callback)(self);
            self.perform_microtask_checkpoint();
            ran += 1;
            if ran >= self.timer_step_limit {
                log::warn!(target: LOG_TARGET, "timer step limit {} reached", self.timer_step_limit);
                break;
            }
        }
        self.now_ms = self.now_ms.max(target);
        ran
    }

    // Call stack.

    pub(crate) fn with_frame<T>(
        &mut self,
        location: Rc<SourceLocation>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.call_stack.push(location);
        let out = f(self);
        self.call_stack.pop();
        out
    }

    /// Runs `f` as page script located at `location`; anything it triggers sees that frame on
    /// the stack.
    pub fn run_script<T>(&mut self, location: SourceLocation, f: impl FnOnce(&mut Self) -> T) -> T {
        let out = self.with_frame(Rc::new(location), f);
        if self.call_stack.is_empty() && self.dispatch_depth == 0 {
            self.perform_microtask_checkpoint();
        }
        out
    }

    /// V8-shaped `Error.stack` text for the current call stack, innermost frame first.
    pub fn capture_stack(&self) -> String {
        let mut out = String::from("Error");
        for frame in self.call_stack.iter().rev() {
            out.push('\n');
            out.push_str(&frame.frame_line());
        }
        out
    }

    // Globals.

    pub fn global(&self, path: &str) -> Option<Value> {
        self.globals.get(path).cloned()
    }

    pub fn has_global(&self, path: &str) -> bool {
        self.globals.contains_key(path)
    }

    pub fn set_global(&mut self, path: &str, value: impl Into<Value>) {
        self.globals.insert(path.to_string(), value.into());
    }

    pub fn remove_global(&mut self, path: &str) -> Option<Value> {
        self.globals.remove(path)
    }

    pub fn call_global(&mut self, path: &str, args: CallArgs) -> CallResult {
        match self.globals.get(path) {
            Some(Value::Function(function)) => {
                let function = function.clone();
                function.call(self, &args)
            }
            _ => Err(ScriptError::new(format!("TypeError: {path} is not a function"))),
        }
    }

    // Location and history.

    pub fn location_href(&self) -> &str {
        self.location.href()
    }

    pub fn location_hash(&self) -> &str {
        self.location.hash()
    }

    /// Replaces the current URL without firing any event.
    pub fn set_location(&mut self, href: &str) {
        self.location = Location::new(href);
    }

    pub fn resolve_url(&self, href: &str) -> String {
        self.location.resolve(href)
    }

    /// Changes the fragment and fires `hashchange` at the window if it differs.
    pub fn set_hash(&mut self, hash: &str) -> Result<()> {
        let old_url = self.location.href().to_string();
        let new_url = self.location.with_hash(hash);
        if old_url == new_url {
            return Ok(());
        }
        self.location = Location::new(&new_url);
        let detail = NavigationDetail {
            old_url: Some(old_url),
            new_url: Some(new_url),
            ..NavigationDetail::default()
        };
        self.dispatch_event_with(
            EventTarget::Window,
            "hashchange",
            EventInit::for_type("hashchange").with_navigation(detail),
        )?;
        Ok(())
    }

    pub fn pop_state(&mut self, has_state: bool) -> Result<DispatchOutcome> {
        let detail = NavigationDetail {
            new_url: Some(self.location.href().to_string()),
            has_state,
            ..NavigationDetail::default()
        };
        self.dispatch_event_with(
            EventTarget::Window,
            "popstate",
            EventInit::for_type("popstate").with_navigation(detail),
        )
    }

    pub fn show(&mut self, persisted: bool) -> Result<DispatchOutcome> {
        self.page_transition("pageshow", persisted)
    }

    pub fn hide(&mut self, persisted: bool) -> Result<DispatchOutcome> {
        self.page_transition("pagehide", persisted)
    }

    fn page_transition(&mut self, event_type: &str, persisted: bool) -> Result<DispatchOutcome> {
        let detail = NavigationDetail {
            persisted,
            ..NavigationDetail::default()
        };
        self.dispatch_event_with(
            EventTarget::Window,
            event_type,
            EventInit::for_type(event_type).with_navigation(detail),
        )
    }

    pub fn open_window(&mut self, url: &str, target: &str) {
        let url = self.location.resolve(url);
        self.trace_line(format!("[navigation] open {url} target={target}"));
        self.opened_windows.push((url, target.to_string()));
    }

    pub fn opened_windows(&self) -> &[(String, String)] {
        &self.opened_windows
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub(crate) fn record_navigation(&mut self, url: String) {
        self.trace_line(format!("[navigation] navigate {url}"));
        self.navigations.push(url);
    }

    // Storage and network.

    pub fn local_storage_get(&self, key: &str) -> Option<&str> {
        self.local_storage.get(key).map(String::as_str)
    }

    pub fn local_storage_set(&mut self, key: &str, value: &str) {
        self.local_storage.insert(key.to_string(), value.to_string());
    }

    pub fn local_storage_remove(&mut self, key: &str) -> Option<String> {
        self.local_storage.remove(key)
    }

    /// Makes `body` available to [`Page::fetch`] at `url` (resolved against the location).
    pub fn add_resource(&mut self, url: &str, body: &str) {
        let url = self.location.resolve(url);
        self.resources.insert(url, body.to_string());
    }

    /// Completes on a zero-delay timer with the resource body or a network error.
    pub fn fetch<F>(&mut self, url: &str, on_complete: F) -> TimerId
    where
        F: FnOnce(&mut Page, std::result::Result<String, ScriptError>) + 'static,
    {
        let url = self.location.resolve(url);
        let response = self
            .resources
            .get(&url)
            .cloned()
            .ok_or_else(|| ScriptError::new(format!("TypeError: Failed to fetch {url}")));
        self.set_timeout(0, move |page| on_complete(page, response))
    }

    // Errors and tracing.

    pub(crate) fn report_uncaught(&mut self, err: ScriptError) {
        log::debug!(target: LOG_TARGET, "{err}");
        self.trace_line(format!("[error] {err}"));
        self.uncaught_errors.push(err);
    }

    pub fn take_uncaught_errors(&mut self) -> Vec<ScriptError> {
        std::mem::take(&mut self.uncaught_errors)
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_logs.drain(..).collect()
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_log_limit = max_entries;
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.pop_front();
        }
        Ok(())
    }

    fn trace_line(&mut self, line: String) {
        if !self.trace {
            return;
        }
        log::trace!(target: LOG_TARGET, "{line}");
        if self.trace_logs.len() >= self.trace_log_limit {
            self.trace_logs.pop_front();
        }
        self.trace_logs.push_back(line);
    }

    fn trace_target_label(&self, target: EventTarget) -> String {
        match target {
            EventTarget::Window => "window".to_string(),
            EventTarget::Node(node) if node == self.dom.document() => "document".to_string(),
            EventTarget::Node(node) => match self.dom.tag_name(node) {
                Some(tag) => match self.dom.id_attr(node) {
                    Some(id) => format!("{tag}#{id}"),
                    None => tag.to_string(),
                },
                None => node.to_string(),
            },
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("location", &self.location.href())
            .field("now_ms", &self.now_ms)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}
