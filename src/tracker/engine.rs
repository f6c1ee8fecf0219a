//! Document and window listeners installed for a session.

use std::rc::Weak;

use super::filter::describe_target;
use super::{EventLogEntry, LogPhase, Shared, TrackerState, with_state};
use crate::catalog::{NAVIGATION_EVENT_TYPES, SelectedEventTypes};
use crate::page::{Event, EventTarget, Handler, ListenerOptions, Page};
use crate::stack::tracker_location;

type StateCallback = fn(&mut TrackerState, &mut Page, &mut Event);

/// The tracker's own listeners. Built once per tracker so that start and stop always add and
/// remove the same handler identities.
pub(crate) struct TrackerHandlers {
    pub(super) capture: Handler,
    pub(super) bubble: Handler,
    pub(super) click: Handler,
    pub(super) submit: Handler,
    pub(super) mousemove: Handler,
    pub(super) navigation: Handler,
    pub(super) bootstrap_modal: Handler,
}

impl TrackerHandlers {
    pub(super) fn new(shared: &Weak<Shared>) -> Self {
        Self {
            capture: handler(shared, "captureHandler", 431, |state, page, event| {
                state.on_dom_event(page, event, LogPhase::Capture)
            }),
            bubble: handler(shared, "bubbleHandler", 446, |state, page, event| {
                state.on_dom_event(page, event, LogPhase::Bubble)
            }),
            click: handler(shared, "handleClickWithDetails", 612, TrackerState::on_click),
            submit: handler(shared, "handleFormSubmit", 764, TrackerState::on_submit),
            mousemove: handler(shared, "handleMouseMove", 801, TrackerState::on_mousemove),
            navigation: handler(shared, "handleNavigation", 823, TrackerState::on_navigation),
            bootstrap_modal: handler(
                shared,
                "bootstrapModalHandler",
                1742,
                TrackerState::on_bootstrap_modal,
            ),
        }
    }
}

fn handler(shared: &Weak<Shared>, method: &str, line: u32, callback: StateCallback) -> Handler {
    let weak = shared.clone();
    Handler::new(
        tracker_location(method, line),
        move |page: &mut Page, event: &mut Event| {
            with_state(&weak, |state| callback(state, page, event));
            Ok(())
        },
    )
}

impl TrackerState {
    pub(super) fn install_listeners(&mut self, page: &mut Page, selected: &SelectedEventTypes) {
        let capture = ListenerOptions::capture().instrumentation();
        let bubble = ListenerOptions::bubble().instrumentation();
        let document = EventTarget::Node(page.document());

        for event_type in selected.active_types() {
            let handler = self.handlers.capture.clone();
            self.listen(page, document, &event_type, &handler, capture);
            let handler = self.handlers.bubble.clone();
            self.listen(page, document, &event_type, &handler, bubble);
        }

        let analyzers = [
            ("click", self.handlers.click.clone()),
            ("submit", self.handlers.submit.clone()),
            ("mousemove", self.handlers.mousemove.clone()),
        ];
        for (event_type, handler) in analyzers {
            if selected.is_selected(event_type) {
                self.listen(page, document, event_type, &handler, capture);
            }
        }

        if selected.any_selected(NAVIGATION_EVENT_TYPES) {
            let handler = self.handlers.navigation.clone();
            for event_type in NAVIGATION_EVENT_TYPES {
                self.listen(page, EventTarget::Window, event_type, &handler, bubble);
            }
        }
    }

    /// Logs an in-scope event and keeps it from reaching listeners outside the tracked subtree.
    fn on_dom_event(&mut self, page: &mut Page, event: &mut Event, phase: LogPhase) {
        let Some(root) = self.root() else {
            return;
        };
        if !self.in_scope(page, event) {
            return;
        }
        let stack = self.stack(page);
        let target = describe_target(page, event.target());
        let entry = EventLogEntry::event(event.event_type(), phase, target, page.now_ms(), stack);
        self.log(page, entry);
        if self.config.isolate_propagation {
            event.isolate_within(root);
        }
    }
}
