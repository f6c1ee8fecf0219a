use super::event::{DispatchOutcome, Event, EventInit, EventPhase, EventTarget};
use super::dom::NodeId;
use super::{OUTCOME_HISTORY, Page};
use crate::{Error, LOG_TARGET, Result};

// Nested dispatches (handlers firing events) recurse through here.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

impl Page {
    pub fn dispatch_event(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
    ) -> Result<DispatchOutcome> {
        self.dispatch_event_with(target, event_type, EventInit::for_type(event_type))
    }

    pub fn dispatch_event_with(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        init: EventInit,
    ) -> Result<DispatchOutcome> {
        let target = target.into();
        let path = self.event_path(target)?;
        self.next_event_serial += 1;
        let mut event = Event::new(
            event_type,
            target,
            init,
            path,
            self.now_ms,
            self.next_event_serial,
        );

        self.dispatch_depth += 1;
        let reason = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.run_dispatch(&mut event)
        });
        self.dispatch_depth -= 1;
        self.trace_event_done(&event, reason);

        let outcome = DispatchOutcome::from(&event);
        if self.outcomes.len() >= OUTCOME_HISTORY {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back((event.serial(), outcome));

        if self.dispatch_depth == 0 && self.call_stack.is_empty() {
            self.perform_microtask_checkpoint();
        }
        Ok(outcome)
    }

    /// Final state of a recently completed dispatch, looked up by event serial.
    pub(crate) fn dispatch_outcome(&self, serial: u64) -> Option<DispatchOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(candidate, _)| *candidate == serial)
            .map(|(_, outcome)| *outcome)
    }

    /// Window, document, ancestors, target.
    fn event_path(&self, target: EventTarget) -> Result<Vec<EventTarget>> {
        let mut path = Vec::new();
        if let EventTarget::Node(node) = target {
            if !self.dom.is_alive(node) {
                return Err(Error::StaleNode(node.to_string()));
            }
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                path.push(EventTarget::Node(current));
                cursor = self.dom.parent(current);
            }
            // Detached trees never reach the window.
            if path.last() == Some(&EventTarget::Node(self.dom.document())) {
                path.push(EventTarget::Window);
            }
        } else {
            path.push(EventTarget::Window);
        }
        path.reverse();
        Ok(path)
    }

    fn run_dispatch(&mut self, event: &mut Event) -> &'static str {
        let path = event.path.clone();
        let Some((target, ancestors)) = path.split_last() else {
            return "empty_path";
        };

        // Capture phase.
        event.phase = EventPhase::Capturing;
        for node in ancestors {
            event.current_target = *node;
            self.invoke_listeners(*node, event, true);
            if event.propagation_stopped {
                return "propagation_stopped";
            }
        }

        // Target phase: capture listeners, then the inline handler, then bubble listeners.
        event.phase = EventPhase::AtTarget;
        event.current_target = *target;
        self.invoke_listeners(*target, event, true);
        if event.propagation_stopped {
            return "propagation_stopped";
        }
        self.invoke_inline_handler(*target, event);
        if event.propagation_stopped {
            return "propagation_stopped";
        }
        self.invoke_listeners(*target, event, false);
        if event.propagation_stopped {
            return "propagation_stopped";
        }

        if !event.bubbles {
            return "completed";
        }

        // Bubble phase.
        event.phase = EventPhase::Bubbling;
        for node in ancestors.iter().rev() {
            event.current_target = *node;
            self.invoke_inline_handler(*node, event);
            if event.propagation_stopped {
                return "propagation_stopped";
            }
            self.invoke_listeners(*node, event, false);
            if event.propagation_stopped {
                return "propagation_stopped";
            }
        }
        "completed"
    }

    fn invoke_listeners(&mut self, target: EventTarget, event: &mut Event, capture: bool) {
        let listeners = self.listeners.get(target, &event.event_type, capture);
        for listener in listeners {
            // Removed by an earlier listener of this dispatch.
            if !self
                .listeners
                .contains(target, &event.event_type, capture, &listener.handler)
            {
                continue;
            }
            if !self.isolation_allows(event, target, listener.options.instrumentation) {
                continue;
            }
            if listener.options.once {
                self.listeners
                    .remove(target, &event.event_type, capture, &listener.handler);
            }
            self.trace_line(format!(
                "[event] {} listener {} on {} phase={:?}",
                event.event_type,
                listener.handler.location().function,
                self.trace_target_label(target),
                event.phase
            ));

            event.in_passive_listener = listener.options.passive;
            let result = listener.handler.call(self, event);
            event.in_passive_listener = false;
            if let Err(err) = result {
                self.report_uncaught(err);
            }
            if event.immediate_propagation_stopped {
                break;
            }
        }
    }

    fn invoke_inline_handler(&mut self, target: EventTarget, event: &mut Event) {
        let EventTarget::Node(node) = target else {
            return;
        };
        let Some(handler) = self.dom.inline_handler(node, &event.event_type) else {
            return;
        };
        if !self.isolation_allows(event, target, false) {
            return;
        }
        self.trace_line(format!(
            "[event] {} inline handler on {}",
            event.event_type,
            self.trace_target_label(target)
        ));
        if let Err(err) = handler.call(self, event) {
            self.report_uncaught(err);
        }
    }

    fn isolation_allows(&self, event: &Event, target: EventTarget, instrumentation: bool) -> bool {
        let Some(scope) = event.isolation_scope else {
            return true;
        };
        instrumentation
            || match target {
                EventTarget::Window => false,
                EventTarget::Node(node) => self.dom.contains(scope, node),
            }
    }

    fn trace_event_done(&mut self, event: &Event, reason: &str) {
        self.trace_line(format!(
            "[event] done {} target={} default_prevented={} isolated={} reason={reason}",
            event.event_type,
            self.trace_target_label(event.target),
            event.default_prevented,
            event.is_isolated()
        ));
    }

    // Input helpers that also run the browser's default action.

    /// Dispatches `click` and, unless it was cancelled, follows links and submits forms.
    pub fn click(&mut self, node: NodeId) -> Result<DispatchOutcome> {
        let outcome = self.dispatch_event(node, "click")?;
        if !outcome.default_prevented {
            self.run_click_default_action(node)?;
        }
        Ok(outcome)
    }

    /// Dispatches `submit` at `form`; an uncancelled submission is recorded as a navigation to
    /// the form's action.
    pub fn submit(&mut self, form: NodeId) -> Result<DispatchOutcome> {
        let outcome = self.dispatch_event(form, "submit")?;
        if !outcome.default_prevented {
            let action = self.dom.attr(form, "action").unwrap_or("").to_string();
            let url = if action.is_empty() {
                self.location.without_hash().to_string()
            } else {
                self.location.resolve(&action)
            };
            self.record_navigation(url);
        }
        Ok(outcome)
    }

    pub fn mouse_move(&mut self, node: NodeId) -> Result<DispatchOutcome> {
        self.dispatch_event(node, "mousemove")
    }

    fn run_click_default_action(&mut self, node: NodeId) -> Result<()> {
        if let Some(anchor) = self.dom.closest_tag(node, "a") {
            let Some(href) = self.dom.attr(anchor, "href").map(str::to_string) else {
                return Ok(());
            };
            if href.starts_with('#') {
                return self.set_hash(&href);
            }
            if href.trim_start().to_ascii_lowercase().starts_with("javascript:") {
                return Ok(());
            }
            let url = self.location.resolve(&href);
            if self.dom.attr(anchor, "target") == Some("_blank") {
                self.open_window(&url, "_blank");
            } else {
                self.record_navigation(url);
            }
            return Ok(());
        }

        let is_submit_control = match self.dom.tag_name(node) {
            Some("button") => !matches!(self.dom.attr(node, "type"), Some("button" | "reset")),
            Some("input") => matches!(self.dom.attr(node, "type"), Some("submit" | "image")),
            _ => false,
        };
        if is_submit_control {
            if let Some(form) = self.dom.closest_tag(node, "form") {
                log::trace!(target: LOG_TARGET, "implicit submission of {form}");
                self.submit(form)?;
            }
        }
        Ok(())
    }
}
