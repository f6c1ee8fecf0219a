//! Wrapping of the page-wide listener registration entry points.

use std::rc::{Rc, Weak};

use super::filter::{describe_node, is_tracker_element};
use super::{EventLogEntry, LogPhase, Shared, TrackerState, with_state};
use crate::page::{
    AddListenerFn, EventTarget, Handler, ListenerOptions, Page, RegistrationEntryPoints,
    RemoveListenerFn,
};
use crate::{Error, LOG_TARGET, Result};

/// The wrappers this tracker installs over the page's pre-patch entry points.
///
/// The pre-patch pair lives on the page ([`Page::original_entry_points`]) and is shared by
/// every tracker, so wrappers always sit directly on top of it and never on top of each other.
/// The wrappers are built once per tracker; start/stop cycles swap the same function values.
#[derive(Default)]
pub(crate) struct RegistrationPatch {
    wrappers: Option<RegistrationEntryPoints>,
    installed: bool,
}

impl RegistrationPatch {
    pub(crate) fn originals(&self, page: &mut Page) -> RegistrationEntryPoints {
        page.original_entry_points()
    }

    /// False if already installed.
    pub(crate) fn install(&mut self, page: &mut Page, shared: &Weak<Shared>) -> bool {
        if self.installed {
            return false;
        }
        let originals = page.original_entry_points();
        let wrappers = self
            .wrappers
            .get_or_insert_with(|| wrap(shared, &originals))
            .clone();
        page.set_entry_points(wrappers);
        self.installed = true;
        true
    }

    /// Puts the pre-patch pair back if our wrappers are still the installed ones. Entry points
    /// replaced since (by another tracker) are left alone. False if nothing was put back.
    pub(crate) fn restore(&mut self, page: &mut Page) -> bool {
        if !self.installed {
            return false;
        }
        self.installed = false;
        let ours = self
            .wrappers
            .as_ref()
            .is_some_and(|wrappers| page.entry_points().same_as(wrappers));
        if ours {
            let originals = page.original_entry_points();
            page.set_entry_points(originals);
        } else {
            log::debug!(target: LOG_TARGET, "entry points replaced since install, leaving them");
        }
        ours
    }
}

impl std::fmt::Debug for RegistrationPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationPatch")
            .field("built", &self.wrappers.is_some())
            .field("installed", &self.installed)
            .finish()
    }
}

fn wrap(shared: &Weak<Shared>, originals: &RegistrationEntryPoints) -> RegistrationEntryPoints {
    let add: Rc<AddListenerFn> = {
        let weak = shared.clone();
        let original = Rc::clone(&originals.add);
        Rc::new(
            move |page: &mut Page,
                  target: EventTarget,
                  event_type: &str,
                  handler: &Handler,
                  options: ListenerOptions| {
                with_state(&weak, |state| {
                    state.note_registration(page, target, event_type, handler, options)
                });
                original(page, target, event_type, handler, options);
            },
        )
    };
    let remove: Rc<RemoveListenerFn> = {
        let weak = shared.clone();
        let original = Rc::clone(&originals.remove);
        Rc::new(
            move |page: &mut Page,
                  target: EventTarget,
                  event_type: &str,
                  handler: &Handler,
                  options: ListenerOptions| {
                with_state(&weak, |state| {
                    if let Err(err) = state.note_removal(page, target, event_type, handler, options)
                    {
                        state.info(page, format!("Error while tracking listener removal: {err}"));
                    }
                });
                original(page, target, event_type, handler, options);
            },
        )
    };
    RegistrationEntryPoints { add, remove }
}

impl TrackerState {
    fn registration_in_scope(&self, page: &Page, target: EventTarget, event_type: &str) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let Some(node) = target.node() else {
            return false;
        };
        session.selected.is_selected(event_type)
            && page.dom().contains(session.root, node)
            && !is_tracker_element(page, node, self.output())
    }

    fn note_registration(
        &mut self,
        page: &mut Page,
        target: EventTarget,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) {
        if !self.registration_in_scope(page, target, event_type) || !self.ledger.record(handler) {
            return;
        }
        let Some(node) = target.node() else {
            return;
        };
        let descriptor = describe_node(page, node);
        let flags = serde_json::to_string(&options).unwrap_or_default();
        let entry = EventLogEntry::message(
            LogPhase::Info,
            format!("Listener added: {event_type} on {descriptor} {flags}"),
            page.now_ms(),
        )
        .with_event_type(event_type)
        .with_target(descriptor)
        .with_stack(self.stack(page));
        self.log(page, entry);
    }

    fn note_removal(
        &mut self,
        page: &mut Page,
        target: EventTarget,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) -> Result<()> {
        if self.session.is_none() || !self.ledger.contains(handler) {
            return Ok(());
        }
        let node = match target {
            EventTarget::Node(node) if !page.dom().is_alive(node) => {
                self.ledger.forget(handler);
                log::debug!(target: LOG_TARGET, "{event_type} listener removed from stale {node}");
                return Err(Error::StaleNode(node.to_string()));
            }
            EventTarget::Node(node) if self.registration_in_scope(page, target, event_type) => node,
            _ => return Ok(()),
        };
        self.ledger.forget(handler);
        let descriptor = describe_node(page, node);
        let entry = EventLogEntry::message(
            LogPhase::Info,
            format!(
                "Listener removed: {event_type} from {descriptor} {{\"capture\":{}}}",
                options.capture
            ),
            page.now_ms(),
        )
        .with_event_type(event_type)
        .with_target(descriptor);
        self.log(page, entry);
        Ok(())
    }
}
