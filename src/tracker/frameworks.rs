//! Detection of popular UI libraries and wrappers around their popup entry points.

use serde::Serialize;

use super::filter::describe_node;
use super::{EventLogEntry, LogPhase, TrackerState, with_state};
use crate::page::{CallArgs, Event, EventTarget, Function, ListenerOptions, Page, Value};
use crate::stack::tracker_location;
use crate::LOG_TARGET;

const BOOTSTRAP_MODAL_EVENTS: &[&str] = &[
    "show.bs.modal",
    "shown.bs.modal",
    "hide.bs.modal",
    "hidden.bs.modal",
];
const JQUERY_POPUP_METHODS: &[&str] = &["jQuery.fn.modal", "jQuery.fn.dialog", "jQuery.fn.popup"];
const SWAL_ENTRY_POINTS: &[&str] = &["Swal", "Swal.fire"];
const LIGHTBOX_ENTRY_POINTS: &[&str] = &["lightbox.show", "lightbox.showImage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Framework {
    Bootstrap,
    JQuery,
    JQueryUi,
    ElementUi,
    AntDesign,
    Vuetify,
    MaterialUi,
    SweetAlert2,
    Fancybox,
    Featherlight,
    Lightbox,
}

impl Framework {
    /// Every framework, in detection order.
    pub const ALL: [Framework; 11] = [
        Self::Bootstrap,
        Self::JQuery,
        Self::JQueryUi,
        Self::ElementUi,
        Self::AntDesign,
        Self::Vuetify,
        Self::MaterialUi,
        Self::SweetAlert2,
        Self::Fancybox,
        Self::Featherlight,
        Self::Lightbox,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bootstrap => "Bootstrap",
            Self::JQuery => "jQuery",
            Self::JQueryUi => "jQuery UI",
            Self::ElementUi => "Element UI",
            Self::AntDesign => "Ant Design",
            Self::Vuetify => "Vuetify",
            Self::MaterialUi => "Material UI",
            Self::SweetAlert2 => "SweetAlert2",
            Self::Fancybox => "Fancybox",
            Self::Featherlight => "Featherlight",
            Self::Lightbox => "Lightbox",
        }
    }

    fn global(self) -> Option<&'static str> {
        match self {
            Self::Bootstrap => Some("bootstrap"),
            Self::JQuery => Some("jQuery"),
            Self::JQueryUi => Some("jQuery.ui"),
            Self::SweetAlert2 => Some("Swal"),
            Self::Lightbox => Some("lightbox"),
            _ => None,
        }
    }

    fn marker_selector(self) -> Option<&'static str> {
        match self {
            Self::Bootstrap => Some("[data-bs-toggle], .modal.fade, .bootstrap"),
            Self::ElementUi => Some(".el-dialog, .el-message-box, .el-drawer"),
            Self::AntDesign => Some(".ant-modal, .ant-drawer, .ant-notification"),
            Self::Vuetify => Some(".v-dialog, .v-overlay, .v-menu"),
            Self::MaterialUi => Some(".MuiDialog-root, .MuiDrawer-root, .MuiPopover-root"),
            Self::SweetAlert2 => Some(".swal2-container"),
            Self::Fancybox => Some(".fancybox-container, [data-fancybox]"),
            Self::Featherlight => Some(".featherlight, [data-featherlight]"),
            Self::Lightbox => Some("[data-lightbox]"),
            Self::JQuery | Self::JQueryUi => None,
        }
    }

    pub fn is_present(self, page: &Page) -> bool {
        if self.global().is_some_and(|path| page.has_global(path)) {
            return true;
        }
        self.marker_selector()
            .is_some_and(|selector| matches!(page.query_selector(selector), Ok(Some(_))))
    }
}

/// A global replaced by a wrapper, with the exact value it held before.
#[derive(Debug)]
pub(crate) struct PatchedGlobal {
    path: String,
    previous: Value,
}

impl TrackerState {
    pub(super) fn attach_frameworks(&mut self, page: &mut Page) {
        self.frameworks = Framework::ALL
            .into_iter()
            .filter(|framework| framework.is_present(page))
            .collect();
        if self.frameworks.is_empty() {
            return;
        }
        let names = self
            .frameworks
            .iter()
            .map(|framework| framework.name())
            .collect::<Vec<_>>()
            .join(", ");
        self.info(page, format!("Detected UI frameworks: {names}"));

        for framework in self.frameworks.clone() {
            let monitored = match framework {
                Framework::Bootstrap => {
                    let handler = self.handlers.bootstrap_modal.clone();
                    let document = EventTarget::Node(page.document());
                    for event_type in BOOTSTRAP_MODAL_EVENTS {
                        let options = ListenerOptions::bubble().instrumentation();
                        self.listen(page, document, event_type, &handler, options);
                    }
                    true
                }
                Framework::JQuery => self.wrap_globals(page, JQUERY_POPUP_METHODS) > 0,
                Framework::SweetAlert2 => self.wrap_globals(page, SWAL_ENTRY_POINTS) > 0,
                Framework::Fancybox => self.wrap_globals(page, &["$.fancybox"]) > 0,
                Framework::Lightbox if page.has_global("lightbox.option") => {
                    self.wrap_globals(page, LIGHTBOX_ENTRY_POINTS) > 0
                }
                _ => false,
            };
            if monitored {
                self.info(page, format!("{} popup monitoring added", framework.name()));
            }
        }
    }

    /// Puts every wrapped global back, newest first.
    pub(super) fn detach_frameworks(&mut self, page: &mut Page) {
        let patched = std::mem::take(&mut self.patched_globals);
        for global in patched.into_iter().rev() {
            log::debug!(target: LOG_TARGET, "restoring {}", global.path);
            page.set_global(&global.path, global.previous);
        }
        self.frameworks.clear();
    }

    /// Wraps each path that currently holds a callable. Returns how many were wrapped.
    fn wrap_globals(&mut self, page: &mut Page, paths: &[&str]) -> usize {
        let mut wrapped = 0;
        for path in paths {
            let Some(Value::Function(original)) = page.global(path) else {
                continue;
            };
            let weak = self.me.clone();
            let label = path.to_string();
            let delegate = original.clone();
            let wrapper = Function::new(
                tracker_location("frameworkProxy", 1796),
                move |page: &mut Page, args: &CallArgs| {
                    with_state(&weak, |state| state.framework_call(page, &label, args));
                    delegate.call(page, args)
                },
            );
            self.patched_globals.push(PatchedGlobal {
                path: path.to_string(),
                previous: Value::Function(original),
            });
            page.set_global(path, wrapper);
            wrapped += 1;
        }
        wrapped
    }

    fn framework_call(&mut self, page: &mut Page, path: &str, args: &CallArgs) {
        if self.session.is_none() {
            return;
        }
        let argument = args.first().map(Value::describe);
        let message = if path.starts_with("jQuery.fn.") {
            let receiver = args
                .this
                .filter(|node| page.dom().is_alive(*node))
                .map_or_else(|| "unknown".to_string(), |node| describe_node(page, node));
            format!(
                "jQuery modal call: {} on {receiver}",
                argument.as_deref().unwrap_or("toggle")
            )
        } else {
            match argument {
                Some(argument) => format!("{path} called: {argument}"),
                None => format!("{path} called"),
            }
        };
        let entry = EventLogEntry::message(LogPhase::Popup, message, page.now_ms())
            .with_stack(self.stack(page));
        self.log(page, entry);
    }

    pub(super) fn on_bootstrap_modal(&mut self, page: &mut Page, event: &mut Event) {
        if self.session.is_none() {
            return;
        }
        let Some(target) = event.target_node() else {
            return;
        };
        if !page.dom().has_class(target, "modal") {
            return;
        }
        let descriptor = describe_node(page, target);
        let entry = EventLogEntry::message(
            LogPhase::Popup,
            format!("Bootstrap modal {}: {descriptor}", event.event_type()),
            page.now_ms(),
        )
        .with_event_type(event.event_type())
        .with_target(descriptor);
        self.log(page, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::page::SourceLocation;

    #[test]
    fn detection_uses_globals_and_markers() -> Result<()> {
        let mut page = Page::from_html("<div class='modal fade'></div><a data-fancybox='g'></a>")?;
        page.set_global("Swal", Value::Object);
        let found: Vec<Framework> = Framework::ALL
            .into_iter()
            .filter(|framework| framework.is_present(&page))
            .collect();
        assert_eq!(
            found,
            vec![Framework::Bootstrap, Framework::SweetAlert2, Framework::Fancybox]
        );
        Ok(())
    }

    #[test]
    fn nothing_is_detected_on_a_plain_page() -> Result<()> {
        let mut page = Page::from_html("<p>plain</p>")?;
        page.set_global(
            "unrelated",
            Function::new(SourceLocation::anonymous("app.js", 1, 1), |_, _| Ok(Value::Undefined)),
        );
        assert!(Framework::ALL.iter().all(|framework| !framework.is_present(&page)));
        assert_eq!(Framework::JQueryUi.name(), "jQuery UI");
        Ok(())
    }
}
