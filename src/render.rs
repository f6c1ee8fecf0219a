//! Turns log entries into DOM nodes inside the output container.

use std::rc::Rc;

use crate::page::{EventTarget, Handler, ListenerOptions, NodeId, Page, RegistrationEntryPoints};
use crate::stack::{FormattedStack, SourceRef, tracker_location};
use crate::tracker::{EventLogEntry, LogPhase};
use crate::{LOG_TARGET, Result};

pub(crate) type ViewSourceFn = Rc<dyn Fn(&mut Page, SourceRef)>;

const TOGGLE_GLYPH: &str = "\u{25bc}";

/// Appends rendered entries to the container handed to the tracker at construction.
///
/// UI listeners are registered through the entry points captured before any patching, so the
/// tracker never reports its own listeners.
pub(crate) struct LogRenderer {
    output: NodeId,
    on_view_source: Option<ViewSourceFn>,
}

impl LogRenderer {
    pub(crate) fn new(output: NodeId) -> Self {
        Self {
            output,
            on_view_source: None,
        }
    }

    pub(crate) fn set_view_source(&mut self, callback: ViewSourceFn) {
        self.on_view_source = Some(callback);
    }

    pub(crate) fn output(&self) -> NodeId {
        self.output
    }

    /// `collapsible_inline`: render an inline-trigger entry with its stack panel.
    pub(crate) fn render(
        &self,
        page: &mut Page,
        entry_points: &RegistrationEntryPoints,
        entry: &EventLogEntry,
        collapsible_inline: bool,
    ) -> Result<NodeId> {
        let ui = Ui {
            renderer: self,
            entry_points,
        };
        match entry.phase {
            LogPhase::Capture | LogPhase::Bubble => ui.render_event(page, entry),
            LogPhase::Inline if collapsible_inline => ui.render_inline(page, entry),
            _ => ui.render_plain(page, entry),
        }
    }

    pub(crate) fn clear(&self, page: &mut Page) -> Result<()> {
        page.clear_children(self.output)
    }
}

/// One rendering pass.
struct Ui<'a> {
    renderer: &'a LogRenderer,
    entry_points: &'a RegistrationEntryPoints,
}

impl Ui<'_> {
    fn output(&self) -> NodeId {
        self.renderer.output
    }

    fn render_event(&self, page: &mut Page, entry: &EventLogEntry) -> Result<NodeId> {
        let log = self.element(page, self.output(), "div", "event-log")?;
        let header = self.element(page, log, "div", "event-log-header")?;
        let toggle = self.element(page, header, "span", "toggle-stack")?;
        page.set_text_content(toggle, TOGGLE_GLYPH)?;

        let event_type = entry.event_type.as_deref().unwrap_or("");
        let type_span = self.element(page, header, "span", "event-type")?;
        page.set_attribute(type_span, "data-event-type", event_type)?;
        page.set_text_content(type_span, event_type)?;
        let phase = self.element(page, header, "span", "event-phase")?;
        page.set_text_content(phase, &format!("({})", entry.phase.label()))?;
        let target = self.element(page, header, "span", "event-target")?;
        page.set_text_content(
            target,
            &format!("on {}", entry.target.as_deref().unwrap_or("unknown")),
        )?;

        self.stack_panel(page, log, header, toggle, entry.stack.as_ref())?;
        Ok(log)
    }

    fn render_inline(&self, page: &mut Page, entry: &EventLogEntry) -> Result<NodeId> {
        let log = self.element(page, self.output(), "div", "event-log")?;
        let header = self.element(page, log, "div", "event-log-header")?;
        let toggle = self.element(page, header, "span", "toggle-stack")?;
        page.set_text_content(toggle, TOGGLE_GLYPH)?;
        let message = page.create_text(&entry.message);
        page.append_child(header, message)?;
        self.stack_panel(page, log, header, toggle, entry.stack.as_ref())?;
        Ok(log)
    }

    fn render_plain(&self, page: &mut Page, entry: &EventLogEntry) -> Result<NodeId> {
        let class = format!("log-{}", entry.category().as_str());
        let log = self.element(page, self.output(), "div", &class)?;
        page.set_text_content(log, &entry.message)?;
        Ok(log)
    }

    /// Stack panel plus the header click that folds it. Collapsed from the start when there is
    /// nothing to show.
    fn stack_panel(
        &self,
        page: &mut Page,
        log: NodeId,
        header: NodeId,
        toggle: NodeId,
        stack: Option<&FormattedStack>,
    ) -> Result<NodeId> {
        let panel = self.element(page, log, "div", "stack-trace")?;
        match stack.filter(|stack| !stack.is_empty()) {
            None => {
                let note = self.element(page, panel, "i", "stack-empty")?;
                page.set_text_content(note, "No stack trace")?;
                page.add_class(panel, "collapsed")?;
                page.add_class(toggle, "collapsed")?;
            }
            Some(stack) => {
                for frame in &stack.frames {
                    let row = self.element(page, panel, "div", "stack-frame")?;
                    let path = self.element(page, row, "span", "stack-path")?;
                    page.set_text_content(path, &frame.display())?;
                    if let Some(source) = &frame.source {
                        self.view_source_button(page, row, source)?;
                    }
                }
            }
        }

        let fold = Handler::new(
            tracker_location("toggleStack", 1087),
            move |page: &mut Page, _event| {
                for node in [toggle, panel] {
                    page.toggle_class(node, "collapsed")?;
                }
                Ok(())
            },
        );
        self.listen(page, header, &fold);
        Ok(panel)
    }

    fn view_source_button(&self, page: &mut Page, row: NodeId, source: &SourceRef) -> Result<()> {
        let button = self.element(page, row, "button", "view-source-btn")?;
        page.set_attribute(button, "data-path", &source.path)?;
        page.set_attribute(button, "data-line", &source.line.to_string())?;
        page.set_attribute(button, "data-column", &source.column.to_string())?;
        page.set_text_content(button, "View source")?;

        let Some(callback) = self.renderer.on_view_source.clone() else {
            return Ok(());
        };
        let source = source.clone();
        let open = Handler::new(
            tracker_location("viewSourceCode", 1096),
            move |page: &mut Page, event| {
                // The header underneath would fold the panel.
                event.stop_propagation();
                callback(page, source.clone());
                Ok(())
            },
        );
        self.listen(page, button, &open);
        Ok(())
    }

    fn listen(&self, page: &mut Page, node: NodeId, handler: &Handler) {
        (self.entry_points.add)(
            page,
            EventTarget::Node(node),
            "click",
            handler,
            ListenerOptions::bubble(),
        );
    }

    fn element(&self, page: &mut Page, parent: NodeId, tag: &str, class: &str) -> Result<NodeId> {
        let node = page.create_element(tag);
        page.set_attribute(node, "class", class)?;
        page.append_child(parent, node)?;
        Ok(node)
    }
}

impl std::fmt::Debug for LogRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRenderer")
            .field("output", &self.output)
            .field("view_source", &self.on_view_source.is_some())
            .finish()
    }
}

/// Logs and drops a rendering failure; a missing container must not break event handling.
pub(crate) fn report_render_error(result: Result<NodeId>) {
    if let Err(err) = result {
        log::debug!(target: LOG_TARGET, "log entry not rendered: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::TrackerConfig;
    use crate::stack::StackFormatter;

    fn setup() -> Result<(Page, LogRenderer)> {
        let page = Page::from_html("<div id='out'></div>")?;
        let output = page.select("#out")?;
        Ok((page, LogRenderer::new(output)))
    }

    #[test]
    fn event_entry_structure_and_folding() -> Result<()> {
        let (mut page, renderer) = setup()?;
        let native = page.entry_points();
        let entry = EventLogEntry::event("click", LogPhase::Capture, "button".into(), 0, None);
        let log = renderer.render(&mut page, &native, &entry, false)?;

        let event_type = page.select("#out .event-log .event-log-header .event-type")?;
        assert_eq!(page.dom().attr(event_type, "data-event-type"), Some("click"));
        let panel = page.select("#out .stack-trace")?;
        let toggle = page.select("#out .toggle-stack")?;
        assert!(page.dom().has_class(panel, "collapsed"));
        assert!(page.dom().has_class(toggle, "collapsed"));
        assert_eq!(page.dom().text_content(page.select("#out .event-target")?), "on button");

        let header = page.select("#out .event-log-header")?;
        page.click(header)?;
        assert!(!page.dom().has_class(panel, "collapsed"));
        assert!(!page.dom().has_class(toggle, "collapsed"));
        assert_eq!(page.dom().parent(header), Some(log));
        Ok(())
    }

    #[test]
    fn view_source_button_does_not_fold_the_panel() -> Result<()> {
        let (mut page, mut renderer) = setup()?;
        let native = page.entry_points();
        let opened = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&opened);
        renderer.set_view_source(Rc::new(move |_: &mut Page, source: SourceRef| {
            sink.borrow_mut().push(source)
        }));

        let stack = StackFormatter::new(&TrackerConfig::default())?
            .format("Error\n    at save (https://app.test/app.js:9:4)");
        let entry = EventLogEntry::event("click", LogPhase::Bubble, "a".into(), 0, stack);
        renderer.render(&mut page, &native, &entry, false)?;

        let panel = page.select("#out .stack-trace")?;
        assert!(!page.dom().has_class(panel, "collapsed"));
        let button = page.select("#out .stack-frame .view-source-btn")?;
        assert_eq!(page.dom().attr(button, "data-line"), Some("9"));
        page.click(button)?;

        assert!(!page.dom().has_class(panel, "collapsed"));
        assert_eq!(
            *opened.borrow(),
            vec![SourceRef {
                path: "https://app.test/app.js".into(),
                line: 9,
                column: 4
            }]
        );
        Ok(())
    }

    #[test]
    fn plain_entries_use_category_class_and_clear_empties_container() -> Result<()> {
        let (mut page, renderer) = setup()?;
        let native = page.entry_points();
        let entry = EventLogEntry::message(LogPhase::Popup, "Popup detected: div.modal", 0);
        renderer.render(&mut page, &native, &entry, false)?;
        let inline = EventLogEntry::message(LogPhase::Inline, "Inline handler onclick fired", 0);
        renderer.render(&mut page, &native, &inline, false)?;
        renderer.render(&mut page, &native, &inline, true)?;

        assert_eq!(page.query_selector_all("#out .log-popup")?.len(), 1);
        assert_eq!(page.query_selector_all("#out .log-info")?.len(), 1);
        assert_eq!(page.query_selector_all("#out .event-log")?.len(), 1);

        renderer.clear(&mut page)?;
        assert!(page.dom().children(renderer.output()).is_empty());
        Ok(())
    }
}
