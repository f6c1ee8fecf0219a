//! The tracker: one tracked subtree, the listeners and patches that observe it, and the log.
//!
//! All mutable state sits behind [`Shared`]. Page-side callbacks (listeners, property accessors,
//! registration wrappers, framework wrappers, timers) hold a `Weak<Shared>` and borrow the state
//! only for the duration of their own bookkeeping, never across a call into page code.

mod analyzers;
mod engine;
mod entry;
mod filter;
mod frameworks;
mod inline;
mod mutation;
mod registration;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::catalog::{EventTypeCatalog, SelectedEventTypes};
use crate::config::{LogLevelConfig, TrackerConfig};
use crate::page::{Event, EventTarget, Handler, ListenerOptions, NodeId, Page};
use crate::render::{LogRenderer, report_render_error};
use crate::source::{self, SourceOrigin, SourceView};
use crate::stack::{FormattedStack, SourceRef, StackFormatter};
use crate::{Error, LOG_TARGET, Result};

use analyzers::Heuristics;
use engine::TrackerHandlers;
pub use entry::{EventLogEntry, LogPhase};
pub use frameworks::Framework;
use frameworks::PatchedGlobal;
use inline::InlineInterceptor;
use mutation::MutationWatcher;
use registration::RegistrationPatch;

/// Handle to a tracker. Clones share the same state.
#[derive(Clone)]
pub struct EventTracker {
    shared: Rc<Shared>,
}

pub(crate) struct Shared {
    state: RefCell<TrackerState>,
    inline: RefCell<InlineInterceptor>,
}

#[derive(Debug, Clone)]
struct Session {
    root: NodeId,
    selected: SelectedEventTypes,
    started_at: i64,
}

struct InstalledListener {
    target: EventTarget,
    event_type: String,
    handler: Handler,
    options: ListenerOptions,
}

pub(crate) struct TrackerState {
    me: Weak<Shared>,
    config: TrackerConfig,
    formatter: StackFormatter,
    heuristics: Heuristics,
    handlers: TrackerHandlers,
    selected: SelectedEventTypes,
    session: Option<Session>,
    entries: Vec<EventLogEntry>,
    preserve_logs: bool,
    renderer: Option<LogRenderer>,
    registration: RegistrationPatch,
    ledger: filter::RegistrationLedger,
    installed: Vec<InstalledListener>,
    watcher: MutationWatcher,
    popups_seen: HashSet<String>,
    frameworks: Vec<Framework>,
    patched_globals: Vec<PatchedGlobal>,
    mousemove_last: Option<i64>,
    source_view: Option<SourceView>,
}

/// Runs `f` on the tracker state unless the tracker is gone or the state is already borrowed
/// further up the stack.
pub(crate) fn with_state<T>(shared: &Weak<Shared>, f: impl FnOnce(&mut TrackerState) -> T) -> Option<T> {
    let shared = shared.upgrade()?;
    let Ok(mut state) = shared.state.try_borrow_mut() else {
        log::debug!(target: LOG_TARGET, "tracker state busy, skipping nested callback");
        return None;
    };
    Some(f(&mut state))
}

impl EventTracker {
    /// A tracker that renders its log into `output`, with default settings.
    pub fn new(output: NodeId) -> Result<Self> {
        Self::with_config(output, TrackerConfig::default())
    }

    pub fn with_config(output: NodeId, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let formatter = StackFormatter::new(&config)?;
        let heuristics = Heuristics::new()?;
        let shared = Rc::new_cyclic(|me: &Weak<Shared>| {
            let mut renderer = LogRenderer::new(output);
            let weak = me.clone();
            renderer.set_view_source(Rc::new(move |page: &mut Page, source: SourceRef| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if let Err(err) = (EventTracker { shared }).view_source(page, &source) {
                    log::debug!(target: LOG_TARGET, "view source failed: {err}");
                }
            }));
            Shared {
                state: RefCell::new(TrackerState {
                    me: me.clone(),
                    config,
                    formatter,
                    heuristics,
                    handlers: TrackerHandlers::new(me),
                    selected: SelectedEventTypes::default(),
                    session: None,
                    entries: Vec::new(),
                    preserve_logs: false,
                    renderer: Some(renderer),
                    registration: RegistrationPatch::default(),
                    ledger: filter::RegistrationLedger::default(),
                    installed: Vec::new(),
                    watcher: MutationWatcher::default(),
                    popups_seen: HashSet::new(),
                    frameworks: Vec::new(),
                    patched_globals: Vec::new(),
                    mousemove_last: None,
                    source_view: None,
                }),
                inline: RefCell::new(InlineInterceptor::default()),
            }
        });
        Ok(Self { shared })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TrackerState) -> T) -> Option<T> {
        with_state(&Rc::downgrade(&self.shared), f)
    }

    fn read<T>(&self, f: impl FnOnce(&TrackerState) -> T) -> Option<T> {
        match self.shared.state.try_borrow() {
            Ok(state) => Some(f(&state)),
            Err(_) => None,
        }
    }

    /// Starts tracking `root` with the current event selection. A running session is stopped
    /// first. Does nothing if `root` is not a live element.
    pub fn start_tracking(&self, page: &mut Page, root: NodeId) {
        if !page.dom().is_element(root) {
            log::debug!(target: LOG_TARGET, "start_tracking ignored: {root} is not a live element");
            return;
        }
        if self.is_tracking() {
            self.stop_tracking(page);
        }
        let Some(selected) = self.with_state(|state| state.begin_session(page, root)) else {
            return;
        };
        let wrapped = inline::patch_subtree(&self.shared, page, root, &selected);
        self.with_state(|state| state.announce_session(page, root, &selected, wrapped));
    }

    /// Undoes everything [`start_tracking`](Self::start_tracking) installed. Called while the
    /// tracker is busy, the stop runs on a zero-delay timer instead.
    pub fn stop_tracking(&self, page: &mut Page) {
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            let weak = Rc::downgrade(&self.shared);
            page.set_timeout(0, move |page: &mut Page| {
                if let Some(shared) = weak.upgrade() {
                    EventTracker { shared }.stop_tracking(page);
                }
            });
            log::debug!(target: LOG_TARGET, "tracker busy, stop deferred");
            return;
        };
        if !state.end_session(page) {
            return;
        }
        drop(state);

        let restored = inline::restore_all(&self.shared, page);
        self.with_state(|state| {
            if restored > 0 {
                state.info(page, format!("Restored {restored} inline handler properties"));
            }
            state.info(page, "Stopped tracking");
        });
    }

    pub fn is_tracking(&self) -> bool {
        self.read(|state| state.session.is_some()).unwrap_or(false)
    }

    /// Root of the active session.
    pub fn target(&self) -> Option<NodeId> {
        self.read(TrackerState::root).flatten()
    }

    /// Virtual time at which the active session started.
    pub fn started_at(&self) -> Option<i64> {
        self.read(|state| state.session.as_ref().map(|session| session.started_at))
            .flatten()
    }

    pub fn catalog(&self) -> EventTypeCatalog {
        EventTypeCatalog
    }

    pub fn selected_event_types(&self) -> SelectedEventTypes {
        self.read(|state| state.selected.clone()).unwrap_or_default()
    }

    /// Replaces the selection. An active session restarts on the same root.
    pub fn set_selected_event_types(&self, page: &mut Page, selected: SelectedEventTypes) {
        self.with_state(|state| state.selected = selected);
        self.restart(page);
    }

    pub fn select_all(&self, page: &mut Page) {
        self.with_state(|state| state.selected.select_all());
        self.restart(page);
    }

    pub fn clear_selection(&self, page: &mut Page) {
        self.with_state(|state| state.selected.clear());
        self.restart(page);
    }

    /// Selects every type of a catalog category. False for an unknown category.
    pub fn select_event_group(&self, page: &mut Page, category: &str) -> bool {
        let known = self
            .with_state(|state| state.selected.select_group(category))
            .unwrap_or(false);
        if known {
            self.restart(page);
        }
        known
    }

    pub fn active_event_types(&self) -> Vec<String> {
        self.read(|state| state.selected.active_types())
            .unwrap_or_default()
    }

    fn restart(&self, page: &mut Page) {
        if let Some(root) = self.target() {
            self.stop_tracking(page);
            self.start_tracking(page, root);
        }
    }

    /// Whether the active session tracks `event`: its type is selected and it targets or passes
    /// through the tracked subtree. False while not tracking.
    pub fn is_in_scope(&self, page: &Page, event: &Event) -> bool {
        self.read(|state| state.in_scope(page, event)).unwrap_or(false)
    }

    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.read(|state| state.entries.clone()).unwrap_or_default()
    }

    pub fn entries_with_phase(&self, phase: LogPhase) -> Vec<EventLogEntry> {
        self.read(|state| {
            state
                .entries
                .iter()
                .filter(|entry| entry.phase == phase)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// The log as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String> {
        let entries = self.entries();
        serde_json::to_string_pretty(&entries).map_err(|err| Error::Export(err.to_string()))
    }

    pub fn clear_logs(&self, page: &mut Page) {
        self.with_state(|state| state.clear_logs(page));
    }

    /// Keep the log across session restarts.
    pub fn set_preserve_logs(&self, preserve: bool) {
        self.with_state(|state| state.preserve_logs = preserve);
    }

    pub fn preserve_logs(&self) -> bool {
        self.read(|state| state.preserve_logs).unwrap_or(false)
    }

    pub fn log_levels(&self) -> LogLevelConfig {
        self.read(|state| state.config.log_levels)
            .unwrap_or_default()
    }

    pub fn set_log_levels(&self, levels: LogLevelConfig) {
        self.with_state(|state| state.config.log_levels = levels);
    }

    pub fn inline_stack(&self) -> bool {
        self.read(|state| state.config.inline_stack).unwrap_or(true)
    }

    pub fn set_inline_stack(&self, enabled: bool) {
        self.with_state(|state| state.config.inline_stack = enabled);
    }

    pub fn config(&self) -> TrackerConfig {
        self.read(|state| state.config.clone()).unwrap_or_default()
    }

    /// UI frameworks found when the active session started.
    pub fn detected_frameworks(&self) -> Vec<Framework> {
        self.read(|state| state.frameworks.clone()).unwrap_or_default()
    }

    /// Opens the source viewer on `source`. External scripts are fetched first, so the viewer
    /// appears once the fetch completes.
    pub fn view_source(&self, page: &mut Page, source: &SourceRef) -> Result<()> {
        let (origin, code) = source::locate(page, source)?;
        match (origin, code) {
            (origin, Some(code)) => self.show_source(
                page,
                SourceView {
                    origin,
                    code,
                    line: source.line,
                    column: source.column,
                },
            ),
            (SourceOrigin::External(url), None) => {
                let weak = Rc::downgrade(&self.shared);
                let (line, column) = (source.line, source.column);
                let fetch_url = url.clone();
                page.fetch(&fetch_url, move |page: &mut Page, response| {
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    let tracker = EventTracker { shared };
                    match response {
                        Ok(code) => {
                            let view = SourceView {
                                origin: SourceOrigin::External(url),
                                code,
                                line,
                                column,
                            };
                            if let Err(err) = tracker.show_source(page, view) {
                                log::debug!(target: LOG_TARGET, "source viewer failed: {err}");
                            }
                        }
                        Err(err) => {
                            tracker.with_state(|state| {
                                state.info(page, format!("Could not load source {url}: {err}"))
                            });
                        }
                    }
                });
                Ok(())
            }
            (_, None) => Ok(()),
        }
    }

    fn show_source(&self, page: &mut Page, view: SourceView) -> Result<()> {
        let Some(result) = self.with_state(|state| {
            let entry_points = state.registration.originals(page);
            source::show_viewer(page, &entry_points, &view)?;
            state.source_view = Some(view);
            Ok(())
        }) else {
            return Ok(());
        };
        result
    }

    /// What the source viewer currently shows.
    pub fn source_view(&self) -> Option<SourceView> {
        self.read(|state| state.source_view.clone()).flatten()
    }

    /// Stops tracking and detaches from the output container for good.
    pub fn destroy(&self, page: &mut Page) {
        self.stop_tracking(page);
        self.with_state(|state| state.renderer = None);
    }
}

impl std::fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("EventTracker");
        match self.shared.state.try_borrow() {
            Ok(state) => out
                .field("session", &state.session)
                .field("entries", &state.entries.len())
                .field("renderer", &state.renderer),
            Err(_) => out.field("state", &"<busy>"),
        };
        out.finish()
    }
}

impl TrackerState {
    fn root(&self) -> Option<NodeId> {
        self.session.as_ref().map(|session| session.root)
    }

    fn output(&self) -> Option<NodeId> {
        self.renderer.as_ref().map(LogRenderer::output)
    }

    /// Selected type, and a target inside (or a path through) the tracked root.
    fn in_scope(&self, page: &Page, event: &Event) -> bool {
        self.session.as_ref().is_some_and(|session| {
            session.selected.is_selected(event.event_type())
                && filter::event_in_scope(page, event, session.root, self.output())
        })
    }

    /// Stack snapshot, or nothing when stack logging is switched off.
    fn stack(&self, page: &Page) -> Option<FormattedStack> {
        if !self.config.log_levels.stack {
            return None;
        }
        self.formatter.capture(page)
    }

    /// Stores and renders `entry` unless its category is switched off.
    fn log(&mut self, page: &mut Page, mut entry: EventLogEntry) {
        let levels = &self.config.log_levels;
        if !levels.is_enabled(entry.category()) {
            return;
        }
        if !levels.stack {
            entry.stack = None;
        }
        let collapsible = self.config.inline_stack && levels.stack;
        log::trace!(target: LOG_TARGET, "[{}] {}", entry.phase.label(), entry.message);
        if let Some(renderer) = &self.renderer {
            let entry_points = self.registration.originals(page);
            report_render_error(renderer.render(page, &entry_points, &entry, collapsible));
        }
        self.entries.push(entry);
    }

    fn info(&mut self, page: &mut Page, message: impl Into<String>) {
        let entry = EventLogEntry::message(LogPhase::Info, message, page.now_ms());
        self.log(page, entry);
    }

    fn clear_logs(&mut self, page: &mut Page) {
        self.entries.clear();
        if let Some(renderer) = &self.renderer {
            if let Err(err) = renderer.clear(page) {
                log::debug!(target: LOG_TARGET, "output container not cleared: {err}");
            }
        }
    }

    /// Registers through the entry points captured before patching, so the registration
    /// wrapper never sees the tracker's own listeners.
    fn listen(
        &mut self,
        page: &mut Page,
        target: EventTarget,
        event_type: &str,
        handler: &Handler,
        options: ListenerOptions,
    ) {
        let entry_points = self.registration.originals(page);
        (entry_points.add)(page, target, event_type, handler, options);
        self.installed.push(InstalledListener {
            target,
            event_type: event_type.to_string(),
            handler: handler.clone(),
            options,
        });
    }

    fn unlisten_all(&mut self, page: &mut Page) -> usize {
        let entry_points = self.registration.originals(page);
        let installed = std::mem::take(&mut self.installed);
        let count = installed.len();
        for listener in installed {
            (entry_points.remove)(
                page,
                listener.target,
                &listener.event_type,
                &listener.handler,
                listener.options,
            );
        }
        count
    }

    /// Everything but inline patching, which needs the state unborrowed. Returns the selection
    /// the session runs with.
    fn begin_session(&mut self, page: &mut Page, root: NodeId) -> SelectedEventTypes {
        if !self.preserve_logs {
            self.clear_logs(page);
        }
        self.popups_seen.clear();
        self.ledger.clear();
        self.mousemove_last = None;

        let selected = self.selected.clone();
        self.session = Some(Session {
            root,
            selected: selected.clone(),
            started_at: page.now_ms(),
        });

        self.install_listeners(page, &selected);
        self.start_watcher(page);
        self.attach_frameworks(page);
        if self.registration.install(page, &self.me) {
            log::debug!(target: LOG_TARGET, "listener registration entry points patched");
        }
        selected
    }

    fn announce_session(
        &mut self,
        page: &mut Page,
        root: NodeId,
        selected: &SelectedEventTypes,
        wrapped: usize,
    ) {
        if wrapped > 0 {
            self.info(page, format!("Wrapped {wrapped} existing inline handlers"));
        }
        let descriptor = filter::describe_node(page, root);
        self.info(page, format!("Tracking element: {descriptor}"));
        let types = selected.active_types();
        if types.is_empty() {
            self.info(page, "No event types selected");
        } else {
            self.info(page, format!("Tracking events: {}", types.join(", ")));
        }
        if self.config.isolate_propagation {
            self.info(page, "Event isolation enabled: in-scope events stop at the tracker");
        }
    }

    /// False when no session was active.
    fn end_session(&mut self, page: &mut Page) -> bool {
        if self.session.is_none() {
            return false;
        }
        let removed = self.unlisten_all(page);
        log::debug!(target: LOG_TARGET, "removed {removed} tracker listeners");
        self.stop_watcher(page);
        self.detach_frameworks(page);
        if self.registration.restore(page) {
            self.info(page, "Restored global listener methods");
        }
        self.ledger.clear();
        self.session = None;
        true
    }
}
