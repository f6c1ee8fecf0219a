//! Debounced DOM mutation watching: inline patching for inserted content and popup detection.

use std::rc::{Rc, Weak};

use super::filter::{describe_node, is_tracker_element, node_in_scope};
use super::{EventLogEntry, LogPhase, Shared, TrackerState, inline, with_state};
use crate::page::{MutationObserverInit, MutationRecord, NodeId, ObserverId, Page, TimerId};
use crate::LOG_TARGET;

/// Attributes whose changes can show or hide an existing popup.
const WATCHED_ATTRIBUTES: &[&str] = &[
    "class",
    "style",
    "id",
    "hidden",
    "aria-hidden",
    "display",
    "visibility",
];
const POPUP_ATTRIBUTE_HINTS: &[&str] = &["data", "aria", "role", "id", "class"];

#[derive(Debug, Default)]
pub(crate) struct MutationWatcher {
    observer: Option<ObserverId>,
    pending: Vec<MutationRecord>,
    timer: Option<TimerId>,
}

impl TrackerState {
    pub(super) fn start_watcher(&mut self, page: &mut Page) {
        let target = page
            .body()
            .or_else(|| page.document_element())
            .unwrap_or_else(|| page.document());
        let init = MutationObserverInit {
            child_list: true,
            attributes: true,
            attribute_filter: Some(WATCHED_ATTRIBUTES.iter().map(|name| name.to_string()).collect()),
            subtree: true,
        };
        let weak = self.me.clone();
        let callback = Rc::new(move |page: &mut Page, records: Vec<MutationRecord>| {
            with_state(&weak, |state| state.queue_mutations(page, records));
        });
        match page.observe(target, init, callback) {
            Ok(observer) => {
                self.watcher.observer = Some(observer);
                self.info(page, "DOM mutation watcher started");
            }
            Err(err) => log::debug!(target: LOG_TARGET, "mutation watcher not started: {err}"),
        }
    }

    pub(super) fn stop_watcher(&mut self, page: &mut Page) {
        if let Some(observer) = self.watcher.observer.take() {
            page.disconnect(observer);
        }
        if let Some(timer) = self.watcher.timer.take() {
            page.clear_timeout(timer);
        }
        self.watcher.pending.clear();
    }

    /// Keeps records that concern the page and restarts the debounce window.
    fn queue_mutations(&mut self, page: &mut Page, records: Vec<MutationRecord>) {
        let output = self.output();
        let relevant: Vec<MutationRecord> = records
            .into_iter()
            .filter(|record| match record {
                MutationRecord::ChildList {
                    target,
                    added,
                    removed,
                } => {
                    added.iter().any(|node| {
                        page.dom().is_element(*node) && !is_tracker_element(page, *node, output)
                    }) || (!removed.is_empty() && !is_tracker_element(page, *target, output))
                }
                MutationRecord::Attributes { target, .. } => {
                    !is_tracker_element(page, *target, output)
                }
            })
            .collect();
        if relevant.is_empty() || self.session.is_none() {
            return;
        }
        self.watcher.pending.extend(relevant);

        if let Some(timer) = self.watcher.timer.take() {
            page.clear_timeout(timer);
        }
        let weak = self.me.clone();
        let timer = page.set_timeout(self.config.debounce_ms, move |page: &mut Page| {
            process_batch(&weak, page);
        });
        self.watcher.timer = Some(timer);
    }

    /// Runs the popup heuristic on `node` and, unless it is a popup, on its descendants down to
    /// the configured depth.
    pub(super) fn check_for_popup(&mut self, page: &mut Page, node: NodeId, depth: usize) {
        if !page.dom().is_element(node) || is_tracker_element(page, node, self.output()) {
            return;
        }
        if self.maybe_popup(page, node) {
            self.report_popup(page, node);
            return;
        }
        if depth == 0 {
            return;
        }
        for child in page.dom().element_children(node) {
            self.check_for_popup(page, child, depth - 1);
        }
    }

    /// Records `node` as seen when it qualifies. A node already reported this session never
    /// qualifies again.
    fn maybe_popup(&mut self, page: &Page, node: NodeId) -> bool {
        let signature = describe_node(page, node);
        if self.popups_seen.contains(&signature) {
            return false;
        }
        let dom = page.dom();
        let is_dialog = dom.tag_name(node) == Some("dialog");
        let popup_class = dom
            .attr(node, "class")
            .is_some_and(|class| self.heuristics.popup_class.is_match(class));
        let overlay = page.computed_style(node).is_ok_and(|style| {
            style.is_visible()
                && style.is_positioned_overlay()
                && style
                    .z_index_value()
                    .is_some_and(|z| z > self.config.popup_z_index_threshold)
        });
        if is_dialog || popup_class || overlay {
            self.popups_seen.insert(signature);
            return true;
        }
        false
    }

    fn report_popup(&mut self, page: &mut Page, node: NodeId) {
        let descriptor = describe_node(page, node);
        let entry = EventLogEntry::message(
            LogPhase::Popup,
            format!("Popup detected: {descriptor}"),
            page.now_ms(),
        )
        .with_target(descriptor);
        self.log(page, entry);

        let dom = page.dom();
        let style = dom.attr(node, "style").map(str::to_string);
        let hints = dom
            .attrs(node)
            .iter()
            .filter(|(name, _)| POPUP_ATTRIBUTE_HINTS.iter().any(|hint| name.contains(hint)))
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect::<Vec<_>>();
        if let Some(style) = style {
            self.info(page, format!("Popup inline style: {style}"));
        }
        if !hints.is_empty() {
            self.info(page, format!("Popup attributes: {}", hints.join(", ")));
        }
    }
}

/// Debounce expiry: forgets disposed elements, patches inserted in-scope ones and looks for
/// popups.
fn process_batch(shared: &Weak<Shared>, page: &mut Page) {
    let Some(strong) = shared.upgrade() else {
        return;
    };
    let Some((records, session)) = with_state(shared, |state| {
        state.watcher.timer = None;
        let records = std::mem::take(&mut state.watcher.pending);
        let session = state
            .session
            .as_ref()
            .map(|session| (session.root, session.selected.clone(), state.output()));
        (records, session)
    }) else {
        return;
    };
    let Some((root, selected, output)) = session else {
        return;
    };

    let pruned = inline::prune_disposed(&strong, page);
    if pruned > 0 {
        log::debug!(target: LOG_TARGET, "forgot {pruned} disposed inline-patched elements");
    }

    let depth = with_state(shared, |state| state.config.popup_scan_depth).unwrap_or(0);
    for record in records {
        match record {
            MutationRecord::ChildList { added, .. } => {
                for node in added {
                    if !page.dom().is_element(node) {
                        continue;
                    }
                    with_state(shared, |state| state.check_for_popup(page, node, depth));
                    if node_in_scope(page, node, root, output) {
                        inline::patch_subtree(&strong, page, node, &selected);
                    }
                }
            }
            MutationRecord::Attributes { target, .. } => {
                with_state(shared, |state| state.check_for_popup(page, target, depth));
            }
        }
    }
}
