//! Which events and elements the tracker cares about.

use std::collections::HashMap;

use crate::page::{Event, EventTarget, Handler, NodeId, Page, WeakHandler};

/// Classes the tracker's own UI carries.
const TRACKER_CLASS_PREFIX: &str = "event-tracker-";
const TRACKER_CONTAINERS: &str = ".event-tracker-panel, .event-tracker-float-ball, .event-tracker-selector, .event-tracker-source-viewer";

/// True when `event` targets `root` or one of its descendants, or passes through `root`, and
/// does not target the tracker's UI.
pub(crate) fn event_in_scope(
    page: &Page,
    event: &Event,
    root: NodeId,
    output: Option<NodeId>,
) -> bool {
    match event.target_node() {
        Some(node) if is_tracker_element(page, node, output) => false,
        Some(node) if page.dom().contains(root, node) => true,
        _ => event.composed_path().contains(&EventTarget::Node(root)),
    }
}

pub(crate) fn node_in_scope(page: &Page, node: NodeId, root: NodeId, output: Option<NodeId>) -> bool {
    page.dom().contains(root, node) && !is_tracker_element(page, node, output)
}

pub(crate) fn is_tracker_element(page: &Page, node: NodeId, output: Option<NodeId>) -> bool {
    let dom = page.dom();
    if !dom.is_alive(node) {
        return false;
    }
    if output.is_some_and(|output| dom.contains(output, node)) {
        return true;
    }
    if dom
        .class_list(node)
        .iter()
        .any(|class| class.starts_with(TRACKER_CLASS_PREFIX))
    {
        return true;
    }
    matches!(page.closest(node, TRACKER_CONTAINERS), Ok(Some(_)))
}

/// `tag#id.class1.class2`, leaving out the tracker's own classes.
pub(crate) fn describe_node(page: &Page, node: NodeId) -> String {
    let dom = page.dom();
    if node == dom.document() {
        return "document".to_string();
    }
    let Some(tag) = dom.tag_name(node) else {
        return "unknown".to_string();
    };
    let mut out = tag.to_ascii_lowercase();
    if let Some(id) = dom.id_attr(node).filter(|id| !id.is_empty()) {
        out.push('#');
        out.push_str(id);
    }
    for class in dom.class_list(node) {
        if class.starts_with(TRACKER_CLASS_PREFIX) {
            continue;
        }
        out.push('.');
        out.push_str(&class);
    }
    out
}

pub(crate) fn describe_target(page: &Page, target: EventTarget) -> String {
    match target {
        EventTarget::Window => "window".to_string(),
        EventTarget::Node(node) => describe_node(page, node),
    }
}

/// Handlers whose registration has already been logged, keyed by identity.
///
/// Entries hold the handler weakly, so an address reused by a later handler never matches.
#[derive(Debug, Default)]
pub(crate) struct RegistrationLedger {
    seen: HashMap<usize, WeakHandler>,
}

impl RegistrationLedger {
    pub(crate) fn contains(&self, handler: &Handler) -> bool {
        self.seen
            .get(&handler.identity())
            .is_some_and(|weak| weak.is_same(handler))
    }

    /// False if the handler was already recorded.
    pub(crate) fn record(&mut self, handler: &Handler) -> bool {
        if self.contains(handler) {
            return false;
        }
        self.seen.insert(handler.identity(), handler.downgrade());
        true
    }

    pub(crate) fn forget(&mut self, handler: &Handler) -> bool {
        if !self.contains(handler) {
            return false;
        }
        self.seen.remove(&handler.identity()).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SourceLocation;
    use crate::Result;

    #[test]
    fn descriptors_skip_tracker_classes() -> Result<()> {
        let page = Page::from_html(
            "<div id='x' class='card event-tracker-highlight active'><span>t</span></div>",
        )?;
        let div = page.select("#x")?;
        assert_eq!(describe_node(&page, div), "div#x.card.active");
        assert_eq!(describe_node(&page, page.select("#x span")?), "span");
        assert_eq!(describe_node(&page, page.document()), "document");
        assert_eq!(describe_target(&page, EventTarget::Window), "window");
        Ok(())
    }

    #[test]
    fn tracker_ui_is_never_in_scope() -> Result<()> {
        let page = Page::from_html(
            "<div id='x'><p id='p'></p><div class='event-tracker-panel'><b id='b'></b></div></div><div id='out'><i id='i'></i></div>",
        )?;
        let root = page.select("#x")?;
        let output = page.select("#out")?;
        assert!(node_in_scope(&page, page.select("#p")?, root, Some(output)));
        assert!(node_in_scope(&page, root, root, Some(output)));
        assert!(!node_in_scope(&page, page.select("#b")?, root, Some(output)));
        assert!(is_tracker_element(&page, page.select("#i")?, Some(output)));
        assert!(!node_in_scope(&page, page.body().ok_or(crate::Error::Config("body".into()))?, root, None));
        Ok(())
    }

    #[test]
    fn ledger_tracks_identity() {
        let location = SourceLocation::anonymous("app.js", 1, 1);
        let first = Handler::new(location.clone(), |_, _| Ok(()));
        let second = Handler::new(location, |_, _| Ok(()));
        let mut ledger = RegistrationLedger::default();
        assert!(ledger.record(&first));
        assert!(!ledger.record(&first.clone()));
        assert!(!ledger.contains(&second));
        assert!(!ledger.forget(&second));
        assert!(ledger.forget(&first));
        assert!(!ledger.contains(&first));
        assert!(ledger.record(&first));
    }
}
