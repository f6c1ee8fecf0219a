//! Specialised handlers for clicks, form submits, mouse moves and navigation.

use super::filter::describe_node;
use super::{EventLogEntry, LogPhase, TrackerState, with_state};
use crate::page::{Event, NodeId, Page, SelectorList};
use crate::pattern::Pattern;
use crate::{LOG_TARGET, Result};

const INTERACTIVE: &str = "a, button, [role=button], input[type=button], input[type=submit], .btn";
const TRIGGER_ATTRIBUTES: &[&str] = &["data-toggle", "data-target", "data-modal", "aria-haspopup"];
const CLICKABLE_CONTAINER: &str = "[onclick], [data-toggle], [data-lightbox], [data-fancybox]";
const GALLERY_CONTAINER: &str = ".product, .gallery, .carousel, .slideshow";
const FORM_FIELDS: &str = "input, select, textarea";
const FILE_INPUT: &str = "input[type=file]";
const TRIGGER_FOLLOW_UP_MS: i64 = 100;

/// Class and attribute patterns the heuristics match against.
#[derive(Debug)]
pub(crate) struct Heuristics {
    pub(super) trigger_class: Pattern,
    pub(super) popup_onclick: Pattern,
    pub(super) gallery_image: Pattern,
    pub(super) popup_class: Pattern,
}

impl Heuristics {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            trigger_class: Pattern::case_insensitive("modal|popup|dialog|lightbox|toggle|dropdown")?,
            popup_onclick: Pattern::case_insensitive("show|open|toggle|pop|modal|alert|confirm|prompt")?,
            gallery_image: Pattern::case_insensitive("product|gallery|preview|thumbnail")?,
            popup_class: Pattern::case_insensitive("modal|popup|dialog|overlay|lightbox|toast")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Anchor,
    Javascript,
    Mail,
    Phone,
    External,
    Relative,
}

impl LinkKind {
    fn classify(href: &str) -> Self {
        if href.starts_with('#') {
            Self::Anchor
        } else if href.starts_with("javascript:") {
            Self::Javascript
        } else if href.starts_with("mailto:") {
            Self::Mail
        } else if href.starts_with("tel:") {
            Self::Phone
        } else if href.starts_with("http") || href.starts_with("//") {
            Self::External
        } else {
            Self::Relative
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Anchor => "in-page anchor",
            Self::Javascript => "javascript",
            Self::Mail => "mail",
            Self::Phone => "phone",
            Self::External => "external link",
            Self::Relative => "relative link",
        }
    }

    /// Kinds that would navigate the current tab.
    fn navigates(self) -> bool {
        matches!(self, Self::Anchor | Self::External | Self::Relative)
    }
}

fn closest(page: &Page, node: NodeId, selector: &str) -> Option<NodeId> {
    match page.closest(node, selector) {
        Ok(found) => found,
        Err(err) => {
            log::debug!(target: LOG_TARGET, "closest({selector}) failed: {err}");
            None
        }
    }
}

fn count_within(page: &Page, root: NodeId, selector: &str) -> usize {
    SelectorList::parse(selector)
        .map(|list| list.query_all(page.dom(), root).len())
        .unwrap_or(0)
}

fn url_without_hash(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

fn hash_of(url: Option<&str>) -> String {
    match url.and_then(|url| url.find('#').map(|at| &url[at..])) {
        Some(hash) if hash.len() > 1 => hash.to_string(),
        _ => "(none)".to_string(),
    }
}

impl TrackerState {
    /// Link, button and image heuristics for in-scope clicks.
    pub(super) fn on_click(&mut self, page: &mut Page, event: &mut Event) {
        let Some(root) = self.root() else {
            return;
        };
        let Some(target) = event.target_node() else {
            return;
        };
        if !self.in_scope(page, event) {
            return;
        }
        if self.config.isolate_propagation {
            event.isolate_within(root);
        }

        self.inspect_trigger(page, target);
        self.inspect_link(page, event, target);
        self.inspect_image(page, target);
    }

    fn inspect_trigger(&mut self, page: &mut Page, target: NodeId) {
        let Some(trigger) = closest(page, target, INTERACTIVE) else {
            return;
        };
        let dom = page.dom();
        let class_hit = dom
            .attr(trigger, "class")
            .is_some_and(|class| self.heuristics.trigger_class.is_match(class));
        let attr_hit = TRIGGER_ATTRIBUTES.iter().any(|name| dom.has_attr(trigger, name));
        if !class_hit && !attr_hit {
            return;
        }

        let attributes = dom
            .attrs(trigger)
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let descriptor = describe_node(page, trigger);
        self.info(page, format!("Clicked a possible popup trigger: {descriptor}"));
        self.info(page, format!("Trigger attributes: {attributes}"));

        let weak = self.me.clone();
        page.set_timeout(TRIGGER_FOLLOW_UP_MS, move |page: &mut Page| {
            with_state(&weak, |state| {
                if state.session.is_some() {
                    state.info(page, "Checking DOM changes after the trigger click");
                }
            });
        });
    }

    fn inspect_link(&mut self, page: &mut Page, event: &mut Event, target: NodeId) {
        let Some(link) = closest(page, target, "a[href]") else {
            return;
        };
        let dom = page.dom();
        let href = dom.attr(link, "href").unwrap_or_default().to_string();
        let link_target = dom.attr(link, "target").map(str::to_string);
        let rel = dom.attr(link, "rel").map(str::to_string);
        let onclick = dom.attr(link, "onclick").map(str::to_string);
        let kind = LinkKind::classify(&href);
        let descriptor = describe_node(page, link);

        let mut modified = false;
        if kind.navigates() && link_target.as_deref() != Some("_blank") {
            event.prevent_default();
            let url = match kind {
                LinkKind::Anchor => format!("{}{href}", url_without_hash(page.location_href())),
                _ => page.resolve_url(&href),
            };
            page.open_window(&url, "_blank");
            let entry = EventLogEntry::message(
                LogPhase::Action,
                format!("Intercepted {} to {href}, opened in a new tab", kind.label()),
                page.now_ms(),
            )
            .with_event_type("click")
            .with_target(descriptor.clone());
            self.log(page, entry);
            modified = true;
        }

        let mut details = format!("Link: {}, href: {href}", kind.label());
        if let Some(link_target) = &link_target {
            details.push_str(&format!(", target: {link_target}"));
        }
        if let Some(rel) = &rel {
            details.push_str(&format!(", rel: {rel}"));
        }
        if let Some(onclick) = &onclick {
            details.push_str(", has onclick");
            if self.heuristics.popup_onclick.is_match(onclick) {
                self.info(page, format!("Link onclick may open a popup: {onclick}"));
            }
        }
        if modified {
            return;
        }
        let entry = EventLogEntry::message(LogPhase::Action, details, page.now_ms())
            .with_event_type("click")
            .with_target(descriptor);
        self.log(page, entry);

        let weak = self.me.clone();
        let serial = event.serial();
        page.set_timeout(0, move |page: &mut Page| {
            let prevented = page
                .dispatch_outcome(serial)
                .is_some_and(|outcome| outcome.default_prevented);
            if prevented {
                with_state(&weak, |state| {
                    state.info(page, "Default navigation was prevented by page code")
                });
            }
        });
    }

    fn inspect_image(&mut self, page: &mut Page, target: NodeId) {
        let image = if page.dom().tag_name(target) == Some("img") {
            Some(target)
        } else {
            closest(page, target, "img")
        };
        let Some(image) = image else {
            return;
        };
        let descriptor = describe_node(page, image);
        self.info(page, format!("Image click: {descriptor}"));

        if let Some(container) = closest(page, image, CLICKABLE_CONTAINER) {
            let container = describe_node(page, container);
            self.info(page, format!("Image sits in a clickable container: {container}"));
        }
        let gallery_class = page
            .dom()
            .attr(image, "class")
            .is_some_and(|class| self.heuristics.gallery_image.is_match(class));
        if gallery_class || closest(page, image, GALLERY_CONTAINER).is_some() {
            self.info(page, "Image belongs to a gallery or product view");
        }
    }

    pub(super) fn on_submit(&mut self, page: &mut Page, event: &mut Event) {
        let Some(root) = self.root() else {
            return;
        };
        let Some(target) = event.target_node() else {
            return;
        };
        if !self.in_scope(page, event) {
            return;
        }
        if self.config.isolate_propagation {
            event.isolate_within(root);
        }
        let form = closest(page, target, "form").unwrap_or(target);
        let dom = page.dom();
        let action = dom
            .attr(form, "action")
            .filter(|action| !action.is_empty())
            .unwrap_or("current page")
            .to_string();
        let method = dom
            .attr(form, "method")
            .filter(|method| !method.is_empty())
            .map_or_else(|| "GET".to_string(), str::to_ascii_uppercase);
        let fields = count_within(page, form, FORM_FIELDS);
        let uploads = count_within(page, form, FILE_INPUT) > 0;

        let mut message = format!("Form submit: action={action}, method={method}, {fields} fields");
        if uploads {
            message.push_str(", includes a file upload");
        }
        let entry = EventLogEntry::message(LogPhase::Action, message, page.now_ms())
            .with_event_type("submit")
            .with_target(describe_node(page, form));
        self.log(page, entry);

        let weak = self.me.clone();
        let serial = event.serial();
        page.set_timeout(0, move |page: &mut Page| {
            let prevented = page
                .dispatch_outcome(serial)
                .is_some_and(|outcome| outcome.default_prevented);
            if prevented {
                with_state(&weak, |state| {
                    state.info(page, "Default form submission was prevented")
                });
            }
        });
    }

    /// Isolates in-scope mouse moves at most once per throttle window, without logging.
    pub(super) fn on_mousemove(&mut self, page: &mut Page, event: &mut Event) {
        let now = page.now_ms();
        if self
            .mousemove_last
            .is_some_and(|last| now - last < self.config.throttle_ms)
        {
            return;
        }
        self.mousemove_last = Some(now);
        let Some(root) = self.root() else {
            return;
        };
        if self.config.isolate_propagation && self.in_scope(page, event) {
            event.isolate_within(root);
        }
    }

    /// Window-level navigation events. Never isolated.
    pub(super) fn on_navigation(&mut self, page: &mut Page, event: &mut Event) {
        if self.session.is_none() {
            return;
        }
        let detail = event.navigation().cloned().unwrap_or_default();
        let details = match event.event_type() {
            "hashchange" => format!(
                "from {} to {}",
                hash_of(detail.old_url.as_deref()),
                hash_of(detail.new_url.as_deref())
            ),
            "popstate" if detail.has_state => "with state".to_string(),
            "popstate" => "without state".to_string(),
            "pageshow" if detail.persisted => "restored from the back-forward cache".to_string(),
            "pageshow" => "initial load".to_string(),
            "pagehide" if detail.persisted => "entering the back-forward cache".to_string(),
            "pagehide" => "unloading".to_string(),
            other => other.to_string(),
        };
        let entry = EventLogEntry::message(
            LogPhase::Navigation,
            format!("Navigation event: {} ({details})", event.event_type()),
            page.now_ms(),
        )
        .with_event_type(event.event_type())
        .with_target("window".to_string())
        .with_stack(self.stack(page));
        self.log(page, entry);
    }
}
