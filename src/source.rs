//! "View source" support: locating the script a stack frame points at and showing it with the
//! triggering line highlighted.

use serde::Serialize;

use crate::page::{EventTarget, Handler, ListenerOptions, NodeId, Page, RegistrationEntryPoints};
use crate::stack::{SourceRef, tracker_location};
use crate::{LOG_TARGET, Result};

pub(crate) const SOURCE_VIEWER_ID: &str = "event-tracker-source-viewer";
const SCRIPT_SEPARATOR: &str = "\n\n// ---- next script ----\n\n";

/// Where the text shown by the viewer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum SourceOrigin {
    /// An external `<script src>` fetched from the network.
    External(String),
    /// Every inline `<script>` body, concatenated.
    InlineScripts,
    /// Nothing better was found; the page markup itself.
    PageHtml,
}

impl SourceOrigin {
    pub fn title(&self) -> &str {
        match self {
            Self::External(url) => url,
            Self::InlineScripts => "Inline scripts",
            Self::PageHtml => "Current page HTML",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceView {
    pub origin: SourceOrigin,
    pub code: String,
    pub line: u32,
    pub column: u32,
}

impl SourceView {
    pub fn highlighted_line(&self) -> Option<&str> {
        let index = usize::try_from(self.line).ok()?.checked_sub(1)?;
        self.code.lines().nth(index)
    }
}

/// Decides which text a [`SourceRef`] refers to. External scripts still need fetching.
pub(crate) fn locate(page: &Page, source: &SourceRef) -> Result<(SourceOrigin, Option<String>)> {
    for script in page.query_selector_all("script[src]")? {
        let Some(src) = page.dom().attr(script, "src") else {
            continue;
        };
        let url = page.resolve_url(src);
        if url.contains(&source.path) || source.path.contains(&url) {
            return Ok((SourceOrigin::External(url), None));
        }
    }

    let inline = page
        .query_selector_all("script")?
        .into_iter()
        .filter(|script| !page.dom().has_attr(*script, "src"))
        .map(|script| page.dom().text_content(script))
        .collect::<Vec<_>>()
        .join(SCRIPT_SEPARATOR);
    if !inline.trim().is_empty() {
        return Ok((SourceOrigin::InlineScripts, Some(inline)));
    }

    let html = page
        .document_element()
        .map(|root| page.outer_html(root))
        .unwrap_or_default();
    Ok((SourceOrigin::PageHtml, Some(html)))
}

/// Renders `view` into the single viewer element under `<body>`, replacing what it showed
/// before.
pub(crate) fn show_viewer(
    page: &mut Page,
    entry_points: &RegistrationEntryPoints,
    view: &SourceView,
) -> Result<NodeId> {
    let viewer = match page.get_element_by_id(SOURCE_VIEWER_ID) {
        Some(existing) => {
            page.clear_children(existing)?;
            existing
        }
        None => {
            let viewer = page.create_element("div");
            page.set_attribute(viewer, "id", SOURCE_VIEWER_ID)?;
            page.set_attribute(viewer, "class", "event-tracker-source-viewer")?;
            let parent = page.body().unwrap_or_else(|| page.document());
            page.append_child(parent, viewer)?;
            viewer
        }
    };

    let header = element(page, viewer, "div", "source-viewer-header")?;
    let title = element(page, header, "div", "source-viewer-title")?;
    page.set_text_content(title, view.origin.title())?;
    let close = element(page, header, "div", "source-viewer-close")?;
    page.set_text_content(close, "\u{d7}")?;

    let content = element(page, viewer, "div", "source-viewer-content")?;
    let code = element(page, content, "div", "source-viewer-code")?;
    for (index, text) in view.code.split('\n').enumerate() {
        let line = element(page, code, "div", "line")?;
        if index + 1 == view.line as usize {
            page.add_class(line, "highlighted")?;
        }
        page.set_text_content(line, text)?;
    }

    let close_handler = Handler::new(
        tracker_location("closeSourceViewer", 1360),
        move |page: &mut Page, _event| {
            if let Err(err) = page.dispose(viewer) {
                log::debug!(target: LOG_TARGET, "source viewer already gone: {err}");
            }
            Ok(())
        },
    );
    (entry_points.add)(
        page,
        EventTarget::Node(close),
        "click",
        &close_handler,
        ListenerOptions::bubble(),
    );
    Ok(viewer)
}

fn element(page: &mut Page, parent: NodeId, tag: &str, class: &str) -> Result<NodeId> {
    let node = page.create_element(tag);
    page.set_attribute(node, "class", class)?;
    page.append_child(parent, node)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, line: u32) -> SourceRef {
        SourceRef {
            path: path.to_string(),
            line,
            column: 1,
        }
    }

    #[test]
    fn external_scripts_win_over_inline_ones() -> Result<()> {
        let page = Page::from_html(
            "<script src='/js/app.js'></script><script>var a = 1;</script>",
        )?;
        let (origin, text) = locate(&page, &source("https://page.test/js/app.js", 3))?;
        assert_eq!(origin, SourceOrigin::External("https://page.test/js/app.js".into()));
        assert_eq!(text, None);

        let (origin, text) = locate(&page, &source("script", 1))?;
        assert_eq!(origin, SourceOrigin::InlineScripts);
        assert_eq!(text.as_deref(), Some("var a = 1;"));
        Ok(())
    }

    #[test]
    fn falls_back_to_page_html() -> Result<()> {
        let page = Page::from_html("<p>plain</p>")?;
        let (origin, text) = locate(&page, &source("script", 1))?;
        assert_eq!(origin, SourceOrigin::PageHtml);
        assert!(text.is_some_and(|html| html.contains("<p>plain</p>")));
        Ok(())
    }

    #[test]
    fn viewer_highlights_line_and_closes() -> Result<()> {
        let mut page = Page::new();
        let view = SourceView {
            origin: SourceOrigin::InlineScripts,
            code: "one\ntwo\nthree".into(),
            line: 2,
            column: 1,
        };
        assert_eq!(view.highlighted_line(), Some("two"));

        let entry_points = page.entry_points();
        let viewer = show_viewer(&mut page, &entry_points, &view)?;
        let lines = page.query_selector_all("#event-tracker-source-viewer .line")?;
        assert_eq!(lines.len(), 3);
        assert!(page.dom().has_class(lines[1], "highlighted"));

        // Showing again reuses the same element.
        assert_eq!(show_viewer(&mut page, &entry_points, &view)?, viewer);
        assert_eq!(page.query_selector_all(".source-viewer-code .line")?.len(), 3);

        let close = page.select(".source-viewer-close")?;
        page.click(close)?;
        assert!(page.get_element_by_id(SOURCE_VIEWER_ID).is_none());
        Ok(())
    }
}
