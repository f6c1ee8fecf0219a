//! Call-stack snapshots for log entries.
//!
//! The raw input is V8-shaped `Error.stack` text as produced by [`Page::capture_stack`]. Frames
//! that belong to the tracker itself or to the hosting extension are dropped, locations are
//! shortened and every frame with a line number gets a [`SourceRef`] the source viewer can
//! open.

use serde::Serialize;

use crate::config::TrackerConfig;
use crate::page::{Page, SourceLocation};
use crate::pattern::Pattern;
use crate::Result;

/// Frames of the tracker's own handlers always carry this prefix.
const TRACKER_FRAME_MARKER: &str = "at EventTracker.";
const FALLBACK_FRAMES: usize = 2;
const TRACKER_SCRIPT: &str = "chrome-extension://event-tracker/tracker.js";

/// Location of one of the tracker's own callbacks. Frames built from it are always filtered.
pub(crate) fn tracker_location(method: &str, line: u32) -> SourceLocation {
    SourceLocation::new(format!("EventTracker.{method}"), TRACKER_SCRIPT, line, 1)
}

/// A `(path, line, column)` triple a "view source" button points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// The frame line as captured, trimmed.
    pub raw: String,
    /// Location after path shortening, or the raw line when it has none.
    pub location: String,
    pub source: Option<SourceRef>,
}

impl StackFrame {
    /// The frame line with its location replaced by the shortened one.
    pub fn display(&self) -> String {
        match location_of(&self.raw) {
            Some(original) => self.raw.replacen(original, &self.location, 1),
            None => self.raw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedStack {
    pub frames: Vec<StackFrame>,
    /// Filtering removed every frame and these are the first raw frames instead.
    pub fallback: bool,
}

impl FormattedStack {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.frames
            .iter()
            .map(StackFrame::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StackFormatter {
    internal_markers: Vec<String>,
    rewrites: Vec<(Pattern, String)>,
    line_column: Pattern,
}

impl StackFormatter {
    pub(crate) fn new(config: &TrackerConfig) -> Result<Self> {
        let rewrites = config
            .path_rewrites
            .iter()
            .map(|rewrite| Ok((Pattern::new(&rewrite.pattern)?, rewrite.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            internal_markers: config.internal_frame_markers.clone(),
            rewrites,
            line_column: Pattern::new(r":(\d+):(\d+)$")?,
        })
    }

    /// Snapshot of the page's current call stack.
    pub(crate) fn capture(&self, page: &Page) -> Option<FormattedStack> {
        self.format(&page.capture_stack())
    }

    /// `None` when no usable frame is left.
    pub(crate) fn format(&self, raw: &str) -> Option<FormattedStack> {
        let lines: Vec<&str> = raw
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("at "))
            .collect();

        let mut fallback = false;
        let mut kept: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|line| !self.is_internal(line))
            .collect();
        if kept.is_empty() {
            fallback = true;
            kept = lines
                .iter()
                .copied()
                .filter(|line| !line.contains(TRACKER_FRAME_MARKER))
                .take(FALLBACK_FRAMES)
                .collect();
        }
        if kept.is_empty() {
            return None;
        }

        Some(FormattedStack {
            frames: kept.into_iter().map(|line| self.frame(line)).collect(),
            fallback,
        })
    }

    fn is_internal(&self, line: &str) -> bool {
        self.internal_markers
            .iter()
            .any(|marker| line.contains(marker.as_str()))
    }

    fn frame(&self, line: &str) -> StackFrame {
        let Some(location) = location_of(line) else {
            return StackFrame {
                raw: line.to_string(),
                location: line.to_string(),
                source: None,
            };
        };

        let shortened = self.shorten(location);
        let source = self.line_column.captures(location).and_then(|groups| {
            let line = groups.get(1)?.as_deref()?.parse().ok()?;
            let column = groups.get(2)?.as_deref()?.parse().ok()?;
            Some(SourceRef {
                path: self.line_column.replace_all(&shortened, ""),
                line,
                column,
            })
        });
        StackFrame {
            raw: line.to_string(),
            location: shortened,
            source,
        }
    }

    pub(crate) fn shorten(&self, location: &str) -> String {
        self.rewrites
            .iter()
            .fold(location.to_string(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, replacement)
            })
    }
}

/// The `file:line:col` part of a frame: inside trailing parentheses, else after `at `.
fn location_of(line: &str) -> Option<&str> {
    if let Some(inner) = line.strip_suffix(')') {
        if let Some(open) = inner.rfind('(') {
            return Some(&inner[open + 1..]);
        }
    }
    line.strip_prefix("at ")
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}
