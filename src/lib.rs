//! Event interception and bookkeeping core for an in-page DOM event tracker.
//!
//! The crate has two halves:
//!
//! * [`page`]: a deterministic, single-threaded page host (DOM arena, capture/bubble
//!   dispatch, replaceable listener-registration entry points, inline handler property
//!   descriptors, mutation observers, virtual timers). It stands in for the browser tab the
//!   tracker is injected into.
//! * [`EventTracker`]: picks one subtree of that page, observes which events fire on it and in
//!   which phase, records the call stack that triggered them, and isolates in-scope events from
//!   the rest of the page until tracking stops.
//!
//! ```
//! use dom_event_tracker::{EventTracker, Page, LogPhase, SelectedEventTypes};
//!
//! # fn main() -> dom_event_tracker::Result<()> {
//! let mut page = Page::from_html(
//!     "<div id='x'><button>go</button></div><div class='event-tracker-output' id='out'></div>",
//! )?;
//! let root = page.select("#x")?;
//! let button = page.select("#x button")?;
//! let output = page.select("#out")?;
//!
//! let tracker = EventTracker::new(output)?;
//! tracker.set_selected_event_types(&mut page, SelectedEventTypes::only(["click"]));
//! tracker.start_tracking(&mut page, root);
//! page.click(button)?;
//!
//! assert_eq!(tracker.entries_with_phase(LogPhase::Capture).len(), 1);
//! assert_eq!(tracker.entries_with_phase(LogPhase::Bubble).len(), 1);
//! tracker.stop_tracking(&mut page);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod config;
mod error;
pub mod page;
mod pattern;
mod render;
mod source;
mod stack;
mod theme;
mod tracker;
mod weak;

pub use catalog::{EVENT_CATEGORIES, EventCategory, EventTypeCatalog, NAVIGATION_EVENT_TYPES, SelectedEventTypes};
pub use config::{LogCategory, LogLevelConfig, PathRewrite, TrackerConfig};
pub use error::{Error, Result};
pub use page::{
    CallArgs, DispatchOutcome, Event, EventInit, EventPhase, EventTarget, Function, Handler,
    ListenerOptions, NodeId, Page, ScriptError, SourceLocation, Value,
};
pub use source::{SourceOrigin, SourceView};
pub use stack::{FormattedStack, SourceRef, StackFrame};
pub use theme::{THEME_STORAGE_KEY, Theme, ThemePreference};
pub use tracker::{EventLogEntry, EventTracker, Framework, LogPhase};

/// `log` target used by every diagnostic the crate emits.
pub(crate) const LOG_TARGET: &str = "dom_event_tracker";
