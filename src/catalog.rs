use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventCategory {
    pub name: &'static str,
    pub event_types: &'static [&'static str],
}

/// Every event type the tracker can follow, grouped the way the selector UI shows them.
pub const EVENT_CATEGORIES: &[EventCategory] = &[
    EventCategory {
        name: "Mouse",
        event_types: &[
            "click",
            "dblclick",
            "mousedown",
            "mouseup",
            "mouseover",
            "mouseout",
            "mousemove",
        ],
    },
    EventCategory {
        name: "Keyboard",
        event_types: &["keydown", "keyup", "keypress"],
    },
    EventCategory {
        name: "Form",
        event_types: &["focus", "blur", "change", "input", "submit", "reset"],
    },
    EventCategory {
        name: "Drag",
        event_types: &[
            "drag",
            "dragstart",
            "dragend",
            "dragover",
            "dragenter",
            "dragleave",
            "drop",
        ],
    },
    EventCategory {
        name: "View",
        event_types: &["scroll", "resize", "load", "unload", "beforeunload"],
    },
    EventCategory {
        name: "Touch",
        event_types: &["touchstart", "touchmove", "touchend", "touchcancel"],
    },
    EventCategory {
        name: "Animation",
        event_types: &[
            "animationstart",
            "animationend",
            "animationiteration",
            "transitionend",
        ],
    },
    EventCategory {
        name: "Navigation",
        event_types: &["hashchange", "popstate", "pagehide", "pageshow"],
    },
];

/// Window-level events that are logged but never isolated.
pub const NAVIGATION_EVENT_TYPES: &[&str] = &["hashchange", "popstate", "pageshow", "pagehide"];

/// Read-only view over [`EVENT_CATEGORIES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTypeCatalog;

impl EventTypeCatalog {
    pub fn categories(&self) -> &'static [EventCategory] {
        EVENT_CATEGORIES
    }

    pub fn category(&self, name: &str) -> Option<&'static EventCategory> {
        EVENT_CATEGORIES
            .iter()
            .find(|category| category.name.eq_ignore_ascii_case(name))
    }

    /// All event types in catalog order.
    pub fn event_types(&self) -> impl Iterator<Item = &'static str> {
        EVENT_CATEGORIES
            .iter()
            .flat_map(|category| category.event_types.iter().copied())
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.event_types().any(|known| known == event_type)
    }

    pub fn category_of(&self, event_type: &str) -> Option<&'static str> {
        EVENT_CATEGORIES
            .iter()
            .find(|category| category.event_types.contains(&event_type))
            .map(|category| category.name)
    }
}

/// The user's opt-in set: event type name to enabled flag.
///
/// Names outside the catalog are allowed; they are tracked like any other type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedEventTypes {
    types: BTreeMap<String, bool>,
}

impl SelectedEventTypes {
    /// Every catalog type enabled.
    pub fn all() -> Self {
        Self {
            types: EventTypeCatalog
                .event_types()
                .map(|event_type| (event_type.to_string(), true))
                .collect(),
        }
    }

    /// Every catalog type present but disabled.
    pub fn none() -> Self {
        let mut selected = Self::all();
        selected.clear();
        selected
    }

    pub fn only<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = Self::none();
        for event_type in event_types {
            selected.set(event_type.as_ref(), true);
        }
        selected
    }

    pub fn is_selected(&self, event_type: &str) -> bool {
        self.types.get(event_type).copied().unwrap_or(false)
    }

    pub fn set(&mut self, event_type: &str, enabled: bool) {
        self.types.insert(event_type.to_string(), enabled);
    }

    pub fn select_all(&mut self) {
        for enabled in self.types.values_mut() {
            *enabled = true;
        }
    }

    pub fn clear(&mut self) {
        for enabled in self.types.values_mut() {
            *enabled = false;
        }
    }

    /// Enables every type of `category`. Returns false (and changes nothing) for an unknown
    /// category.
    pub fn select_group(&mut self, category: &str) -> bool {
        let Some(category) = EventTypeCatalog.category(category) else {
            return false;
        };
        for event_type in category.event_types {
            self.set(event_type, true);
        }
        true
    }

    /// Enabled types: catalog order first, then extra names sorted.
    pub fn active_types(&self) -> Vec<String> {
        let catalog = EventTypeCatalog;
        let mut out: Vec<String> = catalog
            .event_types()
            .filter(|event_type| self.is_selected(event_type))
            .map(str::to_string)
            .collect();
        out.extend(
            self.types
                .iter()
                .filter(|(name, enabled)| **enabled && !catalog.contains(name))
                .map(|(name, _)| name.clone()),
        );
        out
    }

    pub fn any_selected(&self, event_types: &[&str]) -> bool {
        event_types.iter().any(|event_type| self.is_selected(event_type))
    }
}

impl Default for SelectedEventTypes {
    fn default() -> Self {
        Self::all()
    }
}
