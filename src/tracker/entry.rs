use serde::Serialize;

use crate::config::LogCategory;
use crate::stack::FormattedStack;

/// Where in the tracker an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPhase {
    Capture,
    Bubble,
    Inline,
    Navigation,
    Popup,
    Action,
    Info,
}

impl LogPhase {
    /// Settings category that gates entries of this phase.
    pub fn category(self) -> LogCategory {
        match self {
            Self::Capture | Self::Bubble => LogCategory::Event,
            Self::Inline | Self::Info => LogCategory::Info,
            Self::Navigation => LogCategory::Navigation,
            Self::Popup => LogCategory::Popup,
            Self::Action => LogCategory::Action,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Capture => "capture phase",
            Self::Bubble => "bubble phase",
            Self::Inline => "inline handler",
            Self::Navigation => "navigation",
            Self::Popup => "popup",
            Self::Action => "action",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogEntry {
    pub event_type: Option<String>,
    pub phase: LogPhase,
    /// `tag#id.class` descriptor of the element involved, if any.
    pub target: Option<String>,
    pub message: String,
    pub timestamp_ms: i64,
    pub stack: Option<FormattedStack>,
}

impl EventLogEntry {
    pub(crate) fn event(
        event_type: &str,
        phase: LogPhase,
        target: String,
        timestamp_ms: i64,
        stack: Option<FormattedStack>,
    ) -> Self {
        Self {
            message: format!("{event_type} ({}) on {target}", phase.label()),
            event_type: Some(event_type.to_string()),
            phase,
            target: Some(target),
            timestamp_ms,
            stack,
        }
    }

    pub(crate) fn message(phase: LogPhase, message: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            event_type: None,
            phase,
            target: None,
            message: message.into(),
            timestamp_ms,
            stack: None,
        }
    }

    pub(crate) fn with_event_type(mut self, event_type: &str) -> Self {
        self.event_type = Some(event_type.to_string());
        self
    }

    pub(crate) fn with_target(mut self, target: String) -> Self {
        self.target = Some(target);
        self
    }

    pub(crate) fn with_stack(mut self, stack: Option<FormattedStack>) -> Self {
        self.stack = stack;
        self
    }

    pub fn category(&self) -> LogCategory {
        self.phase.category()
    }
}
