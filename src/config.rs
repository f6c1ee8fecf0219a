use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Log entry categories the settings UI can switch on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Event,
    Info,
    Action,
    Popup,
    Navigation,
    Stack,
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Info => "info",
            Self::Action => "action",
            Self::Popup => "popup",
            Self::Navigation => "navigation",
            Self::Stack => "stack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogLevelConfig {
    pub event: bool,
    pub info: bool,
    pub action: bool,
    pub popup: bool,
    pub navigation: bool,
    pub stack: bool,
}

impl LogLevelConfig {
    pub fn is_enabled(&self, category: LogCategory) -> bool {
        match category {
            LogCategory::Event => self.event,
            LogCategory::Info => self.info,
            LogCategory::Action => self.action,
            LogCategory::Popup => self.popup,
            LogCategory::Navigation => self.navigation,
            LogCategory::Stack => self.stack,
        }
    }

    pub fn set(&mut self, category: LogCategory, enabled: bool) {
        let slot = match category {
            LogCategory::Event => &mut self.event,
            LogCategory::Info => &mut self.info,
            LogCategory::Action => &mut self.action,
            LogCategory::Popup => &mut self.popup,
            LogCategory::Navigation => &mut self.navigation,
            LogCategory::Stack => &mut self.stack,
        };
        *slot = enabled;
    }
}

impl Default for LogLevelConfig {
    fn default() -> Self {
        Self {
            event: true,
            info: true,
            action: true,
            popup: true,
            navigation: true,
            stack: true,
        }
    }
}

/// Regex rewrite applied to every stack frame location, first match wins per rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub pattern: String,
    pub replacement: String,
}

impl PathRewrite {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum interval between two handled `mousemove` events.
    pub throttle_ms: i64,
    /// Quiet period before a batch of mutation records is processed.
    pub debounce_ms: i64,
    /// Keep in-scope events away from page listeners outside the tracked subtree.
    pub isolate_propagation: bool,
    pub popup_scan_depth: usize,
    pub popup_z_index_threshold: i64,
    pub log_levels: LogLevelConfig,
    /// Attach a stack to inline-handler trigger entries.
    pub inline_stack: bool,
    /// Stack frames containing any of these are dropped.
    pub internal_frame_markers: Vec<String>,
    pub path_rewrites: Vec<PathRewrite>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 100,
            debounce_ms: 50,
            isolate_propagation: true,
            popup_scan_depth: 2,
            popup_z_index_threshold: 10,
            log_levels: LogLevelConfig::default(),
            inline_stack: true,
            internal_frame_markers: vec![
                "at EventTracker.".to_string(),
                "userscript.html?name=DOM".to_string(),
                "chrome-extension://".to_string(),
            ],
            path_rewrites: vec![PathRewrite::new(r"^.*/userscript\.html\?.*?:", "script:")],
        }
    }
}

impl TrackerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| Error::Config(format!("tracker config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| Error::Config(format!("tracker config: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.throttle_ms < 0 {
            return Err(Error::Config("throttle_ms must not be negative".into()));
        }
        if self.debounce_ms < 0 {
            return Err(Error::Config("debounce_ms must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() -> Result<()> {
        let config = TrackerConfig::from_json(
            r#"{ "throttle_ms": 250, "log_levels": { "stack": false } }"#,
        )?;
        assert_eq!(config.throttle_ms, 250);
        assert_eq!(config.debounce_ms, 50);
        assert!(config.isolate_propagation);
        assert!(!config.log_levels.stack);
        assert!(config.log_levels.event);
        assert_eq!(config.internal_frame_markers.len(), 3);
        Ok(())
    }

    #[test]
    fn rejects_bad_json_and_negative_intervals() {
        assert!(matches!(TrackerConfig::from_json("{"), Err(Error::Config(_))));
        assert!(matches!(
            TrackerConfig::from_json(r#"{ "debounce_ms": -1 }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn json_round_trip() -> Result<()> {
        let mut config = TrackerConfig::default();
        config.isolate_propagation = false;
        config.log_levels.set(LogCategory::Popup, false);
        let back = TrackerConfig::from_json(&config.to_json()?)?;
        assert_eq!(back, config);
        assert!(!back.log_levels.is_enabled(LogCategory::Popup));
        Ok(())
    }
}
