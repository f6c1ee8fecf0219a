use std::fmt;

use crate::{Error, LOG_TARGET, Result};

/// Thin wrapper over `fancy_regex` that folds backtracking failures into "no match".
#[derive(Clone)]
pub(crate) struct Pattern {
    source: String,
    backend: fancy_regex::Regex,
}

impl Pattern {
    pub(crate) fn new(pattern: &str) -> Result<Self> {
        Self::build(pattern, false)
    }

    pub(crate) fn case_insensitive(pattern: &str) -> Result<Self> {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let mut builder = fancy_regex::RegexBuilder::new(pattern);
        builder.case_insensitive(case_insensitive);
        let backend = builder
            .build()
            .map_err(|err| Error::Config(format!("invalid pattern {pattern:?}: {err}")))?;
        Ok(Self {
            source: pattern.to_string(),
            backend,
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn is_match(&self, input: &str) -> bool {
        match self.backend.is_match(input) {
            Ok(matched) => matched,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "pattern {:?} failed: {err}", self.source);
                false
            }
        }
    }

    /// Capture groups of the first match; group 0 is the whole match.
    pub(crate) fn captures(&self, input: &str) -> Option<Vec<Option<String>>> {
        let captures = match self.backend.captures(input) {
            Ok(captures) => captures?,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "pattern {:?} failed: {err}", self.source);
                return None;
            }
        };
        Some(
            (0..captures.len())
                .map(|idx| captures.get(idx).map(|m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Text of capture group `group` in the first match.
    pub(crate) fn capture_group(&self, input: &str, group: usize) -> Option<String> {
        self.captures(input)?.into_iter().nth(group).flatten()
    }

    pub(crate) fn replace_all(&self, input: &str, replacement: &str) -> String {
        match self.backend.try_replacen(input, 0, replacement) {
            Ok(replaced) => replaced.into_owned(),
            Err(err) => {
                log::debug!(target: LOG_TARGET, "pattern {:?} failed: {err}", self.source);
                input.to_string()
            }
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_and_groups() -> Result<()> {
        let popup = Pattern::case_insensitive("modal|popup|dialog")?;
        assert!(popup.is_match("My-MODAL-overlay"));
        assert!(!popup.is_match("menu"));

        let location = Pattern::new(r":(\d+):(\d+)$")?;
        assert_eq!(location.capture_group("app.js:12:5", 1).as_deref(), Some("12"));
        assert_eq!(location.capture_group("app.js", 1), None);
        Ok(())
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        assert!(matches!(Pattern::new("("), Err(Error::Config(_))));
    }
}
