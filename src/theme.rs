use serde::{Deserialize, Serialize};

use crate::page::Page;
use crate::{LOG_TARGET, Result};

/// `localStorage` key holding the user's explicit theme choice.
pub const THEME_STORAGE_KEY: &str = "event-tracker-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Theme of the tracker UI: the stored choice if there is one, else the system preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePreference {
    stored: Option<Theme>,
    system: Theme,
}

impl ThemePreference {
    /// Reads the stored preference once. Unknown stored values are ignored.
    pub fn load(page: &Page, system: Theme) -> Self {
        let stored = page.local_storage_get(THEME_STORAGE_KEY).and_then(|raw| {
            let theme = Theme::parse(raw);
            if theme.is_none() {
                log::debug!(target: LOG_TARGET, "ignoring stored theme {raw:?}");
            }
            theme
        });
        Self { stored, system }
    }

    pub fn current(&self) -> Theme {
        self.stored.unwrap_or(self.system)
    }

    pub fn is_explicit(&self) -> bool {
        self.stored.is_some()
    }

    /// Records an explicit choice and persists it.
    pub fn store(&mut self, page: &mut Page, theme: Theme) -> Result<()> {
        self.stored = Some(theme);
        page.local_storage_set(THEME_STORAGE_KEY, theme.as_str());
        self.apply(page)
    }

    /// A system change only matters while the user has not chosen explicitly.
    pub fn system_changed(&mut self, page: &mut Page, system: Theme) -> Result<()> {
        self.system = system;
        if self.is_explicit() {
            return Ok(());
        }
        self.apply(page)
    }

    /// Sets `data-theme` on the document element.
    pub fn apply(&self, page: &mut Page) -> Result<()> {
        let Some(root) = page.document_element() else {
            return Ok(());
        };
        page.set_attribute(root, "data-theme", self.current().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_system_until_user_chooses() -> Result<()> {
        let mut page = Page::new();
        let mut preference = ThemePreference::load(&page, Theme::Light);
        assert!(!preference.is_explicit());
        preference.apply(&mut page)?;

        preference.system_changed(&mut page, Theme::Dark)?;
        let root = page.document_element();
        let theme_attr = |page: &Page| root.and_then(|root| page.dom().attr(root, "data-theme").map(str::to_string));
        assert_eq!(theme_attr(&page).as_deref(), Some("dark"));

        preference.store(&mut page, Theme::Light)?;
        preference.system_changed(&mut page, Theme::Dark)?;
        assert_eq!(theme_attr(&page).as_deref(), Some("light"));
        assert_eq!(page.local_storage_get(THEME_STORAGE_KEY), Some("light"));

        let reloaded = ThemePreference::load(&page, Theme::Dark);
        assert_eq!(reloaded.current(), Theme::Light);
        Ok(())
    }

    #[test]
    fn garbage_in_storage_is_ignored() {
        let mut page = Page::new();
        page.local_storage_set(THEME_STORAGE_KEY, "sepia");
        let preference = ThemePreference::load(&page, Theme::Dark);
        assert_eq!(preference.current(), Theme::Dark);
        assert!(!preference.is_explicit());
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
    }
}
