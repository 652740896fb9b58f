//! Theme State
//!
//! Light/dark preference: read once at startup, applied to the presentation
//! layer and persisted immediately on every change.

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;

use crate::storage::Persistence;

/// Presentation class toggled on the root element for the dark theme
pub const DARK_CLASS: &str = "dark";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a theme becomes visible
pub trait Presentation: Send + Sync {
    fn apply_theme(&self, theme: Theme);
}

/// Class list of the document root
#[derive(Debug, Default)]
pub struct RootClasses {
    classes: Mutex<BTreeSet<String>>,
}

impl RootClasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.lock().contains(class)
    }

    /// Space-separated class attribute value
    pub fn class_attr(&self) -> String {
        self.classes
            .lock()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Presentation for RootClasses {
    fn apply_theme(&self, theme: Theme) {
        let mut classes = self.classes.lock();
        match theme {
            Theme::Dark => classes.insert(DARK_CLASS.to_string()),
            Theme::Light => classes.remove(DARK_CLASS),
        };
    }
}

/// The live theme preference
pub struct ThemeState {
    current: Theme,
    persistence: Persistence,
}

impl ThemeState {
    /// Read the stored theme (default light), then apply and persist it
    pub fn init(persistence: Persistence, presentation: &dyn Presentation) -> Self {
        let current = persistence.load_theme();
        let state = Self {
            current,
            persistence,
        };
        state.commit(presentation);
        state
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn set(&mut self, theme: Theme, presentation: &dyn Presentation) {
        self.current = theme;
        self.commit(presentation);
    }

    /// Flip between light and dark; returns the new theme
    pub fn toggle(&mut self, presentation: &dyn Presentation) -> Theme {
        self.set(self.current.toggled(), presentation);
        self.current
    }

    fn commit(&self, presentation: &dyn Presentation) {
        presentation.apply_theme(self.current);
        self.persistence.save_theme(self.current);
        log::debug!("Theme is now {}", self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(Theme::parse(" light\n"), Some(Theme::Light));
        assert_eq!(Theme::parse("Dark"), None);
        assert_eq!(Theme::Dark.to_string(), "dark");
    }

    #[test]
    fn test_init_defaults_to_light_and_persists() {
        let persistence = Persistence::in_memory();
        let root = RootClasses::new();
        let state = ThemeState::init(persistence.clone(), &root);

        assert_eq!(state.current(), Theme::Light);
        assert!(!root.contains(DARK_CLASS));
        assert_eq!(persistence.load_theme(), Theme::Light);
    }

    #[test]
    fn test_toggle_applies_and_persists_immediately() {
        let persistence = Persistence::in_memory();
        let root = RootClasses::new();
        let mut state = ThemeState::init(persistence.clone(), &root);

        assert_eq!(state.toggle(&root), Theme::Dark);
        assert_eq!(root.class_attr(), "dark");
        assert_eq!(persistence.load_theme(), Theme::Dark);

        assert_eq!(state.toggle(&root), Theme::Light);
        assert_eq!(root.class_attr(), "");
        assert_eq!(persistence.load_theme(), Theme::Light);
    }

    #[test]
    fn test_init_restores_stored_theme() {
        let persistence = Persistence::in_memory();
        persistence.save_theme(Theme::Dark);
        let root = RootClasses::new();

        let state = ThemeState::init(persistence, &root);
        assert_eq!(state.current(), Theme::Dark);
        assert!(root.contains(DARK_CLASS));
    }
}
