//! Persisted ui preferences: color theme and sidebar state.
//!
//! Stored as a flat json object of string values,
//! `{"theme": "dark", "sidebarCollapsed": "false"}`. Other keys in the file
//! are kept untouched.

use std::{
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use snafu::prelude::*;

const THEME_KEY: &str = "theme";
const SIDEBAR_KEY: &str = "sidebarCollapsed";

/// Read or write preferences file error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(prefs_error), context(suffix(false)))]
pub enum PrefsError {
    /// read file failed
    #[snafu(display("read preferences {} failed: {source}", path.display()))]
    ReadFailed {
        /// file path
        path: PathBuf,
        /// source error
        source: std::io::Error,
    },

    /// write file failed
    #[snafu(display("write preferences {} failed: {source}", path.display()))]
    WriteFailed {
        /// file path
        path: PathBuf,
        /// source error
        source: std::io::Error,
    },

    /// encode as json failed
    #[snafu(display("encode preferences failed: {source}"))]
    EncodeFailed {
        /// source error
        source: serde_json::Error,
    },
}

/// Color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    /// light background
    Light,
    /// dark background
    Dark,
}

impl Theme {
    /// stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// the other theme
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferences backed by a json file, written on every change.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    stored: Map<String, Value>,
    theme: Theme,
    sidebar_collapsed: bool,
}

impl Preferences {
    /// Load from `path`.
    ///
    /// A missing file, unparsable content or missing values fall back to
    /// `system_theme` and an expanded sidebar.
    pub fn load<P: Into<PathBuf>>(path: P, system_theme: Theme) -> Result<Self, PrefsError> {
        let path = path.into();

        let stored = match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<Map<String, Value>>(&data) {
                Ok(stored) => stored,
                Err(e) => {
                    log::warn!("Ignore broken preferences {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e).context(prefs_error::ReadFailed { path }),
        };

        let theme = stored
            .get(THEME_KEY)
            .and_then(Value::as_str)
            .and_then(Theme::parse)
            .unwrap_or(system_theme);

        let sidebar_collapsed = stored.get(SIDEBAR_KEY).and_then(Value::as_str) == Some("true");

        Ok(Self {
            path,
            stored,
            theme,
            sidebar_collapsed,
        })
    }

    /// file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// current theme
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// check if theme is dark
    pub fn is_dark(&self) -> bool {
        self.theme == Theme::Dark
    }

    /// check if sidebar is collapsed
    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    /// Set theme and save
    pub fn set_theme(&mut self, theme: Theme) -> Result<(), PrefsError> {
        self.theme = theme;
        self.save()
    }

    /// Switch theme and save, returns the new theme
    pub fn toggle_theme(&mut self) -> Result<Theme, PrefsError> {
        self.set_theme(self.theme.toggled())?;
        Ok(self.theme)
    }

    /// Set sidebar state and save
    pub fn set_sidebar_collapsed(&mut self, collapsed: bool) -> Result<(), PrefsError> {
        self.sidebar_collapsed = collapsed;
        self.save()
    }

    /// Switch sidebar state and save, returns the new state
    pub fn toggle_sidebar(&mut self) -> Result<bool, PrefsError> {
        self.set_sidebar_collapsed(!self.sidebar_collapsed)?;
        Ok(self.sidebar_collapsed)
    }

    /// Write current values to file
    pub fn save(&mut self) -> Result<(), PrefsError> {
        self.stored.insert(
            THEME_KEY.to_string(),
            Value::String(self.theme.as_str().to_string()),
        );
        self.stored.insert(
            SIDEBAR_KEY.to_string(),
            Value::String(self.sidebar_collapsed.to_string()),
        );

        let data = serde_json::to_vec_pretty(&self.stored).context(prefs_error::EncodeFailed)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|_| prefs_error::WriteFailed {
                path: dir.to_path_buf(),
            })?;
        }

        std::fs::write(&self.path, data).with_context(|_| prefs_error::WriteFailed {
            path: self.path.clone(),
        })?;

        log::trace!("Preferences saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_file_uses_system_theme() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(dir.path().join("prefs.json"), Theme::Dark).unwrap();

        assert!(prefs.is_dark());
        assert!(!prefs.sidebar_collapsed());
    }

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = Preferences::load(&path, Theme::Light).unwrap();
        assert_eq!(prefs.toggle_theme().unwrap(), Theme::Dark);
        assert!(prefs.toggle_sidebar().unwrap());

        let stored: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored["theme"], "dark");
        assert_eq!(stored["sidebarCollapsed"], "true");

        let reloaded = Preferences::load(&path, Theme::Light).unwrap();
        assert_eq!(reloaded.theme(), Theme::Dark);
        assert!(reloaded.sidebar_collapsed());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(
            &path,
            r#"{"theme": "purple", "sidebarCollapsed": "yes", "lang": "en"}"#,
        )
        .unwrap();

        let mut prefs = Preferences::load(&path, Theme::Light).unwrap();
        assert_eq!(prefs.theme(), Theme::Light);
        assert!(!prefs.sidebar_collapsed());

        prefs.set_theme(Theme::Dark).unwrap();
        let stored: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored["lang"], "en");
        assert_eq!(stored["sidebarCollapsed"], "false");
    }

    #[test]
    fn test_broken_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{oops").unwrap();

        let prefs = Preferences::load(&path, Theme::Dark).unwrap();
        assert_eq!(prefs.theme(), Theme::Dark);
    }
}
