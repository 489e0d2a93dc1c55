use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

const THEME_KEY: &str = "theme";

/// A small string key/value store persisted as one JSON object
pub struct JsonStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Ignoring unreadable settings file {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings: {:?}", path))
            }
        };

        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write settings: {:?}", self.path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted light/dark preference
pub struct ThemeStore {
    store: JsonStore,
}

impl ThemeStore {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(JsonStore::open(path)?))
    }

    /// Stored theme, `light` when unset or unrecognised
    pub fn current(&self) -> Theme {
        self.store
            .get(THEME_KEY)
            .and_then(Theme::parse)
            .unwrap_or_default()
    }

    /// Flip the theme and persist it
    pub fn toggle(&mut self) -> Result<Theme> {
        let next = self.current().toggled();
        self.store.set(THEME_KEY, next.as_str())?;
        info!("Theme set to {}", next);
        Ok(next)
    }
}
