//! Persisted settings for `SoulsPak`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compression::oodle::OODLE_ENV;
use crate::error::Result;
use crate::utils::TraversalPolicy;

// Default value functions for serde
fn default_true() -> bool {
    true
}

/// User settings, stored as JSON in the platform config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Oodle library (or the folder containing it)
    #[serde(default)]
    pub oodle_path: Option<PathBuf>,
    /// How leading `..` in entry names is handled
    #[serde(default)]
    pub traversal: TraversalPolicy,
    /// Keep a `.bak` of files overwritten by repack
    #[serde(default = "default_true")]
    pub backup: bool,
    /// Answer yes to confirmation prompts
    #[serde(default)]
    pub assume_yes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            oodle_path: None,
            traversal: TraversalPolicy::default(),
            backup: true,
            assume_yes: false,
        }
    }
}

impl Settings {
    /// `<config dir>/SoulsPak/config.json`
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("SoulsPak").join("config.json"))
    }

    /// Load settings from disk, or return defaults.
    ///
    /// A missing or unreadable file is not an error. The `SOULSPAK_OODLE`
    /// environment variable overrides `oodle_path`.
    #[must_use]
    pub fn load() -> Self {
        let mut settings = Self::config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default();
        if let Some(path) = std::env::var_os(OODLE_ENV).filter(|v| !v.is_empty()) {
            settings.oodle_path = Some(PathBuf::from(path));
        }
        settings
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
