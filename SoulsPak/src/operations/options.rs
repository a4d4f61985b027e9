//! Options for an unpack/repack session

use std::path::PathBuf;

use crate::config::Settings;
use crate::utils::TraversalPolicy;

/// Options controlling a [`Session`](super::Session).
///
/// # Example
///
/// ```no_run
/// use soulspak::operations::SessionOptions;
/// use soulspak::utils::TraversalPolicy;
///
/// let options = SessionOptions::new()
///     .with_traversal(TraversalPolicy::Strict)
///     .with_backup(false);
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Oodle library searched before the default locations
    pub oodle_path: Option<PathBuf>,
    /// Entry path policy for unpack and repack
    pub traversal: TraversalPolicy,
    /// Move an existing output to `<name>.bak` before overwriting it
    pub backup: bool,
    /// Treat every confirmation prompt as answered yes
    pub assume_yes: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            oodle_path: None,
            traversal: TraversalPolicy::default(),
            backup: true,
            assume_yes: false,
        }
    }

    /// Start from persisted settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            oodle_path: settings.oodle_path.clone(),
            traversal: settings.traversal,
            backup: settings.backup,
            assume_yes: settings.assume_yes,
        }
    }

    #[must_use]
    pub fn with_oodle_path(mut self, path: Option<PathBuf>) -> Self {
        self.oodle_path = path;
        self
    }

    #[must_use]
    pub fn with_traversal(mut self, traversal: TraversalPolicy) -> Self {
        self.traversal = traversal;
        self
    }

    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    #[must_use]
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }
}
