//! Session: one configured orchestrator driving unpack and repack

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{BatchReport, Outcome, SessionOptions};
use crate::compression::{CompressionShim, LazyOodle, OodleEngine};
use crate::error::Error;
use crate::progress::ProgressCallback;

/// Suffix appended to an unpack directory whose name is taken by a file.
pub const TARGET_SUFFIX: &str = "-spk";

type ConfirmFn = Box<dyn Fn(&str) -> bool>;

/// Processes inputs one at a time with shared options and a shared Oodle handle.
pub struct Session {
    pub(super) options: SessionOptions,
    pub(super) shim: CompressionShim,
    confirm: ConfirmFn,
}

impl Session {
    /// Session that looks for the Oodle library lazily, on the first KRAK input.
    ///
    /// Confirmation prompts are refused unless `assume_yes` is set; install an
    /// interactive prompt with [`Session::with_confirm`].
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        let oodle = LazyOodle::discover(options.oodle_path.as_deref());
        Self::with_engine(options, Arc::new(oodle))
    }

    /// Session using a specific Oodle engine.
    #[must_use]
    pub fn with_engine(options: SessionOptions, oodle: Arc<dyn OodleEngine>) -> Self {
        Self {
            options,
            shim: CompressionShim::new(oodle),
            confirm: Box::new(|_| false),
        }
    }

    /// Install the function asked before non-reversible operations.
    #[must_use]
    pub fn with_confirm(mut self, confirm: impl Fn(&str) -> bool + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(super) fn confirmed(&self, question: &str) -> bool {
        if self.options.assume_yes {
            tracing::info!("{question} (assumed yes)");
            return true;
        }
        (self.confirm)(question)
    }

    /// Unpack a file or repack a directory.
    ///
    /// Never panics: a panic inside a codec is reported as an
    /// [`Error::Defect`] for this path.
    pub fn process(&self, path: &Path, progress: ProgressCallback<'_>) -> Outcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            if path.is_dir() {
                self.repack_one(path, progress)
            } else if path.is_file() {
                self.unpack_one(path, progress)
            } else {
                Outcome::Failed(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )))
            }
        }));
        result.unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Internal error while processing {}: {message}", path.display());
            Outcome::Failed(Error::Defect(message))
        })
    }

    /// Process every path in order. One item failing never stops the rest.
    pub fn run_batch<P: AsRef<Path>>(
        &self,
        paths: &[P],
        progress: ProgressCallback<'_>,
    ) -> BatchReport {
        let mut report = BatchReport::new();
        for path in paths {
            let path = path.as_ref();
            let outcome = self.process(path, progress);
            tracing::debug!("{}: {outcome}", path.display());
            report.push(path, outcome);
        }
        report
    }
}

/// Unpack directory for `path`: the file name with `.` replaced by `-`,
/// suffixed with [`TARGET_SUFFIX`] if a file already has that name.
#[must_use]
pub fn target_dir_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace('.', "-"))
        .unwrap_or_default();
    let target = path.with_file_name(&name);
    if target.is_file() {
        path.with_file_name(format!("{name}{TARGET_SUFFIX}"))
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::silent;

    #[test]
    fn test_target_dir_for() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.anibnd.dcx");
        assert_eq!(target_dir_for(&source), dir.path().join("c0000-anibnd-dcx"));

        std::fs::write(dir.path().join("c0000-anibnd-dcx"), b"in the way").unwrap();
        assert_eq!(target_dir_for(&source), dir.path().join("c0000-anibnd-dcx-spk"));
    }

    #[test]
    fn test_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(SessionOptions::new());
        let outcome = session.process(&dir.path().join("missing.bnd"), &silent);
        assert!(matches!(outcome, Outcome::Failed(Error::Io(_))));
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        let session = Session::new(SessionOptions::new().with_assume_yes(true))
            .with_confirm(|_| panic!("prompt must not be shown"));
        assert!(session.confirmed("Continue?"));

        let session = Session::new(SessionOptions::new()).with_confirm(|q| q.ends_with('?'));
        assert!(session.confirmed("Continue?"));
        assert!(!Session::new(SessionOptions::new()).confirmed("Continue?"));
    }
}
