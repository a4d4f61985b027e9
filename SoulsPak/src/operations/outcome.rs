//! Per-item results

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind};
use crate::formats::FormatKind;
use crate::regulation::RegulationVariant;

/// What happened to one input path.
#[derive(Debug)]
pub enum Outcome {
    /// A container was unpacked into `target`.
    Unpacked {
        kind: FormatKind,
        target: PathBuf,
        entries: usize,
    },
    /// A directory was rebuilt into `outputs`.
    Repacked {
        kind: FormatKind,
        outputs: Vec<PathBuf>,
    },
    /// A regulation file was decrypted and unpacked, or rebuilt.
    Regulation {
        variant: RegulationVariant,
        /// Unpack directory, or the rebuilt file.
        output: PathBuf,
        /// `false` when the result cannot be turned back into what the game loads.
        reversible: bool,
    },
    /// Not a format this tool knows, or a directory without a manifest.
    Unrecognized { reason: String },
    Failed(Error),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Unpacked { .. } | Self::Repacked { .. } | Self::Regulation { .. }
        )
    }

    /// Failed or unrecognized.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        !self.is_success()
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(Error::kind)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpacked {
                kind,
                target,
                entries,
            } => write!(f, "unpacked {kind} ({entries} entries) to {}", target.display()),
            Self::Repacked { kind, outputs } => {
                write!(f, "repacked {kind} to ")?;
                for (i, output) in outputs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", output.display())?;
                }
                Ok(())
            }
            Self::Regulation {
                variant,
                output,
                reversible,
            } => {
                write!(f, "{variant} regulation -> {}", output.display())?;
                if !reversible {
                    f.write_str(" (not reversible)")?;
                }
                Ok(())
            }
            Self::Unrecognized { reason } => write!(f, "skipped: {reason}"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// One input and its outcome.
#[derive(Debug)]
pub struct ItemReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Outcomes for a whole run, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl AsRef<Path>, outcome: Outcome) {
        self.items.push(ItemReport {
            path: path.as_ref().to_path_buf(),
            outcome,
        });
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_success()).count()
    }

    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.items.len() - self.success_count()
    }

    /// True if any item failed or was unrecognized.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.items.iter().any(|i| i.outcome.needs_attention())
    }

    /// Items that need attention.
    pub fn problems(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.outcome.needs_attention())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_attention() {
        let mut report = BatchReport::new();
        report.push(
            "a.bnd",
            Outcome::Unpacked {
                kind: FormatKind::Bnd4,
                target: PathBuf::from("a-bnd"),
                entries: 3,
            },
        );
        assert!(!report.needs_attention());

        report.push("notes.txt", Outcome::Unrecognized { reason: "unknown format".into() });
        assert!(report.needs_attention());
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.fail_count(), 1);
        assert_eq!(report.problems().count(), 1);
    }

    #[test]
    fn test_display() {
        let outcome = Outcome::Regulation {
            variant: RegulationVariant::DarkSouls2,
            output: PathBuf::from("enc_regulation.bnd.dcx"),
            reversible: false,
        };
        assert_eq!(
            outcome.to_string(),
            "Dark Souls II regulation -> enc_regulation.bnd.dcx (not reversible)"
        );
        let failed = Outcome::Failed(Error::ReencryptUnsupported {
            variant: RegulationVariant::DarkSouls2,
        });
        assert_eq!(failed.error_kind(), Some(ErrorKind::ReencryptUnsupported));
    }
}
