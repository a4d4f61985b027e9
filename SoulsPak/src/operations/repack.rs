//! Repack a single unpack directory

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Outcome, Session};
use crate::error::{Error, Result};
use crate::formats::{self, FormatKind};
use crate::progress::{Phase, Progress, ProgressCallback};
use crate::regulation::{self, RegulationPipeline};

impl Session {
    /// Rebuild the container described by the sidecar in `dir` and write it
    /// next to the directory.
    pub fn repack_one(&self, dir: &Path, progress: ProgressCallback<'_>) -> Outcome {
        self.try_repack(dir, progress).unwrap_or_else(|e| {
            tracing::error!("Failed to repack {}: {e}", dir.display());
            Outcome::Failed(e)
        })
    }

    fn try_repack(&self, dir: &Path, progress: ProgressCallback<'_>) -> Result<Outcome> {
        let Some((codec, _sidecar)) = formats::codec_for_dir(dir) else {
            tracing::warn!("No SoulsPak manifest in {}", dir.display());
            return Ok(Outcome::Unrecognized {
                reason: format!("{} has no SoulsPak manifest", dir.display()),
            });
        };
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = dir.parent().unwrap_or_else(|| Path::new("."));
        let policy = self.options.traversal;

        let descriptor = if codec.kind() == FormatKind::Bnd4 {
            regulation::descriptor_for_dir(&name)?
        } else {
            None
        };
        if let Some(descriptor) = descriptor {
            let confirm = |question: &str| self.confirmed(question);
            let repack = RegulationPipeline::new(&self.shim)
                .repack(descriptor, dir, policy, &confirm, progress)?;
            let output = output_path(parent, &repack.output_name)?;
            self.write_output(&output, &repack.bytes)?;
            return Ok(Outcome::Regulation {
                variant: repack.variant,
                output,
                reversible: repack.reversible,
            });
        }

        let container = codec.repack(dir, policy, progress)?;
        let mut pending = Vec::with_capacity(container.outputs.len());
        for (index, (file_name, bytes)) in container.outputs.into_iter().enumerate() {
            let path = output_path(parent, &file_name)?;
            let bytes = if index == 0 {
                progress(&Progress::with_file(Phase::Compressing, 0, 1, file_name));
                self.shim.apply(container.compression, &bytes)?
            } else {
                bytes
            };
            pending.push((path, bytes));
        }

        let mut outputs = Vec::with_capacity(pending.len());
        for (path, bytes) in pending {
            self.write_output(&path, &bytes)?;
            outputs.push(path);
        }
        progress(&Progress::new(Phase::Complete, 1, 1));
        Ok(Outcome::Repacked {
            kind: codec.kind(),
            outputs,
        })
    }

    /// Write `bytes` to `path`, first moving an existing file to `<path>.bak`
    /// unless a backup is already there.
    fn write_output(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if self.options.backup && path.is_file() {
            let backup = backup_path(path);
            if backup.exists() {
                tracing::debug!("Keeping existing backup {}", backup.display());
            } else {
                fs::rename(path, &backup)?;
                tracing::info!("Backed up {} to {}", path.display(), backup.display());
            }
        }
        fs::write(path, bytes)?;
        tracing::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Output names come from manifests and must not leave `parent`.
fn output_path(parent: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', ':'])
    {
        return Err(Error::PathTraversal {
            path: file_name.to_string(),
            reason: "output file name must not contain a directory",
        });
    }
    Ok(parent.join(file_name))
}
