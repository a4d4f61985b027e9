//! Unpack a single file

use std::path::Path;

use super::session::target_dir_for;
use super::{Outcome, Session};
use crate::error::{Error, Result};
use crate::formats::{self, UnpackRequest};
use crate::progress::ProgressCallback;
use crate::regulation::{self, RegulationPipeline};
use crate::source::ArchiveSource;

impl Session {
    /// Unpack `path` into its sibling directory (see [`target_dir_for`]).
    ///
    /// Regulation file names are checked first, then any DCX wrapper is
    /// peeled and the payload identified.
    pub fn unpack_one(&self, path: &Path, progress: ProgressCallback<'_>) -> Outcome {
        self.try_unpack(path, progress).unwrap_or_else(|e| {
            tracing::error!("Failed to unpack {}: {e}", path.display());
            Outcome::Failed(e)
        })
    }

    fn try_unpack(&self, path: &Path, progress: ProgressCallback<'_>) -> Result<Outcome> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let policy = self.options.traversal;

        if let Some(descriptor) = regulation::descriptor_for_file(&name)? {
            let source = descriptor.source_for(path);
            if source != path {
                if !source.is_file() {
                    return Err(Error::MissingBdt {
                        bhd: name,
                        bdt: source,
                    });
                }
                tracing::info!("{name} is read through {}", source.display());
            }
            let target = target_dir_for(&source);
            RegulationPipeline::new(&self.shim).unpack(descriptor, &source, &target, policy, progress)?;
            return Ok(Outcome::Regulation {
                variant: descriptor.variant,
                output: target,
                reversible: descriptor.supports_reencrypt,
            });
        }

        let target = target_dir_for(path);
        let envelope = self.shim.peel(&ArchiveSource::from_path(path))?;
        let Some(kind) = formats::identify(&ArchiveSource::from_bytes(&envelope.payload), Some(&name))?
        else {
            tracing::warn!("Unrecognized file: {name}");
            return Ok(Outcome::Unrecognized {
                reason: format!("{name} is not a recognized format"),
            });
        };

        let codec = formats::codec_for(kind)?;
        let entries = codec.unpack(
            &UnpackRequest {
                source_name: &name,
                source_path: Some(path),
                payload: &envelope.payload,
                compression: envelope.scheme,
                target_dir: &target,
                policy,
            },
            progress,
        )?;
        Ok(Outcome::Unpacked {
            kind,
            target,
            entries,
        })
    }
}
