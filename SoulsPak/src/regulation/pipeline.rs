//! Decrypt, unpack, repack and re-encrypt regulation files

use std::path::Path;

use rand::RngCore;

use super::{RegulationDescriptor, RegulationSidecar, RegulationVariant, SIDECAR_NAME};
use crate::compression::CompressionShim;
use crate::error::{Error, Result};
use crate::formats::{BinderCodec, BinderKind, Codec, UnpackRequest};
use crate::progress::{Phase, Progress, ProgressCallback};
use crate::source::ArchiveSource;
use crate::utils::TraversalPolicy;

/// A rebuilt regulation file, ready to be written next to its directory.
#[derive(Debug, Clone)]
pub struct RegulationRepack {
    pub variant: RegulationVariant,
    pub output_name: String,
    pub bytes: Vec<u8>,
    /// `false` when the output is a plain container the game cannot load.
    pub reversible: bool,
}

/// Runs regulation files through decryption and the BND4 codec.
pub struct RegulationPipeline<'a> {
    shim: &'a CompressionShim,
}

impl<'a> RegulationPipeline<'a> {
    #[must_use]
    pub fn new(shim: &'a CompressionShim) -> Self {
        Self { shim }
    }

    /// Decrypt `source` and unpack the BND4 inside into `target_dir`.
    pub fn unpack(
        &self,
        descriptor: &RegulationDescriptor,
        source: &Path,
        target_dir: &Path,
        policy: TraversalPolicy,
        progress: ProgressCallback<'_>,
    ) -> Result<usize> {
        let variant = descriptor.variant;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Unpacking {variant} regulation: {name}");

        progress(&Progress::with_file(Phase::Decrypting, 0, 1, name.clone()));
        let blob = std::fs::read(source)?;
        let decrypted = descriptor.cipher.decrypt(variant, &blob)?;

        progress(&Progress::with_file(Phase::Decompressing, 0, 1, name.clone()));
        let envelope = self
            .shim
            .peel(&ArchiveSource::from_vec(decrypted.plaintext))
            .map_err(|e| match e {
                Error::InvalidDcx(message) | Error::ZlibDecompressionFailed { message } => {
                    Error::Decryption { variant, message }
                }
                other => other,
            })?;
        if !envelope.payload.starts_with(b"BND4") {
            return Err(Error::Decryption {
                variant,
                message: "decrypted data is not a BND4 container (wrong title or corrupt file)"
                    .to_string(),
            });
        }
        tracing::debug!("{variant} regulation payload is {}", envelope.scheme);

        let count = BinderCodec::new(BinderKind::Bnd4).unpack(
            &UnpackRequest {
                source_name: &name,
                source_path: Some(source),
                payload: &envelope.payload,
                compression: envelope.scheme,
                target_dir,
                policy,
            },
            progress,
        )?;
        RegulationSidecar::new(variant, &name, &decrypted.header)
            .write(&target_dir.join(SIDECAR_NAME))?;
        Ok(count)
    }

    /// Rebuild, recompress and (where supported) re-encrypt the file in `dir`.
    ///
    /// Titles without an encryption path ask `confirm` first and, if the
    /// operator agrees, produce the plain container flagged non-reversible.
    ///
    /// # Errors
    /// [`Error::ReencryptUnsupported`] if confirmation is required and refused.
    pub fn repack(
        &self,
        descriptor: &RegulationDescriptor,
        dir: &Path,
        policy: TraversalPolicy,
        confirm: &dyn Fn(&str) -> bool,
        progress: ProgressCallback<'_>,
    ) -> Result<RegulationRepack> {
        let variant = descriptor.variant;
        if !descriptor.supports_reencrypt {
            let question = format!(
                "{variant} regulation files cannot be re-encrypted, so repacking this folder \
                 writes an unencrypted file that may ruin your encrypted one. Continue?"
            );
            if !confirm(&question) {
                return Err(Error::ReencryptUnsupported { variant });
            }
        }

        let container = BinderCodec::new(BinderKind::Bnd4).repack(dir, policy, progress)?;
        let compression = container.compression;
        let (output_name, plain) = container
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::Defect("binder repack produced no output".to_string()))?;

        progress(&Progress::with_file(Phase::Compressing, 0, 1, output_name.clone()));
        let compressed = self.shim.apply(compression, &plain)?;

        if !descriptor.supports_reencrypt {
            tracing::warn!(
                "{variant} regulation {output_name} written without encryption; this repack is not reversible"
            );
            return Ok(RegulationRepack {
                variant,
                output_name,
                bytes: compressed,
                reversible: false,
            });
        }

        progress(&Progress::with_file(Phase::Encrypting, 0, 1, output_name.clone()));
        let header = self.header_for(descriptor, dir)?;
        let bytes = descriptor.cipher.encrypt(variant, &header, &compressed)?;
        Ok(RegulationRepack {
            variant,
            output_name,
            bytes,
            reversible: true,
        })
    }

    /// Header recorded at unpack time, or a fresh random one if the sidecar is gone.
    fn header_for(&self, descriptor: &RegulationDescriptor, dir: &Path) -> Result<Vec<u8>> {
        let path = dir.join(SIDECAR_NAME);
        if !path.is_file() {
            tracing::warn!(
                "{} not found in {}; encrypting with a fresh IV",
                SIDECAR_NAME,
                dir.display()
            );
            let mut header = vec![0u8; descriptor.cipher.header_len()];
            rand::thread_rng().fill_bytes(&mut header);
            return Ok(header);
        }

        let sidecar = RegulationSidecar::read(&path)?;
        let recorded = sidecar.variant(&path)?;
        if recorded != descriptor.variant {
            return Err(Error::InvalidManifest {
                path,
                message: format!(
                    "sidecar is for {recorded} but the folder name selects {}",
                    descriptor.variant
                ),
            });
        }
        sidecar.header_bytes(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::DcxType;
    use crate::formats::{Binder, BinderFile};
    use crate::formats::binder::bnd4;
    use crate::progress::silent;

    fn params() -> Vec<u8> {
        let binder = Binder {
            version: "20230605".to_string(),
            files: vec![BinderFile {
                flags: 0x40,
                id: 0,
                name: Some(r"N:\FDP\data\Param\param\GameParam\EquipParamWeapon.param".to_string()),
                uncompressed_size: None,
                data: b"weapon rows".to_vec(),
            }],
            ..Binder::default()
        };
        bnd4::write_bnd4(&binder).unwrap()
    }

    fn ds3_blob(shim: &CompressionShim) -> Vec<u8> {
        let compressed = shim.apply(DcxType::DcxDflt10000_44_9, &params()).unwrap();
        let descriptor = RegulationVariant::DarkSouls3.descriptor();
        descriptor
            .cipher
            .encrypt(RegulationVariant::DarkSouls3, &[0x11; 16], &compressed)
            .unwrap()
    }

    #[test]
    fn test_ds3_unpack_and_repack_is_identical() {
        let shim = CompressionShim::without_oodle();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Data0.bdt");
        let blob = ds3_blob(&shim);
        std::fs::write(&source, &blob).unwrap();

        let pipeline = RegulationPipeline::new(&shim);
        let descriptor = RegulationVariant::DarkSouls3.descriptor();
        let target = dir.path().join("Data0-bdt");
        let count = pipeline
            .unpack(descriptor, &source, &target, TraversalPolicy::FoldLeading, &silent)
            .unwrap();
        assert_eq!(count, 1);
        assert!(target.join(SIDECAR_NAME).is_file());

        let repack = pipeline
            .repack(descriptor, &target, TraversalPolicy::FoldLeading, &|_| false, &silent)
            .unwrap();
        assert!(repack.reversible);
        assert_eq!(repack.output_name, "Data0.bdt");
        assert_eq!(repack.bytes, blob);
    }

    #[test]
    fn test_wrong_key_is_a_decryption_error() {
        let shim = CompressionShim::without_oodle();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("regulation.bin");
        std::fs::write(&source, ds3_blob(&shim)).unwrap();

        let err = RegulationPipeline::new(&shim)
            .unpack(
                RegulationVariant::EldenRing.descriptor(),
                &source,
                &dir.path().join("regulation-bin"),
                TraversalPolicy::FoldLeading,
                &silent,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Decryption { variant: RegulationVariant::EldenRing, .. }));
        assert!(!dir.path().join("regulation-bin").exists());
    }

    #[test]
    fn test_refused_confirmation_reads_nothing() {
        let shim = CompressionShim::without_oodle();
        let dir = tempfile::tempdir().unwrap();
        // No manifest at all: the refusal must come before any disk access.
        let err = RegulationPipeline::new(&shim)
            .repack(
                RegulationVariant::DarkSouls2.descriptor(),
                dir.path(),
                TraversalPolicy::FoldLeading,
                &|_| false,
                &silent,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ReencryptUnsupported { .. }));
    }
}
