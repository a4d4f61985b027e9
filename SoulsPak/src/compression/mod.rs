//! Whole-file compression shim
//!
//! [`CompressionShim::peel`] detects and removes a DCX wrapper, recording
//! the scheme; [`CompressionShim::apply`] puts the same scheme back. Codecs
//! only ever see plain container bytes.

pub mod dcx;
#[allow(unsafe_code)]
mod native;
pub mod oodle;

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

pub use dcx::DcxType;
pub use oodle::{LazyOodle, OodleEngine, UnavailableOodle};

use crate::error::{Error, Result};
use crate::source::ArchiveSource;

/// Highest expansion a zlib stream can reach.
const ZLIB_MAX_RATIO: usize = 1032;

/// Highest expansion accepted from Kraken, whose 256 KiB blocks each carry
/// at least a two-byte header.
const KRAKEN_MAX_RATIO: usize = 0x40000 / 2;

/// Plain payload plus the scheme it was wrapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionEnvelope {
    pub scheme: DcxType,
    pub payload: Vec<u8>,
}

/// Detects, removes and reapplies DCX compression.
#[derive(Clone)]
pub struct CompressionShim {
    oodle: Arc<dyn OodleEngine>,
}

impl CompressionShim {
    #[must_use]
    pub fn new(oodle: Arc<dyn OodleEngine>) -> Self {
        Self { oodle }
    }

    /// Shim whose KRAK operations always fail with `EngineUnavailable`.
    #[must_use]
    pub fn without_oodle() -> Self {
        Self::new(Arc::new(UnavailableOodle))
    }

    /// Classify the source's wrapper without decompressing.
    pub fn detect(&self, source: &ArchiveSource<'_>) -> Result<DcxType> {
        let head = source.head(dcx::HEADER_PROBE_LEN)?;
        Ok(DcxType::detect(&head)?.unwrap_or(DcxType::None))
    }

    /// Remove any DCX wrapper. Unwrapped input is passed through unchanged.
    pub fn peel(&self, source: &ArchiveSource<'_>) -> Result<CompressionEnvelope> {
        let scheme = self.detect(source)?;
        let bytes = source.bytes()?;
        if scheme == DcxType::None {
            return Ok(CompressionEnvelope {
                scheme,
                payload: bytes.into_owned(),
            });
        }
        if !scheme.is_supported() {
            return Err(Error::UnsupportedCompression(scheme.to_string()));
        }

        let body = dcx::split_body(scheme, &bytes)?;
        check_expansion(scheme, body.data.len(), body.uncompressed_size)?;
        let payload = if scheme == DcxType::DcxKrak {
            self.oodle.decompress(body.data, body.uncompressed_size)?
        } else {
            inflate(body.data, body.uncompressed_size)?
        };
        tracing::debug!(
            "Decompressed {scheme}: {} -> {} bytes",
            body.data.len(),
            payload.len()
        );
        Ok(CompressionEnvelope { scheme, payload })
    }

    /// Wrap `payload` in `scheme`. `DcxType::None` returns it unchanged.
    pub fn apply(&self, scheme: DcxType, payload: &[u8]) -> Result<Vec<u8>> {
        if scheme == DcxType::None {
            return Ok(payload.to_vec());
        }
        if !scheme.is_supported() {
            return Err(Error::UnsupportedCompression(scheme.to_string()));
        }
        let compressed = match scheme.deflate_level() {
            Some(level) => deflate(payload, level)?,
            None => self.oodle.compress(payload)?,
        };
        Ok(dcx::wrap(scheme, payload.len(), &compressed))
    }
}

impl std::fmt::Debug for CompressionShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionShim").finish_non_exhaustive()
    }
}

/// Reject a header that claims more output than its compressed body can hold.
fn check_expansion(scheme: DcxType, compressed: usize, uncompressed: usize) -> Result<()> {
    let ratio = if scheme == DcxType::DcxKrak {
        KRAKEN_MAX_RATIO
    } else {
        ZLIB_MAX_RATIO
    };
    let limit = compressed.saturating_add(1).saturating_mul(ratio);
    if uncompressed > limit {
        return Err(Error::InvalidDcx(format!(
            "header claims {uncompressed} bytes from {compressed} compressed bytes"
        )));
    }
    Ok(())
}

fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected.min(data.len().saturating_mul(4)));
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::ZlibDecompressionFailed {
            message: e.to_string(),
        })?;
    if out.len() != expected {
        return Err(Error::ZlibDecompressionFailed {
            message: format!("expected {expected} bytes, got {}", out.len()),
        });
    }
    Ok(out)
}

fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reversible stand-in for Kraken.
    struct XorEngine;

    impl OodleEngine for XorEngine {
        fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
            assert_eq!(compressed.len(), decompressed_size);
            Ok(compressed.iter().map(|b| b ^ 0x5A).collect())
        }

        fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.iter().map(|b| b ^ 0x5A).collect())
        }
    }

    fn payload() -> Vec<u8> {
        b"BND4 payload ".repeat(64)
    }

    /// Deterministic bytes that zlib cannot shrink.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[test]
    fn test_scheme_survives_peel_and_apply() {
        let shim = CompressionShim::new(Arc::new(XorEngine));
        let payloads = [Vec::new(), vec![0x42], payload(), noise(0x3001)];
        for scheme in DcxType::ALL.into_iter().filter(|s| s.is_supported()) {
            for data in &payloads {
                let wrapped = shim.apply(scheme, data).unwrap();
                let envelope = shim.peel(&ArchiveSource::from_vec(wrapped)).unwrap();
                assert_eq!(envelope.scheme, scheme, "{} bytes", data.len());
                assert_eq!(&envelope.payload, data, "{scheme}");
            }
        }
    }

    #[test]
    fn test_oversized_header_is_rejected_before_decompressing() {
        let shim = CompressionShim::new(Arc::new(XorEngine));
        for scheme in [DcxType::DcxDflt10000_24_9, DcxType::DcpDflt, DcxType::DcxKrak] {
            // XorEngine would panic on the size mismatch if it were called.
            let wrapped = dcx::wrap(scheme, u32::MAX as usize, b"tiny");
            assert!(
                matches!(
                    shim.peel(&ArchiveSource::from_vec(wrapped)),
                    Err(Error::InvalidDcx(_))
                ),
                "{scheme}"
            );
        }
    }

    #[test]
    fn test_stream_longer_than_header_fails() {
        let shim = CompressionShim::without_oodle();
        let compressed = deflate(&[7; 100], 9).unwrap();
        let wrapped = dcx::wrap(DcxType::DcxDflt11000_44_9, 10, &compressed);
        assert!(matches!(
            shim.peel(&ArchiveSource::from_vec(wrapped)),
            Err(Error::ZlibDecompressionFailed { .. })
        ));
    }

    #[test]
    fn test_plain_data_passes_through() {
        let shim = CompressionShim::without_oodle();
        let envelope = shim.peel(&ArchiveSource::from_bytes(b"BND4 plain")).unwrap();
        assert_eq!(envelope.scheme, DcxType::None);
        assert_eq!(envelope.payload, b"BND4 plain");
    }

    #[test]
    fn test_krak_without_engine_is_unavailable() {
        let wrapped = CompressionShim::new(Arc::new(XorEngine))
            .apply(DcxType::DcxKrak, &payload())
            .unwrap();
        let shim = CompressionShim::without_oodle();
        let err = shim.peel(&ArchiveSource::from_vec(wrapped)).unwrap_err();
        assert!(matches!(err, Error::EngineUnavailable { .. }));
        assert!(shim.apply(DcxType::DcxKrak, b"x").is_err());
    }

    #[test]
    fn test_edge_is_unsupported() {
        let shim = CompressionShim::without_oodle();
        let wrapped = dcx::wrap(DcxType::DcxEdge, 1, b"x");
        assert!(matches!(
            shim.peel(&ArchiveSource::from_vec(wrapped)),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn test_corrupt_zlib_fails() {
        let shim = CompressionShim::without_oodle();
        let wrapped = dcx::wrap(DcxType::DcxDflt11000_44_9, 10, b"not zlib at all");
        assert!(matches!(
            shim.peel(&ArchiveSource::from_vec(wrapped)),
            Err(Error::ZlibDecompressionFailed { .. })
        ));
    }
}
