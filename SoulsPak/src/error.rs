//! Error types for `SoulsPak`

use std::path::PathBuf;

use thiserror::Error;

use crate::formats::FormatKind;
use crate::regulation::RegulationVariant;

/// The error type for `SoulsPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected end of data while parsing a container.
    #[error("unexpected end of data at offset {offset:#x} (wanted {wanted} bytes)")]
    UnexpectedEof {
        /// Offset of the failed read.
        offset: usize,
        /// Number of bytes requested.
        wanted: usize,
    },

    // ==================== Path Errors ====================
    /// An entry path would escape the unpack directory.
    #[error("entry path {path:?} rejected: {reason}")]
    PathTraversal {
        /// The untrusted internal path, verbatim.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    // ==================== Compression Errors ====================
    /// The optional native Oodle engine could not be loaded.
    #[error(
        "{library} could not be loaded (searched {} location(s)). To handle DCX_KRAK files, \
         copy {library} from a game that ships it (hint: ELDEN RING or Sekiro) next to the \
         soulspak executable, into its lib folder, or point SOULSPAK_OODLE at it",
        .searched.len()
    )]
    EngineUnavailable {
        /// Library file name that was looked for.
        library: &'static str,
        /// Every candidate path that was tried.
        searched: Vec<PathBuf>,
    },

    /// The Oodle engine was loaded but rejected the data.
    #[error("Oodle {operation} failed: {message}")]
    EngineFailure {
        /// `compress` or `decompress`.
        operation: &'static str,
        /// Detail from the engine call.
        message: String,
    },

    /// The DCX header is malformed.
    #[error("invalid DCX header: {0}")]
    InvalidDcx(String),

    /// A recognised compression scheme that this build cannot process.
    #[error("unsupported compression scheme: {0}")]
    UnsupportedCompression(String),

    /// Zlib stream failed to inflate.
    #[error("Zlib decompression failed: {message}")]
    ZlibDecompressionFailed {
        /// Error detail.
        message: String,
    },

    // ==================== Container Errors ====================
    /// The data does not start with the expected magic.
    #[error("invalid {format} magic: found {found:?}")]
    InvalidMagic {
        /// Format that was being parsed.
        format: &'static str,
        /// The bytes found instead.
        found: Vec<u8>,
    },

    /// A binder header or file table is inconsistent.
    #[error("malformed binder: {0}")]
    MalformedBinder(String),

    /// A TPF header or texture table is inconsistent.
    #[error("malformed TPF: {0}")]
    MalformedTpf(String),

    /// A format was identified but this build has no codec for it.
    #[error("{0} was recognised but has no codec in this build")]
    CodecUnavailable(FormatKind),

    /// A BHD index file has no matching BDT data file beside it.
    #[error("BDT not found for BHD {bhd}: expected {}", .bdt.display())]
    MissingBdt {
        /// Header file name.
        bhd: String,
        /// Expected data file path.
        bdt: PathBuf,
    },

    /// Manifest sidecar could not be parsed or serialised.
    #[error("manifest error: {0}")]
    Manifest(#[from] quick_xml::DeError),

    /// A manifest references something that is not on disk or not valid.
    #[error("invalid manifest {}: {message}", .path.display())]
    InvalidManifest {
        /// Path of the sidecar.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// Settings file could not be parsed or serialised.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    // ==================== Regulation Errors ====================
    /// Decryption failed (wrong size, bad header).
    #[error("{variant} regulation decryption failed: {message}")]
    Decryption {
        /// Title variant being decrypted.
        variant: RegulationVariant,
        /// Detail.
        message: String,
    },

    /// Re-encryption is not possible for this title and the operator did not confirm.
    #[error("{variant} regulation files cannot be re-encrypted; repack was not confirmed")]
    ReencryptUnsupported {
        /// Title variant that lacks an encryption path.
        variant: RegulationVariant,
    },

    /// A name matched the regulation routing rule but no cipher variant handles it.
    #[error(
        "this state is unreachable: {name:?} was routed as a regulation file but matches no \
         known title; please report this file"
    )]
    UnreachableState {
        /// File or directory name that was routed.
        name: String,
    },

    /// A panic caught at the batch boundary.
    #[error("internal error while processing item: {0}")]
    Defect(String),
}

/// Coarse classification of [`Error`] used for reporting and exit behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing optional native dependency; remediation is available.
    EngineUnavailable,
    /// Security rejection of an entry path.
    PathTraversal,
    /// Re-encryption unsupported and not confirmed.
    ReencryptUnsupported,
    /// Malformed or unsupported container bytes.
    Codec,
    /// Filesystem failure.
    Io,
    /// A bug: should never be reached for the supported set of inputs.
    Defect,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            Error::PathTraversal { .. } => ErrorKind::PathTraversal,
            Error::ReencryptUnsupported { .. } => ErrorKind::ReencryptUnsupported,
            Error::UnreachableState { .. } | Error::Defect(_) => ErrorKind::Defect,
            _ => ErrorKind::Codec,
        }
    }
}

impl From<libloading::Error> for Error {
    fn from(err: libloading::Error) -> Self {
        Error::EngineFailure {
            operation: "load",
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for `SoulsPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
