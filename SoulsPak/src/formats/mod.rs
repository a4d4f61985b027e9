//! Container formats: identification and codecs
//!
//! The binder family (BND3, BND4, BXF3, BXF4) and TPF have codecs here. The
//! other kinds are still identified so callers can report them precisely.

pub mod binder;
pub mod layout;
pub mod registry;
pub mod tpf;

use std::fmt;
use std::path::{Path, PathBuf};

pub use binder::{Binder, BinderCodec, BinderFile, BinderKind};
pub use registry::identify;
pub use tpf::{Tpf, TpfCodec};

use crate::compression::DcxType;
use crate::error::{Error, Result};
use crate::progress::ProgressCallback;
use crate::utils::TraversalPolicy;

/// Every container format the registry can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Encrypted per-title regulation container
    Regulation,
    Bnd3,
    Bnd4,
    /// BHF3 header with a BDF3 data file
    Bxf3,
    /// BHF4 header with a BDF4 data file
    Bxf4,
    Ffx,
    Gparam,
    LuaInfo,
    Tpf,
    Fmg,
    LuaGnl,
    FmgXml,
    FfxXml,
    GparamXml,
    FltparamXml,
    LuaGnlXml,
    LuaInfoXml,
}

impl FormatKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regulation => "regulation",
            Self::Bnd3 => "BND3",
            Self::Bnd4 => "BND4",
            Self::Bxf3 => "BXF3",
            Self::Bxf4 => "BXF4",
            Self::Ffx => "FFX",
            Self::Gparam => "GPARAM",
            Self::LuaInfo => "LUAINFO",
            Self::Tpf => "TPF",
            Self::Fmg => "FMG",
            Self::LuaGnl => "LUAGNL",
            Self::FmgXml => "FMG XML",
            Self::FfxXml => "FFX XML",
            Self::GparamXml => "GPARAM XML",
            Self::FltparamXml => "FLTPARAM XML",
            Self::LuaGnlXml => "LUAGNL XML",
            Self::LuaInfoXml => "LUAINFO XML",
        }
    }

    /// The binder family this kind belongs to, if any.
    #[must_use]
    pub fn binder_kind(self) -> Option<BinderKind> {
        match self {
            Self::Bnd3 => Some(BinderKind::Bnd3),
            Self::Bnd4 => Some(BinderKind::Bnd4),
            Self::Bxf3 => Some(BinderKind::Bxf3),
            Self::Bxf4 => Some(BinderKind::Bxf4),
            _ => None,
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a codec needs to unpack one container.
#[derive(Debug, Clone, Copy)]
pub struct UnpackRequest<'a> {
    /// File name of the container as it sits on disk.
    pub source_name: &'a str,
    /// Path on disk, when the container came from a file (BXF needs it to
    /// find the data file).
    pub source_path: Option<&'a Path>,
    /// Container bytes after compression was peeled.
    pub payload: &'a [u8],
    /// Compression that was peeled, recorded in the manifest.
    pub compression: DcxType,
    /// Directory the entries are written into.
    pub target_dir: &'a Path,
    pub policy: TraversalPolicy,
}

/// Files produced by a repack, not yet compressed or written.
#[derive(Debug, Clone)]
pub struct RepackedContainer {
    /// `(file name, bytes)`; the first output is the primary container and
    /// is the only one `compression` is applied to.
    pub outputs: Vec<(String, Vec<u8>)>,
    pub compression: DcxType,
}

/// A codec that turns a container into a directory plus manifest and back.
pub trait Codec {
    fn kind(&self) -> FormatKind;

    /// File name of the manifest written at the root of the unpack directory.
    fn sidecar_name(&self) -> &'static str;

    /// Write every entry under `request.target_dir`, returning the entry count.
    fn unpack(&self, request: &UnpackRequest<'_>, progress: ProgressCallback<'_>) -> Result<usize>;

    /// Rebuild the container from an unpack directory.
    fn repack(
        &self,
        dir: &Path,
        policy: TraversalPolicy,
        progress: ProgressCallback<'_>,
    ) -> Result<RepackedContainer>;
}

/// Codec for an identified format.
///
/// # Errors
/// Returns [`Error::CodecUnavailable`] for kinds without a codec in this build.
pub fn codec_for(kind: FormatKind) -> Result<Box<dyn Codec>> {
    if kind == FormatKind::Tpf {
        return Ok(Box::new(TpfCodec));
    }
    kind.binder_kind()
        .map(|family| Box::new(BinderCodec::new(family)) as Box<dyn Codec>)
        .ok_or(Error::CodecUnavailable(kind))
}

/// Every codec, in the order unpack directories are matched.
fn all_codecs() -> impl Iterator<Item = Box<dyn Codec>> {
    BinderKind::ALL
        .into_iter()
        .map(|family| Box::new(BinderCodec::new(family)) as Box<dyn Codec>)
        .chain(std::iter::once(Box::new(TpfCodec) as Box<dyn Codec>))
}

/// Codec whose sidecar is present in `dir`, with the sidecar path.
#[must_use]
pub fn codec_for_dir(dir: &Path) -> Option<(Box<dyn Codec>, PathBuf)> {
    all_codecs().find_map(|codec| {
        let sidecar = dir.join(codec.sidecar_name());
        sidecar.is_file().then_some((codec, sidecar))
    })
}
