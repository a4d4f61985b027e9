//! Binder containers (BND3, BND4, BXF3, BXF4)
//!
//! A binder is a flat list of entries, each with flags, an optional numeric
//! id and an optional name. BXF splits the same structure into a header file
//! (`.bhd`) and a data file (`.bdt`).

pub mod bnd3;
pub mod bnd4;
pub mod manifest;

use std::path::{Path, PathBuf};

use encoding_rs::SHIFT_JIS;

pub use manifest::{BinderManifest, ManifestFile, ManifestFiles};

use super::layout::DiskLayout;
use super::{Codec, FormatKind, RepackedContainer, UnpackRequest};
use crate::compression::DcxType;
use crate::error::{Error, Result};
use crate::progress::{Phase, Progress, ProgressCallback};
use crate::utils::{ByteReader, ByteWriter, SanitizedPath, TraversalPolicy, sanitize};

/// Logical bits of the binder format byte.
pub mod format_flags {
    pub const BIG_ENDIAN: u8 = 0b0000_0001;
    pub const IDS: u8 = 0b0000_0010;
    pub const NAMES1: u8 = 0b0000_0100;
    pub const NAMES2: u8 = 0b0000_1000;
    pub const LONG_OFFSETS: u8 = 0b0001_0000;
    pub const COMPRESSION: u8 = 0b0010_0000;
}

/// Interpret a stored format byte. Older headers store it bit-reversed.
#[must_use]
pub fn logical_format(raw: u8, bit_big_endian: bool) -> u8 {
    let reverse = bit_big_endian || (raw & 0b1 != 0 && raw & 0b1000_0000 == 0);
    if reverse { raw } else { raw.reverse_bits() }
}

/// One binder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderFile {
    pub flags: u8,
    /// `-1` when the binder has no ids.
    pub id: i32,
    pub name: Option<String>,
    /// Size before per-entry compression, if it differs from `data.len()`.
    pub uncompressed_size: Option<u64>,
    pub data: Vec<u8>,
}

/// A parsed binder with every header field needed to write it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    pub version: String,
    /// Format byte exactly as stored.
    pub format: u8,
    pub big_endian: bool,
    pub bit_big_endian: bool,
    pub unicode: bool,
    /// BND4/BXF4 extended byte; `4` adds the path hash table.
    pub extended: u8,
    pub unk04: bool,
    pub unk05: bool,
    pub unk18: i32,
    pub files: Vec<BinderFile>,
}

impl Default for Binder {
    fn default() -> Self {
        Self {
            version: String::new(),
            format: 0x74,
            big_endian: false,
            bit_big_endian: false,
            unicode: true,
            extended: 4,
            unk04: false,
            unk05: false,
            unk18: 0,
            files: Vec::new(),
        }
    }
}

impl Binder {
    #[must_use]
    pub fn logical_format(&self) -> u8 {
        logical_format(self.format, self.bit_big_endian)
    }

    #[must_use]
    pub fn has(&self, flag: u8) -> bool {
        self.logical_format() & flag != 0
    }

    #[must_use]
    pub fn has_names(&self) -> bool {
        self.has(format_flags::NAMES1) || self.has(format_flags::NAMES2)
    }

    /// Byte order of the header fields.
    #[must_use]
    pub fn io_big_endian(&self) -> bool {
        self.big_endian || self.has(format_flags::BIG_ENDIAN)
    }
}

/// Read a NUL-terminated entry name.
pub(crate) fn read_name(r: &ByteReader<'_>, offset: usize, unicode: bool) -> Result<String> {
    if unicode {
        r.utf16_at(offset)
    } else {
        let (name, _, _) = SHIFT_JIS.decode(r.cstr_at(offset)?);
        Ok(name.into_owned())
    }
}

/// Write a NUL-terminated entry name.
pub(crate) fn write_name(w: &mut ByteWriter, name: &str, unicode: bool) {
    if unicode {
        for unit in name.encode_utf16() {
            w.write_u16(unit);
        }
        w.write_u16(0);
    } else {
        let (bytes, _, _) = SHIFT_JIS.encode(name);
        w.write_bytes(&bytes);
        w.write_u8(0);
    }
}

/// Convert a header offset or size into `usize`.
pub(crate) fn to_usize(value: i64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::MalformedBinder(format!("negative {what}: {value}")))
}

pub(crate) fn read_offset(r: &mut ByteReader<'_>, long: bool) -> Result<usize> {
    if long {
        to_usize(r.read_i64()?, "data offset")
    } else {
        Ok(r.read_u32()? as usize)
    }
}

/// A reserved 32- or 64-bit offset field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OffsetSlot {
    pos: usize,
    long: bool,
}

impl OffsetSlot {
    pub(crate) fn reserve(w: &mut ByteWriter, long: bool) -> Self {
        let pos = if long { w.reserve_u64() } else { w.reserve_u32() };
        Self { pos, long }
    }

    pub(crate) fn fill(self, w: &mut ByteWriter, value: usize) -> Result<()> {
        if self.long {
            w.fill_u64(self.pos, value as u64);
        } else {
            let value = u32::try_from(value).map_err(|_| {
                Error::MalformedBinder(format!("offset {value:#x} needs the long offsets flag"))
            })?;
            w.fill_u32(self.pos, value);
        }
        Ok(())
    }
}

/// Reserved per-entry fields filled once names and data are laid out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntrySlots {
    pub data_offset: OffsetSlot,
    pub name_offset: Option<usize>,
}

/// Write entry names after the file headers.
pub(crate) fn write_names(w: &mut ByteWriter, binder: &Binder, slots: &[EntrySlots]) {
    for (file, slot) in binder.files.iter().zip(slots) {
        if let Some(pos) = slot.name_offset {
            let here = w.position() as u32;
            w.fill_u32(pos, here);
            write_name(w, file.name.as_deref().unwrap_or_default(), binder.unicode);
        }
    }
}

/// Write entry data, each aligned to 0x10, filling the offsets in `headers`.
///
/// `data` and `headers` are the same buffer for single-file binders.
pub(crate) fn write_data(
    data: &mut ByteWriter,
    headers: Option<&mut ByteWriter>,
    binder: &Binder,
    slots: &[EntrySlots],
) -> Result<()> {
    let mut offsets = Vec::with_capacity(slots.len());
    for file in &binder.files {
        data.pad(0x10);
        offsets.push(data.position());
        data.write_bytes(&file.data);
    }
    let headers = match headers {
        Some(headers) => headers,
        None => data,
    };
    for (slot, offset) in slots.iter().zip(offsets) {
        slot.data_offset.fill(headers, offset)?;
    }
    Ok(())
}

/// Borrow an entry's stored bytes from the data buffer.
pub(crate) fn entry_data(data: &[u8], offset: usize, size: usize) -> Result<Vec<u8>> {
    offset
        .checked_add(size)
        .and_then(|end| data.get(offset..end))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            Error::MalformedBinder(format!(
                "entry at {offset:#x} ({size} bytes) runs past end of data ({} bytes)",
                data.len()
            ))
        })
}

/// `Some(size)` only when it differs from the stored length.
pub(crate) fn distinct_size(uncompressed: u64, stored: usize) -> Option<u64> {
    (uncompressed != stored as u64).then_some(uncompressed)
}

/// The four binder families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderKind {
    Bnd3,
    Bnd4,
    Bxf3,
    Bxf4,
}

impl BinderKind {
    pub const ALL: [BinderKind; 4] = [
        BinderKind::Bnd3,
        BinderKind::Bnd4,
        BinderKind::Bxf3,
        BinderKind::Bxf4,
    ];

    #[must_use]
    pub fn format_kind(self) -> FormatKind {
        match self {
            Self::Bnd3 => FormatKind::Bnd3,
            Self::Bnd4 => FormatKind::Bnd4,
            Self::Bxf3 => FormatKind::Bxf3,
            Self::Bxf4 => FormatKind::Bxf4,
        }
    }

    #[must_use]
    pub fn sidecar_name(self) -> &'static str {
        match self {
            Self::Bnd3 => "_soulspak-bnd3.xml",
            Self::Bnd4 => "_soulspak-bnd4.xml",
            Self::Bxf3 => "_soulspak-bxf3.xml",
            Self::Bxf4 => "_soulspak-bxf4.xml",
        }
    }

    #[must_use]
    pub fn is_split(self) -> bool {
        matches!(self, Self::Bxf3 | Self::Bxf4)
    }
}

/// Name of the BXF data file that pairs with a header file.
///
/// `bhd` in the extension becomes `bdt`, so `Data0.bhd` pairs with
/// `Data0.bdt` and `c0000.chrtpfbhd` with `c0000.chrtpfbdt`.
#[must_use]
pub fn bdt_name_for(bhd_name: &str) -> String {
    match bhd_name.rfind('.') {
        Some(dot) => {
            let (stem, ext) = bhd_name.split_at(dot);
            format!("{stem}{}", ext.replace("bhd", "bdt"))
        }
        None => format!("{bhd_name}.bdt"),
    }
}

/// A placement chosen by [`DiskLayout`], already known to be relative.
pub(crate) fn on_disk(relative: &str) -> SanitizedPath {
    SanitizedPath {
        root: String::new(),
        relative: relative.to_string(),
    }
}

/// Codec for one binder family.
#[derive(Debug, Clone, Copy)]
pub struct BinderCodec {
    family: BinderKind,
}

impl BinderCodec {
    #[must_use]
    pub fn new(family: BinderKind) -> Self {
        Self { family }
    }

    fn parse(&self, request: &UnpackRequest<'_>) -> Result<(Binder, Option<String>)> {
        match self.family {
            BinderKind::Bnd3 => Ok((bnd3::read_bnd3(request.payload)?, None)),
            BinderKind::Bnd4 => Ok((bnd4::read_bnd4(request.payload)?, None)),
            BinderKind::Bxf3 | BinderKind::Bxf4 => {
                let bdt_name = bdt_name_for(request.source_name);
                let bdt_path = request
                    .source_path
                    .and_then(Path::parent)
                    .map_or_else(|| PathBuf::from(&bdt_name), |dir| dir.join(&bdt_name));
                if !bdt_path.is_file() {
                    return Err(Error::MissingBdt {
                        bhd: request.source_name.to_string(),
                        bdt: bdt_path,
                    });
                }
                let bdt = std::fs::read(&bdt_path)?;
                let binder = if self.family == BinderKind::Bxf3 {
                    bnd3::read_bxf3(request.payload, &bdt)?
                } else {
                    bnd4::read_bxf4(request.payload, &bdt)?
                };
                Ok((binder, Some(bdt_name)))
            }
        }
    }

    fn build(&self, binder: &Binder) -> Result<Vec<Vec<u8>>> {
        Ok(match self.family {
            BinderKind::Bnd3 => vec![bnd3::write_bnd3(binder)?],
            BinderKind::Bnd4 => vec![bnd4::write_bnd4(binder)?],
            BinderKind::Bxf3 => {
                let (bhd, bdt) = bnd3::write_bxf3(binder)?;
                vec![bhd, bdt]
            }
            BinderKind::Bxf4 => {
                let (bhd, bdt) = bnd4::write_bxf4(binder)?;
                vec![bhd, bdt]
            }
        })
    }
}

impl Codec for BinderCodec {
    fn kind(&self) -> FormatKind {
        self.family.format_kind()
    }

    fn sidecar_name(&self) -> &'static str {
        self.family.sidecar_name()
    }

    fn unpack(&self, request: &UnpackRequest<'_>, progress: ProgressCallback<'_>) -> Result<usize> {
        let (binder, datafilename) = self.parse(request)?;
        tracing::info!(
            "Unpacking {}: {} ({} entries)",
            self.kind(),
            request.source_name,
            binder.files.len()
        );

        // Sanitize and place every name before touching the disk so a
        // rejected entry leaves nothing half-written.
        let mut layout = DiskLayout::with_reserved(&[self.sidecar_name()]);
        let mut targets = Vec::with_capacity(binder.files.len());
        for (index, file) in binder.files.iter().enumerate() {
            let sanitized = match &file.name {
                Some(name) => sanitize(name, request.policy)?,
                None => SanitizedPath {
                    root: String::new(),
                    relative: format!("{index:05}"),
                },
            };
            let disk = layout.claim(&sanitized.relative);
            if let Some(disk) = &disk {
                tracing::warn!(
                    "Entry {index} ({}) clashes with an earlier entry on disk, writing it as {disk}",
                    sanitized.relative
                );
            }
            targets.push((sanitized, disk));
        }

        std::fs::create_dir_all(request.target_dir)?;
        let total = binder.files.len();
        let mut files = Vec::with_capacity(total);
        for (index, (file, (target, disk))) in binder.files.iter().zip(targets).enumerate() {
            let out = match &disk {
                Some(disk) => on_disk(disk).under(request.target_dir),
                None => target.under(request.target_dir),
            };
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &file.data)?;
            progress(&Progress::with_file(
                Phase::WritingEntries,
                index + 1,
                total,
                target.relative.clone(),
            ));

            files.push(ManifestFile {
                root: (!target.root.is_empty()).then(|| target.root.clone()),
                path: target.relative,
                disk,
                flags: file.flags,
                id: binder.has(format_flags::IDS).then_some(file.id),
                unnamed: file.name.is_none(),
                uncompressedsize: file.uncompressed_size,
            });
        }

        let manifest = BinderManifest {
            filename: request.source_name.to_string(),
            datafilename,
            compression: request.compression.to_string(),
            version: binder.version,
            format: binder.format,
            bigendian: binder.big_endian,
            bitbigendian: binder.bit_big_endian,
            unicode: binder.unicode,
            extended: binder.extended,
            unk04: binder.unk04,
            unk05: binder.unk05,
            unk18: binder.unk18,
            files: ManifestFiles { file: files },
        };
        manifest.write(&request.target_dir.join(self.sidecar_name()))?;
        Ok(total)
    }

    fn repack(
        &self,
        dir: &Path,
        policy: TraversalPolicy,
        progress: ProgressCallback<'_>,
    ) -> Result<RepackedContainer> {
        let sidecar = dir.join(self.sidecar_name());
        let manifest = BinderManifest::read(&sidecar)?;
        let compression: DcxType = manifest.compression.parse()?;
        tracing::info!("Repacking {}: {}", self.kind(), manifest.filename);

        let total = manifest.files.file.len();
        let mut files = Vec::with_capacity(total);
        for (index, entry) in manifest.files.file.iter().enumerate() {
            let path = sanitize(entry.disk_path(), policy)?.under(dir);
            let data = std::fs::read(&path).map_err(|e| Error::InvalidManifest {
                path: sidecar.clone(),
                message: format!("cannot read {}: {e}", path.display()),
            })?;
            let name = (!entry.unnamed).then(|| {
                format!("{}{}", entry.root.as_deref().unwrap_or_default(), entry.path)
            });
            progress(&Progress::with_file(
                Phase::ReadingEntries,
                index + 1,
                total,
                entry.path.clone(),
            ));
            files.push(BinderFile {
                flags: entry.flags,
                id: entry.id.unwrap_or(-1),
                name,
                uncompressed_size: entry.uncompressedsize,
                data,
            });
        }

        let binder = Binder {
            version: manifest.version,
            format: manifest.format,
            big_endian: manifest.bigendian,
            bit_big_endian: manifest.bitbigendian,
            unicode: manifest.unicode,
            extended: manifest.extended,
            unk04: manifest.unk04,
            unk05: manifest.unk05,
            unk18: manifest.unk18,
            files,
        };
        let built = self.build(&binder)?;

        let mut names = vec![manifest.filename.clone()];
        if self.family.is_split() {
            names.push(
                manifest
                    .datafilename
                    .unwrap_or_else(|| bdt_name_for(&manifest.filename)),
            );
        }
        Ok(RepackedContainer {
            outputs: names.into_iter().zip(built).collect(),
            compression,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::silent;

    #[test]
    fn test_logical_format() {
        // 0x74 as stored by BND4 headers is already in logical order.
        assert_eq!(logical_format(0x74, false), 0x2E);
        assert_eq!(logical_format(0x2E, true), 0x2E);
        // Low bit set without the top bit: stored unreversed.
        assert_eq!(logical_format(0x0F, false), 0x0F);
    }

    #[test]
    fn test_bdt_name_for() {
        assert_eq!(bdt_name_for("Data0.bhd"), "Data0.bdt");
        assert_eq!(bdt_name_for("c0000.chrtpfbhd"), "c0000.chrtpfbdt");
        assert_eq!(bdt_name_for("hkxbhd"), "hkxbhd.bdt");
    }

    fn sample(format: u8) -> Binder {
        Binder {
            version: "07D7R6".to_string(),
            format,
            files: vec![
                BinderFile {
                    flags: 0x40,
                    id: 10,
                    name: Some(r"N:\FDP\data\param\a.param".to_string()),
                    uncompressed_size: None,
                    data: b"first".to_vec(),
                },
                BinderFile {
                    flags: 0x40,
                    id: 11,
                    name: Some(r"N:\FDP\data\param\sub\b.param".to_string()),
                    uncompressed_size: None,
                    data: b"second entry".to_vec(),
                },
            ],
            ..Binder::default()
        }
    }

    #[test]
    fn test_unpack_then_repack_bnd4_directory() {
        let dir = tempfile::tempdir().unwrap();
        let binder = sample(0x74);
        let bytes = bnd4::write_bnd4(&binder).unwrap();
        let target = dir.path().join("gameparam-parambnd");
        let codec = BinderCodec::new(BinderKind::Bnd4);

        let count = codec
            .unpack(
                &UnpackRequest {
                    source_name: "gameparam.parambnd",
                    source_path: None,
                    payload: &bytes,
                    compression: DcxType::None,
                    target_dir: &target,
                    policy: TraversalPolicy::FoldLeading,
                },
                &silent,
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read(target.join("param").join("a.param")).unwrap(), b"first");
        assert!(target.join("_soulspak-bnd4.xml").is_file());

        let repacked = codec.repack(&target, TraversalPolicy::FoldLeading, &silent).unwrap();
        assert_eq!(repacked.compression, DcxType::None);
        assert_eq!(repacked.outputs.len(), 1);
        assert_eq!(repacked.outputs[0].0, "gameparam.parambnd");
        assert_eq!(repacked.outputs[0].1, bytes);
    }

    /// Unpack BND4 `bytes` into a fresh directory and rebuild it from there.
    fn unpack_and_repack(bytes: &[u8]) -> (tempfile::TempDir, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x-bnd");
        let codec = BinderCodec::new(BinderKind::Bnd4);
        codec
            .unpack(
                &UnpackRequest {
                    source_name: "x.bnd",
                    source_path: None,
                    payload: bytes,
                    compression: DcxType::None,
                    target_dir: &target,
                    policy: TraversalPolicy::FoldLeading,
                },
                &silent,
            )
            .unwrap();
        let mut repacked = codec.repack(&target, TraversalPolicy::FoldLeading, &silent).unwrap();
        let (_, rebuilt) = repacked.outputs.remove(0);
        (dir, rebuilt)
    }

    fn with_names(names: &[&str]) -> Binder {
        let mut binder = sample(0x74);
        binder.files = names
            .iter()
            .enumerate()
            .map(|(i, name)| BinderFile {
                flags: 0x40,
                id: i as i32,
                name: Some((*name).to_string()),
                uncompressed_size: None,
                data: format!("entry {i}").into_bytes(),
            })
            .collect();
        binder
    }

    #[test]
    fn test_clashing_names_keep_both_entries() {
        let bytes = bnd4::write_bnd4(&with_names(&[r"N:\FDP\data\a.param", "a.param"])).unwrap();
        let (dir, rebuilt) = unpack_and_repack(&bytes);
        assert_eq!(rebuilt, bytes);

        let target = dir.path().join("x-bnd");
        assert_eq!(std::fs::read(target.join("a.param")).unwrap(), b"entry 0");
        assert_eq!(std::fs::read(target.join("a~1.param")).unwrap(), b"entry 1");
    }

    #[test]
    fn test_entry_named_like_the_manifest() {
        let bytes = bnd4::write_bnd4(&with_names(&["_soulspak-bnd4.xml", r"sub\b.txt"])).unwrap();
        let (dir, rebuilt) = unpack_and_repack(&bytes);
        assert_eq!(rebuilt, bytes);
        assert_eq!(
            std::fs::read(dir.path().join("x-bnd").join("_soulspak-bnd4~1.xml")).unwrap(),
            b"entry 0"
        );
    }

    #[test]
    fn test_names_with_surrounding_spaces_round_trip() {
        let bytes = bnd4::write_bnd4(&with_names(&[" a.param", r"N:\FDP\data\b.param "])).unwrap();
        let (dir, rebuilt) = unpack_and_repack(&bytes);
        assert_eq!(rebuilt, bytes);
        assert!(dir.path().join("x-bnd").join(" a.param").is_file());
    }

    #[test]
    fn test_evil_entry_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = sample(0x74);
        binder.files[1].name = Some(r"param\..\..\..\evil.dll".to_string());
        let bytes = bnd4::write_bnd4(&binder).unwrap();
        let target = dir.path().join("out");
        let err = BinderCodec::new(BinderKind::Bnd4)
            .unpack(
                &UnpackRequest {
                    source_name: "x.bnd",
                    source_path: None,
                    payload: &bytes,
                    compression: DcxType::None,
                    target_dir: &target,
                    policy: TraversalPolicy::FoldLeading,
                },
                &silent,
            )
            .unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
        assert!(!target.exists());
        assert!(!dir.path().join("evil.dll").exists());
    }

    #[test]
    fn test_bxf_without_bdt_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (bhd, _) = bnd4::write_bxf4(&sample(0x74)).unwrap();
        let bhd_path = dir.path().join("Data1.bhd");
        std::fs::write(&bhd_path, &bhd).unwrap();
        let err = BinderCodec::new(BinderKind::Bxf4)
            .unpack(
                &UnpackRequest {
                    source_name: "Data1.bhd",
                    source_path: Some(&bhd_path),
                    payload: &bhd,
                    compression: DcxType::None,
                    target_dir: &dir.path().join("Data1-bhd"),
                    policy: TraversalPolicy::FoldLeading,
                },
                &silent,
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingBdt { .. }));
    }
}
