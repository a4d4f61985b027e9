//! TPF texture containers
//!
//! A TPF is a flat list of DDS textures with a small per-texture header.
//! Header layout:
//!
//! ```text
//! 0x00 "TPF\0"  0x04 data size  0x08 texture count
//! 0x0C platform  0x0D flag2  0x0E name encoding (1 = UTF-16)  0x0F 0
//! ```
//!
//! Console platforms add width, height and a few platform-specific fields
//! to every texture header and use big-endian on Xbox 360 and PS3.

pub mod manifest;

use std::path::Path;

pub use manifest::{
    ManifestFloats, ManifestTexture, ManifestTextureHeader, ManifestTextures, SIDECAR_NAME,
    TpfManifest,
};

use super::binder::{on_disk, read_name, to_usize, write_name};
use super::layout::DiskLayout;
use super::{Codec, FormatKind, RepackedContainer, UnpackRequest};
use crate::compression::DcxType;
use crate::error::{Error, Result};
use crate::progress::{Phase, Progress, ProgressCallback};
use crate::utils::{ByteReader, ByteWriter, TraversalPolicy, sanitize};

const DDS_MIPMAP_COUNT: usize = 0x1C;
const DDS_CAPS2: usize = 0x70;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

/// Platform byte at 0x0C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpfPlatform {
    Pc,
    Xbox360,
    Ps3,
    Ps4,
    XboxOne,
}

impl TpfPlatform {
    pub fn from_byte(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Pc,
            1 => Self::Xbox360,
            2 => Self::Ps3,
            4 => Self::Ps4,
            5 => Self::XboxOne,
            other => return Err(Error::MalformedTpf(format!("unknown platform {other}"))),
        })
    }

    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Pc => 0,
            Self::Xbox360 => 1,
            Self::Ps3 => 2,
            Self::Ps4 => 4,
            Self::XboxOne => 5,
        }
    }

    #[must_use]
    pub fn is_big_endian(self) -> bool {
        matches!(self, Self::Xbox360 | Self::Ps3)
    }

    fn has_dxgi_format(self) -> bool {
        matches!(self, Self::Ps4 | Self::XboxOne)
    }
}

/// Console-only texture header fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureHeader {
    pub width: i16,
    pub height: i16,
    /// PS3 only.
    pub unk1: i32,
    /// PS3 (when `flag2` is set), PS4 and Xbox One.
    pub unk2: i32,
    /// PS4 and Xbox One.
    pub texture_count: i32,
    /// PS4 and Xbox One.
    pub dxgi_format: i32,
}

/// Optional block of floats after a texture header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloatStruct {
    pub unk00: i32,
    pub values: Vec<f32>,
}

/// One texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub format: u8,
    /// 0 texture, 1 cubemap, 2 volume.
    pub texture_type: u8,
    pub mipmaps: u8,
    /// 2 and 3 mean `data` is stored DCP_EDGE-compressed; it is kept as stored.
    pub flags1: u8,
    pub header: Option<TextureHeader>,
    pub float_struct: Option<FloatStruct>,
    pub data: Vec<u8>,
}

impl Texture {
    /// Take type and mipmap count from the data's DDS header, if it has one.
    fn sync_with_dds(&mut self) {
        if !self.data.starts_with(b"DDS ") || self.data.len() < DDS_CAPS2 + 4 {
            return;
        }
        let read = |at: usize| {
            u32::from_le_bytes([
                self.data[at],
                self.data[at + 1],
                self.data[at + 2],
                self.data[at + 3],
            ])
        };
        let caps2 = read(DDS_CAPS2);
        let mipmaps = read(DDS_MIPMAP_COUNT);
        self.texture_type = if caps2 & DDSCAPS2_CUBEMAP != 0 {
            1
        } else if caps2 & DDSCAPS2_VOLUME != 0 {
            2
        } else {
            0
        };
        self.mipmaps = mipmaps as u8;
    }
}

/// A parsed TPF.
#[derive(Debug, Clone, PartialEq)]
pub struct Tpf {
    pub platform: TpfPlatform,
    pub flag2: u8,
    /// 1 for UTF-16 names, 0 or 2 for Shift-JIS.
    pub encoding: u8,
    pub textures: Vec<Texture>,
}

impl Tpf {
    fn unicode(&self) -> bool {
        self.encoding == 1
    }
}

/// Parse a TPF.
pub fn read_tpf(data: &[u8]) -> Result<Tpf> {
    let platform = TpfPlatform::from_byte(*data.get(0x0C).ok_or(Error::UnexpectedEof {
        offset: 0x0C,
        wanted: 1,
    })?)?;
    let mut r = ByteReader::new(data, platform.is_big_endian());
    r.expect_magic(b"TPF\0", "TPF")?;
    r.read_u32()?; // data size
    let count = to_usize(i64::from(r.read_i32()?), "texture count")?;
    r.read_u8()?; // platform
    let flag2 = r.read_u8()?;
    let encoding = r.read_u8()?;
    r.read_u8()?;
    let unicode = encoding == 1;

    let mut textures = Vec::with_capacity(count.min(data.len() / 0x14));
    for _ in 0..count {
        let data_offset = r.read_u32()? as usize;
        let size = to_usize(i64::from(r.read_i32()?), "texture size")?;
        let format = r.read_u8()?;
        let texture_type = r.read_u8()?;
        let mipmaps = r.read_u8()?;
        let flags1 = r.read_u8()?;

        let mut header = None;
        if platform != TpfPlatform::Pc {
            let mut h = TextureHeader {
                width: r.read_i16()?,
                height: r.read_i16()?,
                ..TextureHeader::default()
            };
            match platform {
                TpfPlatform::Xbox360 => {
                    r.read_i32()?;
                }
                TpfPlatform::Ps3 => {
                    h.unk1 = r.read_i32()?;
                    if flag2 != 0 {
                        h.unk2 = r.read_i32()?;
                    }
                }
                TpfPlatform::Ps4 | TpfPlatform::XboxOne => {
                    h.texture_count = r.read_i32()?;
                    h.unk2 = r.read_i32()?;
                }
                TpfPlatform::Pc => {}
            }
            header = Some(h);
        }

        let name_offset = r.read_u32()? as usize;
        let has_floats = r.read_i32()? == 1;
        if platform.has_dxgi_format() {
            let dxgi_format = r.read_i32()?;
            if let Some(h) = header.as_mut() {
                h.dxgi_format = dxgi_format;
            }
        }
        let float_struct = if has_floats {
            let unk00 = r.read_i32()?;
            let length = r.read_i32()?;
            if length < 0 || length % 4 != 0 {
                return Err(Error::MalformedTpf(format!("float block length {length}")));
            }
            let values = (0..length / 4).map(|_| r.read_f32()).collect::<Result<_>>()?;
            Some(FloatStruct { unk00, values })
        } else {
            None
        };

        textures.push(Texture {
            name: read_name(&r, name_offset, unicode)?,
            format,
            texture_type,
            mipmaps,
            flags1,
            header,
            float_struct,
            data: r.slice_at(data_offset, size)?.to_vec(),
        });
    }

    Ok(Tpf {
        platform,
        flag2,
        encoding,
        textures,
    })
}

/// Serialize a TPF: headers, then names, then 0x10-aligned data.
pub fn write_tpf(tpf: &Tpf) -> Result<Vec<u8>> {
    let platform = tpf.platform;
    let mut w = ByteWriter::new(platform.is_big_endian());
    w.write_bytes(b"TPF\0");
    let data_size = w.reserve_u32();
    w.write_u32(tpf.textures.len() as u32);
    w.write_u8(platform.as_byte());
    w.write_u8(tpf.flag2);
    w.write_u8(tpf.encoding);
    w.write_u8(0);

    let mut slots = Vec::with_capacity(tpf.textures.len());
    for texture in &tpf.textures {
        let data_offset = w.reserve_u32();
        w.write_u32(u32::try_from(texture.data.len()).map_err(|_| {
            Error::MalformedTpf(format!("texture {} is larger than 4 GiB", texture.name))
        })?);
        w.write_u8(texture.format);
        w.write_u8(texture.texture_type);
        w.write_u8(texture.mipmaps);
        w.write_u8(texture.flags1);

        let header = texture.header.unwrap_or_default();
        if platform != TpfPlatform::Pc {
            w.write_i16(header.width);
            w.write_i16(header.height);
            match platform {
                TpfPlatform::Xbox360 => w.write_i32(0),
                TpfPlatform::Ps3 => {
                    w.write_i32(header.unk1);
                    if tpf.flag2 != 0 {
                        w.write_i32(header.unk2);
                    }
                }
                TpfPlatform::Ps4 | TpfPlatform::XboxOne => {
                    w.write_i32(header.texture_count);
                    w.write_i32(header.unk2);
                }
                TpfPlatform::Pc => {}
            }
        }

        let name_offset = w.reserve_u32();
        w.write_i32(i32::from(texture.float_struct.is_some()));
        if platform.has_dxgi_format() {
            w.write_i32(header.dxgi_format);
        }
        if let Some(floats) = &texture.float_struct {
            w.write_i32(floats.unk00);
            w.write_i32((floats.values.len() * 4) as i32);
            for value in &floats.values {
                w.write_f32(*value);
            }
        }
        slots.push((data_offset, name_offset));
    }

    for (texture, &(_, name_offset)) in tpf.textures.iter().zip(&slots) {
        let here = w.position() as u32;
        w.fill_u32(name_offset, here);
        write_name(&mut w, &texture.name, tpf.unicode());
    }

    let data_start = w.position();
    for (texture, &(data_offset, _)) in tpf.textures.iter().zip(&slots) {
        if !texture.data.is_empty() {
            w.pad(0x10);
        }
        let here = u32::try_from(w.position())
            .map_err(|_| Error::MalformedTpf("texture data past 4 GiB".to_string()))?;
        w.fill_u32(data_offset, here);
        w.write_bytes(&texture.data);
    }
    let size = (w.position() - data_start) as u32;
    w.fill_u32(data_size, size);
    Ok(w.into_inner())
}

/// Codec for TPF containers: one `.dds` file per texture.
#[derive(Debug, Clone, Copy, Default)]
pub struct TpfCodec;

impl Codec for TpfCodec {
    fn kind(&self) -> FormatKind {
        FormatKind::Tpf
    }

    fn sidecar_name(&self) -> &'static str {
        SIDECAR_NAME
    }

    fn unpack(&self, request: &UnpackRequest<'_>, progress: ProgressCallback<'_>) -> Result<usize> {
        let tpf = read_tpf(request.payload)?;
        tracing::info!(
            "Unpacking TPF: {} ({} textures)",
            request.source_name,
            tpf.textures.len()
        );

        let mut layout = DiskLayout::with_reserved(&[SIDECAR_NAME]);
        let mut targets = Vec::with_capacity(tpf.textures.len());
        for texture in &tpf.textures {
            let wanted = format!("{}.dds", texture.name);
            let path = sanitize(&wanted, request.policy)?;
            // Texture names are bare; anything stripped must come back on repack.
            let disk = if path.root.is_empty() {
                layout.claim(&path.relative)
            } else {
                Some(layout.claim(&path.relative).unwrap_or(path.relative))
            };
            targets.push(disk);
        }

        std::fs::create_dir_all(request.target_dir)?;
        let total = tpf.textures.len();
        let mut textures = Vec::with_capacity(total);
        for (index, (texture, disk)) in tpf.textures.iter().zip(targets).enumerate() {
            let relative = disk.clone().unwrap_or_else(|| format!("{}.dds", texture.name));
            if disk.is_some() {
                tracing::warn!("Texture {index} ({}) written as {relative}", texture.name);
            }
            let out = on_disk(&relative).under(request.target_dir);
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &texture.data)?;
            progress(&Progress::with_file(
                Phase::WritingEntries,
                index + 1,
                total,
                relative,
            ));

            textures.push(ManifestTexture {
                name: texture.name.clone(),
                disk,
                format: texture.format,
                texture_type: texture.texture_type,
                mipmaps: texture.mipmaps,
                flags1: texture.flags1,
                header: texture.header.map(|h| ManifestTextureHeader {
                    width: h.width,
                    height: h.height,
                    unk1: h.unk1,
                    unk2: h.unk2,
                    texturecount: h.texture_count,
                    dxgiformat: h.dxgi_format,
                }),
                floats: texture.float_struct.as_ref().map(|f| ManifestFloats {
                    unk00: f.unk00,
                    value: f.values.clone(),
                }),
            });
        }

        TpfManifest {
            filename: request.source_name.to_string(),
            compression: request.compression.to_string(),
            platform: tpf.platform.as_byte(),
            flag2: tpf.flag2,
            encoding: tpf.encoding,
            textures: ManifestTextures { texture: textures },
        }
        .write(&request.target_dir.join(SIDECAR_NAME))?;
        Ok(total)
    }

    fn repack(
        &self,
        dir: &Path,
        policy: TraversalPolicy,
        progress: ProgressCallback<'_>,
    ) -> Result<RepackedContainer> {
        let sidecar = dir.join(SIDECAR_NAME);
        let manifest = TpfManifest::read(&sidecar)?;
        let compression: DcxType = manifest.compression.parse()?;
        let platform = TpfPlatform::from_byte(manifest.platform)?;
        tracing::info!("Repacking TPF: {}", manifest.filename);

        let total = manifest.textures.texture.len();
        let mut textures = Vec::with_capacity(total);
        for (index, entry) in manifest.textures.texture.into_iter().enumerate() {
            let path = sanitize(&entry.disk_path(), policy)?.under(dir);
            let data = std::fs::read(&path).map_err(|e| Error::InvalidManifest {
                path: sidecar.clone(),
                message: format!("cannot read {}: {e}", path.display()),
            })?;
            progress(&Progress::with_file(
                Phase::ReadingEntries,
                index + 1,
                total,
                entry.name.clone(),
            ));
            let mut texture = Texture {
                name: entry.name,
                format: entry.format,
                texture_type: entry.texture_type,
                mipmaps: entry.mipmaps,
                flags1: entry.flags1,
                header: entry.header.map(|h| TextureHeader {
                    width: h.width,
                    height: h.height,
                    unk1: h.unk1,
                    unk2: h.unk2,
                    texture_count: h.texturecount,
                    dxgi_format: h.dxgiformat,
                }),
                float_struct: entry.floats.map(|f| FloatStruct {
                    unk00: f.unk00,
                    values: f.value,
                }),
                data,
            };
            if platform == TpfPlatform::Pc {
                texture.sync_with_dds();
            }
            textures.push(texture);
        }

        let bytes = write_tpf(&Tpf {
            platform,
            flag2: manifest.flag2,
            encoding: manifest.encoding,
            textures,
        })?;
        Ok(RepackedContainer {
            outputs: vec![(manifest.filename, bytes)],
            compression,
        })
    }
}
