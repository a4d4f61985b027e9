//! DCX whole-file compression wrapper
//!
//! All DCX headers are big-endian regardless of the payload. Layout of the
//! `DCX\0` family:
//!
//! ```text
//! 0x00 "DCX\0"  0x04 version  0x08 0x18  0x0C 0x24  0x10 0x24|0x44  0x14 0x2C|0x4C
//! 0x18 "DCS\0"  0x1C uncompressed size   0x20 compressed size
//! 0x24 "DCP\0"  0x28 format   0x2C 0x20  0x30 level  0x38 window  0x40 0x00010100
//! 0x44 "DCA\0"  0x48 8        0x4C compressed data
//! ```
//!
//! The older `DCP\0` wrapper puts the sizes after the parameters and the
//! `DCA\0` chunk after the data.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::utils::ByteWriter;

/// Bytes needed to classify any DCX variant.
pub const HEADER_PROBE_LEN: usize = 0x4C;

const DCX_DATA_OFFSET: usize = 0x4C;
const DCP_DATA_OFFSET: usize = 0x2C;

/// Whole-file compression scheme. `None` means the file was not wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DcxType {
    None,
    DcpDflt,
    DcpEdge,
    DcxEdge,
    DcxDflt10000_24_9,
    DcxDflt10000_44_9,
    DcxDflt11000_44_8,
    DcxDflt11000_44_9,
    DcxDflt11000_44_9_15,
    DcxKrak,
    DcxZstd,
}

impl DcxType {
    /// Every scheme, in manifest order.
    pub const ALL: [DcxType; 11] = [
        DcxType::None,
        DcxType::DcpDflt,
        DcxType::DcpEdge,
        DcxType::DcxEdge,
        DcxType::DcxDflt10000_24_9,
        DcxType::DcxDflt10000_44_9,
        DcxType::DcxDflt11000_44_8,
        DcxType::DcxDflt11000_44_9,
        DcxType::DcxDflt11000_44_9_15,
        DcxType::DcxKrak,
        DcxType::DcxZstd,
    ];

    /// Name used in manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DcxType::None => "None",
            DcxType::DcpDflt => "DCP_DFLT",
            DcxType::DcpEdge => "DCP_EDGE",
            DcxType::DcxEdge => "DCX_EDGE",
            DcxType::DcxDflt10000_24_9 => "DCX_DFLT_10000_24_9",
            DcxType::DcxDflt10000_44_9 => "DCX_DFLT_10000_44_9",
            DcxType::DcxDflt11000_44_8 => "DCX_DFLT_11000_44_8",
            DcxType::DcxDflt11000_44_9 => "DCX_DFLT_11000_44_9",
            DcxType::DcxDflt11000_44_9_15 => "DCX_DFLT_11000_44_9_15",
            DcxType::DcxKrak => "DCX_KRAK",
            DcxType::DcxZstd => "DCX_ZSTD",
        }
    }

    /// Whether this build can both decompress and recompress the scheme.
    #[must_use]
    pub fn is_supported(self) -> bool {
        !matches!(self, DcxType::DcpEdge | DcxType::DcxEdge | DcxType::DcxZstd)
    }

    /// Zlib level for the DFLT variants.
    pub(crate) fn deflate_level(self) -> Option<u32> {
        match self {
            DcxType::DcpDflt
            | DcxType::DcxDflt10000_24_9
            | DcxType::DcxDflt10000_44_9
            | DcxType::DcxDflt11000_44_9
            | DcxType::DcxDflt11000_44_9_15 => Some(9),
            DcxType::DcxDflt11000_44_8 => Some(8),
            _ => None,
        }
    }

    /// Classify a header. `Ok(None)` means the data is not DCX at all.
    pub fn detect(head: &[u8]) -> Result<Option<DcxType>> {
        if head.starts_with(b"DCP\0") {
            return match head.get(4..8) {
                Some(b"DFLT") => Ok(Some(DcxType::DcpDflt)),
                Some(b"EDGE") => Ok(Some(DcxType::DcpEdge)),
                other => Err(Error::InvalidDcx(format!("unknown DCP format {other:?}"))),
            };
        }
        if !head.starts_with(b"DCX\0") {
            return Ok(None);
        }
        if head.len() < 0x3C {
            return Err(Error::InvalidDcx(format!("header truncated at {} bytes", head.len())));
        }

        let version = BigEndian::read_u32(&head[0x04..]);
        let unk10 = BigEndian::read_u32(&head[0x10..]);
        let level = head[0x30];
        let window = head[0x38];
        let scheme = match &head[0x28..0x2C] {
            b"EDGE" => DcxType::DcxEdge,
            b"KRAK" => DcxType::DcxKrak,
            b"ZSTD" => DcxType::DcxZstd,
            b"DFLT" => match (version, unk10, level, window) {
                (0x10000, 0x24, _, _) => DcxType::DcxDflt10000_24_9,
                (0x10000, 0x44, _, _) => DcxType::DcxDflt10000_44_9,
                (0x11000, _, 8, _) => DcxType::DcxDflt11000_44_8,
                (0x11000, _, 9, 15) => DcxType::DcxDflt11000_44_9_15,
                (0x11000, _, 9, _) => DcxType::DcxDflt11000_44_9,
                _ => {
                    return Err(Error::InvalidDcx(format!(
                        "unknown DFLT variant: version {version:#x}, {unk10:#x}, level {level}"
                    )));
                }
            },
            other => return Err(Error::InvalidDcx(format!("unknown DCX format {other:?}"))),
        };
        Ok(Some(scheme))
    }
}

impl fmt::Display for DcxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DcxType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DcxType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedCompression(s.to_string()))
    }
}

/// Sizes and compressed bytes pulled out of a DCX file.
pub(crate) struct DcxBody<'a> {
    pub uncompressed_size: usize,
    pub data: &'a [u8],
}

fn read_size(bytes: &[u8], offset: usize) -> Result<usize> {
    bytes
        .get(offset..offset + 4)
        .map(|b| BigEndian::read_u32(b) as usize)
        .ok_or_else(|| Error::InvalidDcx(format!("truncated at {offset:#x}")))
}

/// Locate the compressed stream inside a DCX file.
pub(crate) fn split_body(scheme: DcxType, bytes: &[u8]) -> Result<DcxBody<'_>> {
    let (sizes_at, data_at) = match scheme {
        DcxType::DcpDflt | DcxType::DcpEdge => (0x24, DCP_DATA_OFFSET),
        DcxType::None => return Err(Error::InvalidDcx("not a DCX file".to_string())),
        _ => {
            if bytes.get(0x44..0x48) != Some(b"DCA\0".as_slice()) {
                return Err(Error::InvalidDcx("missing DCA chunk".to_string()));
            }
            (0x1C, 0x44 + read_size(bytes, 0x48)?)
        }
    };
    let uncompressed_size = read_size(bytes, sizes_at)?;
    let compressed_size = read_size(bytes, sizes_at + 4)?;
    let data = data_at
        .checked_add(compressed_size)
        .and_then(|end| bytes.get(data_at..end))
        .ok_or_else(|| {
            Error::InvalidDcx(format!(
                "compressed size {compressed_size} exceeds file length {}",
                bytes.len()
            ))
        })?;
    Ok(DcxBody {
        uncompressed_size,
        data,
    })
}

/// Wrap an already-compressed stream in the header for `scheme`.
pub(crate) fn wrap(scheme: DcxType, uncompressed_size: usize, data: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::new(true);
    if scheme == DcxType::DcpDflt {
        w.write_bytes(b"DCP\0");
        w.write_bytes(b"DFLT");
        w.write_i32(0x20);
        w.write_i32(0x9000000);
        w.write_i32(0);
        w.write_i32(0);
        w.write_i32(0);
        w.write_i32(0x00010100);
        w.write_bytes(b"DCS\0");
        w.write_u32(uncompressed_size as u32);
        w.write_u32(data.len() as u32);
        w.write_bytes(data);
        w.write_bytes(b"DCA\0");
        w.write_i32(8);
        return w.into_inner();
    }

    let (version, unk10, unk14) = match scheme {
        DcxType::DcxDflt10000_24_9 => (0x10000, 0x24, 0x2C),
        DcxType::DcxDflt10000_44_9 => (0x10000, 0x44, 0x4C),
        _ => (0x11000, 0x44, 0x4C),
    };
    let (format, level, window): (&[u8; 4], u8, u8) = match scheme {
        DcxType::DcxKrak => (b"KRAK", 6, 0),
        DcxType::DcxZstd => (b"ZSTD", 0x15, 0),
        DcxType::DcxEdge => (b"EDGE", 0, 0),
        DcxType::DcxDflt11000_44_8 => (b"DFLT", 8, 0),
        DcxType::DcxDflt11000_44_9_15 => (b"DFLT", 9, 15),
        _ => (b"DFLT", 9, 0),
    };

    w.write_bytes(b"DCX\0");
    w.write_i32(version);
    w.write_i32(0x18);
    w.write_i32(0x24);
    w.write_i32(unk10);
    w.write_i32(unk14);
    w.write_bytes(b"DCS\0");
    w.write_u32(uncompressed_size as u32);
    w.write_u32(data.len() as u32);
    w.write_bytes(b"DCP\0");
    w.write_bytes(format);
    w.write_i32(0x20);
    w.write_bytes(&[level, 0, 0, 0]);
    w.write_i32(0);
    w.write_bytes(&[window, 0, 0, 0]);
    w.write_i32(0);
    w.write_i32(0x00010100);
    w.write_bytes(b"DCA\0");
    w.write_i32(8);
    debug_assert_eq!(w.position(), DCX_DATA_OFFSET);
    w.write_bytes(data);
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_header_is_detected_as_itself() {
        for scheme in DcxType::ALL.into_iter().filter(|t| *t != DcxType::None) {
            let wrapped = wrap(scheme, 3, b"abc");
            if scheme == DcxType::DcpEdge {
                continue;
            }
            assert_eq!(DcxType::detect(&wrapped).unwrap(), Some(scheme), "{scheme}");
        }
    }

    #[test]
    fn test_split_body_finds_data() {
        let wrapped = wrap(DcxType::DcxKrak, 10, b"xyz");
        let body = split_body(DcxType::DcxKrak, &wrapped).unwrap();
        assert_eq!(body.uncompressed_size, 10);
        assert_eq!(body.data, b"xyz");

        let wrapped = wrap(DcxType::DcpDflt, 5, b"12");
        let body = split_body(DcxType::DcpDflt, &wrapped).unwrap();
        assert_eq!(body.uncompressed_size, 5);
        assert_eq!(body.data, b"12");
    }

    #[test]
    fn test_not_dcx() {
        assert_eq!(DcxType::detect(b"BND4\0\0\0\0").unwrap(), None);
        assert_eq!(DcxType::detect(b"").unwrap(), None);
    }

    #[test]
    fn test_truncated_header_is_invalid() {
        assert!(DcxType::detect(b"DCX\0\0\x01\0\0").is_err());
        let wrapped = wrap(DcxType::DcxDflt11000_44_9, 100, &[0u8; 50]);
        assert!(split_body(DcxType::DcxDflt11000_44_9, &wrapped[..80]).is_err());
    }

    #[test]
    fn test_names_parse_back() {
        for scheme in DcxType::ALL {
            assert_eq!(scheme.as_str().parse::<DcxType>().unwrap(), scheme);
        }
        assert!("DCX_LZMA".parse::<DcxType>().is_err());
    }
}
