//! BND3 and BXF3 (BHF3 + BDF3)
//!
//! Header layout, 0x20 bytes:
//!
//! ```text
//! 0x00 "BND3"|"BHF3"  0x04 version[8]  0x0C format  0x0D big endian  0x0E bit big endian
//! 0x10 file count     0x14 headers end (BND3) / 0   0x18 unk18       0x1C 0
//! ```

use super::{
    Binder, BinderFile, EntrySlots, OffsetSlot, distinct_size, entry_data, format_flags,
    read_name, read_offset, to_usize, write_data, write_names,
};
use crate::error::{Error, Result};
use crate::utils::{ByteReader, ByteWriter};

const BDF3_HEADER_SIZE: usize = 0x10;

fn read_header(r: &mut ByteReader<'_>, magic: &[u8; 4], format: &'static str) -> Result<(Binder, usize)> {
    r.expect_magic(magic, format)?;
    let version = r.read_fixed_str(8)?;
    let raw_format = r.read_u8()?;
    let big_endian = r.read_bool()?;
    let bit_big_endian = r.read_bool()?;
    r.read_u8()?;

    let mut binder = Binder {
        version,
        format: raw_format,
        big_endian,
        bit_big_endian,
        unicode: false,
        extended: 0,
        ..Binder::default()
    };
    r.big_endian = binder.io_big_endian();
    let count = to_usize(i64::from(r.read_i32()?), "file count")?;
    r.read_i32()?;
    binder.unk18 = r.read_i32()?;
    r.read_i32()?;
    Ok((binder, count))
}

fn read_files(r: &mut ByteReader<'_>, binder: &Binder, count: usize, data: &[u8]) -> Result<Vec<BinderFile>> {
    let long_offsets = binder.has(format_flags::LONG_OFFSETS);
    let mut files = Vec::with_capacity(count.min(r.len() / 0x10));
    for _ in 0..count {
        let flags = r.read_u8()?;
        r.read_bytes(3)?;
        let size = to_usize(i64::from(r.read_i32()?), "entry size")?;
        let offset = read_offset(r, long_offsets)?;
        let id = if binder.has(format_flags::IDS) { r.read_i32()? } else { -1 };
        let name = if binder.has_names() {
            let name_offset = r.read_u32()? as usize;
            Some(read_name(r, name_offset, false)?).filter(|n| !n.is_empty())
        } else {
            None
        };
        let uncompressed = if binder.has(format_flags::COMPRESSION) {
            Some(r.read_i32()? as u32 as u64)
        } else {
            None
        };
        files.push(BinderFile {
            flags,
            id,
            name,
            uncompressed_size: uncompressed.and_then(|u| distinct_size(u, size)),
            data: entry_data(data, offset, size)?,
        });
    }
    Ok(files)
}

fn write_header(w: &mut ByteWriter, binder: &Binder, magic: &[u8; 4]) -> Result<Option<usize>> {
    w.write_bytes(magic);
    w.write_fixed_str(&binder.version, 8);
    w.write_u8(binder.format);
    w.write_bool(binder.big_endian);
    w.write_bool(binder.bit_big_endian);
    w.write_u8(0);
    w.write_i32(i32::try_from(binder.files.len()).map_err(|_| {
        Error::MalformedBinder(format!("too many entries: {}", binder.files.len()))
    })?);
    let headers_end = (magic == b"BND3").then(|| w.reserve_u32());
    if headers_end.is_none() {
        w.write_i32(0);
    }
    w.write_i32(binder.unk18);
    w.write_i32(0);
    Ok(headers_end)
}

fn write_file_headers(w: &mut ByteWriter, binder: &Binder) -> Vec<EntrySlots> {
    let long_offsets = binder.has(format_flags::LONG_OFFSETS);
    binder
        .files
        .iter()
        .map(|file| {
            w.write_u8(file.flags);
            w.write_bytes(&[0, 0, 0]);
            w.write_i32(file.data.len() as i32);
            let data_offset = OffsetSlot::reserve(w, long_offsets);
            if binder.has(format_flags::IDS) {
                w.write_i32(file.id);
            }
            let name_offset = binder.has_names().then(|| w.reserve_u32());
            if binder.has(format_flags::COMPRESSION) {
                w.write_u32(file.uncompressed_size.unwrap_or(file.data.len() as u64) as u32);
            }
            EntrySlots {
                data_offset,
                name_offset,
            }
        })
        .collect()
}

/// Parse a BND3 binder.
pub fn read_bnd3(bytes: &[u8]) -> Result<Binder> {
    let mut r = ByteReader::new(bytes, false);
    let (mut binder, count) = read_header(&mut r, b"BND3", "BND3")?;
    binder.files = read_files(&mut r, &binder, count, bytes)?;
    Ok(binder)
}

/// Serialize a BND3 binder.
pub fn write_bnd3(binder: &Binder) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(binder.io_big_endian());
    let headers_end = write_header(&mut w, binder, b"BND3")?;
    let slots = write_file_headers(&mut w, binder);
    write_names(&mut w, binder, &slots);
    if let Some(pos) = headers_end {
        let end = w.position() as u32;
        w.fill_u32(pos, end);
    }
    write_data(&mut w, None, binder, &slots)?;
    Ok(w.into_inner())
}

/// Parse a BXF3 header file and its data file.
pub fn read_bxf3(bhd: &[u8], bdt: &[u8]) -> Result<Binder> {
    let mut r = ByteReader::new(bhd, false);
    let (mut binder, count) = read_header(&mut r, b"BHF3", "BHF3")?;
    ByteReader::new(bdt, false).expect_magic(b"BDF3", "BDF3")?;
    binder.files = read_files(&mut r, &binder, count, bdt)?;
    Ok(binder)
}

/// Serialize a BXF3 binder into `(bhd, bdt)`.
pub fn write_bxf3(binder: &Binder) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut bhd = ByteWriter::new(binder.io_big_endian());
    write_header(&mut bhd, binder, b"BHF3")?;
    let slots = write_file_headers(&mut bhd, binder);
    write_names(&mut bhd, binder, &slots);

    let mut bdt = ByteWriter::new(binder.io_big_endian());
    bdt.write_bytes(b"BDF3");
    bdt.write_fixed_str(&binder.version, 8);
    bdt.write_i32(0);
    debug_assert_eq!(bdt.position(), BDF3_HEADER_SIZE);
    write_data(&mut bdt, Some(&mut bhd), binder, &slots)?;
    Ok((bhd.into_inner(), bdt.into_inner()))
}
