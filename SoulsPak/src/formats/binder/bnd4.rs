//! BND4 and BXF4 (BHF4 + BDF4)
//!
//! Header layout, 0x40 bytes:
//!
//! ```text
//! 0x00 "BND4"|"BHF4"  0x04 unk04  0x05 unk05  0x09 big endian  0x0A !bit big endian
//! 0x0C file count     0x10 0x40   0x18 version[8]  0x20 file header size
//! 0x28 headers end (BND4) / 0     0x30 unicode  0x31 format  0x32 extended
//! 0x38 hash table offset (extended == 4)
//! ```

use super::{
    Binder, BinderFile, EntrySlots, OffsetSlot, distinct_size, entry_data, format_flags,
    read_name, read_offset, to_usize, write_data, write_names,
};
use crate::error::{Error, Result};
use crate::utils::{ByteReader, ByteWriter};

const HEADER_SIZE: u64 = 0x40;
const BDF4_HEADER_SIZE: u64 = 0x30;

/// Size of one file header for a logical format byte.
fn file_header_size(binder: &Binder) -> u64 {
    let mut size = 0x10;
    if binder.has(format_flags::COMPRESSION) {
        size += 8;
    }
    size += if binder.has(format_flags::LONG_OFFSETS) { 8 } else { 4 };
    if binder.has(format_flags::IDS) {
        size += 4;
    }
    if binder.has_names() {
        size += 4;
    }
    size
}

/// Hash of an entry path as stored in the extended-4 lookup table.
///
/// Case-insensitive, separator-agnostic, always rooted at `/`.
#[must_use]
pub fn path_hash(path: &str) -> u32 {
    let mut normalized = path.trim().replace('\\', "/").to_lowercase();
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    normalized
        .encode_utf16()
        .fold(0u32, |hash, unit| hash.wrapping_mul(37).wrapping_add(u32::from(unit)))
}

fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    (2u32..)
        .take_while(|&d| u64::from(d) * u64::from(d) <= u64::from(n))
        .all(|d| n % d != 0)
}

/// Bucket count: the first prime at or above one seventh of the entries.
fn group_count(file_count: usize) -> u32 {
    let start = u32::try_from(file_count / 7).unwrap_or(u32::MAX);
    (start..).find(|&n| is_prime(n)).unwrap_or(start)
}

fn write_hash_table(w: &mut ByteWriter, binder: &Binder) {
    let groups = group_count(binder.files.len());
    let mut buckets: Vec<Vec<(u32, i32)>> = vec![Vec::new(); groups as usize];
    for (index, file) in binder.files.iter().enumerate() {
        let hash = path_hash(file.name.as_deref().unwrap_or_default());
        buckets[(hash % groups) as usize].push((hash, index as i32));
    }

    w.write_i64(0);
    let hashes_offset = w.reserve_u64();
    w.write_u32(groups);
    w.write_i32(0x0008_0810);

    let mut start = 0;
    for bucket in &buckets {
        w.write_i32(bucket.len() as i32);
        w.write_i32(start);
        start += bucket.len() as i32;
    }

    let here = w.position() as u64;
    w.fill_u64(hashes_offset, here);
    for &(hash, index) in buckets.iter().flatten() {
        w.write_u32(hash);
        w.write_i32(index);
    }
}

/// Fields read from the header that are not part of [`Binder`].
struct HeaderInfo {
    count: usize,
    stride: usize,
}

fn read_header(r: &mut ByteReader<'_>, magic: &[u8; 4], format: &'static str) -> Result<(Binder, HeaderInfo)> {
    r.expect_magic(magic, format)?;
    let unk04 = r.read_bool()?;
    let unk05 = r.read_bool()?;
    r.read_bytes(3)?;
    let big_endian = r.read_bool()?;
    let bit_big_endian = !r.read_bool()?;
    r.read_u8()?;
    r.big_endian = big_endian;

    let count = to_usize(i64::from(r.read_i32()?), "file count")?;
    let header_size = r.read_i64()?;
    if header_size != HEADER_SIZE as i64 {
        return Err(Error::MalformedBinder(format!(
            "{format} header size is {header_size:#x}, expected {HEADER_SIZE:#x}"
        )));
    }
    let version = r.read_fixed_str(8)?;
    let stride = to_usize(r.read_i64()?, "file header size")?;
    r.read_i64()?;
    let unicode = r.read_bool()?;
    let raw_format = r.read_u8()?;
    let extended = r.read_u8()?;
    r.read_u8()?;
    r.read_i32()?;
    r.read_i64()?;

    let binder = Binder {
        version,
        format: raw_format,
        big_endian,
        bit_big_endian,
        unicode,
        extended,
        unk04,
        unk05,
        unk18: 0,
        files: Vec::new(),
    };
    if (stride as u64) < file_header_size(&binder) {
        return Err(Error::MalformedBinder(format!(
            "file header size {stride:#x} too small for format {raw_format:#04x}"
        )));
    }
    Ok((
        binder,
        HeaderInfo { count, stride },
    ))
}

fn read_files(r: &mut ByteReader<'_>, binder: &Binder, info: &HeaderInfo, data: &[u8]) -> Result<Vec<BinderFile>> {
    let long_offsets = binder.has(format_flags::LONG_OFFSETS);
    let mut files = Vec::with_capacity(info.count.min(r.len() / 0x10));
    for index in 0..info.count {
        r.seek(index.saturating_mul(info.stride).saturating_add(HEADER_SIZE as usize));
        let flags = r.read_u8()?;
        r.read_bytes(3)?;
        r.read_i32()?;
        let size = to_usize(r.read_i64()?, "entry size")?;
        let uncompressed = if binder.has(format_flags::COMPRESSION) {
            Some(r.read_i64()? as u64)
        } else {
            None
        };
        let offset = read_offset(r, long_offsets)?;
        let id = if binder.has(format_flags::IDS) { r.read_i32()? } else { -1 };
        let name = if binder.has_names() {
            let name_offset = r.read_u32()? as usize;
            Some(read_name(r, name_offset, binder.unicode)?).filter(|n| !n.is_empty())
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

/// Writes the header, returning the headers-end and hash-table slots.
fn write_header(w: &mut ByteWriter, binder: &Binder, magic: &[u8; 4]) -> Result<(usize, usize)> {
    w.write_bytes(magic);
    w.write_bool(binder.unk04);
    w.write_bool(binder.unk05);
    w.write_bytes(&[0, 0, 0]);
    w.write_bool(binder.big_endian);
    w.write_bool(!binder.bit_big_endian);
    w.write_u8(0);
    w.write_i32(
        i32::try_from(binder.files.len())
            .map_err(|_| Error::MalformedBinder(format!("too many entries: {}", binder.files.len())))?,
    );
    w.write_u64(HEADER_SIZE);
    w.write_fixed_str(&binder.version, 8);
    w.write_u64(file_header_size(binder));
    let headers_end = w.reserve_u64();
    w.write_bool(binder.unicode);
    w.write_u8(binder.format);
    w.write_u8(binder.extended);
    w.write_u8(0);
    w.write_i32(0);
    let hash_table = w.reserve_u64();
    Ok((headers_end, hash_table))
}

fn write_file_headers(w: &mut ByteWriter, binder: &Binder) -> Vec<EntrySlots> {
    let long_offsets = binder.has(format_flags::LONG_OFFSETS);
    binder
        .files
        .iter()
        .map(|file| {
            w.write_u8(file.flags);
            w.write_bytes(&[0, 0, 0]);
            w.write_i32(-1);
            w.write_u64(file.data.len() as u64);
            if binder.has(format_flags::COMPRESSION) {
                w.write_u64(file.uncompressed_size.unwrap_or(file.data.len() as u64));
            }
            let data_offset = OffsetSlot::reserve(w, long_offsets);
            if binder.has(format_flags::IDS) {
                w.write_i32(file.id);
            }
            let name_offset = binder.has_names().then(|| w.reserve_u32());
            EntrySlots {
                data_offset,
                name_offset,
            }
        })
        .collect()
}

/// File headers, names and the optional hash table.
fn write_tables(w: &mut ByteWriter, binder: &Binder, hash_table: usize) -> Vec<EntrySlots> {
    let slots = write_file_headers(w, binder);
    write_names(w, binder, &slots);
    if binder.extended == 4 {
        w.pad(8);
        let here = w.position() as u64;
        w.fill_u64(hash_table, here);
        write_hash_table(w, binder);
    }
    slots
}

/// Parse a BND4 binder.
pub fn read_bnd4(bytes: &[u8]) -> Result<Binder> {
    let mut r = ByteReader::new(bytes, false);
    let (mut binder, info) = read_header(&mut r, b"BND4", "BND4")?;
    binder.files = read_files(&mut r, &binder, &info, bytes)?;
    Ok(binder)
}

/// Serialize a BND4 binder.
pub fn write_bnd4(binder: &Binder) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(binder.big_endian);
    let (headers_end, hash_table) = write_header(&mut w, binder, b"BND4")?;
    let slots = write_tables(&mut w, binder, hash_table);
    let here = w.position() as u64;
    w.fill_u64(headers_end, here);
    write_data(&mut w, None, binder, &slots)?;
    Ok(w.into_inner())
}

/// Parse a BXF4 header file and its data file.
pub fn read_bxf4(bhd: &[u8], bdt: &[u8]) -> Result<Binder> {
    let mut r = ByteReader::new(bhd, false);
    let (mut binder, info) = read_header(&mut r, b"BHF4", "BHF4")?;
    ByteReader::new(bdt, false).expect_magic(b"BDF4", "BDF4")?;
    binder.files = read_files(&mut r, &binder, &info, bdt)?;
    Ok(binder)
}

/// Serialize a BXF4 binder into `(bhd, bdt)`.
pub fn write_bxf4(binder: &Binder) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut bhd = ByteWriter::new(binder.big_endian);
    let (_, hash_table) = write_header(&mut bhd, binder, b"BHF4")?;
    let slots = write_tables(&mut bhd, binder, hash_table);

    let mut bdt = ByteWriter::new(binder.big_endian);
    bdt.write_bytes(b"BDF4");
    bdt.write_bool(binder.unk04);
    bdt.write_bool(binder.unk05);
    bdt.write_bytes(&[0, 0, 0]);
    bdt.write_bool(binder.big_endian);
    bdt.write_bool(!binder.bit_big_endian);
    bdt.write_u8(0);
    bdt.write_i32(0);
    bdt.write_u64(BDF4_HEADER_SIZE);
    bdt.write_fixed_str(&binder.version, 8);
    bdt.write_u64(0);
    bdt.write_u64(0);
    debug_assert_eq!(bdt.position() as u64, BDF4_HEADER_SIZE);
    write_data(&mut bdt, Some(&mut bhd), binder, &slots)?;
    Ok((bhd.into_inner(), bdt.into_inner()))
}
