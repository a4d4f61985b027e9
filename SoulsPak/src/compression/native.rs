//! Dynamically loaded Oodle runtime
//!
//! The library is proprietary and shipped with the games, so it is bound at
//! runtime through `libloading` rather than linked.

use std::ffi::c_void;
use std::path::Path;
use std::ptr;

use libloading::Library;

use super::oodle::OodleEngine;
use crate::error::{Error, Result};

const COMPRESSOR_KRAKEN: i32 = 8;
const LEVEL_OPTIMAL2: i32 = 6;
const FUZZ_SAFE_YES: i32 = 1;
const THREAD_PHASE_ALL: i32 = 3;

type DecompressFn = unsafe extern "system" fn(
    comp_buf: *const u8,
    comp_len: isize,
    raw_buf: *mut u8,
    raw_len: isize,
    fuzz_safe: i32,
    check_crc: i32,
    verbosity: i32,
    dec_buf_base: *mut u8,
    dec_buf_size: isize,
    callback: *mut c_void,
    callback_user_data: *mut c_void,
    decoder_memory: *mut c_void,
    decoder_memory_size: isize,
    thread_phase: i32,
) -> isize;

type CompressFn = unsafe extern "system" fn(
    compressor: i32,
    raw_buf: *const u8,
    raw_len: isize,
    comp_buf: *mut u8,
    level: i32,
    options: *const c_void,
    dictionary_base: *const c_void,
    lrm: *const c_void,
    scratch_mem: *mut c_void,
    scratch_size: isize,
) -> isize;

/// Oodle entry points resolved from a loaded library.
pub struct NativeOodle {
    decompress: DecompressFn,
    compress: CompressFn,
    // Keeps the function pointers valid.
    _library: Library,
}

impl NativeOodle {
    /// Load the library at `path` and resolve both entry points.
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; the Oodle runtime
        // has none with side effects beyond its own state.
        let library = unsafe { Library::new(path) }?;
        // SAFETY: signatures match the documented OodleLZ ABI.
        let decompress = unsafe { *library.get::<DecompressFn>(b"OodleLZ_Decompress\0")? };
        // SAFETY: as above.
        let compress = unsafe { *library.get::<CompressFn>(b"OodleLZ_Compress\0")? };
        Ok(Self {
            decompress,
            compress,
            _library: library,
        })
    }
}

/// Worst-case Kraken output for `raw_len` input bytes.
fn compressed_bound(raw_len: usize) -> usize {
    raw_len + 274 * raw_len.div_ceil(0x40000) + 0x100
}

impl OodleEngine for NativeOodle {
    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(decompressed_size)
            .map_err(|e| Error::EngineFailure {
                operation: "decompress",
                message: format!("cannot allocate {decompressed_size} bytes: {e}"),
            })?;
        out.resize(decompressed_size, 0);
        // SAFETY: both buffers are valid for the lengths passed and the
        // optional pointers are null.
        let written = unsafe {
            (self.decompress)(
                compressed.as_ptr(),
                compressed.len() as isize,
                out.as_mut_ptr(),
                decompressed_size as isize,
                FUZZ_SAFE_YES,
                0,
                0,
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
                THREAD_PHASE_ALL,
            )
        };
        if written < 0 || written as usize != decompressed_size {
            return Err(Error::EngineFailure {
                operation: "decompress",
                message: format!("expected {decompressed_size} bytes, got {written}"),
            });
        }
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; compressed_bound(data.len())];
        // SAFETY: `out` is sized to the documented worst case and the
        // optional pointers are null.
        let written = unsafe {
            (self.compress)(
                COMPRESSOR_KRAKEN,
                data.as_ptr(),
                data.len() as isize,
                out.as_mut_ptr(),
                LEVEL_OPTIMAL2,
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };
        if written <= 0 {
            return Err(Error::EngineFailure {
                operation: "compress",
                message: format!("compressor returned {written}"),
            });
        }
        out.truncate(written as usize);
        Ok(out)
    }
}
