//! Read-only views over input data

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Immutable view over either an in-memory buffer or a file on disk.
///
/// Reads are position independent: every call names its own offset, so
/// format probes can look at headers without sharing a cursor.
#[derive(Debug, Clone)]
pub enum ArchiveSource<'a> {
    /// Bytes already in memory (e.g. a decompressed payload).
    Bytes(Cow<'a, [u8]>),
    /// A file that is only opened when read.
    File(PathBuf),
}

impl<'a> ArchiveSource<'a> {
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        ArchiveSource::Bytes(Cow::Borrowed(bytes))
    }

    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> ArchiveSource<'static> {
        ArchiveSource::Bytes(Cow::Owned(bytes))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ArchiveSource<'static> {
        ArchiveSource::File(path.as_ref().to_path_buf())
    }

    /// Total length in bytes.
    pub fn len(&self) -> Result<u64> {
        match self {
            ArchiveSource::Bytes(bytes) => Ok(bytes.len() as u64),
            ArchiveSource::File(path) => Ok(std::fs::metadata(path)?.len()),
        }
    }

    /// Read up to `len` bytes starting at `offset`; short at end of data.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        match self {
            ArchiveSource::Bytes(bytes) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
                let end = start.saturating_add(len).min(bytes.len());
                Ok(bytes[start..end].to_vec())
            }
            ArchiveSource::File(path) => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = Vec::with_capacity(len);
                file.take(len as u64).read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    /// The first `len` bytes (fewer if the data is shorter).
    pub fn head(&self, len: usize) -> Result<Vec<u8>> {
        self.read_at(0, len)
    }

    /// The whole content, borrowing when already in memory.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            ArchiveSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_ref())),
            ArchiveSource::File(path) => Ok(Cow::Owned(std::fs::read(path)?)),
        }
    }

    /// Path on disk, if the source is a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ArchiveSource::Bytes(_) => None,
            ArchiveSource::File(path) => Some(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bytes_reads_are_clamped() {
        let source = ArchiveSource::from_bytes(b"BND4abcd");
        assert_eq!(source.head(4).unwrap(), b"BND4");
        assert_eq!(source.read_at(6, 10).unwrap(), b"cd");
        assert!(source.read_at(100, 4).unwrap().is_empty());
        assert_eq!(source.len().unwrap(), 8);
    }

    #[test]
    fn test_file_reads_match_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"DCX\0 payload").unwrap();
        let file = ArchiveSource::from_path(tmp.path());
        let bytes = ArchiveSource::from_vec(b"DCX\0 payload".to_vec());
        for (offset, len) in [(0, 4), (4, 3), (10, 10)] {
            assert_eq!(file.read_at(offset, len).unwrap(), bytes.read_at(offset, len).unwrap());
        }
        assert_eq!(file.bytes().unwrap().as_ref(), b"DCX\0 payload");
    }
}
