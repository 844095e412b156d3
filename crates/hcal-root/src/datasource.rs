//! Byte storage behind a [`RootFile`](crate::RootFile).

use std::ops::Deref;

/// File bytes, either memory-mapped from disk or held in memory.
pub enum DataSource {
    /// Read-only mapping of a file on disk.
    Mmap(memmap2::Mmap),
    /// In-memory bytes (`RootFile::from_bytes`).
    Owned(Vec<u8>),
}

impl DataSource {
    /// Map `file` read-only.
    pub fn map(file: &std::fs::File) -> std::io::Result<Self> {
        // SAFETY: the mapping is only ever read. Truncation of the file by another
        // process while mapped is outside what this reader guards against.
        let mmap = unsafe { memmap2::Mmap::map(file)? };
        Ok(Self::Mmap(mmap))
    }
}

impl Deref for DataSource {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            Self::Mmap(m) => m,
            Self::Owned(v) => v,
        }
    }
}
