//! `TKey` records and the directory key lists that index them.

use crate::decompress::decompress;
use crate::error::{Result, RootError};
use crate::rbuffer::RBuffer;

/// A parsed `TKey` header.
#[derive(Debug, Clone)]
pub struct Key {
    /// Bytes on disk: key header plus (possibly compressed) object.
    pub n_bytes: u32,
    /// Key class version; `> 1000` means 64-bit seeks.
    pub version: u16,
    /// Uncompressed object length.
    pub obj_len: u32,
    pub datime: u32,
    /// Length of the key header, including any class-specific extension (e.g. `TBasket`).
    pub key_len: u16,
    pub cycle: u16,
    /// Absolute file offset of this key.
    pub seek_key: u64,
    pub seek_pdir: u64,
    pub class_name: String,
    pub name: String,
    pub title: String,
}

impl Key {
    /// Read a key header at the reader's position.
    pub fn read(r: &mut RBuffer, is_large: bool) -> Result<Self> {
        let n_bytes = r.read_u32()?;
        let version = r.read_u16()?;
        let obj_len = r.read_u32()?;
        let datime = r.read_u32()?;
        let key_len = r.read_u16()?;
        let cycle = r.read_u16()?;
        let (seek_key, seek_pdir) = if version > 1000 || is_large {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (u64::from(r.read_u32()?), u64::from(r.read_u32()?))
        };
        Ok(Self {
            n_bytes,
            version,
            obj_len,
            datime,
            key_len,
            cycle,
            seek_key,
            seek_pdir,
            class_name: r.read_string()?,
            name: r.read_string()?,
            title: r.read_string()?,
        })
    }

    /// The object bytes as stored on disk (after the key header).
    pub fn stored_bytes<'d>(&self, file: &'d [u8]) -> Result<&'d [u8]> {
        let start = self.seek_key as usize;
        let end = start + self.n_bytes as usize;
        if end > file.len() || self.key_len as usize > self.n_bytes as usize {
            return Err(RootError::BufferUnderflow {
                offset: start,
                need: self.n_bytes as usize,
                have: file.len().saturating_sub(start),
            });
        }
        Ok(&file[start + self.key_len as usize..end])
    }

    /// Whether the stored object is compressed.
    pub fn is_compressed(&self) -> bool {
        self.obj_len != self.n_bytes - u32::from(self.key_len)
    }

    /// Read and, when needed, decompress the object payload.
    pub fn payload(&self, file: &[u8]) -> Result<Vec<u8>> {
        let stored = self.stored_bytes(file)?;
        if self.is_compressed() {
            decompress(stored, self.obj_len as usize)
        } else {
            Ok(stored.to_vec())
        }
    }
}

/// Summary of a directory entry, as shown by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub class_name: String,
    pub cycle: u16,
}

impl From<&Key> for KeyInfo {
    fn from(key: &Key) -> Self {
        Self { name: key.name.clone(), class_name: key.class_name.clone(), cycle: key.cycle }
    }
}

/// The key list of one `TDirectory`.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    keys: Vec<Key>,
}

impl Directory {
    /// Read the key list stored at `seek_keys`: a header key, a `u32` count, then the keys.
    pub fn read(file: &[u8], seek_keys: u64, is_large: bool) -> Result<Self> {
        if seek_keys == 0 {
            return Ok(Self::default());
        }
        let mut r = RBuffer::at(file, seek_keys as usize);
        Key::read(&mut r, is_large)?;
        let n = r.read_u32()? as usize;
        let keys = (0..n).map(|_| Key::read(&mut r, is_large)).collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Highest cycle of the key called `name`.
    pub fn find(&self, name: &str) -> Option<&Key> {
        self.keys.iter().filter(|k| k.name == name).max_by_key(|k| k.cycle)
    }
}

/// Serialize a small-file key header for synthetic files.
#[cfg(any(test, feature = "testutil"))]
pub(crate) fn encode_key(
    class_name: &str,
    name: &str,
    seek_key: u32,
    obj_len: u32,
    stored_len: u32,
    extension: &[u8],
) -> Vec<u8> {
    fn string(out: &mut Vec<u8>, s: &str) {
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }
    let key_len = (26 + 3 + class_name.len() + name.len() + extension.len()) as u16;
    let mut out = Vec::new();
    out.extend_from_slice(&(u32::from(key_len) + stored_len).to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&obj_len.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&key_len.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&seek_key.to_be_bytes());
    out.extend_from_slice(&100u32.to_be_bytes());
    string(&mut out, class_name);
    string(&mut out, name);
    string(&mut out, "");
    out.extend_from_slice(extension);
    out
}
