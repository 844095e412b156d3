//! Cursor over ROOT's big-endian streamer encoding.

use crate::error::{Result, RootError};

/// `kByteCountMask`: set on the leading word of a streamed object that carries a byte count.
pub(crate) const BYTE_COUNT_MASK: u32 = 0x4000_0000;

/// A big-endian reader over a borrowed byte slice.
pub struct RBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_be {
    ($($(#[$doc:meta])* $name:ident => $ty:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self) -> Result<$ty> {
                Ok(<$ty>::from_be_bytes(self.read_array()?))
            }
        )*
    };
}

impl<'a> RBuffer<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute position.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    read_be! {
        /// Read a big-endian `u16`.
        read_u16 => u16,
        /// Read a big-endian `u32`.
        read_u32 => u32,
        /// Read a big-endian `i32`.
        read_i32 => i32,
        /// Read a big-endian `u64`.
        read_u64 => u64,
        /// Read a big-endian `i64`.
        read_i64 => i64,
        /// Read a big-endian `f64`.
        read_f64 => f64,
    }

    /// Read a ROOT string: one length byte, or `255` followed by a `u32` length.
    pub fn read_string(&mut self) -> Result<String> {
        let len = match self.read_u8()? {
            255 => self.read_u32()? as usize,
            n => n as usize,
        };
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a NUL-terminated C string (class names after `kNewClassTag`).
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let nul = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            RootError::Deserialization(format!("unterminated C string at offset {}", self.pos))
        })?;
        let s = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(s)
    }

    /// Read a streamer version header.
    ///
    /// Returns the class version and, when the byte-count bit is set, the absolute
    /// position where the object ends.
    pub fn read_version(&mut self) -> Result<(u16, Option<usize>)> {
        let start = self.pos;
        let word = self.read_u32()?;
        if word & BYTE_COUNT_MASK != 0 {
            let end = start + 4 + (word & !BYTE_COUNT_MASK) as usize;
            Ok((self.read_u16()?, Some(end)))
        } else {
            self.pos = start + 2;
            Ok(((word >> 16) as u16, None))
        }
    }

    /// Skip a versioned object using its byte count.
    pub fn skip_versioned(&mut self) -> Result<()> {
        if let (_, Some(end)) = self.read_version()? {
            self.pos = end;
        }
        Ok(())
    }

    /// Read a `TObject` header; returns `fBits`.
    pub fn read_tobject(&mut self) -> Result<u32> {
        let _version = self.read_u16()?;
        let _unique_id = self.read_u32()?;
        let bits = self.read_u32()?;
        // kIsReferenced objects carry a process-id slot.
        if bits & 0x0000_0010 != 0 {
            self.skip(2)?;
        }
        Ok(bits)
    }

    /// Read a `TNamed` (versioned TObject + name + title).
    pub fn read_tnamed(&mut self) -> Result<(String, String)> {
        self.read_version()?;
        self.read_tobject()?;
        let name = self.read_string()?;
        let title = self.read_string()?;
        Ok((name, title))
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos.checked_add(n).is_none_or(|end| end > self.data.len()) {
            return Err(RootError::BufferUnderflow {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_primitives() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0102_0304u32.to_be_bytes());
        data.extend_from_slice(&(-7i64).to_be_bytes());
        data.extend_from_slice(&2.5f64.to_be_bytes());
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_i64().unwrap(), -7);
        assert_eq!(r.read_f64().unwrap(), 2.5);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn short_and_long_strings() {
        let mut data = vec![3, b'H', b'B', b'x'];
        data.push(255);
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(b"HE");
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_string().unwrap(), "HBx");
        assert_eq!(r.read_string().unwrap(), "HE");
    }

    #[test]
    fn cstring_consumes_terminator() {
        let data = b"TLeafF\0rest";
        let mut r = RBuffer::new(data);
        assert_eq!(r.read_cstring().unwrap(), "TLeafF");
        assert_eq!(r.pos(), 7);
    }

    #[test]
    fn version_with_and_without_byte_count() {
        let mut data = Vec::new();
        data.extend_from_slice(&(BYTE_COUNT_MASK | 6).to_be_bytes());
        data.extend_from_slice(&13u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 4]);
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_version().unwrap(), (13, Some(10)));

        let data = [0x00, 0x05, 0xaa, 0xbb];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_version().unwrap(), (5, None));
        assert_eq!(r.pos(), 2);
    }

    #[test]
    fn underflow_is_reported() {
        let mut r = RBuffer::new(&[1, 2]);
        let err = r.read_u32().unwrap_err();
        assert!(matches!(err, RootError::BufferUnderflow { need: 4, have: 2, .. }));
    }
}
