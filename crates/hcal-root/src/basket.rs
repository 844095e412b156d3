//! `TBasket` records: the compressed data blocks of a branch.

use crate::error::{Result, RootError};
use crate::key::Key;
use crate::rbuffer::RBuffer;

/// A decoded basket: entry data plus, for variable-size entries, the per-entry byte offsets.
#[derive(Debug, Clone)]
pub struct Basket {
    /// Number of entries stored in the basket (`fNevBuf`).
    pub n_entries: usize,
    /// Entry data (payload up to `fLast`).
    pub data: Vec<u8>,
    /// Byte offsets into `data`, `n_entries + 1` long, present for variable-size entries.
    pub entry_offsets: Option<Vec<usize>>,
}

/// `TBasket` header fields that follow the generic key header.
#[derive(Debug, Clone, Copy)]
struct BasketHeader {
    nev_buf_size: i32,
    nev_buf: i32,
    last: i32,
}

impl BasketHeader {
    fn read(r: &mut RBuffer) -> Result<Self> {
        let _version = r.read_u16()?;
        let _buffer_size = r.read_i32()?;
        let nev_buf_size = r.read_i32()?;
        let nev_buf = r.read_i32()?;
        let last = r.read_i32()?;
        let _flag = r.read_u8()?;
        Ok(Self { nev_buf_size, nev_buf, last })
    }
}

impl Basket {
    /// Read and decode the basket whose key sits at `seek`.
    pub fn read(file: &[u8], seek: u64, is_large: bool) -> Result<Self> {
        let mut r = RBuffer::at(file, seek as usize);
        let key = Key::read(&mut r, is_large)?;
        let header = BasketHeader::read(&mut r)?;
        let payload = key.payload(file)?;
        Self::from_payload(payload, &key, header)
    }

    fn from_payload(mut payload: Vec<u8>, key: &Key, header: BasketHeader) -> Result<Self> {
        let key_len = i64::from(key.key_len);
        let border = usize::try_from(i64::from(header.last) - key_len).map_err(|_| {
            RootError::Deserialization(format!(
                "basket at {}: fLast {} precedes key end {key_len}",
                key.seek_key, header.last
            ))
        })?;
        if border > payload.len() {
            return Err(RootError::Deserialization(format!(
                "basket at {}: border {border} past payload of {} bytes",
                key.seek_key,
                payload.len()
            )));
        }
        let n_entries = header.nev_buf.max(0) as usize;

        let entry_offsets = if header.nev_buf_size > 8 && payload.len() > border {
            Some(read_entry_offsets(&payload[border..], n_entries, key_len, border)?)
        } else {
            None
        };
        payload.truncate(border);
        Ok(Self { n_entries, data: payload, entry_offsets })
    }

    /// Byte range of entry `i` within `data`, for variable-size baskets.
    pub fn entry_range(&self, i: usize) -> Option<std::ops::Range<usize>> {
        let offsets = self.entry_offsets.as_ref()?;
        Some(offsets[i]..offsets[i + 1])
    }
}

/// Decode the offset table after the border: an `i32` count, then offsets relative to the
/// start of the key. The final slot is replaced by the border itself.
fn read_entry_offsets(
    table: &[u8],
    n_entries: usize,
    key_len: i64,
    border: usize,
) -> Result<Vec<usize>> {
    let mut r = RBuffer::new(table);
    let _count = r.read_i32()?;
    let mut offsets = Vec::with_capacity(n_entries + 1);
    for _ in 0..n_entries {
        let raw = i64::from(r.read_i32()?) - key_len;
        let off = usize::try_from(raw)
            .ok()
            .filter(|&o| o <= border)
            .ok_or_else(|| RootError::Deserialization(format!("entry offset {raw} out of range")))?;
        offsets.push(off);
    }
    offsets.push(border);
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(RootError::Deserialization("entry offsets are not monotonic".into()));
    }
    Ok(offsets)
}

/// Build an uncompressed basket record for synthetic files.
#[cfg(any(test, feature = "testutil"))]
pub(crate) fn encode_basket(
    seek: u32,
    data: &[u8],
    entry_sizes: Option<&[usize]>,
    n: usize,
) -> Vec<u8> {
    let ext_len = 2 + 4 + 4 + 4 + 4 + 1;
    let key_len = (26 + 3 + "TBasket".len() + "b".len() + ext_len) as i32;
    let mut table = Vec::new();
    if let Some(sizes) = entry_sizes {
        table.extend_from_slice(&((sizes.len() + 1) as i32).to_be_bytes());
        let mut pos = key_len;
        for s in sizes {
            table.extend_from_slice(&pos.to_be_bytes());
            pos += *s as i32;
        }
        table.extend_from_slice(&0i32.to_be_bytes());
    }
    let obj_len = (data.len() + table.len()) as u32;
    let mut ext = Vec::new();
    ext.extend_from_slice(&3u16.to_be_bytes());
    ext.extend_from_slice(&32000i32.to_be_bytes());
    let nev_buf_size = if entry_sizes.is_some() { 1000 } else { 4 };
    ext.extend_from_slice(&(nev_buf_size as i32).to_be_bytes());
    ext.extend_from_slice(&(n as i32).to_be_bytes());
    ext.extend_from_slice(&(key_len + data.len() as i32).to_be_bytes());
    ext.push(0);
    let mut out = crate::key::encode_key("TBasket", "b", seek, obj_len, obj_len, &ext);
    debug_assert_eq!(out.len(), key_len as usize);
    out.extend_from_slice(data);
    out.extend(table);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn fixed_size_basket_has_no_offsets() {
        let data = f32_bytes(&[1.0, 2.0, 3.0]);
        let mut file = vec![0u8; 16];
        file.extend(encode_basket(16, &data, None, 3));
        let basket = Basket::read(&file, 16, false).unwrap();
        assert_eq!(basket.n_entries, 3);
        assert_eq!(basket.data, data);
        assert!(basket.entry_offsets.is_none());
    }

    #[test]
    fn variable_size_basket_offsets_relative_to_data() {
        // three events with 2, 0 and 1 channels
        let data = f32_bytes(&[10.0, 11.0, 12.0]);
        let file = encode_basket(0, &data, Some(&[8, 0, 4]), 3);
        let basket = Basket::read(&file, 0, false).unwrap();
        assert_eq!(basket.entry_offsets.as_deref(), Some(&[0, 8, 8, 12][..]));
        assert_eq!(basket.entry_range(0), Some(0..8));
        assert_eq!(basket.entry_range(1), Some(8..8));
        assert_eq!(basket.entry_range(2), Some(8..12));
        assert_eq!(basket.data.len(), 12);
    }

    #[test]
    fn offset_outside_border_is_rejected() {
        let raw = crate::key::encode_key("TBasket", "b", 0, 8, 8, &[]);
        let key = Key::read(&mut RBuffer::new(&raw), false).unwrap();
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(&(i32::from(key.key_len) + 100).to_be_bytes());
        let header =
            BasketHeader { nev_buf_size: 100, nev_buf: 1, last: i32::from(key.key_len) + 4 };
        assert!(Basket::from_payload(payload, &key, header).is_err());
    }
}
