//! Decoding of ROOT compression blocks.
//!
//! A compressed object is a sequence of blocks, each with a 9-byte header:
//! ```text
//! bytes 0-1:  algorithm tag ("ZL", "L4", "ZS", "XZ")
//! byte  2:    method
//! bytes 3-5:  compressed size   (little-endian u24)
//! bytes 6-8:  uncompressed size (little-endian u24)
//! ```

use std::io::Read;

use crate::error::{Result, RootError};

const HEADER_LEN: usize = 9;
/// LZ4 blocks carry an xxhash64 of the payload ahead of the LZ4 stream.
const LZ4_CHECKSUM_LEN: usize = 8;

/// Compression algorithm named by a block tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// `ZL`
    Zlib,
    /// `L4`
    Lz4,
    /// `ZS`
    Zstd,
    /// `XZ`
    Xz,
}

impl Codec {
    /// Map a two-byte block tag to its codec.
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"ZL" => Some(Self::Zlib),
            b"L4" => Some(Self::Lz4),
            b"ZS" => Some(Self::Zstd),
            b"XZ" => Some(Self::Xz),
            _ => None,
        }
    }

    fn decode(self, src: &[u8], expected: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(expected);
        match self {
            Self::Zlib => {
                flate2::read::ZlibDecoder::new(src)
                    .read_to_end(&mut out)
                    .map_err(|e| codec_err("zlib", e))?;
            }
            Self::Lz4 => {
                let body = src.get(LZ4_CHECKSUM_LEN..).ok_or_else(|| {
                    RootError::Decompression("lz4 block shorter than its checksum".into())
                })?;
                out = lz4_flex::decompress(body, expected).map_err(|e| codec_err("lz4", e))?;
            }
            Self::Zstd => {
                let mut input = src;
                ruzstd::decoding::StreamingDecoder::new(&mut input)
                    .map_err(|e| codec_err("zstd", e))?
                    .read_to_end(&mut out)
                    .map_err(|e| codec_err("zstd", e))?;
            }
            Self::Xz => {
                lzma_rs::xz_decompress(&mut std::io::BufReader::new(src), &mut out)
                    .map_err(|e| codec_err("xz", e))?;
            }
        }
        Ok(out)
    }
}

fn codec_err(name: &str, e: impl std::fmt::Display) -> RootError {
    RootError::Decompression(format!("{name}: {e}"))
}

/// Decompress a ROOT object payload into exactly `expected_len` bytes.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut offset = 0;

    while out.len() < expected_len && offset + HEADER_LEN <= src.len() {
        let header = &src[offset..offset + HEADER_LEN];
        let codec = Codec::from_tag(&header[..2]).ok_or_else(|| {
            RootError::Decompression(format!(
                "unknown compression tag {:?}",
                String::from_utf8_lossy(&header[..2])
            ))
        })?;
        let c_size = le24(&header[3..6]);
        let u_size = le24(&header[6..9]);
        offset += HEADER_LEN;

        let block = src.get(offset..offset + c_size).ok_or_else(|| {
            RootError::Decompression(format!(
                "block claims {c_size} compressed bytes, {} remain",
                src.len() - offset
            ))
        })?;
        let decoded = codec.decode(block, u_size)?;
        if decoded.len() != u_size {
            return Err(RootError::Decompression(format!(
                "{codec:?} block decoded to {} bytes, header says {u_size}",
                decoded.len()
            )));
        }
        out.extend_from_slice(&decoded);
        offset += c_size;
    }

    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "decompressed {} bytes, expected {expected_len}",
            out.len()
        )));
    }
    Ok(out)
}

fn le24(b: &[u8]) -> usize {
    b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_block(tag: &[u8; 2], compressed: &[u8], u_len: usize) -> Vec<u8> {
        let mut block = tag.to_vec();
        block.push(0);
        block.extend_from_slice(&(compressed.len() as u32).to_le_bytes()[..3]);
        block.extend_from_slice(&(u_len as u32).to_le_bytes()[..3]);
        block.extend_from_slice(compressed);
        block
    }

    const PAYLOAD: &[u8] = b"DigiHB_fc0 DigiHB_fc1 DigiHB_fc2 DigiHB_fc3 0000000000000000";

    #[test]
    fn le24_reads_three_bytes() {
        assert_eq!(le24(&[0x10, 0, 0]), 16);
        assert_eq!(le24(&[0, 1, 0]), 256);
        assert_eq!(le24(&[0xff, 0xff, 0xff]), 0xff_ffff);
    }

    #[test]
    fn zlib_block() {
        use std::io::Write;
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(PAYLOAD).unwrap();
        let block = root_block(b"ZL", &enc.finish().unwrap(), PAYLOAD.len());
        assert_eq!(decompress(&block, PAYLOAD.len()).unwrap(), PAYLOAD);
    }

    #[test]
    fn lz4_block_skips_checksum() {
        let mut body = vec![0u8; LZ4_CHECKSUM_LEN];
        body.extend_from_slice(&lz4_flex::compress(PAYLOAD));
        let block = root_block(b"L4", &body, PAYLOAD.len());
        assert_eq!(decompress(&block, PAYLOAD.len()).unwrap(), PAYLOAD);
    }

    #[test]
    fn zstd_block() {
        let compressed =
            ruzstd::encoding::compress_to_vec(PAYLOAD, ruzstd::encoding::CompressionLevel::Fastest);
        let block = root_block(b"ZS", &compressed, PAYLOAD.len());
        assert_eq!(decompress(&block, PAYLOAD.len()).unwrap(), PAYLOAD);
    }

    #[test]
    fn xz_block() {
        let mut compressed = Vec::new();
        lzma_rs::xz_compress(&mut std::io::BufReader::new(PAYLOAD), &mut compressed).unwrap();
        let block = root_block(b"XZ", &compressed, PAYLOAD.len());
        assert_eq!(decompress(&block, PAYLOAD.len()).unwrap(), PAYLOAD);
    }

    #[test]
    fn multiple_blocks_concatenate() {
        let (a, b) = PAYLOAD.split_at(20);
        let mut src = Vec::new();
        for part in [a, b] {
            let mut body = vec![0u8; LZ4_CHECKSUM_LEN];
            body.extend_from_slice(&lz4_flex::compress(part));
            src.extend(root_block(b"L4", &body, part.len()));
        }
        assert_eq!(decompress(&src, PAYLOAD.len()).unwrap(), PAYLOAD);
    }

    #[test]
    fn unknown_tag_rejected() {
        let block = root_block(b"QQ", &[1, 2, 3], 3);
        assert!(matches!(decompress(&block, 3), Err(RootError::Decompression(_))));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut body = vec![0u8; LZ4_CHECKSUM_LEN];
        body.extend_from_slice(&lz4_flex::compress(PAYLOAD));
        let block = root_block(b"L4", &body, PAYLOAD.len());
        assert!(decompress(&block, PAYLOAD.len() + 4).is_err());
    }
}
