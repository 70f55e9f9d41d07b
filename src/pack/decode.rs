//! Pack framing: `PACK`, version, object count, entries, SHA-1 trailer

use std::io::Read;

use flate2::bufread::ZlibDecoder;
use sha1::{Digest, Sha1};

use super::entry::{read_entry_prefix, PackEntry};
use crate::error::{Error, Result};

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = 20;

/// Pre-allocation cap so a lying size field cannot reserve huge buffers
const MAX_PREALLOC: usize = 1 << 20;

#[derive(Debug)]
pub struct DecodedPack {
    pub version: u32,
    pub entries: Vec<PackEntry>,
}

impl DecodedPack {
    pub fn delta_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_delta()).count()
    }
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

/// Check the trailing SHA-1 against everything before it
pub fn verify_checksum(bytes: &[u8]) -> Result<()> {
    if bytes.len() < TRAILER_LEN {
        return Err(Error::corrupt_pack("pack is shorter than its checksum"));
    }
    let (content, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let actual = Sha1::digest(content);
    if actual.as_slice() != trailer {
        return Err(Error::Checksum {
            expected: hex::encode(trailer),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}

/// Inflate the zlib stream starting at `pos`, which must produce exactly
/// `expected` bytes. Returns the data and the position after the stream.
fn inflate_at(buf: &[u8], pos: usize, end: usize, expected: u64) -> Result<(Vec<u8>, usize)> {
    let expected = usize::try_from(expected)
        .map_err(|_| Error::corrupt_pack(format!("entry at {} is too large", pos)))?;
    let mut decoder = ZlibDecoder::new(&buf[pos..end]);
    let mut data = Vec::with_capacity(expected.min(MAX_PREALLOC));
    // One extra byte lets an over-long stream be detected without inflating all of it
    (&mut decoder)
        .take(expected as u64 + 1)
        .read_to_end(&mut data)
        .map_err(|e| Error::corrupt_pack(format!("bad deflate stream at offset {}: {}", pos, e)))?;
    if data.len() != expected {
        return Err(Error::corrupt_pack(format!(
            "entry at offset {} inflated to {}{} bytes, header says {}",
            pos,
            if data.len() > expected { "more than " } else { "" },
            data.len().min(expected),
            expected
        )));
    }
    let consumed = usize::try_from(decoder.total_in())
        .map_err(|_| Error::corrupt_pack("deflate stream length overflows"))?;
    Ok((data, pos + consumed))
}

/// Parse a complete pack. The checksum is verified before any entry is
/// read, so a damaged pack yields no entries at all.
pub fn decode_pack(bytes: &[u8]) -> Result<DecodedPack> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(Error::corrupt_pack(format!(
            "pack of {} bytes is too short",
            bytes.len()
        )));
    }
    verify_checksum(bytes)?;

    if &bytes[..4] != PACK_SIGNATURE {
        return Err(Error::corrupt_pack("missing PACK signature"));
    }
    let version = read_u32(bytes, 4);
    if version != 2 && version != 3 {
        return Err(Error::corrupt_pack(format!(
            "unsupported pack version {}",
            version
        )));
    }
    let count = read_u32(bytes, 8);
    tracing::debug!("pack v{} with {} objects", version, count);

    let end = bytes.len() - TRAILER_LEN;
    let mut entries = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
    let mut pos = HEADER_LEN;
    for _ in 0..count {
        if pos >= end {
            return Err(Error::corrupt_pack(format!(
                "pack ends after {} of {} objects",
                entries.len(),
                count
            )));
        }
        let offset = pos;
        let (kind, declared_size, data_start) = read_entry_prefix(&bytes[..end], offset)?;
        let (data, next) = inflate_at(bytes, data_start, end, declared_size)?;
        entries.push(PackEntry {
            offset,
            kind,
            declared_size,
            data,
        });
        pos = next;
    }

    if pos != end {
        return Err(Error::corrupt_pack(format!(
            "{} unexpected bytes after the last object",
            end - pos
        )));
    }
    Ok(DecodedPack { version, entries })
}
