//! Per-entry pack headers and the variable-length integers they use

use crate::error::{Error, Result};
use crate::object::{Kind, ObjectId};

const TYPE_COMMIT: u8 = 1;
const TYPE_TREE: u8 = 2;
const TYPE_BLOB: u8 = 3;
const TYPE_TAG: u8 = 4;
const TYPE_OFS_DELTA: u8 = 6;
const TYPE_REF_DELTA: u8 = 7;

/// What an entry holds and, for deltas, where its base is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Object(Kind),
    /// Base is the entry starting at this absolute pack offset
    OfsDelta { base_offset: usize },
    /// Base is named by id; it may live outside the pack
    RefDelta { base: ObjectId },
}

/// A decoded pack entry. `data` is the inflated payload for full objects
/// and the inflated delta stream for deltas.
#[derive(Debug, Clone)]
pub struct PackEntry {
    pub offset: usize,
    pub kind: EntryKind,
    pub declared_size: u64,
    pub data: Vec<u8>,
}

impl PackEntry {
    pub fn is_delta(&self) -> bool {
        !matches!(self.kind, EntryKind::Object(_))
    }
}

pub(crate) fn read_byte(buf: &[u8], pos: usize) -> Result<(u8, usize)> {
    buf.get(pos)
        .map(|&b| (b, pos + 1))
        .ok_or_else(|| Error::corrupt_pack(format!("unexpected end of pack at offset {}", pos)))
}

/// Entry header: `1 continuation bit | 3 type bits | 4 size bits`, then
/// 7 size bits per continuation byte, least significant group first.
pub(crate) fn read_entry_header(buf: &[u8], pos: usize) -> Result<(u8, u64, usize)> {
    let (first, mut pos) = read_byte(buf, pos)?;
    let type_code = (first >> 4) & 0x07;
    let mut size = u64::from(first & 0x0f);
    let mut shift = 4u32;
    let mut byte = first;
    while byte & 0x80 != 0 {
        if shift > 57 {
            return Err(Error::corrupt_pack("entry size does not fit in 64 bits"));
        }
        (byte, pos) = read_byte(buf, pos)?;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    Ok((type_code, size, pos))
}

/// ofs-delta back-reference: big-endian 7-bit groups where every
/// continuation adds one before shifting, so encodings are unique.
pub(crate) fn read_ofs_distance(buf: &[u8], pos: usize) -> Result<(u64, usize)> {
    let (mut byte, mut pos) = read_byte(buf, pos)?;
    let mut distance = u64::from(byte & 0x7f);
    while byte & 0x80 != 0 {
        (byte, pos) = read_byte(buf, pos)?;
        distance = distance
            .checked_add(1)
            .and_then(|d| d.checked_mul(128))
            .map(|d| d | u64::from(byte & 0x7f))
            .ok_or_else(|| Error::corrupt_pack("ofs-delta offset overflows"))?;
    }
    Ok((distance, pos))
}

/// Parse everything before an entry's deflate stream
pub(crate) fn read_entry_prefix(buf: &[u8], entry_start: usize) -> Result<(EntryKind, u64, usize)> {
    let (type_code, size, pos) = read_entry_header(buf, entry_start)?;
    let (kind, pos) = match type_code {
        TYPE_COMMIT => (EntryKind::Object(Kind::Commit), pos),
        TYPE_TREE => (EntryKind::Object(Kind::Tree), pos),
        TYPE_BLOB => (EntryKind::Object(Kind::Blob), pos),
        TYPE_TAG => (EntryKind::Object(Kind::Tag), pos),
        TYPE_OFS_DELTA => {
            let (distance, pos) = read_ofs_distance(buf, pos)?;
            let base_offset = usize::try_from(distance)
                .ok()
                .filter(|&d| d > 0)
                .and_then(|d| entry_start.checked_sub(d))
                .ok_or_else(|| {
                    Error::corrupt_pack(format!(
                        "ofs-delta at {} points {} bytes back, outside the pack",
                        entry_start, distance
                    ))
                })?;
            (EntryKind::OfsDelta { base_offset }, pos)
        }
        TYPE_REF_DELTA => {
            let raw = buf.get(pos..pos + ObjectId::LEN).ok_or_else(|| {
                Error::corrupt_pack(format!("truncated ref-delta base at offset {}", pos))
            })?;
            let base = ObjectId::from_slice(raw)?;
            (EntryKind::RefDelta { base }, pos + ObjectId::LEN)
        }
        other => {
            return Err(Error::corrupt_pack(format!(
                "invalid object type {} at offset {}",
                other, entry_start
            )))
        }
    };
    Ok((kind, size, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_header() {
        // blob (3), size 5, no continuation
        let (ty, size, pos) = read_entry_header(&[0b0011_0101], 0).unwrap();
        assert_eq!((ty, size, pos), (TYPE_BLOB, 5, 1));
    }

    #[test]
    fn test_multi_byte_header() {
        // commit, size = 0xf | (0x12 << 4) | (0x01 << 11)
        let buf = [0b1001_1111, 0b1001_0010, 0b0000_0001];
        let (ty, size, pos) = read_entry_header(&buf, 0).unwrap();
        assert_eq!(ty, TYPE_COMMIT);
        assert_eq!(size, 0xf | (0x12 << 4) | (1 << 11));
        assert_eq!(pos, 3);
    }

    #[test]
    fn test_truncated_header() {
        assert!(read_entry_header(&[0x80 | 0x30], 0).is_err());
    }

    #[test]
    fn test_ofs_distance() {
        assert_eq!(read_ofs_distance(&[0x05], 0).unwrap(), (5, 1));
        // (0x01 + 1) << 7 | 0x00 = 256
        assert_eq!(read_ofs_distance(&[0x81, 0x00], 0).unwrap(), (256, 2));
        // (0 + 1) << 7 | 0x7f = 255
        assert_eq!(read_ofs_distance(&[0x80, 0x7f], 0).unwrap(), (255, 2));
    }

    #[test]
    fn test_ofs_delta_cannot_point_past_pack_start() {
        // type 6, size 0, distance 20 from an entry at offset 12
        let mut buf = vec![0u8; 12];
        buf.extend_from_slice(&[0x60, 20]);
        assert!(matches!(
            read_entry_prefix(&buf, 12),
            Err(Error::CorruptPack(_))
        ));
    }

    #[test]
    fn test_reserved_type_rejected() {
        assert!(read_entry_prefix(&[0x50], 0).is_err());
        assert!(read_entry_prefix(&[0x00], 0).is_err());
    }
}
