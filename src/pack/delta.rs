//! Git delta streams: two size varints, then copy/insert instructions

use super::entry::read_byte;
use crate::error::{Error, Result};

/// Copy size used when no size bytes are present
const DEFAULT_COPY_SIZE: usize = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaInstruction<'a> {
    /// Copy `len` bytes of the base starting at `offset`
    Copy { offset: usize, len: usize },
    /// Append literal bytes
    Insert(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<'a> {
    pub source_size: usize,
    pub target_size: usize,
    pub instructions: Vec<DeltaInstruction<'a>>,
}

/// Little-endian base-128 size used in the delta header
fn read_size(buf: &[u8], pos: usize) -> Result<(usize, usize)> {
    let mut size: u64 = 0;
    let mut shift = 0u32;
    let mut pos = pos;
    loop {
        let (byte, next) = read_byte(buf, pos)?;
        pos = next;
        if shift > 63 {
            return Err(Error::corrupt_pack("delta size does not fit in 64 bits"));
        }
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    let size = usize::try_from(size)
        .map_err(|_| Error::corrupt_pack("delta size does not fit in memory"))?;
    Ok((size, pos))
}

fn read_instruction(buf: &[u8], pos: usize) -> Result<(DeltaInstruction<'_>, usize)> {
    let (op, mut pos) = read_byte(buf, pos)?;

    if op & 0x80 == 0 {
        if op == 0 {
            return Err(Error::corrupt_pack("reserved delta opcode 0"));
        }
        let len = usize::from(op);
        let literal = buf.get(pos..pos + len).ok_or_else(|| {
            Error::corrupt_pack(format!("delta insert of {} bytes runs past the stream", len))
        })?;
        return Ok((DeltaInstruction::Insert(literal), pos + len));
    }

    // Bits 0-3 select offset bytes, bits 4-6 select size bytes
    let mut offset = 0usize;
    for i in 0..4 {
        if op & (1 << i) != 0 {
            let (byte, next) = read_byte(buf, pos)?;
            offset |= usize::from(byte) << (8 * i);
            pos = next;
        }
    }
    let mut len = 0usize;
    for i in 0..3 {
        if op & (0x10 << i) != 0 {
            let (byte, next) = read_byte(buf, pos)?;
            len |= usize::from(byte) << (8 * i);
            pos = next;
        }
    }
    if len == 0 {
        len = DEFAULT_COPY_SIZE;
    }
    Ok((DeltaInstruction::Copy { offset, len }, pos))
}

pub fn parse_delta(data: &[u8]) -> Result<Delta<'_>> {
    let (source_size, pos) = read_size(data, 0)?;
    let (target_size, mut pos) = read_size(data, pos)?;

    let mut instructions = Vec::new();
    while pos < data.len() {
        let (instruction, next) = read_instruction(data, pos)?;
        instructions.push(instruction);
        pos = next;
    }
    Ok(Delta {
        source_size,
        target_size,
        instructions,
    })
}

/// Rebuild the target object from `base` and a delta stream
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let delta = parse_delta(delta)?;
    if delta.source_size != base.len() {
        return Err(Error::corrupt_pack(format!(
            "delta expects a {} byte base, got {}",
            delta.source_size,
            base.len()
        )));
    }

    let mut target = Vec::with_capacity(delta.target_size);
    for instruction in &delta.instructions {
        match *instruction {
            DeltaInstruction::Copy { offset, len } => {
                let chunk = offset
                    .checked_add(len)
                    .and_then(|end| base.get(offset..end))
                    .ok_or_else(|| {
                        Error::corrupt_pack(format!(
                            "delta copy {}+{} outside {} byte base",
                            offset,
                            len,
                            base.len()
                        ))
                    })?;
                target.extend_from_slice(chunk);
            }
            DeltaInstruction::Insert(literal) => target.extend_from_slice(literal),
        }
        if target.len() > delta.target_size {
            return Err(Error::corrupt_pack("delta output exceeds declared target size"));
        }
    }

    if target.len() != delta.target_size {
        return Err(Error::corrupt_pack(format!(
            "delta produced {} bytes, expected {}",
            target.len(),
            delta.target_size
        )));
    }
    Ok(target)
}
