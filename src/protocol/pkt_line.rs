//! pkt-line framing: a 4 hex digit length (counting itself) followed by the payload

use crate::error::{Error, Result};

/// The flush packet
pub const FLUSH: &[u8] = b"0000";

/// Largest pkt-line Git will send or accept, prefix included
pub const MAX_PKT_LEN: usize = 65520;

const PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PktLine<'a> {
    Data(&'a [u8]),
    Flush,
    /// `0001`, protocol v2 section delimiter
    Delim,
    /// `0002`, protocol v2 end of response
    ResponseEnd,
}

pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let len = payload.len() + PREFIX_LEN;
    if len > MAX_PKT_LEN {
        return Err(Error::protocol(format!(
            "pkt-line payload of {} bytes is too long",
            payload.len()
        )));
    }
    let mut out = format!("{:04x}", len).into_bytes();
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read one pkt-line at `pos`, returning it and the position after it
pub fn read(buf: &[u8], pos: usize) -> Result<(PktLine<'_>, usize)> {
    let prefix = buf
        .get(pos..pos + PREFIX_LEN)
        .ok_or_else(|| Error::protocol(format!("truncated pkt-line length at offset {}", pos)))?;
    let prefix = std::str::from_utf8(prefix)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| {
            Error::protocol(format!(
                "invalid pkt-line length {:?} at offset {}",
                String::from_utf8_lossy(prefix),
                pos
            ))
        })?;
    let len = usize::from_str_radix(prefix, 16)
        .map_err(|e| Error::protocol(format!("invalid pkt-line length: {}", e)))?;

    match len {
        0 => return Ok((PktLine::Flush, pos + PREFIX_LEN)),
        1 => return Ok((PktLine::Delim, pos + PREFIX_LEN)),
        2 => return Ok((PktLine::ResponseEnd, pos + PREFIX_LEN)),
        3 => {
            return Err(Error::protocol(format!(
                "invalid pkt-line length 3 at offset {}",
                pos
            )))
        }
        _ => {}
    }

    let end = pos + len;
    if end > buf.len() {
        return Err(Error::protocol(format!(
            "pkt-line at offset {} declares {} bytes but only {} remain",
            pos,
            len,
            buf.len() - pos
        )));
    }
    Ok((PktLine::Data(&buf[pos + PREFIX_LEN..end]), end))
}

/// Strip the single trailing LF a text pkt-line may carry
pub fn trim_lf(payload: &[u8]) -> &[u8] {
    payload.strip_suffix(b"\n").unwrap_or(payload)
}
