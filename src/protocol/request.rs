//! upload-pack request body: want lines, flush, done

use super::discovery::Capabilities;
use super::pkt_line;
use crate::error::{Error, Result};
use crate::object::ObjectId;

/// Capabilities this client understands, in preference order
const SIDE_BAND_64K: &str = "side-band-64k";
const SIDE_BAND: &str = "side-band";
const OFS_DELTA: &str = "ofs-delta";

/// Pick the capabilities to request from what the server offered
pub fn select_capabilities(server: &Capabilities, agent: &str) -> Vec<String> {
    let mut selected = Vec::new();
    if server.contains(SIDE_BAND_64K) {
        selected.push(SIDE_BAND_64K.to_string());
    } else if server.contains(SIDE_BAND) {
        selected.push(SIDE_BAND.to_string());
    }
    if server.contains(OFS_DELTA) {
        selected.push(OFS_DELTA.to_string());
    }
    if server.contains("agent") && !agent.is_empty() {
        selected.push(format!("agent={}", agent));
    }
    selected
}

/// Encode `want <id> <caps>` (caps on the first line only), a flush, then `done`.
/// Duplicate ids are requested once.
pub fn build(wanted: &[ObjectId], capabilities: &[String]) -> Result<Vec<u8>> {
    if wanted.is_empty() {
        return Err(Error::validation("upload-pack request needs at least one want"));
    }

    let mut body = Vec::new();
    let mut seen = Vec::with_capacity(wanted.len());
    for id in wanted {
        if seen.contains(id) {
            continue;
        }
        let line = if seen.is_empty() && !capabilities.is_empty() {
            format!("want {} {}\n", id, capabilities.join(" "))
        } else {
            format!("want {}\n", id)
        };
        body.extend(pkt_line::encode(line.as_bytes())?);
        seen.push(*id);
    }
    body.extend_from_slice(pkt_line::FLUSH);
    body.extend(pkt_line::encode(b"done\n")?);
    Ok(body)
}
