//! `POST git-upload-pack` and side-band demultiplexing of the response

use super::http::HttpClient;
use super::pkt_line::{self, PktLine};
use crate::error::{Error, Result};

pub const REQUEST_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";

const BAND_DATA: u8 = 1;
const BAND_PROGRESS: u8 = 2;
const BAND_ERROR: u8 = 3;

/// How the pack bytes are framed in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBand {
    /// Raw pack bytes follow the acknowledgement lines
    None,
    /// Banded pkt-lines of up to 1000 bytes
    Band,
    /// Banded pkt-lines of up to 65520 bytes
    Band64k,
}

impl SideBand {
    /// Framing implied by the capabilities sent in the request
    pub fn from_requested(capabilities: &[String]) -> Self {
        if capabilities.iter().any(|c| c == "side-band-64k") {
            SideBand::Band64k
        } else if capabilities.iter().any(|c| c == "side-band") {
            SideBand::Band
        } else {
            SideBand::None
        }
    }
}

/// Send the negotiation body and return the raw pack bytes
pub async fn fetch_pack(
    client: &dyn HttpClient,
    url: &str,
    body: Vec<u8>,
    side_band: SideBand,
) -> Result<Vec<u8>> {
    let upload_pack = format!("{}/git-upload-pack", url.trim_end_matches('/'));
    let response = client
        .post(&upload_pack, REQUEST_CONTENT_TYPE, body)
        .await?;
    if !response.is_success() {
        return Err(Error::transport(format!(
            "POST {} failed with HTTP {}",
            upload_pack, response.status
        )));
    }

    let pack = demux_response(&response.body, side_band)?;
    tracing::info!("received pack of {} bytes", pack.len());
    Ok(pack)
}

/// Strip acknowledgement lines and, when side-band was negotiated, unwrap
/// band 1, log band 2 and fail on band 3.
pub fn demux_response(body: &[u8], side_band: SideBand) -> Result<Vec<u8>> {
    let mut pos = skip_acknowledgements(body)?;

    if side_band == SideBand::None {
        return Ok(body[pos..].to_vec());
    }

    let mut pack = Vec::with_capacity(body.len());
    while pos < body.len() {
        let (line, next) = pkt_line::read(body, pos)?;
        pos = next;
        let payload = match line {
            PktLine::Flush => break,
            PktLine::Data(payload) if !payload.is_empty() => payload,
            other => {
                return Err(Error::protocol(format!(
                    "unexpected {:?} in side-band stream",
                    other
                )))
            }
        };

        match payload[0] {
            BAND_DATA => pack.extend_from_slice(&payload[1..]),
            BAND_PROGRESS => log_progress(&payload[1..]),
            BAND_ERROR => {
                return Err(Error::transport(format!(
                    "remote error: {}",
                    String::from_utf8_lossy(&payload[1..]).trim()
                )))
            }
            band => {
                return Err(Error::protocol(format!("unknown side-band channel {}", band)))
            }
        }
    }
    Ok(pack)
}

/// Consume the leading `NAK` / `ACK <id>` pkt-lines; `ERR` is fatal
fn skip_acknowledgements(body: &[u8]) -> Result<usize> {
    let mut pos = 0;
    while pos < body.len() {
        // Raw pack data without side-band starts with "PACK"
        if body[pos..].starts_with(b"PACK") {
            break;
        }
        let (line, next) = pkt_line::read(body, pos)?;
        match line {
            PktLine::Data(payload) => {
                let text = pkt_line::trim_lf(payload);
                if text == b"NAK" || text.starts_with(b"ACK ") {
                    tracing::debug!("server: {}", String::from_utf8_lossy(text));
                    pos = next;
                } else if let Some(msg) = text.strip_prefix(b"ERR ") {
                    return Err(Error::transport(format!(
                        "remote error: {}",
                        String::from_utf8_lossy(msg)
                    )));
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    Ok(pos)
}

fn log_progress(message: &[u8]) {
    let text = String::from_utf8_lossy(message);
    for line in text.split(['\r', '\n']) {
        let line = line.trim();
        if !line.is_empty() {
            tracing::info!("remote: {}", line);
        }
    }
}
