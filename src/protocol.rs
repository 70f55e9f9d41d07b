//! Smart-HTTP client side of the Git upload-pack protocol
//!
//! A clone talks to the server twice: a `GET info/refs` to discover refs and
//! capabilities, then a `POST git-upload-pack` carrying `want` lines whose
//! response holds the pack. Both directions use pkt-line framing.

pub mod discovery;
pub mod http;
pub mod pkt_line;
pub mod request;
pub mod transport;

pub use discovery::{discover, parse_advertisement, Capabilities, RefAdvertisement};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use transport::{demux_response, fetch_pack, SideBand};
