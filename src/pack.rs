//! Git pack format support
//!
//! A pack is a header, a run of individually deflated entries and a SHA-1
//! trailer. Entries are full objects or deltas against an earlier entry
//! (ofs-delta) or against an object named by id (ref-delta). Decoding
//! produces the entries; ingesting resolves deltas and writes loose objects.

pub mod decode;
pub mod delta;
pub mod entry;
pub mod ingest;

#[cfg(test)]
pub(crate) mod test_pack;

pub use decode::{decode_pack, verify_checksum, DecodedPack};
pub use delta::{apply_delta, parse_delta, Delta, DeltaInstruction};
pub use entry::{EntryKind, PackEntry};
pub use ingest::{IngestSummary, PackIngestor};
