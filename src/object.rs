//! Git object model: ids, loose-object encoding, tree and commit payloads

mod codec;
mod commit;
mod id;
pub mod tree;

pub use codec::{encode_header, hash_object, kind_from_name, kind_name, parse_loose};
pub use commit::{signature, Commit};
pub use gix_object::Kind;
pub use id::ObjectId;
pub use tree::{decode_tree, encode_tree, sort_entries, TreeEntry};

use crate::error::Result;

/// Represents a Git object with its content
#[derive(Debug, Clone)]
pub struct GitObject {
    pub id: ObjectId,
    pub kind: Kind,
    pub data: Vec<u8>,
}

impl GitObject {
    /// Create a GitObject from raw object data (without header)
    pub fn from_raw(kind: Kind, data: Vec<u8>) -> Self {
        let id = hash_object(kind, &data);
        Self { id, kind, data }
    }

    /// Parse a decompressed loose object (with header: "type size\0data")
    pub fn from_loose_format(content: &[u8]) -> Result<Self> {
        let (kind, data) = parse_loose(content)?;
        Ok(Self::from_raw(kind, data.to_vec()))
    }

    /// Serialize to loose object format (with header)
    pub fn to_loose_format(&self) -> Vec<u8> {
        let mut result = encode_header(self.kind, self.data.len());
        result.extend_from_slice(&self.data);
        result
    }
}
