//! Hand-assembled packs for decoder and ingest tests

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use crate::object::{Kind, ObjectId};

const HEADER_LEN: usize = 12;

pub(crate) struct PackBuilder {
    body: Vec<u8>,
    offsets: Vec<usize>,
}

fn type_code(kind: Kind) -> u8 {
    match kind {
        Kind::Commit => 1,
        Kind::Tree => 2,
        Kind::Blob => 3,
        Kind::Tag => 4,
    }
}

fn entry_header(type_code: u8, size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest > 0 {
        out.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
    out
}

fn ofs_distance(mut distance: usize) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    bytes
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

impl PackBuilder {
    pub(crate) fn new() -> Self {
        Self {
            body: Vec::new(),
            offsets: Vec::new(),
        }
    }

    fn current_offset(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    fn push(mut self, prefix: Vec<u8>, data: &[u8]) -> Self {
        self.offsets.push(self.current_offset());
        self.body.extend(prefix);
        self.body.extend(deflate(data));
        self
    }

    pub(crate) fn object(self, kind: Kind, data: &[u8]) -> Self {
        self.object_with_size(kind, data, data.len())
    }

    pub(crate) fn object_with_size(self, kind: Kind, data: &[u8], declared: usize) -> Self {
        self.push(entry_header(type_code(kind), declared), data)
    }

    /// Delta against the entry added `base_index`-th
    pub(crate) fn ofs_delta(self, base_index: usize, delta: &[u8]) -> Self {
        let distance = self.current_offset() - self.offsets[base_index];
        let mut prefix = entry_header(6, delta.len());
        prefix.extend(ofs_distance(distance));
        self.push(prefix, delta)
    }

    pub(crate) fn ref_delta(self, base: ObjectId, delta: &[u8]) -> Self {
        let mut prefix = entry_header(7, delta.len());
        prefix.extend_from_slice(base.as_bytes());
        self.push(prefix, delta)
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut pack = b"PACK".to_vec();
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.offsets.len() as u32).to_be_bytes());
        pack.extend(self.body);
        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);
        pack
    }

    /// Replace the trailer of a modified pack with a valid checksum
    pub(crate) fn reseal(mut pack: Vec<u8>) -> Vec<u8> {
        pack.truncate(pack.len() - 20);
        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);
        pack
    }
}

/// Delta stream that replaces `base` entirely with `target` via inserts
pub(crate) fn insert_delta(base_len: usize, target: &[u8]) -> Vec<u8> {
    let mut delta = size_varint(base_len);
    delta.extend(size_varint(target.len()));
    for chunk in target.chunks(0x7f) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }
    delta
}

pub(crate) fn size_varint(mut size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (size & 0x7f) as u8;
        size >>= 7;
        if size == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
