//! Loose object header encoding and the canonical object hash

use gix_object::Kind;
use sha1::{Digest, Sha1};

use super::ObjectId;
use crate::error::{Error, Result};

pub fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Commit => "commit",
        Kind::Tree => "tree",
        Kind::Blob => "blob",
        Kind::Tag => "tag",
    }
}

pub fn kind_from_name(name: &[u8]) -> Result<Kind> {
    match name {
        b"commit" => Ok(Kind::Commit),
        b"tree" => Ok(Kind::Tree),
        b"blob" => Ok(Kind::Blob),
        b"tag" => Ok(Kind::Tag),
        other => Err(Error::validation(format!(
            "unknown object type: {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// `"<type> <len>\0"`
pub fn encode_header(kind: Kind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind_name(kind), len).into_bytes()
}

/// Split a decompressed loose object into its type and payload.
///
/// The declared length must match the number of payload bytes.
pub fn parse_loose(raw: &[u8]) -> Result<(Kind, &[u8])> {
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::validation("no NUL terminator in object header"))?;
    let header = &raw[..nul];
    let payload = &raw[nul + 1..];

    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::validation("object header has no type/length separator"))?;
    let kind = kind_from_name(&header[..space])?;

    let len_field = std::str::from_utf8(&header[space + 1..])
        .map_err(|_| Error::validation("object length is not ASCII"))?;
    if len_field.is_empty() || !len_field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::validation(format!(
            "unparsable object length: {:?}",
            len_field
        )));
    }
    let declared: usize = len_field
        .parse()
        .map_err(|_| Error::validation(format!("object length out of range: {}", len_field)))?;
    if declared != payload.len() {
        return Err(Error::validation(format!(
            "object length mismatch: header says {}, payload has {}",
            declared,
            payload.len()
        )));
    }

    Ok((kind, payload))
}

/// id = SHA-1(`"<type> <len>\0"` + payload)
pub fn hash_object(kind: Kind, payload: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(encode_header(kind, payload.len()));
    hasher.update(payload);
    let mut raw = [0u8; ObjectId::LEN];
    raw.copy_from_slice(&hasher.finalize());
    ObjectId::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header() {
        assert_eq!(encode_header(Kind::Blob, 5), b"blob 5\0");
        assert_eq!(encode_header(Kind::Tree, 0), b"tree 0\0");
    }

    #[test]
    fn test_hash_object_known_values() {
        // `echo test | git hash-object --stdin`
        assert_eq!(
            hash_object(Kind::Blob, b"test\n").to_hex(),
            "9daeafb9864cf43055ae93beb0afd6c7d144bfa4"
        );
        // Git's well-known empty tree
        assert_eq!(
            hash_object(Kind::Tree, b"").to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn test_parse_loose() {
        let (kind, payload) = parse_loose(b"commit 3\0abc").unwrap();
        assert_eq!(kind, Kind::Commit);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn test_parse_loose_rejects_malformed_headers() {
        for raw in [
            &b"blob 3abc"[..],
            b"blob\0abc",
            b"blob x\0abc",
            b"blob \0abc",
            b"blob 4\0abc",
            b"thing 3\0abc",
        ] {
            let err = parse_loose(raw).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?}", err);
        }
    }
}
