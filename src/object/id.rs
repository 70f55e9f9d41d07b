use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Git SHA-1 object identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ObjectId::LEN]);

impl ObjectId {
    /// Length of the raw id in bytes
    pub const LEN: usize = 20;
    /// Length of the canonical hex form
    pub const HEX_LEN: usize = 40;

    /// The all-zero id Git uses as a placeholder (e.g. in an empty ref advertisement)
    pub const NULL: ObjectId = ObjectId([0u8; ObjectId::LEN]);

    pub fn from_raw(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a 20-byte slice (tree entries, ref-delta bases)
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| {
            Error::validation(format!(
                "object id must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Parse the 40-digit hex form; upper case digits are accepted
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != Self::HEX_LEN {
            return Err(Error::validation(format!(
                "object id must be {} hex digits: {:?}",
                Self::HEX_LEN,
                hex_str
            )));
        }
        let mut raw = [0u8; Self::LEN];
        hex::decode_to_slice(hex_str, &mut raw)
            .map_err(|e| Error::validation(format!("invalid object id {:?}: {}", hex_str, e)))?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; Self::LEN]
    }

    /// Fan-out directory name and file name of the loose object path
    pub fn loose_path_parts(&self) -> (String, String) {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        (dir.to_string(), file.to_string())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
