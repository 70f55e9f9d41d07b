//! Tree payload records: `"<mode> <name>\0" + 20 raw id bytes`

use std::cmp::Ordering;
use std::collections::HashSet;

use super::ObjectId;
use crate::error::{Error, Result};

pub const MODE_FILE: &str = "100644";
pub const MODE_EXECUTABLE: &str = "100755";
pub const MODE_SYMLINK: &str = "120000";
pub const MODE_TREE: &str = "40000";
pub const MODE_GITLINK: &str = "160000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: String,
    pub name: String,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: impl Into<String>, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode: mode.into(),
            name: name.into(),
            id,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode == MODE_TREE
    }

    /// Object type the entry points at, as `ls-tree` prints it
    pub fn kind_label(&self) -> &'static str {
        match self.mode.as_str() {
            MODE_TREE => "tree",
            MODE_GITLINK => "commit",
            _ => "blob",
        }
    }
}

/// Names must be unique by their plain bytes; a subtree `x` and a file `x`
/// sort apart but still collide on disk.
fn check_unique<'a>(seen: &mut HashSet<&'a str>, entry: &'a TreeEntry) -> Result<()> {
    if !seen.insert(entry.name.as_str()) {
        return Err(Error::validation(format!(
            "duplicate tree entry name: {:?}",
            entry.name
        )));
    }
    Ok(())
}

/// Git orders tree entries bytewise by name, with subtree names compared
/// as if they ended in '/'.
fn canonical_cmp(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    let key = |e: &TreeEntry| {
        let mut k = e.name.as_bytes().to_vec();
        if e.is_tree() {
            k.push(b'/');
        }
        k
    };
    key(a).cmp(&key(b))
}

pub fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(canonical_cmp);
}

/// Serialize entries that are already in canonical order.
pub fn encode_tree(entries: &[TreeEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut seen = HashSet::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if entry.name.is_empty() || entry.name.contains('/') || entry.name.contains('\0') {
            return Err(Error::validation(format!(
                "invalid tree entry name: {:?}",
                entry.name
            )));
        }
        if i > 0 && canonical_cmp(&entries[i - 1], entry) != Ordering::Less {
            return Err(Error::validation(format!(
                "tree entries not sorted: {:?} after {:?}",
                entry.name,
                entries[i - 1].name
            )));
        }
        check_unique(&mut seen, entry)?;
        out.extend_from_slice(entry.mode.as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.name.as_bytes());
        out.push(0);
        out.extend_from_slice(entry.id.as_bytes());
    }
    Ok(out)
}

/// Parse tree records. Entry order is taken as stored, but a name that
/// appears twice is rejected.
pub fn decode_tree(payload: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (entry, next) = decode_entry(payload, pos)?;
        entries.push(entry);
        pos = next;
    }
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        check_unique(&mut seen, entry)?;
    }
    Ok(entries)
}

fn decode_entry(payload: &[u8], pos: usize) -> Result<(TreeEntry, usize)> {
    let rest = &payload[pos..];
    let space = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::validation(format!("tree entry at {} has no mode", pos)))?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .filter(|&n| n > space)
        .ok_or_else(|| Error::validation(format!("tree entry at {} has no name", pos)))?;
    let id_end = nul + 1 + ObjectId::LEN;
    if rest.len() < id_end {
        return Err(Error::validation(format!(
            "tree entry at {} is truncated",
            pos
        )));
    }

    let mode = std::str::from_utf8(&rest[..space])
        .map_err(|_| Error::validation("tree entry mode is not ASCII"))?;
    let name = std::str::from_utf8(&rest[space + 1..nul])
        .map_err(|_| Error::validation("tree entry name is not UTF-8"))?;
    let id = ObjectId::from_slice(&rest[nul + 1..id_end])?;

    Ok((TreeEntry::new(mode, name, id), pos + id_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_raw([byte; ObjectId::LEN])
    }

    #[test]
    fn test_tree_roundtrip() {
        let entries = vec![
            TreeEntry::new(MODE_FILE, "a.txt", id(1)),
            TreeEntry::new(MODE_TREE, "sub", id(2)),
        ];
        let payload = encode_tree(&entries).unwrap();
        assert_eq!(&payload[..14], b"100644 a.txt\0\x01");
        assert_eq!(decode_tree(&payload).unwrap(), entries);
    }

    #[test]
    fn test_unsorted_entries_rejected() {
        let entries = vec![
            TreeEntry::new(MODE_FILE, "b", id(1)),
            TreeEntry::new(MODE_FILE, "a", id(2)),
        ];
        assert!(matches!(encode_tree(&entries), Err(Error::Validation(_))));
    }

    #[test]
    fn test_subtree_sorts_as_if_slash_terminated() {
        // "foo.txt" < "foo/" because '.' (0x2e) < '/' (0x2f)
        let mut entries = vec![
            TreeEntry::new(MODE_TREE, "foo", id(1)),
            TreeEntry::new(MODE_FILE, "foo.txt", id(2)),
            TreeEntry::new(MODE_FILE, "bar", id(3)),
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["bar", "foo.txt", "foo"]);
        encode_tree(&entries).unwrap();
    }

    #[test]
    fn test_same_name_tree_and_symlink_rejected() {
        let entries = vec![
            TreeEntry::new(MODE_SYMLINK, "x", id(1)),
            TreeEntry::new(MODE_TREE, "x", id(2)),
        ];
        assert!(matches!(encode_tree(&entries), Err(Error::Validation(_))));

        let mut payload = Vec::new();
        for entry in &entries {
            payload.extend_from_slice(format!("{} {}\0", entry.mode, entry.name).as_bytes());
            payload.extend_from_slice(entry.id.as_bytes());
        }
        assert!(matches!(decode_tree(&payload), Err(Error::Validation(_))));
    }

    #[test]
    fn test_kind_label() {
        assert_eq!(TreeEntry::new(MODE_TREE, "d", id(1)).kind_label(), "tree");
        assert_eq!(TreeEntry::new(MODE_GITLINK, "m", id(1)).kind_label(), "commit");
        assert_eq!(TreeEntry::new(MODE_SYMLINK, "l", id(1)).kind_label(), "blob");
    }

    #[test]
    fn test_truncated_tree_rejected() {
        let payload = encode_tree(&[TreeEntry::new(MODE_FILE, "a", id(1))]).unwrap();
        let err = decode_tree(&payload[..payload.len() - 1]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
