use super::ObjectId;
use crate::error::{Error, Result};

/// Parsed commit payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub committer: String,
    pub message: String,
}

impl Commit {
    /// Parse the header lines up to the first blank line; unknown headers
    /// (gpgsig, encoding, mergetag continuation lines...) are skipped.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let (headers, message) = match text.find("\n\n") {
            Some(split) => (&text[..split], &text[split + 2..]),
            None => (text.as_ref(), ""),
        };

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = String::new();
        let mut committer = String::new();

        for line in headers.lines() {
            if let Some(rest) = line.strip_prefix("tree ") {
                tree = Some(ObjectId::from_hex(rest.trim())?);
            } else if let Some(rest) = line.strip_prefix("parent ") {
                parents.push(ObjectId::from_hex(rest.trim())?);
            } else if let Some(rest) = line.strip_prefix("author ") {
                author = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("committer ") {
                committer = rest.to_string();
            }
        }

        let tree = tree.ok_or_else(|| Error::validation("commit has no tree header"))?;
        Ok(Self {
            tree,
            parents,
            author,
            committer,
            message: message.to_string(),
        })
    }

    /// First parent, the one `log` follows
    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        if !self.message.ends_with('\n') {
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// `"<name> <<email>> <unix-seconds> +0000"`
pub fn signature(name: &str, email: &str, timestamp: i64) -> String {
    format!("{} <{}> {} +0000", name, email, timestamp)
}
