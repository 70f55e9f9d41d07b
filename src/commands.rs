pub mod cat_file;
pub mod clone;
pub mod commit_tree;
pub mod hash_object;
pub mod init;
pub mod log;
pub mod ls_tree;
pub mod write_tree;

use std::path::Path;

use anyhow::{Context, Result};
use minigit::store::Head;
use minigit::{ObjectId, Repository};

pub fn open_repository(work_dir: &Path) -> Result<Repository> {
    Repository::open(work_dir)
        .with_context(|| format!("Failed to open repository at {}", work_dir.display()))
}

/// Accepts a full hex id, `HEAD`, or a branch name
pub fn resolve_revision(repo: &Repository, revision: &str) -> Result<ObjectId> {
    if revision.len() == ObjectId::HEX_LEN {
        if let Ok(id) = revision.parse() {
            return Ok(id);
        }
    }
    if revision == "HEAD" {
        return match repo.refs().read_head()? {
            Head::Detached(id) => Ok(id),
            Head::Symbolic(branch) => repo
                .refs()
                .read_ref(&format!("refs/heads/{}", branch))
                .with_context(|| format!("HEAD points at unborn branch {}", branch)),
        };
    }
    let name = if revision.starts_with("refs/") {
        revision.to_string()
    } else {
        format!("refs/heads/{}", revision)
    };
    repo.refs()
        .read_ref(&name)
        .with_context(|| format!("Unknown revision: {}", revision))
}
