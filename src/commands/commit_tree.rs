use anyhow::Result;
use std::io::Write;

use minigit::object::signature;
use minigit::{Config, ObjectId, Repository};

pub fn handle<W: Write>(
    repo: &Repository,
    config: &Config,
    tree: &ObjectId,
    parents: &[ObjectId],
    message: &str,
    output: &mut W,
) -> Result<()> {
    let timestamp = chrono::Utc::now().timestamp();
    let identity = signature(&config.author_name, &config.author_email, timestamp);
    let id = repo.commit_tree(tree, parents, message, &identity)?;
    writeln!(output, "{}", id)?;
    Ok(())
}
