use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use minigit::object::hash_object;
use minigit::{Kind, Repository};

/// Print the blob id of `file`; with a repository the blob is also stored
pub fn handle<W: Write>(repo: Option<&Repository>, file: &Path, output: &mut W) -> Result<()> {
    let id = match repo {
        Some(repo) => repo.store_file(file)?,
        None => {
            let data = std::fs::read(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            hash_object(Kind::Blob, &data)
        }
    };
    writeln!(output, "{}", id)?;
    Ok(())
}
