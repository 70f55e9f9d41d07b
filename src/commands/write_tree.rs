use anyhow::Result;
use std::io::Write;

use minigit::Repository;

pub fn handle<W: Write>(repo: &Repository, output: &mut W) -> Result<()> {
    let id = repo.write_tree()?;
    writeln!(output, "{}", id)?;
    Ok(())
}
