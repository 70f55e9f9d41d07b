use anyhow::Result;
use std::io::Write;

use minigit::Repository;

pub fn handle<W: Write>(repo: &Repository, revision: &str, name_only: bool, output: &mut W) -> Result<()> {
    let id = super::resolve_revision(repo, revision)?;
    for entry in repo.ls_tree(&id)? {
        if name_only {
            writeln!(output, "{}", entry.name)?;
            continue;
        }
        writeln!(
            output,
            "{:0>6} {} {}\t{}",
            entry.mode,
            entry.kind_label(),
            entry.id,
            entry.name
        )?;
    }
    Ok(())
}
