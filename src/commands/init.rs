use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use minigit::Repository;

/// Create the `.git` layout under `path`. Re-running on an existing
/// repository leaves its objects and HEAD alone, as `git init` does.
pub fn handle<W: Write>(path: &Path, output: &mut W) -> Result<()> {
    let existed = path.join(minigit::repository::GIT_DIR).is_dir();
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    let repo = Repository::init(path)?;

    let verb = if existed { "Reinitialized existing" } else { "Initialized empty" };
    writeln!(output, "{} Git repository in {}", verb, repo.git_dir().display())?;
    Ok(())
}
