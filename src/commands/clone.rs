use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use minigit::protocol::ReqwestClient;
use minigit::repository::{default_directory, CloneCoordinator, CloneOutcome};
use minigit::Config;

/// Clone `url` into `directory`, or into a directory named after the URL
pub async fn handle<W: Write>(
    config: &Config,
    url: &str,
    directory: Option<PathBuf>,
    work_dir: &Path,
    output: &mut W,
) -> Result<()> {
    let dest = match directory {
        Some(dir) => dir,
        None => {
            let name = default_directory(url)
                .with_context(|| format!("Cannot derive a directory name from {}", url))?;
            work_dir.join(name)
        }
    };
    let client = ReqwestClient::new(config)?;
    writeln!(output, "Cloning into '{}'...", dest.display())?;
    let outcome = CloneCoordinator::new(&client, config).run(url, &dest).await?;
    report(&outcome, output)
}

fn report<W: Write>(outcome: &CloneOutcome, output: &mut W) -> Result<()> {
    if outcome.branches.is_empty() {
        writeln!(output, "warning: You appear to have cloned an empty repository.")?;
        return Ok(());
    }
    writeln!(
        output,
        "Received {} objects ({} deltas resolved), {} branches, HEAD at {}",
        outcome.ingested.objects,
        outcome.ingested.deltas,
        outcome.branches.len(),
        outcome.head_branch
    )?;
    Ok(())
}
