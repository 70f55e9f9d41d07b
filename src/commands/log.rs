use anyhow::Result;
use std::io::Write;

use minigit::Repository;

/// First-parent history, newest first
pub fn handle<W: Write>(repo: &Repository, revision: Option<&str>, output: &mut W) -> Result<()> {
    let start = match revision {
        Some(rev) => Some(super::resolve_revision(repo, rev)?),
        None => None,
    };
    for entry in repo.log(start)? {
        let (id, commit) = entry?;
        writeln!(output, "commit {}", id)?;
        writeln!(output, "Author: {}", commit.author)?;
        writeln!(output)?;
        for line in commit.message.lines() {
            writeln!(output, "    {}", line)?;
        }
        writeln!(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_from_branch_name() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let tree = repo.write_tree().unwrap();
        let sig = "T <t@example.com> 0 +0000";
        let first = repo.commit_tree(&tree, &[], "one", sig).unwrap();
        let second = repo.commit_tree(&tree, &[first], "two", sig).unwrap();
        repo.refs().write_ref("refs/heads/topic", &second).unwrap();

        let mut out = Vec::new();
        handle(&repo, Some("topic"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let commits: Vec<_> = text.lines().filter(|l| l.starts_with("commit ")).collect();
        assert_eq!(commits, [format!("commit {}", second), format!("commit {}", first)]);
        assert!(text.contains("    two\n"));
    }

    #[test]
    fn test_log_on_unborn_branch_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let mut out = Vec::new();
        handle(&repo, None, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
