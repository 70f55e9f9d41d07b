use anyhow::Result;
use std::io::Write;

use minigit::object::{decode_tree, kind_name};
use minigit::{Kind, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pretty,
    Kind,
    Size,
}

pub fn handle<W: Write>(repo: &Repository, revision: &str, mode: Mode, output: &mut W) -> Result<()> {
    let id = super::resolve_revision(repo, revision)?;
    let object = repo.objects().read(&id)?;

    match mode {
        Mode::Kind => writeln!(output, "{}", kind_name(object.kind))?,
        Mode::Size => writeln!(output, "{}", object.data.len())?,
        Mode::Pretty if object.kind == Kind::Tree => {
            for entry in decode_tree(&object.data)? {
                writeln!(
                    output,
                    "{:0>6} {} {}\t{}",
                    entry.mode,
                    entry.kind_label(),
                    entry.id,
                    entry.name
                )?;
            }
        }
        // blobs are written byte for byte; commits and tags are already text
        Mode::Pretty => output.write_all(&object.data)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_cat_file_modes() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let id = repo.objects().put(Kind::Blob, b"test\n").unwrap();

        let mut out = Vec::new();
        handle(&repo, &id.to_hex(), Mode::Pretty, &mut out).unwrap();
        assert_eq!(out, b"test\n");

        let mut out = Vec::new();
        handle(&repo, &id.to_hex(), Mode::Kind, &mut out).unwrap();
        assert_eq!(out, b"blob\n");

        let mut out = Vec::new();
        handle(&repo, &id.to_hex(), Mode::Size, &mut out).unwrap();
        assert_eq!(out, b"5\n");
    }

    #[test]
    fn test_pretty_tree_pads_mode() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        fs::write(temp.path().join("dir/f"), "f").unwrap();
        let tree = repo.write_tree().unwrap();

        let mut out = Vec::new();
        handle(&repo, &tree.to_hex(), Mode::Pretty, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("040000 tree "), "{}", text);
        assert!(text.ends_with("\tdir\n"));
    }

    #[test]
    fn test_missing_object() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let mut out = Vec::new();
        let missing = "0123456789012345678901234567890123456789";
        assert!(handle(&repo, missing, Mode::Pretty, &mut out).is_err());
    }
}
