//! Working directory <-> tree objects. Both directions walk with an
//! explicit stack so deep directory nesting cannot exhaust the call stack.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Repository;
use crate::error::{Error, Result};
use crate::object::tree::{MODE_EXECUTABLE, MODE_FILE, MODE_GITLINK, MODE_SYMLINK, MODE_TREE};
use crate::object::{decode_tree, encode_tree, sort_entries, Kind, ObjectId, TreeEntry};

/// A directory whose children are still being snapshotted
struct DirFrame {
    name: Option<String>,
    remaining: Vec<PathBuf>,
    entries: Vec<TreeEntry>,
}

enum Child {
    Dir(PathBuf, String),
    Entry(TreeEntry),
    Skip,
}

impl DirFrame {
    fn open(path: &Path, name: Option<String>) -> Result<Self> {
        let mut remaining = Vec::new();
        for entry in fs::read_dir(path)? {
            remaining.push(entry?.path());
        }
        // popped from the back, so reverse for a stable name order
        remaining.sort();
        remaining.reverse();
        Ok(Self {
            name,
            remaining,
            entries: Vec::new(),
        })
    }
}

fn utf8_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::validation(format!("path is not valid UTF-8: {:?}", path)))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

impl Repository {
    /// Store every file under the working directory and return the root tree id.
    /// `.git` is skipped and empty directories are left out, as Git does.
    pub fn write_tree(&self) -> Result<ObjectId> {
        let mut stack = vec![DirFrame::open(&self.work_dir, None)?];

        while let Some(frame) = stack.last_mut() {
            match frame.remaining.pop() {
                Some(path) => match self.snapshot_child(&path)? {
                    Child::Entry(entry) => frame.entries.push(entry),
                    Child::Dir(path, name) => stack.push(DirFrame::open(&path, Some(name))?),
                    Child::Skip => {}
                },
                None => {
                    let Some(mut done) = stack.pop() else { break };
                    sort_entries(&mut done.entries);
                    let payload = encode_tree(&done.entries)?;
                    match stack.last_mut() {
                        Some(parent) => {
                            if done.entries.is_empty() {
                                continue;
                            }
                            let id = self.objects.put(Kind::Tree, &payload)?;
                            let name = done.name.unwrap_or_default();
                            parent.entries.push(TreeEntry::new(MODE_TREE, name, id));
                        }
                        None => return self.objects.put(Kind::Tree, &payload),
                    }
                }
            }
        }
        Err(Error::validation("working directory walk ended without a root tree"))
    }

    fn snapshot_child(&self, path: &Path) -> Result<Child> {
        let name = utf8_name(path)?;
        if name == ".git" {
            return Ok(Child::Skip);
        }
        let metadata = fs::symlink_metadata(path)?;
        let file_type = metadata.file_type();

        if file_type.is_dir() {
            return Ok(Child::Dir(path.to_path_buf(), name));
        }
        if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            let target = target
                .to_str()
                .ok_or_else(|| Error::validation(format!("symlink target is not UTF-8: {:?}", path)))?;
            let id = self.objects.put(Kind::Blob, target.as_bytes())?;
            return Ok(Child::Entry(TreeEntry::new(MODE_SYMLINK, name, id)));
        }
        if file_type.is_file() {
            let id = self.objects.put(Kind::Blob, &fs::read(path)?)?;
            let mode = if is_executable(&metadata) {
                MODE_EXECUTABLE
            } else {
                MODE_FILE
            };
            return Ok(Child::Entry(TreeEntry::new(mode, name, id)));
        }
        tracing::debug!("skipping special file {:?}", path);
        Ok(Child::Skip)
    }

    /// Write the tree `root` into the working directory. Returns the number
    /// of files written.
    pub fn checkout_tree(&self, root: &ObjectId) -> Result<usize> {
        let mut written = 0;
        let mut stack = vec![(*root, self.work_dir.clone())];

        while let Some((tree_id, dir)) = stack.pop() {
            let payload = self.objects.read_kind(&tree_id, Kind::Tree)?;
            for entry in decode_tree(&payload)? {
                if matches!(entry.name.as_str(), "." | ".." | ".git") || entry.name.contains('/') {
                    return Err(Error::validation(format!(
                        "refusing to check out path {:?}",
                        entry.name
                    )));
                }
                let path = dir.join(&entry.name);
                ensure_vacant(&path)?;
                match entry.mode.as_str() {
                    MODE_TREE => {
                        fs::create_dir(&path)?;
                        stack.push((entry.id, path));
                    }
                    MODE_GITLINK => {
                        // submodule contents are not part of this repository
                        fs::create_dir(&path)?;
                    }
                    MODE_SYMLINK => {
                        let target = self.objects.read_kind(&entry.id, Kind::Blob)?;
                        write_symlink(&target, &path)?;
                        written += 1;
                    }
                    MODE_FILE | MODE_EXECUTABLE => {
                        let data = self.objects.read_kind(&entry.id, Kind::Blob)?;
                        let mut file = fs::OpenOptions::new()
                            .write(true)
                            .create_new(true)
                            .open(&path)?;
                        file.write_all(&data)?;
                        if entry.mode == MODE_EXECUTABLE {
                            set_executable(&path)?;
                        }
                        written += 1;
                    }
                    other => {
                        return Err(Error::validation(format!(
                            "unknown mode {} for {:?}",
                            other, entry.name
                        )))
                    }
                }
            }
        }
        Ok(written)
    }
}

/// Checkout only creates paths; anything already there (including a link
/// written earlier in the same checkout) is refused.
fn ensure_vacant(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => Err(Error::validation(format!(
            "refusing to overwrite existing path {:?}",
            path
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn write_symlink(target: &[u8], path: &Path) -> Result<()> {
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(target), path)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(target: &[u8], path: &Path) -> Result<()> {
    fs::write(path, target)?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
