use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::object::ObjectId;

/// What HEAD points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// `ref: refs/heads/<branch>`
    Symbolic(String),
    /// A raw commit id
    Detached(ObjectId),
}

/// Ref files under a `.git` directory
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    pub fn new<P: AsRef<Path>>(git_dir: P) -> Self {
        RefStore {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.git_dir.join("refs/heads"))?;
        fs::create_dir_all(self.git_dir.join("refs/tags"))?;
        Ok(())
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        let valid = name.starts_with("refs/")
            && !name.ends_with('/')
            && name
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(Error::validation(format!("invalid ref name: {:?}", name)));
        }
        Ok(self.git_dir.join(name))
    }

    /// Write `"<40-hex>\n"` to `.git/<name>`
    pub fn write_ref(&self, name: &str, id: &ObjectId) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, format!("{}\n", id))?;
        tracing::debug!("{} -> {}", name, id);
        Ok(())
    }

    pub fn read_ref(&self, name: &str) -> Result<ObjectId> {
        let path = self.ref_path(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => ObjectId::from_hex(content.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("ref {}", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point HEAD at `refs/heads/<branch>`
    pub fn write_head_symbolic(&self, branch: &str) -> Result<()> {
        let target = format!("refs/heads/{}", branch);
        self.ref_path(&target)?;
        fs::write(self.git_dir.join("HEAD"), format!("ref: {}\n", target))?;
        Ok(())
    }

    pub fn write_head_detached(&self, id: &ObjectId) -> Result<()> {
        fs::write(self.git_dir.join("HEAD"), format!("{}\n", id))?;
        Ok(())
    }

    pub fn read_head(&self) -> Result<Head> {
        let path = self.git_dir.join("HEAD");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound("HEAD".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let content = content.trim();
        match content.strip_prefix("ref:") {
            Some(target) => {
                let target = target.trim();
                let branch = target.strip_prefix("refs/heads/").ok_or_else(|| {
                    Error::validation(format!("HEAD points outside refs/heads: {}", target))
                })?;
                Ok(Head::Symbolic(branch.to_string()))
            }
            None => Ok(Head::Detached(ObjectId::from_hex(content)?)),
        }
    }

    /// Commit HEAD resolves to; `None` for a branch with no commits yet
    pub fn resolve_head(&self) -> Result<Option<ObjectId>> {
        match self.read_head()? {
            Head::Detached(id) => Ok(Some(id)),
            Head::Symbolic(branch) => match self.read_ref(&format!("refs/heads/{}", branch)) {
                Ok(id) => Ok(Some(id)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            },
        }
    }
}
