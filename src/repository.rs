//! A repository on disk and the operations the commands run against it

mod clone;
mod worktree;

use std::fs;
use std::path::{Path, PathBuf};

pub use clone::{default_directory, CloneCoordinator, CloneOutcome};

use crate::error::{Error, Result};
use crate::object::{decode_tree, Commit, Kind, ObjectId, TreeEntry};
use crate::store::{ObjectStore, RefStore};

pub const GIT_DIR: &str = ".git";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone)]
pub struct Repository {
    work_dir: PathBuf,
    git_dir: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
}

impl Repository {
    fn at(work_dir: &Path) -> Self {
        let git_dir = work_dir.join(GIT_DIR);
        Self {
            work_dir: work_dir.to_path_buf(),
            objects: ObjectStore::new(git_dir.join("objects")),
            refs: RefStore::new(&git_dir),
            git_dir,
        }
    }

    /// Create the `.git` layout. An existing HEAD is left untouched.
    pub fn init<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let repo = Self::at(work_dir.as_ref());
        repo.objects.initialize()?;
        repo.refs.initialize()?;
        if !repo.git_dir.join("HEAD").exists() {
            repo.refs.write_head_symbolic(DEFAULT_BRANCH)?;
        }
        tracing::debug!("initialized repository at {:?}", repo.git_dir);
        Ok(repo)
    }

    pub fn open<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let repo = Self::at(work_dir.as_ref());
        if !repo.git_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "not a git repository: {}",
                repo.work_dir.display()
            )));
        }
        Ok(repo)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Store a file's contents as a blob and return its id
    pub fn store_file(&self, path: &Path) -> Result<ObjectId> {
        let data = fs::read(path)?;
        self.objects.put(Kind::Blob, &data)
    }

    pub fn ls_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>> {
        let object = self.objects.read(id)?;
        let tree_id = match object.kind {
            Kind::Tree => return decode_tree(&object.data),
            // `ls-tree <commit>` lists the commit's root tree
            Kind::Commit => Commit::parse(&object.data)?.tree,
            other => {
                return Err(Error::validation(format!(
                    "{} is a {}, not a tree",
                    id,
                    crate::object::kind_name(other)
                )))
            }
        };
        decode_tree(&self.objects.read_kind(&tree_id, Kind::Tree)?)
    }

    /// Create a commit object for `tree` with the given parents
    pub fn commit_tree(
        &self,
        tree: &ObjectId,
        parents: &[ObjectId],
        message: &str,
        signature: &str,
    ) -> Result<ObjectId> {
        self.objects.read_kind(tree, Kind::Tree)?;
        for parent in parents {
            self.objects.read_kind(parent, Kind::Commit)?;
        }
        let commit = Commit {
            tree: *tree,
            parents: parents.to_vec(),
            author: signature.to_string(),
            committer: signature.to_string(),
            message: message.to_string(),
        };
        self.objects.put(Kind::Commit, &commit.encode())
    }

    /// First-parent history starting at `start`, or at HEAD when `None`
    pub fn log(&self, start: Option<ObjectId>) -> Result<LogWalk<'_>> {
        let next = match start {
            Some(id) => Some(id),
            None => self.refs.resolve_head()?,
        };
        Ok(LogWalk { repo: self, next })
    }

    /// Check out the tree of the commit HEAD resolves to
    pub fn checkout_head(&self) -> Result<usize> {
        let Some(head) = self.refs.resolve_head()? else {
            return Ok(0);
        };
        let commit = Commit::parse(&self.objects.read_kind(&head, Kind::Commit)?)?;
        self.checkout_tree(&commit.tree)
    }
}

/// Iterator over a first-parent chain of commits
pub struct LogWalk<'r> {
    repo: &'r Repository,
    next: Option<ObjectId>,
}

impl Iterator for LogWalk<'_> {
    type Item = Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        let commit = self
            .repo
            .objects
            .read_kind(&id, Kind::Commit)
            .and_then(|payload| Commit::parse(&payload));
        Some(commit.map(|commit| {
            self.next = commit.first_parent();
            (id, commit)
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::object::signature;
    use crate::store::Head;

    #[test]
    fn test_store_file() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let file = temp.path().join("f");
        fs::write(&file, "test\n").unwrap();

        let id = repo.store_file(&file).unwrap();
        assert_eq!(id.to_hex(), "9daeafb9864cf43055ae93beb0afd6c7d144bfa4");
        assert_eq!(repo.objects().get(&id).unwrap(), b"test\n");
        assert!(repo.store_file(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_init_layout() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        assert!(temp.path().join(".git/objects").is_dir());
        assert!(temp.path().join(".git/refs/heads").is_dir());
        assert_eq!(
            fs::read_to_string(temp.path().join(".git/HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert_eq!(repo.refs().read_head().unwrap(), Head::Symbolic("main".into()));
    }

    #[test]
    fn test_open_requires_git_dir() {
        let temp = TempDir::new().unwrap();
        assert!(Repository::open(temp.path()).unwrap_err().is_not_found());
        Repository::init(temp.path()).unwrap();
        assert!(Repository::open(temp.path()).is_ok());
    }

    #[test]
    fn test_commit_and_log() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        fs::write(temp.path().join("f"), "1").unwrap();
        let tree = repo.write_tree().unwrap();
        let sig = signature("Tester", "t@example.com", 1_700_000_000);

        let first = repo.commit_tree(&tree, &[], "first", &sig).unwrap();
        let second = repo.commit_tree(&tree, &[first], "second", &sig).unwrap();
        repo.refs().write_ref("refs/heads/main", &second).unwrap();

        let history: Vec<_> = repo
            .log(None)
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0, second);
        assert_eq!(history[0].1.message, "second\n");
        assert_eq!(history[1].0, first);
    }

    #[test]
    fn test_log_stops_on_missing_parent() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let tree = repo.write_tree().unwrap();
        let missing = crate::object::hash_object(Kind::Commit, b"gone");
        let commit = Commit {
            tree,
            parents: vec![missing],
            author: "a <a@b> 0 +0000".into(),
            committer: "a <a@b> 0 +0000".into(),
            message: "orphan\n".into(),
        };
        let id = repo.objects().put(Kind::Commit, &commit.encode()).unwrap();

        let mut walk = repo.log(Some(id)).unwrap();
        assert!(walk.next().unwrap().is_ok());
        assert!(walk.next().unwrap().unwrap_err().is_not_found());
    }

    #[test]
    fn test_commit_tree_validates_inputs() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let blob = repo.objects().put(Kind::Blob, b"x").unwrap();
        assert!(repo.commit_tree(&blob, &[], "m", "a <a@b> 0 +0000").is_err());
    }

    #[test]
    fn test_ls_tree_accepts_commit() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        fs::write(temp.path().join("file.txt"), "x").unwrap();
        let tree = repo.write_tree().unwrap();
        let commit = repo.commit_tree(&tree, &[], "m", "a <a@b> 0 +0000").unwrap();
        let names: Vec<_> = repo
            .ls_tree(&commit)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["file.txt"]);
    }
}
