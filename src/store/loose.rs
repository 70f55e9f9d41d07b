use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::object::{encode_header, hash_object, parse_loose, GitObject, Kind, ObjectId};

/// Loose object database under `.git/objects`, one zlib file per object
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects_dir: PathBuf,
}

impl ObjectStore {
    pub fn new<P: AsRef<Path>>(objects_dir: P) -> Self {
        ObjectStore {
            objects_dir: objects_dir.as_ref().to_path_buf(),
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Create the objects directory if it does not exist yet
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.objects_dir)?;
        Ok(())
    }

    /// Path of an object: `<objects>/<2 hex>/<38 hex>`
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.loose_path_parts();
        self.objects_dir.join(dir).join(file)
    }

    /// Store a payload and return its id. Storing content that is already
    /// present leaves the existing file alone.
    pub fn put(&self, kind: Kind, payload: &[u8]) -> Result<ObjectId> {
        let id = hash_object(kind, payload);
        let path = self.object_path(&id);
        if path.exists() {
            tracing::trace!("object {} already stored", id);
            return Ok(id);
        }

        let fan_out = path
            .parent()
            .ok_or_else(|| Error::validation(format!("bad object path {}", path.display())))?;
        fs::create_dir_all(fan_out)?;

        let mut temp = NamedTempFile::new_in(fan_out)?;
        {
            let mut encoder = ZlibEncoder::new(temp.as_file_mut(), Compression::default());
            encoder.write_all(&encode_header(kind, payload.len()))?;
            encoder.write_all(payload)?;
            encoder.finish()?;
        }

        // A concurrent writer may have produced the same file first; its
        // bytes are identical, so losing the race is fine.
        if let Err(e) = temp.persist_noclobber(&path) {
            if !path.exists() {
                return Err(Error::Io(e.error));
            }
        }

        tracing::debug!("wrote {} object {}", crate::object::kind_name(kind), id);
        Ok(id)
    }

    pub fn put_object(&self, object: &GitObject) -> Result<ObjectId> {
        self.put(object.kind, &object.data)
    }

    /// Read an object's type and payload
    pub fn read(&self, id: &ObjectId) -> Result<GitObject> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("object {}", id)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut raw = Vec::new();
        ZlibDecoder::new(file)
            .read_to_end(&mut raw)
            .map_err(|e| Error::CorruptObject {
                id: *id,
                reason: format!("failed to inflate: {}", e),
            })?;

        let (kind, payload) = parse_loose(&raw).map_err(|e| Error::CorruptObject {
            id: *id,
            reason: e.to_string(),
        })?;
        Ok(GitObject {
            id: *id,
            kind,
            data: payload.to_vec(),
        })
    }

    /// Read only the payload
    pub fn get(&self, id: &ObjectId) -> Result<Vec<u8>> {
        Ok(self.read(id)?.data)
    }

    /// Read an object and require it to be of `kind`
    pub fn read_kind(&self, id: &ObjectId, kind: Kind) -> Result<Vec<u8>> {
        let object = self.read(id)?;
        if object.kind != kind {
            return Err(Error::validation(format!(
                "object {} is a {}, not a {}",
                id,
                crate::object::kind_name(object.kind),
                crate::object::kind_name(kind)
            )));
        }
        Ok(object.data)
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }
}
