//! Per-record file store.
//!
//! One physical directory per collection, one `<id>.json` document per
//! record. Writes are full-document replaces made atomic by writing to a
//! temporary file and renaming it into place, so a reader never observes a
//! half-written document.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A storable record: anything with a string id.
pub trait Record: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
}

/// Storage-layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("record id \"{id}\" is not a valid id")]
    InvalidId { id: String },
    #[error("no record with id \"{id}\" to remove")]
    Missing { id: String },
}

/// Checks an id against `^(TEST_[A-Za-z]+_)?[0-9]+$`.
///
/// Ids failing this pattern are never used as filenames; the store treats
/// them as absent rather than erroring, closing the path-traversal hole a
/// crafted id would otherwise open.
pub fn is_valid_id(id: &str) -> bool {
    let digits = match id.strip_prefix("TEST_") {
        Some(rest) => match rest.split_once('_') {
            Some((marker, digits))
                if !marker.is_empty() && marker.bytes().all(|b| b.is_ascii_alphabetic()) =>
            {
                digits
            }
            _ => return false,
        },
        None => id,
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A file-backed key-value store for one collection of records.
///
/// `set`/`remove` on different ids never contend; two concurrent `set` calls
/// on the SAME id are last-writer-wins. Callers are responsible for
/// per-record mutual exclusion (see `directory::locks`).
pub struct RecordStore<T> {
    dir: PathBuf,
    collection: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecordStore<T> {
    /// Open (creating if needed) the collection directory under `data_dir`.
    pub fn open(data_dir: &Path, collection: &str) -> Result<Self, StoreError> {
        let dir = data_dir.join(collection);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            collection: collection.to_string(),
            _marker: PhantomData,
        })
    }

    /// Logical collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        if is_valid_id(id) {
            Some(self.dir.join(format!("{id}.json")))
        } else {
            None
        }
    }

    /// Whether a record with this id exists. Malformed ids are not present.
    pub fn has(&self, id: &str) -> bool {
        self.path_for(id).is_some_and(|path| path.is_file())
    }

    /// Get the record with this id.
    ///
    /// Returns `None` both for malformed ids and for missing documents; the
    /// two are not distinguished to the caller.
    pub fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Idempotent upsert: full-document replace via write-then-rename.
    pub fn set(&self, record: &T) -> Result<(), StoreError> {
        let id = record.id();
        let path = self.path_for(id).ok_or_else(|| StoreError::InvalidId {
            id: id.to_string(),
        })?;

        let bytes = serde_json::to_vec(record).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &bytes).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Upsert several records.
    pub fn set_many<'a, I>(&self, records: I) -> Result<(), StoreError>
    where
        T: 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for record in records {
            self.set(record)?;
        }
        Ok(())
    }

    /// Delete the backing document. Removing an id that does not exist is an
    /// error; callers are expected to have just confirmed existence.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let Some(path) = self.path_for(id) else {
            return Err(StoreError::Missing { id: id.to_string() });
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::Missing { id: id.to_string() })
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Every record in the collection, in unspecified (filesystem
    /// enumeration) order. Callers must not rely on the order for anything
    /// except idempotent full scans.
    pub fn get_all(&self) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for path in self.document_paths()? {
            let bytes = fs::read(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let record = serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path, source })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Cardinality of the collection, computed by enumeration.
    pub fn size(&self) -> Result<usize, StoreError> {
        Ok(self.document_paths()?.len())
    }

    fn document_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let read_dir = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = dir_entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}
