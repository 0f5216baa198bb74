//! Blob backends for the object-store connector.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::store::{BackendKind, StoreError, StoreResult};

/// Listing entry for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object path relative to the bucket, `<namespace>/<id>`.
    pub path: String,
    pub size: u64,
}

/// Raw blob storage addressed by bucket and path.
pub trait ObjectBackend: Send + Sync + Debug {
    /// Makes sure `bucket` exists and is usable.
    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()>;

    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> StoreResult<()>;

    /// Reads one object; a missing object is `NotFound`.
    fn get(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>>;

    /// Removes one object; a missing object is `NotFound`.
    fn delete(&self, bucket: &str, path: &str) -> StoreResult<()>;

    fn exists(&self, bucket: &str, path: &str) -> StoreResult<bool>;

    /// Lists objects directly under `prefix`, sorted by path.
    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>>;
}

/// Bucket-per-directory backend on the local filesystem.
#[derive(Debug)]
pub struct LocalObjectBackend {
    root: PathBuf,
}

impl LocalObjectBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, bucket: &str, path: &str) -> PathBuf {
        self.root.join(bucket).join(path)
    }
}

impl ObjectBackend for LocalObjectBackend {
    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        fs::create_dir_all(self.root.join(bucket))?;
        Ok(())
    }

    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> StoreResult<()> {
        let full_path = self.full_path(bucket, path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full_path, data)?;
        Ok(())
    }

    fn get(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>> {
        fs::read(self.full_path(bucket, path)).map_err(|err| {
            if err.kind() == IoErrorKind::NotFound {
                StoreError::not_found(bucket, path)
            } else {
                err.into()
            }
        })
    }

    fn delete(&self, bucket: &str, path: &str) -> StoreResult<()> {
        fs::remove_file(self.full_path(bucket, path)).map_err(|err| {
            if err.kind() == IoErrorKind::NotFound {
                StoreError::not_found(bucket, path)
            } else {
                err.into()
            }
        })
    }

    fn exists(&self, bucket: &str, path: &str) -> StoreResult<bool> {
        Ok(self.full_path(bucket, path).is_file())
    }

    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let dir = self.full_path(bucket, prefix);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut objects = Vec::new();
        for entry in listing {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                objects.push(ObjectInfo {
                    path: format!("{prefix}/{name}"),
                    size: metadata.len(),
                });
            }
        }
        objects.sort_by(|left, right| left.path.cmp(&right.path));
        Ok(objects)
    }
}

/// In-process backend, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectBackend {
    buckets: RwLock<BTreeSet<String>>,
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::backend(BackendKind::ObjectStore, "object map lock poisoned")
}

impl ObjectBackend for MemoryObjectBackend {
    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.buckets
            .write()
            .map_err(|_| poisoned())?
            .insert(bucket.to_string());
        Ok(())
    }

    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> StoreResult<()> {
        if !self.buckets.read().map_err(|_| poisoned())?.contains(bucket) {
            return Err(StoreError::backend(
                BackendKind::ObjectStore,
                format!("bucket `{bucket}` does not exist"),
            ));
        }
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert((bucket.to_string(), path.to_string()), data.to_vec());
        Ok(())
    }

    fn get(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(bucket, path))
    }

    fn delete(&self, bucket: &str, path: &str) -> StoreResult<()> {
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .remove(&(bucket.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(bucket, path))
    }

    fn exists(&self, bucket: &str, path: &str) -> StoreResult<bool> {
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .contains_key(&(bucket.to_string(), path.to_string())))
    }

    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let directory = format!("{prefix}/");
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .filter(|((object_bucket, path), _)| {
                object_bucket == bucket
                    && path
                        .strip_prefix(&directory)
                        .is_some_and(|name| !name.contains('/'))
            })
            .map(|((_, path), data)| ObjectInfo {
                path: path.clone(),
                size: data.len() as u64,
            })
            .collect())
    }
}
