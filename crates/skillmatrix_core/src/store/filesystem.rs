//! Local filesystem connector.
//!
//! # Responsibility
//! - Persist one JSON file per record at `<root>/<collection>/<key>.json`.
//! - Serve filtered reads by decoding every record and filtering in-process.
//!
//! # Invariants
//! - `read_all` returns records in insertion order; upserts keep their slot.
//! - Keys never escape their collection directory.
//! - Writes go through a per-write temp file and rename, so readers never
//!   observe a partially written record.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{
    delete_with_cascades, first_match, BackendKind, Capabilities, Cascade, DataAccess, Payload,
    Record, StoreError, StoreResult,
};
use crate::query::{validate_name, QueryOptions};

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    /// Monotonic nanosecond stamp assigned on first insert.
    inserted_at: u64,
    record: Record,
}

/// Filesystem-backed `DataAccess` implementation.
#[derive(Debug)]
pub struct FilesystemConnector {
    root: PathBuf,
    last_stamp: AtomicU64,
}

impl FilesystemConnector {
    /// Opens (and creates when missing) the root directory.
    ///
    /// # Errors
    /// - Returns `Io` when the root cannot be created or is not a directory.
    pub fn connect(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        if let Err(err) = fs::create_dir_all(&root) {
            error!(
                "event=store_connect module=store backend=filesystem status=error root={} error={}",
                root.display(),
                err
            );
            return Err(err.into());
        }
        if !root.is_dir() {
            return Err(StoreError::backend(
                BackendKind::Filesystem,
                format!("root `{}` is not a directory", root.display()),
            ));
        }

        info!(
            "event=store_connect module=store backend=filesystem status=ok root={}",
            root.display()
        );
        Ok(Self {
            root,
            last_stamp: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for one record.
    pub fn record_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(collection)?;
        validate_key(key)?;
        Ok(self
            .root
            .join(collection)
            .join(format!("{key}.{RECORD_EXTENSION}")))
    }

    fn load(&self, path: &Path, collection: &str, key: &str) -> StoreResult<StoredRecord> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                return Err(StoreError::not_found(collection, key));
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Serialization(format!("{}: {err}", path.display())))
    }

    fn entries(&self, collection: &str) -> StoreResult<Vec<(String, StoredRecord)>> {
        validate_name(collection)?;
        let dir = self.root.join(collection);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for entry in listing {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let key = key.to_string();
            let stored = self.load(&path, collection, &key)?;
            entries.push((key, stored));
        }

        entries.sort_by(|(left_key, left), (right_key, right)| {
            left.inserted_at
                .cmp(&right.inserted_at)
                .then_with(|| left_key.cmp(right_key))
        });
        Ok(entries)
    }

    fn remove(&self, path: &Path, collection: &str, key: &str) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                Err(StoreError::not_found(collection, key))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match self.last_stamp.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(current) => last = current,
            }
        }
    }
}

impl DataAccess for FilesystemConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Filesystem
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            server_side_filter: false,
            filtering: true,
            eager_load: false,
            structured_records: true,
        }
    }

    fn save(&self, collection: &str, key: &str, payload: &Payload) -> StoreResult<()> {
        let Payload::Record(record) = payload else {
            return Err(StoreError::unsupported(self.backend(), "save_bytes"));
        };
        let path = self.record_path(collection, key)?;

        let inserted_at = match self.load(&path, collection, key) {
            Ok(previous) => previous.inserted_at,
            Err(err) if err.is_not_found() => self.next_stamp(),
            Err(err) => {
                error!(
                    "event=save module=store backend=filesystem status=error collection={} key={} error={}",
                    collection, key, err
                );
                return Err(err);
            }
        };
        let stored = StoredRecord {
            inserted_at,
            record: record.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent)?;
        // One temp file per write; concurrent saves of a key never share it.
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&bytes)?;
        temp.persist(&path).map_err(|err| err.error)?;

        debug!(
            "event=save module=store backend=filesystem status=ok collection={} key={}",
            collection, key
        );
        Ok(())
    }

    fn read(&self, collection: &str, key: &str, options: &QueryOptions) -> StoreResult<Payload> {
        options.validate()?;
        if key.is_empty() && !options.is_empty() {
            let matches = self.filtered_read_all(collection, options)?;
            return first_match(self.backend(), collection, key, matches).map(Payload::Record);
        }
        let path = self.record_path(collection, key)?;
        let stored = self.load(&path, collection, key)?;
        if !options.matches(&stored.record) {
            return Err(StoreError::not_found(collection, key));
        }
        Ok(Payload::Record(stored.record))
    }

    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .entries(collection)?
            .into_iter()
            .map(|(_, stored)| stored.record)
            .collect())
    }

    fn filtered_read_all(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Record>> {
        options.validate()?;
        Ok(self
            .read_all(collection)?
            .into_iter()
            .filter(|record| options.matches(record))
            .collect())
    }

    fn delete(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
        cascades: &[Cascade],
    ) -> StoreResult<()> {
        options.validate()?;
        let path = self.record_path(collection, key)?;

        delete_with_cascades(
            self.backend(),
            collection,
            key,
            cascades,
            || match self.load(&path, collection, key) {
                Ok(stored) => Ok(options.matches(&stored.record)),
                Err(err) if err.is_not_found() => Ok(false),
                Err(err) => Err(err),
            },
            |cascade| {
                let mut removed = 0;
                for (dependent_key, stored) in self.entries(&cascade.collection)? {
                    if !cascade.options.matches(&stored.record) {
                        continue;
                    }
                    let dependent_path = self.record_path(&cascade.collection, &dependent_key)?;
                    self.remove(&dependent_path, &cascade.collection, &dependent_key)?;
                    removed += 1;
                }
                Ok(removed)
            },
            || self.remove(&path, collection, key),
        )
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidField(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_key, FilesystemConnector};
    use crate::store::{DataAccess, ErrorKind, Payload, Record};
    use serde_json::json;

    #[test]
    fn keys_cannot_escape_the_collection_directory() {
        assert!(validate_key("6f1c6b9e").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key(r"a\b").is_err());
    }

    #[test]
    fn record_path_follows_collection_and_key_layout() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FilesystemConnector::connect(dir.path()).unwrap();
        let path = connector.record_path("skills", "abc").unwrap();
        assert_eq!(path, dir.path().join("skills").join("abc.json"));
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FilesystemConnector::connect(dir.path()).unwrap();
        let first = connector.next_stamp();
        let second = connector.next_stamp();
        let third = connector.next_stamp();
        assert!(first < second && second < third);
    }

    #[test]
    fn save_over_a_corrupt_record_reports_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FilesystemConnector::connect(dir.path()).unwrap();
        let path = connector.record_path("skills", "broken").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let mut record = Record::new();
        record.insert("name", json!("Rust"));
        let err = connector
            .save("skills", "broken", &Payload::Record(record))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }
}
