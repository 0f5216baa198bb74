//! Object-store connector for opaque blobs (skill icons and the like).
//!
//! # Responsibility
//! - Store raw bytes under `<namespace>/<id>` in one fixed bucket.
//! - Return deterministic public URLs for stored objects.
//!
//! # Invariants
//! - Objects are keyed by path only; structured filters are rejected with
//!   `UnsupportedOperation`, never ignored.
//! - Size limits belong to callers (see `crate::model::validate_icon`).

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::{
    delete_with_cascades, BackendKind, Capabilities, Cascade, DataAccess, Payload, Record,
    StoreError, StoreResult,
};
use crate::query::{validate_name, QueryOptions};

mod backend;

pub use backend::{LocalObjectBackend, MemoryObjectBackend, ObjectBackend, ObjectInfo};

/// Public address the bucket is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicEndpoint {
    pub protocol: String,
    pub host: String,
}

impl PublicEndpoint {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
        }
    }
}

/// Blob-oriented `DataAccess` implementation.
#[derive(Debug)]
pub struct ObjectStoreConnector {
    backend: Arc<dyn ObjectBackend>,
    bucket: String,
    endpoint: PublicEndpoint,
}

impl ObjectStoreConnector {
    /// Binds the connector to `bucket`, creating it when the backend allows.
    pub fn connect(
        backend: Arc<dyn ObjectBackend>,
        bucket: &str,
        endpoint: PublicEndpoint,
    ) -> StoreResult<Self> {
        validate_bucket(bucket)?;
        backend.ensure_bucket(bucket)?;
        info!(
            "event=store_connect module=store backend=object_store status=ok bucket={} host={}",
            bucket, endpoint.host
        );
        Ok(Self {
            backend,
            bucket: bucket.to_string(),
            endpoint,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `<protocol>://<host>/<bucket>/<namespace>/<id>`.
    pub fn public_url(&self, namespace: &str, id: &str) -> String {
        format!(
            "{}://{}/{}/{namespace}/{id}",
            self.endpoint.protocol, self.endpoint.host, self.bucket
        )
    }

    /// Stores `data` and returns its public URL.
    pub fn upload(&self, namespace: &str, id: &str, data: &[u8]) -> StoreResult<String> {
        let path = object_path(namespace, id)?;
        self.backend.put(&self.bucket, &path, data)?;
        debug!(
            "event=object_put module=store backend=object_store status=ok path={} bytes={}",
            path,
            data.len()
        );
        Ok(self.public_url(namespace, id))
    }

    fn reject_filters(&self, options: &QueryOptions, operation: &'static str) -> StoreResult<()> {
        if options.is_empty() {
            Ok(())
        } else {
            Err(StoreError::unsupported(self.backend(), operation))
        }
    }
}

impl DataAccess for ObjectStoreConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            server_side_filter: false,
            filtering: false,
            eager_load: false,
            structured_records: false,
        }
    }

    fn save(&self, collection: &str, key: &str, payload: &Payload) -> StoreResult<()> {
        let bytes = payload.clone().into_bytes()?;
        self.upload(collection, key, &bytes).map(|_| ())
    }

    fn read(&self, collection: &str, key: &str, options: &QueryOptions) -> StoreResult<Payload> {
        self.reject_filters(options, "filtered_read")?;
        let path = object_path(collection, key)?;
        match self.backend.get(&self.bucket, &path) {
            Ok(bytes) => Ok(Payload::Bytes(bytes)),
            Err(err) if err.is_not_found() => Err(StoreError::not_found(collection, key)),
            Err(err) => Err(err),
        }
    }

    /// Lists the namespace as `{key, url, size}` records.
    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        validate_name(collection)?;
        self.backend
            .list(&self.bucket, collection)?
            .into_iter()
            .map(|object| {
                let key = object
                    .path
                    .rsplit_once('/')
                    .map_or(object.path.as_str(), |(_, id)| id)
                    .to_string();
                let mut record = Record::new();
                record.insert("url", Value::String(self.public_url(collection, &key)));
                record.insert("size", Value::from(object.size));
                record.insert("key", Value::String(key));
                Ok(record)
            })
            .collect()
    }

    fn filtered_read_all(
        &self,
        _collection: &str,
        _options: &QueryOptions,
    ) -> StoreResult<Vec<Record>> {
        Err(StoreError::unsupported(self.backend(), "filtered_read_all"))
    }

    fn delete(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
        cascades: &[Cascade],
    ) -> StoreResult<()> {
        self.reject_filters(options, "filtered_delete")?;
        if !cascades.is_empty() {
            return Err(StoreError::unsupported(self.backend(), "cascade_delete"));
        }
        let path = object_path(collection, key)?;

        delete_with_cascades(
            self.backend(),
            collection,
            key,
            cascades,
            || self.backend.exists(&self.bucket, &path),
            |_| Ok(0),
            || match self.backend.delete(&self.bucket, &path) {
                Err(err) if err.is_not_found() => Err(StoreError::not_found(collection, key)),
                other => other,
            },
        )
    }
}

fn object_path(namespace: &str, id: &str) -> StoreResult<String> {
    validate_name(namespace)?;
    let invalid_id = id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']);
    if invalid_id {
        return Err(StoreError::InvalidField(id.to_string()));
    }
    Ok(format!("{namespace}/{id}"))
}

fn validate_bucket(bucket: &str) -> StoreResult<()> {
    let valid = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidField(bucket.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{object_path, validate_bucket};

    #[test]
    fn object_paths_join_namespace_and_id() {
        assert_eq!(object_path("skill_icons", "abc").unwrap(), "skill_icons/abc");
        assert!(object_path("skill_icons", "../abc").is_err());
        assert!(object_path("skill icons", "abc").is_err());
    }

    #[test]
    fn bucket_names_follow_dns_style() {
        assert!(validate_bucket("team-assets").is_ok());
        assert!(validate_bucket("Team_Assets").is_err());
        assert!(validate_bucket("").is_err());
    }
}
