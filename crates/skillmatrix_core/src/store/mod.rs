//! Storage-agnostic data access contract and backend connectors.
//!
//! # Responsibility
//! - Define the `DataAccess` contract every backend connector satisfies.
//! - Tag each connector with its capabilities so unsupported operations
//!   fail loudly instead of silently changing semantics.
//! - Share the cascade-delete ordering protocol across connectors.
//!
//! # Invariants
//! - Callers depend on `dyn DataAccess`, never on a concrete backend.
//! - A connector is either fully connected or was never returned.
//! - Dependent deletes complete before the primary delete is issued.
//!
//! # See also
//! - `crate::join` and `crate::preload` for read-model assembly.

use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::query::QueryOptions;

mod error;
pub mod filesystem;
pub mod object;
mod record;
pub mod relational;
pub mod wide_column;

pub use error::{ErrorKind, StoreError, StoreResult};
pub use record::{Payload, Record};
pub use relational::{Relationship, RelationshipKind};

/// Backend family behind a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    WideColumn,
    Relational,
    ObjectStore,
    Filesystem,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WideColumn => "wide_column",
            Self::Relational => "relational",
            Self::ObjectStore => "object_store",
            Self::Filesystem => "filesystem",
        }
    }
}

/// What a connector can do beyond plain keyed save/read/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Filters are evaluated by the backend rather than in-process.
    pub server_side_filter: bool,
    /// `filtered_read_all` is meaningful at all.
    pub filtering: bool,
    /// Declared relationships can be attached via `preload`.
    pub eager_load: bool,
    /// Payloads are structured records rather than opaque bytes.
    pub structured_records: bool,
}

/// One dependent collection to clear before deleting a primary record.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    pub collection: String,
    pub options: QueryOptions,
}

impl Cascade {
    pub fn new(collection: impl Into<String>, options: QueryOptions) -> Self {
        Self {
            collection: collection.into(),
            options,
        }
    }

    /// Dependents whose `field` references `key`.
    pub fn referencing(collection: impl Into<String>, field: &str, key: &str) -> Self {
        Self::new(collection, QueryOptions::new(field, key, true))
    }
}

/// Contract implemented by every storage connector.
///
/// Implementations are shared across request workers for the whole process
/// lifetime and must be safe for concurrent use.
pub trait DataAccess: Send + Sync {
    fn backend(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// Upserts `payload` under `key` within `collection`.
    fn save(&self, collection: &str, key: &str, payload: &Payload) -> StoreResult<()>;

    /// Reads the single record matching `key` and `options`.
    ///
    /// Multiple matches are not an error: the first one is returned and a
    /// data-integrity warning is logged.
    fn read(&self, collection: &str, key: &str, options: &QueryOptions) -> StoreResult<Payload>;

    /// Returns every record in the collection, in backend-defined order.
    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Returns the records matching every filter in `options`.
    fn filtered_read_all(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Record>>;

    /// Deletes the record at `key` after clearing every cascade.
    fn delete(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
        cascades: &[Cascade],
    ) -> StoreResult<()>;

    /// Looks up a declared relationship by its parent collection and name.
    fn relationship(&self, collection: &str, name: &str) -> Option<Relationship> {
        let _ = (collection, name);
        None
    }

    /// Attaches a declared relationship to `record`.
    ///
    /// `relation` may be a dotted path (`reviews.author`) to load nested
    /// relationships of the loaded records.
    fn preload(&self, collection: &str, record: &mut Record, relation: &str) -> StoreResult<()> {
        let _ = (collection, record, relation);
        Err(StoreError::unsupported(self.backend(), "preload"))
    }
}

/// Typed helpers over `DataAccess`; the type parameter is the type descriptor.
pub trait DataAccessExt: DataAccess {
    fn save_as<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let payload = Payload::Record(Record::encode(value)?);
        self.save(collection, key, &payload)
    }

    fn read_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
    ) -> StoreResult<T> {
        self.read(collection, key, options)?.decode()
    }

    fn read_all_as<T: DeserializeOwned>(&self, collection: &str) -> StoreResult<Vec<T>> {
        self.read_all(collection)?
            .iter()
            .map(Record::decode::<T>)
            .collect()
    }

    fn filtered_read_all_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> StoreResult<Vec<T>> {
        self.filtered_read_all(collection, options)?
            .iter()
            .map(Record::decode::<T>)
            .collect()
    }

    fn read_bytes(&self, collection: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.read(collection, key, &QueryOptions::none())?.into_bytes()
    }
}

impl<S: DataAccess + ?Sized> DataAccessExt for S {}

/// Shared cascade-delete protocol.
///
/// Order: cascade validation, existence check, every cascade in order,
/// primary delete. The first
/// failing step aborts the operation and is returned unchanged; a cascade
/// failure therefore never removes the primary record.
pub(crate) fn delete_with_cascades<E, C, P>(
    backend: BackendKind,
    collection: &str,
    key: &str,
    cascades: &[Cascade],
    exists: E,
    mut delete_dependents: C,
    delete_primary: P,
) -> StoreResult<()>
where
    E: FnOnce() -> StoreResult<bool>,
    C: FnMut(&Cascade) -> StoreResult<usize>,
    P: FnOnce() -> StoreResult<()>,
{
    for cascade in cascades {
        crate::query::validate_name(&cascade.collection)?;
        if cascade.options.is_empty() {
            return Err(StoreError::InvalidField(format!(
                "cascade into `{}` requires at least one filter",
                cascade.collection
            )));
        }
        cascade.options.validate()?;
    }

    if !exists()? {
        return Err(StoreError::not_found(collection, key));
    }

    for cascade in cascades {
        match delete_dependents(cascade) {
            Ok(removed) => info!(
                "event=cascade_delete module=store backend={} status=ok collection={} dependents={} removed={}",
                backend.as_str(),
                collection,
                cascade.collection,
                removed
            ),
            Err(err) => {
                error!(
                    "event=cascade_delete module=store backend={} status=error collection={} dependents={} error_kind={} error={}",
                    backend.as_str(),
                    collection,
                    cascade.collection,
                    err.kind().as_str(),
                    err
                );
                return Err(err);
            }
        }
    }

    delete_primary()?;
    info!(
        "event=delete module=store backend={} status=ok collection={} cascades={}",
        backend.as_str(),
        collection,
        cascades.len()
    );
    Ok(())
}

/// Picks the first of possibly several matches for a single-key read.
pub(crate) fn first_match<T>(
    backend: BackendKind,
    collection: &str,
    key: &str,
    mut matches: Vec<T>,
) -> StoreResult<T> {
    if matches.len() > 1 {
        warn!(
            "event=read_multiple_matches module=store backend={} status=warn collection={} key={} matches={}",
            backend.as_str(),
            collection,
            key,
            matches.len()
        );
    }
    if matches.is_empty() {
        return Err(StoreError::not_found(collection, key));
    }
    Ok(matches.swap_remove(0))
}
