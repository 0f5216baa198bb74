//! Cross-collection join resolution for association records.
//!
//! # Responsibility
//! - Resolve the two foreign keys of an association record into the
//!   referenced entities and build the denormalized view.
//! - Degrade list reads gracefully when a reference dangles.
//!
//! # Invariants
//! - Only `NotFound` on a secondary lookup during a list read is turned into
//!   a skip; every other error propagates unchanged.
//! - Single-record resolution never returns a partial view: a dangling
//!   reference surfaces as `NotFound`.
//!
//! # See also
//! - `crate::preload` for the relationship-driven variant.

use log::{info, warn};
use serde::de::DeserializeOwned;

use crate::model::EntityId;
use crate::query::QueryOptions;
use crate::store::{DataAccess, DataAccessExt, StoreError, StoreResult};

/// Entity that can be referenced by an association and shown by name.
pub trait Named: DeserializeOwned {
    const COLLECTION: &'static str;

    fn display_name(&self) -> &str;
}

/// Record holding two foreign keys plus its own scalar attributes.
pub trait Association: DeserializeOwned {
    const COLLECTION: &'static str;

    type Subject: Named;
    type Target: Named;
    type View;

    fn id(&self) -> EntityId;

    fn subject_id(&self) -> EntityId;

    fn target_id(&self) -> EntityId;

    fn denormalize(self, subject: &Self::Subject, target: &Self::Target) -> Self::View;
}

/// One association left out of a list because a reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub association: &'static str,
    pub association_id: EntityId,
    /// Collection the missing entity was expected in.
    pub collection: &'static str,
    pub missing_id: EntityId,
}

/// Result of a list resolution: what resolved, and what was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<V> {
    pub items: Vec<V>,
    pub skipped: Vec<DanglingReference>,
}

impl<V> Default for Resolved<V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

enum Lookup<T> {
    Found(T),
    Dangling(DanglingReference),
}

/// Builds denormalized views on top of any `DataAccess` backend.
pub struct JoinResolver<'a> {
    store: &'a dyn DataAccess,
}

impl<'a> JoinResolver<'a> {
    pub fn new(store: &'a dyn DataAccess) -> Self {
        Self { store }
    }

    /// Resolves every association matching `options` (all when empty).
    ///
    /// Associations with a dangling reference are dropped and reported in
    /// `Resolved::skipped`; the call itself still succeeds.
    pub fn resolve_list<A: Association>(
        &self,
        options: &QueryOptions,
    ) -> StoreResult<Resolved<A::View>> {
        let associations: Vec<A> = if options.is_empty() {
            self.store.read_all_as(A::COLLECTION)?
        } else {
            self.store.filtered_read_all_as(A::COLLECTION, options)?
        };

        let mut resolved = Resolved::default();
        for association in associations {
            match self.resolve_ends(association)? {
                Lookup::Found(view) => resolved.items.push(view),
                Lookup::Dangling(dangling) => {
                    warn!(
                        "event=join_skip module=join status=warn association={} association_id={} collection={} missing_id={}",
                        dangling.association,
                        dangling.association_id,
                        dangling.collection,
                        dangling.missing_id
                    );
                    resolved.skipped.push(dangling);
                }
            }
        }

        info!(
            "event=join_list module=join status=ok association={} resolved={} skipped={}",
            A::COLLECTION,
            resolved.items.len(),
            resolved.skipped.len()
        );
        Ok(resolved)
    }

    /// Resolves one association by its own key.
    ///
    /// # Errors
    /// - `NotFound` when the association or either referenced entity is missing.
    pub fn resolve_one<A: Association>(&self, key: &str) -> StoreResult<A::View> {
        let association: A = self
            .store
            .read_as(A::COLLECTION, key, &QueryOptions::none())?;
        match self.resolve_ends(association)? {
            Lookup::Found(view) => Ok(view),
            Lookup::Dangling(dangling) => Err(StoreError::not_found(
                dangling.collection,
                &dangling.missing_id.to_string(),
            )),
        }
    }

    fn resolve_ends<A: Association>(&self, association: A) -> StoreResult<Lookup<A::View>> {
        let subject_id = association.subject_id();
        let subject = match self.lookup::<A, A::Subject>(&association, subject_id)? {
            Lookup::Found(subject) => subject,
            Lookup::Dangling(dangling) => return Ok(Lookup::Dangling(dangling)),
        };
        let target_id = association.target_id();
        let target = match self.lookup::<A, A::Target>(&association, target_id)? {
            Lookup::Found(target) => target,
            Lookup::Dangling(dangling) => return Ok(Lookup::Dangling(dangling)),
        };
        Ok(Lookup::Found(association.denormalize(&subject, &target)))
    }

    fn lookup<A: Association, T: Named>(
        &self,
        association: &A,
        id: EntityId,
    ) -> StoreResult<Lookup<T>> {
        match self
            .store
            .read_as::<T>(T::COLLECTION, &id.to_string(), &QueryOptions::none())
        {
            Ok(entity) => Ok(Lookup::Found(entity)),
            Err(err) if err.is_not_found() => Ok(Lookup::Dangling(DanglingReference {
                association: A::COLLECTION,
                association_id: association.id(),
                collection: T::COLLECTION,
                missing_id: id,
            })),
            Err(err) => Err(err),
        }
    }
}
