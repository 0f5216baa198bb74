//! Best-effort eager loading of declared relationships.
//!
//! # Invariants
//! - A relation that fails to load never fails the parent: it is logged and
//!   left empty (`[]` for has-many, `null` for belongs-to).
//! - On a dotted path, only the hop that failed is emptied; siblings that
//!   loaded keep their data.
//! - Parent records are always returned, in their original order.

use log::warn;
use serde_json::Value;

use crate::store::{DataAccess, Record, RelationshipKind, StoreError};

/// One relation that could not be attached to one record.
#[derive(Debug)]
pub struct PreloadFailure {
    /// Index of the record in the slice passed to `preload_relations`.
    pub record_index: usize,
    /// Requested path, e.g. `reviews.author`.
    pub relation: String,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PreloadReport {
    /// Record/path pairs that loaded without any failure.
    pub attached: usize,
    pub failures: Vec<PreloadFailure>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Attaches every relation path in `relations` to every record.
///
/// Dotted paths are walked one hop at a time, so a failure deep in a path
/// only empties the relation on the child that failed.
pub fn preload_relations(
    store: &dyn DataAccess,
    collection: &str,
    records: &mut [Record],
    relations: &[&str],
) -> PreloadReport {
    let mut report = PreloadReport::default();

    for (record_index, record) in records.iter_mut().enumerate() {
        for &relation in relations {
            let failures_before = report.failures.len();
            let mut walk = PathWalk {
                store,
                record_index,
                relation,
                report: &mut report,
            };
            walk.attach(collection, record, relation);
            if report.failures.len() == failures_before {
                report.attached += 1;
            }
        }
    }

    report
}

struct PathWalk<'a> {
    store: &'a dyn DataAccess,
    record_index: usize,
    /// Full dotted path as requested, for reporting.
    relation: &'a str,
    report: &'a mut PreloadReport,
}

impl PathWalk<'_> {
    fn attach(&mut self, collection: &str, record: &mut Record, path: &str) {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        if let Err(error) = self.store.preload(collection, record, head) {
            self.skip(collection, record, head, error);
            return;
        }
        let Some(rest) = rest else {
            return;
        };
        let Some(relationship) = self.store.relationship(collection, head) else {
            return;
        };

        let loaded = record.remove(head).unwrap_or(Value::Null);
        let walked = match loaded {
            Value::Array(children) => Value::Array(
                children
                    .into_iter()
                    .map(|child| self.attach_child(&relationship.collection, child, rest))
                    .collect(),
            ),
            child @ Value::Object(_) => self.attach_child(&relationship.collection, child, rest),
            other => other,
        };
        record.insert(head, walked);
    }

    fn attach_child(&mut self, collection: &str, child: Value, path: &str) -> Value {
        match Record::try_from(child) {
            Ok(mut child) => {
                self.attach(collection, &mut child, path);
                child.into_value()
            }
            Err(error) => {
                self.fail(collection, path, error);
                Value::Null
            }
        }
    }

    fn skip(&mut self, collection: &str, record: &mut Record, name: &str, error: StoreError) {
        record.insert(name, empty_relation(self.store, collection, name));
        self.fail(collection, name, error);
    }

    fn fail(&mut self, collection: &str, name: &str, error: StoreError) {
        warn!(
            "event=preload_skip module=preload status=error collection={} relation={} path={} record_index={} error_kind={} error={}",
            collection,
            name,
            self.relation,
            self.record_index,
            error.kind().as_str(),
            error
        );
        self.report.failures.push(PreloadFailure {
            record_index: self.record_index,
            relation: self.relation.to_string(),
            error,
        });
    }
}

fn empty_relation(store: &dyn DataAccess, collection: &str, name: &str) -> Value {
    match store.relationship(collection, name).map(|r| r.kind) {
        Some(RelationshipKind::BelongsTo) => Value::Null,
        Some(RelationshipKind::HasMany) | None => Value::Array(Vec::new()),
    }
}
