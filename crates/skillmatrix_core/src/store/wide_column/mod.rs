//! Wide-column store connector.
//!
//! # Responsibility
//! - Translate record operations into CQL statement text.
//! - Reuse the query-model literal rendering for every predicate.
//!
//! # Invariants
//! - Keyspace, table and column names pass `validate_name` before they are
//!   interpolated; values only ever appear as rendered literals.
//! - Keys render as identifiers when they parse as UUIDs, as text otherwise.
//! - No joins: cross-collection resolution belongs to `crate::join`.

use std::sync::Arc;

use log::{debug, error, info};
use serde_json::Value;
use uuid::Uuid;

use super::{
    delete_with_cascades, first_match, BackendKind, Capabilities, Cascade, DataAccess, Payload,
    Record, StoreError, StoreResult,
};
use crate::query::{validate_name, Filter, QueryOptions};

mod session;

pub use session::{CqlError, CqlSession, MemoryCqlSession};

/// Partition key column used when none is configured.
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// CQL-speaking `DataAccess` implementation.
pub struct WideColumnConnector {
    session: Arc<dyn CqlSession>,
    keyspace: String,
    key_column: String,
}

impl WideColumnConnector {
    /// Binds the connector to `keyspace` on an established session.
    ///
    /// # Errors
    /// - Returns `InvalidField` for a malformed keyspace name.
    /// - Returns `Backend` when the keyspace cannot be selected.
    pub fn connect(session: Arc<dyn CqlSession>, keyspace: &str) -> StoreResult<Self> {
        Self::connect_with_key(session, keyspace, DEFAULT_KEY_COLUMN)
    }

    pub fn connect_with_key(
        session: Arc<dyn CqlSession>,
        keyspace: &str,
        key_column: &str,
    ) -> StoreResult<Self> {
        validate_name(keyspace)?;
        validate_name(key_column)?;

        if let Err(err) = session.execute(&format!("USE {keyspace}")) {
            error!(
                "event=store_connect module=store backend=wide_column status=error keyspace={} error={}",
                keyspace, err
            );
            return Err(StoreError::backend(BackendKind::WideColumn, err.message));
        }

        info!(
            "event=store_connect module=store backend=wide_column status=ok keyspace={}",
            keyspace
        );
        Ok(Self {
            session,
            keyspace: keyspace.to_string(),
            key_column: key_column.to_string(),
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn table(&self, collection: &str) -> StoreResult<String> {
        validate_name(collection)?;
        Ok(format!("{}.{collection}", self.keyspace))
    }

    fn key_filter(&self, key: &str) -> Filter {
        Filter::new(&self.key_column, key, Uuid::parse_str(key).is_ok())
    }

    fn execute(&self, statement: &str) -> StoreResult<Vec<String>> {
        debug!(
            "event=cql_execute module=store backend=wide_column statement={}",
            statement
        );
        self.session
            .execute(statement)
            .map_err(|err| StoreError::backend(BackendKind::WideColumn, err.message))
    }

    fn select(&self, collection: &str, options: &QueryOptions) -> StoreResult<Vec<Record>> {
        options.validate()?;
        let mut statement = format!("SELECT JSON * FROM {}", self.table(collection)?);
        if let Some(clause) = options.render() {
            statement.push_str(" WHERE ");
            statement.push_str(&clause);
            if options
                .iter()
                .any(|filter| filter.field != self.key_column)
            {
                statement.push_str(" ALLOW FILTERING");
            }
        }

        self.execute(&statement)?
            .iter()
            .map(|row| Record::try_from(serde_json::from_str::<Value>(row)?))
            .collect()
    }

    fn keyed_options(&self, key: &str, options: &QueryOptions) -> StoreResult<QueryOptions> {
        if key.is_empty() {
            if options.is_empty() {
                return Err(StoreError::InvalidField(
                    "read requires a key or at least one filter".to_string(),
                ));
            }
            return Ok(options.clone());
        }
        let mut keyed = QueryOptions::from(self.key_filter(key));
        for filter in options {
            keyed.add_filter(&filter.field, filter.value.clone(), filter.is_identifier);
        }
        Ok(keyed)
    }

    fn delete_by_key(&self, collection: &str, key: &str) -> StoreResult<()> {
        let statement = format!(
            "DELETE FROM {} WHERE {}",
            self.table(collection)?,
            self.key_filter(key).render()
        );
        self.execute(&statement)?;
        Ok(())
    }
}

impl DataAccess for WideColumnConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::WideColumn
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            server_side_filter: true,
            filtering: true,
            eager_load: false,
            structured_records: true,
        }
    }

    fn save(&self, collection: &str, key: &str, payload: &Payload) -> StoreResult<()> {
        let Payload::Record(record) = payload else {
            return Err(StoreError::unsupported(self.backend(), "save_bytes"));
        };
        let table = self.table(collection)?;

        let mut record = record.clone();
        record.insert(self.key_column.clone(), Value::String(key.to_string()));
        for (column, _) in record.fields() {
            validate_name(column)?;
        }
        let json = serde_json::to_string(&record)?.replace('\'', "''");

        self.execute(&format!("INSERT INTO {table} JSON '{json}'"))?;
        Ok(())
    }

    fn read(&self, collection: &str, key: &str, options: &QueryOptions) -> StoreResult<Payload> {
        let keyed = self.keyed_options(key, options)?;
        let matches = self.select(collection, &keyed)?;
        first_match(self.backend(), collection, key, matches).map(Payload::Record)
    }

    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.select(collection, &QueryOptions::none())
    }

    fn filtered_read_all(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Record>> {
        self.select(collection, options)
    }

    fn delete(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
        cascades: &[Cascade],
    ) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidField(
                "delete requires a partition key".to_string(),
            ));
        }
        let keyed = self.keyed_options(key, options)?;

        delete_with_cascades(
            self.backend(),
            collection,
            key,
            cascades,
            || Ok(!self.select(collection, &keyed)?.is_empty()),
            |cascade| {
                let dependents = self.select(&cascade.collection, &cascade.options)?;
                for dependent in &dependents {
                    let dependent_key = dependent
                        .get(&self.key_column)
                        .map(crate::query::literal_text)
                        .ok_or_else(|| {
                            StoreError::Serialization(format!(
                                "`{}` row has no `{}` column",
                                cascade.collection, self.key_column
                            ))
                        })?;
                    self.delete_by_key(&cascade.collection, &dependent_key)?;
                }
                Ok(dependents.len())
            },
            || self.delete_by_key(collection, key),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::WideColumnConnector;
    use crate::query::QueryOptions;
    use crate::store::wide_column::MemoryCqlSession;
    use crate::store::{DataAccess, Payload, Record};
    use serde_json::json;
    use std::sync::Arc;

    fn connector() -> (Arc<MemoryCqlSession>, WideColumnConnector) {
        let session = Arc::new(MemoryCqlSession::new());
        session.create_keyspace("skills_ks");
        session.create_table("skills_ks", "skills", "id");
        let connector = WideColumnConnector::connect(session.clone(), "skills_ks").unwrap();
        (session, connector)
    }

    #[test]
    fn uuid_keys_render_unquoted_and_text_keys_quoted() {
        let (session, connector) = connector();
        let uuid = "6f1c6b9e-0f53-4a43-9d8f-3c2b3f3b2a10";
        let _ = connector.read("skills", uuid, &QueryOptions::none());
        let _ = connector.read("skills", "rust", &QueryOptions::none());

        let executed = session.executed();
        assert!(executed.contains(&format!("SELECT JSON * FROM skills_ks.skills WHERE id = {uuid}")));
        assert!(executed.contains(&"SELECT JSON * FROM skills_ks.skills WHERE id = 'rust'".to_string()));
    }

    #[test]
    fn filtered_reads_append_allow_filtering() {
        let (session, connector) = connector();
        let record = Record::try_from(json!({ "name": "It's Go" })).unwrap();
        connector
            .save("skills", "go", &Payload::Record(record))
            .unwrap();

        let found = connector
            .filtered_read_all("skills", &QueryOptions::new("name", "It's Go", false))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(session.executed().contains(
            &"SELECT JSON * FROM skills_ks.skills WHERE name = 'It''s Go' ALLOW FILTERING"
                .to_string()
        ));
    }

    #[test]
    fn connect_fails_for_missing_keyspace() {
        let session = Arc::new(MemoryCqlSession::new());
        assert!(WideColumnConnector::connect(session, "missing").is_err());
    }
}
