//! Relational store connector backed by SQLite.
//!
//! # Responsibility
//! - Translate generic record operations into parameterized SQL.
//! - Filter and order server-side; eager-load declared relationships.
//!
//! # Invariants
//! - Every table has a text `id` primary key; `save` upserts on it.
//! - Filter values are always bound, never spliced into SQL text.
//! - Bound filters compare like `QueryOptions::matches`: text filters
//!   compare on the text form, and `BOOLEAN` columns match `true`/`false`.
//! - Table and column names pass `validate_name` before interpolation.
//! - Columns declared `BOOLEAN` read back as JSON booleans and columns
//!   declared `JSON` read back as parsed JSON.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::{Number, Value};

use super::{
    delete_with_cascades, first_match, BackendKind, Capabilities, Cascade, DataAccess, Payload,
    Record, StoreError, StoreResult,
};
use crate::query::{literal_text, validate_name, Filter, QueryOptions};

mod relationship;

pub use relationship::{Relationship, RelationshipKind, Relationships};

/// Primary key column shared by every table.
pub const KEY_COLUMN: &str = "id";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnAffinity {
    Boolean,
    Json,
    Plain,
}

/// SQLite-backed `DataAccess` implementation.
///
/// One connection is opened at construction and shared by every caller.
pub struct RelationalConnector {
    conn: Mutex<Connection>,
    relationships: Relationships,
}

impl RelationalConnector {
    /// Opens a SQLite database file.
    ///
    /// # Side effects
    /// - Emits `store_connect` logging events with duration and status.
    pub fn connect(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::bootstrap("file", Connection::open(path))
    }

    /// Opens a private in-memory SQLite database.
    pub fn connect_in_memory() -> StoreResult<Self> {
        Self::bootstrap("memory", Connection::open_in_memory())
    }

    fn bootstrap(mode: &str, opened: rusqlite::Result<Connection>) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_connect module=store backend=relational status=start mode={mode}");

        let result = opened.and_then(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        });

        match result {
            Ok(conn) => {
                info!(
                    "event=store_connect module=store backend=relational status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    conn: Mutex::new(conn),
                    relationships: Relationships::new(),
                })
            }
            Err(err) => {
                error!(
                    "event=store_connect module=store backend=relational status=error mode={} duration_ms={} error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Declares a relationship available to `preload`.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.declare(relationship);
        self
    }

    /// Replaces the declared relationship set.
    pub fn with_relationships(mut self, relationships: Relationships) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// Executes a caller-supplied DDL batch against the shared connection.
    ///
    /// Tables are expected to be pre-provisioned; this only runs the batch
    /// and keeps no schema version.
    pub fn provision(&self, ddl: &str) -> StoreResult<()> {
        self.lock()?.execute_batch(ddl)?;
        Ok(())
    }

    /// Loads `relation` on one child of an outer relation.
    ///
    /// A dangling reference empties the child's relation instead of
    /// failing its siblings.
    fn preload_nested(
        &self,
        collection: &str,
        child: &mut Record,
        relation: &str,
    ) -> StoreResult<()> {
        match self.preload(collection, child, relation) {
            Err(err) if err.is_not_found() => {
                let head = relation.split('.').next().unwrap_or(relation);
                warn!(
                    "event=preload_skip module=store backend=relational status=warn collection={} relation={} error={}",
                    collection, head, err
                );
                let empty = match self.relationships.get(collection, head).map(|r| r.kind) {
                    Some(RelationshipKind::BelongsTo) => Value::Null,
                    _ => Value::Array(Vec::new()),
                };
                child.insert(head, empty);
                Ok(())
            }
            other => other,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::backend(BackendKind::Relational, "connection lock poisoned"))
    }
}

impl DataAccess for RelationalConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            server_side_filter: true,
            filtering: true,
            eager_load: true,
            structured_records: true,
        }
    }

    fn save(&self, collection: &str, key: &str, payload: &Payload) -> StoreResult<()> {
        let Payload::Record(record) = payload else {
            return Err(StoreError::unsupported(self.backend(), "save_bytes"));
        };
        validate_name(collection)?;

        let mut record = record.clone();
        record.insert(KEY_COLUMN, Value::String(key.to_string()));

        let mut columns = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (column, value) in record.fields() {
            validate_name(column)?;
            columns.push(column.as_str());
            values.push(json_to_sql(value)?);
        }

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = columns
            .iter()
            .filter(|column| **column != KEY_COLUMN)
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>();
        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {collection} ({}) VALUES ({placeholders})
             ON CONFLICT({KEY_COLUMN}) {conflict};",
            columns.join(", ")
        );

        self.lock()?.execute(&sql, params_from_iter(values))?;
        debug!(
            "event=save module=store backend=relational status=ok collection={} key={}",
            collection, key
        );
        Ok(())
    }

    fn read(&self, collection: &str, key: &str, options: &QueryOptions) -> StoreResult<Payload> {
        let conn = self.lock()?;
        let (clause, binds) = keyed_clause(&conn, collection, key, options)?;
        let matches = select(&conn, collection, clause.as_deref(), binds)?;
        first_match(self.backend(), collection, key, matches).map(Payload::Record)
    }

    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        select(&conn, collection, None, Vec::new())
    }

    fn filtered_read_all(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Record>> {
        options.validate()?;
        let conn = self.lock()?;
        let (clause, binds) = match bound_clause(&conn, collection, options, 0)? {
            Some((clause, binds)) => (Some(clause), binds),
            None => (None, Vec::new()),
        };
        select(&conn, collection, clause.as_deref(), binds)
    }

    fn delete(
        &self,
        collection: &str,
        key: &str,
        options: &QueryOptions,
        cascades: &[Cascade],
    ) -> StoreResult<()> {
        validate_name(collection)?;
        let conn = self.lock()?;
        let (clause, binds) = keyed_clause(&conn, collection, key, options)?;
        let clause = clause.unwrap_or_else(|| "1 = 1".to_string());

        delete_with_cascades(
            self.backend(),
            collection,
            key,
            cascades,
            || {
                let exists: i64 = conn.query_row(
                    &format!("SELECT EXISTS(SELECT 1 FROM {collection} WHERE {clause});"),
                    params_from_iter(binds.iter()),
                    |row| row.get(0),
                )?;
                Ok(exists == 1)
            },
            |cascade| {
                let Some((dependent_clause, dependent_binds)) =
                    bound_clause(&conn, &cascade.collection, &cascade.options, 0)?
                else {
                    return Ok(0);
                };
                let removed = conn.execute(
                    &format!("DELETE FROM {} WHERE {dependent_clause};", cascade.collection),
                    params_from_iter(dependent_binds),
                )?;
                Ok(removed)
            },
            || {
                let removed = conn.execute(
                    &format!("DELETE FROM {collection} WHERE {clause};"),
                    params_from_iter(binds.iter()),
                )?;
                if removed == 0 {
                    return Err(StoreError::not_found(collection, key));
                }
                Ok(())
            },
        )
    }

    fn relationship(&self, collection: &str, name: &str) -> Option<Relationship> {
        self.relationships.get(collection, name).cloned()
    }

    fn preload(&self, collection: &str, record: &mut Record, relation: &str) -> StoreResult<()> {
        let (head, rest) = match relation.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (relation, None),
        };
        let relationship = self.relationships.get(collection, head).ok_or_else(|| {
            StoreError::backend(
                self.backend(),
                format!("relationship `{head}` is not declared for `{collection}`"),
            )
        })?;

        let loaded = match relationship.kind {
            RelationshipKind::HasMany => {
                let parent_key = record.get(KEY_COLUMN).cloned().ok_or_else(|| {
                    StoreError::Serialization(format!(
                        "`{collection}` record has no `{KEY_COLUMN}` to preload `{head}`"
                    ))
                })?;
                let options = QueryOptions::new(&relationship.foreign_key, parent_key, true);
                let mut children = self.filtered_read_all(&relationship.collection, &options)?;
                if let Some(rest) = rest {
                    for child in &mut children {
                        self.preload_nested(&relationship.collection, child, rest)?;
                    }
                }
                Value::Array(children.into_iter().map(Record::into_value).collect())
            }
            RelationshipKind::BelongsTo => match record.get(&relationship.foreign_key) {
                None | Some(Value::Null) => Value::Null,
                Some(target_key) => {
                    let target_key = literal_text(target_key);
                    let mut target = self
                        .read(&relationship.collection, &target_key, &QueryOptions::none())?
                        .into_record()?;
                    if let Some(rest) = rest {
                        self.preload_nested(&relationship.collection, &mut target, rest)?;
                    }
                    target.into_value()
                }
            },
        };

        record.insert(relationship.name.clone(), loaded);
        Ok(())
    }
}

type BoundClause = (Option<String>, Vec<SqlValue>);

fn keyed_clause(
    conn: &Connection,
    collection: &str,
    key: &str,
    options: &QueryOptions,
) -> StoreResult<BoundClause> {
    options.validate()?;
    if key.is_empty() {
        if options.is_empty() {
            return Err(StoreError::InvalidField(
                "read requires a key or at least one filter".to_string(),
            ));
        }
        return match bound_clause(conn, collection, options, 0)? {
            Some((clause, binds)) => Ok((Some(clause), binds)),
            None => Ok((None, Vec::new())),
        };
    }

    let mut clause = format!("{KEY_COLUMN} = ?1");
    let mut binds = vec![SqlValue::Text(key.to_string())];
    if let Some((extra, extra_binds)) = bound_clause(conn, collection, options, 1)? {
        clause.push_str(" AND ");
        clause.push_str(&extra);
        binds.extend(extra_binds);
    }
    Ok((Some(clause), binds))
}

/// Placeholder clause for `options` plus its binds, typed per target column.
fn bound_clause(
    conn: &Connection,
    collection: &str,
    options: &QueryOptions,
    bound_before: usize,
) -> StoreResult<Option<(String, Vec<SqlValue>)>> {
    let Some((clause, filters)) = options.render_placeholders(bound_before) else {
        return Ok(None);
    };
    validate_name(collection)?;
    let affinities = column_affinities(conn, collection)?;
    let binds = filters
        .into_iter()
        .map(|filter| {
            let affinity = affinities
                .get(&filter.field)
                .copied()
                .unwrap_or(ColumnAffinity::Plain);
            bind_filter(filter, affinity)
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(Some((clause, binds)))
}

fn select(
    conn: &Connection,
    collection: &str,
    clause: Option<&str>,
    binds: Vec<SqlValue>,
) -> StoreResult<Vec<Record>> {
    validate_name(collection)?;
    let affinities = column_affinities(conn, collection)?;

    let mut sql = format!("SELECT * FROM {collection}");
    if let Some(clause) = clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql.push_str(&format!(" ORDER BY {KEY_COLUMN} ASC;"));

    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_row(row, &names, &affinities)?);
    }
    Ok(records)
}

fn parse_row(
    row: &Row<'_>,
    names: &[String],
    affinities: &HashMap<String, ColumnAffinity>,
) -> StoreResult<Record> {
    let mut record = Record::new();
    for (index, name) in names.iter().enumerate() {
        let affinity = affinities
            .get(name)
            .copied()
            .unwrap_or(ColumnAffinity::Plain);
        let value = sql_to_json(row.get_ref(index)?, affinity, name)?;
        record.insert(name.clone(), value);
    }
    Ok(record)
}

fn column_affinities(
    conn: &Connection,
    table: &str,
) -> StoreResult<HashMap<String, ColumnAffinity>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut affinities = HashMap::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let declared: String = row.get(2)?;
        let declared = declared.to_ascii_uppercase();
        let affinity = if declared.contains("BOOL") {
            ColumnAffinity::Boolean
        } else if declared.contains("JSON") {
            ColumnAffinity::Json
        } else {
            ColumnAffinity::Plain
        };
        affinities.insert(name, affinity);
    }
    if affinities.is_empty() {
        return Err(StoreError::backend(
            BackendKind::Relational,
            format!("no such table: {table}"),
        ));
    }
    Ok(affinities)
}

/// Binds one filter value so SQL equality agrees with `Filter::matches`.
///
/// `BOOLEAN` columns hold 0/1 and only match the text `true` or `false`.
/// Text filters bind their text form; column affinity converts it for
/// numeric columns.
fn bind_filter(filter: &Filter, affinity: ColumnAffinity) -> StoreResult<SqlValue> {
    if affinity == ColumnAffinity::Boolean {
        return Ok(match literal_text(&filter.value).as_str() {
            "true" => SqlValue::Integer(1),
            "false" => SqlValue::Integer(0),
            // `= NULL` never holds.
            _ => SqlValue::Null,
        });
    }
    if filter.is_identifier {
        json_to_sql(&filter.value)
    } else {
        Ok(SqlValue::Text(literal_text(&filter.value)))
    }
}

fn json_to_sql(value: &Value) -> StoreResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().ok_or_else(|| {
                StoreError::Serialization(format!("number `{number}` is out of range"))
            })?),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        nested @ (Value::Array(_) | Value::Object(_)) => SqlValue::Text(nested.to_string()),
    })
}

fn sql_to_json(value: ValueRef<'_>, affinity: ColumnAffinity, column: &str) -> StoreResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(integer) if affinity == ColumnAffinity::Boolean => match integer {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(StoreError::Serialization(format!(
                    "invalid boolean value `{other}` in column `{column}`"
                )));
            }
        },
        ValueRef::Integer(integer) => Value::Number(integer.into()),
        ValueRef::Real(real) => Number::from_f64(real)
            .map(Value::Number)
            .ok_or_else(|| {
                StoreError::Serialization(format!("non-finite value in column `{column}`"))
            })?,
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|err| {
                StoreError::Serialization(format!("column `{column}` is not UTF-8: {err}"))
            })?;
            if affinity == ColumnAffinity::Json {
                serde_json::from_str(text)?
            } else {
                Value::String(text.to_string())
            }
        }
        ValueRef::Blob(bytes) => Value::Array(
            bytes
                .iter()
                .map(|byte| Value::Number((*byte).into()))
                .collect(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::{bind_filter, json_to_sql, sql_to_json, ColumnAffinity};
    use crate::query::Filter;
    use rusqlite::types::{Value as SqlValue, ValueRef};
    use serde_json::{json, Value};

    #[test]
    fn booleans_bind_as_integers_and_read_back_by_affinity() {
        assert_eq!(json_to_sql(&json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(
            sql_to_json(ValueRef::Integer(1), ColumnAffinity::Boolean, "desired").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            sql_to_json(ValueRef::Integer(1), ColumnAffinity::Plain, "level").unwrap(),
            json!(1)
        );
        assert!(sql_to_json(ValueRef::Integer(7), ColumnAffinity::Boolean, "desired").is_err());
    }

    #[test]
    fn text_filters_bind_their_text_form() {
        let desired = Filter::new("desired", "true", false);
        assert_eq!(
            bind_filter(&desired, ColumnAffinity::Boolean).unwrap(),
            SqlValue::Integer(1)
        );
        let flag = Filter::new("desired", false, true);
        assert_eq!(
            bind_filter(&flag, ColumnAffinity::Boolean).unwrap(),
            SqlValue::Integer(0)
        );
        let unknown = Filter::new("desired", "1", false);
        assert_eq!(
            bind_filter(&unknown, ColumnAffinity::Boolean).unwrap(),
            SqlValue::Null
        );
        let level = Filter::new("level", 4, false);
        assert_eq!(
            bind_filter(&level, ColumnAffinity::Plain).unwrap(),
            SqlValue::Text("4".to_string())
        );
        let level = Filter::new("level", 4, true);
        assert_eq!(
            bind_filter(&level, ColumnAffinity::Plain).unwrap(),
            SqlValue::Integer(4)
        );
    }

    #[test]
    fn nested_values_round_trip_through_json_columns() {
        let nested = json!({ "tags": ["a", "b"] });
        let SqlValue::Text(text) = json_to_sql(&nested).unwrap() else {
            panic!("nested values should bind as text");
        };
        let back = sql_to_json(ValueRef::Text(text.as_bytes()), ColumnAffinity::Json, "meta");
        assert_eq!(back.unwrap(), nested);
    }
}
