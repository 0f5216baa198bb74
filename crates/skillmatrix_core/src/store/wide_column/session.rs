//! Session seam between the wide-column connector and a cluster driver.
//!
//! # Responsibility
//! - Define the minimal statement-execution contract the connector needs.
//! - Provide `MemoryCqlSession`, an in-process interpreter of exactly the
//!   statement shapes the connector emits, for tests and local runs.
//!
//! # Invariants
//! - Rows are returned as `SELECT JSON` text, one JSON object per row.
//! - Non-key predicates without `ALLOW FILTERING` are rejected, as a real
//!   cluster would.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::query::literal_text;

static USE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^USE (\w+)$").expect("valid use regex"));
static INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^INSERT INTO (\w+)\.(\w+) JSON '(.*)'$").expect("valid insert regex")
});
static SELECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^SELECT JSON \* FROM (\w+)\.(\w+)(?: WHERE (.+?))?( ALLOW FILTERING)?$")
        .expect("valid select regex")
});
static DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^DELETE FROM (\w+)\.(\w+) WHERE (.+)$").expect("valid delete regex")
});
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+) = ").expect("valid predicate field regex"));

/// Error reported by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlError {
    pub message: String,
}

impl CqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for CqlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CqlError {}

/// Statement execution against a wide-column cluster.
///
/// Implementations own their connection pool and consistency level; both
/// are configured once when the session is built.
pub trait CqlSession: Send + Sync {
    /// Executes one statement and returns result rows as JSON text.
    fn execute(&self, statement: &str) -> Result<Vec<String>, CqlError>;
}

#[derive(Debug, Default)]
struct Table {
    key_column: String,
    rows: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Predicate {
    field: String,
    literal: String,
}

/// In-process wide-column session.
#[derive(Debug, Default)]
pub struct MemoryCqlSession {
    keyspaces: RwLock<HashMap<String, HashMap<String, Table>>>,
    failures: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
}

impl MemoryCqlSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_keyspace(&self, keyspace: &str) {
        if let Ok(mut keyspaces) = self.keyspaces.write() {
            keyspaces.entry(keyspace.to_string()).or_default();
        }
    }

    /// Creates a table whose partition key is `key_column`.
    pub fn create_table(&self, keyspace: &str, table: &str, key_column: &str) {
        if let Ok(mut keyspaces) = self.keyspaces.write() {
            keyspaces.entry(keyspace.to_string()).or_default().insert(
                table.to_string(),
                Table {
                    key_column: key_column.to_string(),
                    rows: BTreeMap::new(),
                },
            );
        }
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_statements_containing(&self, pattern: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(pattern.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    fn injected_failure(&self, statement: &str) -> Option<CqlError> {
        let failures = self.failures.lock().ok()?;
        failures
            .iter()
            .find(|pattern| statement.contains(pattern.as_str()))
            .map(|pattern| CqlError::new(format!("injected failure for `{pattern}`")))
    }

    fn run_use(&self, keyspace: &str) -> Result<Vec<String>, CqlError> {
        let keyspaces = self.read_lock()?;
        if keyspaces.contains_key(keyspace) {
            Ok(Vec::new())
        } else {
            Err(CqlError::new(format!("Keyspace '{keyspace}' does not exist")))
        }
    }

    fn run_insert(&self, keyspace: &str, table: &str, json: &str) -> Result<Vec<String>, CqlError> {
        let json = json.replace("''", "'");
        let row = match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(row)) => row,
            Ok(_) => return Err(CqlError::new("JSON value must be an object")),
            Err(err) => return Err(CqlError::new(format!("could not decode JSON: {err}"))),
        };

        let mut keyspaces = self
            .keyspaces
            .write()
            .map_err(|_| CqlError::new("session lock poisoned"))?;
        let table = lookup_mut(&mut keyspaces, keyspace, table)?;
        let key = match row.get(&table.key_column) {
            Some(Value::Null) | None => {
                return Err(CqlError::new(format!(
                    "Invalid null value for partition key part {}",
                    table.key_column
                )));
            }
            Some(key) => literal_text(key),
        };
        table.rows.insert(key, row);
        Ok(Vec::new())
    }

    fn run_select(
        &self,
        keyspace: &str,
        table: &str,
        clause: Option<&str>,
        allow_filtering: bool,
    ) -> Result<Vec<String>, CqlError> {
        let predicates = match clause {
            Some(clause) => parse_predicates(clause)?,
            None => Vec::new(),
        };
        let keyspaces = self.read_lock()?;
        let table = lookup(&keyspaces, keyspace, table)?;
        let filters_non_key = predicates
            .iter()
            .any(|predicate| predicate.field != table.key_column);
        if filters_non_key && !allow_filtering {
            return Err(CqlError::new(
                "Cannot execute this query as it might involve data filtering; use ALLOW FILTERING",
            ));
        }

        table
            .rows
            .values()
            .filter(|row| row_matches(row, &predicates))
            .map(|row| serde_json::to_string(row).map_err(|err| CqlError::new(err.to_string())))
            .collect()
    }

    fn run_delete(&self, keyspace: &str, table: &str, clause: &str) -> Result<Vec<String>, CqlError> {
        let predicates = parse_predicates(clause)?;
        let mut keyspaces = self
            .keyspaces
            .write()
            .map_err(|_| CqlError::new("session lock poisoned"))?;
        let table = lookup_mut(&mut keyspaces, keyspace, table)?;
        let key = match predicates.as_slice() {
            [predicate] if predicate.field == table.key_column => predicate.literal.clone(),
            _ => {
                return Err(CqlError::new(
                    "DELETE statements must restrict exactly the partition key",
                ));
            }
        };
        table.rows.remove(&key);
        Ok(Vec::new())
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, HashMap<String, Table>>>, CqlError>
    {
        self.keyspaces
            .read()
            .map_err(|_| CqlError::new("session lock poisoned"))
    }
}

impl CqlSession for MemoryCqlSession {
    fn execute(&self, statement: &str) -> Result<Vec<String>, CqlError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(statement.to_string());
        }
        if let Some(err) = self.injected_failure(statement) {
            return Err(err);
        }

        if let Some(captures) = USE_RE.captures(statement) {
            return self.run_use(&captures[1]);
        }
        if let Some(captures) = INSERT_RE.captures(statement) {
            return self.run_insert(&captures[1], &captures[2], &captures[3]);
        }
        if let Some(captures) = SELECT_RE.captures(statement) {
            return self.run_select(
                &captures[1],
                &captures[2],
                captures.get(3).map(|clause| clause.as_str()),
                captures.get(4).is_some(),
            );
        }
        if let Some(captures) = DELETE_RE.captures(statement) {
            return self.run_delete(&captures[1], &captures[2], &captures[3]);
        }
        Err(CqlError::new(format!("unsupported statement: {statement}")))
    }
}

fn lookup<'a>(
    keyspaces: &'a HashMap<String, HashMap<String, Table>>,
    keyspace: &str,
    table: &str,
) -> Result<&'a Table, CqlError> {
    keyspaces
        .get(keyspace)
        .and_then(|tables| tables.get(table))
        .ok_or_else(|| CqlError::new(format!("unconfigured table {table}")))
}

fn lookup_mut<'a>(
    keyspaces: &'a mut HashMap<String, HashMap<String, Table>>,
    keyspace: &str,
    table: &str,
) -> Result<&'a mut Table, CqlError> {
    keyspaces
        .get_mut(keyspace)
        .and_then(|tables| tables.get_mut(table))
        .ok_or_else(|| CqlError::new(format!("unconfigured table {table}")))
}

fn row_matches(row: &Map<String, Value>, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| {
        row.get(&predicate.field)
            .map(|value| literal_text(value) == predicate.literal)
            .unwrap_or(false)
    })
}

/// Parses `field = literal [AND field = literal]*`.
///
/// Quoted literals may contain ` AND ` and doubled single quotes.
fn parse_predicates(clause: &str) -> Result<Vec<Predicate>, CqlError> {
    let mut predicates = Vec::new();
    let mut rest = clause;
    loop {
        let captures = FIELD_RE
            .captures(rest)
            .ok_or_else(|| CqlError::new(format!("line 1: syntax error near `{rest}`")))?;
        let field = captures[1].to_string();
        rest = &rest[captures[0].len()..];

        let (literal, remainder) = if let Some(quoted) = rest.strip_prefix('\'') {
            split_quoted(quoted)?
        } else {
            match rest.find(" AND ") {
                Some(end) => (rest[..end].to_string(), &rest[end..]),
                None => (rest.to_string(), ""),
            }
        };
        predicates.push(Predicate { field, literal });

        if remainder.is_empty() {
            return Ok(predicates);
        }
        rest = remainder
            .strip_prefix(" AND ")
            .ok_or_else(|| CqlError::new(format!("line 1: syntax error near `{remainder}`")))?;
    }
}

fn split_quoted(input: &str) -> Result<(String, &str), CqlError> {
    let mut literal = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if ch != '\'' {
            literal.push(ch);
            continue;
        }
        if let Some((_, '\'')) = chars.peek() {
            literal.push('\'');
            chars.next();
            continue;
        }
        return Ok((literal, &input[index + 1..]));
    }
    Err(CqlError::new("unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::{parse_predicates, CqlSession, MemoryCqlSession, Predicate};

    fn predicate(field: &str, literal: &str) -> Predicate {
        Predicate {
            field: field.to_string(),
            literal: literal.to_string(),
        }
    }

    #[test]
    fn parses_quoted_and_bare_literals() {
        let parsed =
            parse_predicates("skill_id = 1f2e AND name = 'Rock AND Roll' AND note = 'it''s'")
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                predicate("skill_id", "1f2e"),
                predicate("name", "Rock AND Roll"),
                predicate("note", "it's"),
            ]
        );
    }

    #[test]
    fn rejects_malformed_clauses() {
        assert!(parse_predicates("name 'x'").is_err());
        assert!(parse_predicates("name = 'unterminated").is_err());
        assert!(parse_predicates("name = 'x' OR id = 1").is_err());
    }

    #[test]
    fn non_key_filters_require_allow_filtering() {
        let session = MemoryCqlSession::new();
        session.create_keyspace("app");
        session.create_table("app", "skills", "id");
        session
            .execute(r#"INSERT INTO app.skills JSON '{"id":"a","name":"Go"}'"#)
            .unwrap();

        assert!(session
            .execute("SELECT JSON * FROM app.skills WHERE name = 'Go'")
            .is_err());
        let rows = session
            .execute("SELECT JSON * FROM app.skills WHERE name = 'Go' ALLOW FILTERING")
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unknown_tables_and_keyspaces_fail() {
        let session = MemoryCqlSession::new();
        assert!(session.execute("USE missing").is_err());
        assert!(session.execute("SELECT JSON * FROM app.nope").is_err());
    }
}
