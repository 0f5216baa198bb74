//! Query-filter model used to narrow reads and deletes.
//!
//! # Responsibility
//! - Hold an ordered set of equality predicates (`Filter`).
//! - Own the one literal rendering rule every textual translator reuses.
//! - Evaluate the same predicates client-side for backends without
//!   server-side filtering.
//!
//! # Invariants
//! - Filters combine with logical AND; append order drives fragment order.
//! - An empty `QueryOptions` renders to "no predicate", never to a fragment.
//! - Identifier values are never quoted; text values are always quoted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Record, StoreError, StoreResult};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name regex"));

const AND: &str = " AND ";

/// One equality predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
    /// `true` renders the value verbatim (UUID or numeric key literal).
    pub is_identifier: bool,
}

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, is_identifier: bool) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            is_identifier,
        }
    }

    /// Renders `field = value` or `field = 'value'`.
    pub fn render(&self) -> String {
        fragment(&self.field, &self.literal())
    }

    /// Renders only the right-hand side of the predicate.
    pub fn literal(&self) -> String {
        let text = literal_text(&self.value);
        if self.is_identifier {
            text
        } else {
            format!("'{}'", text.replace('\'', "''"))
        }
    }

    /// Evaluates the predicate against one record.
    ///
    /// Missing fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.field) {
            Some(stored) => literal_text(stored) == literal_text(&self.value),
            None => false,
        }
    }
}

/// Ordered AND-combined filter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    filters: Vec<Filter>,
}

impl QueryOptions {
    /// Creates a single-filter option set.
    pub fn new(field: impl Into<String>, value: impl Into<Value>, is_identifier: bool) -> Self {
        Self {
            filters: vec![Filter::new(field, value, is_identifier)],
        }
    }

    /// Creates an option set with no predicate.
    pub fn none() -> Self {
        Self::default()
    }

    /// Appends a filter in place.
    ///
    /// Repeated fields are kept; stacking filters only narrows results.
    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        is_identifier: bool,
    ) -> &mut Self {
        self.filters.push(Filter::new(field, value, is_identifier));
        self
    }

    /// Builder form of `add_filter`.
    pub fn with_filter(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        is_identifier: bool,
    ) -> Self {
        self.add_filter(field, value, is_identifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Renders every filter as a literal fragment joined by `AND`.
    ///
    /// Returns `None` when there is nothing to render.
    pub fn render(&self) -> Option<String> {
        self.render_with(Filter::literal)
    }

    /// Renders with a caller-provided right-hand side.
    ///
    /// Used by translators that bind values instead of inlining them; the
    /// fragment shape, order and joining stay identical to `render`.
    pub fn render_with<'a, F>(&'a self, mut rhs: F) -> Option<String>
    where
        F: FnMut(&'a Filter) -> String,
    {
        if self.filters.is_empty() {
            return None;
        }
        let fragments = self
            .filters
            .iter()
            .map(|filter| fragment(&filter.field, &rhs(filter)))
            .collect::<Vec<_>>();
        Some(fragments.join(AND))
    }

    /// Renders `field = ?N` placeholders starting after `bound_before`
    /// already-bound parameters, returning the filters to bind in order.
    ///
    /// Filters come back whole so binders can honor `is_identifier`.
    pub fn render_placeholders(&self, bound_before: usize) -> Option<(String, Vec<&Filter>)> {
        let mut bound = Vec::with_capacity(self.filters.len());
        let clause = self.render_with(|filter| {
            bound.push(filter);
            format!("?{}", bound_before + bound.len())
        })?;
        Some((clause, bound))
    }

    /// Evaluates all filters client-side. An empty set matches everything.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }

    /// Rejects field names that cannot be expressed in query syntax.
    pub fn validate(&self) -> StoreResult<()> {
        for filter in &self.filters {
            validate_name(&filter.field)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a QueryOptions {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}

impl From<Filter> for QueryOptions {
    fn from(value: Filter) -> Self {
        Self {
            filters: vec![value],
        }
    }
}

/// Validates a collection or field name.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidField(name.to_string()))
    }
}

fn fragment(field: &str, rhs: &str) -> String {
    format!("{field} = {rhs}")
}

/// Text form of a JSON value as it appears inside a query literal.
pub(crate) fn literal_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
