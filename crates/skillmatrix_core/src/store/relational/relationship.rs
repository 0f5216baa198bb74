//! Declared relationships used for eager loading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Direction of a declared relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Children whose `foreign_key` equals the parent's key.
    HasMany,
    /// One target whose key equals the parent's `foreign_key` value.
    BelongsTo,
}

/// A named association between two collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Collection that owns the relationship.
    pub parent: String,
    /// Field name the loaded value is attached under.
    pub name: String,
    pub kind: RelationshipKind,
    /// Collection holding the related records.
    pub collection: String,
    pub foreign_key: String,
}

impl Relationship {
    pub fn has_many(
        parent: impl Into<String>,
        name: impl Into<String>,
        collection: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
            kind: RelationshipKind::HasMany,
            collection: collection.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn belongs_to(
        parent: impl Into<String>,
        name: impl Into<String>,
        collection: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
            kind: RelationshipKind::BelongsTo,
            collection: collection.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Relationship registry keyed by `(parent collection, name)`.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    declared: BTreeMap<(String, String), Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a relationship, replacing any previous one with the same name.
    pub fn declare(&mut self, relationship: Relationship) {
        self.declared.insert(
            (relationship.parent.clone(), relationship.name.clone()),
            relationship,
        );
    }

    /// Looks up a relationship by exact parent collection and name.
    pub fn get(&self, parent: &str, name: &str) -> Option<&Relationship> {
        self.declared.get(&(parent.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

impl FromIterator<Relationship> for Relationships {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut relationships = Self::new();
        for relationship in iter {
            relationships.declare(relationship);
        }
        relationships
    }
}

#[cfg(test)]
mod tests {
    use super::{Relationship, RelationshipKind, Relationships};

    #[test]
    fn lookup_requires_exact_parent_and_name() {
        let relationships: Relationships = [
            Relationship::has_many("skills", "reviews", "reviews", "skill_id"),
            Relationship::belongs_to("reviews", "author", "members", "author_id"),
        ]
        .into_iter()
        .collect();

        assert_eq!(relationships.len(), 2);
        let author = relationships.get("reviews", "author").unwrap();
        assert_eq!(author.kind, RelationshipKind::BelongsTo);
        assert!(relationships.get("skills", "Reviews").is_none());
        assert!(relationships.get("members", "reviews").is_none());
    }
}
