//! Skill entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_id, require_non_empty, EntityId, ModelValidationError, SKILLS};
use crate::join::Named;

/// A skill listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Broad grouping such as `backend` or `design`.
    pub domain: String,
    /// Public URL of the uploaded icon, if any.
    pub icon_url: Option<String>,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            domain: domain.into(),
            icon_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id(self.id)?;
        require_non_empty("name", &self.name)?;
        require_non_empty("domain", &self.domain)
    }
}

impl Named for Skill {
    const COLLECTION: &'static str = SKILLS;

    fn display_name(&self) -> &str {
        &self.name
    }
}
