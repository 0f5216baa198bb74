//! Team member entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_id, require_non_empty, EntityId, ModelValidationError, MEMBERS};
use crate::join::Named;

/// A person whose skills are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: EntityId,
    pub name: String,
    pub title: String,
    pub photo_url: Option<String>,
}

impl TeamMember {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            title: title.into(),
            photo_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id(self.id)?;
        require_non_empty("name", &self.name)
    }
}

impl Named for TeamMember {
    const COLLECTION: &'static str = MEMBERS;

    fn display_name(&self) -> &str {
        &self.name
    }
}
