//! Reference links attached to a skill.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_id, require_non_empty, EntityId, ModelValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Documentation,
    Tutorial,
    Video,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: EntityId,
    pub skill_id: EntityId,
    pub title: String,
    pub url: String,
    pub kind: LinkKind,
}

impl Link {
    pub fn new(
        skill_id: EntityId,
        title: impl Into<String>,
        url: impl Into<String>,
        kind: LinkKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            skill_id,
            title: title.into(),
            url: url.into(),
            kind,
        }
    }

    /// # Errors
    /// - `InvalidUrl` unless `url` is an absolute `http`/`https` URL with a host.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id(self.id)?;
        require_id(self.skill_id)?;
        require_non_empty("title", &self.title)?;
        if is_web_url(&self.url) {
            Ok(())
        } else {
            Err(ModelValidationError::InvalidUrl(self.url.clone()))
        }
    }
}

fn is_web_url(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once("://") else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    matches!(scheme, "http" | "https") && !host.is_empty() && !host.contains(char::is_whitespace)
}
