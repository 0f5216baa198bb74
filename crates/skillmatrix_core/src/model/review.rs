//! Skill review written by a team member.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::views::ReviewView;
use super::{require_id, require_non_empty, EntityId, ModelValidationError, Rating, REVIEWS};
use crate::join::{Association, Named};
use crate::model::{Skill, TeamMember};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: EntityId,
    pub skill_id: EntityId,
    pub author_id: EntityId,
    pub body: String,
    pub rating: Rating,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Review {
    pub fn new(
        skill_id: EntityId,
        author_id: EntityId,
        body: impl Into<String>,
        rating: i64,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            skill_id,
            author_id,
            body: body.into(),
            rating: Rating::new(rating),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id(self.id)?;
        require_id(self.skill_id)?;
        require_id(self.author_id)?;
        require_non_empty("body", &self.body)
    }
}

impl Association for Review {
    const COLLECTION: &'static str = REVIEWS;

    type Subject = Skill;
    type Target = TeamMember;
    type View = ReviewView;

    fn id(&self) -> EntityId {
        self.id
    }

    fn subject_id(&self) -> EntityId {
        self.skill_id
    }

    fn target_id(&self) -> EntityId {
        self.author_id
    }

    fn denormalize(self, skill: &Skill, author: &TeamMember) -> ReviewView {
        ReviewView {
            id: self.id,
            skill_id: self.skill_id,
            skill_name: skill.display_name().to_string(),
            author_id: self.author_id,
            author_name: author.display_name().to_string(),
            body: self.body,
            rating: self.rating,
            created_at: self.created_at,
        }
    }
}
