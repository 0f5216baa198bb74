//! Denormalized read models. Built per request, never persisted.

use serde::Serialize;

use super::{EntityId, Rating};

/// `MemberSkill` with both ends resolved to display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSkillView {
    pub id: EntityId,
    pub member_id: EntityId,
    pub member_name: String,
    pub skill_id: EntityId,
    pub skill_name: String,
    pub level: Rating,
    pub desired: bool,
}

/// `Review` with its skill and author resolved to display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub id: EntityId,
    pub skill_id: EntityId,
    pub skill_name: String,
    pub author_id: EntityId,
    pub author_name: String,
    pub body: String,
    pub rating: Rating,
    pub created_at: i64,
}
