//! Per-member skill rating (association between a member and a skill).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::views::MemberSkillView;
use super::{require_id, EntityId, ModelValidationError, Rating, MEMBER_SKILLS};
use crate::join::{Association, Named};
use crate::model::{Skill, TeamMember};

/// How well a member knows a skill, and whether they want to grow in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSkill {
    pub id: EntityId,
    pub member_id: EntityId,
    pub skill_id: EntityId,
    pub level: Rating,
    /// Member wants to learn or deepen this skill.
    pub desired: bool,
}

impl MemberSkill {
    /// Creates an association with `level` clamped into `[0, 5]`.
    pub fn new(member_id: EntityId, skill_id: EntityId, level: i64, desired: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            skill_id,
            level: Rating::new(level),
            desired,
        }
    }

    pub fn set_level(&mut self, level: i64) {
        self.level.set(level);
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id(self.id)?;
        require_id(self.member_id)?;
        require_id(self.skill_id)
    }
}

impl Association for MemberSkill {
    const COLLECTION: &'static str = MEMBER_SKILLS;

    type Subject = TeamMember;
    type Target = Skill;
    type View = MemberSkillView;

    fn id(&self) -> EntityId {
        self.id
    }

    fn subject_id(&self) -> EntityId {
        self.member_id
    }

    fn target_id(&self) -> EntityId {
        self.skill_id
    }

    fn denormalize(self, member: &TeamMember, skill: &Skill) -> MemberSkillView {
        MemberSkillView {
            id: self.id,
            member_id: self.member_id,
            member_name: member.display_name().to_string(),
            skill_id: self.skill_id,
            skill_name: skill.display_name().to_string(),
            level: self.level,
            desired: self.desired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemberSkill;
    use uuid::Uuid;

    #[test]
    fn level_is_clamped_on_construction_and_update() {
        let mut association = MemberSkill::new(Uuid::new_v4(), Uuid::new_v4(), 9000, false);
        assert_eq!(association.level.get(), 5);

        association.set_level(-9000);
        assert_eq!(association.level.get(), 0);
    }
}
