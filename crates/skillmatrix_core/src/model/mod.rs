//! Domain model for the skills directory.
//!
//! # Responsibility
//! - Define the entities controllers persist through `DataAccess`.
//! - Define the read-only denormalized views built by the join resolver.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID used as its storage key.
//! - Ratings are clamped into `[0, 5]`, never rejected.
//! - Views are derived per request and never persisted.
//!
//! # See also
//! - `crate::join` for how views are assembled.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod icon;
pub mod link;
pub mod member;
pub mod member_skill;
pub mod rating;
pub mod review;
pub mod skill;
pub mod views;

pub use icon::{validate_icon, IconFormat, ICON_MAX_BYTES};
pub use link::{Link, LinkKind};
pub use member::TeamMember;
pub use member_skill::MemberSkill;
pub use rating::Rating;
pub use review::Review;
pub use skill::Skill;
pub use views::{MemberSkillView, ReviewView};

/// Stable identifier shared by every entity.
pub type EntityId = uuid::Uuid;

/// Collection holding `Skill` records.
pub const SKILLS: &str = "skills";
/// Collection holding `TeamMember` records.
pub const MEMBERS: &str = "members";
/// Collection holding `MemberSkill` association records.
pub const MEMBER_SKILLS: &str = "member_skills";
/// Collection holding `Review` records.
pub const REVIEWS: &str = "reviews";
/// Collection holding `Link` records.
pub const LINKS: &str = "links";
/// Object-store namespace for uploaded skill icons.
pub const SKILL_ICONS: &str = "skill_icons";

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    NilId,
    EmptyField(&'static str),
    InvalidUrl(String),
    EmptyIcon,
    IconTooLarge { size: usize, max: usize },
    UnsupportedIconFormat,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be nil"),
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::InvalidUrl(value) => write!(f, "invalid url: `{value}`"),
            Self::EmptyIcon => write!(f, "icon must not be empty"),
            Self::IconTooLarge { size, max } => {
                write!(f, "icon is {size} bytes; at most {max} bytes are allowed")
            }
            Self::UnsupportedIconFormat => write!(f, "icon must be png, jpeg, gif or svg"),
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_non_empty(
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        Err(ModelValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

pub(crate) fn require_id(id: EntityId) -> Result<(), ModelValidationError> {
    if id.is_nil() {
        Err(ModelValidationError::NilId)
    } else {
        Ok(())
    }
}
