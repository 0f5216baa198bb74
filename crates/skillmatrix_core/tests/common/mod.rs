#![allow(dead_code)]

use std::sync::Arc;

use skillmatrix_core::model::{MemberSkill, Review, Skill, TeamMember};
use skillmatrix_core::model::{LINKS, MEMBERS, MEMBER_SKILLS, REVIEWS, SKILLS};
use skillmatrix_core::store::relational::{RelationalConnector, Relationship};
use skillmatrix_core::store::wide_column::{MemoryCqlSession, WideColumnConnector};
use skillmatrix_core::{DataAccess, DataAccessExt};

pub const SCHEMA: &str = "
CREATE TABLE skills (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    domain TEXT NOT NULL,
    icon_url TEXT
);
CREATE TABLE members (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    title TEXT NOT NULL,
    photo_url TEXT
);
CREATE TABLE member_skills (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL,
    skill_id TEXT NOT NULL,
    level INTEGER NOT NULL,
    desired BOOLEAN NOT NULL
);
CREATE TABLE reviews (
    id TEXT PRIMARY KEY,
    skill_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    body TEXT NOT NULL,
    rating INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE links (
    id TEXT PRIMARY KEY,
    skill_id TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    kind TEXT NOT NULL
);
";

pub const KEYSPACE: &str = "skills_ks";

pub fn relational() -> RelationalConnector {
    let connector = RelationalConnector::connect_in_memory().unwrap();
    connector.provision(SCHEMA).unwrap();
    connector
        .with_relationship(Relationship::has_many(SKILLS, "reviews", REVIEWS, "skill_id"))
        .with_relationship(Relationship::has_many(SKILLS, "links", LINKS, "skill_id"))
        .with_relationship(Relationship::belongs_to(REVIEWS, "author", MEMBERS, "author_id"))
}

pub fn wide_column() -> (Arc<MemoryCqlSession>, WideColumnConnector) {
    let session = Arc::new(MemoryCqlSession::new());
    session.create_keyspace(KEYSPACE);
    for table in [SKILLS, MEMBERS, MEMBER_SKILLS, REVIEWS, LINKS] {
        session.create_table(KEYSPACE, table, "id");
    }
    let connector = WideColumnConnector::connect(session.clone(), KEYSPACE).unwrap();
    (session, connector)
}

pub fn save_skill(store: &dyn DataAccess, name: &str) -> Skill {
    let skill = Skill::new(name, format!("{name} in practice"), "engineering");
    store.save_as(SKILLS, &skill.id.to_string(), &skill).unwrap();
    skill
}

pub fn save_member(store: &dyn DataAccess, name: &str) -> TeamMember {
    let member = TeamMember::new(name, "Engineer");
    store.save_as(MEMBERS, &member.id.to_string(), &member).unwrap();
    member
}

pub fn save_member_skill(
    store: &dyn DataAccess,
    member: &TeamMember,
    skill: &Skill,
    level: i64,
) -> MemberSkill {
    let association = MemberSkill::new(member.id, skill.id, level, false);
    store
        .save_as(MEMBER_SKILLS, &association.id.to_string(), &association)
        .unwrap();
    association
}

pub fn save_review(store: &dyn DataAccess, skill: &Skill, author: &TeamMember) -> Review {
    let review = Review::new(skill.id, author.id, "Solid fundamentals", 4, 1_700_000_000_000);
    store.save_as(REVIEWS, &review.id.to_string(), &review).unwrap();
    review
}
