mod common;

use serde_json::{json, Value};
use skillmatrix_core::model::{Link, LinkKind, TeamMember, LINKS, REVIEWS, SKILLS};
use skillmatrix_core::store::filesystem::FilesystemConnector;
use skillmatrix_core::store::relational::Relationship;
use skillmatrix_core::{preload_relations, DataAccess, DataAccessExt, ErrorKind};

#[test]
fn attaches_nested_relations() {
    let store = common::relational();
    let skill = common::save_skill(&store, "Rust");
    let other = common::save_skill(&store, "Go");
    let ada = common::save_member(&store, "Ada");
    let grace = common::save_member(&store, "Grace");
    common::save_review(&store, &skill, &ada);
    common::save_review(&store, &skill, &grace);
    let link = Link::new(
        skill.id,
        "Rustonomicon",
        "https://doc.rust-lang.org/nomicon/",
        LinkKind::Documentation,
    );
    store.save_as(LINKS, &link.id.to_string(), &link).unwrap();

    let mut records = store.read_all(SKILLS).unwrap();
    let report = preload_relations(&store, SKILLS, &mut records, &["reviews.author", "links"]);
    assert!(report.is_complete());
    assert_eq!(report.attached, 4);

    let rust = records
        .iter()
        .find(|record| record.get_str("id") == Some(skill.id.to_string().as_str()))
        .unwrap();
    let reviews = rust.get("reviews").and_then(Value::as_array).unwrap();
    assert_eq!(reviews.len(), 2);
    let mut authors = reviews
        .iter()
        .map(|review| review["author"]["name"].as_str().unwrap())
        .collect::<Vec<_>>();
    authors.sort_unstable();
    assert_eq!(authors, vec!["Ada", "Grace"]);
    assert_eq!(rust.get("links").unwrap()[0]["title"], json!("Rustonomicon"));

    let go = records
        .iter()
        .find(|record| record.get_str("id") == Some(other.id.to_string().as_str()))
        .unwrap();
    assert_eq!(go.get("reviews"), Some(&json!([])));
}

#[test]
fn failed_relations_are_left_empty_and_reported() {
    let store = common::relational().with_relationship(Relationship::belongs_to(
        REVIEWS,
        "mentor",
        "mentors",
        "author_id",
    ));
    let skill = common::save_skill(&store, "Rust");
    let author = common::save_member(&store, "Ada");
    common::save_review(&store, &skill, &author);

    let mut skills = store.read_all(SKILLS).unwrap();
    let report = preload_relations(&store, SKILLS, &mut skills, &["reviews", "endorsements"]);
    assert_eq!(report.attached, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].relation, "endorsements");
    assert_eq!(skills[0].get("endorsements"), Some(&json!([])));
    assert_eq!(
        skills[0]
            .get("reviews")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );

    let mut reviews = store.read_all(REVIEWS).unwrap();
    let report = preload_relations(&store, REVIEWS, &mut reviews, &["mentor", "author"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Storage);
    assert_eq!(reviews[0].get("mentor"), Some(&Value::Null));
    assert_eq!(reviews[0].get("author").unwrap()["name"], json!("Ada"));
}

#[test]
fn one_dangling_nested_reference_only_empties_that_child() {
    let store = common::relational();
    let skill = common::save_skill(&store, "Rust");
    let ada = common::save_member(&store, "Ada");
    let departed = TeamMember::new("Departed", "Contractor");
    let kept = common::save_review(&store, &skill, &ada);
    let orphan = common::save_review(&store, &skill, &departed);

    let mut skills = store.read_all(SKILLS).unwrap();
    let report = preload_relations(&store, SKILLS, &mut skills, &["reviews.author", "links"]);

    assert_eq!(report.attached, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].record_index, 0);
    assert_eq!(report.failures[0].relation, "reviews.author");
    assert_eq!(report.failures[0].error.kind(), ErrorKind::NotFound);

    let reviews = skills[0].get("reviews").and_then(Value::as_array).unwrap();
    assert_eq!(reviews.len(), 2);
    let review = |id: String| {
        reviews
            .iter()
            .find(|review| review["id"] == json!(id))
            .unwrap()
    };
    assert_eq!(review(kept.id.to_string())["author"]["name"], json!("Ada"));
    assert_eq!(review(orphan.id.to_string())["author"], Value::Null);
    assert_eq!(skills[0].get("links"), Some(&json!([])));
}

#[test]
fn connector_preload_keeps_siblings_of_a_dangling_child() {
    let store = common::relational();
    let skill = common::save_skill(&store, "Rust");
    let ada = common::save_member(&store, "Ada");
    common::save_review(&store, &skill, &ada);
    common::save_review(&store, &skill, &TeamMember::new("Departed", "Contractor"));

    let mut record = store.read_all(SKILLS).unwrap().remove(0);
    store.preload(SKILLS, &mut record, "reviews.author").unwrap();

    let reviews = record.get("reviews").and_then(Value::as_array).unwrap();
    assert_eq!(reviews.len(), 2);
    let authors = reviews
        .iter()
        .filter(|review| !review["author"].is_null())
        .count();
    assert_eq!(authors, 1);
}

#[test]
fn backends_without_eager_loading_leave_every_relation_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemConnector::connect(dir.path()).unwrap();
    assert!(!store.capabilities().eager_load);
    common::save_skill(&store, "Rust");

    let mut records = store.read_all(SKILLS).unwrap();
    let report = preload_relations(&store, SKILLS, &mut records, &["reviews"]);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("reviews"), Some(&json!([])));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].error.kind(),
        ErrorKind::UnsupportedOperation
    );
}
