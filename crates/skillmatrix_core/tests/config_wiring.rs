mod common;

use std::fs;
use std::sync::Arc;

use skillmatrix_core::config::PrimaryBackend;
use skillmatrix_core::model::{Skill, SKILLS, SKILL_ICONS};
use skillmatrix_core::store::wide_column::CqlSession;
use skillmatrix_core::{
    connect_object_store, connect_primary, connect_primary_with_session, AppConfig, BackendKind,
    ConfigError, DataAccessExt, ErrorKind, QueryOptions,
};

#[test]
fn relational_primary_is_provisioned_and_wired() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.sql");
    fs::write(&schema_path, common::SCHEMA).unwrap();
    let config_path = dir.path().join("skillmatrix.json");
    let config = serde_json::json!({
        "primary": "relational",
        "relational": {
            "path": dir.path().join("skills.db"),
            "schema": schema_path,
            "relationships": [
                {
                    "parent": "skills",
                    "name": "reviews",
                    "kind": "has_many",
                    "collection": "reviews",
                    "foreign_key": "skill_id"
                }
            ]
        },
        "object_store": {
            "root": dir.path().join("blobs"),
            "bucket": "team-assets",
            "host": "cdn.example"
        }
    });
    fs::write(&config_path, config.to_string()).unwrap();

    let config = AppConfig::load(&config_path).unwrap();
    assert_eq!(config.primary, PrimaryBackend::Relational);

    let store = connect_primary(&config).unwrap();
    assert_eq!(store.backend(), BackendKind::Relational);
    assert!(store.relationship(SKILLS, "reviews").is_some());

    let skill = Skill::new("Rust", "Systems", "backend");
    store
        .save_as(SKILLS, &skill.id.to_string(), &skill)
        .unwrap();
    let loaded: Skill = store
        .read_as(SKILLS, &skill.id.to_string(), &QueryOptions::none())
        .unwrap();
    assert_eq!(loaded, skill);

    let objects = connect_object_store(&config).unwrap().unwrap();
    let url = objects.upload(SKILL_ICONS, "rust", b"<svg/>").unwrap();
    assert_eq!(url, "https://cdn.example/team-assets/skill_icons/rust");
    assert!(dir
        .path()
        .join("blobs/team-assets/skill_icons/rust")
        .is_file());
}

#[test]
fn filesystem_primary_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::from_json(&format!(
        r#"{{ "filesystem": {{ "root": {} }} }}"#,
        serde_json::to_string(dir.path()).unwrap()
    ))
    .unwrap();

    let store = connect_primary(&config).unwrap();
    assert_eq!(store.backend(), BackendKind::Filesystem);
    assert!(connect_object_store(&config).unwrap().is_none());
}

#[test]
fn wide_column_primary_uses_the_supplied_session() {
    let config = AppConfig::from_json(&format!(
        r#"{{ "primary": "wide_column", "wide_column": {{ "keyspace": "{}" }} }}"#,
        common::KEYSPACE
    ))
    .unwrap();
    assert_eq!(config.primary, PrimaryBackend::WideColumn);

    let err = connect_primary(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let (session, _) = common::wide_column();
    let session: Arc<dyn CqlSession> = session;
    let store = connect_primary_with_session(&config, Some(session)).unwrap();
    assert_eq!(store.backend(), BackendKind::WideColumn);

    let skill = Skill::new("Rust", "Systems", "backend");
    store
        .save_as(SKILLS, &skill.id.to_string(), &skill)
        .unwrap();
    let loaded: Skill = store
        .read_as(SKILLS, &skill.id.to_string(), &QueryOptions::none())
        .unwrap();
    assert_eq!(loaded, skill);
}

#[test]
fn load_reports_io_and_parse_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = AppConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let malformed_path = dir.path().join("broken.json");
    fs::write(&malformed_path, "{ primary: ").unwrap();
    let malformed = AppConfig::load(&malformed_path).unwrap_err();
    assert!(matches!(malformed, ConfigError::Parse(_)));

    let invalid = AppConfig::from_json(
        r#"{ "object_store": { "root": "/tmp", "bucket": " ", "host": "cdn" } }"#,
    )
    .unwrap_err();
    assert!(matches!(invalid, ConfigError::Invalid(_)));
}
