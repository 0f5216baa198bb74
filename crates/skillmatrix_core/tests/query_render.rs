use serde_json::json;
use skillmatrix_core::{ErrorKind, Filter, QueryOptions, Record};

const MEMBER_ID: &str = "6f1c6b9e-0f53-4a43-9d8f-3c2b3f3b2a10";

#[test]
fn one_fragment_per_filter_in_append_order() {
    let mut options = QueryOptions::new("member_id", MEMBER_ID, true);
    options.add_filter("domain", "backend", false);
    options.add_filter("level", 3, true);

    assert_eq!(
        options.render().unwrap(),
        format!("member_id = {MEMBER_ID} AND domain = 'backend' AND level = 3")
    );
    assert_eq!(options.len(), 3);
}

#[test]
fn empty_options_render_no_predicate() {
    let options = QueryOptions::none();
    assert!(options.is_empty());
    assert_eq!(options.render(), None);
    assert_eq!(options.render_placeholders(0), None);
}

#[test]
fn identifier_flag_alone_decides_quoting() {
    assert_eq!(Filter::new("id", "abc", true).render(), "id = abc");
    assert_eq!(Filter::new("id", "abc", false).render(), "id = 'abc'");
    assert_eq!(Filter::new("level", 4, false).render(), "level = '4'");
    assert_eq!(
        Filter::new("name", "O'Reilly", false).render(),
        "name = 'O''Reilly'"
    );
}

#[test]
fn repeated_fields_are_kept_and_narrow() {
    let options = QueryOptions::new("domain", "backend", false).with_filter(
        "domain",
        "frontend",
        false,
    );
    assert_eq!(
        options.render().unwrap(),
        "domain = 'backend' AND domain = 'frontend'"
    );

    let record = Record::try_from(json!({ "domain": "backend" })).unwrap();
    assert!(!options.matches(&record));
}

#[test]
fn placeholders_follow_the_same_shape() {
    let options = QueryOptions::new("skill_id", MEMBER_ID, true).with_filter("desired", true, true);

    let (clause, bound) = options.render_placeholders(1).unwrap();
    assert_eq!(clause, "skill_id = ?2 AND desired = ?3");
    assert_eq!(bound, vec![&options.filters()[0], &options.filters()[1]]);
    assert_eq!(bound[1].value, json!(true));
}

#[test]
fn client_side_matching_compares_literal_text() {
    let record = Record::try_from(json!({
        "member_id": MEMBER_ID,
        "level": 4,
        "desired": true
    }))
    .unwrap();

    assert!(QueryOptions::new("member_id", MEMBER_ID, true).matches(&record));
    assert!(QueryOptions::new("level", 4, true).matches(&record));
    assert!(QueryOptions::new("level", "4", false).matches(&record));
    assert!(!QueryOptions::new("missing", "x", false).matches(&record));
    assert!(QueryOptions::none().matches(&record));
}

#[test]
fn malformed_field_names_are_rejected() {
    let err = QueryOptions::new("name; DROP TABLE skills", "x", false)
        .validate()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);

    assert!(QueryOptions::new("", "x", false).validate().is_err());
    assert!(QueryOptions::new("skill_id", "x", false).validate().is_ok());
}
