mod common;

use skillmatrix_core::model::{MemberSkill, MEMBER_SKILLS};
use skillmatrix_core::store::filesystem::FilesystemConnector;
use skillmatrix_core::{DataAccess, DataAccessExt, QueryOptions};

fn seed(store: &dyn DataAccess) -> MemberSkill {
    let member = common::save_member(store, "Ada");
    let skill = common::save_skill(store, "Rust");
    let association = MemberSkill::new(member.id, skill.id, 4, true);
    store
        .save_as(MEMBER_SKILLS, &association.id.to_string(), &association)
        .unwrap();
    association
}

fn count(store: &dyn DataAccess, options: &QueryOptions) -> usize {
    store.filtered_read_all(MEMBER_SKILLS, options).unwrap().len()
}

#[test]
fn every_backend_agrees_on_text_and_identifier_filters() {
    let dir = tempfile::tempdir().unwrap();
    let filesystem = FilesystemConnector::connect(dir.path()).unwrap();
    let relational = common::relational();
    let (_session, wide_column) = common::wide_column();
    let stores: [&dyn DataAccess; 3] = [&filesystem, &relational, &wide_column];

    for store in stores {
        let association = seed(store);
        let cases = [
            (QueryOptions::new("desired", "true", false), 1),
            (QueryOptions::new("desired", true, true), 1),
            (QueryOptions::new("desired", "false", false), 0),
            (QueryOptions::new("desired", "yes", false), 0),
            (QueryOptions::new("level", "4", false), 1),
            (QueryOptions::new("level", 4, true), 1),
            (QueryOptions::new("level", "5", false), 0),
            (
                QueryOptions::new("member_id", association.member_id.to_string(), true)
                    .with_filter("desired", "true", false),
                1,
            ),
        ];
        for (options, expected) in cases {
            assert_eq!(
                count(store, &options),
                expected,
                "backend={} filter={:?}",
                store.backend().as_str(),
                options.render()
            );
        }
    }
}

#[test]
fn keyed_reads_apply_text_filters_the_same_way() {
    let relational = common::relational();
    let association = seed(&relational);
    let key = association.id.to_string();

    let hit: MemberSkill = relational
        .read_as(MEMBER_SKILLS, &key, &QueryOptions::new("desired", "true", false))
        .unwrap();
    assert_eq!(hit, association);

    let miss = relational
        .read(MEMBER_SKILLS, &key, &QueryOptions::new("desired", "false", false))
        .unwrap_err();
    assert!(miss.is_not_found());
}
