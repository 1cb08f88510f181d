//! Integration tests for bulk updates and deletes.

use dataquery_core::config::QueryConfig;
use dataquery_core::types::{ComparisonOp, FieldPredicate, PredicateGroup};
use dataquery_entity::Member;
use dataquery_query::{literal, CriteriaQuery, Params, QueryOptions, Repository};

use crate::helpers::TestApp;

fn keep_context_repository(config: &QueryConfig) -> Repository<Member> {
    Repository::<Member>::builder(config)
        .criteria(
            "bulkAgePlusKeep",
            CriteriaQuery::update()
                .increment("age", literal(1))
                .filter(PredicateGroup::new(FieldPredicate::param(
                    "age",
                    ComparisonOp::Gte,
                    "age",
                ))),
            QueryOptions::new().clear_automatically(false),
        )
        .derived("findByUsername")
        .derived("deleteByAge")
        .build()
        .expect("Failed to build repository")
}

#[tokio::test]
async fn test_bulk_update_clears_context() {
    let app = TestApp::new();
    let repo = app.repos.members.repository();
    let mut session = app.session().await;
    for (username, age) in [
        ("member1", 10),
        ("member2", 19),
        ("member3", 20),
        ("member4", 21),
        ("member5", 40),
    ] {
        repo.save(&mut session, Member::with_age(username, age))
            .await
            .unwrap();
    }
    assert_eq!(session.context().len(), 5);

    let affected = app.repos.members.bulk_age_plus(&mut session, 20).await.unwrap();
    assert_eq!(affected, 3);
    assert!(session.context().is_empty());

    let member5 = app
        .repos
        .members
        .find_member_by_username(&mut session, "member5")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member5.age, 41);

    let member2 = app
        .repos
        .members
        .find_member_by_username(&mut session, "member2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member2.age, 19);
}

#[tokio::test]
async fn test_bulk_update_without_clear_serves_stale_state() {
    let app = TestApp::new();
    let repo = keep_context_repository(&app.config);
    let mut session = app.session().await;
    repo.save(&mut session, Member::with_age("member5", 40))
        .await
        .unwrap();

    let params = Params::new().with("age", 20);
    assert_eq!(
        repo.execute_bulk(&mut session, "bulkAgePlusKeep", &params)
            .await
            .unwrap(),
        1
    );
    assert_eq!(session.context().len(), 1);

    let by_username = Params::new().with("username", "member5");
    let stale: Vec<Member> = repo
        .find_list(&mut session, "findByUsername", &by_username)
        .await
        .unwrap();
    assert_eq!(stale[0].age, 40, "known state wins until the context is cleared");

    session.clear();
    let fresh: Vec<Member> = repo
        .find_list(&mut session, "findByUsername", &by_username)
        .await
        .unwrap();
    assert_eq!(fresh[0].age, 41);
}

#[tokio::test]
async fn test_clear_after_bulk_config_applies_without_override() {
    let config = QueryConfig {
        clear_after_bulk: true,
        ..QueryConfig::default()
    };
    let app = TestApp::with_config(config);
    let repo = keep_context_repository(&app.config);
    let mut session = app.session().await;
    repo.save(&mut session, Member::with_age("member1", 30))
        .await
        .unwrap();
    repo.save(&mut session, Member::with_age("member2", 30))
        .await
        .unwrap();

    let removed = repo
        .execute_bulk(&mut session, "deleteByAge", &Params::new().with("age", 30))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(session.context().is_empty());
    assert_eq!(repo.count(&mut session).await.unwrap(), 0);
}

#[tokio::test]
async fn test_derived_delete_keeps_context_by_default() {
    let app = TestApp::new();
    let repo = keep_context_repository(&app.config);
    app.create_members(&[("member1", 30), ("member2", 31)]).await;
    let mut session = app.session().await;
    repo.find_all(&mut session).await.unwrap();
    assert_eq!(session.context().len(), 2);

    let removed = repo
        .execute_bulk(&mut session, "deleteByAge", &Params::new().with("age", 30))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(session.context().len(), 2);
    assert_eq!(repo.count(&mut session).await.unwrap(), 1);
}
