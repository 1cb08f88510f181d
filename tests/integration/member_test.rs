//! Integration tests for member CRUD and derived queries.

use dataquery_core::error::ErrorKind;
use dataquery_entity::Member;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_save_and_find_by_id() {
    let app = TestApp::new();
    let repo = app.repos.members.repository();
    let mut session = app.session().await;

    let saved = repo
        .save(&mut session, Member::new("memberA"))
        .await
        .unwrap();
    let id = saved.id.expect("generated id");

    let before = app.statements();
    let cached = repo.find_by_id(&mut session, id).await.unwrap().unwrap();
    assert_eq!(app.statements(), before, "known entity must not hit the store");
    assert_eq!(cached, saved);

    let mut fresh = app.session().await;
    let loaded = repo.find_by_id(&mut fresh, id).await.unwrap().unwrap();
    assert_eq!(app.statements(), before + 1);
    assert_eq!(loaded.username, "memberA");
}

#[tokio::test]
async fn test_basic_crud() {
    let app = TestApp::new();
    let repo = app.repos.members.repository();
    let members = app.create_members(&[("member1", 0), ("member2", 0)]).await;
    let mut session = app.session().await;

    assert_eq!(repo.find_all(&mut session).await.unwrap().len(), 2);
    assert_eq!(repo.count(&mut session).await.unwrap(), 2);
    assert!(repo.exists_by_id(&mut session, members[0].id).await.unwrap());

    repo.delete(&mut session, &members[0]).await.unwrap();
    assert!(repo.delete_by_id(&mut session, members[1].id).await.unwrap());
    assert!(!repo.delete_by_id(&mut session, members[1].id).await.unwrap());

    assert_eq!(repo.count(&mut session).await.unwrap(), 0);
    assert!(repo.find_by_id(&mut session, members[0].id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_existing_member() {
    let app = TestApp::new();
    let repo = app.repos.members.repository();
    let mut member = app.create_members(&[("member1", 10)]).await.remove(0);
    let mut session = app.session().await;

    member.age = 11;
    repo.save(&mut session, member.clone()).await.unwrap();

    let mut fresh = app.session().await;
    let loaded = repo.find_by_id(&mut fresh, member.id).await.unwrap().unwrap();
    assert_eq!(loaded.age, 11);
}

#[tokio::test]
async fn test_update_of_missing_member_is_not_found() {
    let app = TestApp::new();
    let mut session = app.session().await;
    let mut ghost = Member::with_age("ghost", 1);
    ghost.id = Some(999);

    let err = app
        .repos
        .members
        .repository()
        .save(&mut session, ghost)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_find_by_username_and_age_greater_than() {
    let app = TestApp::new();
    app.create_members(&[("AAA", 10), ("AAA", 20)]).await;
    let mut session = app.session().await;

    let result = app
        .repos
        .members
        .find_by_username_and_age_greater_than(&mut session, "AAA", 15)
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username, "AAA");
    assert_eq!(result[0].age, 20);
}

#[tokio::test]
async fn test_return_types() {
    let app = TestApp::new();
    app.create_members(&[("AAA", 10), ("BBB", 20)]).await;
    let members = &app.repos.members;
    let mut session = app.session().await;

    let list = members.find_list_by_username(&mut session, "AAA").await.unwrap();
    assert_eq!(list.len(), 1);

    let single = members
        .find_member_by_username(&mut session, "AAA")
        .await
        .unwrap();
    assert_eq!(single.map(|m| m.age), Some(10));

    let missing = members
        .find_optional_by_username(&mut session, "nobody")
        .await
        .unwrap();
    assert!(missing.is_none());

    let empty = members.find_list_by_username(&mut session, "nobody").await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_single_result_with_duplicates_fails() {
    let app = TestApp::new();
    app.create_members(&[("AAA", 10), ("AAA", 20)]).await;
    let mut session = app.session().await;

    let err = app
        .repos
        .members
        .find_optional_by_username(&mut session, "AAA")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncorrectResultSize);
    assert_eq!(err.descriptor.as_deref(), Some("findOptionalByUsername"));
}

#[tokio::test]
async fn test_count_and_exists() {
    let app = TestApp::new();
    app.create_members(&[("member1", 10), ("member2", 10), ("member3", 20)])
        .await;
    let members = &app.repos.members;
    let mut session = app.session().await;

    assert_eq!(members.count_by_age(&mut session, 10).await.unwrap(), 2);
    assert_eq!(members.count_by_age(&mut session, 30).await.unwrap(), 0);
    assert!(members.exists_by_username(&mut session, "member3").await.unwrap());
    assert!(!members.exists_by_username(&mut session, "member4").await.unwrap());
}

#[tokio::test]
async fn test_projections() {
    let app = TestApp::new();
    app.create_members(&[("m1", 0), ("m2", 0)]).await;
    let mut session = app.session().await;

    let result = app
        .repos
        .members
        .find_projections_by_username(&mut session, "m1")
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username(), "m1 0");
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let app = TestApp::new();
    let repo = app.repos.members.repository();

    let mut tx = app.begin().await;
    repo.save(&mut tx, Member::new("temp")).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = app.begin().await;
    repo.save(&mut tx, Member::new("kept")).await.unwrap();
    tx.commit().await.unwrap();

    let mut session = app.session().await;
    let all = repo.find_all(&mut session).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].username, "kept");
}
