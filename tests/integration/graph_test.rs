//! Integration tests for entity graphs, read-only queries and locking.

use dataquery_core::error::ErrorKind;
use dataquery_core::types::Value;

use crate::helpers::TestApp;

async fn two_teams(app: &TestApp) {
    let team_a = app.create_team("teamA").await;
    let team_b = app.create_team("teamB").await;
    app.create_member_in("member1", 10, &team_a).await;
    app.create_member_in("member2", 10, &team_b).await;
}

#[tokio::test]
async fn test_fetch_join_loads_teams_in_one_extra_statement() {
    let app = TestApp::new();
    two_teams(&app).await;
    let mut session = app.session().await;

    let before = app.statements();
    let members = app.repos.members.find_member_fetch_join(&mut session).await.unwrap();
    assert_eq!(app.statements(), before + 2);

    let names: Vec<&str> = members
        .iter()
        .map(|m| m.team().map(|t| t.name.as_str()).unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["teamA", "teamB"]);
}

#[tokio::test]
async fn test_plain_query_leaves_team_unloaded() {
    let app = TestApp::new();
    let team = app.create_team("teamA").await;
    app.create_member_in("member1", 10, &team).await;
    let mut session = app.session().await;

    let before = app.statements();
    let members = app
        .repos
        .members
        .find_list_by_username(&mut session, "member1")
        .await
        .unwrap();
    assert_eq!(app.statements(), before + 1);
    assert!(!members[0].team.is_loaded());
    assert_eq!(members[0].team.key(), Value::from(team.id));
}

#[tokio::test]
async fn test_find_all_uses_default_graph() {
    let app = TestApp::new();
    two_teams(&app).await;
    let mut session = app.session().await;

    let before = app.statements();
    let members = app.repos.members.repository().find_all(&mut session).await.unwrap();
    assert_eq!(app.statements(), before + 2);
    assert!(members.iter().all(|m| m.team.is_loaded()));
}

#[tokio::test]
async fn test_derived_query_with_entity_graph() {
    let app = TestApp::new();
    two_teams(&app).await;
    let mut session = app.session().await;

    let members = app
        .repos
        .members
        .find_entity_graph_by_username(&mut session, "member2")
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].team().map(|t| t.name.as_str()), Some("teamB"));

    let named = app
        .repos
        .members
        .find_named_entity_graph_by_username(&mut session, "member1")
        .await
        .unwrap();
    assert_eq!(named[0].team().map(|t| t.name.as_str()), Some("teamA"));
}

#[tokio::test]
async fn test_member_without_team_skips_relation_statement() {
    let app = TestApp::new();
    app.create_members(&[("loner", 30)]).await;
    let mut session = app.session().await;

    let before = app.statements();
    let members = app.repos.members.find_member_fetch_join(&mut session).await.unwrap();
    assert_eq!(app.statements(), before + 1, "no keys, no relation statement");
    assert!(members[0].team().is_none());
    assert!(members[0].team.key().is_null());
}

#[tokio::test]
async fn test_read_only_query_is_not_tracked() {
    let app = TestApp::new();
    app.create_members(&[("member1", 10)]).await;
    let mut session = app.session().await;

    let member = app
        .repos
        .members
        .find_read_only_by_username(&mut session, "member1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.username, "member1");
    assert!(session.context().is_empty());

    app.repos
        .members
        .find_member_by_username(&mut session, "member1")
        .await
        .unwrap();
    assert_eq!(session.context().len(), 1);
}

#[tokio::test]
async fn test_lock_requires_transaction() {
    let app = TestApp::new();
    app.create_members(&[("member1", 10)]).await;

    let mut session = app.session().await;
    let before = app.statements();
    let err = app
        .repos
        .members
        .find_lock_by_username(&mut session, "member1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoActiveTransaction);
    assert_eq!(app.statements(), before);
    drop(session);

    let mut tx = app.begin().await;
    let locked = app
        .repos
        .members
        .find_lock_by_username(&mut tx, "member1")
        .await
        .unwrap();
    assert_eq!(locked.len(), 1);
    tx.commit().await.unwrap();
}
