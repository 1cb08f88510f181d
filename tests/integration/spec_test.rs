//! Integration tests for call-time specifications.

use dataquery_core::error::ErrorKind;
use dataquery_core::types::ComparisonOp;
use dataquery_database::repositories::member_spec;
use dataquery_entity::Member;
use dataquery_query::Specification;

use crate::helpers::TestApp;

async fn seeded() -> TestApp {
    let app = TestApp::new();
    let team_a = app.create_team("teamA").await;
    let team_b = app.create_team("teamB").await;
    app.create_member_in("m1", 0, &team_a).await;
    app.create_member_in("m2", 0, &team_a).await;
    app.create_member_in("m3", 0, &team_b).await;
    app
}

fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.username.as_str()).collect()
}

#[tokio::test]
async fn test_username_and_team_name() {
    let app = seeded().await;
    let mut session = app.session().await;

    let spec = member_spec::username("m1").and(member_spec::team_name("teamA"));
    let members = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, spec)
        .await
        .unwrap();
    assert_eq!(usernames(&members), vec!["m1"]);
}

#[tokio::test]
async fn test_empty_team_name_adds_no_constraint() {
    let app = seeded().await;
    let mut session = app.session().await;

    let members = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, member_spec::team_name(""))
        .await
        .unwrap();
    assert_eq!(usernames(&members), vec!["m1", "m2", "m3"]);

    let all = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, Specification::all())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_either_team() {
    let app = seeded().await;
    let mut session = app.session().await;

    let spec = member_spec::team_name("teamB").or(member_spec::username("m1"));
    let members = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, spec)
        .await
        .unwrap();
    assert_eq!(usernames(&members), vec!["m1", "m3"]);
}

#[tokio::test]
async fn test_and_binds_tighter_than_or() {
    let app = seeded().await;
    let mut session = app.session().await;

    // m1 OR (m2 AND teamB): m2 is in teamA, so only m1 matches.
    let spec = member_spec::username("m1")
        .or(member_spec::username("m2"))
        .and(member_spec::team_name("teamB"));
    let members = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, spec)
        .await
        .unwrap();
    assert_eq!(usernames(&members), vec!["m1"]);
}

#[tokio::test]
async fn test_no_match_is_empty() {
    let app = seeded().await;
    let mut session = app.session().await;

    let spec = member_spec::username("m3").and(member_spec::team_name("teamA"));
    let members = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, spec)
        .await
        .unwrap();
    assert!(members.is_empty());

    let older = Specification::field("age", ComparisonOp::Gt, 0);
    assert!(
        app.repos
            .members
            .repository()
            .find_all_matching(&mut session, older)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let app = seeded().await;
    let mut session = app.session().await;

    let before = app.statements();
    let err = app
        .repos
        .members
        .repository()
        .find_all_matching(&mut session, Specification::field_eq("nickname", "x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownField);
    assert_eq!(app.statements(), before);
}
