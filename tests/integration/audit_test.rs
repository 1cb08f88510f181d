//! Integration tests for audit stamping on save.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use dataquery_core::traits::{FixedAuditor, FixedClock};
use dataquery_entity::{Item, Team};
use dataquery_query::{AuditingHandler, Repository};

use crate::helpers::TestApp;

fn team_repository(app: &TestApp, handler: AuditingHandler) -> Repository<Team> {
    Repository::<Team>::builder(&app.config)
        .auditing(handler)
        .build()
        .expect("Failed to build repository")
}

#[tokio::test]
async fn test_update_keeps_creation_stamp() {
    let app = TestApp::new();
    let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
    let creator = team_repository(
        &app,
        AuditingHandler::new(
            Arc::new(FixedClock(t1)),
            Some(Arc::new(FixedAuditor("alice".into()))),
        ),
    );
    let editor = team_repository(
        &app,
        AuditingHandler::new(
            Arc::new(FixedClock(t2)),
            Some(Arc::new(FixedAuditor("bob".into()))),
        ),
    );

    let mut session = app.session().await;
    let mut team = creator.save(&mut session, Team::new("teamA")).await.unwrap();
    assert_eq!(team.audit.created_date, Some(t1));
    assert_eq!(team.audit.last_modified_date, Some(t1));

    team.name = "teamA2".into();
    editor.save(&mut session, team.clone()).await.unwrap();

    let mut fresh = app.session().await;
    let loaded = creator.find_by_id(&mut fresh, team.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "teamA2");
    assert_eq!(loaded.audit.created_date, Some(t1));
    assert_eq!(loaded.audit.created_by.as_deref(), Some("alice"));
    assert_eq!(loaded.audit.last_modified_date, Some(t2));
    assert_eq!(loaded.audit.last_modified_by.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_default_auditor_stamps_identity() {
    let app = TestApp::new();
    let team = app.create_team("teamA").await;

    assert!(team.audit.created_date.is_some());
    assert!(team.audit.created_by.is_some());
    assert_eq!(team.audit.created_by, team.audit.last_modified_by);
}

#[tokio::test]
async fn test_without_auditing_leaves_fields_empty() {
    let app = TestApp::new();
    let repo = Repository::<Team>::builder(&app.config)
        .without_auditing()
        .build()
        .unwrap();
    let mut session = app.session().await;
    let team = repo.save(&mut session, Team::new("teamA")).await.unwrap();

    let mut fresh = app.session().await;
    let loaded = repo.find_by_id(&mut fresh, team.id).await.unwrap().unwrap();
    assert!(loaded.audit.created_date.is_none());
    assert!(loaded.audit.created_by.is_none());
    assert!(loaded.audit.last_modified_date.is_none());
}

#[tokio::test]
async fn test_assigned_id_entity_inserts_then_updates() {
    let app = TestApp::new();
    let repo = &app.repos.items;
    let mut session = app.session().await;

    let item = Item::new("A");
    assert!(item.created_date().is_none());
    let saved = repo.save(&mut session, item).await.unwrap();
    let created = saved.created_date().expect("creation stamp");

    let again = repo.save(&mut session, saved).await.unwrap();
    assert_eq!(again.created_date(), Some(created));
    assert_eq!(repo.count(&mut session).await.unwrap(), 1);

    let mut fresh = app.session().await;
    let loaded = repo.find_by_id(&mut fresh, "A").await.unwrap().unwrap();
    assert_eq!(loaded.created_date(), Some(created));
}
