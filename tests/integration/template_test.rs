//! Integration tests for SQL templates and the rendered statements of
//! criteria queries, run against a recording store.

use dataquery_core::config::QueryConfig;
use dataquery_core::error::ErrorKind;
use dataquery_core::types::{PageRequest, Row, Sort, SortDirection, Value};
use dataquery_database::repositories::{member_spec, MemberRepository};
use dataquery_entity::Member;
use dataquery_query::{Params, Session};

use crate::helpers::{member_row, RecordingStore};

fn members() -> MemberRepository {
    MemberRepository::new(&QueryConfig::default()).expect("Failed to build repository")
}

fn team_row(id: i64, name: &str) -> Row {
    Row::from_pairs([
        ("team_id", Value::Int(id)),
        ("name", Value::from(name)),
        ("created_date", Value::Null),
        ("last_modified_date", Value::Null),
        ("created_by", Value::Null),
        ("last_modified_by", Value::Null),
    ])
}

#[tokio::test]
async fn test_collection_parameter_expands() {
    let store = RecordingStore::default();
    store.push_rows(vec![
        member_row(1, "AAA", 10, None),
        member_row(2, "BBB", 20, None),
    ]);
    let mut session = Session::open(&store).await.unwrap();

    let found = members()
        .find_by_names(&mut session, &["AAA", "BBB"])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let statements = store.statements();
    assert_eq!(
        statements[0].sql,
        "SELECT m.* FROM member m WHERE m.username IN ($1, $2)"
    );
    assert_eq!(statements[0].binds.len(), 2);
}

#[tokio::test]
async fn test_empty_collection_matches_nothing() {
    let store = RecordingStore::default();
    let mut session = Session::open(&store).await.unwrap();

    let found = members().find_by_names(&mut session, &[]).await.unwrap();
    assert!(found.is_empty());
    assert_eq!(
        store.sql(),
        vec!["SELECT m.* FROM member m WHERE m.username IN (NULL)"]
    );
}

#[tokio::test]
async fn test_template_page_uses_count_template() {
    let store = RecordingStore::default();
    store.push_rows(vec![
        member_row(5, "member5", 10, None),
        member_row(4, "member4", 10, None),
    ]);
    store.set_count(5);
    let mut session = Session::open(&store).await.unwrap();

    let request =
        PageRequest::of_sorted(0, 2, Sort::by(SortDirection::Desc, "username")).unwrap();
    let page = members().find_by_age(&mut session, 10, &request).await.unwrap();
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.total_elements, Some(5));
    assert_eq!(page.total_pages, Some(3));

    let sql = store.sql();
    assert_eq!(sql.len(), 2);
    assert!(sql[0].starts_with("SELECT * FROM (SELECT m.* FROM member m LEFT JOIN"));
    assert!(sql[0].ends_with("ORDER BY q.username DESC, q.member_id ASC LIMIT 2"));
    assert_eq!(sql[1], "SELECT COUNT(m.username) FROM member m WHERE m.age = $1");
}

#[tokio::test]
async fn test_scalar_and_dto_results() {
    let store = RecordingStore::default();
    store.push_rows(vec![
        Row::from_pairs([("username", Value::from("AAA"))]),
        Row::from_pairs([("username", Value::from("BBB"))]),
    ]);
    store.push_rows(vec![Row::from_pairs([
        ("id", Value::Int(1)),
        ("username", Value::from("AAA")),
        ("team_name", Value::from("teamA")),
    ])]);
    let mut session = Session::open(&store).await.unwrap();
    let repo = members();

    let names = repo.find_username_list(&mut session).await.unwrap();
    assert_eq!(names, vec!["AAA".to_string(), "BBB".to_string()]);

    let dtos = repo.find_member_dto(&mut session).await.unwrap();
    assert_eq!(dtos.len(), 1);
    assert_eq!(dtos[0].id, 1);
    assert_eq!(dtos[0].team_name.as_deref(), Some("teamA"));
    assert!(session.context().is_empty(), "projections are not tracked");
}

#[tokio::test]
async fn test_named_query_takes_precedence() {
    let store = RecordingStore::default();
    store.push_rows(vec![member_row(1, "AAA", 10, None)]);
    let mut session = Session::open(&store).await.unwrap();

    let found = members().find_by_username(&mut session, "AAA").await.unwrap();
    assert_eq!(found[0].username, "AAA");
    assert_eq!(
        store.sql(),
        vec!["SELECT m.* FROM member m WHERE m.username = $1"]
    );
}

#[tokio::test]
async fn test_parameter_mismatch_runs_nothing() {
    let store = RecordingStore::default();
    let mut session = Session::open(&store).await.unwrap();
    let repo = members();

    let err = repo
        .repository()
        .find_list::<Member>(&mut session, "findByUserGreaterThanAge", &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnboundParameter);

    let extra = Params::new().with("age", 10).with("nickname", "x");
    let err = repo
        .repository()
        .find_list::<Member>(&mut session, "findByUserGreaterThanAge", &extra)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnusedParameter);

    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_lock_renders_for_update() {
    let store = RecordingStore::default();
    let mut session = Session::begin(&store).await.unwrap();

    members()
        .find_lock_by_username(&mut session, "member1")
        .await
        .unwrap();
    let sql = store.sql();
    assert!(sql[0].ends_with(" FOR UPDATE"), "{}", sql[0]);
    session.commit().await.unwrap();
}

#[tokio::test]
async fn test_template_entity_graph_fetches_teams_once() {
    let store = RecordingStore::default();
    store.push_rows(vec![
        member_row(1, "member1", 10, Some(7)),
        member_row(2, "member2", 20, Some(7)),
        member_row(3, "member3", 30, None),
    ]);
    store.push_rows(vec![team_row(7, "teamA")]);
    let mut session = Session::open(&store).await.unwrap();

    let found = members().find_member_entity_graph(&mut session).await.unwrap();
    assert_eq!(store.statements().len(), 2);
    assert_eq!(found[0].team().map(|t| t.name.as_str()), Some("teamA"));
    assert_eq!(found[1].team().map(|t| t.name.as_str()), Some("teamA"));
    assert!(found[2].team().is_none());
}

#[tokio::test]
async fn test_bulk_update_statement() {
    let store = RecordingStore::default();
    let mut session = Session::open(&store).await.unwrap();

    members().bulk_age_plus(&mut session, 20).await.unwrap();
    let statements = store.statements();
    assert_eq!(statements[0].sql, "UPDATE member SET age = age + $1 WHERE age >= $2");
    assert_eq!(statements[0].binds[0].value, Value::Int(1));
    assert_eq!(statements[0].binds[1].value, Value::Int(20));
}

#[tokio::test]
async fn test_derived_query_statement() {
    let store = RecordingStore::default();
    let mut session = Session::open(&store).await.unwrap();

    members()
        .find_by_username_and_age_greater_than(&mut session, "AAA", 15)
        .await
        .unwrap();
    assert_eq!(
        store.sql(),
        vec![
            "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
             WHERE m.username = $1 AND m.age > $2 ORDER BY m.member_id ASC"
        ]
    );
}

#[tokio::test]
async fn test_relation_path_renders_subquery() {
    let store = RecordingStore::default();
    let mut session = Session::open(&store).await.unwrap();

    members()
        .repository()
        .find_all_matching(&mut session, member_spec::team_name("teamA"))
        .await
        .unwrap();
    let sql = store.sql();
    assert!(
        sql[0].contains("m.team_id IN (SELECT sq.team_id FROM team sq WHERE sq.name = $1)"),
        "{}",
        sql[0]
    );
}
