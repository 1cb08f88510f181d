//! Integration tests for page, slice and top-N results.

use dataquery_core::config::QueryConfig;
use dataquery_core::error::ErrorKind;
use dataquery_core::types::{PageRequest, QueryMode, Sort, SortDirection};
use dataquery_entity::Member;
use dataquery_query::{Params, QueryOutput};

use crate::helpers::TestApp;

const FIVE_OF_AGE_TEN: [(&str, i32); 5] = [
    ("member1", 10),
    ("member2", 10),
    ("member3", 10),
    ("member4", 10),
    ("member5", 10),
];

fn by_username_desc(page: u64, size: u64) -> PageRequest {
    PageRequest::of_sorted(page, size, Sort::by(SortDirection::Desc, "username")).unwrap()
}

fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.username.as_str()).collect()
}

#[tokio::test]
async fn test_page_with_total() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;
    let params = Params::new().with("age", 10);

    let before = app.statements();
    let page = app
        .repos
        .members
        .repository()
        .find_page::<Member>(&mut session, "findAllByAge", &params, &by_username_desc(0, 3))
        .await
        .unwrap();

    assert_eq!(app.statements(), before + 2, "content and count statements");
    assert_eq!(usernames(&page.content), vec!["member5", "member4", "member3"]);
    assert_eq!(page.total_elements, Some(5));
    assert_eq!(page.total_pages, Some(2));
    assert_eq!(page.page, 0);
    assert!(page.first);
    assert!(page.has_next);
    assert!(!page.has_previous);
}

#[tokio::test]
async fn test_last_page_is_partial() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;

    let page = app
        .repos
        .members
        .repository()
        .find_page::<Member>(
            &mut session,
            "findAllByAge",
            &Params::new().with("age", 10),
            &by_username_desc(1, 3),
        )
        .await
        .unwrap();

    assert_eq!(usernames(&page.content), vec!["member2", "member1"]);
    assert_eq!(page.last, Some(true));
    assert!(!page.has_next);
    assert!(page.has_previous);
}

#[tokio::test]
async fn test_skip_count_when_total_is_implied() {
    let config = QueryConfig {
        skip_count_when_possible: true,
        ..QueryConfig::default()
    };
    let app = TestApp::with_config(config);
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;

    let before = app.statements();
    let page = app
        .repos
        .members
        .repository()
        .find_page::<Member>(
            &mut session,
            "findAllByAge",
            &Params::new().with("age", 10),
            &by_username_desc(0, 10),
        )
        .await
        .unwrap();

    assert_eq!(app.statements(), before + 1);
    assert_eq!(page.total_elements, Some(5));
    assert_eq!(page.total_pages, Some(1));
}

#[tokio::test]
async fn test_slice_has_next_without_count() {
    let app = TestApp::new();
    app.create_members(&[("m1", 10), ("m2", 10), ("m3", 10), ("m4", 10)])
        .await;
    let mut session = app.session().await;

    let before = app.statements();
    let slice = app
        .repos
        .members
        .find_all_by_age(&mut session, 10, &by_username_desc(0, 3))
        .await
        .unwrap();

    assert_eq!(app.statements(), before + 1, "no count statement");
    assert_eq!(usernames(&slice.content), vec!["m4", "m3", "m2"]);
    assert!(slice.has_next);
    assert_eq!(slice.total_elements, None);
    assert_eq!(slice.total_pages, None);
    assert_eq!(slice.last, None);
}

#[tokio::test]
async fn test_slice_exactly_full_has_no_next() {
    let app = TestApp::new();
    app.create_members(&[("m1", 10), ("m2", 10), ("m3", 10)]).await;
    let mut session = app.session().await;

    let slice = app
        .repos
        .members
        .find_all_by_age(&mut session, 10, &by_username_desc(0, 3))
        .await
        .unwrap();

    assert_eq!(slice.content.len(), 3);
    assert!(!slice.has_next);
}

#[tokio::test]
async fn test_list_mode_with_page_request() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;

    let members = app
        .repos
        .members
        .find_member_by_age(&mut session, 10, &by_username_desc(0, 3))
        .await
        .unwrap();
    assert_eq!(usernames(&members), vec!["member5", "member4", "member3"]);
}

#[tokio::test]
async fn test_page_mode_without_request_uses_default_size() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;

    let output = app
        .repos
        .members
        .repository()
        .execute::<Member>(
            &mut session,
            "findAllByAge",
            &Params::new().with("age", 10),
            None,
            QueryMode::Page,
        )
        .await
        .unwrap();

    match output {
        QueryOutput::Page(page) => {
            assert_eq!(page.size, app.config.default_page_size);
            assert_eq!(page.content.len(), 5);
            assert_eq!(page.total_elements, Some(5));
        }
        other => panic!("expected a page, got {other:?}"),
    }
}

#[tokio::test]
async fn test_top3_order_by_age_desc() {
    let app = TestApp::new();
    app.create_members(&[("a", 10), ("b", 20), ("c", 30), ("d", 40), ("e", 50)])
        .await;
    let mut session = app.session().await;

    let top = app
        .repos
        .members
        .find_top3_by_age_greater_than_order_by_age_desc(&mut session, 0)
        .await
        .unwrap();
    let ages: Vec<i32> = top.iter().map(|m| m.age).collect();
    assert_eq!(ages, vec![50, 40, 30]);
}

#[tokio::test]
async fn test_top3_caps_paged_total() {
    let app = TestApp::new();
    app.create_members(&[("a", 10), ("b", 20), ("c", 30), ("d", 40), ("e", 50)])
        .await;
    let repo = app.repos.members.repository();
    let params = Params::new().with("age", 0);
    let mut session = app.session().await;

    let first = repo
        .find_page::<Member>(
            &mut session,
            "findTop3ByAgeGreaterThanOrderByAgeDesc",
            &params,
            &PageRequest::of(0, 2).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.content.len(), 2);
    assert_eq!(first.total_elements, Some(3));
    assert_eq!(first.total_pages, Some(2));

    let second = repo
        .find_page::<Member>(
            &mut session,
            "findTop3ByAgeGreaterThanOrderByAgeDesc",
            &params,
            &PageRequest::of(1, 2).unwrap(),
        )
        .await
        .unwrap();
    let ages: Vec<i32> = second.content.iter().map(|m| m.age).collect();
    assert_eq!(ages, vec![30]);
    assert!(!second.has_next);
}

#[tokio::test]
async fn test_same_request_twice_is_stable() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let repo = app.repos.members.repository();
    let request =
        PageRequest::of_sorted(0, 5, Sort::by(SortDirection::Asc, "age")).unwrap();
    let params = Params::new().with("age", 10);

    let mut first_session = app.session().await;
    let first = repo
        .find_page::<Member>(&mut first_session, "findAllByAge", &params, &request)
        .await
        .unwrap();
    let mut second_session = app.session().await;
    let second = repo
        .find_page::<Member>(&mut second_session, "findAllByAge", &params, &request)
        .await
        .unwrap();

    let first_ids: Vec<Option<i64>> = first.content.iter().map(|m| m.id).collect();
    let second_ids: Vec<Option<i64>> = second.content.iter().map(|m| m.id).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(
        usernames(&first.content),
        vec!["member1", "member2", "member3", "member4", "member5"]
    );
}

#[tokio::test]
async fn test_unknown_sort_field_executes_nothing() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;
    let request =
        PageRequest::of_sorted(0, 3, Sort::by(SortDirection::Asc, "nickname")).unwrap();

    let before = app.statements();
    let err = app
        .repos
        .members
        .find_all_by_age(&mut session, 10, &request)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::UnknownSortField);
    assert_eq!(err.descriptor.as_deref(), Some("findAllByAge"));
    assert_eq!(app.statements(), before);
}

#[tokio::test]
async fn test_page_size_above_maximum_is_rejected() {
    let config = QueryConfig {
        max_page_size: 10,
        ..QueryConfig::default()
    };
    let app = TestApp::with_config(config);
    let mut session = app.session().await;
    let request = PageRequest::of(0, 11).unwrap();

    let err = app
        .repos
        .members
        .find_all_by_age(&mut session, 10, &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .repos
        .members
        .repository()
        .find_all_paged(&mut session, &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_find_all_paged() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;
    let mut session = app.session().await;

    let page = app
        .repos
        .members
        .repository()
        .find_all_paged(&mut session, &by_username_desc(1, 2))
        .await
        .unwrap();
    assert_eq!(usernames(&page.content), vec!["member3", "member2"]);
    assert_eq!(page.total_elements, Some(5));
    assert_eq!(page.total_pages, Some(3));
}

#[tokio::test]
async fn test_page_index_out_of_range() {
    let app = TestApp::new();
    app.create_members(&FIVE_OF_AGE_TEN).await;

    let err = PageRequest::of_sorted(u64::MAX, 3, Sort::by(SortDirection::Desc, "username"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    let err = PageRequest::from_params(Some(u64::MAX), Some(3), Sort::unsorted(), &app.config)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let mut session = app.session().await;
    let far = PageRequest::of((i64::MAX as u64) / 3 - 1, 3).unwrap();
    let page = app
        .repos
        .members
        .repository()
        .find_page::<Member>(&mut session, "findAllByAge", &Params::new().with("age", 10), &far)
        .await
        .unwrap();
    assert!(page.content.is_empty());
    assert_eq!(page.total_elements, Some(5));
    assert!(!page.has_next);

    let paged = app
        .repos
        .members
        .repository()
        .find_all_paged(&mut session, &far)
        .await
        .unwrap();
    assert!(paged.content.is_empty());
    assert_eq!(paged.last, Some(true));
}
