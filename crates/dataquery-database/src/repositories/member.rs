//! Member repository: the registered member queries and typed accessors.

use dataquery_core::config::QueryConfig;
use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::types::{
    ComparisonOp, FieldPredicate, LockMode, PageRequest, PageResult, PredicateGroup, QueryMode,
};
use dataquery_entity::{Member, MemberDto, UsernameOnly};
use dataquery_query::{
    literal, CriteriaQuery, Params, QueryOptions, QueryOutput, Repository, Session, TemplateQuery,
};

/// Queries over [`Member`].
///
/// Criteria and derived queries run on every store. Template queries
/// carry hand-written SQL and need a SQL store.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    repository: Repository<Member>,
}

impl MemberRepository {
    /// Register and validate every member query.
    pub fn new(config: &QueryConfig) -> AppResult<Self> {
        let repository = Repository::<Member>::builder(config)
            .derived("findByUsernameAndAgeGreaterThan")
            .template(
                "findByUserGreaterThanAge",
                TemplateQuery::new("SELECT m.* FROM member m WHERE m.age > :age").param("age"),
                QueryOptions::new(),
            )
            .named_query(
                "Member.findByUsername",
                TemplateQuery::new("SELECT m.* FROM member m WHERE m.username = :username")
                    .param("username"),
            )
            .derived("findByUsername")
            .template(
                "findUser",
                TemplateQuery::new(
                    "SELECT m.* FROM member m WHERE m.username = :username AND m.age = :age",
                )
                .param("username")
                .param("age"),
                QueryOptions::new(),
            )
            .template(
                "findUsernameList",
                TemplateQuery::new("SELECT m.username FROM member m"),
                QueryOptions::new(),
            )
            .template(
                "findMemberDto",
                TemplateQuery::new(
                    "SELECT m.member_id AS id, m.username, t.name AS team_name \
                     FROM member m JOIN team t ON t.team_id = m.team_id",
                ),
                QueryOptions::new(),
            )
            .template(
                "findByNames",
                TemplateQuery::new("SELECT m.* FROM member m WHERE m.username IN :names")
                    .param("names"),
                QueryOptions::new(),
            )
            .derived("findListByUsername")
            .derived("findMemberByUsername")
            .derived("findOptionalByUsername")
            .template(
                "findByAge",
                TemplateQuery::new(
                    "SELECT m.* FROM member m LEFT JOIN team t ON t.team_id = m.team_id \
                     WHERE m.age = :age",
                )
                .param("age")
                .count_query("SELECT COUNT(m.username) FROM member m WHERE m.age = :age"),
                QueryOptions::new(),
            )
            .derived("findAllByAge")
            .derived("findMemberByAge")
            .derived("findTop3ByAgeGreaterThanOrderByAgeDesc")
            .criteria(
                "bulkAgePlus",
                CriteriaQuery::update()
                    .increment("age", literal(1))
                    .filter(PredicateGroup::new(FieldPredicate::param(
                        "age",
                        ComparisonOp::Gte,
                        "age",
                    ))),
                QueryOptions::new().clear_automatically(true),
            )
            .criteria(
                "findMemberFetchJoin",
                CriteriaQuery::find(),
                QueryOptions::new().entity_graph(&["team"]),
            )
            .template(
                "findMemberEntityGraph",
                TemplateQuery::new("SELECT m.* FROM member m"),
                QueryOptions::new().entity_graph(&["team"]),
            )
            .template(
                "findMemberCustom",
                TemplateQuery::new("SELECT m.* FROM member m"),
                QueryOptions::new(),
            )
            .derived_with(
                "findEntityGraphByUsername",
                QueryOptions::new().entity_graph(&["team"]),
            )
            .derived_with(
                "findNamedEntityGraphByUsername",
                QueryOptions::new().entity_graph(&["team"]),
            )
            .derived_with("findReadOnlyByUsername", QueryOptions::new().read_only())
            .derived_with(
                "findLockByUsername",
                QueryOptions::new().lock(LockMode::PessimisticWrite),
            )
            .derived("findProjectionsByUsername")
            .derived("countByAge")
            .derived("existsByUsername")
            .find_all_graph(&["team"])
            .build()?;
        Ok(Self { repository })
    }

    /// The underlying repository, for CRUD operations and explain.
    pub fn repository(&self) -> &Repository<Member> {
        &self.repository
    }

    pub async fn find_by_username_and_age_greater_than(
        &self,
        session: &mut Session,
        username: &str,
        age: i32,
    ) -> AppResult<Vec<Member>> {
        let params = Params::new().with("username", username).with("age", age);
        self.repository
            .find_list(session, "findByUsernameAndAgeGreaterThan", &params)
            .await
    }

    pub async fn find_by_user_greater_than_age(
        &self,
        session: &mut Session,
        age: i32,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findByUserGreaterThanAge", &Params::new().with("age", age))
            .await
    }

    /// Resolved through the `Member.findByUsername` named query.
    pub async fn find_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findByUsername", &Params::new().with("username", username))
            .await
    }

    pub async fn find_user(
        &self,
        session: &mut Session,
        username: &str,
        age: i32,
    ) -> AppResult<Vec<Member>> {
        let params = Params::new().with("username", username).with("age", age);
        self.repository.find_list(session, "findUser", &params).await
    }

    pub async fn find_username_list(&self, session: &mut Session) -> AppResult<Vec<String>> {
        self.repository
            .find_list(session, "findUsernameList", &Params::new())
            .await
    }

    /// Members joined with their team; members without a team are skipped.
    pub async fn find_member_dto(&self, session: &mut Session) -> AppResult<Vec<MemberDto>> {
        self.repository
            .find_list(session, "findMemberDto", &Params::new())
            .await
    }

    pub async fn find_by_names(
        &self,
        session: &mut Session,
        names: &[&str],
    ) -> AppResult<Vec<Member>> {
        let params = Params::new().with("names", names.to_vec());
        self.repository.find_list(session, "findByNames", &params).await
    }

    pub async fn find_list_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findListByUsername", &Params::new().with("username", username))
            .await
    }

    /// Single result; more than one match is an `IncorrectResultSize` error.
    pub async fn find_member_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Option<Member>> {
        self.repository
            .find_one(session, "findMemberByUsername", &Params::new().with("username", username))
            .await
    }

    pub async fn find_optional_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Option<Member>> {
        self.repository
            .find_one(
                session,
                "findOptionalByUsername",
                &Params::new().with("username", username),
            )
            .await
    }

    /// A page counted with the lighter count template.
    pub async fn find_by_age(
        &self,
        session: &mut Session,
        age: i32,
        request: &PageRequest,
    ) -> AppResult<PageResult<Member>> {
        self.repository
            .find_page(session, "findByAge", &Params::new().with("age", age), request)
            .await
    }

    pub async fn find_all_by_age(
        &self,
        session: &mut Session,
        age: i32,
        request: &PageRequest,
    ) -> AppResult<PageResult<Member>> {
        self.repository
            .find_slice(session, "findAllByAge", &Params::new().with("age", age), request)
            .await
    }

    pub async fn find_member_by_age(
        &self,
        session: &mut Session,
        age: i32,
        request: &PageRequest,
    ) -> AppResult<Vec<Member>> {
        match self
            .repository
            .execute(
                session,
                "findMemberByAge",
                &Params::new().with("age", age),
                Some(request),
                QueryMode::List,
            )
            .await?
        {
            QueryOutput::List(members) => Ok(members),
            _ => Err(AppError::internal(
                "findMemberByAge did not return a list",
            )),
        }
    }

    pub async fn find_top3_by_age_greater_than_order_by_age_desc(
        &self,
        session: &mut Session,
        age: i32,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(
                session,
                "findTop3ByAgeGreaterThanOrderByAgeDesc",
                &Params::new().with("age", age),
            )
            .await
    }

    /// Add one to the age of every member at least `age` years old, then
    /// clear the session's persistence context.
    pub async fn bulk_age_plus(&self, session: &mut Session, age: i32) -> AppResult<u64> {
        self.repository
            .execute_bulk(session, "bulkAgePlus", &Params::new().with("age", age))
            .await
    }

    pub async fn find_member_fetch_join(&self, session: &mut Session) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findMemberFetchJoin", &Params::new())
            .await
    }

    pub async fn find_member_entity_graph(&self, session: &mut Session) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findMemberEntityGraph", &Params::new())
            .await
    }

    pub async fn find_member_custom(&self, session: &mut Session) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findMemberCustom", &Params::new())
            .await
    }

    pub async fn find_entity_graph_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(
                session,
                "findEntityGraphByUsername",
                &Params::new().with("username", username),
            )
            .await
    }

    pub async fn find_named_entity_graph_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(
                session,
                "findNamedEntityGraphByUsername",
                &Params::new().with("username", username),
            )
            .await
    }

    /// Loaded without registering the result in the persistence context.
    pub async fn find_read_only_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Option<Member>> {
        self.repository
            .find_one(
                session,
                "findReadOnlyByUsername",
                &Params::new().with("username", username),
            )
            .await
    }

    /// `SELECT ... FOR UPDATE`; needs a transactional session.
    pub async fn find_lock_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<Member>> {
        self.repository
            .find_list(session, "findLockByUsername", &Params::new().with("username", username))
            .await
    }

    pub async fn find_projections_by_username(
        &self,
        session: &mut Session,
        username: &str,
    ) -> AppResult<Vec<UsernameOnly>> {
        self.repository
            .find_list(
                session,
                "findProjectionsByUsername",
                &Params::new().with("username", username),
            )
            .await
    }

    pub async fn count_by_age(&self, session: &mut Session, age: i32) -> AppResult<i64> {
        self.repository
            .count_by(session, "countByAge", &Params::new().with("age", age))
            .await
    }

    pub async fn exists_by_username(&self, session: &mut Session, username: &str) -> AppResult<bool> {
        self.repository
            .exists_by(session, "existsByUsername", &Params::new().with("username", username))
            .await
    }
}

/// Specifications over [`Member`], combined at call time.
pub mod spec {
    use dataquery_query::Specification;

    /// Members of the named team; an empty name adds no constraint.
    pub fn team_name(name: &str) -> Specification {
        if name.is_empty() {
            return Specification::all();
        }
        Specification::field_eq("team.name", name)
    }

    pub fn username(username: &str) -> Specification {
        Specification::field_eq("username", username)
    }
}
