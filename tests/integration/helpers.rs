//! Shared test helpers for integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dataquery_core::config::QueryConfig;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Store, StoreConnection};
use dataquery_core::types::{Dialect, Row, Statement, Value};
use dataquery_database::MemoryStore;
use dataquery_database::repositories::Repositories;
use dataquery_entity::item::ITEM_SCHEMA;
use dataquery_entity::member::MEMBER_SCHEMA;
use dataquery_entity::team::TEAM_SCHEMA;
use dataquery_entity::{Member, Team};
use dataquery_query::Session;

/// Test application context
pub struct TestApp {
    /// In-memory store shared by every session
    pub store: MemoryStore,
    /// Repositories built from `config`
    pub repos: Repositories,
    /// Query configuration
    pub config: QueryConfig,
}

impl TestApp {
    /// Create a new test application with default configuration
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Create a new test application
    pub fn with_config(config: QueryConfig) -> Self {
        let store = MemoryStore::new(&[&TEAM_SCHEMA, &MEMBER_SCHEMA, &ITEM_SCHEMA]);
        let repos = Repositories::build(&config).expect("Failed to build repositories");
        Self {
            store,
            repos,
            config,
        }
    }

    /// A fresh non-transactional session
    pub async fn session(&self) -> Session {
        Session::open(&self.store).await.expect("Failed to open session")
    }

    /// A fresh transactional session
    pub async fn begin(&self) -> Session {
        Session::begin(&self.store).await.expect("Failed to begin transaction")
    }

    /// Statements executed so far
    pub fn statements(&self) -> usize {
        self.store.statements_executed()
    }

    /// Save a team
    pub async fn create_team(&self, name: &str) -> Team {
        let mut session = self.session().await;
        self.repos
            .teams
            .repository()
            .save(&mut session, Team::new(name))
            .await
            .expect("Failed to save team")
    }

    /// Save members without a team
    pub async fn create_members(&self, members: &[(&str, i32)]) -> Vec<Member> {
        let mut session = self.session().await;
        let repo = self.repos.members.repository();
        let mut saved = Vec::with_capacity(members.len());
        for (username, age) in members {
            saved.push(
                repo.save(&mut session, Member::with_age(*username, *age))
                    .await
                    .expect("Failed to save member"),
            );
        }
        saved
    }

    /// Save a member in a team
    pub async fn create_member_in(&self, username: &str, age: i32, team: &Team) -> Member {
        let mut session = self.session().await;
        self.repos
            .members
            .repository()
            .save(&mut session, Member::with_team(username, age, team))
            .await
            .expect("Failed to save member")
    }
}

/// A member row as PostgreSQL would return it
pub fn member_row(id: i64, username: &str, age: i64, team_id: Option<i64>) -> Row {
    Row::from_pairs([
        ("member_id", Value::Int(id)),
        ("username", Value::from(username)),
        ("age", Value::Int(age)),
        ("team_id", team_id.map_or(Value::Null, Value::Int)),
    ])
}

/// Store that records every statement and answers from canned results.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    log: Arc<Mutex<Vec<Statement>>>,
    results: Arc<Mutex<VecDeque<Vec<Row>>>>,
    count: Arc<Mutex<i64>>,
}

impl RecordingStore {
    /// Queue the rows returned by the next row-returning statement
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.results.lock().unwrap().push_back(rows);
    }

    /// Value returned by count statements
    pub fn set_count(&self, count: i64) {
        *self.count.lock().unwrap() = count;
    }

    /// Every statement executed so far
    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().unwrap().clone()
    }

    /// SQL of every statement executed so far
    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }
}

#[async_trait]
impl Store for RecordingStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self) -> AppResult<Box<dyn StoreConnection>> {
        Ok(Box::new(RecordingConnection {
            store: self.clone(),
            transaction: false,
        }))
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreConnection>> {
        Ok(Box::new(RecordingConnection {
            store: self.clone(),
            transaction: true,
        }))
    }
}

struct RecordingConnection {
    store: RecordingStore,
    transaction: bool,
}

impl RecordingConnection {
    fn record(&self, statement: &Statement) {
        self.store.log.lock().unwrap().push(statement.clone());
    }
}

#[async_trait]
impl StoreConnection for RecordingConnection {
    fn in_transaction(&self) -> bool {
        self.transaction
    }

    async fn execute(&mut self, statement: &Statement) -> AppResult<Vec<Row>> {
        self.record(statement);
        Ok(self.store.results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute_count(&mut self, statement: &Statement) -> AppResult<i64> {
        self.record(statement);
        Ok(*self.store.count.lock().unwrap())
    }

    async fn execute_bulk(&mut self, statement: &Statement) -> AppResult<u64> {
        self.record(statement);
        Ok(0)
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.transaction = false;
        Ok(())
    }
}
