//! Built-in CRUD operations available on every repository.

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::Entity;
use dataquery_core::types::{
    LockMode, OrderTerm, PageRequest, PageResult, Plan, QueryMode, Row, SelectPlan, Sort, Value,
};

use crate::compiler::{self, entity, BindMode, ResolvedCriteria};
use crate::descriptor::CriteriaQuery;
use crate::executor::{sort_terms, with_tiebreaker};
use crate::paging::{self, Window};
use crate::params::Params;
use crate::repository::Repository;
use crate::session::Session;
use crate::specification::Specification;

fn entity_row<E: Entity>(entity: &E) -> Row {
    Row::from_pairs(entity.values())
}

impl<E: Entity> Repository<E> {
    fn source(&self, operation: &str) -> String {
        format!("{}.{operation}", self.schema().entity)
    }

    /// Insert a new entity or update an existing one, stamping audit
    /// fields first. Generated identities are written back.
    pub async fn save(&self, session: &mut Session, mut entity: E) -> AppResult<E> {
        let schema = self.schema();
        let is_new = entity.is_new();
        if let Some(handler) = &self.inner.auditing {
            handler.stamp(&mut entity, is_new);
        }

        if is_new {
            let plan = entity::insert(schema, entity.values())?;
            let generated = matches!(&plan, Plan::Insert(insert) if insert.returning.is_some());
            let statement = compiler::render(plan, schema, session.dialect())?
                .with_source(self.source("save"));
            if generated {
                let rows = session.fetch(&statement).await?;
                let id = rows
                    .first()
                    .and_then(|row| row.values().first().cloned())
                    .ok_or_else(|| AppError::database("insert returned no generated identity"))?;
                entity.set_id(id)?;
            } else {
                session.bulk(&statement).await?;
            }
        } else {
            let plan = entity::update_by_id(schema, entity.values())?;
            let statement = compiler::render(plan, schema, session.dialect())?
                .with_source(self.source("save"));
            if session.bulk(&statement).await? == 0 {
                return Err(AppError::not_found(format!(
                    "{} {} does not exist",
                    schema.entity,
                    entity.id()
                )));
            }
        }

        session.context_mut().put(schema, entity_row(&entity));
        Ok(entity)
    }

    /// Save every entity in order.
    pub async fn save_all(&self, session: &mut Session, entities: Vec<E>) -> AppResult<Vec<E>> {
        let mut saved = Vec::with_capacity(entities.len());
        for entity in entities {
            saved.push(self.save(session, entity).await?);
        }
        Ok(saved)
    }

    /// Load one entity. Known state in the session is returned without a
    /// statement.
    pub async fn find_by_id(
        &self,
        session: &mut Session,
        id: impl Into<Value>,
    ) -> AppResult<Option<E>> {
        let schema = self.schema();
        let id = id.into();
        if let Some(row) = session.context().get(schema, &id) {
            return E::from_row(row).map(Some);
        }
        let statement = compiler::render(entity::find_by_id(schema, id), schema, session.dialect())?
            .with_source(self.source("findById"));
        let rows = session.fetch(&statement).await?;
        let rows = self.load_entities(session, rows, &[], false).await?;
        rows.first().map(E::from_row).transpose()
    }

    /// Every entity, ordered by identity, with the repository's default
    /// entity graph.
    pub async fn find_all(&self, session: &mut Session) -> AppResult<Vec<E>> {
        self.select_all(session, Vec::new(), Window::UNBOUNDED, "findAll")
            .await
    }

    /// Every entity in the requested order.
    pub async fn find_all_sorted(&self, session: &mut Session, sort: &Sort) -> AppResult<Vec<E>> {
        let order = sort_terms(self.schema(), sort)?;
        self.select_all(session, order, Window::UNBOUNDED, "findAll")
            .await
    }

    /// One page of every entity.
    pub async fn find_all_paged(
        &self,
        session: &mut Session,
        request: &PageRequest,
    ) -> AppResult<PageResult<E>> {
        if request.size() > self.inner.config.max_page_size {
            return Err(AppError::validation(format!(
                "page size {} exceeds the maximum of {}",
                request.size(),
                self.inner.config.max_page_size
            )));
        }
        let order = sort_terms(self.schema(), request.sort())?;
        let window = Window::compute(QueryMode::Page, Some(request), None);
        let content = self.select_all(session, order, window, "findAll").await?;
        let total = match paging::implied_total(request, content.len() as u64) {
            Some(total) if self.inner.config.skip_count_when_possible => total,
            _ => u64::try_from(self.count(session).await?).unwrap_or(0),
        };
        Ok(PageResult::page(content, request, total))
    }

    async fn select_all(
        &self,
        session: &mut Session,
        order: Vec<OrderTerm>,
        window: Window,
        operation: &str,
    ) -> AppResult<Vec<E>> {
        let schema = self.schema();
        let plan = Plan::Select(SelectPlan {
            table: schema.table.to_string(),
            columns: entity::all_columns(schema),
            distinct: false,
            filter: Vec::new(),
            order: with_tiebreaker(schema, order),
            limit: window.limit,
            offset: window.offset,
            lock: LockMode::None,
        });
        let statement = compiler::render(plan, schema, session.dialect())?
            .with_source(self.source(operation));
        let rows = session.fetch(&statement).await?;
        let graph = self.inner.default_graph.clone();
        let rows = self.load_entities(session, rows, &graph, false).await?;
        rows.iter().map(E::from_row).collect()
    }

    /// Number of stored entities.
    pub async fn count(&self, session: &mut Session) -> AppResult<i64> {
        let schema = self.schema();
        let statement = compiler::render(entity::count_all(schema), schema, session.dialect())?
            .with_source(self.source("count"));
        session.count(&statement).await
    }

    /// Whether an entity with this identity is stored.
    pub async fn exists_by_id(&self, session: &mut Session, id: impl Into<Value>) -> AppResult<bool> {
        let schema = self.schema();
        let Plan::Select(mut select) = entity::find_by_id(schema, id.into()) else {
            return Err(AppError::internal("identity lookup is not a select"));
        };
        select.columns = vec![schema.id_field().column.to_string()];
        select.limit = Some(1);
        let statement = compiler::render(Plan::Select(select), schema, session.dialect())?
            .with_source(self.source("existsById"));
        Ok(!session.fetch(&statement).await?.is_empty())
    }

    /// Delete an entity. Deleting one that is not stored is not an error.
    pub async fn delete(&self, session: &mut Session, entity: &E) -> AppResult<()> {
        self.delete_by_id(session, entity.id()).await.map(|_| ())
    }

    /// Delete by identity; returns whether a row was removed.
    pub async fn delete_by_id(&self, session: &mut Session, id: impl Into<Value>) -> AppResult<bool> {
        let schema = self.schema();
        let id = id.into();
        let statement = compiler::render(entity::delete_by_id(schema, id.clone()), schema, session.dialect())?
            .with_source(self.source("deleteById"));
        let affected = session.bulk(&statement).await?;
        session.context_mut().evict(schema, &id);
        Ok(affected > 0)
    }

    /// Entities matching a specification, ordered by identity.
    pub async fn find_all_matching(
        &self,
        session: &mut Session,
        spec: Specification,
    ) -> AppResult<Vec<E>> {
        let schema = self.schema();
        let query = match spec.into_predicate() {
            Some(group) => CriteriaQuery::find().filter(group),
            None => CriteriaQuery::find(),
        };
        let resolved = ResolvedCriteria::resolve(&query, schema)?;
        let filter = resolved.bind_filter(&Params::new(), BindMode::Strict)?;
        let plan = Plan::Select(SelectPlan {
            table: schema.table.to_string(),
            columns: entity::all_columns(schema),
            distinct: false,
            filter,
            order: with_tiebreaker(schema, Vec::new()),
            limit: None,
            offset: 0,
            lock: LockMode::None,
        });
        let statement = compiler::render(plan, schema, session.dialect())?
            .with_source(self.source("findAll(spec)"));
        let rows = session.fetch(&statement).await?;
        let rows = self.load_entities(session, rows, &[], false).await?;
        rows.iter().map(E::from_row).collect()
    }
}
