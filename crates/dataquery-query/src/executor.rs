//! Execution and result mapping.
//!
//! Calls run a fixed sequence: look up the descriptor, check parameters,
//! sort fields, page size and lock mode, render, execute, then resolve
//! entity rows through the persistence context, fetch the entity graph
//! and map rows into the requested type. Nothing reaches the store until
//! every check has passed.

use std::collections::HashMap;

use serde::Serialize;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Entity, FromRow, Selection};
use dataquery_core::types::{
    Dialect, EntitySchema, FilterPlan, LockMode, OrderTerm, PageRequest, PageResult, Plan,
    QueryMode, Row, SelectPlan, Sort, SortDirection, Statement, UpdatePlan, Value,
};

use crate::compiler::{self, entity, BindMode, CompiledTemplate, ResolvedCriteria};
use crate::descriptor::{QueryOptions, Subject};
use crate::paging::{self, Window};
use crate::params::Params;
use crate::repository::{Compiled, Registered, Repository};
use crate::session::Session;

/// Result of executing a registered query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum QueryOutput<T> {
    /// Plain sequence.
    List(Vec<T>),
    /// Page or slice.
    Page(PageResult<T>),
    /// `count` subject.
    Count(i64),
    /// `exists` subject.
    Exists(bool),
    /// Bulk update or delete.
    Affected(u64),
}

impl<T> QueryOutput<T> {
    fn shape(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Page(_) => "page",
            Self::Count(_) => "count",
            Self::Exists(_) => "exists",
            Self::Affected(_) => "affected row count",
        }
    }

    fn unexpected(&self, wanted: &str) -> AppError {
        AppError::unsupported(format!("query returns a {}, not a {wanted}", self.shape()))
    }
}

/// SQL a descriptor compiles to, for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct Explained {
    /// Main statement.
    pub sql: String,
    /// Count statement (page mode).
    pub count_sql: Option<String>,
}

enum Action {
    Rows {
        window: Window,
        request: Option<PageRequest>,
        mode: QueryMode,
        top: Option<u64>,
    },
    Count,
    Exists,
    Bulk,
}

struct Prepared {
    action: Action,
    main: Statement,
    count: Option<Statement>,
}

/// Map a request sort onto physical columns.
pub(crate) fn sort_terms(schema: &EntitySchema, sort: &Sort) -> AppResult<Vec<OrderTerm>> {
    sort.iter()
        .map(|term| {
            schema
                .field(&term.field)
                .map(|f| OrderTerm {
                    column: f.column.to_string(),
                    direction: term.direction,
                })
                .ok_or_else(|| AppError::unknown_sort_field(schema.entity, &term.field))
        })
        .collect()
}

/// Append the identity column so that equal sort keys keep a stable order.
pub(crate) fn with_tiebreaker(schema: &EntitySchema, mut order: Vec<OrderTerm>) -> Vec<OrderTerm> {
    let id = schema.id_field().column;
    if !order.iter().any(|t| t.column == id) {
        order.push(OrderTerm {
            column: id.to_string(),
            direction: SortDirection::Asc,
        });
    }
    order
}

impl<E: Entity> Repository<E> {
    /// Execute a registered query.
    ///
    /// `page` is optional in every mode; page and slice modes without one
    /// use the first page of the configured default size.
    pub async fn execute<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
        page: Option<&PageRequest>,
        mode: QueryMode,
    ) -> AppResult<QueryOutput<T>> {
        self.run::<T>(session, name, params, page, mode)
            .await
            .map_err(|e| e.in_descriptor(name))
    }

    async fn run<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
        page: Option<&PageRequest>,
        mode: QueryMode,
    ) -> AppResult<QueryOutput<T>> {
        let registered = self.registered(name)?;
        let request = match (mode, page) {
            (_, Some(request)) => Some(request.clone()),
            (QueryMode::List, None) => None,
            (QueryMode::Page | QueryMode::Slice, None) => {
                Some(PageRequest::of(0, self.inner.config.default_page_size)?)
            }
        };
        if registered.options.lock.is_locking() && !session.in_transaction() {
            return Err(AppError::no_active_transaction(format!(
                "{:?} requires an open transaction",
                registered.options.lock
            )));
        }
        let prepared = self.prepare(
            registered,
            session.dialect(),
            params,
            request,
            mode,
            T::selection(),
            BindMode::Strict,
        )?;
        let prepared = Prepared {
            main: prepared.main.with_source(name),
            count: prepared.count.map(|c| c.with_source(format!("{name}#count"))),
            action: prepared.action,
        };

        match prepared.action {
            Action::Count => Ok(QueryOutput::Count(session.count(&prepared.main).await?)),
            Action::Exists => Ok(QueryOutput::Exists(
                !session.fetch(&prepared.main).await?.is_empty(),
            )),
            Action::Bulk => {
                let affected = session.bulk(&prepared.main).await?;
                let clear = registered
                    .options
                    .clear_automatically
                    .unwrap_or(self.inner.config.clear_after_bulk);
                if clear {
                    session.clear();
                }
                Ok(QueryOutput::Affected(affected))
            }
            Action::Rows {
                window,
                request,
                mode,
                top,
            } => {
                let mut rows = session.fetch(&prepared.main).await?;
                let has_next = match &request {
                    Some(request) if mode == QueryMode::Slice => {
                        paging::take_lookahead(&mut rows, request, window)
                    }
                    _ => false,
                };
                let selection = T::selection();
                let rows = match selection {
                    Selection::Scalar => rows,
                    Selection::Fields(_) => {
                        rows.into_iter().map(|r| r.into_logical(self.schema())).collect()
                    }
                    Selection::Entity(_) => {
                        self.load_entities(
                            session,
                            rows,
                            &registered.options.entity_graph,
                            registered.options.read_only,
                        )
                        .await?
                    }
                };
                let content = rows.iter().map(T::from_row).collect::<AppResult<Vec<T>>>()?;

                match (mode, request) {
                    (QueryMode::Slice, Some(request)) => {
                        Ok(QueryOutput::Page(PageResult::slice(content, &request, has_next)))
                    }
                    (QueryMode::Page, Some(request)) => {
                        let implied = if self.inner.config.skip_count_when_possible {
                            paging::implied_total(&request, content.len() as u64)
                        } else {
                            None
                        };
                        let total = match (implied, &prepared.count) {
                            (Some(total), _) => total,
                            (None, Some(count)) => {
                                u64::try_from(session.count(count).await?).unwrap_or(0)
                            }
                            (None, None) => {
                                return Err(AppError::internal("page query without a count statement"));
                            }
                        };
                        Ok(QueryOutput::Page(paging::assemble_page(
                            content, &request, total, top,
                        )))
                    }
                    _ => Ok(QueryOutput::List(content)),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare(
        &self,
        registered: &Registered,
        dialect: Dialect,
        params: &Params,
        request: Option<PageRequest>,
        mode: QueryMode,
        selection: Selection,
        bind: BindMode,
    ) -> AppResult<Prepared> {
        let schema = self.schema();
        if let Some(request) = &request {
            if request.size() > self.inner.config.max_page_size {
                return Err(AppError::validation(format!(
                    "page size {} exceeds the maximum of {}",
                    request.size(),
                    self.inner.config.max_page_size
                )));
            }
        }
        match &registered.compiled {
            Compiled::Criteria(resolved) => {
                if bind == BindMode::Strict {
                    check_declared(resolved.params(), params)?;
                }
                let request_order = match &request {
                    Some(request) => sort_terms(schema, request.sort())?,
                    None => Vec::new(),
                };
                self.prepare_criteria(
                    resolved,
                    &registered.options,
                    dialect,
                    params,
                    request,
                    request_order,
                    mode,
                    selection,
                    bind,
                )
            }
            Compiled::Template(template) => {
                let explain_params;
                let params = match bind {
                    BindMode::Strict => {
                        template.check_params(params)?;
                        params
                    }
                    BindMode::Explain => {
                        explain_params = template
                            .params()
                            .iter()
                            .map(|name| (name.as_str(), params.get(name).cloned().unwrap_or(Value::Null)))
                            .collect::<Params>();
                        &explain_params
                    }
                };
                let request_order = match &request {
                    Some(request) => sort_terms(schema, request.sort())?,
                    None => Vec::new(),
                };
                self.prepare_template(
                    template,
                    &registered.options,
                    dialect,
                    params,
                    request,
                    request_order,
                    mode,
                    selection,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_criteria(
        &self,
        resolved: &ResolvedCriteria,
        options: &QueryOptions,
        dialect: Dialect,
        params: &Params,
        request: Option<PageRequest>,
        request_order: Vec<OrderTerm>,
        mode: QueryMode,
        selection: Selection,
        bind: BindMode,
    ) -> AppResult<Prepared> {
        let schema = self.schema();
        let filter = resolved.bind_filter(params, bind)?;
        let query = &resolved.query;

        let (action, plan) = match &query.subject {
            Subject::Count => (
                Action::Count,
                Plan::Count(FilterPlan {
                    table: schema.table.to_string(),
                    filter,
                }),
            ),
            Subject::Exists => (
                Action::Exists,
                Plan::Select(SelectPlan {
                    table: schema.table.to_string(),
                    columns: vec![schema.id_field().column.to_string()],
                    distinct: false,
                    filter,
                    order: Vec::new(),
                    limit: Some(1),
                    offset: 0,
                    lock: LockMode::None,
                }),
            ),
            Subject::Delete => (
                Action::Bulk,
                Plan::Delete(FilterPlan {
                    table: schema.table.to_string(),
                    filter,
                }),
            ),
            Subject::Update(_) => (
                Action::Bulk,
                Plan::Update(UpdatePlan {
                    table: schema.table.to_string(),
                    assignments: resolved.bind_assignments(params, bind)?,
                    filter,
                }),
            ),
            Subject::Find => {
                let columns = self.select_columns(selection)?;
                let mut order = resolved.order.clone();
                order.extend(request_order);
                let id_column = schema.id_field().column;
                if !query.distinct || columns.iter().any(|c| c == id_column) {
                    order = with_tiebreaker(schema, order);
                }
                let window = Window::compute(mode, request.as_ref(), query.limit);
                let count = match (mode, &request) {
                    (QueryMode::Page, Some(_)) => Some(compiler::render(
                        Plan::Count(FilterPlan {
                            table: schema.table.to_string(),
                            filter: filter.clone(),
                        }),
                        schema,
                        dialect,
                    )?),
                    _ => None,
                };
                let plan = Plan::Select(SelectPlan {
                    table: schema.table.to_string(),
                    columns,
                    distinct: query.distinct,
                    filter,
                    order,
                    limit: window.limit,
                    offset: window.offset,
                    lock: options.lock,
                });
                return Ok(Prepared {
                    main: compiler::render(plan, schema, dialect)?,
                    count,
                    action: Action::Rows {
                        window,
                        request,
                        mode,
                        top: query.limit,
                    },
                });
            }
        };
        Ok(Prepared {
            main: compiler::render(plan, schema, dialect)?,
            count: None,
            action,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_template(
        &self,
        template: &CompiledTemplate,
        options: &QueryOptions,
        dialect: Dialect,
        params: &Params,
        request: Option<PageRequest>,
        mut order: Vec<OrderTerm>,
        mode: QueryMode,
        selection: Selection,
    ) -> AppResult<Prepared> {
        if template.query.modifying {
            return Ok(Prepared {
                main: template.render(dialect, params, &[], None, 0, LockMode::None)?,
                count: None,
                action: Action::Bulk,
            });
        }
        let window = Window::compute(mode, request.as_ref(), None);
        let wraps = !order.is_empty() || window.limit.is_some() || window.offset > 0;
        if wraps && matches!(selection, Selection::Entity(_)) {
            order = with_tiebreaker(self.schema(), order);
        }
        let count = match (mode, &request) {
            (QueryMode::Page, Some(_)) => Some(template.render_count(dialect, params)?),
            _ => None,
        };
        Ok(Prepared {
            main: template.render(dialect, params, &order, window.limit, window.offset, options.lock)?,
            count,
            action: Action::Rows {
                window,
                request,
                mode,
                top: None,
            },
        })
    }

    fn select_columns(&self, selection: Selection) -> AppResult<Vec<String>> {
        let schema = self.schema();
        match selection {
            Selection::Entity(target) if std::ptr::eq(target, schema) => {
                Ok(entity::all_columns(schema))
            }
            Selection::Entity(target) => Err(AppError::mapping(format!(
                "cannot map {} rows into {}",
                schema.entity, target.entity
            ))),
            Selection::Fields(names) => names
                .iter()
                .map(|name| schema.require_field(name).map(|f| f.column.to_string()))
                .collect(),
            Selection::Scalar => Err(AppError::unsupported(
                "scalar results need a template query",
            )),
        }
    }

    /// Normalize entity rows, resolve them through the persistence context
    /// and attach the requested relations.
    pub(crate) async fn load_entities(
        &self,
        session: &mut Session,
        rows: Vec<Row>,
        graph: &[String],
        read_only: bool,
    ) -> AppResult<Vec<Row>> {
        let schema = self.schema();
        let mut rows: Vec<Row> = rows
            .into_iter()
            .map(|row| {
                let row = row.into_logical(schema);
                if read_only {
                    row
                } else {
                    session.context_mut().resolve(schema, row)
                }
            })
            .collect();
        for relation in graph {
            self.attach_relation(session, &mut rows, relation, read_only)
                .await?;
        }
        Ok(rows)
    }

    async fn attach_relation(
        &self,
        session: &mut Session,
        rows: &mut [Row],
        name: &str,
        read_only: bool,
    ) -> AppResult<()> {
        let schema = self.schema();
        let relation = schema
            .relation(name)
            .ok_or_else(|| AppError::unknown_field(schema.entity, name))?;
        let target = relation.target;

        let mut keys: Vec<Value> = Vec::new();
        for row in rows.iter() {
            if let Some(key) = row.get(relation.field).filter(|k| !k.is_null()) {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }

        let mut related: HashMap<String, Row> = HashMap::with_capacity(keys.len());
        if !keys.is_empty() {
            let statement = compiler::render(entity::find_by_ids(target, keys), target, session.dialect())?
                .with_source(format!("{}#{name}", schema.entity));
            for row in session.fetch(&statement).await? {
                let row = row.into_logical(target);
                let row = if read_only {
                    row
                } else {
                    session.context_mut().resolve(target, row)
                };
                if let Some(id) = row.get(target.id) {
                    related.insert(id.key(), row.clone());
                }
            }
        }

        for row in rows.iter_mut() {
            let target_row = row
                .get(relation.field)
                .filter(|k| !k.is_null())
                .and_then(|k| related.get(&k.key()).cloned());
            row.set_related(relation.name, target_row);
        }
        Ok(())
    }

    /// Rows mode, unwrapped.
    pub async fn find_list<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
    ) -> AppResult<Vec<T>> {
        match self.execute(session, name, params, None, QueryMode::List).await? {
            QueryOutput::List(items) => Ok(items),
            other => Err(other.unexpected("list").in_descriptor(name)),
        }
    }

    /// A page with its total count.
    pub async fn find_page<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
        request: &PageRequest,
    ) -> AppResult<PageResult<T>> {
        match self
            .execute(session, name, params, Some(request), QueryMode::Page)
            .await?
        {
            QueryOutput::Page(page) => Ok(page),
            other => Err(other.unexpected("page").in_descriptor(name)),
        }
    }

    /// A slice: content and `has_next`, no count statement.
    pub async fn find_slice<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
        request: &PageRequest,
    ) -> AppResult<PageResult<T>> {
        match self
            .execute(session, name, params, Some(request), QueryMode::Slice)
            .await?
        {
            QueryOutput::Page(page) => Ok(page),
            other => Err(other.unexpected("slice").in_descriptor(name)),
        }
    }

    /// At most one result; more than one row is an error.
    pub async fn find_one<T: FromRow>(
        &self,
        session: &mut Session,
        name: &str,
        params: &Params,
    ) -> AppResult<Option<T>> {
        let mut items = self.find_list::<T>(session, name, params).await?;
        if items.len() > 1 {
            return Err(AppError::incorrect_result_size(1, items.len()).in_descriptor(name));
        }
        Ok(items.pop())
    }

    /// Result of a `count` query.
    pub async fn count_by(&self, session: &mut Session, name: &str, params: &Params) -> AppResult<i64> {
        match self
            .execute::<Row>(session, name, params, None, QueryMode::List)
            .await?
        {
            QueryOutput::Count(n) => Ok(n),
            other => Err(other.unexpected("count").in_descriptor(name)),
        }
    }

    /// Result of an `exists` query.
    pub async fn exists_by(&self, session: &mut Session, name: &str, params: &Params) -> AppResult<bool> {
        match self
            .execute::<Row>(session, name, params, None, QueryMode::List)
            .await?
        {
            QueryOutput::Exists(found) => Ok(found),
            other => Err(other.unexpected("exists").in_descriptor(name)),
        }
    }

    /// Run a bulk update or delete and return the affected row count.
    pub async fn execute_bulk(&self, session: &mut Session, name: &str, params: &Params) -> AppResult<u64> {
        match self
            .execute::<Row>(session, name, params, None, QueryMode::List)
            .await?
        {
            QueryOutput::Affected(n) => Ok(n),
            other => Err(other.unexpected("bulk result").in_descriptor(name)),
        }
    }

    /// Render a registered query without executing it. Parameters that are
    /// not supplied render as `NULL` binds.
    pub fn explain(
        &self,
        name: &str,
        dialect: Dialect,
        mode: QueryMode,
        page: Option<&PageRequest>,
        params: &Params,
    ) -> AppResult<Explained> {
        let registered = self.registered(name)?;
        let request = match (mode, page) {
            (_, Some(request)) => Some(request.clone()),
            (QueryMode::List, None) => None,
            (_, None) => Some(PageRequest::of(0, self.inner.config.default_page_size)?),
        };
        let prepared = self
            .prepare(
                registered,
                dialect,
                params,
                request,
                mode,
                Selection::Entity(self.schema()),
                BindMode::Explain,
            )
            .map_err(|e| e.in_descriptor(name))?;
        Ok(Explained {
            sql: prepared.main.sql,
            count_sql: prepared.count.map(|c| c.sql),
        })
    }
}

fn check_declared(declared: &[String], params: &Params) -> AppResult<()> {
    if let Some(missing) = declared.iter().find(|d| params.get(d).is_none()) {
        return Err(AppError::unbound_parameter(missing));
    }
    if let Some(unused) = params.names().find(|n| !declared.iter().any(|d| d == *n)) {
        return Err(AppError::unused_parameter(unused));
    }
    Ok(())
}
