//! Query registration and eager validation.
//!
//! Every descriptor is parsed and compiled by [`RepositoryBuilder::build`],
//! so a misspelled field or placeholder fails at start-up rather than on
//! the first call.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::info;

use dataquery_core::config::QueryConfig;
use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::Entity;
use dataquery_core::types::EntitySchema;

use crate::auditing::AuditingHandler;
use crate::compiler::{CompiledTemplate, ResolvedCriteria};
use crate::descriptor::{CriteriaQuery, QueryDescriptor, QueryOptions, TemplateQuery};
use crate::parser;

/// A descriptor after compilation.
#[derive(Debug, Clone)]
pub(crate) enum Compiled {
    Criteria(ResolvedCriteria),
    Template(CompiledTemplate),
}

impl Compiled {
    pub(crate) fn descriptor(&self) -> QueryDescriptor {
        match self {
            Self::Criteria(resolved) => QueryDescriptor::Criteria(resolved.query.clone()),
            Self::Template(template) => QueryDescriptor::Template(template.query.clone()),
        }
    }

    pub(crate) fn is_modifying(&self) -> bool {
        match self {
            Self::Criteria(resolved) => resolved.query.subject.is_modifying(),
            Self::Template(template) => template.query.modifying,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Registered {
    pub(crate) compiled: Compiled,
    pub(crate) options: QueryOptions,
}

#[derive(Debug)]
pub(crate) struct RepositoryInner {
    pub(crate) schema: &'static EntitySchema,
    pub(crate) config: QueryConfig,
    pub(crate) queries: HashMap<String, Registered>,
    pub(crate) default_graph: Vec<String>,
    pub(crate) auditing: Option<AuditingHandler>,
}

/// Registered queries and CRUD operations for one entity type.
///
/// Cheap to clone; all clones share the compiled descriptors.
#[derive(Debug)]
pub struct Repository<E: Entity> {
    pub(crate) inner: Arc<RepositoryInner>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Start registering queries.
    pub fn builder(config: &QueryConfig) -> RepositoryBuilder<E> {
        RepositoryBuilder::new(config)
    }

    /// The entity's table mapping.
    pub fn schema(&self) -> &'static EntitySchema {
        self.inner.schema
    }

    /// Names of the registered queries, sorted.
    pub fn query_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The descriptor registered under `name`.
    pub fn descriptor(&self, name: &str) -> Option<QueryDescriptor> {
        self.inner.queries.get(name).map(|r| r.compiled.descriptor())
    }

    pub(crate) fn registered(&self, name: &str) -> AppResult<&Registered> {
        self.inner.queries.get(name).ok_or_else(|| {
            AppError::not_found(format!(
                "no query named '{name}' is registered for {}",
                self.inner.schema.entity
            ))
        })
    }
}

enum Pending {
    Derived,
    Criteria(CriteriaQuery),
    Template(TemplateQuery),
}

/// Collects descriptors for one entity type.
pub struct RepositoryBuilder<E: Entity> {
    config: QueryConfig,
    pending: Vec<(String, Pending, QueryOptions)>,
    named: HashMap<String, TemplateQuery>,
    default_graph: Vec<String>,
    auditing: Option<AuditingHandler>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RepositoryBuilder<E> {
    fn new(config: &QueryConfig) -> Self {
        Self {
            auditing: config.auditing.then(AuditingHandler::default),
            config: config.clone(),
            pending: Vec::new(),
            named: HashMap::new(),
            default_graph: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Register a query whose behavior comes from its name. A named query
    /// `"<Entity>.<name>"` takes precedence over the name grammar.
    pub fn derived(self, name: &str) -> Self {
        self.derived_with(name, QueryOptions::new())
    }

    /// [`RepositoryBuilder::derived`] with execution options.
    pub fn derived_with(mut self, name: &str, options: QueryOptions) -> Self {
        self.pending.push((name.to_string(), Pending::Derived, options));
        self
    }

    /// Register a structured query.
    pub fn criteria(mut self, name: &str, query: CriteriaQuery, options: QueryOptions) -> Self {
        self.pending
            .push((name.to_string(), Pending::Criteria(query), options));
        self
    }

    /// Register a SQL template.
    pub fn template(mut self, name: &str, template: TemplateQuery, options: QueryOptions) -> Self {
        self.pending
            .push((name.to_string(), Pending::Template(template), options));
        self
    }

    /// Declare a named query, looked up by derived queries under its
    /// qualified name (`Member.findByUsername`).
    pub fn named_query(mut self, qualified_name: &str, template: TemplateQuery) -> Self {
        self.named.insert(qualified_name.to_string(), template);
        self
    }

    /// Relations fetched eagerly by `find_all`.
    pub fn find_all_graph(mut self, relations: &[&str]) -> Self {
        self.default_graph = relations.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Replace the audit handler.
    pub fn auditing(mut self, handler: AuditingHandler) -> Self {
        self.auditing = Some(handler);
        self
    }

    /// Save entities without audit stamps.
    pub fn without_auditing(mut self) -> Self {
        self.auditing = None;
        self
    }

    /// Parse and compile every descriptor. The first failure is returned
    /// with the offending descriptor's name attached.
    pub fn build(self) -> AppResult<Repository<E>> {
        let schema = E::schema();
        check_graph(schema, &self.default_graph).map_err(|e| e.in_descriptor("findAll"))?;

        let mut queries = HashMap::with_capacity(self.pending.len());
        for (name, pending, options) in self.pending {
            let registered = compile(schema, &self.named, &name, pending, options)
                .map_err(|e| e.in_descriptor(name.as_str()))?;
            if queries.insert(name.clone(), registered).is_some() {
                return Err(AppError::malformed_descriptor("query registered twice")
                    .in_descriptor(name));
            }
        }

        info!(
            entity = schema.entity,
            queries = queries.len(),
            "Registered repository queries"
        );

        Ok(Repository {
            inner: Arc::new(RepositoryInner {
                schema,
                config: self.config,
                queries,
                default_graph: self.default_graph,
                auditing: self.auditing,
            }),
            _entity: PhantomData,
        })
    }
}

fn compile(
    schema: &'static EntitySchema,
    named: &HashMap<String, TemplateQuery>,
    name: &str,
    pending: Pending,
    options: QueryOptions,
) -> AppResult<Registered> {
    let compiled = match pending {
        Pending::Derived => match named.get(&format!("{}.{name}", schema.entity)) {
            Some(template) => Compiled::Template(CompiledTemplate::compile(template)?),
            None => Compiled::Criteria(ResolvedCriteria::resolve(
                &parser::parse(name, schema)?,
                schema,
            )?),
        },
        Pending::Criteria(query) => Compiled::Criteria(ResolvedCriteria::resolve(&query, schema)?),
        Pending::Template(template) => Compiled::Template(CompiledTemplate::compile(&template)?),
    };
    check_graph(schema, &options.entity_graph)?;
    if compiled.is_modifying() && options.lock.is_locking() {
        return Err(AppError::malformed_descriptor(
            "lock modes apply to row-returning queries only",
        ));
    }
    Ok(Registered { compiled, options })
}

fn check_graph(schema: &EntitySchema, relations: &[String]) -> AppResult<()> {
    match relations.iter().find(|r| schema.relation(r).is_none()) {
        Some(unknown) => Err(AppError::unknown_field(schema.entity, unknown)),
        None => Ok(()),
    }
}
