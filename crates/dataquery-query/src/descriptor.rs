//! Query descriptors: what a registered query does, before compilation.

use serde::Serialize;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::types::{
    ComparisonOp, Connector, LockMode, Operand, PredicateGroup, Sort, SortDirection, Value,
};
use dataquery_core::types::schema::to_pascal_case;

/// How a field is changed by an update query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// `field = operand`.
    Set,
    /// `field = field + operand`.
    Increment,
}

/// One `SET` term of an update query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAssignment {
    /// Logical field name.
    pub field: String,
    /// Set or increment.
    pub kind: AssignmentKind,
    /// New value or increment.
    pub operand: Operand,
}

/// What a criteria query returns or does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Rows.
    Find,
    /// Number of matching rows.
    Count,
    /// Whether any row matches.
    Exists,
    /// Bulk delete; returns the affected row count.
    Delete,
    /// Bulk update; returns the affected row count.
    Update(Vec<FieldAssignment>),
}

impl Subject {
    /// Whether the subject modifies rows.
    pub fn is_modifying(&self) -> bool {
        matches!(self, Self::Delete | Self::Update(_))
    }
}

/// A structured query over one entity, built from the method-name grammar
/// or with the builder methods below.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaQuery {
    /// What the query returns.
    pub subject: Subject,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// `Top`/`First` cap on the number of rows.
    pub limit: Option<u64>,
    /// Filter; `None` matches every row.
    pub predicate: Option<PredicateGroup>,
    /// Declared ordering, applied before any request sort.
    pub order: Sort,
}

impl CriteriaQuery {
    fn with_subject(subject: Subject) -> Self {
        Self {
            subject,
            distinct: false,
            limit: None,
            predicate: None,
            order: Sort::unsorted(),
        }
    }

    /// Row-returning query.
    pub fn find() -> Self {
        Self::with_subject(Subject::Find)
    }

    /// Count query.
    pub fn count() -> Self {
        Self::with_subject(Subject::Count)
    }

    /// Existence query.
    pub fn exists() -> Self {
        Self::with_subject(Subject::Exists)
    }

    /// Bulk delete.
    pub fn delete() -> Self {
        Self::with_subject(Subject::Delete)
    }

    /// Bulk update; add assignments with [`CriteriaQuery::set`] and
    /// [`CriteriaQuery::increment`].
    pub fn update() -> Self {
        Self::with_subject(Subject::Update(Vec::new()))
    }

    /// Select distinct rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Return at most `n` rows.
    pub fn top(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Filter rows.
    pub fn filter(mut self, predicate: PredicateGroup) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Append a declared ordering term.
    pub fn order_by(mut self, direction: SortDirection, field: impl Into<String>) -> Self {
        self.order = self.order.and(direction, field);
        self
    }

    /// Assign a field (update queries).
    pub fn set(self, field: impl Into<String>, operand: Operand) -> Self {
        self.assign(field, AssignmentKind::Set, operand)
    }

    /// Increment a numeric field (update queries).
    pub fn increment(self, field: impl Into<String>, operand: Operand) -> Self {
        self.assign(field, AssignmentKind::Increment, operand)
    }

    fn assign(mut self, field: impl Into<String>, kind: AssignmentKind, operand: Operand) -> Self {
        if let Subject::Update(assignments) = &mut self.subject {
            assignments.push(FieldAssignment {
                field: field.into(),
                kind,
                operand,
            });
        }
        self
    }

    /// Parameter names the query expects, in first-use order.
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut add = |operand: &Operand| {
            if let Operand::Param(name) = operand {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        };
        if let Subject::Update(assignments) = &self.subject {
            for assignment in assignments {
                add(&assignment.operand);
            }
        }
        if let Some(predicate) = &self.predicate {
            for p in predicate.predicates() {
                add(&p.operand);
            }
        }
        names
    }

    /// Render the query back into the method-name grammar.
    ///
    /// Update subjects and literal operands have no grammar form.
    pub fn method_name(&self) -> AppResult<String> {
        let mut name = match &self.subject {
            Subject::Find => "find",
            Subject::Count => "count",
            Subject::Exists => "exists",
            Subject::Delete => "delete",
            Subject::Update(_) => {
                return Err(AppError::unsupported(
                    "update queries cannot be expressed as a method name",
                ));
            }
        }
        .to_string();
        if self.distinct {
            name.push_str("Distinct");
        }
        if let Some(n) = self.limit {
            name.push_str(&format!("Top{n}"));
        }
        if let Some(predicate) = &self.predicate {
            name.push_str("By");
            for (i, (connector, p)) in predicate.terms().iter().enumerate() {
                if matches!(p.operand, Operand::Literal(_)) {
                    return Err(AppError::unsupported(format!(
                        "literal operand on '{}' cannot be expressed as a method name",
                        p.field
                    )));
                }
                if i > 0 {
                    name.push_str(match connector {
                        Connector::And => "And",
                        Connector::Or => "Or",
                    });
                }
                name.push_str(&to_pascal_case(&p.field));
                name.push_str(op_keyword(p.op));
            }
        }
        if !self.order.is_unsorted() {
            name.push_str("OrderBy");
            for term in self.order.iter() {
                name.push_str(&to_pascal_case(&term.field));
                name.push_str(match term.direction {
                    SortDirection::Asc => "Asc",
                    SortDirection::Desc => "Desc",
                });
            }
        }
        Ok(name)
    }
}

/// Canonical grammar keyword for an operator.
pub(crate) fn op_keyword(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "",
        ComparisonOp::Ne => "Not",
        ComparisonOp::Gt => "GreaterThan",
        ComparisonOp::Gte => "GreaterThanEqual",
        ComparisonOp::Lt => "LessThan",
        ComparisonOp::Lte => "LessThanEqual",
        ComparisonOp::In => "In",
        ComparisonOp::NotIn => "NotIn",
        ComparisonOp::Like => "Like",
        ComparisonOp::IsNull => "IsNull",
        ComparisonOp::IsNotNull => "IsNotNull",
    }
}

/// A hand-written SQL query with `:name` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateQuery {
    /// SQL text.
    pub sql: String,
    /// Declared parameter names.
    pub params: Vec<String>,
    /// Lighter count query used in page mode.
    pub count_sql: Option<String>,
    /// Whether the query modifies rows and returns an affected count.
    pub modifying: bool,
}

impl TemplateQuery {
    /// A read query without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            count_sql: None,
            modifying: false,
        }
    }

    /// Declare a parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Supply an explicit count query for page mode.
    pub fn count_query(mut self, sql: impl Into<String>) -> Self {
        self.count_sql = Some(sql.into());
        self
    }

    /// Mark the query as an update/delete.
    pub fn modifying(mut self) -> Self {
        self.modifying = true;
        self
    }
}

/// Per-query execution options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    /// Row locking.
    pub lock: LockMode,
    /// Relations fetched eagerly with one follow-up query each.
    pub entity_graph: Vec<String>,
    /// Do not register results in the persistence context.
    pub read_only: bool,
    /// Clear the persistence context after a bulk statement. `None` uses
    /// the configured default.
    pub clear_automatically: Option<bool>,
}

impl QueryOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request row locking.
    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    /// Fetch the named relations eagerly.
    pub fn entity_graph(mut self, relations: &[&str]) -> Self {
        self.entity_graph = relations.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Skip the persistence context for results.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Override whether bulk execution clears the persistence context.
    pub fn clear_automatically(mut self, clear: bool) -> Self {
        self.clear_automatically = Some(clear);
        self
    }
}

/// A registered query: structured criteria or a raw template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryDescriptor {
    /// Structured criteria.
    Criteria(CriteriaQuery),
    /// Raw SQL template.
    Template(TemplateQuery),
}

impl QueryDescriptor {
    /// Whether the query returns an affected-row count.
    pub fn is_modifying(&self) -> bool {
        match self {
            Self::Criteria(query) => query.subject.is_modifying(),
            Self::Template(template) => template.modifying,
        }
    }
}

/// A named parameter operand for builders.
pub fn param(name: impl Into<String>) -> Operand {
    Operand::Param(name.into())
}

/// A literal operand helper for builders.
pub fn literal(value: impl Into<Value>) -> Operand {
    Operand::Literal(value.into())
}
