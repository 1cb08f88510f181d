//! Predicate-to-statement compiler.
//!
//! Criteria queries are resolved against the entity schema once, at
//! registration, and turned into [`Plan`]s at call time once parameter
//! values are known. Plans render to SQL for the session's dialect.
//! Templates render by substituting placeholders.

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::types::{
    Assignment, Bind, ComparisonOp, Condition, Connector, Dialect, EntitySchema, FieldDef,
    FieldType, Filter, FilterPlan, InsertPlan, LockMode, Operand, OrderTerm, Plan, SelectPlan,
    Statement, Subquery, UpdatePlan, Value,
};

use crate::descriptor::{AssignmentKind, CriteriaQuery, Subject, TemplateQuery};
use crate::params::Params;
use crate::template::SqlTemplate;

/// Accumulates SQL text and positional binds.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: Dialect,
    sql: String,
    binds: Vec<Bind>,
}

impl SqlWriter {
    /// Start an empty statement.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append a placeholder bound to `value`.
    pub fn bind(&mut self, value: Value, hint: Option<FieldType>) {
        self.binds.push(Bind { value, hint });
        let placeholder = self.dialect.placeholder(self.binds.len());
        self.sql.push_str(&placeholder);
    }

    /// Append `($1, $2, ...)`, or `(NULL)` for an empty list.
    pub fn bind_list(&mut self, items: Vec<Value>, hint: Option<FieldType>) {
        if items.is_empty() {
            self.sql.push_str("(NULL)");
            return;
        }
        self.sql.push('(');
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.bind(item, hint);
        }
        self.sql.push(')');
    }

    /// Rendered SQL and binds.
    pub fn into_parts(self) -> (String, Vec<Bind>) {
        (self.sql, self.binds)
    }

    /// Complete the statement.
    pub fn finish(self, plan: Plan) -> Statement {
        Statement {
            sql: self.sql,
            binds: self.binds,
            plan,
            source: None,
        }
    }
}

/// Render a structured plan. `Plan::Native` has no structured form and
/// is rejected.
pub fn render(plan: Plan, schema: &EntitySchema, dialect: Dialect) -> AppResult<Statement> {
    let mut w = SqlWriter::new(dialect);
    match &plan {
        Plan::Select(select) => {
            let alias = schema.alias();
            w.push("SELECT ");
            if select.distinct {
                w.push("DISTINCT ");
            }
            let columns: Vec<String> = select
                .columns
                .iter()
                .map(|c| format!("{alias}.{c}"))
                .collect();
            w.push(&columns.join(", "));
            w.push(&format!(" FROM {} {alias}", select.table));
            write_filter(&mut w, &select.filter, Some(&alias));
            if !select.order.is_empty() {
                let terms: Vec<String> = select
                    .order
                    .iter()
                    .map(|t| format!("{alias}.{} {}", t.column, t.direction.as_sql()))
                    .collect();
                w.push(&format!(" ORDER BY {}", terms.join(", ")));
            }
            w.push(&dialect.paging_clause(select.limit, select.offset));
            w.push(dialect.lock_clause(select.lock));
        }
        Plan::Count(count) => {
            let alias = schema.alias();
            w.push(&format!("SELECT COUNT(*) FROM {} {alias}", count.table));
            write_filter(&mut w, &count.filter, Some(&alias));
        }
        Plan::Delete(delete) => {
            w.push(&format!("DELETE FROM {}", delete.table));
            write_filter(&mut w, &delete.filter, None);
        }
        Plan::Update(update) => {
            w.push(&format!("UPDATE {} SET ", update.table));
            for (i, (column, assignment)) in update.assignments.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                let hint = column_type(schema, column);
                match assignment {
                    Assignment::Set(value) => {
                        w.push(&format!("{column} = "));
                        w.bind(value.clone(), hint);
                    }
                    Assignment::Increment(value) => {
                        w.push(&format!("{column} = {column} + "));
                        w.bind(value.clone(), hint);
                    }
                }
            }
            write_filter(&mut w, &update.filter, None);
        }
        Plan::Insert(insert) => {
            let columns: Vec<&str> = insert.values.iter().map(|(c, _)| c.as_str()).collect();
            w.push(&format!(
                "INSERT INTO {} ({}) VALUES (",
                insert.table,
                columns.join(", ")
            ));
            for (i, (column, value)) in insert.values.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.bind(value.clone(), column_type(schema, column));
            }
            w.push(")");
            if let (Some(column), Dialect::Postgres) = (&insert.returning, dialect) {
                w.push(&format!(" RETURNING {column}"));
            }
        }
        Plan::Native => {
            return Err(AppError::internal("native statements have no structured plan"));
        }
    }
    Ok(w.finish(plan))
}

fn column_type(schema: &EntitySchema, column: &str) -> Option<FieldType> {
    schema.field_by_column(column).map(|f| f.ty)
}

fn write_filter(w: &mut SqlWriter, filter: &Filter, qualifier: Option<&str>) {
    if filter.is_empty() {
        return;
    }
    w.push(" WHERE ");
    for (i, (connector, condition)) in filter.iter().enumerate() {
        if i > 0 {
            w.push(match connector {
                Connector::And => " AND ",
                Connector::Or => " OR ",
            });
        }
        let column = match qualifier {
            Some(alias) => format!("{alias}.{}", condition.column),
            None => condition.column.clone(),
        };
        match &condition.via {
            Some(sub) => {
                w.push(&format!(
                    "{column} IN (SELECT sq.{} FROM {} sq WHERE ",
                    sub.key_column, sub.table
                ));
                write_comparison(w, &format!("sq.{}", sub.column), condition);
                w.push(")");
            }
            None => write_comparison(w, &column, condition),
        }
    }
}

fn write_comparison(w: &mut SqlWriter, column: &str, condition: &Condition) {
    w.push(column);
    w.push(" ");
    w.push(condition.op.as_sql());
    if !condition.op.takes_operand() {
        return;
    }
    w.push(" ");
    let value = condition.value.clone().unwrap_or(Value::Null);
    if condition.op.takes_list() {
        let items = match value {
            Value::List(items) => items,
            other => vec![other],
        };
        w.bind_list(items, condition.hint);
    } else {
        w.bind(value, condition.hint);
    }
}

/// Check a value against the field and operator it is compared with.
pub fn check_value(field: &FieldDef, op: ComparisonOp, value: &Value) -> Result<(), String> {
    if op.takes_list() {
        let Value::List(items) = value else {
            return Err(format!(
                "'{}' {} expects a list, found {}",
                field.name,
                op.as_sql(),
                value.kind()
            ));
        };
        return match items.iter().find(|v| v.is_null() || !field.ty.admits(v)) {
            Some(bad) => Err(format!(
                "'{}' list contains a {} value",
                field.name,
                bad.kind()
            )),
            None => Ok(()),
        };
    }
    match value {
        Value::List(_) => Err(format!("'{}' {} does not accept a list", field.name, op.as_sql())),
        Value::Null if !matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) => Err(format!(
            "'{}' {} does not accept null",
            field.name,
            op.as_sql()
        )),
        v if !field.ty.admits(v) => Err(format!(
            "'{}' is {:?} and cannot be compared with a {} value",
            field.name,
            field.ty,
            v.kind()
        )),
        _ => Ok(()),
    }
}

/// How missing or mistyped parameters are treated while binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Execution: every parameter must be present and well typed.
    Strict,
    /// Explain: missing parameters render as typed `NULL` placeholders.
    Explain,
}

#[derive(Debug, Clone)]
struct ResolvedTerm {
    connector: Connector,
    field: &'static FieldDef,
    column: &'static str,
    op: ComparisonOp,
    operand: Operand,
    via: Option<Subquery>,
}

#[derive(Debug, Clone)]
struct ResolvedAssignment {
    field: &'static FieldDef,
    kind: AssignmentKind,
    operand: Operand,
}

/// A criteria query checked against its entity schema.
#[derive(Debug, Clone)]
pub struct ResolvedCriteria {
    /// The query as registered.
    pub query: CriteriaQuery,
    /// Schema it was resolved against.
    pub schema: &'static EntitySchema,
    /// Declared ordering as physical columns.
    pub order: Vec<OrderTerm>,
    terms: Vec<ResolvedTerm>,
    assignments: Vec<ResolvedAssignment>,
    params: Vec<String>,
}

impl ResolvedCriteria {
    /// Resolve every field, operator, operand and ordering term.
    pub fn resolve(query: &CriteriaQuery, schema: &'static EntitySchema) -> AppResult<Self> {
        if query.limit == Some(0) {
            return Err(AppError::malformed_descriptor("row limit must be positive"));
        }

        let mut terms = Vec::new();
        if let Some(group) = &query.predicate {
            for (connector, predicate) in group.terms() {
                let path = schema.resolve(&predicate.field)?;
                let field = path.field;
                if !predicate.op.supports(field.ty, field.nullable) {
                    return Err(AppError::malformed_descriptor(format!(
                        "operator {} is not supported on {} field '{}'",
                        predicate.op.as_sql(),
                        if field.nullable { "nullable" } else { "non-null" },
                        predicate.field
                    )));
                }
                match (&predicate.operand, predicate.op.takes_operand()) {
                    (Operand::None, true) => {
                        return Err(AppError::malformed_descriptor(format!(
                            "'{}' {} needs an operand",
                            predicate.field,
                            predicate.op.as_sql()
                        )));
                    }
                    (Operand::Param(_) | Operand::Literal(_), false) => {
                        return Err(AppError::malformed_descriptor(format!(
                            "'{}' {} takes no operand",
                            predicate.field,
                            predicate.op.as_sql()
                        )));
                    }
                    (Operand::Literal(value), true) => {
                        check_value(field, predicate.op, value)
                            .map_err(AppError::malformed_descriptor)?;
                    }
                    _ => {}
                }
                let (column, via) = match path.relation {
                    None => (field.column, None),
                    Some(relation) => {
                        let key = schema.require_field(relation.field)?;
                        (
                            key.column,
                            Some(Subquery {
                                table: relation.target.table.to_string(),
                                key_column: relation.target.id_field().column.to_string(),
                                column: field.column.to_string(),
                            }),
                        )
                    }
                };
                terms.push(ResolvedTerm {
                    connector: *connector,
                    field,
                    column,
                    op: predicate.op,
                    operand: predicate.operand.clone(),
                    via,
                });
            }
        }

        let mut assignments = Vec::new();
        if let Subject::Update(list) = &query.subject {
            if list.is_empty() {
                return Err(AppError::malformed_descriptor(
                    "update query has no assignments",
                ));
            }
            for assignment in list {
                let field = schema.require_field(&assignment.field)?;
                if field.name == schema.id {
                    return Err(AppError::malformed_descriptor(format!(
                        "identity field '{}' cannot be updated",
                        field.name
                    )));
                }
                if assignment.kind == AssignmentKind::Increment
                    && !matches!(field.ty, FieldType::Int | FieldType::Float)
                {
                    return Err(AppError::malformed_descriptor(format!(
                        "'{}' is not numeric and cannot be incremented",
                        field.name
                    )));
                }
                match &assignment.operand {
                    Operand::None => {
                        return Err(AppError::malformed_descriptor(format!(
                            "assignment to '{}' needs an operand",
                            field.name
                        )));
                    }
                    Operand::Literal(value) => {
                        check_value(field, ComparisonOp::Eq, value)
                            .map_err(AppError::malformed_descriptor)?;
                    }
                    Operand::Param(_) => {}
                }
                assignments.push(ResolvedAssignment {
                    field,
                    kind: assignment.kind,
                    operand: assignment.operand.clone(),
                });
            }
        }

        let mut order = Vec::new();
        for term in query.order.iter() {
            let field = schema
                .field(&term.field)
                .ok_or_else(|| AppError::unknown_sort_field(schema.entity, &term.field))?;
            order.push(OrderTerm {
                column: field.column.to_string(),
                direction: term.direction,
            });
        }

        Ok(Self {
            params: query.parameters(),
            query: query.clone(),
            schema,
            order,
            terms,
            assignments,
        })
    }

    /// Declared parameter names.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    fn operand_value(
        &self,
        operand: &Operand,
        params: &Params,
        mode: BindMode,
    ) -> AppResult<Option<Value>> {
        match operand {
            Operand::None => Ok(None),
            Operand::Literal(value) => Ok(Some(value.clone())),
            Operand::Param(name) => match (params.get(name), mode) {
                (Some(value), _) => Ok(Some(value.clone())),
                (None, BindMode::Explain) => Ok(Some(Value::Null)),
                (None, BindMode::Strict) => Err(AppError::unbound_parameter(name)),
            },
        }
    }

    /// Bind the filter. In strict mode values are type checked, and
    /// equality with `NULL` becomes `IS NULL` / `IS NOT NULL`.
    pub fn bind_filter(&self, params: &Params, mode: BindMode) -> AppResult<Filter> {
        let mut filter = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let mut op = term.op;
            let mut value = self.operand_value(&term.operand, params, mode)?;
            if mode == BindMode::Strict {
                if let Some(v) = &value {
                    check_value(term.field, op, v).map_err(AppError::validation)?;
                    if v.is_null() {
                        op = if op == ComparisonOp::Eq {
                            ComparisonOp::IsNull
                        } else {
                            ComparisonOp::IsNotNull
                        };
                        value = None;
                    }
                }
            }
            filter.push((
                term.connector,
                Condition {
                    column: term.column.to_string(),
                    op,
                    value,
                    hint: Some(term.field.ty),
                    via: term.via.clone(),
                },
            ));
        }
        Ok(filter)
    }

    /// Bind update assignments.
    pub fn bind_assignments(
        &self,
        params: &Params,
        mode: BindMode,
    ) -> AppResult<Vec<(String, Assignment)>> {
        let mut out = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            let value = self
                .operand_value(&assignment.operand, params, mode)?
                .unwrap_or(Value::Null);
            if mode == BindMode::Strict {
                check_value(assignment.field, ComparisonOp::Eq, &value)
                    .map_err(AppError::validation)?;
                if assignment.kind == AssignmentKind::Increment && value.is_null() {
                    return Err(AppError::validation(format!(
                        "cannot increment '{}' by null",
                        assignment.field.name
                    )));
                }
            }
            let assignment_value = match assignment.kind {
                AssignmentKind::Set => Assignment::Set(value),
                AssignmentKind::Increment => Assignment::Increment(value),
            };
            out.push((assignment.field.column.to_string(), assignment_value));
        }
        Ok(out)
    }
}

/// A template query with its placeholders scanned and checked.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// The query as registered.
    pub query: TemplateQuery,
    main: SqlTemplate,
    count: Option<SqlTemplate>,
}

impl CompiledTemplate {
    /// Scan the templates and check them against the declared parameters.
    /// The count template may use any subset of them.
    pub fn compile(query: &TemplateQuery) -> AppResult<Self> {
        let main = SqlTemplate::parse(&query.sql)?;
        main.check_names(query.params.iter().map(String::as_str))?;
        let count = match &query.count_sql {
            Some(sql) => {
                if query.modifying {
                    return Err(AppError::malformed_descriptor(
                        "modifying queries cannot declare a count query",
                    ));
                }
                let count = SqlTemplate::parse(sql)?;
                if let Some(missing) = count
                    .placeholders()
                    .into_iter()
                    .find(|p| !query.params.iter().any(|d| d == *p))
                {
                    return Err(AppError::unbound_parameter(missing));
                }
                Some(count)
            }
            None => None,
        };
        Ok(Self {
            query: query.clone(),
            main,
            count,
        })
    }

    /// Declared parameter names.
    pub fn params(&self) -> &[String] {
        &self.query.params
    }

    /// Check call-time parameters: every placeholder supplied, every
    /// supplied name used.
    pub fn check_params(&self, params: &Params) -> AppResult<()> {
        self.main.check_names(params.names())
    }

    /// Render the main query. Ordering and paging wrap the template in a
    /// sub-select so that they apply to its result columns.
    pub fn render(
        &self,
        dialect: Dialect,
        params: &Params,
        order: &[OrderTerm],
        limit: Option<u64>,
        offset: u64,
        lock: LockMode,
    ) -> AppResult<Statement> {
        let mut w = SqlWriter::new(dialect);
        let wrap = !order.is_empty() || limit.is_some() || offset > 0;
        if wrap {
            w.push("SELECT * FROM (");
        }
        self.main.render_into(&mut w, params)?;
        if wrap {
            w.push(") q");
            if !order.is_empty() {
                let terms: Vec<String> = order
                    .iter()
                    .map(|t| format!("q.{} {}", t.column, t.direction.as_sql()))
                    .collect();
                w.push(&format!(" ORDER BY {}", terms.join(", ")));
            }
            w.push(&dialect.paging_clause(limit, offset));
        }
        w.push(dialect.lock_clause(lock));
        Ok(w.finish(Plan::Native))
    }

    /// Render the count query: the explicit one when declared, otherwise
    /// a count over the main query.
    pub fn render_count(&self, dialect: Dialect, params: &Params) -> AppResult<Statement> {
        let mut w = SqlWriter::new(dialect);
        match &self.count {
            Some(count) => {
                let used = count.placeholders();
                let subset: Params = used
                    .iter()
                    .filter_map(|name| params.get(name).map(|v| (*name, v.clone())))
                    .collect();
                count.render_into(&mut w, &subset)?;
            }
            None => {
                w.push("SELECT COUNT(*) FROM (");
                self.main.render_into(&mut w, params)?;
                w.push(") q");
            }
        }
        Ok(w.finish(Plan::Native))
    }
}

/// Statements that read and write single entities by identity.
pub mod entity {
    use super::*;

    fn id_condition(schema: &EntitySchema, op: ComparisonOp, value: Value) -> Filter {
        let id = schema.id_field();
        vec![(
            Connector::And,
            Condition {
                column: id.column.to_string(),
                op,
                value: Some(value),
                hint: Some(id.ty),
                via: None,
            },
        )]
    }

    /// Every column of the entity, in declaration order.
    pub fn all_columns(schema: &EntitySchema) -> Vec<String> {
        schema.columns().into_iter().map(str::to_string).collect()
    }

    /// `SELECT ... WHERE id IN (...)`.
    pub fn find_by_ids(schema: &EntitySchema, ids: Vec<Value>) -> Plan {
        Plan::Select(SelectPlan {
            table: schema.table.to_string(),
            columns: all_columns(schema),
            distinct: false,
            filter: id_condition(schema, ComparisonOp::In, Value::List(ids)),
            order: Vec::new(),
            limit: None,
            offset: 0,
            lock: LockMode::None,
        })
    }

    /// `SELECT ... WHERE id = ?`.
    pub fn find_by_id(schema: &EntitySchema, id: Value) -> Plan {
        Plan::Select(SelectPlan {
            table: schema.table.to_string(),
            columns: all_columns(schema),
            distinct: false,
            filter: id_condition(schema, ComparisonOp::Eq, id),
            order: Vec::new(),
            limit: None,
            offset: 0,
            lock: LockMode::None,
        })
    }

    /// `INSERT`; a null generated identity is left to the store.
    pub fn insert(schema: &EntitySchema, values: Vec<(&'static str, Value)>) -> AppResult<Plan> {
        let mut columns = Vec::with_capacity(values.len());
        let mut returning = None;
        for (name, value) in values {
            let field = schema.require_field(name)?;
            if name == schema.id && schema.id_generated && value.is_null() {
                returning = Some(field.column.to_string());
                continue;
            }
            columns.push((field.column.to_string(), value));
        }
        Ok(Plan::Insert(InsertPlan {
            table: schema.table.to_string(),
            values: columns,
            returning,
        }))
    }

    /// `UPDATE ... SET <every non-id column> WHERE id = ?`.
    pub fn update_by_id(
        schema: &EntitySchema,
        values: Vec<(&'static str, Value)>,
    ) -> AppResult<Plan> {
        let mut id = Value::Null;
        let mut assignments = Vec::with_capacity(values.len());
        for (name, value) in values {
            let field = schema.require_field(name)?;
            if name == schema.id {
                id = value;
            } else {
                assignments.push((field.column.to_string(), Assignment::Set(value)));
            }
        }
        if id.is_null() {
            return Err(AppError::validation(format!(
                "cannot update {} without an identity",
                schema.entity
            )));
        }
        Ok(Plan::Update(UpdatePlan {
            table: schema.table.to_string(),
            assignments,
            filter: id_condition(schema, ComparisonOp::Eq, id),
        }))
    }

    /// `DELETE ... WHERE id = ?`.
    pub fn delete_by_id(schema: &EntitySchema, id: Value) -> Plan {
        Plan::Delete(FilterPlan {
            table: schema.table.to_string(),
            filter: id_condition(schema, ComparisonOp::Eq, id),
        })
    }

    /// `SELECT COUNT(*)` over the whole table.
    pub fn count_all(schema: &EntitySchema) -> Plan {
        Plan::Count(FilterPlan {
            table: schema.table.to_string(),
            filter: Vec::new(),
        })
    }
}
