//! Predicate types for declarative query building.

use serde::{Deserialize, Serialize};

use crate::types::schema::FieldType;
use crate::types::value::Value;

/// Comparison operator of a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    /// Exact equality.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// SQL `IN` list membership.
    In,
    /// SQL `NOT IN`.
    NotIn,
    /// SQL `LIKE` pattern match.
    Like,
    /// SQL `IS NULL` check.
    IsNull,
    /// SQL `IS NOT NULL` check.
    IsNotNull,
}

impl ComparisonOp {
    /// Whether the operator compares against an operand.
    pub fn takes_operand(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Whether the operand must be a list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// SQL rendering of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator may be applied to a field of the given type.
    pub fn supports(&self, ty: FieldType, nullable: bool) -> bool {
        match self {
            Self::Eq | Self::Ne | Self::In | Self::NotIn => true,
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => ty != FieldType::Bool,
            Self::Like => ty == FieldType::Text,
            Self::IsNull | Self::IsNotNull => nullable,
        }
    }
}

/// Logical connector between two predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    /// Both sides must hold.
    And,
    /// Either side must hold.
    Or,
}

impl Connector {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// What a predicate compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// A named parameter bound at call time.
    Param(String),
    /// A literal value fixed at construction.
    Literal(Value),
    /// No operand (null checks).
    None,
}

/// A single condition on a named field (or `relation.field` path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Logical field name or relation path.
    pub field: String,
    /// The comparison operator.
    pub op: ComparisonOp,
    /// The operand.
    pub operand: Operand,
}

impl FieldPredicate {
    /// Create a new predicate.
    pub fn new(field: impl Into<String>, op: ComparisonOp, operand: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            operand,
        }
    }

    /// Compare against a named parameter.
    pub fn param(field: impl Into<String>, op: ComparisonOp, name: impl Into<String>) -> Self {
        Self::new(field, op, Operand::Param(name.into()))
    }

    /// Compare against a literal.
    pub fn literal(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self::new(field, op, Operand::Literal(value.into()))
    }

    /// Shorthand for a literal equality.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::literal(field, ComparisonOp::Eq, value)
    }

    /// `field IS NULL`.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, ComparisonOp::IsNull, Operand::None)
    }
}

/// Ordered predicates joined by connectors, evaluated left to right with
/// `AND` binding tighter than `OR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateGroup {
    terms: Vec<(Connector, FieldPredicate)>,
}

impl PredicateGroup {
    /// Start a group with its first predicate.
    pub fn new(first: FieldPredicate) -> Self {
        Self {
            terms: vec![(Connector::And, first)],
        }
    }

    /// Append a predicate joined with `AND`.
    pub fn and(mut self, predicate: FieldPredicate) -> Self {
        self.terms.push((Connector::And, predicate));
        self
    }

    /// Append a predicate joined with `OR`.
    pub fn or(mut self, predicate: FieldPredicate) -> Self {
        self.terms.push((Connector::Or, predicate));
        self
    }

    /// Append a predicate with an explicit connector.
    pub fn push(&mut self, connector: Connector, predicate: FieldPredicate) {
        self.terms.push((connector, predicate));
    }

    /// Append another group, joining its first term with `connector`.
    pub fn append(mut self, connector: Connector, other: PredicateGroup) -> Self {
        for (i, (c, p)) in other.terms.into_iter().enumerate() {
            self.terms.push((if i == 0 { connector } else { c }, p));
        }
        self
    }

    /// Terms in order. The connector of the first term is meaningless.
    pub fn terms(&self) -> &[(Connector, FieldPredicate)] {
        &self.terms
    }

    /// Predicates in order, without connectors.
    pub fn predicates(&self) -> impl Iterator<Item = &FieldPredicate> {
        self.terms.iter().map(|(_, p)| p)
    }

    /// Split into `OR`-separated runs of `AND`-ed predicates.
    pub fn disjuncts(&self) -> Vec<Vec<&FieldPredicate>> {
        let mut groups: Vec<Vec<&FieldPredicate>> = Vec::new();
        for (i, (connector, predicate)) in self.terms.iter().enumerate() {
            if i == 0 || *connector == Connector::Or {
                groups.push(vec![predicate]);
            } else if let Some(last) = groups.last_mut() {
                last.push(predicate);
            }
        }
        groups
    }
}
