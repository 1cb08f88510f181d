//! Composable call-time predicates.

use dataquery_core::types::{ComparisonOp, Connector, FieldPredicate, PredicateGroup, Value};

/// An optional predicate over one entity, combined with others at call
/// time. The empty specification constrains nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specification(Option<PredicateGroup>);

impl Specification {
    /// Matches every row.
    pub fn all() -> Self {
        Self(None)
    }

    /// Wrap a predicate group.
    pub fn group(group: PredicateGroup) -> Self {
        Self(Some(group))
    }

    /// `field <op> value`.
    pub fn field(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self::group(PredicateGroup::new(FieldPredicate::literal(field, op, value)))
    }

    /// `field = value`.
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, ComparisonOp::Eq, value)
    }

    /// Both must hold. An empty side is ignored.
    ///
    /// Terms are flattened, so `AND` binds tighter than an `OR` inside
    /// either side.
    pub fn and(self, other: Self) -> Self {
        self.combine(Connector::And, other)
    }

    /// Either may hold. An empty side is ignored.
    pub fn or(self, other: Self) -> Self {
        self.combine(Connector::Or, other)
    }

    fn combine(self, connector: Connector, other: Self) -> Self {
        match (self.0, other.0) {
            (None, rhs) => Self(rhs),
            (lhs, None) => Self(lhs),
            (Some(lhs), Some(rhs)) => Self(Some(lhs.append(connector, rhs))),
        }
    }

    /// Whether this constrains nothing.
    pub fn is_unconstrained(&self) -> bool {
        self.0.is_none()
    }

    /// The predicate, if any.
    pub fn into_predicate(self) -> Option<PredicateGroup> {
        self.0
    }
}
