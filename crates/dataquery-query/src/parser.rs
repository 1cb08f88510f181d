//! Method-name grammar.
//!
//! ```text
//! name      := subject modifiers ("By" predicate)? ("OrderBy" order+)?
//! subject   := find | read | get | query | search | stream | count
//!            | exists | delete | remove
//! modifiers := "Distinct"? (("Top" | "First") N?)? <other text, ignored>
//! predicate := term (("And" | "Or") term)*
//! term      := Field Operator?
//! order     := Field ("Asc" | "Desc")?
//! ```
//!
//! Fields are the entity's logical names in PascalCase (`team_id` is
//! `TeamId`) and `relation.field` paths (`team.name` is `TeamName`). Every
//! complete reading of the name is enumerated; a name with no reading or
//! with more than one is rejected.

use std::collections::HashMap;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::types::schema::to_pascal_case;
use dataquery_core::types::{
    ComparisonOp, Connector, EntitySchema, FieldPredicate, Operand, PredicateGroup, Sort,
    SortDirection, SortField,
};

use crate::descriptor::{CriteriaQuery, Subject};

const SUBJECTS: &[(&str, SubjectKind)] = &[
    ("find", SubjectKind::Find),
    ("read", SubjectKind::Find),
    ("get", SubjectKind::Find),
    ("query", SubjectKind::Find),
    ("search", SubjectKind::Find),
    ("stream", SubjectKind::Find),
    ("count", SubjectKind::Count),
    ("exists", SubjectKind::Exists),
    ("delete", SubjectKind::Delete),
    ("remove", SubjectKind::Delete),
];

/// Operator keywords. The empty keyword (equality) must stay last.
const OPERATORS: &[(&str, ComparisonOp)] = &[
    ("IsNotNull", ComparisonOp::IsNotNull),
    ("NotNull", ComparisonOp::IsNotNull),
    ("IsNull", ComparisonOp::IsNull),
    ("Null", ComparisonOp::IsNull),
    ("GreaterThanEqual", ComparisonOp::Gte),
    ("GreaterThan", ComparisonOp::Gt),
    ("LessThanEqual", ComparisonOp::Lte),
    ("LessThan", ComparisonOp::Lt),
    ("IsNotIn", ComparisonOp::NotIn),
    ("NotIn", ComparisonOp::NotIn),
    ("IsIn", ComparisonOp::In),
    ("In", ComparisonOp::In),
    ("IsLike", ComparisonOp::Like),
    ("Like", ComparisonOp::Like),
    ("IsNot", ComparisonOp::Ne),
    ("Not", ComparisonOp::Ne),
    ("Equals", ComparisonOp::Eq),
    ("Is", ComparisonOp::Eq),
    ("", ComparisonOp::Eq),
];

#[derive(Debug, Clone, Copy)]
enum SubjectKind {
    Find,
    Count,
    Exists,
    Delete,
}

/// Parse a method name into a criteria query over `schema`.
pub fn parse(name: &str, schema: &EntitySchema) -> AppResult<CriteriaQuery> {
    let (kind, rest) = split_subject(name)?;

    let (intro, predicate, order) = match find_keyword(rest, "By") {
        Some(i) if rest[..i].ends_with("Order") => {
            (&rest[..i - "Order".len()], None, Some(&rest[i + 2..]))
        }
        Some(i) => {
            let after = &rest[i + 2..];
            match find_keyword(after, "OrderBy") {
                Some(j) => (&rest[..i], Some(&after[..j]), Some(&after[j + 7..])),
                None => (&rest[..i], Some(after), None),
            }
        }
        None => (rest, None, None),
    };

    let (distinct, limit) = parse_intro(name, intro)?;

    let subject = match kind {
        SubjectKind::Find => Subject::Find,
        SubjectKind::Count => Subject::Count,
        SubjectKind::Exists => Subject::Exists,
        SubjectKind::Delete => Subject::Delete,
    };
    if limit.is_some() && !matches!(subject, Subject::Find) {
        return Err(AppError::malformed_descriptor(format!(
            "'{name}': Top/First is only allowed on find queries"
        )));
    }

    let predicate = match predicate {
        None => None,
        Some("") if order.is_some() => None,
        Some("") => {
            return Err(AppError::malformed_descriptor(format!(
                "'{name}': expected criteria after 'By'"
            )));
        }
        Some(text) => Some(parse_predicate(name, text, schema)?),
    };

    let order = match order {
        None => Sort::unsorted(),
        Some("") => {
            return Err(AppError::malformed_descriptor(format!(
                "'{name}': expected a field after 'OrderBy'"
            )));
        }
        Some(text) => parse_order(name, text, schema)?,
    };

    Ok(CriteriaQuery {
        subject,
        distinct,
        limit,
        predicate,
        order,
    })
}

fn split_subject(name: &str) -> AppResult<(SubjectKind, &str)> {
    for (prefix, kind) in SUBJECTS {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.is_empty() || starts_upper(rest) {
                return Ok((*kind, rest));
            }
        }
    }
    Err(AppError::malformed_descriptor(format!(
        "'{name}' does not start with find, read, get, query, search, stream, count, exists, delete or remove"
    )))
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// First occurrence of `keyword` that ends at a word boundary.
fn find_keyword(s: &str, keyword: &str) -> Option<usize> {
    s.match_indices(keyword)
        .map(|(i, _)| i)
        .find(|&i| {
            let tail = &s[i + keyword.len()..];
            tail.is_empty() || starts_upper(tail)
        })
}

fn parse_intro(name: &str, intro: &str) -> AppResult<(bool, Option<u64>)> {
    let distinct = find_keyword(intro, "Distinct").is_some();
    let mut limit = None;
    for keyword in ["Top", "First"] {
        for (i, _) in intro.match_indices(keyword) {
            let after = &intro[i + keyword.len()..];
            let digits_len = after.chars().take_while(|c| c.is_ascii_digit()).count();
            let tail = &after[digits_len..];
            if !(tail.is_empty() || starts_upper(tail)) {
                continue;
            }
            let n = if digits_len == 0 {
                1
            } else {
                after[..digits_len].parse::<u64>().map_err(|_| {
                    AppError::malformed_descriptor(format!("'{name}': invalid row limit"))
                })?
            };
            if n == 0 {
                return Err(AppError::malformed_descriptor(format!(
                    "'{name}': row limit must be positive"
                )));
            }
            limit = Some(n);
        }
    }
    Ok((distinct, limit))
}

#[derive(Debug, Clone, PartialEq)]
struct Term {
    connector: Connector,
    field: String,
    op: ComparisonOp,
}

/// Searches every reading of a predicate string.
struct TermSearch<'a> {
    input: &'a str,
    fields: &'a [(String, String)],
    results: Vec<Vec<Term>>,
    /// Furthest position at which a term had to start.
    furthest_term: usize,
    /// Furthest position right after a matched field, with that field.
    furthest_op: Option<(usize, String)>,
}

impl TermSearch<'_> {
    fn run(&mut self, pos: usize, connector: Connector, acc: &mut Vec<Term>) {
        let input = self.input;
        let fields = self.fields;
        self.furthest_term = self.furthest_term.max(pos);
        let rest = &input[pos..];
        for (pascal, path) in fields {
            if !rest.starts_with(pascal.as_str()) {
                continue;
            }
            let after_field = pos + pascal.len();
            if self
                .furthest_op
                .as_ref()
                .is_none_or(|(p, _)| after_field > *p)
            {
                self.furthest_op = Some((after_field, path.clone()));
            }
            for (keyword, op) in OPERATORS {
                if !input[after_field..].starts_with(keyword) {
                    continue;
                }
                let end = after_field + keyword.len();
                let tail = &input[end..];
                acc.push(Term {
                    connector,
                    field: path.clone(),
                    op: *op,
                });
                if tail.is_empty() {
                    self.results.push(acc.clone());
                } else {
                    for (word, next) in [("And", Connector::And), ("Or", Connector::Or)] {
                        if tail.len() > word.len() && tail.starts_with(word) {
                            self.run(end + word.len(), next, acc);
                        }
                    }
                }
                acc.pop();
            }
        }
    }
}

/// PascalCase spelling → logical path, direct fields before relation paths.
fn field_candidates(schema: &EntitySchema) -> Vec<(String, String)> {
    let mut candidates: Vec<(String, String)> = schema
        .fields
        .iter()
        .map(|f| (to_pascal_case(f.name), f.name.to_string()))
        .collect();
    for relation in schema.relations {
        for target in relation.target.fields {
            let pascal = to_pascal_case(relation.name) + &to_pascal_case(target.name);
            if candidates.iter().any(|(p, _)| *p == pascal) {
                continue;
            }
            candidates.push((pascal, format!("{}.{}", relation.name, target.name)));
        }
    }
    candidates
}

fn parse_predicate(name: &str, text: &str, schema: &EntitySchema) -> AppResult<PredicateGroup> {
    let fields = field_candidates(schema);
    let mut search = TermSearch {
        input: text,
        fields: &fields,
        results: Vec::new(),
        furthest_term: 0,
        furthest_op: None,
    };
    search.run(0, Connector::And, &mut Vec::new());

    let mut readings = unique(search.results);
    let terms = match readings.len() {
        1 => readings.remove(0),
        0 => {
            let message = match search.furthest_op {
                Some((pos, field)) if pos > search.furthest_term => format!(
                    "'{name}': unrecognized operator '{}' after field '{field}'",
                    &text[pos..]
                ),
                _ => format!(
                    "'{name}': no field of {} matches '{}'",
                    schema.entity,
                    &text[search.furthest_term..]
                ),
            };
            return Err(AppError::malformed_descriptor(message));
        }
        _ => {
            let rendered: Vec<String> = readings.iter().map(|r| render_reading(r)).collect();
            return Err(AppError::malformed_descriptor(format!(
                "'{name}' is ambiguous: {}",
                rendered.join(" | ")
            )));
        }
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut group: Option<PredicateGroup> = None;
    for term in terms {
        let operand = if term.op.takes_operand() {
            let base = term.field.replace('.', "_");
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            Operand::Param(if *count == 1 {
                base
            } else {
                format!("{base}_{count}")
            })
        } else {
            Operand::None
        };
        let predicate = FieldPredicate::new(term.field, term.op, operand);
        group = Some(match group {
            None => PredicateGroup::new(predicate),
            Some(mut g) => {
                g.push(term.connector, predicate);
                g
            }
        });
    }
    group.ok_or_else(|| AppError::malformed_descriptor(format!("'{name}': empty criteria")))
}

fn unique<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn render_reading(terms: &[Term]) -> String {
    terms
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let joiner = if i == 0 {
                ""
            } else {
                match t.connector {
                    Connector::And => " AND ",
                    Connector::Or => " OR ",
                }
            };
            format!("{joiner}{} {}", t.field, t.op.as_sql())
        })
        .collect()
}

fn parse_order(name: &str, text: &str, schema: &EntitySchema) -> AppResult<Sort> {
    let fields: Vec<(String, &str)> = schema
        .fields
        .iter()
        .map(|f| (to_pascal_case(f.name), f.name))
        .collect();

    fn walk(
        input: &str,
        pos: usize,
        fields: &[(String, &str)],
        acc: &mut Vec<SortField>,
        out: &mut Vec<Vec<SortField>>,
    ) {
        let rest = &input[pos..];
        for (pascal, field) in fields {
            if !rest.starts_with(pascal.as_str()) {
                continue;
            }
            let after = pos + pascal.len();
            for (keyword, direction) in [
                ("Asc", SortDirection::Asc),
                ("Desc", SortDirection::Desc),
                ("", SortDirection::Asc),
            ] {
                if !input[after..].starts_with(keyword) {
                    continue;
                }
                let end = after + keyword.len();
                acc.push(SortField::new(*field, direction));
                if end == input.len() {
                    out.push(acc.clone());
                } else if starts_upper(&input[end..]) {
                    walk(input, end, fields, acc, out);
                }
                acc.pop();
            }
        }
    }

    let mut readings = Vec::new();
    walk(text, 0, &fields, &mut Vec::new(), &mut readings);
    let mut readings = unique(readings);
    match readings.len() {
        1 => Ok(Sort::from(readings.remove(0))),
        0 => Err(AppError::malformed_descriptor(format!(
            "'{name}': cannot read order clause '{text}'"
        ))),
        _ => Err(AppError::malformed_descriptor(format!(
            "'{name}': order clause '{text}' is ambiguous"
        ))),
    }
}
