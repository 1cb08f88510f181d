//! Named-placeholder SQL templates.
//!
//! Placeholders are written `:name`. String literals, quoted identifiers,
//! `--` comments and `::` casts are left untouched.

use std::collections::BTreeSet;

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::types::Value;

use crate::compiler::SqlWriter;
use crate::params::Params;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Param(String),
}

/// A scanned template.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl SqlTemplate {
    /// Scan `sql` for placeholders.
    pub fn parse(sql: &str) -> AppResult<Self> {
        let chars: Vec<char> = sql.chars().collect();
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' | '"' => {
                    let start = i;
                    i += 1;
                    loop {
                        match chars.get(i) {
                            None => {
                                return Err(AppError::malformed_descriptor(format!(
                                    "unterminated quote in template: {sql}"
                                )));
                            }
                            Some(&q) if q == c => {
                                if chars.get(i + 1) == Some(&c) {
                                    i += 2;
                                    continue;
                                }
                                i += 1;
                                break;
                            }
                            Some(_) => i += 1,
                        }
                    }
                    text.extend(&chars[start..i]);
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    let start = i;
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    text.extend(&chars[start..i]);
                }
                ':' if chars.get(i + 1) == Some(&':') => {
                    text.push_str("::");
                    i += 2;
                }
                ':' if chars
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
                {
                    let start = i + 1;
                    i = start;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                    {
                        i += 1;
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Param(chars[start..i].iter().collect()));
                }
                _ => {
                    text.push(c);
                    i += 1;
                }
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            source: sql.to_string(),
            segments,
        })
    }

    /// Original SQL text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names, sorted and deduplicated.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Check placeholders against a set of parameter names: every
    /// placeholder must be supplied and every name must be used.
    pub fn check_names<'a, I>(&self, names: I) -> AppResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let placeholders = self.placeholders();
        let names: BTreeSet<&str> = names.into_iter().collect();
        if let Some(missing) = placeholders.iter().find(|p| !names.contains(*p)) {
            return Err(AppError::unbound_parameter(missing));
        }
        if let Some(unused) = names.iter().find(|n| !placeholders.contains(*n)) {
            return Err(AppError::unused_parameter(unused));
        }
        Ok(())
    }

    /// Write the template, binding each placeholder from `params`. Lists
    /// expand to `($1, $2, ...)`.
    pub fn render_into(&self, writer: &mut SqlWriter, params: &Params) -> AppResult<()> {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => writer.push(text),
                Segment::Param(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| AppError::unbound_parameter(name))?;
                    match value {
                        Value::List(items) => writer.bind_list(items.clone(), None),
                        other => writer.bind(other.clone(), None),
                    }
                }
            }
        }
        Ok(())
    }
}
