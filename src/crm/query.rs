//! Filter and sort plans over a field registry.
//!
//! Value interpretation for filters, first match wins:
//! `none`/`null` matches NULL, `true`/`false` matches boolean equality,
//! anything else is a case-insensitive containment match on the column's
//! text form. Containment also applies to numeric and date columns, so
//! `total_amount=100` matches `1000.00`.

use super::fields::{EntitySchema, FieldKind, FieldSpec};
use crate::core::error::CrmResult;
use diesel::dsl::sql;
use diesel::expression::{BoxableExpression, SqlLiteral};
use diesel::sql_types::{Bool, Text};
use diesel::sqlite::Sqlite;
use std::fmt;
use std::str::FromStr;

pub type BoxedPredicate<T> = Box<dyn BoxableExpression<T, Sqlite, SqlType = Bool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(format!("invalid sort direction '{s}', expected asc or desc")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    IsNull,
    Equals(bool),
    Contains(String),
}

impl Predicate {
    pub fn interpret(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "none" | "null" => Self::IsNull,
            "true" => Self::Equals(true),
            "false" => Self::Equals(false),
            _ => Self::Contains(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: &'static FieldSpec,
    pub predicate: Predicate,
}

impl Filter {
    pub fn to_predicate<T: 'static>(&self) -> BoxedPredicate<T> {
        let column = self.field.name;
        match &self.predicate {
            Predicate::IsNull => Box::new(sql::<Bool>(&format!("{column} IS NULL"))),
            Predicate::Equals(value) => {
                Box::new(sql::<Bool>(&format!("{column} = ")).bind::<Bool, _>(*value))
            }
            Predicate::Contains(needle) => Box::new(
                sql::<Bool>(&format!("instr(lower(CAST({column} AS TEXT)), lower("))
                    .bind::<Text, _>(needle.clone())
                    .sql(")) > 0"),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub field: &'static FieldSpec,
    pub direction: SortDirection,
}

impl Sort {
    pub fn to_ordering(&self) -> SqlLiteral<Text> {
        let column = self.field.name;
        let expr = match self.field.kind {
            FieldKind::Decimal => format!("CAST({column} AS REAL)"),
            _ => column.to_string(),
        };
        sql::<Text>(&format!("{expr} {}", self.direction.as_sql()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
}

impl QueryPlan {
    pub fn predicates<T: 'static>(&self) -> Vec<BoxedPredicate<T>> {
        self.filters.iter().map(|f| f.to_predicate::<T>()).collect()
    }

    /// Sorts in the order given. Callers append the primary key last.
    pub fn orderings(&self) -> Vec<SqlLiteral<Text>> {
        self.sorts.iter().map(Sort::to_ordering).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.sorts.is_empty()
    }
}

pub struct QueryBuilder {
    schema: &'static EntitySchema,
    plan: QueryPlan,
}

impl QueryBuilder {
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            plan: QueryPlan::default(),
        }
    }

    pub fn filter(mut self, attribute: &str, raw: &str) -> CrmResult<Self> {
        let field = self.schema.queryable(attribute)?;
        self.plan.filters.push(Filter {
            field,
            predicate: Predicate::interpret(raw),
        });
        Ok(self)
    }

    pub fn sort(mut self, attribute: &str, direction: SortDirection) -> CrmResult<Self> {
        let field = self.schema.queryable(attribute)?;
        self.plan.sorts.push(Sort { field, direction });
        Ok(self)
    }

    pub fn build(self) -> QueryPlan {
        self.plan
    }
}

pub fn build_plan(
    schema: &'static EntitySchema,
    filters: &[(String, String)],
    sorts: &[(String, SortDirection)],
) -> CrmResult<QueryPlan> {
    let mut builder = QueryBuilder::new(schema);
    for (attribute, raw) in filters {
        builder = builder.filter(attribute, raw)?;
    }
    for (attribute, direction) in sorts {
        builder = builder.sort(attribute, *direction)?;
    }
    Ok(builder.build())
}

/// Splits `attribute=value` on the first `=`.
pub fn parse_assignment(token: &str) -> Result<(String, String), String> {
    let (key, value) = token
        .split_once('=')
        .ok_or_else(|| format!("'{token}' must be of the form attribute=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("'{token}' has an empty attribute name"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn parse_sort(token: &str) -> Result<(String, SortDirection), String> {
    let (key, direction) = parse_assignment(token)?;
    Ok((key, direction.parse()?))
}

/// Repeated attributes keep their first position and their last value.
pub fn dedupe_last_wins<V>(pairs: Vec<(String, V)>) -> Vec<(String, V)> {
    let mut out: Vec<(String, V)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match out.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => out.push((key, value)),
        }
    }
    out
}
