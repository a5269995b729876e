//! A small `SELECT` builder over `sqlx::QueryBuilder`.
//!
//! Clauses are collected first and rendered in SQL order on demand, so
//! filters and orderings can be added in any order (scopes are applied after
//! a relation has already constrained the query).
//!
//! Bound values carry their own PostgreSQL type:
//!
//! - [`Bind::Null`] renders as a `NULL` literal, so `column = NULL` matches
//!   nothing instead of failing on an untyped parameter.
//! - [`Bind::Text`] casts the column to `text` (`"code"::text = $1`). Text
//!   comparisons work on any column type and order lexically.
//! - Integers written with leading zeros (`"00100"`) stay text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reinforce_core::scope::{Direction, QueryBuilder as ScopeBuilder};
use reinforce_core::types::Attributes;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Comparison operators accepted by [`Select::where_op`].
const OPERATORS: &[&str] = &["=", "<>", "!=", "<", "<=", ">", ">=", "LIKE", "ILIKE"];

/// A value bound into a query with its inferred PostgreSQL type.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Text(String),
}

impl Bind {
    /// Infer a type for raw text input such as a scope bound.
    ///
    /// Integers, floats, UUIDs and ISO dates are recognized; anything else is
    /// bound as text. Zero-padded numbers such as `"007"` are codes, not
    /// quantities, and are bound as text.
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if zero_padded(s) {
            return Bind::Text(raw.to_string());
        }
        if let Ok(v) = s.parse::<i64>() {
            return Bind::Int(v);
        }
        if let Ok(v) = s.parse::<f64>() {
            if v.is_finite() {
                return Bind::Float(v);
            }
        }
        if let Ok(v) = Uuid::parse_str(s) {
            return Bind::Uuid(v);
        }
        if let Ok(v) = DateTime::parse_from_rfc3339(s) {
            return Bind::TimestampTz(v.with_timezone(&Utc));
        }
        if let Ok(v) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Bind::Timestamp(v);
        }
        if let Ok(v) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Bind::Date(v);
        }
        Bind::Text(raw.to_string())
    }

    /// Bind an attribute value. Strings go through [`Bind::infer`].
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Bind::Null,
            Value::Bool(b) => Bind::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Bind::Int(i),
                None => n.as_f64().map(Bind::Float).unwrap_or(Bind::Null),
            },
            Value::String(s) => Bind::infer(s),
            other => Bind::Text(other.to_string()),
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, Bind::Text(_))
    }

    /// Rebind as text, for pairing with a text bound.
    fn into_text(self) -> Self {
        let text = match self {
            Bind::Null | Bind::Text(_) => return self,
            Bind::Bool(v) => v.to_string(),
            Bind::Int(v) => v.to_string(),
            Bind::Float(v) => v.to_string(),
            Bind::Uuid(v) => v.to_string(),
            Bind::Date(v) => v.to_string(),
            Bind::Timestamp(v) => v.to_string(),
            Bind::TimestampTz(v) => v.to_rfc3339(),
        };
        Bind::Text(text)
    }

    fn push_to<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        match self.clone() {
            Bind::Null => qb.push("NULL"),
            Bind::Bool(v) => qb.push_bind(v),
            Bind::Int(v) => qb.push_bind(v),
            Bind::Float(v) => qb.push_bind(v),
            Bind::Uuid(v) => qb.push_bind(v),
            Bind::Date(v) => qb.push_bind(v),
            Bind::Timestamp(v) => qb.push_bind(v),
            Bind::TimestampTz(v) => qb.push_bind(v),
            Bind::Text(v) => qb.push_bind(v),
        };
    }
}

fn zero_padded(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    digits.len() > 1
        && digits.starts_with('0')
        && digits.bytes().nth(1).is_some_and(|b| b.is_ascii_digit())
}

/// Quote an identifier, keeping `table.column` qualification and `*`.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| {
            let part = part.trim();
            if part == "*" {
                part.to_string()
            } else {
                format!("\"{}\"", part.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Compare {
        column: String,
        op: &'static str,
        value: Bind,
    },
    Between {
        column: String,
        start: Bind,
        end: Bind,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    table: String,
    left: String,
    right: String,
}

/// `SELECT` over one table with optional join, filters, ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    joins: Vec<Join>,
    filters: Vec<Filter>,
    orders: Vec<(String, Direction)>,
    limit: Option<i64>,
}

impl Select {
    /// `SELECT "table".* FROM "table"`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Restrict the selected columns.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `INNER JOIN table ON left = right`.
    pub fn join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    pub fn where_eq(mut self, column: &str, value: Bind) -> Self {
        self.filters.push(Filter::Compare {
            column: column.to_string(),
            op: "=",
            value,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render into `qb`. With `as_json` each row is selected as one JSONB
    /// object, keeping `ORDER BY` on the same query level as the rows.
    fn render<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>, as_json: bool) {
        qb.push("SELECT ");
        match (as_json, self.columns.is_empty()) {
            (false, true) => {
                qb.push(quote_ident(&format!("{}.*", self.table)));
            }
            (false, false) => {
                let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
                qb.push(columns.join(", "));
            }
            (true, true) => {
                qb.push("to_jsonb(")
                    .push(quote_ident(&format!("{}.*", self.table)))
                    .push(")");
            }
            (true, false) => {
                let pairs: Vec<String> = self
                    .columns
                    .iter()
                    .map(|c| format!("{}, {}", json_key(c), quote_ident(c)))
                    .collect();
                qb.push("jsonb_build_object(").push(pairs.join(", ")).push(")");
            }
        }
        qb.push(" FROM ").push(quote_ident(&self.table));

        for join in &self.joins {
            qb.push(" INNER JOIN ")
                .push(quote_ident(&join.table))
                .push(" ON ")
                .push(quote_ident(&join.left))
                .push(" = ")
                .push(quote_ident(&join.right));
        }

        for (i, filter) in self.filters.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match filter {
                Filter::Compare { column, op, value } => {
                    push_column(qb, column, value.is_text());
                    qb.push(" ").push(*op).push(" ");
                    value.push_to(qb);
                }
                Filter::Between { column, start, end } => {
                    push_column(qb, column, start.is_text());
                    qb.push(" BETWEEN ");
                    start.push_to(qb);
                    qb.push(" AND ");
                    end.push_to(qb);
                }
            }
        }

        for (i, (column, direction)) in self.orders.iter().enumerate() {
            qb.push(if i == 0 { " ORDER BY " } else { ", " });
            qb.push(quote_ident(column)).push(" ").push(direction.as_sql());
        }

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
    }

    /// The rendered SQL with `$n` placeholders.
    pub fn sql(&self) -> String {
        let mut qb = QueryBuilder::new("");
        self.render(&mut qb, false);
        qb.into_sql()
    }

    /// The SQL run by [`fetch_attributes`](Self::fetch_attributes).
    pub fn json_sql(&self) -> String {
        let mut qb = QueryBuilder::new("");
        self.render(&mut qb, true);
        qb.into_sql()
    }

    /// Fetch matching rows as attribute maps.
    pub async fn fetch_attributes(&self, pool: &PgPool) -> Result<Vec<Attributes>, sqlx::Error> {
        let mut qb = QueryBuilder::new("");
        self.render(&mut qb, true);

        let rows: Vec<Value> = qb.build_query_scalar().fetch_all(pool).await?;
        Ok(rows.into_iter().filter_map(into_object).collect())
    }

    /// Fetch the first matching row, if any.
    pub async fn first(&self, pool: &PgPool) -> Result<Option<Attributes>, sqlx::Error> {
        let limited = self.clone().limit(1);
        let mut qb = QueryBuilder::new("");
        limited.render(&mut qb, true);

        let row: Option<Value> = qb.build_query_scalar().fetch_optional(pool).await?;
        Ok(row.and_then(into_object))
    }
}

fn push_column<'args>(qb: &mut QueryBuilder<'args, Postgres>, column: &str, as_text: bool) {
    qb.push(quote_ident(column));
    if as_text {
        qb.push("::text");
    }
}

/// Object key for a selected column: its last path segment as a literal.
fn json_key(column: &str) -> String {
    let name = column.rsplit('.').next().unwrap_or(column).trim();
    format!("'{}'", name.replace('\'', "''"))
}

fn into_object(value: Value) -> Option<Attributes> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

impl ScopeBuilder for Select {
    fn where_op(mut self, column: &str, op: &str, value: &str) -> Self {
        let op = op.trim();
        let Some(&op) = OPERATORS.iter().find(|known| known.eq_ignore_ascii_case(op)) else {
            tracing::warn!(column, op, "Ignoring unsupported comparison operator");
            return self;
        };
        self.filters.push(Filter::Compare {
            column: column.to_string(),
            op,
            value: Bind::infer(value),
        });
        self
    }

    fn where_between(mut self, column: &str, start: &str, end: &str) -> Self {
        let (mut start, mut end) = (Bind::infer(start), Bind::infer(end));
        // Both bounds must share the column's cast.
        if start.is_text() || end.is_text() {
            start = start.into_text();
            end = end.into_text();
        }
        self.filters.push(Filter::Between {
            column: column.to_string(),
            start,
            end,
        });
        self
    }

    fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push((column.to_string(), direction));
        self
    }
}
