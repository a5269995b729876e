//! Range and sort-by query scopes.
//!
//! Both scopes take loosely formatted user input (typically a query-string
//! parameter) and translate it into query-builder calls:
//!
//! - range: `"* ~ 10"` (at most), `"1 ~ *"` (at least), `"1 ~ 10"` (between,
//!   inclusive),
//! - sort: `"updated_at:desc"`; unknown directions sort ascending.
//!
//! Malformed input leaves the query untouched.

use crate::config::ReinforceConfig;

pub const DEFAULT_RANGE_DELIMITER: &str = "~";
pub const DEFAULT_SORT_DELIMITER: &str = ":";
pub const DEFAULT_SORT_COLUMN: &str = "id";

const OPEN_BOUND: &str = "*";

/// Parsed range input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeFilter {
    /// `column <= end`
    AtMost(String),
    /// `column >= start`
    AtLeast(String),
    /// `start <= column <= end`
    Between(String, String),
}

/// Parse `"<start> <delimiter> <end>"`.
///
/// Returns `None` unless the input splits into exactly two parts, or when
/// both bounds are open.
pub fn parse_range(range: &str, delimiter: &str) -> Option<RangeFilter> {
    if delimiter.is_empty() {
        return None;
    }

    let parts: Vec<&str> = range.split(delimiter).map(str::trim).collect();
    let [start, end] = parts.as_slice() else {
        return None;
    };

    let open = |bound: &str| bound.is_empty() || bound == OPEN_BOUND;
    match (open(start), open(end)) {
        (true, false) => Some(RangeFilter::AtMost(end.to_string())),
        (false, true) => Some(RangeFilter::AtLeast(start.to_string())),
        (false, false) => Some(RangeFilter::Between(start.to_string(), end.to_string())),
        (true, true) => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Lenient parse: `desc` in any case is descending, anything else ascending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub direction: Direction,
}

/// Parse `"<column><delimiter><direction>"`, ordering by `id` when the
/// column is missing.
pub fn parse_sort(sort_by: Option<&str>, delimiter: &str) -> SortOrder {
    parse_sort_or(sort_by, delimiter, DEFAULT_SORT_COLUMN)
}

/// [`parse_sort`] with an explicit fallback column.
pub fn parse_sort_or(sort_by: Option<&str>, delimiter: &str, default_column: &str) -> SortOrder {
    let input = sort_by.unwrap_or_default();
    let mut parts: Box<dyn Iterator<Item = &str>> = if delimiter.is_empty() {
        Box::new(std::iter::once(input))
    } else {
        Box::new(input.split(delimiter))
    };

    let column = parts
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(default_column)
        .to_string();
    let direction = parts.next().map(Direction::parse_lenient).unwrap_or_default();

    SortOrder { column, direction }
}

/// The query-builder operations the scopes need.
///
/// Values are passed as the raw text from the input; implementations decide
/// how to bind them.
pub trait QueryBuilder: Sized {
    fn where_op(self, column: &str, op: &str, value: &str) -> Self;

    fn where_between(self, column: &str, start: &str, end: &str) -> Self;

    fn order_by(self, column: &str, direction: Direction) -> Self;
}

/// Apply a range filter on `column`.
pub fn range<Q: QueryBuilder>(query: Q, column: &str, range: &str, delimiter: &str) -> Q {
    match parse_range(range, delimiter) {
        Some(RangeFilter::AtMost(end)) => query.where_op(column, "<=", &end),
        Some(RangeFilter::AtLeast(start)) => query.where_op(column, ">=", &start),
        Some(RangeFilter::Between(start, end)) => query.where_between(column, &start, &end),
        None => {
            tracing::debug!(column, range, "Ignoring malformed range");
            query
        }
    }
}

/// Apply an order-by clause.
pub fn sort_by<Q: QueryBuilder>(query: Q, sort_by: Option<&str>, delimiter: &str) -> Q {
    let order = parse_sort(sort_by, delimiter);
    query.order_by(&order.column, order.direction)
}

/// Chaining form of the scopes: `query.range("price", "1 ~ 10").sort_by(None)`.
pub trait Scopes: QueryBuilder {
    fn range(self, column: &str, input: &str) -> Self {
        range(self, column, input, DEFAULT_RANGE_DELIMITER)
    }

    fn sort_by(self, input: Option<&str>) -> Self {
        sort_by(self, input, DEFAULT_SORT_DELIMITER)
    }

    /// Range with the delimiter from `config`.
    fn range_with(self, column: &str, input: &str, config: &ReinforceConfig) -> Self {
        range(self, column, input, &config.range_delimiter)
    }

    /// Sort with the delimiter and fallback column from `config`.
    fn sort_by_with(self, input: Option<&str>, config: &ReinforceConfig) -> Self {
        let order = parse_sort_or(input, &config.sort_delimiter, &config.default_sort_column);
        self.order_by(&order.column, order.direction)
    }
}

impl<Q: QueryBuilder> Scopes for Q {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records each builder call as text.
    #[derive(Debug, Default)]
    struct Recorder(Vec<String>);

    impl QueryBuilder for Recorder {
        fn where_op(mut self, column: &str, op: &str, value: &str) -> Self {
            self.0.push(format!("{column} {op} {value}"));
            self
        }

        fn where_between(mut self, column: &str, start: &str, end: &str) -> Self {
            self.0.push(format!("{column} BETWEEN {start} AND {end}"));
            self
        }

        fn order_by(mut self, column: &str, direction: Direction) -> Self {
            self.0.push(format!("ORDER BY {column} {}", direction.as_sql()));
            self
        }
    }

    fn calls(q: Recorder) -> Vec<String> {
        q.0
    }

    #[test]
    fn open_start_is_upper_bound() {
        assert_eq!(parse_range("* ~ 10", "~"), Some(RangeFilter::AtMost("10".into())));
        assert_eq!(parse_range("~10", "~"), Some(RangeFilter::AtMost("10".into())));
    }

    #[test]
    fn open_end_is_lower_bound() {
        assert_eq!(parse_range("1 ~ *", "~"), Some(RangeFilter::AtLeast("1".into())));
        assert_eq!(parse_range("1~", "~"), Some(RangeFilter::AtLeast("1".into())));
    }

    #[test]
    fn closed_range_is_between() {
        assert_eq!(
            parse_range(" 1 ~ 10 ", "~"),
            Some(RangeFilter::Between("1".into(), "10".into()))
        );
        assert_eq!(
            parse_range("2024-01-01|2024-12-31", "|"),
            Some(RangeFilter::Between("2024-01-01".into(), "2024-12-31".into()))
        );
    }

    #[test]
    fn malformed_range_is_ignored() {
        assert_eq!(parse_range("garbage", "~"), None);
        assert_eq!(parse_range("1 ~ 2 ~ 3", "~"), None);
        assert_eq!(parse_range("* ~ *", "~"), None);
        assert_eq!(parse_range("1 ~ 10", ""), None);
    }

    #[test]
    fn range_scope_emits_matching_clause() {
        let q = Recorder::default().range("price", "* ~ 10");
        assert_eq!(calls(q), vec!["price <= 10"]);

        let q = Recorder::default().range("price", "1 ~ *");
        assert_eq!(calls(q), vec!["price >= 1"]);

        let q = Recorder::default().range("price", "1 ~ 10");
        assert_eq!(calls(q), vec!["price BETWEEN 1 AND 10"]);

        let q = Recorder::default().range("price", "garbage");
        assert!(calls(q).is_empty());
    }

    #[test]
    fn sort_parses_direction_case_insensitively() {
        let order = parse_sort(Some("updated_at:DESC"), ":");
        assert_eq!(order.column, "updated_at");
        assert_eq!(order.direction, Direction::Desc);
    }

    #[test]
    fn unknown_direction_sorts_ascending() {
        let order = parse_sort(Some("updated_at:sideways"), ":");
        assert_eq!(order.direction, Direction::Asc);
    }

    #[test]
    fn missing_input_sorts_by_id() {
        assert_eq!(
            parse_sort(None, ":"),
            SortOrder {
                column: "id".into(),
                direction: Direction::Asc
            }
        );
        assert_eq!(parse_sort(Some(":desc"), ":").column, "id");
        assert_eq!(parse_sort(Some("name"), ":").direction, Direction::Asc);
    }

    #[test]
    fn scopes_chain() {
        let q = Recorder::default()
            .range("price", "5 ~ *")
            .sort_by(Some("updated_at:desc"));
        assert_eq!(calls(q), vec!["price >= 5", "ORDER BY updated_at DESC"]);
    }

    #[test]
    fn configured_delimiters_apply() {
        let config = ReinforceConfig {
            range_delimiter: "..".into(),
            sort_delimiter: ",".into(),
            default_sort_column: "created_at".into(),
        };
        let q = Recorder::default()
            .range_with("age", "18..65", &config)
            .sort_by_with(None, &config);
        assert_eq!(
            calls(q),
            vec!["age BETWEEN 18 AND 65", "ORDER BY created_at ASC"]
        );
    }
}
