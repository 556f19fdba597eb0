//! # Filter Tree Module
//!
//! Typed predicate and ordering structures produced by the search executor.
//! A compiled [`SearchQuery`] can be evaluated against in-memory entities or
//! rendered to an SQL clause with bound parameters through the current
//! [`Dialect`](crate::dialect::Dialect).
//!
//! Columns are per-entity enums implementing [`Column`], so every filter and
//! ordering is checked at compile time against the entity it targets.

mod order;

pub use order::{Direction, Order};

use crate::dialect::{CurrentDialect, Dialect};
use crate::model::{FieldValue, Searchable};
use chrono::NaiveDateTime;
use std::fmt::Debug;
use std::ops::{Bound, RangeBounds};

/// Where a column's values live in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// A scalar column of the entity's own table.
    Field {
        name: &'static str,
        nullable: bool,
    },

    /// A set of values held in a link table, one row per member.
    Membership(Membership),
}

/// Describes a link table such as `post_tags (post_id, tag_name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub table: &'static str,
    pub owner: &'static str,
    pub value: &'static str,
}

/// A searchable attribute of an entity.
pub trait Column: Copy + Debug + PartialEq + Send + Sync + 'static {
    fn source(self) -> ColumnSource;
}

/// A bound value for ranged comparisons.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Scalar {
    Integer(i64),
    Timestamp(NaiveDateTime),
}

impl Scalar {
    fn from_field(value: FieldValue<'_>) -> Option<Scalar> {
        match value {
            FieldValue::Integer(n) => Some(Scalar::Integer(n)),
            FieldValue::Timestamp(t) => Some(Scalar::Timestamp(t)),
            _ => None,
        }
    }

    fn to_param(&self) -> SqlParam {
        match self {
            Scalar::Integer(n) => SqlParam::Integer(*n),
            Scalar::Timestamp(t) => SqlParam::Timestamp(*t),
        }
    }
}

/// A parameter bound to a rendered SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Timestamp(NaiveDateTime),
}

/// Represents a logical predicate over the columns of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter<C> {
    /// Text equality, or membership for set-valued columns.
    Equals(C, String),

    /// Ranged comparison; at least one bound is finite.
    Within(C, Bound<Scalar>, Bound<Scalar>),

    /// Logical AND of two subexpressions.
    And(Box<Filter<C>>, Box<Filter<C>>),

    /// Logical OR of two subexpressions.
    Or(Box<Filter<C>>, Box<Filter<C>>),

    /// Logical NOT of a subexpression.
    Not(Box<Filter<C>>),
}

impl<C: Column> Filter<C> {
    pub fn equals<T: Into<String>>(column: C, value: T) -> Self {
        Filter::Equals(column, value.into())
    }

    pub fn within(column: C, lower: Bound<Scalar>, upper: Bound<Scalar>) -> Self {
        Filter::Within(column, lower, upper)
    }

    /// Matches integer values `>= n`.
    pub fn at_least(column: C, n: i64) -> Self {
        Filter::Within(column, Bound::Included(Scalar::Integer(n)), Bound::Unbounded)
    }

    /// Matches integer values `<= n`.
    pub fn at_most(column: C, n: i64) -> Self {
        Filter::Within(column, Bound::Unbounded, Bound::Included(Scalar::Integer(n)))
    }

    /// Combines two expressions with a logical AND.
    pub fn and(self, other: Filter<C>) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Combines two expressions with a logical OR.
    pub fn or(self, other: Filter<C>) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Negates a filter expression.
    pub fn not(expr: Filter<C>) -> Self {
        Filter::Not(Box::new(expr))
    }

    /// Evaluates the predicate against a single entity.
    pub fn matches<E: Searchable<Column = C>>(&self, entity: &E) -> bool {
        match self {
            Filter::Equals(column, expected) => match entity.field(*column) {
                FieldValue::Text(value) => value == expected,
                FieldValue::Tags(tags) => tags.iter().any(|t| t == expected),
                _ => false,
            },
            Filter::Within(column, lower, upper) => Scalar::from_field(entity.field(*column))
                .is_some_and(|value| (lower.as_ref(), upper.as_ref()).contains(&value)),
            Filter::And(lhs, rhs) => lhs.matches(entity) && rhs.matches(entity),
            Filter::Or(lhs, rhs) => lhs.matches(entity) || rhs.matches(entity),
            Filter::Not(expr) => !expr.matches(entity),
        }
    }

    /// Converts the filter into an SQL condition and its bound parameters.
    ///
    /// `table` names the entity table the condition is evaluated against; it
    /// is used to correlate membership subqueries.
    pub fn to_sql(&self, table: &str) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let sql = self.build_sql(table, &mut params);
        (sql, params)
    }

    fn build_sql(&self, table: &str, params: &mut Vec<SqlParam>) -> String {
        match self {
            Filter::Equals(column, value) => {
                params.push(SqlParam::Text(value.clone()));
                match column.source() {
                    ColumnSource::Field { name, nullable } => guard_null(
                        name,
                        nullable,
                        format!("{} = {}", name, CurrentDialect::placeholder(params.len())),
                    ),
                    ColumnSource::Membership(membership) => {
                        CurrentDialect::exists_member_query(table, &membership, params.len())
                    }
                }
            }
            Filter::Within(column, lower, upper) => {
                let (name, nullable) = match column.source() {
                    ColumnSource::Field { name, nullable } => (name, nullable),
                    // Sets are not range-comparable.
                    ColumnSource::Membership(_) => return "(0 = 1)".to_string(),
                };

                let mut parts = Vec::new();
                for (bound, inclusive, exclusive) in
                    [(lower, ">=", ">"), (upper, "<=", "<")]
                {
                    let (op, value) = match bound {
                        Bound::Included(value) => (inclusive, value),
                        Bound::Excluded(value) => (exclusive, value),
                        Bound::Unbounded => continue,
                    };
                    params.push(value.to_param());
                    parts.push(format!(
                        "{} {} {}",
                        name,
                        op,
                        CurrentDialect::placeholder(params.len())
                    ));
                }

                if parts.is_empty() {
                    parts.push("1 = 1".to_string());
                }

                guard_null(name, nullable, parts.join(" AND "))
            }
            Filter::And(lhs, rhs) => {
                format!(
                    "({} AND {})",
                    lhs.build_sql(table, params),
                    rhs.build_sql(table, params)
                )
            }
            Filter::Or(lhs, rhs) => {
                format!(
                    "({} OR {})",
                    lhs.build_sql(table, params),
                    rhs.build_sql(table, params)
                )
            }
            Filter::Not(expr) => {
                format!("NOT ({})", expr.build_sql(table, params))
            }
        }
    }
}

/// Keeps comparisons on nullable columns two-valued so that `NOT` stays an
/// exact complement.
fn guard_null(name: &str, nullable: bool, condition: String) -> String {
    if nullable {
        format!("({} IS NOT NULL AND {})", name, condition)
    } else {
        format!("({})", condition)
    }
}

/// Represents the kind of filtering performed by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind<C> {
    /// Matches every entity.
    All,

    /// Matches entities satisfying the expression.
    Where(Filter<C>),
}

impl<C: Column> FilterKind<C> {
    pub fn matches<E: Searchable<Column = C>>(&self, entity: &E) -> bool {
        match self {
            FilterKind::All => true,
            FilterKind::Where(filter) => filter.matches(entity),
        }
    }

    /// Renders a `WHERE` clause, or nothing for [`FilterKind::All`].
    pub fn to_sql(&self, table: &str) -> (String, Vec<SqlParam>) {
        match self {
            FilterKind::All => (String::new(), vec![]),
            FilterKind::Where(filter) => {
                let (sql, params) = filter.to_sql(table);
                (format!("WHERE {}", sql), params)
            }
        }
    }
}

impl<C: Column> From<Option<Filter<C>>> for FilterKind<C> {
    fn from(value: Option<Filter<C>>) -> Self {
        value.map(FilterKind::Where).unwrap_or(FilterKind::All)
    }
}

/// A fully compiled search: filter, ordering and the page window.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery<C> {
    /// The logical expression used for filtering.
    pub filter: FilterKind<C>,

    /// Ordering applied before slicing.
    pub order: Order<C>,

    /// The maximum number of results to return.
    pub limit: u32,

    /// The offset into the ordered result set.
    pub offset: u32,
}

impl<C: Column> SearchQuery<C> {
    /// Converts the query into `WHERE ... ORDER BY ... LIMIT ... OFFSET ...`
    /// and its bound parameters.
    pub fn to_sql(&self, table: &str) -> (String, Vec<SqlParam>) {
        let (mut sql, mut params) = self.filter.to_sql(table);

        if !sql.is_empty() {
            sql.push(' ');
        }
        sql.push_str(&self.order.to_sql(table));

        params.push(SqlParam::Integer(self.limit.into()));
        sql.push_str(&format!(
            " LIMIT {}",
            CurrentDialect::placeholder(params.len())
        ));

        params.push(SqlParam::Integer(self.offset.into()));
        sql.push_str(&format!(
            " OFFSET {}",
            CurrentDialect::placeholder(params.len())
        ));

        (sql, params)
    }

    /// Applies the query to an in-memory slice, returning the total number of
    /// matches and the requested page.
    pub fn apply<'a, E: Searchable<Column = C>>(&self, entities: &'a [E]) -> (u64, Vec<&'a E>) {
        let mut matched: Vec<&E> = entities
            .iter()
            .filter(|entity| self.filter.matches(*entity))
            .collect();
        let total = matched.len() as u64;

        matched.sort_by(|a, b| self.order.compare(*a, *b));

        let page = matched
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();

        (total, page)
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Filter, FilterKind, Order, Scalar, SearchQuery, SqlParam};
    use crate::dialect::{CurrentDialect, Dialect};
    use crate::model::{PostColumn, UserColumn};
    use chrono::NaiveDate;
    use std::ops::Bound;

    #[test]
    fn test_build_query() {
        let query = SearchQuery {
            filter: FilterKind::Where(
                Filter::equals(UserColumn::Name, "u1")
                    .or(Filter::equals(UserColumn::Name, "u2"))
                    .and(Filter::not(Filter::at_least(UserColumn::Id, 3))),
            ),
            order: Order::new(UserColumn::Name, Direction::Desc),
            limit: 10,
            offset: 20,
        };

        let (sql, params) = query.to_sql("users");

        assert_eq!(
            format!(
                "WHERE (((name = {}) OR (name = {})) AND NOT ((id >= {}))) ORDER BY name DESC, users.id DESC LIMIT {} OFFSET {}",
                CurrentDialect::placeholder(1),
                CurrentDialect::placeholder(2),
                CurrentDialect::placeholder(3),
                CurrentDialect::placeholder(4),
                CurrentDialect::placeholder(5),
            ),
            sql
        );
        assert_eq!(
            vec![
                SqlParam::Text("u1".to_string()),
                SqlParam::Text("u2".to_string()),
                SqlParam::Integer(3),
                SqlParam::Integer(10),
                SqlParam::Integer(20),
            ],
            params
        );
    }

    #[test]
    fn test_nullable_range_is_guarded() {
        let since = NaiveDate::from_ymd_opt(2014, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let filter = Filter::within(
            UserColumn::LastLoginTime,
            Bound::Included(Scalar::Timestamp(since)),
            Bound::Unbounded,
        );

        let (sql, params) = filter.to_sql("users");

        assert_eq!(
            format!(
                "(last_login_time IS NOT NULL AND last_login_time >= {})",
                CurrentDialect::placeholder(1)
            ),
            sql
        );
        assert_eq!(vec![SqlParam::Timestamp(since)], params);
    }

    #[test]
    fn test_membership_renders_exists() {
        let (sql, params) = FilterKind::Where(Filter::equals(PostColumn::Tag, "cat")).to_sql("post_view");

        assert!(sql.starts_with("WHERE EXISTS (SELECT 1 FROM post_tags"));
        assert!(sql.contains("post_tags.post_id = post_view.id"));
        assert_eq!(vec![SqlParam::Text("cat".to_string())], params);
    }

    #[test]
    fn test_all_renders_no_where() {
        let (sql, params) = FilterKind::<UserColumn>::All.to_sql("users");

        assert_eq!("", sql);
        assert!(params.is_empty());
    }
}
