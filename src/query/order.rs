use super::{Column, ColumnSource};
use crate::model::Searchable;
use serde::Serialize;
use std::cmp::Ordering;

/// Sort direction of an order directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Orders entities by one column, breaking ties on the entity id in the same
/// direction so that `Desc` is the exact reverse of `Asc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order<C> {
    pub column: C,
    pub direction: Direction,
}

impl<C: Column> Order<C> {
    pub fn new(column: C, direction: Direction) -> Self {
        Self { column, direction }
    }

    pub fn asc(column: C) -> Self {
        Self::new(column, Direction::Asc)
    }

    pub fn desc(column: C) -> Self {
        Self::new(column, Direction::Desc)
    }

    /// Returns the same ordering in the opposite direction.
    pub fn reversed(self) -> Self {
        Self::new(self.column, self.direction.flip())
    }

    pub fn compare<E: Searchable<Column = C>>(&self, a: &E, b: &E) -> Ordering {
        let ordering = a
            .field(self.column)
            .compare(&b.field(self.column))
            .then_with(|| a.id().cmp(&b.id()));

        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }

    /// Renders the `ORDER BY` clause.
    pub fn to_sql(&self, table: &str) -> String {
        let direction = self.direction.as_sql();

        match self.column.source() {
            ColumnSource::Field { name, .. } => {
                format!("ORDER BY {name} {direction}, {table}.id {direction}")
            }
            ColumnSource::Membership(_) => format!("ORDER BY {table}.id {direction}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Order};
    use crate::model::{User, UserColumn};
    use chrono::NaiveDate;
    use std::cmp::Ordering;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            rank: "regular".to_string(),
            creation_time: NaiveDate::from_ymd_opt(2014, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            last_login_time: None,
        }
    }

    #[test]
    fn test_ties_break_on_id_in_order_direction() {
        let a = user(1, "same");
        let b = user(2, "same");

        assert_eq!(Ordering::Less, Order::asc(UserColumn::Name).compare(&a, &b));
        assert_eq!(Ordering::Greater, Order::desc(UserColumn::Name).compare(&a, &b));
    }

    #[test]
    fn test_nulls_sort_first() {
        let mut a = user(1, "a");
        let b = user(2, "b");
        a.last_login_time = Some(a.creation_time);

        assert_eq!(
            Ordering::Greater,
            Order::asc(UserColumn::LastLoginTime).compare(&a, &b)
        );
    }

    #[test]
    fn test_reversed_flips_direction() {
        let order = Order::new(UserColumn::Name, Direction::Asc).reversed();

        assert_eq!(Direction::Desc, order.direction);
        assert_eq!(Direction::Asc, order.reversed().direction);
    }
}
