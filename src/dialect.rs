//! # SQL Dialect Module
//!
//! This module defines the `Dialect` trait, which abstracts over the differences in
//! SQL syntax across database systems. The filter tree in [`crate::query`] and the
//! [`Database`](crate::database::Database) adapter only ever build SQL through it.
//!
//! The current dialect is chosen at compile time by feature flags. When the
//! `sqlite` feature is enabled, the `CurrentDialect` type alias is set to
//! `sqlite::SqliteDialect`.

use crate::query::Membership;

#[cfg(feature = "sqlite")]
mod sqlite;

/// The current SQL dialect used at compile time, determined by feature flags.
#[cfg(feature = "sqlite")]
pub type CurrentDialect = sqlite::SqliteDialect;

#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(feature = "sqlite")]
pub type CurrentRow = sqlx::sqlite::SqliteRow;

/// A trait for SQL dialects to support database-specific query generation.
///
/// Default methods use portable SQL; implementations override what differs
/// (placeholder syntax, conditional inserts, schema).
pub trait Dialect {
    /// Returns the SQL placeholder syntax for the given parameter index.
    ///
    /// - SQLite: `?`
    /// - PostgreSQL: `$1`, `$2`, ...
    ///
    /// # Parameters
    /// - `idx`: The 1-based parameter index (used in dialects that number placeholders).
    fn placeholder(idx: usize) -> String;

    /// Returns an `EXISTS` subquery testing that the row of `table` owns a
    /// member equal to the parameter at `idx`.
    fn exists_member_query(table: &str, membership: &Membership, idx: usize) -> String {
        format!(
            "EXISTS (SELECT 1 FROM {link} WHERE {link}.{owner} = {table}.id AND {link}.{value} = {ph})",
            link = membership.table,
            owner = membership.owner,
            value = membership.value,
            table = table,
            ph = Self::placeholder(idx),
        )
    }

    /// Returns a full SELECT statement for the rows of `table` matching the
    /// given clause (`WHERE ... ORDER BY ... LIMIT ... OFFSET ...`).
    fn query_statement(table: &str, clause: &str) -> String {
        format!("SELECT * FROM {} {}", table, clause)
    }

    /// Returns the SQL statement to count rows of `table` matching the given
    /// `WHERE` clause (which may be empty).
    fn count_statement(table: &str, condition: &str) -> String {
        format!("SELECT COUNT(*) FROM {} {}", table, condition)
    }

    fn ensure_user_statement() -> String {
        format!(
            "INSERT OR IGNORE INTO users (id, name, rank, creation_time, last_login_time) VALUES ({}, {}, {}, {}, {})",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4),
            Self::placeholder(5),
        )
    }

    fn ensure_post_statement() -> String {
        format!(
            r#"INSERT OR IGNORE INTO posts
            (id, safety, kind, score, fav_count, creation_time, last_edit_time)
            VALUES ({}, {}, {}, {}, {}, {}, {})"#,
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4),
            Self::placeholder(5),
            Self::placeholder(6),
            Self::placeholder(7),
        )
    }

    /// Returns the SQL statement to ensure a tag is attached to a post.
    fn ensure_post_tag_statement() -> String {
        format!(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_name) VALUES ({}, {})",
            Self::placeholder(1),
            Self::placeholder(2),
        )
    }

    fn ensure_tag_statement() -> String {
        format!(
            "INSERT OR IGNORE INTO tags (id, name, category, creation_time) VALUES ({}, {}, {}, {})",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4),
        )
    }

    /// Returns the SQL statement to ensure a tag category exists.
    ///
    /// The first category ever created becomes the default one.
    fn ensure_tag_category_statement() -> String {
        format!(
            r#"INSERT OR IGNORE INTO tag_categories (name, color, is_default)
            SELECT {}, {}, NOT EXISTS (SELECT 1 FROM tag_categories)"#,
            Self::placeholder(1),
            Self::placeholder(2),
        )
    }

    /// Returns the SQL statement to query the category flagged as default.
    fn query_default_tag_category_statement() -> &'static str {
        "SELECT name FROM tag_categories WHERE is_default = 1 ORDER BY rowid LIMIT 1"
    }

    /// Returns the SQL statement to query the oldest category, used when no
    /// category carries the default flag.
    fn query_first_tag_category_statement() -> &'static str {
        "SELECT name FROM tag_categories ORDER BY rowid LIMIT 1"
    }

    fn clear_default_tag_category_statement() -> &'static str {
        "UPDATE tag_categories SET is_default = 0 WHERE is_default = 1"
    }

    fn set_default_tag_category_statement() -> String {
        format!(
            "UPDATE tag_categories SET is_default = 1 WHERE name = {}",
            Self::placeholder(1)
        )
    }

    /// Creates the tables and views searched by the adapter.
    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use super::{CurrentDialect, Dialect};
    use crate::query::Membership;

    #[test]
    fn test_exists_member_query() {
        let membership = Membership {
            table: "post_tags",
            owner: "post_id",
            value: "tag_name",
        };

        assert_eq!(
            format!(
                "EXISTS (SELECT 1 FROM post_tags WHERE post_tags.post_id = post_view.id AND post_tags.tag_name = {})",
                CurrentDialect::placeholder(3)
            ),
            CurrentDialect::exists_member_query("post_view", &membership, 3)
        );
    }
}
