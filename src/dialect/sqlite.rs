use super::{Db, Dialect};

/// SQLite dialect implementation of the `Dialect` trait.
#[cfg(feature = "sqlite")]
pub struct SqliteDialect;

#[cfg(feature = "sqlite")]
impl Dialect for SqliteDialect {
    fn placeholder(_idx: usize) -> String {
        "?".to_string()
    }

    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
        let stmts = vec![
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                rank TEXT NOT NULL,
                creation_time TEXT NOT NULL,
                last_login_time TEXT
            );"#,
            r#"CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                safety TEXT NOT NULL,
                kind TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                fav_count INTEGER NOT NULL DEFAULT 0,
                creation_time TEXT NOT NULL,
                last_edit_time TEXT
            );"#,
            r#"CREATE TABLE IF NOT EXISTS tag_categories (
                name TEXT PRIMARY KEY,
                color TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0
            );"#,
            r#"CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                creation_time TEXT NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER,
                tag_name TEXT,
                PRIMARY KEY (post_id, tag_name),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );"#,
            r#"CREATE VIEW IF NOT EXISTS post_view
                AS SELECT posts.*,
                (SELECT COUNT(*) FROM post_tags WHERE post_tags.post_id = posts.id) AS tag_count,
                (SELECT json_group_array(tag_name ORDER BY rowid) FROM post_tags WHERE post_tags.post_id = posts.id) AS tag_names
                FROM posts;"#,
            r#"CREATE VIEW IF NOT EXISTS tag_view
                AS SELECT tags.*,
                (SELECT COUNT(*) FROM post_tags WHERE post_tags.tag_name = tags.name) AS usages
                FROM tags;"#,
        ];

        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }

        Ok(())
    }
}
