use crate::{
    cache::Cache,
    config::SearchConfig,
    dialect::{CurrentDialect, CurrentRow, Db, Dialect},
    model::{Post, Searchable, Tag, User},
    query::SqlParam,
    search::{SearchError, SearchExecutor, SearchResult},
};
pub use sqlx::Pool;
use sqlx::{FromRow, Row};
use thiserror::Error;

/// Cache key under which the default tag category name is stored.
pub const DEFAULT_TAG_CATEGORY_KEY: &str = "default-tag-category";

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                SqlParam::Text(value) => query.bind(value.as_str()),
                SqlParam::Integer(value) => query.bind(*value),
                SqlParam::Timestamp(value) => query.bind(*value),
            };
        }
        query
    }};
}

impl FromRow<'_, CurrentRow> for User {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            rank: row.try_get("rank")?,
            creation_time: row.try_get("creation_time")?,
            last_login_time: row.try_get("last_login_time")?,
        })
    }
}

impl FromRow<'_, CurrentRow> for Post {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        let tag_names: String = row.try_get("tag_names")?;
        let tags: Vec<String> = serde_json::from_str(&tag_names).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "tag_names".to_string(),
                source: Box::new(e),
            }
        })?;

        Ok(Post {
            id: row.try_get("id")?,
            safety: row.try_get("safety")?,
            kind: row.try_get("kind")?,
            score: row.try_get("score")?,
            fav_count: row.try_get("fav_count")?,
            creation_time: row.try_get("creation_time")?,
            last_edit_time: row.try_get("last_edit_time")?,
            tags,
        })
    }
}

impl FromRow<'_, CurrentRow> for Tag {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(Tag {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            usages: row.try_get("usages")?,
            creation_time: row.try_get("creation_time")?,
        })
    }
}

/// SQL-backed storage for users, posts and tags.
///
/// This struct wraps an SQLx connection pool. Searches are compiled by
/// [`SearchExecutor`] and rendered to SQL through `Dialect`, so the result of
/// [`Database::search`] matches what the in-memory executor returns for the
/// same data.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Db>,
}

impl Database {
    pub async fn with_migration(pool: sqlx::Pool<Db>) -> Result<Self, sqlx::Error> {
        CurrentDialect::migration(&pool).await?;

        Ok(Self { pool })
    }

    async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, DatabaseError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DatabaseError>>,
    {
        let max_retries = 3;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    tracing::warn!(attempt, error = %e, "retrying database operation");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ensures that a user is present in the `users` table.
    ///
    /// Existing rows with the same id or name are left untouched.
    pub async fn ensure_user(&self, user: &User) -> Result<(), DatabaseError> {
        let stmt = CurrentDialect::ensure_user_statement();

        self.retry(|| async {
            sqlx::query(&stmt)
                .bind(user.id)
                .bind(user.name.as_str())
                .bind(user.rank.as_str())
                .bind(user.creation_time)
                .bind(user.last_login_time)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::InsertUser { id: user.id },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await?;

        Ok(())
    }

    /// Ensures that a post and all of its tag relations are present.
    ///
    /// The post row and its `post_tags` rows are written in one transaction.
    pub async fn ensure_post(&self, post: &Post) -> Result<(), DatabaseError> {
        let stmt_post = CurrentDialect::ensure_post_statement();
        let stmt_tag = CurrentDialect::ensure_post_tag_statement();

        self.retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })?;

            sqlx::query(&stmt_post)
                .bind(post.id)
                .bind(post.safety.as_str())
                .bind(post.kind.as_str())
                .bind(post.score)
                .bind(post.fav_count)
                .bind(post.creation_time)
                .bind(post.last_edit_time)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::InsertPost { id: post.id },
                    sql: stmt_post.clone(),
                    source: e,
                })?;

            for tag in &post.tags {
                sqlx::query(&stmt_tag)
                    .bind(post.id)
                    .bind(tag.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::InsertPostTag {
                            id: post.id,
                            tag: tag.clone(),
                        },
                        sql: stmt_tag.clone(),
                        source: e,
                    })?;
            }

            tx.commit()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })
        })
        .await?;

        Ok(())
    }

    /// Ensures that a tag is present in the `tags` table.
    ///
    /// Usage counts are derived from `post_tags`; `tag.usages` is ignored.
    pub async fn ensure_tag(&self, tag: &Tag) -> Result<(), DatabaseError> {
        let stmt = CurrentDialect::ensure_tag_statement();

        self.retry(|| async {
            sqlx::query(&stmt)
                .bind(tag.id)
                .bind(tag.name.as_str())
                .bind(tag.category.as_str())
                .bind(tag.creation_time)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::InsertTag {
                        name: tag.name.clone(),
                    },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await?;

        Ok(())
    }

    /// Ensures that a tag category exists. The first category created
    /// becomes the default one.
    pub async fn ensure_tag_category(
        &self,
        name: &str,
        color: &str,
        cache: &dyn Cache,
    ) -> Result<(), DatabaseError> {
        let stmt = CurrentDialect::ensure_tag_category_statement();

        self.retry(|| async {
            sqlx::query(&stmt)
                .bind(name)
                .bind(color)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::InsertTagCategory {
                        name: name.to_string(),
                    },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await?;

        cache.remove(DEFAULT_TAG_CATEGORY_KEY);

        Ok(())
    }

    /// Returns the name of the default tag category.
    ///
    /// Falls back to the oldest category when none is flagged as default, and
    /// to `None` when there are no categories at all. Found names are stored
    /// in `cache` under [`DEFAULT_TAG_CATEGORY_KEY`].
    pub async fn default_tag_category(
        &self,
        cache: &dyn Cache,
    ) -> Result<Option<String>, DatabaseError> {
        if let Some(name) = cache.get(DEFAULT_TAG_CATEGORY_KEY) {
            return Ok(Some(name));
        }

        let mut found = None;
        for stmt in [
            CurrentDialect::query_default_tag_category_statement(),
            CurrentDialect::query_first_tag_category_statement(),
        ] {
            found = self
                .retry(|| async {
                    sqlx::query_scalar::<_, String>(stmt)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| DatabaseError::QueryFailed {
                            operation: DbOperation::QueryDefaultTagCategory,
                            sql: stmt.to_string(),
                            source: e,
                        })
                })
                .await?;

            if found.is_some() {
                break;
            }
        }

        if let Some(name) = &found {
            cache.put(DEFAULT_TAG_CATEGORY_KEY, name.clone());
        }

        Ok(found)
    }

    /// Flags `name` as the only default tag category.
    ///
    /// Clearing the old flag and setting the new one happen in one
    /// transaction, and the cached name is invalidated afterwards.
    pub async fn set_default_tag_category(
        &self,
        name: &str,
        cache: &dyn Cache,
    ) -> Result<(), DatabaseError> {
        let stmt_clear = CurrentDialect::clear_default_tag_category_statement();
        let stmt_set = CurrentDialect::set_default_tag_category_statement();

        self.retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })?;

            sqlx::query(stmt_clear)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::UpdateDefaultTagCategory {
                        name: name.to_string(),
                    },
                    sql: stmt_clear.to_string(),
                    source: e,
                })?;

            let updated = sqlx::query(&stmt_set)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::UpdateDefaultTagCategory {
                        name: name.to_string(),
                    },
                    sql: stmt_set.clone(),
                    source: e,
                })?;

            if updated.rows_affected() == 0 {
                return Err(DatabaseError::TagCategoryNotFound {
                    name: name.to_string(),
                });
            }

            tx.commit()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })
        })
        .await?;

        cache.remove(DEFAULT_TAG_CATEGORY_KEY);

        Ok(())
    }

    /// Runs a search query against the table or view of `S::Entity`.
    ///
    /// The query is compiled exactly as the in-memory executor does it; the
    /// total count and the page are then fetched with two statements.
    pub async fn search<S>(
        &self,
        config: &S,
        query: &str,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<SearchResult<S::Entity>, DatabaseError>
    where
        S: SearchConfig,
        S::Entity: for<'r> FromRow<'r, CurrentRow> + Send + Unpin,
    {
        let executor = SearchExecutor::new(config);
        let executor = match page_size {
            Some(page_size) => executor.with_page_size(page_size),
            None => executor,
        };
        let compiled = executor.compile(query, page)?;
        let table = <S::Entity as Searchable>::TABLE;

        let (condition, count_params) = compiled.filter.to_sql(table);
        let count_stmt = CurrentDialect::count_statement(table, &condition);

        let total_count = self
            .retry(|| async {
                bind_params!(sqlx::query_scalar::<_, i64>(&count_stmt), &count_params)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::CountEntities { table },
                        sql: count_stmt.clone(),
                        source: e,
                    })
            })
            .await?;

        let (clause, params) = compiled.to_sql(table);
        let stmt = CurrentDialect::query_statement(table, &clause);

        let items = self
            .retry(|| async {
                bind_params!(sqlx::query_as::<_, S::Entity>(&stmt), &params)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::QueryEntities { table },
                        sql: stmt.clone(),
                        source: e,
                    })
            })
            .await?;

        tracing::debug!(
            table,
            query,
            page,
            total_count,
            returned = items.len(),
            "search executed"
        );

        Ok(SearchResult {
            total_count: total_count.max(0) as u64,
            items,
            page,
            page_size: compiled.limit,
        })
    }
}

/// Represents errors that can occur during database operations.
///
/// Each variant includes contextual information to assist with debugging and error handling.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The search query itself was rejected before touching the database.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// A general SQL query failure, with full context including operation and SQL.
    #[error("Query failed during {operation:?}: sql={sql}")]
    QueryFailed {
        operation: DbOperation,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    /// A failure to begin or commit a transaction.
    #[error("Failed to operate transaction")]
    TransactionFailed {
        #[source]
        source: sqlx::Error,
    },

    #[error("Tag category not found: {name}")]
    TagCategoryNotFound { name: String },
}

/// Enum representing the kind of database operation being performed,
/// used for attaching context to [`DatabaseError::QueryFailed`].
#[derive(Debug)]
pub enum DbOperation {
    /// INSERT INTO users
    InsertUser { id: i64 },
    /// INSERT INTO posts
    InsertPost { id: i64 },
    /// INSERT INTO post_tags
    InsertPostTag { id: i64, tag: String },
    /// INSERT INTO tags
    InsertTag { name: String },
    /// INSERT INTO tag_categories
    InsertTagCategory { name: String },
    /// SELECT COUNT(*) for a search
    CountEntities { table: &'static str },
    /// SELECT * for a search page
    QueryEntities { table: &'static str },
    QueryDefaultTagCategory,
    UpdateDefaultTagCategory { name: String },
}

impl DatabaseError {
    fn is_retryable(&self) -> bool {
        let is_retryable_kind = |e: &sqlx::Error| {
            matches!(e, sqlx::Error::Io(_))
                || matches!(e, sqlx::Error::Protocol(_))
                || matches!(e, sqlx::Error::PoolTimedOut)
        };

        match self {
            DatabaseError::QueryFailed { source, .. } => is_retryable_kind(source),
            DatabaseError::TransactionFailed { source } => is_retryable_kind(source),
            DatabaseError::Search(_) | DatabaseError::TagCategoryNotFound { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_TAG_CATEGORY_KEY, Database, DatabaseError};
    use crate::{
        cache::{Cache, MemoryCache, NoCache},
        config::{PostSearchConfig, TagSearchConfig, UserSearchConfig},
        model::{Post, Tag, User},
        search::execute,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use sqlx::sqlite::SqlitePoolOptions;

    /// Returns a migrated database on a private in-memory SQLite connection.
    async fn get_db() -> Database {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Database::with_migration(pool).await.unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn users() -> Vec<User> {
        vec![
            User {
                id: 1,
                name: "u1".to_string(),
                rank: "regular".to_string(),
                creation_time: at(2014, 1, 1),
                last_login_time: None,
            },
            User {
                id: 2,
                name: "u2".to_string(),
                rank: "administrator".to_string(),
                creation_time: at(2014, 6, 1),
                last_login_time: Some(at(2015, 1, 1)),
            },
            User {
                id: 3,
                name: "u3".to_string(),
                rank: "regular".to_string(),
                creation_time: at(2015, 1, 2),
                last_login_time: Some(at(2015, 3, 1)),
            },
        ]
    }

    fn posts() -> Vec<Post> {
        vec![
            Post {
                id: 1,
                safety: "safe".to_string(),
                kind: "image".to_string(),
                score: 3,
                fav_count: 0,
                creation_time: at(2020, 1, 1),
                last_edit_time: None,
                tags: vec!["cat".to_string()],
            },
            Post {
                id: 2,
                safety: "sketchy".to_string(),
                kind: "video".to_string(),
                score: -1,
                fav_count: 2,
                creation_time: at(2020, 2, 1),
                last_edit_time: Some(at(2020, 3, 1)),
                tags: vec!["cat".to_string(), "dog".to_string()],
            },
            Post {
                id: 3,
                safety: "safe".to_string(),
                kind: "image".to_string(),
                score: 0,
                fav_count: 1,
                creation_time: at(2021, 1, 1),
                last_edit_time: None,
                tags: vec![],
            },
        ]
    }

    /// Verifies that `Database::with_migration` can be called multiple times
    /// on the same pool without error.
    #[tokio::test]
    async fn test_migration_idempotency() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        Database::with_migration(pool.clone()).await.unwrap();
        Database::with_migration(pool.clone()).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let db = get_db().await;

        for user in users() {
            db.ensure_user(&user).await.unwrap();
            db.ensure_user(&user).await.unwrap();
        }
        for post in posts() {
            db.ensure_post(&post).await.unwrap();
            db.ensure_post(&post).await.unwrap();
        }

        let result = db.search(&UserSearchConfig, "", 1, None).await.unwrap();
        assert_eq!(3, result.total_count);
        assert_eq!(users(), result.items);

        let result = db.search(&PostSearchConfig, "", 1, None).await.unwrap();
        assert_eq!(3, result.total_count);
    }

    /// The SQL path must agree with the in-memory executor on the same data.
    #[tokio::test]
    async fn test_search_users_matches_memory() {
        let db = get_db().await;
        let users = users();
        for user in &users {
            db.ensure_user(user).await.unwrap();
        }

        for query in [
            "",
            "u1,u3",
            "-u2",
            "name:u1,u2",
            "creation_time:2014",
            "creation_date:..2014-06",
            "-last_login_date:2015-01",
            "last_login_time:2015",
            "order:name,desc",
            "-order:last_login_time",
            "rank:regular order:creation_time,desc",
        ] {
            for page in [1, 2] {
                let expected = execute(&users, &UserSearchConfig, query, page, Some(2)).unwrap();
                let actual = db
                    .search(&UserSearchConfig, query, page, Some(2))
                    .await
                    .unwrap();

                assert_eq!(expected, actual, "{query:?} page {page}");
            }
        }
    }

    #[tokio::test]
    async fn test_search_posts_matches_memory() {
        let db = get_db().await;
        let posts = posts();
        for post in &posts {
            db.ensure_post(post).await.unwrap();
        }

        for query in [
            "cat",
            "-cat",
            "tag:dog,cat",
            "score:0..",
            "tag-count:1..",
            "special:fav",
            "-special:tagged",
            "safety:safe order:creation-date",
            "edit-date:2020",
            "order:tag-count,desc",
        ] {
            let expected = execute(&posts, &PostSearchConfig, query, 1, None).unwrap();
            let actual = db.search(&PostSearchConfig, query, 1, None).await.unwrap();

            assert_eq!(expected, actual, "{query:?}");
        }
    }

    #[tokio::test]
    async fn test_post_tags_are_distinct_and_keep_order() {
        let db = get_db().await;
        let post = Post {
            tags: vec![
                "dog".to_string(),
                "cat".to_string(),
                "cat".to_string(),
                "black cat".to_string(),
            ],
            ..posts().remove(0)
        };
        db.ensure_post(&post).await.unwrap();
        let posts = vec![post];

        let stored = db.search(&PostSearchConfig, "", 1, None).await.unwrap();
        assert_eq!(
            vec!["dog", "cat", "black cat"],
            stored.items[0].tags.iter().map(String::as_str).collect::<Vec<_>>()
        );
        assert_eq!(3, stored.items[0].tag_count());

        for query in ["tag-count:3", "tag-count:4", "tag:cat", "order:tag-count"] {
            let ids = |result: crate::search::SearchResult<Post>| {
                result.items.iter().map(|p| (p.id, p.tag_count())).collect::<Vec<_>>()
            };
            let expected = execute(&posts, &PostSearchConfig, query, 1, None).unwrap();
            let actual = db.search(&PostSearchConfig, query, 1, None).await.unwrap();

            assert_eq!(expected.total_count, actual.total_count, "{query:?}");
            assert_eq!(ids(expected), ids(actual), "{query:?}");
        }
    }

    #[tokio::test]
    async fn test_search_tags() {
        let db = get_db().await;
        let cache = MemoryCache::new();

        db.ensure_tag_category("default", "#000", &cache)
            .await
            .unwrap();
        db.ensure_tag_category("meta", "#fff", &cache).await.unwrap();

        for (id, name, category) in [(1, "cat", "default"), (2, "dog", "default"), (3, "tagme", "meta")]
        {
            db.ensure_tag(&Tag {
                id,
                name: name.to_string(),
                category: category.to_string(),
                usages: 0,
                creation_time: at(2020, 1, id as u32),
            })
            .await
            .unwrap();
        }
        for post in posts() {
            db.ensure_post(&post).await.unwrap();
        }

        let names = |result: crate::search::SearchResult<Tag>| {
            result
                .items
                .into_iter()
                .map(|tag| (tag.name, tag.usages))
                .collect::<Vec<_>>()
        };

        let result = db
            .search(&TagSearchConfig::new(), "usages:1.. order:usages,desc", 1, None)
            .await
            .unwrap();
        assert_eq!(
            vec![("cat".to_string(), 2), ("dog".to_string(), 1)],
            names(result)
        );

        let result = db
            .search(&TagSearchConfig::new(), "special:unused", 1, None)
            .await
            .unwrap();
        assert_eq!(vec![("tagme".to_string(), 0)], names(result));

        let default = db.default_tag_category(&cache).await.unwrap().unwrap();
        let config = TagSearchConfig::new().with_default_category(default);
        let result = db
            .search(&config, "-special:default-category", 1, None)
            .await
            .unwrap();
        assert_eq!(vec![("tagme".to_string(), 0)], names(result));
    }

    #[tokio::test]
    async fn test_default_tag_category() {
        let db = get_db().await;
        let cache = MemoryCache::new();

        assert_eq!(None, db.default_tag_category(&cache).await.unwrap());
        assert_eq!(None, cache.get(DEFAULT_TAG_CATEGORY_KEY));

        db.ensure_tag_category("default", "#000", &cache)
            .await
            .unwrap();
        db.ensure_tag_category("meta", "#fff", &cache).await.unwrap();

        assert_eq!(
            Some("default".to_string()),
            db.default_tag_category(&cache).await.unwrap()
        );
        assert_eq!(
            Some("default".to_string()),
            cache.get(DEFAULT_TAG_CATEGORY_KEY)
        );

        db.set_default_tag_category("meta", &cache).await.unwrap();
        assert_eq!(None, cache.get(DEFAULT_TAG_CATEGORY_KEY));
        assert_eq!(
            Some("meta".to_string()),
            db.default_tag_category(&NoCache).await.unwrap()
        );

        assert!(matches!(
            db.set_default_tag_category("missing", &cache).await,
            Err(DatabaseError::TagCategoryNotFound { .. })
        ));
        assert_eq!(
            Some("meta".to_string()),
            db.default_tag_category(&cache).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_query_is_search_error() {
        let db = get_db().await;

        assert!(matches!(
            db.search(&UserSearchConfig, "bad:x", 1, None).await,
            Err(DatabaseError::Search(_))
        ));
        assert!(matches!(
            db.search(&UserSearchConfig, "", 0, None).await,
            Err(DatabaseError::Search(_))
        ));
    }
}
