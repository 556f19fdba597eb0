//! # Search Executor Module
//!
//! Ties the pieces together: a raw query string is tokenized, each token is
//! resolved against a [`SearchConfig`], the resulting predicates are combined
//! with AND, and the compiled [`SearchQuery`] is run against a
//! [`Collection`].
//!
//! ## Semantics
//!
//! - Filter tokens combine conjunctively; their order does not matter.
//! - `-token` negates a filter token; on an `order:` token it flips the
//!   direction.
//! - The last `order:` token wins; without one the config's default order
//!   applies.
//! - Page `n` of size `s` is the slice `[(n-1)*s, n*s)` of the filtered and
//!   ordered set; `total_count` counts the whole filtered set.
//!
//! Execution is synchronous and read-only. Nothing is cached between calls.
//!
//! ```rust
//! # use booru_search::config::UserSearchConfig;
//! # use booru_search::model::User;
//! # use booru_search::search::execute;
//! # use chrono::NaiveDate;
//! let users: Vec<User> = ["u1", "u2"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, name)| User {
//!         id: i as i64 + 1,
//!         name: name.to_string(),
//!         rank: "regular".to_string(),
//!         creation_time: NaiveDate::from_ymd_opt(2014, 1, 1)
//!             .unwrap()
//!             .and_hms_opt(0, 0, 0)
//!             .unwrap(),
//!         last_login_time: None,
//!     })
//!     .collect();
//!
//! let result = execute(&users, &UserSearchConfig, "order:name,desc", 1, None).unwrap();
//! assert_eq!(2, result.total_count);
//! assert_eq!("u2", result.items[0].name);
//! ```

use crate::config::SearchConfig;
use crate::model::Searchable;
use crate::parser::{TokenKind, parse_query};
use crate::query::{Filter, FilterKind, SearchQuery};
use serde::Serialize;

/// The single error raised by the search engine.
///
/// Every variant of invalid input (unknown keys, malformed order directives,
/// ranges on text fields, `..`, bad literals, unknown specials, invalid
/// paging) surfaces as a `SearchError` carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SearchError {
    message: String,
}

impl SearchError {
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<E> {
    /// Number of entities matching the filter, across all pages.
    pub total_count: u64,
    pub items: Vec<E>,
    pub page: u32,
    pub page_size: u32,
}

/// A queryable snapshot of entities.
pub trait Collection<E: Searchable> {
    /// Counts the entities matching `filter`.
    fn count(&self, filter: &FilterKind<E::Column>) -> u64;

    /// Returns the page of entities selected by `query`, in order.
    fn fetch(&self, query: &SearchQuery<E::Column>) -> Vec<E>;
}

impl<E: Searchable + Clone> Collection<E> for [E] {
    fn count(&self, filter: &FilterKind<E::Column>) -> u64 {
        self.iter().filter(|entity| filter.matches(*entity)).count() as u64
    }

    fn fetch(&self, query: &SearchQuery<E::Column>) -> Vec<E> {
        let (_, page) = query.apply(self);
        page.into_iter().cloned().collect()
    }
}

impl<E: Searchable + Clone> Collection<E> for Vec<E> {
    fn count(&self, filter: &FilterKind<E::Column>) -> u64 {
        self.as_slice().count(filter)
    }

    fn fetch(&self, query: &SearchQuery<E::Column>) -> Vec<E> {
        self.as_slice().fetch(query)
    }
}

/// Compiles and runs queries for one entity config.
#[derive(Debug, Clone)]
pub struct SearchExecutor<'a, S> {
    config: &'a S,
    page_size: Option<u32>,
}

impl<'a, S: SearchConfig> SearchExecutor<'a, S> {
    pub fn new(config: &'a S) -> Self {
        Self {
            config,
            page_size: None,
        }
    }

    /// Overrides the config's default page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or_else(|| self.config.default_page_size())
    }

    /// Parses `query` and builds the filter, ordering and page window.
    ///
    /// # Errors
    /// Any parse failure, or `page < 1` / `page_size < 1`.
    pub fn compile(&self, query: &str, page: u32) -> Result<SearchQuery<S::Column>, SearchError> {
        let page_size = self.page_size();
        if page < 1 {
            return Err(SearchError::new(format!("Invalid page: {page}")));
        }
        if page_size < 1 {
            return Err(SearchError::new(format!("Invalid page size: {page_size}")));
        }

        let mut filter: Option<Filter<S::Column>> = None;
        let mut order = self.config.default_order();

        for token in parse_query(self.config, query)? {
            let predicate = match token.kind {
                TokenKind::Anonymous { term } => self.config.anonymous_filter(term)?,
                TokenKind::Named { filter, value } => filter.apply(value)?,
                TokenKind::Special { filter, .. } => filter,
                TokenKind::Order(explicit) => {
                    order = if token.negated {
                        explicit.reversed()
                    } else {
                        explicit
                    };
                    continue;
                }
            };

            let predicate = if token.negated {
                Filter::not(predicate)
            } else {
                predicate
            };

            filter = Some(match filter {
                Some(acc) => acc.and(predicate),
                None => predicate,
            });
        }

        let offset = (u64::from(page) - 1) * u64::from(page_size);
        let offset = u32::try_from(offset)
            .map_err(|_| SearchError::new(format!("Page out of range: {page}")))?;

        Ok(SearchQuery {
            filter: filter.into(),
            order,
            limit: page_size,
            offset,
        })
    }

    /// Runs `query` against `collection` and returns the requested page.
    pub fn execute<C>(
        &self,
        collection: &C,
        query: &str,
        page: u32,
    ) -> Result<SearchResult<S::Entity>, SearchError>
    where
        C: Collection<S::Entity> + ?Sized,
    {
        let compiled = self.compile(query, page)?;

        let total_count = collection.count(&compiled.filter);
        let items = collection.fetch(&compiled);

        tracing::debug!(query, page, total_count, returned = items.len(), "search executed");

        Ok(SearchResult {
            total_count,
            items,
            page,
            page_size: compiled.limit,
        })
    }
}

/// Searches `collection` with `config`. `page_size` overrides the config
/// default when given.
pub fn execute<S, C>(
    collection: &C,
    config: &S,
    query: &str,
    page: u32,
    page_size: Option<u32>,
) -> Result<SearchResult<S::Entity>, SearchError>
where
    S: SearchConfig,
    C: Collection<S::Entity> + ?Sized,
{
    let executor = SearchExecutor::new(config);
    let executor = match page_size {
        Some(page_size) => executor.with_page_size(page_size),
        None => executor,
    };

    executor.execute(collection, query, page)
}
