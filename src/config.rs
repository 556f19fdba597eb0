//! # Entity Search Configuration
//!
//! Each searchable entity type declares what its queries may say through a
//! [`SearchConfig`] implementation:
//!
//! - the **anonymous** matcher applied to bare terms,
//! - a table of **named filters** (`key:value`),
//! - a table of **orderable columns** (`order:key[,asc|desc]`),
//! - a table of **special filters** (`special:name`),
//! - the default ordering and page size.
//!
//! Tables are `const` slices over the entity's column enum, so every key is
//! bound to a real column at compile time. Configs carry no mutable state and
//! are shared freely across concurrent searches.

mod post;
mod tag;
mod user;

pub use crate::parser::value::ValueKind;
pub use post::PostSearchConfig;
pub use tag::TagSearchConfig;
pub use user::UserSearchConfig;

use crate::model::Searchable;
use crate::parser::value::build_filter;
use crate::query::{Column, Filter, Order};
use crate::search::SearchError;

/// Page size used when a config does not override it.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A `key:value` filter bound to one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedFilter<C> {
    pub key: &'static str,
    pub kind: ValueKind,
    pub column: C,
}

impl<C: Column> NamedFilter<C> {
    pub const fn new(key: &'static str, kind: ValueKind, column: C) -> Self {
        Self { key, kind, column }
    }

    /// Builds the predicate for a raw (still escaped) token value.
    pub fn apply(&self, value: &str) -> Result<Filter<C>, SearchError> {
        build_filter(self.column, self.kind, value)
    }
}

/// An `order:key` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderColumn<C> {
    pub key: &'static str,
    pub column: C,
}

impl<C> OrderColumn<C> {
    pub const fn new(key: &'static str, column: C) -> Self {
        Self { key, column }
    }
}

/// A `special:name` predicate that no single column comparison expresses.
#[derive(Debug, Clone, Copy)]
pub struct SpecialFilter<C> {
    pub name: &'static str,
    pub build: fn() -> Filter<C>,
}

impl<C> SpecialFilter<C> {
    pub const fn new(name: &'static str, build: fn() -> Filter<C>) -> Self {
        Self { name, build }
    }
}

/// Capabilities of a per-entity search configuration.
pub trait SearchConfig: Send + Sync {
    type Column: Column;
    type Entity: Searchable<Column = Self::Column>;

    /// Predicate for a bare term without a `key:` prefix.
    fn anonymous_filter(&self, term: &str) -> Result<Filter<Self::Column>, SearchError>;

    fn named_filters(&self) -> &[NamedFilter<Self::Column>];

    fn order_columns(&self) -> &[OrderColumn<Self::Column>];

    fn special_filters(&self) -> &[SpecialFilter<Self::Column>] {
        &[]
    }

    /// Ordering used when a query has no `order:` token.
    fn default_order(&self) -> Order<Self::Column>;

    fn default_page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }

    fn named_filter(&self, key: &str) -> Option<&NamedFilter<Self::Column>> {
        self.named_filters().iter().find(|filter| filter.key == key)
    }

    fn order_column(&self, key: &str) -> Option<Self::Column> {
        self.order_columns()
            .iter()
            .find(|order| order.key == key)
            .map(|order| order.column)
    }

    fn special_filter(&self, name: &str) -> Option<Filter<Self::Column>> {
        self.special_filters()
            .iter()
            .find(|special| special.name == name)
            .map(|special| (special.build)())
    }
}

#[cfg(test)]
mod tests {
    use super::{PostSearchConfig, SearchConfig, TagSearchConfig, UserSearchConfig};
    use std::collections::HashSet;

    fn assert_unique_keys<S: SearchConfig>(config: &S) {
        let named: Vec<_> = config.named_filters().iter().map(|f| f.key).collect();
        let unique: HashSet<_> = named.iter().collect();
        assert_eq!(named.len(), unique.len(), "duplicate named filter keys");

        let orders: Vec<_> = config.order_columns().iter().map(|o| o.key).collect();
        let unique: HashSet<_> = orders.iter().collect();
        assert_eq!(orders.len(), unique.len(), "duplicate order keys");

        let specials: Vec<_> = config.special_filters().iter().map(|s| s.name).collect();
        let unique: HashSet<_> = specials.iter().collect();
        assert_eq!(specials.len(), unique.len(), "duplicate special names");

        for key in named.iter().chain(orders.iter()) {
            assert!(!["order", "special"].contains(key), "reserved key {key}");
        }
    }

    #[test]
    fn test_tables_have_unique_keys() {
        assert_unique_keys(&UserSearchConfig);
        assert_unique_keys(&PostSearchConfig);
        assert_unique_keys(&TagSearchConfig::new());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        assert!(UserSearchConfig.named_filter("name").is_some());
        assert!(UserSearchConfig.named_filter("Name").is_none());
        assert!(UserSearchConfig.order_column("NAME").is_none());
    }
}
