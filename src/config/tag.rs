use super::{NamedFilter, OrderColumn, SearchConfig, SpecialFilter, ValueKind};
use crate::model::{Tag, TagColumn};
use crate::parser::value::build_filter;
use crate::query::{Filter, Order};
use crate::search::SearchError;

const NAMED_FILTERS: &[NamedFilter<TagColumn>] = &[
    NamedFilter::new("name", ValueKind::Text, TagColumn::Name),
    NamedFilter::new("category", ValueKind::Text, TagColumn::Category),
    NamedFilter::new("usages", ValueKind::Integer, TagColumn::Usages),
    NamedFilter::new("usage-count", ValueKind::Integer, TagColumn::Usages),
    NamedFilter::new("post-count", ValueKind::Integer, TagColumn::Usages),
    NamedFilter::new("creation-time", ValueKind::Date, TagColumn::CreationTime),
    NamedFilter::new("creation-date", ValueKind::Date, TagColumn::CreationTime),
];

const ORDER_COLUMNS: &[OrderColumn<TagColumn>] = &[
    OrderColumn::new("name", TagColumn::Name),
    OrderColumn::new("category", TagColumn::Category),
    OrderColumn::new("usages", TagColumn::Usages),
    OrderColumn::new("usage-count", TagColumn::Usages),
    OrderColumn::new("post-count", TagColumn::Usages),
    OrderColumn::new("creation-time", TagColumn::CreationTime),
    OrderColumn::new("creation-date", TagColumn::CreationTime),
];

const SPECIAL_FILTERS: &[SpecialFilter<TagColumn>] = &[SpecialFilter::new("unused", || {
    Filter::at_most(TagColumn::Usages, 0)
})];

const DEFAULT_CATEGORY: &str = "default-category";

/// Search configuration for tags. Bare terms match the tag name.
///
/// The name of the default tag category lives in storage; callers resolve it
/// (usually through a [`Cache`](crate::cache::Cache)) and pass it in with
/// [`TagSearchConfig::with_default_category`] to enable
/// `special:default-category`.
#[derive(Debug, Clone, Default)]
pub struct TagSearchConfig {
    default_category: Option<String>,
}

impl TagSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_category<T: Into<String>>(mut self, name: T) -> Self {
        self.default_category = Some(name.into());
        self
    }
}

impl SearchConfig for TagSearchConfig {
    type Column = TagColumn;
    type Entity = Tag;

    fn anonymous_filter(&self, term: &str) -> Result<Filter<TagColumn>, SearchError> {
        build_filter(TagColumn::Name, ValueKind::Text, term)
    }

    fn named_filters(&self) -> &[NamedFilter<TagColumn>] {
        NAMED_FILTERS
    }

    fn order_columns(&self) -> &[OrderColumn<TagColumn>] {
        ORDER_COLUMNS
    }

    fn special_filters(&self) -> &[SpecialFilter<TagColumn>] {
        SPECIAL_FILTERS
    }

    fn special_filter(&self, name: &str) -> Option<Filter<TagColumn>> {
        match (name, &self.default_category) {
            (DEFAULT_CATEGORY, Some(category)) => {
                Some(Filter::equals(TagColumn::Category, category.as_str()))
            }
            _ => self
                .special_filters()
                .iter()
                .find(|special| special.name == name)
                .map(|special| (special.build)()),
        }
    }

    fn default_order(&self) -> Order<TagColumn> {
        Order::asc(TagColumn::Name)
    }
}

#[cfg(test)]
mod tests {
    use super::TagSearchConfig;
    use crate::config::SearchConfig;
    use crate::model::TagColumn;
    use crate::query::Filter;

    #[test]
    fn test_default_category_requires_a_name() {
        assert!(TagSearchConfig::new().special_filter("default-category").is_none());
        assert_eq!(
            Some(Filter::equals(TagColumn::Category, "general")),
            TagSearchConfig::new()
                .with_default_category("general")
                .special_filter("default-category")
        );
    }

    #[test]
    fn test_static_specials_still_resolve() {
        assert!(
            TagSearchConfig::new()
                .with_default_category("general")
                .special_filter("unused")
                .is_some()
        );
    }
}
