use super::{NamedFilter, OrderColumn, SearchConfig, SpecialFilter, ValueKind};
use crate::model::{Post, PostColumn};
use crate::parser::value::build_filter;
use crate::query::{Filter, Order};
use crate::search::SearchError;

const NAMED_FILTERS: &[NamedFilter<PostColumn>] = &[
    NamedFilter::new("id", ValueKind::Integer, PostColumn::Id),
    NamedFilter::new("tag", ValueKind::Text, PostColumn::Tag),
    NamedFilter::new("score", ValueKind::Integer, PostColumn::Score),
    NamedFilter::new("fav-count", ValueKind::Integer, PostColumn::FavCount),
    NamedFilter::new("tag-count", ValueKind::Integer, PostColumn::TagCount),
    NamedFilter::new("safety", ValueKind::Text, PostColumn::Safety),
    NamedFilter::new("rating", ValueKind::Text, PostColumn::Safety),
    NamedFilter::new("type", ValueKind::Text, PostColumn::Kind),
    NamedFilter::new("creation-time", ValueKind::Date, PostColumn::CreationTime),
    NamedFilter::new("creation-date", ValueKind::Date, PostColumn::CreationTime),
    NamedFilter::new("date", ValueKind::Date, PostColumn::CreationTime),
    NamedFilter::new("last-edit-time", ValueKind::Date, PostColumn::LastEditTime),
    NamedFilter::new("last-edit-date", ValueKind::Date, PostColumn::LastEditTime),
    NamedFilter::new("edit-date", ValueKind::Date, PostColumn::LastEditTime),
];

const ORDER_COLUMNS: &[OrderColumn<PostColumn>] = &[
    OrderColumn::new("id", PostColumn::Id),
    OrderColumn::new("score", PostColumn::Score),
    OrderColumn::new("fav-count", PostColumn::FavCount),
    OrderColumn::new("tag-count", PostColumn::TagCount),
    OrderColumn::new("creation-time", PostColumn::CreationTime),
    OrderColumn::new("creation-date", PostColumn::CreationTime),
    OrderColumn::new("last-edit-time", PostColumn::LastEditTime),
    OrderColumn::new("last-edit-date", PostColumn::LastEditTime),
];

const SPECIAL_FILTERS: &[SpecialFilter<PostColumn>] = &[
    SpecialFilter::new("fav", || Filter::at_least(PostColumn::FavCount, 1)),
    SpecialFilter::new("liked", || Filter::at_least(PostColumn::Score, 1)),
    SpecialFilter::new("disliked", || Filter::at_most(PostColumn::Score, -1)),
    SpecialFilter::new("tagged", || Filter::at_least(PostColumn::TagCount, 1)),
];

/// Search configuration for posts. Bare terms match posts carrying that tag,
/// so `cat dog` finds posts tagged with both.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostSearchConfig;

impl SearchConfig for PostSearchConfig {
    type Column = PostColumn;
    type Entity = Post;

    fn anonymous_filter(&self, term: &str) -> Result<Filter<PostColumn>, SearchError> {
        build_filter(PostColumn::Tag, ValueKind::Text, term)
    }

    fn named_filters(&self) -> &[NamedFilter<PostColumn>] {
        NAMED_FILTERS
    }

    fn order_columns(&self) -> &[OrderColumn<PostColumn>] {
        ORDER_COLUMNS
    }

    fn special_filters(&self) -> &[SpecialFilter<PostColumn>] {
        SPECIAL_FILTERS
    }

    /// Newest first.
    fn default_order(&self) -> Order<PostColumn> {
        Order::desc(PostColumn::Id)
    }

    fn default_page_size(&self) -> u32 {
        40
    }
}
